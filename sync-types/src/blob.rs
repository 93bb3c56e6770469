//! Named file payloads carried inside an [`Envelope`](crate::Envelope).
//!
//! Payloads use a dual encoding. Content that begins with an XML
//! declaration travels verbatim as text; everything else is base64. The
//! receiving side branches on the same marker to decide whether to
//! base64-decode, so both directions must use [`ContentBlob::encode`] and
//! [`ContentBlob::decode`].

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::CodecError;

/// Marker that selects verbatim (non-base64) payload encoding.
pub const XML_DECLARATION: &str = "<?xml";

/// Version attached to blobs that do not carry an explicit one.
pub const DEFAULT_VERSION: &str = "1.0";

/// A named unit of file payload moving over the wire.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlob {
    /// Declared file name.
    pub name: String,
    /// Encoded payload (verbatim XML text or base64).
    pub payload: String,
    /// Version string used by the versioned ingest policy.
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

impl ContentBlob {
    /// Wrap an already-encoded payload.
    pub fn new(name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
            version: default_version(),
        }
    }

    /// Encode raw file bytes under `name`.
    ///
    /// UTF-8 content starting with [`XML_DECLARATION`] is stored verbatim,
    /// anything else is base64-encoded.
    pub fn encode(name: impl Into<String>, bytes: &[u8]) -> Self {
        let payload = match std::str::from_utf8(bytes) {
            Ok(text) if text.starts_with(XML_DECLARATION) => text.to_string(),
            _ => STANDARD.encode(bytes),
        };
        Self::new(name, payload)
    }

    /// Set an explicit version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Whether the payload is carried verbatim rather than base64.
    pub fn is_verbatim(&self) -> bool {
        self.payload.starts_with(XML_DECLARATION)
    }

    /// Recover the raw file bytes.
    pub fn decode(&self) -> Result<Vec<u8>, CodecError> {
        if self.is_verbatim() {
            return Ok(self.payload.as_bytes().to_vec());
        }
        STANDARD
            .decode(self.payload.as_bytes())
            .map_err(|e| CodecError::InvalidPayload {
                name: self.name.clone(),
                reason: e.to_string(),
            })
    }

    /// Same blob under a different name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: self.payload.clone(),
            version: self.version.clone(),
        }
    }
}

impl std::fmt::Debug for ContentBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentBlob")
            .field("name", &self.name)
            .field("payload", &format!("[{} chars]", self.payload.len()))
            .field("version", &self.version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_content_is_base64() {
        let blob = ContentBlob::encode("image.bin", &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert!(!blob.is_verbatim());
        assert_eq!(blob.payload, "3q2+7w==");
        assert_eq!(blob.decode().unwrap(), vec![0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn plain_text_is_base64() {
        let blob = ContentBlob::encode("notes.txt", b"hello");
        assert_eq!(blob.payload, "aGVsbG8=");
        assert_eq!(blob.decode().unwrap(), b"hello");
    }

    #[test]
    fn xml_content_is_verbatim() {
        let xml = b"<?xml version=\"1.0\"?><tool name=\"a\"/>";
        let blob = ContentBlob::encode("tool.xml", xml);
        assert!(blob.is_verbatim());
        assert_eq!(blob.payload.as_bytes(), xml);
        assert_eq!(blob.decode().unwrap(), xml);
    }

    #[test]
    fn xml_marker_must_lead() {
        let blob = ContentBlob::encode("late.xml", b" <?xml version=\"1.0\"?>");
        assert!(!blob.is_verbatim());
    }

    #[test]
    fn invalid_base64_fails_decode() {
        let blob = ContentBlob::new("broken.bin", "not base64!!");
        let err = blob.decode().unwrap_err();
        assert!(matches!(err, CodecError::InvalidPayload { ref name, .. } if name == "broken.bin"));
    }

    #[test]
    fn default_version_applied() {
        let blob = ContentBlob::encode("a", b"x");
        assert_eq!(blob.version, DEFAULT_VERSION);
        let blob = blob.with_version("2.1");
        assert_eq!(blob.version, "2.1");
    }

    #[test]
    fn renamed_keeps_payload_and_version() {
        let blob = ContentBlob::encode("a.txt", b"data").with_version("3.0");
        let moved = blob.renamed("b.txt");
        assert_eq!(moved.name, "b.txt");
        assert_eq!(moved.payload, blob.payload);
        assert_eq!(moved.version, "3.0");
    }

    #[test]
    fn debug_hides_payload() {
        let blob = ContentBlob::encode("secret.txt", b"top secret contents");
        let debug = format!("{:?}", blob);
        assert!(debug.contains("secret.txt"));
        assert!(!debug.contains(&blob.payload));
    }
}
