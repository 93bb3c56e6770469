//! Length-prefixed frames on a byte stream.
//!
//! Wire layout: a 4-byte big-endian length followed by a MessagePack
//! encoded [`Frame`]. The channel lets unrelated traffic share a stream;
//! file synchronization always uses [`FILE_TRANSFER_CHANNEL`].

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::CodecError;

/// Channel carrying envelope traffic.
pub const FILE_TRANSFER_CHANNEL: &str = "dirsync/files";

/// Default upper bound on a single frame (64 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// A framed message on a named channel.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Logical channel name.
    pub channel: String,
    /// Opaque payload (an encoded envelope on the file channel).
    #[serde(with = "serde_bytes_compat")]
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a new frame.
    pub fn new(channel: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            channel: channel.into(),
            payload,
        }
    }

    /// Frame on the file-transfer channel.
    pub fn files(payload: Vec<u8>) -> Self {
        Self::new(FILE_TRANSFER_CHANNEL, payload)
    }

    /// Serialize to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        rmp_serde::to_vec(self).map_err(CodecError::Serialization)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        rmp_serde::from_slice(bytes).map_err(CodecError::Deserialization)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("channel", &self.channel)
            .field("payload", &format!("[{} bytes]", self.payload.len()))
            .finish()
    }
}

// Encode the payload as a msgpack bin rather than an array of ints.
mod serde_bytes_compat {
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        struct BytesVisitor;

        impl<'de> serde::de::Visitor<'de> for BytesVisitor {
            type Value = Vec<u8>;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a byte buffer")
            }

            fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                Ok(v.to_vec())
            }

            fn visit_byte_buf<E: serde::de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
                Ok(v)
            }

            fn visit_seq<A: serde::de::SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> Result<Self::Value, A::Error> {
                let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(b) = seq.next_element::<u8>()? {
                    out.push(b);
                }
                Ok(out)
            }
        }

        deserializer.deserialize_byte_buf(BytesVisitor)
    }
}

/// Read one frame.
///
/// Returns `Ok(None)` on a clean end of stream before any length byte.
/// A length above `max_size` fails without reading the body.
pub async fn read_frame<R>(reader: &mut R, max_size: usize) -> Result<Option<Frame>, CodecError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_size {
        return Err(CodecError::FrameTooLarge {
            size: len,
            limit: max_size,
        });
    }

    // Grow with the bytes that arrive, not with the advertised length
    let mut body = Vec::new();
    (&mut *reader).take(len as u64).read_to_end(&mut body).await?;
    if body.len() < len {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("frame truncated at {} of {} bytes", body.len(), len),
        )
        .into());
    }
    Frame::from_bytes(&body).map(Some)
}

/// Write one frame and flush.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    let body = frame.to_bytes()?;
    let len = u32::try_from(body.len()).map_err(|_| CodecError::FrameTooLarge {
        size: body.len(),
        limit: u32::MAX as usize,
    })?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_bytes_roundtrip() {
        let frame = Frame::files(vec![1, 2, 3, 255]);
        let restored = Frame::from_bytes(&frame.to_bytes().unwrap()).unwrap();
        assert_eq!(restored, frame);
        assert_eq!(restored.channel, FILE_TRANSFER_CHANNEL);
    }

    #[test]
    fn frame_debug_hides_payload() {
        let frame = Frame::files(vec![0; 10]);
        assert_eq!(
            format!("{:?}", frame),
            "Frame { channel: \"dirsync/files\", payload: \"[10 bytes]\" }"
        );
    }

    #[tokio::test]
    async fn stream_roundtrip() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        let first = Frame::files(b"one".to_vec());
        let second = Frame::new("other", b"two".to_vec());

        write_frame(&mut a, &first).await.unwrap();
        write_frame(&mut a, &second).await.unwrap();
        drop(a);

        let max = DEFAULT_MAX_FRAME_SIZE;
        assert_eq!(read_frame(&mut b, max).await.unwrap(), Some(first));
        assert_eq!(read_frame(&mut b, max).await.unwrap(), Some(second));
        assert_eq!(read_frame(&mut b, max).await.unwrap(), None);
    }

    #[tokio::test]
    async fn oversized_frame_rejected() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        write_frame(&mut a, &Frame::files(vec![7; 200])).await.unwrap();

        let err = read_frame(&mut b, 16).await.unwrap_err();
        assert!(matches!(err, CodecError::FrameTooLarge { limit: 16, .. }));
    }

    #[tokio::test]
    async fn truncated_body_is_io_error() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        a.write_all(&100u32.to_be_bytes()).await.unwrap();
        a.write_all(&[1, 2, 3]).await.unwrap();
        drop(a);

        let err = read_frame(&mut b, DEFAULT_MAX_FRAME_SIZE).await.unwrap_err();
        assert!(matches!(err, CodecError::Io(_)));
    }

    /// Reader that remembers the largest buffer it was asked to fill.
    struct BufferWatch<R> {
        inner: R,
        largest: usize,
    }

    impl<R: AsyncRead + Unpin> AsyncRead for BufferWatch<R> {
        fn poll_read(
            self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            let this = self.get_mut();
            this.largest = this.largest.max(buf.remaining());
            std::pin::Pin::new(&mut this.inner).poll_read(cx, buf)
        }
    }

    #[tokio::test]
    async fn large_length_prefix_does_not_preallocate() {
        let (mut a, b) = tokio::io::duplex(1024);
        a.write_all(&(DEFAULT_MAX_FRAME_SIZE as u32).to_be_bytes()).await.unwrap();
        a.write_all(&[1, 2, 3]).await.unwrap();
        drop(a);

        let mut reader = BufferWatch { inner: b, largest: 0 };
        let err = read_frame(&mut reader, DEFAULT_MAX_FRAME_SIZE).await.unwrap_err();
        assert!(matches!(err, CodecError::Io(_)));
        assert!(reader.largest < 1024 * 1024, "buffer of {} bytes", reader.largest);
    }

    #[tokio::test]
    async fn garbage_body_is_decode_error() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        a.write_all(&3u32.to_be_bytes()).await.unwrap();
        a.write_all(&[0xc1, 0xc1, 0xc1]).await.unwrap();
        drop(a);

        let err = read_frame(&mut b, DEFAULT_MAX_FRAME_SIZE).await.unwrap_err();
        assert!(matches!(err, CodecError::Deserialization(_)));
    }
}
