//! Envelope - the typed packet exchanged between client and server.

use serde::{Deserialize, Serialize};

use crate::{CodecError, ContentBlob, DiffResult, FileRecord};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Name of the blob carrying a directory snapshot in a `Metadata` envelope.
pub const METADATA_FILE: &str = "metadata.json";

/// Name of the diff manifest (blob 0 of a `Differences` envelope, and the
/// audit file the server writes into its directory).
pub const DIFF_MANIFEST_FILE: &str = "differences.json";

/// Packet type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum PacketType {
    /// Client directory snapshot (one blob: the JSON record list)
    Metadata = 0,
    /// Server reply: diff manifest followed by server-only files
    Differences = 1,
    /// Files a client uploads because the server asked for them
    ClientFiles = 2,
    /// Files the server pushes to every client, no reply expected
    Broadcast = 3,
}

impl TryFrom<u8> for PacketType {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PacketType::Metadata),
            1 => Ok(PacketType::Differences),
            2 => Ok(PacketType::ClientFiles),
            3 => Ok(PacketType::Broadcast),
            _ => Err(CodecError::InvalidPacketType(value)),
        }
    }
}

impl From<PacketType> for u8 {
    fn from(value: PacketType) -> Self {
        value as u8
    }
}

/// The envelope wraps an ordered list of content blobs with a packet type.
///
/// Invariant: a `Differences` envelope always carries the diff manifest as
/// element 0. Use [`Envelope::data_blobs`] to iterate file blobs without
/// ever mistaking the manifest for a data file of the same name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Protocol version (currently 1)
    pub version: u8,
    /// Packet type
    pub packet_type: PacketType,
    /// Ordered blobs
    pub blobs: Vec<ContentBlob>,
}

impl Envelope {
    /// Create a new envelope.
    pub fn new(packet_type: PacketType, blobs: Vec<ContentBlob>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            packet_type,
            blobs,
        }
    }

    /// Build a `Metadata` envelope from a directory snapshot.
    pub fn metadata(records: &[FileRecord]) -> Result<Self, CodecError> {
        let json = serde_json::to_vec(records)?;
        Ok(Self::new(
            PacketType::Metadata,
            vec![ContentBlob::encode(METADATA_FILE, &json)],
        ))
    }

    /// Build a `Differences` envelope: manifest first, then the files.
    pub fn differences(diff: &DiffResult, files: Vec<ContentBlob>) -> Result<Self, CodecError> {
        let manifest = ContentBlob::encode(DIFF_MANIFEST_FILE, &diff.to_json()?);
        let mut blobs = Vec::with_capacity(files.len() + 1);
        blobs.push(manifest);
        blobs.extend(files);
        Ok(Self::new(PacketType::Differences, blobs))
    }

    /// Serialize to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        rmp_serde::to_vec(self).map_err(CodecError::Serialization)
    }

    /// Deserialize from MessagePack bytes.
    ///
    /// Fails on truncated or malformed input, an unknown packet type, or an
    /// unsupported protocol version.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let envelope: Self = rmp_serde::from_slice(bytes).map_err(CodecError::Deserialization)?;
        if envelope.version != PROTOCOL_VERSION {
            return Err(CodecError::UnsupportedVersion(envelope.version));
        }
        Ok(envelope)
    }

    /// Change the packet type, keeping the blobs.
    pub fn retag(mut self, packet_type: PacketType) -> Self {
        self.packet_type = packet_type;
        self
    }

    /// Decode the snapshot carried by a `Metadata` envelope.
    pub fn metadata_records(&self) -> Result<Vec<FileRecord>, CodecError> {
        self.expect_type(PacketType::Metadata)?;
        let blob = self
            .blobs
            .first()
            .ok_or_else(|| CodecError::Malformed("metadata envelope has no blobs".into()))?;
        Ok(serde_json::from_slice(&blob.decode()?)?)
    }

    /// Decode the diff manifest carried by a `Differences` envelope.
    pub fn diff_manifest(&self) -> Result<DiffResult, CodecError> {
        self.expect_type(PacketType::Differences)?;
        let blob = self
            .blobs
            .first()
            .ok_or_else(|| CodecError::Malformed("differences envelope has no manifest".into()))?;
        DiffResult::from_json(&blob.decode()?)
    }

    /// The file blobs of this envelope.
    ///
    /// For `Differences` this skips the manifest at index 0; for every other
    /// packet type all blobs are file blobs.
    pub fn data_blobs(&self) -> &[ContentBlob] {
        match self.packet_type {
            PacketType::Differences if !self.blobs.is_empty() => &self.blobs[1..],
            PacketType::Differences => &[],
            _ => &self.blobs,
        }
    }

    fn expect_type(&self, expected: PacketType) -> Result<(), CodecError> {
        if self.packet_type == expected {
            Ok(())
        } else {
            Err(CodecError::Malformed(format!(
                "expected {:?} envelope, got {:?}",
                expected, self.packet_type
            )))
        }
    }
}
