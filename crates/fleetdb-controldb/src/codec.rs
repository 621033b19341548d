//! On-disk record codec
//!
//! Every snapshot in a version log is one framed record:
//!
//! ```text
//! +--------+------+--------+---------+--------+
//! | Magic  | Kind | Length | Payload | CRC32C |
//! | 4B     | 1B   | 4B     | var     | 4B     |
//! +--------+------+--------+---------+--------+
//! ```
//!
//! Little-endian integers; the payload is the bincode encoding of the
//! entity; the CRC covers everything before the trailer. The kind byte
//! ties a file to its entity type, so a member snapshot can never be
//! decoded as a service attribute after a layout bug or a bad copy.

use fleetdb_common::{ConfigFile, Device, Service, ServiceAttr, ServiceMember};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Record frame magic number
const RECORD_MAGIC: u32 = 0x464C_4452; // "FLDR"

/// Magic + kind + length
const FRAME_HEADER_SIZE: usize = 9;

/// Entity kind tag stored in each record frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    Device = 1,
    Service = 2,
    ServiceAttr = 3,
    ServiceMember = 4,
    ConfigFile = 5,
}

impl RecordKind {
    fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Device),
            2 => Some(Self::Service),
            3 => Some(Self::ServiceAttr),
            4 => Some(Self::ServiceMember),
            5 => Some(Self::ConfigFile),
            _ => None,
        }
    }
}

/// Codec error; always indicates corruption or a codec-level bug, never
/// a client request problem.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("record frame too small")]
    Truncated,

    #[error("invalid record magic")]
    BadMagic,

    #[error("unknown record kind: {0}")]
    UnknownKind(u8),

    #[error("record kind mismatch: expected {expected:?}, got {actual:?}")]
    KindMismatch {
        expected: RecordKind,
        actual: RecordKind,
    },

    #[error("record checksum mismatch")]
    ChecksumMismatch,

    #[error("record encoding error: {0}")]
    Bincode(#[from] bincode::Error),
}

/// A type that can live in a version log.
///
/// `semantic_eq` is the timestamp-excluded comparison the CAS protocol
/// uses; it is implemented per entity, never as generic structural
/// equality, so retries that regenerated the timestamp are not
/// misdiagnosed as conflicts.
pub trait LogRecord:
    Serialize + DeserializeOwned + Clone + Send + Sync + 'static
{
    const KIND: RecordKind;

    /// Equality for the CAS comparison (update timestamp excluded).
    fn semantic_eq(&self, other: &Self) -> bool;

    /// The record's own key, for log messages.
    fn key_id(&self) -> String;
}

impl LogRecord for Device {
    const KIND: RecordKind = RecordKind::Device;

    fn semantic_eq(&self, other: &Self) -> bool {
        // no timestamp field; exact equality
        self == other
    }

    fn key_id(&self) -> String {
        format!("{}/{}", self.cluster_name, self.device_name)
    }
}

impl LogRecord for Service {
    const KIND: RecordKind = RecordKind::Service;

    fn semantic_eq(&self, other: &Self) -> bool {
        self == other
    }

    fn key_id(&self) -> String {
        format!("{}/{}", self.cluster_name, self.service_name)
    }
}

impl LogRecord for ServiceAttr {
    const KIND: RecordKind = RecordKind::ServiceAttr;

    fn semantic_eq(&self, other: &Self) -> bool {
        self.semantic_eq(other, true)
    }

    fn key_id(&self) -> String {
        self.service_uuid.clone()
    }
}

impl LogRecord for ServiceMember {
    const KIND: RecordKind = RecordKind::ServiceMember;

    fn semantic_eq(&self, other: &Self) -> bool {
        self.semantic_eq(other, true)
    }

    fn key_id(&self) -> String {
        format!("{}/{}", self.service_uuid, self.member_name)
    }
}

impl LogRecord for ConfigFile {
    const KIND: RecordKind = RecordKind::ConfigFile;

    fn semantic_eq(&self, other: &Self) -> bool {
        self.semantic_eq(other, true, false)
    }

    fn key_id(&self) -> String {
        format!("{}/{}", self.service_uuid, self.file_id)
    }
}

/// Encode a record into a framed byte buffer.
pub fn encode_record<R: LogRecord>(record: &R) -> Result<Vec<u8>, CodecError> {
    let payload = bincode::serialize(record)?;

    let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len() + 4);
    buf.extend_from_slice(&RECORD_MAGIC.to_le_bytes());
    buf.push(R::KIND as u8);
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(&payload);

    let crc = crc32c::crc32c(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());

    Ok(buf)
}

/// Decode a framed record, verifying magic, kind and checksum.
pub fn decode_record<R: LogRecord>(data: &[u8]) -> Result<R, CodecError> {
    if data.len() < FRAME_HEADER_SIZE + 4 {
        return Err(CodecError::Truncated);
    }

    let magic = u32::from_le_bytes(data[0..4].try_into().unwrap());
    if magic != RECORD_MAGIC {
        return Err(CodecError::BadMagic);
    }

    let kind = RecordKind::from_u8(data[4]).ok_or(CodecError::UnknownKind(data[4]))?;
    if kind != R::KIND {
        return Err(CodecError::KindMismatch {
            expected: R::KIND,
            actual: kind,
        });
    }

    let payload_len = u32::from_le_bytes(data[5..9].try_into().unwrap()) as usize;
    let total_len = FRAME_HEADER_SIZE + payload_len + 4;
    if data.len() < total_len {
        return Err(CodecError::Truncated);
    }

    let stored_crc = u32::from_le_bytes(
        data[FRAME_HEADER_SIZE + payload_len..total_len]
            .try_into()
            .unwrap(),
    );
    let computed_crc = crc32c::crc32c(&data[..FRAME_HEADER_SIZE + payload_len]);
    if computed_crc != stored_crc {
        return Err(CodecError::ChecksumMismatch);
    }

    let record = bincode::deserialize(&data[FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + payload_len])?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> Device {
        Device::new("cluster-a", "/dev/xvdf", "postgres")
    }

    #[test]
    fn test_record_roundtrip() {
        let dev = device();
        let bytes = encode_record(&dev).unwrap();
        let decoded: Device = decode_record(&bytes).unwrap();
        assert_eq!(dev, decoded);
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let dev = device();
        let bytes = encode_record(&dev).unwrap();
        let decoded: Result<Service, _> = decode_record(&bytes);
        assert!(matches!(decoded, Err(CodecError::KindMismatch { .. })));
    }

    #[test]
    fn test_corruption_detected() {
        let dev = device();
        let mut bytes = encode_record(&dev).unwrap();
        // flip a payload byte
        let idx = bytes.len() / 2;
        bytes[idx] ^= 0xFF;
        let decoded: Result<Device, _> = decode_record(&bytes);
        assert!(matches!(decoded, Err(CodecError::ChecksumMismatch)));
    }

    #[test]
    fn test_truncated_rejected() {
        let dev = device();
        let bytes = encode_record(&dev).unwrap();
        let decoded: Result<Device, _> = decode_record(&bytes[..bytes.len() - 2]);
        assert!(matches!(decoded, Err(CodecError::Truncated)));
    }

    #[test]
    fn test_bad_magic_rejected() {
        let dev = device();
        let mut bytes = encode_record(&dev).unwrap();
        bytes[0] ^= 0xFF;
        let decoded: Result<Device, _> = decode_record(&bytes);
        assert!(matches!(decoded, Err(CodecError::BadMagic)));
    }

    #[test]
    fn test_semantic_eq_skips_mtime() {
        let attr = ServiceAttr::new_initial(
            "uuid-1", 3, 10, "cluster-a", "postgres", "/dev/xvdf", false, "", "",
        );
        let mut retried = attr.clone();
        retried.last_modified += 42;
        assert!(LogRecord::semantic_eq(&attr, &retried));
        retried.service_status = "ACTIVE".to_string();
        assert!(!LogRecord::semantic_eq(&attr, &retried));
    }
}
