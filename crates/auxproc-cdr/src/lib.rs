#![deny(unsafe_code)]

//! Common data representation (CDR) codec for shared-variable values.
//!
//! A CDR record is a self-describing binary blob carrying one typed,
//! shaped array value across the process boundary between the host
//! interpreter and an auxiliary processor. The layout is a fixed
//! 20-byte little-endian header followed by the elements:
//!
//! ```text
//! ┌──────────┬──────────┬──────────┬──────┬──────┬─────┬───────────┐
//! │ reserved │    nb    │   nelm   │ type │ rank │ pad │ elements  │
//! │  4 bytes │  4 bytes │  4 bytes │  1   │  1   │  2  │ nelm × w  │
//! └──────────┴──────────┴──────────┴──────┴──────┴─────┴───────────┘
//! ```
//!
//! `nb` is the total record length including the header. The reserved
//! word is a legacy pointer slot and is always written as zero. Decoding
//! enforces `nb == 20 + nelm * width(type)` exactly; a record failing
//! that check is malformed and must not be interpreted further.
//!
//! All operations here are pure transformations; callers own every
//! mutation of variable state.

use std::fmt;

/// Size of the fixed record header in bytes.
pub const HEADER_LEN: usize = 20;

/// Errors from decoding or reinterpreting a CDR record.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CdrError {
    #[error("record too short: {0} bytes, header needs {HEADER_LEN}")]
    TooShort(usize),

    #[error("declared length {declared} disagrees with {expected}")]
    LengthMismatch { declared: u32, expected: u32 },

    #[error("unknown element type tag {0}")]
    BadType(u8),

    #[error("rank {0} not supported (scalars and vectors only)")]
    BadRank(u8),

    #[error("expected a {expected} record, found {found}")]
    WrongType {
        expected: ElemType,
        found: ElemType,
    },
}

/// Element type of a record, with its fixed per-element width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ElemType {
    /// One byte per element, values 0 or 1.
    Bool = 1,
    /// Little-endian 32-bit signed integer.
    Int32 = 2,
    /// One byte per element.
    Char = 3,
}

impl ElemType {
    /// Width of one element in bytes.
    pub fn width(self) -> usize {
        match self {
            ElemType::Bool => 1,
            ElemType::Int32 => 4,
            ElemType::Char => 1,
        }
    }

    /// Parse a wire type tag.
    pub fn from_tag(tag: u8) -> Result<Self, CdrError> {
        match tag {
            1 => Ok(ElemType::Bool),
            2 => Ok(ElemType::Int32),
            3 => Ok(ElemType::Char),
            other => Err(CdrError::BadType(other)),
        }
    }
}

impl fmt::Display for ElemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElemType::Bool => write!(f, "bool"),
            ElemType::Int32 => write!(f, "int32"),
            ElemType::Char => write!(f, "char"),
        }
    }
}

/// A validated CDR record.
///
/// Owns the full encoded byte image (header + elements). Header fields
/// are re-derived from the image on access so a `Record` can never
/// disagree with its own bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    bytes: Vec<u8>,
}

impl Record {
    /// Decode and validate a byte image.
    ///
    /// Rejects images shorter than the header, unknown type tags, ranks
    /// above 1, and any disagreement between the declared `nb`, the
    /// element count/width arithmetic, and the actual image length.
    pub fn decode(bytes: &[u8]) -> Result<Self, CdrError> {
        if bytes.len() < HEADER_LEN {
            return Err(CdrError::TooShort(bytes.len()));
        }
        let nb = read_u32(bytes, 4);
        let nelm = read_u32(bytes, 8);
        let elem_type = ElemType::from_tag(bytes[12])?;
        let rank = bytes[13];
        if rank > 1 {
            return Err(CdrError::BadRank(rank));
        }
        let expected = HEADER_LEN as u32 + nelm.saturating_mul(elem_type.width() as u32);
        if nb != expected || bytes.len() != nb as usize {
            return Err(CdrError::LengthMismatch {
                declared: nb,
                expected,
            });
        }
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }

    /// Build a record from raw parts, computing the header.
    pub fn encode(elem_type: ElemType, rank: u8, payload: &[u8]) -> Self {
        debug_assert!(rank <= 1);
        debug_assert_eq!(payload.len() % elem_type.width(), 0);
        let nelm = (payload.len() / elem_type.width()) as u32;
        let nb = (HEADER_LEN + payload.len()) as u32;
        let mut bytes = Vec::with_capacity(nb as usize);
        bytes.extend_from_slice(&0u32.to_le_bytes()); // reserved pointer word
        bytes.extend_from_slice(&nb.to_le_bytes());
        bytes.extend_from_slice(&nelm.to_le_bytes());
        bytes.push(elem_type as u8);
        bytes.push(rank);
        // Pad the header out to the fixed HEADER_LEN. Fields written so
        // far occupy 14 bytes (reserved 4 + nb 4 + nelm 4 + type 1 + rank 1).
        bytes.extend_from_slice(&[0u8; HEADER_LEN - 14]);
        bytes.extend_from_slice(payload);
        Self { bytes }
    }

    /// A character vector record from a string.
    pub fn chars(text: &str) -> Self {
        Self::encode(ElemType::Char, 1, text.as_bytes())
    }

    /// An int32 vector record.
    pub fn ints(values: &[i32]) -> Self {
        let mut payload = Vec::with_capacity(values.len() * 4);
        for v in values {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        Self::encode(ElemType::Int32, 1, &payload)
    }

    /// A boolean vector record.
    pub fn bools(values: &[bool]) -> Self {
        let payload: Vec<u8> = values.iter().map(|&b| b as u8).collect();
        Self::encode(ElemType::Bool, 1, &payload)
    }

    /// An int32 scalar record (rank 0).
    pub fn int_scalar(value: i32) -> Self {
        Self::encode(ElemType::Int32, 0, &value.to_le_bytes())
    }

    /// The fixed-shape acknowledgement record: a rank-1, one-element
    /// int32 vector whose sole element is the signed status.
    ///
    /// Every AP operation that does not produce a domain value writes
    /// one of these back into the control variable.
    pub fn ack(status: i32) -> Self {
        Self::ints(&[status])
    }

    /// Total record length including the header.
    pub fn nb(&self) -> u32 {
        read_u32(&self.bytes, 4)
    }

    /// Number of elements.
    pub fn nelm(&self) -> u32 {
        read_u32(&self.bytes, 8)
    }

    /// Element type.
    pub fn elem_type(&self) -> ElemType {
        // Validated in decode / fixed in encode.
        match ElemType::from_tag(self.bytes[12]) {
            Ok(t) => t,
            Err(_) => unreachable!("record constructed with a valid tag"),
        }
    }

    /// Rank: 0 = scalar, 1 = vector.
    pub fn rank(&self) -> u8 {
        self.bytes[13]
    }

    /// Element bytes, without the header.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[HEADER_LEN..]
    }

    /// The full encoded image.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume into the encoded image.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// The payload of a char record as text (lossy UTF-8).
    pub fn text(&self) -> Result<String, CdrError> {
        if self.elem_type() != ElemType::Char {
            return Err(CdrError::WrongType {
                expected: ElemType::Char,
                found: self.elem_type(),
            });
        }
        Ok(String::from_utf8_lossy(self.payload()).into_owned())
    }

    /// The elements of a numeric record (bool or int32), widened to i64.
    pub fn numbers(&self) -> Result<Vec<i64>, CdrError> {
        match self.elem_type() {
            ElemType::Bool => Ok(self.payload().iter().map(|&b| i64::from(b)).collect()),
            ElemType::Int32 => Ok(self
                .payload()
                .chunks_exact(4)
                .map(|c| i64::from(i32::from_le_bytes([c[0], c[1], c[2], c[3]])))
                .collect()),
            found @ ElemType::Char => Err(CdrError::WrongType {
                expected: ElemType::Int32,
                found,
            }),
        }
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Peek at the declared total length of a record image without full
/// validation. Used when walking length-prefixed record frames in a
/// file: each frame's declared length is trusted to skip its body.
pub fn frame_len(header: &[u8]) -> Result<u32, CdrError> {
    if header.len() < HEADER_LEN {
        return Err(CdrError::TooShort(header.len()));
    }
    let nb = read_u32(header, 4);
    if (nb as usize) < HEADER_LEN {
        return Err(CdrError::LengthMismatch {
            declared: nb,
            expected: HEADER_LEN as u32,
        });
    }
    Ok(nb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_trip_chars() {
        let rec = Record::chars("echo hi");
        let decoded = Record::decode(rec.as_bytes()).unwrap();
        assert_eq!(decoded.elem_type(), ElemType::Char);
        assert_eq!(decoded.rank(), 1);
        assert_eq!(decoded.nelm(), 7);
        assert_eq!(decoded.nb(), 27);
        assert_eq!(decoded.text().unwrap(), "echo hi");
    }

    #[test]
    fn test_round_trip_ints() {
        let rec = Record::ints(&[4, -1, 100_000]);
        let decoded = Record::decode(rec.as_bytes()).unwrap();
        assert_eq!(decoded.nelm(), 3);
        assert_eq!(decoded.numbers().unwrap(), vec![4, -1, 100_000]);
    }

    #[test]
    fn test_round_trip_bools() {
        let rec = Record::bools(&[true, false, true]);
        let decoded = Record::decode(rec.as_bytes()).unwrap();
        assert_eq!(decoded.elem_type(), ElemType::Bool);
        assert_eq!(decoded.numbers().unwrap(), vec![1, 0, 1]);
    }

    #[test]
    fn test_round_trip_scalar() {
        let rec = Record::int_scalar(-7);
        let decoded = Record::decode(rec.as_bytes()).unwrap();
        assert_eq!(decoded.rank(), 0);
        assert_eq!(decoded.nelm(), 1);
        assert_eq!(decoded.numbers().unwrap(), vec![-7]);
    }

    #[test]
    fn test_round_trip_empty_vector() {
        let rec = Record::ints(&[]);
        let decoded = Record::decode(rec.as_bytes()).unwrap();
        assert_eq!(decoded.nelm(), 0);
        assert_eq!(decoded.nb(), HEADER_LEN as u32);
        assert!(decoded.numbers().unwrap().is_empty());
    }

    #[test]
    fn test_ack_shape() {
        // Must be rank 1, one int32 element, equal to the status exactly.
        for status in [0, 1, -1, i32::MIN, i32::MAX] {
            let ack = Record::ack(status);
            let decoded = Record::decode(ack.as_bytes()).unwrap();
            assert_eq!(decoded.elem_type(), ElemType::Int32);
            assert_eq!(decoded.rank(), 1);
            assert_eq!(decoded.nelm(), 1);
            assert_eq!(decoded.numbers().unwrap(), vec![i64::from(status)]);
        }
    }

    #[test]
    fn test_reject_short_input() {
        for len in 0..HEADER_LEN {
            let bytes = vec![0u8; len];
            assert_eq!(Record::decode(&bytes), Err(CdrError::TooShort(len)));
        }
    }

    #[test]
    fn test_reject_length_mismatch() {
        let mut bytes = Record::ints(&[1, 2]).into_bytes();
        // Corrupt the declared length.
        bytes[4] = bytes[4].wrapping_add(1);
        assert!(matches!(
            Record::decode(&bytes),
            Err(CdrError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_reject_truncated_payload() {
        let mut bytes = Record::ints(&[1, 2]).into_bytes();
        bytes.truncate(bytes.len() - 1);
        assert!(matches!(
            Record::decode(&bytes),
            Err(CdrError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_reject_trailing_garbage() {
        let mut bytes = Record::chars("x").into_bytes();
        bytes.push(0);
        assert!(matches!(
            Record::decode(&bytes),
            Err(CdrError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_reject_bad_rank() {
        let mut bytes = Record::ints(&[1]).into_bytes();
        bytes[13] = 2;
        assert_eq!(Record::decode(&bytes), Err(CdrError::BadRank(2)));
    }

    #[test]
    fn test_reject_unknown_type_tag() {
        let mut bytes = Record::ints(&[1]).into_bytes();
        bytes[12] = 9;
        assert_eq!(Record::decode(&bytes), Err(CdrError::BadType(9)));
    }

    #[test]
    fn test_text_on_numeric_record() {
        let rec = Record::ints(&[1]);
        assert!(matches!(rec.text(), Err(CdrError::WrongType { .. })));
    }

    #[test]
    fn test_numbers_on_char_record() {
        let rec = Record::chars("abc");
        assert!(matches!(rec.numbers(), Err(CdrError::WrongType { .. })));
    }

    #[test]
    fn test_frame_len() {
        let rec = Record::chars("hello");
        assert_eq!(frame_len(rec.as_bytes()).unwrap(), rec.nb());
        assert!(frame_len(&[0u8; 4]).is_err());
    }

    #[test]
    fn test_frame_len_rejects_undersized_declaration() {
        let mut bytes = Record::ints(&[]).into_bytes();
        bytes[4] = 3;
        bytes[5] = 0;
        bytes[6] = 0;
        bytes[7] = 0;
        assert!(frame_len(&bytes).is_err());
    }

    #[test]
    fn test_little_endian_layout() {
        let rec = Record::ints(&[0x0102_0304]);
        let bytes = rec.as_bytes();
        // nb = 24 at offset 4, little-endian
        assert_eq!(&bytes[4..8], &[24, 0, 0, 0]);
        // nelm = 1 at offset 8
        assert_eq!(&bytes[8..12], &[1, 0, 0, 0]);
        // element little-endian
        assert_eq!(&bytes[HEADER_LEN..], &[0x04, 0x03, 0x02, 0x01]);
    }
}
