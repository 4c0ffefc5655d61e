//! PDU (protocol data unit) framing: fixed header, payload, optional data.
//!
//! Payload structs are packed with no padding and little-endian native
//! integers (the protocol is local-only, so no network byte order concerns
//! apply). This module hand-rolls the byte layout rather than going through
//! `serde`/`bincode`, building the wire format by hand with explicit
//! `to_le_bytes`/`from_le_bytes` calls around a fixed five-field header.

use crate::errors::EngineError;

/// Fixed protocol version. A peer observing a mismatched version tears the
/// connection down without delivering the PDU.
pub const PDU_VERSION: u16 = 1;

pub const HEADER_LEN: usize = 2 + 4 + 2 + 4 + 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PduHeader {
    pub opcode: u16,
    pub payload_size: u32,
    pub version: u16,
    pub optional_data_size: u32,
    pub optional_data_attributes: u32,
}

impl PduHeader {
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..2].copy_from_slice(&self.opcode.to_le_bytes());
        buf[2..6].copy_from_slice(&self.payload_size.to_le_bytes());
        buf[6..8].copy_from_slice(&self.version.to_le_bytes());
        buf[8..12].copy_from_slice(&self.optional_data_size.to_le_bytes());
        buf[12..16].copy_from_slice(&self.optional_data_attributes.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        debug_assert!(buf.len() >= HEADER_LEN);
        PduHeader {
            opcode: u16::from_le_bytes([buf[0], buf[1]]),
            payload_size: u32::from_le_bytes([buf[2], buf[3], buf[4], buf[5]]),
            version: u16::from_le_bytes([buf[6], buf[7]]),
            optional_data_size: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
            optional_data_attributes: u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]),
        }
    }
}

/// A complete protocol data unit: header, payload, and optional trailing
/// data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    pub opcode: u16,
    pub payload: Vec<u8>,
    pub optional_data: Vec<u8>,
    pub optional_data_attributes: u32,
}

impl Pdu {
    pub fn new(opcode: u16, payload: Vec<u8>) -> Self {
        Pdu {
            opcode,
            payload,
            optional_data: Vec::new(),
            optional_data_attributes: 0,
        }
    }

    pub fn header(&self) -> PduHeader {
        PduHeader {
            opcode: self.opcode,
            payload_size: self.payload.len() as u32,
            version: PDU_VERSION,
            optional_data_size: self.optional_data.len() as u32,
            optional_data_attributes: self.optional_data_attributes,
        }
    }

    /// Serializes header + payload + optional data into one contiguous
    /// buffer for the send task to write out in one call.
    pub fn encode(&self) -> Vec<u8> {
        let header = self.header();
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len() + self.optional_data.len());
        out.extend_from_slice(&header.to_bytes());
        out.extend_from_slice(&self.payload);
        out.extend_from_slice(&self.optional_data);
        out
    }

    /// Attempts to decode one complete PDU from the front of `buf`.
    ///
    /// Returns:
    /// - `Ok(None)` if `buf` does not yet hold a complete header+body.
    /// - `Ok(Some((pdu, consumed)))` on success, where `consumed` is the
    ///   number of bytes of `buf` the PDU occupied.
    /// - `Err(EngineError::PDUVersionInvalid)` if a complete header is
    ///   present but its version does not match [`PDU_VERSION`] — the caller
    ///   must tear down the connection without delivering anything.
    pub fn try_decode(buf: &[u8]) -> Result<Option<(Pdu, usize)>, EngineError> {
        if buf.len() < HEADER_LEN {
            return Ok(None);
        }
        let header = PduHeader::from_bytes(&buf[..HEADER_LEN]);
        if header.version != PDU_VERSION {
            return Err(EngineError::PDUVersionInvalid);
        }
        let body_len = header.payload_size as usize + header.optional_data_size as usize;
        let total = HEADER_LEN + body_len;
        if buf.len() < total {
            return Ok(None);
        }
        let payload = buf[HEADER_LEN..HEADER_LEN + header.payload_size as usize].to_vec();
        let optional_data = buf[HEADER_LEN + header.payload_size as usize..total].to_vec();
        Ok(Some((
            Pdu {
                opcode: header.opcode,
                payload,
                optional_data,
                optional_data_attributes: header.optional_data_attributes,
            },
            total,
        )))
    }
}

/// Writes `s` into a fixed-size, zero-padded buffer of length `N`, as the
/// Param/Status/ControlRes/InfoRes string fields require. Silently truncates
/// a string longer than `N - 1` bytes so the buffer always stays
/// NUL-terminated, mirroring a fixed `char[N]` buffer which has no way to
/// signal "too long" other than truncation.
pub fn write_fixed_string<const N: usize>(s: &str) -> [u8; N] {
    let mut buf = [0u8; N];
    let bytes = s.as_bytes();
    let len = bytes.len().min(N - 1);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

/// Reads a NUL-terminated (or fully-occupied) fixed-size string buffer back
/// into an owned `String`, lossily, as a C string would be decoded.
pub fn read_fixed_string(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let header = PduHeader {
            opcode: 3,
            payload_size: 10,
            version: PDU_VERSION,
            optional_data_size: 2,
            optional_data_attributes: 7,
        };
        let bytes = header.to_bytes();
        assert_eq!(PduHeader::from_bytes(&bytes), header);
    }

    #[test]
    fn pdu_round_trips_with_optional_data() {
        let mut pdu = Pdu::new(5, vec![1, 2, 3, 4]);
        pdu.optional_data = vec![9, 9];
        let encoded = pdu.encode();
        let (decoded, consumed) = Pdu::try_decode(&encoded).unwrap().unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded, pdu);
    }

    #[test]
    fn incomplete_buffer_yields_none() {
        let pdu = Pdu::new(1, vec![0; 100]);
        let encoded = pdu.encode();
        assert_eq!(Pdu::try_decode(&encoded[..HEADER_LEN + 5]).unwrap(), None);
    }

    #[test]
    fn version_mismatch_errors_without_delivering() {
        let mut header = PduHeader {
            opcode: 1,
            payload_size: 0,
            version: PDU_VERSION,
            optional_data_size: 0,
            optional_data_attributes: 0,
        };
        header.version = PDU_VERSION + 1;
        let bytes = header.to_bytes();
        assert_eq!(Pdu::try_decode(&bytes), Err(EngineError::PDUVersionInvalid));
    }

    #[test]
    fn fixed_string_round_trips() {
        let buf = write_fixed_string::<16>("hello");
        assert_eq!(read_fixed_string(&buf), "hello");
    }

    #[test]
    fn fixed_string_truncates_overlong_input() {
        let buf = write_fixed_string::<4>("hello");
        assert_eq!(read_fixed_string(&buf), "hel");
    }

    #[test]
    fn trailing_bytes_after_one_pdu_are_left_for_the_next() {
        let pdu_a = Pdu::new(1, vec![1, 2]);
        let pdu_b = Pdu::new(2, vec![3, 4, 5]);
        let mut combined = pdu_a.encode();
        combined.extend_from_slice(&pdu_b.encode());

        let (decoded_a, consumed_a) = Pdu::try_decode(&combined).unwrap().unwrap();
        assert_eq!(decoded_a, pdu_a);
        let (decoded_b, consumed_b) = Pdu::try_decode(&combined[consumed_a..]).unwrap().unwrap();
        assert_eq!(decoded_b, pdu_b);
        assert_eq!(consumed_a + consumed_b, combined.len());
    }
}
