//! `55AA` message framing.
//!
//! ```text
//! 000055AA | seq u32 | command u32 | length u32 | payload | crc32 u32 | 0000AA55
//! ```
//!
//! All integers are big endian. `length` counts the payload plus the trailer,
//! and the CRC covers everything before it.

use crate::errors::Error;

use super::Result;

pub(crate) const PREFIX_55AA: [u8; 4] = [0x00, 0x00, 0x55, 0xAA];
pub(crate) const PREFIX_6699: [u8; 4] = [0x00, 0x00, 0x66, 0x99];
const SUFFIX: [u8; 4] = [0x00, 0x00, 0xAA, 0x55];

pub(crate) const HEADER_LEN: usize = 16;
pub(crate) const TRAILER_LEN: usize = 8;
/// Bytes of header plus return code in front of a device reply's payload.
pub(crate) const REPLY_OFFSET: usize = HEADER_LEN + 4;
const MAX_LENGTH: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub(crate) enum Command {
    Control = 7,
    DpQuery = 10,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Frame {
    pub seq: u32,
    pub command: u32,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(seq: u32, command: Command, payload: Vec<u8>) -> Self {
        Frame {
            seq,
            command: command as u32,
            payload,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let length = (self.payload.len() + TRAILER_LEN) as u32;
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len() + TRAILER_LEN);
        out.extend_from_slice(&PREFIX_55AA);
        out.extend_from_slice(&self.seq.to_be_bytes());
        out.extend_from_slice(&self.command.to_be_bytes());
        out.extend_from_slice(&length.to_be_bytes());
        out.extend_from_slice(&self.payload);
        let crc = crc32fast::hash(&out);
        out.extend_from_slice(&crc.to_be_bytes());
        out.extend_from_slice(&SUFFIX);
        out
    }

    /// Parse a header, returning `(seq, command, remaining length)`.
    pub fn parse_header(header: &[u8; HEADER_LEN]) -> Result<(u32, u32, usize)> {
        if header[..4] != PREFIX_55AA {
            return Err(Error::malformed(format!("unexpected frame prefix {:02x?}", &header[..4])));
        }
        let word = |at: usize| u32::from_be_bytes([header[at], header[at + 1], header[at + 2], header[at + 3]]);
        let length = word(12) as usize;
        if !(TRAILER_LEN..=MAX_LENGTH).contains(&length) {
            return Err(Error::malformed(format!("frame length {length} out of range")));
        }
        Ok((word(4), word(8), length))
    }

    /// Rebuild a frame from its header and the `length` bytes that follow it.
    pub fn decode(header: &[u8; HEADER_LEN], rest: &[u8]) -> Result<Self> {
        let (seq, command, length) = Self::parse_header(header)?;
        if rest.len() != length {
            return Err(Error::malformed(format!(
                "frame body is {} bytes, header says {length}",
                rest.len()
            )));
        }

        let (payload, trailer) = rest.split_at(length - TRAILER_LEN);
        if trailer[4..] != SUFFIX {
            return Err(Error::malformed("missing frame suffix"));
        }

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(header);
        hasher.update(payload);
        let expected = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        if hasher.finalize() != expected {
            return Err(Error::malformed("frame crc mismatch"));
        }

        Ok(Frame {
            seq,
            command,
            payload: payload.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(bytes: &[u8]) -> ([u8; HEADER_LEN], &[u8]) {
        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&bytes[..HEADER_LEN]);
        (header, &bytes[HEADER_LEN..])
    }

    #[test]
    fn encodes_header_and_trailer() {
        let bytes = Frame::new(1, Command::DpQuery, vec![0xAB; 3]).encode();
        assert_eq!(&bytes[..4], &PREFIX_55AA);
        assert_eq!(&bytes[8..12], &10u32.to_be_bytes());
        assert_eq!(&bytes[12..16], &11u32.to_be_bytes());
        assert_eq!(&bytes[bytes.len() - 4..], &SUFFIX);
        assert_eq!(bytes.len(), HEADER_LEN + 3 + TRAILER_LEN);
    }

    #[test]
    fn decodes_what_it_encodes() {
        let frame = Frame::new(42, Command::Control, b"payload".to_vec());
        let bytes = frame.encode();
        let (header, rest) = split(&bytes);
        assert_eq!(Frame::decode(&header, rest).unwrap(), frame);
    }

    #[test]
    fn detects_corruption() {
        let mut bytes = Frame::new(42, Command::Control, b"payload".to_vec()).encode();
        bytes[HEADER_LEN] ^= 0xFF;
        let (header, rest) = split(&bytes);
        assert!(matches!(Frame::decode(&header, rest), Err(Error::MalformedPayload(_))));
    }

    #[test]
    fn rejects_foreign_prefix() {
        let mut header = [0u8; HEADER_LEN];
        header[..4].copy_from_slice(&PREFIX_6699);
        assert!(Frame::parse_header(&header).is_err());
    }
}
