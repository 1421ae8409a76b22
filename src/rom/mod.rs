/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! The ROM binary format: the 16-byte header and the debug-metadata frame
//! encoding shared by the assembler (emission), the runner (skipping), and
//! the disassembler (rendering).

use thiserror::Error;

pub const ROM_SIZE: usize = 65536;
pub const HEADER_BYTES: usize = 16;
pub const PADDING_BYTE: u8 = 0xCC;
pub const MAGIC: [u8; 4] = *b"H6VM";
pub const LANGUAGE_VERSION: u16 = 1;

pub const DEBUG_METADATA_SIGNAL_BYTE: u8 = crate::isa::constants::DEBUG_METADATA_SIGNAL_OPCODE;

#[derive(Error, Debug, PartialEq)]
pub enum HeaderError {
    #[error("ROM too short for a header: expected {HEADER_BYTES} bytes, got {0}")]
    TooShort(usize),
    #[error("wrong magic number: expected {MAGIC:?}, got {0:?}")]
    WrongMagic([u8; 4]),
    #[error("unsupported language version: {0}")]
    VersionMismatch(u16),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Header {
    pub language_version: u16,
    pub entry_point: u16,
    pub debug_mode: bool,
}

impl Header {
    pub fn new(entry_point: u16, debug_mode: bool) -> Self {
        Self {
            language_version: LANGUAGE_VERSION,
            entry_point,
            debug_mode,
        }
    }

    /// Parses the first `HEADER_BYTES` of a ROM image.
    pub fn parse(bytes: &[u8]) -> Result<Header, HeaderError> {
        if bytes.len() < HEADER_BYTES {
            return Err(HeaderError::TooShort(bytes.len()));
        }

        let magic: [u8; 4] = bytes[0..4].try_into().unwrap();
        if magic != MAGIC {
            return Err(HeaderError::WrongMagic(magic));
        }

        let language_version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if language_version != LANGUAGE_VERSION {
            return Err(HeaderError::VersionMismatch(language_version));
        }

        let entry_point = u16::from_le_bytes([bytes[6], bytes[7]]);
        let debug_mode = bytes[8] != 0;

        Ok(Header {
            language_version,
            entry_point,
            debug_mode,
        })
    }

    /// Serializes into exactly `HEADER_BYTES` bytes, little-endian, with the
    /// reserved tail zeroed.
    pub fn serialize(&self) -> [u8; HEADER_BYTES] {
        let mut out = [0u8; HEADER_BYTES];
        out[0..4].copy_from_slice(&MAGIC);
        out[4..6].copy_from_slice(&self.language_version.to_le_bytes());
        out[6..8].copy_from_slice(&self.entry_point.to_le_bytes());
        out[8] = self.debug_mode as u8;
        out
    }
}

/// The one debug-metadata frame kind the core format defines today.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DebugMetadataType {
    LabelName,
}

impl DebugMetadataType {
    pub fn to_byte(self) -> u8 {
        match self {
            DebugMetadataType::LabelName => 0,
        }
    }

    pub fn decode(byte: u8) -> Option<DebugMetadataType> {
        match byte {
            0 => Some(DebugMetadataType::LabelName),
            _ => None,
        }
    }

    /// Given the bytes starting at a frame's opening
    /// `DEBUG_METADATA_SIGNAL` byte, returns the frame's total length
    /// (both signal bytes included) by scanning for the closing signal.
    ///
    /// Frame layout: `SIGNAL, type, payload..., SIGNAL`.
    pub fn payload_length(frame_bytes: &[u8]) -> Result<usize, BadMetadata> {
        if frame_bytes.len() < 3 || frame_bytes[0] != DEBUG_METADATA_SIGNAL_BYTE {
            return Err(BadMetadata::Truncated);
        }

        let _ty = DebugMetadataType::decode(frame_bytes[1]).ok_or(BadMetadata::UnknownType)?;

        match frame_bytes[2..]
            .iter()
            .position(|&b| b == DEBUG_METADATA_SIGNAL_BYTE)
        {
            Some(offset) => Ok(offset + 3),
            None => Err(BadMetadata::UnterminatedFrame),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum BadMetadata {
    #[error("debug metadata frame truncated before its type byte")]
    Truncated,
    #[error("unknown debug metadata frame type")]
    UnknownType,
    #[error("debug metadata frame missing its closing signal byte")]
    UnterminatedFrame,
}

/// Writes a `LABEL_NAME` frame (open signal, type byte, raw name bytes,
/// close signal) into `out`.
pub fn emit_label_name_frame(out: &mut Vec<u8>, name: &str) {
    out.push(DEBUG_METADATA_SIGNAL_BYTE);
    out.push(DebugMetadataType::LabelName.to_byte());
    out.extend_from_slice(name.as_bytes());
    out.push(DEBUG_METADATA_SIGNAL_BYTE);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let hdr = Header::new(0x1234, true);
        let bytes = hdr.serialize();
        let parsed = Header::parse(&bytes).unwrap();
        assert_eq!(hdr, parsed);
    }

    #[test]
    fn header_rejects_wrong_magic() {
        let mut bytes = Header::new(0, false).serialize();
        bytes[0] = b'X';
        assert_eq!(
            Header::parse(&bytes).unwrap_err(),
            HeaderError::WrongMagic([b'X', b'6', b'V', b'M'])
        );
    }

    #[test]
    fn label_name_frame_length_includes_both_signals() {
        let mut buf = Vec::new();
        emit_label_name_frame(&mut buf, "Fibonacci");
        assert_eq!(
            DebugMetadataType::payload_length(&buf).unwrap(),
            "Fibonacci".len() + 3
        );
    }
}
