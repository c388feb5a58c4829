//! Binary reader for font data
//!
//! Big-endian, bounds-checked access to table bytes. Every read either
//! succeeds completely or fails with [`FontError::TruncatedStream`]; nothing
//! is ever zero-filled.

use crate::{FontError, Result};

/// Text encodings found in font string data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEncoding {
    /// UTF-16 big-endian (Unicode and Windows platform names)
    Utf16Be,
    /// Single-byte Latin-1 / ASCII (Macintosh names, Pascal strings)
    Latin1,
    /// UTF-8 (CFF name and string INDEX data)
    Utf8,
}

/// Binary reader with bounds checking
#[derive(Debug, Clone)]
pub struct FontReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FontReader<'a> {
    /// Create a new reader positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Create a reader positioned at `pos`
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    /// Get current position
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Set position (validated lazily by the next read)
    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Total length of the underlying buffer
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the underlying buffer is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes left after the cursor
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Underlying buffer
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.data.len());
        match end {
            Some(end) => {
                let bytes = &self.data[self.pos..end];
                self.pos = end;
                Ok(bytes)
            }
            None => Err(FontError::TruncatedStream {
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            }),
        }
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Skip bytes
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    /// Read u8
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    /// Read i8
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Read big-endian u16
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    /// Read big-endian i16
    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.array()?))
    }

    /// Read big-endian 24-bit unsigned integer
    pub fn read_u24(&mut self) -> Result<u32> {
        let [a, b, c] = self.array::<3>()?;
        Ok(u32::from_be_bytes([0, a, b, c]))
    }

    /// Read big-endian u32
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    /// Read big-endian i32
    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    /// Read big-endian u64
    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    /// Read big-endian i64
    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.array()?))
    }

    /// Read Fixed 16.16
    pub fn read_fixed(&mut self) -> Result<f64> {
        Ok(self.read_i32()? as f64 / 65536.0)
    }

    /// Read F2Dot14
    pub fn read_f2dot14(&mut self) -> Result<f64> {
        Ok(self.read_i16()? as f64 / 16384.0)
    }

    /// Read LONGDATETIME (seconds since 1904-01-01)
    pub fn read_long_datetime(&mut self) -> Result<i64> {
        self.read_i64()
    }

    /// Read a 4-byte tag
    pub fn read_tag(&mut self) -> Result<[u8; 4]> {
        self.array()
    }

    /// Read raw bytes
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    /// Read `byte_len` bytes and decode them as a string
    pub fn read_string(&mut self, byte_len: usize, encoding: StringEncoding) -> Result<String> {
        let bytes = self.take(byte_len)?;
        Ok(decode_string(bytes, encoding))
    }

    /// Read a Pascal string (length byte followed by Latin-1 bytes)
    pub fn read_pascal_string(&mut self) -> Result<String> {
        let len = self.read_u8()? as usize;
        self.read_string(len, StringEncoding::Latin1)
    }

    /// Read a WOFF2 UIntBase128 value
    pub fn read_uint_base128(&mut self) -> Result<u32> {
        let start = self.pos;
        let mut accum: u32 = 0;
        for i in 0..5 {
            let byte = self.read_u8()?;
            // Leading zeros are not allowed
            if i == 0 && byte == 0x80 {
                return Err(FontError::invalid("woff2", format!("UIntBase128 with leading zero at {start}")));
            }
            if accum & 0xFE00_0000 != 0 {
                return Err(FontError::invalid("woff2", format!("UIntBase128 overflow at {start}")));
            }
            accum = (accum << 7) | (byte & 0x7F) as u32;
            if byte & 0x80 == 0 {
                return Ok(accum);
            }
        }
        Err(FontError::invalid("woff2", format!("UIntBase128 longer than 5 bytes at {start}")))
    }

    /// Read a WOFF2 255UInt16 value
    pub fn read_255_uint16(&mut self) -> Result<u16> {
        const WORD_CODE: u8 = 253;
        const ONE_MORE_BYTE_CODE2: u8 = 254;
        const ONE_MORE_BYTE_CODE1: u8 = 255;
        const LOWEST_U_CODE: u16 = 253;

        let code = self.read_u8()?;
        match code {
            WORD_CODE => self.read_u16(),
            ONE_MORE_BYTE_CODE1 => Ok(self.read_u8()? as u16 + LOWEST_U_CODE),
            ONE_MORE_BYTE_CODE2 => Ok(self.read_u8()? as u16 + LOWEST_U_CODE * 2),
            _ => Ok(code as u16),
        }
    }

    /// Slice `len` bytes starting at absolute `offset` without moving the cursor
    pub fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        FontReader::at(self.data, offset).take(len)
    }

    /// Slice from the cursor to the end
    pub fn slice_from_here(&self) -> &'a [u8] {
        self.data.get(self.pos..).unwrap_or(&[])
    }
}

/// Decode string bytes with the given encoding
pub fn decode_string(bytes: &[u8], encoding: StringEncoding) -> String {
    match encoding {
        StringEncoding::Utf16Be => {
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        StringEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        StringEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
    }
}
