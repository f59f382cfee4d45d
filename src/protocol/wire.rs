//! Java `DataOutputStream` / `DataInputStream` encoding.
//!
//! Numbers are big-endian, booleans one byte, `char` an unsigned 16-bit
//! code unit. Strings use `writeUTF`: a `u16` byte length followed by
//! modified UTF-8, where NUL takes two bytes and supplementary characters
//! are written as two encoded surrogates. Nullable strings are prefixed
//! with a `short` marker, 0 for null and 1 for present.

use std::io::{Read, Write};

use super::ProtocolError;

/// Largest encoded length `writeUTF` accepts.
pub const MAX_UTF_LENGTH: usize = u16::MAX as usize;

pub trait DataOutput: Write {
    fn write_bool(&mut self, value: bool) -> Result<(), ProtocolError> {
        self.write_all(&[u8::from(value)])?;
        Ok(())
    }

    fn write_i8(&mut self, value: i8) -> Result<(), ProtocolError> {
        self.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    fn write_i16(&mut self, value: i16) -> Result<(), ProtocolError> {
        self.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    fn write_char(&mut self, value: u16) -> Result<(), ProtocolError> {
        self.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    fn write_i32(&mut self, value: i32) -> Result<(), ProtocolError> {
        self.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    fn write_i64(&mut self, value: i64) -> Result<(), ProtocolError> {
        self.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    fn write_f32(&mut self, value: f32) -> Result<(), ProtocolError> {
        self.write_all(&value.to_bits().to_be_bytes())?;
        Ok(())
    }

    fn write_f64(&mut self, value: f64) -> Result<(), ProtocolError> {
        self.write_all(&value.to_bits().to_be_bytes())?;
        Ok(())
    }

    fn write_utf(&mut self, text: &str) -> Result<(), ProtocolError> {
        let encoded = encode_modified_utf8(text);
        if encoded.len() > MAX_UTF_LENGTH {
            return Err(ProtocolError::StringTooLong(encoded.len()));
        }
        self.write_all(&(encoded.len() as u16).to_be_bytes())?;
        self.write_all(&encoded)?;
        Ok(())
    }

    fn write_string(&mut self, text: Option<&str>) -> Result<(), ProtocolError> {
        match text {
            None => self.write_i16(0),
            Some(text) => {
                self.write_i16(1)?;
                self.write_utf(text)
            }
        }
    }
}

impl<W: Write + ?Sized> DataOutput for W {}

pub trait DataInput: Read {
    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut buf = [0u8; N];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.read_array::<1>()?[0] != 0)
    }

    fn read_i8(&mut self) -> Result<i8, ProtocolError> {
        Ok(i8::from_be_bytes(self.read_array()?))
    }

    fn read_i16(&mut self) -> Result<i16, ProtocolError> {
        Ok(i16::from_be_bytes(self.read_array()?))
    }

    fn read_char(&mut self) -> Result<u16, ProtocolError> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    fn read_i64(&mut self) -> Result<i64, ProtocolError> {
        Ok(i64::from_be_bytes(self.read_array()?))
    }

    fn read_f32(&mut self) -> Result<f32, ProtocolError> {
        Ok(f32::from_bits(u32::from_be_bytes(self.read_array()?)))
    }

    fn read_f64(&mut self) -> Result<f64, ProtocolError> {
        Ok(f64::from_bits(u64::from_be_bytes(self.read_array()?)))
    }

    fn read_utf(&mut self) -> Result<String, ProtocolError> {
        let len = u16::from_be_bytes(self.read_array()?) as usize;
        let mut bytes = vec![0u8; len];
        self.read_exact(&mut bytes)?;
        decode_modified_utf8(&bytes)
    }

    fn read_string(&mut self) -> Result<Option<String>, ProtocolError> {
        match self.read_i16()? {
            0 => Ok(None),
            _ => self.read_utf().map(Some),
        }
    }
}

impl<R: Read + ?Sized> DataInput for R {}

pub fn encode_modified_utf8(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for unit in text.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

pub fn decode_modified_utf8(bytes: &[u8]) -> Result<String, ProtocolError> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i] as u16;
        let continuation = |at: usize| -> Result<u16, ProtocolError> {
            match bytes.get(at) {
                Some(&b) if b & 0xC0 == 0x80 => Ok((b & 0x3F) as u16),
                _ => Err(ProtocolError::MalformedUtf(at)),
            }
        };
        if b0 & 0x80 == 0 {
            units.push(b0);
            i += 1;
        } else if b0 & 0xE0 == 0xC0 {
            units.push(((b0 & 0x1F) << 6) | continuation(i + 1)?);
            i += 2;
        } else if b0 & 0xF0 == 0xE0 {
            units.push(((b0 & 0x0F) << 12) | (continuation(i + 1)? << 6) | continuation(i + 2)?);
            i += 3;
        } else {
            return Err(ProtocolError::MalformedUtf(i));
        }
    }
    String::from_utf16(&units).map_err(|_| ProtocolError::MalformedUtf(bytes.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nul_and_supplementary_characters() {
        assert_eq!(encode_modified_utf8("a\0"), vec![b'a', 0xC0, 0x80]);
        let clef = "\u{1D11E}";
        let encoded = encode_modified_utf8(clef);
        assert_eq!(encoded.len(), 6);
        assert_eq!(decode_modified_utf8(&encoded).unwrap(), clef);
    }

    #[test]
    fn utf_is_length_prefixed() {
        let mut out = Vec::new();
        out.write_utf("héllo").unwrap();
        assert_eq!(&out[..2], &[0, 6]);
        let mut input = &out[..];
        assert_eq!(input.read_utf().unwrap(), "héllo");
    }

    #[test]
    fn nullable_string_marker() {
        let mut out = Vec::new();
        out.write_string(None).unwrap();
        out.write_string(Some("x")).unwrap();
        assert_eq!(out, vec![0, 0, 0, 1, 0, 1, b'x']);

        let mut input = &out[..];
        assert_eq!(input.read_string().unwrap(), None);
        assert_eq!(input.read_string().unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn rejects_truncated_sequence() {
        assert!(matches!(decode_modified_utf8(&[0xE0, 0x80]), Err(ProtocolError::MalformedUtf(2))));
    }

    #[test]
    fn rejects_overlong_strings() {
        let text = "x".repeat(MAX_UTF_LENGTH + 1);
        let mut out = Vec::new();
        assert!(matches!(out.write_utf(&text), Err(ProtocolError::StringTooLong(_))));
        assert!(out.is_empty());
    }
}
