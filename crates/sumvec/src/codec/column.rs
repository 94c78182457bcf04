//! Column encodings for binary data batches.
//!
//! Times and values are stored column-wise. With [`ColumnEncoding::Gorilla`]
//! times use delta-of-delta encoding and values use XOR encoding:
//!
//! ## Timestamp Encoding (Delta-of-Delta)
//!
//! - First value: 64 bits raw
//! - Subsequent values, by delta-of-delta:
//!   - `0`: `'0'` (1 bit)
//!   - `[-63, 64]`: `'10'` + 7 bits
//!   - `[-255, 256]`: `'110'` + 9 bits
//!   - `[-2047, 2048]`: `'1110'` + 12 bits
//!   - else: `'1111'` + 64 bits
//!
//! ## Value Encoding (XOR-based)
//!
//! - First value: 64 bits raw (IEEE 754)
//! - Subsequent values, by XOR with the previous value:
//!   - XOR = 0: `'0'` (1 bit)
//!   - Same window: `'10'` + meaningful bits
//!   - New window: `'11'` + 5 bits leading + 6 bits length + meaningful bits
//!
//! Absent cells are NaN and go through the XOR path like any other bit
//! pattern, so they survive encoding unchanged.

use crate::error::{Result, SummaryError};
use bitvec::prelude::*;

/// Encoding of a column block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ColumnEncoding {
    /// 8 bytes little-endian per entry.
    Raw = 0,
    /// Delta-of-delta times, XOR values.
    #[default]
    Gorilla = 1,
}

impl ColumnEncoding {
    /// Creates a ColumnEncoding from a u8 value.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Raw),
            1 => Some(Self::Gorilla),
            _ => None,
        }
    }
}

type Bits = BitVec<u8, Msb0>;

fn push_bits(out: &mut Bits, value: u64, width: u32) {
    for i in (0..width).rev() {
        out.push((value >> i) & 1 == 1);
    }
}

/// Reads bits from a byte buffer, failing on truncation.
struct BitCursor<'a> {
    bits: &'a BitSlice<u8, Msb0>,
    pos: usize,
}

impl<'a> BitCursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bits: bytes.view_bits::<Msb0>(),
            pos: 0,
        }
    }

    fn bit(&mut self) -> Result<bool> {
        let bit = self
            .bits
            .get(self.pos)
            .map(|b| *b)
            .ok_or_else(|| SummaryError::corrupt("column stream truncated"))?;
        self.pos += 1;
        Ok(bit)
    }

    fn take(&mut self, width: u32) -> Result<u64> {
        let mut value = 0u64;
        for _ in 0..width {
            value = (value << 1) | u64::from(self.bit()?);
        }
        Ok(value)
    }
}

/// Delta-of-delta encoder for timestamps.
#[derive(Debug, Default)]
struct DeltaEncoder {
    started: bool,
    prev: i64,
    prev_delta: i64,
}

impl DeltaEncoder {
    fn encode(&mut self, value: i64, out: &mut Bits) {
        if !self.started {
            self.started = true;
            self.prev = value;
            push_bits(out, value as u64, 64);
            return;
        }

        let delta = value.wrapping_sub(self.prev);
        let dod = delta.wrapping_sub(self.prev_delta);
        match dod {
            0 => out.push(false),
            -63..=64 => {
                push_bits(out, 0b10, 2);
                push_bits(out, (dod + 63) as u64, 7);
            }
            -255..=256 => {
                push_bits(out, 0b110, 3);
                push_bits(out, (dod + 255) as u64, 9);
            }
            -2047..=2048 => {
                push_bits(out, 0b1110, 4);
                push_bits(out, (dod + 2047) as u64, 12);
            }
            _ => {
                push_bits(out, 0b1111, 4);
                push_bits(out, dod as u64, 64);
            }
        }
        self.prev_delta = delta;
        self.prev = value;
    }
}

/// Decoder matching [`DeltaEncoder`].
struct DeltaDecoder<'a> {
    cursor: BitCursor<'a>,
    started: bool,
    prev: i64,
    prev_delta: i64,
}

impl<'a> DeltaDecoder<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            cursor: BitCursor::new(bytes),
            started: false,
            prev: 0,
            prev_delta: 0,
        }
    }

    fn decode_next(&mut self) -> Result<i64> {
        if !self.started {
            self.started = true;
            self.prev = self.cursor.take(64)? as i64;
            return Ok(self.prev);
        }

        let dod = if !self.cursor.bit()? {
            0
        } else if !self.cursor.bit()? {
            self.cursor.take(7)? as i64 - 63
        } else if !self.cursor.bit()? {
            self.cursor.take(9)? as i64 - 255
        } else if !self.cursor.bit()? {
            self.cursor.take(12)? as i64 - 2047
        } else {
            self.cursor.take(64)? as i64
        };

        let delta = self.prev_delta.wrapping_add(dod);
        self.prev = self.prev.wrapping_add(delta);
        self.prev_delta = delta;
        Ok(self.prev)
    }
}

/// XOR encoder for float values.
#[derive(Debug, Default)]
struct XorEncoder {
    started: bool,
    prev: u64,
    prev_leading: u32,
    prev_trailing: u32,
}

impl XorEncoder {
    fn encode(&mut self, value: f64, out: &mut Bits) {
        let bits = value.to_bits();
        if !self.started {
            self.started = true;
            self.prev = bits;
            push_bits(out, bits, 64);
            return;
        }

        let xor = bits ^ self.prev;
        if xor == 0 {
            out.push(false);
        } else {
            // The leading count is stored in 5 bits, so the window may start
            // before the first set bit.
            let leading = xor.leading_zeros().min(31);
            let trailing = xor.trailing_zeros();

            if leading >= self.prev_leading && trailing >= self.prev_trailing {
                push_bits(out, 0b10, 2);
                let meaningful = 64 - self.prev_leading - self.prev_trailing;
                push_bits(out, xor >> self.prev_trailing, meaningful);
            } else {
                push_bits(out, 0b11, 2);
                let meaningful = 64 - leading - trailing;
                push_bits(out, u64::from(leading), 5);
                push_bits(out, u64::from(meaningful - 1), 6);
                push_bits(out, xor >> trailing, meaningful);
                self.prev_leading = leading;
                self.prev_trailing = trailing;
            }
        }
        self.prev = bits;
    }
}

/// Decoder matching [`XorEncoder`].
struct XorDecoder<'a> {
    cursor: BitCursor<'a>,
    started: bool,
    prev: u64,
    prev_leading: u32,
    prev_trailing: u32,
}

impl<'a> XorDecoder<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            cursor: BitCursor::new(bytes),
            started: false,
            prev: 0,
            prev_leading: 0,
            prev_trailing: 0,
        }
    }

    fn decode_next(&mut self) -> Result<f64> {
        if !self.started {
            self.started = true;
            self.prev = self.cursor.take(64)?;
            return Ok(f64::from_bits(self.prev));
        }

        let xor = if !self.cursor.bit()? {
            0
        } else if !self.cursor.bit()? {
            let meaningful = 64 - self.prev_leading - self.prev_trailing;
            self.cursor.take(meaningful)? << self.prev_trailing
        } else {
            let leading = self.cursor.take(5)? as u32;
            let meaningful = self.cursor.take(6)? as u32 + 1;
            if leading + meaningful > 64 {
                return Err(SummaryError::corrupt("invalid XOR window"));
            }
            let trailing = 64 - leading - meaningful;
            self.prev_leading = leading;
            self.prev_trailing = trailing;
            self.cursor.take(meaningful)? << trailing
        };

        self.prev ^= xor;
        Ok(f64::from_bits(self.prev))
    }
}

/// Encodes a time column.
pub fn encode_times(times: &[i64], encoding: ColumnEncoding) -> Vec<u8> {
    match encoding {
        ColumnEncoding::Raw => times.iter().flat_map(|t| t.to_le_bytes()).collect(),
        ColumnEncoding::Gorilla => {
            let mut out = Bits::new();
            let mut encoder = DeltaEncoder::default();
            for &time in times {
                encoder.encode(time, &mut out);
            }
            out.into_vec()
        }
    }
}

/// Decodes `count` entries of a time column.
///
/// # Errors
///
/// Returns `SummaryError::CorruptData` if the stream is too short.
pub fn decode_times(data: &[u8], count: usize, encoding: ColumnEncoding) -> Result<Vec<i64>> {
    match encoding {
        ColumnEncoding::Raw => {
            check_raw_len(data, count)?;
            Ok(data
                .chunks_exact(8)
                .map(|chunk| i64::from_le_bytes(le_word(chunk)))
                .collect())
        }
        ColumnEncoding::Gorilla => {
            let mut decoder = DeltaDecoder::new(data);
            (0..count).map(|_| decoder.decode_next()).collect()
        }
    }
}

/// Encodes a value column.
pub fn encode_values(values: &[f64], encoding: ColumnEncoding) -> Vec<u8> {
    match encoding {
        ColumnEncoding::Raw => values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        ColumnEncoding::Gorilla => {
            let mut out = Bits::new();
            let mut encoder = XorEncoder::default();
            for &value in values {
                encoder.encode(value, &mut out);
            }
            out.into_vec()
        }
    }
}

/// Decodes `count` entries of a value column.
///
/// # Errors
///
/// Returns `SummaryError::CorruptData` if the stream is too short.
pub fn decode_values(data: &[u8], count: usize, encoding: ColumnEncoding) -> Result<Vec<f64>> {
    match encoding {
        ColumnEncoding::Raw => {
            check_raw_len(data, count)?;
            Ok(data
                .chunks_exact(8)
                .map(|chunk| f64::from_le_bytes(le_word(chunk)))
                .collect())
        }
        ColumnEncoding::Gorilla => {
            let mut decoder = XorDecoder::new(data);
            (0..count).map(|_| decoder.decode_next()).collect()
        }
    }
}

fn check_raw_len(data: &[u8], count: usize) -> Result<()> {
    if data.len() != count * 8 {
        return Err(SummaryError::corrupt(format!(
            "raw column has {} bytes for {} entries",
            data.len(),
            count
        )));
    }
    Ok(())
}

fn le_word(chunk: &[u8]) -> [u8; 8] {
    let mut word = [0u8; 8];
    word.copy_from_slice(chunk);
    word
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_times_roundtrip_regular() {
        let times: Vec<i64> = (0..100).map(|i| 946_684_800 + i * 86_400).collect();
        let encoded = encode_times(&times, ColumnEncoding::Gorilla);
        assert!(encoded.len() < times.len() * 8);
        assert_eq!(decode_times(&encoded, times.len(), ColumnEncoding::Gorilla).unwrap(), times);
    }

    #[test]
    fn test_times_roundtrip_extreme_deltas() {
        let times = vec![i64::MIN, 0, i64::MAX, -5, 7, 7, 7, 1 << 40];
        for encoding in [ColumnEncoding::Raw, ColumnEncoding::Gorilla] {
            let encoded = encode_times(&times, encoding);
            assert_eq!(decode_times(&encoded, times.len(), encoding).unwrap(), times);
        }
    }

    #[test]
    fn test_values_roundtrip_with_absent() {
        let values = vec![10.0, 20.0, f64::NAN, 15.0, 15.0, 0.0, -1.5e-300, f64::NAN];
        for encoding in [ColumnEncoding::Raw, ColumnEncoding::Gorilla] {
            let encoded = encode_values(&values, encoding);
            let decoded = decode_values(&encoded, values.len(), encoding).unwrap();
            for (a, b) in values.iter().zip(&decoded) {
                assert_eq!(a.to_bits(), b.to_bits());
            }
        }
    }

    #[test]
    fn test_values_with_many_leading_zeros() {
        // XORs with more than 31 leading zeros exercise the capped window.
        let values = vec![1.0, f64::from_bits(1.0f64.to_bits() ^ 1), f64::from_bits(1.0f64.to_bits() ^ 0xFFFF)];
        let encoded = encode_values(&values, ColumnEncoding::Gorilla);
        let decoded = decode_values(&encoded, values.len(), ColumnEncoding::Gorilla).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_empty_columns() {
        assert!(encode_times(&[], ColumnEncoding::Gorilla).is_empty());
        assert!(decode_values(&[], 0, ColumnEncoding::Gorilla).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_stream_is_corrupt() {
        let values = vec![1.0, 2.0, 3.0];
        let encoded = encode_values(&values, ColumnEncoding::Gorilla);
        let result = decode_values(&encoded[..4], values.len(), ColumnEncoding::Gorilla);
        assert!(matches!(result, Err(SummaryError::CorruptData(_))));

        let result = decode_times(&[0u8; 12], 2, ColumnEncoding::Raw);
        assert!(matches!(result, Err(SummaryError::CorruptData(_))));
    }

    #[test]
    fn test_encoding_from_u8() {
        assert_eq!(ColumnEncoding::from_u8(0), Some(ColumnEncoding::Raw));
        assert_eq!(ColumnEncoding::from_u8(1), Some(ColumnEncoding::Gorilla));
        assert_eq!(ColumnEncoding::from_u8(2), None);
    }
}
