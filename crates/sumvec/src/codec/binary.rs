//! Binary header and data files.
//!
//! Both file kinds share a prelude and a footer:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Prelude (8 bytes)                                           │
//! │  - Magic: "SMSP" (header) or "SMRY" (data) (4 bytes)         │
//! │  - Version: u16 (2 bytes) = 1                                │
//! │  - Flags / encoding: 2 bytes                                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Body                                                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Footer (8 bytes)                                            │
//! │  - CRC32 of prelude and body (4 bytes)                       │
//! │  - Reverse magic (4 bytes)                                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The header body holds the case name, start time, declared wells and
//! groups, and the variables in slot order. A data body holds the catalog
//! fingerprint, the declared units, one step block and one column block per
//! slot. Every block carries its own CRC32.
//!
//! All integers are little-endian. Strings are a u16 length followed by
//! UTF-8 bytes.

use crate::codec::column::{self, ColumnEncoding};
use crate::error::{Result, SummaryError};
use crate::key::{KeyCatalog, VarCategory, VarKey};
use crate::store::{to_datetime, DataBatch, FormatMode, StepStamp, SummaryHeader, SummarySet};
use std::io::Write;
use std::ops::Range;

/// Magic bytes of a binary header file: "SMSP"
pub const HEADER_MAGIC: [u8; 4] = *b"SMSP";

/// Magic bytes of a binary data file: "SMRY"
pub const DATA_MAGIC: [u8; 4] = *b"SMRY";

/// Current binary format version.
pub const FORMAT_VERSION: u16 = 1;

/// Prelude size in bytes.
pub const PRELUDE_SIZE: usize = 8;

/// Footer size in bytes.
pub const FOOTER_SIZE: usize = 8;

const FLAG_UNIFIED: u16 = 0x0001;

fn reversed(magic: [u8; 4]) -> [u8; 4] {
    [magic[3], magic[2], magic[1], magic[0]]
}

/// Little-endian reader over an in-memory file.
///
/// Running past the end is reported as corrupt data, not as an I/O error:
/// the file was read completely, it is just shorter than its contents claim.
pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| {
                SummaryError::corrupt(format!(
                    "unexpected end of data at byte {} (need {} more)",
                    self.pos, len
                ))
            })?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub(crate) fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub(crate) fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    pub(crate) fn string(&mut self) -> Result<String> {
        let len = self.u16()? as usize;
        let bytes = self.bytes(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| SummaryError::corrupt(format!("invalid UTF-8 string at byte {}", self.pos)))
    }

    /// Reads a u32 count and checks that at least `min_item` bytes per item
    /// remain, so a corrupt count cannot trigger a huge allocation.
    fn count(&mut self, min_item: usize) -> Result<usize> {
        let count = self.u32()? as usize;
        if count.saturating_mul(min_item) > self.remaining() {
            return Err(SummaryError::corrupt(format!(
                "count {} exceeds remaining {} bytes",
                count,
                self.remaining()
            )));
        }
        Ok(count)
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

fn put_string<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    let len = u16::try_from(value.len())
        .map_err(|_| SummaryError::corrupt(format!("string of {} bytes too long", value.len())))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

fn put_len<W: Write>(writer: &mut W, len: usize) -> Result<()> {
    let len = u32::try_from(len)
        .map_err(|_| SummaryError::corrupt(format!("length {len} exceeds u32")))?;
    writer.write_all(&len.to_le_bytes())?;
    Ok(())
}

/// Appends the footer over everything written so far.
fn seal(mut buf: Vec<u8>, magic: [u8; 4]) -> Vec<u8> {
    let crc32 = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc32.to_le_bytes());
    buf.extend_from_slice(&reversed(magic));
    buf
}

/// Verifies prelude and footer, returning the flags word and the body.
fn unseal(bytes: &[u8], magic: [u8; 4]) -> Result<(u16, &[u8])> {
    if bytes.len() < PRELUDE_SIZE + FOOTER_SIZE {
        return Err(SummaryError::corrupt(format!(
            "file of {} bytes is shorter than prelude and footer",
            bytes.len()
        )));
    }

    let mut actual = [0u8; 4];
    actual.copy_from_slice(&bytes[..4]);
    if actual != magic {
        return Err(SummaryError::InvalidMagic {
            expected: magic,
            actual,
        });
    }

    let footer = &bytes[bytes.len() - FOOTER_SIZE..];
    let mut tail = [0u8; 4];
    tail.copy_from_slice(&footer[4..]);
    if tail != reversed(magic) {
        return Err(SummaryError::InvalidMagic {
            expected: reversed(magic),
            actual: tail,
        });
    }

    let covered = &bytes[..bytes.len() - FOOTER_SIZE];
    let mut stored = [0u8; 4];
    stored.copy_from_slice(&footer[..4]);
    let expected = u32::from_le_bytes(stored);
    let actual = crc32fast::hash(covered);
    if expected != actual {
        return Err(SummaryError::ChecksumMismatch { expected, actual });
    }

    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != FORMAT_VERSION {
        return Err(SummaryError::UnsupportedVersion(version));
    }
    let flags = u16::from_le_bytes([bytes[6], bytes[7]]);
    Ok((flags, &covered[PRELUDE_SIZE..]))
}

/// Encodes a header file.
pub fn encode_header(header: &SummaryHeader, catalog: &KeyCatalog) -> Result<Vec<u8>> {
    let flags = if header.unified { FLAG_UNIFIED } else { 0 };

    let mut buf = Vec::new();
    buf.write_all(&HEADER_MAGIC)?;
    buf.write_all(&FORMAT_VERSION.to_le_bytes())?;
    buf.write_all(&flags.to_le_bytes())?;

    put_string(&mut buf, &header.case_name)?;
    buf.write_all(&header.start_time.to_le_bytes())?;

    put_len(&mut buf, catalog.num_wells())?;
    for well in catalog.well_names() {
        put_string(&mut buf, well)?;
    }
    put_len(&mut buf, catalog.num_groups())?;
    for group in catalog.group_names() {
        put_string(&mut buf, group)?;
    }

    put_len(&mut buf, catalog.len())?;
    for variable in catalog.variables() {
        let key = &variable.key;
        buf.write_all(&[key.category() as u8])?;
        put_string(&mut buf, key.keyword())?;
        put_string(&mut buf, key.name().unwrap_or(""))?;
        buf.write_all(&key.number().unwrap_or(0).to_le_bytes())?;
        put_string(&mut buf, &variable.unit)?;
    }

    Ok(seal(buf, HEADER_MAGIC))
}

/// Decodes a header file into an empty set.
///
/// # Errors
///
/// Returns `SummaryError::InvalidMagic`, `SummaryError::ChecksumMismatch`,
/// `SummaryError::UnsupportedVersion` or `SummaryError::CorruptData` for
/// damaged files.
pub fn decode_header(bytes: &[u8]) -> Result<SummarySet> {
    let (flags, body) = unseal(bytes, HEADER_MAGIC)?;
    let mut reader = ByteReader::new(body);

    let case_name = reader.string()?;
    let start_time = reader.i64()?;
    to_datetime(start_time)?;

    let mut catalog = KeyCatalog::new();
    for _ in 0..reader.count(2)? {
        catalog.register_well(&reader.string()?)?;
    }
    for _ in 0..reader.count(2)? {
        catalog.register_group(&reader.string()?)?;
    }
    for _ in 0..reader.count(11)? {
        let tag = reader.u8()?;
        let category = VarCategory::from_u8(tag)
            .ok_or_else(|| SummaryError::corrupt(format!("unknown variable category {tag}")))?;
        let keyword = reader.string()?;
        let name = reader.string()?;
        let number = reader.u32()?;
        let unit = reader.string()?;
        let key = VarKey::from_parts(category, &keyword, &name, number)?;
        catalog.register(key, unit)?;
    }

    if reader.remaining() != 0 {
        return Err(SummaryError::corrupt(format!(
            "{} trailing bytes after header",
            reader.remaining()
        )));
    }

    let header = SummaryHeader {
        case_name,
        start_time,
        format: FormatMode::Binary,
        unified: flags & FLAG_UNIFIED != 0,
    };
    Ok(SummarySet::from_parts(header, catalog))
}

/// Step block of a data file: ministeps, report steps and encoded times.
///
/// ```text
/// Offset  Size    Field
/// ------  ----    -----
/// 0x00    4       step_count (u32 LE)
/// 0x04    4*n     ministeps (u32 LE)
/// ...     4*n     report_steps (u32 LE)
/// ...     4       time_data_size (u32 LE)
/// ...     N       time_data[time_data_size]
/// ...     4       block_crc32 (u32 LE)
/// ```
#[derive(Debug, Clone)]
struct StepBlock {
    ministeps: Vec<u32>,
    report_steps: Vec<u32>,
    time_data: Vec<u8>,
}

impl StepBlock {
    fn calculate_crc(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&(self.ministeps.len() as u32).to_le_bytes());
        for ministep in &self.ministeps {
            hasher.update(&ministep.to_le_bytes());
        }
        for report in &self.report_steps {
            hasher.update(&report.to_le_bytes());
        }
        hasher.update(&(self.time_data.len() as u32).to_le_bytes());
        hasher.update(&self.time_data);
        hasher.finalize()
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        put_len(writer, self.ministeps.len())?;
        for ministep in &self.ministeps {
            writer.write_all(&ministep.to_le_bytes())?;
        }
        for report in &self.report_steps {
            writer.write_all(&report.to_le_bytes())?;
        }
        put_len(writer, self.time_data.len())?;
        writer.write_all(&self.time_data)?;
        writer.write_all(&self.calculate_crc().to_le_bytes())?;
        Ok(())
    }

    fn read_from(reader: &mut ByteReader<'_>) -> Result<Self> {
        let count = reader.count(8)?;
        let ministeps = (0..count).map(|_| reader.u32()).collect::<Result<Vec<_>>>()?;
        let report_steps = (0..count).map(|_| reader.u32()).collect::<Result<Vec<_>>>()?;
        let time_len = reader.count(1)?;
        let time_data = reader.bytes(time_len)?.to_vec();
        let stored = reader.u32()?;

        let block = Self {
            ministeps,
            report_steps,
            time_data,
        };
        let actual = block.calculate_crc();
        if stored != actual {
            return Err(SummaryError::ChecksumMismatch {
                expected: stored,
                actual,
            });
        }
        Ok(block)
    }
}

/// Column block of a data file: the values of one slot.
///
/// ```text
/// Offset  Size    Field
/// ------  ----    -----
/// 0x00    4       slot (u32 LE)
/// 0x04    4       data_size (u32 LE)
/// 0x08    N       data[data_size]
/// 0x08+N  4       block_crc32 (u32 LE)
/// ```
#[derive(Debug, Clone)]
struct ColumnBlock {
    slot: u32,
    data: Vec<u8>,
}

impl ColumnBlock {
    fn calculate_crc(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.slot.to_le_bytes());
        hasher.update(&(self.data.len() as u32).to_le_bytes());
        hasher.update(&self.data);
        hasher.finalize()
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.slot.to_le_bytes())?;
        put_len(writer, self.data.len())?;
        writer.write_all(&self.data)?;
        writer.write_all(&self.calculate_crc().to_le_bytes())?;
        Ok(())
    }

    fn read_from(reader: &mut ByteReader<'_>) -> Result<Self> {
        let slot = reader.u32()?;
        let len = reader.count(1)?;
        let data = reader.bytes(len)?.to_vec();
        let stored = reader.u32()?;

        let block = Self { slot, data };
        let actual = block.calculate_crc();
        if stored != actual {
            return Err(SummaryError::ChecksumMismatch {
                expected: stored,
                actual,
            });
        }
        Ok(block)
    }
}

/// Encodes a range of steps of a set as a data file.
pub fn encode_data(
    set: &SummarySet,
    steps: Range<usize>,
    encoding: ColumnEncoding,
) -> Result<Vec<u8>> {
    let catalog = set.catalog();
    let all = set.time_index().steps();
    let rows = all
        .get(steps.clone())
        .ok_or_else(|| SummaryError::out_of_range("step", steps.end, all.len()))?;

    let mut buf = Vec::new();
    buf.write_all(&DATA_MAGIC)?;
    buf.write_all(&FORMAT_VERSION.to_le_bytes())?;
    buf.write_all(&[encoding as u8, 0])?;

    buf.write_all(&catalog.fingerprint().to_le_bytes())?;
    put_len(&mut buf, catalog.len())?;
    for variable in catalog.variables() {
        put_string(&mut buf, &variable.unit)?;
    }

    let times: Vec<i64> = rows.iter().map(|s| s.time).collect();
    StepBlock {
        ministeps: rows.iter().map(|s| s.ministep).collect(),
        report_steps: rows.iter().map(|s| s.report_step).collect(),
        time_data: column::encode_times(&times, encoding),
    }
    .write_to(&mut buf)?;

    let values = set.values();
    for slot in 0..catalog.len() {
        let cells: Vec<f64> = steps
            .clone()
            .map(|step| Ok(values.row(step)?[slot]))
            .collect::<Result<_>>()?;
        ColumnBlock {
            slot: slot as u32,
            data: column::encode_values(&cells, encoding),
        }
        .write_to(&mut buf)?;
    }

    Ok(seal(buf, DATA_MAGIC))
}

/// Decodes a data file against the catalog it was written for.
///
/// # Errors
///
/// Besides the structural errors of [`decode_header`], returns
/// `SummaryError::CorruptData` if the file belongs to another catalog.
pub fn decode_data(bytes: &[u8], catalog: &KeyCatalog) -> Result<DataBatch> {
    let (flags, body) = unseal(bytes, DATA_MAGIC)?;
    let encoding = ColumnEncoding::from_u8((flags & 0xFF) as u8)
        .ok_or_else(|| SummaryError::corrupt(format!("unknown column encoding {}", flags & 0xFF)))?;
    let mut reader = ByteReader::new(body);

    let fingerprint = reader.u64()?;
    if fingerprint != catalog.fingerprint() {
        return Err(SummaryError::corrupt(format!(
            "data written for catalog {:016x}, header catalog is {:016x}",
            fingerprint,
            catalog.fingerprint()
        )));
    }

    let columns = reader.count(2)?;
    if columns != catalog.len() {
        return Err(SummaryError::corrupt(format!(
            "data has {} columns, header declares {}",
            columns,
            catalog.len()
        )));
    }
    let units = (0..columns).map(|_| reader.string()).collect::<Result<Vec<_>>>()?;

    let steps = StepBlock::read_from(&mut reader)?;
    let count = steps.ministeps.len();
    let times = column::decode_times(&steps.time_data, count, encoding)?;

    let mut rows: Vec<Vec<f64>> = vec![Vec::with_capacity(columns); count];
    for expected in 0..columns {
        let block = ColumnBlock::read_from(&mut reader)?;
        if block.slot as usize != expected {
            return Err(SummaryError::corrupt(format!(
                "column block for slot {} where slot {} was expected",
                block.slot, expected
            )));
        }
        let cells = column::decode_values(&block.data, count, encoding)?;
        for (row, value) in rows.iter_mut().zip(cells) {
            row.push(value);
        }
    }

    if reader.remaining() != 0 {
        return Err(SummaryError::corrupt(format!(
            "{} trailing bytes after data",
            reader.remaining()
        )));
    }

    let mut batch = DataBatch::with_units(units);
    for (i, values) in rows.into_iter().enumerate() {
        batch.push(
            StepStamp::new(steps.ministeps[i], steps.report_steps[i], times[i]),
            values,
        );
    }
    Ok(batch)
}
