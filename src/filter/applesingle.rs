/*
    imgcore::filter::applesingle

    AppleSingle container detection and unwrapping: a big-endian magic and
    version, a 16-byte zeroed filler, a 16-bit entry count, then that many
    12-byte `(entry_id, offset, length)` descriptors pointing into the rest
    of the file. This crate only needs the Data Fork (id 1), Resource Fork
    (id 2), and File Dates (id 8) entries; the remainder are recognized for
    completeness and otherwise ignored.

    Per the resolved timestamp convention (see SPEC_FULL.md §9), the File
    Dates entry's four i32 fields are decoded against the Mac epoch
    (1904-01-01 UTC), matching MacFileInfo/ProDOSFileInfo elsewhere in this
    module rather than the source format's nominal 2000-01-01 epoch. This is
    a single code path: every AppleSingle timestamp in this crate goes
    through `datetime::from_mac_seconds`.
*/
use binrw::{BinRead, BinReaderExt};
use std::io::Cursor;

use crate::primitives::datetime;
use crate::ImgError;

const MAGIC: u32 = 0x0005_1600;
const SUPPORTED_VERSIONS: [u32; 2] = [0x0001_0000, 0x0002_0000];

const ENTRY_DATA_FORK: u32 = 1;
const ENTRY_RESOURCE_FORK: u32 = 2;
const ENTRY_FILE_DATES: u32 = 8;

#[derive(BinRead, Debug)]
#[br(big, magic = 0x0005_1600u32)]
struct RawHeader {
    version: u32,
    #[br(pad_before = 16)]
    num_entries: u16,
}

#[derive(BinRead, Debug, Copy, Clone)]
#[br(big)]
struct RawEntry {
    entry_id: u32,
    offset: u32,
    length: u32,
}

#[derive(BinRead, Debug)]
#[br(big)]
struct RawFileDates {
    created: i32,
    modified: i32,
    backed_up: i32,
    accessed: i32,
}

/// Dates recovered from an AppleSingle File Dates entry, all normalized to
/// the Mac epoch convention described above.
#[derive(Debug, Clone, Copy)]
pub struct FileDates {
    pub created: chrono::DateTime<chrono::Utc>,
    pub modified: chrono::DateTime<chrono::Utc>,
    pub backed_up: chrono::DateTime<chrono::Utc>,
    pub accessed: chrono::DateTime<chrono::Utc>,
}

/// Byte ranges of the entries this crate cares about, plus decoded dates if
/// a File Dates entry was present.
#[derive(Debug, Clone)]
pub struct AppleSingleLayout {
    pub data_fork: Option<(usize, usize)>,
    pub resource_fork: Option<(usize, usize)>,
    pub dates: Option<FileDates>,
}

/// Return `true` if `data` begins with the AppleSingle magic and a
/// supported version.
pub fn looks_like_applesingle(data: &[u8]) -> bool {
    data.len() >= 26 && u32::from_be_bytes([data[0], data[1], data[2], data[3]]) == MAGIC
}

pub fn parse(data: &[u8]) -> Result<AppleSingleLayout, ImgError> {
    let mut cursor = Cursor::new(data);
    let header: RawHeader = cursor.read_be().map_err(|e| ImgError::BinRwError(e.to_string()))?;
    if !SUPPORTED_VERSIONS.contains(&header.version) {
        return Err(ImgError::CorruptImage(format!(
            "unsupported AppleSingle version 0x{:08X}",
            header.version
        )));
    }

    let mut data_fork = None;
    let mut resource_fork = None;
    let mut dates = None;

    for _ in 0..header.num_entries {
        let entry: RawEntry = cursor.read_be().map_err(|e| ImgError::BinRwError(e.to_string()))?;
        let start = entry.offset as usize;
        let end = start + entry.length as usize;
        if end > data.len() {
            return Err(ImgError::IncompleteImage(
                "AppleSingle entry extends past end of container".into(),
            ));
        }

        match entry.entry_id {
            ENTRY_DATA_FORK => data_fork = Some((start, end)),
            ENTRY_RESOURCE_FORK => resource_fork = Some((start, end)),
            ENTRY_FILE_DATES => {
                let mut entry_cursor = Cursor::new(&data[start..end]);
                let raw: RawFileDates = entry_cursor
                    .read_be()
                    .map_err(|e| ImgError::BinRwError(e.to_string()))?;
                dates = Some(FileDates {
                    created: datetime::from_mac_seconds(raw.created as i64),
                    modified: datetime::from_mac_seconds(raw.modified as i64),
                    backed_up: datetime::from_mac_seconds(raw.backed_up as i64),
                    accessed: datetime::from_mac_seconds(raw.accessed as i64),
                });
            }
            _ => {}
        }
    }

    Ok(AppleSingleLayout {
        data_fork,
        resource_fork,
        dates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_container(data_fork: &[u8], dates: Option<(i32, i32, i32, i32)>) -> Vec<u8> {
        let mut entries: Vec<(u32, Vec<u8>)> = vec![(ENTRY_DATA_FORK, data_fork.to_vec())];
        if let Some((c, m, b, a)) = dates {
            let mut buf = Vec::with_capacity(16);
            buf.extend_from_slice(&c.to_be_bytes());
            buf.extend_from_slice(&m.to_be_bytes());
            buf.extend_from_slice(&b.to_be_bytes());
            buf.extend_from_slice(&a.to_be_bytes());
            entries.push((ENTRY_FILE_DATES, buf));
        }

        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC.to_be_bytes());
        out.extend_from_slice(&SUPPORTED_VERSIONS[1].to_be_bytes());
        out.extend_from_slice(&[0u8; 16]);
        out.extend_from_slice(&(entries.len() as u16).to_be_bytes());

        let header_len = 26 + entries.len() * 12;
        let mut payload_offset = header_len;
        let mut descriptors = Vec::new();
        let mut payloads = Vec::new();
        for (id, bytes) in &entries {
            descriptors.push((*id, payload_offset as u32, bytes.len() as u32));
            payload_offset += bytes.len();
            payloads.push(bytes.clone());
        }
        for (id, offset, len) in descriptors {
            out.extend_from_slice(&id.to_be_bytes());
            out.extend_from_slice(&offset.to_be_bytes());
            out.extend_from_slice(&len.to_be_bytes());
        }
        for payload in payloads {
            out.extend_from_slice(&payload);
        }
        out
    }

    #[test]
    fn detects_magic() {
        let container = build_container(b"hello", None);
        assert!(looks_like_applesingle(&container));
        assert!(!looks_like_applesingle(b"not applesingle"));
    }

    #[test]
    fn parses_data_fork_range() {
        let container = build_container(b"hello world", None);
        let layout = parse(&container).unwrap();
        let (start, end) = layout.data_fork.unwrap();
        assert_eq!(&container[start..end], b"hello world");
    }

    #[test]
    fn decodes_file_dates_via_mac_epoch() {
        let container = build_container(b"x", Some((0, 0, 0, 0)));
        let layout = parse(&container).unwrap();
        let dates = layout.dates.unwrap();
        assert_eq!(dates.created.format("%Y-%m-%d").to_string(), "1904-01-01");
    }

    #[test]
    fn accepts_version_1_header() {
        let mut container = build_container(b"hello", None);
        container[4..8].copy_from_slice(&SUPPORTED_VERSIONS[0].to_be_bytes());
        let layout = parse(&container).unwrap();
        let (start, end) = layout.data_fork.unwrap();
        assert_eq!(&container[start..end], b"hello");
    }
}
