/*
    imgcore::filter::macbinary

    MacBinary container detection and unwrapping. A MacBinary file is a
    128-byte header (filename, type/creator codes, fork lengths, creation
    and modification dates, a CRC-16 over the first 124 bytes) followed by
    the data fork padded to a multiple of 128 bytes, then the resource
    fork similarly padded.

    Detection follows the wezm/macbinary heuristic: bytes 0 and 74 must be
    zero, and either the CRC over the first 124 bytes matches (MacBinary
    II/III) or the MacBinary I fallback checks (zeroed trailer, sane
    filename length, fork lengths under 8 MiB) all pass.
*/
use crc::{Crc, CRC_16_XMODEM};

use crate::primitives::datetime;
use crate::ImgError;

const HEADER_LEN: usize = 128;

/// Decoded MacBinary header fields relevant to unwrapping; Finder-specific
/// metadata (icon position, flags) is not retained since nothing downstream
/// consumes it.
#[derive(Debug, Clone)]
pub struct MacBinaryHeader {
    pub filename: String,
    pub data_fork_len: u32,
    pub rsrc_fork_len: u32,
    pub created: chrono::DateTime<chrono::Utc>,
    pub modified: chrono::DateTime<chrono::Utc>,
}

fn calc_crc(data: &[u8]) -> u16 {
    Crc::<u16>::new(&CRC_16_XMODEM).checksum(data)
}

fn next_multiple_of_128(value: u32) -> u32 {
    let rem = value % 128;
    if rem == 0 {
        value
    } else {
        value + (128 - rem)
    }
}

/// Return `true` if `data` begins with a recognizable MacBinary header.
pub fn looks_like_macbinary(data: &[u8]) -> bool {
    if data.len() < HEADER_LEN || data[0] != 0 || data[74] != 0 {
        return false;
    }

    let crc = u16::from_be_bytes([data[124], data[125]]);
    if crc == calc_crc(&data[..124]) {
        return true;
    }

    // MacBinary I fallback: no CRC field, so check the conventions the
    // format relied on instead: byte 82 (old version) zero, filename length
    // in range, fork lengths plausible, trailer bytes zeroed.
    let filename_len = data[1];
    let data_fork_len = u32::from_be_bytes([data[83], data[84], data[85], data[86]]);
    let rsrc_fork_len = u32::from_be_bytes([data[87], data[88], data[89], data[90]]);

    data[82] == 0
        && (1..=63).contains(&filename_len)
        && data_fork_len <= 0x007F_FFFF
        && rsrc_fork_len <= 0x007F_FFFF
        && data[101..=125].iter().all(|b| *b == 0)
}

/// Parse a MacBinary header and return it along with the byte offsets of
/// the data and resource forks within `data`.
pub fn parse(data: &[u8]) -> Result<(MacBinaryHeader, (usize, usize), (usize, usize)), ImgError> {
    if !looks_like_macbinary(data) {
        return Err(ImgError::CorruptImage("not a MacBinary container".into()));
    }

    let filename_len = data[1] as usize;
    let filename = String::from_utf8_lossy(&data[2..2 + filename_len.min(63)]).into_owned();

    let data_fork_len = u32::from_be_bytes([data[83], data[84], data[85], data[86]]);
    let rsrc_fork_len = u32::from_be_bytes([data[87], data[88], data[89], data[90]]);
    let created = u32::from_be_bytes([data[91], data[92], data[93], data[94]]);
    let modified = u32::from_be_bytes([data[95], data[96], data[97], data[98]]);

    let data_fork_start = HEADER_LEN;
    let data_fork_end = data_fork_start + data_fork_len as usize;
    let padded_data_len = next_multiple_of_128(data_fork_len) as usize;
    let rsrc_fork_start = HEADER_LEN + padded_data_len;
    let rsrc_fork_end = rsrc_fork_start + rsrc_fork_len as usize;

    if rsrc_fork_end > data.len() {
        return Err(ImgError::IncompleteImage(
            "MacBinary fork lengths exceed container size".into(),
        ));
    }

    let header = MacBinaryHeader {
        filename,
        data_fork_len,
        rsrc_fork_len,
        created: datetime::from_mac_seconds_unsigned(created),
        modified: datetime::from_mac_seconds_unsigned(modified),
    };

    Ok((header, (data_fork_start, data_fork_end), (rsrc_fork_start, rsrc_fork_end)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_header(filename: &str, data_fork_len: u32, rsrc_fork_len: u32) -> Vec<u8> {
        let mut h = vec![0u8; HEADER_LEN];
        h[1] = filename.len() as u8;
        h[2..2 + filename.len()].copy_from_slice(filename.as_bytes());
        h[83..87].copy_from_slice(&data_fork_len.to_be_bytes());
        h[87..91].copy_from_slice(&rsrc_fork_len.to_be_bytes());
        let crc = calc_crc(&h[..124]);
        h[124..126].copy_from_slice(&crc.to_be_bytes());
        h
    }

    #[test]
    fn detects_valid_header_via_crc() {
        let header = build_header("Text File", 21, 1454);
        assert!(looks_like_macbinary(&header));
    }

    #[test]
    fn rejects_non_zero_byte_zero() {
        let mut header = build_header("x", 0, 0);
        header[0] = 1;
        assert!(!looks_like_macbinary(&header));
    }

    #[test]
    fn parse_splits_forks_at_correct_offsets() {
        let mut container = build_header("Text File", 21, 4);
        container.extend(std::iter::repeat(b'x').take(21));
        container.extend(std::iter::repeat(0u8).take(next_multiple_of_128(21) as usize - 21));
        container.extend_from_slice(b"data");
        let (header, (ds, de), (rs, re)) = parse(&container).unwrap();
        assert_eq!(header.filename, "Text File");
        assert_eq!(de - ds, 21);
        assert_eq!(&container[ds..de], vec![b'x'; 21].as_slice());
        assert_eq!(&container[rs..re], b"data");
    }
}
