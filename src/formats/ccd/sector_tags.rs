/*
    imgcore::formats::ccd::sector_tags

    The (type, tag) -> (offset, size, skip) table from §4.C, and the slicing
    logic `read_sector_tag` and the contiguous-read fast path in
    `read_sectors` both rely on.
*/
use crate::types::{SectorTagKind, SectorType};
use crate::ImgError;

/// Offset, size, and trailing skip (informational, mirrors the spec table;
/// not used directly since `size` alone bounds the slice) for one
/// `(sector type, tag)` pair.
#[derive(Debug, Copy, Clone)]
pub struct TagRegion {
    pub offset: usize,
    pub size: usize,
}

/// Look up the `(offset, size)` region for `tag` within a raw 2352-byte
/// record of the given `sector_type`. Returns `None` for unsupported pairs.
pub fn tag_region(sector_type: SectorType, tag: SectorTagKind) -> Option<TagRegion> {
    use SectorTagKind::*;
    use SectorType::*;

    let (offset, size) = match (sector_type, tag) {
        (CdMode1, Sync) => (0, 12),
        (CdMode1, Header) => (12, 4),
        (CdMode1, Ecc) => (2076, 276),
        (CdMode1, EccP) => (2076, 172),
        (CdMode1, EccQ) => (2248, 104),
        (CdMode1, Edc) => (2064, 4),
        (CdMode2Formless, SubHeader) => (0, 8),
        (CdMode2Formless, Edc) => (2332, 4),
        (CdMode2Form1, SubHeader) => (16, 8),
        (CdMode2Form1, Ecc) => (2076, 276),
        (CdMode2Form1, Edc) => (2072, 4),
        (CdMode2Form2, SubHeader) => (16, 8),
        (CdMode2Form2, Edc) => (2348, 4),
        _ => return None,
    };
    Some(TagRegion { offset, size })
}

/// Slice a tag region out of a raw 2352-byte sector record.
pub fn slice_tag(raw: &[u8], sector_type: SectorType, tag: SectorTagKind) -> Result<Vec<u8>, ImgError> {
    let region = tag_region(sector_type, tag).ok_or(ImgError::TagNotSupportedForTrack { tag, sector_type })?;
    if raw.len() < region.offset + region.size {
        return Err(ImgError::CorruptImage("raw sector record too short for tag region".into()));
    }
    Ok(raw[region.offset..region.offset + region.size].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_region_matches_spec_table() {
        let region = tag_region(SectorType::CdMode1, SectorTagKind::Sync).unwrap();
        assert_eq!((region.offset, region.size), (0, 12));
    }

    #[test]
    fn audio_sectors_support_no_tags() {
        assert!(tag_region(SectorType::Audio, SectorTagKind::Sync).is_none());
    }

    #[test]
    fn slice_extracts_correct_bytes() {
        let mut raw = vec![0u8; crate::CD_RAW_SECTOR_SIZE];
        raw[12..16].copy_from_slice(&[1, 2, 3, 4]);
        let header = slice_tag(&raw, SectorType::CdMode1, SectorTagKind::Header).unwrap();
        assert_eq!(header, vec![1, 2, 3, 4]);
    }
}
