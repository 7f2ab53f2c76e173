/*
    imgcore::formats::qcow::header

    The QCOW v1 header (§3 "QCOW header"): a fixed big-endian layout read
    with the same binrw convention as the AppleSingle/MacBinary headers in
    `filter/`, plus the validation gate that rejects AES-encrypted and
    differencing images up front rather than failing deep inside a read.
*/
use binrw::BinRead;

use crate::ImgError;

const MAGIC: u32 = 0x5146_49FB;
const SUPPORTED_VERSION: u32 = 1;

/// Encoded size of [`RawHeader`] in bytes: 4 (magic) + 4 + 8 + 4 + 4 + 8 + 1
/// + 1 + 2 + 4 + 8.
pub const HEADER_BYTES: usize = 48;

#[derive(BinRead, Debug, Clone, Copy)]
#[br(big, magic = 0x5146_49FBu32)]
pub struct RawHeader {
    pub version: u32,
    pub backing_file_offset: u64,
    #[allow(dead_code)]
    pub backing_file_size: u32,
    pub mtime: u32,
    pub size: u64,
    pub cluster_bits: u8,
    pub l2_bits: u8,
    #[allow(dead_code)]
    pub padding: u16,
    pub crypt_method: u32,
    pub l1_table_offset: u64,
}

/// The header's fields plus the derived constants every sector read leans
/// on, computed once at open time (§4.E "Parse").
#[derive(Debug, Clone, Copy)]
pub struct QcowHeader {
    pub size: u64,
    pub cluster_bits: u8,
    pub l2_bits: u8,
    pub l1_table_offset: u64,
    pub mtime: u32,
    pub shift: u32,
    pub cluster_size: u64,
    pub cluster_sectors: u64,
    pub l1_size: usize,
    pub l2_size: usize,
    pub l1_mask: u64,
    pub l2_mask: u64,
    pub sector_mask: u64,
    pub comp_mask: u64,
}

impl QcowHeader {
    pub fn parse(raw: &RawHeader) -> Result<Self, ImgError> {
        if raw.version != SUPPORTED_VERSION {
            return Err(ImgError::FeatureNotImplemented("QCOW versions other than 1"));
        }
        if !(9..=16).contains(&raw.cluster_bits) {
            return Err(ImgError::CorruptImage(format!("cluster_bits {} out of range 9..=16", raw.cluster_bits)));
        }
        if !(6..=13).contains(&raw.l2_bits) {
            return Err(ImgError::CorruptImage(format!("l2_bits {} out of range 6..=13", raw.l2_bits)));
        }
        if raw.crypt_method != 0 {
            return Err(ImgError::FeatureNotImplemented("QCOW AES encryption"));
        }
        if raw.backing_file_offset != 0 {
            return Err(ImgError::FeatureNotImplemented("QCOW differencing images"));
        }

        let shift = raw.cluster_bits as u32 + raw.l2_bits as u32;
        if raw.size > u64::MAX - (1u64 << shift) {
            return Err(ImgError::CorruptImage("size overflows against cluster/L2 shift".into()));
        }

        let cluster_size = 1u64 << raw.cluster_bits;
        let cluster_sectors = cluster_size / 512;
        let l1_size = raw.size.div_ceil(1u64 << shift) as usize;
        let l2_size = 1usize << raw.l2_bits;

        let l1_mask = !0u64 << shift;
        let l2_mask = ((l2_size as u64) - 1) << raw.cluster_bits;
        let sector_mask = cluster_size - 1;
        let comp_mask = (cluster_size - 1) << (63 - raw.cluster_bits as u32);

        Ok(QcowHeader {
            size: raw.size,
            cluster_bits: raw.cluster_bits,
            l2_bits: raw.l2_bits,
            l1_table_offset: raw.l1_table_offset,
            mtime: raw.mtime,
            shift,
            cluster_size,
            cluster_sectors,
            l1_size,
            l2_size,
            l1_mask,
            l2_mask,
            sector_mask,
            comp_mask,
        })
    }
}

/// Cheap magic-only sniff (§4.B).
pub fn looks_like_qcow(sniff: &[u8]) -> bool {
    sniff.len() >= 4 && u32::from_be_bytes([sniff[0], sniff[1], sniff[2], sniff[3]]) == MAGIC
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_raw() -> RawHeader {
        RawHeader {
            version: 1,
            backing_file_offset: 0,
            backing_file_size: 0,
            mtime: 0,
            size: 1_048_576,
            cluster_bits: 12,
            l2_bits: 9,
            padding: 0,
            crypt_method: 0,
            l1_table_offset: 0x40,
        }
    }

    #[test]
    fn masks_match_cluster_geometry() {
        let header = QcowHeader::parse(&sample_raw()).unwrap();
        assert_eq!(header.cluster_size, 4096);
        assert_eq!(header.cluster_sectors, 8);
        assert_eq!(header.l2_size, 512);
        assert_eq!(header.shift, 21);
        assert_eq!(header.l1_size, 1);
    }

    #[test]
    fn rejects_aes_and_differencing() {
        let mut raw = sample_raw();
        raw.crypt_method = 1;
        assert!(QcowHeader::parse(&raw).is_err());

        let mut raw = sample_raw();
        raw.backing_file_offset = 0x1000;
        assert!(QcowHeader::parse(&raw).is_err());
    }

    #[test]
    fn rejects_out_of_range_bits() {
        let mut raw = sample_raw();
        raw.cluster_bits = 8;
        assert!(QcowHeader::parse(&raw).is_err());

        let mut raw = sample_raw();
        raw.l2_bits = 14;
        assert!(QcowHeader::parse(&raw).is_err());
    }
}
