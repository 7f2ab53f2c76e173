//! QCOW v1 sparse block image decoder (§4.E): a big-endian header, a
//! two-level L1/L2 indirection table over clusters that are either raw or
//! zlib-deflate-compressed, and bounded caches at the L2/cluster/sector
//! layers so repeated reads don't re-walk the indirection or re-inflate a
//! cluster already seen.

mod cache;
mod header;

use std::io::{Cursor, Read, Seek, SeekFrom};

use binrw::BinReaderExt;
use flate2::{Decompress, FlushDecompress, Status};
use log::{debug, trace};

use crate::filter::Filter;
use crate::io::ReadSeek;
use crate::limits::OpenOptions;
use crate::types::{
    ByteAddressableImage, Geometry, Image, ImageInfo, MediaTagKind, MediaType, Partition, SectorTagKind, Session,
    Track,
};
use crate::{primitives::datetime, ImgError};

use cache::BoundedCache;
use header::{QcowHeader, RawHeader, HEADER_BYTES};

const COMPRESSED_FLAG: u64 = 0x8000_0000_0000_0000;
const SECTOR_SIZE: u64 = 512;

/// Cheap sniff: does the stream start with the QCOW magic?
pub fn identify(source: &mut dyn ReadSeek) -> Result<bool, ImgError> {
    source.seek(SeekFrom::Start(0))?;
    let mut buf = [0u8; 4];
    let n = source.read(&mut buf)?;
    source.seek(SeekFrom::Start(0))?;
    Ok(header::looks_like_qcow(&buf[..n]))
}

/// An opened QCOW v1 image: the parsed header, the L1 table (loaded whole,
/// it's small), and the three bounded caches the sector-read algorithm
/// consults before touching the backing stream.
pub struct QcowImage {
    info: ImageInfo,
    header: QcowHeader,
    l1: Vec<u64>,
    l2_cache: BoundedCache<u64, Vec<u64>>,
    cluster_cache: BoundedCache<u64, Vec<u8>>,
    sector_cache: BoundedCache<u64, Vec<u8>>,
    img: Filter,
}

impl QcowImage {
    pub fn open(mut filter: Filter, options: OpenOptions) -> Result<Self, ImgError> {
        filter.data_fork().seek(SeekFrom::Start(0))?;
        let mut header_bytes = vec![0u8; HEADER_BYTES];
        filter.data_fork().read_exact(&mut header_bytes)?;
        let mut cursor = Cursor::new(&header_bytes);
        let raw: RawHeader = cursor.read_be()?;
        let header = QcowHeader::parse(&raw)?;

        filter.data_fork().seek(SeekFrom::Start(header.l1_table_offset))?;
        let mut l1_bytes = vec![0u8; header.l1_size * 8];
        filter.data_fork().read_exact(&mut l1_bytes)?;
        let l1: Vec<u64> = l1_bytes
            .chunks_exact(8)
            .map(|c| u64::from_be_bytes(c.try_into().unwrap()))
            .collect();

        let budget = options.limits.max_cache_bytes;
        let l2_entry_bytes = header.l2_size as u64 * 8;
        let l2_cache = BoundedCache::new(budget, l2_entry_bytes.max(1));
        let cluster_cache = BoundedCache::new(budget, header.cluster_size);
        let sector_cache = BoundedCache::new(budget, SECTOR_SIZE);

        let sectors = header.size / SECTOR_SIZE;
        let geometry = Geometry {
            cylinders: (sectors / 16 / 63) as u32,
            heads: 16,
            sectors_per_track: 63,
        };

        let info = ImageInfo {
            sectors,
            sector_size: SECTOR_SIZE as usize,
            media_type: MediaType::GenericHdd,
            application: None,
            application_version: None,
            creator: None,
            creation_time: None,
            modification_time: Some(datetime::from_unix_seconds_unsigned(header.mtime)),
            drive_manufacturer: None,
            media_identity: None,
            sector_tags: crate::types::SectorTagSet::empty(),
            media_tags: crate::types::MediaTagSet::empty(),
            geometry,
        };

        debug!(
            "opened QCOW image: size={} cluster_bits={} l2_bits={} l1_size={}",
            header.size, header.cluster_bits, header.l2_bits, header.l1_size
        );

        Ok(QcowImage {
            info,
            header,
            l1,
            l2_cache,
            cluster_cache,
            sector_cache,
            img: filter,
        })
    }

    /// Load the L2 table backing L1 slot `l1_off`, consulting the cache
    /// first (§4.E step 4).
    fn load_l2(&mut self, l1_off: u64) -> Result<Vec<u64>, ImgError> {
        if let Some(cached) = self.l2_cache.get(&l1_off) {
            return Ok(cached.clone());
        }
        let offset = self.l1[l1_off as usize];
        self.img.data_fork().seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; self.header.l2_size * 8];
        self.img.data_fork().read_exact(&mut buf)?;
        let l2: Vec<u64> = buf.chunks_exact(8).map(|c| u64::from_be_bytes(c.try_into().unwrap())).collect();
        self.l2_cache.put(l1_off, l2.clone());
        Ok(l2)
    }

    /// Resolve an L2 entry to its decoded `cluster_size` bytes, consulting
    /// the cluster cache first (§4.E steps 6-7).
    fn load_cluster(&mut self, entry: u64) -> Result<Vec<u8>, ImgError> {
        if let Some(cached) = self.cluster_cache.get(&entry) {
            return Ok(cached.clone());
        }

        let cluster_size = self.header.cluster_size as usize;
        let cluster = if entry & COMPRESSED_FLAG != 0 {
            let comp_size = (((entry & self.header.comp_mask) >> (63 - self.header.cluster_bits as u32)) + 1) as usize;
            let real_off = entry & !self.header.comp_mask & !COMPRESSED_FLAG;

            let mut compressed = vec![0u8; comp_size];
            self.img.data_fork().seek(SeekFrom::Start(real_off))?;
            self.img.data_fork().read_exact(&mut compressed)?;

            let mut decompressed = vec![0u8; cluster_size];
            let mut decompress = Decompress::new(true);
            match decompress.decompress(&compressed, &mut decompressed, FlushDecompress::Finish) {
                Ok(Status::Ok) | Ok(Status::StreamEnd) => {}
                Ok(Status::BufError) => {
                    return Err(ImgError::CorruptImage("QCOW cluster decompression buffer error".into()));
                }
                Err(e) => {
                    return Err(ImgError::CorruptImage(format!("QCOW cluster decompression failed: {e}")));
                }
            }
            if decompress.total_out() != cluster_size as u64 {
                return Err(ImgError::CorruptImage(format!(
                    "QCOW compressed cluster expanded to {} bytes, expected {cluster_size}",
                    decompress.total_out()
                )));
            }
            decompressed
        } else {
            let mut raw = vec![0u8; cluster_size];
            self.img.data_fork().seek(SeekFrom::Start(entry))?;
            self.img.data_fork().read_exact(&mut raw)?;
            raw
        };

        self.cluster_cache.put(entry, cluster.clone());
        Ok(cluster)
    }

    /// §4.E "Read a 512-byte sector at s", the full 9-step algorithm.
    fn read_sector_raw(&mut self, s: u64) -> Result<Vec<u8>, ImgError> {
        if let Some(cached) = self.sector_cache.get(&s) {
            return Ok(cached.clone());
        }

        let byte_addr = s * SECTOR_SIZE;
        let l1_off = (byte_addr & self.header.l1_mask) >> self.header.shift;
        if l1_off as usize >= self.l1.len() {
            return Err(ImgError::OutOfBounds { lba: s as u32, sectors: self.info.sectors as u32 });
        }
        if self.l1[l1_off as usize] == 0 {
            trace!("QCOW sector {s} hits a hole at L1[{l1_off}]");
            let zeros = vec![0u8; SECTOR_SIZE as usize];
            self.sector_cache.put(s, zeros.clone());
            return Ok(zeros);
        }

        let l2 = self.load_l2(l1_off)?;
        let l2_off = (byte_addr & self.header.l2_mask) >> self.header.cluster_bits;
        let entry = l2[l2_off as usize];
        if entry == 0 {
            trace!("QCOW sector {s} hits a hole at L2[{l2_off}]");
            let zeros = vec![0u8; SECTOR_SIZE as usize];
            self.sector_cache.put(s, zeros.clone());
            return Ok(zeros);
        }

        let cluster = self.load_cluster(entry)?;
        let within = (byte_addr & self.header.sector_mask) as usize;
        let sector = cluster[within..within + SECTOR_SIZE as usize].to_vec();
        self.sector_cache.put(s, sector.clone());
        Ok(sector)
    }
}

impl Image for QcowImage {
    fn info(&self) -> &ImageInfo {
        &self.info
    }

    fn read_sector(&mut self, lba: u32) -> Result<Vec<u8>, ImgError> {
        if lba as u64 >= self.info.sectors {
            return Err(ImgError::OutOfBounds { lba, sectors: self.info.sectors as u32 });
        }
        self.read_sector_raw(lba as u64)
    }

    fn read_sector_in_track(&mut self, _lba: u32, _track: u8) -> Result<Vec<u8>, ImgError> {
        Err(ImgError::FeatureNotPresent("QCOW images have no track structure"))
    }

    fn read_sectors(&mut self, lba: u32, count: u32, _track: Option<u8>) -> Result<Vec<u8>, ImgError> {
        if (lba as u64 + count as u64) > self.info.sectors {
            return Err(ImgError::OutOfBounds { lba, sectors: self.info.sectors as u32 });
        }
        // Concatenate per-sector; the cluster cache absorbs repeated reads
        // into the same cluster without re-inflating it (§4.E read_sectors).
        let mut out = Vec::with_capacity(count as usize * SECTOR_SIZE as usize);
        for i in 0..count {
            out.extend(self.read_sector_raw((lba + i) as u64)?);
        }
        Ok(out)
    }

    fn read_sector_long(&mut self, lba: u32, track: Option<u8>) -> Result<Vec<u8>, ImgError> {
        if track.is_some() {
            return Err(ImgError::FeatureNotPresent("QCOW images have no track structure"));
        }
        self.read_sector(lba)
    }

    fn read_sector_tag(&mut self, _lba: u32, _track: Option<u8>, tag: SectorTagKind) -> Result<Vec<u8>, ImgError> {
        Err(ImgError::TagNotSupportedForTrack { tag, sector_type: crate::types::SectorType::Data })
    }

    fn read_disk_tag(&mut self, _tag: MediaTagKind) -> Result<Vec<u8>, ImgError> {
        Err(ImgError::FeatureNotPresent("QCOW images carry no disk-wide tags"))
    }

    fn tracks(&self) -> &[Track] {
        &[]
    }

    fn sessions(&self) -> &[Session] {
        &[]
    }

    fn partitions(&self) -> &[Partition] {
        &[]
    }

    fn verify_sector(&mut self, lba: u32, _track: Option<u8>) -> Result<Option<bool>, ImgError> {
        let _ = self.read_sector(lba)?;
        Ok(None)
    }

    fn verify_sectors(
        &mut self,
        lba: u32,
        count: u32,
        _track: Option<u8>,
    ) -> Result<(Option<bool>, Vec<u32>, Vec<u32>), ImgError> {
        for i in 0..count {
            self.verify_sector(lba + i, None)?;
        }
        Ok((None, Vec::new(), Vec::new()))
    }

    fn close(&mut self) -> Result<(), ImgError> {
        Ok(())
    }
}

impl ByteAddressableImage for QcowImage {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn be_u64(v: u64) -> [u8; 8] {
        v.to_be_bytes()
    }

    /// Builds a minimal QCOW v1 image: header, one L1 entry, one L2 table,
    /// and raw or compressed cluster payloads as requested.
    struct ImageBuilder {
        buf: Vec<u8>,
    }

    impl ImageBuilder {
        fn new(size: u64, cluster_bits: u8, l2_bits: u8) -> Self {
            let mut buf = vec![0u8; 48];
            buf[0..4].copy_from_slice(&0x5146_49FBu32.to_be_bytes());
            buf[4..8].copy_from_slice(&1u32.to_be_bytes());
            buf[8..16].copy_from_slice(&be_u64(0)); // backing_file_offset
            buf[16..20].copy_from_slice(&0u32.to_be_bytes()); // backing_file_size
            buf[20..24].copy_from_slice(&0u32.to_be_bytes()); // mtime
            buf[24..32].copy_from_slice(&be_u64(size));
            buf[32] = cluster_bits;
            buf[33] = l2_bits;
            buf[34..36].copy_from_slice(&0u16.to_be_bytes());
            buf[36..40].copy_from_slice(&0u32.to_be_bytes()); // crypt_method
            buf[40..48].copy_from_slice(&be_u64(48)); // l1_table_offset
            ImageBuilder { buf }
        }

        fn l1_offset(&self) -> u64 {
            48
        }

        fn push_l1(&mut self, entries: &[u64]) -> u64 {
            let off = self.buf.len() as u64;
            for e in entries {
                self.buf.extend_from_slice(&be_u64(*e));
            }
            off
        }

        fn push_l2(&mut self, entries: &[u64]) -> u64 {
            let off = self.buf.len() as u64;
            for e in entries {
                self.buf.extend_from_slice(&be_u64(*e));
            }
            off
        }

        fn push_compressed_cluster(&mut self, bytes: &[u8]) -> (u64, u64) {
            let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(bytes).unwrap();
            let compressed = encoder.finish().unwrap();
            let off = self.buf.len() as u64;
            let len = compressed.len() as u64;
            self.buf.extend_from_slice(&compressed);
            (off, len)
        }

        fn finish(self) -> Vec<u8> {
            self.buf
        }
    }

    #[test]
    fn all_zero_l1_reads_back_all_zero_sectors() {
        let mut builder = ImageBuilder::new(1_048_576, 12, 9);
        let l1_off = builder.l1_offset();
        assert_eq!(l1_off, 48);
        builder.push_l1(&[0u64; 1]);
        let bytes = builder.finish();

        let filter = Filter::open_bytes(bytes).unwrap();
        let mut image = QcowImage::open(filter, OpenOptions::default()).unwrap();

        for s in [0u32, 1, 2047] {
            let sector = image.read_sector(s).unwrap();
            assert_eq!(sector, vec![0u8; 512]);
        }
        let all = image.read_sectors(0, 2048, None).unwrap();
        assert_eq!(all.len(), 1_048_576);
        assert!(all.iter().all(|&b| b == 0));
    }

    #[test]
    fn compressed_cluster_expands_to_requested_fill() {
        let mut builder = ImageBuilder::new(1_048_576, 12, 9);
        let l2_off = 48 + 8; // after the single L1 entry
        let mut l2 = vec![0u64; 512];

        let payload = vec![0xA5u8; 4096];
        // Reserve space for L1 (1 entry) and L2 (512 entries) before the
        // cluster payload itself.
        builder.push_l1(&[l2_off]);
        let l2_table_off = builder.push_l2(&vec![0u64; 512]);
        assert_eq!(l2_table_off, l2_off);

        let (comp_off, comp_len) = builder.push_compressed_cluster(&payload);
        let comp_mask = (4096u64 - 1) << (63 - 12);
        let entry = COMPRESSED_FLAG | (((comp_len - 1) << (63 - 12)) & comp_mask) | comp_off;
        l2[0] = entry;

        let mut bytes = builder.finish();
        for (i, e) in l2.iter().enumerate() {
            bytes[(l2_table_off as usize + i * 8)..(l2_table_off as usize + i * 8 + 8)]
                .copy_from_slice(&be_u64(*e));
        }

        let filter = Filter::open_bytes(bytes).unwrap();
        let mut image = QcowImage::open(filter, OpenOptions::default()).unwrap();

        let sector0 = image.read_sector(0).unwrap();
        assert_eq!(sector0, vec![0xA5u8; 512]);
        let sector7 = image.read_sector(7).unwrap();
        assert_eq!(sector7, vec![0xA5u8; 512]);
        let sector8 = image.read_sector(8).unwrap();
        assert_eq!(sector8, vec![0u8; 512]);
    }

    #[test]
    fn geometry_is_synthesized_from_sector_count() {
        let mut builder = ImageBuilder::new(1_048_576, 12, 9);
        builder.push_l1(&[0u64; 1]);
        let bytes = builder.finish();
        let filter = Filter::open_bytes(bytes).unwrap();
        let image = QcowImage::open(filter, OpenOptions::default()).unwrap();
        assert_eq!(image.info().geometry.heads, 16);
        assert_eq!(image.info().geometry.sectors_per_track, 63);
    }
}
