//! CloneCD optical image decoder (§4.D): a plain-text `.ccd` session
//! descriptor reconstructed into a full TOC, paired with a raw `.img` data
//! fork and an optional `.sub` subchannel fork.

mod descriptor;
mod reconstruct;
mod sector_tags;

use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

use log::{debug, trace, warn};

use crate::filter::Filter;
use crate::io::ReadSeek;
use crate::limits::OpenOptions;
use crate::primitives::scramble;
use crate::types::{
    Geometry, Image, ImageInfo, MediaTagKind, MediaTagSet, MediaType, OpticalImage, Partition, SectorTagKind,
    SectorTagSet, SectorType, Session, Track,
};
use crate::util::looks_like_text;
use crate::{ImgError, CD_RAW_SECTOR_SIZE, CD_SUBCHANNEL_SIZE};

const CONTROL_DATA_TRACK: u8 = 0x04;
const CONTROL_DATA_TRACK_INCREMENTAL: u8 = 0x0D;
const CD_SYNC_PATTERN: [u8; 12] = [0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00];

fn is_data_track_control(control: u8) -> bool {
    matches!(control & 0x0D, CONTROL_DATA_TRACK | CONTROL_DATA_TRACK_INCREMENTAL)
}

/// Cheap sniff: the first non-blank line of a CloneCD descriptor is
/// `[CloneCD]`, and the artifact must look like text, not a binary blob.
pub fn identify(source: &mut dyn ReadSeek) -> Result<bool, ImgError> {
    source.seek(SeekFrom::Start(0))?;
    let mut buf = [0u8; 512];
    let n = source.read(&mut buf)?;
    source.seek(SeekFrom::Start(0))?;

    if !looks_like_text(&buf[..n]) {
        return Ok(false);
    }
    let text = String::from_utf8_lossy(&buf[..n]);
    let recognized = text
        .lines()
        .find(|l| !l.trim().is_empty())
        .map(|l| l.trim().eq_ignore_ascii_case("[CloneCD]"))
        .unwrap_or(false);
    Ok(recognized)
}

/// An opened CloneCD image: the raw `.img` fork, optional `.sub` fork, and
/// the tracks/sessions/partitions reconstructed from the `.ccd` descriptor.
pub struct CcdImage {
    info: ImageInfo,
    tracks: Vec<Track>,
    sessions: Vec<Session>,
    partitions: Vec<Partition>,
    full_toc: Vec<u8>,
    cdtext: Vec<u8>,
    atip: Option<Vec<u8>>,
    scrambled: bool,
    img: Filter,
    sub: Option<Filter>,
}

fn sibling_path(base: &std::path::Path, extension: &str) -> PathBuf {
    base.with_extension(extension)
}

impl CcdImage {
    pub fn open(mut filter: Filter, options: OpenOptions) -> Result<Self, ImgError> {
        let mut text = String::new();
        filter.data_fork().read_to_string(&mut text)?;

        let descriptor = descriptor::parse(&text)?;
        let recon = reconstruct::reconstruct(&descriptor.entries)?;

        let base_path = filter
            .base_path()
            .ok_or_else(|| ImgError::IncompleteImage("CloneCD images must be opened from a path, not bytes".into()))?
            .to_path_buf();

        let img_path = sibling_path(&base_path, "img");
        let mut img = Filter::open_path(&img_path)
            .map_err(|_| ImgError::IncompleteImage(format!("missing companion data file: {}", img_path.display())))?;

        let sub_path = sibling_path(&base_path, "sub");
        let sub = Filter::open_path(&sub_path).ok();
        if sub.is_none() {
            trace!("no .sub companion file found at {}", sub_path.display());
        }

        let mut tracks = recon.tracks;
        for track in &mut tracks {
            let control = recon.track_controls.get(&track.sequence).copied().unwrap_or(0);
            autodetect_track_mode(track, control, &mut img, descriptor.disc.data_tracks_scrambled)?;
        }

        let partitions = tracks
            .iter()
            .map(|t| Partition {
                start_sector: t.start_sector,
                length_sectors: t.length_sectors(),
                offset: t.start_sector as u64 * CD_RAW_SECTOR_SIZE as u64,
                size: t.length_sectors() as u64 * t.raw_bytes_per_sector as u64,
                partition_type: "cd-track".to_string(),
            })
            .collect();

        let media_type = classify_media_type(&tracks, recon.sessions.len());

        let sector_size = tracks.iter().map(|t| t.effective_bytes_per_sector).max().unwrap_or(2352);
        let total_sectors = tracks.iter().map(|t| t.end_sector as u64 + 1).max().unwrap_or(0);

        let mut sector_tags = SectorTagSet::empty();
        for track in &tracks {
            for tag in [
                SectorTagKind::Sync,
                SectorTagKind::Header,
                SectorTagKind::SubHeader,
                SectorTagKind::Ecc,
                SectorTagKind::EccP,
                SectorTagKind::EccQ,
                SectorTagKind::Edc,
            ] {
                if sector_tags::tag_region(track.sector_type, tag).is_some() {
                    sector_tags |= tag_to_flag(tag);
                }
            }
        }
        if sub.is_some() {
            sector_tags |= SectorTagSet::SUBCHANNEL;
        }

        let atip = recon.metadata.atip_manufacturer.map(|(psec, pframe)| vec![psec, pframe]);

        let mut media_tags = MediaTagSet::FULL_TOC;
        if !descriptor.cdtext.is_empty() {
            media_tags |= MediaTagSet::CD_TEXT;
        }
        if atip.is_some() {
            media_tags |= MediaTagSet::ATIP;
        }

        let info = ImageInfo {
            sectors: total_sectors,
            sector_size,
            media_type,
            application: None,
            application_version: None,
            creator: None,
            creation_time: filter.creation_time(),
            modification_time: filter.last_write_time(),
            drive_manufacturer: None,
            media_identity: recon.metadata.disc_serial.map(|s| format!("{s:06X}")),
            sector_tags,
            media_tags,
            geometry: Geometry::default(),
        };

        let full_toc = reconstruct::full_toc(
            &descriptor.entries,
            recon.sessions.first().map(|s| s.sequence).unwrap_or(1),
            recon.sessions.last().map(|s| s.sequence).unwrap_or(1),
        )
        .to_bytes()?;

        let _ = options;
        debug!(
            "opened CloneCD image: {} tracks, {} sessions, media_type={:?}",
            tracks.len(),
            recon.sessions.len(),
            media_type
        );

        Ok(CcdImage {
            info,
            tracks,
            sessions: recon.sessions,
            partitions,
            full_toc,
            cdtext: descriptor.cdtext,
            atip,
            scrambled: descriptor.disc.data_tracks_scrambled,
            img,
            sub,
        })
    }

    fn find_track(&self, lba: u32) -> Option<&Track> {
        self.tracks.iter().find(|t| t.contains(lba))
    }

    fn track_by_sequence(&self, sequence: u8) -> Option<&Track> {
        self.tracks.iter().find(|t| t.sequence == sequence)
    }

    /// Read the stored raw record for `lba` and descramble it if the
    /// descriptor marked data tracks as CD-scrambled (§4.D "Parse"); audio
    /// tracks are never scrambled and pass through untouched.
    fn read_raw_record(&mut self, lba: u32, sector_type: SectorType) -> Result<Vec<u8>, ImgError> {
        let offset = lba as u64 * CD_RAW_SECTOR_SIZE as u64;
        self.img.data_fork().seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; CD_RAW_SECTOR_SIZE];
        self.img.data_fork().read_exact(&mut buf)?;
        if self.scrambled && sector_type != SectorType::Audio {
            scramble::descramble_sector(&mut buf);
        }
        Ok(buf)
    }

    fn read_subchannel(&mut self, lba: u32) -> Result<Vec<u8>, ImgError> {
        let sub = self
            .sub
            .as_mut()
            .ok_or(ImgError::FeatureNotPresent("subchannel data (.sub)"))?;
        let offset = lba as u64 * CD_SUBCHANNEL_SIZE as u64;
        sub.data_fork().seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; CD_SUBCHANNEL_SIZE];
        sub.data_fork().read_exact(&mut buf)?;
        Ok(buf)
    }

    fn cook(&self, raw: &[u8], track: &Track) -> Vec<u8> {
        match track.sector_type {
            SectorType::Audio => raw.to_vec(),
            SectorType::CdMode1 => raw[16..16 + 2048].to_vec(),
            SectorType::CdMode2Form1 => raw[24..24 + 2048].to_vec(),
            SectorType::CdMode2Form2 => raw[24..24 + 2324].to_vec(),
            SectorType::CdMode2Formless => raw[16..16 + 2336].to_vec(),
            SectorType::Data => raw.to_vec(),
        }
    }
}

fn tag_to_flag(tag: SectorTagKind) -> SectorTagSet {
    match tag {
        SectorTagKind::Sync => SectorTagSet::SYNC,
        SectorTagKind::Header => SectorTagSet::HEADER,
        SectorTagKind::SubHeader => SectorTagSet::SUB_HEADER,
        SectorTagKind::Ecc => SectorTagSet::ECC,
        SectorTagKind::EccP => SectorTagSet::ECC_P,
        SectorTagKind::EccQ => SectorTagSet::ECC_Q,
        SectorTagKind::Edc => SectorTagSet::EDC,
        SectorTagKind::Subchannel => SectorTagSet::SUBCHANNEL,
    }
}

/// §4.D "Track mode autodetect": inspect the raw record at a data track's
/// first sector to classify it as Mode 1, Mode 2 Form 1/2, or Formless.
fn autodetect_track_mode(track: &mut Track, control: u8, img: &mut Filter, scrambled: bool) -> Result<(), ImgError> {
    if !is_data_track_control(control) {
        track.sector_type = SectorType::Audio;
        track.effective_bytes_per_sector = CD_RAW_SECTOR_SIZE;
        return Ok(());
    }

    let offset = track.start_sector as u64 * CD_RAW_SECTOR_SIZE as u64;
    img.data_fork().seek(SeekFrom::Start(offset))?;
    let mut raw = vec![0u8; CD_RAW_SECTOR_SIZE];
    img.data_fork().read_exact(&mut raw)?;

    if scrambled {
        scramble::descramble_sector(&mut raw);
    }

    if raw[0..12] != CD_SYNC_PATTERN {
        warn!("data track {} has no CD sync pattern at its first sector; leaving as Data", track.sequence);
        track.sector_type = SectorType::Data;
        track.effective_bytes_per_sector = 512;
        return Ok(());
    }

    match raw[15] {
        1 => {
            track.sector_type = SectorType::CdMode1;
            track.effective_bytes_per_sector = 2048;
        }
        2 => {
            let sub_a = &raw[16..20];
            let sub_b = &raw[20..24];
            if sub_a == sub_b && sub_a.iter().any(|b| *b != 0) && sub_a[2] & 0x20 != 0 {
                track.sector_type = SectorType::CdMode2Form2;
                track.effective_bytes_per_sector = 2324;
            } else if sub_a == sub_b {
                track.sector_type = SectorType::CdMode2Form1;
                track.effective_bytes_per_sector = 2048;
            } else {
                track.sector_type = SectorType::CdMode2Formless;
                track.effective_bytes_per_sector = 2336;
            }
        }
        other => {
            warn!("unrecognized sector mode byte {other} on track {}", track.sequence);
            track.sector_type = SectorType::CdMode2Formless;
            track.effective_bytes_per_sector = 2336;
        }
    }

    Ok(())
}

/// §4.D "Media type heuristic".
fn classify_media_type(tracks: &[Track], session_count: usize) -> MediaType {
    let has_data = tracks.iter().any(|t| t.sector_type != SectorType::Audio);
    let has_audio = tracks.iter().any(|t| t.sector_type == SectorType::Audio);
    let has_mode2 = tracks
        .iter()
        .any(|t| matches!(t.sector_type, SectorType::CdMode2Form1 | SectorType::CdMode2Form2 | SectorType::CdMode2Formless));
    let first_is_audio = tracks.first().map(|t| t.sector_type == SectorType::Audio).unwrap_or(false);
    let first_is_data = tracks.first().map(|t| t.sector_type != SectorType::Audio).unwrap_or(false);

    if !has_data {
        MediaType::CdDa
    } else if first_is_audio && has_data && session_count > 1 && has_mode2 {
        MediaType::CdPlus
    } else if (first_is_data && has_audio) || has_mode2 {
        MediaType::CdRomXa
    } else if !has_audio {
        MediaType::CdRom
    } else {
        MediaType::Cd
    }
}

impl Image for CcdImage {
    fn info(&self) -> &ImageInfo {
        &self.info
    }

    fn read_sector(&mut self, lba: u32) -> Result<Vec<u8>, ImgError> {
        let track = self
            .find_track(lba)
            .cloned()
            .ok_or(ImgError::OutOfBounds { lba, sectors: self.info.sectors as u32 })?;
        let raw = self.read_raw_record(lba, track.sector_type)?;
        Ok(self.cook(&raw, &track))
    }

    fn read_sector_in_track(&mut self, lba: u32, track_no: u8) -> Result<Vec<u8>, ImgError> {
        let track = self
            .track_by_sequence(track_no)
            .cloned()
            .ok_or(ImgError::OutOfBounds { lba, sectors: self.info.sectors as u32 })?;
        if !track.contains(lba) {
            return Err(ImgError::OutOfBounds { lba, sectors: self.info.sectors as u32 });
        }
        let raw = self.read_raw_record(lba, track.sector_type)?;
        Ok(self.cook(&raw, &track))
    }

    fn read_sectors(&mut self, lba: u32, count: u32, track: Option<u8>) -> Result<Vec<u8>, ImgError> {
        let mut out = Vec::new();
        for i in 0..count {
            let sector = match track {
                Some(t) => self.read_sector_in_track(lba + i, t)?,
                None => self.read_sector(lba + i)?,
            };
            out.extend(sector);
        }
        Ok(out)
    }

    fn read_sector_long(&mut self, lba: u32, track: Option<u8>) -> Result<Vec<u8>, ImgError> {
        if let Some(t) = track {
            let track = self
                .track_by_sequence(t)
                .ok_or(ImgError::OutOfBounds { lba, sectors: self.info.sectors as u32 })?;
            if !track.contains(lba) {
                return Err(ImgError::OutOfBounds { lba, sectors: self.info.sectors as u32 });
            }
        }
        let sector_type = self.find_track(lba).map(|t| t.sector_type).unwrap_or(SectorType::Audio);
        self.read_raw_record(lba, sector_type)
    }

    fn read_sector_tag(&mut self, lba: u32, track: Option<u8>, tag: SectorTagKind) -> Result<Vec<u8>, ImgError> {
        if tag == SectorTagKind::Subchannel {
            return self.read_subchannel(lba);
        }
        let sector_type = match track {
            Some(t) => self
                .track_by_sequence(t)
                .map(|t| t.sector_type)
                .ok_or(ImgError::OutOfBounds { lba, sectors: self.info.sectors as u32 })?,
            None => self
                .find_track(lba)
                .map(|t| t.sector_type)
                .ok_or(ImgError::OutOfBounds { lba, sectors: self.info.sectors as u32 })?,
        };
        let raw = self.read_raw_record(lba, sector_type)?;
        sector_tags::slice_tag(&raw, sector_type, tag)
    }

    fn read_disk_tag(&mut self, tag: MediaTagKind) -> Result<Vec<u8>, ImgError> {
        match tag {
            MediaTagKind::CdFullToc => Ok(self.full_toc.clone()),
            MediaTagKind::CdText => {
                if self.cdtext.is_empty() {
                    Err(ImgError::FeatureNotPresent("CD-Text"))
                } else {
                    Ok(self.cdtext.clone())
                }
            }
            MediaTagKind::CdAtip => self.atip.clone().ok_or(ImgError::FeatureNotPresent("ATIP")),
        }
    }

    fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    fn verify_sector(&mut self, lba: u32, track: Option<u8>) -> Result<Option<bool>, ImgError> {
        // No per-sector checksum/EDC validation is implemented; unknown.
        let _ = self.read_sector_long(lba, track)?;
        Ok(None)
    }

    fn verify_sectors(
        &mut self,
        lba: u32,
        count: u32,
        track: Option<u8>,
    ) -> Result<(Option<bool>, Vec<u32>, Vec<u32>), ImgError> {
        let mut unknown = Vec::new();
        for i in 0..count {
            if self.verify_sector(lba + i, track)?.is_none() {
                unknown.push(lba + i);
            }
        }
        Ok((None, Vec::new(), unknown))
    }

    fn close(&mut self) -> Result<(), ImgError> {
        Ok(())
    }
}

impl OpticalImage for CcdImage {}
