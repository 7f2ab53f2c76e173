/*
    imgcore::types

    The image contract (§4.C): the uniform capability surface every format
    plugin exposes, plus the data model records (§3) that populate it.
*/
use bitflags::bitflags;
use chrono::{DateTime, Utc};
use strum::{Display, EnumIter};

use crate::{ImgError, CD_RAW_SECTOR_SIZE};

/// Broad media category used by callers that need to branch on optical vs.
/// block vs. tape semantics without matching on every [`MediaType`] variant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Display)]
pub enum XmlMediaType {
    Optical,
    Block,
    Linear,
    Tape,
}

/// Specific media type, as reported in disc/drive metadata.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, EnumIter)]
pub enum MediaType {
    Cd,
    CdRom,
    CdRomXa,
    CdPlus,
    CdDa,
    DvdPlusR,
    GenericHdd,
    GenericFloppy,
    Unknown,
}

impl MediaType {
    pub fn xml_type(self) -> XmlMediaType {
        match self {
            MediaType::Cd | MediaType::CdRom | MediaType::CdRomXa | MediaType::CdPlus | MediaType::CdDa => {
                XmlMediaType::Optical
            }
            MediaType::DvdPlusR => XmlMediaType::Optical,
            MediaType::GenericHdd => XmlMediaType::Block,
            MediaType::GenericFloppy => XmlMediaType::Block,
            MediaType::Unknown => XmlMediaType::Block,
        }
    }
}

/// CD sector type, driving both effective sector size and which sector tags
/// are addressable (§4.C table).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, EnumIter)]
pub enum SectorType {
    Audio,
    CdMode1,
    CdMode2Form1,
    CdMode2Form2,
    CdMode2Formless,
    Data,
}

impl SectorType {
    /// Effective (cooked) bytes per sector for this sector type.
    pub fn effective_size(self) -> usize {
        match self {
            SectorType::Audio => CD_RAW_SECTOR_SIZE,
            SectorType::CdMode1 => 2048,
            SectorType::CdMode2Form1 => 2048,
            SectorType::CdMode2Form2 => 2324,
            SectorType::CdMode2Formless => 2336,
            SectorType::Data => 512,
        }
    }
}

/// A named subregion of a raw CD sector record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display)]
pub enum SectorTagKind {
    Sync,
    Header,
    SubHeader,
    Ecc,
    EccP,
    EccQ,
    Edc,
    Subchannel,
}

/// A disc-wide metadata blob a plugin may be able to produce via
/// `read_disk_tag`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display)]
pub enum MediaTagKind {
    CdFullToc,
    CdText,
    CdAtip,
}

bitflags! {
    /// Which [`SectorTagKind`]s a plugin advertises as supported, indexed by
    /// bit position matching [`SectorTagKind`]'s declaration order.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct SectorTagSet: u16 {
        const SYNC        = 0b0000_0001;
        const HEADER      = 0b0000_0010;
        const SUB_HEADER  = 0b0000_0100;
        const ECC         = 0b0000_1000;
        const ECC_P       = 0b0001_0000;
        const ECC_Q       = 0b0010_0000;
        const EDC         = 0b0100_0000;
        const SUBCHANNEL  = 0b1000_0000;
    }
}

bitflags! {
    /// Which [`MediaTagKind`]s a plugin advertises as supported.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct MediaTagSet: u8 {
        const FULL_TOC = 0b0000_0001;
        const CD_TEXT  = 0b0000_0010;
        const ATIP     = 0b0000_0100;
    }
}

/// CHS-style geometry for block images; unused (all-zero) for optical images.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Geometry {
    pub cylinders: u32,
    pub heads: u32,
    pub sectors_per_track: u32,
}

/// Record associated 1:1 with an opened image (§3 `ImageInfo`).
#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub sectors: u64,
    pub sector_size: usize,
    pub media_type: MediaType,
    pub application: Option<String>,
    pub application_version: Option<String>,
    pub creator: Option<String>,
    pub creation_time: Option<DateTime<Utc>>,
    pub modification_time: Option<DateTime<Utc>>,
    pub drive_manufacturer: Option<String>,
    pub media_identity: Option<String>,
    pub sector_tags: SectorTagSet,
    pub media_tags: MediaTagSet,
    pub geometry: Geometry,
}

impl Default for ImageInfo {
    fn default() -> Self {
        ImageInfo {
            sectors: 0,
            sector_size: 0,
            media_type: MediaType::Unknown,
            application: None,
            application_version: None,
            creator: None,
            creation_time: None,
            modification_time: None,
            drive_manufacturer: None,
            media_identity: None,
            sector_tags: SectorTagSet::empty(),
            media_tags: MediaTagSet::empty(),
            geometry: Geometry::default(),
        }
    }
}

/// Subchannel storage shape for a track, if any (§3 `Track`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum TrackSubchannelType {
    #[default]
    None,
    Raw,
    Q16Interleaved,
}

/// A single optical/tape track (§3 `Track`).
#[derive(Debug, Clone)]
pub struct Track {
    pub sequence: u8,
    pub session: u8,
    pub start_sector: u32,
    pub end_sector: u32,
    pub raw_bytes_per_sector: usize,
    pub effective_bytes_per_sector: usize,
    pub sector_type: SectorType,
    pub file_offset: u64,
    pub subchannel_offset: Option<u64>,
    pub subchannel_type: TrackSubchannelType,
}

impl Track {
    pub fn length_sectors(&self) -> u32 {
        self.end_sector - self.start_sector + 1
    }

    pub fn contains(&self, lba: u32) -> bool {
        lba >= self.start_sector && lba <= self.end_sector
    }
}

/// A CD session (§3 `Session`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Session {
    pub sequence: u8,
    pub first_track: u8,
    pub last_track: u8,
    pub first_sector: u32,
    pub last_sector: u32,
}

/// A partition synthesized 1:1 from a track for optical images (§3 `Partition`).
#[derive(Debug, Clone)]
pub struct Partition {
    pub start_sector: u32,
    pub length_sectors: u32,
    pub offset: u64,
    pub size: u64,
    pub partition_type: String,
}

/// The uniform capability surface every container plugin exposes (§4.C).
///
/// This is the object-safe trait `Registry::open` hands back as
/// `Box<dyn Image>`. Optical- and byte-addressable-specific operations live
/// on the extension traits [`OpticalImage`] and [`ByteAddressableImage`];
/// a plugin implements whichever of those fit its media, in addition to
/// `Image` itself, rather than inheriting from a single god-trait.
pub trait Image {
    fn info(&self) -> &ImageInfo;

    /// Effective-size bytes for the sector at `lba`; spans tracks.
    fn read_sector(&mut self, lba: u32) -> Result<Vec<u8>, ImgError>;

    /// Effective-size bytes for the sector at `lba`, scoped to `track`.
    /// Fails with [`ImgError::OutOfBounds`] if `lba` falls outside the track.
    fn read_sector_in_track(&mut self, lba: u32, track: u8) -> Result<Vec<u8>, ImgError>;

    fn read_sectors(&mut self, lba: u32, count: u32, track: Option<u8>) -> Result<Vec<u8>, ImgError>;

    /// Raw 2352 bytes (optical) or the raw on-disk record otherwise.
    fn read_sector_long(&mut self, lba: u32, track: Option<u8>) -> Result<Vec<u8>, ImgError>;

    fn read_sector_tag(&mut self, lba: u32, track: Option<u8>, tag: SectorTagKind) -> Result<Vec<u8>, ImgError>;

    fn read_disk_tag(&mut self, tag: MediaTagKind) -> Result<Vec<u8>, ImgError>;

    fn tracks(&self) -> &[Track];
    fn sessions(&self) -> &[Session];
    fn partitions(&self) -> &[Partition];

    fn verify_sector(&mut self, lba: u32, track: Option<u8>) -> Result<Option<bool>, ImgError>;

    /// Returns `(overall, failing_lbas, unknown_lbas)`.
    #[allow(clippy::type_complexity)]
    fn verify_sectors(
        &mut self,
        lba: u32,
        count: u32,
        track: Option<u8>,
    ) -> Result<(Option<bool>, Vec<u32>, Vec<u32>), ImgError>;

    /// Releases the backing [`crate::Filter`](s) this image owns.
    fn close(&mut self) -> Result<(), ImgError>;
}

/// Marker/extension trait for plugins backing random-access, track-structured
/// optical media (CDs, DVD+R). Composes with [`Image`] rather than replacing
/// it: an optical plugin implements both.
pub trait OpticalImage: Image {}

/// Marker/extension trait for plugins backing flat, byte-addressable media
/// (QCOW and other block images) with no track structure.
pub trait ByteAddressableImage: Image {}
