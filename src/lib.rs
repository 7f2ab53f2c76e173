/*
    imgcore
    Container/format layer for disk and optical image preservation.

    Copyright 2026 Image Preservation Suite Contributors

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the "Software"),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------
*/

//! # imgcore
//!
//! `imgcore` identifies disk and optical image containers from an opaque byte
//! source, parses their metadata, and exposes a logical sector/track view
//! backed by possibly compressed, sparse, or split on-disk representations.
//!
//! The entry point is [`Registry`]: it probes an opened [`Filter`] against
//! every known format plugin and hands back a boxed [`image::Image`] on the
//! first match. From there, callers read sectors, tags, and disk-wide media
//! tags without needing to know which concrete format they opened.
//!
//! This crate currently ships two format plugins as the reference
//! implementations of the plugin contract: [`formats::ccd`] (CloneCD optical
//! images) and [`formats::qcow`] (QCOW v1 sparse block images).

pub mod filter;
pub mod formats;
pub mod io;
pub mod limits;
pub mod prelude;
pub mod primitives;
pub mod registry;
pub mod tape;
pub mod toc;
pub mod types;
mod util;

pub use filter::Filter;
pub use limits::{Limits, OpenOptions};
pub use registry::{FormatKind, Registry};
pub use types::{Image, ImageInfo, MediaTagKind, MediaType, OpticalImage, Partition, SectorTagKind, SectorType, Session, Track, TrackSubchannelType, XmlMediaType};

use thiserror::Error;

/// Maximum sector size this crate will ever allocate a single read buffer
/// for (defends against corrupt headers claiming an absurd sector size).
pub const MAXIMUM_SECTOR_SIZE: usize = 1 << 16;
/// Raw bytes per CD sector record (sync + header/subheader + user data + EDC/ECC).
pub const CD_RAW_SECTOR_SIZE: usize = 2352;
/// Bytes per CD subchannel block, raw P-W interleaved.
pub const CD_SUBCHANNEL_SIZE: usize = 96;
/// Frames (sectors) per second of CD audio time.
pub const CD_FRAMES_PER_SECOND: u32 = 75;
/// Seconds per minute of CD audio time.
pub const CD_SECONDS_PER_MINUTE: u32 = 60;
/// The 2-second pregap CD addressing is offset by: LBA 0 == MSF 00:02:00.
pub const CD_MSF_PREGAP_FRAMES: i64 = 2 * CD_SECONDS_PER_MINUTE as i64 * CD_FRAMES_PER_SECOND as i64;

/// The crate-wide tagged error type. Every fallible public operation in
/// `imgcore` returns `Result<_, ImgError>`.
#[derive(Debug, Error)]
pub enum ImgError {
    #[error("no format plugin recognized this artifact")]
    NotIdentified,
    #[error("a required companion file is missing: {0}")]
    IncompleteImage(String),
    #[error("the disk image is corrupt: {0}")]
    CorruptImage(String),
    #[error("sector address out of bounds: lba {lba} (image has {sectors} sectors)")]
    OutOfBounds { lba: u32, sectors: u32 },
    #[error("tag {tag:?} is not supported for a track of type {sector_type:?}")]
    TagNotSupportedForTrack { tag: SectorTagKind, sector_type: SectorType },
    #[error("feature not present on this image: {0}")]
    FeatureNotPresent(&'static str),
    #[error("feature not implemented by this plugin: {0}")]
    FeatureNotImplemented(&'static str),
    #[error("I/O error: {0}")]
    IoError(String),
    #[error("binary layout error: {0}")]
    BinRwError(String),
}

impl From<std::io::Error> for ImgError {
    fn from(err: std::io::Error) -> Self {
        ImgError::IoError(err.to_string())
    }
}

impl From<binrw::Error> for ImgError {
    fn from(err: binrw::Error) -> Self {
        ImgError::BinRwError(err.to_string())
    }
}

impl From<std::str::Utf8Error> for ImgError {
    fn from(err: std::str::Utf8Error) -> Self {
        ImgError::CorruptImage(format!("invalid UTF-8 in text descriptor: {err}"))
    }
}

/// Process-exit-facing classification of an [`ImgError`], for UI adapters
/// that map the image core's errors onto exit codes. The core itself has no
/// process-exit concept; this is a pure, side-effect-free projection.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExitClass {
    NoError,
    CannotOpenFile,
    UnrecognizedFormat,
    CannotOpenFormat,
    Other,
}

impl ImgError {
    pub fn exit_class(&self) -> ExitClass {
        match self {
            ImgError::NotIdentified => ExitClass::UnrecognizedFormat,
            ImgError::IoError(_) => ExitClass::CannotOpenFile,
            ImgError::IncompleteImage(_) | ImgError::CorruptImage(_) | ImgError::BinRwError(_) => {
                ExitClass::CannotOpenFormat
            }
            _ => ExitClass::Other,
        }
    }
}
