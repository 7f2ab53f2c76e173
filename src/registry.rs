/*
    imgcore::registry

    Format detection and dispatch (§4.B), modeled on the teacher's
    `DiskImageFileFormat` enum-dispatch plugin registry (`file_parsers/mod.rs`,
    `detect.rs`): a closed enum of known formats, each able to `identify`
    itself against a byte source and `open` into a boxed [`Image`].
*/
use std::path::Path;

use log::{debug, trace};

use crate::filter::Filter;
use crate::formats::{ccd, qcow};
use crate::io::ReadSeek;
use crate::limits::OpenOptions;
use crate::types::Image;
use crate::ImgError;

/// A known container format this crate can identify and open.
#[derive(Debug, Copy, Clone, PartialEq, Eq, strum::Display)]
pub enum FormatKind {
    CloneCd,
    Qcow,
}

/// The ordered list of formats probed during detection. Order matters only
/// in the pathological case where a corrupt artifact satisfies more than one
/// format's sniff; CloneCD's descriptor sniff and QCOW's magic sniff don't
/// overlap in practice.
const FORMATS: [FormatKind; 2] = [FormatKind::CloneCd, FormatKind::Qcow];

impl FormatKind {
    /// Cheap, side-effect-free sniff: does `source` look like this format?
    /// Does not validate the full structure, only enough to route to `open`.
    fn identify(self, source: &mut dyn ReadSeek) -> Result<bool, ImgError> {
        match self {
            FormatKind::CloneCd => ccd::identify(source),
            FormatKind::Qcow => qcow::identify(source),
        }
    }

    fn open(self, filter: Filter, options: OpenOptions) -> Result<Box<dyn Image>, ImgError> {
        match self {
            FormatKind::CloneCd => Ok(Box::new(ccd::CcdImage::open(filter, options)?)),
            FormatKind::Qcow => Ok(Box::new(qcow::QcowImage::open(filter, options)?)),
        }
    }
}

/// Entry point: detects and opens an image from a [`Filter`].
pub struct Registry;

impl Registry {
    /// Probe every known format against `filter`'s data fork, returning the
    /// first match without fully parsing it.
    pub fn detect(filter: &mut Filter) -> Result<FormatKind, ImgError> {
        let source = filter.data_fork();
        for format in FORMATS {
            trace!("probing format {format}");
            if format.identify(source)? {
                debug!("identified format {format}");
                return Ok(format);
            }
        }
        Err(ImgError::NotIdentified)
    }

    /// Detect and fully open `filter` as the first matching format.
    pub fn open(mut filter: Filter, options: OpenOptions) -> Result<Box<dyn Image>, ImgError> {
        let format = Self::detect(&mut filter)?;
        format.open(filter, options)
    }

    /// Convenience: open a path directly, going through [`Filter::open_path`].
    pub fn open_path<P: AsRef<Path>>(path: P, options: OpenOptions) -> Result<Box<dyn Image>, ImgError> {
        let filter = Filter::open_path(path)?;
        Self::open(filter, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_bytes_fail_to_identify() {
        let mut filter = Filter::open_bytes(b"not a recognized container".to_vec()).unwrap();
        let result = Registry::detect(&mut filter);
        assert!(matches!(result, Err(ImgError::NotIdentified)));
    }
}
