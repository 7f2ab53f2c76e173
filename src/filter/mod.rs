//! Byte-source abstraction (§4.A): opens a path or an in-memory buffer,
//! transparently unwrapping AppleSingle/MacBinary containers so format
//! decoders always see a plain data fork plus, where present, a resource
//! fork and file timestamps.

mod applesingle;
mod macbinary;
mod offset_stream;

use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::io::ReadSeek;
use crate::ImgError;
use offset_stream::OffsetStream;

/// A filter-owned byte source: either a bounded window into a container's
/// data/resource fork, or the whole underlying stream unchanged.
enum Source {
    Whole(Box<dyn ReadSeek>),
    Windowed(OffsetStream<Box<dyn ReadSeek>>),
}

impl Read for Source {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Source::Whole(s) => s.read(buf),
            Source::Windowed(s) => s.read(buf),
        }
    }
}

impl Seek for Source {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        match self {
            Source::Whole(s) => s.seek(pos),
            Source::Windowed(s) => s.seek(pos),
        }
    }
}

/// A single opened image file, with any AppleSingle/MacBinary wrapper
/// already stripped away. Format decoders read through `data_fork` (and,
/// when present, `resource_fork`) and never see the container bytes.
pub struct Filter {
    base_path: Option<PathBuf>,
    data_fork: Source,
    resource_fork: Option<Source>,
    length: u64,
    creation_time: Option<DateTime<Utc>>,
    last_write_time: Option<DateTime<Utc>>,
}

impl Filter {
    /// Open `path`, detecting and unwrapping AppleSingle/MacBinary framing.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, ImgError> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let metadata = file.metadata()?;
        let fs_modified: Option<DateTime<Utc>> = metadata
            .modified()
            .ok()
            .map(|t| DateTime::<Utc>::from(t));
        let fs_created: Option<DateTime<Utc>> = metadata
            .created()
            .ok()
            .map(|t| DateTime::<Utc>::from(t));

        let mut sniff = vec![0u8; 128.min(metadata.len() as usize)];
        file.read_exact(&mut sniff)?;
        file.seek(SeekFrom::Start(0))?;

        let mut filter = Self::open_from_read(Box::new(file), &sniff)?;
        filter.base_path = Some(path.to_path_buf());
        if filter.creation_time.is_none() {
            filter.creation_time = fs_created;
        }
        if filter.last_write_time.is_none() {
            filter.last_write_time = fs_modified;
        }
        Ok(filter)
    }

    /// Open an in-memory buffer, detecting and unwrapping AppleSingle/
    /// MacBinary framing exactly as [`Filter::open_path`] does.
    pub fn open_bytes(bytes: Vec<u8>) -> Result<Self, ImgError> {
        let len = bytes.len();
        let sniff_len = 128.min(len);
        let sniff = bytes[..sniff_len].to_vec();
        let cursor: Box<dyn ReadSeek> = Box::new(Cursor::new(bytes));
        let mut filter = Self::open_from_read(cursor, &sniff)?;
        filter.base_path = None;
        Ok(filter)
    }

    /// The single code path both constructors funnel through: sniff for a
    /// known container wrapper, and either unwrap it or pass the stream
    /// through untouched.
    fn open_from_read(mut source: Box<dyn ReadSeek>, sniff: &[u8]) -> Result<Self, ImgError> {
        if applesingle::looks_like_applesingle(sniff) {
            // AppleSingle entries are laid out by absolute offset, so the
            // whole file has to be buffered to resolve them against one
            // another; there's no way to unwrap it as a streaming filter.
            let mut whole = Vec::new();
            source.seek(SeekFrom::Start(0))?;
            source.read_to_end(&mut whole)?;
            let layout = applesingle::parse(&whole)?;

            let data_fork = layout
                .data_fork
                .ok_or_else(|| ImgError::CorruptImage("AppleSingle container has no data fork".into()))?;
            let resource_fork = layout.resource_fork;

            let data_len = (data_fork.1 - data_fork.0) as u64;
            let data_bytes = whole[data_fork.0..data_fork.1].to_vec();
            let resource_source = resource_fork.map(|(start, end)| {
                let bytes = whole[start..end].to_vec();
                Source::Whole(Box::new(Cursor::new(bytes)))
            });

            return Ok(Filter {
                base_path: None,
                data_fork: Source::Whole(Box::new(Cursor::new(data_bytes))),
                resource_fork: resource_source,
                length: data_len,
                creation_time: layout.dates.map(|d| d.created),
                last_write_time: layout.dates.map(|d| d.modified),
            });
        }

        if macbinary::looks_like_macbinary(sniff) {
            let mut whole = Vec::new();
            source.seek(SeekFrom::Start(0))?;
            source.read_to_end(&mut whole)?;
            let (header, data_range, rsrc_range) = macbinary::parse(&whole)?;

            let data_len = (data_range.1 - data_range.0) as u64;
            let data_bytes = whole[data_range.0..data_range.1].to_vec();
            let resource_source = if rsrc_range.1 > rsrc_range.0 {
                Some(Source::Whole(Box::new(Cursor::new(
                    whole[rsrc_range.0..rsrc_range.1].to_vec(),
                ))))
            } else {
                None
            };

            return Ok(Filter {
                base_path: None,
                data_fork: Source::Whole(Box::new(Cursor::new(data_bytes))),
                resource_fork: resource_source,
                length: data_len,
                creation_time: Some(header.created),
                last_write_time: Some(header.modified),
            });
        }

        source.seek(SeekFrom::Start(0))?;
        let length = crate::util::get_length(&mut source)?;
        Ok(Filter {
            base_path: None,
            data_fork: Source::Whole(source),
            resource_fork: None,
            length,
            creation_time: None,
            last_write_time: None,
        })
    }

    pub fn base_path(&self) -> Option<&Path> {
        self.base_path.as_deref()
    }

    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn creation_time(&self) -> Option<DateTime<Utc>> {
        self.creation_time
    }

    pub fn last_write_time(&self) -> Option<DateTime<Utc>> {
        self.last_write_time
    }

    pub fn has_resource_fork(&self) -> bool {
        self.resource_fork.is_some()
    }

    /// The data fork as a read/seek stream, positioned at its start.
    pub fn data_fork(&mut self) -> &mut dyn ReadSeek {
        &mut self.data_fork
    }

    /// The resource fork as a read/seek stream, if the container carried one.
    pub fn resource_fork(&mut self) -> Option<&mut dyn ReadSeek> {
        self.resource_fork.as_mut().map(|s| s as &mut dyn ReadSeek)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read as _;

    #[test]
    fn plain_bytes_pass_through_untouched() {
        let bytes = b"plain sector data, no wrapper here".to_vec();
        let mut filter = Filter::open_bytes(bytes.clone()).unwrap();
        assert_eq!(filter.len(), bytes.len() as u64);
        assert!(!filter.has_resource_fork());
        let mut out = Vec::new();
        filter.data_fork().read_to_end(&mut out).unwrap();
        assert_eq!(out, bytes);
    }
}
