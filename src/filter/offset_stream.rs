/*
    imgcore::filter::offset_stream

    A read/seek view over a byte-range window of an underlying stream:
    position 0 in the view maps to `start` in the underlying stream, and
    reads never cross `end`. Used to hand a format decoder the data fork of
    an AppleSingle/MacBinary container without it ever seeing the resource
    fork or header bytes that precede it.
*/
use std::io::{Read, Seek, SeekFrom};

use crate::io::ReadSeek;

/// A bounded `[start, end)` window over an underlying [`ReadSeek`].
pub struct OffsetStream<T> {
    inner: T,
    start: u64,
    end: u64,
    pos: u64,
}

impl<T: ReadSeek> OffsetStream<T> {
    pub fn new(inner: T, start: u64, len: u64) -> Self {
        OffsetStream {
            inner,
            start,
            end: start + len,
            pos: 0,
        }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: ReadSeek> Read for OffsetStream<T> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let remaining = self.end.saturating_sub(self.start + self.pos);
        if remaining == 0 {
            return Ok(0);
        }
        let want = (buf.len() as u64).min(remaining) as usize;
        self.inner.seek(SeekFrom::Start(self.start + self.pos))?;
        let n = self.inner.read(&mut buf[..want])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<T: ReadSeek> Seek for OffsetStream<T> {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(off) => off,
            SeekFrom::Current(delta) => (self.pos as i64 + delta).max(0) as u64,
            SeekFrom::End(delta) => ((self.len() as i64) + delta).max(0) as u64,
        };
        self.pos = new_pos;
        Ok(self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_are_confined_to_window() {
        let data: Vec<u8> = (0u8..=255).collect();
        let mut view = OffsetStream::new(Cursor::new(data), 10, 20);
        let mut buf = [0u8; 32];
        let n = view.read(&mut buf).unwrap();
        assert_eq!(n, 20);
        assert_eq!(&buf[..20], &(10u8..30).collect::<Vec<_>>()[..]);
    }

    #[test]
    fn seek_from_end_is_relative_to_window_length() {
        let data: Vec<u8> = (0u8..=255).collect();
        let mut view = OffsetStream::new(Cursor::new(data), 10, 20);
        view.seek(SeekFrom::End(-5)).unwrap();
        let mut buf = [0u8; 32];
        let n = view.read(&mut buf).unwrap();
        assert_eq!(n, 5);
        assert_eq!(buf[0], 25);
    }
}
