//! Thin re-export layer over `std::io` plus the `ReadSeek`/`ReadWriteSeek`
//! trait aliases used throughout the crate as plugin-facing bounds.

pub use std::io::{Error, Read, Result, Seek, SeekFrom, Write};

/// Anything that can be read from and seeked within. Every [`crate::Filter`]
/// fork and every format plugin's input stream is bounded by this trait.
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// A [`ReadSeek`] that can also be written to, for the (currently unused by
/// this core, but contract-complete) writer back-ends mentioned in the
/// overview as external collaborators.
pub trait ReadWriteSeek: Read + Write + Seek {}
impl<T: Read + Write + Seek + ?Sized> ReadWriteSeek for T {}
