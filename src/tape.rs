/*
    imgcore::tape

    Tape image contract (§4.F): shape only, no concrete decoder ships in
    this crate yet. A tape image is addressed by file number and a
    block-within-file offset: sequential access moves between files,
    random access is only meaningful within the current file.
*/
use crate::ImgError;

/// One logical file on a tape image, delimited by filemarks.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TapeFile {
    pub file_number: u32,
    pub first_block: u64,
    pub last_block: u64,
}

impl TapeFile {
    pub fn block_count(&self) -> u64 {
        self.last_block - self.first_block + 1
    }

    pub fn contains_block(&self, block: u64) -> bool {
        block >= self.first_block && block <= self.last_block
    }
}

/// Capability surface a tape image plugin would implement. No format in
/// this crate implements it yet; it documents the shape a future decoder
/// (e.g. SIMH tape container) would take on.
pub trait TapeImage {
    fn files(&self) -> &[TapeFile];

    /// Move to the next/previous filemark from the current position.
    fn seek_file(&mut self, file_number: u32) -> Result<(), ImgError>;

    /// Read one block at `block` within the current file.
    fn read_block(&mut self, block: u64) -> Result<Vec<u8>, ImgError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_count_is_inclusive() {
        let file = TapeFile {
            file_number: 0,
            first_block: 10,
            last_block: 19,
        };
        assert_eq!(file.block_count(), 10);
        assert!(file.contains_block(10));
        assert!(file.contains_block(19));
        assert!(!file.contains_block(20));
    }
}
