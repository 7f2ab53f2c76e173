/*
    imgcore::util

    Small stream helpers shared by filters and format plugins.
*/
use crate::io::{Seek, SeekFrom};

/// Return the total length of a seekable stream, restoring its original
/// position (start) afterwards.
pub(crate) fn get_length<T: Seek>(source: &mut T) -> std::io::Result<u64> {
    let length = source.seek(SeekFrom::End(0))?;
    source.seek(SeekFrom::Start(0))?;
    Ok(length)
}

/// Scan the first `n` bytes of `buf` and decide whether they look like
/// human-readable text: only LF/CR/NUL control bytes permitted, and no two
/// consecutive NULs (a strong binary tell). Used by the format registry to
/// guard textual plugins (CloneCD's `.ccd` descriptor) against binary input.
pub(crate) fn looks_like_text(buf: &[u8]) -> bool {
    let mut prev_nul = false;
    for &b in buf {
        if b == 0 {
            if prev_nul {
                return false;
            }
            prev_nul = true;
            continue;
        }
        prev_nul = false;
        if b < 0x20 && b != b'\n' && b != b'\r' {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_sniff_accepts_ccd_like_text() {
        let buf = b"[CloneCD]\r\nVersion=3\r\n[Disc]\r\nTocEntries=10\r\n";
        assert!(looks_like_text(buf));
    }

    #[test]
    fn text_sniff_rejects_double_nul() {
        let mut buf = vec![b'A'; 16];
        buf[4] = 0;
        buf[5] = 0;
        assert!(!looks_like_text(&buf));
    }

    #[test]
    fn text_sniff_rejects_control_bytes() {
        let buf = vec![0x01, 0x02, 0x03];
        assert!(!looks_like_text(&buf));
    }

    #[test]
    fn text_sniff_rejects_tab() {
        let buf = b"[Disc]\r\nCATALOG=0\t0\r\n".to_vec();
        assert!(!looks_like_text(&buf));
    }
}
