/*
    imgcore::toc

    Reconstructed table-of-contents entries and the binary "full TOC" layout
    (§4.D, §9) that CloneCD images are rebuilt into from their plain-text
    session descriptor. The binary shape mirrors SCSI READ TOC/PMA/ATIP
    format 2: a 2-byte big-endian data length, first/last session bytes,
    then one 11-byte entry per descriptor line.
*/
use binrw::BinWrite;
use std::io::Cursor;

use crate::primitives::Msf;
use crate::ImgError;

/// A single reconstructed TOC entry, one per CloneCD `[TRACK n]` /
/// `[Entry n]` block translated into SCSI full-TOC form.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub session: u8,
    /// Low nibble of the ADR/CONTROL byte: data format of the Q sub-channel.
    pub adr: u8,
    /// High nibble of the ADR/CONTROL byte: track control flags.
    pub control: u8,
    pub tno: u8,
    pub point: u8,
    /// The HOUR and PHOUR nibbles CloneCD packs into this field; not a real
    /// timestamp component.
    pub zero: u8,
    /// Absolute MSF address of this entry (A-MIN/A-SEC/A-FRAME).
    pub a_msf: Msf,
    /// The P-MIN/P-SEC/P-FRAME field: next track start, leadout start, or a
    /// POINT-specific payload (e.g. disc catalog digits for POINT 0xC0).
    pub p_msf: Msf,
}

impl TocEntry {
    fn adr_control_byte(&self) -> u8 {
        (self.control << 4) | (self.adr & 0x0F)
    }

    fn write_into(&self, out: &mut Vec<u8>) {
        out.push(self.session);
        out.push(self.adr_control_byte());
        out.push(self.tno);
        out.push(self.point);
        out.push(self.a_msf.min);
        out.push(self.a_msf.sec);
        out.push(self.a_msf.frame);
        out.push(self.zero);
        out.push(self.p_msf.min);
        out.push(self.p_msf.sec);
        out.push(self.p_msf.frame);
    }
}

/// A fully reconstructed full-TOC, ready to serve `read_disk_tag` requests
/// for [`crate::MediaTagKind::CdFullToc`].
#[derive(Debug, Clone, Default)]
pub struct FullToc {
    pub first_session: u8,
    pub last_session: u8,
    pub entries: Vec<TocEntry>,
}

impl FullToc {
    pub fn new(first_session: u8, last_session: u8, entries: Vec<TocEntry>) -> Self {
        FullToc {
            first_session,
            last_session,
            entries,
        }
    }

    /// Serialize to the SCSI full-TOC binary layout: a 2-byte big-endian
    /// data length (counting everything after the length field itself),
    /// followed by `first_session`, `last_session`, then 11 bytes per entry.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ImgError> {
        let mut body = Vec::with_capacity(2 + self.entries.len() * 11);
        body.push(self.first_session);
        body.push(self.last_session);
        for entry in &self.entries {
            entry.write_into(&mut body);
        }

        let data_length = (body.len() as u16)
            .checked_add(0)
            .ok_or_else(|| ImgError::CorruptImage("full TOC too large to encode".into()))?;

        let mut out = Vec::with_capacity(2 + body.len());
        let mut cursor = Cursor::new(&mut out);
        data_length
            .write_be(&mut cursor)
            .map_err(|e| ImgError::BinRwError(e.to_string()))?;
        drop(cursor);
        out.extend_from_slice(&body);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry(point: u8, a_msf: Msf, p_msf: Msf) -> TocEntry {
        TocEntry {
            session: 1,
            adr: 1,
            control: 4,
            tno: 0,
            point,
            zero: 0,
            a_msf,
            p_msf,
        }
    }

    #[test]
    fn full_toc_shape_matches_canonical_layout() {
        let toc = FullToc::new(
            1,
            1,
            vec![
                sample_entry(0xA0, Msf::new(0, 0, 0, 0), Msf::new(1, 0, 0, 0)),
                sample_entry(0x01, Msf::new(0, 0, 0, 0), Msf::new(0, 2, 0, 0)),
                sample_entry(0xA2, Msf::new(0, 0, 0, 0), Msf::new(10, 0, 0, 0)),
            ],
        );
        let bytes = toc.to_bytes().unwrap();

        // 2 (length) + 2 (session bytes) + 3 * 11 (entries)
        assert_eq!(bytes.len(), 2 + 2 + 3 * 11);
        let declared_len = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
        assert_eq!(declared_len, bytes.len() - 2);
        assert_eq!(bytes[2], 1); // first_session
        assert_eq!(bytes[3], 1); // last_session
    }

    #[test]
    fn adr_control_nibbles_pack_correctly() {
        let entry = sample_entry(0x01, Msf::default(), Msf::default());
        assert_eq!(entry.adr_control_byte(), 0x41);
    }

    #[test]
    fn empty_toc_has_only_header() {
        let toc = FullToc::new(0, 0, vec![]);
        let bytes = toc.to_bytes().unwrap();
        assert_eq!(bytes.len(), 4);
    }
}
