/*
    imgcore::formats::ccd::reconstruct

    Turns a flat list of `[Entry N]` TOC descriptors into the track/session
    boundaries and full-TOC this crate exposes (§4.D "Compute track
    boundaries").
*/
use crate::formats::ccd::descriptor::RawTocEntry;
use crate::primitives::Msf;
use crate::toc::{FullToc, TocEntry};
use crate::types::{Session, Track, TrackSubchannelType};
use crate::{CD_RAW_SECTOR_SIZE, ImgError};

const POINT_DISC_TYPE: u8 = 0xA0;
const POINT_LEAD_OUT: u8 = 0xA2;
const POINT_TRACK_MIN: u8 = 0x01;
const POINT_TRACK_MAX: u8 = 0x63;
const POINT_ATIP: u8 = 0xC0;

fn to_lba(min: u8, sec: u8, frame: u8) -> i64 {
    Msf::new(0, min, sec, frame).to_lba()
}

/// Disc-level metadata recovered from entries that aren't track boundaries.
#[derive(Debug, Clone, Default)]
pub struct DiscMetadata {
    /// `PSEC` from the POINT 0xA0 entry of the first session: informational
    /// disc type byte.
    pub disc_type: Option<u8>,
    /// ATIP manufacturer code derived from a POINT 0xC0 / ADR 5 entry.
    pub atip_manufacturer: Option<(u8, u8)>,
    /// Disc serial number derived from an ADR 6 entry, as `(min<<16)|(sec<<8)|frame`.
    pub disc_serial: Option<u32>,
}

/// Reconstructed boundaries: tracks (in global order), sessions, and the
/// disc metadata the boundary scan incidentally recovered.
pub struct Reconstruction {
    pub tracks: Vec<Track>,
    pub sessions: Vec<Session>,
    pub metadata: DiscMetadata,
    /// The CONTROL nibble recorded at each track's opening TOC entry, keyed
    /// by track sequence (POINT). `Track` itself has no room for raw CONTROL
    /// bits, so mode autodetection in `formats::ccd` consults this map
    /// instead of re-deriving CONTROL from the cooked `Track`.
    pub track_controls: std::collections::HashMap<u8, u8>,
}

struct OpenTrack {
    point: u8,
    start_sector: u32,
    control: u8,
}

/// §4.D "Compute track boundaries": sort by (session, point), then derive
/// track/session boundaries from POINT 0xA0/0xA2/track-range/0xC0 entries.
pub fn reconstruct(entries: &[RawTocEntry]) -> Result<Reconstruction, ImgError> {
    let mut sorted: Vec<RawTocEntry> = entries.to_vec();
    sorted.sort_by_key(|e| (e.session, e.point));

    let mut tracks: Vec<Track> = Vec::new();
    let mut sessions: Vec<Session> = Vec::new();
    let mut metadata = DiscMetadata::default();
    let mut track_controls: std::collections::HashMap<u8, u8> = std::collections::HashMap::new();

    let mut current_session: Option<u8> = None;
    let mut open_track: Option<OpenTrack> = None;
    let mut session_first_sector: Option<u32> = None;
    let mut session_last_sector: Option<u32> = None;

    let close_track = |tracks: &mut Vec<Track>,
                        track_controls: &mut std::collections::HashMap<u8, u8>,
                        open: OpenTrack,
                        end_sector: i64,
                        session: u8|
     -> Result<u32, ImgError> {
        let end_sector = end_sector.max(open.start_sector as i64) as u32;
        track_controls.insert(open.point, open.control);
        tracks.push(Track {
            sequence: open.point,
            session,
            start_sector: open.start_sector,
            end_sector,
            raw_bytes_per_sector: CD_RAW_SECTOR_SIZE,
            effective_bytes_per_sector: CD_RAW_SECTOR_SIZE,
            sector_type: crate::types::SectorType::Audio,
            file_offset: 0,
            subchannel_offset: None,
            subchannel_type: TrackSubchannelType::None,
        });
        Ok(end_sector)
    };

    for entry in &sorted {
        if entry.adr != 1 && entry.adr != 4 {
            if entry.adr == 5 && entry.point == POINT_ATIP && entry.p_min == 97 {
                metadata.atip_manufacturer = Some((entry.p_sec, entry.p_frame - entry.p_frame % 10));
            }
            if entry.adr == 6 {
                let serial = ((entry.a_min as u32) << 16) | ((entry.a_sec as u32) << 8) | (entry.a_frame as u32);
                metadata.disc_serial = Some(serial);
            }
            continue;
        }

        if current_session != Some(entry.session) {
            if let (Some(open), Some(session)) = (open_track.take(), current_session) {
                // No 0xA2 seen for the previous session before it ended; close
                // degenerately at the track's own start (single-sector track).
                let end = close_track(&mut tracks, &mut track_controls, open, -1, session)?;
                session_last_sector = Some(session_last_sector.unwrap_or(end).max(end));
            }
            if let Some(session) = current_session {
                sessions.push(Session {
                    sequence: session,
                    first_track: tracks.iter().filter(|t| t.session == session).map(|t| t.sequence).min().unwrap_or(0),
                    last_track: tracks.iter().filter(|t| t.session == session).map(|t| t.sequence).max().unwrap_or(0),
                    first_sector: session_first_sector.unwrap_or(0),
                    last_sector: session_last_sector.unwrap_or(0),
                });
            }
            current_session = Some(entry.session);
            session_first_sector = None;
            session_last_sector = None;
        }

        match entry.point {
            POINT_DISC_TYPE => {
                if metadata.disc_type.is_none() {
                    metadata.disc_type = Some(entry.p_sec);
                }
            }
            POINT_LEAD_OUT => {
                let lead_out_start = to_lba(entry.p_min, entry.p_sec, entry.p_frame);
                if let Some(open) = open_track.take() {
                    let end = close_track(&mut tracks, &mut track_controls, open, lead_out_start - 1, entry.session)?;
                    session_last_sector = Some(session_last_sector.map_or(end, |cur| cur.max(end)));
                }
            }
            point if (POINT_TRACK_MIN..=POINT_TRACK_MAX).contains(&point) => {
                let start = to_lba(entry.p_min, entry.p_sec, entry.p_frame).max(0) as u32;
                if let Some(open) = open_track.take() {
                    close_track(&mut tracks, &mut track_controls, open, start as i64 - 1, entry.session)?;
                }
                session_first_sector = Some(session_first_sector.map_or(start, |cur| cur.min(start)));
                open_track = Some(OpenTrack {
                    point,
                    start_sector: start,
                    control: entry.control,
                });
            }
            _ => {}
        }
    }

    if let (Some(open), Some(session)) = (open_track.take(), current_session) {
        let end = close_track(&mut tracks, &mut track_controls, open, -1, session)?;
        session_last_sector = Some(session_last_sector.map_or(end, |cur| cur.max(end)));
    }
    if let Some(session) = current_session {
        sessions.push(Session {
            sequence: session,
            first_track: tracks.iter().filter(|t| t.session == session).map(|t| t.sequence).min().unwrap_or(0),
            last_track: tracks.iter().filter(|t| t.session == session).map(|t| t.sequence).max().unwrap_or(0),
            first_sector: session_first_sector.unwrap_or(0),
            last_sector: session_last_sector.unwrap_or(0),
        });
    }

    tracks.sort_by_key(|t| (t.session, t.start_sector));

    Ok(Reconstruction {
        tracks,
        sessions,
        metadata,
        track_controls,
    })
}

/// Build the full-TOC binary disk tag from the raw entries, independent of
/// track/session reconstruction.
pub fn full_toc(entries: &[RawTocEntry], first_session: u8, last_session: u8) -> FullToc {
    let mut sorted: Vec<RawTocEntry> = entries.to_vec();
    sorted.sort_by_key(|e| (e.session, e.point));

    let toc_entries = sorted
        .into_iter()
        .map(|e| TocEntry {
            session: e.session,
            adr: e.adr,
            control: e.control,
            tno: e.track_no,
            point: e.point,
            zero: e.zero,
            a_msf: Msf::new(0, e.a_min, e.a_sec, e.a_frame),
            p_msf: Msf::new(0, e.p_min, e.p_sec, e.p_frame),
        })
        .collect();

    FullToc::new(first_session, last_session, toc_entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::ccd::descriptor::RawTocEntry;

    fn entry(session: u8, point: u8, adr: u8, p_min: u8, p_sec: u8, p_frame: u8) -> RawTocEntry {
        RawTocEntry {
            session,
            point,
            adr,
            control: 0x04,
            track_no: 0,
            a_min: 0,
            a_sec: 0,
            a_frame: 0,
            zero: 0,
            p_min,
            p_sec,
            p_frame,
        }
    }

    #[test]
    fn single_session_two_tracks_are_contiguous() {
        let entries = vec![
            entry(1, 0xA0, 1, 1, 0, 0),
            entry(1, 0x01, 1, 0, 2, 0),
            entry(1, 0x02, 1, 1, 0, 0),
            entry(1, 0xA2, 1, 2, 0, 0),
        ];
        let recon = reconstruct(&entries).unwrap();
        assert_eq!(recon.tracks.len(), 2);
        assert_eq!(recon.tracks[0].end_sector + 1, recon.tracks[1].start_sector);
        let lead_out = to_lba(2, 0, 0);
        assert_eq!(recon.tracks[1].end_sector as i64, lead_out - 1);
    }

    #[test]
    fn two_sessions_each_get_own_lead_out() {
        let entries = vec![
            entry(1, 0x01, 1, 0, 2, 0),
            entry(1, 0xA2, 1, 5, 0, 0),
            entry(2, 0x02, 1, 6, 0, 0),
            entry(2, 0xA2, 1, 10, 0, 0),
        ];
        let recon = reconstruct(&entries).unwrap();
        assert_eq!(recon.sessions.len(), 2);
        assert_eq!(recon.tracks.len(), 2);
        assert_eq!(recon.tracks[0].session, 1);
        assert_eq!(recon.tracks[1].session, 2);
    }
}
