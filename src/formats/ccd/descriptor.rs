/*
    imgcore::formats::ccd::descriptor

    Hand-rolled line tokenizer for the CloneCD `.ccd` text descriptor
    (REDESIGN FLAGS: the grammar — `[Section]` headers, `Key = Value`
    pairs, hex/decimal integers — is trivial enough that a small tokenizer
    matches a regex-driven parser's behavior without the dependency).
*/
use log::warn;

use crate::ImgError;

/// One reconstructed TOC descriptor, straight from an `[Entry N]` block.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawTocEntry {
    pub session: u8,
    pub point: u8,
    pub adr: u8,
    pub control: u8,
    pub track_no: u8,
    pub a_min: u8,
    pub a_sec: u8,
    pub a_frame: u8,
    pub zero: u8,
    pub p_min: u8,
    pub p_sec: u8,
    pub p_frame: u8,
}

/// The `[Disc]` section's fields this crate needs.
#[derive(Debug, Clone, Default)]
pub struct DiscSection {
    pub toc_entries: u32,
    pub sessions: u32,
    pub data_tracks_scrambled: bool,
    pub cdtext_length: u32,
    pub catalog: Option<String>,
}

/// A fully tokenized `.ccd` descriptor.
#[derive(Debug, Clone, Default)]
pub struct CcdDescriptor {
    pub version: u32,
    pub disc: DiscSection,
    pub entries: Vec<RawTocEntry>,
    pub cdtext: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Section {
    CloneCd,
    Disc,
    Entry(u32),
    CdText,
    Other,
}

fn parse_section_header(line: &str) -> Option<(Section, String)> {
    let inner = line.strip_prefix('[')?.strip_suffix(']')?;
    let inner = inner.trim();
    if inner.eq_ignore_ascii_case("CloneCD") {
        return Some((Section::CloneCd, inner.to_string()));
    }
    if inner.eq_ignore_ascii_case("Disc") {
        return Some((Section::Disc, inner.to_string()));
    }
    if inner.eq_ignore_ascii_case("CDText") {
        return Some((Section::CdText, inner.to_string()));
    }
    if let Some(rest) = inner.strip_prefix("Entry").map(str::trim) {
        if let Ok(n) = rest.parse::<u32>() {
            return Some((Section::Entry(n), inner.to_string()));
        }
    }
    Some((Section::Other, inner.to_string()))
}

fn parse_kv(line: &str) -> Option<(&str, &str)> {
    let idx = line.find('=')?;
    let key = line[..idx].trim();
    let value = line[idx + 1..].trim();
    Some((key, value))
}

fn parse_hex_u8(value: &str) -> Result<u8, ImgError> {
    let trimmed = value.trim();
    let digits = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")).unwrap_or(trimmed);
    u8::from_str_radix(digits, 16).map_err(|_| ImgError::CorruptImage(format!("bad hex integer: {value:?}")))
}

fn parse_dec_u8(value: &str) -> Result<u8, ImgError> {
    value
        .trim()
        .parse::<u8>()
        .map_err(|_| ImgError::CorruptImage(format!("bad decimal integer: {value:?}")))
}

fn parse_dec_u32(value: &str) -> Result<u32, ImgError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| ImgError::CorruptImage(format!("bad decimal integer: {value:?}")))
}

fn parse_cdtext_bytes(value: &str) -> Result<Vec<u8>, ImgError> {
    value
        .split_whitespace()
        .map(|tok| {
            u8::from_str_radix(tok, 16).map_err(|_| ImgError::CorruptImage(format!("bad CD-Text byte: {tok:?}")))
        })
        .collect()
}

pub fn parse(text: &str) -> Result<CcdDescriptor, ImgError> {
    let mut descriptor = CcdDescriptor::default();
    let mut current = Section::Other;
    let mut saw_any_section = false;
    let mut building: RawTocEntry = RawTocEntry::default();

    let flush_entry = |descriptor: &mut CcdDescriptor, current: &Section, building: RawTocEntry| {
        if matches!(current, Section::Entry(_)) {
            descriptor.entries.push(building);
        }
    };

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with('[') {
            let (section, name) = parse_section_header(line)
                .ok_or_else(|| ImgError::CorruptImage(format!("malformed section header: {line:?}")))?;

            if section == Section::CloneCd && saw_any_section {
                return Err(ImgError::CorruptImage(
                    "[CloneCD] section must be the first section in the descriptor".into(),
                ));
            }

            flush_entry(&mut descriptor, &current, building);
            building = RawTocEntry::default();
            current = section;
            saw_any_section = true;
            let _ = name;
            continue;
        }

        let Some((key, value)) = parse_kv(line) else {
            continue;
        };

        match &current {
            Section::CloneCd => {
                if key.eq_ignore_ascii_case("Version") {
                    descriptor.version = parse_dec_u32(value)?;
                    if descriptor.version != 2 && descriptor.version != 3 {
                        warn!("unexpected CloneCD descriptor version {}", descriptor.version);
                    }
                }
            }
            Section::Disc => match key {
                k if k.eq_ignore_ascii_case("TocEntries") => descriptor.disc.toc_entries = parse_dec_u32(value)?,
                k if k.eq_ignore_ascii_case("Sessions") => descriptor.disc.sessions = parse_dec_u32(value)?,
                k if k.eq_ignore_ascii_case("DataTracksScrambled") => {
                    descriptor.disc.data_tracks_scrambled = parse_dec_u32(value)? != 0
                }
                k if k.eq_ignore_ascii_case("CDTextLength") => descriptor.disc.cdtext_length = parse_dec_u32(value)?,
                k if k.eq_ignore_ascii_case("CATALOG") => descriptor.disc.catalog = Some(value.to_string()),
                _ => {}
            },
            Section::Entry(_) => match key {
                k if k.eq_ignore_ascii_case("Session") => building.session = parse_dec_u8(value)?,
                k if k.eq_ignore_ascii_case("Point") => building.point = parse_hex_u8(value)?,
                k if k.eq_ignore_ascii_case("ADR") => building.adr = parse_hex_u8(value)?,
                k if k.eq_ignore_ascii_case("Control") => building.control = parse_hex_u8(value)?,
                k if k.eq_ignore_ascii_case("TrackNo") => building.track_no = parse_dec_u8(value)?,
                k if k.eq_ignore_ascii_case("AMin") => building.a_min = parse_dec_u8(value)?,
                k if k.eq_ignore_ascii_case("ASec") => building.a_sec = parse_dec_u8(value)?,
                k if k.eq_ignore_ascii_case("AFrame") => building.a_frame = parse_dec_u8(value)?,
                k if k.eq_ignore_ascii_case("Zero") => building.zero = parse_dec_u8(value)?,
                k if k.eq_ignore_ascii_case("PMin") => building.p_min = parse_dec_u8(value)?,
                k if k.eq_ignore_ascii_case("PSec") => building.p_sec = parse_dec_u8(value)?,
                k if k.eq_ignore_ascii_case("PFrame") => building.p_frame = parse_dec_u8(value)?,
                _ => {}
            },
            Section::CdText => {
                if key.to_ascii_lowercase().starts_with("entry") {
                    descriptor.cdtext.extend(parse_cdtext_bytes(value)?);
                }
            }
            Section::Other => {}
        }
    }

    flush_entry(&mut descriptor, &current, building);

    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
[CloneCD]
Version=3

[Disc]
TocEntries=3
Sessions=1
DataTracksScrambled=0
CDTextLength=0
CATALOG=0000000000000

[Entry 0]
Session=1
Point=0xa0
ADR=0x01
Control=0x04
TrackNo=0
AMin=0
ASec=0
AFrame=0
Zero=0
PMin=1
PSec=0
PFrame=0

[Entry 1]
Session=1
Point=0x01
ADR=0x01
Control=0x04
TrackNo=0
AMin=0
ASec=0
AFrame=0
Zero=0
PMin=0
PSec=2
PFrame=0

[Entry 2]
Session=1
Point=0xa2
ADR=0x01
Control=0x04
TrackNo=0
AMin=0
ASec=0
AFrame=0
Zero=0
PMin=10
PSec=0
PFrame=0
";

    #[test]
    fn parses_header_and_disc_section() {
        let descriptor = parse(SAMPLE).unwrap();
        assert_eq!(descriptor.version, 3);
        assert_eq!(descriptor.disc.toc_entries, 3);
        assert_eq!(descriptor.disc.sessions, 1);
        assert!(!descriptor.disc.data_tracks_scrambled);
        assert_eq!(descriptor.disc.catalog.as_deref(), Some("0000000000000"));
    }

    #[test]
    fn parses_all_entries() {
        let descriptor = parse(SAMPLE).unwrap();
        assert_eq!(descriptor.entries.len(), 3);
        assert_eq!(descriptor.entries[0].point, 0xA0);
        assert_eq!(descriptor.entries[1].point, 0x01);
        assert_eq!(descriptor.entries[2].point, 0xA2);
        assert_eq!(descriptor.entries[2].p_min, 10);
    }

    #[test]
    fn rejects_out_of_order_clonecd_section() {
        let bad = "[Disc]\nSessions=1\n\n[CloneCD]\nVersion=3\n";
        assert!(parse(bad).is_err());
    }
}
