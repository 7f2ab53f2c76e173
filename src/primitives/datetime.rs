/*
    imgcore::primitives::datetime

    Date encoders for the three epochs this crate's containers use:
    Unix (1970-01-01 UTC), Mac (1904-01-01 UTC), and the FAT/DOS packed
    16-bit date + 16-bit time pair.
*/
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

/// Seconds between the Mac epoch (1904-01-01 UTC) and the Unix epoch
/// (1970-01-01 UTC).
const MAC_TO_UNIX_EPOCH_SECONDS: i64 = 2_082_844_800;

/// Decode a signed count of seconds since the Unix epoch.
pub fn from_unix_seconds(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Decode an unsigned count of seconds since the Unix epoch (as used by
/// AppleSingle's `UnixFileInfo` entry).
pub fn from_unix_seconds_unsigned(secs: u32) -> DateTime<Utc> {
    from_unix_seconds(secs as i64)
}

/// Decode a signed count of seconds since the Mac epoch (1904-01-01 UTC), as
/// used by AppleSingle's `MacFileInfo`/`ProDOSFileInfo` entries and this
/// crate's chosen interpretation of `FileDates` (see DESIGN.md / SPEC_FULL.md
/// §9 for why one consistent epoch is used instead of the source's
/// path-dependent divergence).
pub fn from_mac_seconds(secs: i64) -> DateTime<Utc> {
    from_unix_seconds(secs - MAC_TO_UNIX_EPOCH_SECONDS)
}

/// Decode an unsigned 32-bit seconds-since-Mac-epoch value, as stored
/// big-endian on disk.
pub fn from_mac_seconds_unsigned(secs: u32) -> DateTime<Utc> {
    from_mac_seconds(secs as i64)
}

/// Decode a FAT/DOS packed date (bits 15..9 year-1980, 8..5 month, 4..0 day)
/// and packed time (bits 15..11 hour, 10..5 minute, 4..0 second/2) pair.
pub fn from_dos_date_time(date: u16, time: u16) -> DateTime<Utc> {
    let year = 1980 + ((date >> 9) & 0x7F) as i32;
    let month = ((date >> 5) & 0x0F).max(1) as u32;
    let day = (date & 0x1F).max(1) as u32;
    let hour = ((time >> 11) & 0x1F) as u32;
    let minute = ((time >> 5) & 0x3F) as u32;
    let second = ((time & 0x1F) * 2) as u32;

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .map(|dt| Utc.from_utc_datetime(&dt))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_epoch_is_1970() {
        let dt = from_unix_seconds(0);
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "1970-01-01");
    }

    #[test]
    fn mac_seconds_offset_matches_known_vector() {
        // 0xB2C4E400 seconds since the Mac epoch, the S5 test vector from the spec.
        let dt = from_mac_seconds_unsigned(0xB2C4_E400);
        assert_eq!(dt.format("%Y-%m-%dT%H:%M:%S").to_string(), "1999-01-15T12:24:32");
    }

    #[test]
    fn dos_date_time_decodes() {
        // 2020-06-15 13:45:30 packed: year=2020 (40<<9), month=6 (6<<5), day=15
        let date = ((2020 - 1980) << 9) | (6 << 5) | 15;
        let time = (13 << 11) | (45 << 5) | (30 / 2);
        let dt = from_dos_date_time(date as u16, time as u16);
        assert_eq!(dt.format("%Y-%m-%d %H:%M:%S").to_string(), "2020-06-15 13:45:30");
    }
}
