//! Codec contract tests exercised through the public API.

use chain_resync::{DecodeError, FileTime};
use chrono::{TimeZone, Utc};

#[test]
fn round_trip_is_lossless_across_the_range() {
    let samples = [
        0u64,
        1,
        116_444_736_000_000_000,  // unix epoch
        132_539_328_000_000_000,  // 2021-01-01
        0x7fff_ffff_ffff_ffff,
        u64::MAX,
    ];
    for ticks in samples {
        let ft = FileTime::from_ticks(ticks);
        let decoded = FileTime::from_bytes(&ft.to_bytes()).expect("8 bytes always decode");
        assert_eq!(decoded, ft, "ticks {ticks}");
    }
}

#[test]
fn wire_layout_is_little_endian() {
    let ft = FileTime::from_ticks(0x1122_3344_5566_7788);
    assert_eq!(
        ft.to_bytes(),
        [0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11]
    );
}

#[test]
fn reversed_encoding_never_aliases_for_asymmetric_values() {
    let ft = FileTime::from_ticks(116_444_736_000_000_000);
    let mut reversed = ft.to_bytes();
    reversed.reverse();
    assert_ne!(FileTime::from_bytes(&reversed).unwrap(), ft);
}

#[test]
fn every_truncated_length_fails_with_too_short() {
    let full = FileTime::from_ticks(u64::MAX).to_bytes();
    for len in 0..8 {
        let result = FileTime::from_bytes(&full[..len]);
        assert_eq!(result, Err(DecodeError::TooShort { len }));
    }
}

#[test]
fn unix_epoch_lands_on_the_documented_tick_count() {
    let dt = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(FileTime::from_datetime(dt).ticks(), 116_444_736_000_000_000);
}

#[test]
fn calendar_conversion_is_utc_normalized() {
    // 02:00 at +02:00 is midnight UTC.
    let offset = chrono::FixedOffset::east_opt(2 * 3600).unwrap();
    let local = offset.with_ymd_and_hms(2021, 1, 1, 2, 0, 0).unwrap();
    let utc = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(
        FileTime::from_datetime(local.with_timezone(&Utc)),
        FileTime::from_datetime(utc)
    );
}

#[test]
fn display_renders_calendar_and_ticks() {
    let ft = FileTime::from_ticks(132_539_328_000_000_000);
    let rendered = ft.to_string();
    assert!(rendered.contains("2021-01-01"));
    assert!(rendered.contains("132539328000000000"));
}
