// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn fake_clock_advances() {
    let clock = FakeClock::new();
    let before_instant = clock.now();
    let before_ms = clock.epoch_ms();

    clock.advance(Duration::from_secs(90));

    assert_eq!(clock.now() - before_instant, Duration::from_secs(90));
    assert_eq!(clock.epoch_ms() - before_ms, 90_000);
}

#[test]
fn fake_clock_utc_now_tracks_epoch() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(1_700_000_123_456);
    assert_eq!(clock.utc_now().timestamp_millis(), 1_700_000_123_456);
}

#[test]
fn system_clock_is_sane() {
    let clock = SystemClock;
    // Well after 2020-01-01, well before the heat death of the universe.
    assert!(clock.epoch_ms() > 1_577_836_800_000);
    assert!(clock.utc_now().timestamp_millis() > 1_577_836_800_000);
}
