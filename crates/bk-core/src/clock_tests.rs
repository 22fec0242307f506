use super::*;

#[test]
fn fake_clock_advances() {
    let clock = FakeClock::new();
    let t0 = clock.now();
    clock.advance(Duration::from_secs(5));
    assert!(clock.now() > t0);
}

#[test]
fn fake_clock_epoch_ms_advances() {
    let clock = FakeClock::new();
    let e0 = clock.epoch_ms();
    clock.advance(Duration::from_millis(250));
    assert_eq!(clock.epoch_ms(), e0 + 250);
}

#[test]
fn system_clock_epoch_ms_is_plausible() {
    let clock = SystemClock;
    // Some time after 2021-01-01.
    assert!(clock.epoch_ms() > 1_600_000_000_000);
}
