//! Unit tests for fractional-second timeout splitting.

use std::time::Duration;

use fifo_ack::pipe::readiness::{seconds_to_duration, split_seconds};

#[test]
fn splits_whole_and_fraction() {
    assert_eq!(split_seconds(2.5), (2, 500_000));
}

#[test]
fn splits_sub_second_budget() {
    let (secs, micros) = split_seconds(0.1);
    assert_eq!(secs, 0);
    // 0.1 is not exact in binary; allow one microsecond of rounding.
    assert!((99_999..=100_000).contains(&micros), "micros = {micros}");
}

#[test]
fn whole_seconds_have_no_remainder() {
    assert_eq!(split_seconds(10.0), (10, 0));
}

#[test]
fn non_positive_and_non_finite_collapse_to_zero() {
    assert_eq!(split_seconds(0.0), (0, 0));
    assert_eq!(split_seconds(-1.5), (0, 0));
    assert_eq!(split_seconds(f64::NAN), (0, 0));
    assert_eq!(split_seconds(f64::INFINITY), (0, 0));
}

#[test]
fn duration_matches_split() {
    assert_eq!(seconds_to_duration(1.25), Duration::from_millis(1_250));
    assert_eq!(seconds_to_duration(-3.0), Duration::ZERO);
}
