use std::time::Duration;
use userflow::kernel::telemetry::entry::LogEntry;
use userflow::kernel::telemetry::summary::summarize;
use userflow::MAX_FIELD_LENGTH;

fn entries(count: usize, message: &str) -> Vec<LogEntry> {
    (0..count)
        .map(|i| LogEntry::new(format!("{message} {i}"), Duration::from_millis(10 * i as u64)))
        .collect()
}

#[test]
fn test_empty_is_absent() {
    assert_eq!(summarize(&[], Duration::ZERO), None);
}

#[test]
fn test_format_and_order() {
    let start = Duration::from_secs(100);
    let list = vec![
        LogEntry::new("open", Duration::from_millis(100_000)),
        LogEntry::new("load", Duration::from_millis(101_234)),
        LogEntry::new("done", Duration::from_millis(102_500)),
    ];
    assert_eq!(
        summarize(&list, start).as_deref(),
        Some("0.00 open, 1.23 load, 2.50 done")
    );
}

#[test]
fn test_entry_before_start_clamps_to_zero() {
    let list = vec![LogEntry::new("early", Duration::from_secs(1))];
    assert_eq!(summarize(&list, Duration::from_secs(5)).as_deref(), Some("0.00 early"));
}

#[test]
fn test_long_input_is_bounded_with_ellipsis() {
    let list = entries(500, "a fairly chatty step message");
    let summary = summarize(&list, Duration::ZERO).unwrap();

    assert!(summary.chars().count() <= MAX_FIELD_LENGTH);
    assert!(summary.ends_with("..."));
    assert!(summary.starts_with("0.00 a fairly chatty step message 0, "));
}

#[test]
fn test_single_huge_entry_is_truncated() {
    let huge = "x".repeat(MAX_FIELD_LENGTH * 3);
    let list = vec![LogEntry::new(huge, Duration::ZERO)];
    let summary = summarize(&list, Duration::ZERO).unwrap();

    assert_eq!(summary.chars().count(), MAX_FIELD_LENGTH);
    assert!(summary.ends_with("..."));
    assert!(summary.starts_with("0.00 xxx"));
}

#[test]
fn test_multibyte_truncation_stays_on_char_boundary() {
    let huge = "é".repeat(MAX_FIELD_LENGTH * 2);
    let list = vec![LogEntry::new(huge, Duration::ZERO)];
    let summary = summarize(&list, Duration::ZERO).unwrap();

    assert_eq!(summary.chars().count(), MAX_FIELD_LENGTH);
    assert!(summary.ends_with("..."));
}

#[test]
fn test_exactly_at_bound_is_untouched() {
    // "0.00 " prefix is 5 chars
    let message = "y".repeat(MAX_FIELD_LENGTH - 5);
    let list = vec![LogEntry::new(message, Duration::ZERO)];
    let summary = summarize(&list, Duration::ZERO).unwrap();

    assert_eq!(summary.chars().count(), MAX_FIELD_LENGTH);
    assert!(!summary.ends_with("..."));
}

#[test]
fn test_short_input_has_no_ellipsis() {
    let list = entries(3, "step");
    let summary = summarize(&list, Duration::ZERO).unwrap();
    assert_eq!(summary, "0.00 step 0, 0.01 step 1, 0.02 step 2");
}
