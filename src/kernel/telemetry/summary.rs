use std::fmt::Write as _;
use std::time::Duration;

use super::entry::LogEntry;
use super::record::MAX_FIELD_LENGTH;

const SEPARATOR: &str = ", ";
const ELLIPSIS: &str = "...";

/// Renders `entries` as `"<secs> <message>, <secs> <message>"` with seconds
/// relative to `flow_start`. `None` when there is nothing to render.
///
/// Appending stops once the running length passes `MAX_FIELD_LENGTH`; the
/// result is then hard-truncated so it never exceeds that bound. Whenever
/// anything was cut, the result ends in `...`.
pub fn summarize(entries: &[LogEntry], flow_start: Duration) -> Option<String> {
    if entries.is_empty() {
        return None;
    }

    let mut out = String::new();
    let mut chars = 0usize;
    let mut dropped = false;
    for entry in entries {
        if chars > MAX_FIELD_LENGTH {
            dropped = true;
            break;
        }
        let relative = entry.timestamp().saturating_sub(flow_start).as_secs_f64();
        let before = out.len();
        // Writing into a String cannot fail.
        let _ = write!(out, "{:.2} {}{}", relative, entry.message(), SEPARATOR);
        chars += out[before..].chars().count();
    }

    if out.ends_with(SEPARATOR) {
        out.truncate(out.len() - SEPARATOR.len());
        chars -= SEPARATOR.len();
    }

    if dropped || chars > MAX_FIELD_LENGTH {
        return Some(ellipsize(&out));
    }

    Some(out)
}

/// `text` cut to `MAX_FIELD_LENGTH` characters and ending in `...`, or
/// `None` when it already fits.
pub fn clipped(text: &str) -> Option<String> {
    // Byte length bounds the char count from above.
    if text.len() <= MAX_FIELD_LENGTH || text.chars().count() <= MAX_FIELD_LENGTH {
        return None;
    }
    Some(ellipsize(text))
}

fn ellipsize(text: &str) -> String {
    let mut clipped: String = text.chars().take(MAX_FIELD_LENGTH - ELLIPSIS.len()).collect();
    clipped.push_str(ELLIPSIS);
    clipped
}
