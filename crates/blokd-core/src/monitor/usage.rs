//! Parsing and selection over platform usage-event dumps.
//!
//! Kept platform-independent so the selection logic is testable on any
//! host; the Android monitor feeds it raw `dumpsys` output.

use chrono::NaiveDateTime;
use std::time::Duration;

/// One foreground-transition event from the usage-stats service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageEvent {
    pub time: NaiveDateTime,
    pub package: String,
}

/// Event types that mean "this package came to the foreground".
/// `MOVE_TO_FOREGROUND` is the pre-API-29 spelling of `ACTIVITY_RESUMED`.
const FOREGROUND_EVENT_TYPES: [&str; 2] = ["ACTIVITY_RESUMED", "MOVE_TO_FOREGROUND"];

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Extract foreground-transition events from a `dumpsys usagestats` dump.
///
/// Lines that are not event lines, carry other event types, or have
/// malformed timestamps are skipped silently.
#[must_use]
pub fn parse_usage_events(dump: &str) -> Vec<UsageEvent> {
    dump.lines().filter_map(parse_event_line).collect()
}

fn parse_event_line(line: &str) -> Option<UsageEvent> {
    let event_type = attr(line, "type")?;
    if !FOREGROUND_EVENT_TYPES.contains(&event_type) {
        return None;
    }

    let time = NaiveDateTime::parse_from_str(attr(line, "time")?, TIME_FORMAT).ok()?;
    let package = attr(line, "package")?;
    if package.is_empty() {
        return None;
    }

    Some(UsageEvent {
        time,
        package: package.to_string(),
    })
}

/// Pull a `key=value` or `key="value"` attribute out of an event line.
fn attr<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let pattern = format!("{key}=");
    let start = line.find(&pattern)? + pattern.len();
    let rest = &line[start..];

    if let Some(quoted) = rest.strip_prefix('"') {
        let end = quoted.find('"')?;
        Some(&quoted[..end])
    } else {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        Some(&rest[..end])
    }
}

/// Select the most-recently-used package within the trailing `window`
/// ending at `now`. An empty result means "no foreground app", never an
/// error.
#[must_use]
pub fn most_recent_app(
    events: &[UsageEvent],
    now: NaiveDateTime,
    window: Duration,
) -> Option<String> {
    let cutoff = now - chrono::Duration::from_std(window).unwrap_or(chrono::Duration::zero());

    events
        .iter()
        .filter(|e| e.time >= cutoff && e.time <= now)
        .max_by_key(|e| e.time)
        .map(|e| e.package.clone())
}

/// Decide whether an `appops get` probe reports the op as granted.
///
/// The service answers with lines like `GET_USAGE_STATS: allow` (possibly
/// suffixed with timing details). Anything other than an explicit allow -
/// deny, ignore, default - counts as not granted.
#[must_use]
pub fn parse_appops_allowed(output: &str) -> bool {
    output.lines().any(|line| {
        line.split_once(':')
            .is_some_and(|(_, mode)| mode.trim().starts_with("allow"))
    })
}
