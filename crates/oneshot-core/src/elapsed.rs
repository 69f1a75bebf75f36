//! Compact elapsed-time rendering for log lines and errors.

use std::time::Duration;

/// Render a duration as `1h5m3s`, dropping trailing zero components.
///
/// `300s` renders as `5m` and `3600s` as `1h`; a zero component in the
/// middle is kept (`1h0m1s`). Durations under a second render in
/// milliseconds, longer ones are truncated to whole seconds.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    if total == 0 {
        return format!("{}ms", elapsed.as_millis());
    }

    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 || (hours > 0 && seconds > 0) {
        out.push_str(&format!("{minutes}m"));
    }
    if seconds > 0 {
        out.push_str(&format!("{seconds}s"));
    }
    out
}
