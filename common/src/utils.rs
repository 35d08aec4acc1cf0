use std::time::Duration;

/// Render an elapsed time like ` 1m 30s`, sub-minute runs keep millis.
pub fn duration_to_human(duration: Duration) -> String {
    let total = duration.as_secs();
    if total < 60 {
        return format!("{:.2}s", duration.as_secs_f64());
    }

    let secs = total % 60;
    let mins = total / 60;
    let hours = mins / 60;
    let mins = mins % 60;

    let mut out = Vec::new();
    if hours > 0 {
        out.push(format!("{:2}h", hours));
    }
    out.push(format!("{:2}m", mins));
    out.push(format!("{:2}s", secs));

    out.join(" ")
}

/// Render a byte count with a binary unit suffix.
pub fn bytes_to_human(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
