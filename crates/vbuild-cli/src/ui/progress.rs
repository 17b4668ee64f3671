//! Download progress formatting.

/// Human-readable byte count (`512 B`, `1.5 MiB`).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = UNITS[0];
    for next in &UNITS[1..] {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = *next;
    }
    format!("{value:.1} {unit}")
}

/// `12.0 MiB / 64.0 MiB (18%)`, or just the byte count when the total is unknown.
pub fn format_progress(current: u64, total: Option<u64>) -> String {
    match total.filter(|&t| t > 0) {
        Some(t) => {
            let pct = (current.min(t) * 100) / t;
            format!("{} / {} ({pct}%)", format_bytes(current), format_bytes(t))
        }
        None => format_bytes(current),
    }
}
