//! Parsing of ffmpeg progress output.
//!
//! The encoder runs with `-progress pipe:1`, which prints `key=value` lines
//! on stdout. Older builds and stderr logs carry `time=HH:MM:SS.xx` inside the
//! status line instead; both forms are understood.

/// A progress record of interest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressLine {
    /// Encoded media time in seconds.
    OutTime(f64),
    /// The encoder reported `progress=end`.
    End,
}

/// Parse one line of ffmpeg progress output.
///
/// Returns `None` for lines that carry no usable position, including the
/// `N/A` placeholders ffmpeg prints before the first frame.
pub fn parse_progress_line(line: &str) -> Option<ProgressLine> {
    let line = line.trim();

    if let Some((key, value)) = line.split_once('=') {
        let value = value.trim();
        match key.trim() {
            "out_time_us" | "out_time_ms" => {
                // Both keys are microseconds despite the name.
                let micros: i64 = value.parse().ok()?;
                if micros < 0 {
                    return None;
                }
                return Some(ProgressLine::OutTime(micros as f64 / 1_000_000.0));
            }
            "out_time" => return parse_timestamp(value).map(ProgressLine::OutTime),
            "progress" if value == "end" => return Some(ProgressLine::End),
            _ => {}
        }
    }

    // Legacy status line: "frame=  120 fps=... time=00:00:04.00 bitrate=..."
    let start = line.find("time=")?;
    let rest = &line[start + "time=".len()..];
    let token = rest.split_whitespace().next()?;
    parse_timestamp(token).map(ProgressLine::OutTime)
}

/// Parse `HH:MM:SS(.fraction)` into seconds.
///
/// # Example
///
/// ```
/// use vidconv_av::progress::parse_timestamp;
///
/// assert_eq!(parse_timestamp("00:01:02.50"), Some(62.5));
/// assert_eq!(parse_timestamp("N/A"), None);
/// ```
pub fn parse_timestamp(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.starts_with('-') {
        return None;
    }

    let mut parts = s.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    let total = hours * 3600.0 + minutes * 60.0 + seconds;
    total.is_finite().then_some(total)
}

/// Percentage of `duration` covered by `time`, clamped to 0-100.
pub fn percent(time: f64, duration: f64) -> f32 {
    if duration <= 0.0 || !duration.is_finite() {
        return 0.0;
    }
    ((time / duration) * 100.0).clamp(0.0, 100.0) as f32
}
