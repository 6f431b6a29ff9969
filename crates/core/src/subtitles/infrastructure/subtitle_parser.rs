use std::fs;
use std::path::Path;

use crate::media::domain::media_error::MediaError;
use crate::subtitles::domain::subtitle_cue::SubtitleCue;

/// Read and parse a SubRip (`.srt`) or WebVTT (`.vtt`) file.
///
/// An unreadable file is a `MediaError::Terminal`; any other extension is a
/// `MediaError::UnsupportedFormat`.
pub fn parse_subtitle_file(path: &Path) -> Result<Vec<SubtitleCue>, MediaError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    if ext != "srt" && ext != "vtt" {
        return Err(MediaError::unsupported(
            path,
            format!("unknown subtitle extension '{ext}'"),
        ));
    }

    let content = fs::read_to_string(path)
        .map_err(|e| MediaError::terminal(path, format!("cannot read subtitle: {e}")))?;

    let cues = parse_cues(&content);
    if cues.is_empty() {
        return Err(MediaError::terminal(path, "no subtitle cues found"));
    }
    Ok(cues)
}

/// Parse cue blocks shared by SubRip and WebVTT: an optional identifier line,
/// a `start --> end` timing line, then text lines up to a blank line.
pub fn parse_cues(content: &str) -> Vec<SubtitleCue> {
    let normalized = content.trim_start_matches('\u{feff}').replace("\r\n", "\n");
    let mut cues = Vec::new();

    for block in normalized.split("\n\n") {
        let mut lines = block.lines().skip_while(|l| !l.contains("-->"));
        let Some(timing) = lines.next() else {
            continue;
        };
        let Some((start, end)) = parse_timing_line(timing) else {
            log::warn!("Skipping subtitle block with malformed timing: {timing}");
            continue;
        };
        let text = lines
            .map(strip_tags)
            .filter(|l| !l.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        if end > start {
            cues.push(SubtitleCue::new(start, end, text));
        }
    }

    cues
}

fn parse_timing_line(line: &str) -> Option<(f64, f64)> {
    let (start, rest) = line.split_once("-->")?;
    // WebVTT allows cue settings after the end timestamp.
    let end = rest.split_whitespace().next()?;
    Some((parse_timestamp(start.trim())?, parse_timestamp(end)?))
}

/// Accepts `HH:MM:SS,mmm`, `HH:MM:SS.mmm` and `MM:SS.mmm`.
fn parse_timestamp(ts: &str) -> Option<f64> {
    let ts = ts.replace(',', ".");
    let parts: Vec<&str> = ts.split(':').collect();
    let (h, m, s) = match parts.as_slice() {
        [h, m, s] => (h.parse::<f64>().ok()?, m.parse::<f64>().ok()?, s.parse::<f64>().ok()?),
        [m, s] => (0.0, m.parse::<f64>().ok()?, s.parse::<f64>().ok()?),
        _ => return None,
    };
    Some(h * 3600.0 + m * 60.0 + s)
}

fn strip_tags(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_tag = false;
    for c in line.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}
