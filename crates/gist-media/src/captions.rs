//! WebVTT caption parsing.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

static TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"((?:\d{2}:)?\d{2}:\d{2}\.\d{3}) -->.*").expect("valid timestamp regex"));

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));

/// Parse VTT content into `[HH:MM:SS] text` lines.
///
/// Inline tags and cue numbers are dropped, and consecutive identical lines
/// (rolling auto-captions) are emitted once.
pub fn parse_vtt(content: &str) -> String {
    let mut transcript = String::new();
    let mut current_ts = "00:00:00".to_string();
    let mut last_line = String::new();

    for raw in content.lines() {
        let line = TAG.replace_all(raw.trim(), "").trim().to_string();

        if line.is_empty() || line == "WEBVTT" || is_header_line(&line) {
            continue;
        }

        if let Some(caps) = TIMESTAMP.captures(&line) {
            let mut ts = caps[1].to_string();
            if ts.split(':').count() == 2 {
                ts = format!("00:{}", ts);
            }
            current_ts = ts.split('.').next().unwrap_or(&ts).to_string();
            continue;
        }

        if line.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }

        if line != last_line {
            transcript.push_str(&format!("[{}] {}\n", current_ts, line));
            last_line = line;
        }
    }

    transcript
}

/// VTT file metadata lines that precede the first cue.
fn is_header_line(line: &str) -> bool {
    ["Kind:", "Language:", "NOTE", "STYLE"]
        .iter()
        .any(|prefix| line.starts_with(prefix))
}

/// Pick the caption file to use from `dir`, preferring English tracks.
pub fn find_caption_file(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("vtt"))
        .collect();

    files.sort_by_key(|path| {
        let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        (!name.contains(".en"), name)
    });

    Ok(files.into_iter().next())
}
