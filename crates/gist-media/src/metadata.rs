//! Video metadata as reported by `yt-dlp --dump-json`.

use serde::Deserialize;

/// Metadata of a video.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VideoMetadata {
    pub video_id: String,
    pub title: String,
    pub author: String,
    pub duration_secs: Option<u64>,
    pub description: String,
    pub webpage_url: String,
}

#[derive(Debug, Deserialize)]
struct DumpJson {
    id: Option<String>,
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    duration: Option<f64>,
    description: Option<String>,
    webpage_url: Option<String>,
}

impl VideoMetadata {
    /// Parse yt-dlp's JSON dump.
    pub fn from_dump_json(requested_id: &str, json: &str) -> serde_json::Result<Self> {
        let dump: DumpJson = serde_json::from_str(json)?;
        let video_id = dump.id.unwrap_or_else(|| requested_id.to_string());

        Ok(Self {
            title: dump.title.unwrap_or_else(|| format!("Video {}", video_id)),
            author: dump.uploader.or(dump.channel).unwrap_or_else(|| "Unknown".to_string()),
            duration_secs: dump.duration.filter(|d| *d >= 0.0).map(|d| d.round() as u64),
            description: dump.description.unwrap_or_default(),
            webpage_url: dump
                .webpage_url
                .unwrap_or_else(|| gist_models::youtube_watch_url(&video_id)),
            video_id,
        })
    }

    /// Duration as `H:MM:SS` or `M:SS`.
    pub fn duration_label(&self) -> String {
        match self.duration_secs {
            Some(secs) if secs >= 3600 => {
                format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
            }
            Some(secs) => format!("{}:{:02}", secs / 60, secs % 60),
            None => "unknown".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_dump_json() {
        let json = r#"{
            "id": "dQw4w9WgXcQ",
            "title": "Never Gonna Give You Up",
            "uploader": "Rick Astley",
            "duration": 212.4,
            "description": "Official video",
            "webpage_url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "formats": [{"format_id": "140"}]
        }"#;

        let meta = VideoMetadata::from_dump_json("dQw4w9WgXcQ", json).unwrap();
        assert_eq!(meta.title, "Never Gonna Give You Up");
        assert_eq!(meta.author, "Rick Astley");
        assert_eq!(meta.duration_secs, Some(212));
        assert_eq!(meta.duration_label(), "3:32");
    }

    #[test]
    fn test_from_dump_json_fills_defaults() {
        let meta = VideoMetadata::from_dump_json("abcdefghijk", r#"{"channel": "Chan"}"#).unwrap();
        assert_eq!(meta.video_id, "abcdefghijk");
        assert_eq!(meta.title, "Video abcdefghijk");
        assert_eq!(meta.author, "Chan");
        assert_eq!(meta.duration_label(), "unknown");
        assert!(meta.webpage_url.ends_with("abcdefghijk"));
    }
}
