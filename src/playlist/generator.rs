//! Extended M3U rendering
//!
//! Every entry points back into the gateway's own `/stream/{id}` endpoint
//! with the caller's session token attached; origin URLs never appear. The
//! document is rendered per request because the embedded token differs per
//! caller.

use std::fmt::Write;

use crate::models::Channel;

pub const M3U_CONTENT_TYPE: &str = "audio/x-mpegurl";

#[derive(Debug, Clone)]
pub struct PlaylistGenerator {
    base_url: String,
}

impl PlaylistGenerator {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Gateway URL a player should request for `channel_id`
    pub fn stream_reference(&self, channel_id: &str, session_token: &str) -> String {
        format!(
            "{}/stream/{}?token={}",
            self.base_url,
            urlencoding::encode(channel_id),
            urlencoding::encode(session_token)
        )
    }

    /// Render `channels` in the order given
    pub fn render(&self, channels: &[Channel], session_token: &str) -> String {
        let mut m3u = String::from("#EXTM3U\n");

        for (index, channel) in channels.iter().enumerate() {
            m3u.push_str("#EXTINF:-1");

            if let Some(tvg_id) = non_empty(&channel.tvg_id) {
                push_attr(&mut m3u, "tvg-id", tvg_id);
            }
            push_attr(&mut m3u, "tvg-name", &channel.name);
            if let Some(logo) = non_empty(&channel.logo_url) {
                push_attr(&mut m3u, "tvg-logo", logo);
            }
            let number = channel.channel_number.map_or(index + 1, |n| n.max(0) as usize);
            push_attr(&mut m3u, "tvg-chno", &number.to_string());
            if let Some(group) = non_empty(&channel.category) {
                push_attr(&mut m3u, "group-title", group);
            }

            let _ = writeln!(m3u, ",{}", escape_title(&channel.name));
            m3u.push_str(&self.stream_reference(&channel.id, session_token));
            m3u.push('\n');
        }

        m3u
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    let _ = write!(out, " {}=\"{}\"", name, escape_attr(value));
}

/// Attribute values: no control characters, no double quotes
fn escape_attr(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '"' => '\'',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect()
}

/// Display titles run to end of line, so only control characters matter
fn escape_title(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn channel(id: &str, name: &str) -> Channel {
        let now = Utc::now();
        Channel {
            id: id.into(),
            name: name.into(),
            category: Some("News".into()),
            tvg_id: Some("news.uk".into()),
            logo_url: None,
            channel_number: Some(7),
            origin_url: "http://origin.internal/secret.ts".into(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn renders_entries_with_gateway_references() {
        let generator = PlaylistGenerator::new("https://tv.example.com/");
        let m3u = generator.render(&[channel("ch-1", "World News")], "tok123");
        let lines: Vec<&str> = m3u.lines().collect();

        assert_eq!(lines[0], "#EXTM3U");
        assert_eq!(
            lines[1],
            "#EXTINF:-1 tvg-id=\"news.uk\" tvg-name=\"World News\" tvg-chno=\"7\" group-title=\"News\",World News"
        );
        assert_eq!(lines[2], "https://tv.example.com/stream/ch-1?token=tok123");
        assert!(!m3u.contains("origin.internal"));
    }

    #[test]
    fn quotes_and_line_breaks_cannot_break_the_format() {
        let generator = PlaylistGenerator::new("https://tv.example.com");
        let mut evil = channel("ch-1", "Bad \"Name\"\r\n#EXTINF:-1,Injected");
        evil.category = Some("A\"B".into());
        let m3u = generator.render(&[evil], "t");

        assert_eq!(m3u.lines().count(), 3);
        assert!(m3u.contains("tvg-name=\"Bad 'Name'  #EXTINF:-1,Injected\""));
        assert!(m3u.contains("group-title=\"A'B\""));
    }

    #[test]
    fn missing_channel_number_falls_back_to_position() {
        let generator = PlaylistGenerator::new("https://tv.example.com");
        let mut a = channel("a", "A");
        a.channel_number = None;
        let mut b = channel("b", "B");
        b.channel_number = None;
        let m3u = generator.render(&[a, b], "t");
        assert!(m3u.contains("tvg-chno=\"2\""));
    }

    #[test]
    fn token_and_id_are_url_encoded() {
        let generator = PlaylistGenerator::new("https://tv.example.com");
        assert_eq!(
            generator.stream_reference("a b", "x&y"),
            "https://tv.example.com/stream/a%20b?token=x%26y"
        );
    }
}
