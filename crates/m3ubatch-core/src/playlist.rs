//! M3U playlist parsing into link descriptors.

use std::fs;
use std::path::Path;

use crate::task::LinkDescriptor;

#[derive(Debug, thiserror::Error)]
pub enum PlaylistError {
    #[error("reading playlist {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub fn parse_m3u(path: &Path) -> Result<Vec<LinkDescriptor>, PlaylistError> {
    let text = fs::read_to_string(path).map_err(|source| PlaylistError::Read {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse_m3u_str(&text))
}

/// `#EXTINF:<duration>,<name>` names the next URL line. URLs without a name
/// become `Episode <n>`. Anything else is skipped.
pub fn parse_m3u_str(text: &str) -> Vec<LinkDescriptor> {
    let mut links = Vec::new();
    let mut pending_name: Option<String> = None;

    for line in text.lines().map(str::trim) {
        if let Some(info) = line.strip_prefix("#EXTINF") {
            pending_name = info
                .split_once(',')
                .map(|(_, name)| name.trim().to_string())
                .filter(|name| !name.is_empty());
        } else if line.starts_with("http") {
            let name = pending_name
                .take()
                .unwrap_or_else(|| format!("Episode {}", links.len() + 1));
            links.push(LinkDescriptor::new(name, line));
        }
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_extinf() {
        let text = "#EXTM3U\n\
                    #EXTINF:-1,Show - 001.m3u8\n\
                    https://cdn.example.com/1/index.m3u8\n\
                    #EXTINF:-1,Show - 002\n\
                    https://cdn.example.com/2/index.m3u8\n";
        let links = parse_m3u_str(text);
        assert_eq!(
            links,
            vec![
                LinkDescriptor::new("Show - 001.m3u8", "https://cdn.example.com/1/index.m3u8"),
                LinkDescriptor::new("Show - 002", "https://cdn.example.com/2/index.m3u8"),
            ]
        );
    }

    #[test]
    fn unnamed_urls_get_fallback_name() {
        let text = "https://a.example/1.m3u8\r\n#EXTINF:-1\r\nhttps://a.example/2.m3u8\r\n";
        let links = parse_m3u_str(text);
        assert_eq!(links[0].name, "Episode 1");
        assert_eq!(links[1].name, "Episode 2");
        assert_eq!(links[1].url, "https://a.example/2.m3u8");
    }

    #[test]
    fn names_do_not_leak_to_later_urls() {
        let text = "#EXTINF:-1,First\nhttps://a/1.m3u8\nhttps://a/2.m3u8\n";
        let links = parse_m3u_str(text);
        assert_eq!(links[0].name, "First");
        assert_eq!(links[1].name, "Episode 2");
    }

    #[test]
    fn malformed_lines_skipped() {
        let text = "#EXTVLCOPT:http-referrer=https://site\nftp://nope\nrandom text\n\n";
        assert!(parse_m3u_str(text).is_empty());
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = parse_m3u(Path::new("/nonexistent/list.m3u")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/list.m3u"));
    }
}
