//! Output path resolution.
//!
//! Each task's file lives in the output directory under a stem sanitized from
//! its display name and an extension derived from its URL. Paths are
//! deterministic for a given task list; names that collide get ` (2)`, ` (3)`,
//! ... suffixes in list order.

mod sanitize;

pub use sanitize::{sanitize_file_stem, DEFAULT_STEM};

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::task::LinkDescriptor;

/// Container used for HLS playlists and extension-less URLs.
const DEFAULT_EXTENSION: &str = "mp4";

/// Media suffixes dropped from display names before sanitizing.
const NAME_SUFFIXES: [&str; 5] = [".mp4", ".mkv", ".m3u8", ".ts", ".webm"];

/// Output extension for a source URL (without the dot).
///
/// HLS sources (`.m3u8`) are remuxed into MP4; otherwise the URL path's own
/// extension is kept.
pub fn extension_for_url(url: &str) -> String {
    if url.contains(".m3u8") {
        return DEFAULT_EXTENSION.to_string();
    }
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            let segment = u.path().rsplit('/').find(|s| !s.is_empty())?.to_string();
            let (stem, ext) = segment.rsplit_once('.')?;
            let valid = !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= 5
                && ext.chars().all(|c| c.is_ascii_alphanumeric());
            valid.then(|| ext.to_ascii_lowercase())
        })
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// File name (stem + extension) for one link, before collision handling.
pub fn file_name_for(link: &LinkDescriptor) -> (String, String) {
    let name = NAME_SUFFIXES
        .iter()
        .find_map(|s| link.name.strip_suffix(s))
        .unwrap_or(&link.name);
    (sanitize_file_stem(name), extension_for_url(&link.url))
}

/// Returns `stem.ext`, or `stem (n).ext` with the smallest n >= 2 not yet taken.
/// Comparison is case-insensitive so case-folding filesystems do not collide.
pub fn unique_file_name(stem: &str, ext: &str, taken: &HashSet<String>) -> String {
    let candidate = format!("{}.{}", stem, ext);
    if !taken.contains(&candidate.to_lowercase()) {
        return candidate;
    }
    (2..)
        .map(|n| format!("{} ({}).{}", stem, n, ext))
        .find(|c| !taken.contains(&c.to_lowercase()))
        .unwrap_or(candidate)
}

/// Resolves one output path per link, in order.
pub fn resolve_output_paths(links: &[LinkDescriptor], dir: &Path) -> Vec<PathBuf> {
    let mut taken = HashSet::with_capacity(links.len());
    links
        .iter()
        .map(|link| {
            let (stem, ext) = file_name_for(link);
            let name = unique_file_name(&stem, &ext, &taken);
            taken.insert(name.to_lowercase());
            dir.join(name)
        })
        .collect()
}
