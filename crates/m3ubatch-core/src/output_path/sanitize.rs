//! Cross-platform file-stem sanitization.

/// Characters rejected by at least one common filesystem.
const RESERVED: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Stem used when a name sanitizes to nothing.
pub const DEFAULT_STEM: &str = "download";

/// Sanitizes a display name for use as a file stem.
///
/// - Replaces `\ / : * ? " < > |` and control characters with `_`
/// - Trims leading/trailing spaces and dots
/// - Limits length to 240 bytes, leaving room for a collision suffix and extension
pub fn sanitize_file_stem(name: &str) -> String {
    const STEM_MAX: usize = 240;

    let replaced: String = name
        .chars()
        .map(|c| {
            if RESERVED.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let trimmed = replaced.trim_matches(|c: char| c == '.' || c.is_whitespace());

    let mut take = trimmed.len().min(STEM_MAX);
    while take > 0 && !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    let stem = trimmed[..take].trim_end();
    if stem.is_empty() {
        DEFAULT_STEM.to_string()
    } else {
        stem.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_reserved_characters() {
        assert_eq!(
            sanitize_file_stem("Re:Zero? <Part 1/2> \"OVA\" | *"),
            "Re_Zero_ _Part 1_2_ _OVA_ _ _"
        );
    }

    #[test]
    fn trims_dots_and_spaces() {
        assert_eq!(sanitize_file_stem("  ..Episode 1..  "), "Episode 1");
    }

    #[test]
    fn control_chars() {
        assert_eq!(sanitize_file_stem("ep\x00\t1"), "ep__1");
    }

    #[test]
    fn empty_falls_back() {
        assert_eq!(sanitize_file_stem(" .. "), DEFAULT_STEM);
        assert_eq!(sanitize_file_stem(""), DEFAULT_STEM);
    }

    #[test]
    fn long_names_cut_on_char_boundary() {
        let name = "é".repeat(200);
        let stem = sanitize_file_stem(&name);
        assert!(stem.len() <= 240);
        assert!(stem.chars().all(|c| c == 'é'));
    }
}
