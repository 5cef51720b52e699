//! Display-width aware string helpers shared by the table renderers

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Shorten `s` to at most `max_width` columns, ending with `…` when cut
pub fn truncate(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    if max_width == 0 {
        return String::new();
    }

    let target_width = max_width - 1;
    let mut truncated = String::new();
    let mut current_width = 0;
    for ch in s.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if current_width + ch_width > target_width {
            break;
        }
        truncated.push(ch);
        current_width += ch_width;
    }
    truncated.push('…');
    truncated
}

/// Truncate then pad with spaces to exactly `width` columns
pub fn fit(s: &str, width: usize) -> String {
    let truncated = truncate(s, width);
    let padding = width.saturating_sub(truncated.width());
    format!("{}{}", truncated, " ".repeat(padding))
}
