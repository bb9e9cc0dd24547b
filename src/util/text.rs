use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const ELLIPSIS: &str = "...";

/// Terminal columns occupied by `s` (CJK and emoji count as 2).
///
/// ```
/// use lazyrss::util::display_width;
///
/// assert_eq!(display_width("Hello"), 5);
/// assert_eq!(display_width("日本"), 4);
/// ```
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Byte offset of the longest prefix of `s` that fits in `max_width` columns
fn fit_prefix(s: &str, max_width: usize) -> usize {
    let mut used = 0;
    for (idx, c) in s.char_indices() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > max_width {
            return idx;
        }
        used += w;
    }
    s.len()
}

/// Truncate `s` to at most `max_width` columns, marking the cut with "...".
///
/// Widths of 3 or less leave no room for the marker, so the text is simply
/// cut. Returns the input borrowed when it already fits.
///
/// ```
/// use lazyrss::util::truncate_to_width;
///
/// assert_eq!(truncate_to_width("Short", 10), "Short");
/// assert_eq!(truncate_to_width("Hello World", 8), "Hello...");
/// assert_eq!(truncate_to_width("Test", 2), "Te");
/// ```
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if display_width(s) <= max_width {
        return Cow::Borrowed(s);
    }
    if max_width <= ELLIPSIS.len() {
        return Cow::Borrowed(&s[..fit_prefix(s, max_width)]);
    }
    let cut = fit_prefix(s, max_width - ELLIPSIS.len());
    Cow::Owned(format!("{}{}", &s[..cut], ELLIPSIS))
}

fn is_stripped_control(b: u8) -> bool {
    b == 0x7f || (b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r'))
}

/// Remove terminal control characters and escape sequences from feed text.
///
/// Feed titles and bodies are untrusted. CSI sequences (`ESC [` ... final
/// byte), OSC sequences (`ESC ]` ... BEL or `ESC \`), bare ESC, DEL and C0
/// controls other than tab, newline and carriage return are dropped.
/// Clean input is returned borrowed.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let bytes = s.as_bytes();
    if !bytes.iter().any(|&b| b == 0x1b || is_stripped_control(b)) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    let mut run_start = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if b != 0x1b && !is_stripped_control(b) {
            i += 1;
            continue;
        }

        // Control bytes are ASCII, so run boundaries are char boundaries
        out.push_str(&s[run_start..i]);

        i += 1;
        if b == 0x1b {
            match bytes.get(i) {
                Some(b'[') => {
                    i += 1;
                    while i < bytes.len() {
                        let c = bytes[i];
                        i += 1;
                        if (0x40..=0x7e).contains(&c) {
                            break;
                        }
                    }
                }
                Some(b']') => {
                    i += 1;
                    while i < bytes.len() {
                        if bytes[i] == 0x07 {
                            i += 1;
                            break;
                        }
                        if bytes[i] == 0x1b && bytes.get(i + 1) == Some(&b'\\') {
                            i += 2;
                            break;
                        }
                        i += 1;
                    }
                }
                _ => {}
            }
        }
        run_start = i;
    }
    out.push_str(&s[run_start..]);

    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_truncation() {
        assert_eq!(truncate_to_width("Hello World", 8), "Hello...");
        assert_eq!(truncate_to_width("Short", 10), "Short");
        assert_eq!(truncate_to_width("12345", 5), "12345");
    }

    #[test]
    fn test_cjk_truncation() {
        // 2 columns per character
        assert_eq!(truncate_to_width("你好世界", 7), "你好...");
        assert_eq!(truncate_to_width("你好世界", 5), "你...");
        assert_eq!(truncate_to_width("你好", 10), "你好");
    }

    #[test]
    fn test_narrow_widths_cut_without_ellipsis() {
        assert_eq!(truncate_to_width("Test", 0), "");
        assert_eq!(truncate_to_width("Test", 1), "T");
        assert_eq!(truncate_to_width("Testing", 3), "Tes");
        assert_eq!(truncate_to_width("你好", 1), "");
        assert_eq!(truncate_to_width("你好", 3), "你");
        assert_eq!(truncate_to_width("Testing", 4), "T...");
    }

    #[test]
    fn test_truncated_result_fits() {
        for width in 0..20 {
            let out = truncate_to_width("Mixed 日本語 text with emoji 🎉", width);
            assert!(display_width(&out) <= width, "width {} gave {:?}", width, out);
        }
    }

    #[test]
    fn test_strip_clean_text_is_borrowed() {
        let input = "line1\nline2\ttabbed\r\n";
        assert!(matches!(strip_control_chars(input), Cow::Borrowed(_)));
    }

    #[test]
    fn test_strip_c0_and_del() {
        assert_eq!(strip_control_chars("he\x00ll\x07o\x08 w\x0bor\x0cld\x7f!"), "hello world!");
    }

    #[test]
    fn test_strip_csi_sequences() {
        assert_eq!(strip_control_chars("\x1b[31mRed\x1b[0m"), "Red");
        assert_eq!(strip_control_chars("before\x1b[2Aafter"), "beforeafter");
    }

    #[test]
    fn test_strip_osc_sequences() {
        assert_eq!(strip_control_chars("\x1b]0;title\x07safe"), "safe");
        assert_eq!(
            strip_control_chars("\x1b]8;;https://evil.example\x1b\\click\x1b]8;;\x1b\\"),
            "click"
        );
    }

    #[test]
    fn test_strip_bare_esc_and_trailing() {
        assert_eq!(strip_control_chars("a\x1bb"), "ab");
        assert_eq!(strip_control_chars("tail\x1b"), "tail");
        assert_eq!(strip_control_chars("\x1b[12;"), "");
    }

    #[test]
    fn test_strip_preserves_unicode() {
        assert_eq!(strip_control_chars("日本語 \x1b[31m赤い\x1b[0m"), "日本語 赤い");
    }
}
