//! Column-based text measurement and pagination.
//!
//! The body font is approximated by a fixed average glyph advance, which
//! keeps measurement deterministic and independent of any rasterizer. The
//! same wrapping rules drive both page measurement and line breaking for
//! rendering, so a measured page always re-wraps to the same lines.
//!
//! `paginate` guarantees that concatenating the returned pages reproduces
//! the input exactly, and that it terminates on any input.

/// A4 page size in points.
pub const PAGE_WIDTH: f64 = 595.0;
pub const PAGE_HEIGHT: f64 = 842.0;

/// Content rectangle insets from the page edges.
pub const MARGIN_X: f64 = 60.0;
pub const MARGIN_Y: f64 = 80.0;

pub const BODY_FONT_SIZE: f64 = 12.0;
pub const LINE_SPACING: f64 = 6.0;
pub const LINE_HEIGHT: f64 = BODY_FONT_SIZE + LINE_SPACING;

/// Average glyph advance as a fraction of the font size.
pub const AVG_ADVANCE_EM: f64 = 0.5;

/// Columns per line: content width 475pt over a 6pt average advance.
pub const CHARS_PER_LINE: usize = 79;

/// Lines per page: content height 682pt over an 18pt line height.
pub const LINES_PER_PAGE: usize = 37;

/// Characters force-emitted when a measurement pass places nothing, so
/// pagination can never stall.
const FORCED_CHUNK: usize = 100;

/// Splits text into page-sized chunks using the standard page measurer.
pub fn paginate(text: &str) -> Vec<String> {
    paginate_with(text, |remaining| {
        layout_lines(remaining, LINES_PER_PAGE).1
    })
}

/// Wraps text into rendering lines with no page limit. Tabs and other
/// whitespace are normalized to single spaces; explicit newlines always
/// break the line.
pub fn wrap_lines(text: &str) -> Vec<String> {
    layout_lines(text, usize::MAX).0
}

fn paginate_with<F>(text: &str, measure: F) -> Vec<String>
where
    F: Fn(&str) -> usize,
{
    if text.is_empty() {
        return vec![String::new()];
    }

    let chars: Vec<char> = text.chars().collect();
    let mut pages = Vec::new();
    let mut pos = 0;
    while pos < chars.len() {
        let remaining: String = chars[pos..].iter().collect();
        let mut fit = measure(&remaining);
        if fit == 0 {
            fit = FORCED_CHUNK;
        }
        let fit = fit.min(chars.len() - pos);
        pages.push(chars[pos..pos + fit].iter().collect());
        pos += fit;
    }
    pages
}

/// Greedy word wrap over at most `max_lines` lines. Returns the wrapped
/// lines and the number of characters of `text` they consumed. Words wider
/// than a full line are broken at column boundaries.
fn layout_lines(text: &str, max_lines: usize) -> (Vec<String>, usize) {
    let chars: Vec<char> = text.chars().collect();
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut col = 0usize;
    let mut consumed = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];

        if c == '\n' {
            lines.push(std::mem::take(&mut current));
            col = 0;
            i += 1;
            consumed = i;
            if lines.len() >= max_lines {
                return (lines, consumed);
            }
            continue;
        }

        if c.is_whitespace() {
            if col < CHARS_PER_LINE {
                current.push(' ');
                col += 1;
            } else {
                // The space collapses into the line break.
                lines.push(std::mem::take(&mut current));
                col = 0;
                if lines.len() >= max_lines {
                    i += 1;
                    return (lines, i);
                }
            }
            i += 1;
            consumed = i;
            continue;
        }

        let start = i;
        let mut end = i;
        while end < chars.len() && !chars[end].is_whitespace() {
            end += 1;
        }
        let word_len = end - start;

        if word_len <= CHARS_PER_LINE {
            if col + word_len > CHARS_PER_LINE {
                lines.push(std::mem::take(&mut current));
                col = 0;
                if lines.len() >= max_lines {
                    // The word belongs to the next page.
                    return (lines, consumed);
                }
            }
            current.extend(chars[start..end].iter());
            col += word_len;
            i = end;
            consumed = i;
        } else {
            let mut j = start;
            while j < end {
                if col == CHARS_PER_LINE {
                    lines.push(std::mem::take(&mut current));
                    col = 0;
                    if lines.len() >= max_lines {
                        return (lines, consumed);
                    }
                }
                let take = (CHARS_PER_LINE - col).min(end - j);
                current.extend(chars[j..j + take].iter());
                col += take;
                j += take;
                consumed = j;
            }
            i = end;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    (lines, consumed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_yields_single_blank_page() {
        assert_eq!(paginate(""), vec![String::new()]);
    }

    #[test]
    fn test_short_text_fits_one_page() {
        let text = "A short biography paragraph.";
        assert_eq!(paginate(text), vec![text.to_string()]);
    }

    #[test]
    fn test_pages_concatenate_to_input_exactly() {
        let mut text = String::new();
        for i in 0..1200 {
            text.push_str(&format!("sentence number {} keeps the page filling up. ", i));
            if i % 7 == 0 {
                text.push('\n');
            }
        }
        let pages = paginate(&text);
        assert!(pages.len() > 1);
        assert_eq!(pages.concat(), text);
    }

    #[test]
    fn test_measured_pages_fit_page_limits() {
        let text = "words and more words ".repeat(800);
        for page in paginate(&text) {
            let lines = wrap_lines(&page);
            assert!(lines.len() <= LINES_PER_PAGE);
            for line in lines {
                assert!(line.chars().count() <= CHARS_PER_LINE);
            }
        }
    }

    #[test]
    fn test_explicit_newlines_break_lines() {
        assert_eq!(wrap_lines("a\nb"), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(
            wrap_lines("para one\n\npara two"),
            vec!["para one".to_string(), String::new(), "para two".to_string()]
        );
    }

    #[test]
    fn test_overlong_token_is_hard_broken() {
        let token = "x".repeat(200);
        let lines = wrap_lines(&token);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].chars().count(), CHARS_PER_LINE);
        assert_eq!(lines[1].chars().count(), CHARS_PER_LINE);
        assert_eq!(lines[2].chars().count(), 200 - 2 * CHARS_PER_LINE);
        assert_eq!(paginate(&token).concat(), token);
    }

    #[test]
    fn test_multibyte_text_survives_pagination() {
        let text = "héllo wörld ünïcode çontent ".repeat(400);
        let pages = paginate(&text);
        assert!(pages.len() > 1);
        assert_eq!(pages.concat(), text);
    }

    #[test]
    fn test_zero_measure_forces_fixed_chunk() {
        let text = "z".repeat(250);
        let pages = paginate_with(&text, |_| 0);
        assert_eq!(
            pages.iter().map(|p| p.chars().count()).collect::<Vec<_>>(),
            vec![100, 100, 50]
        );
        assert_eq!(pages.concat(), text);
    }
}
