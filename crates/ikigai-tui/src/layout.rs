// Copyright (c) 2024-2026 Ikigai Contributors
//
// SPDX-License-Identifier: MIT
//! Wrapping and cursor-positioning logic shared by the input box, the
//! scrollback, and the renderer.
//!
//! [`wrap_content`] converts a raw string and a byte-index cursor into a
//! list of visual lines and the `(row, col)` position of the cursor in
//! those lines.  It respects both explicit newlines and soft-wrap at a
//! display-column limit, and handles multi-byte UTF-8 and wide (CJK /
//! emoji) characters via `unicode_width`.

use unicode_width::UnicodeWidthChar;

/// Output of [`wrap_content`].
#[derive(Debug, PartialEq, Eq)]
pub struct WrapState {
    /// Visual lines produced by splitting on `\n` and soft-wrapping at the
    /// width.  Always contains at least one element (possibly `""`).
    pub lines: Vec<String>,
    /// Index into `lines` that contains the cursor position.
    pub cursor_row: usize,
    /// Display-column offset within `lines[cursor_row]` of the cursor.
    pub cursor_col: usize,
}

/// Wrap `content` into visual lines of at most `width` display columns and
/// compute where `cursor_byte` (a UTF-8 byte offset) falls in the grid.
///
/// Rules
/// -----
/// * `'\n'` always starts a new visual line.
/// * A character that would push the column count past `width` soft-wraps
///   onto a new visual line at column 0.
/// * Wide characters (CJK ideographs, emoji) count as 2 columns;
///   zero-width characters count as 0.
/// * `cursor_byte` is clamped to `content.len()`.
/// * `width == 0` disables soft-wrapping.
pub fn wrap_content(content: &str, width: usize, cursor_byte: usize) -> WrapState {
    let cursor_byte = cursor_byte.min(content.len());

    let mut lines: Vec<String> = Vec::new();
    let mut cur_line = String::new();
    let mut cur_col: usize = 0;
    let mut cur_byte: usize = 0;
    let mut c_row: usize = 0;
    let mut c_col: usize = 0;
    let mut cursor_placed = false;

    for ch in content.chars() {
        let ch_bytes = ch.len_utf8();
        let ch_width = char_columns(ch);

        let soft_wrap = width > 0 && ch != '\n' && ch_width > 0 && cur_col + ch_width > width;
        if soft_wrap {
            lines.push(std::mem::take(&mut cur_line));
            cur_col = 0;
        }

        // The cursor sits *before* the character at `cursor_byte`.
        if !cursor_placed && cur_byte == cursor_byte {
            cursor_placed = true;
            c_row = lines.len();
            c_col = cur_col;
        }

        if ch == '\n' {
            lines.push(std::mem::take(&mut cur_line));
            cur_col = 0;
        } else {
            cur_line.push(ch);
            cur_col += ch_width;
        }

        cur_byte += ch_bytes;
    }

    if !cursor_placed && cur_byte == cursor_byte {
        c_row = lines.len();
        c_col = cur_col;
        // An exactly-full final line puts the cursor at the start of the
        // next visual row, matching terminal behaviour.
        if width > 0 && c_col >= width {
            c_row += 1;
            c_col = 0;
        }
    }

    lines.push(cur_line);

    while c_row >= lines.len() {
        lines.push(String::new());
    }

    WrapState { lines, cursor_row: c_row, cursor_col: c_col }
}

/// Number of physical rows `content` occupies at `width` columns.
///
/// Pure function of `(content, width)`; an empty string is one row.
pub fn wrap_rows(content: &str, width: usize) -> usize {
    let mut rows = 1usize;
    let mut col = 0usize;
    for ch in content.chars() {
        if ch == '\n' {
            rows += 1;
            col = 0;
            continue;
        }
        let w = char_columns(ch);
        if width > 0 && w > 0 && col + w > width {
            rows += 1;
            col = 0;
        }
        col += w;
    }
    rows
}

/// Byte offset in `content` corresponding to visual `(target_row,
/// target_col)` at `width`.
///
/// `target_col` beyond the end of the target visual line clamps to the end
/// of that line, matching editor behaviour for vertical movement across
/// lines of different lengths.
pub fn byte_offset_at_row_col(
    content: &str,
    width: usize,
    target_row: usize,
    target_col: usize,
) -> usize {
    let mut lines: Vec<String> = Vec::new();
    let mut cur_line = String::new();
    let mut cur_col: usize = 0;
    let mut cur_byte: usize = 0;
    let mut line_start_bytes: Vec<usize> = vec![0];

    for ch in content.chars() {
        let ch_bytes = ch.len_utf8();
        let ch_width = char_columns(ch);
        let soft_wrap = width > 0 && ch != '\n' && ch_width > 0 && cur_col + ch_width > width;
        if soft_wrap {
            lines.push(std::mem::take(&mut cur_line));
            cur_col = 0;
            line_start_bytes.push(cur_byte);
        }
        if ch == '\n' {
            lines.push(std::mem::take(&mut cur_line));
            cur_col = 0;
            line_start_bytes.push(cur_byte + ch_bytes);
        } else {
            cur_line.push(ch);
            cur_col += ch_width;
        }
        cur_byte += ch_bytes;
    }
    lines.push(cur_line);

    let target_row = target_row.min(lines.len().saturating_sub(1));
    let line_start = line_start_bytes[target_row];
    let line_text = &lines[target_row];

    let mut col = 0usize;
    let mut byte_off = line_start;
    for ch in line_text.chars() {
        if col >= target_col {
            break;
        }
        col += char_columns(ch);
        byte_off += ch.len_utf8();
    }
    byte_off.min(content.len())
}

fn char_columns(ch: char) -> usize {
    if ch == '\n' {
        0
    } else {
        UnicodeWidthChar::width(ch).unwrap_or(1)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── wrap_content basics ───────────────────────────────────────────────────

    #[test]
    fn empty_string_one_empty_line_cursor_at_origin() {
        let s = wrap_content("", 10, 0);
        assert_eq!(s.lines, vec!["".to_string()]);
        assert_eq!((s.cursor_row, s.cursor_col), (0, 0));
    }

    #[test]
    fn no_wrap_when_content_fits() {
        let s = wrap_content("hello", 10, 5);
        assert_eq!(s.lines, vec!["hello".to_string()]);
        assert_eq!((s.cursor_row, s.cursor_col), (0, 5));
    }

    #[test]
    fn soft_wrap_splits_at_width() {
        let s = wrap_content("abcde", 3, 0);
        assert_eq!(s.lines, vec!["abc".to_string(), "de".to_string()]);
    }

    #[test]
    fn cursor_before_first_char_of_wrapped_line() {
        let s = wrap_content("abcde", 3, 3);
        assert_eq!((s.cursor_row, s.cursor_col), (1, 0));
    }

    #[test]
    fn cursor_at_end_of_exactly_full_line_wraps_to_next_row() {
        let s = wrap_content("abc", 3, 3);
        assert_eq!((s.cursor_row, s.cursor_col), (1, 0));
    }

    #[test]
    fn explicit_newline_splits_lines() {
        let s = wrap_content("a\nb", 10, 0);
        assert_eq!(s.lines, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn cursor_after_newline_is_on_second_row() {
        let s = wrap_content("a\nb", 10, 2);
        assert_eq!((s.cursor_row, s.cursor_col), (1, 0));
    }

    #[test]
    fn trailing_newline_creates_empty_last_line() {
        let s = wrap_content("a\n", 10, 2);
        assert_eq!(s.lines, vec!["a".to_string(), "".to_string()]);
        assert_eq!((s.cursor_row, s.cursor_col), (1, 0));
    }

    #[test]
    fn wide_chars_counted_as_two_columns() {
        let s = wrap_content("中中中", 4, 0);
        assert_eq!(s.lines, vec!["中中".to_string(), "中".to_string()]);
    }

    #[test]
    fn zero_width_never_soft_wraps() {
        let s = wrap_content("a very long string indeed", 0, 0);
        assert_eq!(s.lines.len(), 1);
    }

    #[test]
    fn cursor_beyond_end_is_clamped() {
        let s = wrap_content("abc", 10, 999);
        assert_eq!((s.cursor_row, s.cursor_col), (0, 3));
    }

    // ── wrap_rows ─────────────────────────────────────────────────────────────

    #[test]
    fn wrap_rows_empty_is_one() {
        assert_eq!(wrap_rows("", 10), 1);
    }

    #[test]
    fn wrap_rows_counts_soft_wraps() {
        assert_eq!(wrap_rows("abcdef", 3), 2);
        assert_eq!(wrap_rows("abcdefg", 3), 3);
    }

    #[test]
    fn wrap_rows_counts_newlines() {
        assert_eq!(wrap_rows("a\nb\nc", 10), 3);
        assert_eq!(wrap_rows("a\n", 10), 2);
    }

    #[test]
    fn wrap_rows_agrees_with_wrap_content() {
        // Property 5: the two layout paths agree for any width.
        let samples = ["", "hello", "a\nb", "abcdefghij", "中中中中", "x\ny\nabcdef"];
        for content in samples {
            for width in 1..=8 {
                assert_eq!(
                    wrap_rows(content, width),
                    wrap_content(content, width, 0).lines.len(),
                    "content={content:?} width={width}"
                );
            }
        }
    }

    #[test]
    fn wrap_rows_is_stable_across_recomputation() {
        let content = "some text\nwith lines and 中文 characters";
        let a = wrap_rows(content, 7);
        let b = wrap_rows(content, 7);
        assert_eq!(a, b);
    }

    // ── byte_offset_at_row_col ────────────────────────────────────────────────

    #[test]
    fn offset_at_origin_is_zero() {
        assert_eq!(byte_offset_at_row_col("abc", 10, 0, 0), 0);
    }

    #[test]
    fn offset_on_second_visual_row() {
        // "abcde" at width 3 → ["abc", "de"]; row 1 col 1 is before 'e'.
        assert_eq!(byte_offset_at_row_col("abcde", 3, 1, 1), 4);
    }

    #[test]
    fn offset_clamps_col_to_line_end() {
        // Row 1 is "de" (2 cols); col 99 clamps to end.
        assert_eq!(byte_offset_at_row_col("abcde", 3, 1, 99), 5);
    }

    #[test]
    fn offset_clamps_row_to_last_line() {
        // Row 99 clamps to the only line; col 0 → byte 0.
        assert_eq!(byte_offset_at_row_col("ab", 10, 99, 0), 0);
    }

    #[test]
    fn offset_after_newline() {
        // "a\nbc": row 1 col 1 is before 'c' at byte 3.
        assert_eq!(byte_offset_at_row_col("a\nbc", 10, 1, 1), 3);
    }

    #[test]
    fn offset_counts_wide_chars_as_two_cols() {
        // "中x": col 2 is before 'x' at byte 3.
        assert_eq!(byte_offset_at_row_col("中x", 10, 0, 2), 3);
    }
}
