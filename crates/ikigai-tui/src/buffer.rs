// Copyright (c) 2024-2026 Ikigai Contributors
//
// SPDX-License-Identifier: MIT
//! Editable multi-line input buffer.
//!
//! Holds valid UTF-8 plus `'\n'`, a byte cursor that always sits on a char
//! boundary, a *target column* remembered across runs of vertical moves,
//! and a lazily recomputed wrap-layout cache keyed on terminal width.
//! Vertical movement operates on logical lines (runs bounded by `'\n'`);
//! the wrap layout only matters for rendering.

use crate::layout::{wrap_content, WrapState};

/// Character class used by delete-word-backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Word,
    Whitespace,
    Punctuation,
}

fn classify(ch: char) -> CharClass {
    if ch.is_alphanumeric() || ch as u32 >= 0x80 {
        CharClass::Word
    } else if matches!(ch, ' ' | '\t' | '\r' | '\n') {
        CharClass::Whitespace
    } else {
        CharClass::Punctuation
    }
}

#[derive(Debug)]
struct LayoutCache {
    width: usize,
    rows: usize,
}

#[derive(Debug, Default)]
pub struct InputBuffer {
    text: String,
    /// Byte offset of the cursor; always on a char boundary.
    cursor: usize,
    /// Character column (from line start) preserved across a run of
    /// vertical moves; cleared by any horizontal move or edit.
    target_col: Option<usize>,
    cache: Option<LayoutCache>,
}

impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Replace the whole contents (history recall); cursor moves to the end.
    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.cursor = self.text.len();
        self.touch();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
        self.touch();
    }

    /// Take the contents out, leaving an empty buffer.
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        self.touch();
        std::mem::take(&mut self.text)
    }

    // ── Editing ───────────────────────────────────────────────────────────────

    pub fn insert_char(&mut self, ch: char) {
        self.text.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
        self.touch();
    }

    pub fn insert_newline(&mut self) {
        self.insert_char('\n');
    }

    /// Remove the character before the cursor; no-op at the start.
    pub fn backspace(&mut self) {
        let Some(prev) = self.prev_boundary() else {
            return;
        };
        self.text.remove(prev);
        self.cursor = prev;
        self.touch();
    }

    /// Remove the character at the cursor; no-op at the end.
    pub fn delete(&mut self) {
        if self.cursor >= self.text.len() {
            return;
        }
        self.text.remove(self.cursor);
        self.touch();
    }

    /// Delete from the cursor to the end of the logical line.
    pub fn kill_to_line_end(&mut self) {
        let end = self.line_end(self.cursor);
        self.text.drain(self.cursor..end);
        self.touch();
    }

    /// Delete the entire current logical line, including its newline.
    pub fn kill_line(&mut self) {
        if self.text.is_empty() {
            return;
        }
        let start = self.line_start(self.cursor);
        let mut end = self.line_end(self.cursor);
        if end < self.text.len() {
            end += 1; // the '\n'
        }
        self.text.drain(start..end);
        self.cursor = start;
        self.touch();
    }

    /// Skip whitespace behind the cursor, then delete the run of the
    /// character class found there.
    pub fn delete_word_backward(&mut self) {
        let mut pos = self.cursor;
        while let Some(prev) = self.boundary_before(pos) {
            let ch = self.char_at(prev);
            if classify(ch) != CharClass::Whitespace {
                break;
            }
            pos = prev;
        }
        if let Some(first) = self.boundary_before(pos) {
            let class = classify(self.char_at(first));
            while let Some(prev) = self.boundary_before(pos) {
                if classify(self.char_at(prev)) != class {
                    break;
                }
                pos = prev;
            }
        }
        self.text.drain(pos..self.cursor);
        self.cursor = pos;
        self.touch();
    }

    // ── Cursor movement ───────────────────────────────────────────────────────

    pub fn cursor_left(&mut self) {
        if let Some(prev) = self.prev_boundary() {
            self.cursor = prev;
        }
        self.target_col = None;
    }

    pub fn cursor_right(&mut self) {
        if self.cursor < self.text.len() {
            self.cursor += self.char_at(self.cursor).len_utf8();
        }
        self.target_col = None;
    }

    pub fn cursor_to_line_start(&mut self) {
        self.cursor = self.line_start(self.cursor);
        self.target_col = None;
    }

    pub fn cursor_to_line_end(&mut self) {
        self.cursor = self.line_end(self.cursor);
        self.target_col = None;
    }

    /// Move to the previous logical line, keeping the target column.
    /// Returns false when already on the first line.
    pub fn cursor_up(&mut self) -> bool {
        let line_start = self.line_start(self.cursor);
        if line_start == 0 {
            return false;
        }
        let col = self.remembered_column(line_start);
        let prev_line_start = self.line_start(line_start - 1);
        self.cursor = self.seek_column(prev_line_start, col);
        true
    }

    /// Move to the next logical line, keeping the target column.
    /// Returns false when already on the last line.
    pub fn cursor_down(&mut self) -> bool {
        let line_end = self.line_end(self.cursor);
        if line_end >= self.text.len() {
            return false;
        }
        let line_start = self.line_start(self.cursor);
        let col = self.remembered_column(line_start);
        self.cursor = self.seek_column(line_end + 1, col);
        true
    }

    // ── Layout ────────────────────────────────────────────────────────────────

    /// Physical rows at `width`, recomputing the cache only when the text
    /// or width changed.
    pub fn physical_lines(&mut self, width: usize) -> usize {
        match &self.cache {
            Some(c) if c.width == width => c.rows,
            _ => {
                let rows = crate::layout::wrap_rows(&self.text, width);
                self.cache = Some(LayoutCache { width, rows });
                rows
            }
        }
    }

    /// Full wrap layout for rendering: visual lines + cursor position.
    pub fn wrap_state(&self, width: usize) -> WrapState {
        wrap_content(&self.text, width, self.cursor)
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn touch(&mut self) {
        self.cache = None;
        self.target_col = None;
    }

    fn char_at(&self, byte: usize) -> char {
        self.text[byte..].chars().next().unwrap_or('\0')
    }

    fn prev_boundary(&self) -> Option<usize> {
        self.boundary_before(self.cursor)
    }

    fn boundary_before(&self, byte: usize) -> Option<usize> {
        if byte == 0 {
            return None;
        }
        let mut prev = byte - 1;
        while !self.text.is_char_boundary(prev) {
            prev -= 1;
        }
        Some(prev)
    }

    fn line_start(&self, byte: usize) -> usize {
        self.text[..byte].rfind('\n').map(|p| p + 1).unwrap_or(0)
    }

    fn line_end(&self, byte: usize) -> usize {
        self.text[byte..]
            .find('\n')
            .map(|p| byte + p)
            .unwrap_or(self.text.len())
    }

    /// Column to aim for on vertical moves: the remembered target column if
    /// a run is in progress, else the current column (which then becomes
    /// the target).
    fn remembered_column(&mut self, line_start: usize) -> usize {
        let current = self.text[line_start..self.cursor].chars().count();
        *self.target_col.get_or_insert(current)
    }

    /// Byte offset of `col` characters into the line starting at `start`,
    /// clamped to that line's length.
    fn seek_column(&self, start: usize, col: usize) -> usize {
        let end = self.line_end(start);
        let mut byte = start;
        for ch in self.text[start..end].chars().take(col) {
            byte += ch.len_utf8();
        }
        byte
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_with(text: &str) -> InputBuffer {
        let mut b = InputBuffer::new();
        b.set_text(text);
        b
    }

    // ── Insertion & deletion ──────────────────────────────────────────────────

    #[test]
    fn insert_chars_appends_at_cursor() {
        let mut b = InputBuffer::new();
        b.insert_char('h');
        b.insert_char('i');
        assert_eq!(b.text(), "hi");
        assert_eq!(b.cursor(), 2);
    }

    #[test]
    fn insert_in_middle() {
        let mut b = buffer_with("ac");
        b.cursor_left();
        b.insert_char('b');
        assert_eq!(b.text(), "abc");
        assert_eq!(b.cursor(), 2);
    }

    #[test]
    fn backspace_removes_previous_char() {
        let mut b = buffer_with("ab");
        b.backspace();
        assert_eq!(b.text(), "a");
        assert_eq!(b.cursor(), 1);
    }

    #[test]
    fn backspace_at_start_is_noop() {
        let mut b = buffer_with("ab");
        b.cursor_to_line_start();
        b.backspace();
        assert_eq!(b.text(), "ab");
    }

    #[test]
    fn backspace_removes_multibyte_char_whole() {
        let mut b = buffer_with("aé");
        b.backspace();
        assert_eq!(b.text(), "a");
    }

    #[test]
    fn delete_removes_char_at_cursor() {
        let mut b = buffer_with("abc");
        b.cursor_to_line_start();
        b.delete();
        assert_eq!(b.text(), "bc");
        assert_eq!(b.cursor(), 0);
    }

    #[test]
    fn delete_at_end_is_noop() {
        let mut b = buffer_with("ab");
        b.delete();
        assert_eq!(b.text(), "ab");
    }

    #[test]
    fn insert_then_backspace_round_trips() {
        // Property 2: insert C then backspace restores the bytes.
        for c in ['x', 'é', '中', '🎉'] {
            let mut b = buffer_with("hello");
            b.cursor_left();
            b.cursor_left();
            let before = b.text().to_string();
            let cursor_before = b.cursor();
            b.insert_char(c);
            b.backspace();
            assert_eq!(b.text(), before, "char {c:?}");
            assert_eq!(b.cursor(), cursor_before);
        }
    }

    // ── Kill operations ───────────────────────────────────────────────────────

    #[test]
    fn kill_to_line_end_stops_at_newline() {
        let mut b = buffer_with("hello\nworld");
        b.cursor_up();
        b.cursor_to_line_start();
        b.cursor_right();
        b.cursor_right();
        b.kill_to_line_end();
        assert_eq!(b.text(), "he\nworld");
    }

    #[test]
    fn kill_line_removes_line_and_newline() {
        let mut b = buffer_with("one\ntwo\nthree");
        b.cursor_up(); // on "two"
        b.kill_line();
        assert_eq!(b.text(), "one\nthree");
    }

    #[test]
    fn kill_line_on_last_line_removes_it() {
        let mut b = buffer_with("one\ntwo");
        b.kill_line();
        assert_eq!(b.text(), "one\n");
    }

    #[test]
    fn kill_line_on_empty_buffer_is_noop() {
        let mut b = InputBuffer::new();
        b.kill_line();
        assert_eq!(b.text(), "");
    }

    // ── Delete word backward ──────────────────────────────────────────────────

    #[test]
    fn delete_word_back_removes_word() {
        let mut b = buffer_with("hello world");
        b.delete_word_backward();
        assert_eq!(b.text(), "hello ");
    }

    #[test]
    fn delete_word_back_skips_trailing_whitespace() {
        let mut b = buffer_with("hello   ");
        b.delete_word_backward();
        assert_eq!(b.text(), "");
    }

    #[test]
    fn delete_word_back_stops_at_class_change() {
        let mut b = buffer_with("foo.bar");
        b.delete_word_backward();
        assert_eq!(b.text(), "foo.");
        b.delete_word_backward();
        assert_eq!(b.text(), "foo");
    }

    #[test]
    fn delete_word_back_treats_multibyte_as_word() {
        let mut b = buffer_with("say 中文");
        b.delete_word_backward();
        assert_eq!(b.text(), "say ");
    }

    // ── Horizontal movement ───────────────────────────────────────────────────

    #[test]
    fn left_right_are_noops_at_boundaries() {
        let mut b = buffer_with("a");
        b.cursor_right();
        assert_eq!(b.cursor(), 1);
        b.cursor_to_line_start();
        b.cursor_left();
        assert_eq!(b.cursor(), 0);
    }

    #[test]
    fn left_steps_over_multibyte() {
        let mut b = buffer_with("中");
        b.cursor_left();
        assert_eq!(b.cursor(), 0);
    }

    #[test]
    fn line_start_and_end_respect_newlines() {
        let mut b = buffer_with("ab\ncd");
        b.cursor_to_line_start();
        assert_eq!(b.cursor(), 3);
        b.cursor_to_line_end();
        assert_eq!(b.cursor(), 5);
    }

    // ── Vertical movement & target column ─────────────────────────────────────

    #[test]
    fn up_moves_to_same_column() {
        let mut b = buffer_with("hello\nworld");
        // cursor at end of "world" (col 5)
        b.cursor_up();
        assert_eq!(b.cursor(), 5); // end of "hello"
    }

    #[test]
    fn up_clamps_to_short_line() {
        let mut b = buffer_with("ab\nlonger");
        b.cursor_up(); // col 6 clamps to len("ab") = 2
        assert_eq!(b.cursor(), 2);
    }

    #[test]
    fn up_then_down_returns_to_original_column() {
        // Property 3: K-column round trip across a shorter line.
        let mut b = buffer_with("abcdef\nxy\nabcdef");
        // place cursor on last line, column 5
        b.cursor_to_line_start();
        for _ in 0..5 {
            b.cursor_right();
        }
        let original = b.cursor();
        b.cursor_up(); // clamped to "xy" (col 2)
        b.cursor_down();
        assert_eq!(b.cursor(), original);
    }

    #[test]
    fn target_column_resets_on_horizontal_move() {
        let mut b = buffer_with("abcdef\nxy\nabcdef");
        b.cursor_to_line_start();
        for _ in 0..5 {
            b.cursor_right();
        }
        b.cursor_up(); // clamped to col 2 on "xy", target col 5 remembered
        b.cursor_left(); // target forgotten
        b.cursor_down();
        // New target is the column after the left move (1), not 5.
        let line_start = b.text()[..b.cursor()].rfind('\n').unwrap() + 1;
        assert_eq!(b.cursor() - line_start, 1);
    }

    #[test]
    fn target_column_resets_on_edit() {
        let mut b = buffer_with("abcdef\nxy");
        b.cursor_up(); // col 2 of line 0? cursor was at end (col 2 on "xy")
        b.insert_char('!');
        // After an edit the cache and target reset without panicking.
        b.cursor_down();
        assert!(b.cursor() <= b.text().len());
    }

    #[test]
    fn up_on_first_line_returns_false() {
        let mut b = buffer_with("abc");
        assert!(!b.cursor_up());
    }

    #[test]
    fn down_on_last_line_returns_false() {
        let mut b = buffer_with("abc");
        assert!(!b.cursor_down());
    }

    // ── Layout cache ──────────────────────────────────────────────────────────

    #[test]
    fn physical_lines_counts_wraps() {
        let mut b = buffer_with("abcdef");
        assert_eq!(b.physical_lines(3), 2);
    }

    #[test]
    fn cache_invalidated_on_width_change() {
        let mut b = buffer_with("abcdef");
        assert_eq!(b.physical_lines(3), 2);
        assert_eq!(b.physical_lines(6), 1);
        assert_eq!(b.physical_lines(3), 2);
    }

    #[test]
    fn cache_invalidated_on_mutation() {
        let mut b = buffer_with("abc");
        assert_eq!(b.physical_lines(3), 1);
        b.insert_char('d');
        assert_eq!(b.physical_lines(3), 2);
    }

    #[test]
    fn take_clears_buffer() {
        let mut b = buffer_with("hello");
        let text = b.take();
        assert_eq!(text, "hello");
        assert!(b.is_empty());
        assert_eq!(b.cursor(), 0);
    }
}
