// Copyright (c) 2024-2026 Ikigai Contributors
//
// SPDX-License-Identifier: MIT
//! Frame composition and minimal terminal updates.
//!
//! A *document* is composed from the scrollback, a separator row, the
//! wrapped input buffer, and a bottom separator.  The viewport shows
//! `height` physical rows ending `viewport_offset` rows above the bottom
//! (offset 0 keeps the input fully visible).  The renderer diffs each
//! frame against the previous one and emits escape sequences only for rows
//! that changed.

use std::io::Write;

use crate::buffer::InputBuffer;
use crate::scrollback::Scrollback;

/// Spinner glyphs advanced every 80 ms while a request is in flight.
pub const SPINNER_FRAMES: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// One composed viewport frame: plain rows, no escape sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: usize,
    pub height: usize,
    pub rows: Vec<String>,
    /// Cursor position `(row, col)` inside the viewport, when visible.
    pub cursor: Option<(usize, usize)>,
}

/// Clamp a viewport offset to `0 ..= max(0, document_rows - height)`.
pub fn clamp_offset(document_rows: usize, height: usize, offset: usize) -> usize {
    offset.min(document_rows.saturating_sub(height))
}

/// Compose the visible frame.
///
/// Document layout, top to bottom: scrollback rows, separator, input rows
/// (at least one), bottom separator.  The `spinner` glyph, when present,
/// is shown at the left edge of the separator row.
pub fn compose_frame(
    scrollback: &mut Scrollback,
    input: &InputBuffer,
    width: usize,
    height: usize,
    viewport_offset: usize,
    spinner: Option<char>,
) -> Frame {
    let width = width.max(1);
    let height = height.max(1);

    let mut document: Vec<String> = Vec::new();

    for i in 0..scrollback.line_count() {
        let text = scrollback.line_text(i).unwrap_or("").to_string();
        let wrapped = crate::layout::wrap_content(&text, width, 0);
        document.extend(wrapped.lines);
    }

    let mut separator: String = "─".repeat(width);
    if let Some(glyph) = spinner {
        let mut s = String::new();
        s.push(glyph);
        s.push(' ');
        s.extend("─".repeat(width.saturating_sub(2)).chars());
        separator = s;
    }
    document.push(separator);

    let wrap = input.wrap_state(width);
    let input_first_row = document.len();
    let cursor_doc = Some((input_first_row + wrap.cursor_row, wrap.cursor_col));
    if wrap.lines.is_empty() {
        document.push(String::new());
    } else {
        document.extend(wrap.lines);
    }

    document.push("─".repeat(width));

    let document_rows = document.len();
    let offset = clamp_offset(document_rows, height, viewport_offset);

    // The viewport ends `offset` rows above the document bottom.
    let end = document_rows - offset;
    let start = end.saturating_sub(height);

    let mut rows: Vec<String> = document[start..end].to_vec();
    while rows.len() < height {
        rows.push(String::new());
    }

    let cursor = cursor_doc.and_then(|(doc_row, col)| {
        if doc_row >= start && doc_row < end {
            Some((doc_row - start, col))
        } else {
            None
        }
    });

    Frame { width, height, rows, cursor }
}

/// Emits minimal escape-sequence updates between frames.
#[derive(Debug, Default)]
pub struct Renderer {
    prev: Option<Frame>,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force the next frame to repaint every row.
    pub fn invalidate(&mut self) {
        self.prev = None;
    }

    /// Write the difference between the previous frame and `frame`.
    pub fn render(&mut self, frame: &Frame, out: &mut impl Write) -> std::io::Result<()> {
        let full_repaint = match &self.prev {
            Some(p) => p.width != frame.width || p.height != frame.height,
            None => true,
        };

        out.write_all(b"\x1b[?25l")?; // hide cursor while painting

        if full_repaint {
            out.write_all(b"\x1b[2J")?;
        }

        for (i, row) in frame.rows.iter().enumerate() {
            let unchanged = !full_repaint
                && self
                    .prev
                    .as_ref()
                    .map(|p| p.rows.get(i) == Some(row))
                    .unwrap_or(false);
            if unchanged {
                continue;
            }
            // 1-based row addressing.
            write!(out, "\x1b[{};1H\x1b[2K", i + 1)?;
            out.write_all(row.as_bytes())?;
        }

        match frame.cursor {
            Some((row, col)) => {
                write!(out, "\x1b[{};{}H", row + 1, col + 1)?;
                out.write_all(b"\x1b[?25h")?;
            }
            None => {
                // Park the cursor; leave it hidden.
                write!(out, "\x1b[{};1H", frame.height)?;
            }
        }
        out.flush()?;

        self.prev = Some(frame.clone());
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
