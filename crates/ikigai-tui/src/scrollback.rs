// Copyright (c) 2024-2026 Ikigai Contributors
//
// SPDX-License-Identifier: MIT
//! Append-only transcript log with a per-width wrap-layout cache.

use crate::layout::wrap_rows;

#[derive(Debug)]
struct LayoutCache {
    width: usize,
    /// Physical rows per logical line, same order as `lines`.
    line_rows: Vec<usize>,
    /// Starting physical row of each logical line.
    line_starts: Vec<usize>,
    total_rows: usize,
}

/// Ordered sequence of logical lines.  Lines are only ever appended; wrap
/// layout is a pure function of `(line, width)` and is cached per width.
#[derive(Debug, Default)]
pub struct Scrollback {
    lines: Vec<String>,
    cache: Option<LayoutCache>,
}

impl Scrollback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one logical line.  O(1) amortized; the layout cache extends
    /// incrementally rather than recomputing.
    pub fn append_line(&mut self, text: impl Into<String>) {
        let text = text.into();
        if let Some(cache) = &mut self.cache {
            let rows = wrap_rows(&text, cache.width);
            cache.line_starts.push(cache.total_rows);
            cache.line_rows.push(rows);
            cache.total_rows += rows;
        }
        self.lines.push(text);
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line_text(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    pub fn last_line(&self) -> Option<&str> {
        self.lines.last().map(String::as_str)
    }

    /// Replace the text of the last line (streaming partial-line updates).
    ///
    /// The only permitted mutation besides append; the line count never
    /// decreases.
    pub fn replace_last_line(&mut self, text: impl Into<String>) {
        let text = text.into();
        match self.lines.last_mut() {
            Some(last) => {
                if let Some(cache) = &mut self.cache {
                    let rows = wrap_rows(&text, cache.width);
                    let old_rows = *cache.line_rows.last().unwrap_or(&0);
                    cache.total_rows = cache.total_rows - old_rows + rows;
                    *cache.line_rows.last_mut().unwrap() = rows;
                }
                *last = text;
            }
            None => self.append_line(text),
        }
    }

    /// Total physical rows at `width`; recomputes only on width change.
    pub fn total_rows(&mut self, width: usize) -> usize {
        self.layout(width).total_rows
    }

    /// Starting physical row of logical line `index` at `width`.
    pub fn line_start_row(&mut self, index: usize, width: usize) -> Option<usize> {
        self.layout(width).line_starts.get(index).copied()
    }

    /// Physical rows of logical line `index` at `width`.
    pub fn line_rows(&mut self, index: usize, width: usize) -> Option<usize> {
        self.layout(width).line_rows.get(index).copied()
    }

    fn layout(&mut self, width: usize) -> &LayoutCache {
        let stale = !matches!(&self.cache, Some(c) if c.width == width);
        if stale {
            let mut line_rows = Vec::with_capacity(self.lines.len());
            let mut line_starts = Vec::with_capacity(self.lines.len());
            let mut total = 0usize;
            for line in &self.lines {
                let rows = wrap_rows(line, width);
                line_starts.push(total);
                line_rows.push(rows);
                total += rows;
            }
            self.cache = Some(LayoutCache {
                width,
                line_rows,
                line_starts,
                total_rows: total,
            });
        }
        self.cache.as_ref().unwrap()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
