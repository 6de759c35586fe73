// Copyright (c) 2024-2026 Ikigai Contributors
//
// SPDX-License-Identifier: MIT
//! Byte-at-a-time input decoder.
//!
//! Converts the raw byte stream from the terminal into semantic
//! [`InputAction`]s.  Two orthogonal sub-states are maintained: an
//! escape-sequence buffer (bytes after ESC) and a UTF-8 continuation buffer.
//! Each fed byte yields at most one action; `None` means the byte was
//! absorbed into an incomplete sequence.

/// Semantic input action produced by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    /// A printable codepoint (never a surrogate, never past U+10FFFF).
    Char(char),
    /// Enter: submit the current input.
    Newline,
    /// Ctrl-J: insert a newline without submitting.
    InsertNewline,
    Backspace,
    Delete,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    PageUp,
    PageDown,
    /// Ctrl-A
    LineStart,
    /// Ctrl-E
    LineEnd,
    /// Ctrl-K
    KillToEnd,
    /// Ctrl-U
    KillLine,
    /// Ctrl-W
    DeleteWordBack,
    Tab,
    /// Mouse wheel (SGR button 64)
    ScrollUp,
    /// Mouse wheel (SGR button 65)
    ScrollDown,
    /// Alt+Up: move to the parent agent.
    NavParent,
    /// Alt+Down: move to a child agent.
    NavChild,
    /// Alt+Left
    NavPrevSibling,
    /// Alt+Right
    NavNextSibling,
    Escape,
    /// Ctrl-C
    Interrupt,
    /// Ctrl-D
    Eof,
    /// A byte or sequence the decoder discards.
    Unknown,
}

/// Capacity of the escape-sequence buffer (bytes after ESC).  Overflow
/// resets the decoder with `Unknown`.
const ESC_BUF_CAP: usize = 16;

#[derive(Debug, Default)]
pub struct InputDecoder {
    esc_buf: Vec<u8>,
    in_escape: bool,
    utf8_buf: [u8; 4],
    utf8_len: usize,
    utf8_expected: usize,
    in_utf8: bool,
}

impl InputDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte.  `None` means the byte was absorbed into an
    /// incomplete escape or UTF-8 sequence.
    pub fn feed(&mut self, byte: u8) -> Option<InputAction> {
        if self.in_utf8 {
            return self.feed_utf8_continuation(byte);
        }
        if self.in_escape {
            return self.feed_escape(byte);
        }

        match byte {
            0x1B => {
                self.in_escape = true;
                self.esc_buf.clear();
                None
            }
            b'\t' => Some(InputAction::Tab),
            b'\r' => Some(InputAction::Newline),
            b'\n' => Some(InputAction::InsertNewline),
            0x01 => Some(InputAction::LineStart),
            0x03 => Some(InputAction::Interrupt),
            0x04 => Some(InputAction::Eof),
            0x05 => Some(InputAction::LineEnd),
            0x0B => Some(InputAction::KillToEnd),
            0x15 => Some(InputAction::KillLine),
            0x17 => Some(InputAction::DeleteWordBack),
            0x7F => Some(InputAction::Backspace),
            0x20..=0x7E => Some(InputAction::Char(byte as char)),
            _ => {
                let expected = match byte {
                    b if b & 0xE0 == 0xC0 => 2,
                    b if b & 0xF0 == 0xE0 => 3,
                    b if b & 0xF8 == 0xF0 => 4,
                    _ => return Some(InputAction::Unknown),
                };
                self.in_utf8 = true;
                self.utf8_buf[0] = byte;
                self.utf8_len = 1;
                self.utf8_expected = expected;
                None
            }
        }
    }

    fn reset_utf8(&mut self) {
        self.in_utf8 = false;
        self.utf8_len = 0;
        self.utf8_expected = 0;
    }

    fn reset_escape(&mut self) {
        self.in_escape = false;
        self.esc_buf.clear();
    }

    fn feed_utf8_continuation(&mut self, byte: u8) -> Option<InputAction> {
        // Continuation bytes must match 10xxxxxx.
        if byte & 0xC0 != 0x80 {
            self.reset_utf8();
            return Some(InputAction::Unknown);
        }
        self.utf8_buf[self.utf8_len] = byte;
        self.utf8_len += 1;
        if self.utf8_len < self.utf8_expected {
            return None;
        }
        let codepoint = decode_utf8(&self.utf8_buf[..self.utf8_len]);
        self.reset_utf8();
        Some(InputAction::Char(codepoint))
    }

    fn feed_escape(&mut self, byte: u8) -> Option<InputAction> {
        // Double ESC: emit escape and restart escape mode.
        if self.esc_buf.is_empty() && byte == 0x1B {
            self.esc_buf.clear();
            return Some(InputAction::Escape);
        }

        self.esc_buf.push(byte);

        if self.esc_buf.len() >= ESC_BUF_CAP {
            self.reset_escape();
            return Some(InputAction::Unknown);
        }

        // First byte after ESC must open a CSI.
        if self.esc_buf.len() == 1 {
            if byte == b'[' {
                return None;
            }
            self.reset_escape();
            return Some(InputAction::Unknown);
        }

        // Arrow keys and Alt+arrow navigation chords.
        if let Some(action) = self.try_arrows(byte) {
            self.reset_escape();
            return Some(action);
        }

        // Mouse SGR: ESC [ < btn ; col ; row M|m
        if self.esc_buf.get(1) == Some(&b'<') {
            if byte == b'M' || byte == b'm' {
                let action = self.parse_mouse_sgr();
                self.reset_escape();
                return Some(action);
            }
            return None;
        }

        // Tilde-terminated: ESC [ N ~
        if byte == b'~' && self.esc_buf.len() == 3 {
            let action = match self.esc_buf[1] {
                b'3' => InputAction::Delete,
                b'5' => InputAction::PageUp,
                b'6' => InputAction::PageDown,
                _ => InputAction::Unknown,
            };
            self.reset_escape();
            return Some(action);
        }

        // SGR color terminators and other letter-terminated CSI noise.
        if byte == b'm' || byte == b'~' || (byte.is_ascii_uppercase() && self.esc_buf.len() == 2) {
            self.reset_escape();
            return Some(InputAction::Unknown);
        }

        None
    }

    fn try_arrows(&self, byte: u8) -> Option<InputAction> {
        // Plain arrows: ESC [ A/B/C/D
        if self.esc_buf.len() == 2 {
            return match byte {
                b'A' => Some(InputAction::ArrowUp),
                b'B' => Some(InputAction::ArrowDown),
                b'C' => Some(InputAction::ArrowRight),
                b'D' => Some(InputAction::ArrowLeft),
                _ => None,
            };
        }
        // Alt+arrows: ESC [ 1 ; 3 A/B/C/D → agent-tree navigation
        if self.esc_buf.len() == 5 && &self.esc_buf[..4] == b"[1;3" {
            return match byte {
                b'A' => Some(InputAction::NavParent),
                b'B' => Some(InputAction::NavChild),
                b'C' => Some(InputAction::NavNextSibling),
                b'D' => Some(InputAction::NavPrevSibling),
                _ => None,
            };
        }
        None
    }

    fn parse_mouse_sgr(&self) -> InputAction {
        // esc_buf = "[<btn;col;rowM" minus the trailing M/m (already pushed).
        let inner = &self.esc_buf[2..self.esc_buf.len() - 1];
        let button_text = inner.split(|&b| b == b';').next().unwrap_or(&[]);
        let button: u32 = match std::str::from_utf8(button_text)
            .ok()
            .and_then(|s| s.parse().ok())
        {
            Some(b) => b,
            None => return InputAction::Unknown,
        };
        match button {
            64 => InputAction::ScrollUp,
            65 => InputAction::ScrollDown,
            // Clicks, drags, releases: discarded.
            _ => InputAction::Unknown,
        }
    }
}

/// Decode a complete UTF-8 sequence, yielding U+FFFD for overlong
/// encodings, surrogates, and out-of-range codepoints.
fn decode_utf8(bytes: &[u8]) -> char {
    let codepoint: u32 = match bytes.len() {
        2 => ((bytes[0] as u32 & 0x1F) << 6) | (bytes[1] as u32 & 0x3F),
        3 => {
            ((bytes[0] as u32 & 0x0F) << 12)
                | ((bytes[1] as u32 & 0x3F) << 6)
                | (bytes[2] as u32 & 0x3F)
        }
        4 => {
            ((bytes[0] as u32 & 0x07) << 18)
                | ((bytes[1] as u32 & 0x3F) << 12)
                | ((bytes[2] as u32 & 0x3F) << 6)
                | (bytes[3] as u32 & 0x3F)
        }
        _ => return '\u{FFFD}',
    };

    // Overlong encodings (RFC 3629)
    let overlong = (bytes.len() == 2 && codepoint < 0x80)
        || (bytes.len() == 3 && codepoint < 0x800)
        || (bytes.len() == 4 && codepoint < 0x10000);
    if overlong {
        return '\u{FFFD}';
    }

    // Surrogates and out-of-range are unrepresentable as char.
    char::from_u32(codepoint).unwrap_or('\u{FFFD}')
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
