// Copyright (c) 2024-2026 Ikigai Contributors
//
// SPDX-License-Identifier: MIT
mod buffer;
mod decoder;
mod history;
mod layout;
mod render;
mod scroll;
mod scrollback;
mod term;

pub use buffer::InputBuffer;
pub use decoder::{InputAction, InputDecoder};
pub use history::LineHistory;
pub use layout::{byte_offset_at_row_col, wrap_content, wrap_rows, WrapState};
pub use render::{clamp_offset, compose_frame, Frame, Renderer, SPINNER_FRAMES};
pub use scroll::{ArrowDirection, ScrollDetector, ScrollResult};
pub use scrollback::Scrollback;
pub use term::Terminal;
