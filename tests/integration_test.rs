//! Cross-crate integration: raw bytes through the input decoder into the
//! editing buffer, composed into frames, plus REPL construction.

use ikigai_config::Config;
use ikigai_core::{NullDb, Repl};
use ikigai_tui::{compose_frame, InputAction, InputBuffer, InputDecoder, Scrollback};

/// Feed a byte sequence through the decoder and apply the resulting
/// actions to an input buffer, the way the REPL does.
fn type_bytes(decoder: &mut InputDecoder, buffer: &mut InputBuffer, bytes: &[u8]) {
    for &b in bytes {
        match decoder.feed(b) {
            Some(InputAction::Char(c)) => buffer.insert_char(c),
            Some(InputAction::Backspace) => buffer.backspace(),
            Some(InputAction::InsertNewline) => buffer.insert_newline(),
            Some(InputAction::ArrowLeft) => buffer.cursor_left(),
            Some(InputAction::ArrowRight) => buffer.cursor_right(),
            _ => {}
        }
    }
}

#[test]
fn bytes_to_buffer_round_trip() {
    let mut decoder = InputDecoder::new();
    let mut buffer = InputBuffer::new();

    type_bytes(&mut decoder, &mut buffer, b"hello");
    assert_eq!(buffer.text(), "hello");

    // Multibyte input arrives byte-by-byte.
    type_bytes(&mut decoder, &mut buffer, b" caf\xc3\xa9");
    assert_eq!(buffer.text(), "hello café");

    // Arrow-left then insertion edits mid-string.
    type_bytes(&mut decoder, &mut buffer, b"\x1b[D\x1b[D!");
    assert_eq!(buffer.text(), "hello ca!fé");
}

#[test]
fn edited_buffer_appears_in_composed_frame() {
    let mut decoder = InputDecoder::new();
    let mut buffer = InputBuffer::new();
    let mut scrollback = Scrollback::new();
    scrollback.append_line("> earlier message");
    scrollback.append_line("earlier reply");

    type_bytes(&mut decoder, &mut buffer, b"next question");

    let frame = compose_frame(&mut scrollback, &buffer, 40, 10, 0, None);
    assert_eq!(frame.rows.len(), 10);
    assert!(frame.rows.iter().any(|r| r == "next question"));
    assert!(frame.rows.iter().any(|r| r == "earlier reply"));
    let (row, col) = frame.cursor.expect("cursor visible at offset 0");
    assert_eq!(frame.rows[row], "next question");
    assert_eq!(col, "next question".len());
}

#[test]
fn repl_builds_with_default_config_and_null_db() {
    let mut config = Config::default();
    config.model.provider = "mock".into();
    config.model.name = "mock-model".into();
    let repl = Repl::new(config, Box::new(NullDb)).unwrap();
    let agent = repl.current_agent().expect("root agent exists");
    assert!(agent.conversation.is_empty());
    assert_eq!(agent.provider_name, "mock");
}
