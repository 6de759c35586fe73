// Copyright (c) 2024-2026 Ikigai Contributors
//
// SPDX-License-Identifier: MIT
//! Raw-mode terminal handling on `/dev/tty`.
//!
//! Startup: save termios, enter raw mode, flush pending input, switch to
//! the alternate screen and enable SGR mouse reports.  Shutdown reverses
//! all of it.  A process-wide panic hook performs minimal restoration from
//! install-once global state so a crash never leaves the terminal raw.

use std::io::Write;
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use anyhow::Context;
use tracing::debug;

const ENTER_SEQUENCE: &[u8] = b"\x1b[?1049h\x1b[?1006h";
const EXIT_SEQUENCE: &[u8] = b"\x1b[?1006l\x1b[?25h\x1b[0m\x1b[?1049l";

/// Saved state the panic hook needs; written once at terminal init.
#[derive(Clone, Copy)]
struct PanicState {
    fd: RawFd,
    saved: libc::termios,
}

// libc::termios is plain integer data.
unsafe impl Send for PanicState {}
unsafe impl Sync for PanicState {}

static PANIC_STATE: OnceLock<PanicState> = OnceLock::new();
static PANIC_HOOK_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Apply the raw-mode flag changes to a termios.
///
/// Clears BRKINT/ICRNL/INPCK/ISTRIP/IXON, OPOST, ECHO/ICANON/IEXTEN/ISIG;
/// sets CS8; VMIN=1, VTIME=0.
fn apply_raw_mode(t: &mut libc::termios) {
    t.c_iflag &= !(libc::BRKINT | libc::ICRNL | libc::INPCK | libc::ISTRIP | libc::IXON);
    t.c_oflag &= !libc::OPOST;
    t.c_cflag |= libc::CS8;
    t.c_lflag &= !(libc::ECHO | libc::ICANON | libc::IEXTEN | libc::ISIG);
    t.c_cc[libc::VMIN] = 1;
    t.c_cc[libc::VTIME] = 0;
}

/// Write every byte to `fd`, retrying on partial writes.
fn write_all_fd(fd: RawFd, mut bytes: &[u8]) -> std::io::Result<()> {
    while !bytes.is_empty() {
        let n = unsafe { libc::write(fd, bytes.as_ptr() as *const libc::c_void, bytes.len()) };
        if n < 0 {
            return Err(std::io::Error::last_os_error());
        }
        bytes = &bytes[n as usize..];
    }
    Ok(())
}

/// Minimal restoration, usable from the panic path.
fn emergency_restore(state: &PanicState) {
    unsafe {
        let _ = libc::write(
            state.fd,
            EXIT_SEQUENCE.as_ptr() as *const libc::c_void,
            EXIT_SEQUENCE.len(),
        );
        let _ = libc::tcsetattr(state.fd, libc::TCSAFLUSH, &state.saved);
    }
}

/// Install the process-wide panic hook (idempotent).
fn install_panic_hook() {
    if PANIC_HOOK_INSTALLED.swap(true, Ordering::SeqCst) {
        return;
    }
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if let Some(state) = PANIC_STATE.get() {
            emergency_restore(state);
        }
        previous(info);
    }));
}

pub struct Terminal {
    fd: RawFd,
    saved: libc::termios,
    restored: bool,
}

impl Terminal {
    /// Open `/dev/tty`, save termios, enter raw mode + alt screen + SGR
    /// mouse, and arm the panic hook.
    pub fn open() -> anyhow::Result<Self> {
        let path = std::ffi::CString::new("/dev/tty").expect("static string");
        let fd = unsafe { libc::open(path.as_ptr(), libc::O_RDWR) };
        if fd < 0 {
            return Err(std::io::Error::last_os_error()).context("opening /dev/tty");
        }

        let mut saved: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(fd, &mut saved) } != 0 {
            let err = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err).context("tcgetattr");
        }

        let mut raw = saved;
        apply_raw_mode(&mut raw);
        if unsafe { libc::tcsetattr(fd, libc::TCSAFLUSH, &raw) } != 0 {
            let err = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err).context("tcsetattr");
        }
        unsafe {
            libc::tcflush(fd, libc::TCIFLUSH);
        }

        // Raw mode is active from here on: a failed enter-sequence write
        // must unwind it before propagating, or the tty is left raw with a
        // leaked descriptor.
        if let Err(err) = write_all_fd(fd, ENTER_SEQUENCE) {
            unsafe {
                let _ = libc::tcsetattr(fd, libc::TCSAFLUSH, &saved);
                libc::close(fd);
            }
            return Err(err).context("entering alternate screen");
        }

        let term = Self { fd, saved, restored: false };
        let _ = PANIC_STATE.set(PanicState { fd, saved });
        install_panic_hook();

        debug!("terminal raw mode enabled, alternate screen active");
        Ok(term)
    }

    /// Current terminal size as `(columns, rows)`.
    pub fn size(&self) -> (usize, usize) {
        let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
        let ok = unsafe { libc::ioctl(self.fd, libc::TIOCGWINSZ, &mut ws) } == 0;
        if ok && ws.ws_col > 0 && ws.ws_row > 0 {
            (ws.ws_col as usize, ws.ws_row as usize)
        } else {
            (80, 24)
        }
    }

    /// Blocking single-byte read; `None` on EOF.
    pub fn read_byte(&self) -> std::io::Result<Option<u8>> {
        let mut byte = 0u8;
        let n = unsafe { libc::read(self.fd, &mut byte as *mut u8 as *mut libc::c_void, 1) };
        match n {
            1 => Ok(Some(byte)),
            0 => Ok(None),
            _ => Err(std::io::Error::last_os_error()),
        }
    }

    fn write_all_bytes(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        write_all_fd(self.fd, bytes).context("writing to terminal")
    }

    /// Leave the alternate screen and restore the saved termios.
    /// Idempotent; also runs on drop.
    pub fn restore(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;
        let _ = self.write_all_bytes(EXIT_SEQUENCE);
        unsafe {
            let _ = libc::tcsetattr(self.fd, libc::TCSAFLUSH, &self.saved);
            libc::close(self.fd);
        }
        debug!("terminal restored");
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        self.restore();
    }
}

impl Write for Terminal {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = unsafe { libc::write(self.fd, buf.as_ptr() as *const libc::c_void, buf.len()) };
        if n < 0 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
