#![forbid(unsafe_code)]

use std::collections::VecDeque;
use std::io::{self, Read, Stdin};

use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};

const DELETE: u8 = 0x7F;
const BACKSPACE: u8 = 0x08;

/// A blocking source of keyboard bytes.
pub trait ByteSource {
    fn read_byte(&mut self) -> io::Result<u8>;
}

/// Scripted input; running dry reads as end of file.
impl ByteSource for VecDeque<u8> {
    fn read_byte(&mut self) -> io::Result<u8> {
        self.pop_front().ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))
    }
}

/// Raw standard input. `DEL` arrives as `BS`.
pub struct TerminalInput {
    stdin: Stdin,
}

impl TerminalInput {
    pub fn new() -> Self {
        Self { stdin: io::stdin() }
    }
}

impl Default for TerminalInput {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteSource for TerminalInput {
    fn read_byte(&mut self) -> io::Result<u8> {
        let mut byte = [0u8; 1];
        loop {
            match self.stdin.lock().read(&mut byte) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
                Ok(_) => break,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(if byte[0] == DELETE { BACKSPACE } else { byte[0] })
    }
}

/// Raw mode and the alternate screen for as long as it lives.
pub struct TerminalGuard;

impl TerminalGuard {
    pub fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(err) = execute!(stdout, EnterAlternateScreen) {
            disable_raw_mode().ok();
            return Err(err);
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        execute!(io::stdout(), LeaveAlternateScreen).ok();
        disable_raw_mode().ok();
    }
}
