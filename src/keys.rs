#![forbid(unsafe_code)]

//! Decodes raw terminal bytes into commands.
//!
//! Two inputs share the byte stream: VT100/xterm key sequences, decoded by a
//! small state machine, and printable text, which goes to the command line.

use tracing::debug;

use crate::menu::{EXIT_WORDS, lookup};
use crate::model::{Command, Drive};

pub const DEFAULT_LINE_CAPACITY: usize = 64;

/// Longest parameter string kept for a `CSI <digits> ~` sequence.
const MAX_PARAMS: usize = 8;

const ESC: u8 = 0x1B;
const TAB: u8 = 0x09;
const CTRL_L: u8 = 0x0C;
const CTRL_U: u8 = 0x15;
const CTRL_X: u8 = 0x18;
const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7F;
const LF: u8 = 0x0A;
const CR: u8 = 0x0D;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyState {
    #[default]
    Normal,
    AfterEscape,
    Csi,
    Ss3,
    CsiNumeric,
}

/// The bounded edit buffer of the command line.
#[derive(Debug, Clone)]
pub struct CommandLine {
    text: String,
    capacity: usize,
}

impl CommandLine {
    pub fn new(capacity: usize) -> Self {
        Self { text: String::with_capacity(capacity), capacity }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Returns false when the buffer is full.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.text.len() >= self.capacity {
            return false;
        }
        self.text.push(char::from(byte));
        true
    }

    pub fn pop(&mut self) -> bool {
        self.text.pop().is_some()
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    /// Interprets the buffer and empties it.
    pub fn execute(&mut self) -> Option<Command> {
        let typed = self.text.trim().to_string();
        self.text.clear();
        if typed.is_empty() {
            return None;
        }
        Some(parse_line(&typed))
    }
}

impl Default for CommandLine {
    fn default() -> Self {
        Self::new(DEFAULT_LINE_CAPACITY)
    }
}

/// Matching ignores case; an unknown word is reported as typed.
fn parse_line(typed: &str) -> Command {
    if let [letter, b':'] = typed.as_bytes() {
        if let Some(drive) = Drive::from_letter(char::from(*letter)) {
            return Command::ChangeDrive(drive);
        }
    }
    let word = typed.to_ascii_lowercase();
    if EXIT_WORDS.contains(&word.as_str()) {
        return Command::Quit;
    }
    lookup(&word).cloned().unwrap_or_else(|| Command::Unknown(typed.to_string()))
}

#[derive(Debug, Clone, Default)]
pub struct KeyDecoder {
    state: KeyState,
    params: Vec<u8>,
    params_overflowed: bool,
    /// Set while the rest of a sequence whose ESC went elsewhere is dropped.
    discarding: bool,
    line: CommandLine,
}

impl KeyDecoder {
    pub fn new(line_capacity: usize) -> Self {
        Self { line: CommandLine::new(line_capacity), ..Self::default() }
    }

    pub fn state(&self) -> KeyState {
        self.state
    }

    pub fn line(&self) -> &CommandLine {
        &self.line
    }

    /// Called when an ESC was consumed outside the decoder (by a prompt or
    /// the viewer): the bytes of the key sequence that follow are swallowed
    /// instead of reaching the command line.
    pub fn discard_sequence(&mut self) {
        self.state = KeyState::AfterEscape;
        self.discarding = true;
    }

    /// Feeds one byte; returns a command once a key or line is complete.
    pub fn feed(&mut self, byte: u8) -> Option<Command> {
        if self.discarding {
            return self.discard(byte);
        }
        let command = self.step(byte);
        if let Some(command) = &command {
            debug!(byte, ?command, "key");
        }
        command
    }

    fn step(&mut self, byte: u8) -> Option<Command> {
        match self.state {
            KeyState::Normal => self.normal(byte),
            KeyState::AfterEscape => self.after_escape(byte),
            KeyState::Csi => self.csi(byte),
            KeyState::Ss3 => self.ss3(byte),
            KeyState::CsiNumeric => self.csi_numeric(byte),
        }
    }

    /// A lone ESC is not followed by `[` or `O`; that byte is an ordinary key.
    fn discard(&mut self, byte: u8) -> Option<Command> {
        if self.state == KeyState::AfterEscape && !matches!(byte, b'[' | b'O') {
            self.discarding = false;
            self.state = KeyState::Normal;
            return self.feed(byte);
        }
        let dropped = self.step(byte);
        if self.state == KeyState::Normal {
            self.discarding = false;
        }
        if dropped.is_some() {
            debug!(byte, ?dropped, "key after closed prompt dropped");
        }
        None
    }

    fn normal(&mut self, byte: u8) -> Option<Command> {
        match byte {
            ESC => {
                self.state = KeyState::AfterEscape;
                None
            }
            TAB => Some(Command::SwitchPanel),
            b' ' if self.line.is_empty() => Some(Command::ToggleSelection),
            CTRL_X => Some(Command::Quit),
            CTRL_U => Some(Command::PromptDrive),
            CTRL_L => Some(Command::Redraw),
            CR | LF => self.line.execute(),
            BACKSPACE | DELETE => self.line.pop().then_some(Command::LineEdited),
            b' '..=b'~' => self.line.push(byte).then_some(Command::LineEdited),
            _ => None,
        }
    }

    fn after_escape(&mut self, byte: u8) -> Option<Command> {
        self.state = KeyState::Normal;
        match byte {
            b'[' => {
                self.state = KeyState::Csi;
                None
            }
            b'O' => {
                self.state = KeyState::Ss3;
                None
            }
            ESC => Some(Command::Quit),
            _ => None,
        }
    }

    fn csi(&mut self, byte: u8) -> Option<Command> {
        self.state = KeyState::Normal;
        if byte.is_ascii_digit() {
            self.params.clear();
            self.params.push(byte);
            self.params_overflowed = false;
            self.state = KeyState::CsiNumeric;
            return None;
        }
        cursor_key(byte)
    }

    fn ss3(&mut self, byte: u8) -> Option<Command> {
        self.state = KeyState::Normal;
        match byte {
            b'P' => Some(Command::Help),
            b'R' => Some(Command::View),
            b'S' => Some(Command::Dump),
            _ => cursor_key(byte),
        }
    }

    fn csi_numeric(&mut self, byte: u8) -> Option<Command> {
        if byte.is_ascii_digit() || byte == b';' {
            if self.params.len() < MAX_PARAMS {
                self.params.push(byte);
            } else {
                self.params_overflowed = true;
            }
            return None;
        }
        self.state = KeyState::Normal;
        match byte {
            b'~' if !self.params_overflowed => self.tilde_key(),
            b'~' => None,
            _ => cursor_key(byte),
        }
    }

    fn tilde_key(&self) -> Option<Command> {
        let first = self.params.split(|b| *b == b';').next()?;
        let number: u16 = std::str::from_utf8(first).ok()?.parse().ok()?;
        match number {
            1 | 7 => Some(Command::JumpFirst),
            4 | 8 => Some(Command::JumpLast),
            2 => Some(Command::ToggleSelection),
            5 => Some(Command::PageUp),
            6 => Some(Command::PageDown),
            11 => Some(Command::Help),
            13 => Some(Command::View),
            14 => Some(Command::Dump),
            15 => Some(Command::Copy),
            19 => Some(Command::Delete),
            21 => Some(Command::Quit),
            _ => None,
        }
    }
}

fn cursor_key(byte: u8) -> Option<Command> {
    match byte {
        b'A' => Some(Command::MoveUp),
        b'B' => Some(Command::MoveDown),
        b'H' => Some(Command::JumpFirst),
        b'F' => Some(Command::JumpLast),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(decoder: &mut KeyDecoder, bytes: &[u8]) -> Vec<Command> {
        bytes.iter().filter_map(|b| decoder.feed(*b)).collect()
    }

    fn decode(bytes: &[u8]) -> Vec<Command> {
        feed_all(&mut KeyDecoder::default(), bytes)
    }

    #[test]
    fn cursor_keys_in_both_modes() {
        assert_eq!(decode(b"\x1b[A\x1b[B"), [Command::MoveUp, Command::MoveDown]);
        assert_eq!(decode(b"\x1bOH\x1bOF"), [Command::JumpFirst, Command::JumpLast]);
        assert_eq!(decode(b"\x1b[1;5A"), [Command::MoveUp]);
    }

    #[test]
    fn tilde_sequences_map_by_first_parameter() {
        let cases: [(&[u8], Command); 9] = [
            (b"\x1b[1~", Command::JumpFirst),
            (b"\x1b[8~", Command::JumpLast),
            (b"\x1b[2~", Command::ToggleSelection),
            (b"\x1b[5~", Command::PageUp),
            (b"\x1b[6~", Command::PageDown),
            (b"\x1b[15~", Command::Copy),
            (b"\x1b[19~", Command::Delete),
            (b"\x1b[21~", Command::Quit),
            (b"\x1b[13;2~", Command::View),
        ];
        for (bytes, command) in cases {
            assert_eq!(decode(bytes), [command], "{bytes:?}");
        }
    }

    #[test]
    fn function_keys_over_ss3() {
        assert_eq!(decode(b"\x1bOP\x1bOR\x1bOS"), [Command::Help, Command::View, Command::Dump]);
    }

    #[test]
    fn undefined_bytes_fall_back_to_normal() {
        let mut decoder = KeyDecoder::default();
        assert!(feed_all(&mut decoder, b"\x1b[Z").is_empty());
        assert_eq!(decoder.state(), KeyState::Normal);
        assert!(feed_all(&mut decoder, b"\x1b[99~").is_empty());
        assert!(feed_all(&mut decoder, b"\x1bx").is_empty());
        assert_eq!(decoder.state(), KeyState::Normal);
        assert!(decoder.line().is_empty());
    }

    #[test]
    fn overlong_parameters_are_dropped() {
        let mut decoder = KeyDecoder::default();
        assert!(feed_all(&mut decoder, b"\x1b[1111111111~").is_empty());
        assert_eq!(decoder.state(), KeyState::Normal);
    }

    #[test]
    fn double_escape_quits() {
        assert_eq!(decode(b"\x1b\x1b"), [Command::Quit]);
        assert_eq!(decode(b"\x18"), [Command::Quit]);
    }

    #[test]
    fn space_toggles_only_on_empty_line() {
        let mut decoder = KeyDecoder::default();
        assert_eq!(decoder.feed(b' '), Some(Command::ToggleSelection));
        decoder.feed(b'c');
        assert_eq!(decoder.feed(b' '), Some(Command::LineEdited));
        assert_eq!(decoder.line().text(), "c ");
    }

    #[test]
    fn enter_runs_and_clears_the_line() {
        let mut decoder = KeyDecoder::default();
        assert_eq!(feed_all(&mut decoder, b"b:\r").last(), Some(&Command::ChangeDrive(Drive::B)));
        assert!(decoder.line().is_empty());

        assert_eq!(feed_all(&mut decoder, b"  CO\r").last(), Some(&Command::Copy));
        assert_eq!(feed_all(&mut decoder, b"Bye\n").last(), Some(&Command::Quit));
        assert_eq!(
            feed_all(&mut decoder, b"FROB\r").last(),
            Some(&Command::Unknown("FROB".to_string()))
        );
        assert!(decoder.line().is_empty());
    }

    #[test]
    fn discarded_sequence_never_reaches_the_line() {
        let mut decoder = KeyDecoder::default();
        for tail in [&b"[B"[..], b"OP", b"[19~", b"[1;5A"] {
            decoder.discard_sequence();
            assert!(feed_all(&mut decoder, tail).is_empty(), "{tail:?}");
            assert_eq!(decoder.state(), KeyState::Normal);
            assert!(decoder.line().is_empty());
        }
        assert_eq!(decoder.feed(b' '), Some(Command::ToggleSelection));
    }

    #[test]
    fn after_a_lone_discarded_escape_keys_work_again() {
        let mut decoder = KeyDecoder::default();
        decoder.discard_sequence();
        assert_eq!(decoder.feed(b'e'), Some(Command::LineEdited));
        assert_eq!(decoder.line().text(), "e");

        decoder.discard_sequence();
        assert_eq!(feed_all(&mut decoder, b"\x1b[A"), [Command::MoveUp]);
        decoder.discard_sequence();
        assert_eq!(feed_all(&mut decoder, b"\x1b\x1b"), [Command::Quit]);
    }

    #[test]
    fn backspace_edits_the_line() {
        let mut decoder = KeyDecoder::default();
        feed_all(&mut decoder, b"erx\x08");
        assert_eq!(decoder.line().text(), "er");
        assert_eq!(decoder.feed(0x7F), Some(Command::LineEdited));
        assert_eq!(decoder.line().text(), "e");
        decoder.feed(0x7F);
        assert_eq!(decoder.feed(0x7F), None);
    }

    #[test]
    fn line_is_bounded() {
        let mut decoder = KeyDecoder::new(4);
        feed_all(&mut decoder, b"abcdef");
        assert_eq!(decoder.line().text(), "abcd");
    }
}
