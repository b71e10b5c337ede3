#![forbid(unsafe_code)]

use crate::model::Command;

pub struct Keyword {
    pub word: &'static str,
    pub command: Command,
}

/// Words that end the program; matched in full.
pub const EXIT_WORDS: [&str; 3] = ["exit", "quit", "bye"];

/// Command line keywords, searched in order by prefix.
pub static KEYWORDS: [Keyword; 12] = [
    Keyword { word: "copy", command: Command::Copy },
    Keyword { word: "delete", command: Command::Delete },
    Keyword { word: "era", command: Command::Delete },
    Keyword { word: "view", command: Command::View },
    Keyword { word: "type", command: Command::View },
    Keyword { word: "dump", command: Command::Dump },
    Keyword { word: "help", command: Command::Help },
    Keyword { word: "select", command: Command::ToggleSelection },
    Keyword { word: "first", command: Command::JumpFirst },
    Keyword { word: "last", command: Command::JumpLast },
    Keyword { word: "switch", command: Command::SwitchPanel },
    Keyword { word: "drive", command: Command::PromptDrive },
];

pub fn lookup(typed: &str) -> Option<&'static Command> {
    if typed.is_empty() {
        return None;
    }
    KEYWORDS.iter().find(|k| k.word.starts_with(typed)).map(|k| &k.command)
}

pub const HELP_LINES: &[&str] = &[
    "Keys",
    "  Up/Down         move cursor",
    "  PgUp/PgDn       half a screen",
    "  Home/End        first / last file",
    "  TAB             switch panel",
    "  SPACE, INS      select file",
    "  ^U              change drive",
    "  ^L              redraw screen",
    "  F1 help  F3 view  F4 dump  F5 copy  F8 delete  F10 quit",
    "  ESC ESC, ^X     quit",
    "",
    "Command line",
    "  x:              change to drive x",
    "  copy delete era view type dump help",
    "  select first last switch drive",
    "  exit quit bye",
];

/// Bottom line hints, `(key, label)`.
pub const KEY_HINTS: [(&str, &str); 6] = [
    ("1", "Help"),
    ("3", "View"),
    ("4", "Dump"),
    ("5", "Copy"),
    ("8", "Delete"),
    ("10", "Quit"),
];
