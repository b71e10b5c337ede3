#![forbid(unsafe_code)]

use std::fmt;

use time::PrimitiveDateTime;
use time::format_description;

/// Bytes per directory record; file sizes are counted in these.
pub const RECORD_SIZE: usize = 128;

/// From this many records on, sizes no longer fit 16 bits as bytes.
pub const WIDE_BYTES_FROM: u32 = 512;

/// From this many records on, sizes are shown in kilobytes.
pub const KILOBYTES_FROM: u32 = 7812;

/// A drive letter, `A` to `P`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Drive(u8);

impl Drive {
    pub const COUNT: u8 = 16;
    pub const A: Drive = Drive(0);
    pub const B: Drive = Drive(1);

    pub fn from_letter(letter: char) -> Option<Self> {
        let upper = letter.to_ascii_uppercase();
        if !upper.is_ascii_uppercase() {
            return None;
        }
        let index = upper as u8 - b'A';
        (index < Self::COUNT).then_some(Drive(index))
    }

    pub fn from_index(index: u8) -> Option<Self> {
        (index < Self::COUNT).then_some(Drive(index))
    }

    pub fn letter(self) -> char {
        (b'A' + self.0) as char
    }
}

impl fmt::Display for Drive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// File attribute bits carried in the high bits of the extension bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Attributes {
    pub read_only: bool,
    pub system: bool,
    pub archived: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// `NAME.EXT`, or just `NAME` when the extension is blank.
    pub name: String,
    pub attributes: Attributes,
    pub selected: bool,
    /// Total size in 128-byte records.
    pub records: u32,
    /// Last update stamp; only present when the disk carries timestamps.
    pub stamp: Option<PrimitiveDateTime>,
}

impl FileEntry {
    pub fn size(&self) -> SizeDisplay {
        SizeDisplay::from_records(self.records)
    }

    /// Date and clock columns, e.g. `("07-03-24", "14:05")`.
    pub fn stamp_text(&self) -> (String, String) {
        format_stamp(self.stamp)
    }
}

/// How a record count is shown in a panel row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeDisplay {
    /// Exact byte count below 512 records.
    Bytes(u16),
    /// Exact byte count from 512 up to 7812 records.
    WideBytes(u32),
    /// Rounded kilobytes from 7812 records on.
    Kilobytes(u32),
}

impl SizeDisplay {
    pub fn from_records(records: u32) -> Self {
        if records < WIDE_BYTES_FROM {
            SizeDisplay::Bytes((records as u16) << 7)
        } else if records < KILOBYTES_FROM {
            SizeDisplay::WideBytes(records << 7)
        } else {
            SizeDisplay::Kilobytes((records + 7) >> 3)
        }
    }
}

impl fmt::Display for SizeDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SizeDisplay::Bytes(bytes) => bytes.to_string(),
            SizeDisplay::WideBytes(bytes) => bytes.to_string(),
            SizeDisplay::Kilobytes(kb) => format!("{kb}K"),
        };
        f.pad(&text)
    }
}

pub fn format_stamp(stamp: Option<PrimitiveDateTime>) -> (String, String) {
    let Some(stamp) = stamp else {
        return (String::new(), String::new());
    };
    let date = render(stamp, "[day]-[month]-[year repr:last_two]");
    let clock = render(stamp, "[hour]:[minute]");
    (date, clock)
}

fn render(stamp: PrimitiveDateTime, description: &str) -> String {
    let Ok(items) = format_description::parse(description) else {
        return String::new();
    };
    stamp.format(&items).unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivePane {
    Left,
    Right,
}

impl ActivePane {
    pub fn other(self) -> Self {
        match self {
            ActivePane::Left => ActivePane::Right,
            ActivePane::Right => ActivePane::Left,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Cursor and scroll go back to the top.
    Reset,
    /// Cursor stays put, clamped to the new catalog.
    Keep,
}

/// What the display has to repaint after a panel mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redraw {
    Nothing,
    /// Only the rows of the old and the new cursor position.
    Rows { old: usize, new: usize },
    /// The whole panel, because the scroll offset moved.
    Full,
    /// The catalog is stale and must be rebuilt before repainting.
    Rebuild,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Text,
    Dump,
}

impl ViewKind {
    pub fn label(self) -> &'static str {
        match self {
            ViewKind::Text => "VIEW",
            ViewKind::Dump => "DUMP",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Viewer {
    pub kind: ViewKind,
    pub name: String,
    pub lines: Vec<String>,
    /// Index of the first line of the page on screen.
    pub top: usize,
    pub at_end: bool,
}

#[derive(Debug, Clone)]
pub enum Modal {
    ConfirmCopy,
    ConfirmDelete,
    DrivePrompt,
    Help,
    Viewer(Viewer),
}

/// A logical command, whether it came from a key or the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    MoveUp,
    MoveDown,
    PageUp,
    PageDown,
    JumpFirst,
    JumpLast,
    ToggleSelection,
    SwitchPanel,
    PromptDrive,
    ChangeDrive(Drive),
    View,
    Dump,
    Copy,
    Delete,
    Help,
    Redraw,
    Quit,
    /// The command line text changed and its prompt needs repainting.
    LineEdited,
    /// Command line text that matched nothing.
    Unknown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}
