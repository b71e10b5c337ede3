#![forbid(unsafe_code)]

//! Raw directory slots: decoding 32-byte entries into tagged records and
//! encoding them back for devices that synthesize a directory.

use time::{Date, Month, PrimitiveDateTime, Time};

use crate::model::Attributes;

pub const SLOT_SIZE: usize = 32;
/// Slots per 128-byte directory sector; the last one may hold timestamps.
pub const SLOTS_PER_SECTOR: usize = 4;
/// Records covered by one extent (16 KiB).
pub const EXTENT_RECORDS: u32 = 128;
/// Extents addressable by the low extent byte before the high byte steps.
pub const EXTENTS_PER_HIGH: u16 = 32;

pub const USER_DELETED: u8 = 0xE5;
pub const USER_LABEL: u8 = 0x20;
pub const USER_STAMPS: u8 = 0x21;
pub const MAX_USER: u8 = 15;

const EPOCH_YEAR: i32 = 1978;

const DAYS_IN_MONTH: [[u32; 12]; 2] = [
    [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31],
    [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31],
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirRecord {
    File(FileRecord),
    /// Erased slot, or a slot that cannot be read as a file.
    Deleted,
    Timestamps(TimestampGroup),
    VolumeLabel,
}

/// One extent of a file as stored in the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub user: u8,
    /// Name bytes, attribute bits included.
    pub name: [u8; 8],
    /// Extension bytes; the high bits carry read-only, system and archived.
    pub ext: [u8; 3],
    /// EX: low extent index, 0..32.
    pub extent_low: u8,
    /// S2: high extent index.
    pub extent_high: u8,
    /// RC: records used in this extent, at most 128.
    pub record_count: u8,
}

impl FileRecord {
    /// Builds a record from an already clean `NAME.EXT` string.
    pub fn new(user: u8, name: &str, extent: u16, record_count: u8) -> Self {
        let (base, ext) = name.split_once('.').unwrap_or((name, ""));
        let mut record = FileRecord {
            user,
            name: [b' '; 8],
            ext: [b' '; 3],
            extent_low: 0,
            extent_high: 0,
            record_count,
        };
        for (slot, byte) in record.name.iter_mut().zip(base.bytes()) {
            *slot = byte.to_ascii_uppercase() & 0x7F;
        }
        for (slot, byte) in record.ext.iter_mut().zip(ext.bytes()) {
            *slot = byte.to_ascii_uppercase() & 0x7F;
        }
        record.set_extent(extent);
        record
    }

    pub fn set_extent(&mut self, extent: u16) {
        self.extent_low = (extent % EXTENTS_PER_HIGH) as u8;
        self.extent_high = (extent / EXTENTS_PER_HIGH) as u8;
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        let bits = [attributes.read_only, attributes.system, attributes.archived];
        for (byte, set) in self.ext.iter_mut().zip(bits) {
            if set {
                *byte |= 0x80;
            } else {
                *byte &= 0x7F;
            }
        }
        self
    }

    /// `NAME.EXT` with attribute bits and padding removed.
    pub fn clean_name(&self) -> String {
        let base = clean_field(&self.name);
        let ext = clean_field(&self.ext);
        if ext.is_empty() { base } else { format!("{base}.{ext}") }
    }

    pub fn attributes(&self) -> Attributes {
        Attributes {
            read_only: self.ext[0] & 0x80 != 0,
            system: self.ext[1] & 0x80 != 0,
            archived: self.ext[2] & 0x80 != 0,
        }
    }

    /// Combined extent number: `S2 * 32 + EX`.
    pub fn extent(&self) -> u16 {
        u16::from(self.extent_high & 0x3F) * EXTENTS_PER_HIGH + u16::from(self.extent_low & 0x1F)
    }
}

fn clean_field(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| b & 0x7F)
        .map(|b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' })
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// A packed date/time stamp: days since 1977-12-31, BCD hour, BCD minute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stamp {
    pub days: u16,
    pub hour: u8,
    pub minute: u8,
}

impl Stamp {
    pub fn decode(self) -> Option<PrimitiveDateTime> {
        let date = days_to_date(self.days)?;
        let time = Time::from_hms(from_bcd(self.hour)?, from_bcd(self.minute)?, 0).ok()?;
        Some(PrimitiveDateTime::new(date, time))
    }

    pub fn from_datetime(stamp: PrimitiveDateTime) -> Self {
        Stamp {
            days: date_to_days(stamp.date()).unwrap_or(0),
            hour: to_bcd(stamp.hour()),
            minute: to_bcd(stamp.minute()),
        }
    }

    fn read(bytes: &[u8]) -> Self {
        Stamp {
            days: u16::from_le_bytes([bytes[0], bytes[1]]),
            hour: bytes[2],
            minute: bytes[3],
        }
    }

    fn write(self, bytes: &mut [u8]) {
        bytes[..2].copy_from_slice(&self.days.to_le_bytes());
        bytes[2] = self.hour;
        bytes[3] = self.minute;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StampPair {
    pub create: Stamp,
    pub update: Stamp,
}

/// Stamps for the three file slots that precede this one in its sector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimestampGroup {
    pub entries: [StampPair; 3],
}

impl TimestampGroup {
    pub fn update_stamp(&self, slot: usize) -> Option<PrimitiveDateTime> {
        self.entries.get(slot)?.update.decode()
    }
}

pub fn decode_slot(slot: &[u8; SLOT_SIZE]) -> DirRecord {
    match slot[0] {
        USER_DELETED => DirRecord::Deleted,
        USER_LABEL => DirRecord::VolumeLabel,
        USER_STAMPS => {
            let mut group = TimestampGroup::default();
            for (i, pair) in group.entries.iter_mut().enumerate() {
                let base = 1 + 10 * i;
                pair.create = Stamp::read(&slot[base..base + 4]);
                pair.update = Stamp::read(&slot[base + 4..base + 8]);
            }
            DirRecord::Timestamps(group)
        }
        user if user <= MAX_USER => {
            let mut name = [0u8; 8];
            let mut ext = [0u8; 3];
            name.copy_from_slice(&slot[1..9]);
            ext.copy_from_slice(&slot[9..12]);
            DirRecord::File(FileRecord {
                user,
                name,
                ext,
                extent_low: slot[12],
                extent_high: slot[14],
                record_count: slot[15],
            })
        }
        _ => DirRecord::Deleted,
    }
}

pub fn encode_file(record: &FileRecord) -> [u8; SLOT_SIZE] {
    let mut slot = [0u8; SLOT_SIZE];
    slot[0] = record.user;
    slot[1..9].copy_from_slice(&record.name);
    slot[9..12].copy_from_slice(&record.ext);
    slot[12] = record.extent_low;
    slot[14] = record.extent_high;
    slot[15] = record.record_count;
    slot
}

pub fn encode_stamps(group: &TimestampGroup) -> [u8; SLOT_SIZE] {
    let mut slot = [0u8; SLOT_SIZE];
    slot[0] = USER_STAMPS;
    for (i, pair) in group.entries.iter().enumerate() {
        let base = 1 + 10 * i;
        pair.create.write(&mut slot[base..base + 4]);
        pair.update.write(&mut slot[base + 4..base + 8]);
    }
    slot
}

pub fn erased_slot() -> [u8; SLOT_SIZE] {
    [USER_DELETED; SLOT_SIZE]
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn year_length(year: i32) -> u32 {
    if is_leap_year(year) { 366 } else { 365 }
}

/// Day 1 is 1978-01-01; day 0 means "no date".
pub fn days_to_date(days: u16) -> Option<Date> {
    if days == 0 {
        return None;
    }
    let mut remaining = u32::from(days) - 1;
    let mut year = EPOCH_YEAR;
    while remaining >= year_length(year) {
        remaining -= year_length(year);
        year += 1;
    }
    let lengths = &DAYS_IN_MONTH[usize::from(is_leap_year(year))];
    let mut month = 0;
    while remaining >= lengths[month] {
        remaining -= lengths[month];
        month += 1;
    }
    let month = Month::try_from(month as u8 + 1).ok()?;
    Date::from_calendar_date(year, month, remaining as u8 + 1).ok()
}

pub fn date_to_days(date: Date) -> Option<u16> {
    let epoch = Date::from_calendar_date(EPOCH_YEAR, Month::January, 1).ok()?;
    let days = date.to_julian_day() - epoch.to_julian_day() + 1;
    u16::try_from(days).ok().filter(|d| *d > 0)
}

fn from_bcd(value: u8) -> Option<u8> {
    let (high, low) = (value >> 4, value & 0x0F);
    (high < 10 && low < 10).then_some(high * 10 + low)
}

fn to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}
