#![forbid(unsafe_code)]

//! The device seam: where directory records come from and where file
//! copies and deletes go.

use std::collections::{BTreeMap, HashSet};
use std::io;

use time::PrimitiveDateTime;

use crate::error::DeviceError;
use crate::model::{Attributes, Drive, RECORD_SIZE};
use crate::record::{
    DirRecord, EXTENT_RECORDS, EXTENTS_PER_HIGH, FileRecord, SLOT_SIZE, SLOTS_PER_SECTOR, Stamp,
    StampPair, TimestampGroup, decode_slot, encode_file, encode_stamps, erased_slot,
};

/// Largest extent number the directory can address (S2 is six bits).
const MAX_EXTENTS: u64 = 64 * EXTENTS_PER_HIGH as u64;

pub type Records<'a> = Box<dyn Iterator<Item = DirRecord> + 'a>;

pub trait DirectorySource {
    /// Scans the directory of `drive` from the start.
    fn enumerate(&mut self, drive: Drive) -> Result<Records<'_>, DeviceError>;
}

pub trait FileOps {
    fn delete(&mut self, drive: Drive, name: &str) -> Result<(), DeviceError>;

    /// Copies `name` from one drive to another, replacing any file of that name.
    fn copy(&mut self, from: Drive, to: Drive, name: &str) -> Result<(), DeviceError>;

    /// Reads a whole file as 128-byte records; the last one is padded with `^Z`.
    fn read_records(&mut self, drive: Drive, name: &str) -> Result<Vec<[u8; RECORD_SIZE]>, DeviceError>;
}

pub trait Device: DirectorySource + FileOps {}

impl<T: DirectorySource + FileOps + ?Sized> Device for T {}

/// A file as a device sees it before it is laid out as directory slots.
#[derive(Debug, Clone)]
pub struct DirFile {
    pub name: String,
    pub len: u64,
    pub attributes: Attributes,
    pub modified: Option<PrimitiveDateTime>,
}

/// Lays files out the way a disk directory holds them: one slot per 16 KiB
/// extent and, when `timestamps` is on, a stamp slot closing every sector.
pub fn directory_slots(files: &[DirFile], user: u8, timestamps: bool) -> Vec<[u8; SLOT_SIZE]> {
    let mut extents: Vec<(FileRecord, Option<Stamp>)> = Vec::new();
    for file in files {
        let records = file.len.div_ceil(RECORD_SIZE as u64);
        let count = records.div_ceil(u64::from(EXTENT_RECORDS)).max(1);
        if count > MAX_EXTENTS {
            continue;
        }
        for k in 0..count {
            let rc = if k + 1 == count {
                records - u64::from(EXTENT_RECORDS) * (count - 1)
            } else {
                u64::from(EXTENT_RECORDS)
            };
            let record = FileRecord::new(user, &file.name, k as u16, rc as u8)
                .with_attributes(file.attributes);
            let stamp = if k == 0 { file.modified.map(Stamp::from_datetime) } else { None };
            extents.push((record, stamp));
        }
    }

    if !timestamps {
        return extents.iter().map(|(record, _)| encode_file(record)).collect();
    }

    let per_sector = SLOTS_PER_SECTOR - 1;
    let mut slots = Vec::with_capacity(extents.len().div_ceil(per_sector) * SLOTS_PER_SECTOR);
    for chunk in extents.chunks(per_sector) {
        let mut group = TimestampGroup::default();
        for (i, (record, stamp)) in chunk.iter().enumerate() {
            slots.push(encode_file(record));
            if let Some(stamp) = stamp {
                group.entries[i] = StampPair { create: *stamp, update: *stamp };
            }
        }
        for _ in chunk.len()..per_sector {
            slots.push(erased_slot());
        }
        slots.push(encode_stamps(&group));
    }
    slots
}

pub fn decode_slots(slots: Vec<[u8; SLOT_SIZE]>) -> Records<'static> {
    Box::new(slots.into_iter().map(|slot| decode_slot(&slot)))
}

/// Splits file contents into records, padding the last one with `^Z`.
pub fn to_records(data: &[u8]) -> Vec<[u8; RECORD_SIZE]> {
    data.chunks(RECORD_SIZE)
        .map(|chunk| {
            let mut record = [0x1A; RECORD_SIZE];
            record[..chunk.len()].copy_from_slice(chunk);
            record
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    Enumerate(Drive),
    Copy { from: Drive, to: Drive, name: String },
    Delete { drive: Drive, name: String },
    Read { drive: Drive, name: String },
}

#[derive(Debug, Clone, Default)]
pub struct MemoryFile {
    pub data: Vec<u8>,
    pub attributes: Attributes,
    pub modified: Option<PrimitiveDateTime>,
}

/// An in-memory device that keeps a log of every call made against it.
#[derive(Debug, Default)]
pub struct MemoryDrives {
    drives: BTreeMap<Drive, BTreeMap<String, MemoryFile>>,
    timestamps: bool,
    failing: HashSet<String>,
    calls: Vec<DeviceCall>,
}

impl MemoryDrives {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timestamps(mut self, timestamps: bool) -> Self {
        self.timestamps = timestamps;
        self
    }

    /// Makes sure `drive` exists even when it holds no files.
    pub fn mount(&mut self, drive: Drive) {
        self.drives.entry(drive).or_default();
    }

    pub fn insert(&mut self, drive: Drive, name: &str, data: impl Into<Vec<u8>>) {
        self.insert_file(drive, name, MemoryFile { data: data.into(), ..MemoryFile::default() });
    }

    pub fn insert_file(&mut self, drive: Drive, name: &str, file: MemoryFile) {
        self.drives.entry(drive).or_default().insert(name.to_ascii_uppercase(), file);
    }

    /// Every later copy or delete of `name` fails with an I/O error.
    pub fn fail_on(&mut self, name: &str) {
        self.failing.insert(name.to_ascii_uppercase());
    }

    pub fn names(&self, drive: Drive) -> Vec<String> {
        self.drives.get(&drive).map(|files| files.keys().cloned().collect()).unwrap_or_default()
    }

    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    fn file(&self, drive: Drive, name: &str) -> Result<&MemoryFile, DeviceError> {
        self.drives
            .get(&drive)
            .ok_or(DeviceError::NoSuchDrive(drive))?
            .get(name)
            .ok_or_else(|| DeviceError::NotFound { drive, name: name.to_string() })
    }

    fn check_failing(&self, drive: Drive, name: &str) -> Result<(), DeviceError> {
        if self.failing.contains(name) {
            return Err(DeviceError::DeviceIo {
                drive,
                name: name.to_string(),
                source: io::Error::other("injected failure"),
            });
        }
        Ok(())
    }
}

impl DirectorySource for MemoryDrives {
    fn enumerate(&mut self, drive: Drive) -> Result<Records<'_>, DeviceError> {
        self.calls.push(DeviceCall::Enumerate(drive));
        let files = self.drives.get(&drive).ok_or(DeviceError::NoSuchDrive(drive))?;
        let listing: Vec<DirFile> = files
            .iter()
            .map(|(name, file)| DirFile {
                name: name.clone(),
                len: file.data.len() as u64,
                attributes: file.attributes,
                modified: file.modified,
            })
            .collect();
        Ok(decode_slots(directory_slots(&listing, 0, self.timestamps)))
    }
}

impl FileOps for MemoryDrives {
    fn delete(&mut self, drive: Drive, name: &str) -> Result<(), DeviceError> {
        self.calls.push(DeviceCall::Delete { drive, name: name.to_string() });
        self.check_failing(drive, name)?;
        self.file(drive, name)?;
        if let Some(files) = self.drives.get_mut(&drive) {
            files.remove(name);
        }
        Ok(())
    }

    fn copy(&mut self, from: Drive, to: Drive, name: &str) -> Result<(), DeviceError> {
        self.calls.push(DeviceCall::Copy { from, to, name: name.to_string() });
        self.check_failing(from, name)?;
        let file = self.file(from, name)?.clone();
        let target = self.drives.get_mut(&to).ok_or(DeviceError::NoSuchDrive(to))?;
        target.insert(name.to_string(), file);
        Ok(())
    }

    fn read_records(&mut self, drive: Drive, name: &str) -> Result<Vec<[u8; RECORD_SIZE]>, DeviceError> {
        self.calls.push(DeviceCall::Read { drive, name: name.to_string() });
        Ok(to_records(&self.file(drive, name)?.data))
    }
}
