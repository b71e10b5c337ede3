#![forbid(unsafe_code)]

//! Turns the raw directory stream of a drive into the file list of a panel.
//!
//! Files larger than one extent appear in the directory once per extent. The
//! builder collects every extent as a fragment, sorts fragments by name and
//! extent, and keeps one entry per name: the highest extent defines the size,
//! and the first extent (the only one the disk stamps) supplies the date when
//! the survivor has none.

use time::PrimitiveDateTime;
use tracing::debug;

use crate::model::{Attributes, FileEntry};
use crate::record::{DirRecord, SLOTS_PER_SECTOR, TimestampGroup};

pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    pub entries: Vec<FileEntry>,
    /// Names that did not fit the capacity, if any.
    pub dropped: Option<usize>,
}

impl Catalog {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Fragment {
    name: String,
    attributes: Attributes,
    extent: u16,
    record_count: u8,
    stamp: Option<PrimitiveDateTime>,
}

impl Fragment {
    fn records(&self) -> u32 {
        (u32::from(self.extent) << 7) + u32::from(self.record_count)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CatalogBuilder {
    capacity: usize,
    user: u8,
}

impl CatalogBuilder {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, user: 0 }
    }

    /// Restricts the catalog to one user area.
    pub fn with_user(mut self, user: u8) -> Self {
        self.user = user;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn build<I>(&self, records: I) -> Catalog
    where
        I: IntoIterator<Item = DirRecord>,
    {
        let mut fragments = Vec::new();
        let mut sector = Vec::with_capacity(SLOTS_PER_SECTOR);
        for record in records {
            sector.push(record);
            if sector.len() == SLOTS_PER_SECTOR {
                self.collect_sector(&mut sector, &mut fragments);
            }
        }
        if !sector.is_empty() {
            self.collect_sector(&mut sector, &mut fragments);
        }

        let fragment_count = fragments.len();
        let mut entries = merge_extents(fragments);
        let dropped = entries.len().checked_sub(self.capacity).filter(|n| *n > 0);
        entries.truncate(self.capacity);
        debug!(fragments = fragment_count, entries = entries.len(), ?dropped, "catalog built");
        Catalog { entries, dropped }
    }

    /// Takes the file slots of one sector, pairing slots 0..3 with the
    /// timestamp group in the fourth slot when there is one.
    fn collect_sector(&self, sector: &mut Vec<DirRecord>, fragments: &mut Vec<Fragment>) {
        let stamps: Option<TimestampGroup> = match sector.get(SLOTS_PER_SECTOR - 1) {
            Some(DirRecord::Timestamps(group)) => Some(*group),
            _ => None,
        };
        for (slot, record) in sector.drain(..).enumerate() {
            let DirRecord::File(file) = record else { continue };
            if file.user != self.user {
                continue;
            }
            let stamp = stamps.and_then(|group| group.update_stamp(slot));
            fragments.push(Fragment {
                name: file.clean_name(),
                attributes: file.attributes(),
                extent: file.extent(),
                record_count: file.record_count,
                stamp,
            });
        }
    }
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

fn merge_extents(mut fragments: Vec<Fragment>) -> Vec<FileEntry> {
    // Stable: equal name and extent keep directory order.
    fragments.sort_by(|a, b| a.name.cmp(&b.name).then(a.extent.cmp(&b.extent)));

    fragments
        .chunk_by(|a, b| a.name == b.name)
        .filter_map(|group| {
            let survivor = group.last()?;
            let stamp = survivor.stamp.or_else(|| group.iter().find_map(|f| f.stamp));
            Some(FileEntry {
                name: survivor.name.clone(),
                attributes: survivor.attributes,
                selected: false,
                records: survivor.records(),
                stamp,
            })
        })
        .collect()
}
