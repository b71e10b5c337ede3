#![forbid(unsafe_code)]

use tracing::{info, warn};

use crate::catalog::{Catalog, CatalogBuilder};
use crate::device::DirectorySource;
use crate::error::CommanderError;
use crate::model::{Drive, FileEntry, Redraw, RefreshMode};

/// One half of the screen: a drive's catalog plus cursor, scroll and selection.
#[derive(Debug)]
pub struct Pane {
    pub drive: Drive,
    pub active: bool,
    entries: Vec<FileEntry>,
    cursor: usize,
    scroll: usize,
    visible_rows: usize,
    builder: CatalogBuilder,
    dropped: Option<usize>,
}

impl Pane {
    /// Reserves the catalog storage up front; this is the one allocation
    /// the program cannot run without.
    pub fn new(drive: Drive, builder: CatalogBuilder, visible_rows: usize) -> Result<Self, CommanderError> {
        let capacity = builder.capacity();
        let mut entries = Vec::new();
        entries
            .try_reserve_exact(capacity)
            .map_err(|_| CommanderError::Allocation { capacity })?;
        Ok(Self {
            drive,
            active: false,
            entries,
            cursor: 0,
            scroll: 0,
            visible_rows: visible_rows.max(1),
            builder,
            dropped: None,
        })
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    pub fn visible_rows(&self) -> usize {
        self.visible_rows
    }

    pub fn capacity(&self) -> usize {
        self.builder.capacity()
    }

    pub fn current_entry(&self) -> Option<&FileEntry> {
        self.entries.get(self.cursor)
    }

    pub fn entry_mut(&mut self, index: usize) -> Option<&mut FileEntry> {
        self.entries.get_mut(index)
    }

    pub fn selected_count(&self) -> usize {
        self.entries.iter().filter(|e| e.selected).count()
    }

    pub fn selected_records(&self) -> u64 {
        self.entries.iter().filter(|e| e.selected).map(|e| u64::from(e.records)).sum()
    }

    /// Screen row of catalog `index`, if it is inside the visible window.
    pub fn row_of(&self, index: usize) -> Option<usize> {
        if index >= self.entries.len() || index < self.scroll {
            return None;
        }
        let row = index - self.scroll;
        (row < self.visible_rows).then_some(row)
    }

    /// Overflow of the last load, as a reportable error.
    pub fn overflow(&self) -> Option<CommanderError> {
        self.dropped.map(|_| CommanderError::DirectoryOverflow {
            drive: self.drive,
            capacity: self.capacity(),
        })
    }

    /// Rebuilds the catalog from the drive. On a device error the panel is
    /// left empty and the error is returned.
    pub fn reload(&mut self, source: &mut dyn DirectorySource, mode: RefreshMode) -> Result<(), CommanderError> {
        let catalog = match source.enumerate(self.drive) {
            Ok(records) => self.builder.build(records),
            Err(err) => {
                self.replace_catalog(Catalog::default(), RefreshMode::Reset);
                return Err(err.into());
            }
        };
        if let Some(dropped) = catalog.dropped {
            warn!(drive = %self.drive, capacity = self.capacity(), dropped, "directory overflow");
        }
        info!(drive = %self.drive, files = catalog.len(), "catalog loaded");
        self.replace_catalog(catalog, mode);
        Ok(())
    }

    /// Swaps in a freshly built catalog; selection flags start cleared.
    pub fn replace_catalog(&mut self, catalog: Catalog, mode: RefreshMode) {
        self.dropped = catalog.dropped;
        self.entries.clear();
        self.entries.extend(catalog.entries.into_iter().take(self.builder.capacity()));
        for entry in &mut self.entries {
            entry.selected = false;
        }
        match mode {
            RefreshMode::Reset => {
                self.cursor = 0;
                self.scroll = 0;
            }
            RefreshMode::Keep => {
                self.cursor = self.cursor.min(self.entries.len().saturating_sub(1));
                self.scroll = self.scroll.min(self.cursor);
                self.ensure_visible();
            }
        }
    }

    /// Applies a new window height, e.g. after a terminal resize.
    pub fn set_visible_rows(&mut self, rows: usize) -> Redraw {
        self.visible_rows = rows.max(1);
        self.ensure_visible();
        Redraw::Full
    }

    /// Moves by `delta` rows; nothing happens if that would leave the list.
    pub fn move_cursor(&mut self, delta: isize) -> Redraw {
        match self.cursor.checked_add_signed(delta) {
            Some(target) if target < self.entries.len() => self.move_to(target),
            _ => Redraw::Nothing,
        }
    }

    /// Moves by `delta` rows, stopping at either end.
    pub fn page(&mut self, delta: isize) -> Redraw {
        if self.entries.is_empty() {
            return Redraw::Nothing;
        }
        let last = self.entries.len() - 1;
        let target = self.cursor.saturating_add_signed(delta).min(last);
        self.move_to(target)
    }

    /// Half a screen, the distance of one page step.
    pub fn page_step(&self) -> isize {
        (self.visible_rows / 2).max(1) as isize
    }

    pub fn page_up(&mut self) -> Redraw {
        self.page(-self.page_step())
    }

    pub fn page_down(&mut self) -> Redraw {
        self.page(self.page_step())
    }

    pub fn jump_first(&mut self) -> Redraw {
        self.move_to(0)
    }

    pub fn jump_last(&mut self) -> Redraw {
        match self.entries.len() {
            0 => Redraw::Nothing,
            len => self.move_to(len - 1),
        }
    }

    /// Flips the mark under the cursor and steps down, except on the last entry.
    pub fn toggle_selection_at_cursor(&mut self) -> Redraw {
        let index = self.cursor;
        let Some(entry) = self.entries.get_mut(index) else {
            return Redraw::Nothing;
        };
        entry.selected = !entry.selected;
        if index + 1 < self.entries.len() {
            self.move_to(index + 1)
        } else {
            Redraw::Rows { old: index, new: index }
        }
    }

    pub fn set_drive(&mut self, drive: Drive) -> Redraw {
        self.drive = drive;
        Redraw::Rebuild
    }

    fn move_to(&mut self, target: usize) -> Redraw {
        if self.entries.is_empty() || target >= self.entries.len() || target == self.cursor {
            return Redraw::Nothing;
        }
        let old = self.cursor;
        let old_scroll = self.scroll;
        self.cursor = target;
        self.ensure_visible();
        if self.scroll != old_scroll {
            Redraw::Full
        } else {
            Redraw::Rows { old, new: target }
        }
    }

    fn ensure_visible(&mut self) {
        if self.cursor < self.scroll {
            self.scroll = self.cursor;
        } else if self.cursor >= self.scroll + self.visible_rows {
            self.scroll = self.cursor - (self.visible_rows - 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemoryDrives;

    fn entry(name: &str) -> FileEntry {
        FileEntry {
            name: name.to_string(),
            attributes: Default::default(),
            selected: false,
            records: 1,
            stamp: None,
        }
    }

    fn pane_with(count: usize, rows: usize) -> Pane {
        let mut pane = Pane::new(Drive::A, CatalogBuilder::new(1024), rows).unwrap();
        let entries = (0..count).map(|i| entry(&format!("F{i:03}.TXT"))).collect();
        pane.replace_catalog(Catalog { entries, dropped: None }, RefreshMode::Reset);
        pane
    }

    fn assert_window(pane: &Pane) {
        assert!(pane.scroll() <= pane.cursor());
        assert!(pane.cursor() < pane.scroll() + pane.visible_rows());
        assert!(pane.cursor() < pane.len());
    }

    #[test]
    fn moves_stop_at_both_ends() {
        let mut pane = pane_with(3, 10);
        assert_eq!(pane.move_cursor(-1), Redraw::Nothing);
        assert_eq!(pane.move_cursor(1), Redraw::Rows { old: 0, new: 1 });
        pane.jump_last();
        assert_eq!(pane.move_cursor(1), Redraw::Nothing);
        assert_eq!(pane.cursor(), 2);
    }

    #[test]
    fn scrolling_asks_for_a_full_repaint() {
        let mut pane = pane_with(10, 3);
        assert_eq!(pane.move_cursor(1), Redraw::Rows { old: 0, new: 1 });
        assert_eq!(pane.move_cursor(1), Redraw::Rows { old: 1, new: 2 });
        assert_eq!(pane.move_cursor(1), Redraw::Full);
        assert_eq!((pane.cursor(), pane.scroll()), (3, 1));
        assert_eq!(pane.jump_first(), Redraw::Full);
        assert_eq!(pane.scroll(), 0);
    }

    #[test]
    fn window_invariant_holds_for_every_row_count() {
        for rows in 1..8 {
            let mut pane = pane_with(23, rows);
            let mut seed = 7u32;
            for _ in 0..200 {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                match (seed >> 16) % 7 {
                    0 => pane.move_cursor(1),
                    1 => pane.move_cursor(-1),
                    2 => pane.page_down(),
                    3 => pane.page_up(),
                    4 => pane.jump_first(),
                    5 => pane.jump_last(),
                    _ => pane.toggle_selection_at_cursor(),
                };
                assert_window(&pane);
            }
        }
    }

    #[test]
    fn page_down_clamps_to_last_entry() {
        let mut pane = pane_with(37, 28);
        pane.move_cursor(30);
        assert_eq!(pane.cursor(), 30);
        pane.page_down();
        assert_eq!(pane.cursor(), 36);
        pane.page_down();
        assert_eq!(pane.cursor(), 36);
        assert_window(&pane);
    }

    #[test]
    fn page_step_is_half_the_window() {
        let mut pane = pane_with(100, 28);
        pane.page_down();
        assert_eq!(pane.cursor(), 14);
        pane.page_up();
        pane.page_up();
        assert_eq!(pane.cursor(), 0);
    }

    #[test]
    fn toggling_the_last_entry_keeps_the_cursor() {
        let mut pane = pane_with(4, 10);
        pane.jump_last();
        assert_eq!(pane.toggle_selection_at_cursor(), Redraw::Rows { old: 3, new: 3 });
        assert_eq!(pane.cursor(), 3);
        assert!(pane.entries()[3].selected);
    }

    #[test]
    fn toggling_advances_the_cursor() {
        let mut pane = pane_with(4, 10);
        assert_eq!(pane.toggle_selection_at_cursor(), Redraw::Rows { old: 0, new: 1 });
        assert!(pane.entries()[0].selected);
        pane.toggle_selection_at_cursor();
        assert_eq!(pane.selected_count(), 2);
    }

    #[test]
    fn empty_pane_ignores_navigation() {
        let mut pane = pane_with(0, 5);
        assert_eq!(pane.move_cursor(1), Redraw::Nothing);
        assert_eq!(pane.page_down(), Redraw::Nothing);
        assert_eq!(pane.jump_last(), Redraw::Nothing);
        assert_eq!(pane.toggle_selection_at_cursor(), Redraw::Nothing);
        assert!(pane.current_entry().is_none());
    }

    #[test]
    fn keep_refresh_clamps_cursor_and_clears_marks() {
        let mut pane = pane_with(10, 4);
        pane.jump_last();
        pane.entry_mut(2).unwrap().selected = true;
        let shorter = (0..5).map(|i| entry(&format!("G{i}"))).collect();
        pane.replace_catalog(Catalog { entries: shorter, dropped: None }, RefreshMode::Keep);
        assert_eq!(pane.cursor(), 4);
        assert_eq!(pane.selected_count(), 0);
        assert_window(&pane);
    }

    #[test]
    fn set_drive_requests_rebuild_and_reload_resets() {
        let mut drives = MemoryDrives::new();
        drives.insert(Drive::B, "ONE.COM", vec![1u8; 10]);
        let mut pane = pane_with(10, 4);
        pane.jump_last();
        assert_eq!(pane.set_drive(Drive::B), Redraw::Rebuild);
        pane.reload(&mut drives, RefreshMode::Reset).unwrap();
        assert_eq!(pane.len(), 1);
        assert_eq!((pane.cursor(), pane.scroll()), (0, 0));
    }

    #[test]
    fn unknown_drive_leaves_an_empty_pane() {
        let mut drives = MemoryDrives::new();
        let mut pane = pane_with(3, 4);
        pane.set_drive(Drive::from_letter('C').unwrap());
        assert!(pane.reload(&mut drives, RefreshMode::Reset).is_err());
        assert!(pane.is_empty());
    }

    #[test]
    fn shrinking_the_window_keeps_the_cursor_visible() {
        let mut pane = pane_with(30, 20);
        pane.move_cursor(15);
        assert_eq!(pane.set_visible_rows(5), Redraw::Full);
        assert_eq!(pane.scroll(), 11);
        assert_window(&pane);
        pane.set_visible_rows(0);
        assert_eq!(pane.visible_rows(), 1);
        assert_window(&pane);
    }

    #[test]
    fn row_of_maps_only_visible_entries() {
        let mut pane = pane_with(10, 3);
        pane.move_cursor(5);
        assert_eq!(pane.scroll(), 3);
        assert_eq!(pane.row_of(2), None);
        assert_eq!(pane.row_of(4), Some(1));
        assert_eq!(pane.row_of(6), None);
    }
}
