#![forbid(unsafe_code)]

//! Copy and delete over the marked files of a panel, or the file under the
//! cursor when nothing is marked. A failing file is logged and skipped.

use tracing::{info, warn};

use crate::device::Device;
use crate::error::CommanderError;
use crate::model::RefreshMode;
use crate::pane::Pane;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOp {
    Copy,
    Delete,
}

impl BatchOp {
    pub fn label(self) -> &'static str {
        match self {
            BatchOp::Copy => "Copying",
            BatchOp::Delete => "Deleting",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BatchProgress<'a> {
    pub op: BatchOp,
    /// One-based position in the batch.
    pub index: usize,
    pub total: usize,
    pub name: &'a str,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub attempted: usize,
    pub failed: usize,
}

/// Marked entries in catalog order, else the cursor entry, else nothing.
fn targets(pane: &Pane) -> Vec<usize> {
    let marked: Vec<usize> = pane
        .entries()
        .iter()
        .enumerate()
        .filter(|(_, e)| e.selected)
        .map(|(i, _)| i)
        .collect();
    if !marked.is_empty() {
        return marked;
    }
    if pane.is_empty() { Vec::new() } else { vec![pane.cursor()] }
}

fn run<F>(pane: &mut Pane, op: BatchOp, mut action: F, progress: &mut dyn FnMut(BatchProgress<'_>)) -> BatchReport
where
    F: FnMut(&str) -> Result<(), CommanderError>,
{
    let targets = targets(pane);
    let total = targets.len();
    let mut report = BatchReport::default();
    for (n, index) in targets.into_iter().enumerate() {
        let Some(entry) = pane.entry_mut(index) else { continue };
        let name = entry.name.clone();
        progress(BatchProgress { op, index: n + 1, total, name: &name });
        report.attempted += 1;
        if let Err(err) = action(&name) {
            warn!(op = op.label(), file = %name, error = %err, "batch item failed");
            report.failed += 1;
        }
        if let Some(entry) = pane.entry_mut(index) {
            entry.selected = false;
        }
    }
    report
}

/// Copies to the drive of `dst`, which is rebuilt once afterwards.
pub fn copy<D: Device>(
    src: &mut Pane,
    dst: &mut Pane,
    device: &mut D,
    mut progress: impl FnMut(BatchProgress<'_>),
) -> Result<BatchReport, CommanderError> {
    if src.drive == dst.drive {
        return Err(CommanderError::SameDrive(src.drive));
    }
    if src.is_empty() {
        return Ok(BatchReport::default());
    }
    let (from, to) = (src.drive, dst.drive);
    let report = run(
        src,
        BatchOp::Copy,
        |name| Ok(device.copy(from, to, name)?),
        &mut progress,
    );
    info!(%from, %to, attempted = report.attempted, failed = report.failed, "copy finished");
    dst.reload(device, RefreshMode::Keep)?;
    Ok(report)
}

/// Deletes from the drive of `pane`, which is rebuilt once afterwards.
pub fn delete<D: Device>(
    pane: &mut Pane,
    device: &mut D,
    mut progress: impl FnMut(BatchProgress<'_>),
) -> Result<BatchReport, CommanderError> {
    if pane.is_empty() {
        return Ok(BatchReport::default());
    }
    let drive = pane.drive;
    let report = run(
        pane,
        BatchOp::Delete,
        |name| Ok(device.delete(drive, name)?),
        &mut progress,
    );
    info!(%drive, attempted = report.attempted, failed = report.failed, "delete finished");
    pane.reload(device, RefreshMode::Keep)?;
    Ok(report)
}
