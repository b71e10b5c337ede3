#![forbid(unsafe_code)]

use tracing::debug;

use crate::device::DirectorySource;
use crate::error::CommanderError;
use crate::model::{ActivePane, Drive, Redraw, RefreshMode};
use crate::pane::Pane;

/// The two panels and which one has the focus.
#[derive(Debug)]
pub struct Commander {
    left: Pane,
    right: Pane,
    active: ActivePane,
}

impl Commander {
    pub fn new(mut left: Pane, mut right: Pane) -> Self {
        left.active = true;
        right.active = false;
        Self { left, right, active: ActivePane::Left }
    }

    pub fn active(&self) -> ActivePane {
        self.active
    }

    pub fn pane(&self, side: ActivePane) -> &Pane {
        match side {
            ActivePane::Left => &self.left,
            ActivePane::Right => &self.right,
        }
    }

    pub fn pane_mut(&mut self, side: ActivePane) -> &mut Pane {
        match side {
            ActivePane::Left => &mut self.left,
            ActivePane::Right => &mut self.right,
        }
    }

    pub fn active_pane(&self) -> &Pane {
        self.pane(self.active)
    }

    pub fn active_pane_mut(&mut self) -> &mut Pane {
        self.pane_mut(self.active)
    }

    pub fn inactive_pane(&self) -> &Pane {
        self.pane(self.active.other())
    }

    /// `(active, inactive)`, for operations that read one panel and write the other.
    pub fn split_mut(&mut self) -> (&mut Pane, &mut Pane) {
        match self.active {
            ActivePane::Left => (&mut self.left, &mut self.right),
            ActivePane::Right => (&mut self.right, &mut self.left),
        }
    }

    /// Moves the focus to the other panel. Returns the cursor row of each
    /// panel; only those two rows change highlighting.
    pub fn switch_active_panel(&mut self) -> [(ActivePane, usize); 2] {
        self.left.active = !self.left.active;
        self.right.active = !self.right.active;
        self.active = if self.left.active { ActivePane::Left } else { ActivePane::Right };
        debug!(active = ?self.active, "switched panel");
        [
            (ActivePane::Left, self.left.cursor()),
            (ActivePane::Right, self.right.cursor()),
        ]
    }

    /// Points the active panel at another drive. The returned hint is
    /// `Rebuild` for that panel alone; the caller reloads and repaints it.
    pub fn change_active_drive(&mut self, drive: Drive) -> (ActivePane, Redraw) {
        let side = self.active;
        let hint = self.active_pane_mut().set_drive(drive);
        debug!(?side, %drive, "drive changed");
        (side, hint)
    }

    /// Initial load of both panels; a failing drive leaves its panel empty.
    pub fn load_both(&mut self, source: &mut dyn DirectorySource) -> Vec<CommanderError> {
        let mut errors = Vec::new();
        for side in [ActivePane::Left, ActivePane::Right] {
            let pane = self.pane_mut(side);
            if let Err(err) = pane.reload(source, RefreshMode::Reset) {
                errors.push(err);
            }
            errors.extend(pane.overflow());
        }
        errors
    }
}
