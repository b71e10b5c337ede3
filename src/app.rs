#![forbid(unsafe_code)]

use std::io;

use tracing::{debug, info, warn};

use crate::batch::{self, BatchProgress, BatchReport};
use crate::commander::Commander;
use crate::device::Device;
use crate::error::{CommanderError, Result};
use crate::input::ByteSource;
use crate::keys::KeyDecoder;
use crate::menu::HELP_LINES;
use crate::model::{ActivePane, Command, Drive, Flow, Modal, Redraw, RefreshMode, ViewKind, Viewer};
use crate::pane::Pane;
use crate::ui::{Display, Layout, selection_summary};

const ESC: u8 = 0x1B;
const END_OF_FILE: &str = "End Of File";

/// Everything the program runs on, built once in `main`.
pub struct App<D: Device, V: Display> {
    commander: Commander,
    device: D,
    display: V,
    keys: KeyDecoder,
    modal: Option<Modal>,
    status: String,
    page_rows: usize,
}

impl<D: Device, V: Display> App<D, V> {
    pub fn new(commander: Commander, device: D, display: V, keys: KeyDecoder, page_rows: usize) -> Self {
        Self {
            commander,
            device,
            display,
            keys,
            modal: None,
            status: String::new(),
            page_rows: page_rows.max(1),
        }
    }

    pub fn commander(&self) -> &Commander {
        &self.commander
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn modal(&self) -> Option<&Modal> {
        self.modal.as_ref()
    }

    /// Loads both panels and paints the first screen.
    pub fn start(&mut self) -> Result<()> {
        let errors = self.commander.load_both(&mut self.device);
        self.status = errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
        self.full_redraw()?;
        self.display.flush()?;
        Ok(())
    }

    /// Reads and handles bytes until the user quits or the input ends.
    pub fn run(&mut self, input: &mut dyn ByteSource) -> Result<()> {
        self.start()?;
        loop {
            let byte = match input.read_byte() {
                Ok(byte) => byte,
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(err) => return Err(err.into()),
            };
            if self.handle_byte(byte)? == Flow::Quit {
                break;
            }
        }
        info!("leaving");
        Ok(())
    }

    pub fn handle_byte(&mut self, byte: u8) -> Result<Flow> {
        let flow = match self.modal.take() {
            Some(modal) => {
                let flow = self.handle_modal(byte, modal)?;
                if byte == ESC {
                    self.keys.discard_sequence();
                }
                flow
            }
            None => match self.keys.feed(byte) {
                Some(command) => self.dispatch(command)?,
                None => Flow::Continue,
            },
        };
        self.display.flush()?;
        Ok(flow)
    }

    fn dispatch(&mut self, command: Command) -> Result<Flow> {
        debug!(?command, "dispatch");
        let side = self.commander.active();
        match command {
            Command::MoveUp => self.apply(side, |pane| pane.move_cursor(-1))?,
            Command::MoveDown => self.apply(side, |pane| pane.move_cursor(1))?,
            Command::PageUp => self.apply(side, |pane| pane.page_up())?,
            Command::PageDown => self.apply(side, |pane| pane.page_down())?,
            Command::JumpFirst => self.apply(side, |pane| pane.jump_first())?,
            Command::JumpLast => self.apply(side, |pane| pane.jump_last())?,
            Command::ToggleSelection => {
                self.apply(side, |pane| pane.toggle_selection_at_cursor())?;
                let summary = selection_summary(self.commander.active_pane());
                self.set_status(summary)?;
            }
            Command::SwitchPanel => {
                for (side, index) in self.commander.switch_active_panel() {
                    self.display.draw_row(side, self.commander.pane(side), index)?;
                }
                let summary = selection_summary(self.commander.active_pane());
                self.set_status(summary)?;
            }
            Command::PromptDrive => {
                self.modal = Some(Modal::DrivePrompt);
                self.set_status("Drive (A-P)?".to_string())?;
            }
            Command::ChangeDrive(drive) => self.change_drive(drive)?,
            Command::View => self.open_viewer(ViewKind::Text)?,
            Command::Dump => self.open_viewer(ViewKind::Dump)?,
            Command::Copy => self.begin_copy()?,
            Command::Delete => self.begin_delete()?,
            Command::Help => {
                let lines: Vec<String> = HELP_LINES.iter().map(|line| line.to_string()).collect();
                self.display.show_page(&lines, "Press any key")?;
                self.modal = Some(Modal::Help);
            }
            Command::Redraw => {
                self.resize()?;
                self.full_redraw()?;
            }
            Command::Quit => return Ok(Flow::Quit),
            Command::LineEdited => {}
            Command::Unknown(text) => self.set_status(format!("Unknown command: {text}"))?,
        }
        if self.modal.is_none() {
            self.show_prompt()?;
        }
        Ok(Flow::Continue)
    }

    fn handle_modal(&mut self, byte: u8, modal: Modal) -> Result<Flow> {
        match modal {
            Modal::ConfirmCopy if byte.eq_ignore_ascii_case(&b'y') => self.run_copy()?,
            Modal::ConfirmDelete if byte.eq_ignore_ascii_case(&b'y') => self.run_delete()?,
            Modal::ConfirmCopy | Modal::ConfirmDelete => self.set_status("Cancelled".to_string())?,
            Modal::DrivePrompt => match Drive::from_letter(char::from(byte)) {
                Some(drive) => self.change_drive(drive)?,
                None => self.set_status(String::new())?,
            },
            Modal::Help => self.full_redraw()?,
            Modal::Viewer(viewer) => self.page_viewer(byte, viewer)?,
        }
        if self.modal.is_none() {
            self.show_prompt()?;
        }
        Ok(Flow::Continue)
    }

    fn apply(&mut self, side: ActivePane, action: impl FnOnce(&mut Pane) -> Redraw) -> Result<()> {
        let hint = action(self.commander.pane_mut(side));
        self.redraw(side, hint)
    }

    fn redraw(&mut self, side: ActivePane, hint: Redraw) -> Result<()> {
        match hint {
            Redraw::Nothing => {}
            Redraw::Rows { old, new } => {
                let pane = self.commander.pane(side);
                self.display.draw_row(side, pane, old)?;
                if new != old {
                    self.display.draw_row(side, pane, new)?;
                }
            }
            Redraw::Full => self.display.repaint_pane(side, self.commander.pane(side))?,
            Redraw::Rebuild => {
                let status = match self.commander.pane_mut(side).reload(&mut self.device, RefreshMode::Reset) {
                    Ok(()) => overflow_text(self.commander.pane(side)),
                    Err(err) => err.to_string(),
                };
                self.display.repaint_pane(side, self.commander.pane(side))?;
                self.set_status(status)?;
            }
        }
        Ok(())
    }

    /// Picks up a new terminal size; both panels keep their cursor in view.
    fn resize(&mut self) -> Result<()> {
        let layout = self.display.resize()?;
        for side in [ActivePane::Left, ActivePane::Right] {
            self.commander.pane_mut(side).set_visible_rows(layout.visible_rows());
        }
        self.page_rows = layout.page_rows().max(1);
        Ok(())
    }

    fn full_redraw(&mut self) -> Result<()> {
        self.display.clear()?;
        for side in [ActivePane::Left, ActivePane::Right] {
            self.display.repaint_pane(side, self.commander.pane(side))?;
        }
        self.display.show_status(&self.status)?;
        self.display.show_keybar()?;
        self.show_prompt()
    }

    fn show_prompt(&mut self) -> Result<()> {
        let drive = self.commander.active_pane().drive;
        self.display.show_prompt(drive, self.keys.line().text())?;
        Ok(())
    }

    fn set_status(&mut self, text: String) -> Result<()> {
        self.status = text;
        self.display.show_status(&self.status)?;
        Ok(())
    }

    fn change_drive(&mut self, drive: Drive) -> Result<()> {
        info!(%drive, "change drive");
        let (side, hint) = self.commander.change_active_drive(drive);
        self.redraw(side, hint)
    }

    /// Number of files a batch would touch: the marks, else the cursor file.
    fn batch_size(&self) -> usize {
        let pane = self.commander.active_pane();
        match pane.selected_count() {
            0 => usize::from(!pane.is_empty()),
            marked => marked,
        }
    }

    fn begin_copy(&mut self) -> Result<()> {
        let count = self.batch_size();
        if count == 0 {
            return Ok(());
        }
        let from = self.commander.active_pane().drive;
        let to = self.commander.inactive_pane().drive;
        if from == to {
            return self.set_status(CommanderError::SameDrive(from).to_string());
        }
        self.modal = Some(Modal::ConfirmCopy);
        self.set_status(format!("Copy {count} file(s) from {from}: to {to}:? (Y/N)"))
    }

    fn begin_delete(&mut self) -> Result<()> {
        let count = self.batch_size();
        if count == 0 {
            return Ok(());
        }
        let drive = self.commander.active_pane().drive;
        self.modal = Some(Modal::ConfirmDelete);
        self.set_status(format!("Delete {count} file(s) on {drive}:? (Y/N)"))
    }

    fn run_copy(&mut self) -> Result<()> {
        let (src, dst) = self.commander.split_mut();
        let display = &mut self.display;
        let outcome = batch::copy(src, dst, &mut self.device, |progress| show_progress(&mut *display, progress));
        for side in [ActivePane::Left, ActivePane::Right] {
            self.display.repaint_pane(side, self.commander.pane(side))?;
        }
        let overflow = overflow_text(self.commander.inactive_pane());
        self.finish_batch("Copied", outcome, overflow)
    }

    fn run_delete(&mut self) -> Result<()> {
        let side = self.commander.active();
        let pane = self.commander.active_pane_mut();
        let display = &mut self.display;
        let outcome = batch::delete(pane, &mut self.device, |progress| show_progress(&mut *display, progress));
        self.display.repaint_pane(side, self.commander.pane(side))?;
        let overflow = overflow_text(self.commander.pane(side));
        self.finish_batch("Deleted", outcome, overflow)
    }

    fn finish_batch(&mut self, verb: &str, outcome: Result<BatchReport>, overflow: String) -> Result<()> {
        let mut status = match outcome {
            Ok(report) if report.failed == 0 => format!("{verb} {} file(s)", report.attempted),
            Ok(report) => format!(
                "{verb} {} of {} file(s), {} failed",
                report.attempted - report.failed,
                report.attempted,
                report.failed
            ),
            Err(err) => err.to_string(),
        };
        if !overflow.is_empty() {
            status = format!("{status}; {overflow}");
        }
        self.set_status(status)
    }

    fn open_viewer(&mut self, kind: ViewKind) -> Result<()> {
        let pane = self.commander.active_pane();
        let Some(entry) = pane.current_entry() else { return Ok(()) };
        let (drive, name) = (pane.drive, entry.name.clone());
        let records = match self.device.read_records(drive, &name) {
            Ok(records) => records,
            Err(err) => return self.set_status(err.to_string()),
        };
        let viewer = Viewer::open(kind, &name, &records);
        debug!(file = %name, lines = viewer.lines.len(), kind = kind.label(), "viewer opened");
        self.display.show_page(viewer.page(self.page_rows), &viewer.footer())?;
        self.modal = Some(Modal::Viewer(viewer));
        Ok(())
    }

    fn page_viewer(&mut self, byte: u8, mut viewer: Viewer) -> Result<()> {
        if byte == ESC || viewer.at_end {
            return self.full_redraw();
        }
        if viewer.advance(self.page_rows) {
            self.display.show_page(viewer.page(self.page_rows), &viewer.footer())?;
        } else {
            viewer.at_end = true;
            self.display.show_page(&[], END_OF_FILE)?;
        }
        self.modal = Some(Modal::Viewer(viewer));
        Ok(())
    }
}

fn overflow_text(pane: &Pane) -> String {
    pane.overflow().map(|err| err.to_string()).unwrap_or_default()
}

fn show_progress<V: Display>(display: &mut V, progress: BatchProgress<'_>) {
    let text = format!("[{}/{}] {}: {}", progress.index, progress.total, progress.op.label(), progress.name);
    if let Err(err) = display.show_status(&text).and_then(|()| display.flush()) {
        warn!(error = %err, file = progress.name, "progress not shown");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::catalog::CatalogBuilder;
    use crate::device::{DeviceCall, MemoryDrives};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Drawn {
        Clear,
        Pane(ActivePane),
        Row(ActivePane, usize),
        Prompt(String),
        Status(String),
        Keybar,
        Page(Vec<String>, String),
    }

    #[derive(Debug, Default)]
    struct Recorder {
        drawn: Vec<Drawn>,
        layout: Layout,
        /// Progress lines (`[i/n] ...`) fail to draw.
        broken_progress: bool,
    }

    impl Recorder {
        fn statuses(&self) -> Vec<&str> {
            self.drawn
                .iter()
                .filter_map(|d| match d {
                    Drawn::Status(text) => Some(text.as_str()),
                    _ => None,
                })
                .collect()
        }

        fn panes(&self) -> Vec<&Drawn> {
            self.drawn.iter().filter(|d| matches!(d, Drawn::Pane(_) | Drawn::Row(..))).collect()
        }
    }

    impl Display for Recorder {
        fn clear(&mut self) -> io::Result<()> {
            self.drawn.push(Drawn::Clear);
            Ok(())
        }

        fn repaint_pane(&mut self, side: ActivePane, _pane: &Pane) -> io::Result<()> {
            self.drawn.push(Drawn::Pane(side));
            Ok(())
        }

        fn draw_row(&mut self, side: ActivePane, _pane: &Pane, index: usize) -> io::Result<()> {
            self.drawn.push(Drawn::Row(side, index));
            Ok(())
        }

        fn show_prompt(&mut self, drive: Drive, line: &str) -> io::Result<()> {
            self.drawn.push(Drawn::Prompt(format!("{drive}>{line}")));
            Ok(())
        }

        fn show_status(&mut self, text: &str) -> io::Result<()> {
            if self.broken_progress && text.starts_with('[') {
                return Err(io::Error::other("terminal gone"));
            }
            self.drawn.push(Drawn::Status(text.to_string()));
            Ok(())
        }

        fn show_keybar(&mut self) -> io::Result<()> {
            self.drawn.push(Drawn::Keybar);
            Ok(())
        }

        fn show_page(&mut self, lines: &[String], footer: &str) -> io::Result<()> {
            self.drawn.push(Drawn::Page(lines.to_vec(), footer.to_string()));
            Ok(())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn resize(&mut self) -> io::Result<Layout> {
            Ok(self.layout)
        }
    }

    fn app() -> App<MemoryDrives, Recorder> {
        app_with(CatalogBuilder::default())
    }

    fn app_with(builder: CatalogBuilder) -> App<MemoryDrives, Recorder> {
        let mut drives = MemoryDrives::new();
        for i in 0..5 {
            drives.insert(Drive::A, &format!("FILE{i}.TXT"), format!("line {i}\r\n").into_bytes());
        }
        drives.insert(Drive::B, "OTHER.COM", vec![0xC9; 10]);
        let left = Pane::new(Drive::A, builder, 3).unwrap();
        let right = Pane::new(Drive::B, builder, 3).unwrap();
        let mut app = App::new(Commander::new(left, right), drives, Recorder::default(), KeyDecoder::default(), 4);
        app.start().unwrap();
        app.display.drawn.clear();
        app.device.clear_calls();
        app
    }

    fn feed(app: &mut App<MemoryDrives, Recorder>, bytes: &[u8]) -> Flow {
        let mut flow = Flow::Continue;
        for byte in bytes {
            flow = app.handle_byte(*byte).unwrap();
        }
        flow
    }

    #[test]
    fn cursor_moves_redraw_two_rows() {
        let mut app = app();
        feed(&mut app, b"\x1b[B");
        assert_eq!(app.display.panes(), [&Drawn::Row(ActivePane::Left, 0), &Drawn::Row(ActivePane::Left, 1)]);

        app.display.drawn.clear();
        feed(&mut app, b"\x1b[B\x1b[B");
        assert!(app.display.panes().contains(&&Drawn::Pane(ActivePane::Left)));
        assert_eq!(app.commander.active_pane().cursor(), 3);
    }

    #[test]
    fn tab_redraws_only_the_two_cursor_rows() {
        let mut app = app();
        feed(&mut app, b"\t");
        assert_eq!(app.commander.active(), ActivePane::Right);
        assert_eq!(app.display.panes(), [&Drawn::Row(ActivePane::Left, 0), &Drawn::Row(ActivePane::Right, 0)]);
        assert_eq!(app.display.drawn.last(), Some(&Drawn::Prompt("B>".to_string())));
    }

    #[test]
    fn confirmed_copy_reports_progress_and_refreshes_both_panels() {
        let mut app = app();
        feed(&mut app, b"  ");
        assert_eq!(app.status(), "Sel: 2 Size: 1K");
        feed(&mut app, b"\x1b[15~");
        assert!(matches!(app.modal(), Some(Modal::ConfirmCopy)));
        assert_eq!(app.status(), "Copy 2 file(s) from A: to B:? (Y/N)");

        feed(&mut app, b"Y");
        let statuses = app.display.statuses();
        assert!(statuses.contains(&"[1/2] Copying: FILE0.TXT"));
        assert!(statuses.contains(&"[2/2] Copying: FILE1.TXT"));
        assert_eq!(app.status(), "Copied 2 file(s)");
        assert_eq!(app.device.names(Drive::B), ["FILE0.TXT", "FILE1.TXT", "OTHER.COM"]);
        assert_eq!(app.commander.inactive_pane().len(), 3);
        assert_eq!(app.commander.active_pane().selected_count(), 0);
    }

    #[test]
    fn progress_that_cannot_be_drawn_does_not_stop_the_batch() {
        let mut app = app();
        app.display.broken_progress = true;
        feed(&mut app, b"\x1b[15~y");
        assert_eq!(app.status(), "Copied 1 file(s)");
        assert_eq!(app.device.names(Drive::B), ["FILE0.TXT", "OTHER.COM"]);
        assert!(!app.display.statuses().iter().any(|text| text.starts_with('[')));
    }

    #[test]
    fn declined_delete_touches_nothing() {
        let mut app = app();
        feed(&mut app, b"\x1b[19~n");
        assert!(app.modal().is_none());
        assert_eq!(app.status(), "Cancelled");
        assert!(app.device.calls().is_empty());

        feed(&mut app, b"era\ry");
        assert_eq!(app.device.calls()[0], DeviceCall::Delete { drive: Drive::A, name: "FILE0.TXT".to_string() });
        assert_eq!(app.commander.active_pane().len(), 4);
    }

    #[test]
    fn drive_change_repaints_only_the_active_panel() {
        let mut app = app();
        feed(&mut app, b"b:\r");
        assert_eq!(app.commander.active_pane().drive, Drive::B);
        assert_eq!(app.display.panes(), [&Drawn::Pane(ActivePane::Left)]);
        assert_eq!(app.display.drawn.last(), Some(&Drawn::Prompt("B>".to_string())));

        feed(&mut app, &[0x15, b'z']);
        assert_eq!(app.commander.active_pane().drive, Drive::B);
        feed(&mut app, &[0x15, b'c']);
        assert!(app.commander.active_pane().is_empty());
        assert_eq!(app.status(), "drive C is not mapped");
    }

    #[test]
    fn same_drive_copy_is_refused_before_asking() {
        let mut app = app();
        feed(&mut app, b"\tA:\r\t\x1b[15~");
        assert!(app.modal().is_none());
        assert_eq!(app.status(), "source and destination are both drive A");
    }

    #[test]
    fn viewer_pages_to_end_of_file_and_closes() {
        let mut app = app();
        feed(&mut app, b"\x1bOR");
        let Some(Drawn::Page(lines, footer)) = app.display.drawn.last().cloned() else {
            panic!("no page shown");
        };
        assert_eq!(lines, ["line 0"]);
        assert_eq!(footer, "VIEW: FILE0.TXT (<SPACE>: more | <ESC>: exit)");

        feed(&mut app, b" ");
        assert_eq!(app.display.drawn.last(), Some(&Drawn::Page(Vec::new(), END_OF_FILE.to_string())));
        feed(&mut app, b" ");
        assert!(app.modal().is_none());
        assert!(app.display.drawn.contains(&Drawn::Clear));
    }

    #[test]
    fn unknown_words_and_quit_keys() {
        let mut app = app();
        assert_eq!(feed(&mut app, b"ZaP\r"), Flow::Continue);
        assert_eq!(app.status(), "Unknown command: ZaP");
        assert_eq!(feed(&mut app, b"\x1b\x1b"), Flow::Quit);
        assert_eq!(feed(&mut app, b"bye\r"), Flow::Quit);
    }

    #[test]
    fn escape_that_closes_a_prompt_takes_its_sequence_along() {
        let mut app = app();
        feed(&mut app, b"\x1bOR\x1b[B");
        assert!(app.modal().is_none());
        assert!(app.keys.line().is_empty());
        assert_eq!(app.commander.active_pane().cursor(), 0);

        feed(&mut app, b"\x1bOP\x1bOP");
        assert!(app.modal().is_none());
        assert!(app.keys.line().is_empty());

        feed(&mut app, b"\x1b[19~\x1b[A");
        assert_eq!(app.status(), "Cancelled");
        assert!(app.keys.line().is_empty());
        feed(&mut app, b" ");
        assert_eq!(app.commander.active_pane().selected_count(), 1);
        assert_eq!(app.device.calls(), [DeviceCall::Read { drive: Drive::A, name: "FILE0.TXT".to_string() }]);
    }

    #[test]
    fn overflow_is_shown_at_start_and_after_a_drive_change() {
        let mut app = app_with(CatalogBuilder::new(3));
        assert_eq!(app.status(), "directory of A: exceeds 3 entries, list truncated");
        assert_eq!(app.commander.active_pane().len(), 3);

        feed(&mut app, b"b:\r");
        assert_eq!(app.status(), "");
        feed(&mut app, b"a:\r");
        assert_eq!(app.status(), "directory of A: exceeds 3 entries, list truncated");
        assert_eq!(app.display.panes(), [&Drawn::Pane(ActivePane::Left), &Drawn::Pane(ActivePane::Left)]);
    }

    #[test]
    fn overflow_after_a_copy_joins_the_summary() {
        let mut app = app_with(CatalogBuilder::new(5));
        assert_eq!(app.status(), "");
        feed(&mut app, b"     \x1b[15~y");
        assert_eq!(app.device.names(Drive::B).len(), 6);
        assert_eq!(app.status(), "Copied 5 file(s); directory of B: exceeds 5 entries, list truncated");
        assert_eq!(app.commander.inactive_pane().len(), 5);
    }

    #[test]
    fn redraw_key_follows_a_smaller_screen() {
        let mut app = app();
        feed(&mut app, b"\x1b[B\x1b[B");
        app.display.layout = Layout::new(80, 6);
        feed(&mut app, &[0x0C]);
        let pane = app.commander.active_pane();
        assert_eq!(pane.visible_rows(), 2);
        assert_eq!((pane.cursor(), pane.scroll()), (2, 1));
        assert_eq!(app.commander.inactive_pane().visible_rows(), 2);
        assert_eq!(app.page_rows, 5);
        assert!(app.display.drawn.contains(&Drawn::Clear));
    }

    #[test]
    fn run_stops_on_quit() {
        let mut app = app();
        let mut input: VecDeque<u8> = b"\x1b[B\x18\x1b[B".iter().copied().collect();
        app.run(&mut input).unwrap();
        assert_eq!(app.commander.active_pane().cursor(), 1);
        assert_eq!(input.len(), 3);
    }
}
