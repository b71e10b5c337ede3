#![forbid(unsafe_code)]

use std::io;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use cpmcommander::app::App;
use cpmcommander::catalog::CatalogBuilder;
use cpmcommander::commander::Commander;
use cpmcommander::config::{Cli, Config};
use cpmcommander::error::CommanderError;
use cpmcommander::fs_ops::HostDrives;
use cpmcommander::input::{TerminalGuard, TerminalInput};
use cpmcommander::keys::KeyDecoder;
use cpmcommander::logging;
use cpmcommander::pane::Pane;
use cpmcommander::ui::{DEFAULT_COLUMNS, DEFAULT_LINES, Layout, TerminalDisplay};

/// Exit status when the catalog storage cannot be allocated.
const EXIT_NO_MEMORY: u8 = 3;

fn screen_size(config: &Config) -> (u16, u16) {
    let (columns, lines) = crossterm::terminal::size().unwrap_or((DEFAULT_COLUMNS, DEFAULT_LINES));
    (config.columns.unwrap_or(columns), config.lines.unwrap_or(lines))
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    config.apply_cli(&cli);
    config.validate()?;

    // Reads the local UTC offset; must run before the logging thread starts.
    let device = HostDrives::new(config.drive_roots()?)
        .with_user(config.user_area)
        .with_timestamps(config.timestamps);
    let _log_guard = logging::init(&config.log_dir(), config.debug)?;
    info!(?config, "starting");

    let (columns, lines) = screen_size(&config);
    let layout = Layout::new(columns, lines);
    let builder = CatalogBuilder::new(config.capacity).with_user(config.user_area);
    let (left_drive, right_drive) = config.panel_drives()?;
    let left = Pane::new(left_drive, builder, layout.visible_rows())?;
    let right = Pane::new(right_drive, builder, layout.visible_rows())?;

    let terminal = TerminalGuard::enter().context("cannot put the terminal in raw mode")?;
    let fixed_size = config.columns.is_some() || config.lines.is_some();
    let display = TerminalDisplay::new(io::stdout(), layout).with_fixed_size(fixed_size);
    let keys = KeyDecoder::new(config.command_line_capacity);
    let mut app = App::new(Commander::new(left, right), device, display, keys, layout.page_rows());
    let outcome = app.run(&mut TerminalInput::new());
    drop(terminal);

    if let Err(err) = &outcome {
        error!(error = %err, "terminated");
    }
    Ok(outcome?)
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("cpmcommander: {err:#}");
            match err.downcast_ref::<CommanderError>() {
                Some(CommanderError::Allocation { .. }) => ExitCode::from(EXIT_NO_MEMORY),
                _ => ExitCode::FAILURE,
            }
        }
    }
}
