#![forbid(unsafe_code)]

//! Startup configuration: a TOML file in the platform config directory,
//! overridden by command line flags. Read once, before any panel exists.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::catalog::DEFAULT_CAPACITY;
use crate::error::CommanderError;
use crate::keys::DEFAULT_LINE_CAPACITY;
use crate::model::Drive;
use crate::record::MAX_USER;

#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Two-panel file commander for CP/M drives")]
pub struct Cli {
    #[arg(long, value_hint = clap::ValueHint::FilePath, help = "Config file (default: platform config dir)")]
    pub config: Option<PathBuf>,

    #[arg(
        short = 'd',
        long = "drive",
        value_name = "LETTER=DIR",
        value_parser = parse_mount,
        help = "Mount a host directory as a drive, e.g. B=/tmp/disk"
    )]
    pub drives: Vec<(String, PathBuf)>,

    #[arg(short, long, help = "Drive shown in the left panel")]
    pub left: Option<char>,

    #[arg(short, long, help = "Drive shown in the right panel")]
    pub right: Option<char>,

    #[arg(short, long, help = "User area (0-15)")]
    pub user: Option<u8>,

    #[arg(long, help = "Directory entries kept per panel")]
    pub capacity: Option<usize>,

    #[arg(long, help = "Ignore directory timestamps")]
    pub no_timestamps: bool,

    #[arg(long, help = "Log key and dispatch events")]
    pub debug: bool,

    #[arg(long, value_hint = clap::ValueHint::DirPath, help = "Directory for the daily log file")]
    pub log_dir: Option<PathBuf>,
}

fn parse_mount(text: &str) -> Result<(String, PathBuf), String> {
    let (letter, dir) = text.split_once('=').ok_or_else(|| format!("expected LETTER=DIR, got {text:?}"))?;
    if dir.is_empty() {
        return Err(format!("no directory given for drive {letter}"));
    }
    Ok((letter.trim().to_string(), PathBuf::from(dir)))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capacity: usize,
    pub user_area: u8,
    pub left_drive: String,
    pub right_drive: String,
    pub timestamps: bool,
    pub command_line_capacity: usize,
    /// Screen size; the terminal's own size is used when unset.
    pub columns: Option<u16>,
    pub lines: Option<u16>,
    pub debug: bool,
    pub log_dir: Option<PathBuf>,
    /// Drive letter to host directory.
    pub drives: BTreeMap<String, PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            user_area: 0,
            left_drive: "A".to_string(),
            right_drive: "B".to_string(),
            timestamps: true,
            command_line_capacity: DEFAULT_LINE_CAPACITY,
            columns: None,
            lines: None,
            debug: false,
            log_dir: None,
            drives: BTreeMap::new(),
        }
    }
}

fn parse_drive(text: &str) -> Result<Drive, CommanderError> {
    let mut chars = text.trim().trim_end_matches(':').chars();
    let drive = match (chars.next(), chars.next()) {
        (Some(letter), None) => Drive::from_letter(letter),
        _ => None,
    };
    drive.ok_or_else(|| CommanderError::Config(format!("invalid drive {text:?}, expected A to P")))
}

impl Config {
    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("org", "cpmcommander", "cpmcommander")
    }

    pub fn config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn default_log_dir() -> PathBuf {
        Self::project_dirs()
            .map(|dirs| dirs.data_local_dir().join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"))
    }

    pub fn from_toml(text: &str) -> Result<Self, CommanderError> {
        toml::from_str(text).map_err(|err| CommanderError::Config(err.to_string()))
    }

    /// Reads `explicit`, or the default path when it exists, or falls back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, CommanderError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match Self::config_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };
        let text = fs::read_to_string(&path)
            .map_err(|err| CommanderError::Config(format!("{}: {err}", path.display())))?;
        Self::from_toml(&text)
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        for (letter, dir) in &cli.drives {
            self.drives.insert(letter.to_ascii_uppercase(), dir.clone());
        }
        if let Some(letter) = cli.left {
            self.left_drive = letter.to_string();
        }
        if let Some(letter) = cli.right {
            self.right_drive = letter.to_string();
        }
        if let Some(user) = cli.user {
            self.user_area = user;
        }
        if let Some(capacity) = cli.capacity {
            self.capacity = capacity;
        }
        if cli.no_timestamps {
            self.timestamps = false;
        }
        if cli.debug {
            self.debug = true;
        }
        if let Some(dir) = &cli.log_dir {
            self.log_dir = Some(dir.clone());
        }
    }

    pub fn validate(&self) -> Result<(), CommanderError> {
        if self.capacity == 0 {
            return Err(CommanderError::Config("capacity must be at least 1".to_string()));
        }
        if self.user_area > MAX_USER {
            return Err(CommanderError::Config(format!("user area {} is above {MAX_USER}", self.user_area)));
        }
        self.panel_drives()?;
        self.drive_roots()?;
        Ok(())
    }

    pub fn panel_drives(&self) -> Result<(Drive, Drive), CommanderError> {
        Ok((parse_drive(&self.left_drive)?, parse_drive(&self.right_drive)?))
    }

    /// Host directory of every mounted drive; drive `A` is the current
    /// directory unless mapped otherwise.
    pub fn drive_roots(&self) -> Result<BTreeMap<Drive, PathBuf>, CommanderError> {
        let mut roots = BTreeMap::new();
        for (letter, dir) in &self.drives {
            roots.insert(parse_drive(letter)?, dir.clone());
        }
        if !roots.contains_key(&Drive::A) {
            let cwd = std::env::current_dir().map_err(|err| CommanderError::Config(err.to_string()))?;
            roots.insert(Drive::A, cwd);
        }
        Ok(roots)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(Self::default_log_dir)
    }
}
