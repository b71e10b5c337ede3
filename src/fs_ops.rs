#![forbid(unsafe_code)]

//! Host directories mounted as drives.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};
use tracing::{debug, info};

use crate::device::{DirFile, DirectorySource, FileOps, Records, decode_slots, directory_slots, to_records};
use crate::error::DeviceError;
use crate::model::{Attributes, Drive, RECORD_SIZE};

const NAME_PUNCTUATION: &[u8] = b"$#&-_!@%'";

/// The directory name a host file gets, if it can have one at all.
pub fn cpm_name(host: &str) -> Option<String> {
    let upper = host.to_ascii_uppercase();
    let (base, ext) = upper.split_once('.').unwrap_or((upper.as_str(), ""));
    let valid = |part: &str, max: usize| {
        part.len() <= max
            && part.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || NAME_PUNCTUATION.contains(&b))
    };
    if base.is_empty() || !valid(base, 8) || !valid(ext, 3) {
        return None;
    }
    Some(if ext.is_empty() { base.to_string() } else { format!("{base}.{ext}") })
}

fn local_datetime(time: SystemTime, offset: UtcOffset) -> PrimitiveDateTime {
    let dt = OffsetDateTime::from(time).to_offset(offset);
    PrimitiveDateTime::new(dt.date(), dt.time())
}

/// Reads until `buf` is full or the file ends; returns the bytes read.
fn read_record(input: &mut File, buf: &mut [u8; RECORD_SIZE]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < RECORD_SIZE {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

fn same_directory(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[derive(Debug, Clone)]
pub struct HostDrives {
    roots: BTreeMap<Drive, PathBuf>,
    user: u8,
    timestamps: bool,
    offset: UtcOffset,
}

impl HostDrives {
    pub fn new(roots: BTreeMap<Drive, PathBuf>) -> Self {
        let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
        Self { roots, user: 0, timestamps: true, offset }
    }

    pub fn with_user(mut self, user: u8) -> Self {
        self.user = user;
        self
    }

    pub fn with_timestamps(mut self, timestamps: bool) -> Self {
        self.timestamps = timestamps;
        self
    }

    pub fn root(&self, drive: Drive) -> Result<&Path, DeviceError> {
        self.roots.get(&drive).map(PathBuf::as_path).ok_or(DeviceError::NoSuchDrive(drive))
    }

    /// Regular files with a valid directory name, sorted by that name.
    fn listing(&self, drive: Drive) -> Result<Vec<(DirFile, PathBuf)>, DeviceError> {
        let root = self.root(drive)?;
        let mut files = Vec::new();
        for item in fs::read_dir(root)? {
            let item = item?;
            let Ok(metadata) = item.metadata() else { continue };
            if !metadata.is_file() {
                continue;
            }
            let Some(name) = item.file_name().to_str().and_then(cpm_name) else {
                continue;
            };
            let modified = metadata.modified().ok().map(|t| local_datetime(t, self.offset));
            let attributes = Attributes { read_only: metadata.permissions().readonly(), ..Attributes::default() };
            files.push((DirFile { name, len: metadata.len(), attributes, modified }, item.path()));
        }
        files.sort_by(|a, b| a.0.name.cmp(&b.0.name));
        Ok(files)
    }

    /// Host path of directory name `name`, whatever its case on the host.
    fn locate(&self, drive: Drive, name: &str) -> Result<PathBuf, DeviceError> {
        self.listing(drive)?
            .into_iter()
            .find(|(file, _)| file.name == name)
            .map(|(_, path)| path)
            .ok_or_else(|| DeviceError::NotFound { drive, name: name.to_string() })
    }
}

impl DirectorySource for HostDrives {
    fn enumerate(&mut self, drive: Drive) -> Result<Records<'_>, DeviceError> {
        let files: Vec<DirFile> = self.listing(drive)?.into_iter().map(|(file, _)| file).collect();
        debug!(%drive, files = files.len(), "host directory scanned");
        Ok(decode_slots(directory_slots(&files, self.user, self.timestamps)))
    }
}

impl FileOps for HostDrives {
    fn delete(&mut self, drive: Drive, name: &str) -> Result<(), DeviceError> {
        let path = self.locate(drive, name)?;
        fs::remove_file(&path).map_err(|source| DeviceError::DeviceIo { drive, name: name.to_string(), source })?;
        info!(%drive, file = name, "deleted");
        Ok(())
    }

    fn copy(&mut self, from: Drive, to: Drive, name: &str) -> Result<(), DeviceError> {
        let src_path = self.locate(from, name)?;
        let dst_root = self.root(to)?;
        if same_directory(self.root(from)?, dst_root) {
            return Err(DeviceError::DeviceIo {
                drive: to,
                name: name.to_string(),
                source: io::Error::other("source and destination are the same directory"),
            });
        }
        let target = match self.locate(to, name) {
            Ok(existing) => existing,
            Err(_) => dst_root.join(src_path.file_name().unwrap_or_default()),
        };

        let mut input = File::open(&src_path)
            .map_err(|source| DeviceError::FileOpen { drive: from, name: name.to_string(), source })?;
        let mut output = File::create(&target)
            .map_err(|source| DeviceError::FileCreate { drive: to, name: name.to_string(), source })?;
        let failed = |drive: Drive| move |source: io::Error| DeviceError::DeviceIo { drive, name: name.to_string(), source };

        let mut record = [0u8; RECORD_SIZE];
        let mut records = 0u32;
        loop {
            let n = read_record(&mut input, &mut record).map_err(failed(from))?;
            if n == 0 {
                break;
            }
            output.write_all(&record[..n]).map_err(failed(to))?;
            records += 1;
            if n < RECORD_SIZE {
                break;
            }
        }
        output.flush().map_err(failed(to))?;
        info!(%from, %to, file = name, records, "copied");
        Ok(())
    }

    fn read_records(&mut self, drive: Drive, name: &str) -> Result<Vec<[u8; RECORD_SIZE]>, DeviceError> {
        let path = self.locate(drive, name)?;
        let data = fs::read(&path).map_err(|source| DeviceError::FileOpen { drive, name: name.to_string(), source })?;
        Ok(to_records(&data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_names_map_to_eight_dot_three() {
        assert_eq!(cpm_name("readme.txt").as_deref(), Some("README.TXT"));
        assert_eq!(cpm_name("MAKEFILE").as_deref(), Some("MAKEFILE"));
        assert_eq!(cpm_name("$$$.sub").as_deref(), Some("$$$.SUB"));
        assert_eq!(cpm_name("toolongname.c"), None);
        assert_eq!(cpm_name("a.json"), None);
        assert_eq!(cpm_name(".hidden"), None);
        assert_eq!(cpm_name("a.b.c"), None);
        assert_eq!(cpm_name("sp ace.txt"), None);
    }

    #[test]
    fn copy_keeps_exact_length() -> anyhow::Result<()> {
        let left = tempfile::tempdir()?;
        let right = tempfile::tempdir()?;
        let data: Vec<u8> = (0..300u32).map(|i| (i % 251) as u8).collect();
        fs::write(left.path().join("data.bin"), &data)?;

        let roots = BTreeMap::from([(Drive::A, left.path().to_path_buf()), (Drive::B, right.path().to_path_buf())]);
        let mut drives = HostDrives::new(roots);
        drives.copy(Drive::A, Drive::B, "DATA.BIN")?;
        assert_eq!(fs::read(right.path().join("data.bin"))?, data);

        let records = drives.read_records(Drive::B, "DATA.BIN")?;
        assert_eq!(records.len(), 3);
        assert_eq!(records[2][300 - 256], 0x1A);
        Ok(())
    }

    #[test]
    fn unmapped_and_shared_directories_are_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("a.txt"), b"x")?;
        let roots = BTreeMap::from([(Drive::A, dir.path().to_path_buf()), (Drive::B, dir.path().to_path_buf())]);
        let mut drives = HostDrives::new(roots);
        assert!(matches!(drives.enumerate(Drive::from_index(5).unwrap()), Err(DeviceError::NoSuchDrive(_))));
        assert!(matches!(drives.copy(Drive::A, Drive::B, "A.TXT"), Err(DeviceError::DeviceIo { .. })));
        assert!(matches!(drives.delete(Drive::A, "B.TXT"), Err(DeviceError::NotFound { .. })));
        Ok(())
    }
}
