// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The append-only file holding every committed record.

use crate::codec::Reader;
use crate::error::LogError;
use crate::physical::Physical;
use quire_common::HEADER_LEN;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info};
use zerocopy::byteorder::big_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub const LOG_MAGIC: u32 = 0x5155_4952;
pub const LOG_VERSION: u32 = 1;

#[derive(Debug, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
struct LogHeader {
    magic: U32,
    version: U32,
    created: U64,
}

pub struct LogFile {
    path: PathBuf,
    file: File,
    len: u64,
    created: u64,
    /// Set when a failed append left bytes past `len` that could not be cut off.
    poisoned: bool,
}

impl LogFile {
    /// Create a new, empty log. Fails if the file exists.
    pub fn create(path: &Path) -> Result<Self, LogError> {
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create_new(true)
            .open(path)?;
        let created = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        let header = LogHeader {
            magic: U32::new(LOG_MAGIC),
            version: U32::new(LOG_VERSION),
            created: U64::new(created),
        };
        file.write_all(header.as_bytes())?;
        file.sync_all()?;
        info!(path = ?path, "Created log");
        Ok(Self {
            path: path.to_path_buf(),
            file,
            len: HEADER_LEN,
            created,
            poisoned: false,
        })
    }

    /// Open an existing log, validating its header.
    pub fn open(path: &Path) -> Result<Self, LogError> {
        let mut file = OpenOptions::new().read(true).append(true).open(path)?;
        let len = file.metadata()?.len();
        if len < HEADER_LEN {
            return Err(LogError::BadHeader(format!(
                "file is {len} bytes, shorter than the header"
            )));
        }
        let mut buf = [0u8; HEADER_LEN as usize];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut buf)?;
        let header = LogHeader::read_from_bytes(&buf)
            .map_err(|_| LogError::BadHeader("unreadable header".to_string()))?;
        if header.magic.get() != LOG_MAGIC {
            return Err(LogError::BadHeader(format!(
                "bad magic {:#x}",
                header.magic.get()
            )));
        }
        if header.version.get() != LOG_VERSION {
            return Err(LogError::BadHeader(format!(
                "unsupported format version {}",
                header.version.get()
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
            file,
            len,
            created: header.created.get(),
            poisoned: false,
        })
    }

    /// Open the log at `path`, creating it if absent. The flag is true if it was created.
    pub fn open_or_create(path: &Path) -> Result<(Self, bool), LogError> {
        if path.exists() {
            Ok((Self::open(path)?, false))
        } else {
            Ok((Self::create(path)?, true))
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Offset one past the last committed byte.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == HEADER_LEN
    }

    pub fn created(&self) -> u64 {
        self.created
    }

    /// Append one transaction's bytes, which must have been laid out for offset `self.len()`.
    /// Returns the offset they were written at. On failure nothing of `bytes` is left behind.
    pub fn append(&mut self, bytes: &[u8], sync: bool) -> Result<u64, LogError> {
        self.append_with(bytes.len() as u64, |file| {
            file.write_all(bytes)?;
            if sync {
                file.sync_data()?;
            }
            Ok(())
        })
    }

    fn append_with(
        &mut self,
        len: u64,
        write: impl FnOnce(&mut File) -> io::Result<()>,
    ) -> Result<u64, LogError> {
        let at = self.len;
        if self.poisoned {
            return Err(LogError::Poisoned(at));
        }
        if let Err(e) = write(&mut self.file) {
            error!(at, error = ?e, "Append to log failed, truncating");
            if let Err(te) = self.truncate(at) {
                error!(
                    at,
                    error = ?te,
                    "Could not truncate log after failed append"
                );
                self.poisoned = true;
                return Err(LogError::Poisoned(at));
            }
            return Err(e.into());
        }
        self.len += len;
        debug!(at, len, "Appended to log");
        Ok(at)
    }

    fn truncate(&mut self, at: u64) -> io::Result<()> {
        self.file.set_len(at)?;
        self.file.sync_all()
    }

    /// Every record from `offset` to the current end.
    pub fn read_from(&self, offset: u64) -> Result<Vec<Physical>, LogError> {
        read_records(&self.path, offset, self.len)
    }

    /// Every record in the log, one per line, with its offset.
    pub fn dump(&self) -> Result<String, LogError> {
        let records = self.read_from(HEADER_LEN)?;
        let mut out = String::new();
        for r in records {
            out.push_str(&r.to_string());
            out.push('\n');
        }
        Ok(out)
    }
}

/// Decode the records in `[from, to)` of the log at `path` through a fresh handle, so callers
/// need not hold whatever guards the writer. `from` must be a record boundary.
pub fn read_records(path: &Path, from: u64, to: u64) -> Result<Vec<Physical>, LogError> {
    if to <= from {
        return Ok(vec![]);
    }
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(from))?;
    let mut buf = vec![0u8; (to - from) as usize];
    file.read_exact(&mut buf)?;
    let mut rdr = Reader::new(&buf, from);
    let mut records = vec![];
    while !rdr.is_at_end() {
        records.push(Physical::read(&mut rdr)?);
    }
    Ok(records)
}
