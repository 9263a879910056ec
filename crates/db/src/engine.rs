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

//! The commit pipeline: one log, one published snapshot, any number of transactions.
//!
//! Transactions run against the snapshot they started from and are validated optimistically at
//! commit. The only mutual exclusion is around appending to the log and publishing the snapshot
//! that results.

use crate::checks::{AcceptAll, CheckEvaluator};
use crate::config::DatabaseConfig;
use crate::conflict::conflicts;
use crate::database::Database;
use crate::error::{Conflict, Error};
use crate::install::install;
use crate::transaction::Transaction;
use arc_swap::ArcSwap;
use minstant::Instant;
use parking_lot::Mutex;
use quire_common::{HEADER_LEN, Position, predefined};
use quire_log::physical::TransactionHeader;
use quire_log::{Body, LogFile, Physical, Writer, read_records};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tempfile::TempDir;
use tracing::{debug, error, info, warn};

pub const LOG_FILE_NAME: &str = "quire.log";

#[derive(Debug, Clone)]
pub enum CommitResult {
    /// Committed and published. `position` is the transaction header's offset, or `None` if
    /// there was nothing to write.
    Success {
        snapshot: Arc<Database>,
        position: Option<Position>,
    },
    /// Something committed since the transaction began conflicts with it. Retry from a fresh
    /// snapshot.
    ConflictRetry { conflict: Conflict },
}

pub struct Engine {
    config: DatabaseConfig,
    log_path: PathBuf,
    /// Held from the locked validation pass until the new snapshot is published.
    commit_lock: Mutex<LogFile>,
    root: ArcSwap<Database>,
    next_tx: AtomicU64,
    checks: Arc<dyn CheckEvaluator>,
    _tmpdir: Option<TempDir>,
}

impl Engine {
    /// Open the database in the directory `path`, or in a fresh temporary directory. The flag is
    /// true if the log was newly created.
    pub fn open(path: Option<&Path>, config: DatabaseConfig) -> Result<(Arc<Self>, bool), Error> {
        Self::open_with_checks(path, config, Arc::new(AcceptAll))
    }

    /// As [`Engine::open`], with `checks` deciding check constraints for new rows.
    pub fn open_with_checks(
        path: Option<&Path>,
        config: DatabaseConfig,
        checks: Arc<dyn CheckEvaluator>,
    ) -> Result<(Arc<Self>, bool), Error> {
        let tmpdir = match path {
            None => Some(TempDir::new()?),
            Some(_) => None,
        };
        let dir = match (path, &tmpdir) {
            (Some(p), _) => p.to_path_buf(),
            (None, Some(t)) => t.path().to_path_buf(),
            (None, None) => return Err(Error::Internal("no database directory".to_string())),
        };
        std::fs::create_dir_all(&dir)?;
        let log_path = dir.join(LOG_FILE_NAME);
        let (log, fresh) = LogFile::open_or_create(&log_path)?;

        let start = Instant::now();
        let root = replay(&log)?;
        info!(
            path = ?log_path,
            bytes = log.len(),
            transactions = root.version(),
            "Loaded database in {:.2}s",
            start.elapsed().as_secs_f32()
        );

        let engine = Arc::new(Self {
            config,
            log_path,
            commit_lock: Mutex::new(log),
            root: ArcSwap::new(Arc::new(root)),
            next_tx: AtomicU64::new(1),
            checks,
            _tmpdir: tmpdir,
        });
        Ok((engine, fresh))
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub(crate) fn checks(&self) -> &dyn CheckEvaluator {
        self.checks.as_ref()
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> Arc<Database> {
        self.root.load_full()
    }

    pub fn begin(self: &Arc<Self>) -> Transaction {
        let id = self.next_tx.fetch_add(1, Ordering::Relaxed);
        Transaction::new(self.clone(), id, self.snapshot())
    }

    /// Every committed record, one per line.
    pub fn dump_log(&self) -> Result<String, Error> {
        Ok(self.commit_lock.lock().dump()?)
    }

    pub(crate) fn commit(&self, tx: Transaction) -> Result<CommitResult, Error> {
        if tx.is_read_only() {
            return Ok(CommitResult::Success {
                snapshot: self.snapshot(),
                position: None,
            });
        }
        let start = Instant::now();
        let count = tx.records().len();
        if count > self.config.large_transaction_warning {
            warn!(
                "Potential large batch @ commit... {count} records in transaction {}",
                tx.id()
            );
        }

        // Most of the committed history can be checked without holding up other commits; only
        // what lands while we do that needs checking again under the lock.
        let mut checked_to = tx.base().log_end();
        if self.config.validate_unlocked {
            let published = self.root.load().log_end();
            if let Some(conflict) = self.validate(&tx, checked_to, published)? {
                warn!("Transaction conflict during commit: {}", conflict);
                return Ok(CommitResult::ConflictRetry { conflict });
            }
            checked_to = published;
        }

        let mut log = self.commit_lock.lock();
        if let Some(conflict) = self.validate(&tx, checked_to, log.len())? {
            warn!("Transaction conflict during commit: {}", conflict);
            return Ok(CommitResult::ConflictRetry { conflict });
        }

        let latest = self.root.load_full();
        let mut session = CommitSession {
            db: (*latest).clone(),
            writer: Writer::new(log.len()),
            role: tx.role(),
            checks: self.checks(),
        };
        let header = session.write_header(&tx)?;
        session.write_records(&tx)?;

        let CommitSession { mut db, writer, .. } = session;
        let bytes = writer.into_bytes();
        log.append(&bytes, self.config.sync_on_commit)?;
        db.log_end = log.len();
        db.version = latest.version() + 1;
        let snapshot = Arc::new(db);
        self.root.store(snapshot.clone());
        drop(log);

        if start.elapsed() > Duration::from_secs(5) {
            warn!(
                "Long running commit; {count} records took {}s",
                start.elapsed().as_secs_f32()
            );
        }
        debug!(
            tx = tx.id(),
            position = %header,
            records = count,
            bytes = bytes.len(),
            "Committed"
        );
        Ok(CommitResult::Success {
            snapshot,
            position: Some(header),
        })
    }

    /// The first conflict between the transaction and the records committed in `[from, to)`.
    fn validate(&self, tx: &Transaction, from: u64, to: u64) -> Result<Option<Conflict>, Error> {
        let committed = read_records(&self.log_path, from, to)?;
        for c in &committed {
            for p in tx.records() {
                if let Err(conflict) = conflicts(tx.working(), p, c) {
                    return Ok(Some(conflict));
                }
            }
        }
        Ok(None)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        debug!(path = ?self.log_path, "Closing database");
    }
}

/// The snapshot being built and the bytes being laid out for one commit.
struct CommitSession<'a> {
    db: Database,
    writer: Writer,
    role: Position,
    checks: &'a dyn CheckEvaluator,
}

impl CommitSession<'_> {
    fn write_header(&mut self, tx: &Transaction) -> Result<Position, Error> {
        let count = i32::try_from(tx.records().len())
            .map_err(|_| {
                Error::Internal(format!("transaction {} is too large", tx.id()))
            })?;
        let time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0);
        let at = self.writer.position();
        self.writer.set_segment(at);
        let header = Physical::pending(
            Position::Committed(at),
            TransactionHeader {
                count,
                user: tx.user(),
                role: Some(tx.role()),
                time,
            },
        );
        let written = header.write(&mut self.writer)?;
        self.db = install(&self.db, self.role, &written, self.checks)?;
        Ok(written.ppos)
    }

    /// Write and install every record, each only once everything it refers to has been written.
    fn write_records(&mut self, tx: &Transaction) -> Result<(), Error> {
        let mut remaining: Vec<&Physical> = tx.records().iter().collect();
        while !remaining.is_empty() {
            let Some(next) = remaining
                .iter()
                .position(|r| r.dependent(&self.writer).is_none())
            else {
                let unresolved: Vec<String> = remaining
                    .iter()
                    .filter_map(|r| r.dependent(&self.writer))
                    .map(|p| p.to_string())
                    .collect();
                error!(
                    tx = tx.id(),
                    "Records refer to positions never defined in the transaction: {}",
                    unresolved.join(", ")
                );
                return Err(Error::Internal(format!(
                    "unresolved positions {} in transaction {}",
                    unresolved.join(", "),
                    tx.id()
                )));
            };
            let record = remaining.remove(next);
            let written = record.write(&mut self.writer)?;
            self.db = install(&self.db, self.role, &written, self.checks).map_err(|e| {
                warn!(tx = tx.id(), "Constraint violation during commit: {e}");
                Error::from(e)
            })?;
        }
        Ok(())
    }
}

/// Fold every record in the log into a fresh snapshot.
fn replay(log: &LogFile) -> Result<Database, Error> {
    let mut db = Database::new();
    let mut role = predefined::SCHEMA_ROLE;
    let mut transactions = 0;
    for record in log.read_from(HEADER_LEN)? {
        if let Body::Transaction(header) = &record.body {
            role = header.role.unwrap_or(predefined::SCHEMA_ROLE);
            transactions += 1;
        }
        db = install(&db, role, &record, &AcceptAll).map_err(|e| {
            error!("Log record {} does not apply: {e}", record.ppos);
            Error::from(e)
        })?;
    }
    db.log_end = log.len();
    db.version = transactions;
    Ok(db)
}
