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

use crate::database::Database;
use crate::engine::{CommitResult, Engine};
use crate::error::Error;
use crate::install::install;
use quire_common::{Position, predefined};
use quire_log::{Body, Physical};
use std::sync::Arc;
use tracing::{debug, warn};

/// A marker in a transaction's record list that [`Transaction::rollback_to`] can return to.
#[derive(Debug, Clone)]
pub struct Savepoint {
    records: usize,
    working: Database,
}

/// A unit of work against the snapshot published when it began.
///
/// Records are installed into a private working copy as they are added, so later statements see
/// the effects of earlier ones. Nothing is visible to anyone else until [`Transaction::commit`].
pub struct Transaction {
    engine: Arc<Engine>,
    id: u64,
    base: Arc<Database>,
    working: Database,
    physicals: Vec<Physical>,
    next_local: u64,
    user: Option<Position>,
    role: Position,
    aborted: bool,
}

impl Transaction {
    pub(crate) fn new(engine: Arc<Engine>, id: u64, base: Arc<Database>) -> Self {
        let working = (*base).clone();
        Self {
            engine,
            id,
            base,
            working,
            physicals: vec![],
            next_local: 1,
            user: None,
            role: predefined::SCHEMA_ROLE,
            aborted: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The snapshot this transaction started from.
    pub fn base(&self) -> &Arc<Database> {
        &self.base
    }

    /// The base snapshot with this transaction's own records applied.
    pub fn working(&self) -> &Database {
        &self.working
    }

    pub fn records(&self) -> &[Physical] {
        &self.physicals
    }

    pub fn is_read_only(&self) -> bool {
        self.physicals.is_empty()
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn user(&self) -> Option<Position> {
        self.user
    }

    /// Record `user` as the author in the commit header.
    pub fn set_user(&mut self, user: Option<Position>) {
        self.user = user;
    }

    pub fn role(&self) -> Position {
        self.role
    }

    /// Names defined by later records go under `role`.
    pub fn set_role(&mut self, role: Position) {
        self.role = role;
    }

    /// Allocate a fresh transaction-local position.
    pub fn next_position(&mut self) -> Position {
        let p = Position::Pending(self.next_local);
        self.next_local += 1;
        p
    }

    /// Add a record at a fresh position and apply it to the working snapshot.
    ///
    /// A record that violates a constraint rolls the whole transaction back; every later call
    /// fails with [`Error::TransactionAborted`].
    pub fn add(&mut self, body: impl Into<Body>) -> Result<Position, Error> {
        let ppos = self.next_position();
        self.push(Physical::pending(ppos, body))?;
        Ok(ppos)
    }

    /// Add a record whose position was allocated earlier with [`Transaction::next_position`].
    pub fn push(&mut self, record: Physical) -> Result<(), Error> {
        if self.aborted {
            return Err(Error::TransactionAborted(self.id));
        }
        match install(&self.working, self.role, &record, self.engine.checks()) {
            Ok(db) => {
                self.working = db;
                self.physicals.push(record);
                Ok(())
            }
            Err(e) => {
                warn!(tx = self.id, "Constraint violation, rolling back: {e}");
                self.rollback();
                self.aborted = true;
                Err(e.into())
            }
        }
    }

    pub fn savepoint(&self) -> Savepoint {
        Savepoint {
            records: self.physicals.len(),
            working: self.working.clone(),
        }
    }

    /// Discard every record added since `savepoint` was taken.
    pub fn rollback_to(&mut self, savepoint: Savepoint) {
        debug!(
            tx = self.id,
            discarded = self.physicals.len().saturating_sub(savepoint.records),
            "Rolling back to savepoint"
        );
        self.physicals.truncate(savepoint.records);
        self.working = savepoint.working;
    }

    /// Discard every pending record. The transaction stays usable.
    pub fn rollback(&mut self) {
        self.physicals.clear();
        self.working = (*self.base).clone();
    }

    pub fn commit(self) -> Result<CommitResult, Error> {
        if self.aborted {
            return Err(Error::TransactionAborted(self.id));
        }
        let engine = self.engine.clone();
        engine.commit(self)
    }
}
