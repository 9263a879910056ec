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

use quire_common::{Position, Value};
use quire_log::{EncodingError, LogError};
use std::fmt::{Display, Formatter};

/// Why a pending record could not be committed over one committed since its transaction began.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ConflictReason {
    Generic,
    RowDeleted,
    RowUpdated,
    TableAltered,
    NameInUse,
    ObjectDropped,
}

impl ConflictReason {
    /// The SQLSTATE class 40 code reported to clients.
    pub fn sqlstate(&self) -> &'static str {
        match self {
            ConflictReason::Generic => "40001",
            ConflictReason::RowDeleted => "40014",
            ConflictReason::RowUpdated => "40029",
            ConflictReason::TableAltered => "40025",
            ConflictReason::NameInUse => "40032",
            ConflictReason::ObjectDropped => "40010",
        }
    }
}

impl Display for ConflictReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConflictReason::Generic => "transaction conflict",
            ConflictReason::RowDeleted => "row deleted by another transaction",
            ConflictReason::RowUpdated => "row updated by another transaction",
            ConflictReason::TableAltered => "table altered by another transaction",
            ConflictReason::NameInUse => "name taken by another transaction",
            ConflictReason::ObjectDropped => "object dropped by another transaction",
        };
        write!(f, "{s} ({})", self.sqlstate())
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
#[error("{reason}: pending {pending} against committed {committed}")]
pub struct Conflict {
    pub reason: ConflictReason,
    pub pending: Position,
    pub committed: Position,
}

/// A record that cannot be installed without breaking an integrity rule. Every variant names the
/// offending record.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ConstraintError {
    #[error("{record}: duplicate key {key:?} in index {index}")]
    DuplicateKey {
        record: Position,
        index: Position,
        key: Vec<Value>,
    },
    #[error("{record}: no key {key:?} in the index {index} references")]
    MissingForeignKey {
        record: Position,
        index: Position,
        key: Vec<Value>,
    },
    #[error("{record}: row {row} is still referenced through {index}")]
    ForeignKeyInUse {
        record: Position,
        index: Position,
        row: Position,
    },
    #[error("{record}: null value for not-null column {column}")]
    NotNull { record: Position, column: Position },
    #[error("{record}: check {check} failed")]
    CheckFailed { record: Position, check: Position },
    #[error("{record}: cannot drop {target}, {dependent} depends on it")]
    DropRestricted {
        record: Position,
        target: Position,
        dependent: Position,
    },
    #[error("{record}: name {name} is already in use")]
    NameInUse { record: Position, name: String },
    #[error("{record}: no such object {target}")]
    UnknownObject { record: Position, target: Position },
}

impl ConstraintError {
    pub fn record(&self) -> Position {
        match self {
            ConstraintError::DuplicateKey { record, .. }
            | ConstraintError::MissingForeignKey { record, .. }
            | ConstraintError::ForeignKeyInUse { record, .. }
            | ConstraintError::NotNull { record, .. }
            | ConstraintError::CheckFailed { record, .. }
            | ConstraintError::DropRestricted { record, .. }
            | ConstraintError::NameInUse { record, .. }
            | ConstraintError::UnknownObject { record, .. } => *record,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Log(#[from] LogError),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Constraint(#[from] ConstraintError),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("transaction {0} has been rolled back")]
    TransactionAborted(u64),
}
