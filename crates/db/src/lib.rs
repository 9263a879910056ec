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

//! Snapshot-isolated transactions over the physical log.

mod checks;
mod config;
mod conflict;
mod database;
mod engine;
mod error;
mod install;
pub mod objects;
#[cfg(test)]
mod test_support;
mod transaction;

pub use checks::{AcceptAll, CheckEvaluator};
pub use config::{DEFAULT_LARGE_TRANSACTION_WARNING, DatabaseConfig};
pub use conflict::conflicts;
pub use database::{CommitInfo, Database};
pub use engine::{CommitResult, Engine, LOG_FILE_NAME};
pub use error::{Conflict, ConflictReason, ConstraintError, Error};
pub use install::install;
pub use transaction::{Savepoint, Transaction};
