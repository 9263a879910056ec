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

use figment::Figment;
use figment::providers::{Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_LARGE_TRANSACTION_WARNING: usize = 10_000;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Flush the log to stable storage before a commit is acknowledged.
    pub sync_on_commit: bool,
    /// Validate against the log tail before taking the commit lock, so that the locked pass only
    /// has to look at commits which arrived in the meantime.
    pub validate_unlocked: bool,
    /// Transactions with more records than this are logged as suspiciously large at commit.
    pub large_transaction_warning: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sync_on_commit: true,
            validate_unlocked: true,
            large_transaction_warning: DEFAULT_LARGE_TRANSACTION_WARNING,
        }
    }
}

impl DatabaseConfig {
    /// The defaults, overridden by whatever the YAML file at `path` sets.
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment.extract()
    }
}
