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

use crate::objects::Check;
use quire_log::Fields;

/// Evaluates check constraint predicates. The storage engine only holds predicate source text;
/// whoever compiles it supplies an implementation of this.
pub trait CheckEvaluator: Send + Sync {
    /// True if `row` satisfies `check`.
    fn evaluate(&self, check: &Check, row: &Fields) -> bool;
}

/// Treats every predicate as satisfied. Used for log replay, where every record was already
/// validated when it was first committed.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl CheckEvaluator for AcceptAll {
    fn evaluate(&self, _check: &Check, _row: &Fields) -> bool {
        true
    }
}
