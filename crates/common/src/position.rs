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

use std::fmt::{Display, Formatter};

/// Base of the address range handed out to uncommitted objects. Only used when a pending position
/// has to be shown as a single integer (diagnostics); it never reaches the log.
pub const PENDING_BASE: i64 = 0x4000_0000_0000_0000;

/// Length of the log file header. No record can start below this offset, so committed positions
/// under it are free to name predefined objects.
pub const HEADER_LEN: u64 = 16;

/// The identity of anything defined in the log.
///
/// Once committed, a position is the byte offset of the record that defined the object. Before
/// that it is a handle local to the transaction which allocated it. The two never compare equal,
/// and every `Committed` position orders before every `Pending` one.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Position {
    Committed(u64),
    Pending(u64),
}

impl Position {
    pub fn is_committed(&self) -> bool {
        matches!(self, Position::Committed(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Position::Pending(_))
    }

    /// True for the reserved positions below the header used by predefined objects.
    pub fn is_predefined(&self) -> bool {
        matches!(self, Position::Committed(p) if *p < HEADER_LEN)
    }

    /// The log offset, if committed.
    pub fn offset(&self) -> Option<u64> {
        match self {
            Position::Committed(p) => Some(*p),
            Position::Pending(_) => None,
        }
    }

    /// Collapse to the single-integer form used in diagnostics.
    pub fn as_i64(&self) -> i64 {
        match self {
            Position::Committed(p) => *p as i64,
            Position::Pending(n) => PENDING_BASE + *n as i64,
        }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Position::Committed(p) => write!(f, "{p}"),
            Position::Pending(n) => write!(f, "'{n}"),
        }
    }
}

/// Objects which exist in every database before the first record is written.
pub mod predefined {
    use super::Position;

    pub const SCHEMA_ROLE: Position = Position::Committed(1);
    pub const PUBLIC: Position = Position::Committed(2);
    pub const INTEGER: Position = Position::Committed(4);
    pub const CHAR: Position = Position::Committed(5);
    pub const BOOLEAN: Position = Position::Committed(6);
    pub const NUMERIC: Position = Position::Committed(7);
    pub const BLOB: Position = Position::Committed(8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_orders_after_committed() {
        assert!(Position::Committed(u64::MAX >> 2) < Position::Pending(0));
        assert!(Position::Pending(1) < Position::Pending(2));
        assert_ne!(Position::Committed(7), Position::Pending(7));
    }

    #[test]
    fn test_predefined_below_header() {
        assert!(predefined::SCHEMA_ROLE.is_predefined());
        assert!(predefined::BLOB.is_predefined());
        assert!(!Position::Committed(HEADER_LEN).is_predefined());
        assert!(!Position::Pending(1).is_predefined());
    }

    #[test]
    fn test_as_i64() {
        assert_eq!(Position::Committed(120).as_i64(), 120);
        assert_eq!(Position::Pending(3).as_i64(), PENDING_BASE + 3);
        assert_eq!(Position::Pending(3).offset(), None);
    }
}
