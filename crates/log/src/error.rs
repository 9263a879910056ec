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

use quire_common::Position;

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum EncodingError {
    #[error("Position {0} is still pending; its record has not been written yet")]
    UnresolvedPosition(Position),
    #[error("String of {0} bytes is too long to encode")]
    StringTooLong(usize),
    #[error("Sequence of {0} entries is too long to encode")]
    SequenceTooLong(usize),
}

/// Anything wrong with bytes read back from the log. All of these are fatal for a log load.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum DecodingError {
    #[error("Truncated record at offset {offset}: wanted {wanted} bytes, {available} available")]
    Truncated {
        offset: u64,
        wanted: usize,
        available: usize,
    },
    #[error("Unknown record type {tag} at offset {offset}")]
    UnknownType { offset: u64, tag: u8 },
    #[error("Unknown value type {tag} at offset {offset}")]
    UnknownValueType { offset: u64, tag: u8 },
    #[error("Invalid position {value} at offset {offset}")]
    InvalidPosition { offset: u64, value: i64 },
    #[error("Invalid UTF-8 string at offset {offset}")]
    InvalidString { offset: u64 },
    #[error("Invalid {what} value {value} at offset {offset}")]
    InvalidField {
        offset: u64,
        what: &'static str,
        value: i64,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("I/O failure on log file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Bad log header: {0}")]
    BadHeader(String),
    #[error(transparent)]
    Decoding(#[from] DecodingError),
    #[error("Log file is unusable: a failed append at offset {0} could not be rolled back")]
    Poisoned(u64),
}
