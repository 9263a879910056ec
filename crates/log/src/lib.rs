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

//! The physical log: record kinds, their binary encoding, and the file they live in.

mod codec;
mod error;
mod log_file;
pub mod physical;

pub use codec::{Fields, Reader, Writer};
pub use error::{DecodingError, EncodingError, LogError};
pub use log_file::{LOG_MAGIC, LOG_VERSION, LogFile, read_records};
pub use physical::{Body, Physical, PhysicalRecord, PhysicalType};
