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

//! Types shared by the log codec and the database: positions, field values and persisted flag sets.

pub mod flags;
mod position;
pub mod tracing;
pub mod util;
mod value;

pub use position::{HEADER_LEN, PENDING_BASE, Position, predefined};
pub use value::{Value, ValueType, v_bool, v_int, v_str};
