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

use crate::codec::{Reader, Writer};
use crate::error::{DecodingError, EncodingError};
use crate::physical::{PhysicalRecord, PhysicalType};
use quire_common::Position;

/// Written ahead of every committed transaction. The records that follow carry its position in
/// their trailer.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TransactionHeader {
    /// Number of records following this header.
    pub count: i32,
    pub user: Option<Position>,
    pub role: Option<Position>,
    /// Microseconds since the Unix epoch.
    pub time: i64,
}

impl PhysicalRecord for TransactionHeader {
    fn physical_type(&self) -> PhysicalType {
        PhysicalType::Transaction
    }

    fn references(&self) -> Vec<Position> {
        self.user.into_iter().chain(self.role).collect()
    }

    fn relocate(&self, wr: &Writer) -> Self {
        Self {
            user: self.user.map(|u| wr.fix(u)),
            role: self.role.map(|r| wr.fix(r)),
            ..self.clone()
        }
    }

    fn serialise(&self, wr: &mut Writer) -> Result<(), EncodingError> {
        wr.put_int(self.count);
        wr.put_opt_position(self.user)?;
        wr.put_opt_position(self.role)?;
        wr.put_long(self.time);
        Ok(())
    }

    fn deserialise(_ty: PhysicalType, rdr: &mut Reader) -> Result<Self, DecodingError> {
        let count = rdr.get_int()?;
        let user = rdr.get_opt_position()?;
        let role = rdr.get_opt_position()?;
        let time = rdr.get_long()?;
        Ok(Self {
            count,
            user,
            role,
            time,
        })
    }
}
