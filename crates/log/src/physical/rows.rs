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

//! Row-level records.

use crate::codec::{Fields, Reader, Writer};
use crate::error::{DecodingError, EncodingError};
use crate::physical::{PhysicalRecord, PhysicalType};
use quire_common::Position;

fn fix_fields(wr: &Writer, fields: &Fields) -> Fields {
    fields
        .iter()
        .map(|(c, v)| (wr.fix(*c), v.clone()))
        .collect()
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Default)]
pub enum RecordVersion {
    #[default]
    V0,
    /// Adds a provenance string.
    V1,
}

/// Inserts a row. The record's position is the row's identity for the rest of its life.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InsertRow {
    pub version: RecordVersion,
    pub table: Position,
    pub fields: Fields,
    pub provenance: String,
}

impl PhysicalRecord for InsertRow {
    fn physical_type(&self) -> PhysicalType {
        match self.version {
            RecordVersion::V0 => PhysicalType::Record,
            RecordVersion::V1 => PhysicalType::Record1,
        }
    }

    fn references(&self) -> Vec<Position> {
        let mut refs = vec![self.table];
        refs.extend(self.fields.keys().copied());
        refs
    }

    fn relocate(&self, wr: &Writer) -> Self {
        Self {
            version: self.version,
            table: wr.fix(self.table),
            fields: fix_fields(wr, &self.fields),
            provenance: self.provenance.clone(),
        }
    }

    fn serialise(&self, wr: &mut Writer) -> Result<(), EncodingError> {
        if self.version >= RecordVersion::V1 {
            wr.put_string(&self.provenance)?;
        }
        wr.put_position(self.table)?;
        wr.put_fields(&self.fields)
    }

    fn deserialise(ty: PhysicalType, rdr: &mut Reader) -> Result<Self, DecodingError> {
        let version = match ty {
            PhysicalType::Record1 => RecordVersion::V1,
            _ => RecordVersion::V0,
        };
        let provenance = if version >= RecordVersion::V1 {
            rdr.get_string()?
        } else {
            String::new()
        };
        let table = rdr.get_position()?;
        let fields = rdr.get_fields()?;
        Ok(Self {
            version,
            table,
            fields,
            provenance,
        })
    }
}

/// Changes some fields of an existing row. A `Null` value removes the field.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UpdateRow {
    /// The row's defining position: the insert that created it.
    pub row: Position,
    /// The latest record touching this row when the update was made.
    pub previous: Position,
    pub table: Position,
    pub fields: Fields,
}

impl PhysicalRecord for UpdateRow {
    fn physical_type(&self) -> PhysicalType {
        PhysicalType::Update
    }

    fn references(&self) -> Vec<Position> {
        let mut refs = vec![self.row, self.previous, self.table];
        refs.extend(self.fields.keys().copied());
        refs
    }

    fn relocate(&self, wr: &Writer) -> Self {
        Self {
            row: wr.fix(self.row),
            previous: wr.fix(self.previous),
            table: wr.fix(self.table),
            fields: fix_fields(wr, &self.fields),
        }
    }

    fn serialise(&self, wr: &mut Writer) -> Result<(), EncodingError> {
        wr.put_position(self.row)?;
        wr.put_position(self.previous)?;
        wr.put_position(self.table)?;
        wr.put_fields(&self.fields)
    }

    fn deserialise(_ty: PhysicalType, rdr: &mut Reader) -> Result<Self, DecodingError> {
        let row = rdr.get_position()?;
        let previous = rdr.get_position()?;
        let table = rdr.get_position()?;
        let fields = rdr.get_fields()?;
        Ok(Self {
            row,
            previous,
            table,
            fields,
        })
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DeleteRow {
    pub table: Position,
    pub row: Position,
}

impl PhysicalRecord for DeleteRow {
    fn physical_type(&self) -> PhysicalType {
        PhysicalType::Delete
    }

    fn references(&self) -> Vec<Position> {
        vec![self.table, self.row]
    }

    fn relocate(&self, wr: &Writer) -> Self {
        Self {
            table: wr.fix(self.table),
            row: wr.fix(self.row),
        }
    }

    fn serialise(&self, wr: &mut Writer) -> Result<(), EncodingError> {
        wr.put_position(self.row)?;
        wr.put_position(self.table)
    }

    fn deserialise(_ty: PhysicalType, rdr: &mut Reader) -> Result<Self, DecodingError> {
        let row = rdr.get_position()?;
        let table = rdr.get_position()?;
        Ok(Self { table, row })
    }
}
