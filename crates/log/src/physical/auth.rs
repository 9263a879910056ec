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
use quire_common::flags::Privileges;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UserDef {
    pub name: String,
}

impl PhysicalRecord for UserDef {
    fn physical_type(&self) -> PhysicalType {
        PhysicalType::User
    }

    fn references(&self) -> Vec<Position> {
        vec![]
    }

    fn relocate(&self, _wr: &Writer) -> Self {
        self.clone()
    }

    fn serialise(&self, wr: &mut Writer) -> Result<(), EncodingError> {
        wr.put_string(&self.name)
    }

    fn deserialise(_ty: PhysicalType, rdr: &mut Reader) -> Result<Self, DecodingError> {
        Ok(Self {
            name: rdr.get_string()?,
        })
    }
}

/// Grants or (with `revoke`) revokes privileges on an object. No grantee means PUBLIC.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct GrantDef {
    pub revoke: bool,
    pub privileges: Privileges,
    pub object: Position,
    pub grantee: Option<Position>,
}

impl PhysicalRecord for GrantDef {
    fn physical_type(&self) -> PhysicalType {
        if self.revoke {
            PhysicalType::Revoke
        } else {
            PhysicalType::Grant
        }
    }

    fn references(&self) -> Vec<Position> {
        let mut refs = vec![self.object];
        refs.extend(self.grantee);
        refs
    }

    fn relocate(&self, wr: &Writer) -> Self {
        Self {
            revoke: self.revoke,
            privileges: self.privileges,
            object: wr.fix(self.object),
            grantee: self.grantee.map(|g| wr.fix(g)),
        }
    }

    fn serialise(&self, wr: &mut Writer) -> Result<(), EncodingError> {
        wr.put_flags(self.privileges);
        wr.put_position(self.object)?;
        wr.put_opt_position(self.grantee)
    }

    fn deserialise(ty: PhysicalType, rdr: &mut Reader) -> Result<Self, DecodingError> {
        let privileges = rdr.get_flags()?;
        let object = rdr.get_position()?;
        let grantee = rdr.get_opt_position()?;
        Ok(Self {
            revoke: ty == PhysicalType::Revoke,
            privileges,
            object,
            grantee,
        })
    }
}

/// Replaces the name and body source of a procedure, view, trigger or check.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ModifyDef {
    pub target: Position,
    pub name: String,
    pub body: String,
}

impl PhysicalRecord for ModifyDef {
    fn physical_type(&self) -> PhysicalType {
        PhysicalType::Modify
    }

    fn references(&self) -> Vec<Position> {
        vec![self.target]
    }

    fn relocate(&self, wr: &Writer) -> Self {
        Self {
            target: wr.fix(self.target),
            name: self.name.clone(),
            body: self.body.clone(),
        }
    }

    fn serialise(&self, wr: &mut Writer) -> Result<(), EncodingError> {
        wr.put_position(self.target)?;
        wr.put_string(&self.name)?;
        wr.put_string(&self.body)
    }

    fn deserialise(_ty: PhysicalType, rdr: &mut Reader) -> Result<Self, DecodingError> {
        let target = rdr.get_position()?;
        let name = rdr.get_string()?;
        let body = rdr.get_string()?;
        Ok(Self { target, name, body })
    }
}
