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

//! Records defining or changing schema objects.

use crate::codec::{Reader, Writer};
use crate::error::{DecodingError, EncodingError};
use crate::physical::{PhysicalRecord, PhysicalType};
use enum_primitive_derive::Primitive;
use quire_common::Position;
use quire_common::flags::{Constraints, DropAction};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Default)]
pub enum TableVersion {
    #[default]
    V0,
    /// Adds the row IRI.
    V1,
}

/// Creates a base table. Its position becomes the table's identity.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TableDef {
    pub version: TableVersion,
    pub name: String,
    pub row_iri: String,
}

impl PhysicalRecord for TableDef {
    fn physical_type(&self) -> PhysicalType {
        match self.version {
            TableVersion::V0 => PhysicalType::Table,
            TableVersion::V1 => PhysicalType::Table1,
        }
    }

    fn references(&self) -> Vec<Position> {
        vec![]
    }

    fn relocate(&self, _wr: &Writer) -> Self {
        self.clone()
    }

    fn serialise(&self, wr: &mut Writer) -> Result<(), EncodingError> {
        if self.version >= TableVersion::V1 {
            wr.put_string(&self.row_iri)?;
        }
        wr.put_string(&self.name)
    }

    fn deserialise(ty: PhysicalType, rdr: &mut Reader) -> Result<Self, DecodingError> {
        let version = match ty {
            PhysicalType::Table1 => TableVersion::V1,
            _ => TableVersion::V0,
        };
        let row_iri = if version >= TableVersion::V1 {
            rdr.get_string()?
        } else {
            String::new()
        };
        let name = rdr.get_string()?;
        Ok(Self {
            version,
            name,
            row_iri,
        })
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Default)]
pub enum RoleVersion {
    V0,
    /// Adds the details text.
    #[default]
    V1,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RoleDef {
    pub version: RoleVersion,
    pub name: String,
    pub details: String,
}

impl PhysicalRecord for RoleDef {
    fn physical_type(&self) -> PhysicalType {
        match self.version {
            RoleVersion::V0 => PhysicalType::Role,
            RoleVersion::V1 => PhysicalType::Role1,
        }
    }

    fn references(&self) -> Vec<Position> {
        vec![]
    }

    fn relocate(&self, _wr: &Writer) -> Self {
        self.clone()
    }

    fn serialise(&self, wr: &mut Writer) -> Result<(), EncodingError> {
        if self.version >= RoleVersion::V1 {
            wr.put_string(&self.details)?;
        }
        wr.put_string(&self.name)
    }

    fn deserialise(ty: PhysicalType, rdr: &mut Reader) -> Result<Self, DecodingError> {
        let version = match ty {
            PhysicalType::Role1 => RoleVersion::V1,
            _ => RoleVersion::V0,
        };
        let details = if version >= RoleVersion::V1 {
            rdr.get_string()?
        } else {
            String::new()
        };
        let name = rdr.get_string()?;
        Ok(Self {
            version,
            name,
            details,
        })
    }
}

/// How a column's value is produced when a row is written.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Primitive, Default)]
pub enum Generation {
    #[default]
    No = 0,
    /// Computed from the expression held in the default source.
    Expression = 1,
    RowStart = 2,
    RowEnd = 3,
    Position = 4,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Default)]
pub enum ColumnVersion {
    V1,
    /// Adds default, not-null and generation rule.
    V2,
    /// Adds the update assignment source.
    #[default]
    V3,
}

/// Adds a column to a table.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ColumnDef {
    pub version: ColumnVersion,
    pub table: Position,
    pub name: String,
    pub seq: i32,
    pub domain: Position,
    pub default_source: String,
    pub not_null: bool,
    pub generation: Generation,
    pub update_source: String,
}

impl ColumnDef {
    pub(crate) fn relocated(&self, wr: &Writer) -> Self {
        Self {
            table: wr.fix(self.table),
            domain: wr.fix(self.domain),
            ..self.clone()
        }
    }

    pub(crate) fn put_fields(&self, wr: &mut Writer) -> Result<(), EncodingError> {
        if self.version >= ColumnVersion::V3 {
            wr.put_string(&self.update_source)?;
            // Three fields retired before this engine wrote any logs.
            for _ in 0..3 {
                wr.put_long(-1);
            }
        }
        if self.version >= ColumnVersion::V2 {
            wr.put_string(&self.default_source)?;
            wr.put_int(self.not_null as i32);
            wr.put_enum(self.generation);
        }
        wr.put_position(self.table)?;
        wr.put_string(&self.name)?;
        wr.put_int(self.seq);
        wr.put_position(self.domain)
    }

    pub(crate) fn get_fields(
        version: ColumnVersion,
        rdr: &mut Reader,
    ) -> Result<Self, DecodingError> {
        let mut update_source = String::new();
        if version >= ColumnVersion::V3 {
            update_source = rdr.get_string()?;
            for _ in 0..3 {
                rdr.get_long()?;
            }
        }
        let mut default_source = String::new();
        let mut not_null = false;
        let mut generation = Generation::No;
        if version >= ColumnVersion::V2 {
            default_source = rdr.get_string()?;
            not_null = rdr.get_int()? != 0;
            generation = rdr.get_enum("generation rule")?;
        }
        let table = rdr.get_position()?;
        let name = rdr.get_string()?;
        let seq = rdr.get_int()?;
        let domain = rdr.get_position()?;
        Ok(Self {
            version,
            table,
            name,
            seq,
            domain,
            default_source,
            not_null,
            generation,
            update_source,
        })
    }
}

impl PhysicalRecord for ColumnDef {
    fn physical_type(&self) -> PhysicalType {
        match self.version {
            ColumnVersion::V1 => PhysicalType::Column,
            ColumnVersion::V2 => PhysicalType::Column2,
            ColumnVersion::V3 => PhysicalType::Column3,
        }
    }

    fn references(&self) -> Vec<Position> {
        vec![self.table, self.domain]
    }

    fn relocate(&self, wr: &Writer) -> Self {
        self.relocated(wr)
    }

    fn serialise(&self, wr: &mut Writer) -> Result<(), EncodingError> {
        self.put_fields(wr)
    }

    fn deserialise(ty: PhysicalType, rdr: &mut Reader) -> Result<Self, DecodingError> {
        let version = match ty {
            PhysicalType::Column => ColumnVersion::V1,
            PhysicalType::Column2 => ColumnVersion::V2,
            _ => ColumnVersion::V3,
        };
        Self::get_fields(version, rdr)
    }
}

/// Replaces the definition of an existing column. The column keeps its original position.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AlterColumn {
    pub column: Position,
    pub def: ColumnDef,
}

impl PhysicalRecord for AlterColumn {
    fn physical_type(&self) -> PhysicalType {
        match self.def.version {
            ColumnVersion::V1 => PhysicalType::Alter,
            ColumnVersion::V2 => PhysicalType::Alter2,
            ColumnVersion::V3 => PhysicalType::Alter3,
        }
    }

    fn references(&self) -> Vec<Position> {
        let mut refs = vec![self.column];
        refs.extend(self.def.references());
        refs
    }

    fn relocate(&self, wr: &Writer) -> Self {
        Self {
            column: wr.fix(self.column),
            def: self.def.relocated(wr),
        }
    }

    fn serialise(&self, wr: &mut Writer) -> Result<(), EncodingError> {
        wr.put_position(self.column)?;
        self.def.put_fields(wr)
    }

    fn deserialise(ty: PhysicalType, rdr: &mut Reader) -> Result<Self, DecodingError> {
        let version = match ty {
            PhysicalType::Alter => ColumnVersion::V1,
            PhysicalType::Alter2 => ColumnVersion::V2,
            _ => ColumnVersion::V3,
        };
        let column = rdr.get_position()?;
        let def = ColumnDef::get_fields(version, rdr)?;
        Ok(Self { column, def })
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Default)]
pub enum DropVersion {
    V0,
    /// Adds the drop action.
    #[default]
    V1,
}

/// Removes an object. Version 0 records always behave as Restrict.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DropObject {
    pub version: DropVersion,
    pub target: Position,
    pub action: DropAction,
}

impl PhysicalRecord for DropObject {
    fn physical_type(&self) -> PhysicalType {
        match self.version {
            DropVersion::V0 => PhysicalType::Drop,
            DropVersion::V1 => PhysicalType::Drop1,
        }
    }

    fn references(&self) -> Vec<Position> {
        vec![self.target]
    }

    fn relocate(&self, wr: &Writer) -> Self {
        Self {
            target: wr.fix(self.target),
            ..self.clone()
        }
    }

    fn serialise(&self, wr: &mut Writer) -> Result<(), EncodingError> {
        if self.version >= DropVersion::V1 {
            wr.put_enum(self.action);
        }
        wr.put_position(self.target)
    }

    fn deserialise(ty: PhysicalType, rdr: &mut Reader) -> Result<Self, DecodingError> {
        let version = match ty {
            PhysicalType::Drop1 => DropVersion::V1,
            _ => DropVersion::V0,
        };
        let action = if version >= DropVersion::V1 {
            rdr.get_enum("drop action")?
        } else {
            DropAction::Restrict
        };
        let target = rdr.get_position()?;
        Ok(Self {
            version,
            target,
            action,
        })
    }
}

/// Renames an object.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RenameDef {
    pub target: Position,
    pub name: String,
}

impl PhysicalRecord for RenameDef {
    fn physical_type(&self) -> PhysicalType {
        PhysicalType::Change
    }

    fn references(&self) -> Vec<Position> {
        vec![self.target]
    }

    fn relocate(&self, wr: &Writer) -> Self {
        Self {
            target: wr.fix(self.target),
            name: self.name.clone(),
        }
    }

    fn serialise(&self, wr: &mut Writer) -> Result<(), EncodingError> {
        wr.put_position(self.target)?;
        wr.put_string(&self.name)
    }

    fn deserialise(_ty: PhysicalType, rdr: &mut Reader) -> Result<Self, DecodingError> {
        let target = rdr.get_position()?;
        let name = rdr.get_string()?;
        Ok(Self { target, name })
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Default)]
pub enum IndexVersion {
    V0,
    /// Adds the adapter function source.
    V1,
    /// Adds the metadata bitmask.
    #[default]
    V2,
}

/// Creates a primary, unique, foreign or plain key on a table.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct IndexDef {
    pub version: IndexVersion,
    pub name: String,
    pub table: Position,
    pub columns: Vec<Position>,
    pub flags: Constraints,
    /// The index this foreign key refers to.
    pub reference: Option<Position>,
    pub adapter: String,
    pub metadata: u64,
}

impl PhysicalRecord for IndexDef {
    fn physical_type(&self) -> PhysicalType {
        match self.version {
            IndexVersion::V0 => PhysicalType::Index,
            IndexVersion::V1 => PhysicalType::Index1,
            IndexVersion::V2 => PhysicalType::Index2,
        }
    }

    fn references(&self) -> Vec<Position> {
        let mut refs = vec![self.table];
        refs.extend(self.columns.iter().copied());
        refs.extend(self.reference);
        refs
    }

    fn relocate(&self, wr: &Writer) -> Self {
        Self {
            table: wr.fix(self.table),
            columns: self.columns.iter().map(|c| wr.fix(*c)).collect(),
            reference: self.reference.map(|r| wr.fix(r)),
            ..self.clone()
        }
    }

    fn serialise(&self, wr: &mut Writer) -> Result<(), EncodingError> {
        if self.version >= IndexVersion::V2 {
            wr.put_long(self.metadata as i64);
        }
        if self.version >= IndexVersion::V1 {
            wr.put_string(&self.adapter)?;
        }
        wr.put_string(&self.name)?;
        wr.put_position(self.table)?;
        wr.put_positions(&self.columns)?;
        wr.put_flags(self.flags);
        wr.put_opt_position(self.reference)
    }

    fn deserialise(ty: PhysicalType, rdr: &mut Reader) -> Result<Self, DecodingError> {
        let version = match ty {
            PhysicalType::Index => IndexVersion::V0,
            PhysicalType::Index1 => IndexVersion::V1,
            _ => IndexVersion::V2,
        };
        let metadata = if version >= IndexVersion::V2 {
            rdr.get_long()? as u64
        } else {
            0
        };
        let adapter = if version >= IndexVersion::V1 {
            rdr.get_string()?
        } else {
            String::new()
        };
        let name = rdr.get_string()?;
        let table = rdr.get_position()?;
        let columns = rdr.get_positions()?;
        let flags = rdr.get_flags()?;
        let reference = rdr.get_opt_position()?;
        Ok(Self {
            version,
            name,
            table,
            columns,
            flags,
            reference,
            adapter,
            metadata,
        })
    }
}

/// Replaces the ON UPDATE / ON DELETE behaviour of a foreign key.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RefActionDef {
    pub index: Position,
    pub flags: Constraints,
}

impl PhysicalRecord for RefActionDef {
    fn physical_type(&self) -> PhysicalType {
        PhysicalType::RefAction
    }

    fn references(&self) -> Vec<Position> {
        vec![self.index]
    }

    fn relocate(&self, wr: &Writer) -> Self {
        Self {
            index: wr.fix(self.index),
            flags: self.flags,
        }
    }

    fn serialise(&self, wr: &mut Writer) -> Result<(), EncodingError> {
        wr.put_position(self.index)?;
        wr.put_flags(self.flags);
        Ok(())
    }

    fn deserialise(_ty: PhysicalType, rdr: &mut Reader) -> Result<Self, DecodingError> {
        let index = rdr.get_position()?;
        let flags = rdr.get_flags()?;
        Ok(Self { index, flags })
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Primitive)]
pub enum DomainKind {
    Integer = 1,
    Numeric = 2,
    Char = 3,
    Boolean = 4,
    Blob = 5,
    Date = 6,
    Timestamp = 7,
    Interval = 8,
    Row = 9,
    Array = 10,
    Multiset = 11,
    UserType = 12,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Primitive, Default)]
pub enum GraphKind {
    #[default]
    Plain = 0,
    Node = 1,
    Edge = 2,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum DomainVersion {
    #[default]
    Domain,
    /// Carries two retired strings ahead of the domain fields.
    Domain1,
    /// A user-defined structured type, possibly a graph node or edge type.
    Type,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DomainDef {
    pub version: DomainVersion,
    pub name: String,
    pub kind: DomainKind,
    pub precision: i32,
    pub scale: i32,
    pub charset: i32,
    pub culture: String,
    pub default_source: String,
    /// Element type of arrays and multisets.
    pub element: Option<Position>,
    pub supertypes: Vec<Position>,
    pub graph: GraphKind,
}

impl PhysicalRecord for DomainDef {
    fn physical_type(&self) -> PhysicalType {
        match self.version {
            DomainVersion::Domain => PhysicalType::Domain,
            DomainVersion::Domain1 => PhysicalType::Domain1,
            DomainVersion::Type => PhysicalType::Type,
        }
    }

    fn references(&self) -> Vec<Position> {
        let mut refs: Vec<_> = self.element.into_iter().collect();
        refs.extend(self.supertypes.iter().copied());
        refs
    }

    fn relocate(&self, wr: &Writer) -> Self {
        Self {
            element: self.element.map(|e| wr.fix(e)),
            supertypes: self.supertypes.iter().map(|s| wr.fix(*s)).collect(),
            ..self.clone()
        }
    }

    fn serialise(&self, wr: &mut Writer) -> Result<(), EncodingError> {
        match self.version {
            DomainVersion::Type => {
                wr.put_positions(&self.supertypes)?;
                wr.put_enum(self.graph);
            }
            DomainVersion::Domain1 => {
                wr.put_string("")?;
                wr.put_string("")?;
            }
            DomainVersion::Domain => {}
        }
        wr.put_string(&self.name)?;
        wr.put_enum(self.kind);
        wr.put_int(self.precision);
        wr.put_int(self.scale);
        wr.put_int(self.charset);
        wr.put_string(&self.culture)?;
        wr.put_string(&self.default_source)?;
        wr.put_opt_position(self.element)
    }

    fn deserialise(ty: PhysicalType, rdr: &mut Reader) -> Result<Self, DecodingError> {
        let mut supertypes = vec![];
        let mut graph = GraphKind::Plain;
        let version = match ty {
            PhysicalType::Type => {
                supertypes = rdr.get_positions()?;
                graph = rdr.get_enum("graph kind")?;
                DomainVersion::Type
            }
            PhysicalType::Domain1 => {
                rdr.get_string()?;
                rdr.get_string()?;
                DomainVersion::Domain1
            }
            _ => DomainVersion::Domain,
        };
        let name = rdr.get_string()?;
        let kind = rdr.get_enum("domain kind")?;
        let precision = rdr.get_int()?;
        let scale = rdr.get_int()?;
        let charset = rdr.get_int()?;
        let culture = rdr.get_string()?;
        let default_source = rdr.get_string()?;
        let element = rdr.get_opt_position()?;
        Ok(Self {
            version,
            name,
            kind,
            precision,
            scale,
            charset,
            culture,
            default_source,
            element,
            supertypes,
            graph,
        })
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Default)]
pub enum CheckVersion {
    V1,
    /// Adds the sub-object (a column of the owning table, say).
    #[default]
    V2,
}

/// A boolean predicate constraint on a table, column or domain.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CheckDef {
    pub version: CheckVersion,
    pub owner: Position,
    pub sub_object: Option<Position>,
    pub name: String,
    pub source: String,
}

impl CheckDef {
    /// The owner and, when present, the sub-object: every object this check constrains.
    pub fn targets(&self) -> Vec<Position> {
        let mut t = vec![self.owner];
        t.extend(self.sub_object);
        t
    }
}

impl PhysicalRecord for CheckDef {
    fn physical_type(&self) -> PhysicalType {
        match self.version {
            CheckVersion::V1 => PhysicalType::Check,
            CheckVersion::V2 => PhysicalType::Check2,
        }
    }

    fn references(&self) -> Vec<Position> {
        self.targets()
    }

    fn relocate(&self, wr: &Writer) -> Self {
        Self {
            owner: wr.fix(self.owner),
            sub_object: self.sub_object.map(|s| wr.fix(s)),
            ..self.clone()
        }
    }

    fn serialise(&self, wr: &mut Writer) -> Result<(), EncodingError> {
        if self.version >= CheckVersion::V2 {
            wr.put_opt_position(self.sub_object)?;
        }
        wr.put_position(self.owner)?;
        wr.put_string(&self.name)?;
        wr.put_string(&self.source)
    }

    fn deserialise(ty: PhysicalType, rdr: &mut Reader) -> Result<Self, DecodingError> {
        let version = match ty {
            PhysicalType::Check2 => CheckVersion::V2,
            _ => CheckVersion::V1,
        };
        let sub_object = if version >= CheckVersion::V2 {
            rdr.get_opt_position()?
        } else {
            None
        };
        let owner = rdr.get_position()?;
        let name = rdr.get_string()?;
        let source = rdr.get_string()?;
        Ok(Self {
            version,
            owner,
            sub_object,
            name,
            source,
        })
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TriggerDef {
    pub name: String,
    pub table: Position,
    pub flags: quire_common::flags::TriggerTypes,
    /// For UPDATE OF triggers; empty means any column.
    pub columns: Vec<Position>,
    pub old_row: String,
    pub new_row: String,
    pub old_table: String,
    pub new_table: String,
    pub source: String,
}

impl PhysicalRecord for TriggerDef {
    fn physical_type(&self) -> PhysicalType {
        PhysicalType::Trigger
    }

    fn references(&self) -> Vec<Position> {
        let mut refs = vec![self.table];
        refs.extend(self.columns.iter().copied());
        refs
    }

    fn relocate(&self, wr: &Writer) -> Self {
        Self {
            table: wr.fix(self.table),
            columns: self.columns.iter().map(|c| wr.fix(*c)).collect(),
            ..self.clone()
        }
    }

    fn serialise(&self, wr: &mut Writer) -> Result<(), EncodingError> {
        wr.put_string(&self.name)?;
        wr.put_position(self.table)?;
        wr.put_flags(self.flags);
        wr.put_positions(&self.columns)?;
        wr.put_string(&self.old_row)?;
        wr.put_string(&self.new_row)?;
        wr.put_string(&self.old_table)?;
        wr.put_string(&self.new_table)?;
        wr.put_string(&self.source)
    }

    fn deserialise(_ty: PhysicalType, rdr: &mut Reader) -> Result<Self, DecodingError> {
        Ok(Self {
            name: rdr.get_string()?,
            table: rdr.get_position()?,
            flags: rdr.get_flags()?,
            columns: rdr.get_positions()?,
            old_row: rdr.get_string()?,
            new_row: rdr.get_string()?,
            old_table: rdr.get_string()?,
            new_table: rdr.get_string()?,
            source: rdr.get_string()?,
        })
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum ViewVersion {
    #[default]
    View,
    /// Carries three retired strings ahead of the view fields.
    View1,
    /// A view over a remote relation, with a structure type.
    RestView,
    /// Adds remote credentials.
    RestView1,
    /// Adds the local table supplying the remote URLs.
    RestView2,
}

impl ViewVersion {
    pub fn is_rest(&self) -> bool {
        matches!(
            self,
            ViewVersion::RestView | ViewVersion::RestView1 | ViewVersion::RestView2
        )
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ViewDef {
    pub version: ViewVersion,
    pub name: String,
    pub definition: String,
    pub structure: Option<Position>,
    pub remote_user: String,
    pub remote_password: String,
    pub using_table: Option<Position>,
}

impl PhysicalRecord for ViewDef {
    fn physical_type(&self) -> PhysicalType {
        match self.version {
            ViewVersion::View => PhysicalType::View,
            ViewVersion::View1 => PhysicalType::View1,
            ViewVersion::RestView => PhysicalType::RestView,
            ViewVersion::RestView1 => PhysicalType::RestView1,
            ViewVersion::RestView2 => PhysicalType::RestView2,
        }
    }

    fn references(&self) -> Vec<Position> {
        self.structure.into_iter().chain(self.using_table).collect()
    }

    fn relocate(&self, wr: &Writer) -> Self {
        Self {
            structure: self.structure.map(|s| wr.fix(s)),
            using_table: self.using_table.map(|u| wr.fix(u)),
            ..self.clone()
        }
    }

    fn serialise(&self, wr: &mut Writer) -> Result<(), EncodingError> {
        if self.version == ViewVersion::RestView2 {
            wr.put_opt_position(self.using_table)?;
        }
        if matches!(
            self.version,
            ViewVersion::RestView1 | ViewVersion::RestView2
        ) {
            wr.put_string(&self.remote_user)?;
            wr.put_string(&self.remote_password)?;
        }
        if self.version.is_rest() {
            wr.put_opt_position(self.structure)?;
        }
        if self.version == ViewVersion::View1 {
            for _ in 0..3 {
                wr.put_string("")?;
            }
        }
        wr.put_string(&self.name)?;
        wr.put_string(&self.definition)
    }

    fn deserialise(ty: PhysicalType, rdr: &mut Reader) -> Result<Self, DecodingError> {
        let version = match ty {
            PhysicalType::View1 => ViewVersion::View1,
            PhysicalType::RestView => ViewVersion::RestView,
            PhysicalType::RestView1 => ViewVersion::RestView1,
            PhysicalType::RestView2 => ViewVersion::RestView2,
            _ => ViewVersion::View,
        };
        let mut using_table = None;
        if version == ViewVersion::RestView2 {
            using_table = rdr.get_opt_position()?;
        }
        let mut remote_user = String::new();
        let mut remote_password = String::new();
        if matches!(version, ViewVersion::RestView1 | ViewVersion::RestView2) {
            remote_user = rdr.get_string()?;
            remote_password = rdr.get_string()?;
        }
        let mut structure = None;
        if version.is_rest() {
            structure = rdr.get_opt_position()?;
        }
        if version == ViewVersion::View1 {
            for _ in 0..3 {
                rdr.get_string()?;
            }
        }
        let name = rdr.get_string()?;
        let definition = rdr.get_string()?;
        Ok(Self {
            version,
            name,
            definition,
            structure,
            remote_user,
            remote_password,
            using_table,
        })
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Default)]
pub enum ProcedureVersion {
    V1,
    /// Adds the return type.
    #[default]
    V2,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ProcedureDef {
    pub version: ProcedureVersion,
    pub name: String,
    pub arity: i32,
    pub return_type: Option<Position>,
    pub body: String,
}

impl ProcedureDef {
    /// Procedures are overloaded by arity, so this is what must be unique.
    pub fn name_and_arity(&self) -> String {
        format!("{}${}", self.name, self.arity)
    }
}

impl PhysicalRecord for ProcedureDef {
    fn physical_type(&self) -> PhysicalType {
        match self.version {
            ProcedureVersion::V1 => PhysicalType::Procedure,
            ProcedureVersion::V2 => PhysicalType::Procedure2,
        }
    }

    fn references(&self) -> Vec<Position> {
        self.return_type.into_iter().collect()
    }

    fn relocate(&self, wr: &Writer) -> Self {
        Self {
            return_type: self.return_type.map(|r| wr.fix(r)),
            ..self.clone()
        }
    }

    fn serialise(&self, wr: &mut Writer) -> Result<(), EncodingError> {
        if self.version >= ProcedureVersion::V2 {
            wr.put_opt_position(self.return_type)?;
        }
        wr.put_string(&self.name)?;
        wr.put_int(self.arity);
        wr.put_string(&self.body)
    }

    fn deserialise(ty: PhysicalType, rdr: &mut Reader) -> Result<Self, DecodingError> {
        let version = match ty {
            PhysicalType::Procedure2 => ProcedureVersion::V2,
            _ => ProcedureVersion::V1,
        };
        let return_type = if version >= ProcedureVersion::V2 {
            rdr.get_opt_position()?
        } else {
            None
        };
        let name = rdr.get_string()?;
        let arity = rdr.get_int()?;
        let body = rdr.get_string()?;
        Ok(Self {
            version,
            name,
            arity,
            return_type,
            body,
        })
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Default)]
pub enum MetadataVersion {
    V1,
    /// Adds the flags bitmask.
    V2,
    /// Adds an IRI.
    #[default]
    V3,
}

/// Descriptive metadata attached to another object.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MetadataDef {
    pub version: MetadataVersion,
    pub target: Position,
    pub name: String,
    pub description: String,
    pub flags: u64,
    pub iri: String,
}

impl PhysicalRecord for MetadataDef {
    fn physical_type(&self) -> PhysicalType {
        match self.version {
            MetadataVersion::V1 => PhysicalType::Metadata,
            MetadataVersion::V2 => PhysicalType::Metadata2,
            MetadataVersion::V3 => PhysicalType::Metadata3,
        }
    }

    fn references(&self) -> Vec<Position> {
        vec![self.target]
    }

    fn relocate(&self, wr: &Writer) -> Self {
        Self {
            target: wr.fix(self.target),
            ..self.clone()
        }
    }

    fn serialise(&self, wr: &mut Writer) -> Result<(), EncodingError> {
        if self.version >= MetadataVersion::V3 {
            wr.put_string(&self.iri)?;
        }
        if self.version >= MetadataVersion::V2 {
            wr.put_long(self.flags as i64);
        }
        wr.put_position(self.target)?;
        wr.put_string(&self.name)?;
        wr.put_string(&self.description)
    }

    fn deserialise(ty: PhysicalType, rdr: &mut Reader) -> Result<Self, DecodingError> {
        let version = match ty {
            PhysicalType::Metadata => MetadataVersion::V1,
            PhysicalType::Metadata2 => MetadataVersion::V2,
            _ => MetadataVersion::V3,
        };
        let iri = if version >= MetadataVersion::V3 {
            rdr.get_string()?
        } else {
            String::new()
        };
        let flags = if version >= MetadataVersion::V2 {
            rdr.get_long()? as u64
        } else {
            0
        };
        let target = rdr.get_position()?;
        let name = rdr.get_string()?;
        let description = rdr.get_string()?;
        Ok(Self {
            version,
            target,
            name,
            description,
            flags,
            iri,
        })
    }
}
