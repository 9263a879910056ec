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

//! The physical records making up the log.
//!
//! Each logical kind of change is one struct. Kinds whose encoding has grown over time carry a
//! version enum; every version has its own tag, and the struct writes the fields added by newer
//! versions first, then its original fields. The common trailer (the offset of the enclosing
//! transaction header) comes last.

mod auth;
mod rows;
mod schema;
mod transaction;

pub use auth::{GrantDef, ModifyDef, UserDef};
pub use rows::{DeleteRow, InsertRow, RecordVersion, UpdateRow};
pub use schema::{
    AlterColumn, CheckDef, CheckVersion, ColumnDef, ColumnVersion, DomainDef, DomainKind,
    DomainVersion, DropObject, DropVersion, Generation, GraphKind, IndexDef, IndexVersion,
    MetadataDef, MetadataVersion, ProcedureDef, ProcedureVersion, RefActionDef, RenameDef,
    RoleDef, RoleVersion, TableDef, TableVersion, TriggerDef, ViewDef, ViewVersion,
};
pub use transaction::TransactionHeader;

use crate::codec::{Reader, Writer};
use crate::error::{DecodingError, EncodingError};
use enum_primitive_derive::Primitive;
use num_traits::FromPrimitive;
use quire_common::Position;
use std::fmt::{Display, Formatter};
use strum::Display as StrumDisplay;

/// Record type tags as persisted. Values are never reused or renumbered; gaps are tags this
/// engine does not write.
///
/// Tag 0 is reserved for the end-of-file marker: a checksum trailer that older log files carry
/// and the next transaction overwrites. Every log written here ends at its last transaction, so
/// a 0 tag reads as an unknown record like any other gap.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Primitive, StrumDisplay)]
#[repr(u8)]
pub enum PhysicalType {
    Table = 1,
    Role = 2,
    Column = 3,
    Record = 4,
    Update = 5,
    Change = 6,
    Alter = 7,
    Drop = 8,
    Delete = 10,
    Index = 12,
    Modify = 13,
    Domain = 14,
    Check = 15,
    Procedure = 16,
    Trigger = 17,
    View = 18,
    User = 19,
    Transaction = 20,
    Grant = 21,
    Revoke = 22,
    Role1 = 23,
    Column2 = 24,
    Type = 25,
    Table1 = 32,
    Alter2 = 33,
    Column3 = 35,
    Alter3 = 36,
    View1 = 37,
    Metadata = 38,
    Check2 = 41,
    Metadata2 = 45,
    Index2 = 46,
    RestView = 49,
    RestView1 = 51,
    Metadata3 = 52,
    RestView2 = 53,
    Drop1 = 61,
    RefAction = 62,
    Index1 = 64,
    Domain1 = 65,
    Procedure2 = 66,
    Record1 = 67,
}

/// Behaviour every record kind provides.
pub trait PhysicalRecord: Sized {
    fn physical_type(&self) -> PhysicalType;

    /// Every position this record mentions, in field order. A record may only be written once
    /// all of them are committed.
    fn references(&self) -> Vec<Position>;

    /// A copy with every reference passed through [`Writer::fix`].
    fn relocate(&self, wr: &Writer) -> Self;

    fn serialise(&self, wr: &mut Writer) -> Result<(), EncodingError>;

    fn deserialise(ty: PhysicalType, rdr: &mut Reader) -> Result<Self, DecodingError>;
}

macro_rules! physical_kinds {
    ($($variant:ident($ty:ty) => [$($tag:ident),+]),+ $(,)?) => {
        /// The payload of a record: one variant per kind.
        #[derive(Debug, Clone, Eq, PartialEq)]
        pub enum Body {
            $($variant($ty)),+
        }

        impl Body {
            pub fn physical_type(&self) -> PhysicalType {
                match self {
                    $(Body::$variant(r) => r.physical_type()),+
                }
            }

            pub fn references(&self) -> Vec<Position> {
                match self {
                    $(Body::$variant(r) => r.references()),+
                }
            }

            pub fn relocate(&self, wr: &Writer) -> Body {
                match self {
                    $(Body::$variant(r) => Body::$variant(r.relocate(wr))),+
                }
            }

            fn serialise(&self, wr: &mut Writer) -> Result<(), EncodingError> {
                match self {
                    $(Body::$variant(r) => r.serialise(wr)),+
                }
            }

            fn deserialise(ty: PhysicalType, rdr: &mut Reader) -> Result<Body, DecodingError> {
                match ty {
                    $($(PhysicalType::$tag)|+ => Ok(Body::$variant(<$ty>::deserialise(ty, rdr)?))),+
                }
            }
        }

        $(
            impl From<$ty> for Body {
                fn from(r: $ty) -> Self {
                    Body::$variant(r)
                }
            }
        )+
    };
}

physical_kinds! {
    Table(TableDef) => [Table, Table1],
    Role(RoleDef) => [Role, Role1],
    Column(ColumnDef) => [Column, Column2, Column3],
    Alter(AlterColumn) => [Alter, Alter2, Alter3],
    Insert(InsertRow) => [Record, Record1],
    Update(UpdateRow) => [Update],
    Delete(DeleteRow) => [Delete],
    Drop(DropObject) => [Drop, Drop1],
    Rename(RenameDef) => [Change],
    Index(IndexDef) => [Index, Index1, Index2],
    RefAction(RefActionDef) => [RefAction],
    Domain(DomainDef) => [Domain, Domain1, Type],
    Check(CheckDef) => [Check, Check2],
    Trigger(TriggerDef) => [Trigger],
    View(ViewDef) => [View, View1, RestView, RestView1, RestView2],
    Procedure(ProcedureDef) => [Procedure, Procedure2],
    User(UserDef) => [User],
    Grant(GrantDef) => [Grant, Revoke],
    Modify(ModifyDef) => [Modify],
    Metadata(MetadataDef) => [Metadata, Metadata2, Metadata3],
    Transaction(TransactionHeader) => [Transaction],
}

/// A record together with its identity in the log.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Physical {
    /// Where the record starts in the log, or its transaction-local handle before commit.
    pub ppos: Position,
    /// The transaction header this record was committed under. `None` while pending.
    pub trans: Option<Position>,
    pub body: Body,
}

impl Physical {
    pub fn pending(ppos: Position, body: impl Into<Body>) -> Self {
        Self {
            ppos,
            trans: None,
            body: body.into(),
        }
    }

    pub fn physical_type(&self) -> PhysicalType {
        self.body.physical_type()
    }

    pub fn references(&self) -> Vec<Position> {
        self.body.references()
    }

    /// The first reference not yet committed in `wr`.
    pub fn dependent(&self, wr: &Writer) -> Option<Position> {
        wr.dependent(&self.references())
    }

    /// Relocate and append this record to `wr`, returning the committed copy.
    pub fn write(&self, wr: &mut Writer) -> Result<Physical, EncodingError> {
        let ppos = wr.begin_record(self.ppos);
        let body = self.body.relocate(wr);
        wr.put_u8(body.physical_type() as u8);
        body.serialise(wr)?;
        let trans = Position::Committed(wr.segment());
        wr.put_position(trans)?;
        Ok(Physical {
            ppos,
            trans: Some(trans),
            body,
        })
    }

    /// Read the record starting at the reader's current position.
    pub fn read(rdr: &mut Reader) -> Result<Physical, DecodingError> {
        let at = rdr.position();
        let tag = rdr.get_u8()?;
        let Some(ty) = PhysicalType::from_u8(tag) else {
            return Err(DecodingError::UnknownType { offset: at, tag });
        };
        let body = Body::deserialise(ty, rdr)?;
        let trans = rdr.get_position()?;
        if ty == PhysicalType::Transaction {
            rdr.set_segment(Position::Committed(at));
        }
        Ok(Physical {
            ppos: Position::Committed(at),
            trans: Some(trans),
            body,
        })
    }
}

impl Display for Physical {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ", self.ppos, self.physical_type())?;
        match &self.body {
            Body::Table(t) => write!(f, "{}", t.name),
            Body::Role(r) => write!(f, "{}", r.name),
            Body::Column(c) => write!(
                f,
                "{} for {}(seq {}) domain {}",
                c.name, c.table, c.seq, c.domain
            ),
            Body::Alter(a) => write!(f, "{} to {} for {}", a.column, a.def.name, a.def.table),
            Body::Insert(r) => write!(f, "into {} {}", r.table, fields_display(&r.fields)),
            Body::Update(u) => write!(
                f,
                "{} of {} prev {} {}",
                u.row,
                u.table,
                u.previous,
                fields_display(&u.fields)
            ),
            Body::Delete(d) => write!(f, "{} from {}", d.row, d.table),
            Body::Drop(d) => write!(f, "{} {}", d.target, d.action),
            Body::Rename(r) => write!(f, "{} to {}", r.target, r.name),
            Body::Index(i) => write!(
                f,
                "{} on {}({}) {:?}",
                i.name,
                i.table,
                i.columns
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join(","),
                i.flags
            ),
            Body::RefAction(r) => write!(f, "{} {:?}", r.index, r.flags),
            Body::Domain(d) => write!(f, "{} {:?}", d.name, d.kind),
            Body::Check(c) => write!(f, "{} on {} [{}]", c.name, c.owner, c.source),
            Body::Trigger(t) => write!(f, "{} on {} {:?}", t.name, t.table, t.flags),
            Body::View(v) => write!(f, "{} as {}", v.name, v.definition),
            Body::Procedure(p) => write!(f, "{}${}", p.name, p.arity),
            Body::User(u) => write!(f, "{}", u.name),
            Body::Grant(g) => match g.grantee {
                Some(grantee) => write!(f, "{:?} on {} to {}", g.privileges, g.object, grantee),
                None => write!(f, "{:?} on {} to PUBLIC", g.privileges, g.object),
            },
            Body::Modify(m) => write!(f, "{} {}", m.target, m.name),
            Body::Metadata(m) => write!(f, "{} {} {}", m.target, m.name, m.description),
            Body::Transaction(t) => write!(f, "{} records at {}", t.count, t.time),
        }
    }
}

fn fields_display(fields: &crate::codec::Fields) -> String {
    let parts: Vec<_> = fields.iter().map(|(c, v)| format!("{c}={v}")).collect();
    format!("({})", parts.join(","))
}
