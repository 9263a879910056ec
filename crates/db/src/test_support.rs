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

//! Record constructors shared by the unit tests.

use quire_common::flags::{ConstraintType, Constraints, DropAction, Privilege, Privileges};
use quire_common::{Position, Value, predefined};
use quire_log::Fields;
use quire_log::physical::{
    AlterColumn, CheckDef, CheckVersion, ColumnDef, ColumnVersion, DeleteRow, DropObject,
    DropVersion, GrantDef, IndexDef, IndexVersion, InsertRow, RecordVersion, TableDef,
    TableVersion, UpdateRow, UserDef,
};

pub fn table(name: &str) -> TableDef {
    TableDef {
        version: TableVersion::V1,
        name: name.into(),
        row_iri: String::new(),
    }
}

pub fn column(table: Position, name: &str, seq: i32) -> ColumnDef {
    ColumnDef {
        version: ColumnVersion::V3,
        table,
        name: name.into(),
        seq,
        domain: predefined::INTEGER,
        default_source: String::new(),
        not_null: false,
        generation: Default::default(),
        update_source: String::new(),
    }
}

pub fn alter(column: Position, def: ColumnDef) -> AlterColumn {
    AlterColumn { column, def }
}

fn index(table: Position, columns: &[Position], flags: Constraints) -> IndexDef {
    IndexDef {
        version: IndexVersion::V2,
        name: String::new(),
        table,
        columns: columns.to_vec(),
        flags,
        reference: None,
        adapter: String::new(),
        metadata: 0,
    }
}

pub fn primary_key(table: Position, columns: &[Position]) -> IndexDef {
    index(
        table,
        columns,
        Constraints::new_with(ConstraintType::PrimaryKey),
    )
}

pub fn unique(table: Position, columns: &[Position]) -> IndexDef {
    index(
        table,
        columns,
        Constraints::new_with(ConstraintType::Unique),
    )
}

/// A foreign key from `columns` to the unique index `reference`, with extra referential flags.
pub fn foreign_key(
    table: Position,
    columns: &[Position],
    reference: Position,
    actions: Constraints,
) -> IndexDef {
    IndexDef {
        reference: Some(reference),
        ..index(
            table,
            columns,
            Constraints::new_with(ConstraintType::ForeignKey)
                .union(actions),
        )
    }
}

pub fn fields(values: &[(Position, Value)]) -> Fields {
    values.iter().cloned().collect()
}

pub fn insert(table: Position, values: &[(Position, Value)]) -> InsertRow {
    InsertRow {
        version: RecordVersion::V1,
        table,
        fields: fields(values),
        provenance: String::new(),
    }
}

pub fn update(table: Position, row: Position, values: &[(Position, Value)]) -> UpdateRow {
    UpdateRow {
        row,
        previous: row,
        table,
        fields: fields(values),
    }
}

pub fn delete(table: Position, row: Position) -> DeleteRow {
    DeleteRow { table, row }
}

pub fn drop(target: Position, action: DropAction) -> DropObject {
    DropObject {
        version: DropVersion::V1,
        target,
        action,
    }
}

pub fn user(name: &str) -> UserDef {
    UserDef { name: name.into() }
}

pub fn grant(object: Position, grantee: Option<Position>, privilege: Privilege) -> GrantDef {
    GrantDef {
        revoke: false,
        privileges: Privileges::new_with(privilege),
        object,
        grantee,
    }
}

pub fn revoke(object: Position, grantee: Option<Position>, privilege: Privilege) -> GrantDef {
    GrantDef {
        revoke: true,
        ..grant(object, grantee, privilege)
    }
}

pub fn check(owner: Position, sub_object: Option<Position>, name: &str, source: &str) -> CheckDef {
    CheckDef {
        version: if sub_object.is_some() {
            CheckVersion::V2
        } else {
            CheckVersion::V1
        },
        owner,
        sub_object,
        name: name.into(),
        source: source.into(),
    }
}
