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

//! Write-write conflict detection between a pending record and one committed since the pending
//! record's transaction took its snapshot.
//!
//! The check is one-directional: it answers "does `committed` invalidate `pending`". Granularity
//! is deliberately coarse (any column change on a table conflicts with any row change on it).

use crate::database::Database;
use crate::error::{Conflict, ConflictReason};
use quire_common::Position;
use quire_log::{Body, Physical, PhysicalRecord};

/// `db` is the pending transaction's working snapshot, used to resolve what the records refer to.
pub fn conflicts(db: &Database, pending: &Physical, committed: &Physical) -> Result<(), Conflict> {
    match conflict_reason(db, &pending.body, &committed.body) {
        None => Ok(()),
        Some(reason) => Err(Conflict {
            reason,
            pending: pending.ppos,
            committed: committed.ppos,
        }),
    }
}

fn conflict_reason(db: &Database, pending: &Body, committed: &Body) -> Option<ConflictReason> {
    use ConflictReason::*;

    match (pending, committed) {
        (_, Body::Transaction(_)) | (Body::Transaction(_), _) => return None,
        (_, Body::Drop(d)) if pending.references().contains(&d.target) => {
            return Some(ObjectDropped);
        }
        (Body::Drop(d), _) if committed.references().contains(&d.target) => {
            return Some(Generic);
        }
        _ => {}
    }

    match (pending, committed) {
        (Body::Table(t), Body::Table(o)) if o.name == t.name => Some(NameInUse),
        (Body::Table(t), Body::View(o)) if o.name == t.name => Some(NameInUse),
        (Body::Table(t), Body::Domain(o)) if o.name == t.name => Some(NameInUse),
        (Body::Table(t), Body::Rename(o)) if o.name == t.name => Some(NameInUse),

        (Body::Role(r), Body::Role(o)) if o.name == r.name => Some(NameInUse),

        (Body::User(u), Body::User(o)) if o.name == u.name => Some(NameInUse),

        (Body::Domain(d), Body::Domain(o)) if o.name == d.name => Some(NameInUse),
        (Body::Domain(d), Body::Table(o)) if o.name == d.name => Some(NameInUse),
        (Body::Domain(d), Body::View(o)) if o.name == d.name => Some(NameInUse),
        (Body::Domain(d), Body::Role(o)) if o.name == d.name => Some(NameInUse),
        (Body::Domain(d), Body::Rename(o)) if d.references().contains(&o.target) => Some(Generic),

        (Body::Column(c), Body::Column(o)) if o.table == c.table => Some(TableAltered),
        (Body::Column(c), Body::Alter(o)) if o.def.table == c.table && o.def.name == c.name => {
            Some(NameInUse)
        }

        (Body::Alter(a), Body::Alter(o))
            if o.column == a.column || (o.def.table == a.def.table && o.def.name == a.def.name) =>
        {
            Some(TableAltered)
        }
        (Body::Alter(a), Body::Column(o)) if o.table == a.def.table && o.name == a.def.name => {
            Some(NameInUse)
        }
        (Body::Alter(a), Body::Insert(o))
            if o.table == a.def.table && o.fields.contains_key(&a.column) =>
        {
            Some(TableAltered)
        }
        (Body::Alter(a), Body::Update(o))
            if o.table == a.def.table && o.fields.contains_key(&a.column) =>
        {
            Some(TableAltered)
        }
        (Body::Alter(a), Body::Index(o))
            if o.table == a.def.table && o.columns.contains(&a.column) =>
        {
            Some(TableAltered)
        }
        (Body::Alter(a), Body::Grant(o)) if o.object == a.def.table || o.object == a.column => {
            Some(Generic)
        }
        (Body::Alter(a), Body::Check(o))
            if o.owner == a.def.table || o.owner == a.column || o.sub_object == Some(a.column) =>
        {
            Some(TableAltered)
        }

        (Body::Insert(r), Body::Column(o)) if o.table == r.table => Some(TableAltered),
        (Body::Insert(r), Body::Alter(o)) if o.def.table == r.table => Some(TableAltered),

        (Body::Update(u), Body::Delete(o)) if o.row == u.row => Some(RowDeleted),
        (Body::Update(u), Body::Update(o)) if o.row == u.row => Some(RowUpdated),
        (Body::Update(u), Body::Column(o)) if o.table == u.table => Some(TableAltered),
        (Body::Update(u), Body::Alter(o)) if o.def.table == u.table => Some(TableAltered),

        (Body::Delete(d), Body::Delete(o)) if o.row == d.row => Some(RowDeleted),
        (Body::Delete(d), Body::Update(o)) if o.row == d.row => Some(RowUpdated),

        (Body::Index(i), Body::Alter(o)) if o.def.table == i.table => Some(TableAltered),
        (Body::Index(i), Body::Index(o)) if o.table == i.table => Some(TableAltered),

        (Body::RefAction(r), Body::RefAction(o)) if o.index == r.index => Some(Generic),
        (Body::RefAction(r), Body::Delete(o)) if index_table(db, r.index) == Some(o.table) => {
            Some(Generic)
        }
        (Body::RefAction(r), Body::Update(o)) if index_table(db, r.index) == Some(o.table) => {
            Some(Generic)
        }

        (Body::Grant(g), Body::Grant(o)) if o.object == g.object && o.grantee == g.grantee => {
            Some(Generic)
        }
        (Body::Grant(g), Body::Alter(o)) if o.column == g.object || o.def.table == g.object => {
            Some(Generic)
        }
        (Body::Grant(g), Body::Rename(o)) if o.target == g.object => Some(Generic),
        // A Modify names a target object, yet this also compares it with the grantee.
        (Body::Grant(g), Body::Modify(o))
            if o.target == g.object || Some(o.target) == g.grantee =>
        {
            Some(Generic)
        }

        (Body::Modify(m), Body::Grant(o))
            if o.object == m.target || o.grantee == Some(m.target) =>
        {
            Some(Generic)
        }
        (Body::Modify(m), Body::Modify(o)) if o.name == m.name || o.target == m.target => {
            Some(NameInUse)
        }

        (Body::Check(c), Body::Check(o)) if !c.name.is_empty() && o.name == c.name => {
            Some(NameInUse)
        }
        (Body::Check(c), Body::Alter(o)) if o.column == c.owner || o.def.table == c.owner => {
            Some(TableAltered)
        }
        (Body::Check(c), Body::Alter(o)) if c.sub_object == Some(o.column) => Some(TableAltered),
        (Body::Check(c), Body::Rename(o)) if o.target == c.owner => Some(Generic),

        (Body::Trigger(t), Body::Trigger(o)) if o.table == t.table => Some(TableAltered),
        (Body::Trigger(t), Body::Rename(o)) if o.target == t.table => Some(Generic),

        (Body::View(v), Body::Table(o)) if o.name == v.name => Some(NameInUse),
        (Body::View(v), Body::View(o)) if o.name == v.name => Some(NameInUse),

        (Body::Procedure(p), Body::Procedure(o)) if o.name_and_arity() == p.name_and_arity() => {
            Some(NameInUse)
        }
        (Body::Procedure(p), Body::Rename(o)) if o.name == p.name => Some(NameInUse),

        (Body::Metadata(m), Body::Metadata(o))
            if o.target == m.target || (!m.name.is_empty() && o.name == m.name) =>
        {
            Some(Generic)
        }

        (Body::Drop(d), Body::Drop(o)) if o.target == d.target => Some(ObjectDropped),

        (Body::Rename(r), Body::Rename(o)) if o.target == r.target || o.name == r.name => {
            Some(NameInUse)
        }

        _ => None,
    }
}

fn index_table(db: &Database, index: Position) -> Option<Position> {
    db.index(index).map(|i| i.table)
}
