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

//! In-memory objects projected from the log. All cross references are positions into the
//! owning snapshot's object map.

use imbl::{OrdMap, OrdSet, Vector};
use quire_common::flags::{Constraints, Privileges, TriggerTypes};
use quire_common::{Position, Value};
use quire_log::Fields;
use quire_log::physical::{DomainKind, Generation, GraphKind, ViewVersion};

/// An index key: the values of the key columns, in key order.
pub type Key = Vec<Value>;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TableRow {
    pub defpos: Position,
    /// The most recent record which inserted or updated this row.
    pub previous: Position,
    pub fields: Fields,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Table {
    pub defpos: Position,
    pub name: String,
    pub row_iri: String,
    /// Column positions in sequence order.
    pub columns: Vector<Position>,
    pub rows: OrdMap<Position, TableRow>,
    pub indexes: OrdSet<Position>,
    pub checks: OrdSet<Position>,
    pub triggers: OrdSet<Position>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TableColumn {
    pub defpos: Position,
    pub table: Position,
    pub name: String,
    pub seq: i32,
    pub domain: Position,
    pub default: Value,
    pub default_source: String,
    pub not_null: bool,
    pub generation: Generation,
    pub update_source: String,
    pub checks: OrdSet<Position>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Index {
    pub defpos: Position,
    pub name: String,
    pub table: Position,
    pub keys: Vec<Position>,
    pub flags: Constraints,
    pub reference: Option<Position>,
    pub adapter: String,
    pub metadata: u64,
    pub entries: OrdMap<Key, OrdSet<Position>>,
    /// Foreign keys referring to this index.
    pub dependents: OrdSet<Position>,
}

impl Index {
    /// The key of a row, or `None` if any key column is null or absent. Such rows are not
    /// entered in the index.
    pub fn key_of(&self, fields: &Fields) -> Option<Key> {
        self.keys
            .iter()
            .map(|c| match fields.get(c) {
                Some(v) if !v.is_null() => Some(v.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn rows_for(&self, key: &Key) -> Vec<Position> {
        self.entries
            .get(key)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    pub(crate) fn with_entry(&self, key: Key, row: Position) -> Self {
        let rows = self
            .entries
            .get(&key)
            .cloned()
            .unwrap_or_default()
            .update(row);
        Self {
            entries: self.entries.update(key, rows),
            ..self.clone()
        }
    }

    pub(crate) fn without_entry(&self, key: &Key, row: Position) -> Self {
        let Some(rows) = self.entries.get(key) else {
            return self.clone();
        };
        let rows = rows.without(&row);
        let entries = if rows.is_empty() {
            self.entries.without(key)
        } else {
            self.entries.update(key.clone(), rows)
        };
        Self {
            entries,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Role {
    pub defpos: Position,
    pub name: String,
    pub details: String,
    /// Names of the objects defined under this role.
    pub names: OrdMap<String, Position>,
    pub privileges: OrdMap<Position, Privileges>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct User {
    pub defpos: Position,
    pub name: String,
    pub privileges: OrdMap<Position, Privileges>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Domain {
    pub defpos: Position,
    pub name: String,
    pub kind: DomainKind,
    pub precision: i32,
    pub scale: i32,
    pub charset: i32,
    pub culture: String,
    pub default_source: String,
    pub element: Option<Position>,
    pub supertypes: Vec<Position>,
    pub graph: GraphKind,
    pub checks: OrdSet<Position>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Procedure {
    pub defpos: Position,
    pub name: String,
    pub arity: i32,
    pub return_type: Option<Position>,
    pub body: String,
}

impl Procedure {
    pub fn name_and_arity(&self) -> String {
        format!("{}${}", self.name, self.arity)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Trigger {
    pub defpos: Position,
    pub name: String,
    pub table: Position,
    pub flags: TriggerTypes,
    pub columns: Vec<Position>,
    pub old_row: String,
    pub new_row: String,
    pub old_table: String,
    pub new_table: String,
    pub source: String,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct View {
    pub defpos: Position,
    pub version: ViewVersion,
    pub name: String,
    pub definition: String,
    pub structure: Option<Position>,
    pub remote_user: String,
    pub remote_password: String,
    pub using_table: Option<Position>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Check {
    pub defpos: Position,
    pub name: String,
    pub owner: Position,
    pub sub_object: Option<Position>,
    pub source: String,
}

impl Check {
    /// The object whose values this check constrains: the sub-object if there is one.
    pub fn subject(&self) -> Position {
        self.sub_object.unwrap_or(self.owner)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ObjectMetadata {
    pub defpos: Position,
    pub name: String,
    pub description: String,
    pub flags: u64,
    pub iri: String,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum DbObject {
    Table(Table),
    Column(TableColumn),
    Index(Index),
    Role(Role),
    User(User),
    Domain(Domain),
    Procedure(Procedure),
    Trigger(Trigger),
    View(View),
    Check(Check),
}

impl DbObject {
    pub fn name(&self) -> &str {
        match self {
            DbObject::Table(t) => &t.name,
            DbObject::Column(c) => &c.name,
            DbObject::Index(i) => &i.name,
            DbObject::Role(r) => &r.name,
            DbObject::User(u) => &u.name,
            DbObject::Domain(d) => &d.name,
            DbObject::Procedure(p) => &p.name,
            DbObject::Trigger(t) => &t.name,
            DbObject::View(v) => &v.name,
            DbObject::Check(c) => &c.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DbObject::Table(_) => "table",
            DbObject::Column(_) => "column",
            DbObject::Index(_) => "index",
            DbObject::Role(_) => "role",
            DbObject::User(_) => "user",
            DbObject::Domain(_) => "domain",
            DbObject::Procedure(_) => "procedure",
            DbObject::Trigger(_) => "trigger",
            DbObject::View(_) => "view",
            DbObject::Check(_) => "check",
        }
    }
}

/// Interpret the literal forms a default clause may take. Anything else is kept as text.
pub fn parse_literal(source: &str) -> Value {
    let s = source.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if s.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if s.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(i) = s.parse::<i64>() {
        return Value::Int(i);
    }
    if s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'') {
        return Value::Text(s[1..s.len() - 1].replace("''", "'"));
    }
    Value::Text(s.to_string())
}
