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

//! An immutable snapshot of the database: one flat map from defining position to object.
//!
//! Snapshots are cheap to clone; every change produces a new one sharing structure with the old.
//! Nothing ever holds a reference into another object, only its position.

use crate::objects::{
    Check, DbObject, Domain, Index, ObjectMetadata, Procedure, Role, Table, TableColumn, TableRow,
    Trigger, User, View,
};
use imbl::{OrdMap, OrdSet};
use quire_common::flags::Privileges;
use quire_common::{HEADER_LEN, Position, predefined};
use quire_log::physical::{DomainKind, GraphKind};

/// Who committed the most recent transaction, and when.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CommitInfo {
    pub position: Position,
    pub user: Option<Position>,
    pub role: Option<Position>,
    /// Microseconds since the Unix epoch.
    pub time: i64,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Database {
    pub(crate) objects: OrdMap<Position, DbObject>,
    /// Keyed by the object described.
    pub(crate) metadata: OrdMap<Position, ObjectMetadata>,
    pub(crate) roles_by_name: OrdMap<String, Position>,
    pub(crate) users_by_name: OrdMap<String, Position>,
    pub(crate) owner: Option<Position>,
    pub(crate) last_commit: Option<CommitInfo>,
    pub(crate) log_end: u64,
    pub(crate) version: u64,
}

const STANDARD_DOMAINS: [(Position, &str, DomainKind); 5] = [
    (predefined::INTEGER, "INTEGER", DomainKind::Integer),
    (predefined::CHAR, "CHAR", DomainKind::Char),
    (predefined::BOOLEAN, "BOOLEAN", DomainKind::Boolean),
    (predefined::NUMERIC, "NUMERIC", DomainKind::Numeric),
    (predefined::BLOB, "BLOB", DomainKind::Blob),
];

impl Database {
    /// A database holding only the predefined objects, with nothing yet read from the log.
    pub fn new() -> Self {
        let mut objects = OrdMap::new();
        let mut names = OrdMap::new();
        for (defpos, name, kind) in STANDARD_DOMAINS {
            objects.insert(
                defpos,
                DbObject::Domain(Domain {
                    defpos,
                    name: name.to_string(),
                    kind,
                    precision: 0,
                    scale: 0,
                    charset: 0,
                    culture: String::new(),
                    default_source: String::new(),
                    element: None,
                    supertypes: vec![],
                    graph: GraphKind::Plain,
                    checks: OrdSet::new(),
                }),
            );
            names.insert(name.to_string(), defpos);
        }
        let schema = Role {
            defpos: predefined::SCHEMA_ROLE,
            name: "Schema".to_string(),
            details: String::new(),
            names,
            privileges: OrdMap::new(),
        };
        let public = Role {
            defpos: predefined::PUBLIC,
            name: "PUBLIC".to_string(),
            details: String::new(),
            names: OrdMap::new(),
            privileges: OrdMap::new(),
        };
        let mut roles_by_name = OrdMap::new();
        roles_by_name.insert(schema.name.clone(), schema.defpos);
        roles_by_name.insert(public.name.clone(), public.defpos);
        objects.insert(schema.defpos, DbObject::Role(schema));
        objects.insert(public.defpos, DbObject::Role(public));
        Self {
            objects,
            metadata: OrdMap::new(),
            roles_by_name,
            users_by_name: OrdMap::new(),
            owner: None,
            last_commit: None,
            log_end: HEADER_LEN,
            version: 0,
        }
    }

    /// Offset one past the last record this snapshot reflects.
    pub fn log_end(&self) -> u64 {
        self.log_end
    }

    /// Number of write transactions folded into this snapshot since the engine opened.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn owner(&self) -> Option<Position> {
        self.owner
    }

    pub fn last_commit(&self) -> Option<&CommitInfo> {
        self.last_commit.as_ref()
    }

    pub fn get(&self, defpos: Position) -> Option<&DbObject> {
        self.objects.get(&defpos)
    }

    pub fn contains(&self, defpos: Position) -> bool {
        self.objects.contains_key(&defpos)
    }

    pub fn objects(&self) -> impl Iterator<Item = (&Position, &DbObject)> {
        self.objects.iter()
    }

    pub fn table(&self, defpos: Position) -> Option<&Table> {
        match self.objects.get(&defpos) {
            Some(DbObject::Table(t)) => Some(t),
            _ => None,
        }
    }

    pub fn column(&self, defpos: Position) -> Option<&TableColumn> {
        match self.objects.get(&defpos) {
            Some(DbObject::Column(c)) => Some(c),
            _ => None,
        }
    }

    pub fn index(&self, defpos: Position) -> Option<&Index> {
        match self.objects.get(&defpos) {
            Some(DbObject::Index(i)) => Some(i),
            _ => None,
        }
    }

    pub fn role(&self, defpos: Position) -> Option<&Role> {
        match self.objects.get(&defpos) {
            Some(DbObject::Role(r)) => Some(r),
            _ => None,
        }
    }

    pub fn user(&self, defpos: Position) -> Option<&User> {
        match self.objects.get(&defpos) {
            Some(DbObject::User(u)) => Some(u),
            _ => None,
        }
    }

    pub fn domain(&self, defpos: Position) -> Option<&Domain> {
        match self.objects.get(&defpos) {
            Some(DbObject::Domain(d)) => Some(d),
            _ => None,
        }
    }

    pub fn procedure(&self, defpos: Position) -> Option<&Procedure> {
        match self.objects.get(&defpos) {
            Some(DbObject::Procedure(p)) => Some(p),
            _ => None,
        }
    }

    pub fn trigger(&self, defpos: Position) -> Option<&Trigger> {
        match self.objects.get(&defpos) {
            Some(DbObject::Trigger(t)) => Some(t),
            _ => None,
        }
    }

    pub fn view(&self, defpos: Position) -> Option<&View> {
        match self.objects.get(&defpos) {
            Some(DbObject::View(v)) => Some(v),
            _ => None,
        }
    }

    pub fn check(&self, defpos: Position) -> Option<&Check> {
        match self.objects.get(&defpos) {
            Some(DbObject::Check(c)) => Some(c),
            _ => None,
        }
    }

    pub fn metadata(&self, target: Position) -> Option<&ObjectMetadata> {
        self.metadata.get(&target)
    }

    /// Resolve a name defined under `role`.
    pub fn lookup(&self, role: Position, name: &str) -> Option<Position> {
        self.role(role).and_then(|r| r.names.get(name).copied())
    }

    pub fn table_by_name(&self, name: &str) -> Option<&Table> {
        self.lookup(predefined::SCHEMA_ROLE, name)
            .and_then(|p| self.table(p))
    }

    pub fn column_by_name(&self, table: Position, name: &str) -> Option<&TableColumn> {
        self.table(table)?
            .columns
            .iter()
            .filter_map(|c| self.column(*c))
            .find(|c| c.name == name)
    }

    pub fn role_by_name(&self, name: &str) -> Option<&Role> {
        self.roles_by_name.get(name).and_then(|p| self.role(*p))
    }

    pub fn user_by_name(&self, name: &str) -> Option<&User> {
        self.users_by_name.get(name).and_then(|p| self.user(*p))
    }

    pub fn row(&self, table: Position, row: Position) -> Option<&TableRow> {
        self.table(table)?.rows.get(&row)
    }

    pub fn row_count(&self, table: Position) -> usize {
        self.table(table).map(|t| t.rows.len()).unwrap_or(0)
    }

    /// The privileges `grantee` holds on `object`. `None` asks about PUBLIC.
    pub fn privileges(&self, grantee: Option<Position>, object: Position) -> Privileges {
        let held = match grantee {
            None => self.role(predefined::PUBLIC).map(|r| &r.privileges),
            Some(g) => match self.objects.get(&g) {
                Some(DbObject::Role(r)) => Some(&r.privileges),
                Some(DbObject::User(u)) => Some(&u.privileges),
                _ => None,
            },
        };
        held.and_then(|m| m.get(&object).copied())
            .unwrap_or_default()
    }

    /// Objects which would be left dangling if `target` went away, excluding those it owns
    /// outright (see [`Database::owned`]).
    pub fn dependents(&self, target: Position) -> Vec<Position> {
        let owned = self.owned(target);
        let mut deps = OrdSet::new();
        for (defpos, obj) in self.objects.iter() {
            if *defpos == target || owned.contains(defpos) {
                continue;
            }
            let depends = match obj {
                DbObject::Column(c) => c.domain == target,
                DbObject::Index(i) => {
                    i.reference
                        .is_some_and(|r| r == target || owned.contains(&r))
                        || i.keys.contains(&target)
                }
                DbObject::Domain(d) => d.element == Some(target) || d.supertypes.contains(&target),
                DbObject::View(v) => v.structure == Some(target) || v.using_table == Some(target),
                DbObject::Check(c) => c.sub_object == Some(target),
                DbObject::Trigger(t) => t.columns.contains(&target),
                DbObject::Procedure(p) => p.return_type == Some(target),
                _ => false,
            };
            if depends {
                deps.insert(*defpos);
            }
        }
        deps.into_iter().collect()
    }

    /// Objects which only exist as parts of `target` and go with it unconditionally.
    pub fn owned(&self, target: Position) -> OrdSet<Position> {
        let mut owned = OrdSet::new();
        match self.objects.get(&target) {
            Some(DbObject::Table(t)) => {
                owned.extend(t.columns.iter().copied());
                owned.extend(t.indexes.iter().copied());
                owned.extend(t.triggers.iter().copied());
                owned.extend(t.checks.iter().copied());
            }
            Some(DbObject::Column(c)) => owned.extend(c.checks.iter().copied()),
            Some(DbObject::Domain(d)) => owned.extend(d.checks.iter().copied()),
            _ => {}
        }
        owned
    }

    pub(crate) fn put(&mut self, obj: DbObject) {
        let defpos = match &obj {
            DbObject::Table(t) => t.defpos,
            DbObject::Column(c) => c.defpos,
            DbObject::Index(i) => i.defpos,
            DbObject::Role(r) => r.defpos,
            DbObject::User(u) => u.defpos,
            DbObject::Domain(d) => d.defpos,
            DbObject::Procedure(p) => p.defpos,
            DbObject::Trigger(t) => t.defpos,
            DbObject::View(v) => v.defpos,
            DbObject::Check(c) => c.defpos,
        };
        self.objects.insert(defpos, obj);
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predefined_objects() {
        let db = Database::new();
        assert_eq!(db.log_end(), HEADER_LEN);
        assert_eq!(
            db.role_by_name("PUBLIC").map(|r| r.defpos),
            Some(predefined::PUBLIC)
        );
        assert_eq!(
            db.lookup(predefined::SCHEMA_ROLE, "INTEGER"),
            Some(predefined::INTEGER)
        );
        assert_eq!(
            db.domain(predefined::BLOB).map(|d| d.kind),
            Some(DomainKind::Blob)
        );
        assert!(db.privileges(None, predefined::INTEGER).is_empty());
        assert!(db.table_by_name("INTEGER").is_none());
    }

    #[test]
    fn test_clone_is_independent() {
        let a = Database::new();
        let mut b = a.clone();
        b.owner = Some(Position::Committed(100));
        assert_ne!(a, b);
        assert_eq!(a, Database::new());
    }
}
