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

//! Folding records into snapshots.
//!
//! [`install`] never touches the snapshot it is given: it works on a clone and either returns the
//! whole result or an error, so a failed record leaves nothing behind.

mod drop;
mod rows;
mod schema;

use crate::checks::CheckEvaluator;
use crate::database::{CommitInfo, Database};
use crate::error::ConstraintError;
use crate::objects::{DbObject, Index, ObjectMetadata, Role, Table, TableColumn, User};
use imbl::OrdMap;
use quire_common::flags::Privileges;
use quire_common::{Position, predefined};
use quire_log::physical::{GrantDef, MetadataDef, RoleDef, TransactionHeader, UserDef};
use quire_log::{Body, Physical};

/// Apply `record` on top of `db`, defining any new names under `role`.
pub fn install(
    db: &Database,
    role: Position,
    record: &Physical,
    checks: &dyn CheckEvaluator,
) -> Result<Database, ConstraintError> {
    let mut installer = Installer {
        db: db.clone(),
        role,
        ppos: record.ppos,
        checks,
    };
    installer.apply(&record.body)?;
    Ok(installer.db)
}

pub(crate) struct Installer<'a> {
    db: Database,
    role: Position,
    /// The record being installed. New objects are defined at this position.
    ppos: Position,
    checks: &'a dyn CheckEvaluator,
}

impl Installer<'_> {
    fn apply(&mut self, body: &Body) -> Result<(), ConstraintError> {
        match body {
            Body::Table(t) => self.install_table(t),
            Body::Role(r) => self.install_role(r),
            Body::Column(c) => self.install_column(c),
            Body::Alter(a) => self.install_alter(a),
            Body::Insert(r) => self.install_insert(r),
            Body::Update(u) => self.install_update(u),
            Body::Delete(d) => self.install_delete(d),
            Body::Drop(d) => self.install_drop(d),
            Body::Rename(r) => self.install_rename(r),
            Body::Index(i) => self.install_index(i),
            Body::RefAction(r) => self.install_ref_action(r),
            Body::Domain(d) => self.install_domain(d),
            Body::Check(c) => self.install_check(c),
            Body::Trigger(t) => self.install_trigger(t),
            Body::View(v) => self.install_view(v),
            Body::Procedure(p) => self.install_procedure(p),
            Body::User(u) => self.install_user(u),
            Body::Grant(g) => self.install_grant(g),
            Body::Modify(m) => self.install_modify(m),
            Body::Metadata(m) => self.install_metadata(m),
            Body::Transaction(t) => {
                self.install_transaction(t);
                Ok(())
            }
        }
    }

    fn unknown(&self, target: Position) -> ConstraintError {
        ConstraintError::UnknownObject {
            record: self.ppos,
            target,
        }
    }

    fn require(&self, target: Position) -> Result<&DbObject, ConstraintError> {
        self.db.get(target).ok_or_else(|| self.unknown(target))
    }

    fn table(&self, defpos: Position) -> Result<Table, ConstraintError> {
        self.db
            .table(defpos)
            .cloned()
            .ok_or_else(|| self.unknown(defpos))
    }

    fn column(&self, defpos: Position) -> Result<TableColumn, ConstraintError> {
        self.db
            .column(defpos)
            .cloned()
            .ok_or_else(|| self.unknown(defpos))
    }

    fn index(&self, defpos: Position) -> Result<Index, ConstraintError> {
        self.db
            .index(defpos)
            .cloned()
            .ok_or_else(|| self.unknown(defpos))
    }

    fn current_role(&self) -> Result<Role, ConstraintError> {
        self.db
            .role(self.role)
            .cloned()
            .ok_or_else(|| self.unknown(self.role))
    }

    /// Define `name` under the installing role.
    fn register_name(&mut self, name: &str, defpos: Position) -> Result<(), ConstraintError> {
        let mut role = self.current_role()?;
        if role.names.contains_key(name) {
            return Err(ConstraintError::NameInUse {
                record: self.ppos,
                name: name.to_string(),
            });
        }
        role.names.insert(name.to_string(), defpos);
        self.db.put(DbObject::Role(role));
        Ok(())
    }

    /// Remove every role's definition of a name for `defpos`.
    fn unregister_names(&mut self, defpos: Position) {
        let roles: Vec<Role> = self
            .db
            .objects
            .values()
            .filter_map(|o| match o {
                DbObject::Role(r) if r.names.values().any(|p| *p == defpos) => Some(r.clone()),
                _ => None,
            })
            .collect();
        for mut role in roles {
            let stale: Vec<String> = role
                .names
                .iter()
                .filter(|(_, p)| **p == defpos)
                .map(|(n, _)| n.clone())
                .collect();
            for name in stale {
                role.names.remove(&name);
            }
            self.db.put(DbObject::Role(role));
        }
    }

    fn install_role(&mut self, def: &RoleDef) -> Result<(), ConstraintError> {
        if self.db.roles_by_name.contains_key(&def.name) {
            return Err(ConstraintError::NameInUse {
                record: self.ppos,
                name: def.name.clone(),
            });
        }
        self.db.roles_by_name.insert(def.name.clone(), self.ppos);
        self.db.put(DbObject::Role(Role {
            defpos: self.ppos,
            name: def.name.clone(),
            details: def.details.clone(),
            names: OrdMap::new(),
            privileges: OrdMap::new(),
        }));
        Ok(())
    }

    fn install_user(&mut self, def: &UserDef) -> Result<(), ConstraintError> {
        if self.db.users_by_name.contains_key(&def.name) {
            return Err(ConstraintError::NameInUse {
                record: self.ppos,
                name: def.name.clone(),
            });
        }
        self.db.users_by_name.insert(def.name.clone(), self.ppos);
        self.db.put(DbObject::User(User {
            defpos: self.ppos,
            name: def.name.clone(),
            privileges: OrdMap::new(),
        }));
        if self.db.owner.is_none() {
            self.db.owner = Some(self.ppos);
        }
        Ok(())
    }

    fn install_grant(&mut self, def: &GrantDef) -> Result<(), ConstraintError> {
        self.require(def.object)?;
        let grantee = def.grantee.unwrap_or(predefined::PUBLIC);
        let fold = |held: &mut OrdMap<Position, Privileges>| {
            let current = held.get(&def.object).copied().unwrap_or_default();
            let next = if def.revoke {
                current.difference(def.privileges)
            } else {
                current.union(def.privileges)
            };
            if next.is_empty() {
                held.remove(&def.object);
            } else {
                held.insert(def.object, next);
            }
        };
        match self.require(grantee)?.clone() {
            DbObject::Role(mut r) => {
                fold(&mut r.privileges);
                self.db.put(DbObject::Role(r));
            }
            DbObject::User(mut u) => {
                fold(&mut u.privileges);
                self.db.put(DbObject::User(u));
            }
            _ => return Err(self.unknown(grantee)),
        }
        Ok(())
    }

    fn install_metadata(&mut self, def: &MetadataDef) -> Result<(), ConstraintError> {
        self.require(def.target)?;
        self.db.metadata.insert(
            def.target,
            ObjectMetadata {
                defpos: self.ppos,
                name: def.name.clone(),
                description: def.description.clone(),
                flags: def.flags,
                iri: def.iri.clone(),
            },
        );
        Ok(())
    }

    fn install_transaction(&mut self, header: &TransactionHeader) {
        self.db.last_commit = Some(CommitInfo {
            position: self.ppos,
            user: header.user,
            role: header.role,
            time: header.time,
        });
    }
}

#[cfg(test)]
mod tests;
