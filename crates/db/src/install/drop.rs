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

use crate::error::ConstraintError;
use crate::install::Installer;
use crate::objects::DbObject;
use quire_common::Position;
use quire_common::flags::DropAction;
use quire_log::physical::DropObject;

impl Installer<'_> {
    pub(super) fn install_drop(&mut self, def: &DropObject) -> Result<(), ConstraintError> {
        self.require(def.target)?;
        self.drop_object(def.target, def.action)
    }

    fn drop_object(&mut self, target: Position, action: DropAction) -> Result<(), ConstraintError> {
        // Already removed as a dependent of something dropped earlier in the cascade.
        if !self.db.contains(target) {
            return Ok(());
        }
        let dependents = self.db.dependents(target);
        if action == DropAction::Restrict
            && let Some(dependent) = dependents.first()
        {
            return Err(ConstraintError::DropRestricted {
                record: self.ppos,
                target,
                dependent: *dependent,
            });
        }
        for dependent in dependents {
            self.drop_object(dependent, DropAction::Cascade)?;
        }
        for owned in self.db.owned(target) {
            self.drop_object(owned, DropAction::Cascade)?;
        }
        self.detach(target)?;
        self.db.objects.remove(&target);
        self.db.metadata.remove(&target);
        self.revoke_all_on(target);
        Ok(())
    }

    /// Remove `target` from whatever refers to it by containment.
    fn detach(&mut self, target: Position) -> Result<(), ConstraintError> {
        let Some(obj) = self.db.get(target).cloned() else {
            return Ok(());
        };
        match obj {
            DbObject::Table(_)
            | DbObject::Domain(_)
            | DbObject::View(_)
            | DbObject::Procedure(_) => {
                self.unregister_names(target);
            }
            DbObject::Column(c) => {
                if let Some(mut table) = self.db.table(c.table).cloned() {
                    table.columns.retain(|p| *p != target);
                    let touched: Vec<Position> = table
                        .rows
                        .iter()
                        .filter(|(_, r)| r.fields.contains_key(&target))
                        .map(|(p, _)| *p)
                        .collect();
                    for p in touched {
                        if let Some(mut row) = table.rows.get(&p).cloned() {
                            row.fields.remove(&target);
                            table.rows.insert(p, row);
                        }
                    }
                    self.db.put(DbObject::Table(table));
                }
            }
            DbObject::Index(i) => {
                if let Some(mut table) = self.db.table(i.table).cloned() {
                    table.indexes.remove(&target);
                    self.db.put(DbObject::Table(table));
                }
                if let Some(r) = i.reference
                    && let Some(mut referenced) = self.db.index(r).cloned()
                {
                    referenced.dependents.remove(&target);
                    self.db.put(DbObject::Index(referenced));
                }
            }
            DbObject::Check(c) => match self.db.get(c.subject()).cloned() {
                Some(DbObject::Table(mut t)) => {
                    t.checks.remove(&target);
                    self.db.put(DbObject::Table(t));
                }
                Some(DbObject::Column(mut col)) => {
                    col.checks.remove(&target);
                    self.db.put(DbObject::Column(col));
                }
                Some(DbObject::Domain(mut d)) => {
                    d.checks.remove(&target);
                    self.db.put(DbObject::Domain(d));
                }
                _ => {}
            },
            DbObject::Trigger(t) => {
                let mut table = self.table(t.table)?;
                table.triggers.remove(&target);
                self.db.put(DbObject::Table(table));
            }
            DbObject::Role(r) => {
                self.db.roles_by_name.remove(&r.name);
            }
            DbObject::User(u) => {
                self.db.users_by_name.remove(&u.name);
            }
        }
        Ok(())
    }

    /// Forget every privilege held on `target`.
    fn revoke_all_on(&mut self, target: Position) {
        let holders: Vec<DbObject> = self
            .db
            .objects
            .values()
            .filter(|o| match o {
                DbObject::Role(r) => r.privileges.contains_key(&target),
                DbObject::User(u) => u.privileges.contains_key(&target),
                _ => false,
            })
            .cloned()
            .collect();
        for holder in holders {
            match holder {
                DbObject::Role(mut r) => {
                    r.privileges.remove(&target);
                    self.db.put(DbObject::Role(r));
                }
                DbObject::User(mut u) => {
                    u.privileges.remove(&target);
                    self.db.put(DbObject::User(u));
                }
                _ => {}
            }
        }
    }
}
