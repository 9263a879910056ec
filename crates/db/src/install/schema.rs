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
use crate::objects::{
    Check, DbObject, Domain, Index, Procedure, Role, Table, TableColumn, TableRow, Trigger, User,
    View, parse_literal,
};
use imbl::{OrdMap, OrdSet, Vector};
use quire_common::Position;
use quire_common::flags::{ConstraintType, Constraints};
use quire_log::physical::{
    AlterColumn, CheckDef, ColumnDef, DomainDef, IndexDef, ModifyDef, ProcedureDef, RefActionDef,
    RenameDef, TableDef, TriggerDef, ViewDef,
};

impl Installer<'_> {
    pub(super) fn install_table(&mut self, def: &TableDef) -> Result<(), ConstraintError> {
        self.register_name(&def.name, self.ppos)?;
        self.db.put(DbObject::Table(Table {
            defpos: self.ppos,
            name: def.name.clone(),
            row_iri: def.row_iri.clone(),
            columns: Vector::new(),
            rows: OrdMap::new(),
            indexes: OrdSet::new(),
            checks: OrdSet::new(),
            triggers: OrdSet::new(),
        }));
        Ok(())
    }

    /// Keep `table.columns` in sequence order, ties going after existing columns.
    fn place_column(&self, table: &mut Table, column: Position, seq: i32) {
        let at = table
            .columns
            .iter()
            .position(|c| self.db.column(*c).is_some_and(|c| c.seq > seq))
            .unwrap_or(table.columns.len());
        table.columns.insert(at, column);
    }

    fn check_column_name(
        &self,
        table: &Table,
        name: &str,
        except: Option<Position>,
    ) -> Result<(), ConstraintError> {
        let taken = table
            .columns
            .iter()
            .filter(|c| Some(**c) != except)
            .filter_map(|c| self.db.column(*c))
            .any(|c| c.name == name);
        if taken {
            return Err(ConstraintError::NameInUse {
                record: self.ppos,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// A not-null column with no default can only be added to, or imposed on, a table where
    /// every row already has a value for it.
    fn check_not_null_rows(
        &self,
        table: &Table,
        column: &TableColumn,
    ) -> Result<(), ConstraintError> {
        if !column.not_null || !column.default.is_null() {
            return Ok(());
        }
        let missing = table
            .rows
            .values()
            .any(|r| !r.fields.contains_key(&column.defpos));
        if missing {
            return Err(ConstraintError::NotNull {
                record: self.ppos,
                column: column.defpos,
            });
        }
        Ok(())
    }

    /// Rows lacking a value for a not-null column take its default.
    fn fill_default(&mut self, column: &TableColumn) -> Result<(), ConstraintError> {
        if !column.not_null || column.default.is_null() {
            return Ok(());
        }
        let rows: Vec<TableRow> = self
            .table(column.table)?
            .rows
            .values()
            .filter(|r| !r.fields.contains_key(&column.defpos))
            .cloned()
            .collect();
        for mut row in rows {
            row.fields.insert(column.defpos, column.default.clone());
            let table = self.table(column.table)?;
            self.put_row(table, row)?;
        }
        Ok(())
    }

    fn column_from(&self, defpos: Position, def: &ColumnDef) -> TableColumn {
        TableColumn {
            defpos,
            table: def.table,
            name: def.name.clone(),
            seq: def.seq,
            domain: def.domain,
            default: parse_literal(&def.default_source),
            default_source: def.default_source.clone(),
            not_null: def.not_null,
            generation: def.generation,
            update_source: def.update_source.clone(),
            checks: OrdSet::new(),
        }
    }

    pub(super) fn install_column(&mut self, def: &ColumnDef) -> Result<(), ConstraintError> {
        let mut table = self.table(def.table)?;
        if self.db.domain(def.domain).is_none() {
            return Err(self.unknown(def.domain));
        }
        self.check_column_name(&table, &def.name, None)?;
        let column = self.column_from(self.ppos, def);
        self.check_not_null_rows(&table, &column)?;
        self.place_column(&mut table, self.ppos, def.seq);
        self.db.put(DbObject::Column(column.clone()));
        self.db.put(DbObject::Table(table));
        self.fill_default(&column)
    }

    pub(super) fn install_alter(&mut self, alter: &AlterColumn) -> Result<(), ConstraintError> {
        let old = self.column(alter.column)?;
        if alter.def.table != old.table {
            return Err(self.unknown(alter.def.table));
        }
        if self.db.domain(alter.def.domain).is_none() {
            return Err(self.unknown(alter.def.domain));
        }
        let mut table = self.table(old.table)?;
        self.check_column_name(&table, &alter.def.name, Some(alter.column))?;
        let column = TableColumn {
            checks: old.checks.clone(),
            ..self.column_from(alter.column, &alter.def)
        };
        self.check_not_null_rows(&table, &column)?;
        if column.seq != old.seq {
            table.columns.retain(|c| *c != alter.column);
            self.place_column(&mut table, alter.column, column.seq);
            self.db.put(DbObject::Table(table));
        }
        self.db.put(DbObject::Column(column.clone()));
        self.fill_default(&column)
    }

    pub(super) fn install_index(&mut self, def: &IndexDef) -> Result<(), ConstraintError> {
        let mut table = self.table(def.table)?;
        for key in &def.columns {
            if !table.columns.contains(key) {
                return Err(self.unknown(*key));
            }
        }
        let referenced = match def.reference {
            Some(r) if def.flags.contains(ConstraintType::ForeignKey) => {
                Some(self.db.index(r).cloned().ok_or_else(|| self.unknown(r))?)
            }
            _ => None,
        };
        let mut index = Index {
            defpos: self.ppos,
            name: def.name.clone(),
            table: def.table,
            keys: def.columns.clone(),
            flags: def.flags,
            reference: def.reference,
            adapter: def.adapter.clone(),
            metadata: def.metadata,
            entries: OrdMap::new(),
            dependents: OrdSet::new(),
        };
        for row in table.rows.values() {
            let Some(key) = index.key_of(&row.fields) else {
                continue;
            };
            if def.flags.is_unique() && index.entries.contains_key(&key) {
                return Err(ConstraintError::DuplicateKey {
                    record: self.ppos,
                    index: self.ppos,
                    key,
                });
            }
            if let Some(referenced) = &referenced
                && !referenced.entries.contains_key(&key)
            {
                return Err(ConstraintError::MissingForeignKey {
                    record: self.ppos,
                    index: referenced.defpos,
                    key,
                });
            }
            index = index.with_entry(key, row.defpos);
        }
        if let Some(mut referenced) = referenced {
            referenced.dependents.insert(self.ppos);
            self.db.put(DbObject::Index(referenced));
        }
        table.indexes.insert(self.ppos);
        self.db.put(DbObject::Index(index));
        self.db.put(DbObject::Table(table));
        Ok(())
    }

    pub(super) fn install_ref_action(&mut self, def: &RefActionDef) -> Result<(), ConstraintError> {
        let mut index = self
            .db
            .index(def.index)
            .cloned()
            .ok_or_else(|| self.unknown(def.index))?;
        let referential = Constraints::referential_bits();
        index.flags = index
            .flags
            .difference(referential)
            .union(def.flags.intersection(referential));
        self.db.put(DbObject::Index(index));
        Ok(())
    }

    pub(super) fn install_domain(&mut self, def: &DomainDef) -> Result<(), ConstraintError> {
        for p in def.element.iter().chain(def.supertypes.iter()) {
            if self.db.domain(*p).is_none() {
                return Err(self.unknown(*p));
            }
        }
        self.register_name(&def.name, self.ppos)?;
        self.db.put(DbObject::Domain(Domain {
            defpos: self.ppos,
            name: def.name.clone(),
            kind: def.kind,
            precision: def.precision,
            scale: def.scale,
            charset: def.charset,
            culture: def.culture.clone(),
            default_source: def.default_source.clone(),
            element: def.element,
            supertypes: def.supertypes.clone(),
            graph: def.graph,
            checks: OrdSet::new(),
        }));
        Ok(())
    }

    pub(super) fn install_check(&mut self, def: &CheckDef) -> Result<(), ConstraintError> {
        let check = Check {
            defpos: self.ppos,
            name: def.name.clone(),
            owner: def.owner,
            sub_object: def.sub_object,
            source: def.source.clone(),
        };
        // Existing rows must already satisfy a new table or column check.
        let table = match self.require(check.subject())?.clone() {
            DbObject::Table(t) => Some(t),
            DbObject::Column(c) => Some(self.table(c.table)?),
            _ => None,
        };
        if let Some(table) = &table {
            for row in table.rows.values() {
                if !self.checks.evaluate(&check, &row.fields) {
                    return Err(ConstraintError::CheckFailed {
                        record: self.ppos,
                        check: self.ppos,
                    });
                }
            }
        }
        match self.require(check.subject())?.clone() {
            DbObject::Table(mut t) => {
                t.checks.insert(self.ppos);
                self.db.put(DbObject::Table(t));
            }
            DbObject::Column(mut c) => {
                c.checks.insert(self.ppos);
                self.db.put(DbObject::Column(c));
            }
            DbObject::Domain(mut d) => {
                d.checks.insert(self.ppos);
                self.db.put(DbObject::Domain(d));
            }
            _ => {}
        }
        self.db.put(DbObject::Check(check));
        Ok(())
    }

    pub(super) fn install_trigger(&mut self, def: &TriggerDef) -> Result<(), ConstraintError> {
        let mut table = self.table(def.table)?;
        for c in &def.columns {
            if !table.columns.contains(c) {
                return Err(self.unknown(*c));
            }
        }
        table.triggers.insert(self.ppos);
        self.db.put(DbObject::Table(table));
        self.db.put(DbObject::Trigger(Trigger {
            defpos: self.ppos,
            name: def.name.clone(),
            table: def.table,
            flags: def.flags,
            columns: def.columns.clone(),
            old_row: def.old_row.clone(),
            new_row: def.new_row.clone(),
            old_table: def.old_table.clone(),
            new_table: def.new_table.clone(),
            source: def.source.clone(),
        }));
        Ok(())
    }

    pub(super) fn install_view(&mut self, def: &ViewDef) -> Result<(), ConstraintError> {
        for p in def.structure.iter().chain(def.using_table.iter()) {
            self.require(*p)?;
        }
        self.register_name(&def.name, self.ppos)?;
        self.db.put(DbObject::View(View {
            defpos: self.ppos,
            version: def.version,
            name: def.name.clone(),
            definition: def.definition.clone(),
            structure: def.structure,
            remote_user: def.remote_user.clone(),
            remote_password: def.remote_password.clone(),
            using_table: def.using_table,
        }));
        Ok(())
    }

    pub(super) fn install_procedure(&mut self, def: &ProcedureDef) -> Result<(), ConstraintError> {
        if let Some(r) = def.return_type {
            self.require(r)?;
        }
        self.register_name(&def.name_and_arity(), self.ppos)?;
        self.db.put(DbObject::Procedure(Procedure {
            defpos: self.ppos,
            name: def.name.clone(),
            arity: def.arity,
            return_type: def.return_type,
            body: def.body.clone(),
        }));
        Ok(())
    }

    /// Replace the source of a procedure, view, trigger or check, renaming it if a name is given.
    pub(super) fn install_modify(&mut self, def: &ModifyDef) -> Result<(), ConstraintError> {
        let obj = match self.require(def.target)?.clone() {
            DbObject::Procedure(p) => DbObject::Procedure(Procedure {
                body: def.body.clone(),
                ..p
            }),
            DbObject::View(v) => DbObject::View(View {
                definition: def.body.clone(),
                ..v
            }),
            DbObject::Trigger(t) => DbObject::Trigger(Trigger {
                source: def.body.clone(),
                ..t
            }),
            DbObject::Check(c) => DbObject::Check(Check {
                source: def.body.clone(),
                ..c
            }),
            _ => return Err(self.unknown(def.target)),
        };
        let renamed = !def.name.is_empty() && obj.name() != def.name;
        self.db.put(obj);
        if renamed {
            self.rename(def.target, &def.name)?;
        }
        Ok(())
    }

    pub(super) fn install_rename(&mut self, def: &RenameDef) -> Result<(), ConstraintError> {
        self.require(def.target)?;
        self.rename(def.target, &def.name)
    }

    fn rename(&mut self, target: Position, name: &str) -> Result<(), ConstraintError> {
        let record = self.ppos;
        let name_in_use = move || ConstraintError::NameInUse {
            record,
            name: name.to_string(),
        };
        let obj = self.require(target)?.clone();
        let renamed = match obj {
            DbObject::Table(t) => {
                self.rename_registered(target, name)?;
                DbObject::Table(Table {
                    name: name.to_string(),
                    ..t
                })
            }
            DbObject::Domain(d) => {
                self.rename_registered(target, name)?;
                DbObject::Domain(Domain {
                    name: name.to_string(),
                    ..d
                })
            }
            DbObject::View(v) => {
                self.rename_registered(target, name)?;
                DbObject::View(View {
                    name: name.to_string(),
                    ..v
                })
            }
            DbObject::Procedure(p) => {
                let renamed = Procedure {
                    name: name.to_string(),
                    ..p
                };
                self.rename_registered(target, &renamed.name_and_arity())?;
                DbObject::Procedure(renamed)
            }
            DbObject::Column(c) => {
                let table = self.table(c.table)?;
                self.check_column_name(&table, name, Some(target))?;
                DbObject::Column(TableColumn {
                    name: name.to_string(),
                    ..c
                })
            }
            DbObject::Role(r) => {
                if self.db.roles_by_name.contains_key(name) {
                    return Err(name_in_use());
                }
                self.db.roles_by_name.remove(&r.name);
                self.db.roles_by_name.insert(name.to_string(), target);
                DbObject::Role(Role {
                    name: name.to_string(),
                    ..r
                })
            }
            DbObject::User(u) => {
                if self.db.users_by_name.contains_key(name) {
                    return Err(name_in_use());
                }
                self.db.users_by_name.remove(&u.name);
                self.db.users_by_name.insert(name.to_string(), target);
                DbObject::User(User {
                    name: name.to_string(),
                    ..u
                })
            }
            DbObject::Index(i) => DbObject::Index(Index {
                name: name.to_string(),
                ..i
            }),
            DbObject::Trigger(t) => DbObject::Trigger(Trigger {
                name: name.to_string(),
                ..t
            }),
            DbObject::Check(c) => DbObject::Check(Check {
                name: name.to_string(),
                ..c
            }),
        };
        self.db.put(renamed);
        Ok(())
    }

    fn rename_registered(&mut self, target: Position, name: &str) -> Result<(), ConstraintError> {
        self.unregister_names(target);
        self.register_name(name, target)
    }
}
