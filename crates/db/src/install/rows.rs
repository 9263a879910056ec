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

//! Row changes and the index and foreign key maintenance they drag along.
//!
//! Stored rows never hold `Null`: a null field is an absent one.

use crate::error::ConstraintError;
use crate::install::Installer;
use crate::objects::{DbObject, Key, Table, TableRow};
use quire_common::Position;
use quire_common::flags::{ConstraintType, ReferentialAction};
use quire_log::Fields;
use quire_log::physical::{DeleteRow, InsertRow, UpdateRow};

impl Installer<'_> {
    pub(super) fn install_insert(&mut self, rec: &InsertRow) -> Result<(), ConstraintError> {
        let table = self.table(rec.table)?;
        let mut fields = Fields::new();
        for (c, v) in &rec.fields {
            if !table.columns.contains(c) {
                return Err(self.unknown(*c));
            }
            if !v.is_null() {
                fields.insert(*c, v.clone());
            }
        }
        for c in table.columns.iter() {
            let column = self.column(*c)?;
            if !fields.contains_key(c) && !column.default.is_null() {
                fields.insert(*c, column.default);
            }
        }
        self.rewrite_row(
            rec.table,
            TableRow {
                defpos: self.ppos,
                previous: self.ppos,
                fields,
            },
        )
    }

    pub(super) fn install_update(&mut self, rec: &UpdateRow) -> Result<(), ConstraintError> {
        let table = self.table(rec.table)?;
        let old = table
            .rows
            .get(&rec.row)
            .cloned()
            .ok_or_else(|| self.unknown(rec.row))?;
        let mut fields = old.fields;
        for (c, v) in &rec.fields {
            if !table.columns.contains(c) {
                return Err(self.unknown(*c));
            }
            if v.is_null() {
                fields.remove(c);
            } else {
                fields.insert(*c, v.clone());
            }
        }
        self.rewrite_row(
            rec.table,
            TableRow {
                defpos: rec.row,
                previous: self.ppos,
                fields,
            },
        )
    }

    pub(super) fn install_delete(&mut self, rec: &DeleteRow) -> Result<(), ConstraintError> {
        self.table(rec.table)?;
        self.remove_row(rec.table, rec.row)
    }

    /// Not-null and check constraints over the complete new contents of a row.
    fn validate_row(&self, table: &Table, fields: &Fields) -> Result<(), ConstraintError> {
        let mut checks: Vec<Position> = table.checks.iter().copied().collect();
        for c in table.columns.iter() {
            let column = self.column(*c)?;
            if column.not_null && !fields.contains_key(c) {
                return Err(ConstraintError::NotNull {
                    record: self.ppos,
                    column: *c,
                });
            }
            checks.extend(column.checks.iter().copied());
            if let Some(domain) = self.db.domain(column.domain) {
                checks.extend(domain.checks.iter().copied());
            }
        }
        for c in checks {
            if let Some(check) = self.db.check(c)
                && !self.checks.evaluate(check, fields)
            {
                return Err(ConstraintError::CheckFailed {
                    record: self.ppos,
                    check: c,
                });
            }
        }
        Ok(())
    }

    /// Validate and store `row`, then apply the referential actions its key changes call for.
    fn rewrite_row(&mut self, table: Position, row: TableRow) -> Result<(), ConstraintError> {
        let t = self.table(table)?;
        self.validate_row(&t, &row.fields)?;
        let fields = row.fields.clone();
        if let Some(old) = self.put_row(t, row)? {
            self.referential_actions(table, &old, Some(&fields))?;
        }
        Ok(())
    }

    /// Store `row`, replacing any earlier version, with every index of the table kept in step.
    /// Returns the version replaced.
    pub(super) fn put_row(
        &mut self,
        mut table: Table,
        row: TableRow,
    ) -> Result<Option<TableRow>, ConstraintError> {
        let old = table.rows.get(&row.defpos).cloned();
        for ix in table.indexes.iter() {
            let mut index = self.index(*ix)?;
            let old_key = old.as_ref().and_then(|o| index.key_of(&o.fields));
            let new_key = index.key_of(&row.fields);
            if old_key == new_key {
                continue;
            }
            if let Some(k) = &old_key {
                index = index.without_entry(k, row.defpos);
            }
            if let Some(key) = new_key {
                if index.flags.is_unique() && !index.rows_for(&key).is_empty() {
                    return Err(ConstraintError::DuplicateKey {
                        record: self.ppos,
                        index: *ix,
                        key,
                    });
                }
                if index.flags.contains(ConstraintType::ForeignKey)
                    && let Some(r) = index.reference
                    && !self.index(r)?.entries.contains_key(&key)
                {
                    return Err(ConstraintError::MissingForeignKey {
                        record: self.ppos,
                        index: r,
                        key,
                    });
                }
                index = index.with_entry(key, row.defpos);
            }
            self.db.put(DbObject::Index(index));
        }
        table.rows.insert(row.defpos, row);
        self.db.put(DbObject::Table(table));
        Ok(old)
    }

    fn remove_row(&mut self, table: Position, row: Position) -> Result<(), ConstraintError> {
        let mut t = self.table(table)?;
        let Some(old) = t.rows.remove(&row) else {
            return Err(self.unknown(row));
        };
        for ix in t.indexes.iter() {
            let index = self.index(*ix)?;
            if let Some(key) = index.key_of(&old.fields) {
                self.db.put(DbObject::Index(index.without_entry(&key, row)));
            }
        }
        self.db.put(DbObject::Table(t));
        self.referential_actions(table, &old, None)
    }

    /// Rows of other tables refer to `old` through foreign keys on the table's unique indexes.
    /// `new` is the row's new contents, or `None` if it was deleted.
    fn referential_actions(
        &mut self,
        table: Position,
        old: &TableRow,
        new: Option<&Fields>,
    ) -> Result<(), ConstraintError> {
        let t = self.table(table)?;
        for ix in t.indexes.iter() {
            let index = self.index(*ix)?;
            if index.dependents.is_empty() {
                continue;
            }
            let Some(old_key) = index.key_of(&old.fields) else {
                continue;
            };
            let new_key = new.and_then(|f| index.key_of(f));
            if new_key.as_ref() == Some(&old_key) {
                continue;
            }
            for fk in index.dependents.iter() {
                self.follow_foreign_key(*fk, &old_key, new.map(|_| new_key.as_ref()))?;
            }
        }
        Ok(())
    }

    /// Fix up the rows `fk` maps to `old_key`. `new_key` is `None` for a delete, and
    /// `Some(None)` when the referenced key became null.
    fn follow_foreign_key(
        &mut self,
        fk: Position,
        old_key: &Key,
        new_key: Option<Option<&Key>>,
    ) -> Result<(), ConstraintError> {
        let fk = self.index(fk)?;
        let action = match new_key {
            Some(_) => fk.flags.on_update(),
            None => fk.flags.on_delete(),
        };
        for referencing in fk.rows_for(old_key) {
            let Some(row) = self.db.row(fk.table, referencing).cloned() else {
                continue;
            };
            let mut fields = row.fields.clone();
            match (action, new_key) {
                (ReferentialAction::Restrict, _) => {
                    return Err(ConstraintError::ForeignKeyInUse {
                        record: self.ppos,
                        index: fk.defpos,
                        row: referencing,
                    });
                }
                (ReferentialAction::Cascade, None) => {
                    self.remove_row(fk.table, referencing)?;
                    continue;
                }
                (ReferentialAction::Cascade, Some(Some(key))) => {
                    for (c, v) in fk.keys.iter().zip(key.iter()) {
                        fields.insert(*c, v.clone());
                    }
                }
                (ReferentialAction::Cascade, Some(None)) | (ReferentialAction::SetNull, _) => {
                    for c in &fk.keys {
                        fields.remove(c);
                    }
                }
                (ReferentialAction::SetDefault, _) => {
                    for c in &fk.keys {
                        let default = self.column(*c)?.default;
                        if default.is_null() {
                            fields.remove(c);
                        } else {
                            fields.insert(*c, default);
                        }
                    }
                }
            }
            self.rewrite_row(
                fk.table,
                TableRow {
                    defpos: referencing,
                    previous: self.ppos,
                    fields,
                },
            )?;
        }
        Ok(())
    }
}
