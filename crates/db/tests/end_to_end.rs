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

//! Whole sessions against an on-disk database: concurrent transactions, reopening, and the
//! schema lifecycle.

#[cfg(test)]
mod tests {
    use eyre::{bail, eyre};
    use quire_common::flags::{ConstraintType, Constraints, DropAction};
    use quire_common::tracing::init_tracing;
    use quire_common::{HEADER_LEN, Position, predefined, v_int, v_str};
    use quire_db::{
        CommitResult, ConflictReason, ConstraintError, DatabaseConfig, Engine, Error, Transaction,
    };
    use quire_log::physical::{
        AlterColumn, ColumnDef, ColumnVersion, DeleteRow, DropObject, DropVersion, IndexDef,
        IndexVersion, InsertRow, RecordVersion, RenameDef, TableDef, TableVersion, UpdateRow,
    };
    use quire_log::{Fields, read_records};
    use std::path::Path;
    use std::sync::Arc;

    fn test_db(path: &Path) -> Arc<Engine> {
        init_tracing(false).ok();
        Engine::open(Some(path), DatabaseConfig::default())
            .unwrap()
            .0
    }

    fn column(table: Position, name: &str, seq: i32, domain: Position) -> ColumnDef {
        ColumnDef {
            version: ColumnVersion::V3,
            table,
            name: name.into(),
            seq,
            domain,
            default_source: String::new(),
            not_null: false,
            generation: Default::default(),
            update_source: String::new(),
        }
    }

    fn index(table: Position, columns: Vec<Position>, flags: Constraints) -> IndexDef {
        IndexDef {
            version: IndexVersion::V2,
            name: String::new(),
            table,
            columns,
            flags,
            reference: None,
            adapter: String::new(),
            metadata: 0,
        }
    }

    fn insert(table: Position, fields: Fields) -> InsertRow {
        InsertRow {
            version: RecordVersion::V1,
            table,
            fields,
            provenance: String::new(),
        }
    }

    fn create_table(
        tx: &mut Transaction,
        name: &str,
        columns: &[&str],
    ) -> (Position, Vec<Position>) {
        let t = tx
            .add(TableDef {
                version: TableVersion::V1,
                name: name.into(),
                row_iri: String::new(),
            })
            .unwrap();
        let cols = columns
            .iter()
            .enumerate()
            .map(|(seq, c)| {
                tx.add(column(t, c, seq as i32, predefined::INTEGER))
                    .unwrap()
            })
            .collect();
        (t, cols)
    }

    fn commit(tx: Transaction) -> eyre::Result<Position> {
        match tx.commit()? {
            CommitResult::Success {
                position: Some(p), ..
            } => Ok(p),
            CommitResult::Success { position: None, .. } => bail!("nothing was written"),
            CommitResult::ConflictRetry { conflict } => Err(eyre!("conflict: {conflict}")),
        }
    }

    /// Committed positions of a table and one of its columns, by name.
    fn resolve(db: &Engine, table: &str, column: &str) -> (Position, Position) {
        let snapshot = db.snapshot();
        let t = snapshot.table_by_name(table).unwrap().defpos;
        let c = snapshot.column_by_name(t, column).unwrap().defpos;
        (t, c)
    }

    #[test]
    fn test_disjoint_inserts_both_commit() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let db = test_db(dir.path());
        let mut tx = db.begin();
        create_table(&mut tx, "T", &["a"]);
        commit(tx)?;
        let (t, a) = resolve(&db, "T", "a");

        let mut t1 = db.begin();
        let mut t2 = db.begin();
        t1.add(insert(t, Fields::from([(a, v_int(1))])))?;
        t2.add(insert(t, Fields::from([(a, v_int(2))])))?;
        commit(t1)?;
        commit(t2)?;
        assert_eq!(db.snapshot().row_count(t), 2);
        Ok(())
    }

    #[test]
    fn test_duplicate_key_across_transactions() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let db = test_db(dir.path());
        let mut tx = db.begin();
        let (t, cols) = create_table(&mut tx, "T", &["a"]);
        let unique = Constraints::new_with(ConstraintType::Unique);
        tx.add(index(t, cols, unique))?;
        commit(tx)?;
        let (t, a) = resolve(&db, "T", "a");

        let mut t1 = db.begin();
        let mut t2 = db.begin();
        t1.add(insert(t, Fields::from([(a, v_int(5))])))?;
        t2.add(insert(t, Fields::from([(a, v_int(5))])))?;
        let winner = commit(t1)?;
        let log_end = db.snapshot().log_end();
        match t2.commit() {
            Err(Error::Constraint(ConstraintError::DuplicateKey { key, .. })) => {
                assert_eq!(key, vec![v_int(5)]);
            }
            other => bail!("expected a duplicate key, got {other:?}"),
        }
        let snapshot = db.snapshot();
        assert_eq!(snapshot.row_count(t), 1);
        assert_eq!(snapshot.last_commit().map(|c| c.position), Some(winner));
        // Nothing of the loser reached the log.
        assert_eq!(std::fs::metadata(db.log_path())?.len(), log_end);
        Ok(())
    }

    #[test]
    fn test_concurrent_alters_conflict() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let db = test_db(dir.path());
        let mut tx = db.begin();
        create_table(&mut tx, "T", &["a"]);
        commit(tx)?;
        let (t, a) = resolve(&db, "T", "a");

        let mut t1 = db.begin();
        let mut t2 = db.begin();
        t1.add(AlterColumn {
            column: a,
            def: ColumnDef {
                default_source: "0".into(),
                ..column(t, "a", 0, predefined::INTEGER)
            },
        })?;
        t2.add(AlterColumn {
            column: a,
            def: ColumnDef {
                not_null: true,
                ..column(t, "a", 0, predefined::INTEGER)
            },
        })?;
        commit(t1)?;
        match t2.commit()? {
            CommitResult::ConflictRetry { conflict } => {
                assert_eq!(conflict.reason, ConflictReason::TableAltered);
                assert!(conflict.pending.is_pending());
                assert!(conflict.committed.is_committed());
            }
            other => bail!("expected a conflict, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_reopen_preserves_offsets() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let before = {
            let db = test_db(dir.path());
            for i in 0..10 {
                let mut tx = db.begin();
                let (t, cols) = create_table(&mut tx, &format!("T{i}"), &["a", "b"]);
                let row = Fields::from([(cols[0], v_int(i)), (cols[1], v_int(i * 2))]);
                tx.add(insert(t, row))?;
                commit(tx)?;
            }
            read_records(db.log_path(), HEADER_LEN, db.snapshot().log_end())?
        };

        let db = test_db(dir.path());
        let snapshot = db.snapshot();
        let after = read_records(db.log_path(), HEADER_LEN, snapshot.log_end())?;
        assert_eq!(before, after);
        for i in 0..10 {
            let table = snapshot
                .table_by_name(&format!("T{i}"))
                .ok_or_else(|| eyre!("T{i} missing"))?;
            assert_eq!(table.rows.len(), 1);
        }

        // More commits leave what is already there untouched.
        let mut tx = db.begin();
        create_table(&mut tx, "later", &["x"]);
        commit(tx)?;
        let reread = read_records(db.log_path(), HEADER_LEN, db.snapshot().log_end())?;
        assert_eq!(&reread[..before.len()], &before[..]);
        Ok(())
    }

    #[test]
    fn test_schema_lifecycle() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let db = test_db(dir.path());

        let mut tx = db.begin();
        let (customers, ccols) = create_table(&mut tx, "customers", &["id"]);
        let pk = tx.add(index(
            customers,
            ccols.clone(),
            Constraints::new_with(ConstraintType::PrimaryKey),
        ))?;
        let (orders, ocols) = create_table(&mut tx, "orders", &["id", "customer"]);
        tx.add(IndexDef {
            reference: Some(pk),
            ..index(
                orders,
                vec![ocols[1]],
                Constraints::new_with(ConstraintType::ForeignKey)
                    | ConstraintType::CascadeDelete,
            )
        })?;
        let alice = Fields::from([(ccols[0], v_int(1))]);
        let alice = tx.add(insert(customers, alice))?;
        for id in [10, 11] {
            let order = Fields::from([(ocols[0], v_int(id)), (ocols[1], v_int(1))]);
            tx.add(insert(orders, order))?;
        }
        // A row inserted in this transaction can be updated in it too.
        tx.add(UpdateRow {
            row: alice,
            previous: alice,
            table: customers,
            fields: Fields::from([(ccols[0], v_int(1))]),
        })?;
        commit(tx)?;

        let (customers, id) = resolve(&db, "customers", "id");
        let (orders, _) = resolve(&db, "orders", "id");
        assert_eq!(db.snapshot().row_count(orders), 2);

        let alice = db
            .snapshot()
            .table(customers)
            .and_then(|t| {
                t.rows
                    .iter()
                    .find(|(_, r)| r.fields.get(&id) == Some(&v_int(1)))
                    .map(|(p, _)| *p)
            })
            .ok_or_else(|| eyre!("alice missing"))?;
        let mut tx = db.begin();
        tx.add(DeleteRow {
            table: customers,
            row: alice,
        })?;
        commit(tx)?;
        assert_eq!(db.snapshot().row_count(orders), 0);

        let mut tx = db.begin();
        tx.add(RenameDef {
            target: orders,
            name: "purchases".into(),
        })?;
        commit(tx)?;
        assert!(db.snapshot().table_by_name("orders").is_none());

        let mut tx = db.begin();
        let err = tx
            .add(DropObject {
                version: DropVersion::V1,
                target: customers,
                action: DropAction::Restrict,
            })
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Constraint(ConstraintError::DropRestricted { .. })
        ));

        let mut tx = db.begin();
        tx.add(DropObject {
            version: DropVersion::V1,
            target: customers,
            action: DropAction::Cascade,
        })?;
        commit(tx)?;
        let snapshot = db.snapshot();
        assert!(snapshot.table_by_name("customers").is_none());
        let purchases = snapshot.table_by_name("purchases").unwrap();
        assert!(purchases.indexes.is_empty());

        // And all of that survives a reopen.
        drop(snapshot);
        let expected = db.snapshot();
        drop(db);
        let db = test_db(dir.path());
        assert_eq!(*db.snapshot(), *expected);
        Ok(())
    }

    #[test]
    fn test_text_values_round_trip() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let db = test_db(dir.path());
        let mut tx = db.begin();
        let t = tx.add(TableDef {
            version: TableVersion::V1,
            name: "notes".into(),
            row_iri: String::new(),
        })?;
        let body = tx.add(column(t, "body", 0, predefined::CHAR))?;
        let note = Fields::from([(body, v_str("héllo, wörld"))]);
        tx.add(insert(t, note))?;
        commit(tx)?;
        drop(db);

        let db = test_db(dir.path());
        let (t, body) = resolve(&db, "notes", "body");
        let snapshot = db.snapshot();
        let row = snapshot.table(t).unwrap().rows.values().next().unwrap();
        assert_eq!(row.fields.get(&body), Some(&v_str("héllo, wörld")));
        Ok(())
    }
}
