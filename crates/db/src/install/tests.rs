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

use crate::checks::{AcceptAll, CheckEvaluator};
use crate::database::Database;
use crate::error::ConstraintError;
use crate::install::install;
use crate::objects::Check;
use crate::test_support::*;
use pretty_assertions::assert_eq;
use quire_common::flags::{ConstraintType, Constraints, DropAction, Privilege};
use quire_common::{HEADER_LEN, Position, Value, predefined, v_int, v_str};
use quire_log::physical::{ModifyDef, ProcedureDef, ProcedureVersion, RefActionDef, RenameDef};
use quire_log::{Body, Fields, Physical};

/// Column values governed by a check must be non-negative integers.
struct NonNegative;

impl CheckEvaluator for NonNegative {
    fn evaluate(&self, check: &Check, row: &Fields) -> bool {
        match check.sub_object.and_then(|c| row.get(&c)) {
            Some(Value::Int(i)) => *i >= 0,
            _ => true,
        }
    }
}

/// Installs records one after another at ascending committed positions, the way replay does.
struct Fixture {
    db: Database,
    next: u64,
}

impl Fixture {
    fn new() -> Self {
        Self {
            db: Database::new(),
            next: HEADER_LEN,
        }
    }

    fn try_apply_with(
        &mut self,
        body: impl Into<Body>,
        checks: &dyn CheckEvaluator,
    ) -> Result<Position, ConstraintError> {
        let ppos = Position::Committed(self.next);
        self.next += 10;
        let record = Physical {
            ppos,
            trans: None,
            body: body.into(),
        };
        self.db = install(&self.db, predefined::SCHEMA_ROLE, &record, checks)?;
        Ok(ppos)
    }

    fn try_apply(&mut self, body: impl Into<Body>) -> Result<Position, ConstraintError> {
        self.try_apply_with(body, &AcceptAll)
    }

    fn apply(&mut self, body: impl Into<Body>) -> Position {
        self.try_apply(body).unwrap()
    }

    /// Table `name` with integer columns `a` and `b`.
    fn table_ab(&mut self, name: &str) -> (Position, Position, Position) {
        let t = self.apply(table(name));
        let a = self.apply(column(t, "a", 0));
        let b = self.apply(column(t, "b", 1));
        (t, a, b)
    }
}

#[test]
fn test_create_table_and_columns() {
    let mut fx = Fixture::new();
    let (t, a, b) = fx.table_ab("T");
    let table = fx.db.table_by_name("T").unwrap();
    assert_eq!(table.defpos, t);
    assert_eq!(
        table.columns.iter().copied().collect::<Vec<_>>(),
        vec![a, b]
    );
    assert_eq!(fx.db.column_by_name(t, "b").map(|c| c.defpos), Some(b));
}

#[test]
fn test_columns_kept_in_sequence_order() {
    let mut fx = Fixture::new();
    let t = fx.apply(table("T"));
    let c = fx.apply(column(t, "c", 2));
    let a = fx.apply(column(t, "a", 0));
    let b = fx.apply(column(t, "b", 1));
    let table = fx.db.table(t).unwrap();
    assert_eq!(
        table.columns.iter().copied().collect::<Vec<_>>(),
        vec![a, b, c]
    );
}

#[test]
fn test_duplicate_names_rejected() {
    let mut fx = Fixture::new();
    let (t, _, _) = fx.table_ab("T");
    assert!(matches!(
        fx.try_apply(table("T")),
        Err(ConstraintError::NameInUse { .. })
    ));
    assert!(matches!(
        fx.try_apply(column(t, "a", 5)),
        Err(ConstraintError::NameInUse { .. })
    ));
}

#[test]
fn test_insert_applies_defaults_and_drops_nulls() {
    let mut fx = Fixture::new();
    let t = fx.apply(table("T"));
    let a = fx.apply(column(t, "a", 0));
    let b = fx.apply(quire_log::physical::ColumnDef {
        default_source: "7".into(),
        ..column(t, "b", 1)
    });
    let row = fx.apply(insert(t, &[(a, Value::Null)]));
    let stored = fx.db.row(t, row).unwrap();
    assert_eq!(stored.fields, fields(&[(b, v_int(7))]));
    assert_eq!(stored.previous, row);
}

#[test]
fn test_not_null() {
    let mut fx = Fixture::new();
    let t = fx.apply(table("T"));
    let a = fx.apply(quire_log::physical::ColumnDef {
        not_null: true,
        ..column(t, "a", 0)
    });
    let before = fx.db.clone();
    let err = fx.try_apply(insert(t, &[])).unwrap_err();
    assert_eq!(
        err,
        ConstraintError::NotNull {
            record: err.record(),
            column: a
        }
    );
    // A failed install leaves the snapshot alone.
    assert_eq!(fx.db, before);
    fx.apply(insert(t, &[(a, v_int(1))]));
}

#[test]
fn test_not_null_column_on_populated_table() {
    let mut fx = Fixture::new();
    let (t, a, _) = fx.table_ab("T");
    fx.apply(insert(t, &[(a, v_int(1))]));
    let def = quire_log::physical::ColumnDef {
        not_null: true,
        ..column(t, "c", 2)
    };
    assert!(matches!(
        fx.try_apply(def.clone()),
        Err(ConstraintError::NotNull { .. })
    ));
    fx.apply(quire_log::physical::ColumnDef {
        default_source: "0".into(),
        ..def
    });
}

#[test]
fn test_not_null_default_fills_existing_rows() {
    let mut fx = Fixture::new();
    let (t, a, _) = fx.table_ab("T");
    let row = fx.apply(insert(t, &[(a, v_int(1))]));
    let c = fx.apply(quire_log::physical::ColumnDef {
        not_null: true,
        default_source: "0".into(),
        ..column(t, "c", 2)
    });
    assert_eq!(
        fx.db.row(t, row).unwrap().fields,
        fields(&[(a, v_int(1)), (c, v_int(0))])
    );
    // An update that leaves the new column alone still satisfies it.
    fx.apply(update(t, row, &[(a, v_int(2))]));
    assert_eq!(
        fx.db.row(t, row).unwrap().fields,
        fields(&[(a, v_int(2)), (c, v_int(0))])
    );
}

#[test]
fn test_alter_to_not_null_fills_rows_and_indexes() {
    let mut fx = Fixture::new();
    let (t, a, b) = fx.table_ab("T");
    let ix = fx.apply(unique(t, &[b]));
    let row = fx.apply(insert(t, &[(a, v_int(1))]));
    let not_null_b = quire_log::physical::ColumnDef {
        not_null: true,
        default_source: "9".into(),
        ..column(t, "b", 1)
    };
    fx.apply(alter(b, not_null_b.clone()));
    assert_eq!(fx.db.row(t, row).unwrap().fields.get(&b), Some(&v_int(9)));
    assert_eq!(
        fx.db.index(ix).unwrap().rows_for(&vec![v_int(9)]),
        vec![row]
    );

    // Two rows cannot both take the default under a unique index.
    let (u, ua, ub) = fx.table_ab("U");
    fx.apply(unique(u, &[ub]));
    fx.apply(insert(u, &[(ua, v_int(1))]));
    fx.apply(insert(u, &[(ua, v_int(2))]));
    let before = fx.db.clone();
    assert!(matches!(
        fx.try_apply(alter(
            ub,
            quire_log::physical::ColumnDef {
                table: u,
                ..not_null_b
            }
        )),
        Err(ConstraintError::DuplicateKey { .. })
    ));
    assert_eq!(fx.db, before);
}

#[test]
fn test_update_merges_and_null_removes() {
    let mut fx = Fixture::new();
    let (t, a, b) = fx.table_ab("T");
    let row = fx.apply(insert(t, &[(a, v_int(1)), (b, v_int(2))]));
    let changes = [(a, v_int(10)), (b, Value::Null)];
    let upd = fx.apply(update(t, row, &changes));
    let stored = fx.db.row(t, row).unwrap();
    assert_eq!(stored.fields, fields(&[(a, v_int(10))]));
    assert_eq!(stored.previous, upd);
}

#[test]
fn test_unique_index() {
    let mut fx = Fixture::new();
    let (t, a, _) = fx.table_ab("T");
    let ix = fx.apply(unique(t, &[a]));
    let r1 = fx.apply(insert(t, &[(a, v_int(5))]));
    let err = fx.try_apply(insert(t, &[(a, v_int(5))])).unwrap_err();
    assert!(matches!(err, ConstraintError::DuplicateKey { index, .. } if index == ix));

    // Keys containing nulls are not indexed, so do not collide.
    fx.apply(insert(t, &[]));
    fx.apply(insert(t, &[]));

    // Moving the key frees the old value.
    fx.apply(update(t, r1, &[(a, v_int(6))]));
    fx.apply(insert(t, &[(a, v_int(5))]));
    assert_eq!(fx.db.index(ix).unwrap().entries.len(), 2);
}

#[test]
fn test_index_over_existing_duplicates_fails() {
    let mut fx = Fixture::new();
    let (t, a, _) = fx.table_ab("T");
    fx.apply(insert(t, &[(a, v_int(1))]));
    fx.apply(insert(t, &[(a, v_int(1))]));
    assert!(matches!(
        fx.try_apply(primary_key(t, &[a])),
        Err(ConstraintError::DuplicateKey { .. })
    ));
}

/// Parent P(a) with a primary key, child C(a, b) whose `b` refers to it.
fn parent_child(
    fx: &mut Fixture,
    actions: Constraints,
) -> (Position, Position, Position, Position, Position) {
    let (p, pa, _) = fx.table_ab("P");
    let pk = fx.apply(primary_key(p, &[pa]));
    let (c, _, cb) = fx.table_ab("C");
    let fk = fx.apply(foreign_key(c, &[cb], pk, actions));
    (p, pa, c, cb, fk)
}

#[test]
fn test_foreign_key_must_exist() {
    let mut fx = Fixture::new();
    let (p, pa, c, cb, _) = parent_child(&mut fx, Constraints::new());
    assert!(matches!(
        fx.try_apply(insert(c, &[(cb, v_int(1))])),
        Err(ConstraintError::MissingForeignKey { .. })
    ));
    fx.apply(insert(p, &[(pa, v_int(1))]));
    fx.apply(insert(c, &[(cb, v_int(1))]));
    // A null reference refers to nothing and is always allowed.
    fx.apply(insert(c, &[]));
}

#[test]
fn test_delete_restricted_by_reference() {
    let mut fx = Fixture::new();
    let (p, pa, c, cb, fk) = parent_child(&mut fx, Constraints::new());
    let parent = fx.apply(insert(p, &[(pa, v_int(1))]));
    let child = fx.apply(insert(c, &[(cb, v_int(1))]));
    let err = fx.try_apply(delete(p, parent)).unwrap_err();
    assert_eq!(
        err,
        ConstraintError::ForeignKeyInUse {
            record: err.record(),
            index: fk,
            row: child
        }
    );
    fx.apply(delete(c, child));
    fx.apply(delete(p, parent));
    assert_eq!(fx.db.row_count(p), 0);
}

#[test]
fn test_cascade_delete() {
    let mut fx = Fixture::new();
    let (p, pa, c, cb, _) = parent_child(
        &mut fx,
        Constraints::new_with(ConstraintType::CascadeDelete),
    );
    let parent = fx.apply(insert(p, &[(pa, v_int(1))]));
    fx.apply(insert(c, &[(cb, v_int(1))]));
    fx.apply(insert(c, &[(cb, v_int(1))]));
    fx.apply(delete(p, parent));
    assert_eq!(fx.db.row_count(c), 0);
}

#[test]
fn test_set_null_on_delete() {
    let mut fx = Fixture::new();
    let (p, pa, c, cb, fk) = parent_child(
        &mut fx,
        Constraints::new_with(ConstraintType::SetNullDelete),
    );
    let parent = fx.apply(insert(p, &[(pa, v_int(1))]));
    let child = fx.apply(insert(c, &[(cb, v_int(1))]));
    fx.apply(delete(p, parent));
    assert_eq!(fx.db.row(c, child).unwrap().fields, Fields::new());
    assert!(fx.db.index(fk).unwrap().entries.is_empty());
}

#[test]
fn test_cascade_update() {
    let mut fx = Fixture::new();
    let (p, pa, c, cb, fk) = parent_child(
        &mut fx,
        Constraints::new_with(ConstraintType::CascadeUpdate),
    );
    let parent = fx.apply(insert(p, &[(pa, v_int(1))]));
    let child = fx.apply(insert(c, &[(cb, v_int(1))]));
    fx.apply(update(p, parent, &[(pa, v_int(2))]));
    assert_eq!(
        fx.db.row(c, child).unwrap().fields,
        fields(&[(cb, v_int(2))])
    );
    assert_eq!(
        fx.db.index(fk).unwrap().rows_for(&vec![v_int(2)]),
        vec![child]
    );
}

#[test]
fn test_update_restricted_by_reference() {
    let mut fx = Fixture::new();
    let (p, pa, c, cb, _) = parent_child(&mut fx, Constraints::new());
    let parent = fx.apply(insert(p, &[(pa, v_int(1))]));
    fx.apply(insert(c, &[(cb, v_int(1))]));
    assert!(matches!(
        fx.try_apply(update(p, parent, &[(pa, v_int(2))])),
        Err(ConstraintError::ForeignKeyInUse { .. })
    ));
}

#[test]
fn test_ref_action_replaces_referential_bits() {
    let mut fx = Fixture::new();
    let (p, pa, c, cb, fk) = parent_child(
        &mut fx,
        Constraints::new_with(ConstraintType::CascadeDelete),
    );
    fx.apply(RefActionDef {
        index: fk,
        flags: Constraints::new_with(ConstraintType::SetNullDelete),
    });
    let flags = fx.db.index(fk).unwrap().flags;
    assert!(flags.contains(ConstraintType::ForeignKey));
    assert!(flags.contains(ConstraintType::SetNullDelete));
    assert!(!flags.contains(ConstraintType::CascadeDelete));

    let parent = fx.apply(insert(p, &[(pa, v_int(1))]));
    let child = fx.apply(insert(c, &[(cb, v_int(1))]));
    fx.apply(delete(p, parent));
    assert!(fx.db.row(c, child).is_some());
}

#[test]
fn test_drop_restrict_and_cascade() {
    let mut fx = Fixture::new();
    let (p, _, c, _, fk) = parent_child(&mut fx, Constraints::new());
    let err = fx.try_apply(drop(p, DropAction::Restrict)).unwrap_err();
    assert_eq!(
        err,
        ConstraintError::DropRestricted {
            record: err.record(),
            target: p,
            dependent: fk
        }
    );
    fx.apply(drop(p, DropAction::Cascade));
    assert!(fx.db.table_by_name("P").is_none());
    assert!(fx.db.index(fk).is_none());
    assert!(fx.db.table(c).unwrap().indexes.is_empty());
    // The name is free again.
    fx.apply(table("P"));
}

#[test]
fn test_drop_table_removes_its_parts() {
    let mut fx = Fixture::new();
    let (t, a, b) = fx.table_ab("T");
    let ix = fx.apply(unique(t, &[a]));
    let ck = fx.apply(check(t, Some(b), "b_ok", "b >= 0"));
    fx.apply(drop(t, DropAction::Restrict));
    for p in [t, a, b, ix, ck] {
        assert!(!fx.db.contains(p), "{p} survived");
    }
}

#[test]
fn test_drop_column() {
    let mut fx = Fixture::new();
    let (t, a, b) = fx.table_ab("T");
    let row = fx.apply(insert(t, &[(a, v_int(1)), (b, v_int(2))]));
    let ix = fx.apply(unique(t, &[b]));
    assert!(matches!(
        fx.try_apply(drop(b, DropAction::Restrict)),
        Err(ConstraintError::DropRestricted { dependent, .. }) if dependent == ix
    ));
    fx.apply(drop(b, DropAction::Cascade));
    assert_eq!(fx.db.row(t, row).unwrap().fields, fields(&[(a, v_int(1))]));
    assert_eq!(fx.db.table(t).unwrap().columns.len(), 1);
    assert!(fx.db.index(ix).is_none());
}

#[test]
fn test_checks() {
    let mut fx = Fixture::new();
    let (t, a, b) = fx.table_ab("T");
    fx.try_apply_with(insert(t, &[(b, v_int(-1))]), &NonNegative)
        .unwrap();
    // Existing rows are checked when the constraint arrives.
    let b_ok = check(t, Some(b), "b_ok", "b >= 0");
    assert!(matches!(
        fx.try_apply_with(b_ok, &NonNegative),
        Err(ConstraintError::CheckFailed { .. })
    ));
    let a_ok = check(t, Some(a), "a_ok", "a >= 0");
    let ck = fx.try_apply_with(a_ok, &NonNegative).unwrap();
    let err = fx
        .try_apply_with(insert(t, &[(a, v_int(-5))]), &NonNegative)
        .unwrap_err();
    assert_eq!(
        err,
        ConstraintError::CheckFailed {
            record: err.record(),
            check: ck
        }
    );
    fx.try_apply_with(insert(t, &[(a, v_int(5))]), &NonNegative)
        .unwrap();
}

#[test]
fn test_grant_and_revoke() {
    let mut fx = Fixture::new();
    let (t, _, _) = fx.table_ab("T");
    let u = fx.apply(user("fred"));
    fx.apply(grant(t, Some(u), Privilege::Select));
    fx.apply(grant(t, Some(u), Privilege::Insert));
    let held = fx.db.privileges(Some(u), t);
    assert!(held.contains(Privilege::Select));
    assert!(held.contains(Privilege::Insert));

    fx.apply(revoke(t, Some(u), Privilege::Select));
    let held = fx.db.privileges(Some(u), t);
    assert!(!held.contains(Privilege::Select));
    assert!(held.contains(Privilege::Insert));

    fx.apply(grant(t, None, Privilege::Select));
    assert!(fx.db.privileges(None, t).contains(Privilege::Select));
    let public = fx.db.role(predefined::PUBLIC).unwrap();
    assert!(public.privileges.contains_key(&t));

    fx.apply(drop(t, DropAction::Cascade));
    assert!(fx.db.privileges(Some(u), t).is_empty());
}

#[test]
fn test_first_user_owns_database() {
    let mut fx = Fixture::new();
    let fred = fx.apply(user("fred"));
    fx.apply(user("mary"));
    assert_eq!(fx.db.owner(), Some(fred));
    assert_eq!(
        fx.db.user_by_name("mary").map(|u| u.name.as_str()),
        Some("mary")
    );
    assert!(matches!(
        fx.try_apply(user("mary")),
        Err(ConstraintError::NameInUse { .. })
    ));
}

#[test]
fn test_rename_and_modify() {
    let mut fx = Fixture::new();
    let (t, a, _) = fx.table_ab("T");
    fx.apply(RenameDef {
        target: t,
        name: "U".into(),
    });
    assert!(fx.db.table_by_name("T").is_none());
    assert_eq!(fx.db.table_by_name("U").map(|t| t.defpos), Some(t));
    fx.apply(RenameDef {
        target: a,
        name: "z".into(),
    });
    assert_eq!(fx.db.column_by_name(t, "z").map(|c| c.defpos), Some(a));

    let f = fx.apply(ProcedureDef {
        version: ProcedureVersion::V2,
        name: "f".into(),
        arity: 1,
        return_type: Some(predefined::INTEGER),
        body: "return 1".into(),
    });
    assert_eq!(fx.db.lookup(predefined::SCHEMA_ROLE, "f$1"), Some(f));
    fx.apply(ModifyDef {
        target: f,
        name: "g".into(),
        body: "return 2".into(),
    });
    let proc = fx.db.procedure(f).unwrap();
    assert_eq!(proc.body, "return 2");
    assert_eq!(fx.db.lookup(predefined::SCHEMA_ROLE, "g$1"), Some(f));
    assert_eq!(fx.db.lookup(predefined::SCHEMA_ROLE, "f$1"), None);
}

#[test]
fn test_unknown_references_rejected() {
    let mut fx = Fixture::new();
    let nowhere = Position::Committed(9_999);
    assert!(matches!(
        fx.try_apply(column(nowhere, "a", 0)),
        Err(ConstraintError::UnknownObject { target, .. }) if target == nowhere
    ));
    assert!(matches!(
        fx.try_apply(insert(nowhere, &[(nowhere, v_str("x"))])),
        Err(ConstraintError::UnknownObject { .. })
    ));
}
