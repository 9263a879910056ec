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

//! Flag enums persisted as bitmasks. Discriminants are bit indices and must never change.

use crate::util::BitEnum;
use enum_primitive_derive::Primitive;
use strum::{Display, EnumString};

#[derive(Debug, Ord, PartialOrd, Copy, Clone, Eq, PartialEq, Hash, Primitive, Display, EnumString)]
pub enum Privilege {
    Select = 0,
    Insert = 1,
    Delete = 2,
    Update = 3,
    References = 4,
    Execute = 5,
    Owner = 6,
    UseRole = 7,
    Usage = 8,
    Unused = 9,
    GrantSelect = 10,
    GrantInsert = 11,
    GrantDelete = 12,
    GrantUpdate = 13,
    GrantReferences = 14,
    GrantExecute = 15,
    GrantOwner = 16,
    AdminRole = 17,
    GrantUsage = 18,
    GrantHandler = 19,
    Under = 20,
    GrantUnder = 21,
}

pub type Privileges = BitEnum<Privilege>;

#[derive(Debug, Ord, PartialOrd, Copy, Clone, Eq, PartialEq, Hash, Primitive, Display, EnumString)]
pub enum ConstraintType {
    PrimaryKey = 0,
    ForeignKey = 1,
    Unique = 2,
    Desc = 3,
    ConstrainUpdate = 4,
    CascadeUpdate = 5,
    SetDefaultUpdate = 6,
    SetNullUpdate = 7,
    ConstrainDelete = 8,
    CascadeDelete = 9,
    SetDefaultDelete = 10,
    SetNullDelete = 11,
    SystemTimeIndex = 12,
    ApplicationTimeIndex = 13,
}

pub type Constraints = BitEnum<ConstraintType>;

/// What to do with referencing rows when a referenced key goes away or changes.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ReferentialAction {
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl BitEnum<ConstraintType> {
    /// Whether this index is a primary key or unique constraint.
    pub fn is_unique(&self) -> bool {
        self.contains(ConstraintType::PrimaryKey) || self.contains(ConstraintType::Unique)
    }

    pub fn on_delete(&self) -> ReferentialAction {
        if self.contains(ConstraintType::CascadeDelete) {
            ReferentialAction::Cascade
        } else if self.contains(ConstraintType::SetNullDelete) {
            ReferentialAction::SetNull
        } else if self.contains(ConstraintType::SetDefaultDelete) {
            ReferentialAction::SetDefault
        } else {
            ReferentialAction::Restrict
        }
    }

    pub fn on_update(&self) -> ReferentialAction {
        if self.contains(ConstraintType::CascadeUpdate) {
            ReferentialAction::Cascade
        } else if self.contains(ConstraintType::SetNullUpdate) {
            ReferentialAction::SetNull
        } else if self.contains(ConstraintType::SetDefaultUpdate) {
            ReferentialAction::SetDefault
        } else {
            ReferentialAction::Restrict
        }
    }

    /// The bits a RefAction record is allowed to replace.
    pub fn referential_bits() -> Self {
        BitEnum::new_with(ConstraintType::ConstrainUpdate)
            | ConstraintType::CascadeUpdate
            | ConstraintType::SetDefaultUpdate
            | ConstraintType::SetNullUpdate
            | ConstraintType::ConstrainDelete
            | ConstraintType::CascadeDelete
            | ConstraintType::SetDefaultDelete
            | ConstraintType::SetNullDelete
    }
}

#[derive(Debug, Ord, PartialOrd, Copy, Clone, Eq, PartialEq, Hash, Primitive, Display, EnumString)]
pub enum TriggerType {
    Insert = 0,
    Update = 1,
    Delete = 2,
    Before = 3,
    After = 4,
    EachRow = 5,
    Instead = 6,
    EachStatement = 7,
    Deferred = 8,
}

pub type TriggerTypes = BitEnum<TriggerType>;

/// Carried by Drop records.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Primitive, Display, Default)]
pub enum DropAction {
    #[default]
    Restrict = 0,
    Cascade = 1,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(ConstraintType::PrimaryKey, 1; "primary key")]
    #[test_case(ConstraintType::ForeignKey, 2; "foreign key")]
    #[test_case(ConstraintType::CascadeDelete, 512; "cascade delete")]
    #[test_case(ConstraintType::ApplicationTimeIndex, 8192; "application time")]
    fn test_constraint_masks(c: ConstraintType, mask: u32) {
        assert_eq!(Constraints::new_with(c).to_u32(), mask);
    }

    #[test_case(TriggerType::Before, 8)]
    #[test_case(TriggerType::Deferred, 256)]
    fn test_trigger_masks(t: TriggerType, mask: u32) {
        assert_eq!(TriggerTypes::new_with(t).to_u32(), mask);
    }

    #[test]
    fn test_privilege_masks() {
        assert_eq!(
            Privileges::new_with(Privilege::GrantUnder).to_u32(),
            0x200000
        );
        assert_eq!(Privileges::new_with(Privilege::Usage).to_u32(), 0x100);
    }

    #[test]
    fn test_referential_actions() {
        let c = Constraints::new_with(ConstraintType::ForeignKey) | ConstraintType::CascadeDelete;
        assert_eq!(c.on_delete(), ReferentialAction::Cascade);
        assert_eq!(c.on_update(), ReferentialAction::Restrict);
        let c = Constraints::new_with(ConstraintType::ForeignKey) | ConstraintType::SetNullUpdate;
        assert_eq!(c.on_update(), ReferentialAction::SetNull);
        assert!(!c.is_unique());
    }
}
