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

use num_traits::{FromPrimitive, ToPrimitive};
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{BitOr, BitOrAssign};

/// A set of flags from a `Primitive` enum whose discriminants are bit indices.
///
/// Stored as the raw `u32` mask, which is also its on-disk form, so bit `n` of the log encoding is
/// the enum member with discriminant `n`.
pub struct BitEnum<T: ToPrimitive> {
    value: u32,
    phantom: PhantomData<T>,
}

impl<T: ToPrimitive> Clone for BitEnum<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ToPrimitive> Copy for BitEnum<T> {}

impl<T: ToPrimitive> PartialEq for BitEnum<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: ToPrimitive> Eq for BitEnum<T> {}

impl<T: ToPrimitive> Hash for BitEnum<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state)
    }
}

impl<T: ToPrimitive> BitEnum<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            value: 0,
            phantom: PhantomData,
        }
    }

    #[must_use]
    pub fn from_u32(value: u32) -> Self {
        Self {
            value,
            phantom: PhantomData,
        }
    }

    #[must_use]
    pub fn to_u32(&self) -> u32 {
        self.value
    }

    pub fn new_with(value: T) -> Self {
        let mut s = Self::new();
        s.set(value);
        s
    }

    fn bit(value: &T) -> u32 {
        // Discriminants are declared in 0..32 for every flag enum used with this type.
        1 << value.to_u32().unwrap_or(0)
    }

    pub fn set(&mut self, value: T) {
        self.value |= Self::bit(&value);
    }

    pub fn clear(&mut self, value: T) {
        self.value &= !Self::bit(&value);
    }

    pub fn contains(&self, value: T) -> bool {
        self.value & Self::bit(&value) != 0
    }

    pub fn contains_all(&self, values: BitEnum<T>) -> bool {
        values.value & self.value == values.value
    }

    pub fn intersects(&self, values: BitEnum<T>) -> bool {
        values.value & self.value != 0
    }

    pub fn is_empty(&self) -> bool {
        self.value == 0
    }

    #[must_use]
    pub fn union(&self, other: BitEnum<T>) -> Self {
        Self::from_u32(self.value | other.value)
    }

    #[must_use]
    pub fn difference(&self, other: BitEnum<T>) -> Self {
        Self::from_u32(self.value & !other.value)
    }

    #[must_use]
    pub fn intersection(&self, other: BitEnum<T>) -> Self {
        Self::from_u32(self.value & other.value)
    }
}

impl<T: ToPrimitive + FromPrimitive> BitEnum<T> {
    /// The members present, lowest bit first.
    pub fn members(&self) -> Vec<T> {
        (0..32)
            .filter(|b| self.value & (1 << b) != 0)
            .filter_map(T::from_u32)
            .collect()
    }
}

impl<T: ToPrimitive + FromPrimitive + Debug> Debug for BitEnum<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.members()).finish()
    }
}

impl<T: ToPrimitive> BitOr for BitEnum<T> {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl<T: ToPrimitive> Default for BitEnum<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ToPrimitive> BitOrAssign<T> for BitEnum<T> {
    fn bitor_assign(&mut self, rhs: T) {
        self.set(rhs);
    }
}

impl<T: ToPrimitive> BitOr<T> for BitEnum<T> {
    type Output = Self;

    fn bitor(self, rhs: T) -> Self::Output {
        let mut s = self;
        s.set(rhs);
        s
    }
}

impl<T: ToPrimitive> From<T> for BitEnum<T> {
    fn from(value: T) -> Self {
        Self::new_with(value)
    }
}
