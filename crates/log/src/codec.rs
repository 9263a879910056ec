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

//! Big-endian primitive encoding plus the position translation used while a transaction is being
//! laid out in the log.

use crate::error::{DecodingError, EncodingError};
use ahash::AHashMap;
use num_traits::{FromPrimitive, ToPrimitive};
use quire_common::util::BitEnum;
use quire_common::{PENDING_BASE, Position, Value, ValueType};
use std::collections::BTreeMap;

/// Row contents: column position to value.
pub type Fields = BTreeMap<Position, Value>;

/// Accumulates the bytes of one transaction, destined for the end of the log at `base`.
///
/// As each record is started its pending position is bound to the offset it will occupy, and
/// every position written after that goes through [`Writer::fix`].
pub struct Writer {
    buf: Vec<u8>,
    base: u64,
    segment: u64,
    fixes: AHashMap<u64, u64>,
}

impl Writer {
    pub fn new(base: u64) -> Self {
        Self {
            buf: Vec::new(),
            base,
            segment: base,
            fixes: AHashMap::new(),
        }
    }

    /// The log offset the next byte will land at.
    pub fn position(&self) -> u64 {
        self.base + self.buf.len() as u64
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    /// Offset of the transaction header the records being written belong to.
    pub fn segment(&self) -> u64 {
        self.segment
    }

    pub fn set_segment(&mut self, segment: u64) {
        self.segment = segment;
    }

    /// Start a record at the current offset, binding `ppos` to it if it is pending.
    pub fn begin_record(&mut self, ppos: Position) -> Position {
        let at = self.position();
        if let Position::Pending(n) = ppos {
            self.fixes.insert(n, at);
        }
        Position::Committed(at)
    }

    /// Map a position to its final value. Committed positions and pending positions whose
    /// record has not been started yet come back unchanged, so `fix(fix(p)) == fix(p)`.
    pub fn fix(&self, pos: Position) -> Position {
        match pos {
            Position::Pending(n) => match self.fixes.get(&n) {
                Some(at) => Position::Committed(*at),
                None => pos,
            },
            committed => committed,
        }
    }

    /// True if `pos` names something whose record starts strictly before the current offset.
    pub fn committed(&self, pos: Position) -> bool {
        match self.fix(pos) {
            Position::Committed(at) => at < self.position(),
            Position::Pending(_) => false,
        }
    }

    /// The first of `references` not yet committed, if any.
    pub fn dependent(&self, references: &[Position]) -> Option<Position> {
        references.iter().copied().find(|p| !self.committed(*p))
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_bool(&mut self, v: bool) {
        self.buf.push(v as u8);
    }

    pub fn put_int(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_long(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_string(&mut self, s: &str) -> Result<(), EncodingError> {
        let len = i32::try_from(s.len())
            .map_err(|_| EncodingError::StringTooLong(s.len()))?;
        self.put_int(len);
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }

    pub fn put_flags<T: ToPrimitive>(&mut self, flags: BitEnum<T>) {
        self.put_int(flags.to_u32() as i32);
    }

    /// Enums are persisted as their discriminant in an int.
    pub fn put_enum<T: ToPrimitive>(&mut self, v: T) {
        self.put_int(v.to_i32().unwrap_or(-1));
    }

    pub fn put_position(&mut self, pos: Position) -> Result<(), EncodingError> {
        match self.fix(pos) {
            Position::Committed(at) => {
                self.put_long(at as i64);
                Ok(())
            }
            pending => Err(EncodingError::UnresolvedPosition(pending)),
        }
    }

    pub fn put_opt_position(&mut self, pos: Option<Position>) -> Result<(), EncodingError> {
        match pos {
            Some(p) => self.put_position(p),
            None => {
                self.put_long(-1);
                Ok(())
            }
        }
    }

    fn put_count(&mut self, n: usize) -> Result<(), EncodingError> {
        let n = i32::try_from(n)
            .map_err(|_| EncodingError::SequenceTooLong(n))?;
        self.put_int(n);
        Ok(())
    }

    pub fn put_positions(&mut self, positions: &[Position]) -> Result<(), EncodingError> {
        self.put_count(positions.len())?;
        for p in positions {
            self.put_position(*p)?;
        }
        Ok(())
    }

    pub fn put_value(&mut self, v: &Value) -> Result<(), EncodingError> {
        self.put_u8(v.value_type() as u8);
        match v {
            Value::Null => {}
            Value::Bool(b) => self.put_bool(*b),
            Value::Int(i) => self.put_long(*i),
            Value::Text(s) => self.put_string(s)?,
            Value::Blob(b) => {
                self.put_count(b.len())?;
                self.buf.extend_from_slice(b);
            }
        }
        Ok(())
    }

    pub fn put_fields(&mut self, fields: &Fields) -> Result<(), EncodingError> {
        self.put_count(fields.len())?;
        for (column, value) in fields {
            self.put_position(*column)?;
            self.put_value(value)?;
        }
        Ok(())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Decodes records from a slice of the log which starts at `base`.
pub struct Reader<'a> {
    data: &'a [u8],
    base: u64,
    offset: usize,
    segment: Option<Position>,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8], base: u64) -> Self {
        Self {
            data,
            base,
            offset: 0,
            segment: None,
        }
    }

    pub fn position(&self) -> u64 {
        self.base + self.offset as u64
    }

    pub fn is_at_end(&self) -> bool {
        self.offset >= self.data.len()
    }

    /// The transaction header most recently read, which the records that follow belong to.
    pub fn segment(&self) -> Option<Position> {
        self.segment
    }

    pub fn set_segment(&mut self, segment: Position) {
        self.segment = Some(segment);
    }

    fn take(&mut self, wanted: usize) -> Result<&'a [u8], DecodingError> {
        let available = self.data.len() - self.offset;
        if available < wanted {
            return Err(DecodingError::Truncated {
                offset: self.position(),
                wanted,
                available,
            });
        }
        let bytes = &self.data[self.offset..self.offset + wanted];
        self.offset += wanted;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodingError> {
        let mut a = [0u8; N];
        a.copy_from_slice(self.take(N)?);
        Ok(a)
    }

    pub fn get_u8(&mut self) -> Result<u8, DecodingError> {
        Ok(self.take(1)?[0])
    }

    pub fn get_bool(&mut self) -> Result<bool, DecodingError> {
        Ok(self.get_u8()? != 0)
    }

    pub fn get_int(&mut self) -> Result<i32, DecodingError> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    pub fn get_long(&mut self) -> Result<i64, DecodingError> {
        Ok(i64::from_be_bytes(self.take_array()?))
    }

    fn get_count(&mut self, what: &'static str) -> Result<usize, DecodingError> {
        let offset = self.position();
        let n = self.get_int()?;
        usize::try_from(n).map_err(|_| DecodingError::InvalidField {
            offset,
            what,
            value: n as i64,
        })
    }

    pub fn get_string(&mut self) -> Result<String, DecodingError> {
        let len = self.get_count("string length")?;
        let offset = self.position();
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| DecodingError::InvalidString { offset })
    }

    pub fn get_flags<T: ToPrimitive>(&mut self) -> Result<BitEnum<T>, DecodingError> {
        Ok(BitEnum::from_u32(self.get_int()? as u32))
    }

    pub fn get_enum<T: FromPrimitive>(&mut self, what: &'static str) -> Result<T, DecodingError> {
        let offset = self.position();
        let v = self.get_int()?;
        T::from_i32(v).ok_or(DecodingError::InvalidField {
            offset,
            what,
            value: v as i64,
        })
    }

    pub fn get_position(&mut self) -> Result<Position, DecodingError> {
        let offset = self.position();
        let value = self.get_long()?;
        if !(0..PENDING_BASE).contains(&value) {
            return Err(DecodingError::InvalidPosition { offset, value });
        }
        Ok(Position::Committed(value as u64))
    }

    pub fn get_opt_position(&mut self) -> Result<Option<Position>, DecodingError> {
        let offset = self.position();
        match self.get_long()? {
            -1 => Ok(None),
            value if (0..PENDING_BASE).contains(&value) => {
                Ok(Some(Position::Committed(value as u64)))
            }
            value => Err(DecodingError::InvalidPosition { offset, value }),
        }
    }

    pub fn get_positions(&mut self) -> Result<Vec<Position>, DecodingError> {
        let n = self.get_count("position count")?;
        (0..n).map(|_| self.get_position()).collect()
    }

    pub fn get_value(&mut self) -> Result<Value, DecodingError> {
        let offset = self.position();
        let tag = self.get_u8()?;
        let Some(vt) = ValueType::from_u8(tag) else {
            return Err(DecodingError::UnknownValueType { offset, tag });
        };
        Ok(match vt {
            ValueType::Null => Value::Null,
            ValueType::Bool => Value::Bool(self.get_bool()?),
            ValueType::Int => Value::Int(self.get_long()?),
            ValueType::Text => Value::Text(self.get_string()?),
            ValueType::Blob => {
                let len = self.get_count("blob length")?;
                Value::Blob(self.take(len)?.to_vec())
            }
        })
    }

    pub fn get_fields(&mut self) -> Result<Fields, DecodingError> {
        let n = self.get_count("field count")?;
        let mut fields = Fields::new();
        for _ in 0..n {
            let column = self.get_position()?;
            let value = self.get_value()?;
            fields.insert(column, value);
        }
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_common::{v_int, v_str};

    #[test]
    fn test_big_endian_layout() {
        let mut w = Writer::new(0);
        w.put_int(0x01020304);
        w.put_long(-2);
        w.put_string("ab").unwrap();
        assert_eq!(
            w.bytes(),
            &[
                1, 2, 3, 4, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe, 0, 0, 0, 2, b'a', b'b'
            ]
        );
    }

    #[test]
    fn test_primitives_read_back() {
        let mut w = Writer::new(100);
        w.put_int(-7);
        w.put_string("héllo").unwrap();
        w.put_opt_position(None).unwrap();
        w.put_position(Position::Committed(42)).unwrap();
        w.put_value(&v_str("x")).unwrap();
        w.put_value(&Value::Blob(vec![1, 2, 3])).unwrap();
        let bytes = w.into_bytes();

        let mut r = Reader::new(&bytes, 100);
        assert_eq!(r.get_int().unwrap(), -7);
        assert_eq!(r.get_string().unwrap(), "héllo");
        assert_eq!(r.get_opt_position().unwrap(), None);
        assert_eq!(r.get_position().unwrap(), Position::Committed(42));
        assert_eq!(r.get_value().unwrap(), v_str("x"));
        assert_eq!(r.get_value().unwrap(), Value::Blob(vec![1, 2, 3]));
        assert!(r.is_at_end());
    }

    #[test]
    fn test_fix_is_idempotent() {
        let mut w = Writer::new(500);
        let p = Position::Pending(3);
        assert_eq!(w.fix(p), p);
        w.put_long(0);
        let at = w.begin_record(p);
        assert_eq!(at, Position::Committed(508));
        assert_eq!(w.fix(p), at);
        assert_eq!(w.fix(w.fix(p)), w.fix(p));
        assert_eq!(w.fix(Position::Committed(9)), Position::Committed(9));
    }

    #[test]
    fn test_committed_and_dependent() {
        let mut w = Writer::new(200);
        let a = Position::Pending(1);
        let b = Position::Pending(2);
        assert!(w.committed(Position::Committed(150)));
        assert!(!w.committed(a));
        assert_eq!(w.dependent(&[Position::Committed(16), a, b]), Some(a));

        w.begin_record(a);
        // Not committed until something has been written past its start.
        assert!(!w.committed(a));
        w.put_u8(0);
        assert!(w.committed(a));
        assert_eq!(w.dependent(&[a, b]), Some(b));
    }

    #[test]
    fn test_pending_position_refused() {
        let mut w = Writer::new(0);
        assert_eq!(
            w.put_position(Position::Pending(5)),
            Err(EncodingError::UnresolvedPosition(Position::Pending(5)))
        );
    }

    #[test]
    fn test_truncated_and_invalid() {
        let bytes = [0u8, 0, 0];
        let mut r = Reader::new(&bytes, 64);
        assert_eq!(
            r.get_int(),
            Err(DecodingError::Truncated {
                offset: 64,
                wanted: 4,
                available: 3
            })
        );

        let bytes = (-5i64).to_be_bytes();
        let mut r = Reader::new(&bytes, 0);
        assert!(matches!(
            r.get_position(),
            Err(DecodingError::InvalidPosition { value: -5, .. })
        ));

        let bytes = [9u8];
        let mut r = Reader::new(&bytes, 0);
        assert!(matches!(
            r.get_value(),
            Err(DecodingError::UnknownValueType { tag: 9, .. })
        ));
    }

    #[test]
    fn test_fields() {
        let mut fields = Fields::new();
        fields.insert(Position::Committed(30), v_int(1));
        fields.insert(Position::Committed(20), Value::Null);
        let mut w = Writer::new(0);
        w.put_fields(&fields).unwrap();
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes, 0);
        assert_eq!(r.get_fields().unwrap(), fields);
    }
}
