// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::{Collection, Key, Value, generic::Generic, string::check_range};
use crate::ChangeError;
use std::{fmt, ops::Index};

/// An ordered list of values, addressed by [`Key::Index`].
///
/// Elements may be [`Value::Nil`].
#[derive(Clone, Default, PartialEq)]
pub struct Array(Vec<Value>);

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.0
    }
}

impl From<Vec<Value>> for Array {
    fn from(value: Vec<Value>) -> Self {
        Self(value)
    }
}

impl FromIterator<Value> for Array {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Index<usize> for Array {
    type Output = Value;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<'a> IntoIterator for &'a Array {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.0).finish()
    }
}

impl Array {
    fn index_of(&self, key: &Key) -> Result<usize, ChangeError> {
        let index = key.as_index().ok_or_else(|| ChangeError::InvalidKey {
            key: key.clone(),
            value: "Array",
        })?;
        check_range(index, 1, self.0.len())?;
        Ok(index)
    }
}

impl Collection for Array {
    fn count(&self) -> usize {
        self.0.len()
    }

    fn slice(&self, offset: usize, count: usize) -> Result<Value, ChangeError> {
        check_range(offset, count, self.0.len())?;
        Ok(Value::Array(Array(self.0[offset..offset + count].to_vec())))
    }

    fn splice(&self, offset: usize, count: usize, insert: &Value) -> Result<Value, ChangeError> {
        let Value::Array(insert) = insert else {
            return Err(ChangeError::MismatchedCollection {
                expected: "Array",
                found: insert.type_name(),
            });
        };
        check_range(offset, count, self.0.len())?;
        let mut elements = self.0.clone();
        elements.splice(offset..offset + count, insert.0.iter().cloned());
        Ok(Value::Array(Array(elements)))
    }
}

impl Generic for Array {
    fn type_name(&self) -> &'static str {
        "Array"
    }

    fn get(&self, key: &Key) -> Result<Value, ChangeError> {
        Ok(self.0[self.index_of(key)?].clone())
    }

    fn set(&self, key: &Key, value: Value) -> Result<Value, ChangeError> {
        let index = self.index_of(key)?;
        let mut elements = self.0.clone();
        elements[index] = value;
        Ok(Value::Array(Array(elements)))
    }

    fn collection(&self) -> Option<&dyn Collection> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Change, Move, Replace, Splice, array, path};

    #[test]
    fn splice_and_move() {
        let v = array![1, 2, 3];
        let c = Change::from(Splice::new(1, array![2], array!["x", "y"]));
        assert_eq!(v.apply(&c).unwrap(), array![1, "x", "y", 3]);

        let c = Change::from(Move::new(0, 1, 2));
        assert_eq!(v.apply(&c).unwrap(), array![2, 3, 1]);
    }

    #[test]
    fn elements_may_be_nil() {
        let v = array![1, 2];
        let c = Change::path(path![0], Replace::new(1, Value::Nil));
        assert_eq!(v.apply(&c).unwrap(), array![Value::Nil, 2]);
    }

    #[test]
    fn names_do_not_address_arrays() {
        let v = array![1];
        let c = Change::path(path!["a"], Replace::new(1, 2));
        assert!(matches!(
            v.apply(&c).unwrap_err(),
            ChangeError::InvalidKey { value: "Array", .. }
        ));
    }

    #[test]
    fn index_out_of_bounds() {
        let v = array![1];
        let c = Change::path(path![1], Replace::new(1, 2));
        assert_eq!(
            v.apply(&c).unwrap_err(),
            ChangeError::OutOfBounds {
                offset: 1,
                count: 1,
                len: 1
            }
        );
    }

    #[test]
    fn move_out_of_bounds() {
        let v = array![1, 2];
        let err = v.apply(&Move::new(1, 1, 1).into()).unwrap_err();
        assert!(matches!(err, ChangeError::OutOfBounds { .. }));
        let err = v.apply(&Move::new(0, 1, -1).into()).unwrap_err();
        assert!(matches!(err, ChangeError::OutOfBounds { .. }));
    }
}
