// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::{Collection, Value, generic::Generic};
use crate::ChangeError;
use std::fmt;

/// A string whose offsets count UTF-8 bytes.
///
/// Every offset used to slice or splice an `S8` must fall on a character boundary.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct S8(String);

/// A string whose offsets count UTF-16 code units.
///
/// The units are stored as-is, so an `S16` may hold unpaired surrogates in the middle of an edit.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct S16(Vec<u16>);

pub(super) fn check_range(offset: usize, count: usize, len: usize) -> Result<(), ChangeError> {
    match offset.checked_add(count) {
        Some(end) if end <= len => Ok(()),
        _ => Err(ChangeError::OutOfBounds { offset, count, len }),
    }
}

impl S8 {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    fn check_boundary(&self, offset: usize) -> Result<(), ChangeError> {
        if self.0.is_char_boundary(offset) {
            Ok(())
        } else {
            Err(ChangeError::NotCharBoundary(offset))
        }
    }
}

impl From<&str> for S8 {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for S8 {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for S8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for S8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Collection for S8 {
    fn count(&self) -> usize {
        self.0.len()
    }

    fn slice(&self, offset: usize, count: usize) -> Result<Value, ChangeError> {
        check_range(offset, count, self.0.len())?;
        self.check_boundary(offset)?;
        self.check_boundary(offset + count)?;
        Ok(Value::S8(S8(self.0[offset..offset + count].to_string())))
    }

    fn splice(&self, offset: usize, count: usize, insert: &Value) -> Result<Value, ChangeError> {
        let Value::S8(insert) = insert else {
            return Err(ChangeError::MismatchedCollection {
                expected: "S8",
                found: insert.type_name(),
            });
        };
        check_range(offset, count, self.0.len())?;
        self.check_boundary(offset)?;
        self.check_boundary(offset + count)?;
        let mut s = String::with_capacity(self.0.len() - count + insert.0.len());
        s.push_str(&self.0[..offset]);
        s.push_str(&insert.0);
        s.push_str(&self.0[offset + count..]);
        Ok(Value::S8(S8(s)))
    }
}

impl Generic for S8 {
    fn type_name(&self) -> &'static str {
        "S8"
    }

    fn collection(&self) -> Option<&dyn Collection> {
        Some(self)
    }
}

impl S16 {
    pub fn from_units(units: Vec<u16>) -> Self {
        Self(units)
    }

    pub fn units(&self) -> &[u16] {
        &self.0
    }

    /// Decodes the string, returning `None` if it contains unpaired surrogates.
    pub fn to_string_checked(&self) -> Option<String> {
        String::from_utf16(&self.0).ok()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(&self.0)
    }

    /// Converts a byte offset into `s` to a UTF-16 offset.
    pub fn utf16_offset(s: &str, byte_offset: usize) -> Result<usize, ChangeError> {
        let prefix = s
            .get(..byte_offset)
            .ok_or(ChangeError::NotCharBoundary(byte_offset))?;
        Ok(prefix.encode_utf16().count())
    }

    /// Converts a char offset into `s` to a UTF-16 offset. Offsets past the end clamp.
    pub fn utf16_offset_of_char(s: &str, char_offset: usize) -> usize {
        s.chars().take(char_offset).map(char::len_utf16).sum()
    }
}

impl From<&str> for S16 {
    fn from(value: &str) -> Self {
        Self(value.encode_utf16().collect())
    }
}

impl From<String> for S16 {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl fmt::Debug for S16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{:?}", self.to_string_lossy())
    }
}

impl Collection for S16 {
    fn count(&self) -> usize {
        self.0.len()
    }

    fn slice(&self, offset: usize, count: usize) -> Result<Value, ChangeError> {
        check_range(offset, count, self.0.len())?;
        Ok(Value::S16(S16(self.0[offset..offset + count].to_vec())))
    }

    fn splice(&self, offset: usize, count: usize, insert: &Value) -> Result<Value, ChangeError> {
        let Value::S16(insert) = insert else {
            return Err(ChangeError::MismatchedCollection {
                expected: "S16",
                found: insert.type_name(),
            });
        };
        check_range(offset, count, self.0.len())?;
        let mut units = self.0.clone();
        units.splice(offset..offset + count, insert.0.iter().copied());
        Ok(Value::S16(S16(units)))
    }
}

impl Generic for S16 {
    fn type_name(&self) -> &'static str {
        "S16"
    }

    fn collection(&self) -> Option<&dyn Collection> {
        Some(self)
    }
}
