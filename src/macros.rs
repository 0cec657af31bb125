// (c) Copyright 2025 Helsing GmbH. All rights reserved.
/// Convenience macro for creating a [`Keys`](crate::Keys) path.
///
/// Every element is converted with `Key::from`, so integers become indices and strings become
/// names.
///
/// ```rust
/// # use convergent::{Key, path};
/// let keys = path!["items", 2];
/// assert_eq!(keys.as_slice(), [Key::from("items"), Key::Index(2)]);
/// assert!(path![].is_empty());
/// ```
#[macro_export]
macro_rules! path {
    ($($k:expr),* $(,)?) => {
        $crate::Keys::from_iter([$($crate::Key::from($k)),*])
    };
}

/// Convenience macro for creating an array [`Value`](crate::Value).
///
/// Every element is converted with `Value::from`, so arrays nest:
///
/// ```rust
/// # use convergent::{Value, array};
/// let v = array!["a", 1, array![true]];
/// assert_eq!(v.count().unwrap(), 3);
/// assert_eq!(array![].count().unwrap(), 0);
/// ```
#[macro_export]
macro_rules! array {
    ($($v:expr),* $(,)?) => {
        $crate::Value::Array($crate::Array::from_iter([$($crate::Value::from($v)),*]))
    };
}

#[cfg(test)]
mod tests {
    use crate::{Array, Key, Value};

    #[test]
    fn path_converts_keys() {
        let keys = path![0, "a", String::from("b")];
        assert_eq!(
            keys.into_vec(),
            vec![Key::Index(0), Key::from("a"), Key::from("b")]
        );
    }

    #[test]
    fn array_nests() {
        let v = array![1, array!["x"], Value::Nil,];
        let Value::Array(outer) = &v else {
            panic!("expected an array, got {v:?}");
        };
        assert_eq!(outer.len(), 3);
        assert_eq!(outer.get(1), Some(&Value::Array(Array::from(vec![Value::from("x")]))));
    }
}
