// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use crate::OrdKeyError;
use num_bigint::BigUint;
use num_traits::{One, Zero};
use std::{cmp::Ordering, fmt, str::FromStr};

const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// The largest exponent a parsed key may carry. Comparing keys shifts numerators by the
/// difference of their exponents, so this also bounds the memory a comparison needs.
const MAX_EXPONENT: u64 = 1 << 20;

/// A non-negative dyadic rational used to order sequence items.
///
/// There is always room for another key between any two distinct keys, so items can be
/// inserted anywhere without renumbering their neighbours.
///
/// The value is `numerator / 2^exponent`, kept in lowest terms so equal values have equal
/// representations. The string encoding is `"{exponent + 1},{numerator in base62}"`, with zero
/// encoded as the empty string.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(::serde::Deserialize, ::serde::Serialize),
    serde(try_from = "String", into = "String")
)]
pub struct OrdKey {
    numerator: BigUint,
    exponent: u64,
}

impl OrdKey {
    /// The smallest key.
    pub fn zero() -> Self {
        Self::default()
    }

    fn new(numerator: BigUint, exponent: u64) -> Self {
        if numerator.is_zero() {
            return Self::zero();
        }
        let shift = numerator.trailing_zeros().unwrap_or(0).min(exponent);
        Self {
            numerator: numerator >> shift,
            exponent: exponent - shift,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.numerator.is_zero()
    }

    /// The numerator scaled to the denominator `2^exponent`, which must be at least as large as
    /// this key's own.
    fn scaled(&self, exponent: u64) -> BigUint {
        &self.numerator << (exponent - self.exponent)
    }

    /// The integer part plus one.
    pub fn next(&self) -> OrdKey {
        let floor = &self.numerator >> self.exponent;
        Self::new(floor + 1u32, 0)
    }

    /// The integer part of the ceiling minus one, or `None` for zero.
    pub fn prev(&self) -> Option<OrdKey> {
        if self.is_zero() {
            return None;
        }
        let unit = BigUint::one() << self.exponent;
        let ceil = (&self.numerator + &unit - 1u32) >> self.exponent;
        Some(Self::new(ceil - 1u32, 0))
    }

    /// Returns `n` keys strictly between `self` and `other`, in ascending order.
    ///
    /// The keys subdivide the interval evenly. The bounds may be given in either order; equal
    /// bounds leave no room and yield no keys.
    pub fn between(&self, other: &OrdKey, n: usize) -> Vec<OrdKey> {
        let (lo, hi) = match self.cmp(other) {
            Ordering::Less => (self, other),
            Ordering::Greater => (other, self),
            Ordering::Equal => return Vec::new(),
        };
        if n == 0 {
            return Vec::new();
        }
        let exponent = lo.exponent.max(hi.exponent);
        let (a, b) = (lo.scaled(exponent), hi.scaled(exponent));
        let parts = BigUint::from(n) + 1u32;
        // Refine the denominator until every step is at least one unit wide.
        let mut gap = b - &a;
        let mut refine = 0u64;
        while gap < parts {
            gap <<= 1u32;
            refine += 1;
        }
        let base = a << refine;
        (1..=n)
            .map(|i| {
                let step = &gap * BigUint::from(i) / &parts;
                Self::new(&base + step, exponent + refine)
            })
            .collect()
    }
}

impl PartialOrd for OrdKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrdKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let exponent = self.exponent.max(other.exponent);
        self.scaled(exponent).cmp(&other.scaled(exponent))
    }
}

impl fmt::Display for OrdKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return Ok(());
        }
        write!(f, "{},", self.exponent + 1)?;
        for digit in self.numerator.to_radix_be(62) {
            write!(f, "{}", ALPHABET[usize::from(digit)] as char)?;
        }
        Ok(())
    }
}

impl fmt::Debug for OrdKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string())
    }
}

impl FromStr for OrdKey {
    type Err = OrdKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::zero());
        }
        let (exponent, numerator) = s
            .split_once(',')
            .ok_or_else(|| OrdKeyError::MissingSeparator(s.to_string()))?;
        let exponent = exponent
            .parse::<u64>()
            .ok()
            .and_then(|e| e.checked_sub(1))
            .ok_or_else(|| OrdKeyError::InvalidExponent(s.to_string()))?;
        let digits = numerator
            .bytes()
            .map(|c| ALPHABET.iter().position(|&a| a == c).map(|d| d as u8))
            .collect::<Option<Vec<u8>>>()
            .filter(|digits| !digits.is_empty())
            .ok_or_else(|| OrdKeyError::InvalidNumerator(s.to_string()))?;
        let numerator = BigUint::from_radix_be(&digits, 62)
            .ok_or_else(|| OrdKeyError::InvalidNumerator(s.to_string()))?;
        let key = Self::new(numerator, exponent);
        if key.exponent > MAX_EXPONENT {
            return Err(OrdKeyError::InvalidExponent(s.to_string()));
        }
        Ok(key)
    }
}

impl TryFrom<String> for OrdKey {
    type Error = OrdKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OrdKey> for String {
    fn from(value: OrdKey) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    fn key(s: &str) -> OrdKey {
        s.parse().unwrap()
    }

    #[test]
    fn encoding() {
        assert_snapshot!(OrdKey::zero(), @"");
        assert_snapshot!(OrdKey::zero().next(), @"1,1");
        let halves = OrdKey::zero().between(&OrdKey::zero().next(), 3);
        assert_snapshot!(format!("{halves:?}"), @r#"["3,1", "2,1", "3,3"]"#);
        assert_snapshot!(OrdKey::new(BigUint::from(62u32), 0), @"1,10");
    }

    #[test]
    fn parse_normalizes() {
        assert_eq!(key("3,2"), key("2,1"));
        assert_eq!(key("1,0"), OrdKey::zero());
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(
            "12".parse::<OrdKey>(),
            Err(OrdKeyError::MissingSeparator(_))
        ));
        assert!(matches!(
            "0,1".parse::<OrdKey>(),
            Err(OrdKeyError::InvalidExponent(_))
        ));
        assert!(matches!(
            "1,+".parse::<OrdKey>(),
            Err(OrdKeyError::InvalidNumerator(_))
        ));
        assert!(matches!(
            "1,".parse::<OrdKey>(),
            Err(OrdKeyError::InvalidNumerator(_))
        ));
    }

    #[test]
    fn huge_exponents_are_rejected() {
        assert!(matches!(
            "18446744073709551615,1".parse::<OrdKey>(),
            Err(OrdKeyError::InvalidExponent(_))
        ));
        assert!(matches!(
            format!("{},1", MAX_EXPONENT + 2).parse::<OrdKey>(),
            Err(OrdKeyError::InvalidExponent(_))
        ));
        // Within the bound, and a numerator that cancels down into it.
        let edge = key(&format!("{},1", MAX_EXPONENT + 1));
        assert!(edge < key("1,1"));
        assert_eq!(key(&format!("{},2", MAX_EXPONENT + 2)), edge);
    }

    #[test]
    fn next_and_prev() {
        let half = key("2,1");
        assert_eq!(half.next(), key("1,1"));
        assert_eq!(half.prev(), Some(OrdKey::zero()));
        assert_eq!(key("1,5").prev(), Some(key("1,4")));
        assert_eq!(key("1,5").next(), key("1,6"));
        assert_eq!(OrdKey::zero().prev(), None);
    }

    #[test]
    fn between_equal_bounds_is_empty() {
        let k = key("2,1");
        assert!(k.between(&k, 3).is_empty());
        assert!(k.between(&k.next(), 0).is_empty());
    }

    #[test]
    fn between_accepts_reversed_bounds() {
        let (a, b) = (key("1,1"), key("1,2"));
        assert_eq!(b.between(&a, 2), a.between(&b, 2));
    }

    #[test]
    fn string_round_trip() {
        let mut k = OrdKey::zero();
        for _ in 0..50 {
            k = k.between(&k.next(), 1).remove(0);
            assert_eq!(key(&k.to_string()), k);
        }
    }

    #[quickcheck]
    fn between_is_strictly_ordered(a: u32, a_exp: u8, b: u32, b_exp: u8, n: u8) -> bool {
        let a = OrdKey::new(BigUint::from(a), u64::from(a_exp % 70));
        let b = OrdKey::new(BigUint::from(b), u64::from(b_exp % 70));
        let n = usize::from(n % 16);
        let keys = a.between(&b, n);
        let (lo, hi) = if a <= b { (&a, &b) } else { (&b, &a) };
        if a == b {
            return keys.is_empty();
        }
        keys.len() == n
            && keys.iter().all(|k| lo < k && k < hi)
            && keys.windows(2).all(|w| w[0] < w[1])
    }

    #[quickcheck]
    fn next_and_prev_bracket(a: u64, exp: u8) -> bool {
        let k = OrdKey::new(BigUint::from(a), u64::from(exp % 70));
        k < k.next() && k.prev().is_none_or(|p| p < k)
    }
}
