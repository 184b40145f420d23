//! Keys and key ranges
//!
//! A [`Key`] is the ordered value a record is stored under, either in its
//! collection (primary key) or in a secondary index. Keys of different kinds
//! compare by kind first: every `Int` sorts before every `String`, which sorts
//! before every `Array`. Arrays compare element by element.
//!
//! Keys are pulled out of JSON records through a key path: a field name, or a
//! dotted sequence of field names for nested objects (`"meta.created"`).
//!
//! Numeric keys are integers that fit in an `i64`. Fractional numbers and
//! integers above `i64::MAX` are not keys; a record keyed by one is rejected
//! with `InvalidRecord`.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::ops::Bound;

/// Ordered key value
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    /// Integer key
    Int(i64),
    /// String key, ordered by code point
    String(String),
    /// Compound key
    Array(Vec<Key>),
}

impl Key {
    /// Convert a JSON value into a key
    ///
    /// Returns None for values that cannot act as keys: null, booleans,
    /// objects, numbers outside the `i64` integers, and arrays containing any
    /// of those.
    pub fn from_json(value: &Value) -> Option<Key> {
        match value {
            Value::Number(n) => n.as_i64().map(Key::Int),
            Value::String(s) => Some(Key::String(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(Key::from_json)
                .collect::<Option<Vec<_>>>()
                .map(Key::Array),
            _ => None,
        }
    }

    /// Extract the key stored at `key_path` in `record`
    ///
    /// Returns None when the path is missing or holds something that is not a key.
    pub fn extract(record: &Value, key_path: &str) -> Option<Key> {
        let mut current = record;
        for segment in key_path.split('.') {
            current = current.as_object()?.get(segment)?;
        }
        Key::from_json(current)
    }

    /// Like [`Key::extract`] but reports why extraction failed
    pub fn require(record: &Value, key_path: &str) -> StoreResult<Key> {
        if let Some(key) = Key::extract(record, key_path) {
            return Ok(key);
        }
        let found = key_path
            .split('.')
            .try_fold(record, |current, segment| current.as_object()?.get(segment));
        let reason = match found {
            Some(Value::Number(n)) => format!(
                "key {} at key path '{}' is not an integer in the i64 range",
                n, key_path
            ),
            _ => format!("no valid key at key path '{}'", key_path),
        };
        Err(StoreError::invalid_record(reason))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(i) => write!(f, "{}", i),
            Key::String(s) => write!(f, "{:?}", s),
            Key::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<i64> for Key {
    fn from(v: i64) -> Self {
        Key::Int(v)
    }
}

impl From<i32> for Key {
    fn from(v: i32) -> Self {
        Key::Int(v as i64)
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Key::String(v.to_string())
    }
}

impl From<String> for Key {
    fn from(v: String) -> Self {
        Key::String(v)
    }
}

impl<T: Into<Key>> From<Vec<T>> for Key {
    fn from(v: Vec<T>) -> Self {
        Key::Array(v.into_iter().map(Into::into).collect())
    }
}

// =============================================================================
// KeyRange
// =============================================================================

/// Bounds restricting which keys a cursor visits
///
/// # Examples
///
/// ```
/// use strata_core::{Key, KeyRange};
///
/// let range = KeyRange::bound(2, 4, false, true).unwrap();
/// assert!(range.contains(&Key::Int(2)));
/// assert!(!range.contains(&Key::Int(4)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "KeyRangeSpec", into = "KeyRangeSpec")]
pub struct KeyRange {
    lower: Bound<Key>,
    upper: Bound<Key>,
}

impl KeyRange {
    /// Range holding exactly one key
    pub fn only(key: impl Into<Key>) -> Self {
        let key = key.into();
        KeyRange {
            lower: Bound::Included(key.clone()),
            upper: Bound::Included(key),
        }
    }

    /// Range of all keys above `key` (excluding it when `open`)
    pub fn lower_bound(key: impl Into<Key>, open: bool) -> Self {
        KeyRange {
            lower: bound(key.into(), open),
            upper: Bound::Unbounded,
        }
    }

    /// Range of all keys below `key` (excluding it when `open`)
    pub fn upper_bound(key: impl Into<Key>, open: bool) -> Self {
        KeyRange {
            lower: Bound::Unbounded,
            upper: bound(key.into(), open),
        }
    }

    /// Range between two keys
    ///
    /// Fails when `lower` sorts after `upper`, or when both are equal and
    /// either end is open (the range would be empty by construction).
    pub fn bound(
        lower: impl Into<Key>,
        upper: impl Into<Key>,
        lower_open: bool,
        upper_open: bool,
    ) -> StoreResult<Self> {
        let lower = lower.into();
        let upper = upper.into();
        if lower > upper || (lower == upper && (lower_open || upper_open)) {
            return Err(StoreError::invalid_options(format!(
                "key range lower bound {} is not below upper bound {}",
                lower, upper
            )));
        }
        Ok(KeyRange {
            lower: bound(lower, lower_open),
            upper: bound(upper, upper_open),
        })
    }

    /// Check whether `key` falls inside the range
    pub fn contains(&self, key: &Key) -> bool {
        let above = match &self.lower {
            Bound::Included(k) => key >= k,
            Bound::Excluded(k) => key > k,
            Bound::Unbounded => true,
        };
        let below = match &self.upper {
            Bound::Included(k) => key <= k,
            Bound::Excluded(k) => key < k,
            Bound::Unbounded => true,
        };
        above && below
    }
}

fn bound(key: Key, open: bool) -> Bound<Key> {
    if open {
        Bound::Excluded(key)
    } else {
        Bound::Included(key)
    }
}

/// Serialized form of a [`KeyRange`], as written in configuration files
#[derive(Debug, Clone, Serialize, Deserialize)]
struct KeyRangeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lower: Option<Key>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    upper: Option<Key>,
    #[serde(default)]
    lower_open: bool,
    #[serde(default)]
    upper_open: bool,
}

impl TryFrom<KeyRangeSpec> for KeyRange {
    type Error = StoreError;

    fn try_from(spec: KeyRangeSpec) -> StoreResult<Self> {
        match (spec.lower, spec.upper) {
            (Some(lower), Some(upper)) => {
                KeyRange::bound(lower, upper, spec.lower_open, spec.upper_open)
            }
            (Some(lower), None) => Ok(KeyRange::lower_bound(lower, spec.lower_open)),
            (None, Some(upper)) => Ok(KeyRange::upper_bound(upper, spec.upper_open)),
            (None, None) => Err(StoreError::invalid_options(
                "key range needs a lower or an upper bound",
            )),
        }
    }
}

impl From<KeyRange> for KeyRangeSpec {
    fn from(range: KeyRange) -> Self {
        let split = |b: Bound<Key>| match b {
            Bound::Included(k) => (Some(k), false),
            Bound::Excluded(k) => (Some(k), true),
            Bound::Unbounded => (None, false),
        };
        let (lower, lower_open) = split(range.lower);
        let (upper, upper_open) = split(range.upper);
        KeyRangeSpec {
            lower,
            upper,
            lower_open,
            upper_open,
        }
    }
}
