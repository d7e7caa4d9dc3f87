//! Attribute values carried by components and data paths

use std::{any::Any, collections::HashMap, fmt, sync::Arc};

/// Attribute map keyed by attribute name
pub type AttributeMap = HashMap<String, AttributeValue>;

/// A caller-typed attribute value
///
/// The typed variants cover everything the built-in catalog knows how to
/// encode. `Opaque` holds arbitrary caller data that only a custom codec rule
/// can turn into bytes; without one it is dropped on export.
#[derive(Clone)]
pub enum AttributeValue {
    U64(u64),
    I64(i64),
    I32(i32),
    F64(f64),
    F32(f32),
    Str(String),
    /// Sequence of (timestamp, value) samples
    PairList(Vec<(i64, f64)>),
    /// A number paired with its unit or label
    Tagged(f64, String),
    Bytes(Vec<u8>),
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl AttributeValue {
    /// Wrap an arbitrary value for use with a custom codec rule
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Self::Opaque(Arc::new(value))
    }

    /// Short name of the variant, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::U64(_) => "u64",
            Self::I64(_) => "i64",
            Self::I32(_) => "i32",
            Self::F64(_) => "f64",
            Self::F32(_) => "f32",
            Self::Str(_) => "string",
            Self::PairList(_) => "pair-list",
            Self::Tagged(_, _) => "tagged",
            Self::Bytes(_) => "bytes",
            Self::Opaque(_) => "opaque",
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::F32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_pair_list(&self) -> Option<&[(i64, f64)]> {
        match self {
            Self::PairList(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow the inner value of an `Opaque` attribute as `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Opaque(v) => v.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl fmt::Debug for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U64(v) => f.debug_tuple("U64").field(v).finish(),
            Self::I64(v) => f.debug_tuple("I64").field(v).finish(),
            Self::I32(v) => f.debug_tuple("I32").field(v).finish(),
            Self::F64(v) => f.debug_tuple("F64").field(v).finish(),
            Self::F32(v) => f.debug_tuple("F32").field(v).finish(),
            Self::Str(v) => f.debug_tuple("Str").field(v).finish(),
            Self::PairList(v) => f.debug_tuple("PairList").field(v).finish(),
            Self::Tagged(n, s) => f.debug_tuple("Tagged").field(n).field(s).finish(),
            Self::Bytes(v) => f.debug_tuple("Bytes").field(v).finish(),
            Self::Opaque(_) => f.write_str("Opaque(..)"),
        }
    }
}

impl PartialEq for AttributeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::U64(a), Self::U64(b)) => a == b,
            (Self::I64(a), Self::I64(b)) => a == b,
            (Self::I32(a), Self::I32(b)) => a == b,
            (Self::F64(a), Self::F64(b)) => a == b,
            (Self::F32(a), Self::F32(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::PairList(a), Self::PairList(b)) => a == b,
            (Self::Tagged(a, x), Self::Tagged(b, y)) => a == b && x == y,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Opaque(a), Self::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<u64> for AttributeValue {
    fn from(v: u64) -> Self {
        Self::U64(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        Self::I32(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        Self::F64(v)
    }
}

impl From<f32> for AttributeValue {
    fn from(v: f32) -> Self {
        Self::F32(v)
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

impl From<Vec<(i64, f64)>> for AttributeValue {
    fn from(v: Vec<(i64, f64)>) -> Self {
        Self::PairList(v)
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opaque_equality_is_identity() {
        let a = AttributeValue::opaque(vec![1u32, 2, 3]);
        let b = a.clone();
        let c = AttributeValue::opaque(vec![1u32, 2, 3]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.downcast_ref::<Vec<u32>>(), Some(&vec![1, 2, 3]));
    }

    #[test]
    fn test_accessors() {
        assert_eq!(AttributeValue::from(7u64).as_u64(), Some(7));
        assert_eq!(AttributeValue::from("sm_80").as_str(), Some("sm_80"));
        assert_eq!(AttributeValue::from(1.5f32).as_u64(), None);
    }
}
