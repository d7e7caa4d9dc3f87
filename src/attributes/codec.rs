//! Name-keyed attribute codec rules and the registry that orders them

use std::{collections::HashMap, fmt, sync::Arc};

use log::trace;

use super::{catalog::default_catalog, value::AttributeValue};
use crate::error::{Result, TopomapError};

/// Encoder half of a rule; `None` means the value does not fit this rule
pub type EncodeFn = Arc<dyn Fn(&AttributeValue) -> Option<Vec<u8>> + Send + Sync>;

/// Decoder half of a rule; `None` means the payload is malformed for this rule
pub type DecodeFn = Arc<dyn Fn(&[u8]) -> Option<AttributeValue> + Send + Sync>;

/// Encode/decode pair for one attribute name
#[derive(Clone)]
pub struct AttributeRule {
    encode: EncodeFn,
    decode: DecodeFn,
}

impl fmt::Debug for AttributeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AttributeRule { .. }")
    }
}

fn fixed<const N: usize>(
    to_bytes: fn(&AttributeValue) -> Option<[u8; N]>,
    from_bytes: fn([u8; N]) -> AttributeValue,
) -> AttributeRule {
    AttributeRule::custom(
        move |value| to_bytes(value).map(|b| b.to_vec()),
        move |bytes| <[u8; N]>::try_from(bytes).ok().map(from_bytes),
    )
}

fn terminated(value: &str) -> Option<Vec<u8>> {
    if value.as_bytes().contains(&0) {
        return None;
    }
    let mut out = Vec::with_capacity(value.len() + 1);
    out.extend_from_slice(value.as_bytes());
    out.push(0);
    Some(out)
}

fn unterminate(bytes: &[u8]) -> Option<String> {
    let (last, body) = bytes.split_last()?;
    if *last != 0 || body.contains(&0) {
        return None;
    }
    String::from_utf8(body.to_vec()).ok()
}

const PAIR_LEN: usize = 16;

impl AttributeRule {
    /// Build a rule from arbitrary encode/decode closures
    pub fn custom<E, D>(encode: E, decode: D) -> Self
    where
        E: Fn(&AttributeValue) -> Option<Vec<u8>> + Send + Sync + 'static,
        D: Fn(&[u8]) -> Option<AttributeValue> + Send + Sync + 'static,
    {
        Self {
            encode: Arc::new(encode),
            decode: Arc::new(decode),
        }
    }

    /// 8-byte unsigned integer
    pub fn u64() -> Self {
        fixed(
            |v| v.as_u64().map(u64::to_ne_bytes),
            |b| AttributeValue::U64(u64::from_ne_bytes(b)),
        )
    }

    /// 8-byte signed integer
    pub fn i64() -> Self {
        fixed(
            |v| v.as_i64().map(i64::to_ne_bytes),
            |b| AttributeValue::I64(i64::from_ne_bytes(b)),
        )
    }

    /// 4-byte signed integer
    pub fn i32() -> Self {
        fixed(
            |v| v.as_i32().map(i32::to_ne_bytes),
            |b| AttributeValue::I32(i32::from_ne_bytes(b)),
        )
    }

    /// 8-byte float
    pub fn f64() -> Self {
        fixed(
            |v| v.as_f64().map(f64::to_ne_bytes),
            |b| AttributeValue::F64(f64::from_ne_bytes(b)),
        )
    }

    /// 4-byte float
    pub fn f32() -> Self {
        fixed(
            |v| v.as_f32().map(f32::to_ne_bytes),
            |b| AttributeValue::F32(f32::from_ne_bytes(b)),
        )
    }

    /// NUL-terminated UTF-8 string
    pub fn string() -> Self {
        Self::custom(
            |v| v.as_str().and_then(terminated),
            |b| unterminate(b).map(AttributeValue::Str),
        )
    }

    /// Flat array of (i64, f64) pairs, 16 bytes each
    pub fn pair_list() -> Self {
        Self::custom(
            |v| {
                let pairs = v.as_pair_list()?;
                let mut out = Vec::with_capacity(pairs.len() * PAIR_LEN);
                for (stamp, sample) in pairs {
                    out.extend_from_slice(&stamp.to_ne_bytes());
                    out.extend_from_slice(&sample.to_ne_bytes());
                }
                Some(out)
            },
            |b| {
                if b.len() % PAIR_LEN != 0 {
                    return None;
                }
                let mut pairs = Vec::with_capacity(b.len() / PAIR_LEN);
                for chunk in b.chunks_exact(PAIR_LEN) {
                    let (stamp, sample) = chunk.split_at(8);
                    pairs.push((
                        i64::from_ne_bytes(stamp.try_into().ok()?),
                        f64::from_ne_bytes(sample.try_into().ok()?),
                    ));
                }
                Some(AttributeValue::PairList(pairs))
            },
        )
    }

    /// 8-byte float followed by a NUL-terminated label
    pub fn tagged() -> Self {
        Self::custom(
            |v| match v {
                AttributeValue::Tagged(number, label) => {
                    let mut out = number.to_ne_bytes().to_vec();
                    out.extend(terminated(label)?);
                    Some(out)
                }
                _ => None,
            },
            |b| {
                if b.len() < 9 {
                    return None;
                }
                let (number, label) = b.split_at(8);
                Some(AttributeValue::Tagged(
                    f64::from_ne_bytes(number.try_into().ok()?),
                    unterminate(label)?,
                ))
            },
        )
    }

    /// Raw bytes copied verbatim
    pub fn bytes() -> Self {
        Self::custom(
            |v| v.as_bytes().map(<[u8]>::to_vec),
            |b| Some(AttributeValue::Bytes(b.to_vec())),
        )
    }

    pub fn encode(&self, value: &AttributeValue) -> Option<Vec<u8>> {
        (self.encode)(value)
    }

    pub fn decode(&self, payload: &[u8]) -> Option<AttributeValue> {
        (self.decode)(payload)
    }
}

/// Lookup table mapping attribute names to rules
#[derive(Clone, Default)]
pub struct CodecTable {
    rules: HashMap<String, AttributeRule>,
}

impl fmt::Debug for CodecTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("CodecTable").field("names", &names).finish()
    }
}

impl CodecTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule, builder style
    pub fn with_rule(mut self, name: impl Into<String>, rule: AttributeRule) -> Self {
        self.insert(name, rule);
        self
    }

    /// Add or replace the rule for `name`
    pub fn insert(&mut self, name: impl Into<String>, rule: AttributeRule) {
        self.rules.insert(name.into(), rule);
    }

    pub fn get(&self, name: &str) -> Option<&AttributeRule> {
        self.rules.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }
}

/// Result of packing one attribute
#[derive(Debug, Clone, PartialEq)]
pub enum PackOutcome {
    Packed(Vec<u8>),
    /// Neither table has a rule accepting this name and value
    Unsupported,
}

/// Ordered pair of codec tables: the built-in catalog, then caller rules
///
/// Caller rules never override the catalog; they are consulted only for
/// names (or values) the catalog does not accept.
#[derive(Debug, Clone)]
pub struct AttributeRegistry {
    catalog: &'static CodecTable,
    custom: CodecTable,
}

impl Default for AttributeRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl AttributeRegistry {
    /// Create a registry with an optional table of caller rules
    pub fn new(custom: Option<CodecTable>) -> Self {
        Self {
            catalog: default_catalog(),
            custom: custom.unwrap_or_default(),
        }
    }

    pub fn custom(&self) -> &CodecTable {
        &self.custom
    }

    /// Encode a value, trying the catalog first
    ///
    /// Names with an interior NUL cannot be stored and are never packed.
    pub fn pack(&self, name: &str, value: &AttributeValue) -> PackOutcome {
        if name.as_bytes().contains(&0) {
            trace!("attribute name {:?} contains a NUL byte", name);
            return PackOutcome::Unsupported;
        }
        let tables = [self.catalog, &self.custom];
        for table in tables {
            if let Some(payload) = table.get(name).and_then(|rule| rule.encode(value)) {
                return PackOutcome::Packed(payload);
            }
        }
        trace!("no rule packs {} ({})", name, value.type_name());
        PackOutcome::Unsupported
    }

    /// Bytes one attribute record occupies, or `None` if it would be dropped
    pub fn record_len(&self, name: &str, value: &AttributeValue) -> Option<usize> {
        match self.pack(name, value) {
            PackOutcome::Packed(payload) => Some(name.len() + 1 + 8 + payload.len()),
            PackOutcome::Unsupported => None,
        }
    }

    /// Decode a payload read from the region at `offset`
    ///
    /// Rules are tried in packing order, catalog first. A payload a caller
    /// rule wrote under a catalog name therefore decodes as the catalog type
    /// whenever its width fits the catalog rule. Names no table knows come
    /// back as raw `Bytes`. A name that some table knows but none can decode
    /// is a format error.
    pub fn unpack(&self, name: &str, payload: &[u8], offset: u64) -> Result<AttributeValue> {
        let rules: Vec<&AttributeRule> = [self.catalog, &self.custom]
            .into_iter()
            .filter_map(|table| table.get(name))
            .collect();

        if rules.is_empty() {
            return Ok(AttributeValue::Bytes(payload.to_vec()));
        }

        rules
            .into_iter()
            .find_map(|rule| rule.decode(payload))
            .ok_or_else(|| {
                TopomapError::format(
                    offset,
                    format!(
                        "attribute {} has a {} byte payload its rule cannot decode",
                        name,
                        payload.len()
                    ),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_rules_check_width() {
        let rule = AttributeRule::u64();
        let payload = rule.encode(&AttributeValue::U64(999)).unwrap();
        assert_eq!(payload.len(), 8);
        assert_eq!(rule.decode(&payload), Some(AttributeValue::U64(999)));
        assert_eq!(rule.decode(&payload[..4]), None);
        assert_eq!(rule.encode(&AttributeValue::I32(1)), None);
    }

    #[test]
    fn test_string_rule_keeps_terminator() {
        let rule = AttributeRule::string();
        let payload = rule.encode(&AttributeValue::from("8.0")).unwrap();
        assert_eq!(payload, b"8.0\0");
        assert_eq!(rule.decode(b"8.0"), None);
        assert_eq!(rule.decode(&payload), Some(AttributeValue::from("8.0")));
    }

    #[test]
    fn test_pair_list_rule() {
        let rule = AttributeRule::pair_list();
        let history = vec![(1_000, 1.4e9), (2_000, 1.6e9)];
        let payload = rule.encode(&AttributeValue::PairList(history.clone())).unwrap();
        assert_eq!(payload.len(), 32);
        assert_eq!(rule.decode(&payload), Some(AttributeValue::PairList(history)));
        assert_eq!(rule.decode(&payload[..20]), None);
    }

    #[test]
    fn test_catalog_shadows_custom_rule() {
        let custom = CodecTable::new().with_rule("CATcos", AttributeRule::bytes());
        let registry = AttributeRegistry::new(Some(custom));

        let packed = registry.pack("CATcos", &AttributeValue::U64(3));
        assert_eq!(packed, PackOutcome::Packed(3u64.to_ne_bytes().to_vec()));

        // A value the catalog refuses falls through to the caller rule
        let packed = registry.pack("CATcos", &AttributeValue::Bytes(vec![1, 2]));
        assert_eq!(packed, PackOutcome::Packed(vec![1, 2]));
    }

    #[test]
    fn test_unknown_name_is_unsupported() {
        let registry = AttributeRegistry::default();
        assert_eq!(
            registry.pack("custom_attrib", &AttributeValue::U64(999)),
            PackOutcome::Unsupported
        );
        assert_eq!(registry.record_len("custom_attrib", &AttributeValue::U64(1)), None);
        assert_eq!(registry.record_len("CATcos", &AttributeValue::U64(1)), Some(6 + 1 + 8 + 8));
    }

    #[test]
    fn test_unpack_length_mismatch_is_format_error() {
        let registry = AttributeRegistry::default();
        let err = registry.unpack("Clock_Frequency", &[0u8; 4], 128).unwrap_err();
        assert!(err.is_format());

        let raw = registry.unpack("vendor_blob", &[9, 9], 0).unwrap();
        assert_eq!(raw, AttributeValue::Bytes(vec![9, 9]));
    }

    #[test]
    fn test_name_with_nul_is_unsupported() {
        let custom = CodecTable::new().with_rule("a\0b", AttributeRule::u64());
        let registry = AttributeRegistry::new(Some(custom));
        assert_eq!(registry.pack("a\0b", &AttributeValue::U64(1)), PackOutcome::Unsupported);
        assert_eq!(registry.record_len("a\0b", &AttributeValue::U64(1)), None);
    }

    #[test]
    fn test_catalog_decodes_first_on_unpack() {
        let custom = CodecTable::new().with_rule("CATcos", AttributeRule::bytes());
        let registry = AttributeRegistry::new(Some(custom));

        let payload = [1u8, 0, 0, 0, 0, 0, 0, 0];
        let packed = registry.pack("CATcos", &AttributeValue::Bytes(payload.to_vec()));
        assert_eq!(packed, PackOutcome::Packed(payload.to_vec()));

        // Width fits the catalog rule, so the catalog type wins
        let value = registry.unpack("CATcos", &payload, 0).unwrap();
        assert_eq!(value, AttributeValue::U64(u64::from_ne_bytes(payload)));

        let value = registry.unpack("CATcos", &[1, 2], 0).unwrap();
        assert_eq!(value, AttributeValue::Bytes(vec![1, 2]));
    }
}
