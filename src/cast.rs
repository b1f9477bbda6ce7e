//! Weakly typed decoding of API results into typed records.
//!
//! The remote schema drifts, so this decoder tolerates the obvious mismatches
//! (numbers sent as strings, booleans sent as `0`/`1`, `null` where a scalar
//! was expected) and only fails when a value cannot reasonably be read as the
//! destination type. Destination records should derive `Default` and carry
//! `#[serde(default)]` so absent keys are left at their zero value; unknown
//! source keys are skipped.

use std::fmt::Display;

use once_cell::sync::Lazy;
use serde::de::{self, DeserializeOwned, IntoDeserializer, Visitor};
use serde_json::{Map, Number, Value};

use crate::cli::error::LwError;

#[derive(Debug)]
pub(crate) struct CastError {
    path: Option<String>,
    expected: String,
    reason: String,
}

impl CastError {
    fn mismatch(path: &str, expected: &str, found: &Value) -> Self {
        Self {
            path: Some(path.to_string()),
            expected: expected.to_string(),
            reason: format!("found {}", describe(found)),
        }
    }

    fn or_path(mut self, path: &str) -> Self {
        if self.path.is_none() {
            self.path = Some(path.to_string());
        }
        self
    }
}

impl Display for CastError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: expected {}, {}",
            self.path.as_deref().unwrap_or("$"),
            self.expected,
            self.reason
        )
    }
}

impl std::error::Error for CastError {}

impl de::Error for CastError {
    fn custom<T: Display>(msg: T) -> Self {
        Self {
            path: None,
            expected: String::from("value"),
            reason: msg.to_string(),
        }
    }
}

impl From<CastError> for LwError {
    fn from(err: CastError) -> Self {
        LwError::DecodeMismatch {
            path: err.path.unwrap_or_else(|| String::from("$")),
            expected: err.expected,
            reason: err.reason,
        }
    }
}

static EMPTY_MAP: Lazy<Map<String, Value>> = Lazy::new(Map::new);

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

/// Decodes `source` into `T`, coercing scalars where the intent is unambiguous.
pub(crate) fn cast<T: DeserializeOwned>(source: &Value) -> Result<T, LwError> {
    T::deserialize(WeakDecoder::root(source)).map_err(Into::into)
}

struct WeakDecoder<'a> {
    value: &'a Value,
    path: String,
}

impl<'a> WeakDecoder<'a> {
    fn root(value: &'a Value) -> Self {
        Self {
            value,
            path: String::from("$"),
        }
    }

    fn child(&self, value: &'a Value, segment: &str) -> Self {
        Self {
            value,
            path: format!("{}{segment}", self.path),
        }
    }

    fn mismatch(&self, expected: &str) -> CastError {
        CastError::mismatch(&self.path, expected, self.value)
    }

    fn as_i128(&self) -> Result<i128, CastError> {
        match self.value {
            Value::Null => Ok(0),
            Value::Bool(b) => Ok(i128::from(*b)),
            Value::Number(n) => number_as_i128(n).ok_or_else(|| self.mismatch("an integer")),
            Value::String(s) => {
                let trimmed = s.trim();
                trimmed
                    .parse::<i128>()
                    .ok()
                    .or_else(|| {
                        trimmed
                            .parse::<f64>()
                            .ok()
                            .filter(|f| f.fract() == 0.0)
                            .map(|f| f as i128)
                    })
                    .ok_or_else(|| self.mismatch("an integer"))
            }
            _ => Err(self.mismatch("an integer")),
        }
    }

    fn as_f64(&self) -> Result<f64, CastError> {
        match self.value {
            Value::Null => Ok(0.0),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Number(n) => n.as_f64().ok_or_else(|| self.mismatch("a number")),
            Value::String(s) => s.trim().parse().map_err(|_| self.mismatch("a number")),
            _ => Err(self.mismatch("a number")),
        }
    }

    fn as_bool(&self) -> Result<bool, CastError> {
        match self.value {
            Value::Null => Ok(false),
            Value::Bool(b) => Ok(*b),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Ok(false),
                Some(1) => Ok(true),
                _ => Err(self.mismatch("a boolean")),
            },
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" | "" => Ok(false),
                _ => Err(self.mismatch("a boolean")),
            },
            _ => Err(self.mismatch("a boolean")),
        }
    }

    fn as_string(&self) -> Result<String, CastError> {
        match self.value {
            Value::Null => Ok(String::new()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Number(n) => Ok(n.to_string()),
            Value::String(s) => Ok(s.clone()),
            _ => Err(self.mismatch("a string")),
        }
    }
}

fn number_as_i128(n: &Number) -> Option<i128> {
    if let Some(i) = n.as_i64() {
        return Some(i.into());
    }
    if let Some(u) = n.as_u64() {
        return Some(u.into());
    }
    n.as_f64()
        .filter(|f| f.fract() == 0.0 && f.is_finite())
        .map(|f| f as i128)
}

macro_rules! deserialize_integer {
    ($($method:ident => $ty:ty as $visit:ident($wide:ty)),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
                let wide = self.as_i128()?;
                let narrow = <$ty>::try_from(wide).map_err(|_| CastError {
                    path: Some(self.path.clone()),
                    expected: String::from(stringify!($ty)),
                    reason: format!("{wide} is out of range"),
                })?;
                visitor
                    .$visit(<$wide>::from(narrow))
                    .map_err(|e: CastError| e.or_path(&self.path))
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for WeakDecoder<'de> {
    type Error = CastError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        let path = self.path.clone();
        let result = match self.value {
            Value::Null => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(*b),
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    visitor.visit_u64(u)
                } else if let Some(i) = n.as_i64() {
                    visitor.visit_i64(i)
                } else {
                    visitor.visit_f64(n.as_f64().unwrap_or_default())
                }
            }
            Value::String(s) => visitor.visit_str(s),
            Value::Array(items) => visitor.visit_seq(WeakSeq::new(&self, items)),
            Value::Object(map) => visitor.visit_map(WeakMap::new(&self, map)),
        };
        result.map_err(|e| e.or_path(&path))
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor
            .visit_bool(self.as_bool()?)
            .map_err(|e: CastError| e.or_path(&self.path))
    }

    deserialize_integer! {
        deserialize_i8 => i8 as visit_i64(i64),
        deserialize_i16 => i16 as visit_i64(i64),
        deserialize_i32 => i32 as visit_i64(i64),
        deserialize_i64 => i64 as visit_i64(i64),
        deserialize_u8 => u8 as visit_u64(u64),
        deserialize_u16 => u16 as visit_u64(u64),
        deserialize_u32 => u32 as visit_u64(u64),
        deserialize_u64 => u64 as visit_u64(u64),
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_f64(visitor)
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor
            .visit_f64(self.as_f64()?)
            .map_err(|e: CastError| e.or_path(&self.path))
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_string(visitor)
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_string(visitor)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor
            .visit_string(self.as_string()?)
            .map_err(|e: CastError| e.or_path(&self.path))
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_byte_buf(visitor)
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor
            .visit_byte_buf(self.as_string()?.into_bytes())
            .map_err(|e: CastError| e.or_path(&self.path))
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            Value::Null => visitor.visit_none(),
            _ => {
                let path = self.path.clone();
                visitor.visit_some(self).map_err(|e| e.or_path(&path))
            }
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        static EMPTY: Vec<Value> = Vec::new();
        let items = match self.value {
            Value::Array(items) => items,
            Value::Null => &EMPTY,
            _ => return Err(self.mismatch("a list")),
        };
        visitor
            .visit_seq(WeakSeq::new(&self, items))
            .map_err(|e| e.or_path(&self.path))
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        let map = match self.value {
            Value::Object(map) => map,
            Value::Null => &*EMPTY_MAP,
            _ => return Err(self.mismatch("a mapping")),
        };
        visitor
            .visit_map(WeakMap::new(&self, map))
            .map_err(|e| e.or_path(&self.path))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_map(visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self.value {
            Value::String(s) => visitor
                .visit_enum(s.as_str().into_deserializer())
                .map_err(|e: CastError| e.or_path(&self.path)),
            _ => Err(self.mismatch("a variant name")),
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_string(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }
}

struct WeakSeq<'a> {
    path: String,
    items: std::iter::Enumerate<std::slice::Iter<'a, Value>>,
}

impl<'a> WeakSeq<'a> {
    fn new(parent: &WeakDecoder<'a>, items: &'a [Value]) -> Self {
        Self {
            path: parent.path.clone(),
            items: items.iter().enumerate(),
        }
    }
}

impl<'de> de::SeqAccess<'de> for WeakSeq<'de> {
    type Error = CastError;

    fn next_element_seed<T: de::DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, Self::Error> {
        match self.items.next() {
            Some((idx, value)) => {
                let path = format!("{}[{idx}]", self.path);
                seed.deserialize(WeakDecoder { value, path: path.clone() })
                    .map(Some)
                    .map_err(|e| e.or_path(&path))
            }
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len())
    }
}

struct WeakMap<'a> {
    parent: WeakDecoder<'a>,
    entries: serde_json::map::Iter<'a>,
    pending: Option<(&'a String, &'a Value)>,
}

impl<'a> WeakMap<'a> {
    fn new(parent: &WeakDecoder<'a>, map: &'a Map<String, Value>) -> Self {
        Self {
            parent: WeakDecoder {
                value: parent.value,
                path: parent.path.clone(),
            },
            entries: map.iter(),
            pending: None,
        }
    }
}

impl<'de> de::MapAccess<'de> for WeakMap<'de> {
    type Error = CastError;

    fn next_key_seed<K: de::DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, Self::Error> {
        match self.entries.next() {
            Some((key, value)) => {
                self.pending = Some((key, value));
                seed.deserialize(key.as_str().into_deserializer()).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: de::DeserializeSeed<'de>>(
        &mut self,
        seed: V,
    ) -> Result<V::Value, Self::Error> {
        let (key, value) = self
            .pending
            .take()
            .ok_or_else(|| <CastError as de::Error>::custom("value requested before key"))?;
        let child = self.parent.child(value, &format!(".{key}"));
        let path = child.path.clone();
        seed.deserialize(child).map_err(|e| e.or_path(&path))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.entries.len())
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;

    use serde::Deserialize;
    use serde_json::json;

    use super::cast;
    use crate::cli::error::LwError;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(default)]
    struct Zone {
        id: u32,
        name: String,
    }

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(default)]
    struct Server {
        uniq_id: String,
        active: bool,
        memory: i64,
        bandwidth_quota: Option<u64>,
        zone: Zone,
        ip_count: u16,
        ips: Vec<String>,
        attributes: BTreeMap<String, String>,
    }

    #[test]
    fn coerces_obvious_scalar_drift() {
        let source = json!({
            "uniq_id": "ABC123",
            "active": 1,
            "memory": "2048",
            "bandwidth_quota": "5000",
            "zone": { "id": "27", "name": "US Central" },
            "ip_count": 2.0,
            "ips": ["10.0.0.1", 10],
            "attributes": { "managed": true, "cores": 4 },
            "unknown_key": { "nested": [1, 2, 3] }
        });

        let server: Server = cast(&source).unwrap();

        assert_eq!(server.uniq_id, "ABC123");
        assert!(server.active);
        assert_eq!(server.memory, 2048);
        assert_eq!(server.bandwidth_quota, Some(5000));
        assert_eq!(
            server.zone,
            Zone {
                id: 27,
                name: String::from("US Central")
            }
        );
        assert_eq!(server.ip_count, 2);
        assert_eq!(server.ips, vec!["10.0.0.1", "10"]);
        assert_eq!(server.attributes["managed"], "true");
        assert_eq!(server.attributes["cores"], "4");
    }

    #[test]
    fn missing_and_null_fields_stay_default() {
        let server: Server = cast(&json!({ "uniq_id": "ABC123", "memory": null })).unwrap();

        assert_eq!(server.memory, 0);
        assert_eq!(server.bandwidth_quota, None);
        assert_eq!(server.zone, Zone::default());
        assert!(server.ips.is_empty());
    }

    #[test]
    fn mismatch_reports_the_source_path() {
        let err = cast::<Server>(&json!({ "zone": { "id": "twenty-seven" } })).unwrap_err();

        match err {
            LwError::DecodeMismatch { path, expected, .. } => {
                assert_eq!(path, "$.zone.id");
                assert_eq!(expected, "an integer");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn out_of_range_numbers_are_rejected() {
        let err = cast::<Server>(&json!({ "ip_count": 70000 })).unwrap_err();
        assert!(matches!(err, LwError::DecodeMismatch { ref path, .. } if path == "$.ip_count"));

        let err = cast::<Server>(&json!({ "ips": ["a", ["nested"]] })).unwrap_err();
        assert!(matches!(err, LwError::DecodeMismatch { ref path, .. } if path == "$.ips[1]"));
    }

    #[test]
    fn ambiguous_booleans_are_rejected() {
        assert!(cast::<Server>(&json!({ "active": 2 })).is_err());
        assert!(cast::<Server>(&json!({ "active": "yes please" })).is_err());
        assert!(cast::<Server>(&json!({ "active": "false" })).is_ok());
    }
}
