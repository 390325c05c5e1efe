use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};

use indexmap::IndexMap;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::number::Number;

/// Object storage. Iteration follows insertion order, equality ignores it.
pub type Map = IndexMap<String, Value>;

const DESCRIBE_MAX_LEN: usize = 11;

/// A structured (JSON) value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Value>),
    Object(Map),
}

impl Value {
    pub const NULL: Value = Self::Null;
    pub const TRUE: Value = Self::Bool(true);
    pub const FALSE: Value = Self::Bool(false);

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Everything except `null` and `false` is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Bool(false))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Type name plus an abbreviated JSON rendering, e.g. `number (1)`.
    pub fn describe(&self) -> String {
        let json = self.to_string();
        let json = if json.chars().count() > DESCRIBE_MAX_LEN {
            format!("{}...", json.chars().take(DESCRIBE_MAX_LEN - 1).collect::<String>())
        } else {
            json
        };
        format!("{} ({})", self.type_name(), json)
    }

    /// Renders JSON text. `indent == 0` yields the compact canonical form.
    pub fn to_json(&self, indent: usize, sort_keys: bool) -> Result<String, serde_json::Error> {
        let sorted;
        let value = if sort_keys {
            sorted = self.sorted_keys();
            &sorted
        } else {
            self
        };

        if indent == 0 {
            return serde_json::to_string(value);
        }

        let indent = " ".repeat(indent);
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        value.serialize(&mut serializer)?;
        // serde_json only ever writes UTF-8.
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn sorted_keys(&self) -> Value {
        match self {
            Value::Array(values) => Value::Array(values.iter().map(Value::sorted_keys).collect()),
            Value::Object(map) => {
                let mut entries = map
                    .iter()
                    .map(|(k, v)| (k.clone(), v.sorted_keys()))
                    .collect::<Vec<_>>();
                entries.sort_by(|(a, _), (b, _)| a.cmp(b));
                Value::Object(entries.into_iter().collect())
            }
            other => other.clone(),
        }
    }

    fn type_order(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(false) => 1,
            Value::Bool(true) => 2,
            Value::Number(_) => 3,
            Value::String(_) => 4,
            Value::Array(_) => 5,
            Value::Object(_) => 6,
        }
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Total order: null < false < true < numbers < strings < arrays < objects.
/// Objects compare their sorted key sets first, then values key by key.
impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => a.cmp(b),
            (Value::Object(a), Value::Object(b)) => {
                let mut a_keys = a.keys().collect::<Vec<_>>();
                let mut b_keys = b.keys().collect::<Vec<_>>();
                a_keys.sort();
                b_keys.sort();

                a_keys.cmp(&b_keys).then_with(|| {
                    a_keys
                        .iter()
                        .map(|k| a[k.as_str()].cmp(&b[k.as_str()]))
                        .find(|ord| ord.is_ne())
                        .unwrap_or(Ordering::Equal)
                })
            }
            _ => self.type_order().cmp(&other.type_order()),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        write!(f, "{}", json)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) if n.is_safe_int() => serializer.serialize_i64(n.to_int()),
            Value::Number(n) if n.value().is_infinite() => {
                serializer.serialize_f64(if n.value() > 0.0 { f64::MAX } else { f64::MIN })
            }
            Value::Number(n) => serializer.serialize_f64(n.value()),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(values) => {
                let mut seq = serializer.serialize_seq(Some(values.len()))?;
                for value in values {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
            Value::Object(map) => {
                let mut ser = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    ser.serialize_entry(k, v)?;
                }
                ser.end()
            }
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Deserialize::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut values = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(value) = seq.next_element()? {
            values.push(value);
        }
        Ok(Value::Array(values))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut map = Map::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, Value>()? {
            map.insert(key, value);
        }
        Ok(Value::Object(map))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::Array(values)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Object(map)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN).into()),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(values) => {
                Value::Array(values.into_iter().map(Into::into).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Number(n) if n.is_safe_int() => serde_json::Value::Number(n.to_int().into()),
            Value::Number(n) => serde_json::Number::from_f64(n.value())
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::Array(values) => {
                serde_json::Value::Array(values.into_iter().map(Into::into).collect())
            }
            Value::Object(map) => {
                serde_json::Value::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl FromIterator<Value> for Value {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Value::Array(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn object(entries: &[(&str, Value)]) -> Value {
        Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[rstest]
    #[case::null(Value::Null, "null")]
    #[case::int(Value::from(42), "42")]
    #[case::float(Value::from(1.5), "1.5")]
    #[case::string(Value::from("42"), "\"42\"")]
    #[case::unicode(Value::from("‽"), "\"‽\"")]
    #[case::escape(Value::from("a\"b\n"), "\"a\\\"b\\n\"")]
    #[case::array(Value::from(vec![Value::from(1), Value::Null]), "[1,null]")]
    #[case::object(object(&[("b", Value::from(1)), ("a", Value::TRUE)]), "{\"b\":1,\"a\":true}")]
    fn test_display(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(value.to_string(), expected);
    }

    #[test]
    fn test_object_equality_ignores_order() {
        let a = object(&[("a", Value::from(1)), ("b", Value::from(2))]);
        let b = object(&[("b", Value::from(2)), ("a", Value::from(1))]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_deserialize_preserves_key_order() {
        let value: Value = serde_json::from_str(r#"{"z": 1, "a": [true, null, "x"]}"#).unwrap();
        assert_eq!(value.to_string(), r#"{"z":1,"a":[true,null,"x"]}"#);
    }

    #[rstest]
    #[case(Value::Null, Value::FALSE)]
    #[case(Value::FALSE, Value::TRUE)]
    #[case(Value::TRUE, Value::from(0))]
    #[case(Value::from(10), Value::from("1"))]
    #[case(Value::from("a"), Value::from("b"))]
    #[case(Value::from("z"), Value::Array(vec![]))]
    #[case(Value::Array(vec![Value::from(1)]), Value::Array(vec![Value::from(2)]))]
    #[case(Value::Array(vec![]), Value::Object(Map::new()))]
    #[case(object(&[("a", Value::from(2))]), object(&[("b", Value::from(1))]))]
    #[case(object(&[("a", Value::from(1))]), object(&[("a", Value::from(2))]))]
    fn test_ordering(#[case] lesser: Value, #[case] greater: Value) {
        assert_eq!(lesser.cmp(&greater), Ordering::Less);
        assert_eq!(greater.cmp(&lesser), Ordering::Greater);
    }

    #[rstest]
    #[case(Value::Null, false)]
    #[case(Value::FALSE, false)]
    #[case(Value::TRUE, true)]
    #[case(Value::from(0), true)]
    #[case(Value::from(""), true)]
    fn test_is_truthy(#[case] value: Value, #[case] expected: bool) {
        assert_eq!(value.is_truthy(), expected);
    }

    #[rstest]
    #[case(Value::from(1), "number (1)")]
    #[case(Value::from("a very long string"), "string (\"a very lo...)")]
    fn test_describe(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(value.describe(), expected);
    }

    #[test]
    fn test_to_json_sorted_and_indented() {
        let value = object(&[("b", Value::from(1)), ("a", Value::Array(vec![Value::Null]))]);
        assert_eq!(
            value.to_json(2, true).unwrap(),
            "{\n  \"a\": [\n    null\n  ],\n  \"b\": 1\n}"
        );
        assert_eq!(value.to_json(0, true).unwrap(), r#"{"a":[null],"b":1}"#);
    }

    #[rstest]
    #[case::above_safe_range(1e19)]
    #[case::rounded(12345678901234567.0)]
    fn test_large_integers_keep_their_value(#[case] n: f64) {
        let json = Value::from(n).to_json(0, false).unwrap();
        assert_eq!(json.parse::<f64>().unwrap(), n);
    }

    #[test]
    fn test_serde_json_conversion() {
        let json = serde_json::json!({"a": [1, 2.5, "x", null, false]});
        let value = Value::from(json.clone());
        assert_eq!(serde_json::Value::from(value), json);
    }
}
