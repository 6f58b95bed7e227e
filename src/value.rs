use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de, ser::SerializeMap};
use std::{fmt, str::FromStr};

/// Key marking a serialized data-block reference: `{"$id": "Cube"}`.
const DATA_BLOCK_TAG: &str = "$id";

/// The closed set of custom property types a bag value can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyType {
    #[default]
    Float,
    FloatArray,
    Int,
    IntArray,
    Bool,
    BoolArray,
    String,
    DataBlock,
    Python,
}

impl PropertyType {
    pub const ALL: [PropertyType; 9] = [
        PropertyType::Float,
        PropertyType::FloatArray,
        PropertyType::Int,
        PropertyType::IntArray,
        PropertyType::Bool,
        PropertyType::BoolArray,
        PropertyType::String,
        PropertyType::DataBlock,
        PropertyType::Python,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PropertyType::Float => "FLOAT",
            PropertyType::FloatArray => "FLOAT_ARRAY",
            PropertyType::Int => "INT",
            PropertyType::IntArray => "INT_ARRAY",
            PropertyType::Bool => "BOOL",
            PropertyType::BoolArray => "BOOL_ARRAY",
            PropertyType::String => "STRING",
            PropertyType::DataBlock => "DATA_BLOCK",
            PropertyType::Python => "PYTHON",
        }
    }

    pub fn is_array(self) -> bool {
        matches!(
            self,
            PropertyType::FloatArray | PropertyType::IntArray | PropertyType::BoolArray
        )
    }

    /// Scalar type of an array's elements; scalars map to themselves.
    pub fn element_type(self) -> PropertyType {
        match self {
            PropertyType::FloatArray => PropertyType::Float,
            PropertyType::IntArray => PropertyType::Int,
            PropertyType::BoolArray => PropertyType::Bool,
            other => other,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self.element_type(),
            PropertyType::Float | PropertyType::Int
        )
    }

    /// Raw python values have no host-side UI data.
    pub fn supports_ui_data(self) -> bool {
        self != PropertyType::Python
    }

    /// Renaming references and nested groups is not supported by the host.
    pub fn supports_rename(self) -> bool {
        !matches!(self, PropertyType::DataBlock | PropertyType::Python)
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PropertyType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown property type '{s}'"))
    }
}

/// A custom property value, one variant per property type.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    String(String),
    FloatArray(Vec<f64>),
    IntArray(Vec<i64>),
    BoolArray(Vec<bool>),
    /// Name of the referenced data-block, if any.
    DataBlock(Option<String>),
    /// Nested group, edited as a raw value.
    Group(IndexMap<String, PropValue>),
}

impl PropValue {
    pub fn property_type(&self) -> PropertyType {
        match self {
            PropValue::Float(_) => PropertyType::Float,
            PropValue::Int(_) => PropertyType::Int,
            PropValue::Bool(_) => PropertyType::Bool,
            PropValue::String(_) => PropertyType::String,
            PropValue::FloatArray(_) => PropertyType::FloatArray,
            PropValue::IntArray(_) => PropertyType::IntArray,
            PropValue::BoolArray(_) => PropertyType::BoolArray,
            PropValue::DataBlock(_) => PropertyType::DataBlock,
            PropValue::Group(_) => PropertyType::Python,
        }
    }

    /// The zero/false/empty value of a type.
    pub fn zero(ty: PropertyType) -> PropValue {
        match ty {
            PropertyType::Float => PropValue::Float(0.0),
            PropertyType::Int => PropValue::Int(0),
            PropertyType::Bool => PropValue::Bool(false),
            PropertyType::String => PropValue::String(String::new()),
            PropertyType::FloatArray => PropValue::FloatArray(Vec::new()),
            PropertyType::IntArray => PropValue::IntArray(Vec::new()),
            PropertyType::BoolArray => PropValue::BoolArray(Vec::new()),
            PropertyType::DataBlock => PropValue::DataBlock(None),
            PropertyType::Python => PropValue::Group(IndexMap::new()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropValue::Int(v) => Some(*v),
            PropValue::Float(v) if v.is_finite() && v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropValue::Float(v) => Some(*v),
            PropValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&IndexMap<String, PropValue>> {
        match self {
            PropValue::Group(map) => Some(map),
            _ => None,
        }
    }

    /// Number of elements for arrays, `None` for everything else.
    pub fn array_len(&self) -> Option<usize> {
        match self {
            PropValue::FloatArray(v) => Some(v.len()),
            PropValue::IntArray(v) => Some(v.len()),
            PropValue::BoolArray(v) => Some(v.len()),
            _ => None,
        }
    }

    /// Resize an array, padding with its last element (zero/false when empty).
    /// Non-array values are returned unchanged.
    pub fn resized(&self, len: usize) -> PropValue {
        fn resize<T: Clone>(v: &[T], len: usize, zero: T) -> Vec<T> {
            let mut out: Vec<T> = v.iter().take(len).cloned().collect();
            let pad = v.last().cloned().unwrap_or(zero);
            out.resize(len, pad);
            out
        }

        match self {
            PropValue::FloatArray(v) => PropValue::FloatArray(resize(v, len, 0.0)),
            PropValue::IntArray(v) => PropValue::IntArray(resize(v, len, 0)),
            PropValue::BoolArray(v) => PropValue::BoolArray(resize(v, len, false)),
            other => other.clone(),
        }
    }

    pub fn parse_json5(text: &str) -> anyhow::Result<PropValue> {
        Ok(json5::from_str::<PropValue>(text)?)
    }

    pub fn to_json5_compact(&self) -> String {
        let mut out = String::new();
        self.write_json5(&mut out);
        out
    }

    fn write_json5(&self, out: &mut String) {
        match self {
            PropValue::Float(v) => write_float(out, *v),
            PropValue::Int(v) => out.push_str(&v.to_string()),
            PropValue::Bool(v) => out.push_str(if *v { "true" } else { "false" }),
            PropValue::String(s) => write_escaped_string(out, s),
            PropValue::FloatArray(values) => {
                write_list(out, values, |out, v| write_float(out, *v));
            }
            PropValue::IntArray(values) => {
                write_list(out, values, |out, v| out.push_str(&v.to_string()));
            }
            PropValue::BoolArray(values) => {
                write_list(out, values, |out, v| {
                    out.push_str(if *v { "true" } else { "false" })
                });
            }
            PropValue::DataBlock(target) => {
                out.push('{');
                write_escaped_string(out, DATA_BLOCK_TAG);
                out.push_str(": ");
                match target {
                    Some(name) => write_escaped_string(out, name),
                    None => out.push_str("null"),
                }
                out.push('}');
            }
            PropValue::Group(map) => {
                out.push('{');
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    write_escaped_string(out, k);
                    out.push_str(": ");
                    v.write_json5(out);
                }
                out.push('}');
            }
        }
    }

    /// Convert this value to `target`, keeping as much of it as the target can hold.
    pub fn convert_to(&self, target: PropertyType) -> PropValue {
        match target {
            PropertyType::Float => PropValue::Float(self.coerce_f64()),
            PropertyType::Int => PropValue::Int(self.coerce_i64()),
            PropertyType::Bool => PropValue::Bool(self.coerce_bool()),
            PropertyType::String => PropValue::String(self.coerce_string()),
            PropertyType::FloatArray => {
                PropValue::FloatArray(self.elements().iter().map(|v| v.coerce_f64()).collect())
            }
            PropertyType::IntArray => {
                PropValue::IntArray(self.elements().iter().map(|v| v.coerce_i64()).collect())
            }
            PropertyType::BoolArray => {
                PropValue::BoolArray(self.elements().iter().map(|v| v.coerce_bool()).collect())
            }
            PropertyType::DataBlock => match self {
                PropValue::DataBlock(target) => PropValue::DataBlock(target.clone()),
                _ => PropValue::DataBlock(None),
            },
            PropertyType::Python => match self {
                PropValue::Group(map) => PropValue::Group(map.clone()),
                _ => PropValue::zero(PropertyType::Python),
            },
        }
    }

    /// Array elements as scalars; a scalar wraps as a single element.
    fn elements(&self) -> Vec<PropValue> {
        match self {
            PropValue::FloatArray(v) => v.iter().copied().map(PropValue::Float).collect(),
            PropValue::IntArray(v) => v.iter().copied().map(PropValue::Int).collect(),
            PropValue::BoolArray(v) => v.iter().copied().map(PropValue::Bool).collect(),
            PropValue::Float(_) | PropValue::Int(_) | PropValue::Bool(_) | PropValue::String(_) => {
                vec![self.clone()]
            }
            PropValue::DataBlock(_) | PropValue::Group(_) => Vec::new(),
        }
    }

    /// Scalar view: arrays unwrap to their first element.
    fn first_scalar(&self) -> Option<PropValue> {
        match self {
            PropValue::FloatArray(_) | PropValue::IntArray(_) | PropValue::BoolArray(_) => {
                self.elements().into_iter().next()
            }
            PropValue::DataBlock(_) | PropValue::Group(_) => None,
            scalar => Some(scalar.clone()),
        }
    }

    fn coerce_bool(&self) -> bool {
        match self.first_scalar() {
            Some(PropValue::Bool(b)) => b,
            Some(PropValue::Int(v)) => v != 0,
            Some(PropValue::Float(v)) => v != 0.0,
            Some(PropValue::String(s)) => {
                let t = s.trim().to_ascii_lowercase();
                matches!(t.as_str(), "true" | "1" | "yes" | "y")
            }
            _ => false,
        }
    }

    fn coerce_i64(&self) -> i64 {
        match self.first_scalar() {
            Some(PropValue::Int(v)) => v,
            Some(PropValue::Float(v)) => {
                if v.is_finite() {
                    v as i64
                } else {
                    0
                }
            }
            Some(PropValue::Bool(b)) => i64::from(b),
            Some(PropValue::String(s)) => {
                let t = s.trim();
                t.parse::<i64>()
                    .ok()
                    .or_else(|| t.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v as i64))
                    .unwrap_or(0)
            }
            _ => 0,
        }
    }

    fn coerce_f64(&self) -> f64 {
        match self.first_scalar() {
            Some(PropValue::Float(v)) => v,
            Some(PropValue::Int(v)) => v as f64,
            Some(PropValue::Bool(b)) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
            Some(PropValue::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    fn coerce_string(&self) -> String {
        match self {
            PropValue::String(s) => s.clone(),
            PropValue::DataBlock(target) => target.clone().unwrap_or_default(),
            other => other.to_json5_compact(),
        }
    }
}

fn write_list<T>(out: &mut String, values: &[T], mut write: impl FnMut(&mut String, &T)) {
    out.push('[');
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write(out, v);
    }
    out.push(']');
}

fn write_float(out: &mut String, v: f64) {
    if v.is_nan() {
        out.push_str("NaN");
    } else if v.is_infinite() {
        out.push_str(if v.is_sign_negative() {
            "-Infinity"
        } else {
            "Infinity"
        });
    } else {
        let mut buf = ryu::Buffer::new();
        out.push_str(buf.format(v));
    }
}

fn write_escaped_string(out: &mut String, s: &str) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write as _;
                write!(out, "\\u{:04X}", c as u32).ok();
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

impl Serialize for PropValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PropValue::Float(v) => serializer.serialize_f64(*v),
            PropValue::Int(v) => serializer.serialize_i64(*v),
            PropValue::Bool(v) => serializer.serialize_bool(*v),
            PropValue::String(s) => serializer.serialize_str(s),
            PropValue::FloatArray(values) => values.serialize(serializer),
            PropValue::IntArray(values) => values.serialize(serializer),
            PropValue::BoolArray(values) => values.serialize(serializer),
            PropValue::DataBlock(target) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(DATA_BLOCK_TAG, target)?;
                map.end()
            }
            PropValue::Group(map) => map.serialize(serializer),
        }
    }
}

/// Intermediate used while deserializing arrays and nested maps.
enum Raw {
    Null,
    Value(PropValue),
}

impl<'de> Deserialize<'de> for Raw {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> de::Visitor<'de> for ValueVisitor {
    type Value = Raw;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a custom property value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(Raw::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(Raw::Null)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
        Ok(Raw::Value(PropValue::Bool(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Raw::Value(PropValue::Int(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        i64::try_from(v)
            .map(|v| Raw::Value(PropValue::Int(v)))
            .map_err(|_| E::custom(format!("integer {v} does not fit in i64")))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Raw::Value(PropValue::Float(v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(Raw::Value(PropValue::String(v.to_owned())))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
        Ok(Raw::Value(PropValue::String(v)))
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut values = Vec::new();
        while let Some(value) = seq.next_element::<Raw>()? {
            match value {
                Raw::Value(v) => values.push(v),
                Raw::Null => return Err(de::Error::custom("array elements cannot be null")),
            }
        }
        array_from_elements(values)
            .map(Raw::Value)
            .map_err(de::Error::custom)
    }

    fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut values = IndexMap::new();
        let mut data_block: Option<Option<String>> = None;
        while let Some((key, value)) = map.next_entry::<String, Raw>()? {
            if key == DATA_BLOCK_TAG {
                data_block = Some(match value {
                    Raw::Null => None,
                    Raw::Value(PropValue::String(name)) => Some(name),
                    Raw::Value(_) => {
                        return Err(de::Error::custom("data-block reference must be a name"));
                    }
                });
                continue;
            }
            match value {
                Raw::Value(v) => {
                    values.insert(key, v);
                }
                Raw::Null => return Err(de::Error::custom(format!("'{key}' cannot be null"))),
            }
        }
        match data_block {
            Some(target) if values.is_empty() => Ok(Raw::Value(PropValue::DataBlock(target))),
            Some(_) => Err(de::Error::custom(
                "data-block reference cannot carry other keys",
            )),
            None => Ok(Raw::Value(PropValue::Group(values))),
        }
    }
}

/// Classify a homogeneous list: bools, ints, or floats (ints widen when mixed).
fn array_from_elements(values: Vec<PropValue>) -> Result<PropValue, String> {
    if values.is_empty() {
        return Ok(PropValue::FloatArray(Vec::new()));
    }
    if values.iter().all(|v| matches!(v, PropValue::Bool(_))) {
        return Ok(PropValue::BoolArray(
            values.iter().filter_map(PropValue::as_bool).collect(),
        ));
    }
    if values.iter().all(|v| matches!(v, PropValue::Int(_))) {
        return Ok(PropValue::IntArray(
            values.iter().filter_map(PropValue::as_i64).collect(),
        ));
    }
    if values
        .iter()
        .all(|v| matches!(v, PropValue::Int(_) | PropValue::Float(_)))
    {
        return Ok(PropValue::FloatArray(
            values.iter().filter_map(PropValue::as_f64).collect(),
        ));
    }
    Err("array property elements must all be float, int, or bool".to_string())
}

impl<'de> Deserialize<'de> for PropValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Value(v) => Ok(v),
            Raw::Null => Err(de::Error::custom("custom property values cannot be null")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PropValue, PropertyType};
    use indexmap::IndexMap;

    #[test]
    fn parse_json5_classifies_arrays_by_element() {
        let v = PropValue::parse_json5("[1, 2, 3]").unwrap();
        assert_eq!(v, PropValue::IntArray(vec![1, 2, 3]));

        let v = PropValue::parse_json5("[1, 2.5]").unwrap();
        assert_eq!(v, PropValue::FloatArray(vec![1.0, 2.5]));

        let v = PropValue::parse_json5("[true, false]").unwrap();
        assert_eq!(v, PropValue::BoolArray(vec![true, false]));

        let v = PropValue::parse_json5("[]").unwrap();
        assert_eq!(v.property_type(), PropertyType::FloatArray);

        assert!(PropValue::parse_json5("[1, 'x']").is_err());
    }

    #[test]
    fn parse_json5_reads_data_block_and_groups() {
        let v = PropValue::parse_json5("{ $id: 'Cube' }").unwrap();
        assert_eq!(v, PropValue::DataBlock(Some("Cube".to_string())));

        let v = PropValue::parse_json5("{ a: 1, nested: { b: 'x' }, }").unwrap();
        assert_eq!(v.property_type(), PropertyType::Python);
        let map = v.as_group().unwrap();
        assert_eq!(map.get("a"), Some(&PropValue::Int(1)));
    }

    #[test]
    fn compact_text_parses_back() {
        let mut nested = IndexMap::new();
        nested.insert("speed".to_string(), PropValue::Float(1.0));
        nested.insert("tag".to_string(), PropValue::String("a\"b".to_string()));
        nested.insert("ref".to_string(), PropValue::DataBlock(None));
        let v = PropValue::Group(nested);

        let text = v.to_json5_compact();
        assert_eq!(PropValue::parse_json5(&text).unwrap(), v);
    }

    #[test]
    fn floats_keep_their_type_in_text() {
        assert_eq!(PropValue::Float(2.0).to_json5_compact(), "2.0");
        assert_eq!(
            PropValue::parse_json5("2.0").unwrap(),
            PropValue::Float(2.0)
        );
    }

    #[test]
    fn convert_scalar_to_array_wraps() {
        let v = PropValue::Float(2.7).convert_to(PropertyType::IntArray);
        assert_eq!(v, PropValue::IntArray(vec![2]));
    }

    #[test]
    fn convert_array_to_scalar_takes_first_or_zero() {
        let v = PropValue::FloatArray(vec![1.5, 2.0]).convert_to(PropertyType::Float);
        assert_eq!(v, PropValue::Float(1.5));

        let v = PropValue::IntArray(vec![]).convert_to(PropertyType::Int);
        assert_eq!(v, PropValue::Int(0));

        let v = PropValue::BoolArray(vec![]).convert_to(PropertyType::Bool);
        assert_eq!(v, PropValue::Bool(false));
    }

    #[test]
    fn convert_handles_strings_and_special_types() {
        assert_eq!(
            PropValue::String(" 12 ".to_string()).convert_to(PropertyType::Int),
            PropValue::Int(12)
        );
        assert_eq!(
            PropValue::String("yes".to_string()).convert_to(PropertyType::Bool),
            PropValue::Bool(true)
        );
        assert_eq!(
            PropValue::Int(3).convert_to(PropertyType::String),
            PropValue::String("3".to_string())
        );
        assert_eq!(
            PropValue::Float(f64::NAN).convert_to(PropertyType::Int),
            PropValue::Int(0)
        );
        assert_eq!(
            PropValue::Int(3).convert_to(PropertyType::Python),
            PropValue::Group(IndexMap::new())
        );
        assert_eq!(
            PropValue::Int(3).convert_to(PropertyType::DataBlock),
            PropValue::DataBlock(None)
        );
        assert_eq!(
            PropValue::DataBlock(Some("Cube".to_string())).convert_to(PropertyType::Float),
            PropValue::Float(0.0)
        );
    }

    #[test]
    fn resized_pads_with_last_element() {
        let v = PropValue::FloatArray(vec![1.0, 2.0]).resized(4);
        assert_eq!(v, PropValue::FloatArray(vec![1.0, 2.0, 2.0, 2.0]));

        let v = PropValue::IntArray(vec![]).resized(2);
        assert_eq!(v, PropValue::IntArray(vec![0, 0]));

        let v = PropValue::BoolArray(vec![true, false, true]).resized(1);
        assert_eq!(v, PropValue::BoolArray(vec![true]));
    }

    #[test]
    fn property_type_parses_from_identifier() {
        for ty in PropertyType::ALL {
            assert_eq!(ty.as_str().parse::<PropertyType>().unwrap(), ty);
        }
        assert!("VECTOR".parse::<PropertyType>().is_err());
    }
}
