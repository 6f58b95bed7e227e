//! The static catalog of editable property facets and the per-session
//! `Field` bound to one property type.

use crate::{AttributeBag, GroupData, PropValue, PropertyType, UiDataKey, statics};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Every editable facet of a custom property.
/// Declaration order is the catalog order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    Name,
    Group,
    Type,
    ArrayLength,
    Default,
    Min,
    Max,
    UseSoftLimits,
    SoftMin,
    SoftMax,
    Step,
    Precision,
    Subtype,
    IdType,
    PythonValue,
    Description,
    IsOverridableLibrary,
}

impl FieldKey {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKey::Name => "name",
            FieldKey::Group => "group",
            FieldKey::Type => "type",
            FieldKey::ArrayLength => "array_length",
            FieldKey::Default => "default",
            FieldKey::Min => "min",
            FieldKey::Max => "max",
            FieldKey::UseSoftLimits => "use_soft_limits",
            FieldKey::SoftMin => "soft_min",
            FieldKey::SoftMax => "soft_max",
            FieldKey::Step => "step",
            FieldKey::Precision => "precision",
            FieldKey::Subtype => "subtype",
            FieldKey::IdType => "id_type",
            FieldKey::PythonValue => "python_value",
            FieldKey::Description => "description",
            FieldKey::IsOverridableLibrary => "is_overridable_library",
        }
    }

    pub fn config(self) -> &'static FieldConfig {
        &FIELD_CONFIGS[self as usize]
    }

    /// Property type whose lowercase name completes a prefixed attribute name.
    /// Only default values keep arrays apart from scalars.
    fn storage_type(self, ty: PropertyType) -> PropertyType {
        match self {
            FieldKey::Default => ty,
            _ => ty.element_type(),
        }
    }

    /// Value used when neither the host nor the session has one.
    pub fn fallback_value(self, ty: PropertyType) -> PropValue {
        let number = |int: i64, float: f64| {
            if ty.element_type() == PropertyType::Int {
                PropValue::Int(int)
            } else {
                PropValue::Float(float)
            }
        };
        match self {
            FieldKey::Name | FieldKey::Group | FieldKey::Description => {
                PropValue::String(String::new())
            }
            FieldKey::Type => PropValue::String(ty.as_str().to_string()),
            FieldKey::ArrayLength => PropValue::Int(statics::ARRAY_LENGTH_DEFAULT as i64),
            FieldKey::Default => {
                let zero = PropValue::zero(ty);
                if ty.is_array() {
                    zero.resized(statics::ARRAY_LENGTH_DEFAULT)
                } else {
                    zero
                }
            }
            FieldKey::Min | FieldKey::SoftMin => number(-10_000, -10_000.0),
            FieldKey::Max | FieldKey::SoftMax => number(10_000, 10_000.0),
            FieldKey::UseSoftLimits | FieldKey::IsOverridableLibrary => PropValue::Bool(false),
            FieldKey::Step => number(statics::DEFAULT_STEP_INT, statics::DEFAULT_STEP_FLOAT),
            FieldKey::Precision => PropValue::Int(statics::DEFAULT_PRECISION),
            FieldKey::Subtype => PropValue::String(statics::DEFAULT_SUBTYPE.to_string()),
            FieldKey::IdType => PropValue::String(statics::ID_TYPE_DEFAULT.to_string()),
            FieldKey::PythonValue => {
                PropValue::String(PropValue::zero(PropertyType::Python).to_json5_compact())
            }
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Property types a field is shown for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOn {
    All,
    Types(&'static [PropertyType]),
}

impl DrawOn {
    pub fn contains(self, ty: PropertyType) -> bool {
        match self {
            DrawOn::All => true,
            DrawOn::Types(types) => types.contains(&ty),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldConfig {
    pub key: FieldKey,
    pub label: &'static str,
    pub draw_on: DrawOn,
    /// Fixed session attribute, used when there is no prefix.
    pub attr_name: Option<&'static str>,
    /// Prefix of a type-specific session attribute, e.g. `min_` -> `min_float`.
    pub attr_prefix: Option<&'static str>,
    /// UI data key, when not derivable from the attribute name.
    pub ui_data_attr: Option<UiDataKey>,
}

impl FieldConfig {
    /// The UI data key this field reads and writes, explicit or derived from
    /// its attribute naming.
    pub fn ui_data_key(&self) -> Option<UiDataKey> {
        if self.ui_data_attr.is_some() {
            return self.ui_data_attr;
        }
        let base = match (self.attr_prefix, self.attr_name) {
            (Some(prefix), _) => prefix.trim_end_matches('_'),
            (None, Some(name)) => name,
            (None, None) => return None,
        };
        base.parse().ok()
    }
}

const NUMERIC: &[PropertyType] = &[
    PropertyType::Float,
    PropertyType::FloatArray,
    PropertyType::Int,
    PropertyType::IntArray,
];
const FLOATS: &[PropertyType] = &[PropertyType::Float, PropertyType::FloatArray];
const ARRAYS: &[PropertyType] = &[
    PropertyType::FloatArray,
    PropertyType::IntArray,
    PropertyType::BoolArray,
];
const WITH_DEFAULT: &[PropertyType] = &[
    PropertyType::Float,
    PropertyType::FloatArray,
    PropertyType::Int,
    PropertyType::IntArray,
    PropertyType::Bool,
    PropertyType::BoolArray,
    PropertyType::String,
];
const WITH_UI_DATA: &[PropertyType] = &[
    PropertyType::Float,
    PropertyType::FloatArray,
    PropertyType::Int,
    PropertyType::IntArray,
    PropertyType::Bool,
    PropertyType::BoolArray,
    PropertyType::String,
    PropertyType::DataBlock,
];

const fn fixed(key: FieldKey, label: &'static str, draw_on: DrawOn, attr: &'static str) -> FieldConfig {
    FieldConfig {
        key,
        label,
        draw_on,
        attr_name: Some(attr),
        attr_prefix: None,
        ui_data_attr: None,
    }
}

const fn prefixed(
    key: FieldKey,
    label: &'static str,
    draw_on: DrawOn,
    prefix: &'static str,
) -> FieldConfig {
    FieldConfig {
        key,
        label,
        draw_on,
        attr_name: None,
        attr_prefix: Some(prefix),
        ui_data_attr: None,
    }
}

/// Indexed by `FieldKey as usize`.
pub static FIELD_CONFIGS: [FieldConfig; 17] = [
    fixed(FieldKey::Name, statics::EN_LABEL_NAME, DrawOn::All, "name"),
    fixed(FieldKey::Group, statics::EN_LABEL_GROUP, DrawOn::All, "group"),
    fixed(FieldKey::Type, statics::EN_LABEL_TYPE, DrawOn::All, "property_type"),
    fixed(
        FieldKey::ArrayLength,
        statics::EN_LABEL_ARRAY_LENGTH,
        DrawOn::Types(ARRAYS),
        "array_length",
    ),
    prefixed(
        FieldKey::Default,
        statics::EN_LABEL_DEFAULT,
        DrawOn::Types(WITH_DEFAULT),
        "default_",
    ),
    prefixed(FieldKey::Min, statics::EN_LABEL_MIN, DrawOn::Types(NUMERIC), "min_"),
    prefixed(FieldKey::Max, statics::EN_LABEL_MAX, DrawOn::Types(NUMERIC), "max_"),
    fixed(
        FieldKey::UseSoftLimits,
        statics::EN_LABEL_USE_SOFT_LIMITS,
        DrawOn::Types(NUMERIC),
        "use_soft_limits",
    ),
    prefixed(
        FieldKey::SoftMin,
        statics::EN_LABEL_SOFT_MIN,
        DrawOn::Types(NUMERIC),
        "soft_min_",
    ),
    prefixed(
        FieldKey::SoftMax,
        statics::EN_LABEL_SOFT_MAX,
        DrawOn::Types(NUMERIC),
        "soft_max_",
    ),
    prefixed(FieldKey::Step, statics::EN_LABEL_STEP, DrawOn::Types(NUMERIC), "step_"),
    fixed(
        FieldKey::Precision,
        statics::EN_LABEL_PRECISION,
        DrawOn::Types(FLOATS),
        "precision",
    ),
    prefixed(
        FieldKey::Subtype,
        statics::EN_LABEL_SUBTYPE,
        DrawOn::Types(NUMERIC),
        "subtype_",
    ),
    fixed(
        FieldKey::IdType,
        statics::EN_LABEL_ID_TYPE,
        DrawOn::Types(&[PropertyType::DataBlock]),
        "id_type",
    ),
    fixed(
        FieldKey::PythonValue,
        statics::EN_LABEL_PYTHON_VALUE,
        DrawOn::Types(&[PropertyType::Python]),
        "python_value",
    ),
    fixed(
        FieldKey::Description,
        statics::EN_LABEL_DESCRIPTION,
        DrawOn::Types(WITH_UI_DATA),
        "description",
    ),
    fixed(
        FieldKey::IsOverridableLibrary,
        statics::EN_LABEL_OVERRIDABLE,
        DrawOn::All,
        "is_overridable_library",
    ),
];

/// Name of an edit-session attribute: a facet, plus the property type for
/// type-specific facets (`min_float`, `default_int_array`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct AttrName {
    pub key: FieldKey,
    pub ty: Option<PropertyType>,
}

impl AttrName {
    pub fn for_field(key: FieldKey, ty: PropertyType) -> Self {
        match key.config().attr_prefix {
            Some(_) => Self {
                key,
                ty: Some(key.storage_type(ty)),
            },
            None => Self { key, ty: None },
        }
    }

    pub const fn fixed(key: FieldKey) -> Self {
        Self { key, ty: None }
    }
}

impl fmt::Display for AttrName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = self.key.config();
        match (config.attr_prefix, self.ty, config.attr_name) {
            (Some(prefix), Some(ty), _) => {
                write!(f, "{prefix}{}", ty.as_str().to_ascii_lowercase())
            }
            (_, _, Some(name)) => f.write_str(name),
            _ => f.write_str(self.key.as_str()),
        }
    }
}

impl FromStr for AttrName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        for config in &FIELD_CONFIGS {
            match (config.attr_prefix, config.attr_name) {
                (Some(prefix), _) => {
                    let Some(rest) = s.strip_prefix(prefix) else {
                        continue;
                    };
                    let found = PropertyType::ALL.into_iter().find(|ty| {
                        config.key.storage_type(*ty) == *ty
                            && ty.as_str().eq_ignore_ascii_case(rest)
                    });
                    if let Some(ty) = found {
                        return Ok(AttrName {
                            key: config.key,
                            ty: Some(ty),
                        });
                    }
                }
                (None, Some(name)) if name == s => return Ok(AttrName::fixed(config.key)),
                _ => {}
            }
        }
        Err(format!("unknown field attribute '{s}'"))
    }
}

impl From<AttrName> for String {
    fn from(attr: AttrName) -> Self {
        attr.to_string()
    }
}

impl TryFrom<String> for AttrName {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// The transient attributes of an edit session: the user's working copy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionAttrs {
    values: IndexMap<AttrName, PropValue>,
}

impl SessionAttrs {
    pub fn get(&self, attr: AttrName) -> Option<&PropValue> {
        self.values.get(&attr)
    }

    pub fn set(&mut self, attr: AttrName, value: PropValue) {
        self.values.insert(attr, value);
    }

    pub fn contains(&self, attr: AttrName) -> bool {
        self.values.contains_key(&attr)
    }

    pub fn text(&self, attr: AttrName) -> &str {
        self.get(attr)
            .and_then(PropValue::as_str)
            .unwrap_or(statics::EN_EMPTY)
    }

    pub fn iter(&self) -> impl Iterator<Item = (AttrName, &PropValue)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }
}

/// Where a field's current value comes from; chosen once per field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "attr", rename_all = "snake_case")]
pub enum ValueSource {
    UiData(UiDataKey),
    GroupLookup,
    OverrideFlag,
    SessionAttr(AttrName),
}

/// Everything a field may read its current value from.
pub struct ResolveContext<'a> {
    pub bag: &'a dyn AttributeBag,
    pub groups: &'a GroupData,
    pub session: &'a SessionAttrs,
    /// Bag key of the property being edited.
    pub prop_name: &'a str,
    pub is_redraw: bool,
}

/// One catalog entry bound to a property type for one edit session.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    config: &'static FieldConfig,
    property_type: PropertyType,
    attr_name: AttrName,
    source: ValueSource,
    current_value: Option<PropValue>,
}

impl Field {
    pub fn new(config: &'static FieldConfig, property_type: PropertyType) -> Self {
        let attr_name = AttrName::for_field(config.key, property_type);
        let source = match (config.ui_data_key(), config.key) {
            (Some(key), _) => ValueSource::UiData(key),
            (None, FieldKey::Group) => ValueSource::GroupLookup,
            (None, FieldKey::IsOverridableLibrary) => ValueSource::OverrideFlag,
            (None, _) => ValueSource::SessionAttr(attr_name),
        };
        Self {
            config,
            property_type,
            attr_name,
            source,
            current_value: None,
        }
    }

    pub fn key(&self) -> FieldKey {
        self.config.key
    }

    pub fn label(&self) -> &'static str {
        self.config.label
    }

    pub fn property_type(&self) -> PropertyType {
        self.property_type
    }

    pub fn attr_name(&self) -> AttrName {
        self.attr_name
    }

    pub fn source(&self) -> ValueSource {
        self.source
    }

    pub fn ui_data_attr(&self) -> Option<UiDataKey> {
        match self.source {
            ValueSource::UiData(key) => Some(key),
            _ => None,
        }
    }

    pub fn current_value(&self) -> Option<&PropValue> {
        self.current_value.as_ref()
    }

    pub fn set_current_value(&mut self, value: Option<PropValue>) {
        self.current_value = value;
    }

    pub fn should_draw(&self, property_type: PropertyType) -> bool {
        self.config.draw_on.contains(property_type)
    }

    pub fn draws_on_all(&self) -> bool {
        self.config.draw_on == DrawOn::All
    }

    pub fn fallback_value(&self) -> PropValue {
        self.key().fallback_value(self.property_type)
    }

    /// Look up this field's current value. On a redraw after a type change,
    /// type-specific fields read the session's working copy, since the bag
    /// still holds data shaped for the old type.
    pub fn resolve_current_value(&self, ctx: &ResolveContext<'_>) -> PropValue {
        if ctx.is_redraw && !self.draws_on_all() {
            return ctx
                .session
                .get(self.attr_name)
                .cloned()
                .unwrap_or_else(|| self.fallback_value());
        }

        match self.source {
            ValueSource::UiData(key) => ctx
                .bag
                .ui_data(ctx.prop_name)
                .get_or_placeholder(key)
                .unwrap_or_else(|| self.fallback_value()),
            ValueSource::GroupLookup => {
                PropValue::String(ctx.groups.get_group_name(ctx.prop_name).to_string())
            }
            ValueSource::OverrideFlag => {
                PropValue::Bool(ctx.bag.is_property_overridable(ctx.prop_name))
            }
            ValueSource::SessionAttr(attr) => ctx
                .session
                .get(attr)
                .cloned()
                .unwrap_or_else(|| self.fallback_value()),
        }
    }

    pub fn to_record(&self) -> FieldRecord {
        FieldRecord {
            name: self.key(),
            label: self.label().to_string(),
            property_type: self.property_type,
            attr_name: self.attr_name,
            source: self.source,
            current_value: self.current_value.clone(),
        }
    }

    pub fn from_record(record: FieldRecord) -> Self {
        Self {
            config: record.name.config(),
            property_type: record.property_type,
            attr_name: record.attr_name,
            source: record.source,
            current_value: record.current_value,
        }
    }
}

/// Flat form of a [`Field`], kept on the edit session between redraws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub name: FieldKey,
    pub label: String,
    pub property_type: PropertyType,
    pub attr_name: AttrName,
    pub source: ValueSource,
    #[serde(default)]
    pub current_value: Option<PropValue>,
}
