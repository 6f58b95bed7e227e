use crate::{PropValue, PropertyType, statics};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Keys of the host's per-property UI metadata record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiDataKey {
    Subtype,
    Min,
    Max,
    SoftMin,
    SoftMax,
    Step,
    Precision,
    Default,
    IdType,
    Items,
    Description,
}

impl UiDataKey {
    pub const ALL: [UiDataKey; 11] = [
        UiDataKey::Subtype,
        UiDataKey::Min,
        UiDataKey::Max,
        UiDataKey::SoftMin,
        UiDataKey::SoftMax,
        UiDataKey::Step,
        UiDataKey::Precision,
        UiDataKey::Default,
        UiDataKey::IdType,
        UiDataKey::Items,
        UiDataKey::Description,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UiDataKey::Subtype => "subtype",
            UiDataKey::Min => "min",
            UiDataKey::Max => "max",
            UiDataKey::SoftMin => "soft_min",
            UiDataKey::SoftMax => "soft_max",
            UiDataKey::Step => "step",
            UiDataKey::Precision => "precision",
            UiDataKey::Default => "default",
            UiDataKey::IdType => "id_type",
            UiDataKey::Items => "items",
            UiDataKey::Description => "description",
        }
    }

    /// Whether the host keeps this key for properties of `ty`.
    pub fn applies_to(self, ty: PropertyType) -> bool {
        match self {
            UiDataKey::Description => ty.supports_ui_data(),
            UiDataKey::Default => !matches!(ty, PropertyType::DataBlock | PropertyType::Python),
            UiDataKey::Subtype
            | UiDataKey::Min
            | UiDataKey::Max
            | UiDataKey::SoftMin
            | UiDataKey::SoftMax
            | UiDataKey::Step => ty.is_numeric(),
            UiDataKey::Precision => ty.element_type() == PropertyType::Float,
            UiDataKey::IdType => ty == PropertyType::DataBlock,
            UiDataKey::Items => false,
        }
    }
}

impl fmt::Display for UiDataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UiDataKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UiDataKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown UI data key '{s}'"))
    }
}

/// One entry of an enum-style property's item list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumItem {
    pub identifier: String,
    pub name: String,
    pub description: String,
}

/// Host-side UI metadata of one property. Every key is optional and not
/// every key is meaningful for every property type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<PropValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<PropValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soft_min: Option<PropValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soft_max: Option<PropValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<PropValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<PropValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<EnumItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl UiData {
    pub fn is_empty(&self) -> bool {
        *self == UiData::default()
    }

    /// Read one key as a property value. `items` has no value form.
    pub fn get(&self, key: UiDataKey) -> Option<PropValue> {
        match key {
            UiDataKey::Subtype => self.subtype.clone().map(PropValue::String),
            UiDataKey::Min => self.min.clone(),
            UiDataKey::Max => self.max.clone(),
            UiDataKey::SoftMin => self.soft_min.clone(),
            UiDataKey::SoftMax => self.soft_max.clone(),
            UiDataKey::Step => self.step.clone(),
            UiDataKey::Precision => self.precision.map(PropValue::Int),
            UiDataKey::Default => self.default.clone(),
            UiDataKey::IdType => self.id_type.clone().map(PropValue::String),
            UiDataKey::Items => None,
            UiDataKey::Description => self.description.clone().map(PropValue::String),
        }
    }

    /// Like [`UiData::get`], but an absent description reads as the placeholder text.
    pub fn get_or_placeholder(&self, key: UiDataKey) -> Option<PropValue> {
        match (key, self.get(key)) {
            (UiDataKey::Description, None) => Some(PropValue::String(
                statics::EN_DESCRIPTION_PLACEHOLDER.to_string(),
            )),
            (_, value) => value,
        }
    }

    pub fn set(&mut self, key: UiDataKey, value: PropValue) {
        let text = |v: PropValue| match v {
            PropValue::String(s) => s,
            other => other.to_json5_compact(),
        };
        match key {
            UiDataKey::Subtype => self.subtype = Some(text(value)),
            UiDataKey::Min => self.min = Some(value),
            UiDataKey::Max => self.max = Some(value),
            UiDataKey::SoftMin => self.soft_min = Some(value),
            UiDataKey::SoftMax => self.soft_max = Some(value),
            UiDataKey::Step => self.step = Some(value),
            UiDataKey::Precision => self.precision = value.as_i64(),
            UiDataKey::Default => self.default = Some(value),
            UiDataKey::IdType => self.id_type = Some(text(value)),
            UiDataKey::Items => {}
            UiDataKey::Description => self.description = Some(text(value)),
        }
    }

    /// Merge every key present in `other` into `self` (the host's `update(**ui_data)`).
    pub fn update(&mut self, other: &UiData) {
        for key in UiDataKey::ALL {
            if let Some(value) = other.get(key) {
                self.set(key, value);
            }
        }
        if other.items.is_some() {
            self.items = other.items.clone();
        }
    }
}

/// Valid subtype identifiers for a property type.
pub fn subtypes_for(ty: PropertyType) -> &'static [(&'static str, &'static str)] {
    if ty.is_array() {
        statics::SUBTYPES_VECTOR
    } else {
        statics::SUBTYPES_SCALAR
    }
}
