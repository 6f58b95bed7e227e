//! The host object's live key/value store and the contract this crate
//! relies on. Bags are owned by the host; anything may add or remove keys
//! between calls into this crate.

use crate::{PropValue, UiData};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stable identity of a bag for the lifetime of an open document.
/// Unlike the bag's display name, it is unique and never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BagId(pub u64);

impl fmt::Display for BagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum BagError {
    #[error("Property '{key}' not found in '{bag}'")]
    MissingKey { bag: String, key: String },

    #[error("'{bag}' is read-only")]
    ReadOnly { bag: String },
}

pub trait AttributeBag {
    fn id(&self) -> BagId;

    /// Display name; mutable and not unique.
    fn name(&self) -> &str;

    /// Every key currently stored, private keys included, in storage order.
    fn keys(&self) -> Vec<String>;

    fn get(&self, key: &str) -> Option<&PropValue>;

    fn set(&mut self, key: &str, value: PropValue) -> Result<(), BagError>;

    /// Remove a key along with its UI data and override flag.
    fn remove(&mut self, key: &str) -> Result<PropValue, BagError>;

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// UI data of `key`; empty when the property has none.
    fn ui_data(&self, key: &str) -> UiData;

    /// Merge `ui` into the UI data of an existing property.
    fn update_ui_data(&mut self, key: &str, ui: &UiData) -> Result<(), BagError>;

    fn clear_ui_data(&mut self, key: &str) -> Result<(), BagError>;

    fn is_property_overridable(&self, key: &str) -> bool;

    /// Returns whether the flag could be set.
    fn set_property_overridable(&mut self, key: &str, overridable: bool) -> bool;

    fn is_read_only(&self) -> bool {
        false
    }
}

/// In-memory bag used by the reference document and by tests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryBag {
    #[serde(skip)]
    id: u64,
    #[serde(skip)]
    name: String,
    #[serde(default)]
    pub props: IndexMap<String, PropValue>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub ui: IndexMap<String, UiData>,
    #[serde(default, skip_serializing_if = "IndexSet::is_empty")]
    pub overridable: IndexSet<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
}

impl MemoryBag {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder-style insert for fixtures.
    pub fn with(mut self, key: &str, value: PropValue) -> Self {
        self.props.insert(key.to_string(), value);
        self
    }

    pub(crate) fn set_identity(&mut self, id: u64, name: &str) {
        self.id = id;
        self.name = name.to_string();
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    fn ensure_writable(&self) -> Result<(), BagError> {
        if self.read_only {
            return Err(BagError::ReadOnly {
                bag: self.name.clone(),
            });
        }
        Ok(())
    }

    fn missing(&self, key: &str) -> BagError {
        BagError::MissingKey {
            bag: self.name.clone(),
            key: key.to_string(),
        }
    }
}

impl AttributeBag for MemoryBag {
    fn id(&self) -> BagId {
        BagId(self.id)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn keys(&self) -> Vec<String> {
        self.props.keys().cloned().collect()
    }

    fn get(&self, key: &str) -> Option<&PropValue> {
        self.props.get(key)
    }

    fn set(&mut self, key: &str, value: PropValue) -> Result<(), BagError> {
        self.ensure_writable()?;
        // A value of a different shape invalidates the old UI data.
        if let Some(old) = self.props.get(key)
            && old.property_type() != value.property_type()
        {
            self.ui.shift_remove(key);
        }
        self.props.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<PropValue, BagError> {
        self.ensure_writable()?;
        let value = self.props.shift_remove(key).ok_or_else(|| self.missing(key))?;
        self.ui.shift_remove(key);
        self.overridable.shift_remove(key);
        Ok(value)
    }

    fn ui_data(&self, key: &str) -> UiData {
        self.ui.get(key).cloned().unwrap_or_default()
    }

    fn update_ui_data(&mut self, key: &str, ui: &UiData) -> Result<(), BagError> {
        self.ensure_writable()?;
        if !self.props.contains_key(key) {
            return Err(self.missing(key));
        }
        self.ui.entry(key.to_string()).or_default().update(ui);
        Ok(())
    }

    fn clear_ui_data(&mut self, key: &str) -> Result<(), BagError> {
        self.ensure_writable()?;
        if !self.props.contains_key(key) {
            return Err(self.missing(key));
        }
        self.ui.shift_remove(key);
        Ok(())
    }

    fn is_property_overridable(&self, key: &str) -> bool {
        self.overridable.contains(key)
    }

    fn set_property_overridable(&mut self, key: &str, overridable: bool) -> bool {
        if self.read_only || !self.props.contains_key(key) {
            return false;
        }
        if overridable {
            self.overridable.insert(key.to_string());
        } else {
            self.overridable.shift_remove(key);
        }
        true
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}

#[cfg(test)]
mod tests {
    use super::{AttributeBag, BagError, MemoryBag};
    use crate::{PropValue, UiData};

    #[test]
    fn remove_drops_ui_data_and_override_flag() {
        let mut bag = MemoryBag::new(1, "Cube").with("a", PropValue::Float(1.0));
        let ui = UiData {
            min: Some(PropValue::Float(0.0)),
            ..Default::default()
        };
        bag.update_ui_data("a", &ui).unwrap();
        assert!(bag.set_property_overridable("a", true));

        assert_eq!(bag.remove("a").unwrap(), PropValue::Float(1.0));
        assert!(bag.ui_data("a").is_empty());
        assert!(!bag.is_property_overridable("a"));
    }

    #[test]
    fn read_only_bag_refuses_writes() {
        let mut bag = MemoryBag::new(1, "Linked").with("a", PropValue::Int(1));
        bag.read_only = true;
        assert_eq!(
            bag.set("a", PropValue::Int(2)),
            Err(BagError::ReadOnly {
                bag: "Linked".to_string()
            })
        );
        assert!(!bag.set_property_overridable("a", true));
        assert_eq!(bag.get("a"), Some(&PropValue::Int(1)));
    }

    #[test]
    fn changing_value_shape_drops_ui_data() {
        let mut bag = MemoryBag::new(1, "Cube").with("a", PropValue::Float(1.0));
        let ui = UiData {
            step: Some(PropValue::Float(0.5)),
            ..Default::default()
        };
        bag.update_ui_data("a", &ui).unwrap();

        bag.set("a", PropValue::Float(2.0)).unwrap();
        assert!(!bag.ui_data("a").is_empty());

        bag.set("a", PropValue::String("x".to_string())).unwrap();
        assert!(bag.ui_data("a").is_empty());
    }
}
