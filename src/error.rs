use crate::{BagError, PropertyType};
use thiserror::Error;

/// User-facing failures of property editing and grouping operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EditError {
    #[error("Could not find data object from data path '{0}'")]
    BagNotFound(String),

    #[error("Property '{prop}' not found in '{bag}'")]
    PropertyNotFound { bag: String, prop: String },

    #[error("Property '{name}' already exists in '{bag}'")]
    NameCollision { bag: String, name: String },

    #[error("Property name cannot be empty")]
    EmptyName,

    #[error("Cannot rename '{prop}': renaming {kind} properties is not supported")]
    UnsupportedRename { prop: String, kind: PropertyType },

    #[error("Property '{prop}' is not part of the group data of '{bag}'")]
    NotClassified { bag: String, prop: String },

    #[error("Invalid value for '{prop}': {reason}")]
    InvalidValue { prop: String, reason: String },

    #[error("Edit session record is unreadable: {0}")]
    SessionRecord(String),

    #[error(transparent)]
    Bag(#[from] BagError),
}
