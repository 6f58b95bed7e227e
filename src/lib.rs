//! Core library for the custom property manager (CPM).
//! Groups a host object's custom properties into named groups, keeps that
//! grouping in sync with the object's live keys across save/load, and
//! applies property edits (name, group, type, UI data) as one operation.

mod bag;
mod config;
mod document;
mod error;
pub mod field;
mod field_manager;
mod group_data;
mod group_data_manager;
mod property_data_manager;
mod session;
pub mod statics;
mod ui_data;
mod value;

pub use bag::{AttributeBag, BagError, BagId, MemoryBag};
pub use config::{LogLevel, Preferences, init_logging};
pub use document::{Document, DocumentFormat, DocumentHost};
pub use error::EditError;
pub use field::{AttrName, FIELD_CONFIGS, Field, FieldConfig, FieldKey};
pub use field_manager::FieldManager;
pub use group_data::{DisplayView, GroupData, GroupDataRecord};
pub use group_data_manager::GroupDataManager;
pub use property_data_manager::{ApplyReport, PropertyDataManager, normalize_ui_data};
pub use session::EditSession;
pub use ui_data::{EnumItem, UiData, UiDataKey, subtypes_for};
pub use value::{PropValue, PropertyType};
