//! One open property edit: a snapshot of the property's state plus the
//! user's working copy of every field.

use crate::field::{AttrName, Field, FieldKey, ResolveContext, SessionAttrs};
use crate::{
    ApplyReport, BagId, DocumentHost, EditError, FieldManager, GroupDataManager, PropValue,
    PropertyDataManager, PropertyType, statics,
};
use indexmap::IndexMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct EditSession {
    data_path: String,
    bag_id: BagId,
    /// Bag key of the property; follows a successful rename.
    prop_name: String,
    property_type: PropertyType,
    attrs: SessionAttrs,
    /// Field records of the current type, as JSON.
    fields_json: String,
}

impl EditSession {
    /// Start editing `prop_name` on the bag at `data_path`. Nothing is
    /// written to the bag or the grouping store until [`EditSession::confirm`].
    pub fn open(
        host: &dyn DocumentHost,
        groups: &mut GroupDataManager,
        data_path: &str,
        prop_name: &str,
    ) -> Result<Self, EditError> {
        let (bag_id, property_type) = PropertyDataManager::locate(host, data_path, prop_name)?;
        let bag = host
            .bag(bag_id)
            .ok_or_else(|| EditError::BagNotFound(data_path.to_string()))?;
        let value = bag
            .get(prop_name)
            .ok_or_else(|| EditError::PropertyNotFound {
                bag: bag.name().to_string(),
                prop: prop_name.to_string(),
            })?;

        let mut attrs = SessionAttrs::default();
        attrs.set(
            AttrName::fixed(FieldKey::Name),
            PropValue::String(prop_name.to_string()),
        );
        attrs.set(
            AttrName::fixed(FieldKey::Type),
            PropValue::String(property_type.as_str().to_string()),
        );
        let length = value.array_len().unwrap_or(statics::ARRAY_LENGTH_DEFAULT);
        attrs.set(
            AttrName::fixed(FieldKey::ArrayLength),
            PropValue::Int(length as i64),
        );
        attrs.set(
            AttrName::fixed(FieldKey::PythonValue),
            PropValue::String(value.to_json5_compact()),
        );
        let ui = bag.ui_data(prop_name);
        let soft_limits = ui.soft_min.is_some() && ui.soft_min != ui.min
            || ui.soft_max.is_some() && ui.soft_max != ui.max;
        attrs.set(
            AttrName::fixed(FieldKey::UseSoftLimits),
            PropValue::Bool(soft_limits),
        );

        let store = groups.get(bag);
        let ctx = ResolveContext {
            bag,
            groups: store,
            session: &attrs,
            prop_name,
            is_redraw: false,
        };
        let fields = FieldManager::setup_fields(&ctx, property_type);
        seed_attrs(&mut attrs, &fields);

        let mut session = Self {
            data_path: data_path.to_string(),
            bag_id,
            prop_name: prop_name.to_string(),
            property_type,
            attrs,
            fields_json: String::new(),
        };
        session.store_fields(&fields)?;

        debug!(data_path, prop = prop_name, %property_type, "Opened edit session");
        Ok(session)
    }

    pub fn data_path(&self) -> &str {
        &self.data_path
    }

    pub fn bag_id(&self) -> BagId {
        self.bag_id
    }

    pub fn prop_name(&self) -> &str {
        &self.prop_name
    }

    /// Type the fields are currently set up for.
    pub fn property_type(&self) -> PropertyType {
        self.property_type
    }

    pub fn attrs(&self) -> &SessionAttrs {
        &self.attrs
    }

    pub fn get(&self, attr: AttrName) -> Option<&PropValue> {
        self.attrs.get(attr)
    }

    /// Working value of a field for the current type.
    pub fn field_value(&self, key: FieldKey) -> Option<&PropValue> {
        self.attrs.get(AttrName::for_field(key, self.property_type))
    }

    /// The JSON record of the current fields.
    pub fn fields_json(&self) -> &str {
        &self.fields_json
    }

    pub fn fields(&self) -> Result<IndexMap<FieldKey, Field>, EditError> {
        FieldManager::load_fields(&self.fields_json)
            .map_err(|err| EditError::SessionRecord(err.to_string()))
    }

    /// Fields drawn for the current type, in catalog order.
    pub fn visible_fields(&self) -> Result<Vec<Field>, EditError> {
        let ty = self.property_type;
        Ok(self
            .fields()?
            .into_values()
            .filter(|field| field.should_draw(ty))
            .collect())
    }

    /// Edit the working copy. Type changes go through [`EditSession::change_type`].
    pub fn set(&mut self, attr: AttrName, value: PropValue) {
        let value = match (attr.key, &value) {
            (FieldKey::ArrayLength, PropValue::Int(len)) => PropValue::Int(
                (*len).clamp(statics::ARRAY_LENGTH_MIN as i64, statics::ARRAY_LENGTH_MAX as i64),
            ),
            _ => value,
        };
        self.attrs.set(attr, value);
    }

    /// Edit a field's working value for the current type.
    pub fn set_field(&mut self, key: FieldKey, value: PropValue) {
        self.set(AttrName::for_field(key, self.property_type), value);
    }

    /// Switch the edited type and redraw the fields. Type-specific fields
    /// are read from the working copy, never from the bag's old-type data.
    pub fn change_type(
        &mut self,
        host: &dyn DocumentHost,
        groups: &mut GroupDataManager,
        new_type: PropertyType,
    ) -> Result<(), EditError> {
        if new_type == self.property_type {
            return Ok(());
        }
        let bag = host
            .bag(self.bag_id)
            .ok_or_else(|| EditError::BagNotFound(self.data_path.clone()))?;
        let previous = self.fields()?;
        let old_type = self.property_type;

        self.attrs.set(
            AttrName::fixed(FieldKey::Type),
            PropValue::String(new_type.as_str().to_string()),
        );
        let new_default = AttrName::for_field(FieldKey::Default, new_type);
        if !self.attrs.contains(new_default)
            && let Some(old) = self.attrs.get(AttrName::for_field(FieldKey::Default, old_type))
        {
            let converted = old.convert_to(new_type);
            let converted = if new_type.is_array() {
                converted.resized(self.array_length())
            } else {
                converted
            };
            self.attrs.set(new_default, converted);
        }
        if new_type == PropertyType::Python
            && let Some(value) = bag.get(&self.prop_name)
        {
            self.attrs.set(
                AttrName::fixed(FieldKey::PythonValue),
                PropValue::String(value.convert_to(new_type).to_json5_compact()),
            );
        }

        let store = groups.get(bag);
        let ctx = ResolveContext {
            bag,
            groups: store,
            session: &self.attrs,
            prop_name: &self.prop_name,
            is_redraw: true,
        };
        let mut fields = FieldManager::setup_fields(&ctx, new_type);

        // Type-independent fields keep the snapshot taken at open.
        for (key, field) in fields.iter_mut() {
            if field.draws_on_all()
                && let Some(prev) = previous.get(key)
            {
                field.set_current_value(prev.current_value().cloned());
            }
        }
        seed_attrs(&mut self.attrs, &fields);

        self.property_type = new_type;
        self.store_fields(&fields)?;
        debug!(prop = %self.prop_name, %old_type, %new_type, "Changed edited type");
        Ok(())
    }

    /// Apply the working copy to the bag and the grouping store.
    pub fn confirm(
        &mut self,
        host: &mut dyn DocumentHost,
        groups: &mut GroupDataManager,
    ) -> ApplyReport {
        PropertyDataManager::apply(host, groups, self)
    }

    /// Discard the session. The bag and the grouping store are untouched.
    pub fn cancel(self) {
        debug!(prop = %self.prop_name, "Cancelled edit session");
    }

    pub(crate) fn array_length(&self) -> usize {
        self.attrs
            .get(AttrName::fixed(FieldKey::ArrayLength))
            .and_then(PropValue::as_i64)
            .map_or(statics::ARRAY_LENGTH_DEFAULT, |len| {
                len.clamp(statics::ARRAY_LENGTH_MIN as i64, statics::ARRAY_LENGTH_MAX as i64)
                    as usize
            })
    }

    pub(crate) fn renamed(&mut self, new_name: &str) {
        self.prop_name = new_name.to_string();
    }

    pub(crate) fn revert_name(&mut self) {
        self.attrs.set(
            AttrName::fixed(FieldKey::Name),
            PropValue::String(self.prop_name.clone()),
        );
    }

    fn store_fields(&mut self, fields: &IndexMap<FieldKey, Field>) -> Result<(), EditError> {
        self.fields_json = FieldManager::store_fields(fields)
            .map_err(|err| EditError::SessionRecord(err.to_string()))?;
        Ok(())
    }
}

/// Resolved values become the starting working copy; values the user
/// already edited stay.
fn seed_attrs(attrs: &mut SessionAttrs, fields: &IndexMap<FieldKey, Field>) {
    for field in fields.values() {
        if let Some(value) = field.current_value()
            && !attrs.contains(field.attr_name())
        {
            attrs.set(field.attr_name(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::EditSession;
    use crate::field::{AttrName, FieldKey};
    use crate::{
        Document, DocumentHost, EditError, GroupDataManager, Preferences, PropValue, PropertyType,
        UiData,
    };
    use pretty_assertions::assert_eq;

    fn document() -> (Document, GroupDataManager) {
        let mut doc = Document::new();
        let cube = doc.add_object("Cube");
        let bag = doc.bag_mut(cube).unwrap();
        bag.set("power", PropValue::Float(2.0)).unwrap();
        bag.update_ui_data(
            "power",
            &UiData {
                min: Some(PropValue::Float(0.0)),
                max: Some(PropValue::Float(10.0)),
                ..Default::default()
            },
        )
        .unwrap();
        (doc, GroupDataManager::new(Preferences::default()))
    }

    #[test]
    fn open_snapshots_current_state() {
        let (doc, mut groups) = document();
        let session = EditSession::open(&doc, &mut groups, "objects.Cube", "power").unwrap();

        assert_eq!(session.property_type(), PropertyType::Float);
        assert_eq!(session.field_value(FieldKey::Max), Some(&PropValue::Float(10.0)));
        assert_eq!(
            session.field_value(FieldKey::Name),
            Some(&PropValue::String("power".to_string()))
        );
        assert_eq!(
            session.field_value(FieldKey::UseSoftLimits),
            Some(&PropValue::Bool(false))
        );
        assert!(session.fields_json().contains("\"max_float\""));

        let visible: Vec<FieldKey> = session
            .visible_fields()
            .unwrap()
            .iter()
            .map(|f| f.key())
            .collect();
        assert!(visible.contains(&FieldKey::Precision));
        assert!(!visible.contains(&FieldKey::ArrayLength));
    }

    #[test]
    fn open_reports_missing_bag_and_property() {
        let (doc, mut groups) = document();
        assert_eq!(
            EditSession::open(&doc, &mut groups, "objects.Lamp", "power").unwrap_err(),
            EditError::BagNotFound("objects.Lamp".to_string())
        );
        assert_eq!(
            EditSession::open(&doc, &mut groups, "objects.Cube", "nope").unwrap_err(),
            EditError::PropertyNotFound {
                bag: "Cube".to_string(),
                prop: "nope".to_string()
            }
        );
    }

    #[test]
    fn change_type_redraws_from_working_copy() {
        let (doc, mut groups) = document();
        let mut session = EditSession::open(&doc, &mut groups, "objects.Cube", "power").unwrap();
        session.set_field(FieldKey::Default, PropValue::Float(1.5));

        session
            .change_type(&doc, &mut groups, PropertyType::IntArray)
            .unwrap();
        assert_eq!(session.property_type(), PropertyType::IntArray);
        assert_eq!(
            session.field_value(FieldKey::Default),
            Some(&PropValue::IntArray(vec![1, 1, 1]))
        );
        assert_eq!(session.field_value(FieldKey::Min), Some(&PropValue::Int(-10_000)));

        let fields = session.fields().unwrap();
        assert_eq!(
            fields[&FieldKey::Type].current_value(),
            Some(&PropValue::String("FLOAT".to_string()))
        );
        assert_eq!(
            session.get(AttrName::fixed(FieldKey::Type)),
            Some(&PropValue::String("INT_ARRAY".to_string()))
        );
    }

    #[test]
    fn array_length_is_clamped() {
        let (doc, mut groups) = document();
        let mut session = EditSession::open(&doc, &mut groups, "objects.Cube", "power").unwrap();
        session.set_field(FieldKey::ArrayLength, PropValue::Int(99));
        assert_eq!(session.array_length(), 32);
        session.set_field(FieldKey::ArrayLength, PropValue::Int(0));
        assert_eq!(session.array_length(), 1);
    }

    #[test]
    fn cancel_leaves_bag_untouched() {
        let (doc, mut groups) = document();
        let before = doc.object("Cube").unwrap().clone();
        let mut session = EditSession::open(&doc, &mut groups, "objects.Cube", "power").unwrap();
        session.set_field(FieldKey::Name, PropValue::String("watts".to_string()));
        session.cancel();
        assert_eq!(doc.object("Cube").unwrap(), &before);
    }
}
