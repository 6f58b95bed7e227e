use crate::field::{FIELD_CONFIGS, Field, FieldKey, FieldRecord, ResolveContext};
use crate::PropertyType;
use indexmap::IndexMap;
use tracing::debug;

/// Builds the full, catalog-ordered field set for a property being edited.
pub struct FieldManager;

impl FieldManager {
    /// Every catalog entry bound to `property_type`. Only fields drawn for
    /// that type get a resolved `current_value`; the rest are present but empty.
    pub fn setup_fields(
        ctx: &ResolveContext<'_>,
        property_type: PropertyType,
    ) -> IndexMap<FieldKey, Field> {
        let mut fields = IndexMap::with_capacity(FIELD_CONFIGS.len());
        for config in &FIELD_CONFIGS {
            let mut field = Field::new(config, property_type);
            if field.should_draw(property_type) {
                field.set_current_value(Some(field.resolve_current_value(ctx)));
            }
            fields.insert(config.key, field);
        }

        debug!(
            prop = ctx.prop_name,
            %property_type,
            is_redraw = ctx.is_redraw,
            drawn = fields.values().filter(|f| f.current_value().is_some()).count(),
            "Set up fields"
        );
        fields
    }

    /// Serialize fields to the session's JSON record.
    pub fn store_fields(fields: &IndexMap<FieldKey, Field>) -> serde_json::Result<String> {
        let records: Vec<FieldRecord> = fields.values().map(Field::to_record).collect();
        serde_json::to_string(&records)
    }

    pub fn load_fields(json: &str) -> serde_json::Result<IndexMap<FieldKey, Field>> {
        let records: Vec<FieldRecord> = serde_json::from_str(json)?;
        Ok(records
            .into_iter()
            .map(|record| (record.name, Field::from_record(record)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::FieldManager;
    use crate::field::{AttrName, FieldKey, ResolveContext, SessionAttrs};
    use crate::{GroupData, MemoryBag, PropValue, PropertyType};
    use pretty_assertions::assert_eq;

    fn fixture() -> (MemoryBag, GroupData, SessionAttrs) {
        let bag = MemoryBag::new(1, "Cube").with("tint", PropValue::FloatArray(vec![1.0, 0.5, 0.0]));
        let mut groups = GroupData::new();
        groups.verify(&bag);
        let mut session = SessionAttrs::default();
        session.set(AttrName::fixed(FieldKey::Name), PropValue::String("tint".to_string()));
        session.set(
            AttrName::fixed(FieldKey::Type),
            PropValue::String("FLOAT_ARRAY".to_string()),
        );
        session.set(AttrName::fixed(FieldKey::ArrayLength), PropValue::Int(3));
        (bag, groups, session)
    }

    #[test]
    fn fields_follow_catalog_order_and_type_gating() {
        let (bag, groups, session) = fixture();
        let ctx = ResolveContext {
            bag: &bag,
            groups: &groups,
            session: &session,
            prop_name: "tint",
            is_redraw: false,
        };
        let fields = FieldManager::setup_fields(&ctx, PropertyType::FloatArray);

        let keys: Vec<FieldKey> = fields.keys().copied().collect();
        assert_eq!(keys.len(), 17);
        assert_eq!(keys[0], FieldKey::Name);
        assert_eq!(keys[16], FieldKey::IsOverridableLibrary);

        assert_eq!(
            fields[&FieldKey::ArrayLength].current_value(),
            Some(&PropValue::Int(3))
        );
        assert_eq!(
            fields[&FieldKey::Group].current_value(),
            Some(&PropValue::String(String::new()))
        );
        assert_eq!(fields[&FieldKey::IdType].current_value(), None);
        assert_eq!(fields[&FieldKey::PythonValue].current_value(), None);
    }

    #[test]
    fn stored_fields_load_back_identical() {
        let (bag, groups, session) = fixture();
        let ctx = ResolveContext {
            bag: &bag,
            groups: &groups,
            session: &session,
            prop_name: "tint",
            is_redraw: false,
        };
        let fields = FieldManager::setup_fields(&ctx, PropertyType::FloatArray);

        let json = FieldManager::store_fields(&fields).unwrap();
        assert!(json.starts_with('['));
        let loaded = FieldManager::load_fields(&json).unwrap();
        assert_eq!(loaded, fields);
    }

    #[test]
    fn load_rejects_unknown_attribute_names() {
        let json = r#"[{"name":"min","label":"Min","property_type":"FLOAT",
            "attr_name":"min_vector","source":{"kind":"session_attr","attr":"min_vector"}}]"#;
        assert!(FieldManager::load_fields(json).is_err());
    }
}
