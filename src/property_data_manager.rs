//! Applies a confirmed edit session to the bag and the grouping store.
//!
//! Steps run in a fixed order and each one is skipped when its facet did
//! not change. A failing step reports its error and the remaining steps
//! still run.

use crate::field::{AttrName, FIELD_CONFIGS, Field, FieldKey};
use crate::{
    AttributeBag, BagError, BagId, DocumentHost, EditError, EditSession, GroupDataManager,
    PropValue, PropertyType, UiData, UiDataKey, statics, subtypes_for,
};
use indexmap::IndexMap;
use tracing::{debug, error, info};

/// What `apply` changed, and every error it hit along the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    pub renamed: Option<(String, String)>,
    pub regrouped: Option<String>,
    pub retyped: Option<(PropertyType, PropertyType)>,
    pub ui_data_changed: bool,
    pub resized: Option<(usize, usize)>,
    pub overridable_changed: bool,
    pub value_changed: bool,
    pub errors: Vec<EditError>,
}

impl ApplyReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_changes(&self) -> bool {
        self.renamed.is_some()
            || self.regrouped.is_some()
            || self.retyped.is_some()
            || self.ui_data_changed
            || self.resized.is_some()
            || self.overridable_changed
            || self.value_changed
    }

    /// User-facing error messages.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    fn fail(&mut self, err: EditError) {
        error!("{err}");
        self.errors.push(err);
    }
}

pub struct PropertyDataManager;

impl PropertyDataManager {
    /// Check that `data_path` names a bag holding `prop_name`.
    pub fn validate(host: &dyn DocumentHost, data_path: &str, prop_name: &str) -> bool {
        match Self::locate(host, data_path, prop_name) {
            Ok(_) => true,
            Err(err) => {
                error!(data_path, prop = prop_name, "{err}");
                false
            }
        }
    }

    /// The bag at `data_path` and the current type of `prop_name` on it.
    pub fn locate(
        host: &dyn DocumentHost,
        data_path: &str,
        prop_name: &str,
    ) -> Result<(BagId, PropertyType), EditError> {
        let id = host
            .resolve(data_path)
            .ok_or_else(|| EditError::BagNotFound(data_path.to_string()))?;
        let bag = host
            .bag(id)
            .ok_or_else(|| EditError::BagNotFound(data_path.to_string()))?;
        let value = bag
            .get(prop_name)
            .ok_or_else(|| EditError::PropertyNotFound {
                bag: bag.name().to_string(),
                prop: prop_name.to_string(),
            })?;
        Ok((id, value.property_type()))
    }

    pub fn apply(
        host: &mut dyn DocumentHost,
        groups: &mut GroupDataManager,
        session: &mut EditSession,
    ) -> ApplyReport {
        let mut report = ApplyReport::default();
        let fields = match session.fields() {
            Ok(fields) => fields,
            Err(err) => {
                report.fail(err);
                return report;
            }
        };
        let Some(bag) = host.bag_mut(session.bag_id()) else {
            report.fail(EditError::BagNotFound(session.data_path().to_string()));
            return report;
        };
        if !bag.contains(session.prop_name()) {
            report.fail(EditError::PropertyNotFound {
                bag: bag.name().to_string(),
                prop: session.prop_name().to_string(),
            });
            return report;
        }
        debug!(bag = bag.name(), prop = session.prop_name(), "Applying edit session");

        let mut edit = Apply {
            bag,
            groups: &mut *groups,
            session: &mut *session,
            fields: &fields,
            report: &mut report,
        };
        edit.rename();
        edit.group();
        edit.property_type();
        edit.ui_data();
        edit.array_length();
        edit.overridable();
        edit.python_value();

        info!(
            prop = session.prop_name(),
            changed = report.has_changes(),
            errors = report.errors.len(),
            "Applied edit session"
        );
        report
    }
}

/// State shared by the apply steps.
struct Apply<'a> {
    bag: &'a mut dyn AttributeBag,
    groups: &'a mut GroupDataManager,
    session: &'a mut EditSession,
    fields: &'a IndexMap<FieldKey, Field>,
    report: &'a mut ApplyReport,
}

impl Apply<'_> {
    fn snapshot(&self, key: FieldKey) -> Option<&PropValue> {
        self.fields.get(&key).and_then(Field::current_value)
    }

    fn working(&self, key: FieldKey) -> Option<&PropValue> {
        self.session.get(AttrName::fixed(key))
    }

    /// Fields not drawn when the session opened have no snapshot and
    /// never count as changed.
    fn changed(&self, key: FieldKey) -> bool {
        match (self.working(key), self.snapshot(key)) {
            (Some(working), Some(snapshot)) => working != snapshot,
            _ => false,
        }
    }

    fn prop(&self) -> String {
        self.session.prop_name().to_string()
    }

    /// Live type of the property.
    fn live_type(&self) -> Option<PropertyType> {
        self.bag
            .get(self.session.prop_name())
            .map(PropValue::property_type)
    }

    fn rename(&mut self) {
        let old = self.session.prop_name().to_string();
        let new = self
            .session
            .attrs()
            .text(AttrName::fixed(FieldKey::Name))
            .to_string();
        if new == old {
            return;
        }

        if let Err(err) = self.check_rename(&old, &new) {
            self.session.revert_name();
            self.report.fail(err);
            return;
        }

        let store = self.groups.get(&*self.bag);
        if let Err(err) = store.update_property_name(&*self.bag, &old, &new) {
            self.session.revert_name();
            self.report.fail(err);
            return;
        }

        // Copy value, UI data and override flag before dropping the old key.
        if let Err(err) = self.move_property(&old, &new) {
            self.report.fail(err.into());
            return;
        }

        self.session.renamed(&new);
        debug!(old_name = %old, new_name = %new, "Renamed property");
        self.report.renamed = Some((old, new));
    }

    fn check_rename(&self, old: &str, new: &str) -> Result<(), EditError> {
        if new.is_empty() {
            return Err(EditError::EmptyName);
        }
        if let Some(kind) = self.live_type()
            && !kind.supports_rename()
        {
            return Err(EditError::UnsupportedRename {
                prop: old.to_string(),
                kind,
            });
        }
        if self.bag.contains(new) {
            return Err(EditError::NameCollision {
                bag: self.bag.name().to_string(),
                name: new.to_string(),
            });
        }
        if self.bag.is_read_only() {
            return Err(BagError::ReadOnly {
                bag: self.bag.name().to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn move_property(&mut self, old: &str, new: &str) -> Result<(), BagError> {
        let value = self
            .bag
            .get(old)
            .cloned()
            .ok_or_else(|| BagError::MissingKey {
                bag: self.bag.name().to_string(),
                key: old.to_string(),
            })?;
        let ui = self.bag.ui_data(old);
        let overridable = self.bag.is_property_overridable(old);

        self.bag.set(new, value)?;
        if !ui.is_empty() {
            self.bag.update_ui_data(new, &ui)?;
        }
        if overridable {
            self.bag.set_property_overridable(new, true);
        }
        self.bag.remove(old)?;
        Ok(())
    }

    fn group(&mut self) {
        if !self.changed(FieldKey::Group) {
            return;
        }
        let group = self
            .session
            .attrs()
            .text(AttrName::fixed(FieldKey::Group))
            .trim()
            .to_string();
        let name = self.prop();
        self.groups
            .get(&*self.bag)
            .update_property_group(&name, &group);
        self.report.regrouped = Some(group);
    }

    fn target_type(&mut self) -> Option<PropertyType> {
        let text = self.session.attrs().text(AttrName::fixed(FieldKey::Type));
        match text.parse::<PropertyType>() {
            Ok(ty) => Some(ty),
            Err(reason) => {
                let prop = self.prop();
                self.report.fail(EditError::InvalidValue { prop, reason });
                None
            }
        }
    }

    fn property_type(&mut self) {
        let (Some(old_type), Some(new_type)) = (self.live_type(), self.target_type()) else {
            return;
        };
        if old_type == new_type {
            return;
        }
        let name = self.prop();
        let Some(value) = self.bag.get(&name) else {
            return;
        };
        let converted = value.convert_to(new_type);

        let result = self
            .bag
            .set(&name, converted)
            .and_then(|()| self.bag.clear_ui_data(&name));
        match result {
            Ok(()) => {
                debug!(prop = %name, %old_type, %new_type, "Converted property");
                self.report.retyped = Some((old_type, new_type));
            }
            Err(err) => self.report.fail(err.into()),
        }
    }

    fn ui_data(&mut self) {
        let Some(ty) = self.live_type() else {
            return;
        };
        if !ty.supports_ui_data() {
            return;
        }
        let touched = self.report.retyped.is_some()
            || self.changed(FieldKey::UseSoftLimits)
            || self.changed(FieldKey::ArrayLength)
            || self.fields.values().any(|field| {
                field.ui_data_attr().is_some()
                    && field.should_draw(ty)
                    && self.session.get(field.attr_name()) != field.current_value()
            });
        if !touched {
            return;
        }

        let mut ui = UiData::default();
        for config in &FIELD_CONFIGS {
            let field = Field::new(config, ty);
            let Some(key) = field.ui_data_attr() else {
                continue;
            };
            if !field.should_draw(ty) || !key.applies_to(ty) {
                continue;
            }
            if let Some(value) = self.session.get(field.attr_name()) {
                ui.set(key, value.clone());
            }
        }
        let use_soft_limits = self
            .working(FieldKey::UseSoftLimits)
            .and_then(PropValue::as_bool)
            .unwrap_or(false);
        normalize_ui_data(&mut ui, ty, use_soft_limits, self.session.array_length());

        let name = self.prop();
        if ui == self.bag.ui_data(&name) {
            return;
        }
        let result = self
            .bag
            .clear_ui_data(&name)
            .and_then(|()| self.bag.update_ui_data(&name, &ui));
        match result {
            Ok(()) => self.report.ui_data_changed = true,
            Err(err) => self.report.fail(err.into()),
        }
    }

    fn array_length(&mut self) {
        let name = self.prop();
        let Some(value) = self.bag.get(&name) else {
            return;
        };
        let Some(current) = value.array_len() else {
            return;
        };
        let requested = self.session.array_length();
        if current == requested {
            return;
        }
        let resized = value.resized(requested);

        // Replacing the value may drop the UI data; put it back afterwards.
        let ui = self.bag.ui_data(&name);
        let mut result = self.bag.set(&name, resized);
        if result.is_ok() && !ui.is_empty() {
            result = self.bag.update_ui_data(&name, &ui);
        }
        match result {
            Ok(()) => {
                debug!(prop = %name, from = current, to = requested, "Resized array");
                self.report.resized = Some((current, requested));
            }
            Err(err) => self.report.fail(err.into()),
        }
    }

    fn overridable(&mut self) {
        if !self.changed(FieldKey::IsOverridableLibrary) {
            return;
        }
        let Some(flag) = self
            .working(FieldKey::IsOverridableLibrary)
            .and_then(PropValue::as_bool)
        else {
            return;
        };
        let name = self.prop();
        if self.bag.set_property_overridable(&name, flag) {
            self.report.overridable_changed = true;
        } else {
            self.report.fail(EditError::InvalidValue {
                prop: name,
                reason: "library override flag could not be set".to_string(),
            });
        }
    }

    fn python_value(&mut self) {
        if self.live_type() != Some(PropertyType::Python) || !self.changed(FieldKey::PythonValue) {
            return;
        }
        let name = self.prop();
        let text = self
            .session
            .attrs()
            .text(AttrName::fixed(FieldKey::PythonValue))
            .to_string();
        let value = match PropValue::parse_json5(&text) {
            Ok(value) => value,
            Err(err) => {
                self.report.fail(EditError::InvalidValue {
                    prop: name,
                    reason: err.to_string(),
                });
                return;
            }
        };
        if self.bag.get(&name) == Some(&value) {
            return;
        }
        match self.bag.set(&name, value) {
            Ok(()) => self.report.value_changed = true,
            Err(err) => self.report.fail(err.into()),
        }
    }
}

/// Make a rebuilt UI data record consistent: numeric kinds match the
/// property, limits are ordered, soft limits fall back to or stay inside
/// the hard limits, and the default matches the array length.
pub fn normalize_ui_data(ui: &mut UiData, ty: PropertyType, use_soft_limits: bool, len: usize) {
    if ty.is_numeric() {
        let scalar = ty.element_type();
        for value in [
            &mut ui.min,
            &mut ui.max,
            &mut ui.soft_min,
            &mut ui.soft_max,
            &mut ui.step,
        ]
        .into_iter()
        .flatten()
        {
            *value = value.convert_to(scalar);
        }

        swap_if_inverted(&mut ui.min, &mut ui.max);
        if use_soft_limits {
            swap_if_inverted(&mut ui.soft_min, &mut ui.soft_max);
            clamp_above(&mut ui.soft_min, &ui.min);
            clamp_below(&mut ui.soft_max, &ui.max);
        } else {
            ui.soft_min = ui.min.clone();
            ui.soft_max = ui.max.clone();
        }
    }

    if let Some(default) = ui.default.take() {
        let default = default.convert_to(ty);
        ui.default = Some(if ty.is_array() {
            default.resized(len)
        } else {
            default
        });
    }

    if let Some(subtype) = &ui.subtype
        && !subtypes_for(ty).iter().any(|(id, _)| *id == subtype.as_str())
    {
        ui.subtype = Some(statics::DEFAULT_SUBTYPE.to_string());
    }
    if let Some(id_type) = &ui.id_type
        && !statics::ID_TYPES.contains(&id_type.as_str())
    {
        ui.id_type = Some(statics::ID_TYPE_DEFAULT.to_string());
    }
    if ui
        .description
        .as_deref()
        .is_some_and(|d| d.is_empty() || d == statics::EN_DESCRIPTION_PLACEHOLDER)
    {
        ui.description = None;
    }
    if !UiDataKey::Precision.applies_to(ty) {
        ui.precision = None;
    }
}

fn number(value: &Option<PropValue>) -> Option<f64> {
    value.as_ref().and_then(PropValue::as_f64)
}

fn swap_if_inverted(low: &mut Option<PropValue>, high: &mut Option<PropValue>) {
    if let (Some(lo), Some(hi)) = (number(low), number(high))
        && hi < lo
    {
        std::mem::swap(low, high);
    }
}

fn clamp_above(value: &mut Option<PropValue>, bound: &Option<PropValue>) {
    if let (Some(v), Some(b)) = (number(value), number(bound))
        && v < b
    {
        *value = bound.clone();
    }
}

fn clamp_below(value: &mut Option<PropValue>, bound: &Option<PropValue>) {
    if let (Some(v), Some(b)) = (number(value), number(bound))
        && v > b
    {
        *value = bound.clone();
    }
}
