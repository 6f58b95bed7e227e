//! Which properties of a bag belong to which named group.
//!
//! Invariants kept by every operation here:
//! - a key appears at most once across all groups and `ungrouped`;
//! - after `verify`, the keys are exactly the bag's non-private keys;
//! - groups without members are never serialized.

use crate::{AttributeBag, EditError, Preferences, statics};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, error};

/// Serialized form: `{"grouped": [{"<group>": ["<key>", ...]}, ...], "ungrouped": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupDataRecord {
    #[serde(default)]
    pub grouped: Vec<IndexMap<String, Vec<String>>>,
    #[serde(default)]
    pub ungrouped: Vec<String>,
}

/// Groups and ungrouped keys sorted case-insensitively, for display only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayView {
    pub groups: Vec<(String, Vec<String>)>,
    pub ungrouped: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupData {
    grouped: IndexMap<String, Vec<String>>,
    ungrouped: Vec<String>,
}

impl GroupData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a persisted record. Duplicate keys keep their first
    /// location, repeated group names are merged and members of a nameless
    /// group are ungrouped.
    pub fn from_record(record: GroupDataRecord) -> Self {
        let mut data = Self::new();
        let mut seen = HashSet::new();

        for group in record.grouped {
            for (group_name, props) in group {
                let members = if group_name.is_empty() {
                    &mut data.ungrouped
                } else {
                    data.grouped.entry(group_name).or_default()
                };
                for prop in props {
                    if seen.insert(prop.clone()) {
                        members.push(prop);
                    }
                }
            }
        }
        for prop in record.ungrouped {
            if seen.insert(prop.clone()) {
                data.ungrouped.push(prop);
            }
        }

        data.prune_empty_groups();
        data
    }

    pub fn from_json(text: &str) -> Result<Self, json5::Error> {
        let record = json5::from_str::<GroupDataRecord>(text)?;
        Ok(Self::from_record(record))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.as_serializable())
    }

    /// Snapshot for persistence; empty groups are left out.
    pub fn as_serializable(&self) -> GroupDataRecord {
        GroupDataRecord {
            grouped: self
                .grouped
                .iter()
                .filter(|(_, props)| !props.is_empty())
                .map(|(name, props)| {
                    let mut group = IndexMap::new();
                    group.insert(name.clone(), props.clone());
                    group
                })
                .collect(),
            ungrouped: self.ungrouped.clone(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.ungrouped.iter().any(|k| k == key)
            || self.grouped.values().any(|props| props.iter().any(|k| k == key))
    }

    /// Owning group of `key`, or "" when ungrouped or unknown.
    pub fn get_group_name(&self, key: &str) -> &str {
        self.grouped
            .iter()
            .find(|(_, props)| props.iter().any(|k| k == key))
            .map(|(name, _)| name.as_str())
            .unwrap_or(statics::EN_EMPTY)
    }

    pub fn groups(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.grouped
            .iter()
            .map(|(name, props)| (name.as_str(), props.as_slice()))
    }

    pub fn group(&self, name: &str) -> Option<&[String]> {
        self.grouped.get(name).map(Vec::as_slice)
    }

    pub fn ungrouped(&self) -> &[String] {
        &self.ungrouped
    }

    /// Number of classified keys.
    pub fn len(&self) -> usize {
        self.ungrouped.len() + self.grouped.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Relabel `old_key` in place, keeping its position and group.
    /// The store is left unchanged on error.
    pub fn update_property_name(
        &mut self,
        bag: &dyn AttributeBag,
        old_key: &str,
        new_key: &str,
    ) -> Result<(), EditError> {
        if !self.contains(old_key) {
            let err = EditError::NotClassified {
                bag: bag.name().to_string(),
                prop: old_key.to_string(),
            };
            error!(bag = bag.name(), prop = old_key, "{err}");
            return Err(err);
        }
        if old_key == new_key {
            return Ok(());
        }
        if bag.contains(new_key) || self.contains(new_key) {
            let err = EditError::NameCollision {
                bag: bag.name().to_string(),
                name: new_key.to_string(),
            };
            error!(bag = bag.name(), old_key, new_key, "{err}");
            return Err(err);
        }

        let slot = self
            .grouped
            .values_mut()
            .flat_map(|props| props.iter_mut())
            .chain(self.ungrouped.iter_mut())
            .find(|k| k.as_str() == old_key);
        if let Some(slot) = slot {
            *slot = new_key.to_string();
        }

        debug!(bag = bag.name(), old_key, new_key, "Renamed property in group data");
        Ok(())
    }

    /// Move `key` to `new_group`, or to `ungrouped` when `new_group` is empty.
    /// Unknown keys are placed as if newly classified.
    pub fn update_property_group(&mut self, key: &str, new_group: &str) {
        let in_target = if new_group.is_empty() {
            self.ungrouped.iter().any(|k| k == key)
        } else {
            self.grouped
                .get(new_group)
                .is_some_and(|props| props.iter().any(|k| k == key))
        };
        if in_target {
            return;
        }

        self.remove_key(key);
        if new_group.is_empty() {
            self.ungrouped.push(key.to_string());
        } else {
            self.grouped
                .entry(new_group.to_string())
                .or_default()
                .push(key.to_string());
        }
        self.prune_empty_groups();

        debug!(prop = key, group = new_group, "Moved property");
    }

    /// Dissolve a group; its members become ungrouped in their current order.
    pub fn remove_group(&mut self, group: &str) -> bool {
        let Some(props) = self.grouped.shift_remove(group) else {
            return false;
        };
        debug!(group, members = props.len(), "Removed property group");
        self.ungrouped.extend(props);
        true
    }

    /// Resync with the bag under the default preferences.
    pub fn verify(&mut self, bag: &dyn AttributeBag) {
        self.verify_with(bag, &Preferences::default());
    }

    /// Resync with the bag: drop keys the bag no longer has (or that are
    /// private, or the persisted record itself), add bag keys not yet
    /// classified as ungrouped, and prune groups left empty. Idempotent.
    pub fn verify_with(&mut self, bag: &dyn AttributeBag, prefs: &Preferences) {
        let bag_keys: Vec<String> = bag
            .keys()
            .into_iter()
            .filter(|k| !prefs.is_private(k) && *k != prefs.group_data_key)
            .collect();
        let live: HashSet<&str> = bag_keys.iter().map(String::as_str).collect();

        let before = self.len();
        for props in self.grouped.values_mut() {
            props.retain(|k| live.contains(k.as_str()));
        }
        self.ungrouped.retain(|k| live.contains(k.as_str()));
        let removed = before - self.len();

        let mut added = 0usize;
        for key in &bag_keys {
            if !self.contains(key) {
                self.ungrouped.push(key.clone());
                added += 1;
            }
        }

        self.prune_empty_groups();

        if removed > 0 || added > 0 {
            debug!(bag = bag.name(), removed, added, "Group data resynced");
        }
    }

    pub fn display_view(&self) -> DisplayView {
        let sorted = |props: &[String]| {
            let mut props = props.to_vec();
            props.sort_by_key(|k| k.to_lowercase());
            props
        };
        DisplayView {
            groups: self
                .grouped
                .iter()
                .map(|(name, props)| (name.clone(), sorted(props)))
                .collect(),
            ungrouped: sorted(&self.ungrouped),
        }
    }

    fn remove_key(&mut self, key: &str) {
        for props in self.grouped.values_mut() {
            props.retain(|k| k != key);
        }
        self.ungrouped.retain(|k| k != key);
    }

    fn prune_empty_groups(&mut self) {
        self.grouped.retain(|_, props| !props.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::{GroupData, GroupDataRecord};
    use crate::{AttributeBag, EditError, MemoryBag, PropValue, statics};
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    fn record(grouped: &[(&str, &[&str])], ungrouped: &[&str]) -> GroupDataRecord {
        GroupDataRecord {
            grouped: grouped
                .iter()
                .map(|(name, props)| {
                    let mut group = IndexMap::new();
                    group.insert(
                        name.to_string(),
                        props.iter().map(|p| p.to_string()).collect(),
                    );
                    group
                })
                .collect(),
            ungrouped: ungrouped.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn bag(keys: &[&str]) -> MemoryBag {
        keys.iter().fold(MemoryBag::new(1, "Cube"), |bag, k| {
            bag.with(k, PropValue::Float(0.0))
        })
    }

    #[test]
    fn moving_ungrouped_into_existing_group_appends() {
        let mut data = GroupData::from_record(record(&[("Lighting", &["intensity"])], &["notes"]));
        data.update_property_group("notes", "Lighting");
        assert_eq!(
            data.as_serializable(),
            record(&[("Lighting", &["intensity", "notes"])], &[])
        );
    }

    #[test]
    fn moving_last_member_out_prunes_group() {
        let mut data = GroupData::from_record(record(&[("G", &["a"])], &[]));
        data.update_property_group("a", "");
        assert_eq!(data.as_serializable(), record(&[], &["a"]));
        assert_eq!(data.groups().count(), 0);
    }

    #[test]
    fn moving_into_new_group_creates_it_at_the_end() {
        let mut data = GroupData::from_record(record(&[("A", &["x"])], &["y"]));
        data.update_property_group("y", "B");
        assert_eq!(data.as_serializable(), record(&[("A", &["x"]), ("B", &["y"])], &[]));
    }

    #[test]
    fn moving_to_current_group_keeps_order() {
        let mut data = GroupData::from_record(record(&[("A", &["x"]), ("B", &["y"])], &[]));
        data.update_property_group("x", "A");
        assert_eq!(data.as_serializable(), record(&[("A", &["x"]), ("B", &["y"])], &[]));
    }

    #[test]
    fn moving_unknown_key_classifies_it() {
        let mut data = GroupData::new();
        data.update_property_group("ghost", "G");
        assert_eq!(data.get_group_name("ghost"), "G");
    }

    #[test]
    fn rename_keeps_position_and_group() {
        let bag = bag(&["a", "b", "c"]);
        let mut data = GroupData::from_record(record(&[("G", &["a", "b"])], &["c"]));

        data.update_property_name(&bag, "a", "z").unwrap();
        assert_eq!(data.as_serializable(), record(&[("G", &["z", "b"])], &["c"]));

        data.update_property_name(&bag, "c", "w").unwrap();
        assert_eq!(data.as_serializable(), record(&[("G", &["z", "b"])], &["w"]));
    }

    #[test]
    fn rename_onto_existing_bag_key_is_rejected() {
        let bag = bag(&["a", "b"]);
        let mut data = GroupData::from_record(record(&[], &["a", "b"]));
        let before = data.clone();

        let err = data.update_property_name(&bag, "a", "b").unwrap_err();
        assert_eq!(
            err,
            EditError::NameCollision {
                bag: "Cube".to_string(),
                name: "b".to_string()
            }
        );
        assert_eq!(data, before);
        assert!(bag.contains("a"));
    }

    #[test]
    fn rename_of_unknown_key_reports_and_leaves_store() {
        let bag = bag(&["a"]);
        let mut data = GroupData::from_record(record(&[], &["a"]));
        let before = data.clone();
        assert!(matches!(
            data.update_property_name(&bag, "missing", "x"),
            Err(EditError::NotClassified { .. })
        ));
        assert_eq!(data, before);
    }

    #[test]
    fn verify_fills_empty_store_from_bag() {
        let bag = bag(&["x", "y"]);
        let mut data = GroupData::new();
        data.verify(&bag);
        assert_eq!(data.as_serializable(), record(&[], &["x", "y"]));
    }

    #[test]
    fn verify_drops_stale_and_private_keys() {
        let bag = bag(&["a", "_hidden", "c"]);
        let mut data = GroupData::from_record(record(&[("G", &["gone"]), ("H", &["a"])], &["_hidden"]));
        data.verify(&bag);
        assert_eq!(data.as_serializable(), record(&[("H", &["a"])], &["c"]));
    }

    #[test]
    fn verify_ignores_persisted_record_key() {
        let bag = bag(&["a"]).with(
            statics::CPM_GROUP_DATA_KEY,
            PropValue::String(r#"{"grouped": [], "ungrouped": []}"#.to_string()),
        );
        let mut data = GroupData::new();
        data.verify(&bag);
        assert_eq!(data.ungrouped(), ["a".to_string()]);
    }

    #[test]
    fn verify_twice_is_identical() {
        let bag = bag(&["b", "a", "c"]);
        let mut data = GroupData::from_record(record(&[("G", &["c", "x"])], &["y"]));
        data.verify(&bag);
        let once = data.clone();
        data.verify(&bag);
        assert_eq!(data, once);
    }

    #[test]
    fn from_record_repairs_duplicates() {
        let data = GroupData::from_record(record(
            &[("G", &["a", "a"]), ("H", &["a", "b"]), ("G", &["c"])],
            &["b", "d"],
        ));
        assert_eq!(
            data.as_serializable(),
            record(&[("G", &["a", "c"]), ("H", &["b"])], &["d"])
        );
    }

    #[test]
    fn json_round_trip_and_format() {
        let data = GroupData::from_record(record(&[("Lighting", &["intensity"])], &["notes"]));
        let json = data.to_json().unwrap();
        assert_eq!(
            json,
            r#"{"grouped":[{"Lighting":["intensity"]}],"ungrouped":["notes"]}"#
        );
        assert_eq!(GroupData::from_json(&json).unwrap(), data);
    }

    #[test]
    fn from_json_accepts_missing_fields() {
        let data = GroupData::from_json("{}").unwrap();
        assert!(data.is_empty());
        assert!(GroupData::from_json("not json").is_err());
    }

    #[test]
    fn remove_group_ungroups_members() {
        let mut data = GroupData::from_record(record(&[("G", &["a", "b"])], &["c"]));
        assert!(data.remove_group("G"));
        assert!(!data.remove_group("G"));
        assert_eq!(data.as_serializable(), record(&[], &["c", "a", "b"]));
    }

    #[test]
    fn display_view_sorts_without_reordering_store() {
        let data = GroupData::from_record(record(&[("G", &["beta", "Alpha"])], &["zed", "Echo"]));
        let view = data.display_view();
        assert_eq!(
            view.groups,
            vec![("G".to_string(), vec!["Alpha".to_string(), "beta".to_string()])]
        );
        assert_eq!(view.ungrouped, vec!["Echo".to_string(), "zed".to_string()]);
        assert_eq!(data.group("G").unwrap(), ["beta".to_string(), "Alpha".to_string()]);
    }
}
