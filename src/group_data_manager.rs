//! Per-document cache of grouping stores, persisted as a JSON string under a
//! reserved key of each bag.

use crate::{AttributeBag, BagId, DocumentHost, GroupData, Preferences, PropValue, statics};
use std::collections::{HashMap, hash_map::Entry};
use tracing::{debug, error, warn};

/// Owned by the open document; dropped or cleared when it closes.
#[derive(Debug, Default)]
pub struct GroupDataManager {
    prefs: Preferences,
    cache: HashMap<BagId, GroupData>,
}

impl GroupDataManager {
    pub fn new(prefs: Preferences) -> Self {
        Self {
            prefs,
            cache: HashMap::new(),
        }
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    /// The store of `bag`, loaded on first use and verified against the
    /// bag's current keys on every call.
    pub fn get(&mut self, bag: &dyn AttributeBag) -> &mut GroupData {
        let data = match self.cache.entry(bag.id()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                debug!(bag = bag.name(), id = %bag.id(), "Loading group data");
                entry.insert(load_group_data(bag, &self.prefs.group_data_key))
            }
        };
        data.verify_with(bag, &self.prefs);
        data
    }

    /// Cached store without reloading or verifying.
    pub fn cached(&self, id: BagId) -> Option<&GroupData> {
        self.cache.get(&id)
    }

    /// Dissolve `group` on `bag`; returns whether it existed.
    pub fn remove_property_group(&mut self, bag: &dyn AttributeBag, group: &str) -> bool {
        self.get(bag).remove_group(group)
    }

    /// Write every bag's store into its reserved key. A bag that refuses
    /// the write is logged and skipped. Returns the number of bags written.
    pub fn on_document_save(&mut self, host: &mut dyn DocumentHost) -> usize {
        let mut written = 0;
        for id in host.bag_ids() {
            let Some(bag) = host.bag_mut(id) else {
                continue;
            };
            let json = match self.get(&*bag).to_json() {
                Ok(json) => json,
                Err(err) => {
                    error!(bag = bag.name(), %err, "{}", statics::EN_ERR_GROUP_DATA_WRITE);
                    continue;
                }
            };
            match bag.set(&self.prefs.group_data_key, PropValue::String(json)) {
                Ok(()) => written += 1,
                Err(err) => warn!(bag = bag.name(), %err, "{}", statics::EN_ERR_GROUP_DATA_WRITE),
            }
        }
        debug!(written, "Saved group data");
        written
    }

    /// Rebuild the cache from every bag of a freshly loaded document.
    /// Returns the number of bags loaded.
    pub fn on_document_load(&mut self, host: &dyn DocumentHost) -> usize {
        self.cache.clear();
        let mut loaded = 0;
        for id in host.bag_ids() {
            if let Some(bag) = host.bag(id) {
                self.get(bag);
                loaded += 1;
            }
        }
        debug!(loaded, "Loaded group data");
        loaded
    }

    /// Forget every store; the document is closing.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// Missing or unreadable records load as an empty store.
fn load_group_data(bag: &dyn AttributeBag, key: &str) -> GroupData {
    match bag.get(key) {
        None => GroupData::new(),
        Some(PropValue::String(text)) => match GroupData::from_json(text) {
            Ok(data) => data,
            Err(err) => {
                error!(bag = bag.name(), %err, payload = %text, "{}", statics::EN_ERR_GROUP_DATA_PARSE);
                GroupData::new()
            }
        },
        Some(other) => {
            error!(
                bag = bag.name(),
                kind = %other.property_type(),
                "{}",
                statics::EN_ERR_GROUP_DATA_PARSE
            );
            GroupData::new()
        }
    }
}
