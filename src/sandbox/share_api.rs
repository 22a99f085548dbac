//! Read-only view of the request's [`ShareLinkInfo`] handed to scripts.

use std::sync::{Arc, Mutex, PoisonError};

use rhai::Dynamic;
use serde_json::{Map, Value};

use super::convert::{dynamic_to_json, json_to_dynamic};
use crate::model::ShareLinkInfo;

/// Script-side share link. Writes go to a separate additions map the host
/// merges into the real parameter bag after the call.
#[derive(Clone)]
pub(crate) struct ScriptShare {
    info: Arc<ShareLinkInfo>,
    additions: Arc<Mutex<Map<String, Value>>>,
}

impl ScriptShare {
    pub(crate) fn new(info: ShareLinkInfo) -> Self {
        Self {
            info: Arc::new(info),
            additions: Arc::new(Mutex::new(Map::new())),
        }
    }

    pub(crate) fn share_key(&self) -> String {
        self.info.share_key().to_string()
    }

    pub(crate) fn share_password(&self) -> Dynamic {
        self.info
            .share_password()
            .map_or(Dynamic::UNIT, |pwd| Dynamic::from(pwd.to_string()))
    }

    pub(crate) fn share_url(&self) -> String {
        self.info.share_url().to_string()
    }

    pub(crate) fn standard_url(&self) -> String {
        self.info.standard_url().to_string()
    }

    pub(crate) fn parser_type(&self) -> String {
        self.info.parser_type().to_string()
    }

    pub(crate) fn provider_name(&self) -> String {
        self.info.provider_name().to_string()
    }

    /// Parameter value, preferring values this script added; `()` when absent.
    pub(crate) fn param(&self, key: &str) -> Dynamic {
        let additions = self.additions.lock().unwrap_or_else(PoisonError::into_inner);
        additions
            .get(key)
            .or_else(|| self.info.param(key))
            .map_or(Dynamic::UNIT, json_to_dynamic)
    }

    pub(crate) fn has_param(&self, key: &str) -> bool {
        let additions = self.additions.lock().unwrap_or_else(PoisonError::into_inner);
        additions.contains_key(key) || self.info.param(key).is_some()
    }

    pub(crate) fn put_param(&self, key: &str, value: &Dynamic) {
        self.additions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), dynamic_to_json(value));
    }

    pub(crate) fn take_additions(&self) -> Map<String, Value> {
        std::mem::take(&mut *self.additions.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
