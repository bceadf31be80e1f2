//! Shared context: flat map of last-known facts for reporting.

use crate::document::Document;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SharedContext(pub BTreeMap<String, String>);

impl Document for SharedContext {
    const NAME: &'static str = "context";
}

impl SharedContext {
    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.insert(key.into(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}
