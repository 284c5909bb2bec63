//! Context - the per-resource state record
//!
//! A context is created by the caller the first time a stateful entity is
//! referenced, mutated in place, then handed to a `Store` under its name.
//!
//! - `properties`: scalar named attributes
//! - `list`: ordered log of structured entries, append-only
//! - `request_log`: ids of the requests that touched the context
//! - `update_count`: bumped by one per semantic mutation

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A named, versioned state record.
///
/// `Clone` is a full deep copy: every `list` entry and the request log are
/// copied, so mutating the copy never affects the original and vice versa.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    name: String,
    properties: HashMap<String, String>,
    list: Vec<HashMap<String, String>>,
    request_log: Vec<String>,
    update_count: u64,
}

impl Context {
    /// Create an empty context with update count 0
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidContextName);
        }
        Ok(Self {
            name,
            properties: HashMap::new(),
            list: Vec::new(),
            request_log: Vec::new(),
            update_count: 0,
        })
    }

    /// The context name, also its store key
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    /// Bump the update count by one and return the new value
    pub fn inc_update_count(&mut self) -> u64 {
        self.update_count += 1;
        self.update_count
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.properties
    }

    pub fn list(&self) -> &[HashMap<String, String>] {
        &self.list
    }

    /// Mutable access to the entry list. Callers append; they do not reorder.
    pub fn list_mut(&mut self) -> &mut Vec<HashMap<String, String>> {
        &mut self.list
    }

    pub fn request_log(&self) -> &[String] {
        &self.request_log
    }

    /// Append a request id to the audit trail
    pub fn record_request(&mut self, request_id: impl Into<String>) {
        self.request_log.push(request_id.into());
    }

    /// Check invariants that deserialized data cannot guarantee
    pub(crate) fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::InvalidContextName);
        }
        Ok(())
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Context{{contextName='{}', properties={:?}, list={:?}, updateCount={}}}",
            self.name, self.properties, self.list, self.update_count
        )
    }
}
