//! Extracted records and the data produced by analysis.

use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::request::Request;

/// One extracted record: an ordered mapping from field name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Item(Map<String, Value>);

impl Item {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Adds a field, builder style.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// An empty record carries nothing to process and is rejected by the pipeline.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
    }

    /// Consumes the item and returns its fields.
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl Deref for Item {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Item {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Map<String, Value>> for Item {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Anything an analyzer can discover in a response.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    /// A follow-up fetch, routed to the request cache after filtering.
    Request(Request),
    /// An extracted record, routed to the item queue.
    Item(Item),
}

impl From<Request> for Data {
    fn from(request: Request) -> Self {
        Data::Request(request)
    }
}

impl From<Item> for Data {
    fn from(item: Item) -> Self {
        Data::Item(item)
    }
}
