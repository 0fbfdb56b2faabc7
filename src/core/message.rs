//! Purpose: Model one ingestion command and its fluent builder.
//! Exports: `Message`, `MessageBuilder`, `Action`, `Properties`.
//! Role: Pure data construction consumed by the JSON encoder; no I/O, no validation of payloads.
//! Invariants: Publish messages always carry a payload; unpublish messages never do.
//! Invariants: Properties keep insertion order and merging never drops existing keys.
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Action {
    Publish,
    Unpublish,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Publish => "publish",
            Action::Unpublish => "unpublish",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "publish" => Some(Action::Publish),
            "unpublish" => Some(Action::Unpublish),
            _ => None,
        }
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Ordered string map; always serialized as a JSON object, even when empty.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Properties {
    entries: Vec<(String, String)>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`, keeping the original position when the key already exists.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Properties {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.insert(name, value);
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut properties = Properties::new();
        properties.extend(iter);
        properties
    }
}

impl Serialize for Properties {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    key: String,
    action: Action,
    event_time: Option<i64>,
    properties: Properties,
    payload: Option<Value>,
}

impl Message {
    pub fn new_publish_message(key: impl Into<String>, payload: Value) -> MessageBuilder {
        MessageBuilder::new(key.into(), Action::Publish, Some(payload))
    }

    pub fn new_unpublish_message(key: impl Into<String>) -> MessageBuilder {
        MessageBuilder::new(key.into(), Action::Unpublish, None)
    }

    pub(crate) fn from_parts(
        key: String,
        action: Action,
        event_time: Option<i64>,
        properties: Properties,
        payload: Option<Value>,
    ) -> Self {
        Self {
            key,
            action,
            event_time,
            properties,
            payload,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn action(&self) -> Action {
        self.action
    }

    /// `None` lets the server assign the event time.
    pub fn event_time(&self) -> Option<i64> {
        self.event_time
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// The unwrapped payload as given by the caller.
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }
}

#[derive(Clone, Debug)]
pub struct MessageBuilder {
    key: String,
    action: Action,
    event_time: Option<i64>,
    properties: Properties,
    payload: Option<Value>,
}

impl MessageBuilder {
    fn new(key: String, action: Action, payload: Option<Value>) -> Self {
        Self {
            key,
            action,
            event_time: None,
            properties: Properties::new(),
            payload,
        }
    }

    pub fn with_event_time(mut self, event_time: i64) -> Self {
        self.event_time = Some(event_time);
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name, value);
        self
    }

    pub fn with_properties<I, K, V>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.properties.extend(properties);
        self
    }

    pub fn build(self) -> Message {
        Message {
            key: self.key,
            action: self.action,
            event_time: self.event_time,
            properties: self.properties,
            payload: self.payload,
        }
    }
}
