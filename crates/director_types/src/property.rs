//! Typed property storage
//!
//! Nodes, graphs, and the director itself expose their state as named typed
//! properties. The container keeps insertion order so serialization and
//! iteration stay deterministic.

use serde::{Deserialize, Serialize};

use crate::types::DataType;
use crate::value::PropertyValue;

// ─────────────────────────────────────────────────────────────────────────────
// Property
// ─────────────────────────────────────────────────────────────────────────────

/// A single named, typed property
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    /// Property name (unique within its container)
    pub name: String,
    /// Current value
    pub value: PropertyValue,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether this property is written by the binary writer.
    /// Transient runtime scratch sets this to false.
    #[serde(default = "default_save")]
    pub save: bool,
    /// Read-only properties reject formatted writes
    #[serde(default)]
    pub read_only: bool,
}

fn default_save() -> bool {
    true
}

impl Property {
    /// Create a savable, writable property
    pub fn new(name: &str, value: impl Into<PropertyValue>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
            description: None,
            save: true,
            read_only: false,
        }
    }

    /// Create a transient property that is never persisted
    pub fn transient(name: &str, value: impl Into<PropertyValue>) -> Self {
        Self {
            save: false,
            ..Self::new(name, value)
        }
    }

    /// Attach a description
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Mark the property read-only
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// The data type of the current value
    pub fn data_type(&self) -> DataType {
        self.value.data_type()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Property Container
// ─────────────────────────────────────────────────────────────────────────────

/// Insertion-ordered collection of properties with by-name lookup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyContainer {
    properties: Vec<Property>,
}

impl PropertyContainer {
    /// Create an empty container
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a property. A property with the same name is replaced in place,
    /// keeping its original position.
    pub fn add(&mut self, property: Property) {
        if let Some(existing) = self.get_mut(&property.name) {
            *existing = property;
        } else {
            self.properties.push(property);
        }
    }

    /// Get a property by name
    pub fn get(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Get a mutable property by name
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.properties.iter_mut().find(|p| p.name == name)
    }

    /// Get a property value by name
    pub fn value(&self, name: &str) -> Option<&PropertyValue> {
        self.get(name).map(|p| &p.value)
    }

    /// Set a property value by name. Returns false for unknown names.
    pub fn set_value(&mut self, name: &str, value: impl Into<PropertyValue>) -> bool {
        match self.get_mut(name) {
            Some(prop) => {
                prop.value = value.into();
                true
            }
            None => false,
        }
    }

    /// Parse a persisted text form into an existing property.
    ///
    /// The text is parsed against the property's current data type, the way
    /// a loaded script restores its state. Returns false when the property
    /// does not exist, is read-only, or the text does not parse.
    pub fn set_formatted(&mut self, name: &str, text: &str) -> bool {
        let Some(prop) = self.get_mut(name) else {
            return false;
        };
        if prop.read_only {
            return false;
        }
        match PropertyValue::parse(prop.value.data_type(), text) {
            Some(value) => {
                prop.value = value;
                true
            }
            None => false,
        }
    }

    /// Check if a property exists
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate all properties in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter()
    }

    /// Iterate the properties the writer should persist
    pub fn savable(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter().filter(|p| p.save && !p.read_only)
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Check if the container is empty
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}
