//! Core type descriptors: data type tags and node types

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Data Types
// ─────────────────────────────────────────────────────────────────────────────

/// The closed set of data type tags used for value-link type checking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum DataType {
    Boolean,
    Int,
    UnsignedInt,
    Float,
    Double,
    Text,
    Vec2,
    Vec3,
    Vec4,
    Actor,
    /// Accepts anything; used by links that carry no declared type
    Unknown,
}

impl DataType {
    /// Check if this type is compatible with another (for connection validation)
    pub fn is_compatible_with(&self, other: DataType) -> bool {
        match (*self, other) {
            // Exact match
            (a, b) if a == b => true,
            // Unknown accepts everything
            (DataType::Unknown, _) | (_, DataType::Unknown) => true,
            // The numeric family converts freely
            (a, b) if a.is_numeric() && b.is_numeric() => true,
            _ => false,
        }
    }

    /// Check if this is one of the interchangeable numeric types
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Int | DataType::UnsignedInt | DataType::Float | DataType::Double
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Node Types
// ─────────────────────────────────────────────────────────────────────────────

/// The behavioral variant of a node type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Entry point; triggered by the outside world, starts threads
    Event,
    /// Control-flow step; entered through an input link
    Action,
    /// Value producer/holder consumed through value links
    Value,
    /// Graph-structural bridge between a nested graph and its parent
    Link,
}

/// Descriptor of a node type, registered in the node registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeType {
    /// Type name (e.g. "Delay")
    pub name: String,
    /// Category for organization and lookup (e.g. "General", "Core")
    pub category: String,
    /// Behavioral variant
    pub kind: NodeKind,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NodeType {
    /// Create a new node type descriptor
    pub fn new(name: &str, category: &str, kind: NodeKind) -> Self {
        Self {
            name: name.to_string(),
            category: category.to_string(),
            kind,
            description: None,
        }
    }

    /// Attach a description
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// The full registry/file key, "Category.Name"
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.category, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_compatibility() {
        assert!(DataType::Boolean.is_compatible_with(DataType::Boolean));
        assert!(DataType::Int.is_compatible_with(DataType::Double));
        assert!(DataType::Float.is_compatible_with(DataType::UnsignedInt));
        assert!(DataType::Unknown.is_compatible_with(DataType::Actor));
        assert!(!DataType::Boolean.is_compatible_with(DataType::Text));
        assert!(!DataType::Vec3.is_compatible_with(DataType::Vec4));
        assert!(!DataType::Actor.is_compatible_with(DataType::Text));
    }

    #[test]
    fn test_full_name() {
        let ty = NodeType::new("Remote Event", "General", NodeKind::Event);
        assert_eq!(ty.full_name(), "General.Remote Event");
    }
}
