//! Value nodes - typed value holders consumed through value links

use std::sync::Arc;

use director_runtime::{Node, NodeBehavior, NodeRegistry};
use director_types::{NodeKind, NodeType, Property, PropertyValue};
use uuid::Uuid;

use crate::LIBRARY;

/// A plain value node: one "Value" property of a fixed type.
pub struct TypedValueBehavior {
    default: PropertyValue,
}

impl TypedValueBehavior {
    pub fn new(default: impl Into<PropertyValue>) -> Self {
        Self {
            default: default.into(),
        }
    }
}

impl NodeBehavior for TypedValueBehavior {
    fn build(&self, node: &mut Node) {
        node.add_property(Property::new("Value", self.default.clone()));
    }
}

pub(crate) fn register(registry: &mut NodeRegistry) {
    let types: [(&str, PropertyValue, &str); 7] = [
        ("Boolean", PropertyValue::Boolean(false), "A boolean value."),
        ("Int", PropertyValue::Int(0), "A signed integer value."),
        ("Float", PropertyValue::Float(0.0), "A 32-bit float value."),
        ("Double", PropertyValue::Double(0.0), "A 64-bit float value."),
        ("String", PropertyValue::Text(String::new()), "A text value."),
        ("Vector", PropertyValue::Vec3([0.0; 3]), "A 3-component vector value."),
        ("Actor", PropertyValue::Actor(Uuid::nil()), "A reference to an actor."),
    ];

    for (name, default, description) in types {
        registry.register(
            LIBRARY,
            NodeType::new(name, "General", NodeKind::Value).with_description(description),
            Arc::new(TypedValueBehavior::new(default)),
        );
    }
}
