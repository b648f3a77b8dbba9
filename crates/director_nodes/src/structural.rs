//! Core structural nodes - the bridges between a nested graph and its parent
//!
//! A graph exposed as a single node from its parent's perspective gets its
//! boundary from these: Input Link and Output Link pass control flow across
//! the boundary, Value Link forwards data reads and writes, and Reference
//! forwards to a named value node anywhere in the script.

use std::sync::Arc;

use director_runtime::{Node, NodeBehavior, NodeRegistry, ValueSource};
use director_types::{NodeKind, NodeType, Property};

use crate::LIBRARY;

/// Entry bridge: the parent connects to "In", execution continues inside
/// the graph from "Out".
pub struct InputLinkBehavior;

impl NodeBehavior for InputLinkBehavior {
    fn build(&self, node: &mut Node) {
        node.add_input("In");
        node.add_output("Out");
    }
}

/// Exit bridge: the graph's interior connects to "In", execution continues
/// in the parent from "Out".
pub struct OutputLinkBehavior;

impl NodeBehavior for OutputLinkBehavior {
    fn build(&self, node: &mut Node) {
        node.add_input("In");
        node.add_output("Out");
    }
}

/// Value bridge: consumed as a value node inside the graph, it forwards
/// reads and writes through its own "Value" link to whatever the parent
/// connected. Unconnected, it answers with its own default property.
pub struct ValueLinkBehavior;

impl NodeBehavior for ValueLinkBehavior {
    fn build(&self, node: &mut Node) {
        node.add_property(Property::new("Value", ""));
        node.add_value_link(node.value_link_builder("Value").multiple().untyped());
    }

    fn value_source(&self) -> ValueSource {
        ValueSource::ThroughLink("Value")
    }
}

/// Forwards to the value node named by its "Reference" property, wherever
/// that node lives in the script.
pub struct ReferenceBehavior;

impl NodeBehavior for ReferenceBehavior {
    fn build(&self, node: &mut Node) {
        node.add_property(
            Property::new("Reference", "")
                .with_description("Display name of the value node to forward to."),
        );
    }

    fn value_source(&self) -> ValueSource {
        ValueSource::ByName("Reference")
    }
}

pub(crate) fn register(registry: &mut NodeRegistry) {
    registry.register(
        LIBRARY,
        NodeType::new("Input Link", "Core", NodeKind::Link)
            .with_description("Boundary input of a nested graph."),
        Arc::new(InputLinkBehavior),
    );
    registry.register(
        LIBRARY,
        NodeType::new("Output Link", "Core", NodeKind::Link)
            .with_description("Boundary output of a nested graph."),
        Arc::new(OutputLinkBehavior),
    );
    registry.register(
        LIBRARY,
        NodeType::new("Value Link", "Core", NodeKind::Value)
            .with_description("Boundary value of a nested graph."),
        Arc::new(ValueLinkBehavior),
    );
    registry.register(
        LIBRARY,
        NodeType::new("Reference", "Core", NodeKind::Value)
            .with_description("Forward to a named value node."),
        Arc::new(ReferenceBehavior),
    );
}
