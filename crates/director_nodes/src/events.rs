//! Event nodes - entry points triggered from outside the graph

use std::sync::Arc;

use director_runtime::{Node, NodeBehavior, NodeRegistry};
use director_types::{NodeKind, NodeType, Property};

use crate::LIBRARY;

/// Remote Event - a named event, fired externally through
/// `Director::trigger_event` or from a `Call Remote Event` action.
///
/// Supports instigator filtering: with actor values connected to the
/// `Instigator` link, only matching instigators fire it.
pub struct RemoteEventBehavior;

impl NodeBehavior for RemoteEventBehavior {
    fn build(&self, node: &mut Node) {
        node.add_output("Out");
        node.add_property(
            Property::new("EventName", "")
                .with_description("Name other scripts and actions use to fire this event."),
        );
    }

    fn uses_instigator_filter(&self) -> bool {
        true
    }
}

pub(crate) fn register(registry: &mut NodeRegistry) {
    registry.register(
        LIBRARY,
        NodeType::new("Remote Event", "General", NodeKind::Event)
            .with_description("An event fired by name from outside the graph."),
        Arc::new(RemoteEventBehavior),
    );
}
