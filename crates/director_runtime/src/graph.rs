//! Director graphs - ordered, nestable node containers
//!
//! A graph owns its nodes (by arena id) and its child graphs. Node order is
//! insertion order and is significant: iteration, execution fan-out
//! tie-breaking, and the binary format all follow it. Nodes are segregated
//! by kind because the script format writes events, actions, and values as
//! separate counted sections.

use director_types::{NodeKind, Property, PropertyContainer};
use uuid::Uuid;

use crate::ids::{GraphId, NodeId};

/// A container of nodes, optionally nested inside a parent graph
pub struct DirectorGraph {
    /// Arena handle, set on insertion
    pub(crate) id: GraphId,
    /// Persistent identity, survives save/load
    pub(crate) uuid: Uuid,
    /// Parent graph; `None` for the root
    pub(crate) parent: Option<GraphId>,
    event_nodes: Vec<NodeId>,
    action_nodes: Vec<NodeId>,
    value_nodes: Vec<NodeId>,
    subgraphs: Vec<GraphId>,
    properties: PropertyContainer,
}

impl DirectorGraph {
    pub(crate) fn new(id: GraphId, parent: Option<GraphId>) -> Self {
        let mut properties = PropertyContainer::new();
        properties.add(Property::new("Name", "Macro"));
        properties.add(Property::new("Comment", ""));

        Self {
            id,
            uuid: Uuid::new_v4(),
            parent,
            event_nodes: Vec::new(),
            action_nodes: Vec::new(),
            value_nodes: Vec::new(),
            subgraphs: Vec::new(),
            properties,
        }
    }

    /// Arena handle of this graph
    pub fn id(&self) -> GraphId {
        self.id
    }

    /// Persistent identity
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Parent graph, `None` at the root
    pub fn parent(&self) -> Option<GraphId> {
        self.parent
    }

    /// Graph display name
    pub fn name(&self) -> &str {
        self.properties
            .value("Name")
            .and_then(|v| v.as_text())
            .unwrap_or("")
    }

    /// Set the graph display name
    pub fn set_name(&mut self, name: &str) {
        self.properties.set_value("Name", name);
    }

    /// The graph's property container
    pub fn properties(&self) -> &PropertyContainer {
        &self.properties
    }

    /// Mutable access to the graph's property container
    pub fn properties_mut(&mut self) -> &mut PropertyContainer {
        &mut self.properties
    }

    // ── Node membership ──────────────────────────────────────────────────────

    pub(crate) fn add_node(&mut self, node: NodeId, kind: NodeKind) {
        match kind {
            NodeKind::Event => self.event_nodes.push(node),
            NodeKind::Action | NodeKind::Link => self.action_nodes.push(node),
            NodeKind::Value => self.value_nodes.push(node),
        }
    }

    pub(crate) fn remove_node(&mut self, node: NodeId) {
        self.event_nodes.retain(|&n| n != node);
        self.action_nodes.retain(|&n| n != node);
        self.value_nodes.retain(|&n| n != node);
    }

    pub(crate) fn add_subgraph(&mut self, graph: GraphId) {
        self.subgraphs.push(graph);
    }

    pub(crate) fn remove_subgraph(&mut self, graph: GraphId) {
        self.subgraphs.retain(|&g| g != graph);
    }

    /// Event nodes, in insertion order
    pub fn event_nodes(&self) -> &[NodeId] {
        &self.event_nodes
    }

    /// Action nodes (including structural link nodes), in insertion order
    pub fn action_nodes(&self) -> &[NodeId] {
        &self.action_nodes
    }

    /// Value nodes, in insertion order
    pub fn value_nodes(&self) -> &[NodeId] {
        &self.value_nodes
    }

    /// Nested child graphs, in insertion order
    pub fn subgraphs(&self) -> &[GraphId] {
        &self.subgraphs
    }

    /// All nodes in this graph: events, then actions, then values
    pub fn all_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.event_nodes
            .iter()
            .chain(self.action_nodes.iter())
            .chain(self.value_nodes.iter())
            .copied()
    }

    /// Total node count
    pub fn node_count(&self) -> usize {
        self.event_nodes.len() + self.action_nodes.len() + self.value_nodes.len()
    }

    /// Check if the graph holds no nodes and no subgraphs
    pub fn is_empty(&self) -> bool {
        self.node_count() == 0 && self.subgraphs.is_empty()
    }

    pub(crate) fn clone_data(&self) -> DirectorGraph {
        DirectorGraph {
            id: self.id,
            uuid: self.uuid,
            parent: self.parent,
            event_nodes: self.event_nodes.clone(),
            action_nodes: self.action_nodes.clone(),
            value_nodes: self.value_nodes.clone(),
            subgraphs: self.subgraphs.clone(),
            properties: self.properties.clone(),
        }
    }
}

impl std::fmt::Debug for DirectorGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectorGraph")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("nodes", &self.node_count())
            .field("subgraphs", &self.subgraphs.len())
            .finish()
    }
}
