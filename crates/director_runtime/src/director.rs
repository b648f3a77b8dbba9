//! Director - script instance, node/graph arenas, and the thread scheduler
//!
//! The director owns every node and graph of one loaded script, addressed
//! by dense arena indices. Execution is single-threaded and cooperative:
//! "threads" are logical branch cursors advanced synchronously inside one
//! `update` tick. The only suspension point is a node returning
//! `UpdateOutcome::Suspended`, which parks its frame until the next tick.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use director_types::{NodeKind, Property, PropertyContainer, PropertyValue};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::executor::{UpdateContext, UpdateOutcome};
use crate::graph::DirectorGraph;
use crate::ids::{GraphId, NodeId, ThreadId};
use crate::link::LinkRef;
use crate::node::{INSTIGATOR, MAX_TRIGGER_COUNT, Node, ValueSource};
use crate::registry::NodeRegistry;

/// Bound on redirect-chain walks and value-node forwarding, so corrupted
/// data cannot loop resolution forever.
const MAX_RESOLVE_DEPTH: usize = 32;

/// Write into a node's own property, coercing into its declared type
fn write_node_property(node: &mut Node, name: &str, value: &PropertyValue) -> bool {
    let Some(target) = node.properties().value(name).map(|v| v.data_type()) else {
        return false;
    };
    let Some(coerced) = value.coerce_to(target) else {
        warn!(
            node = %node.display_name(),
            property = name,
            "write refused: no conversion to the property type"
        );
        return false;
    };
    let ok = node.properties_mut().set_value(name, coerced);
    if ok && name == "Enabled" {
        node.refresh_enabled();
    }
    ok
}

// ─────────────────────────────────────────────────────────────────────────────
// Supporting Types
// ─────────────────────────────────────────────────────────────────────────────

/// Whether a director instance executes or only serves as a template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceMode {
    /// A running script; triggers execute
    Live,
    /// A loaded template kept for instancing; all triggers are refused
    Template,
}

/// Failure to create a node
#[derive(Debug, Clone, Error)]
pub enum CreateNodeError {
    #[error("unknown node type {0:?}")]
    UnknownType(String),
    #[error("unknown graph {0}")]
    UnknownGraph(GraphId),
}

/// One execution frame: a node waiting to be updated through an input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Frame {
    node: NodeId,
    input: usize,
    first: bool,
}

/// One cooperative execution thread: a stack of frames walked depth-first
#[derive(Debug, Default)]
struct ThreadData {
    id: ThreadId,
    frames: Vec<Frame>,
    /// (node, input) pairs already activated in the current pass; breaks
    /// graph cycles. Per-thread; reset when the thread parks, so every
    /// tick is a fresh pass.
    visited: HashSet<(NodeId, usize)>,
}

/// Serializable capture of a director's runtime state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Formatted values of the plain value nodes
    pub values: Vec<ValueState>,
    /// Shapes of the in-flight threads
    pub threads: Vec<ThreadState>,
}

/// Captured value-node state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueState {
    pub node: Uuid,
    pub value: String,
}

/// Captured thread shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadState {
    pub frames: Vec<FrameState>,
}

/// Captured frame shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameState {
    pub node: Uuid,
    pub input: usize,
    pub first: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Director
// ─────────────────────────────────────────────────────────────────────────────

/// A loaded, runnable instance of a graph script
pub struct Director {
    registry: Arc<NodeRegistry>,
    mode: InstanceMode,
    script_type: String,
    properties: PropertyContainer,
    libraries: Vec<String>,

    nodes: Vec<Option<Node>>,
    free_nodes: Vec<u32>,
    node_uuids: HashMap<Uuid, NodeId>,
    graphs: Vec<Option<DirectorGraph>>,
    free_graphs: Vec<u32>,
    graph_uuids: HashMap<Uuid, GraphId>,
    root: GraphId,

    threads: Vec<ThreadData>,
    pending: Vec<ThreadData>,
    next_thread_id: u32,
    in_update: bool,
    started: bool,

    enabled: bool,
    node_logging: bool,
    pub(crate) loading: bool,
    sim_time: f64,
    pub(crate) created: Option<String>,
}

impl Director {
    /// Create an empty live director with a root graph. The node registry is
    /// an explicit dependency; the director never consults a global.
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        let mut properties = PropertyContainer::new();
        properties.add(Property::new("Name", "Untitled"));
        properties.add(Property::new("Description", ""));
        properties.add(Property::new("Author", ""));
        properties.add(Property::new("Comment", ""));
        properties.add(Property::new("Copyright", ""));

        let root = GraphId(0);
        let mut root_graph = DirectorGraph::new(root, None);
        root_graph.set_name("Root");
        let graph_uuids = HashMap::from([(root_graph.uuid(), root)]);

        Self {
            registry,
            mode: InstanceMode::Live,
            script_type: "Scenario".to_string(),
            properties,
            libraries: Vec::new(),
            nodes: Vec::new(),
            free_nodes: Vec::new(),
            node_uuids: HashMap::new(),
            graphs: vec![Some(root_graph)],
            free_graphs: Vec::new(),
            graph_uuids,
            root,
            threads: Vec::new(),
            pending: Vec::new(),
            next_thread_id: 0,
            in_update: false,
            started: false,
            enabled: true,
            node_logging: false,
            loading: false,
            sim_time: 0.0,
            created: None,
        }
    }

    /// Create a director for a specific script type tag
    pub fn with_script_type(registry: Arc<NodeRegistry>, script_type: &str) -> Self {
        let mut director = Self::new(registry);
        director.script_type = script_type.to_string();
        director
    }

    /// The node registry this director resolves types through
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Template or live instance
    pub fn mode(&self) -> InstanceMode {
        self.mode
    }

    /// Set the instance mode
    pub fn set_mode(&mut self, mode: InstanceMode) {
        self.mode = mode;
    }

    /// The script type tag checked by the binary loader
    pub fn script_type(&self) -> &str {
        &self.script_type
    }

    /// Director-wide enabled switch; disabled directors run no nodes
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Set the director-wide enabled switch
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether per-node execution logging is on
    pub fn node_logging(&self) -> bool {
        self.node_logging
    }

    /// Toggle per-node execution logging
    pub fn set_node_logging(&mut self, enabled: bool) {
        self.node_logging = enabled;
    }

    /// Accumulated simulation time over all ticks
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    /// Whether the first tick has run
    pub fn started(&self) -> bool {
        self.started
    }

    /// Script metadata properties (Name, Description, Author, ...)
    pub fn properties(&self) -> &PropertyContainer {
        &self.properties
    }

    /// Mutable script metadata properties
    pub fn properties_mut(&mut self) -> &mut PropertyContainer {
        &mut self.properties
    }

    /// Script display name
    pub fn name(&self) -> &str {
        self.properties
            .value("Name")
            .and_then(|v| v.as_text())
            .unwrap_or("")
    }

    /// Set the script display name
    pub fn set_name(&mut self, name: &str) {
        self.properties.set_value("Name", name);
    }

    // ── Libraries ────────────────────────────────────────────────────────────

    /// Record a node-library dependency. Returns false when the registry has
    /// no such library; the caller decides whether that is fatal.
    pub fn add_library(&mut self, name: &str) -> bool {
        if !self.registry.has_library(name) {
            return false;
        }
        if !self.libraries.iter().any(|l| l == name) {
            self.libraries.push(name.to_string());
        }
        true
    }

    /// Check a recorded library dependency
    pub fn has_library(&self, name: &str) -> bool {
        self.libraries.iter().any(|l| l == name)
    }

    /// The recorded library dependencies, in insertion order
    pub fn libraries(&self) -> &[String] {
        &self.libraries
    }

    // ── Graph management ─────────────────────────────────────────────────────

    /// The root graph
    pub fn root_graph(&self) -> GraphId {
        self.root
    }

    /// Get a graph by id
    pub fn graph(&self, id: GraphId) -> Option<&DirectorGraph> {
        self.graphs.get(id.0 as usize).and_then(|g| g.as_ref())
    }

    /// Get a mutable graph by id
    pub fn graph_mut(&mut self, id: GraphId) -> Option<&mut DirectorGraph> {
        self.graphs.get_mut(id.0 as usize).and_then(|g| g.as_mut())
    }

    /// Create a nested graph under a parent
    pub fn create_graph(&mut self, parent: GraphId) -> Option<GraphId> {
        self.graph(parent)?;
        let index = match self.free_graphs.pop() {
            Some(i) => i,
            None => {
                self.graphs.push(None);
                (self.graphs.len() - 1) as u32
            }
        };
        let id = GraphId(index);
        let graph = DirectorGraph::new(id, Some(parent));
        self.graph_uuids.insert(graph.uuid(), id);
        self.graphs[index as usize] = Some(graph);
        if let Some(p) = self.graph_mut(parent) {
            p.add_subgraph(id);
        }
        Some(id)
    }

    /// Remove a graph subtree and every node in it. The root graph cannot
    /// be removed.
    pub fn remove_graph(&mut self, id: GraphId) -> bool {
        if id == self.root {
            return false;
        }
        let Some(graph) = self.graph(id) else {
            return false;
        };
        let parent = graph.parent();
        let subgraphs: Vec<_> = graph.subgraphs().to_vec();
        let nodes: Vec<_> = graph.all_nodes().collect();

        for sub in subgraphs {
            self.remove_graph(sub);
        }
        for node in nodes {
            self.remove_node(node);
        }
        if let Some(p) = parent.and_then(|p| self.graph_mut(p)) {
            p.remove_subgraph(id);
        }
        if let Some(graph) = self.graphs[id.0 as usize].take() {
            self.graph_uuids.remove(&graph.uuid());
        }
        self.free_graphs.push(id.0);
        true
    }

    /// Find a graph by its persistent uuid
    pub fn find_graph_by_uuid(&self, uuid: Uuid) -> Option<GraphId> {
        self.graph_uuids.get(&uuid).copied()
    }

    pub(crate) fn set_graph_uuid(&mut self, id: GraphId, uuid: Uuid) {
        if let Some(graph) = self.graphs.get_mut(id.0 as usize).and_then(|g| g.as_mut()) {
            self.graph_uuids.remove(&graph.uuid);
            graph.uuid = uuid;
            self.graph_uuids.insert(uuid, id);
        }
    }

    // ── Node management ──────────────────────────────────────────────────────

    /// Create a node of a registered type inside a graph
    pub fn create_node(
        &mut self,
        category: &str,
        name: &str,
        graph: GraphId,
    ) -> Result<NodeId, CreateNodeError> {
        let Some((node_type, behavior)) = self.registry.get(category, name) else {
            return Err(CreateNodeError::UnknownType(format!("{category}.{name}")));
        };
        if self.graph(graph).is_none() {
            return Err(CreateNodeError::UnknownGraph(graph));
        }

        let index = match self.free_nodes.pop() {
            Some(i) => i,
            None => {
                self.nodes.push(None);
                (self.nodes.len() - 1) as u32
            }
        };
        let id = NodeId(index);
        let kind = node_type.kind;
        let node = Node::new(id, node_type, behavior, graph);
        self.node_uuids.insert(node.uuid(), id);
        self.nodes[index as usize] = Some(node);
        if let Some(g) = self.graph_mut(graph) {
            g.add_node(id, kind);
        }
        Ok(id)
    }

    /// Remove a node, disconnecting everything that references it
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        let graph = node.graph();

        // Sever chain connections from both sides.
        let inputs: Vec<(String, Vec<LinkRef>)> = node
            .inputs()
            .iter()
            .map(|l| (l.name.clone(), l.links.clone()))
            .collect();
        let outputs: Vec<(String, Vec<LinkRef>)> = node
            .outputs()
            .iter()
            .map(|l| (l.name.clone(), l.links.clone()))
            .collect();
        for (input_name, upstream) in inputs {
            for from in upstream {
                if let Some(out) = self
                    .node_mut(from.node)
                    .and_then(|n| n.output_link_mut(&from.link))
                {
                    out.links.retain(|r| !(r.node == id && r.link == input_name));
                }
            }
        }
        for (output_name, downstream) in outputs {
            for to in downstream {
                if let Some(inp) = self
                    .node_mut(to.node)
                    .and_then(|n| n.input_link_mut(&to.link))
                {
                    inp.links.retain(|r| !(r.node == id && r.link == output_name));
                }
            }
        }

        // Drop any value-link references to this node.
        for slot in self.nodes.iter_mut().flatten() {
            for link in slot.values_mut() {
                link.links.retain(|&n| n != id);
            }
        }

        if let Some(g) = self.graph_mut(graph) {
            g.remove_node(id);
        }
        if let Some(node) = self.nodes[id.0 as usize].take() {
            self.node_uuids.remove(&node.uuid());
        }
        self.free_nodes.push(id.0);
        true
    }

    /// Get a node by id
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize).and_then(|n| n.as_ref())
    }

    /// Get a mutable node by id
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0 as usize).and_then(|n| n.as_mut())
    }

    /// Find a node by its persistent uuid
    pub fn find_node_by_uuid(&self, uuid: Uuid) -> Option<NodeId> {
        self.node_uuids.get(&uuid).copied()
    }

    pub(crate) fn set_node_uuid(&mut self, id: NodeId, uuid: Uuid) {
        if let Some(node) = self.nodes.get_mut(id.0 as usize).and_then(|n| n.as_mut()) {
            self.node_uuids.remove(&node.uuid);
            node.uuid = uuid;
            self.node_uuids.insert(uuid, id);
        }
    }

    /// Every node in the director, pre-order over graphs, per-graph
    /// insertion order
    pub fn all_nodes(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_nodes(self.root, &mut out);
        out
    }

    fn collect_nodes(&self, graph: GraphId, out: &mut Vec<NodeId>) {
        let Some(g) = self.graph(graph) else { return };
        out.extend(g.all_nodes());
        for &sub in g.subgraphs() {
            self.collect_nodes(sub, out);
        }
    }

    /// All nodes of a registered type, in graph order
    pub fn nodes_of_type(&self, category: &str, name: &str) -> Vec<NodeId> {
        self.all_nodes()
            .into_iter()
            .filter(|&id| {
                self.node(id).is_some_and(|n| {
                    n.node_type().category == category && n.node_type().name == name
                })
            })
            .collect()
    }

    /// Find the first value node with the given display name, in graph order
    pub fn find_value_node(&self, name: &str) -> Option<NodeId> {
        self.all_nodes().into_iter().find(|&id| {
            self.node(id)
                .is_some_and(|n| n.kind() == NodeKind::Value && n.display_name() == name)
        })
    }

    // ── Graph boundary lookups ───────────────────────────────────────────────

    /// Find the `Core.Input Link` node that represents a graph's boundary
    /// input of the given name
    pub fn boundary_input(&self, graph: GraphId, name: &str) -> Option<NodeId> {
        self.boundary_node(graph, name, "Input Link")
    }

    /// Find the `Core.Output Link` node that represents a graph's boundary
    /// output of the given name
    pub fn boundary_output(&self, graph: GraphId, name: &str) -> Option<NodeId> {
        self.boundary_node(graph, name, "Output Link")
    }

    /// Find the `Core.Value Link` node that represents a graph's boundary
    /// value of the given name
    pub fn boundary_value(&self, graph: GraphId, name: &str) -> Option<NodeId> {
        self.boundary_node(graph, name, "Value Link")
    }

    fn boundary_node(&self, graph: GraphId, name: &str, type_name: &str) -> Option<NodeId> {
        let g = self.graph(graph)?;
        g.all_nodes().find(|&id| {
            self.node(id).is_some_and(|n| {
                n.node_type().category == "Core"
                    && n.node_type().name == type_name
                    && n.display_name() == name
            })
        })
    }

    // ── Chain connections ────────────────────────────────────────────────────

    /// Connect an output link to an input link. Returns false when either
    /// end is missing or the pair is already connected.
    pub fn connect_chain(
        &mut self,
        from: NodeId,
        output_name: &str,
        to: NodeId,
        input_name: &str,
    ) -> bool {
        let valid = self.node(from).is_some_and(|n| n.output_link(output_name).is_some())
            && self.node(to).is_some_and(|n| n.input_link(input_name).is_some());
        if !valid {
            return false;
        }
        let already = self
            .node(from)
            .and_then(|n| n.output_link(output_name))
            .is_some_and(|l| l.links.iter().any(|r| r.node == to && r.link == input_name));
        if already {
            return false;
        }

        if let Some(out) = self.node_mut(from).and_then(|n| n.output_link_mut(output_name)) {
            out.links.push(LinkRef::new(to, input_name));
        }
        if let Some(inp) = self.node_mut(to).and_then(|n| n.input_link_mut(input_name)) {
            inp.links.push(LinkRef::new(from, output_name));
        }
        true
    }

    /// Remove a chain connection. Returns false when it was not connected.
    pub fn disconnect_chain(
        &mut self,
        from: NodeId,
        output_name: &str,
        to: NodeId,
        input_name: &str,
    ) -> bool {
        let mut removed = false;
        if let Some(out) = self.node_mut(from).and_then(|n| n.output_link_mut(output_name)) {
            let before = out.links.len();
            out.links.retain(|r| !(r.node == to && r.link == input_name));
            removed = out.links.len() != before;
        }
        if let Some(inp) = self.node_mut(to).and_then(|n| n.input_link_mut(input_name)) {
            inp.links.retain(|r| !(r.node == from && r.link == output_name));
        }
        removed
    }

    // ── Value connections ────────────────────────────────────────────────────

    /// Connect a value link to a value node.
    ///
    /// Rejected (returns false, no state change) when the link type-checks
    /// and the node's declared value type is incompatible, when the link
    /// disallows multiples and already has a connection, or when the pair
    /// is already connected.
    pub fn connect_value(&mut self, node: NodeId, link_name: &str, value_node: NodeId) -> bool {
        let Some((tn, tl)) = self.terminal_value_link(node, link_name) else {
            return false;
        };
        let Some(value) = self.node(value_node) else {
            return false;
        };
        if value.kind() != NodeKind::Value {
            return false;
        }
        let value_type = value.declared_value_type();

        let Some(link) = self.node(tn).and_then(|n| n.value_link(&tl)) else {
            return false;
        };
        if link.links.contains(&value_node) {
            return false;
        }
        if !link.allow_multiple && !link.links.is_empty() {
            return false;
        }
        // Loading scripts bypasses the type check: connections are restored
        // before every contributing value has settled.
        if link.type_check && !self.loading {
            let link_type = self
                .node(tn)
                .and_then(|n| n.properties().value(&tl))
                .map(|v| v.data_type())
                .unwrap_or(director_types::DataType::Unknown);
            if !link_type.is_compatible_with(value_type) {
                debug!(
                    node = %node,
                    link = link_name,
                    value_node = %value_node,
                    "value connection refused: incompatible types"
                );
                return false;
            }
        }

        if let Some(link) = self.node_mut(tn).and_then(|n| n.value_link_mut(&tl)) {
            link.links.push(value_node);
            true
        } else {
            false
        }
    }

    /// Disconnect one value node (`Some`) or all of them (`None`).
    /// Disconnecting something that is not connected is a no-op returning
    /// false.
    pub fn disconnect_value(
        &mut self,
        node: NodeId,
        link_name: &str,
        value_node: Option<NodeId>,
    ) -> bool {
        let Some((tn, tl)) = self.terminal_value_link(node, link_name) else {
            return false;
        };
        let Some(link) = self.node_mut(tn).and_then(|n| n.value_link_mut(&tl)) else {
            return false;
        };
        match value_node {
            Some(v) => {
                let before = link.links.len();
                link.links.retain(|&n| n != v);
                link.links.len() != before
            }
            None => {
                if link.links.is_empty() {
                    false
                } else {
                    link.links.clear();
                    true
                }
            }
        }
    }

    /// Redirect a value link to another value link (graph nesting), or clear
    /// the redirect with `None`.
    ///
    /// A redirect that would close a cycle is refused at this point, so
    /// resolution never has to detect one.
    pub fn redirect_value_link(
        &mut self,
        node: NodeId,
        link_name: &str,
        target: Option<LinkRef>,
    ) -> bool {
        if self.node(node).and_then(|n| n.value_link(link_name)).is_none() {
            return false;
        }
        let Some(target) = target else {
            if let Some(link) = self.node_mut(node).and_then(|n| n.value_link_mut(link_name)) {
                link.redirect = None;
            }
            return true;
        };
        if self
            .node(target.node)
            .and_then(|n| n.value_link(&target.link))
            .is_none()
        {
            return false;
        }
        // Walk from the target; reaching the source again would close a loop.
        let mut cursor = Some(target.clone());
        let mut depth = 0;
        while let Some(r) = cursor {
            if r.node == node && r.link == link_name {
                warn!(node = %node, link = link_name, "value link redirect refused: cycle");
                return false;
            }
            depth += 1;
            if depth > MAX_RESOLVE_DEPTH {
                return false;
            }
            cursor = self
                .node(r.node)
                .and_then(|n| n.value_link(&r.link))
                .and_then(|l| l.redirect.clone());
        }
        if let Some(link) = self.node_mut(node).and_then(|n| n.value_link_mut(link_name)) {
            link.redirect = Some(target);
        }
        true
    }

    /// Follow a value link's redirect chain to its terminal link
    pub(crate) fn terminal_value_link(
        &self,
        node: NodeId,
        link_name: &str,
    ) -> Option<(NodeId, String)> {
        let mut cursor = (node, link_name.to_string());
        for _ in 0..MAX_RESOLVE_DEPTH {
            let link = self.node(cursor.0)?.value_link(&cursor.1)?;
            match &link.redirect {
                Some(r) => cursor = (r.node, r.link.clone()),
                None => return Some(cursor),
            }
        }
        warn!(node = %node, link = link_name, "value link redirect chain too deep");
        None
    }

    // ── Value resolution ─────────────────────────────────────────────────────

    /// Number of logical values behind a node property: 1 for an unconnected
    /// link (the default property) or plain property, N for N connected
    /// value nodes, 0 for an unknown name.
    pub fn property_count(&self, node: NodeId, name: &str) -> usize {
        let Some(n) = self.node(node) else { return 0 };
        if n.value_link(name).is_none() {
            return usize::from(n.properties().contains(name));
        }
        match self.terminal_value_link(node, name) {
            Some((tn, tl)) => self
                .node(tn)
                .and_then(|n| n.value_link(&tl))
                .map(|l| l.property_count())
                .unwrap_or(0),
            None => 0,
        }
    }

    /// Read the index-th value behind a node property, resolving value links
    /// and redirects. Index 0 of an unconnected link is the default property.
    pub fn property(&self, node: NodeId, name: &str, index: usize) -> Option<PropertyValue> {
        let n = self.node(node)?;
        if n.value_link(name).is_none() {
            return if index == 0 {
                n.properties().value(name).cloned()
            } else {
                None
            };
        }
        let (tn, tl) = self.terminal_value_link(node, name)?;
        let link = self.node(tn)?.value_link(&tl)?;
        if link.links.is_empty() {
            return if index == 0 {
                self.node(tn)?.properties().value(&tl).cloned()
            } else {
                None
            };
        }
        let value_node = *link.links.get(index)?;
        let (source, prop) = self.resolve_value_node(value_node)?;
        self.node(source)?.properties().value(&prop).cloned()
    }

    /// Write through a node property. `index` of `None` writes every linked
    /// value; `Some(i)` writes one. Returns true when at least one value was
    /// written.
    ///
    /// The written value is coerced into each target property's declared
    /// type; a value with no conversion leaves the target untouched.
    pub fn set_property(
        &mut self,
        node: NodeId,
        name: &str,
        index: Option<usize>,
        value: PropertyValue,
    ) -> bool {
        let Some(n) = self.node(node) else { return false };
        if n.value_link(name).is_none() {
            let Some(n) = self.node_mut(node) else { return false };
            return write_node_property(n, name, &value);
        }
        let Some((tn, tl)) = self.terminal_value_link(node, name) else {
            return false;
        };
        let connected: Vec<NodeId> = self
            .node(tn)
            .and_then(|n| n.value_link(&tl))
            .map(|l| l.links.clone())
            .unwrap_or_default();

        if connected.is_empty() {
            let Some(n) = self.node_mut(tn) else { return false };
            return write_node_property(n, &tl, &value);
        }

        let targets: Vec<NodeId> = match index {
            Some(i) => connected.get(i).copied().into_iter().collect(),
            None => connected,
        };
        let mut wrote = false;
        for target in targets {
            wrote |= self.write_value_node(target, &value);
        }
        wrote
    }

    /// Write a value node's resolved property, with change logging
    fn write_value_node(&mut self, value_node: NodeId, value: &PropertyValue) -> bool {
        let Some((source, prop)) = self.resolve_value_node(value_node) else {
            return false;
        };
        let log = self.node_logging
            && self.node(source).is_some_and(|n| n.node_logging());
        let old = log
            .then(|| self.node(source))
            .flatten()
            .and_then(|n| n.properties().value(&prop).map(PropertyValue::format));
        let Some(n) = self.node_mut(source) else { return false };
        let ok = write_node_property(n, &prop, value);
        if ok && log {
            let old = old.unwrap_or_default();
            info!(
                node = %n.display_name(),
                from = %old,
                to = %value.format(),
                "value changed"
            );
        }
        ok
    }

    /// Resolve a value node to the (node, property) pair that actually holds
    /// its value, following bridge and reference forwarding.
    pub(crate) fn resolve_value_node(&self, value_node: NodeId) -> Option<(NodeId, String)> {
        let mut current = value_node;
        let mut seen = HashSet::new();
        for _ in 0..MAX_RESOLVE_DEPTH {
            if !seen.insert(current) {
                warn!(node = %value_node, "value node forwarding cycle");
                return None;
            }
            let n = self.node(current)?;
            match n.behavior().value_source() {
                ValueSource::OwnProperty => return Some((current, "Value".to_string())),
                ValueSource::ThroughLink(link_name) => {
                    let (tn, tl) = self.terminal_value_link(current, link_name)?;
                    let link = self.node(tn)?.value_link(&tl)?;
                    match link.links.first() {
                        Some(&next) => current = next,
                        // Unconnected bridge: fall back to the terminal
                        // link's default property.
                        None => return Some((tn, tl)),
                    }
                }
                ValueSource::ByName(prop_name) => {
                    let target = n.properties().value(prop_name)?.as_text()?.to_string();
                    match self.find_value_node(&target) {
                        Some(found) => current = found,
                        None => {
                            debug!(node = %current, target = %target, "referenced value node not found");
                            return None;
                        }
                    }
                }
            }
        }
        warn!(node = %value_node, "value node forwarding chain too deep");
        None
    }

    /// Whether a node will run: its own flag (or a value node linked onto
    /// it) and the director-wide switch.
    pub fn is_node_enabled(&self, node: NodeId) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(n) = self.node(node) else { return false };
        let linked = n
            .value_link("Enabled")
            .is_some_and(|l| !l.links.is_empty() || l.redirect.is_some());
        if linked {
            self.property(node, "Enabled", 0)
                .and_then(|v| v.as_bool())
                .unwrap_or(true)
        } else {
            n.enabled()
        }
    }

    // ── Chain redirect resolution ────────────────────────────────────────────

    fn terminal_output_link(&self, node: NodeId, name: &str) -> Option<(NodeId, String)> {
        let mut cursor = (node, name.to_string());
        for _ in 0..MAX_RESOLVE_DEPTH {
            let link = self.node(cursor.0)?.output_link(&cursor.1)?;
            match &link.redirect {
                Some(r) => cursor = (r.node, r.link.clone()),
                None => return Some(cursor),
            }
        }
        None
    }

    fn terminal_input_link(&self, node: NodeId, name: &str) -> Option<(NodeId, String)> {
        let mut cursor = (node, name.to_string());
        for _ in 0..MAX_RESOLVE_DEPTH {
            if !self.is_node_enabled(cursor.0) {
                return None;
            }
            let link = self.node(cursor.0)?.input_link(&cursor.1)?;
            match &link.redirect {
                Some(r) => cursor = (r.node, r.link.clone()),
                None => return Some(cursor),
            }
        }
        None
    }

    // ── Event triggering ─────────────────────────────────────────────────────

    /// Trigger an event node's named output, starting a new execution thread
    /// rooted at that link.
    ///
    /// Returns `None` without side effects when the node is disabled, the
    /// director is a template, the trigger-count ceiling is reached, the
    /// instigator fails the filter, or the output does not exist. The
    /// per-node counter only advances when `count_trigger` is true.
    ///
    /// Called outside a tick, the new thread (and everything it spawns) is
    /// drained synchronously before this returns, unless a node suspends.
    pub fn trigger_event(
        &mut self,
        node: NodeId,
        output_name: &str,
        instigator: Option<Uuid>,
        count_trigger: bool,
    ) -> Option<ThreadId> {
        let Some(n) = self.node(node) else {
            warn!(node = %node, "trigger on unknown node");
            return None;
        };
        if n.kind() != NodeKind::Event {
            warn!(node = %node, node_type = %n.node_type().full_name(), "trigger on non-event node");
            return None;
        }
        // Templates never execute live behavior.
        if self.mode == InstanceMode::Template {
            return None;
        }
        if !self.is_node_enabled(node) {
            debug!(node = %node, "trigger on disabled node");
            return None;
        }
        if self.node(node)?.output_link(output_name).is_none() {
            warn!(node = %node, output = output_name, "trigger on unknown output");
            return None;
        }

        let max = self
            .node(node)?
            .properties()
            .value(MAX_TRIGGER_COUNT)
            .and_then(|v| v.as_uint())
            .unwrap_or(0);
        if max > 0 && self.node(node)?.trigger_count >= max {
            debug!(node = %node, max, "trigger count ceiling reached");
            return None;
        }
        if !self.test_instigator(node, instigator) {
            debug!(node = %node, ?instigator, "instigator rejected by filter");
            return None;
        }

        if count_trigger {
            if let Some(n) = self.node_mut(node) {
                n.trigger_count += 1;
            }
        }

        let id = ThreadId(self.next_thread_id);
        self.next_thread_id += 1;
        // The root fan-out and the drain below are one pass; the visited
        // seed carries into the thread.
        let mut visited = HashSet::new();
        let frames = self.fan_out(node, output_name, &mut visited);
        let thread = ThreadData {
            id,
            frames: frames.into_iter().rev().collect(),
            visited,
        };

        debug!(node = %node, output = output_name, thread = %id, "event triggered");

        if self.in_update {
            self.pending.push(thread);
        } else {
            self.run_immediate(thread);
        }
        Some(id)
    }

    /// Instigator filter: with no connected filter values any instigator is
    /// accepted; otherwise the instigator must match one of them.
    fn test_instigator(&self, node: NodeId, instigator: Option<Uuid>) -> bool {
        let Some(n) = self.node(node) else { return false };
        if !n.behavior().uses_instigator_filter() {
            return true;
        }
        let Some((tn, tl)) = self.terminal_value_link(node, INSTIGATOR) else {
            return true;
        };
        let connected: Vec<NodeId> = self
            .node(tn)
            .and_then(|n| n.value_link(&tl))
            .map(|l| l.links.clone())
            .unwrap_or_default();
        if connected.is_empty() {
            return true;
        }
        let Some(instigator) = instigator else {
            return false;
        };
        connected.iter().any(|&v| {
            self.resolve_value_node(v)
                .and_then(|(src, prop)| self.node(src)?.properties().value(&prop).cloned())
                .and_then(|v| v.as_actor())
                == Some(instigator)
        })
    }

    // ── Scheduler ────────────────────────────────────────────────────────────

    /// Advance the simulation by one tick, running every active thread in
    /// spawn order. Each thread drains depth-first until it finishes or a
    /// node suspends; threads spawned along the way are appended and run
    /// within the same tick.
    pub fn update(&mut self, sim_delta: f32, real_delta: f32) {
        if !self.started {
            self.on_start();
        }
        self.sim_time += f64::from(sim_delta);

        self.in_update = true;
        let mut index = 0;
        while index < self.threads.len() {
            let mut thread = std::mem::take(&mut self.threads[index]);
            self.step_thread(&mut thread, sim_delta, real_delta);
            if thread.frames.is_empty() {
                self.threads.remove(index);
            } else {
                self.threads[index] = thread;
                index += 1;
            }
            while let Some(pending) = self.take_pending() {
                self.threads.push(pending);
            }
        }
        self.in_update = false;
    }

    fn take_pending(&mut self) -> Option<ThreadData> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending.remove(0))
        }
    }

    /// Notify every node once before the first tick
    fn on_start(&mut self) {
        self.started = true;
        for id in self.all_nodes() {
            let Some(behavior) = self.node(id).map(|n| n.behavior()) else {
                continue;
            };
            behavior.on_start(&mut UpdateContext::new(self, id, 0, true, 0.0, 0.0, None));
        }
    }

    /// Drain a freshly spawned thread synchronously, along with any threads
    /// it spawns in turn.
    fn run_immediate(&mut self, thread: ThreadData) {
        self.in_update = true;
        let mut current = thread;
        loop {
            self.step_thread(&mut current, 0.0, 0.0);
            if !current.frames.is_empty() {
                self.threads.push(current);
            }
            match self.take_pending() {
                Some(next) => current = next,
                None => break,
            }
        }
        self.in_update = false;
    }

    /// Run one thread until it drains or suspends.
    ///
    /// Everything from the spawning fan-out to the suspension (or drain) is
    /// one pass; the visited guard covers exactly that window and resets
    /// when the thread parks, so the next tick starts a fresh pass.
    fn step_thread(&mut self, thread: &mut ThreadData, sim_delta: f32, real_delta: f32) {
        loop {
            let Some(&frame) = thread.frames.last() else { break };
            let Some(n) = self.node(frame.node) else {
                // Node removed while a frame was in flight.
                thread.frames.pop();
                continue;
            };
            if !self.is_node_enabled(frame.node) {
                thread.frames.pop();
                continue;
            }
            let behavior = n.behavior();
            let log = self.node_logging && n.node_logging();
            let type_name = n.node_type().full_name();

            if let Some(top) = thread.frames.last_mut() {
                top.first = false;
            }
            trace!(
                node = %frame.node,
                node_type = %type_name,
                input = frame.input,
                first = frame.first,
                thread = %thread.id,
                "updating node"
            );
            let outcome = behavior.update(&mut UpdateContext::new(
                self,
                frame.node,
                frame.input,
                frame.first,
                sim_delta,
                real_delta,
                Some(thread.id),
            ));

            match outcome {
                UpdateOutcome::Suspended => {
                    if log {
                        info!(node_type = %type_name, thread = %thread.id, "node waiting");
                    }
                    thread.visited.clear();
                    return;
                }
                UpdateOutcome::Finished { activated } => {
                    thread.frames.pop();
                    if log {
                        info!(
                            node_type = %type_name,
                            outputs = ?activated,
                            thread = %thread.id,
                            "node executed"
                        );
                    }
                    let mut visited = std::mem::take(&mut thread.visited);
                    let mut new_frames = Vec::new();
                    for output in &activated {
                        new_frames.extend(self.fan_out(frame.node, output, &mut visited));
                    }
                    thread.visited = visited;
                    // Reverse before pushing so the first connection of the
                    // first activated output runs first, depth-first.
                    for f in new_frames.into_iter().rev() {
                        thread.frames.push(f);
                    }
                }
            }
        }
    }

    /// Expand an activated output into one frame per connected, enabled
    /// input, honoring redirects and the per-pass visited guard.
    fn fan_out(
        &self,
        node: NodeId,
        output_name: &str,
        visited: &mut HashSet<(NodeId, usize)>,
    ) -> Vec<Frame> {
        let Some((on, ol)) = self.terminal_output_link(node, output_name) else {
            warn!(node = %node, output = output_name, "activated unknown output");
            return Vec::new();
        };
        let Some(link) = self.node(on).and_then(|n| n.output_link(&ol)) else {
            return Vec::new();
        };
        let mut frames = Vec::new();
        for target in &link.links {
            if !self.is_node_enabled(target.node) {
                continue;
            }
            let Some((tn, tl)) = self.terminal_input_link(target.node, &target.link) else {
                continue;
            };
            let Some(input) = self.node(tn).and_then(|n| n.input_index(&tl)) else {
                continue;
            };
            if visited.insert((tn, input)) {
                frames.push(Frame {
                    node: tn,
                    input,
                    first: true,
                });
            } else {
                trace!(node = %tn, input, "re-entry suppressed in pass");
            }
        }
        frames
    }

    // ── Thread queries ───────────────────────────────────────────────────────

    /// Check if a specific thread is still alive
    pub fn is_running(&self, id: ThreadId) -> bool {
        self.threads.iter().any(|t| t.id == id) || self.pending.iter().any(|t| t.id == id)
    }

    /// Check if any thread is alive
    pub fn has_running_threads(&self) -> bool {
        !self.threads.is_empty() || !self.pending.is_empty()
    }

    /// Number of live threads
    pub fn thread_count(&self) -> usize {
        self.threads.len() + self.pending.len()
    }

    /// Abandon a thread: stop advancing it. Property writes it already made
    /// are not rolled back.
    pub fn stop_thread(&mut self, id: ThreadId) -> bool {
        let before = self.threads.len() + self.pending.len();
        self.threads.retain(|t| t.id != id);
        self.pending.retain(|t| t.id != id);
        before != self.threads.len() + self.pending.len()
    }

    /// Abandon every thread
    pub fn clear_threads(&mut self) {
        self.threads.clear();
        self.pending.clear();
    }

    // ── Template instancing ──────────────────────────────────────────────────

    /// Deep-copy this director into a fresh live instance: same graphs,
    /// nodes, uuids, and connections; cleared threads, trigger counters, and
    /// clock. This is how per-object instances are made from one loaded
    /// template.
    pub fn clone_live(&self) -> Director {
        Director {
            registry: self.registry.clone(),
            mode: InstanceMode::Live,
            script_type: self.script_type.clone(),
            properties: self.properties.clone(),
            libraries: self.libraries.clone(),
            nodes: self
                .nodes
                .iter()
                .map(|slot| slot.as_ref().map(|n| n.clone_data()))
                .collect(),
            free_nodes: self.free_nodes.clone(),
            node_uuids: self.node_uuids.clone(),
            graphs: self
                .graphs
                .iter()
                .map(|slot| slot.as_ref().map(|g| g.clone_data()))
                .collect(),
            free_graphs: self.free_graphs.clone(),
            graph_uuids: self.graph_uuids.clone(),
            root: self.root,
            threads: Vec::new(),
            pending: Vec::new(),
            next_thread_id: 0,
            in_update: false,
            started: false,
            enabled: true,
            node_logging: self.node_logging,
            loading: false,
            sim_time: 0.0,
            created: self.created.clone(),
        }
    }

    // ── State snapshot ───────────────────────────────────────────────────────

    /// Capture the runtime state: plain value-node values and thread shapes.
    /// Bridging and reference value nodes are skipped; they hold no state of
    /// their own.
    pub fn state_snapshot(&self) -> StateSnapshot {
        let mut values = Vec::new();
        for id in self.all_nodes() {
            let Some(n) = self.node(id) else { continue };
            if n.kind() != NodeKind::Value {
                continue;
            }
            if n.behavior().value_source() != ValueSource::OwnProperty {
                continue;
            }
            if let Some(v) = n.properties().value("Value") {
                values.push(ValueState {
                    node: n.uuid(),
                    value: v.format(),
                });
            }
        }

        let threads = self
            .threads
            .iter()
            .map(|t| ThreadState {
                frames: t
                    .frames
                    .iter()
                    .filter_map(|f| {
                        self.node(f.node).map(|n| FrameState {
                            node: n.uuid(),
                            input: f.input,
                            first: f.first,
                        })
                    })
                    .collect(),
            })
            .collect();

        StateSnapshot { values, threads }
    }

    /// Restore a previously captured state onto this director. Nodes are
    /// matched by uuid; entries for nodes that no longer exist are skipped.
    pub fn restore_state(&mut self, state: &StateSnapshot) {
        self.clear_threads();

        for value in &state.values {
            if let Some(id) = self.find_node_by_uuid(value.node) {
                if let Some(n) = self.node_mut(id) {
                    n.properties_mut().set_formatted("Value", &value.value);
                }
            }
        }

        for thread in &state.threads {
            let frames: Vec<Frame> = thread
                .frames
                .iter()
                .filter_map(|f| {
                    self.find_node_by_uuid(f.node).map(|node| Frame {
                        node,
                        input: f.input,
                        first: f.first,
                    })
                })
                .collect();
            if frames.is_empty() {
                continue;
            }
            let id = ThreadId(self.next_thread_id);
            self.next_thread_id += 1;
            self.threads.push(ThreadData {
                id,
                frames,
                visited: HashSet::new(),
            });
        }
    }
}

impl std::fmt::Debug for Director {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Director")
            .field("name", &self.name())
            .field("mode", &self.mode)
            .field("nodes", &self.node_uuids.len())
            .field("graphs", &self.graph_uuids.len())
            .field("threads", &self.threads.len())
            .finish()
    }
}
