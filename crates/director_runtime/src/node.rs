//! Nodes - the unit of graph behavior
//!
//! A `Node` is pure data: identity, links, and a property container. What
//! it *does* lives in its `NodeBehavior`, a shared stateless capability
//! object resolved from the registry at construction time. Per-node state
//! goes in the property container; transient state uses non-saved
//! properties.

use std::sync::Arc;

use director_types::{DataType, NodeKind, NodeType, Property, PropertyContainer, PropertyValue};
use uuid::Uuid;

use crate::executor::{UpdateContext, UpdateOutcome};
use crate::ids::{GraphId, NodeId};
use crate::link::{InputLink, OutputLink, ValueLink};

/// Property automatically added to event nodes; 0 means unlimited triggers
pub const MAX_TRIGGER_COUNT: &str = "MaxTriggerCount";
/// Value link automatically added to instigator-filtered event nodes
pub const INSTIGATOR: &str = "Instigator";

// ─────────────────────────────────────────────────────────────────────────────
// Node Behavior
// ─────────────────────────────────────────────────────────────────────────────

/// Where a value node's reads and writes resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    /// The node's own "Value" property
    OwnProperty,
    /// Forward through the node's own value link of the given name
    /// (graph-boundary value bridges)
    ThroughLink(&'static str),
    /// Forward to the value node whose display name is stored in the given
    /// text property (reference nodes)
    ByName(&'static str),
}

/// Capability interface implemented per concrete node type.
///
/// Behaviors are stateless and shared; all per-node state lives in the
/// node's property container.
pub trait NodeBehavior: Send + Sync {
    /// Declare the node's links and properties. Called once at construction,
    /// after the base properties exist.
    fn build(&self, _node: &mut Node) {}

    /// Advance the node for one activation.
    ///
    /// `ctx.first_update()` distinguishes the entering frame from re-invocations
    /// after a suspension.
    fn update(&self, _ctx: &mut UpdateContext<'_>) -> UpdateOutcome {
        UpdateOutcome::out()
    }

    /// One-time hook when the owning director starts running
    fn on_start(&self, _ctx: &mut UpdateContext<'_>) {}

    /// Event nodes that filter triggers by instigator return true; they get
    /// an `Instigator` value link built in.
    fn uses_instigator_filter(&self) -> bool {
        false
    }

    /// How this node answers value reads when consumed through a value link
    fn value_source(&self) -> ValueSource {
        ValueSource::OwnProperty
    }
}

/// Function-based behavior for simple action nodes
pub struct FnNodeBehavior<F>
where
    F: Fn(&mut UpdateContext<'_>) -> UpdateOutcome + Send + Sync,
{
    build: fn(&mut Node),
    func: F,
}

impl<F> FnNodeBehavior<F>
where
    F: Fn(&mut UpdateContext<'_>) -> UpdateOutcome + Send + Sync,
{
    pub fn new(build: fn(&mut Node), func: F) -> Self {
        Self { build, func }
    }
}

impl<F> NodeBehavior for FnNodeBehavior<F>
where
    F: Fn(&mut UpdateContext<'_>) -> UpdateOutcome + Send + Sync,
{
    fn build(&self, node: &mut Node) {
        (self.build)(node);
    }

    fn update(&self, ctx: &mut UpdateContext<'_>) -> UpdateOutcome {
        (self.func)(ctx)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Node
// ─────────────────────────────────────────────────────────────────────────────

/// A node instance owned by a director graph
pub struct Node {
    /// Arena handle, set on insertion
    pub(crate) id: NodeId,
    /// Persistent identity, survives save/load
    pub(crate) uuid: Uuid,
    node_type: Arc<NodeType>,
    behavior: Arc<dyn NodeBehavior>,
    /// Owning graph
    pub(crate) graph: GraphId,
    /// Mirror of the "Enabled" property; the fast path when no value node
    /// is linked to it
    pub(crate) enabled: bool,
    /// Counted activations of this event node (events only)
    pub(crate) trigger_count: u32,
    inputs: Vec<InputLink>,
    outputs: Vec<OutputLink>,
    values: Vec<ValueLink>,
    properties: PropertyContainer,
}

impl Node {
    /// Construct a node of the given type. Base properties are added first,
    /// then the behavior declares its own, then event extras.
    pub(crate) fn new(
        id: NodeId,
        node_type: Arc<NodeType>,
        behavior: Arc<dyn NodeBehavior>,
        graph: GraphId,
    ) -> Self {
        let mut node = Self {
            id,
            uuid: Uuid::new_v4(),
            node_type,
            behavior,
            graph,
            enabled: true,
            trigger_count: 0,
            inputs: Vec::new(),
            outputs: Vec::new(),
            values: Vec::new(),
            properties: PropertyContainer::new(),
        };

        node.properties.add(
            Property::new("Enabled", true)
                .with_description("Disabled nodes are skipped during graph execution."),
        );
        node.properties.add(Property::new("Comment", ""));
        node.properties.add(
            Property::new("LogNode", false)
                .with_description("Log a message when this node executes."),
        );
        // The enabled flag doubles as a hidden value link so scripts can
        // drive it from a value node.
        node.values
            .push(ValueLink::new(id, "Enabled").hidden());

        if matches!(node.kind(), NodeKind::Value | NodeKind::Link) {
            node.properties.add(Property::new("Name", ""));
        }

        let behavior = node.behavior.clone();
        behavior.build(&mut node);

        if node.kind() == NodeKind::Event {
            node.properties.add(
                Property::new(MAX_TRIGGER_COUNT, 0u32)
                    .with_description("Maximum counted triggers; 0 is unlimited."),
            );
            if behavior.uses_instigator_filter() {
                node.properties
                    .add(Property::new(INSTIGATOR, Uuid::nil()));
                node.values
                    .push(ValueLink::new(id, INSTIGATOR).multiple());
            }
        }

        node
    }

    /// Arena handle of this node
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Persistent identity
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// The node's type descriptor
    pub fn node_type(&self) -> &NodeType {
        &self.node_type
    }

    /// Behavioral variant shorthand
    pub fn kind(&self) -> NodeKind {
        self.node_type.kind
    }

    /// The behavior object driving this node
    pub fn behavior(&self) -> Arc<dyn NodeBehavior> {
        self.behavior.clone()
    }

    /// Owning graph
    pub fn graph(&self) -> GraphId {
        self.graph
    }

    /// Display name: the "Name" property when present and non-empty,
    /// otherwise the type name.
    pub fn display_name(&self) -> &str {
        match self.properties.value("Name") {
            Some(PropertyValue::Text(s)) if !s.is_empty() => s,
            _ => &self.node_type.name,
        }
    }

    /// Set the display name
    pub fn set_name(&mut self, name: &str) {
        if self.properties.contains("Name") {
            self.properties.set_value("Name", name);
        } else {
            self.properties.add(Property::new("Name", name));
        }
    }

    /// The locally stored enabled flag. `Director::is_node_enabled` also
    /// honors a value node linked to "Enabled".
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Set the enabled flag (property and mirror)
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.properties.set_value("Enabled", enabled);
    }

    /// Re-mirror the enabled flag from the property, after bulk property
    /// restores (deserialization).
    pub(crate) fn refresh_enabled(&mut self) {
        self.enabled = self
            .properties
            .value("Enabled")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
    }

    /// Whether this node logs its executions (with the director-wide switch)
    pub fn node_logging(&self) -> bool {
        self.properties
            .value("LogNode")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    // ── Links ────────────────────────────────────────────────────────────────

    /// The input link list, in declaration order
    pub fn inputs(&self) -> &[InputLink] {
        &self.inputs
    }

    /// The output link list, in declaration order
    pub fn outputs(&self) -> &[OutputLink] {
        &self.outputs
    }

    /// The value link list, in declaration order
    pub fn values(&self) -> &[ValueLink] {
        &self.values
    }

    pub(crate) fn inputs_mut(&mut self) -> &mut [InputLink] {
        &mut self.inputs
    }

    pub(crate) fn outputs_mut(&mut self) -> &mut [OutputLink] {
        &mut self.outputs
    }

    pub(crate) fn values_mut(&mut self) -> &mut [ValueLink] {
        &mut self.values
    }

    /// Find an input link by name
    pub fn input_link(&self, name: &str) -> Option<&InputLink> {
        self.inputs.iter().find(|l| l.name == name)
    }

    /// Find an output link by name
    pub fn output_link(&self, name: &str) -> Option<&OutputLink> {
        self.outputs.iter().find(|l| l.name == name)
    }

    /// Find a value link by name
    pub fn value_link(&self, name: &str) -> Option<&ValueLink> {
        self.values.iter().find(|l| l.name == name)
    }

    /// Find a mutable input link by name. Connection lists are maintained by
    /// the director; this is for flag adjustments.
    pub fn input_link_mut(&mut self, name: &str) -> Option<&mut InputLink> {
        self.inputs.iter_mut().find(|l| l.name == name)
    }

    /// Find a mutable output link by name
    pub fn output_link_mut(&mut self, name: &str) -> Option<&mut OutputLink> {
        self.outputs.iter_mut().find(|l| l.name == name)
    }

    /// Find a mutable value link by name
    pub fn value_link_mut(&mut self, name: &str) -> Option<&mut ValueLink> {
        self.values.iter_mut().find(|l| l.name == name)
    }

    /// Index of a named input link
    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|l| l.name == name)
    }

    // ── Builders used by NodeBehavior::build ─────────────────────────────────

    /// Declare an input link
    pub fn add_input(&mut self, name: &str) {
        self.inputs.push(InputLink::new(self.id, name));
    }

    /// Declare an output link
    pub fn add_output(&mut self, name: &str) {
        self.outputs.push(OutputLink::new(self.id, name));
    }

    /// Declare a value link. The default property of the same name must be
    /// added separately (or already exist).
    pub fn add_value_link(&mut self, link: ValueLink) {
        self.values.push(link);
    }

    /// Declare a value link builder bound to this node
    pub fn value_link_builder(&self, name: &str) -> ValueLink {
        ValueLink::new(self.id, name)
    }

    /// Add a property
    pub fn add_property(&mut self, property: Property) {
        self.properties.add(property);
    }

    // ── Properties ───────────────────────────────────────────────────────────

    /// The node's own property container (no link resolution)
    pub fn properties(&self) -> &PropertyContainer {
        &self.properties
    }

    /// Mutable access to the node's own property container
    pub fn properties_mut(&mut self) -> &mut PropertyContainer {
        &mut self.properties
    }

    /// Data type this node exposes when consumed as a value node.
    /// Bridging value nodes (non-`OwnProperty` sources) report `Unknown`.
    pub fn declared_value_type(&self) -> DataType {
        if self.behavior.value_source() != ValueSource::OwnProperty {
            return DataType::Unknown;
        }
        self.properties
            .value("Value")
            .map(|v| v.data_type())
            .unwrap_or(DataType::Unknown)
    }

    /// Clone the node's data for template instancing. Links keep their
    /// arena ids, which is correct because the clone lands at the same
    /// index in the cloned arena.
    pub(crate) fn clone_data(&self) -> Node {
        Node {
            id: self.id,
            uuid: self.uuid,
            node_type: self.node_type.clone(),
            behavior: self.behavior.clone(),
            graph: self.graph,
            enabled: self.enabled,
            trigger_count: 0,
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            values: self.values.clone(),
            properties: self.properties.clone(),
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("uuid", &self.uuid)
            .field("type", &self.node_type.full_name())
            .field("enabled", &self.enabled)
            .finish()
    }
}
