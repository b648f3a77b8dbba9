//! Executor - node update context and outcome types
//!
//! `UpdateContext` is what a node behavior sees while it runs: typed access
//! to its link-resolved properties, the tick deltas, and the identity of the
//! activation that reached it. `UpdateOutcome` is the explicit result tag
//! the scheduler interprets.

use director_types::PropertyValue;
use uuid::Uuid;

use crate::director::Director;
use crate::ids::{NodeId, ThreadId};

// ─────────────────────────────────────────────────────────────────────────────
// Update Outcome
// ─────────────────────────────────────────────────────────────────────────────

/// Result of one node update, interpreted by the thread scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The node is done with this activation. Execution continues through
    /// the named output links, in order.
    Finished {
        /// Output link names activated by this update
        activated: Vec<String>,
    },
    /// The node wants to be re-invoked on the next tick without re-entering
    /// through its input link. The frame stays parked until then.
    Suspended,
}

impl UpdateOutcome {
    /// Finish and activate the given outputs
    pub fn finished<I, S>(outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        UpdateOutcome::Finished {
            activated: outputs.into_iter().map(Into::into).collect(),
        }
    }

    /// Finish and activate the default "Out" link
    pub fn out() -> Self {
        UpdateOutcome::finished(["Out"])
    }

    /// Finish without activating anything; the branch ends here
    pub fn finished_none() -> Self {
        UpdateOutcome::Finished { activated: Vec::new() }
    }

    /// Park the frame until the next tick
    pub fn suspended() -> Self {
        UpdateOutcome::Suspended
    }

    /// Check if this outcome suspends the thread
    pub fn is_suspended(&self) -> bool {
        matches!(self, UpdateOutcome::Suspended)
    }

    /// The activated output names, empty when suspended
    pub fn activated(&self) -> &[String] {
        match self {
            UpdateOutcome::Finished { activated } => activated,
            UpdateOutcome::Suspended => &[],
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Update Context
// ─────────────────────────────────────────────────────────────────────────────

/// Context passed to a node behavior for one update call
pub struct UpdateContext<'a> {
    director: &'a mut Director,
    node: NodeId,
    input: usize,
    first_update: bool,
    sim_delta: f32,
    real_delta: f32,
    thread: Option<ThreadId>,
}

impl<'a> UpdateContext<'a> {
    pub(crate) fn new(
        director: &'a mut Director,
        node: NodeId,
        input: usize,
        first_update: bool,
        sim_delta: f32,
        real_delta: f32,
        thread: Option<ThreadId>,
    ) -> Self {
        Self {
            director,
            node,
            input,
            first_update,
            sim_delta,
            real_delta,
            thread,
        }
    }

    /// The node being updated
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Index of the input link that activated this node
    pub fn input_index(&self) -> usize {
        self.input
    }

    /// Name of the input link that activated this node
    pub fn input_name(&self) -> Option<&str> {
        self.director
            .node(self.node)
            .and_then(|n| n.inputs().get(self.input))
            .map(|l| l.name.as_str())
    }

    /// True on the frame this input was first entered; false on re-invocations
    /// after a suspension.
    pub fn first_update(&self) -> bool {
        self.first_update
    }

    /// Simulation time step of the current tick
    pub fn sim_delta(&self) -> f32 {
        self.sim_delta
    }

    /// Real time step of the current tick
    pub fn real_delta(&self) -> f32 {
        self.real_delta
    }

    /// The executing thread, if this update runs inside one
    pub fn thread(&self) -> Option<ThreadId> {
        self.thread
    }

    /// The director driving this update
    pub fn director(&self) -> &Director {
        self.director
    }

    // ── Link-resolved property access ────────────────────────────────────────

    /// Number of logical values behind the named property (see
    /// `Director::property_count`)
    pub fn property_count(&self, name: &str) -> usize {
        self.director.property_count(self.node, name)
    }

    /// Read the index-th value behind the named property
    pub fn property(&self, name: &str, index: usize) -> Option<PropertyValue> {
        self.director.property(self.node, name, index)
    }

    /// Boolean property, false when missing or mistyped
    pub fn get_boolean(&self, name: &str) -> bool {
        self.property(name, 0).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    /// Integer property, 0 when missing or mistyped
    pub fn get_int(&self, name: &str) -> i32 {
        self.property(name, 0).and_then(|v| v.as_int()).unwrap_or(0)
    }

    /// Unsigned integer property, 0 when missing or mistyped
    pub fn get_uint(&self, name: &str) -> u32 {
        self.property(name, 0).and_then(|v| v.as_uint()).unwrap_or(0)
    }

    /// Float property, 0.0 when missing or mistyped
    pub fn get_float(&self, name: &str) -> f32 {
        self.property(name, 0).and_then(|v| v.as_float()).unwrap_or(0.0)
    }

    /// Double property, 0.0 when missing or mistyped
    pub fn get_double(&self, name: &str) -> f64 {
        self.property(name, 0).and_then(|v| v.as_double()).unwrap_or(0.0)
    }

    /// String property, empty when missing. Non-text values are formatted.
    pub fn get_string(&self, name: &str) -> String {
        self.property(name, 0).map(|v| v.format()).unwrap_or_default()
    }

    /// Actor property, nil when missing or mistyped
    pub fn get_actor(&self, name: &str) -> Uuid {
        self.property(name, 0)
            .and_then(|v| v.as_actor())
            .unwrap_or(Uuid::nil())
    }

    /// Write through the named property to every linked value
    pub fn set_property(&mut self, name: &str, value: impl Into<PropertyValue>) -> bool {
        self.director.set_property(self.node, name, None, value.into())
    }

    /// Write through the named property to one linked value
    pub fn set_property_at(
        &mut self,
        name: &str,
        index: usize,
        value: impl Into<PropertyValue>,
    ) -> bool {
        self.director
            .set_property(self.node, name, Some(index), value.into())
    }

    // ── Direct own-property access (bypasses value links) ────────────────────

    /// Read one of the node's own properties without link resolution.
    /// Used for configuration and transient scratch state.
    pub fn local(&self, name: &str) -> Option<PropertyValue> {
        self.director
            .node(self.node)
            .and_then(|n| n.properties().value(name))
            .cloned()
    }

    /// Write one of the node's own properties without link resolution
    pub fn set_local(&mut self, name: &str, value: impl Into<PropertyValue>) -> bool {
        match self.director.node_mut(self.node) {
            Some(node) => node.properties_mut().set_value(name, value),
            None => false,
        }
    }

    // ── Cross-node access for event-firing actions ───────────────────────────

    /// All nodes of a registered type, in graph order
    pub fn nodes_of_type(&self, category: &str, name: &str) -> Vec<NodeId> {
        self.director.nodes_of_type(category, name)
    }

    /// Read another node's own property (no link resolution)
    pub fn node_property(&self, node: NodeId, name: &str) -> Option<PropertyValue> {
        self.director
            .node(node)
            .and_then(|n| n.properties().value(name))
            .cloned()
    }

    /// Trigger an event node. Threads spawned from inside an update are
    /// queued and run after the current thread finishes its pass.
    pub fn trigger(
        &mut self,
        node: NodeId,
        output_name: &str,
        instigator: Option<Uuid>,
        count_trigger: bool,
    ) -> Option<ThreadId> {
        self.director
            .trigger_event(node, output_name, instigator, count_trigger)
    }
}
