//! Links - the connection primitives between nodes
//!
//! Three kinds: `InputLink` (entry point into a node), `OutputLink` (exit
//! point), `ValueLink` (binds a node property to external value nodes).
//! Connections are weak references into the director's arena; the link
//! structs never own the node on the other end. Connection management that
//! needs both ends at once lives on `Director`.

use serde::{Deserialize, Serialize};

use crate::ids::NodeId;

/// Weak reference to a named link on another node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRef {
    /// Owning node of the referenced link
    pub node: NodeId,
    /// Name of the referenced link on that node
    pub link: String,
}

impl LinkRef {
    /// Create a new link reference
    pub fn new(node: NodeId, link: &str) -> Self {
        Self {
            node,
            link: link.to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Input Link
// ─────────────────────────────────────────────────────────────────────────────

/// An entry point into a node. Activation invokes the owning node's update
/// with this link's index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputLink {
    /// Link name (unique among the node's inputs)
    pub name: String,
    /// Owning node
    pub owner: NodeId,
    /// Upstream output links connected to this input (back-references)
    pub links: Vec<LinkRef>,
    /// Forward activation to another input link (graph nesting)
    pub redirect: Option<LinkRef>,
    /// Editor visibility flag, persisted with the script
    pub visible: bool,
}

impl InputLink {
    /// Create a new input link
    pub fn new(owner: NodeId, name: &str) -> Self {
        Self {
            name: name.to_string(),
            owner,
            links: Vec::new(),
            redirect: None,
            visible: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output Link
// ─────────────────────────────────────────────────────────────────────────────

/// An exit point out of a node. Activating it forks execution into one
/// frame per connected input link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputLink {
    /// Link name (unique among the node's outputs)
    pub name: String,
    /// Owning node
    pub owner: NodeId,
    /// Downstream input links this output feeds, in connection order
    pub links: Vec<LinkRef>,
    /// Forward activation through another output link (graph nesting)
    pub redirect: Option<LinkRef>,
    /// Editor visibility flag, persisted with the script
    pub visible: bool,
}

impl OutputLink {
    /// Create a new output link
    pub fn new(owner: NodeId, name: &str) -> Self {
        Self {
            name: name.to_string(),
            owner,
            links: Vec::new(),
            redirect: None,
            visible: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Value Link
// ─────────────────────────────────────────────────────────────────────────────

/// A data connection point binding one of the owning node's properties to
/// zero or more external value nodes.
///
/// The link's default property is the owner's property of the same name;
/// it answers reads while no value node is connected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueLink {
    /// Link name; also the name of the owner's default property
    pub name: String,
    /// Owning node
    pub owner: NodeId,
    /// Connected value nodes, in connection order
    pub links: Vec<NodeId>,
    /// Forward resolution through another value link (graph nesting)
    pub redirect: Option<LinkRef>,
    /// Whether the owning node writes through this link
    pub is_output: bool,
    /// Whether more than one value node may connect
    pub allow_multiple: bool,
    /// Whether connections are validated against the default property type
    pub type_check: bool,
    /// Whether the link is exposed on the node at all
    pub exposed: bool,
    /// Editor visibility flag, persisted with the script
    pub visible: bool,
}

impl ValueLink {
    /// Create a new value link. Starts exposed, visible, type-checked, and
    /// single-connection; use the builder methods to loosen.
    pub fn new(owner: NodeId, name: &str) -> Self {
        Self {
            name: name.to_string(),
            owner,
            links: Vec::new(),
            redirect: None,
            is_output: false,
            allow_multiple: false,
            type_check: true,
            exposed: true,
            visible: true,
        }
    }

    /// Mark the link as written by the owning node
    pub fn output(mut self) -> Self {
        self.is_output = true;
        self
    }

    /// Allow multiple connected value nodes
    pub fn multiple(mut self) -> Self {
        self.allow_multiple = true;
        self
    }

    /// Disable connection type checking
    pub fn untyped(mut self) -> Self {
        self.type_check = false;
        self
    }

    /// Hide the link from the editor by default
    pub fn hidden(mut self) -> Self {
        self.exposed = false;
        self.visible = false;
        self
    }

    /// Number of logical properties this link resolves to: the connected
    /// value nodes, or the single default property when unconnected.
    pub fn property_count(&self) -> usize {
        if self.links.is_empty() {
            1
        } else {
            self.links.len()
        }
    }
}
