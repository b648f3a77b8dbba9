//! Node Registry - node types and their behaviors
//!
//! The registry holds every node type the host application has made
//! available, keyed by full type name ("Category.Name"), grouped into named
//! libraries. It is the only place type-name lookup happens; after
//! construction, dispatch goes through the node's behavior object.
//!
//! The registry is passed to each `Director` explicitly; there is no global
//! instance.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use director_types::NodeType;

use crate::executor::{UpdateContext, UpdateOutcome};
use crate::node::{FnNodeBehavior, Node, NodeBehavior};

/// Entry in the node registry
struct NodeEntry {
    node_type: Arc<NodeType>,
    behavior: Arc<dyn NodeBehavior>,
    library: String,
}

/// Registry of all available node types
#[derive(Default)]
pub struct NodeRegistry {
    nodes: HashMap<String, NodeEntry>,
    libraries: BTreeSet<String>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node type with its behavior, under a library name.
    /// Re-registering a full type name replaces the previous entry.
    pub fn register(
        &mut self,
        library: &str,
        node_type: NodeType,
        behavior: Arc<dyn NodeBehavior>,
    ) {
        self.libraries.insert(library.to_string());
        let key = node_type.full_name();
        self.nodes.insert(
            key,
            NodeEntry {
                node_type: Arc::new(node_type),
                behavior,
                library: library.to_string(),
            },
        );
    }

    /// Register a simple node from a build function and an update closure
    pub fn register_fn<F>(
        &mut self,
        library: &str,
        node_type: NodeType,
        build: fn(&mut Node),
        func: F,
    ) where
        F: Fn(&mut UpdateContext<'_>) -> UpdateOutcome + Send + Sync + 'static,
    {
        self.register(library, node_type, Arc::new(FnNodeBehavior::new(build, func)));
    }

    /// Look up a type descriptor and behavior by category and name
    pub fn get(&self, category: &str, name: &str) -> Option<(Arc<NodeType>, Arc<dyn NodeBehavior>)> {
        self.nodes
            .get(&format!("{category}.{name}"))
            .map(|e| (e.node_type.clone(), e.behavior.clone()))
    }

    /// Check if a full type name is registered
    pub fn contains(&self, category: &str, name: &str) -> bool {
        self.nodes.contains_key(&format!("{category}.{name}"))
    }

    /// The library a type was registered under
    pub fn library_of(&self, category: &str, name: &str) -> Option<&str> {
        self.nodes
            .get(&format!("{category}.{name}"))
            .map(|e| e.library.as_str())
    }

    /// Check if a library name has any registrations
    pub fn has_library(&self, library: &str) -> bool {
        self.libraries.contains(library)
    }

    /// All registered library names, sorted
    pub fn libraries(&self) -> impl Iterator<Item = &str> {
        self.libraries.iter().map(|s| s.as_str())
    }

    /// All registered type descriptors
    pub fn definitions(&self) -> impl Iterator<Item = &NodeType> {
        self.nodes.values().map(|e| e.node_type.as_ref())
    }

    /// Type descriptors in a category, sorted by name
    pub fn definitions_in_category(&self, category: &str) -> Vec<&NodeType> {
        let mut defs: Vec<_> = self
            .nodes
            .values()
            .map(|e| e.node_type.as_ref())
            .filter(|t| t.category == category)
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// All categories, sorted and deduplicated
    pub fn categories(&self) -> Vec<String> {
        let mut cats: Vec<_> = self
            .nodes
            .values()
            .map(|e| e.node_type.category.clone())
            .collect();
        cats.sort();
        cats.dedup();
        cats
    }

    /// Number of registered node types
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
