//! Director Nodes - the standard node library
//!
//! Events, actions, value nodes, and the Core structural nodes that bridge
//! nested graphs. Everything registers under the `director_nodes` library
//! name via [`register_default_nodes`].

mod actions;
mod events;
mod structural;
mod values;

pub use actions::*;
pub use events::*;
pub use structural::*;
pub use values::*;

use director_runtime::NodeRegistry;

/// Library name all standard nodes register under
pub const LIBRARY: &str = "director_nodes";

/// Register the complete standard node library
pub fn register_default_nodes(registry: &mut NodeRegistry) {
    events::register(registry);
    actions::register(registry);
    values::register(registry);
    structural::register(registry);
}
