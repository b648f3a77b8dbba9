//! Engine semantics: triggering, scheduling, value resolution.
//!
//! These tests run against a small local node library so the engine is
//! exercised without the standard node crate.

use std::sync::Arc;

use director_runtime::{
    Director, InstanceMode, LinkRef, MAX_TRIGGER_COUNT, Node, NodeBehavior, NodeRegistry,
    UpdateContext, UpdateOutcome,
};
use director_types::{NodeKind, NodeType, Property, PropertyValue};
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Test node library
// ─────────────────────────────────────────────────────────────────────────────

struct EventBehavior {
    filtered: bool,
}

impl NodeBehavior for EventBehavior {
    fn build(&self, node: &mut Node) {
        node.add_output("Out");
    }

    fn uses_instigator_filter(&self) -> bool {
        self.filtered
    }
}

/// Appends its Tag to the text value connected to Target.
struct AppendBehavior;

impl NodeBehavior for AppendBehavior {
    fn build(&self, node: &mut Node) {
        node.add_input("In");
        node.add_output("Out");
        node.add_property(Property::new("Tag", ""));
        node.add_property(Property::new("Target", ""));
        node.add_value_link(node.value_link_builder("Target").output().multiple());
    }

    fn update(&self, ctx: &mut UpdateContext<'_>) -> UpdateOutcome {
        let mut text = ctx.get_string("Target");
        text.push_str(&ctx.get_string("Tag"));
        ctx.set_property("Target", text);
        UpdateOutcome::out()
    }
}

/// Suspends until it has been updated Ticks times.
struct WaitTicksBehavior;

impl NodeBehavior for WaitTicksBehavior {
    fn build(&self, node: &mut Node) {
        node.add_input("In");
        node.add_output("Out");
        node.add_property(Property::new("Ticks", 1));
        node.add_property(Property::transient("Count", 0));
    }

    fn update(&self, ctx: &mut UpdateContext<'_>) -> UpdateOutcome {
        if ctx.first_update() {
            ctx.set_local("Count", 0);
        }
        let count = ctx.local("Count").and_then(|v| v.as_int()).unwrap_or(0) + 1;
        ctx.set_local("Count", count);
        if count >= ctx.get_int("Ticks") {
            UpdateOutcome::out()
        } else {
            UpdateOutcome::suspended()
        }
    }
}

/// Records which of its two inputs was activated.
struct TwoInputBehavior;

impl NodeBehavior for TwoInputBehavior {
    fn build(&self, node: &mut Node) {
        node.add_input("First");
        node.add_input("Second");
        node.add_output("Out");
        node.add_property(Property::transient("Got", -1));
    }

    fn update(&self, ctx: &mut UpdateContext<'_>) -> UpdateOutcome {
        let index = ctx.input_index() as i32;
        ctx.set_local("Got", index);
        UpdateOutcome::out()
    }
}

struct TextValueBehavior;

impl NodeBehavior for TextValueBehavior {
    fn build(&self, node: &mut Node) {
        node.add_property(Property::new("Value", ""));
    }
}

struct ActorValueBehavior;

impl NodeBehavior for ActorValueBehavior {
    fn build(&self, node: &mut Node) {
        node.add_property(Property::new("Value", Uuid::nil()));
    }
}

struct FlagValueBehavior;

impl NodeBehavior for FlagValueBehavior {
    fn build(&self, node: &mut Node) {
        node.add_property(Property::new("Value", false));
    }
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn test_registry() -> Arc<NodeRegistry> {
    let mut registry = NodeRegistry::new();
    registry.register(
        "test_lib",
        NodeType::new("Event", "Test", NodeKind::Event),
        Arc::new(EventBehavior { filtered: false }),
    );
    registry.register(
        "test_lib",
        NodeType::new("Filtered Event", "Test", NodeKind::Event),
        Arc::new(EventBehavior { filtered: true }),
    );
    registry.register(
        "test_lib",
        NodeType::new("Append", "Test", NodeKind::Action),
        Arc::new(AppendBehavior),
    );
    registry.register(
        "test_lib",
        NodeType::new("Wait Ticks", "Test", NodeKind::Action),
        Arc::new(WaitTicksBehavior),
    );
    registry.register(
        "test_lib",
        NodeType::new("Two Input", "Test", NodeKind::Action),
        Arc::new(TwoInputBehavior),
    );
    registry.register(
        "test_lib",
        NodeType::new("Text", "Test", NodeKind::Value),
        Arc::new(TextValueBehavior),
    );
    registry.register(
        "test_lib",
        NodeType::new("Actor", "Test", NodeKind::Value),
        Arc::new(ActorValueBehavior),
    );
    registry.register(
        "test_lib",
        NodeType::new("Flag", "Test", NodeKind::Value),
        Arc::new(FlagValueBehavior),
    );
    Arc::new(registry)
}

/// Director with an event node, a shared text value, and n Append actions
/// chained off the event in connection order.
fn appender_setup(tags: &[&str]) -> (Director, director_runtime::NodeId, director_runtime::NodeId) {
    let mut director = Director::new(test_registry());
    let root = director.root_graph();
    let event = director.create_node("Test", "Event", root).unwrap();
    let value = director.create_node("Test", "Text", root).unwrap();

    for tag in tags {
        let append = director.create_node("Test", "Append", root).unwrap();
        director
            .node_mut(append)
            .unwrap()
            .properties_mut()
            .set_value("Tag", *tag);
        assert!(director.connect_chain(event, "Out", append, "In"));
        assert!(director.connect_value(append, "Target", value));
    }

    (director, event, value)
}

fn text_of(director: &Director, value: director_runtime::NodeId) -> String {
    director
        .node(value)
        .unwrap()
        .properties()
        .value("Value")
        .and_then(|v| v.as_text().map(str::to_string))
        .unwrap_or_default()
}

// ─────────────────────────────────────────────────────────────────────────────
// Triggering
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn trigger_drains_synchronously() {
    let (mut director, event, value) = appender_setup(&["a"]);

    let thread = director.trigger_event(event, "Out", None, true);
    assert!(thread.is_some());
    // The whole branch ran before trigger returned.
    assert_eq!(text_of(&director, value), "a");
    assert!(!director.has_running_threads());
}

#[test]
fn trigger_count_ceiling() {
    let (mut director, event, value) = appender_setup(&["x"]);
    director
        .node_mut(event)
        .unwrap()
        .properties_mut()
        .set_value(MAX_TRIGGER_COUNT, 2u32);

    assert!(director.trigger_event(event, "Out", None, true).is_some());
    assert!(director.trigger_event(event, "Out", None, true).is_some());
    // The third counted call is rejected and activates nothing.
    assert!(director.trigger_event(event, "Out", None, true).is_none());
    assert_eq!(text_of(&director, value), "xx");
}

#[test]
fn uncounted_triggers_do_not_consume_the_ceiling() {
    let (mut director, event, value) = appender_setup(&["x"]);
    director
        .node_mut(event)
        .unwrap()
        .properties_mut()
        .set_value(MAX_TRIGGER_COUNT, 1u32);

    assert!(director.trigger_event(event, "Out", None, false).is_some());
    assert!(director.trigger_event(event, "Out", None, false).is_some());
    assert!(director.trigger_event(event, "Out", None, true).is_some());
    assert!(director.trigger_event(event, "Out", None, true).is_none());
    assert_eq!(text_of(&director, value), "xxx");
}

#[test]
fn disabled_event_does_not_trigger() {
    let (mut director, event, value) = appender_setup(&["a"]);
    director.node_mut(event).unwrap().set_enabled(false);

    assert!(director.trigger_event(event, "Out", None, true).is_none());
    assert_eq!(text_of(&director, value), "");
}

#[test]
fn unknown_output_does_not_trigger() {
    let (mut director, event, _value) = appender_setup(&["a"]);
    assert!(director.trigger_event(event, "Missing", None, true).is_none());
}

#[test]
fn template_instances_never_execute() {
    let (mut director, event, value) = appender_setup(&["a"]);
    director.set_mode(InstanceMode::Template);

    assert!(director.trigger_event(event, "Out", None, true).is_none());
    assert_eq!(text_of(&director, value), "");

    // A live clone of the template runs normally.
    let mut live = director.clone_live();
    let live_event = live.find_node_by_uuid(director.node(event).unwrap().uuid()).unwrap();
    assert!(live.trigger_event(live_event, "Out", None, true).is_some());

    // The clone's writes never touch the template.
    assert_eq!(text_of(&director, value), "");
}

// ─────────────────────────────────────────────────────────────────────────────
// Instigator filtering
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn instigator_filter() {
    let mut director = Director::new(test_registry());
    let root = director.root_graph();
    let event = director.create_node("Test", "Filtered Event", root).unwrap();
    let value = director.create_node("Test", "Text", root).unwrap();
    let append = director.create_node("Test", "Append", root).unwrap();
    director
        .node_mut(append)
        .unwrap()
        .properties_mut()
        .set_value("Tag", "a");
    director.connect_chain(event, "Out", append, "In");
    director.connect_value(append, "Target", value);

    let friend = Uuid::new_v4();
    let stranger = Uuid::new_v4();

    // No filter values connected: any instigator is accepted.
    assert!(director.trigger_event(event, "Out", Some(stranger), true).is_some());
    assert!(director.trigger_event(event, "Out", None, true).is_some());

    // Connect an actor filter value.
    let actor = director.create_node("Test", "Actor", root).unwrap();
    director
        .node_mut(actor)
        .unwrap()
        .properties_mut()
        .set_value("Value", friend);
    assert!(director.connect_value(event, "Instigator", actor));

    assert!(director.trigger_event(event, "Out", Some(friend), true).is_some());
    assert!(director.trigger_event(event, "Out", Some(stranger), true).is_none());
    assert!(director.trigger_event(event, "Out", None, true).is_none());

    assert_eq!(text_of(&director, value), "aaa");
}

// ─────────────────────────────────────────────────────────────────────────────
// Scheduling
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn fan_out_is_depth_first_left_to_right() {
    // Event.Out feeds A then B; A's write must be visible to B.
    let (mut director, event, value) = appender_setup(&["a", "b"]);
    director.trigger_event(event, "Out", None, true);
    assert_eq!(text_of(&director, value), "ab");
}

#[test]
fn earlier_branch_completes_before_sibling() {
    // Event.Out -> [A, B]; A.Out -> C. Depth-first order is a, c, b.
    let (mut director, event, value) = appender_setup(&["a", "b"]);
    let root = director.root_graph();
    let c = director.create_node("Test", "Append", root).unwrap();
    director
        .node_mut(c)
        .unwrap()
        .properties_mut()
        .set_value("Tag", "c");
    director.connect_value(c, "Target", value);

    let a = director.nodes_of_type("Test", "Append")[0];
    director.connect_chain(a, "Out", c, "In");

    director.trigger_event(event, "Out", None, true);
    assert_eq!(text_of(&director, value), "acb");
}

#[test]
fn suspension_parks_the_frame_across_ticks() {
    init_logging();
    let mut director = Director::new(test_registry());
    let root = director.root_graph();
    let event = director.create_node("Test", "Event", root).unwrap();
    let wait = director.create_node("Test", "Wait Ticks", root).unwrap();
    let value = director.create_node("Test", "Text", root).unwrap();
    let append = director.create_node("Test", "Append", root).unwrap();

    director
        .node_mut(wait)
        .unwrap()
        .properties_mut()
        .set_value("Ticks", 3);
    director
        .node_mut(append)
        .unwrap()
        .properties_mut()
        .set_value("Tag", "done");
    director.connect_chain(event, "Out", wait, "In");
    director.connect_chain(wait, "Out", append, "In");
    director.connect_value(append, "Target", value);

    let thread = director.trigger_event(event, "Out", None, true).unwrap();
    // First update happened inside the trigger; the node suspended.
    assert!(director.is_running(thread));
    assert_eq!(text_of(&director, value), "");

    director.update(0.1, 0.1);
    assert!(director.is_running(thread));
    assert_eq!(text_of(&director, value), "");

    director.update(0.1, 0.1);
    assert!(!director.is_running(thread));
    assert_eq!(text_of(&director, value), "done");
}

#[test]
fn graph_cycles_terminate_within_a_pass() {
    // A.Out -> B.In, B.Out -> A.In: each node runs once per pass.
    let (mut director, event, value) = appender_setup(&["a"]);
    let root = director.root_graph();
    let b = director.create_node("Test", "Append", root).unwrap();
    director
        .node_mut(b)
        .unwrap()
        .properties_mut()
        .set_value("Tag", "b");
    director.connect_value(b, "Target", value);

    let a = director.nodes_of_type("Test", "Append")[0];
    director.connect_chain(a, "Out", b, "In");
    director.connect_chain(b, "Out", a, "In");

    director.trigger_event(event, "Out", None, true);
    assert_eq!(text_of(&director, value), "ab");
    assert!(!director.has_running_threads());
}

#[test]
fn disabled_nodes_are_skipped_in_fan_out() {
    let (mut director, event, value) = appender_setup(&["a", "b"]);
    let a = director.nodes_of_type("Test", "Append")[0];
    director.node_mut(a).unwrap().set_enabled(false);

    director.trigger_event(event, "Out", None, true);
    assert_eq!(text_of(&director, value), "b");
}

#[test]
fn input_index_dispatch() {
    let mut director = Director::new(test_registry());
    let root = director.root_graph();
    let event = director.create_node("Test", "Event", root).unwrap();
    let two = director.create_node("Test", "Two Input", root).unwrap();
    director.connect_chain(event, "Out", two, "Second");

    director.trigger_event(event, "Out", None, true);
    assert_eq!(
        director.node(two).unwrap().properties().value("Got"),
        Some(&PropertyValue::Int(1))
    );
}

#[test]
fn stop_thread_abandons_without_rollback() {
    let mut director = Director::new(test_registry());
    let root = director.root_graph();
    let event = director.create_node("Test", "Event", root).unwrap();
    let value = director.create_node("Test", "Text", root).unwrap();
    let append = director.create_node("Test", "Append", root).unwrap();
    let wait = director.create_node("Test", "Wait Ticks", root).unwrap();

    director
        .node_mut(append)
        .unwrap()
        .properties_mut()
        .set_value("Tag", "a");
    director
        .node_mut(wait)
        .unwrap()
        .properties_mut()
        .set_value("Ticks", 10);
    director.connect_chain(event, "Out", append, "In");
    director.connect_chain(append, "Out", wait, "In");
    director.connect_value(append, "Target", value);

    let thread = director.trigger_event(event, "Out", None, true).unwrap();
    assert!(director.is_running(thread));

    assert!(director.stop_thread(thread));
    assert!(!director.is_running(thread));
    // The write made before cancellation stands.
    assert_eq!(text_of(&director, value), "a");

    // Further ticks do nothing.
    director.update(1.0, 1.0);
    assert_eq!(text_of(&director, value), "a");
}

// ─────────────────────────────────────────────────────────────────────────────
// Value links
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn single_connection_link_rejects_a_second() {
    let mut director = Director::new(test_registry());
    let root = director.root_graph();
    let append = director.create_node("Test", "Append", root).unwrap();
    let v1 = director.create_node("Test", "Text", root).unwrap();
    let v2 = director.create_node("Test", "Text", root).unwrap();

    // Make the Target link single-connection for this test.
    director
        .node_mut(append)
        .unwrap()
        .value_link_mut("Target")
        .unwrap()
        .allow_multiple = false;

    assert!(director.connect_value(append, "Target", v1));
    assert!(!director.connect_value(append, "Target", v2));
    assert_eq!(director.property_count(append, "Target"), 1);
    assert_eq!(
        director.node(append).unwrap().value_link("Target").unwrap().links,
        [v1]
    );
}

#[test]
fn type_check_rejects_incompatible_value_nodes() {
    let mut director = Director::new(test_registry());
    let root = director.root_graph();
    let append = director.create_node("Test", "Append", root).unwrap();
    let actor = director.create_node("Test", "Actor", root).unwrap();

    // Target defaults to Text; an Actor value is not compatible.
    assert!(!director.connect_value(append, "Target", actor));
    assert!(director.node(append).unwrap().value_link("Target").unwrap().links.is_empty());
    assert_eq!(director.property_count(append, "Target"), 1);
}

#[test]
fn unconnected_link_resolves_to_default_property() {
    let mut director = Director::new(test_registry());
    let root = director.root_graph();
    let append = director.create_node("Test", "Append", root).unwrap();
    director
        .node_mut(append)
        .unwrap()
        .properties_mut()
        .set_value("Target", "default");

    assert_eq!(director.property_count(append, "Target"), 1);
    assert_eq!(
        director.property(append, "Target", 0),
        Some(PropertyValue::Text("default".into()))
    );
}

#[test]
fn disconnect_all_is_idempotent() {
    let mut director = Director::new(test_registry());
    let root = director.root_graph();
    let append = director.create_node("Test", "Append", root).unwrap();
    let v1 = director.create_node("Test", "Text", root).unwrap();
    let v2 = director.create_node("Test", "Text", root).unwrap();

    assert!(director.connect_value(append, "Target", v1));
    assert!(director.connect_value(append, "Target", v2));
    assert_eq!(director.property_count(append, "Target"), 2);

    assert!(director.disconnect_value(append, "Target", None));
    assert_eq!(director.property_count(append, "Target"), 1);

    // Second disconnect-all: same state, no-op result.
    assert!(!director.disconnect_value(append, "Target", None));
    assert_eq!(director.property_count(append, "Target"), 1);

    // Disconnecting a node that is not connected is also a no-op.
    assert!(!director.disconnect_value(append, "Target", Some(v1)));
}

#[test]
fn value_link_redirect_resolves_to_terminal_link() {
    let mut director = Director::new(test_registry());
    let root = director.root_graph();
    let outer = director.create_node("Test", "Append", root).unwrap();
    let inner = director.create_node("Test", "Append", root).unwrap();
    let value = director.create_node("Test", "Text", root).unwrap();
    director
        .node_mut(value)
        .unwrap()
        .properties_mut()
        .set_value("Value", "shared");

    // outer.Target forwards to inner.Target, which owns the connection.
    assert!(director.redirect_value_link(outer, "Target", Some(LinkRef::new(inner, "Target"))));
    assert!(director.connect_value(inner, "Target", value));

    assert_eq!(
        director.property(outer, "Target", 0),
        Some(PropertyValue::Text("shared".into()))
    );
    assert_eq!(director.property_count(outer, "Target"), 1);
}

#[test]
fn value_link_redirect_cycles_are_refused() {
    let mut director = Director::new(test_registry());
    let root = director.root_graph();
    let a = director.create_node("Test", "Append", root).unwrap();
    let b = director.create_node("Test", "Append", root).unwrap();

    assert!(director.redirect_value_link(a, "Target", Some(LinkRef::new(b, "Target"))));
    // Closing the loop is refused and leaves b untouched.
    assert!(!director.redirect_value_link(b, "Target", Some(LinkRef::new(a, "Target"))));
    assert!(director.node(b).unwrap().value_link("Target").unwrap().redirect.is_none());

    // Self-redirect is a cycle too.
    assert!(!director.redirect_value_link(a, "Target", Some(LinkRef::new(a, "Target"))));
}

#[test]
fn enabled_flag_can_be_driven_by_a_value_node() {
    let mut director = Director::new(test_registry());
    let root = director.root_graph();
    let append = director.create_node("Test", "Append", root).unwrap();
    let flag = director.create_node("Test", "Flag", root).unwrap();

    // The hidden Enabled link exists on every node.
    assert!(director.node(append).unwrap().value_link("Enabled").is_some());
    assert!(director.is_node_enabled(append));

    director.node_mut(append).unwrap().set_enabled(false);
    assert!(!director.is_node_enabled(append));
    director.node_mut(append).unwrap().set_enabled(true);

    // A linked boolean value overrides the local flag.
    assert!(director.connect_value(append, "Enabled", flag));
    assert!(!director.is_node_enabled(append));

    director
        .node_mut(flag)
        .unwrap()
        .properties_mut()
        .set_value("Value", true);
    assert!(director.is_node_enabled(append));
}
