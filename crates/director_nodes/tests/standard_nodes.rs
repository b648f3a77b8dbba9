//! End-to-end scenarios over the standard node library.

use std::sync::Arc;

use director_nodes::register_default_nodes;
use director_runtime::{BinaryParser, BinaryWriter, Director, NodeId, NodeRegistry};
use director_types::PropertyValue;

fn registry() -> Arc<NodeRegistry> {
    let mut registry = NodeRegistry::new();
    register_default_nodes(&mut registry);
    Arc::new(registry)
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn new_director() -> Director {
    let mut director = Director::new(registry());
    director.add_library("director_nodes");
    director
}

fn bool_of(director: &Director, node: NodeId) -> bool {
    director
        .node(node)
        .unwrap()
        .properties()
        .value("Value")
        .and_then(|v| v.as_bool())
        .unwrap()
}

/// Remote Event wired to a Toggle input, with a Boolean value node on the
/// toggle's output link.
fn toggle_setup(input: &str) -> (Director, NodeId, NodeId) {
    let mut director = new_director();
    let root = director.root_graph();
    let event = director.create_node("General", "Remote Event", root).unwrap();
    let toggle = director.create_node("General", "Toggle", root).unwrap();
    let flag = director.create_node("General", "Boolean", root).unwrap();

    assert!(director.connect_chain(event, "Out", toggle, input));
    assert!(director.connect_value(toggle, "Value", flag));
    (director, event, flag)
}

// ─────────────────────────────────────────────────────────────────────────────
// Toggle
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn toggle_inputs_dispatch_by_index() {
    let (mut director, event, flag) = toggle_setup("Turn On");
    director.trigger_event(event, "Out", None, true);
    assert!(bool_of(&director, flag));

    let (mut director, event, flag) = toggle_setup("Turn Off");
    director
        .node_mut(flag)
        .unwrap()
        .properties_mut()
        .set_value("Value", true);
    director.trigger_event(event, "Out", None, true);
    assert!(!bool_of(&director, flag));

    let (mut director, event, flag) = toggle_setup("Toggle");
    director.trigger_event(event, "Out", None, true);
    assert!(bool_of(&director, flag));
    director.trigger_event(event, "Out", None, true);
    assert!(!bool_of(&director, flag));
}

// ─────────────────────────────────────────────────────────────────────────────
// Delay
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn delay_suspends_until_time_has_accumulated() {
    init_logging();
    let mut director = new_director();
    let root = director.root_graph();
    let event = director.create_node("General", "Remote Event", root).unwrap();
    let delay = director.create_node("General", "Delay", root).unwrap();
    let toggle = director.create_node("General", "Toggle", root).unwrap();
    let flag = director.create_node("General", "Boolean", root).unwrap();

    director
        .node_mut(delay)
        .unwrap()
        .properties_mut()
        .set_value("Delay", 1.0f32);
    director.connect_chain(event, "Out", delay, "In");
    director.connect_chain(delay, "Time Elapsed", toggle, "Turn On");
    director.connect_value(toggle, "Value", flag);

    let thread = director.trigger_event(event, "Out", None, true).unwrap();
    assert!(director.is_running(thread));
    assert!(!bool_of(&director, flag));

    director.update(0.4, 0.4);
    director.update(0.4, 0.4);
    assert!(director.is_running(thread));
    assert!(!bool_of(&director, flag));

    director.update(0.4, 0.4);
    assert!(!director.is_running(thread));
    assert!(bool_of(&director, flag));

    // The thread fired exactly once; further ticks change nothing.
    director.update(5.0, 5.0);
    assert!(bool_of(&director, flag));
    assert!(!director.has_running_threads());
}

// ─────────────────────────────────────────────────────────────────────────────
// Calculate / Compare
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn calculate_result_is_visible_downstream_in_the_same_tick() {
    let mut director = new_director();
    let root = director.root_graph();
    let event = director.create_node("General", "Remote Event", root).unwrap();
    let calc = director.create_node("General", "Calculate", root).unwrap();
    let compare = director.create_node("General", "Compare", root).unwrap();
    let result = director.create_node("General", "Double", root).unwrap();
    let on = director.create_node("General", "Toggle", root).unwrap();
    let off = director.create_node("General", "Toggle", root).unwrap();
    let flag = director.create_node("General", "Boolean", root).unwrap();

    {
        let props = director.node_mut(calc).unwrap().properties_mut();
        props.set_value("A", 3.0f64);
        props.set_value("B", 4.0f64);
        props.set_value("Operator", "+");
    }
    {
        let props = director.node_mut(compare).unwrap().properties_mut();
        props.set_value("B", 7.0f64);
        props.set_value("Operator", "==");
    }

    director.connect_chain(event, "Out", calc, "In");
    director.connect_chain(calc, "Out", compare, "In");
    director.connect_chain(compare, "True", on, "Turn On");
    director.connect_chain(compare, "False", off, "Turn Off");
    director.connect_value(calc, "Result", result);
    director.connect_value(compare, "A", result);
    director.connect_value(on, "Value", flag);
    director.connect_value(off, "Value", flag);

    director.trigger_event(event, "Out", None, true);

    // 3 + 4 landed in the shared value and the comparison took True.
    assert_eq!(
        director.node(result).unwrap().properties().value("Value"),
        Some(&PropertyValue::Double(7.0))
    );
    assert!(bool_of(&director, flag));
}

#[test]
fn compare_takes_the_false_branch() {
    let mut director = new_director();
    let root = director.root_graph();
    let event = director.create_node("General", "Remote Event", root).unwrap();
    let compare = director.create_node("General", "Compare", root).unwrap();
    let off = director.create_node("General", "Toggle", root).unwrap();
    let flag = director.create_node("General", "Boolean", root).unwrap();

    {
        let props = director.node_mut(compare).unwrap().properties_mut();
        props.set_value("A", 1.0f64);
        props.set_value("B", 2.0f64);
        props.set_value("Operator", ">");
    }
    director
        .node_mut(flag)
        .unwrap()
        .properties_mut()
        .set_value("Value", true);

    director.connect_chain(event, "Out", compare, "In");
    director.connect_chain(compare, "False", off, "Turn Off");
    director.connect_value(off, "Value", flag);

    director.trigger_event(event, "Out", None, true);
    assert!(!bool_of(&director, flag));
}

// ─────────────────────────────────────────────────────────────────────────────
// Call Remote Event
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn call_remote_event_fires_matching_events() {
    init_logging();
    let mut director = new_director();
    let root = director.root_graph();

    let start = director.create_node("General", "Remote Event", root).unwrap();
    let call = director.create_node("General", "Call Remote Event", root).unwrap();
    let target_a = director.create_node("General", "Remote Event", root).unwrap();
    let target_b = director.create_node("General", "Remote Event", root).unwrap();
    let other = director.create_node("General", "Remote Event", root).unwrap();

    for (node, name) in [(target_a, "doit"), (target_b, "doit"), (other, "ignore")] {
        director
            .node_mut(node)
            .unwrap()
            .properties_mut()
            .set_value("EventName", name);
    }
    director
        .node_mut(call)
        .unwrap()
        .properties_mut()
        .set_value("EventName", "doit");

    // Each fired event turns a toggle on.
    let mut flags = Vec::new();
    for target in [target_a, target_b, other] {
        let toggle = director.create_node("General", "Toggle", root).unwrap();
        let flag = director.create_node("General", "Boolean", root).unwrap();
        director.connect_chain(target, "Out", toggle, "Turn On");
        director.connect_value(toggle, "Value", flag);
        flags.push(flag);
    }

    director.connect_chain(start, "Out", call, "In");
    director.trigger_event(start, "Out", None, true);

    assert!(bool_of(&director, flags[0]));
    assert!(bool_of(&director, flags[1]));
    assert!(!bool_of(&director, flags[2]));
}

// ─────────────────────────────────────────────────────────────────────────────
// Nested graphs
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn control_flow_crosses_graph_boundaries() {
    let mut director = new_director();
    let root = director.root_graph();
    let sub = director.create_graph(root).unwrap();

    let event = director.create_node("General", "Remote Event", root).unwrap();
    let entry = director.create_node("Core", "Input Link", sub).unwrap();
    let exit = director.create_node("Core", "Output Link", sub).unwrap();
    let inner = director.create_node("General", "Toggle", sub).unwrap();
    let outer = director.create_node("General", "Toggle", root).unwrap();
    let inner_flag = director.create_node("General", "Boolean", sub).unwrap();
    let outer_flag = director.create_node("General", "Boolean", root).unwrap();

    director.node_mut(entry).unwrap().set_name("Go");
    director.node_mut(exit).unwrap().set_name("Done");

    // Boundary nodes are discoverable by name.
    assert_eq!(director.boundary_input(sub, "Go"), Some(entry));
    assert_eq!(director.boundary_output(sub, "Done"), Some(exit));

    director.connect_chain(event, "Out", entry, "In");
    director.connect_chain(entry, "Out", inner, "Turn On");
    director.connect_chain(inner, "Out", exit, "In");
    director.connect_chain(exit, "Out", outer, "Turn On");
    director.connect_value(inner, "Value", inner_flag);
    director.connect_value(outer, "Value", outer_flag);

    director.trigger_event(event, "Out", None, true);
    assert!(bool_of(&director, inner_flag));
    assert!(bool_of(&director, outer_flag));
}

#[test]
fn value_bridge_forwards_to_the_parent_value() {
    let mut director = new_director();
    let root = director.root_graph();
    let sub = director.create_graph(root).unwrap();

    let event = director.create_node("General", "Remote Event", root).unwrap();
    let entry = director.create_node("Core", "Input Link", sub).unwrap();
    let compare = director.create_node("General", "Compare", sub).unwrap();
    let bridge = director.create_node("Core", "Value Link", sub).unwrap();
    let parent_value = director.create_node("General", "Double", root).unwrap();
    let on = director.create_node("General", "Toggle", sub).unwrap();
    let flag = director.create_node("General", "Boolean", sub).unwrap();

    director.node_mut(bridge).unwrap().set_name("Threshold");
    assert_eq!(director.boundary_value(sub, "Threshold"), Some(bridge));

    director
        .node_mut(parent_value)
        .unwrap()
        .properties_mut()
        .set_value("Value", 5.0f64);
    {
        let props = director.node_mut(compare).unwrap().properties_mut();
        props.set_value("B", 5.0f64);
        props.set_value("Operator", "==");
    }

    director.connect_chain(event, "Out", entry, "In");
    director.connect_chain(entry, "Out", compare, "In");
    director.connect_chain(compare, "True", on, "Turn On");
    // Inside: the comparison reads through the bridge. Outside: the bridge
    // is fed by the parent's value node.
    director.connect_value(compare, "A", bridge);
    director.connect_value(bridge, "Value", parent_value);
    director.connect_value(on, "Value", flag);

    director.trigger_event(event, "Out", None, true);
    assert!(bool_of(&director, flag));
}

#[test]
fn reference_forwards_to_a_named_value_node() {
    let mut director = new_director();
    let root = director.root_graph();

    let event = director.create_node("General", "Remote Event", root).unwrap();
    let compare = director.create_node("General", "Compare", root).unwrap();
    let score = director.create_node("General", "Double", root).unwrap();
    let reference = director.create_node("Core", "Reference", root).unwrap();
    let on = director.create_node("General", "Toggle", root).unwrap();
    let flag = director.create_node("General", "Boolean", root).unwrap();

    director.node_mut(score).unwrap().set_name("Score");
    director
        .node_mut(score)
        .unwrap()
        .properties_mut()
        .set_value("Value", 10.0f64);
    director
        .node_mut(reference)
        .unwrap()
        .properties_mut()
        .set_value("Reference", "Score");
    {
        let props = director.node_mut(compare).unwrap().properties_mut();
        props.set_value("B", 10.0f64);
        props.set_value("Operator", "==");
    }

    director.connect_chain(event, "Out", compare, "In");
    director.connect_chain(compare, "True", on, "Turn On");
    director.connect_value(compare, "A", reference);
    director.connect_value(on, "Value", flag);

    director.trigger_event(event, "Out", None, true);
    assert!(bool_of(&director, flag));

    // Writing through the reference lands on the named node.
    let mut director2 = new_director();
    let root2 = director2.root_graph();
    let event2 = director2.create_node("General", "Remote Event", root2).unwrap();
    let set = director2.create_node("General", "Set Value", root2).unwrap();
    let score2 = director2.create_node("General", "Double", root2).unwrap();
    let reference2 = director2.create_node("Core", "Reference", root2).unwrap();

    director2.node_mut(score2).unwrap().set_name("Score");
    director2
        .node_mut(reference2)
        .unwrap()
        .properties_mut()
        .set_value("Reference", "Score");
    director2
        .node_mut(set)
        .unwrap()
        .properties_mut()
        .set_value("Src", "42");

    director2.connect_chain(event2, "Out", set, "In");
    director2.connect_value(set, "Dst", reference2);

    director2.trigger_event(event2, "Out", None, true);
    assert_eq!(
        director2
            .node(score2)
            .unwrap()
            .properties()
            .value("Value")
            .unwrap()
            .as_double(),
        Some(42.0)
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Unconnected value links
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn unconnected_output_link_resolves_to_its_default() {
    let mut director = new_director();
    let root = director.root_graph();
    let toggle = director.create_node("General", "Toggle", root).unwrap();

    assert_eq!(director.property_count(toggle, "Value"), 1);
    assert_eq!(
        director.property(toggle, "Value", 0),
        Some(PropertyValue::Boolean(false))
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// State snapshot
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn snapshot_restores_value_state() {
    let (mut director, event, flag) = toggle_setup("Turn On");
    director.trigger_event(event, "Out", None, true);
    assert!(bool_of(&director, flag));

    let snapshot = director.state_snapshot();

    director
        .node_mut(flag)
        .unwrap()
        .properties_mut()
        .set_value("Value", false);
    assert!(!bool_of(&director, flag));

    director.restore_state(&snapshot);
    assert!(bool_of(&director, flag));
}

#[test]
fn snapshot_round_trips_through_serde() {
    let (mut director, event, _flag) = toggle_setup("Turn On");
    director.trigger_event(event, "Out", None, true);

    let snapshot = director.state_snapshot();
    let json = serde_json::to_string(&snapshot).unwrap();
    let back: director_runtime::StateSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(back.values.len(), snapshot.values.len());
}

// ─────────────────────────────────────────────────────────────────────────────
// Persistence of a standard-library script
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn saved_script_runs_after_loading() {
    let (director, event, flag) = toggle_setup("Turn On");
    let event_uuid = director.node(event).unwrap().uuid();
    let flag_uuid = director.node(flag).unwrap().uuid();

    let mut buffer = Vec::new();
    BinaryWriter::new().save_to(&director, &mut buffer).unwrap();

    let mut loaded = new_director();
    let mut parser = BinaryParser::new();
    parser.parse_from(&mut loaded, &mut buffer.as_slice()).unwrap();
    assert!(parser.missing_node_types().is_empty());

    let event = loaded.find_node_by_uuid(event_uuid).unwrap();
    let flag = loaded.find_node_by_uuid(flag_uuid).unwrap();
    assert!(loaded.trigger_event(event, "Out", None, true).is_some());
    assert!(bool_of(&loaded, flag));
}
