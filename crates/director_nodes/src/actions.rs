//! Action nodes - the control-flow steps of the standard library

use std::sync::Arc;

use director_runtime::{Node, NodeBehavior, NodeRegistry, UpdateContext, UpdateOutcome};
use director_types::{NodeKind, NodeType, Property};
use tracing::{info, warn};

use crate::LIBRARY;

// ─────────────────────────────────────────────────────────────────────────────
// Log Message
// ─────────────────────────────────────────────────────────────────────────────

/// Writes its message to the log and continues.
pub struct LogMessageBehavior;

impl NodeBehavior for LogMessageBehavior {
    fn build(&self, node: &mut Node) {
        node.add_input("In");
        node.add_output("Out");
        node.add_property(Property::new("Message", ""));
        node.add_value_link(node.value_link_builder("Message"));
    }

    fn update(&self, ctx: &mut UpdateContext<'_>) -> UpdateOutcome {
        let message = ctx.get_string("Message");
        info!(node = %ctx.node(), message = %message, "log message");
        UpdateOutcome::out()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Delay
// ─────────────────────────────────────────────────────────────────────────────

/// Holds its thread for a configured number of simulated seconds, then
/// activates "Time Elapsed".
///
/// The first update arms the clock; steady-state updates accumulate the
/// tick delta until the delay has passed. The elapsed clock is transient
/// state and is never persisted.
pub struct DelayBehavior;

impl NodeBehavior for DelayBehavior {
    fn build(&self, node: &mut Node) {
        node.add_input("In");
        node.add_output("Time Elapsed");
        node.add_property(
            Property::new("Delay", 1.0f32).with_description("Seconds to wait before continuing."),
        );
        node.add_property(Property::transient("Elapsed", 0.0f32));
        node.add_value_link(node.value_link_builder("Delay"));
    }

    fn update(&self, ctx: &mut UpdateContext<'_>) -> UpdateOutcome {
        if ctx.first_update() {
            ctx.set_local("Elapsed", 0.0f32);
        }
        let elapsed = ctx
            .local("Elapsed")
            .and_then(|v| v.as_float())
            .unwrap_or(0.0)
            + ctx.sim_delta();
        ctx.set_local("Elapsed", elapsed);

        if elapsed >= ctx.get_float("Delay") {
            UpdateOutcome::finished(["Time Elapsed"])
        } else {
            UpdateOutcome::suspended()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Toggle
// ─────────────────────────────────────────────────────────────────────────────

/// Drives a boolean value through three inputs: Turn On, Turn Off, Toggle.
pub struct ToggleBehavior;

impl NodeBehavior for ToggleBehavior {
    fn build(&self, node: &mut Node) {
        node.add_input("Turn On");
        node.add_input("Turn Off");
        node.add_input("Toggle");
        node.add_output("Out");
        node.add_property(Property::new("Value", false));
        node.add_value_link(node.value_link_builder("Value").output().multiple());
    }

    fn update(&self, ctx: &mut UpdateContext<'_>) -> UpdateOutcome {
        let value = match ctx.input_index() {
            0 => true,
            1 => false,
            _ => !ctx.get_boolean("Value"),
        };
        ctx.set_property("Value", value);
        UpdateOutcome::out()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Set Value
// ─────────────────────────────────────────────────────────────────────────────

/// Copies the Src value into every value linked to Dst.
pub struct SetValueBehavior;

impl NodeBehavior for SetValueBehavior {
    fn build(&self, node: &mut Node) {
        node.add_input("In");
        node.add_output("Out");
        node.add_property(Property::new("Src", ""));
        node.add_property(Property::new("Dst", ""));
        node.add_value_link(node.value_link_builder("Src").untyped());
        node.add_value_link(node.value_link_builder("Dst").output().multiple().untyped());
    }

    fn update(&self, ctx: &mut UpdateContext<'_>) -> UpdateOutcome {
        if let Some(value) = ctx.property("Src", 0) {
            ctx.set_property("Dst", value);
        }
        UpdateOutcome::out()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Calculate
// ─────────────────────────────────────────────────────────────────────────────

/// Applies the configured operator to A and B and writes Result.
pub struct CalculateBehavior;

impl NodeBehavior for CalculateBehavior {
    fn build(&self, node: &mut Node) {
        node.add_input("In");
        node.add_output("Out");
        node.add_property(Property::new("A", 0.0f64));
        node.add_property(Property::new("B", 0.0f64));
        node.add_property(Property::new("Result", 0.0f64));
        node.add_property(
            Property::new("Operator", "+").with_description("One of + - * /."),
        );
        node.add_value_link(node.value_link_builder("A"));
        node.add_value_link(node.value_link_builder("B"));
        node.add_value_link(node.value_link_builder("Result").output().multiple());
    }

    fn update(&self, ctx: &mut UpdateContext<'_>) -> UpdateOutcome {
        let a = ctx.get_double("A");
        let b = ctx.get_double("B");
        let operator = ctx.get_string("Operator");
        let result = match operator.as_str() {
            "+" => a + b,
            "-" => a - b,
            "*" => a * b,
            "/" => {
                if b == 0.0 {
                    warn!(node = %ctx.node(), "division by zero");
                    0.0
                } else {
                    a / b
                }
            }
            other => {
                warn!(node = %ctx.node(), operator = other, "unknown operator");
                0.0
            }
        };
        ctx.set_property("Result", result);
        UpdateOutcome::out()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Compare
// ─────────────────────────────────────────────────────────────────────────────

/// Compares A against B and branches to True or False.
pub struct CompareBehavior;

impl NodeBehavior for CompareBehavior {
    fn build(&self, node: &mut Node) {
        node.add_input("In");
        node.add_output("True");
        node.add_output("False");
        node.add_property(Property::new("A", 0.0f64));
        node.add_property(Property::new("B", 0.0f64));
        node.add_property(
            Property::new("Operator", "==").with_description("One of == != < <= > >=."),
        );
        node.add_value_link(node.value_link_builder("A"));
        node.add_value_link(node.value_link_builder("B"));
    }

    fn update(&self, ctx: &mut UpdateContext<'_>) -> UpdateOutcome {
        let a = ctx.get_double("A");
        let b = ctx.get_double("B");
        let operator = ctx.get_string("Operator");
        let matched = match operator.as_str() {
            "==" => a == b,
            "!=" => a != b,
            "<" => a < b,
            "<=" => a <= b,
            ">" => a > b,
            ">=" => a >= b,
            other => {
                warn!(node = %ctx.node(), operator = other, "unknown operator, comparing equal");
                a == b
            }
        };
        UpdateOutcome::finished([if matched { "True" } else { "False" }])
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Call Remote Event
// ─────────────────────────────────────────────────────────────────────────────

/// Fires every matching Remote Event in the director. Each match spawns its
/// own execution thread; threads spawned mid-update queue up and run after
/// the calling thread finishes its pass.
pub struct CallRemoteEventBehavior;

impl NodeBehavior for CallRemoteEventBehavior {
    fn build(&self, node: &mut Node) {
        node.add_input("In");
        node.add_output("Out");
        node.add_property(
            Property::new("EventName", "")
                .with_description("Name of the Remote Events to fire."),
        );
        node.add_property(Property::new("Instigator", uuid::Uuid::nil()));
        node.add_value_link(node.value_link_builder("EventName"));
        node.add_value_link(node.value_link_builder("Instigator"));
    }

    fn update(&self, ctx: &mut UpdateContext<'_>) -> UpdateOutcome {
        let name = ctx.get_string("EventName");
        if name.is_empty() {
            warn!(node = %ctx.node(), "call remote event without an event name");
            return UpdateOutcome::out();
        }
        let instigator = Some(ctx.get_actor("Instigator")).filter(|id| !id.is_nil());

        for event in ctx.nodes_of_type("General", "Remote Event") {
            let matches = ctx
                .node_property(event, "EventName")
                .and_then(|v| v.as_text().map(str::to_string))
                .is_some_and(|n| n == name);
            if matches {
                ctx.trigger(event, "Out", instigator, true);
            }
        }
        UpdateOutcome::out()
    }
}

pub(crate) fn register(registry: &mut NodeRegistry) {
    registry.register(
        LIBRARY,
        NodeType::new("Log Message", "General", NodeKind::Action)
            .with_description("Write a message to the log."),
        Arc::new(LogMessageBehavior),
    );
    registry.register(
        LIBRARY,
        NodeType::new("Delay", "General", NodeKind::Action)
            .with_description("Wait a number of seconds before continuing."),
        Arc::new(DelayBehavior),
    );
    registry.register(
        LIBRARY,
        NodeType::new("Toggle", "General", NodeKind::Action)
            .with_description("Turn a boolean value on, off, or toggle it."),
        Arc::new(ToggleBehavior),
    );
    registry.register(
        LIBRARY,
        NodeType::new("Set Value", "General", NodeKind::Action)
            .with_description("Copy one value into another."),
        Arc::new(SetValueBehavior),
    );
    registry.register(
        LIBRARY,
        NodeType::new("Calculate", "General", NodeKind::Action)
            .with_description("Apply an arithmetic operator to two values."),
        Arc::new(CalculateBehavior),
    );
    registry.register(
        LIBRARY,
        NodeType::new("Compare", "General", NodeKind::Action)
            .with_description("Branch on a comparison of two values."),
        Arc::new(CompareBehavior),
    );
    registry.register(
        LIBRARY,
        NodeType::new("Call Remote Event", "General", NodeKind::Action)
            .with_description("Fire every Remote Event with a matching name."),
        Arc::new(CallRemoteEventBehavior),
    );
}
