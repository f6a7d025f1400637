//! Output and display functions for CLI results

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use modwatch::graph::UnitSummary;
use modwatch::{Event, EventKind, Graph};

/// Print every unit with its edges
pub fn print_graph(graph: &Graph) {
    for unit in graph.units() {
        if let Some(description) = graph.describe(unit.id) {
            println!("{description}");
        }
    }
    println!("{}", format!("{} modules", graph.len()).dimmed());
}

pub fn print_graph_json(graph: &Graph) -> Result<()> {
    let units: Vec<UnitSummary> = graph
        .units()
        .filter_map(|u| graph.summary(u.id))
        .collect();
    println!("{}", serde_json::to_string_pretty(&units)?);
    Ok(())
}

fn kind_label(kind: EventKind) -> colored::ColoredString {
    let label = kind.to_string();
    match kind {
        EventKind::Created => label.green(),
        EventKind::Modified => label.yellow(),
        EventKind::Removed => label.red(),
    }
}

/// One event line, with optional affected tests
pub fn print_event(event: &Event, tests: Option<&[String]>) {
    println!("{}: {}", kind_label(event.kind), event.name);
    if let Some(warning) = &event.warning {
        println!("  {} {}", "warning:".yellow(), warning);
    }
    if let Some(tests) = tests {
        if tests.is_empty() {
            println!("  {}", "no affected tests".dimmed());
        } else {
            println!("  tests: {}", tests.join(" "));
        }
    }
}

#[derive(Serialize)]
struct EventLine<'a> {
    #[serde(flatten)]
    event: &'a Event,
    #[serde(skip_serializing_if = "Option::is_none")]
    tests: Option<&'a [String]>,
}

/// One event as a single JSON line
pub fn print_event_json(event: &Event, tests: Option<&[String]>) -> Result<()> {
    println!("{}", serde_json::to_string(&EventLine { event, tests })?);
    Ok(())
}
