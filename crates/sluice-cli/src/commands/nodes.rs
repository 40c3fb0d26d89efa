//! Node class listing and port details.

#![allow(clippy::print_literal)] // Table headers use literal strings intentionally

use clap::Args;
use sluice_config::{NodeCategory, NodeRegistry};
use sluice_core::{Direction, EventBlocking, PortDecl};

use super::common::load;

#[derive(Args)]
pub struct NodesArgs {
    /// Show the ports of a specific class
    #[arg(value_name = "CLASS")]
    class: Option<String>,

    /// Only list classes in this category (trigger, logic, math, flow, composition)
    #[arg(short, long)]
    category: Option<String>,

    /// Include the subcompositions this composition registers
    #[arg(long, value_name = "COMPOSITION")]
    composition: Option<String>,
}

pub fn run(args: NodesArgs) -> anyhow::Result<()> {
    let registry = match &args.composition {
        Some(name) => load(name)?.registry,
        None => NodeRegistry::new(),
    };

    if let Some(class) = &args.class {
        return show_class(&registry, class);
    }

    let categories: Vec<NodeCategory> = match &args.category {
        Some(name) => vec![NodeCategory::from_name(name).ok_or_else(|| {
            anyhow::anyhow!(
                "Unknown category: {}. Expected one of: {}",
                name,
                NodeCategory::ALL.map(|c| c.name().to_lowercase()).join(", ")
            )
        })?],
        None => NodeCategory::ALL.to_vec(),
    };

    println!("Available Node Classes");
    println!("======================");
    for category in categories {
        let classes = registry.classes_in_category(category);
        if classes.is_empty() {
            continue;
        }
        println!();
        println!("{} - {}", category.name(), category.description());
        for descriptor in classes {
            println!("  {:20} - {}", descriptor.id, descriptor.description);
        }
    }
    println!();
    println!("Use 'sluice nodes <class>' for port details.");
    Ok(())
}

fn show_class(registry: &NodeRegistry, class: &str) -> anyhow::Result<()> {
    let descriptor = registry
        .get(class)
        .ok_or_else(|| anyhow::anyhow!("Unknown node class: {}", class))?;
    let ports = registry.ports(class).unwrap_or_default();

    println!("{} ({})", descriptor.id, descriptor.name);
    println!("{}", "=".repeat(descriptor.id.len() + descriptor.name.len() + 3));
    println!();
    println!("{}", descriptor.description);
    if descriptor.stateful {
        println!("Keeps state between events.");
    }
    println!();
    println!(
        "  {:16}  {:8}  {:6}  {:8}  {}",
        "Port", "Kind", "Data", "Blocking", "Default"
    );
    println!(
        "  {:16}  {:8}  {:6}  {:8}  {}",
        "----", "----", "----", "--------", "-------"
    );
    for port in &ports {
        println!(
            "  {:16}  {:8}  {:6}  {:8}  {}",
            port.name,
            port_kind(port),
            if port.data { "yes" } else { "no" },
            blocking_name(port),
            port.default
        );
    }
    Ok(())
}

fn port_kind(port: &PortDecl) -> String {
    match (port.direction, port.trigger) {
        (Direction::Input, _) => "input".to_string(),
        (Direction::Output, None) => "output".to_string(),
        (Direction::Output, Some(policy)) => format!("trigger/{}", policy.name()),
    }
}

fn blocking_name(port: &PortDecl) -> &'static str {
    if port.direction == Direction::Output {
        return "";
    }
    match port.blocking {
        EventBlocking::None => "none",
        EventBlocking::Wall => "wall",
        EventBlocking::Door => "door",
    }
}
