//! Validate and compile a composition without running it.

use clap::Args;
use sluice_config::ValidationError;
use sluice_core::GraphSchedule;

use super::common::{load, source_label};

#[derive(Args)]
pub struct CheckArgs {
    /// Factory composition name, user composition name, or file path
    composition: String,
}

pub fn run(args: CheckArgs) -> anyhow::Result<()> {
    let loaded = load(&args.composition)?;

    if let Err(err) = loaded.file.validate(&loaded.registry) {
        let problems = match err {
            ValidationError::Multiple(errors) => errors,
            single => vec![single],
        };
        eprintln!("{} problem(s) in {}:", problems.len(), loaded.file.name);
        for problem in &problems {
            eprintln!("  - {problem}");
        }
        anyhow::bail!("composition '{}' is invalid", loaded.file.name);
    }

    let schedule = loaded.file.compile(&loaded.registry)?;

    println!("{}", loaded.file.name);
    println!("{}", "=".repeat(loaded.file.name.len()));
    if let Some(description) = &loaded.file.description {
        println!("{description}");
    }
    println!();
    println!("Source:  {}", source_label(&loaded.source));
    println!(
        "Nodes:   {}    Cables: {}",
        schedule.node_count(),
        schedule.cable_count()
    );
    println!();
    print_schedule(&schedule);
    println!();
    println!("OK");
    Ok(())
}

fn print_schedule(schedule: &GraphSchedule) {
    println!("Triggers:");
    for trigger in schedule.triggers() {
        let order: Vec<&str> = trigger
            .order()
            .iter()
            .map(|id| schedule.node(*id).name())
            .collect();
        println!("  {} ({})", trigger.identifier(), trigger.policy().name());
        if order.is_empty() {
            println!("    reaches no nodes");
        } else {
            println!("    order: {}", order.join(" -> "));
        }
    }

    let feedback: Vec<_> = schedule.cables().iter().filter(|c| c.is_feedback()).collect();
    if !feedback.is_empty() {
        println!();
        println!("Feedback cables:");
        for cable in feedback {
            println!(
                "  {} -> {}",
                schedule.port(cable.from()).identifier(),
                schedule.port(cable.to()).identifier()
            );
        }
    }

    if !schedule.published_inputs().is_empty() || !schedule.published_outputs().is_empty() {
        println!();
        println!("Published ports:");
        for input in schedule.published_inputs() {
            println!("  in  {}", input.name());
        }
        for output in schedule.published_outputs() {
            println!(
                "  out {} <- {}",
                output.name(),
                schedule.port(output.port()).identifier()
            );
        }
    }
}
