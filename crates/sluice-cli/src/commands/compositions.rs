//! Composition listing.

use clap::Args;
use sluice_config::{
    CompositionFile, FACTORY_COMPOSITION_NAMES, composition_name_from_path, get_factory_composition,
    list_user_compositions, user_compositions_dir,
};

#[derive(Args)]
pub struct CompositionsArgs {
    /// Show only factory compositions
    #[arg(long)]
    factory: bool,

    /// Show only user compositions
    #[arg(long)]
    user: bool,
}

pub fn run(args: CompositionsArgs) -> anyhow::Result<()> {
    let show_factory = args.factory || !args.user;
    let show_user = args.user || !args.factory;

    if show_factory {
        println!("Factory Compositions");
        println!("====================");
        for id in FACTORY_COMPOSITION_NAMES {
            if let Some(file) = get_factory_composition(id) {
                println!("  {:20} - {}", id, describe(&file));
            }
        }
        println!();
    }

    if show_user {
        let dir = user_compositions_dir();
        println!("User Compositions ({})", dir.display());
        println!("=================");
        let files = list_user_compositions();
        if files.is_empty() {
            println!("  (none)");
        }
        for path in files {
            let name = composition_name_from_path(&path).unwrap_or_default();
            match CompositionFile::load(&path) {
                Ok(file) => println!("  {:20} - {}", name, describe(&file)),
                Err(e) => println!("  {:20} - (unreadable: {e})", name),
            }
        }
        println!();
    }

    println!("Use 'sluice check <composition>' to see a composition's schedule.");
    Ok(())
}

fn describe(file: &CompositionFile) -> String {
    match &file.description {
        Some(description) => format!("{}: {}", file.name, description),
        None => file.name.clone(),
    }
}
