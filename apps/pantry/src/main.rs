use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{HttpInventoryService, InventoryStore};
use shared::domain::InventoryItem;
use tracing_subscriber::EnvFilter;

mod config;
mod shell;

use config::{load_settings, Settings};

#[derive(Parser, Debug)]
#[command(name = "pantry", about = "Inspect and edit a remote pantry inventory")]
struct Cli {
    /// Base url of the inventory service, e.g. http://127.0.0.1:5000/api
    #[arg(long)]
    api_url: Option<String>,
    /// Config file to read instead of ./pantry.toml
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    List,
    Add {
        name: String,
        #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
        quantity: i64,
    },
    Remove {
        name: String,
    },
    Set {
        name: String,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    Increment {
        name: String,
    },
    Decrement {
        name: String,
    },
    Recipes,
    Recipe,
    Simulate {
        #[arg(long)]
        image_folder: Option<String>,
    },
    /// Interactive session
    Shell,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref(), cli.api_url.as_deref())?;
    init_tracing(&settings.log_level);

    let service = HttpInventoryService::with_timeout(
        &settings.api_url,
        Duration::from_secs(settings.request_timeout_secs),
    )
    .context("invalid inventory service configuration")?;
    let store = InventoryStore::new(Arc::new(service));

    run(store, cli.command, &settings).await
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(store: Arc<InventoryStore>, command: Command, settings: &Settings) -> Result<()> {
    match command {
        Command::Shell => shell::run_shell(store, settings).await,
        Command::Recipes => {
            let recipes = store.suggest_recipes().await?;
            if recipes.is_empty() {
                println!("No recipes available based on current inventory.");
            }
            for recipe in recipes {
                println!("{recipe}");
            }
            Ok(())
        }
        Command::Recipe => {
            let recipe = store.recipe().await?;
            println!("{}: {}", recipe.recipe_name, recipe.ingredients.join(", "));
            Ok(())
        }
        Command::Simulate { image_folder } => {
            let image_folder = image_folder.unwrap_or_else(|| settings.image_folder.clone());
            let detected = store.run_simulation(&image_folder).await?;
            if detected.is_empty() {
                println!("Simulation complete, no items detected.");
            } else {
                println!("Simulation complete! Detected items: {}", detected.join(", "));
            }
            println!("{}", render_inventory(&store.items().await));
            Ok(())
        }
        inventory_command => {
            store.load().await.context("failed to load inventory")?;
            apply(&store, inventory_command).await?;
            println!("{}", render_inventory(&store.items().await));
            Ok(())
        }
    }
}

/// Runs one inventory command against a freshly loaded store.
async fn apply(store: &InventoryStore, command: Command) -> Result<()> {
    match command {
        Command::Add { name, quantity } => {
            store.add(&name, quantity).await?;
        }
        Command::Remove { name } => store.remove(&name).await?,
        Command::Set { name, quantity } => {
            store.set_quantity(&name, quantity).await?;
        }
        Command::Increment { name } => {
            store.increment(&name).await?;
        }
        Command::Decrement { name } => {
            if store.decrement(&name).await?.is_none() {
                println!("{name} is already at the minimum quantity.");
            }
        }
        _ => {}
    }
    Ok(())
}

pub(crate) fn render_inventory(items: &[InventoryItem]) -> String {
    if items.is_empty() {
        return "Inventory is empty.".to_string();
    }
    items
        .iter()
        .map(|item| format!("{} - Quantity: {}", item.name, item.quantity))
        .collect::<Vec<_>>()
        .join("\n")
}
