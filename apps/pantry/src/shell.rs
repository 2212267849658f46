//! Interactive session: reads commands from stdin and renders store events.

use std::sync::Arc;

use anyhow::Result;
use client_core::{InventoryStore, StoreEvent};
use tokio::{
    io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::broadcast::error::RecvError,
    task::JoinHandle,
};
use tracing::debug;

use crate::{config::Settings, render_inventory};

pub const HELP: &str = "\
commands:
  list                 show the cached inventory
  reload               fetch the inventory from the service
  add NAME [QTY]       add an item (quantity defaults to 1)
  rm NAME              remove an item
  set NAME QTY         set an item's quantity
  + NAME / - NAME      increase / decrease an item's quantity by one
  name NAME            set the draft item's name
  qty QTY              set the draft item's quantity
  draft                show the draft item
  submit               add the draft item
  recipes              list suggested recipes
  recipe               show a recipe
  simulate [DIR]       run image detection and reload
  help                 show this help
  quit                 leave the shell";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    List,
    Reload,
    Add { name: String, quantity: i64 },
    Remove { name: String },
    Set { name: String, quantity: i64 },
    Increment { name: String },
    Decrement { name: String },
    DraftName { name: String },
    DraftQuantity { quantity: i64 },
    ShowDraft,
    Submit,
    Recipes,
    Recipe,
    Simulate { image_folder: Option<String> },
    Help,
    Quit,
}

/// Parses one input line. Blank lines yield `Ok(None)`.
///
/// Item names may contain spaces; for `add` a trailing integer is taken as
/// the quantity.
pub fn parse_command(line: &str) -> Result<Option<ShellCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "list" | "ls" => ShellCommand::List,
        "reload" => ShellCommand::Reload,
        "add" => {
            let (name, quantity) = match split_trailing_number(rest) {
                Some((name, quantity)) if !name.is_empty() => (name, quantity),
                _ => (rest, 1),
            };
            ShellCommand::Add {
                name: require_name(name, "add NAME [QTY]")?,
                quantity,
            }
        }
        "rm" | "remove" => ShellCommand::Remove {
            name: require_name(rest, "rm NAME")?,
        },
        "set" => {
            let (name, quantity) =
                split_trailing_number(rest).ok_or_else(|| "usage: set NAME QTY".to_string())?;
            ShellCommand::Set {
                name: require_name(name, "set NAME QTY")?,
                quantity,
            }
        }
        "+" | "inc" => ShellCommand::Increment {
            name: require_name(rest, "+ NAME")?,
        },
        "-" | "dec" => ShellCommand::Decrement {
            name: require_name(rest, "- NAME")?,
        },
        "name" => ShellCommand::DraftName {
            name: rest.to_string(),
        },
        "qty" => ShellCommand::DraftQuantity {
            quantity: rest
                .parse()
                .map_err(|_| format!("usage: qty QTY (got '{rest}')"))?,
        },
        "draft" => ShellCommand::ShowDraft,
        "submit" => ShellCommand::Submit,
        "recipes" => ShellCommand::Recipes,
        "recipe" => ShellCommand::Recipe,
        "simulate" => ShellCommand::Simulate {
            image_folder: (!rest.is_empty()).then(|| rest.to_string()),
        },
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" | "q" => ShellCommand::Quit,
        other => return Err(format!("unknown command '{other}', try 'help'")),
    };

    Ok(Some(command))
}

fn split_trailing_number(rest: &str) -> Option<(&str, i64)> {
    let (name, last) = rest.rsplit_once(char::is_whitespace)?;
    let quantity = last.parse().ok()?;
    Some((name.trim(), quantity))
}

fn require_name(name: &str, usage: &str) -> Result<String, String> {
    if name.is_empty() {
        return Err(format!("usage: {usage}"));
    }
    Ok(name.to_string())
}

pub fn describe_event(event: &StoreEvent) -> String {
    match event {
        StoreEvent::Loaded { items } => format!("loaded {} item(s)", items.len()),
        StoreEvent::ItemAdded { item } => {
            format!("added {} (quantity {})", item.name, item.quantity)
        }
        StoreEvent::ItemRemoved { name } => format!("removed {name}"),
        StoreEvent::QuantityUpdated { item } => {
            format!("{} quantity is now {}", item.name, item.quantity)
        }
        StoreEvent::SimulationCompleted { detected_items } if detected_items.is_empty() => {
            "simulation complete, no items detected".to_string()
        }
        StoreEvent::SimulationCompleted { detected_items } => format!(
            "simulation complete, detected items: {}",
            detected_items.join(", ")
        ),
        StoreEvent::OperationFailed { operation, error } => {
            format!("{operation} failed: {error}")
        }
    }
}

fn spawn_event_printer(store: &InventoryStore) -> JoinHandle<()> {
    let mut events = store.subscribe_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => println!("* {}", describe_event(&event)),
                Err(RecvError::Lagged(skipped)) => {
                    println!("* {skipped} event(s) skipped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

pub async fn run_shell(store: Arc<InventoryStore>, settings: &Settings) -> Result<()> {
    let printer = spawn_event_printer(&store);
    // Failures are already broadcast to the printer.
    let _ = store.load().await;

    println!("{HELP}");
    let mut lines = BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();

    loop {
        stdout.write_all(b"pantry> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(usage) => {
                println!("{usage}");
                continue;
            }
        };

        if command == ShellCommand::Quit {
            break;
        }
        execute(&store, settings, command).await;
    }

    printer.abort();
    Ok(())
}

async fn execute(store: &InventoryStore, settings: &Settings, command: ShellCommand) {
    let outcome = match command {
        ShellCommand::List => {
            println!("{}", render_inventory(&store.items().await));
            Ok(())
        }
        ShellCommand::Reload => store.load().await.map(drop),
        ShellCommand::Add { name, quantity } => store.add(&name, quantity).await.map(drop),
        ShellCommand::Remove { name } => store.remove(&name).await,
        ShellCommand::Set { name, quantity } => store.set_quantity(&name, quantity).await.map(drop),
        ShellCommand::Increment { name } => store.increment(&name).await.map(drop),
        ShellCommand::Decrement { name } => match store.decrement(&name).await {
            Ok(None) => {
                println!("{name} is already at the minimum quantity");
                Ok(())
            }
            other => other.map(drop),
        },
        ShellCommand::DraftName { name } => {
            store.set_draft_name(name).await;
            Ok(())
        }
        ShellCommand::DraftQuantity { quantity } => {
            store.set_draft_quantity(quantity).await;
            Ok(())
        }
        ShellCommand::ShowDraft => {
            let draft = store.draft().await;
            println!("draft: name='{}' quantity={}", draft.name, draft.quantity);
            Ok(())
        }
        ShellCommand::Submit => store.submit_draft().await.map(drop),
        ShellCommand::Recipes => store.suggest_recipes().await.map(|recipes| {
            if recipes.is_empty() {
                println!("No recipes available based on current inventory.");
            }
            for recipe in recipes {
                println!("  {recipe}");
            }
        }),
        ShellCommand::Recipe => store.recipe().await.map(|recipe| {
            println!("{}: {}", recipe.recipe_name, recipe.ingredients.join(", "));
        }),
        ShellCommand::Simulate { image_folder } => {
            let image_folder = image_folder.unwrap_or_else(|| settings.image_folder.clone());
            store.run_simulation(&image_folder).await.map(drop)
        }
        ShellCommand::Help => {
            println!("{HELP}");
            Ok(())
        }
        ShellCommand::Quit => Ok(()),
    };

    if let Err(err) = outcome {
        debug!(%err, "shell command failed");
    }
}

#[cfg(test)]
#[path = "tests/shell_tests.rs"]
mod tests;
