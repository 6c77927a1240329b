//! Quill CLI - local-first notes from the command line
//!
//! Every note command works against the local index; `sync` and `watch`
//! talk to the remote.

mod cli;
mod commands;
mod error;

#[cfg(test)]
mod tests;

use clap::{CommandFactory, Parser};

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::common::{load_config, open_coordinator, resolve_config_path, resolve_db_path};
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::edit::{patch_from_args, run_edit};
use crate::commands::list::{run_list, ListArgs};
use crate::commands::retry::run_retry;
use crate::commands::search::run_search;
use crate::commands::show::run_show;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::commands::tags::run_tags;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        if matches!(&error, CliError::Core(core) if core.is_local_storage()) {
            eprintln!("Check the database location with `quill config show`.");
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("quill=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config_path)?;

    let command = match cli.command {
        Some(Commands::Config { command }) => {
            return run_config(command, &config_path, cli.db_path);
        }
        other => other,
    };

    if command.is_none() && cli.note.is_empty() {
        Cli::command().print_help().map_err(CliError::Io)?;
        println!();
        return Ok(());
    }

    let config = load_config(&config_path)?;
    let db_path = resolve_db_path(cli.db_path, &config)?;
    let coordinator = open_coordinator(&config, &db_path)?;

    match command {
        Some(Commands::Add {
            title,
            body,
            tags,
            collection,
        }) => run_add(&coordinator, &title, body, tags, collection)?,
        Some(Commands::List {
            limit,
            tag,
            collection,
            status,
            sort,
            json,
        }) => {
            let args = ListArgs {
                limit,
                tag,
                collection,
                status,
                sort,
            };
            run_list(&coordinator, args, json)?;
        }
        Some(Commands::Search { query, limit, json }) => {
            run_search(&coordinator, &query, limit, json)?;
        }
        Some(Commands::Show { id, json }) => run_show(&coordinator, &id, json)?,
        Some(Commands::Edit {
            id,
            title,
            body,
            tags,
            collection,
            no_collection,
        }) => {
            let patch = patch_from_args(title, body, tags, collection, no_collection);
            run_edit(&coordinator, &id, patch)?;
        }
        Some(Commands::Delete { id }) => run_delete(&coordinator, &id)?,
        Some(Commands::Tags { json }) => run_tags(&coordinator, json)?,
        Some(Commands::Sync { json }) => run_sync(&coordinator, json).await?,
        Some(Commands::Status { json }) => run_status(&coordinator, json).await?,
        Some(Commands::Retry { id }) => run_retry(&coordinator, &id)?,
        Some(Commands::Watch) => run_watch(&coordinator).await?,
        Some(Commands::Config { command }) => run_config(command, &config_path, Some(db_path))?,
        // Quick capture mode: quill "my thought"
        None => run_add(&coordinator, &cli.note, None, Vec::new(), None)?,
    }

    Ok(())
}
