//! Savestate management commands

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use retroplay_core::{PlayerConfig, SavestateStore};
use retroplay_shared::{CoreId, ResourceRef, SavestateKey, SavestateMeta};

use crate::open_store;

#[derive(Subcommand)]
pub enum SavesCommand {
    /// List savestates, most recent first
    List {
        /// Only savestates of this resource
        #[arg(long)]
        resource: Option<String>,

        /// Only savestates produced by this core
        #[arg(long)]
        core: Option<String>,
    },

    /// Print the metadata of a savestate as JSON
    Show {
        key: String,
    },

    /// Retire a savestate
    Delete {
        key: String,
    },
}

pub fn execute(command: SavesCommand, config: &PlayerConfig) -> Result<()> {
    let store = open_store(config)?;

    match command {
        SavesCommand::List { resource, core } => {
            let resource = resource.map(ResourceRef::new);
            let core = core.map(CoreId::new);
            let saves = store
                .list_for(resource.as_ref(), core.as_ref())
                .context("Failed to list savestates")?;

            if saves.is_empty() {
                println!("No savestates in {}", store.dir().display());
                return Ok(());
            }
            for meta in &saves {
                println!("{}", format_row(meta));
            }
            Ok(())
        }
        SavesCommand::Show { key } => {
            let key = parse_key(&key)?;
            let meta = store.meta(&key).with_context(|| format!("Failed to read {}", key))?;
            println!("{}", serde_json::to_string_pretty(&meta)?);
            Ok(())
        }
        SavesCommand::Delete { key } => {
            let key = parse_key(&key)?;
            store.meta(&key).with_context(|| format!("Failed to read {}", key))?;
            store.retire(&key).with_context(|| format!("Failed to delete {}", key))?;
            println!("Deleted {}", key);
            Ok(())
        }
    }
}

fn parse_key(raw: &str) -> Result<SavestateKey> {
    let key = SavestateKey::new(raw);
    if !key.is_safe() {
        bail!("Invalid savestate key: {:?}", raw);
    }
    Ok(key)
}

/// One line of `saves list` output
pub fn format_row(meta: &SavestateMeta) -> String {
    let created = meta.created.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S");
    let resource = meta
        .resource
        .as_ref()
        .map(ResourceRef::as_str)
        .unwrap_or("<standalone>");
    let label = if meta.label.is_empty() { "-" } else { meta.label.as_str() };
    format!(
        "{}  {}  {:<6}  {:<16}  {:<24}  {} bytes  {}",
        meta.key,
        created,
        format!("{:?}", meta.kind).to_lowercase(),
        meta.core_id,
        resource,
        meta.size,
        label
    )
}
