use clap::Subcommand;
use rusqlite::Connection;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

use crate::commands::task::parse_container_id;
use crate::core::{ContainerSnapshot, TaskService};
use crate::error::Result;
use crate::id::ContainerId;

const EXPORT_VERSION: &str = "1.0.0";

#[derive(Subcommand, Clone)]
pub enum DataCommand {
    /// Export a container with its tasks and dependencies to a JSON file
    Export {
        #[arg(long, value_parser = parse_container_id)]
        container: ContainerId,

        /// Output file path (default: arbor-export.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub version: String,
    pub exported_at: String,
    #[serde(flatten)]
    pub snapshot: ContainerSnapshot,
}

pub enum DataResult {
    Exported {
        path: String,
        tasks: usize,
        dependencies: usize,
    },
}

pub fn handle(conn: &Connection, cmd: DataCommand) -> Result<DataResult> {
    match cmd {
        DataCommand::Export { container, output } => export_data(conn, &container, output),
    }
}

pub(crate) fn export_data(
    conn: &Connection,
    container_id: &ContainerId,
    output: Option<PathBuf>,
) -> Result<DataResult> {
    let output_path = output.unwrap_or_else(|| PathBuf::from("arbor-export.json"));
    let snapshot = TaskService::new(conn).export_container(container_id)?;
    let tasks = snapshot.tasks.len();
    let dependencies = snapshot.dependencies.len();

    let export = ExportData {
        version: EXPORT_VERSION.to_string(),
        exported_at: chrono::Utc::now().to_rfc3339(),
        snapshot,
    };

    let json = serde_json::to_string_pretty(&export)?;
    fs::write(&output_path, json)?;

    Ok(DataResult::Exported {
        path: output_path.display().to_string(),
        tasks,
        dependencies,
    })
}
