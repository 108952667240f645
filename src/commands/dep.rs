use clap::{Args, Subcommand};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::commands::task::parse_task_id;
use crate::core::TaskService;
use crate::error::Result;
use crate::id::{DependencyId, TaskId};
use crate::types::{DependencyEdge, DependencyKind};

fn parse_dependency_id(s: &str) -> std::result::Result<DependencyId, String> {
    s.parse().map_err(|e| format!("{e}"))
}

fn parse_kind(s: &str) -> std::result::Result<DependencyKind, String> {
    s.parse().map_err(|e| format!("{e}"))
}

#[derive(Subcommand, Clone)]
pub enum DepCommand {
    /// Make FROM depend on TO
    Add(AddArgs),
    Remove {
        #[arg(value_parser = parse_dependency_id)]
        id: DependencyId,
    },
    /// Show a task's prerequisites and dependents
    List {
        #[arg(value_parser = parse_task_id)]
        task: TaskId,
    },
}

#[derive(Args, Clone)]
pub struct AddArgs {
    /// Dependent task
    #[arg(value_parser = parse_task_id)]
    pub from: TaskId,

    /// Prerequisite task
    #[arg(value_parser = parse_task_id)]
    pub to: TaskId,

    /// fs (finish-to-start), ss, ff or sf
    #[arg(long, default_value = "fs", value_parser = parse_kind)]
    pub kind: DependencyKind,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDependencies {
    pub task_id: TaskId,
    pub dependencies: Vec<DependencyEdge>,
    pub dependents: Vec<DependencyEdge>,
}

pub enum DepResult {
    One(DependencyEdge),
    Removed(DependencyId),
    Listing(TaskDependencies),
}

pub fn handle(conn: &Connection, cmd: DepCommand) -> Result<DepResult> {
    let svc = TaskService::new(conn);

    match cmd {
        DepCommand::Add(args) => Ok(DepResult::One(svc.add_dependency(
            &args.from,
            &args.to,
            args.kind,
        )?)),
        DepCommand::Remove { id } => {
            svc.remove_dependency(&id)?;
            Ok(DepResult::Removed(id))
        }
        DepCommand::List { task } => {
            let dependencies = svc.dependencies_of(&task)?;
            let dependents = svc.dependents_of(&task)?;
            Ok(DepResult::Listing(TaskDependencies {
                task_id: task,
                dependencies,
                dependents,
            }))
        }
    }
}
