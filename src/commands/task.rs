use clap::{Args, Subcommand};
use rusqlite::Connection;

use crate::core::{DeleteSummary, TaskService};
use crate::error::Result;
use crate::id::{ContainerId, TaskId};
use crate::types::{
    Container, CreateTaskInput, Grouping, ListTasksFilter, Readiness, Status, Task, TaskTree,
};

/// Parse TaskId from CLI string (requires prefix)
pub(crate) fn parse_task_id(s: &str) -> std::result::Result<TaskId, String> {
    s.parse().map_err(|e| format!("{e}"))
}

pub(crate) fn parse_container_id(s: &str) -> std::result::Result<ContainerId, String> {
    s.parse().map_err(|e| format!("{e}"))
}

fn parse_status(s: &str) -> std::result::Result<Status, String> {
    Status::new(s).map_err(|e| format!("{e}"))
}

#[derive(Subcommand, Clone)]
pub enum TaskCommand {
    /// Create a task in a container, optionally under a parent
    Create(CreateArgs),
    Get {
        #[arg(value_parser = parse_task_id)]
        id: TaskId,
    },
    List(ListArgs),
    /// Show a container as a nested tree
    Tree {
        #[arg(long, value_parser = parse_container_id)]
        container: ContainerId,
    },
    /// Change a task's status label
    Status(StatusArgs),
    Rename {
        #[arg(value_parser = parse_task_id)]
        id: TaskId,
        title: String,
    },
    /// Delete a task, its subtree and every dependency touching them
    Delete {
        #[arg(value_parser = parse_task_id)]
        id: TaskId,
    },
    /// Move a task under another parent (omit --parent for root level)
    Reparent {
        #[arg(value_parser = parse_task_id)]
        id: TaskId,
        #[arg(long, value_parser = parse_task_id)]
        parent: Option<TaskId>,
    },
    /// Move a task and its subtree into another container
    Move {
        #[arg(value_parser = parse_task_id)]
        id: TaskId,
        #[arg(long, value_parser = parse_container_id)]
        container: ContainerId,
    },
    /// Turn a task into a container; its children become roots there
    Promote {
        #[arg(value_parser = parse_task_id)]
        id: TaskId,
        /// Container name (default: the task title)
        #[arg(long)]
        name: Option<String>,
    },
    /// Drop a task onto a sibling
    Reorder(ReorderArgs),
    /// Report whether a task can start and what blocks it
    Ready {
        #[arg(value_parser = parse_task_id)]
        id: TaskId,
    },
}

#[derive(Args, Clone)]
pub struct CreateArgs {
    pub title: String,

    #[arg(long, value_parser = parse_container_id)]
    pub container: ContainerId,

    #[arg(long, value_parser = parse_task_id)]
    pub parent: Option<TaskId>,

    /// Initial status label (default: todo)
    #[arg(long, value_parser = parse_status)]
    pub status: Option<Status>,
}

#[derive(Args, Clone)]
pub struct ListArgs {
    #[arg(long, value_parser = parse_container_id)]
    pub container: ContainerId,

    #[arg(long, value_parser = parse_task_id, conflicts_with = "roots")]
    pub parent: Option<TaskId>,

    /// Only tasks without a parent
    #[arg(long)]
    pub roots: bool,

    #[arg(long, value_parser = parse_status)]
    pub status: Option<Status>,
}

#[derive(Args, Clone)]
pub struct StatusArgs {
    #[arg(value_parser = parse_task_id)]
    pub id: TaskId,

    #[arg(value_parser = parse_status)]
    pub status: Status,

    /// Refuse to start a task whose prerequisites still block
    #[arg(long)]
    pub enforce: bool,
}

#[derive(Args, Clone)]
pub struct ReorderArgs {
    #[arg(value_parser = parse_task_id)]
    pub id: TaskId,

    #[arg(long, value_parser = parse_task_id)]
    pub target: TaskId,

    /// Order within the target's status column and take its status
    #[arg(long)]
    pub kanban: bool,
}

pub enum TaskResult {
    One(Task),
    Many(Vec<Task>),
    Trees(Vec<TaskTree>),
    Deleted(DeleteSummary),
    Promoted(Container),
    Readiness { id: TaskId, readiness: Readiness },
}

pub fn handle(conn: &Connection, cmd: TaskCommand, owner: &str) -> Result<TaskResult> {
    let svc = TaskService::new(conn);

    match cmd {
        TaskCommand::Create(args) => {
            let input = CreateTaskInput {
                container_id: args.container,
                parent_id: args.parent,
                status: args.status,
                title: args.title,
            };
            Ok(TaskResult::One(svc.create_task(&input)?))
        }
        TaskCommand::Get { id } => Ok(TaskResult::One(svc.get(&id)?)),
        TaskCommand::List(args) => {
            svc.get_container(&args.container)?;
            let filter = ListTasksFilter {
                container_id: Some(args.container),
                parent_id: args.parent,
                roots_only: args.roots,
                status: args.status,
            };
            Ok(TaskResult::Many(svc.list(&filter)?))
        }
        TaskCommand::Tree { container } => Ok(TaskResult::Trees(svc.tree(&container)?)),
        TaskCommand::Status(args) => Ok(TaskResult::One(svc.set_status(
            &args.id,
            args.status,
            args.enforce,
        )?)),
        TaskCommand::Rename { id, title } => Ok(TaskResult::One(svc.rename(&id, &title)?)),
        TaskCommand::Delete { id } => Ok(TaskResult::Deleted(svc.delete_task(&id)?)),
        TaskCommand::Reparent { id, parent } => {
            Ok(TaskResult::One(svc.reparent_task(&id, parent.as_ref())?))
        }
        TaskCommand::Move { id, container } => {
            Ok(TaskResult::One(svc.move_subtree_to_container(&id, &container)?))
        }
        TaskCommand::Promote { id, name } => Ok(TaskResult::Promoted(svc.promote_to_container(
            &id,
            name.as_deref(),
            owner,
        )?)),
        TaskCommand::Reorder(args) => {
            let grouping = if args.kanban {
                Grouping::ParentAndStatus
            } else {
                Grouping::Parent
            };
            Ok(TaskResult::Many(svc.reorder_task(&args.id, &args.target, grouping)?))
        }
        TaskCommand::Ready { id } => {
            let readiness = svc.can_start_task(&id)?;
            Ok(TaskResult::Readiness { id, readiness })
        }
    }
}
