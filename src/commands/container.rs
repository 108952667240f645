use clap::Subcommand;
use rusqlite::Connection;

use crate::commands::task::parse_container_id;
use crate::core::TaskService;
use crate::error::Result;
use crate::id::ContainerId;
use crate::types::Container;

#[derive(Subcommand, Clone)]
pub enum ContainerCommand {
    /// Create a container owned by the acting user
    Create { name: String },
    List,
    Get {
        #[arg(value_parser = parse_container_id)]
        id: ContainerId,
    },
}

pub enum ContainerResult {
    One(Container),
    Many(Vec<Container>),
}

pub fn handle(conn: &Connection, cmd: ContainerCommand, owner: &str) -> Result<ContainerResult> {
    let svc = TaskService::new(conn);

    match cmd {
        ContainerCommand::Create { name } => {
            Ok(ContainerResult::One(svc.create_container(&name, owner)?))
        }
        ContainerCommand::List => Ok(ContainerResult::Many(svc.list_containers()?)),
        ContainerCommand::Get { id } => Ok(ContainerResult::One(svc.get_container(&id)?)),
    }
}
