use std::io;
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing::debug;

use arbor::commands::{
    container, data, dep, task, ContainerCommand, ContainerResult, DataCommand, DataResult,
    DepCommand, DepResult, TaskCommand, TaskResult,
};
use arbor::config::{Config, Overrides};
use arbor::db;
use arbor::error;
use arbor::logging::{self, LogLevel};

mod output;

use output::Printer;

#[derive(Parser)]
#[command(name = "arbor")]
#[command(version)]
#[command(
    about = "Arbor - hierarchical tasks with typed dependencies",
    long_about = r#"
Arbor - a task tree engine.

Features:
  • Containers holding trees of tasks with free-form status labels
  • Typed dependencies (fs, ss, ff, sf) with cycle rejection
  • Drag-and-drop ordering for tree and kanban views
  • Atomic cascades: delete, reparent, move, promote

Environment:
  ARBOR_DB_PATH  Override database location
  ARBOR_OWNER    Acting user for new containers
  ARBOR_LOG      Log level (error, warn, info, debug, trace)
  NO_COLOR       Disable colored output
"#
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output in JSON format (for programmatic use)
    #[arg(long, global = true)]
    json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Override database path (default: CWD/.arbor/tasks.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log verbosity on stderr
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,

    /// Acting user recorded as container owner
    #[arg(long, global = true)]
    owner: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize database
    Init,

    /// Container management
    #[command(subcommand)]
    Container(ContainerCommand),

    /// Task management (CRUD, structure, ordering, readiness)
    #[command(subcommand)]
    Task(TaskCommand),

    /// Dependency management
    #[command(subcommand)]
    Dep(DepCommand),

    /// Data export
    #[command(subcommand)]
    Data(DataCommand),

    /// Generate shell completions
    #[command(
        about = "Generate shell completions",
        long_about = r#"
Generate shell completions for the arbor CLI.

Examples:
  arbor completions bash > ~/.local/share/bash-completion/completions/arbor
  arbor completions zsh > ~/.zfunc/_arbor
  arbor completions fish > ~/.config/fish/completions/arbor.fish
"#
    )]
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell, elvish)
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();

    // PRECONDITION: Completions bypass normal output flow - raw shell script to stdout
    if let Command::Completions { shell } = &cli.command {
        generate(*shell, &mut Cli::command(), "arbor", &mut io::stdout());
        return;
    }

    let config = Config::from_env(Overrides {
        db: cli.db.clone(),
        json: cli.json,
        no_color: cli.no_color,
        owner: cli.owner.clone(),
        log_level: cli.log_level,
    });
    logging::init_logging(config.log_level);
    debug!(db = %config.db_path.display(), owner = %config.owner, "resolved config");

    match run(&cli.command, &config) {
        Ok(output) => {
            if config.json {
                println!("{}", output);
            } else {
                Printer::new(config.no_color).print(&cli.command, &output);
            }
        }
        Err(e) => {
            if config.json {
                let err = serde_json::json!({ "error": e.to_string() });
                eprintln!("{}", err);
            } else {
                Printer::new_for_stderr(config.no_color).print_error(&format!("Error: {}", e));
            }
            std::process::exit(1);
        }
    }
}

fn run(command: &Command, config: &Config) -> error::Result<String> {
    match command {
        Command::Init => {
            db::open_db(&config.db_path)?;
            Ok(serde_json::json!({ "initialized": true, "path": config.db_path }).to_string())
        }
        Command::Container(cmd) => {
            let conn = db::open_db(&config.db_path)?;
            match container::handle(&conn, cmd.clone(), &config.owner)? {
                ContainerResult::One(c) => Ok(serde_json::to_string_pretty(&c)?),
                ContainerResult::Many(cs) => Ok(serde_json::to_string_pretty(&cs)?),
            }
        }
        Command::Task(cmd) => {
            let conn = db::open_db(&config.db_path)?;
            match task::handle(&conn, cmd.clone(), &config.owner)? {
                TaskResult::One(t) => Ok(serde_json::to_string_pretty(&t)?),
                TaskResult::Many(ts) => Ok(serde_json::to_string_pretty(&ts)?),
                TaskResult::Trees(trees) => Ok(serde_json::to_string_pretty(&trees)?),
                TaskResult::Deleted(summary) => Ok(serde_json::to_string_pretty(&summary)?),
                TaskResult::Promoted(c) => Ok(serde_json::to_string_pretty(&c)?),
                TaskResult::Readiness { id, readiness } => {
                    Ok(serde_json::to_string_pretty(&serde_json::json!({
                        "taskId": id,
                        "canStart": readiness.can_start,
                        "blocking": readiness.blocking,
                    }))?)
                }
            }
        }
        Command::Dep(cmd) => {
            let conn = db::open_db(&config.db_path)?;
            match dep::handle(&conn, cmd.clone())? {
                DepResult::One(edge) => Ok(serde_json::to_string_pretty(&edge)?),
                DepResult::Removed(id) => {
                    Ok(serde_json::json!({ "removed": true, "id": id }).to_string())
                }
                DepResult::Listing(listing) => Ok(serde_json::to_string_pretty(&listing)?),
            }
        }
        Command::Data(cmd) => {
            let conn = db::open_db(&config.db_path)?;
            match data::handle(&conn, cmd.clone())? {
                DataResult::Exported {
                    path,
                    tasks,
                    dependencies,
                } => Ok(serde_json::to_string_pretty(&serde_json::json!({
                    "exported": true,
                    "path": path,
                    "tasks": tasks,
                    "dependencies": dependencies
                }))?),
            }
        }
        // PRECONDITION: Completions handled in main() before run() is called
        Command::Completions { .. } => unreachable!("completions handled before run()"),
    }
}
