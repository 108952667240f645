use std::io::IsTerminal;

use owo_colors::{OwoColorize, Style};
use serde::Deserialize;

use arbor::commands::dep::TaskDependencies;
use arbor::commands::{ContainerCommand, DataCommand, DepCommand, TaskCommand};
use arbor::id::TaskId;
use arbor::types::{BlockingEntry, Container, DependencyEdge, Status, Task, TaskTree};

use crate::Command;

/// Status bucket used for symbols and colours
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Progress {
    Done,
    Started,
    NotStarted,
}

impl Progress {
    fn classify(status: &Status) -> Self {
        if status.is_done() {
            Self::Done
        } else if status.is_not_started() {
            Self::NotStarted
        } else {
            Self::Started
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadinessOutput {
    task_id: TaskId,
    can_start: bool,
    #[serde(default)]
    blocking: Vec<BlockingEntry>,
}

/// Color policy: --no-color > NO_COLOR env > TERM=dumb > !isatty > default (color)
fn should_use_color_for(no_color_flag: bool, is_tty: bool) -> bool {
    if no_color_flag {
        return false;
    }
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    if std::env::var("TERM").ok().as_deref() == Some("dumb") {
        return false;
    }
    is_tty
}

fn should_use_color(no_color_flag: bool) -> bool {
    should_use_color_for(no_color_flag, std::io::stdout().is_terminal())
}

fn should_use_color_stderr(no_color_flag: bool) -> bool {
    should_use_color_for(no_color_flag, std::io::stderr().is_terminal())
}

struct Colors {
    id: Style,
    done: Style,
    started: Style,
    pending: Style,
    blocked: Style,
    container: Style,
    tree_line: Style,
    error: Style,
}

impl Colors {
    fn new(use_color: bool) -> Self {
        if use_color {
            Self {
                id: Style::new().cyan().dimmed(),
                done: Style::new().green(),
                started: Style::new().blue(),
                pending: Style::new().yellow(),
                blocked: Style::new().red(),
                container: Style::new().bold(),
                tree_line: Style::new().dimmed(),
                error: Style::new().red().bold(),
            }
        } else {
            Self {
                id: Style::new(),
                done: Style::new(),
                started: Style::new(),
                pending: Style::new(),
                blocked: Style::new(),
                container: Style::new(),
                tree_line: Style::new(),
                error: Style::new(),
            }
        }
    }
}

/// Handles human-readable CLI output.
pub struct Printer {
    colors: Colors,
}

impl Printer {
    pub fn new(no_color_flag: bool) -> Self {
        Self {
            colors: Colors::new(should_use_color(no_color_flag)),
        }
    }

    pub fn new_for_stderr(no_color_flag: bool) -> Self {
        Self {
            colors: Colors::new(should_use_color_stderr(no_color_flag)),
        }
    }

    pub fn print_error(&self, message: &str) {
        eprintln!("{}", message.style(self.colors.error));
    }

    fn fmt_id(&self, id: &impl std::fmt::Display) -> String {
        format!("{}", id.to_string().style(self.colors.id))
    }

    fn status_symbol_style(&self, status: &Status) -> (&'static str, Style) {
        match Progress::classify(status) {
            Progress::Done => ("✓", self.colors.done),
            Progress::Started => ("◐", self.colors.started),
            Progress::NotStarted => ("○", self.colors.pending),
        }
    }

    fn fmt_status(&self, status: &Status) -> String {
        let (_, style) = self.status_symbol_style(status);
        format!("{}", status.as_str().style(style))
    }

    pub fn print(&self, command: &Command, output: &str) {
        match command {
            Command::Init => self.print_init(output),
            Command::Container(ContainerCommand::List) => self.print_container_list(output),
            Command::Container(_) => self.print_container(output),
            Command::Task(TaskCommand::Tree { .. }) => self.print_task_tree(output),
            Command::Task(TaskCommand::List(_)) | Command::Task(TaskCommand::Reorder(_)) => {
                self.print_task_list(output)
            }
            Command::Task(TaskCommand::Delete { .. }) => self.print_delete(output),
            Command::Task(TaskCommand::Promote { .. }) => {
                println!("Promoted to container:");
                self.print_container(output);
            }
            Command::Task(TaskCommand::Ready { .. }) => self.print_readiness(output),
            Command::Task(_) => self.print_task(output),
            Command::Dep(DepCommand::Add(_)) => self.print_dependency(output),
            Command::Dep(DepCommand::Remove { .. }) => println!("Dependency removed"),
            Command::Dep(DepCommand::List { .. }) => self.print_dependency_listing(output),
            Command::Data(DataCommand::Export { .. }) => self.print_data_export(output),
            // PRECONDITION: Completions handled in main() before print() is called
            Command::Completions { .. } => unreachable!("completions handled before print()"),
        }
    }

    fn print_init(&self, output: &str) {
        match serde_json::from_str::<serde_json::Value>(output)
            .ok()
            .and_then(|json| json.get("path").and_then(|v| v.as_str()).map(str::to_string))
        {
            Some(path) => println!("Initialized arbor database at {}", path),
            None => println!("Initialized arbor database"),
        }
    }

    fn print_container(&self, output: &str) {
        if let Ok(container) = serde_json::from_str::<Container>(output) {
            println!(
                "Container: {} {}",
                self.fmt_id(&container.id),
                container.name.style(self.colors.container)
            );
            println!("  Owner: {}", container.owner);
            println!("  Created: {}", container.created_at.to_rfc3339());
        } else {
            println!("{}", output);
        }
    }

    fn print_container_list(&self, output: &str) {
        if let Ok(containers) = serde_json::from_str::<Vec<Container>>(output) {
            if containers.is_empty() {
                println!("No containers found");
            }
            for c in containers {
                println!(
                    "{} - {} ({})",
                    self.fmt_id(&c.id),
                    c.name.style(self.colors.container),
                    c.owner
                );
            }
        } else {
            println!("{}", output);
        }
    }

    fn print_task(&self, output: &str) {
        if let Ok(task) = serde_json::from_str::<Task>(output) {
            println!(
                "Task: {} ({})",
                self.fmt_id(&task.id),
                self.fmt_status(&task.status)
            );
            println!("  Title: {}", task.title);
            println!("  Container: {}", self.fmt_id(&task.container_id));
            if let Some(ref parent) = task.parent_id {
                println!("  Parent: {}", self.fmt_id(parent));
            }
            println!(
                "  Position: {} (column {})",
                task.position, task.column_position
            );
        } else {
            println!("{}", output);
        }
    }

    fn print_task_list(&self, output: &str) {
        if let Ok(tasks) = serde_json::from_str::<Vec<Task>>(output) {
            if tasks.is_empty() {
                println!("No tasks found");
                return;
            }
            for t in &tasks {
                let (sym, style) = self.status_symbol_style(&t.status);
                println!(
                    "{:>3}. [{}] {} - {} ({})",
                    t.position,
                    sym.style(style),
                    self.fmt_id(&t.id),
                    t.title,
                    self.fmt_status(&t.status)
                );
            }
            let done = tasks.iter().filter(|t| t.status.is_done()).count();
            self.print_progress_summary(tasks.len(), done);
        } else {
            println!("{}", output);
        }
    }

    fn print_task_tree(&self, output: &str) {
        if let Ok(trees) = serde_json::from_str::<Vec<TaskTree>>(output) {
            if trees.is_empty() {
                println!("No tasks found");
                return;
            }
            let mut total = 0;
            let mut done = 0;
            for tree in &trees {
                let (t, d) = Self::count_tree(tree);
                total += t;
                done += d;
                self.print_tree_root(tree);
            }
            self.print_progress_summary(total, done);
        } else {
            println!("{}", output);
        }
    }

    /// (total, done) over a subtree
    fn count_tree(node: &TaskTree) -> (usize, usize) {
        let mut total = 1;
        let mut done = usize::from(node.task.status.is_done());
        for child in &node.children {
            let (t, d) = Self::count_tree(child);
            total += t;
            done += d;
        }
        (total, done)
    }

    fn tree_line(&self, node: &TaskTree) -> String {
        let (sym, style) = self.status_symbol_style(&node.task.status);
        format!(
            "[{}] {} - {}",
            sym.style(style),
            self.fmt_id(&node.task.id),
            node.task.title
        )
    }

    fn print_tree_root(&self, node: &TaskTree) {
        println!("{}", self.tree_line(node));
        self.print_tree_children(node, "");
    }

    fn print_tree_children(&self, node: &TaskTree, prefix: &str) {
        let count = node.children.len();
        for (i, child) in node.children.iter().enumerate() {
            let is_last = i + 1 == count;
            let connector = if is_last { "└─ " } else { "├─ " };
            let continuation = if is_last { "   " } else { "│  " };
            let line_prefix = format!("{}{}", prefix, connector);
            println!(
                "{}{}",
                line_prefix.style(self.colors.tree_line),
                self.tree_line(child)
            );
            self.print_tree_children(child, &format!("{}{}", prefix, continuation));
        }
    }

    fn print_progress_summary(&self, total: usize, done: usize) {
        println!();
        println!(
            "{}/{} done | {} open",
            done.style(self.colors.done),
            total,
            (total - done).style(self.colors.pending),
        );
    }

    fn print_delete(&self, output: &str) {
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(output) {
            let tasks = json.get("deletedTasks").and_then(|v| v.as_u64()).unwrap_or(0);
            let edges = json.get("deletedEdges").and_then(|v| v.as_u64()).unwrap_or(0);
            println!("Deleted {} task(s) and {} dependency edge(s)", tasks, edges);
        } else {
            println!("{}", output);
        }
    }

    fn print_readiness(&self, output: &str) {
        if let Ok(result) = serde_json::from_str::<ReadinessOutput>(output) {
            if result.can_start {
                println!(
                    "{} {} can start",
                    "✓".style(self.colors.done),
                    self.fmt_id(&result.task_id)
                );
                return;
            }
            println!(
                "{} {} cannot start",
                "⊘".style(self.colors.blocked),
                self.fmt_id(&result.task_id)
            );
            for entry in &result.blocking {
                println!(
                    "  waiting on {} - {} ({}, {})",
                    self.fmt_id(&entry.prerequisite_id),
                    entry.prerequisite_title,
                    self.fmt_status(&entry.prerequisite_status),
                    entry.kind.short()
                );
            }
        } else {
            println!("{}", output);
        }
    }

    fn fmt_edge(&self, edge: &DependencyEdge) -> String {
        format!(
            "{} {} -[{}]-> {}",
            self.fmt_id(&edge.id),
            self.fmt_id(&edge.from_id),
            edge.kind.short(),
            self.fmt_id(&edge.to_id)
        )
    }

    fn print_dependency(&self, output: &str) {
        if let Ok(edge) = serde_json::from_str::<DependencyEdge>(output) {
            println!("Dependency added: {}", self.fmt_edge(&edge));
        } else {
            println!("{}", output);
        }
    }

    fn print_dependency_listing(&self, output: &str) {
        if let Ok(listing) = serde_json::from_str::<TaskDependencies>(output) {
            println!("Task: {}", self.fmt_id(&listing.task_id));
            println!("  Depends on:");
            if listing.dependencies.is_empty() {
                println!("    (none)");
            }
            for edge in &listing.dependencies {
                println!("    {}", self.fmt_edge(edge));
            }
            println!("  Required by:");
            if listing.dependents.is_empty() {
                println!("    (none)");
            }
            for edge in &listing.dependents {
                println!("    {}", self.fmt_edge(edge));
            }
        } else {
            println!("{}", output);
        }
    }

    fn print_data_export(&self, output: &str) {
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(output) {
            if let (Some(path), Some(tasks), Some(dependencies)) = (
                json.get("path").and_then(|v| v.as_str()),
                json.get("tasks").and_then(|v| v.as_u64()),
                json.get("dependencies").and_then(|v| v.as_u64()),
            ) {
                println!(
                    "Exported {} tasks and {} dependencies to {}",
                    tasks, dependencies, path
                );
            } else {
                println!("{}", output);
            }
        } else {
            println!("{}", output);
        }
    }
}

impl Default for Printer {
    fn default() -> Self {
        Self::new(false)
    }
}
