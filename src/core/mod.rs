pub mod cascade;
pub mod graph;
pub mod ordering;
pub mod readiness;
pub mod task_service;

pub use cascade::{CascadeCoordinator, DeleteSummary};
pub use graph::DependencyGraph;
pub use ordering::OrderingEngine;
pub use readiness::ReadinessEvaluator;
pub use task_service::{ContainerSnapshot, TaskService};
