pub mod container;
pub mod data;
pub mod dep;
pub mod task;

pub use container::{ContainerCommand, ContainerResult};
pub use data::{DataCommand, DataResult};
pub use dep::{DepCommand, DepResult};
pub use task::{TaskCommand, TaskResult};
