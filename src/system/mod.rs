pub mod assemble;
pub mod component;
pub mod engine;

pub use assemble::{assemble_system, SystemDescriptor};
pub use component::{ComponentDescriptor, ComponentKind, Direction, ParamValue, PortBinding};
pub use engine::{connectors, wires, Wire};
