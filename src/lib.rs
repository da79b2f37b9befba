pub mod codec;
pub mod config;
pub mod error;
pub mod image;
pub mod model;
pub mod partition;
pub mod pipeline;
pub mod system;
pub mod topology;
pub mod utils;

pub use error::{CompileError, Result};
pub use pipeline::{compile, CompiledSystem};
