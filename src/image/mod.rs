pub mod builder;
pub mod instruction;
pub mod layout;
pub mod program;

pub use builder::{build_core_image, build_images, build_node_image, build_tile_image, ImageParams, ImageSet, MemoryImage};
pub use instruction::{Instruction, Opcode};
pub use layout::ImageLevel;
pub use program::Program;
