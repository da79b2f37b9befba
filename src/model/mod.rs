pub mod ensemble;
pub mod quantize;

pub use ensemble::{EnsembleModel, LeafRecord};
pub use quantize::{quantize_model, ClassTable, QuantizedLeaf, QuantizedModel};
