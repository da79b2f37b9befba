pub mod class_range;
pub mod partitioner;

pub use class_range::ClassRanges;
pub use partitioner::{partition, CoreArrays, LeafSlot, PartitionAssignment, TruncatedClass};
