pub mod fp8;
pub mod threshold;
pub mod weight;

pub use fp8::{decode_fp8, encode_fp8};
pub use threshold::{digitize_sample, digitize_threshold, Breakpoints, ThresholdNoise};
pub use weight::{build_weight_table, WEIGHT_TABLE_DEPTH};
