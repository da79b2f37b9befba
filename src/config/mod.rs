pub mod config;
pub mod topology;

pub use config::{
  load_and_merge_configs, load_config_file, load_default_config, validate_config, AppConfig, CliOverrides,
  HardwareSection, OverflowPolicy, RegionOffsets, SoftwareSection,
};
pub use topology::HardwareTopology;
