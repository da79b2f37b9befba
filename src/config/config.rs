use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::topology::HardwareTopology;
use crate::error::{CompileError, Result};

/// Router tree and CAM array shape
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeSection {
  pub num_port: usize,
  pub num_level: usize,
  #[serde(default)]
  pub num_tile: Option<usize>,
  pub num_core: usize,
  pub num_row: usize,
  pub num_col: usize,
}

/// Parameters shared by every component
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DefaultSection {
  #[serde(default = "default_freq")]
  pub freq: String,
  /// Latency of the links inside a core
  #[serde(default = "default_latency")]
  pub link_latency_ns: u32,
}

fn default_freq() -> String {
  "1GHz".to_string()
}

fn default_latency() -> u32 {
  1
}

impl Default for DefaultSection {
  fn default() -> Self {
    Self {
      freq: default_freq(),
      link_latency_ns: default_latency(),
    }
  }
}

/// Processing latency of a simple pipelined block (router, MPE, MMR)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LatencySection {
  #[serde(default = "default_latency")]
  pub latency: u32,
}

impl Default for LatencySection {
  fn default() -> Self {
    Self {
      latency: default_latency(),
    }
  }
}

/// Analog CAM array: search latency, conductance quantization and the
/// electrical constants handed to the device model as-is.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AcamSection {
  #[serde(default = "default_acam_latency")]
  pub latency: u32,
  pub g_bit: u32,
  pub g_min: f64,
  pub g_max: f64,
  #[serde(default)]
  pub electrical: BTreeMap<String, f64>,
}

fn default_acam_latency() -> u32 {
  4
}

impl AcamSection {
  /// Conductance levels `g_min + i * (g_max - g_min) / 2^g_bit`
  pub fn conductance_levels(&self) -> Vec<f64> {
    let levels = 1usize << self.g_bit;
    let delta = (self.g_max - self.g_min) / levels as f64;
    (0..levels).map(|i| delta * i as f64 + self.g_min).collect()
  }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HardwareSection {
  pub node: NodeSection,
  #[serde(default)]
  pub default: DefaultSection,
  #[serde(default)]
  pub router: LatencySection,
  pub acam: AcamSection,
  #[serde(default)]
  pub mpe: LatencySection,
  #[serde(default)]
  pub mmr: LatencySection,
}

impl HardwareSection {
  pub fn topology(&self) -> Result<HardwareTopology> {
    HardwareTopology::new(
      self.node.num_port,
      self.node.num_level,
      self.node.num_tile,
      self.node.num_core,
      self.node.num_row,
      self.node.num_col,
    )
  }
}

/// What to do with leaves that do not fit in their class's cores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
  /// Keep the leading leaves, report the rest as dropped
  #[default]
  Truncate,
  /// Fail the compile
  Reject,
}

/// Byte addresses of the relocatable regions. The control programs reach
/// these through pointer fields in the scalar block, so they may move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RegionOffsets {
  pub node_sample: usize,
  pub partial_shap: usize,
  pub shap: usize,
  pub tile_sample: usize,
  pub tile_base: usize,
  pub tile_result: usize,
  pub core_sample: usize,
  pub cam: usize,
  pub core_base: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SoftwareSection {
  pub num_test: usize,
  #[serde(default)]
  pub num_test_offset: usize,
  pub num_base: usize,
  #[serde(default = "default_value_factor")]
  pub value_factor: f64,
  #[serde(default)]
  pub noise_p: f64,
  #[serde(default)]
  pub seed: u64,
  /// Decimal places thresholds are rounded to; negative disables rounding
  #[serde(default = "default_threshold_decimals")]
  pub threshold_decimals: i32,
  /// First global core of each class; the total core count is appended as sentinel
  pub begin_core: Vec<usize>,
  #[serde(default)]
  pub verbose: u32,
  #[serde(default)]
  pub mask: u32,
  #[serde(default)]
  pub log_dir: String,
  #[serde(default)]
  pub overflow_policy: OverflowPolicy,
  pub offsets: RegionOffsets,
}

fn default_value_factor() -> f64 {
  1.0
}

fn default_threshold_decimals() -> i32 {
  3
}

impl SoftwareSection {
  pub fn rounding_decimals(&self) -> Option<i32> {
    (self.threshold_decimals >= 0).then_some(self.threshold_decimals)
  }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
  pub hardware: HardwareSection,
  pub software: SoftwareSection,
}

/// Load the default description shipped next to this module
pub fn load_default_config() -> Result<AppConfig> {
  let table = load_default_table()?;
  Ok(toml::Value::Table(table).try_into()?)
}

fn load_default_table() -> Result<toml::Table> {
  let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
  let config_path = manifest_dir.join("src").join("config").join("default.toml");
  load_table(&config_path)
}

fn load_table(path: &Path) -> Result<toml::Table> {
  let content = fs::read_to_string(path).map_err(|e| {
    CompileError::config(format!("cannot read config file {:?}: {}", path, e))
  })?;
  Ok(toml::from_str::<toml::Table>(&content)?)
}

/// Load a complete description from one file
pub fn load_config_file(path: &Path) -> Result<AppConfig> {
  Ok(toml::Value::Table(load_table(path)?).try_into()?)
}

/// Merge two descriptions key by key; the override wins, nested tables merge.
pub fn merge_config(mut base: toml::Table, override_config: toml::Table) -> toml::Table {
  for (key, value) in override_config {
    let merged = match (base.remove(&key), value) {
      (Some(toml::Value::Table(base_table)), toml::Value::Table(override_table)) => {
        toml::Value::Table(merge_config(base_table, override_table))
      },
      (_, value) => value,
    };
    base.insert(key, merged);
  }
  base
}

/// Command line values that take precedence over any file
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
  pub seed: Option<u64>,
  pub noise_p: Option<f64>,
  pub log_dir: Option<String>,
}

pub fn apply_cli_overrides(config: &mut AppConfig, overrides: &CliOverrides) {
  if let Some(seed) = overrides.seed {
    config.software.seed = seed;
  }
  if let Some(noise_p) = overrides.noise_p {
    config.software.noise_p = noise_p;
  }
  if let Some(log_dir) = &overrides.log_dir {
    config.software.log_dir = log_dir.clone();
  }
}

/// Checks that need only the description itself; region fits are checked
/// once the model width is known.
pub fn validate_config(config: &AppConfig) -> Result<()> {
  let topology = config.hardware.topology()?;
  validate_begin_core(&config.software.begin_core, topology.total_cores())?;

  let sw = &config.software;
  if !(0.0..=0.5).contains(&sw.noise_p) {
    return Err(CompileError::config(format!(
      "noise_p {} outside [0, 0.5]",
      sw.noise_p
    )));
  }
  if !sw.value_factor.is_finite() {
    return Err(CompileError::config("value_factor must be finite"));
  }

  let acam = &config.hardware.acam;
  if acam.g_bit == 0 || acam.g_bit > 16 {
    return Err(CompileError::config(format!("g_bit {} outside [1, 16]", acam.g_bit)));
  }
  if acam.g_max <= acam.g_min {
    return Err(CompileError::config(format!(
      "g_max {} must exceed g_min {}",
      acam.g_max, acam.g_min
    )));
  }
  Ok(())
}

/// Class boundaries must start at 0 and strictly increase below the core count.
pub fn validate_begin_core(begin_core: &[usize], total_cores: usize) -> Result<()> {
  match begin_core.first() {
    None => return Err(CompileError::config("begin_core is empty")),
    Some(&first) if first != 0 => {
      return Err(CompileError::config(format!("begin_core must start at 0, got {}", first)))
    },
    _ => {},
  }
  if let Some(pair) = begin_core.windows(2).find(|pair| pair[1] <= pair[0]) {
    return Err(CompileError::config(format!(
      "begin_core must strictly increase, found {} then {}",
      pair[0], pair[1]
    )));
  }
  if let Some(&last) = begin_core.last() {
    if last >= total_cores {
      return Err(CompileError::config(format!(
        "class starting at core {} leaves no cores (total {})",
        last, total_cores
      )));
    }
  }
  Ok(())
}

/// Load and merge configs
///
/// Steps:
/// 1. load the default description
/// 2. merge the custom file over it, if given
/// 3. apply CLI overrides
/// 4. validate
pub fn load_and_merge_configs(
  custom_config_path: Option<&Path>,
  overrides: &CliOverrides,
) -> Result<AppConfig> {
  let mut table = load_default_table()?;

  if let Some(custom_path) = custom_config_path {
    let custom = load_table(custom_path)?;
    table = merge_config(table, custom);
  }

  let mut config: AppConfig = toml::Value::Table(table).try_into()?;
  apply_cli_overrides(&mut config, overrides);
  validate_config(&config)?;

  Ok(config)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_config_is_valid() {
    let config = load_default_config().unwrap();
    validate_config(&config).unwrap();
    let topology = config.hardware.topology().unwrap();
    assert_eq!(topology.num_tile(), 4);
    assert_eq!(config.software.overflow_policy, OverflowPolicy::Truncate);
  }

  #[test]
  fn test_merge_overrides_nested_keys() {
    let base: toml::Table = toml::from_str(
      r#"
      [hardware.node]
      num_port = 2
      num_level = 2
      [software]
      seed = 1
      "#,
    )
    .unwrap();
    let custom: toml::Table = toml::from_str(
      r#"
      [hardware.node]
      num_level = 3
      "#,
    )
    .unwrap();
    let merged = merge_config(base, custom);
    let node = merged.get("hardware").and_then(|h| h.get("node")).unwrap();
    assert_eq!(node.get("num_port").and_then(|v| v.as_integer()), Some(2));
    assert_eq!(node.get("num_level").and_then(|v| v.as_integer()), Some(3));
    let seed = merged.get("software").and_then(|s| s.get("seed"));
    assert_eq!(seed.and_then(|v| v.as_integer()), Some(1));
  }

  #[test]
  fn test_cli_overrides() {
    let mut config = load_default_config().unwrap();
    let overrides = CliOverrides {
      seed: Some(99),
      noise_p: Some(0.1),
      log_dir: None,
    };
    apply_cli_overrides(&mut config, &overrides);
    assert_eq!(config.software.seed, 99);
    assert_eq!(config.software.noise_p, 0.1);
  }

  #[test]
  fn test_begin_core_rules() {
    assert!(validate_begin_core(&[0, 3, 5], 8).is_ok());
    assert!(validate_begin_core(&[], 8).is_err());
    assert!(validate_begin_core(&[1, 3], 8).is_err());
    assert!(validate_begin_core(&[0, 3, 3], 8).is_err());
    assert!(validate_begin_core(&[0, 8], 8).is_err());
  }

  #[test]
  fn test_validate_rejects_bad_noise() {
    let mut config = load_default_config().unwrap();
    config.software.noise_p = 0.7;
    assert!(validate_config(&config).is_err());
  }

  #[test]
  fn test_negative_decimals_disable_rounding() {
    let mut table = load_default_table().unwrap();
    let custom: toml::Table = toml::from_str("[software]\nthreshold_decimals = -1\n").unwrap();
    table = merge_config(table, custom);
    let config: AppConfig = toml::Value::Table(table).try_into().unwrap();
    assert_eq!(config.software.threshold_decimals, -1);
    assert_eq!(config.software.rounding_decimals(), None);

    let config = load_default_config().unwrap();
    assert_eq!(config.software.rounding_decimals(), Some(3));
  }

  #[test]
  fn test_conductance_levels() {
    let acam = AcamSection {
      latency: 4,
      g_bit: 2,
      g_min: 1.0,
      g_max: 5.0,
      electrical: BTreeMap::new(),
    };
    assert_eq!(acam.conductance_levels(), vec![1.0, 2.0, 3.0, 4.0]);
  }
}
