use serde::{Deserialize, Serialize};

use crate::error::{CompileError, Result};

/// Validated shape of the accelerator: a `num_port`-ary router tree of
/// depth `num_level` over `num_port^num_level` tiles, each tile holding
/// `num_core` cores with a `num_row x num_col` CAM array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareTopology {
  num_port: usize,
  num_level: usize,
  num_tile: usize,
  num_core: usize,
  num_row: usize,
  num_col: usize,
}

impl HardwareTopology {
  /// `num_tile` may be given explicitly; it must then equal `num_port^num_level`.
  pub fn new(
    num_port: usize,
    num_level: usize,
    num_tile: Option<usize>,
    num_core: usize,
    num_row: usize,
    num_col: usize,
  ) -> Result<Self> {
    if num_port == 0 || num_level == 0 {
      return Err(CompileError::config(format!(
        "num_port ({}) and num_level ({}) must both be at least 1",
        num_port, num_level
      )));
    }
    let derived = u32::try_from(num_level)
      .ok()
      .and_then(|level| num_port.checked_pow(level))
      .ok_or_else(|| {
        CompileError::config(format!("num_port^num_level overflows ({}^{})", num_port, num_level))
      })?;
    if let Some(tiles) = num_tile {
      if tiles != derived {
        return Err(CompileError::config(format!(
          "num_tile {} is not num_port^num_level = {}^{} = {}",
          tiles, num_port, num_level, derived
        )));
      }
    }
    if num_core == 0 || num_col == 0 {
      return Err(CompileError::config("num_core and num_col must be at least 1"));
    }
    // the last CAM row is reserved, so one usable row needs two
    if num_row < 2 {
      return Err(CompileError::config(format!("num_row must be at least 2, got {}", num_row)));
    }
    Ok(Self {
      num_port,
      num_level,
      num_tile: derived,
      num_core,
      num_row,
      num_col,
    })
  }

  pub fn num_port(&self) -> usize {
    self.num_port
  }

  pub fn num_level(&self) -> usize {
    self.num_level
  }

  pub fn num_tile(&self) -> usize {
    self.num_tile
  }

  pub fn num_core(&self) -> usize {
    self.num_core
  }

  pub fn num_row(&self) -> usize {
    self.num_row
  }

  pub fn num_col(&self) -> usize {
    self.num_col
  }

  pub fn total_cores(&self) -> usize {
    self.num_tile * self.num_core
  }

  /// Rows per core that may hold leaves
  pub fn leaf_rows(&self) -> usize {
    self.num_row - 1
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_tile_count_is_power() {
    let topo = HardwareTopology::new(2, 3, None, 4, 9, 16).unwrap();
    assert_eq!(topo.num_tile(), 8);
    assert_eq!(topo.total_cores(), 32);
    assert_eq!(topo.leaf_rows(), 8);
  }

  #[test]
  fn test_explicit_tile_count_must_match() {
    assert!(HardwareTopology::new(2, 2, Some(4), 1, 4, 4).is_ok());
    let err = HardwareTopology::new(2, 2, Some(6), 1, 4, 4).unwrap_err();
    assert!(matches!(err, CompileError::Config { .. }));
  }

  #[test]
  fn test_rejects_degenerate_shapes() {
    assert!(HardwareTopology::new(0, 1, None, 1, 4, 4).is_err());
    assert!(HardwareTopology::new(2, 0, None, 1, 4, 4).is_err());
    assert!(HardwareTopology::new(2, 1, None, 1, 1, 4).is_err());
    assert!(HardwareTopology::new(2, 1, None, 0, 4, 4).is_err());
    assert!(HardwareTopology::new(1 << 20, 8, None, 1, 4, 4).is_err());
  }
}
