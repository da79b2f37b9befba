use std::ops::{Range, RangeInclusive};

use crate::config::config::validate_begin_core;
use crate::config::HardwareTopology;
use crate::error::Result;

/// Contiguous global core range of every class.
///
/// `bounds` is the configured `begin_core` list with the total core count
/// appended, so class `c` owns cores `bounds[c]..bounds[c + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassRanges {
  bounds: Vec<usize>,
  num_core: usize,
}

impl ClassRanges {
  pub fn new(begin_core: &[usize], topology: &HardwareTopology) -> Result<Self> {
    let total = topology.total_cores();
    validate_begin_core(begin_core, total)?;
    let mut bounds = begin_core.to_vec();
    bounds.push(total);
    Ok(Self {
      bounds,
      num_core: topology.num_core(),
    })
  }

  pub fn num_class(&self) -> usize {
    self.bounds.len() - 1
  }

  /// Boundaries including the sentinel
  pub fn bounds(&self) -> &[usize] {
    &self.bounds
  }

  pub fn core_range(&self, class: usize) -> Range<usize> {
    self.bounds[class]..self.bounds[class + 1]
  }

  pub fn cores_per_class(&self, class: usize) -> usize {
    self.bounds[class + 1] - self.bounds[class]
  }

  /// Tiles touched by the class, inclusive on both ends
  pub fn tile_range(&self, class: usize) -> RangeInclusive<usize> {
    let range = self.core_range(class);
    (range.start / self.num_core)..=((range.end - 1) / self.num_core)
  }

  /// Tile-local cores of `tile` that belong to `class`; empty when the
  /// class does not reach the tile.
  pub fn local_cores(&self, class: usize, tile: usize) -> Range<usize> {
    let range = self.core_range(class);
    let tile_begin = tile * self.num_core;
    let tile_end = tile_begin + self.num_core;
    let begin = range.start.max(tile_begin);
    let end = range.end.min(tile_end).max(begin);
    (begin - tile_begin)..(end - tile_begin)
  }

  /// First class whose tile range contains `tile`
  pub fn class_of_tile(&self, tile: usize) -> Option<usize> {
    (0..self.num_class()).find(|&class| self.tile_range(class).contains(&tile))
  }

  /// Class tag carried by a control tile: 1 + class, or 0 for an idle tile
  pub fn index_class(&self, tile: usize) -> usize {
    self.class_of_tile(tile).map(|class| class + 1).unwrap_or(0)
  }
}
