//! Byte layout of the node, tile and core memory images.
//!
//! The control programs in [`super::program`] address the scalar block and
//! the fixed core regions through these constants, and the builder packs
//! data at the same addresses. Relocatable regions are reached through the
//! pointer fields of the scalar block and are checked against this layout
//! before anything is written.

use serde::Serialize;

use crate::error::{CompileError, Result};

/// Bytes of one scalar field
pub const WORD: usize = 4;

// Node image
pub const NODE_IMAGE_SIZE: usize = 32768;
pub const NODE_SCALAR_BASE: usize = 24576;
pub const NODE_NUM_TEST: usize = 0;
pub const NODE_NUM_BASE: usize = 4;
pub const NODE_NUM_FEATURE: usize = 8;
pub const NODE_NUM_CLASS: usize = 12;
pub const NODE_PARTIAL_SHAP_PTR: usize = 16;
pub const NODE_SHAP_PTR: usize = 20;
pub const NODE_SAMPLE_PTR: usize = 24;
pub const NODE_RUN_FLAG: usize = 28;
pub const NODE_SCALAR_SIZE: usize = 32;

// Tile image
pub const TILE_IMAGE_SIZE: usize = 17408;
pub const TILE_SCALAR_BASE: usize = 16512;
pub const TILE_NUM_BASE: usize = 0;
pub const TILE_NUM_FEATURE: usize = 4;
pub const TILE_SAMPLE_PTR: usize = 8;
pub const TILE_BASE_PTR: usize = 12;
pub const TILE_ACCUMULATOR: usize = 16;
pub const TILE_RESULT_PTR: usize = 20;
pub const TILE_SAMPLE_FLAG: usize = 24;
pub const TILE_RESULT_FLAG: usize = 28;
pub const TILE_SCALAR_SIZE: usize = 32;

// Core image
pub const CORE_IMAGE_SIZE: usize = 2024;
pub const CORE_SCALAR_BASE: usize = 1168;
pub const CORE_NUM_BASE: usize = 0;
pub const CORE_NUM_FEATURE: usize = 4;
pub const CORE_CAM_PTR: usize = 8;
pub const CORE_SAMPLE_PTR: usize = 12;
pub const CORE_BASE_PTR: usize = 16;
pub const CORE_RUNTIME: usize = 20;
pub const CORE_RUN_FLAG: usize = 24;
pub const CORE_SCALAR_SIZE: usize = 28;

/// Match vector written by the CAM, one byte per row
pub const CORE_MATCH_OFFSET: usize = 384;
/// FP8 leaf values, one byte per CAM row
pub const CORE_VALUE_OFFSET: usize = 640;
pub const CORE_VALUE_CAPACITY: usize = 256;
/// FP8 combinatorial weight table
pub const CORE_WEIGHT_OFFSET: usize = 896;
pub const CORE_WEIGHT_CAPACITY: usize = 64;
/// Four scratch words used while accumulating
pub const CORE_SCRATCH_OFFSET: usize = 1152;

/// A byte range inside an image. A zero-length region is a bare pointer
/// target and only its start address is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Region {
  pub name: &'static str,
  pub start: usize,
  pub len: usize,
}

impl Region {
  pub const fn new(name: &'static str, start: usize, len: usize) -> Self {
    Self { name, start, len }
  }

  pub const fn end(&self) -> usize {
    self.start + self.len
  }

  /// Bytes claimed for overlap checks; a pointer claims its first byte
  fn span(&self) -> (usize, usize) {
    (self.start, self.start + self.len.max(1))
  }

  pub fn overlaps(&self, other: &Region) -> bool {
    let (a_start, a_end) = self.span();
    let (b_start, b_end) = other.span();
    a_start < b_end && b_start < a_end
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImageLevel {
  Node,
  Tile,
  Core,
}

#[derive(Debug, Clone, Copy)]
pub struct LevelLayout {
  pub level: ImageLevel,
  pub size: usize,
  pub scalar_base: usize,
  pub scalar_size: usize,
  /// Regions whose addresses are baked into the program
  pub fixed: &'static [Region],
}

pub const NODE_LAYOUT: LevelLayout = LevelLayout {
  level: ImageLevel::Node,
  size: NODE_IMAGE_SIZE,
  scalar_base: NODE_SCALAR_BASE,
  scalar_size: NODE_SCALAR_SIZE,
  fixed: &[],
};

pub const TILE_LAYOUT: LevelLayout = LevelLayout {
  level: ImageLevel::Tile,
  size: TILE_IMAGE_SIZE,
  scalar_base: TILE_SCALAR_BASE,
  scalar_size: TILE_SCALAR_SIZE,
  fixed: &[],
};

pub const CORE_LAYOUT: LevelLayout = LevelLayout {
  level: ImageLevel::Core,
  size: CORE_IMAGE_SIZE,
  scalar_base: CORE_SCALAR_BASE,
  scalar_size: CORE_SCALAR_SIZE,
  fixed: &[
    Region::new("match", CORE_MATCH_OFFSET, CORE_VALUE_OFFSET - CORE_MATCH_OFFSET),
    Region::new("value", CORE_VALUE_OFFSET, CORE_VALUE_CAPACITY),
    Region::new("weight", CORE_WEIGHT_OFFSET, CORE_WEIGHT_CAPACITY),
    Region::new("scratch", CORE_SCRATCH_OFFSET, 4 * WORD),
  ],
};

impl LevelLayout {
  pub fn scalar_block(&self) -> Region {
    Region::new("scalar", self.scalar_base, self.scalar_size)
  }

  /// Absolute address of a scalar field
  pub const fn field(&self, offset: usize) -> usize {
    self.scalar_base + offset
  }

  /// Check relocatable regions: each must lie inside the image and clear
  /// of the scalar block, the fixed regions and each other.
  pub fn check_regions(&self, regions: &[Region]) -> Result<()> {
    let what = format!("{:?} image", self.level);
    let scalar = self.scalar_block();
    for (index, region) in regions.iter().enumerate() {
      if region.span().1 > self.size {
        return Err(CompileError::range(
          &what,
          format!(
            "region {} [{}, {}) exceeds image size {}",
            region.name,
            region.start,
            region.end(),
            self.size
          ),
        ));
      }
      for reserved in std::iter::once(&scalar).chain(self.fixed) {
        if region.overlaps(reserved) {
          return Err(CompileError::range(
            &what,
            format!(
              "region {} at {} overlaps the {} block [{}, {})",
              region.name,
              region.start,
              reserved.name,
              reserved.start,
              reserved.end()
            ),
          ));
        }
      }
      for other in &regions[index + 1..] {
        if region.len > 0 && other.len > 0 && region.overlaps(other) {
          return Err(CompileError::range(
            &what,
            format!("regions {} and {} overlap", region.name, other.name),
          ));
        }
      }
    }
    Ok(())
  }
}
