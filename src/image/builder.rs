use serde::Serialize;

use super::layout::*;
use super::program::Program;
use crate::config::RegionOffsets;
use crate::error::{CompileError, Result};
use crate::model::QuantizedModel;
use crate::partition::PartitionAssignment;

/// Instruction table and initial data memory of one controller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryImage {
  pub level: ImageLevel,
  pub instructions: Vec<u32>,
  pub data: Vec<u8>,
}

/// Sample, feature and class counts of the model, shared by every image
#[derive(Debug, Clone, Copy)]
pub struct ImageParams {
  pub num_test: usize,
  pub num_base: usize,
  pub num_feature: usize,
  pub num_class: usize,
}

/// Writes scalar fields and arrays of one image at layout addresses
struct ImageWriter {
  layout: LevelLayout,
  data: Vec<u8>,
}

impl ImageWriter {
  fn new(layout: LevelLayout) -> Self {
    Self {
      layout,
      data: vec![0; layout.size],
    }
  }

  fn put_u32(&mut self, field: usize, value: usize) -> Result<()> {
    let value = u32::try_from(value).map_err(|_| {
      CompileError::range(
        format!("{:?} image", self.layout.level),
        format!("value {} at field +{} exceeds 32 bits", value, field),
      )
    })?;
    let addr = self.layout.field(field);
    self.data[addr..addr + WORD].copy_from_slice(&value.to_le_bytes());
    Ok(())
  }

  fn put_f32(&mut self, field: usize, value: f32) {
    let addr = self.layout.field(field);
    self.data[addr..addr + WORD].copy_from_slice(&value.to_le_bytes());
  }

  fn put_bytes(&mut self, start: usize, bytes: &[u8]) {
    self.data[start..start + bytes.len()].copy_from_slice(bytes);
  }

  fn finish(self) -> MemoryImage {
    let program = Program::for_level(self.layout.level);
    MemoryImage {
      level: self.layout.level,
      instructions: program.to_words(),
      data: self.data,
    }
  }
}

/// Row-major copy of a sample matrix, which must be exactly `rows x cols`
fn flatten(what: &str, rows: &[Vec<u8>], num_rows: usize, num_cols: usize) -> Result<Vec<u8>> {
  if rows.len() != num_rows || rows.iter().any(|row| row.len() != num_cols) {
    return Err(CompileError::range(
      what,
      format!("expected a {}x{} sample matrix", num_rows, num_cols),
    ));
  }
  Ok(rows.iter().flatten().copied().collect())
}

/// Node image: run counts, output pointers and the test samples to explain.
pub fn build_node_image(params: &ImageParams, offsets: &RegionOffsets, test_samples: &[Vec<u8>]) -> Result<MemoryImage> {
  let samples = flatten("node_sample", test_samples, params.num_test, params.num_feature)?;
  NODE_LAYOUT.check_regions(&[
    Region::new("node_sample", offsets.node_sample, params.num_test * params.num_feature),
    Region::new("partial_shap", offsets.partial_shap, 0),
    Region::new("shap", offsets.shap, 0),
  ])?;

  let mut writer = ImageWriter::new(NODE_LAYOUT);
  writer.put_u32(NODE_NUM_TEST, params.num_test)?;
  writer.put_f32(NODE_NUM_BASE, params.num_base as f32);
  writer.put_u32(NODE_NUM_FEATURE, params.num_feature)?;
  writer.put_u32(NODE_NUM_CLASS, params.num_class)?;
  writer.put_u32(NODE_PARTIAL_SHAP_PTR, offsets.partial_shap)?;
  writer.put_u32(NODE_SHAP_PTR, offsets.shap)?;
  writer.put_u32(NODE_SAMPLE_PTR, offsets.node_sample)?;
  writer.put_bytes(offsets.node_sample, &samples);
  Ok(writer.finish())
}

/// Tile image: base samples plus the pointers used to exchange samples
/// and partial results with the node.
pub fn build_tile_image(params: &ImageParams, offsets: &RegionOffsets, base_samples: &[Vec<u8>]) -> Result<MemoryImage> {
  let base = flatten("tile_base", base_samples, params.num_base, params.num_feature)?;
  TILE_LAYOUT.check_regions(&[
    Region::new("tile_sample", offsets.tile_sample, params.num_feature),
    Region::new("tile_base", offsets.tile_base, params.num_base * params.num_feature),
    Region::new("tile_result", offsets.tile_result, 0),
  ])?;

  let mut writer = ImageWriter::new(TILE_LAYOUT);
  writer.put_u32(TILE_NUM_BASE, params.num_base)?;
  writer.put_u32(TILE_NUM_FEATURE, params.num_feature)?;
  writer.put_u32(TILE_SAMPLE_PTR, offsets.tile_sample)?;
  writer.put_u32(TILE_BASE_PTR, offsets.tile_base)?;
  writer.put_u32(TILE_RESULT_PTR, offsets.tile_result)?;
  writer.put_bytes(offsets.tile_base, &base);
  Ok(writer.finish())
}

/// Core image: per-row FP8 leaf values and the weight table at their fixed
/// addresses; samples arrive from the tile at run time.
pub fn build_core_image(
  params: &ImageParams,
  offsets: &RegionOffsets,
  values: &[u8],
  weights: &[u8],
) -> Result<MemoryImage> {
  if values.len() > CORE_VALUE_CAPACITY {
    return Err(CompileError::range(
      "Core image",
      format!("{} leaf values exceed the {}-byte value region", values.len(), CORE_VALUE_CAPACITY),
    ));
  }
  if weights.len() > CORE_WEIGHT_CAPACITY {
    return Err(CompileError::range(
      "Core image",
      format!("{}-byte weight table exceeds {} bytes", weights.len(), CORE_WEIGHT_CAPACITY),
    ));
  }
  CORE_LAYOUT.check_regions(&[
    Region::new("core_sample", offsets.core_sample, params.num_feature),
    Region::new("cam", offsets.cam, 0),
    Region::new("core_base", offsets.core_base, params.num_base * params.num_feature),
  ])?;

  let mut writer = ImageWriter::new(CORE_LAYOUT);
  writer.put_u32(CORE_NUM_BASE, params.num_base)?;
  writer.put_u32(CORE_NUM_FEATURE, params.num_feature)?;
  writer.put_u32(CORE_CAM_PTR, offsets.cam)?;
  writer.put_u32(CORE_SAMPLE_PTR, offsets.core_sample)?;
  writer.put_u32(CORE_BASE_PTR, offsets.core_base)?;
  writer.put_bytes(CORE_VALUE_OFFSET, values);
  writer.put_bytes(CORE_WEIGHT_OFFSET, weights);
  Ok(writer.finish())
}

/// Images of the whole system. Tiles share one image; cores are indexed
/// by `tile * num_core + core`.
#[derive(Debug, Clone, Serialize)]
pub struct ImageSet {
  pub node: MemoryImage,
  pub tile: MemoryImage,
  pub cores: Vec<MemoryImage>,
}

pub fn build_images(
  model: &QuantizedModel,
  assignment: &PartitionAssignment,
  offsets: &RegionOffsets,
) -> Result<ImageSet> {
  for level in [ImageLevel::Node, ImageLevel::Tile, ImageLevel::Core] {
    Program::for_level(level).validate()?;
  }
  let params = ImageParams {
    num_test: model.num_test(),
    num_base: model.num_base(),
    num_feature: model.num_feature,
    num_class: assignment.ranges.num_class(),
  };
  let node = build_node_image(&params, offsets, &model.test_samples)?;
  let tile = build_tile_image(&params, offsets, &model.base_samples)?;
  let cores = assignment
    .cores
    .iter()
    .map(|arrays| build_core_image(&params, offsets, &arrays.values, &model.weights))
    .collect::<Result<Vec<_>>>()?;

  log::info!(
    "images: node {} B, tile {} B, {} cores x {} B",
    node.data.len(),
    tile.data.len(),
    cores.len(),
    CORE_IMAGE_SIZE
  );
  Ok(ImageSet { node, tile, cores })
}
