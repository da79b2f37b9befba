use serde::Serialize;

use super::class_range::ClassRanges;
use crate::config::{HardwareTopology, OverflowPolicy};
use crate::error::{CompileError, Result};
use crate::model::{QuantizedLeaf, QuantizedModel};

/// Physical home of one kept leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LeafSlot {
  pub class: usize,
  /// Position of the leaf within its class table
  pub leaf: usize,
  pub tile: usize,
  pub core: usize,
  pub row: usize,
}

/// A class whose leaves exceeded its slots under the truncate policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TruncatedClass {
  pub class: usize,
  pub leaves: usize,
  pub capacity: usize,
}

impl TruncatedClass {
  pub fn dropped(&self) -> usize {
    self.leaves - self.capacity
  }
}

/// CAM contents of one core, row-major `num_row x num_col` for the
/// threshold planes and one FP8 value per row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreArrays {
  pub th_low: Vec<u8>,
  pub th_high: Vec<u8>,
  pub x_low: Vec<u8>,
  pub x_high: Vec<u8>,
  pub values: Vec<u8>,
}

impl CoreArrays {
  fn empty(num_row: usize, num_col: usize) -> Self {
    let cells = num_row * num_col;
    Self {
      th_low: vec![0; cells],
      th_high: vec![0; cells],
      x_low: vec![0; cells],
      x_high: vec![0; cells],
      values: vec![0; num_row],
    }
  }

  fn write_row(&mut self, row: usize, num_col: usize, content: &RowContent) {
    let base = row * num_col;
    let width = content.th_low.len();
    self.th_low[base..base + width].copy_from_slice(&content.th_low);
    self.th_high[base..base + width].copy_from_slice(&content.th_high);
    self.x_low[base..base + width].copy_from_slice(&content.x_low);
    self.x_high[base..base + width].copy_from_slice(&content.x_high);
    self.values[row] = content.value;
  }
}

/// Feature columns of one CAM row; columns past `num_feature` stay zero.
struct RowContent {
  th_low: Vec<u8>,
  th_high: Vec<u8>,
  x_low: Vec<u8>,
  x_high: Vec<u8>,
  value: u8,
}

impl RowContent {
  fn from_leaf(leaf: &QuantizedLeaf) -> Self {
    Self {
      th_low: leaf.th_low.clone(),
      th_high: leaf.th_high.clone(),
      x_low: leaf.x_low.clone(),
      x_high: leaf.x_high.clone(),
      value: leaf.value,
    }
  }

  /// A row that matches every input and contributes nothing
  fn padding(num_feature: usize) -> Self {
    Self {
      th_low: vec![0; num_feature],
      th_high: vec![0; num_feature],
      x_low: vec![1; num_feature],
      x_high: vec![1; num_feature],
      value: 0,
    }
  }
}

#[derive(Debug, Clone)]
pub struct PartitionAssignment {
  pub ranges: ClassRanges,
  pub slots: Vec<LeafSlot>,
  pub truncated: Vec<TruncatedClass>,
  /// Indexed by `tile * num_core + core`
  pub cores: Vec<CoreArrays>,
  pub num_core: usize,
  pub num_row: usize,
  pub num_col: usize,
}

impl PartitionAssignment {
  pub fn core(&self, tile: usize, core: usize) -> &CoreArrays {
    &self.cores[tile * self.num_core + core]
  }

  /// Leaf slots per class
  pub fn capacity(&self, class: usize) -> usize {
    self.ranges.cores_per_class(class) * (self.num_row - 1)
  }

  pub fn kept_leaves(&self, class: usize) -> usize {
    self.slots.iter().filter(|slot| slot.class == class).count()
  }
}

/// Place every class's leaves into the CAM rows of its core range.
///
/// Leaves fill a core's `num_row - 1` usable rows before moving to the
/// next core. A class with spare slots is padded with always-matching rows;
/// a class with too many leaves keeps its leading leaves under
/// [`OverflowPolicy::Truncate`] and fails under [`OverflowPolicy::Reject`].
pub fn partition(
  model: &QuantizedModel,
  topology: &HardwareTopology,
  begin_core: &[usize],
  policy: OverflowPolicy,
) -> Result<PartitionAssignment> {
  let ranges = ClassRanges::new(begin_core, topology)?;
  let num_feature = model.num_feature;
  let (num_core, num_row, num_col) = (topology.num_core(), topology.num_row(), topology.num_col());
  let leaf_rows = topology.leaf_rows();

  if num_feature > num_col {
    return Err(CompileError::range(
      "cam array",
      format!("{} features do not fit {} columns", num_feature, num_col),
    ));
  }
  if model.num_class() > ranges.num_class() {
    return Err(CompileError::model(format!(
      "model has {} classes but begin_core only assigns {}",
      model.num_class(),
      ranges.num_class()
    )));
  }

  let mut cores = vec![CoreArrays::empty(num_row, num_col); topology.total_cores()];
  let mut slots = Vec::new();
  let mut truncated = Vec::new();

  for class in 0..ranges.num_class() {
    let leaves: &[QuantizedLeaf] = model
      .classes
      .get(class)
      .map(|table| &table.leaves[..])
      .unwrap_or(&[]);
    let capacity = ranges.cores_per_class(class) * leaf_rows;

    let kept = if leaves.len() > capacity {
      match policy {
        OverflowPolicy::Reject => {
          return Err(CompileError::Capacity {
            class,
            leaves: leaves.len(),
            capacity,
          })
        },
        OverflowPolicy::Truncate => {
          log::warn!(
            "class {} has {} leaves but only {} slots, dropping the last {}",
            class,
            leaves.len(),
            capacity,
            leaves.len() - capacity
          );
          truncated.push(TruncatedClass {
            class,
            leaves: leaves.len(),
            capacity,
          });
          &leaves[..capacity]
        },
      }
    } else {
      leaves
    };

    let rows: Vec<RowContent> = kept
      .iter()
      .map(RowContent::from_leaf)
      .chain((kept.len()..capacity).map(|_| RowContent::padding(num_feature)))
      .collect();

    let mut index = 0;
    for tile in ranges.tile_range(class) {
      for core in ranges.local_cores(class, tile) {
        let arrays = &mut cores[tile * num_core + core];
        for row in 0..leaf_rows {
          arrays.write_row(row, num_col, &rows[index]);
          if index < kept.len() {
            slots.push(LeafSlot {
              class,
              leaf: index,
              tile,
              core,
              row,
            });
          }
          index += 1;
        }
      }
    }
    log::debug!(
      "class {}: cores {:?}, tiles {:?}, {} leaves in {} slots",
      class,
      ranges.core_range(class),
      ranges.tile_range(class),
      kept.len(),
      capacity
    );
  }

  log::info!(
    "partitioned {} leaves over {} classes ({} truncated)",
    slots.len(),
    ranges.num_class(),
    truncated.len()
  );

  Ok(PartitionAssignment {
    ranges,
    slots,
    truncated,
    cores,
    num_core,
    num_row,
    num_col,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::ClassTable;

  fn leaf(tag: u8, num_feature: usize) -> QuantizedLeaf {
    QuantizedLeaf {
      th_low: vec![tag; num_feature],
      th_high: vec![tag.wrapping_add(1); num_feature],
      x_low: vec![1; num_feature],
      x_high: vec![0; num_feature],
      value: tag,
    }
  }

  fn model(counts: &[usize], num_feature: usize) -> QuantizedModel {
    QuantizedModel {
      num_feature,
      breakpoints: Vec::new(),
      classes: counts
        .iter()
        .enumerate()
        .map(|(class, &count)| ClassTable {
          class,
          leaves: (0..count).map(|i| leaf(i as u8 + 1, num_feature)).collect(),
        })
        .collect(),
      test_samples: Vec::new(),
      base_samples: Vec::new(),
      weights: Vec::new(),
    }
  }

  fn topo() -> HardwareTopology {
    HardwareTopology::new(2, 2, None, 4, 9, 16).unwrap()
  }

  #[test]
  fn test_exact_capacity_fills_all_rows() {
    let assignment = partition(&model(&[24, 1], 3), &topo(), &[0, 3], OverflowPolicy::Truncate).unwrap();
    assert_eq!(assignment.capacity(0), 24);
    assert_eq!(assignment.kept_leaves(0), 24);
    assert!(assignment.truncated.is_empty());
    for core in 0..3 {
      let arrays = assignment.core(0, core);
      for row in 0..8 {
        let leaf = core * 8 + row;
        assert_eq!(arrays.values[row], leaf as u8 + 1);
        assert_eq!(arrays.x_high[row * 16], 0);
      }
      // reserved row
      assert_eq!(arrays.values[8], 0);
      assert!(arrays.x_low[8 * 16..].iter().all(|&x| x == 0));
    }
  }

  #[test]
  fn test_truncation_keeps_leading_leaves() {
    let assignment = partition(&model(&[30, 1], 3), &topo(), &[0, 3], OverflowPolicy::Truncate).unwrap();
    assert_eq!(
      assignment.truncated,
      vec![TruncatedClass {
        class: 0,
        leaves: 30,
        capacity: 24
      }]
    );
    assert_eq!(assignment.truncated[0].dropped(), 6);
    let kept: Vec<usize> = assignment.slots.iter().filter(|s| s.class == 0).map(|s| s.leaf).collect();
    assert_eq!(kept, (0..24).collect::<Vec<_>>());
  }

  #[test]
  fn test_reject_policy_fails() {
    let err = partition(&model(&[30, 1], 3), &topo(), &[0, 3], OverflowPolicy::Reject).unwrap_err();
    assert!(matches!(
      err,
      CompileError::Capacity {
        class: 0,
        leaves: 30,
        capacity: 24
      }
    ));
  }

  #[test]
  fn test_padding_rows_match_everything() {
    let assignment = partition(&model(&[2, 1], 3), &topo(), &[0, 3], OverflowPolicy::Truncate).unwrap();
    let arrays = assignment.core(0, 0);
    // row 2 is padding: flags set on feature columns only
    let base = 2 * 16;
    assert_eq!(&arrays.x_low[base..base + 3], &[1, 1, 1]);
    assert_eq!(&arrays.x_high[base..base + 3], &[1, 1, 1]);
    assert!(arrays.x_low[base + 3..base + 16].iter().all(|&x| x == 0));
    assert_eq!(arrays.th_low[base], 0);
    assert_eq!(arrays.values[2], 0);
    // real rows leave the column padding clear
    assert!(arrays.x_low[3..16].iter().all(|&x| x == 0));
  }

  #[test]
  fn test_class_crossing_tiles() {
    // class 1 owns global cores 3..16: tile 0 core 3, then tiles 1..=3
    let assignment = partition(&model(&[1, 20], 2), &topo(), &[0, 3], OverflowPolicy::Truncate).unwrap();
    let slots: Vec<&LeafSlot> = assignment.slots.iter().filter(|s| s.class == 1).collect();
    assert_eq!(slots.len(), 20);
    assert_eq!((slots[0].tile, slots[0].core, slots[0].row), (0, 3, 0));
    assert_eq!((slots[8].tile, slots[8].core, slots[8].row), (1, 0, 0));
    assert_eq!((slots[19].tile, slots[19].core, slots[19].row), (1, 1, 3));
    for slot in &assignment.slots {
      assert!(slot.row < 8);
      let global = slot.tile * 4 + slot.core;
      assert!(assignment.ranges.core_range(slot.class).contains(&global));
    }
    // last tile of the class is written too
    assert_eq!(assignment.core(3, 3).x_low[0], 1);
  }

  #[test]
  fn test_too_many_features() {
    let err = partition(&model(&[1], 17), &topo(), &[0], OverflowPolicy::Truncate).unwrap_err();
    assert!(matches!(err, CompileError::Range { .. }));
  }

  #[test]
  fn test_more_classes_than_ranges() {
    let err = partition(&model(&[1, 1, 1], 2), &topo(), &[0, 3], OverflowPolicy::Truncate).unwrap_err();
    assert!(matches!(err, CompileError::Model { .. }));
  }
}
