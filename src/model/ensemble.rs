use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{CompileError, Result};

/// One decision-tree leaf: per feature a `[low, high)` interval whose sides
/// may be open (`None`), the class it votes for and its contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafRecord {
  pub low: Vec<Option<f64>>,
  pub high: Vec<Option<f64>>,
  pub class: usize,
  pub value: f64,
}

/// A trained ensemble flattened to its leaves, plus the held-out samples to
/// explain and the background samples to explain them against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleModel {
  pub leaves: Vec<LeafRecord>,
  pub test_samples: Vec<Vec<f64>>,
  /// Falls back to `test_samples` when absent
  #[serde(default)]
  pub base_samples: Option<Vec<Vec<f64>>>,
}

impl EnsembleModel {
  pub fn from_json_file(path: &Path) -> Result<Self> {
    let content = fs::read_to_string(path)?;
    let model: Self = serde_json::from_str(&content)?;
    model.validate()?;
    Ok(model)
  }

  /// Interval width shared by every leaf
  pub fn num_feature(&self) -> usize {
    self.leaves.first().map(|leaf| leaf.low.len()).unwrap_or(0)
  }

  pub fn num_class(&self) -> usize {
    self.leaves.iter().map(|leaf| leaf.class + 1).max().unwrap_or(0)
  }

  pub fn base_samples(&self) -> &[Vec<f64>] {
    self.base_samples.as_deref().unwrap_or(&self.test_samples)
  }

  pub fn validate(&self) -> Result<()> {
    let num_feature = self.num_feature();
    if num_feature == 0 {
      return Err(CompileError::model("model has no leaves or zero-width intervals"));
    }
    for (index, leaf) in self.leaves.iter().enumerate() {
      if leaf.low.len() != num_feature || leaf.high.len() != num_feature {
        return Err(CompileError::model(format!(
          "leaf {} has {}/{} bounds, expected {}",
          index,
          leaf.low.len(),
          leaf.high.len(),
          num_feature
        )));
      }
    }
    for (name, samples) in [("test", &self.test_samples[..]), ("base", self.base_samples())] {
      if let Some(row) = samples.iter().position(|row| row.len() != num_feature) {
        return Err(CompileError::model(format!(
          "{} sample {} has {} features, expected {}",
          name,
          row,
          samples[row].len(),
          num_feature
        )));
      }
    }
    Ok(())
  }

  /// Round every finite bound to `decimals` places, ties to even.
  pub fn round_thresholds(&mut self, decimals: i32) {
    let scale = 10f64.powi(decimals);
    let round = |bound: &mut Option<f64>| {
      if let Some(value) = bound {
        if value.is_finite() {
          *value = (*value * scale).round_ties_even() / scale;
        }
      }
    };
    for leaf in &mut self.leaves {
      leaf.low.iter_mut().for_each(round);
      leaf.high.iter_mut().for_each(round);
    }
  }

  /// Leaves of `class`, in table order
  pub fn leaves_of_class(&self, class: usize) -> impl Iterator<Item = &LeafRecord> {
    self.leaves.iter().filter(move |leaf| leaf.class == class)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn leaf(low: &[Option<f64>], high: &[Option<f64>], class: usize, value: f64) -> LeafRecord {
    LeafRecord {
      low: low.to_vec(),
      high: high.to_vec(),
      class,
      value,
    }
  }

  #[test]
  fn test_parse_json_with_open_bounds() {
    let json = r#"{
      "leaves": [
        { "low": [null, 0.5], "high": [1.25, null], "class": 1, "value": -0.5 }
      ],
      "test_samples": [[0.0, 1.0]]
    }"#;
    let model: EnsembleModel = serde_json::from_str(json).unwrap();
    model.validate().unwrap();
    assert_eq!(model.num_feature(), 2);
    assert_eq!(model.num_class(), 2);
    assert_eq!(model.leaves[0].low[0], None);
    assert_eq!(model.base_samples().len(), 1);
  }

  #[test]
  fn test_ragged_leaf_rejected() {
    let model = EnsembleModel {
      leaves: vec![
        leaf(&[Some(0.0), None], &[None, None], 0, 1.0),
        leaf(&[Some(0.0)], &[None], 0, 1.0),
      ],
      test_samples: vec![],
      base_samples: None,
    };
    assert!(matches!(model.validate(), Err(CompileError::Model { .. })));
  }

  #[test]
  fn test_sample_width_checked() {
    let model = EnsembleModel {
      leaves: vec![leaf(&[None, None], &[None, None], 0, 1.0)],
      test_samples: vec![vec![1.0]],
      base_samples: None,
    };
    assert!(model.validate().is_err());
  }

  #[test]
  fn test_round_thresholds() {
    let mut model = EnsembleModel {
      leaves: vec![leaf(&[Some(0.12345), None], &[Some(2.0004), Some(-1.0004)], 0, 1.0)],
      test_samples: vec![],
      base_samples: None,
    };
    model.round_thresholds(3);
    assert_eq!(model.leaves[0].low, vec![Some(0.123), None]);
    assert_eq!(model.leaves[0].high, vec![Some(2.0), Some(-1.0)]);
  }

  #[test]
  fn test_round_thresholds_ties_to_even() {
    // 12.5 and 37.5 are exact in binary, so these are true ties
    let mut model = EnsembleModel {
      leaves: vec![leaf(&[Some(0.125), Some(-0.125)], &[Some(0.375), Some(2.0005)], 0, 1.0)],
      test_samples: vec![],
      base_samples: None,
    };
    model.round_thresholds(2);
    assert_eq!(model.leaves[0].low, vec![Some(0.12), Some(-0.12)]);
    assert_eq!(model.leaves[0].high[0], Some(0.38));

    // 2.0005 * 1000 lands just above the tie in f64
    let mut model = EnsembleModel {
      leaves: vec![leaf(&[Some(2.0005)], &[None], 0, 1.0)],
      test_samples: vec![],
      base_samples: None,
    };
    model.round_thresholds(3);
    assert_eq!(model.leaves[0].low, vec![Some(2.001)]);
  }

  #[test]
  fn test_class_grouping_keeps_order() {
    let model = EnsembleModel {
      leaves: vec![
        leaf(&[None], &[None], 1, 1.0),
        leaf(&[None], &[None], 0, 2.0),
        leaf(&[None], &[None], 1, 3.0),
      ],
      test_samples: vec![],
      base_samples: None,
    };
    let values: Vec<f64> = model.leaves_of_class(1).map(|leaf| leaf.value).collect();
    assert_eq!(values, vec![1.0, 3.0]);
  }
}
