use rand::SeedableRng;
use rand_pcg::Pcg64;

use super::ensemble::EnsembleModel;
use crate::codec::{
  build_weight_table, digitize_sample, digitize_threshold, encode_fp8, Breakpoints, ThresholdNoise,
  WEIGHT_TABLE_DEPTH,
};
use crate::config::SoftwareSection;
use crate::error::{CompileError, Result};

/// One leaf after quantization: per feature the low/high threshold indices
/// and their validity flags (1 = bound present), plus the FP8 leaf value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizedLeaf {
  pub th_low: Vec<u8>,
  pub th_high: Vec<u8>,
  pub x_low: Vec<u8>,
  pub x_high: Vec<u8>,
  pub value: u8,
}

/// Leaves of one class in model table order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassTable {
  pub class: usize,
  pub leaves: Vec<QuantizedLeaf>,
}

#[derive(Debug, Clone)]
pub struct QuantizedModel {
  pub num_feature: usize,
  pub breakpoints: Vec<Breakpoints>,
  pub classes: Vec<ClassTable>,
  pub test_samples: Vec<Vec<u8>>,
  pub base_samples: Vec<Vec<u8>>,
  pub weights: Vec<u8>,
}

impl QuantizedModel {
  pub fn num_class(&self) -> usize {
    self.classes.len()
  }

  pub fn num_test(&self) -> usize {
    self.test_samples.len()
  }

  pub fn num_base(&self) -> usize {
    self.base_samples.len()
  }
}

/// Sorted unique bounds of each feature over every leaf, low and high sides together
pub fn feature_breakpoints(model: &EnsembleModel) -> Vec<Breakpoints> {
  (0..model.num_feature())
    .map(|feature| {
      Breakpoints::from_values(
        model
          .leaves
          .iter()
          .flat_map(|leaf| [leaf.low[feature], leaf.high[feature]])
          .flatten(),
      )
    })
    .collect()
}

fn digitize_bound(bound: Option<f64>, breakpoints: &Breakpoints) -> (u8, u8) {
  match bound {
    Some(value) if !value.is_nan() => (digitize_threshold(value, breakpoints), 1),
    _ => (digitize_threshold(f64::NAN, breakpoints), 0),
  }
}

fn quantize_rows(
  what: &str,
  rows: &[Vec<f64>],
  offset: usize,
  count: usize,
  breakpoints: &[Breakpoints],
) -> Result<Vec<Vec<u8>>> {
  let end = offset
    .checked_add(count)
    .filter(|&end| end <= rows.len())
    .ok_or_else(|| {
      CompileError::model(format!(
        "{} rows [{}, {}+{}) requested but only {} available",
        what,
        offset,
        offset,
        count,
        rows.len()
      ))
    })?;
  Ok(
    rows[offset..end]
      .iter()
      .map(|row| {
        row
          .iter()
          .zip(breakpoints)
          .map(|(&x, bp)| digitize_sample(x, bp))
          .collect()
      })
      .collect(),
  )
}

/// Quantize thresholds, values and samples of `model` under `software`.
///
/// Perturbation draws from one `Pcg64` seeded with `software.seed`: every
/// low index in leaf order first, then every high index.
pub fn quantize_model(model: &EnsembleModel, software: &SoftwareSection) -> Result<QuantizedModel> {
  model.validate()?;
  let mut model = model.clone();
  if let Some(decimals) = software.rounding_decimals() {
    model.round_thresholds(decimals);
  }

  let num_feature = model.num_feature();
  let breakpoints = feature_breakpoints(&model);
  let noise = ThresholdNoise::new(software.noise_p)?;
  let mut rng = Pcg64::seed_from_u64(software.seed);

  let mut leaves: Vec<QuantizedLeaf> = model
    .leaves
    .iter()
    .map(|leaf| {
      let (th_low, x_low) = leaf
        .low
        .iter()
        .zip(&breakpoints)
        .map(|(&bound, bp)| digitize_bound(bound, bp))
        .unzip();
      let (th_high, x_high) = leaf
        .high
        .iter()
        .zip(&breakpoints)
        .map(|(&bound, bp)| digitize_bound(bound, bp))
        .unzip();
      QuantizedLeaf {
        th_low,
        th_high,
        x_low,
        x_high,
        value: encode_fp8((software.value_factor * leaf.value) as f32),
      }
    })
    .collect();

  if noise.probability() > 0.0 {
    for leaf in &mut leaves {
      for index in &mut leaf.th_low {
        *index = noise.perturb(*index, &mut rng);
      }
    }
    for leaf in &mut leaves {
      for index in &mut leaf.th_high {
        *index = noise.perturb(*index, &mut rng);
      }
    }
  }

  let mut classes: Vec<ClassTable> = (0..model.num_class())
    .map(|class| ClassTable { class, leaves: Vec::new() })
    .collect();
  for (record, leaf) in model.leaves.iter().zip(leaves) {
    classes[record.class].leaves.push(leaf);
  }

  let test_samples = quantize_rows(
    "test",
    &model.test_samples,
    software.num_test_offset,
    software.num_test,
    &breakpoints,
  )?;
  let base_samples = quantize_rows("base", model.base_samples(), 0, software.num_base, &breakpoints)?;

  log::info!(
    "quantized {} leaves over {} features into {} classes ({} test, {} base samples)",
    model.leaves.len(),
    num_feature,
    classes.len(),
    test_samples.len(),
    base_samples.len()
  );

  Ok(QuantizedModel {
    num_feature,
    breakpoints,
    classes,
    test_samples,
    base_samples,
    weights: build_weight_table(WEIGHT_TABLE_DEPTH),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::load_default_config;
  use crate::model::ensemble::LeafRecord;

  fn sample_model() -> EnsembleModel {
    EnsembleModel {
      leaves: vec![
        LeafRecord {
          low: vec![None, Some(0.5)],
          high: vec![Some(1.0), None],
          class: 0,
          value: 0.1,
        },
        LeafRecord {
          low: vec![Some(1.0), None],
          high: vec![None, Some(0.5)],
          class: 1,
          value: -0.05,
        },
        LeafRecord {
          low: vec![Some(1.0), Some(0.5)],
          high: vec![Some(2.0), Some(3.0)],
          class: 0,
          value: 0.2,
        },
      ],
      test_samples: vec![vec![0.0, 0.0], vec![1.0, 0.5], vec![5.0, f64::NAN]],
      base_samples: None,
    }
  }

  fn software() -> SoftwareSection {
    let mut software = load_default_config().unwrap().software;
    software.num_test = 3;
    software.num_base = 2;
    software.value_factor = 10.0;
    software
  }

  #[test]
  fn test_breakpoints_span_both_sides() {
    let bps = feature_breakpoints(&sample_model());
    assert_eq!(bps[0].as_slice(), &[1.0, 2.0]);
    assert_eq!(bps[1].as_slice(), &[0.5, 3.0]);
  }

  #[test]
  fn test_thresholds_and_flags() {
    let q = quantize_model(&sample_model(), &software()).unwrap();
    assert_eq!(q.num_class(), 2);
    let first = &q.classes[0].leaves[0];
    assert_eq!(first.x_low, vec![0, 1]);
    assert_eq!(first.x_high, vec![1, 0]);
    assert_eq!(first.th_low[1], 0);
    assert_eq!(first.th_high[0], 0);
    // absent bound digitizes past the end
    assert_eq!(first.th_low[0], 2);
    assert_eq!(first.value, encode_fp8(1.0));

    let second = &q.classes[0].leaves[1];
    assert_eq!(second.th_high, vec![1, 1]);
    assert_eq!(q.classes[1].leaves[0].value, encode_fp8(-0.5));
  }

  #[test]
  fn test_samples_lower_inclusive() {
    let q = quantize_model(&sample_model(), &software()).unwrap();
    assert_eq!(q.test_samples, vec![vec![0, 0], vec![1, 1], vec![2, 0]]);
    assert_eq!(q.base_samples, vec![vec![0, 0], vec![1, 1]]);
    assert_eq!(q.weights.len(), 64);
  }

  #[test]
  fn test_rounding_can_be_disabled() {
    let mut model = sample_model();
    model.leaves[2].high[1] = Some(3.00049);

    let rounded = quantize_model(&model, &software()).unwrap();
    assert_eq!(rounded.breakpoints[1].as_slice(), &[0.5, 3.0]);

    let mut sw = software();
    sw.threshold_decimals = -1;
    let raw = quantize_model(&model, &sw).unwrap();
    assert_eq!(raw.breakpoints[1].as_slice(), &[0.5, 3.00049]);
  }

  #[test]
  fn test_sample_window_out_of_range() {
    let mut sw = software();
    sw.num_test_offset = 2;
    let err = quantize_model(&sample_model(), &sw).unwrap_err();
    assert!(matches!(err, CompileError::Model { .. }));
  }

  #[test]
  fn test_zero_noise_matches_across_seeds() {
    let mut sw = software();
    let a = quantize_model(&sample_model(), &sw).unwrap();
    sw.seed = 1234;
    let b = quantize_model(&sample_model(), &sw).unwrap();
    assert_eq!(a.classes, b.classes);
  }

  #[test]
  fn test_noise_is_seeded() {
    let mut sw = software();
    sw.noise_p = 0.5;
    sw.seed = 9;
    let a = quantize_model(&sample_model(), &sw).unwrap();
    let b = quantize_model(&sample_model(), &sw).unwrap();
    assert_eq!(a.classes, b.classes);
    // flags never move
    assert_eq!(a.classes[0].leaves[0].x_low, vec![0, 1]);
  }
}
