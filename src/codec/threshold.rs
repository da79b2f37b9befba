use rand::Rng;

use crate::error::{CompileError, Result};

/// Highest index a CAM threshold cell can hold
pub const MAX_LEVEL: u8 = u8::MAX;

/// Sorted, deduplicated, NaN-free breakpoints of one feature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Breakpoints {
  values: Vec<f64>,
}

impl Breakpoints {
  pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Self {
    let mut values: Vec<f64> = values.into_iter().filter(|v| !v.is_nan()).collect();
    values.sort_by(f64::total_cmp);
    values.dedup();
    Self { values }
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  pub fn as_slice(&self) -> &[f64] {
    &self.values
  }
}

fn saturate(index: usize) -> u8 {
  index.min(MAX_LEVEL as usize) as u8
}

/// Index of the smallest breakpoint >= `value` (upper-inclusive digitize).
///
/// Values above every breakpoint, and NaN, map past the end; the result is
/// saturated to 255.
pub fn digitize_threshold(value: f64, breakpoints: &Breakpoints) -> u8 {
  if value.is_nan() {
    return saturate(breakpoints.len());
  }
  saturate(breakpoints.as_slice().partition_point(|&b| b < value))
}

/// Number of breakpoints <= `value` (lower-inclusive digitize), used for
/// input samples so that a sample equal to a threshold lands above it.
pub fn digitize_sample(value: f64, breakpoints: &Breakpoints) -> u8 {
  let value = if value.is_nan() { 0.0 } else { value };
  saturate(breakpoints.as_slice().partition_point(|&b| b <= value))
}

/// Symmetric +/-1 noise on quantized threshold indices.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdNoise {
  p: f64,
}

impl ThresholdNoise {
  /// `p` is the probability of each directional move; it must lie in [0, 0.5].
  pub fn new(p: f64) -> Result<Self> {
    if !(0.0..=0.5).contains(&p) {
      return Err(CompileError::config(format!(
        "noise probability {} outside [0, 0.5]",
        p
      )));
    }
    Ok(Self { p })
  }

  pub fn probability(&self) -> f64 {
    self.p
  }

  /// Decrement with probability p, increment with probability p, clamp to [0, 255].
  pub fn perturb<R: Rng + ?Sized>(&self, index: u8, rng: &mut R) -> u8 {
    if self.p == 0.0 {
      return index;
    }
    let draw: f64 = rng.gen();
    if draw < self.p {
      index.saturating_sub(1)
    } else if draw < 2.0 * self.p {
      index.saturating_add(1)
    } else {
      index
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::SeedableRng;
  use rand_pcg::Pcg64;

  fn bp(values: &[f64]) -> Breakpoints {
    Breakpoints::from_values(values.iter().copied())
  }

  #[test]
  fn test_breakpoints_sorted_unique() {
    let b = bp(&[3.0, 1.0, f64::NAN, 2.0, 1.0, 3.0]);
    assert_eq!(b.as_slice(), &[1.0, 2.0, 3.0]);
  }

  #[test]
  fn test_digitize_threshold_inclusive_upper() {
    let b = bp(&[1.0, 2.0, 3.0]);
    assert_eq!(digitize_threshold(0.5, &b), 0);
    assert_eq!(digitize_threshold(1.0, &b), 0);
    assert_eq!(digitize_threshold(1.5, &b), 1);
    assert_eq!(digitize_threshold(2.0, &b), 1);
    assert_eq!(digitize_threshold(3.0, &b), 2);
    assert_eq!(digitize_threshold(9.0, &b), 3);
    assert_eq!(digitize_threshold(f64::NAN, &b), 3);
  }

  #[test]
  fn test_digitize_sample_inclusive_lower() {
    let b = bp(&[1.0, 2.0, 3.0]);
    assert_eq!(digitize_sample(0.5, &b), 0);
    assert_eq!(digitize_sample(1.0, &b), 1);
    assert_eq!(digitize_sample(3.0, &b), 3);
    assert_eq!(digitize_sample(f64::NAN, &b), 0);
  }

  #[test]
  fn test_digitize_saturates() {
    let b = Breakpoints::from_values((0..400).map(f64::from));
    assert_eq!(digitize_threshold(1000.0, &b), 255);
    assert_eq!(digitize_threshold(300.0, &b), 255);
    assert_eq!(digitize_threshold(254.0, &b), 254);
  }

  #[test]
  fn test_digitize_idempotent_on_indices() {
    let b = Breakpoints::from_values((0..=255).map(f64::from));
    for index in 0..=255u8 {
      let once = digitize_threshold(index as f64, &b);
      assert_eq!(once, index);
      assert_eq!(digitize_threshold(once as f64, &b), once);
    }
  }

  #[test]
  fn test_digitize_monotonic() {
    let b = bp(&[-2.0, -0.5, 0.0, 0.25, 1.0, 8.0]);
    let mut previous = 0;
    for step in -40..=100 {
      let index = digitize_threshold(step as f64 * 0.1, &b);
      assert!(index >= previous);
      previous = index;
    }
  }

  #[test]
  fn test_noise_probability_bounds() {
    assert!(ThresholdNoise::new(-0.1).is_err());
    assert!(ThresholdNoise::new(0.6).is_err());
    assert!(ThresholdNoise::new(0.5).is_ok());
  }

  #[test]
  fn test_zero_noise_is_identity() {
    let noise = ThresholdNoise::new(0.0).unwrap();
    for seed in 0..4 {
      let mut rng = Pcg64::seed_from_u64(seed);
      for index in 0..=255u8 {
        assert_eq!(noise.perturb(index, &mut rng), index);
      }
    }
  }

  #[test]
  fn test_noise_moves_by_one_and_clamps() {
    let noise = ThresholdNoise::new(0.5).unwrap();
    let mut rng = Pcg64::seed_from_u64(7);
    for _ in 0..200 {
      let low = noise.perturb(0, &mut rng);
      assert!(low <= 1);
      let high = noise.perturb(255, &mut rng);
      assert!(high >= 254);
      let mid = noise.perturb(100, &mut rng);
      assert!(mid == 99 || mid == 101);
    }
  }

  #[test]
  fn test_noise_is_reproducible() {
    let noise = ThresholdNoise::new(0.2).unwrap();
    let run = |seed| {
      let mut rng = Pcg64::seed_from_u64(seed);
      (0..64).map(|i| noise.perturb(i as u8 + 10, &mut rng)).collect::<Vec<_>>()
    };
    assert_eq!(run(42), run(42));
  }
}
