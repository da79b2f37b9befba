use super::fp8::encode_fp8;

/// Depth of the combinatorial weight table stored in every core image
pub const WEIGHT_TABLE_DEPTH: usize = 8;

fn factorial(n: usize) -> f64 {
  (1..=n).map(|k| k as f64).product()
}

/// Row-major `max_depth x max_depth` table of FP8 subset weights.
///
/// Entry `(n, s)` for `s < n` is `s! (n-s-1)! / n!`; all other entries are 0.
pub fn build_weight_table(max_depth: usize) -> Vec<u8> {
  let mut table = vec![0u8; max_depth * max_depth];
  for n in 0..max_depth {
    for s in 0..n {
      let weight = factorial(s) * factorial(n - s - 1) / factorial(n);
      table[n * max_depth + s] = encode_fp8(weight as f32);
    }
  }
  table
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_weight_table_values() {
    let table = build_weight_table(WEIGHT_TABLE_DEPTH);
    assert_eq!(table.len(), 64);
    #[rustfmt::skip]
    let expected: [u8; 64] = [
       0,  0,  0,  0,  0,  0,  0, 0,
      56,  0,  0,  0,  0,  0,  0, 0,
      48, 48,  0,  0,  0,  0,  0, 0,
      43, 35, 43,  0,  0,  0,  0, 0,
      40, 27, 27, 40,  0,  0,  0, 0,
      37, 21, 17, 21, 37,  0,  0, 0,
      35, 17,  9,  9, 17, 35,  0, 0,
      33, 12,  4,  3,  4, 12, 33, 0,
    ];
    assert_eq!(table, expected.to_vec());
  }

  #[test]
  fn test_weight_table_upper_triangle_is_zero() {
    let depth = 5;
    let table = build_weight_table(depth);
    for n in 0..depth {
      for s in n..depth {
        assert_eq!(table[n * depth + s], 0);
      }
    }
  }
}
