//! FP8 E4M3 codec (1 sign, 4 exponent, 3 mantissa bits, bias 7).
//!
//! The format has no infinities or NaNs: exponent field 15 is an ordinary
//! binade, so the largest magnitude is 1.875 * 2^8 = 480.

const FP32_MAN_BITS: u32 = 23;
const FP8_MAN_BITS: u32 = 3;
const FP8_BIAS: i32 = 7;
const MAN_SHIFT: u32 = FP32_MAN_BITS - FP8_MAN_BITS;

/// Largest finite magnitude pattern (exponent 15, mantissa 7)
pub const FP8_MAX_MAGNITUDE: u8 = 0x7f;

/// Encode a 32-bit float as FP8 E4M3.
///
/// - exponent field zero (zero or fp32 subnormal) encodes as signed zero
/// - unbiased exponent > -7: re-biased, mantissa rounded half-up on bit 19
/// - unbiased exponent in (-10, -7]: fp8 subnormal, mantissa truncated
/// - unbiased exponent <= -10: signed zero
///
/// A rounding carry moves into the exponent; anything past 480 saturates.
pub fn encode_fp8(value: f32) -> u8 {
  let bits = value.to_bits();
  let sign = ((bits >> 31) as u8) << 7;
  let exp_field = ((bits >> FP32_MAN_BITS) & 0xff) as i32;
  let mantissa = bits & 0x7f_ffff;
  let exponent = exp_field - 127;

  let magnitude = if exp_field == 0 {
    0
  } else if exponent > -7 {
    let round = (mantissa >> (MAN_SHIFT - 1)) & 0x1;
    let man = (mantissa >> MAN_SHIFT) + round;
    let packed = (((exponent + FP8_BIAS) as u32) << FP8_MAN_BITS) + man;
    packed.min(FP8_MAX_MAGNITUDE as u32) as u8
  } else if exponent > -10 {
    // restore the hidden bit, then shift by the deficit below the fp8 minimum exponent
    let deficit = (-6 - exponent) as u32;
    (((1u32 << (FP32_MAN_BITS - deficit)) + (mantissa >> deficit)) >> MAN_SHIFT) as u8
  } else {
    0
  };

  sign | magnitude
}

/// Decode an FP8 E4M3 pattern back to a 32-bit float.
pub fn decode_fp8(code: u8) -> f32 {
  let sign = if code & 0x80 != 0 { -1.0 } else { 1.0 };
  let exponent = ((code >> FP8_MAN_BITS) & 0xf) as i32;
  let mantissa = (code & 0x7) as f32 / 8.0;

  if exponent == 0 {
    sign * 2f32.powi(1 - FP8_BIAS) * mantissa
  } else {
    sign * 2f32.powi(exponent - FP8_BIAS) * (1.0 + mantissa)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_zero_and_one() {
    assert_eq!(encode_fp8(0.0), 0x00);
    assert_eq!(encode_fp8(-0.0), 0x80);
    // sign 0, exponent field 7, mantissa 0
    assert_eq!(encode_fp8(1.0), 0b0_0111_000);
    assert_eq!(encode_fp8(-1.0), 0b1_0111_000);
  }

  #[test]
  fn test_normal_range() {
    assert_eq!(encode_fp8(0.5), 0x30);
    assert_eq!(encode_fp8(2.0), 0x40);
    assert_eq!(encode_fp8(3.0), 0x44);
    assert_eq!(encode_fp8(-2.5), 0xc2);
    assert_eq!(encode_fp8(0.1), 0x1d);
    assert_eq!(encode_fp8(1.0 / 3.0), 0x2b);
    assert_eq!(encode_fp8(240.0), 0x77);
    assert_eq!(encode_fp8(300.0), 0x79);
    // smallest normal 2^-6
    assert_eq!(encode_fp8(0.015625), 0x08);
  }

  #[test]
  fn test_round_half_up() {
    // 1.0625 sits exactly on the half bit
    assert_eq!(encode_fp8(1.0625), 0x39);
    assert_eq!(encode_fp8(1.125), 0x39);
    assert_eq!(encode_fp8(1.1875), 0x3a);
  }

  #[test]
  fn test_rounding_carry_and_saturation() {
    // mantissa rounds up to 8 and carries into the exponent
    assert_eq!(encode_fp8(1.9375), 0x40);
    assert_eq!(encode_fp8(255.0), 0x78);
    assert_eq!(encode_fp8(448.0), 0x7e);
    assert_eq!(encode_fp8(480.0), 0x7f);
    assert_eq!(encode_fp8(1.0e6), 0x7f);
    assert_eq!(encode_fp8(-1.0e6), 0xff);
    assert_eq!(encode_fp8(f32::INFINITY), 0x7f);
  }

  #[test]
  fn test_subnormal_range() {
    // unbiased exponent -7, -8, -9
    assert_eq!(encode_fp8(0.0078125), 0x04);
    assert_eq!(encode_fp8(0.01171875), 0x06);
    assert_eq!(encode_fp8(0.01), 0x05);
    assert_eq!(encode_fp8(0.00390625), 0x02);
    assert_eq!(encode_fp8(0.001953125), 0x01);
    // truncated, not rounded: 1.75 * 2^-9
    assert_eq!(encode_fp8(0.00341796875), 0x01);
  }

  #[test]
  fn test_underflow() {
    assert_eq!(encode_fp8(0.0009765625), 0x00);
    assert_eq!(encode_fp8(-0.0009765625), 0x80);
    assert_eq!(encode_fp8(1.0e-30), 0x00);
    // fp32 subnormal
    assert_eq!(encode_fp8(1.0e-40), 0x00);
  }

  #[test]
  fn test_stable_under_requantization() {
    for code in 0..=u8::MAX {
      assert_eq!(encode_fp8(decode_fp8(code)), code, "pattern {:#04x}", code);
    }
  }

  #[test]
  fn test_decode() {
    assert_eq!(decode_fp8(0x38), 1.0);
    assert_eq!(decode_fp8(0x7f), 480.0);
    assert_eq!(decode_fp8(0x01), 2f32.powi(-9));
    assert_eq!(decode_fp8(0xc2), -2.5);
  }
}
