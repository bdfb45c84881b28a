//! Numeric helpers shared by the header model and the DSP register layer.
//!
//! - big-endian packing of 1/2/4-byte integers (SigmaDSP byte order)
//! - fixed-point <-> float for the 8.24 (ADAU14xx) and 5.23 (ADAU1x0x) formats
//! - linear <-> dB conversion and clamping

use std::fmt;

use crate::error::SigmaDspError;

/// Decode up to 8 big-endian bytes into an unsigned integer.
#[must_use]
pub fn bytes_to_int(data: &[u8]) -> u64 {
    data.iter()
        .take(8)
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

/// Encode the low `buf.len()` bytes of `value` big-endian into `buf`.
pub fn int_to_bytes(value: u64, buf: &mut [u8]) {
    let len = buf.len();
    for (i, b) in buf.iter_mut().enumerate() {
        let shift = (len - 1 - i) * 8;
        *b = if shift >= 64 { 0 } else { (value >> shift) as u8 };
    }
}

#[must_use]
pub const fn int16_to_bytes(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

#[must_use]
pub const fn int32_to_bytes(value: u32) -> [u8; 4] {
    value.to_be_bytes()
}

pub fn bytes_to_int16(data: &[u8]) -> Result<u16, SigmaDspError> {
    let arr: [u8; 2] = data.try_into().map_err(|_| SigmaDspError::LengthMismatch {
        expected: 2,
        actual: data.len(),
    })?;
    Ok(u16::from_be_bytes(arr))
}

pub fn bytes_to_int32(data: &[u8]) -> Result<u32, SigmaDspError> {
    let arr: [u8; 4] = data.try_into().map_err(|_| SigmaDspError::LengthMismatch {
        expected: 4,
        actual: data.len(),
    })?;
    Ok(u32::from_be_bytes(arr))
}

/// Signed fixed-point parameter formats used by the supported chip families.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FixedPointFormat {
    /// 32 bit word, 8 integer and 24 fractional bits (ADAU14xx).
    Q8_24,
    /// 28 bit word, 5 integer and 23 fractional bits (ADAU1x0x).
    Q5_23,
}

impl FixedPointFormat {
    #[must_use]
    pub const fn fractional_bits(self) -> u32 {
        match self {
            Self::Q8_24 => 24,
            Self::Q5_23 => 23,
        }
    }

    /// Bits available for the magnitude (word width minus the sign bit).
    #[must_use]
    pub const fn magnitude_bits(self) -> u32 {
        match self {
            Self::Q8_24 => 31,
            Self::Q5_23 => 27,
        }
    }

    fn scale(self) -> f64 {
        f64::from(1u32 << self.fractional_bits())
    }

    fn limit(self) -> i64 {
        1i64 << self.magnitude_bits()
    }

    /// Convert a float to its fractional integer, truncating toward zero.
    pub fn float_to_frac(self, value: f64) -> Result<i32, SigmaDspError> {
        let scaled = (value * self.scale()).trunc();
        if !scaled.is_finite() || scaled.abs() >= self.limit() as f64 {
            return Err(SigmaDspError::FixedPointOverflow {
                value,
                format: self,
            });
        }
        Ok(scaled as i32)
    }

    pub fn frac_to_float(self, value: i32) -> Result<f64, SigmaDspError> {
        if i64::from(value).abs() >= self.limit() {
            return Err(SigmaDspError::FixedPointOverflow {
                value: f64::from(value),
                format: self,
            });
        }
        Ok(f64::from(value) / self.scale())
    }

    /// Sign-extend a raw register word to the format's signed value.
    #[must_use]
    pub const fn sign_extend(self, word: u32) -> i32 {
        let unused = 31 - self.magnitude_bits();
        ((word << unused) as i32) >> unused
    }
}

impl fmt::Display for FixedPointFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Q8_24 => f.write_str("8.24"),
            Self::Q5_23 => f.write_str("5.23"),
        }
    }
}

#[must_use]
pub fn db_to_linear(value_db: f64) -> f64 {
    10f64.powf(value_db / 20.0)
}

/// Linear to dB; a linear value of zero maps to negative infinity.
#[must_use]
pub fn linear_to_db(value_linear: f64) -> f64 {
    if value_linear == 0.0 {
        return f64::NEG_INFINITY;
    }
    20.0 * value_linear.log10()
}

#[must_use]
pub fn clamp(value: f64, min_value: f64, max_value: f64) -> f64 {
    if value > max_value {
        max_value
    } else if value < min_value {
        min_value
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn big_endian_packing() {
        assert_eq!(bytes_to_int(&[0x12, 0x34]), 0x1234);
        assert_eq!(bytes_to_int(&[0xAA, 0xBB, 0xCC, 0xDD]), 0xAABB_CCDD);
        let mut buf = [0u8; 3];
        int_to_bytes(0x0001_0203, &mut buf);
        assert_eq!(buf, [0x01, 0x02, 0x03]);
        assert_eq!(int16_to_bytes(0x081C), [0x08, 0x1C]);
        assert_eq!(bytes_to_int32(&[0, 0, 0x10, 0]).unwrap(), 0x1000);
        assert!(bytes_to_int16(&[1, 2, 3]).is_err());
    }

    #[test]
    fn unity_in_both_formats() {
        assert_eq!(FixedPointFormat::Q8_24.float_to_frac(1.0).unwrap(), 0x0100_0000);
        assert_eq!(FixedPointFormat::Q5_23.float_to_frac(1.0).unwrap(), 0x0080_0000);
        assert_eq!(FixedPointFormat::Q8_24.frac_to_float(0x0080_0000).unwrap(), 0.5);
    }

    #[test]
    fn overflow_is_reported_not_wrapped() {
        assert!(FixedPointFormat::Q8_24.float_to_frac(128.0).is_err());
        assert!(FixedPointFormat::Q8_24.float_to_frac(127.5).is_ok());
        assert!(FixedPointFormat::Q5_23.float_to_frac(16.0).is_err());
        assert!(FixedPointFormat::Q5_23.float_to_frac(-16.0).is_err());
        assert!(FixedPointFormat::Q5_23.float_to_frac(f64::NAN).is_err());
        assert!(FixedPointFormat::Q5_23.frac_to_float(1 << 27).is_err());
    }

    #[test]
    fn sign_extension_of_28_bit_words() {
        // -1.0 in 5.23, as stored in the low 28 bits of a register word
        let word = 0x0F80_0000u32;
        let v = FixedPointFormat::Q5_23.sign_extend(word);
        assert_eq!(FixedPointFormat::Q5_23.frac_to_float(v).unwrap(), -1.0);
        assert_eq!(FixedPointFormat::Q8_24.sign_extend(0xFF00_0000), -0x0100_0000);
    }

    #[test]
    fn decibels() {
        assert_eq!(linear_to_db(0.0), f64::NEG_INFINITY);
        assert!((linear_to_db(0.5) + 6.0206).abs() < 1e-4);
        assert!((db_to_linear(-6.0206) - 0.5).abs() < 1e-5);
        assert_eq!(clamp(1.7, 0.0, 1.0), 1.0);
        assert_eq!(clamp(-0.1, 0.0, 1.0), 0.0);
    }
}
