//! Compact-bits (`nBits`) target encoding and the big-endian 256-bit target
//! arithmetic needed to retarget difficulty, grounded on
//! `zebra-consensus::block::check::difficulty_is_valid` (which expands a
//! header's compact bits and compares the block hash against the
//! threshold) but implementing the expand/compress and retarget math that
//! crate left to `zebra_chain::work::difficulty`, since this core has no
//! such module.

/// A 256-bit target threshold, big-endian.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct Target(pub [u8; 32]);

impl Target {
    pub fn from_compact(bits: u32) -> Target {
        let exponent = (bits >> 24) as usize;
        let mut mantissa = bits & 0x007f_ffff;
        if bits & 0x0080_0000 != 0 {
            // Negative targets are never valid; treat as zero.
            mantissa = 0;
        }

        let mut out = [0u8; 32];
        if exponent <= 3 {
            let mantissa = mantissa >> (8 * (3 - exponent));
            out[29..32].copy_from_slice(&mantissa.to_be_bytes()[1..4]);
        } else {
            let shift = exponent - 3;
            if shift <= 29 {
                let pos = 32 - 3 - shift;
                out[pos..pos + 3].copy_from_slice(&mantissa.to_be_bytes()[1..4]);
            }
        }
        Target(out)
    }

    pub fn to_compact(self) -> u32 {
        let first_nonzero = self.0.iter().position(|&b| b != 0);
        let first_nonzero = match first_nonzero {
            Some(i) => i,
            None => return 0,
        };
        let size = 32 - first_nonzero;
        let mut mantissa_bytes = [0u8; 4];
        for (i, byte) in self.0[first_nonzero..(first_nonzero + 3).min(32)].iter().enumerate() {
            mantissa_bytes[1 + i] = *byte;
        }
        let mut mantissa = u32::from_be_bytes(mantissa_bytes);

        // If the high bit of the mantissa is set, it would be read back as a
        // sign bit; shift down one byte and bump size to compensate.
        let (mantissa, size) = if mantissa & 0x0080_0000 != 0 {
            (mantissa >> 8, size + 1)
        } else {
            mantissa &= 0x00ff_ffff;
            (mantissa, size)
        };

        (size as u32) << 24 | mantissa
    }

    /// `self * numerator / denominator`, clamped to `[1, max]`.
    pub fn scale(self, numerator: u64, denominator: u64, max: Target) -> Target {
        let mut digits = self.0;
        // multiply by numerator
        let mut carry: u128 = 0;
        for byte in digits.iter_mut().rev() {
            let product = (*byte as u128) * (numerator as u128) + carry;
            *byte = (product & 0xff) as u8;
            carry = product >> 8;
        }
        // divide by denominator (schoolbook long division, MSB first)
        let mut remainder: u128 = carry;
        // Absorb any overflow from the multiply into the top by saturating.
        if remainder > 0 {
            return max;
        }
        let mut quotient = [0u8; 32];
        let mut rem: u128 = 0;
        for (i, byte) in digits.iter().enumerate() {
            rem = (rem << 8) | (*byte as u128);
            quotient[i] = (rem / denominator as u128) as u8;
            rem %= denominator as u128;
        }

        let result = Target(quotient);
        if result.0.iter().all(|&b| b == 0) {
            Target::one()
        } else if result > max {
            max
        } else {
            result
        }
    }

    pub fn one() -> Target {
        let mut bytes = [0u8; 32];
        bytes[31] = 1;
        Target(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_round_trips_for_typical_bits() {
        bw_test::init();
        for bits in [0x1d00_ffffu32, 0x1b0404cb, 0x207fffff] {
            let target = Target::from_compact(bits);
            assert_eq!(target.to_compact(), bits);
        }
    }

    #[test]
    fn scaling_up_increases_the_target() {
        bw_test::init();
        let max = Target::from_compact(0x207f_ffff);
        let base = Target::from_compact(0x1d00_ffff);
        let scaled = base.scale(2, 1, max);
        assert!(scaled > base);
    }

    #[test]
    fn scaling_clamps_to_max() {
        bw_test::init();
        let max = Target::from_compact(0x1d00_ffff);
        let base = max;
        let scaled = base.scale(1000, 1, max);
        assert_eq!(scaled, max);
    }
}
