//! Bit-level helpers shared by every driver.
//!
//! These are thin by-value wrappers around [`bit_field::BitField`], which works in
//! place. Shadow registers are plain integers, and updating a copy then writing it
//! to the bus before storing it back keeps the "shadow changes only after a
//! successful write" rule easy to follow in the drivers.
//!
//! Positions are always chosen by the driver (0-7 for register bytes, 0-31 for the
//! 32-bit conversion word), so there are no error cases. An out-of-range position
//! is a driver bug and panics inside `bit_field`.
use std::ops::Range;

use bit_field::BitField;

/// Return `value` with the bit at `position` set to `state`.
///
/// All other bits are unchanged.
pub fn with_bit<T: BitField + Copy>(value: T, position: usize, state: bool) -> T {
    let mut updated = value;
    updated.set_bit(position, state);
    updated
}

/// Check the bit at `position` of `value`.
pub fn bit_is_set<T: BitField>(value: T, position: usize) -> bool {
    value.get_bit(position)
}

/// Return `value` with the bits in `range` replaced by `field`.
///
/// `field` is given right-aligned, so `with_field(0x9C, 5..7, 0b11)` sets bits 5
/// and 6.
pub fn with_field<T: BitField + Copy>(value: T, range: Range<usize>, field: T) -> T {
    let mut updated = value;
    updated.set_bits(range, field);
    updated
}

/// Extract the bits in `range` of `value`, right-aligned.
pub fn field<T: BitField>(value: T, range: Range<usize>) -> T {
    value.get_bits(range)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_bit_round_trip_leaves_other_bits() {
        for value in [0x00u8, 0xFF, 0xA5, 0x5A, 0x9C] {
            for position in 0..8 {
                for state in [true, false] {
                    let updated = with_bit(value, position, state);
                    assert_eq!(bit_is_set(updated, position), state);
                    let mask = !(1u8 << position);
                    assert_eq!(updated & mask, value & mask);
                }
            }
        }
    }

    #[test]
    fn word_bit_round_trip_leaves_other_bits() {
        let value: i32 = 0x0003_FFFF;
        for position in 0..32 {
            for state in [true, false] {
                let updated = with_bit(value, position, state);
                assert_eq!(bit_is_set(updated, position), state);
                let mask = !(1i32 << position);
                assert_eq!(updated & mask, value & mask);
            }
        }
    }

    #[test]
    fn sign_bit_of_18_bit_reading_can_be_cleared() {
        let reading: i32 = 0x2_0001;
        assert!(bit_is_set(reading, 17));
        assert_eq!(with_bit(reading, 17, false), 1);
    }

    #[test]
    fn fields() {
        assert_eq!(with_field(0x9Cu8, 5..7, 0b11), 0xFC);
        assert_eq!(with_field(0xFCu8, 2..4, 0b00), 0xF0);
        assert_eq!(field(0x9Cu8, 2..4), 0b11);
        assert_eq!(field(0x9Cu8, 0..2), 0b00);
    }
}
