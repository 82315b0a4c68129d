//! Warp-wide all-reduce primitives
//!
//! A warp is 32 lanes advancing in lockstep. Lane-local values are held as
//! one `[f32; WARP_SIZE]` array indexed by lane id; every step of a kernel
//! updates all 32 entries before the next step starts, which is exactly the
//! ordering a hardware wavefront gives. The reductions below are the
//! register-only xor butterfly (`__shfl_xor_sync`): five exchange rounds
//! with lane masks 1, 2, 4, 8, 16, after which every lane holds the result.

/// Lanes per cooperative group (wave32)
pub const WARP_SIZE: usize = 32;

/// Butterfly rounds: log2(WARP_SIZE)
pub const BUTTERFLY_ROUNDS: u32 = WARP_SIZE.trailing_zeros();

/// One `f32` register per lane
pub type LaneValues = [f32; WARP_SIZE];

/// Every lane reads the register of lane `lane ^ lane_mask`
#[inline]
pub fn shfl_xor(values: &LaneValues, lane_mask: usize) -> LaneValues {
    std::array::from_fn(|lane| values[lane ^ lane_mask])
}

#[inline]
fn butterfly_all_reduce(mut values: LaneValues, combine: impl Fn(f32, f32) -> f32) -> LaneValues {
    let mut lane_mask = 1;
    while lane_mask < WARP_SIZE {
        let partner = shfl_xor(&values, lane_mask);
        for lane in 0..WARP_SIZE {
            values[lane] = combine(values[lane], partner[lane]);
        }
        lane_mask <<= 1;
    }
    values
}

/// All-reduce max. Identity is `-inf`.
#[inline]
pub fn warp_all_reduce_max(values: LaneValues) -> LaneValues {
    butterfly_all_reduce(values, f32::max)
}

/// All-reduce sum. Identity is `0.0`.
///
/// Each round adds the same two operands on both partner lanes, and IEEE
/// addition is commutative, so all lanes end bit-identical.
#[inline]
pub fn warp_all_reduce_sum(values: LaneValues) -> LaneValues {
    butterfly_all_reduce(values, |a, b| a + b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lane_ids() -> LaneValues {
        std::array::from_fn(|lane| lane as f32)
    }

    #[test]
    fn test_five_rounds() {
        assert_eq!(BUTTERFLY_ROUNDS, 5);
    }

    #[test]
    fn test_shfl_xor_pairs_lanes() {
        let swapped = shfl_xor(&lane_ids(), 1);
        assert_eq!(swapped[0], 1.0);
        assert_eq!(swapped[1], 0.0);
        let swapped = shfl_xor(&lane_ids(), 16);
        assert_eq!(swapped[3], 19.0);
        assert_eq!(swapped[31], 15.0);
    }

    #[test]
    fn test_sum_reaches_every_lane() {
        let total = warp_all_reduce_sum(lane_ids());
        // 0 + 1 + ... + 31
        assert!(total.iter().all(|&v| v == 496.0));
    }

    #[test]
    fn test_max_reaches_every_lane() {
        let mut values = [f32::NEG_INFINITY; WARP_SIZE];
        values[17] = 3.5;
        values[2] = -1.0;
        let max = warp_all_reduce_max(values);
        assert!(max.iter().all(|&v| v == 3.5));
    }

    #[test]
    fn test_identity_lanes_contribute_nothing() {
        // Only lane 0 carries data; idle lanes hold the identities
        let mut sums = [0.0f32; WARP_SIZE];
        sums[0] = 0.75;
        assert!(warp_all_reduce_sum(sums).iter().all(|&v| v == 0.75));

        let mut maxes = [f32::NEG_INFINITY; WARP_SIZE];
        maxes[0] = -1e9;
        assert!(warp_all_reduce_max(maxes).iter().all(|&v| v == -1e9));
    }

    #[test]
    fn test_sum_is_bit_identical_across_lanes() {
        let values: LaneValues = std::array::from_fn(|lane| 0.1 * (lane as f32 + 1.0).sqrt());
        let total = warp_all_reduce_sum(values);
        let first = total[0].to_bits();
        assert!(total.iter().all(|v| v.to_bits() == first));

        let reference: f32 = values.iter().sum();
        assert!((total[0] - reference).abs() < 1e-5);
    }
}
