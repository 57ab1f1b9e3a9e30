use crate::splat::ProjectedSplat;

// Block geometry shared with shaders/radix_sort.metal: the GPU kernels
// process one block per threadgroup, so the CPU engine uses the same
// partitioning to stay pass-for-pass equivalent.
pub const SORT_BLOCK_SIZE: usize = 256;
pub const RADIX_BITS: u32 = 8;
pub const RADIX_BUCKETS: usize = 1 << RADIX_BITS;
pub const RADIX_PASSES: u32 = 32 / RADIX_BITS;

/// Map an f32 to a u32 whose unsigned order matches the float order,
/// including negatives: flip all bits of negative values, set the sign bit
/// of non-negative ones.
pub fn float_to_sortable_bits(value: f32) -> u32 {
    let bits = value.to_bits();
    if bits & 0x8000_0000 != 0 {
        !bits
    } else {
        bits | 0x8000_0000
    }
}

/// Sort key for a view-space depth. Complemented so that ascending key
/// order walks depth descending: splats draw back-to-front, which is the
/// correct order for (one, one-minus-source-alpha) compositing.
pub fn depth_sort_key(depth: f32) -> u32 {
    !float_to_sortable_bits(depth)
}

/// Least-significant-digit radix sort of (key, index) pairs, ascending by
/// key. Stable.
///
/// Structure mirrors the device kernels: per-block digit histograms, one
/// flat exclusive scan over the digit-major table, then a scatter that
/// writes each element to its block's running offset for that digit. The
/// GPU ping-pongs two fixed buffer pairs (an even pass count lands the
/// result back in the first); here the swap is a `mem::swap` per pass.
pub fn radix_sort_pairs(keys: &mut Vec<u32>, indices: &mut Vec<u32>) {
    debug_assert_eq!(keys.len(), indices.len());
    let count = keys.len();
    if count <= 1 {
        return;
    }
    let num_blocks = count.div_ceil(SORT_BLOCK_SIZE);

    let mut keys_out = vec![0u32; count];
    let mut indices_out = vec![0u32; count];
    let mut histograms = vec![0u32; num_blocks * RADIX_BUCKETS];
    let digit_mask = (RADIX_BUCKETS - 1) as u32;

    for pass in 0..RADIX_PASSES {
        let shift = pass * RADIX_BITS;
        histograms.fill(0);

        for (block, chunk) in keys.chunks(SORT_BLOCK_SIZE).enumerate() {
            for &key in chunk {
                let digit = ((key >> shift) & digit_mask) as usize;
                histograms[digit * num_blocks + block] += 1;
            }
        }

        // Exclusive scan over (digit-major, block-minor) counts: each entry
        // becomes the global base offset for that block's run of that digit.
        let mut running = 0u32;
        for slot in histograms.iter_mut() {
            let here = *slot;
            *slot = running;
            running += here;
        }

        // Scatter walks each block in element order, so elements sharing a
        // (block, digit) pair keep their relative order -- the stability the
        // next pass depends on.
        for (block, chunk) in keys.chunks(SORT_BLOCK_SIZE).enumerate() {
            let base = block * SORT_BLOCK_SIZE;
            for (i, &key) in chunk.iter().enumerate() {
                let digit = ((key >> shift) & digit_mask) as usize;
                let slot = &mut histograms[digit * num_blocks + block];
                let dst = *slot as usize;
                *slot += 1;
                keys_out[dst] = key;
                indices_out[dst] = indices[base + i];
            }
        }

        std::mem::swap(keys, &mut keys_out);
        std::mem::swap(indices, &mut indices_out);
    }
}

/// Reorder projected splats back-to-front (farthest first).
pub fn sort_by_depth(projected_splats: &mut Vec<ProjectedSplat>) {
    let count = projected_splats.len();
    if count <= 1 {
        return;
    }

    let mut keys: Vec<u32> = projected_splats
        .iter()
        .map(|s| depth_sort_key(s.depth))
        .collect();
    let mut indices: Vec<u32> = (0..count as u32).collect();
    radix_sort_pairs(&mut keys, &mut indices);

    let mut sorted = Vec::with_capacity(count);
    for &i in &indices {
        sorted.push(projected_splats[i as usize]);
    }
    *projected_splats = sorted;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    fn seeded_floats(count: usize, seed: u64) -> Vec<f32> {
        // Draw raw bit patterns for full-range coverage, rejecting NaNs.
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let mut out = Vec::with_capacity(count);
        while out.len() < count {
            let v = f32::from_bits(rng.random::<u32>());
            if !v.is_nan() {
                out.push(v);
            }
        }
        out
    }

    fn seeded_keys(count: usize, seed: u64) -> Vec<u32> {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        (0..count).map(|_| rng.random::<u32>()).collect()
    }

    fn splat_at_depth(depth: f32) -> ProjectedSplat {
        ProjectedSplat {
            screen_x: 0.0,
            screen_y: 0.0,
            depth,
            radius_x: 1.0,
            radius_y: 1.0,
            color: [255, 255, 255],
            opacity: 1.0,
            inv_cov_a: 1.0,
            inv_cov_b: 0.0,
            inv_cov_c: 1.0,
            original_index: 0,
        }
    }

    #[test]
    fn transform_preserves_order_on_known_extremes() {
        let values = [
            f32::NEG_INFINITY,
            f32::MIN,
            -1.0e30,
            -2.0,
            -1.0e-40, // subnormal
            0.0,
            1.0e-40,
            2.0,
            1.0e30,
            f32::MAX,
            f32::INFINITY,
        ];
        for pair in values.windows(2) {
            assert!(
                float_to_sortable_bits(pair[0]) < float_to_sortable_bits(pair[1]),
                "transform not increasing across {} -> {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn transform_preserves_order_on_random_floats() {
        let mut values = seeded_floats(4096, 0xD1CE);
        values.sort_by(|a, b| a.partial_cmp(b).expect("no NaNs generated"));
        values.dedup();
        for pair in values.windows(2) {
            assert!(float_to_sortable_bits(pair[0]) < float_to_sortable_bits(pair[1]));
        }
    }

    #[test]
    fn radix_sorts_keys_ascending() {
        let mut keys = seeded_keys(10_000, 42);
        let mut indices: Vec<u32> = (0..keys.len() as u32).collect();
        let mut expected = keys.clone();
        expected.sort_unstable();

        radix_sort_pairs(&mut keys, &mut indices);
        assert_eq!(keys, expected);
        for pair in keys.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn radix_indices_form_a_bijection() {
        let original = seeded_keys(5000, 7);
        let mut keys = original.clone();
        let mut indices: Vec<u32> = (0..keys.len() as u32).collect();
        radix_sort_pairs(&mut keys, &mut indices);

        let mut seen = vec![false; original.len()];
        for (&key, &idx) in keys.iter().zip(indices.iter()) {
            assert!(!seen[idx as usize], "index {idx} emitted twice");
            seen[idx as usize] = true;
            // Each index must still pair with the key it was born with.
            assert_eq!(original[idx as usize], key);
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn sorting_sorted_input_is_identity() {
        let mut keys = seeded_keys(3000, 99);
        let mut indices: Vec<u32> = (0..keys.len() as u32).collect();
        radix_sort_pairs(&mut keys, &mut indices);

        let sorted_keys = keys.clone();
        let mut second_indices: Vec<u32> = (0..keys.len() as u32).collect();
        radix_sort_pairs(&mut keys, &mut second_indices);

        assert_eq!(keys, sorted_keys);
        // A stable sort of an already-sorted sequence moves nothing.
        assert_eq!(
            second_indices,
            (0..sorted_keys.len() as u32).collect::<Vec<_>>()
        );
    }

    #[test]
    fn equal_keys_yield_identity_permutation() {
        let mut keys = vec![0xABCD_1234u32; 513];
        let mut indices: Vec<u32> = (0..keys.len() as u32).collect();
        radix_sort_pairs(&mut keys, &mut indices);
        assert_eq!(indices, (0..513u32).collect::<Vec<_>>());
    }

    #[test]
    fn empty_and_single_inputs_are_untouched() {
        let mut keys: Vec<u32> = Vec::new();
        let mut indices: Vec<u32> = Vec::new();
        radix_sort_pairs(&mut keys, &mut indices);
        assert!(keys.is_empty());

        let mut keys = vec![5u32];
        let mut indices = vec![0u32];
        radix_sort_pairs(&mut keys, &mut indices);
        assert_eq!(keys, vec![5]);
        assert_eq!(indices, vec![0]);
    }

    #[test]
    fn depth_order_is_farthest_first() {
        let mut splats: Vec<ProjectedSplat> = [5.0f32, -2.0, 0.0, 3.0]
            .iter()
            .map(|&d| splat_at_depth(d))
            .collect();
        sort_by_depth(&mut splats);

        let depths: Vec<f32> = splats.iter().map(|s| s.depth).collect();
        assert_eq!(depths, vec![5.0, 3.0, 0.0, -2.0]);
        assert_eq!(splats.len(), 4);
    }

    #[test]
    fn depth_keys_are_monotonic_after_sort() {
        let mut splats: Vec<ProjectedSplat> = seeded_floats(2000, 0xBEEF)
            .into_iter()
            .filter(|d| d.is_finite())
            .map(splat_at_depth)
            .collect();
        sort_by_depth(&mut splats);
        for pair in splats.windows(2) {
            assert!(depth_sort_key(pair[0].depth) <= depth_sort_key(pair[1].depth));
            assert!(pair[0].depth >= pair[1].depth);
        }
    }
}
