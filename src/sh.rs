use crate::math::Vec3;

// Real spherical-harmonics basis constants (degrees 0-3), matching the
// coefficient convention of 3DGS .ply exports.
pub const SH_C0: f32 = 0.282_094_79;
pub const SH_C1: f32 = 0.488_602_51;
pub const SH_C2: [f32; 5] = [1.092_548_4, -1.092_548_4, 0.315_391_57, -1.092_548_4, 0.546_274_2];
pub const SH_C3: [f32; 7] = [
    -0.590_043_6,
    2.890_611_4,
    -0.457_045_8,
    0.373_176_33,
    -0.457_045_8,
    1.445_305_7,
    -0.590_043_6,
];

pub const MAX_SH_DEGREE: u8 = 3;

/// Number of coefficient triples carried per gaussian at a given degree.
pub fn coeff_count(degree: u8) -> usize {
    let d = degree.min(MAX_SH_DEGREE) as usize;
    (d + 1) * (d + 1)
}

/// Degree implied by a per-gaussian coefficient-triple count, if it matches
/// one of the supported band layouts exactly.
pub fn degree_for_coeff_count(count: usize) -> Option<u8> {
    (0..=MAX_SH_DEGREE).find(|&d| coeff_count(d) == count)
}

/// Evaluate outgoing color for a view direction from SH coefficient triples.
/// `coeffs` holds at least `coeff_count(degree)` entries; higher bands are
/// ignored. Output is linear RGB, unclamped apart from the negative floor.
pub fn eval_sh_color(coeffs: &[[f32; 3]], degree: u8, dir: Vec3) -> [f32; 3] {
    let d = dir.normalize();
    let (x, y, z) = (d.x, d.y, d.z);

    let mut color = [0.0f32; 3];
    let mut add = |basis: f32, c: &[f32; 3]| {
        color[0] += basis * c[0];
        color[1] += basis * c[1];
        color[2] += basis * c[2];
    };

    add(SH_C0, &coeffs[0]);

    if degree >= 1 {
        add(-SH_C1 * y, &coeffs[1]);
        add(SH_C1 * z, &coeffs[2]);
        add(-SH_C1 * x, &coeffs[3]);
    }

    if degree >= 2 {
        let (xx, yy, zz) = (x * x, y * y, z * z);
        let (xy, yz, xz) = (x * y, y * z, x * z);
        add(SH_C2[0] * xy, &coeffs[4]);
        add(SH_C2[1] * yz, &coeffs[5]);
        add(SH_C2[2] * (2.0 * zz - xx - yy), &coeffs[6]);
        add(SH_C2[3] * xz, &coeffs[7]);
        add(SH_C2[4] * (xx - yy), &coeffs[8]);

        if degree >= 3 {
            add(SH_C3[0] * y * (3.0 * xx - yy), &coeffs[9]);
            add(SH_C3[1] * xy * z, &coeffs[10]);
            add(SH_C3[2] * y * (4.0 * zz - xx - yy), &coeffs[11]);
            add(SH_C3[3] * z * (2.0 * zz - 3.0 * xx - 3.0 * yy), &coeffs[12]);
            add(SH_C3[4] * x * (4.0 * zz - xx - yy), &coeffs[13]);
            add(SH_C3[5] * z * (xx - yy), &coeffs[14]);
            add(SH_C3[6] * x * (xx - 3.0 * yy), &coeffs[15]);
        }
    }

    // DC convention: stored coefficients are offset so mid-gray is zero.
    [
        (color[0] + 0.5).max(0.0),
        (color[1] + 0.5).max(0.0),
        (color[2] + 0.5).max(0.0),
    ]
}

/// Inverse of the degree-0 resolve: the DC coefficient that reproduces a
/// plain [0, 1] color through `eval_sh_color` at degree 0.
pub fn dc_from_base_color(color: [f32; 3]) -> [f32; 3] {
    [
        (color[0] - 0.5) / SH_C0,
        (color[1] - 0.5) / SH_C0,
        (color[2] - 0.5) / SH_C0,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coeff_counts_match_band_layout() {
        assert_eq!(coeff_count(0), 1);
        assert_eq!(coeff_count(1), 4);
        assert_eq!(coeff_count(2), 9);
        assert_eq!(coeff_count(3), 16);
        assert_eq!(degree_for_coeff_count(16), Some(3));
        assert_eq!(degree_for_coeff_count(5), None);
    }

    #[test]
    fn degree_zero_is_view_independent() {
        let coeffs = [[0.7, -0.2, 1.3]];
        let a = eval_sh_color(&coeffs, 0, Vec3::new(0.0, 0.0, 1.0));
        let b = eval_sh_color(&coeffs, 0, Vec3::new(0.3, -0.9, 0.1));
        for (ca, cb) in a.iter().zip(b.iter()) {
            assert!((ca - cb).abs() < 1e-6);
        }
    }

    #[test]
    fn dc_roundtrips_through_degree_zero() {
        let base = [0.25, 0.5, 0.9];
        let dc = dc_from_base_color(base);
        let out = eval_sh_color(&[dc], 0, Vec3::new(0.0, 0.0, 1.0));
        for (o, b) in out.iter().zip(base.iter()) {
            assert!((o - b).abs() < 1e-5);
        }
    }

    #[test]
    fn degree_one_band_flips_with_direction() {
        // Only the z-linear band set: color difference along +z vs -z must be
        // symmetric around the DC term.
        let mut coeffs = vec![[0.0, 0.0, 0.0]; 4];
        coeffs[2] = [1.0, 1.0, 1.0];
        let up = eval_sh_color(&coeffs, 1, Vec3::new(0.0, 0.0, 1.0));
        let down = eval_sh_color(&coeffs, 1, Vec3::new(0.0, 0.0, -1.0));
        assert!(up[0] > 0.5 && down[0] < 0.5);
        assert!(((up[0] - 0.5) - (0.5 - down[0])).abs() < 1e-6);
    }
}
