use crate::math::Vec3;
use crate::sh;
use crate::splat::Splat;

/// A loaded gaussian scene: the immutable per-gaussian records plus the flat
/// spherical-harmonics coefficient table. `sh` holds `coeff_count(sh_degree)`
/// RGB triples per gaussian, DC first.
#[derive(Debug, Clone, Default)]
pub struct PointCloud {
    pub splats: Vec<Splat>,
    pub sh: Vec<[f32; 3]>,
    pub sh_degree: u8,
}

impl PointCloud {
    /// Build a degree-0 scene from splats whose color field is authoritative
    /// (`.splat` files, the demo generator).
    pub fn from_splats(splats: Vec<Splat>) -> Self {
        let sh = splats
            .iter()
            .map(|s| {
                sh::dc_from_base_color([
                    s.color[0] as f32 / 255.0,
                    s.color[1] as f32 / 255.0,
                    s.color[2] as f32 / 255.0,
                ])
            })
            .collect();
        Self {
            splats,
            sh,
            sh_degree: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.splats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.splats.is_empty()
    }

    pub fn coeffs_per_splat(&self) -> usize {
        sh::coeff_count(self.sh_degree)
    }

    /// Coefficient triples for one gaussian.
    pub fn sh_for(&self, index: usize) -> &[[f32; 3]] {
        let stride = self.coeffs_per_splat();
        &self.sh[index * stride..(index + 1) * stride]
    }

    /// AABB center of all splats, used as orbit target and camera framing.
    pub fn center(&self) -> Vec3 {
        if self.is_empty() {
            return Vec3::ZERO;
        }
        let mut min = Vec3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY);
        let mut max = Vec3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY);
        for s in &self.splats {
            min.x = min.x.min(s.position.x);
            min.y = min.y.min(s.position.y);
            min.z = min.z.min(s.position.z);
            max.x = max.x.max(s.position.x);
            max.y = max.y.max(s.position.y);
            max.z = max.z.max(s.position.z);
        }
        Vec3::new(
            (min.x + max.x) * 0.5,
            (min.y + max.y) * 0.5,
            (min.z + max.z) * 0.5,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splat_at(pos: Vec3) -> Splat {
        Splat {
            position: pos,
            color: [128, 64, 200],
            opacity: 1.0,
            scale: Vec3::new(0.1, 0.1, 0.1),
            rotation: [1.0, 0.0, 0.0, 0.0],
        }
    }

    #[test]
    fn from_splats_carries_one_dc_triple_each() {
        let pc = PointCloud::from_splats(vec![splat_at(Vec3::ZERO), splat_at(Vec3::ZERO)]);
        assert_eq!(pc.sh_degree, 0);
        assert_eq!(pc.sh.len(), 2);
        assert_eq!(pc.sh_for(1).len(), 1);
    }

    #[test]
    fn center_is_aabb_midpoint() {
        let pc = PointCloud::from_splats(vec![
            splat_at(Vec3::new(-2.0, 0.0, 4.0)),
            splat_at(Vec3::new(6.0, 2.0, -4.0)),
        ]);
        let c = pc.center();
        assert_eq!((c.x, c.y, c.z), (2.0, 1.0, 0.0));
    }

    #[test]
    fn empty_scene_centers_at_origin() {
        assert_eq!(PointCloud::default().center(), Vec3::ZERO);
    }
}
