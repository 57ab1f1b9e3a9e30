use std::fs;
use std::path::Path;

use crate::math::{quat_normalize, Vec3};
use crate::scene::PointCloud;
use crate::splat::Splat;

use crate::AppResult;

fn read_vec3_f32(bytes: &[u8]) -> Vec3 {
    let x = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let y = f32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let z = f32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    Vec3::new(x, y, z)
}

fn decode_scale_value(v: f32) -> f32 {
    if v > 0.0 {
        v
    } else {
        v.exp().max(1e-4)
    }
}

pub fn load_splat_file(path: &str) -> AppResult<PointCloud> {
    let data = fs::read(path)
        .map_err(|e| format!("failed to read '{}': {}", Path::new(path).display(), e))?;
    parse_splat(&data)
}

/// The .splat format carries no spherical harmonics beyond base color, so
/// the result is always a degree-0 scene.
pub fn parse_splat(data: &[u8]) -> AppResult<PointCloud> {
    const RECORD_SIZE: usize = 32;

    if data.len() % RECORD_SIZE != 0 {
        return Err(format!(
            "Invalid .splat file: size {} is not a multiple of 32 bytes (expected {} complete records)",
            data.len(),
            data.len() / RECORD_SIZE
        )
        .into());
    }

    if data.len() < RECORD_SIZE {
        return Err("SPLAT parse error: file too small".into());
    }

    let mut splats = Vec::with_capacity(data.len() / RECORD_SIZE);
    for chunk in data.chunks_exact(RECORD_SIZE) {
        let position = read_vec3_f32(&chunk[0..12]);
        let scale_raw = read_vec3_f32(&chunk[12..24]);
        let color = [chunk[24], chunk[25], chunk[26]];
        let opacity = (chunk[27] as f32 / 255.0).clamp(0.0, 1.0);

        let rotation = quat_normalize([
            chunk[28] as f32 / 127.5 - 1.0,
            chunk[29] as f32 / 127.5 - 1.0,
            chunk[30] as f32 / 127.5 - 1.0,
            chunk[31] as f32 / 127.5 - 1.0,
        ]);

        let scale = Vec3::new(
            decode_scale_value(scale_raw.x),
            decode_scale_value(scale_raw.y),
            decode_scale_value(scale_raw.z),
        );

        splats.push(Splat {
            position,
            color,
            opacity,
            scale,
            rotation,
        });
    }

    Ok(PointCloud::from_splats(splats))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(pos: [f32; 3], color: [u8; 3], opacity: u8) -> Vec<u8> {
        let mut rec = Vec::with_capacity(32);
        for v in pos {
            rec.extend_from_slice(&v.to_le_bytes());
        }
        for v in [0.1_f32, 0.1, 0.1] {
            rec.extend_from_slice(&v.to_le_bytes());
        }
        rec.extend_from_slice(&color);
        rec.push(opacity);
        rec.extend_from_slice(&[255, 127, 127, 127]); // ~identity quaternion
        rec
    }

    #[test]
    fn parses_records_into_degree_zero_scene() {
        let mut data = make_record([1.0, 2.0, 3.0], [255, 0, 0], 255);
        data.extend(make_record([-1.0, 0.0, 0.5], [0, 255, 0], 128));

        let pc = parse_splat(&data).expect("parse should succeed");
        assert_eq!(pc.len(), 2);
        assert_eq!(pc.sh_degree, 0);
        assert_eq!(pc.splats[0].color, [255, 0, 0]);
        assert!((pc.splats[1].opacity - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_misaligned_file() {
        let mut data = make_record([0.0; 3], [1, 2, 3], 10);
        data.pop();
        assert!(parse_splat(&data).is_err());
    }

    #[test]
    fn rejects_empty_file() {
        assert!(parse_splat(&[]).is_err());
    }
}
