use std::fs;
use std::path::Path;

use crate::math::{clamp_u8, quat_normalize, sigmoid, Vec3};
use crate::scene::PointCloud;
use crate::sh;
use crate::splat::Splat;

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Debug, Clone, Copy)]
enum PlyType {
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Float,
    Double,
}

impl PlyType {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "char" | "int8" => Some(Self::Char),
            "uchar" | "uint8" => Some(Self::UChar),
            "short" | "int16" => Some(Self::Short),
            "ushort" | "uint16" => Some(Self::UShort),
            "int" | "int32" => Some(Self::Int),
            "uint" | "uint32" => Some(Self::UInt),
            "float" | "float32" => Some(Self::Float),
            "double" | "float64" => Some(Self::Double),
            _ => None,
        }
    }

    fn size(self) -> usize {
        match self {
            Self::Char | Self::UChar => 1,
            Self::Short | Self::UShort => 2,
            Self::Int | Self::UInt | Self::Float => 4,
            Self::Double => 8,
        }
    }

    fn read_as_f32(self, bytes: &[u8]) -> f32 {
        match self {
            Self::Char => i8::from_le_bytes([bytes[0]]) as f32,
            Self::UChar => u8::from_le_bytes([bytes[0]]) as f32,
            Self::Short => i16::from_le_bytes([bytes[0], bytes[1]]) as f32,
            Self::UShort => u16::from_le_bytes([bytes[0], bytes[1]]) as f32,
            Self::Int => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32,
            Self::UInt => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32,
            Self::Float => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            Self::Double => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&bytes[0..8]);
                f64::from_le_bytes(arr) as f32
            }
        }
    }
}

/// Where one vertex property lands. Resolved once at header-parse time so
/// the per-vertex loop is a plain dispatch.
#[derive(Debug, Clone, Copy)]
enum Field {
    X,
    Y,
    Z,
    Dc(usize),
    Rest(usize),
    Red,
    Green,
    Blue,
    Opacity,
    Scale(usize),
    Rot(usize),
    Skip,
}

#[derive(Debug, Clone, Copy)]
struct PlyProperty {
    field: Field,
    ty: PlyType,
}

fn field_for_name(name: &str) -> Field {
    match name {
        "x" => Field::X,
        "y" => Field::Y,
        "z" => Field::Z,
        "f_dc_0" => Field::Dc(0),
        "f_dc_1" => Field::Dc(1),
        "f_dc_2" => Field::Dc(2),
        "red" | "r" => Field::Red,
        "green" | "g" => Field::Green,
        "blue" | "b" => Field::Blue,
        "opacity" => Field::Opacity,
        "scale_0" => Field::Scale(0),
        "scale_1" => Field::Scale(1),
        "scale_2" => Field::Scale(2),
        "rot_0" => Field::Rot(0),
        "rot_1" => Field::Rot(1),
        "rot_2" => Field::Rot(2),
        "rot_3" => Field::Rot(3),
        _ => match name.strip_prefix("f_rest_") {
            Some(suffix) => match suffix.parse::<usize>() {
                Ok(i) => Field::Rest(i),
                Err(_) => Field::Skip,
            },
            None => Field::Skip,
        },
    }
}

fn find_ply_header_end(data: &[u8]) -> Option<usize> {
    let marker = b"end_header";
    let pos = data.windows(marker.len()).position(|w| w == marker)?;
    let mut end = pos + marker.len();
    while end < data.len() && data[end] != b'\n' {
        end += 1;
    }
    if end < data.len() {
        end += 1;
    }
    Some(end)
}

pub fn load_ply_file(path: &str) -> AppResult<PointCloud> {
    let data = fs::read(path)
        .map_err(|e| format!("failed to read '{}': {}", Path::new(path).display(), e))?;
    parse_ply(&data)
}

pub fn parse_ply(data: &[u8]) -> AppResult<PointCloud> {
    let header_end = find_ply_header_end(data).ok_or("PLY parse error: missing end_header")?;
    let header_text = std::str::from_utf8(&data[..header_end])?;

    let mut is_binary_le = false;
    let mut vertex_count: usize = 0;
    let mut in_vertex_element = false;
    let mut vertex_props: Vec<PlyProperty> = Vec::new();
    let mut rest_total: usize = 0;

    for line in header_text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("comment") {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }

        match parts[0] {
            "ply" => {}
            "format" => {
                if parts.len() >= 2 && parts[1] == "binary_little_endian" {
                    is_binary_le = true;
                }
            }
            "element" => {
                if parts.len() >= 3 {
                    in_vertex_element = parts[1] == "vertex";
                    if in_vertex_element {
                        vertex_count = parts[2].parse::<usize>()?;
                    }
                }
            }
            "property" if in_vertex_element => {
                if parts.len() >= 3 && parts[1] == "list" {
                    return Err(
                        "PLY parse error: list properties in vertex element are unsupported".into(),
                    );
                }
                if parts.len() >= 3 {
                    let ty = PlyType::parse(parts[1]).ok_or_else(|| {
                        format!("PLY parse error: unsupported property type '{}'", parts[1])
                    })?;
                    let field = field_for_name(parts[2]);
                    if let Field::Rest(i) = field {
                        rest_total = rest_total.max(i + 1);
                    }
                    vertex_props.push(PlyProperty { field, ty });
                }
            }
            _ => {}
        }
    }

    if !is_binary_le {
        return Err("PLY parse error: only binary_little_endian format is supported".into());
    }
    if vertex_count == 0 || vertex_props.is_empty() {
        return Err("PLY parse error: missing vertex element or properties".into());
    }
    if rest_total % 3 != 0 {
        return Err(format!(
            "PLY parse error: f_rest_* count {rest_total} is not divisible into RGB channels"
        )
        .into());
    }
    let coeffs_per_splat = 1 + rest_total / 3;
    let sh_degree = sh::degree_for_coeff_count(coeffs_per_splat).ok_or_else(|| {
        format!("PLY parse error: {coeffs_per_splat} SH coefficients match no degree 0-3 layout")
    })?;

    let stride: usize = vertex_props.iter().try_fold(0usize, |acc, prop| {
        acc.checked_add(prop.ty.size())
            .ok_or("PLY parse error: size overflow computing vertex stride")
    })?;
    if stride == 0 {
        return Err("PLY parse error: invalid vertex stride".into());
    }

    let vertex_bytes = vertex_count
        .checked_mul(stride)
        .ok_or("PLY parse error: size overflow computing buffer size")?;
    let needed = header_end
        .checked_add(vertex_bytes)
        .ok_or("PLY parse error: size overflow computing buffer size")?;
    if data.len() < needed {
        return Err(format!(
            "PLY parse error: file truncated (need {needed} bytes, have {})",
            data.len()
        )
        .into());
    }

    let rest_per_channel = rest_total / 3;
    let mut splats = Vec::with_capacity(vertex_count);
    let mut sh_table = Vec::with_capacity(vertex_count * coeffs_per_splat);
    let mut rest_scratch = vec![0.0_f32; rest_total];

    for i in 0..vertex_count {
        let vertex_offset = i
            .checked_mul(stride)
            .ok_or("PLY parse error: size overflow computing vertex offset")?;
        let base = header_end
            .checked_add(vertex_offset)
            .ok_or("PLY parse error: size overflow computing vertex offset")?;
        let end = base
            .checked_add(stride)
            .ok_or("PLY parse error: size overflow computing vertex offset")?;
        let chunk = data
            .get(base..end)
            .ok_or("PLY parse error: vertex data out of bounds")?;

        let mut p = Vec3::ZERO;
        let mut dc = [0.0_f32; 3];
        let mut rgb = [0.0_f32; 3];
        let mut have_dc = false;
        let mut have_rgb = false;
        let mut opacity_raw = 4.0_f32;
        let mut scale_raw = [-3.0_f32, -3.0_f32, -3.0_f32];
        let mut have_scale = false;
        let mut rotation = [1.0_f32, 0.0_f32, 0.0_f32, 0.0_f32];
        let mut have_rotation = false;
        rest_scratch.fill(0.0);

        let mut cursor: usize = 0;
        for prop in &vertex_props {
            let sz = prop.ty.size();
            let field_end = cursor
                .checked_add(sz)
                .ok_or("PLY parse error: size overflow computing property offset")?;
            let field = chunk
                .get(cursor..field_end)
                .ok_or("PLY parse error: property data out of bounds")?;
            let value = prop.ty.read_as_f32(field);
            cursor = field_end;

            match prop.field {
                Field::X => p.x = value,
                Field::Y => p.y = value,
                Field::Z => p.z = value,
                Field::Dc(c) => {
                    dc[c] = value;
                    have_dc = true;
                }
                Field::Rest(r) => rest_scratch[r] = value,
                Field::Red => {
                    rgb[0] = value;
                    have_rgb = true;
                }
                Field::Green => {
                    rgb[1] = value;
                    have_rgb = true;
                }
                Field::Blue => {
                    rgb[2] = value;
                    have_rgb = true;
                }
                Field::Opacity => opacity_raw = value,
                Field::Scale(c) => {
                    scale_raw[c] = value;
                    have_scale = true;
                }
                Field::Rot(c) => {
                    rotation[c] = value;
                    have_rotation = true;
                }
                Field::Skip => {}
            }
        }

        let color = if have_dc {
            [
                clamp_u8((sh::SH_C0 * dc[0] + 0.5) * 255.0),
                clamp_u8((sh::SH_C0 * dc[1] + 0.5) * 255.0),
                clamp_u8((sh::SH_C0 * dc[2] + 0.5) * 255.0),
            ]
        } else if have_rgb {
            [clamp_u8(rgb[0]), clamp_u8(rgb[1]), clamp_u8(rgb[2])]
        } else {
            [220, 220, 220]
        };

        if !have_dc {
            // Keep the SH table consistent with whatever base color we chose.
            dc = sh::dc_from_base_color([
                color[0] as f32 / 255.0,
                color[1] as f32 / 255.0,
                color[2] as f32 / 255.0,
            ]);
        }

        let opacity = sigmoid(opacity_raw).clamp(0.0, 1.0);
        let scale = if have_scale {
            Vec3::new(
                scale_raw[0].exp().max(1e-4),
                scale_raw[1].exp().max(1e-4),
                scale_raw[2].exp().max(1e-4),
            )
        } else {
            Vec3::new(0.05, 0.05, 0.05)
        };

        let rotation = if have_rotation {
            quat_normalize(rotation)
        } else {
            [1.0, 0.0, 0.0, 0.0]
        };

        splats.push(Splat {
            position: p,
            color,
            opacity,
            scale,
            rotation,
        });

        // DC triple first, then the higher bands. f_rest_* is channel-major
        // in 3DGS exports: all R coefficients, then G, then B.
        sh_table.push(dc);
        for k in 0..rest_per_channel {
            sh_table.push([
                rest_scratch[k],
                rest_scratch[rest_per_channel + k],
                rest_scratch[2 * rest_per_channel + k],
            ]);
        }
    }

    Ok(PointCloud {
        splats,
        sh: sh_table,
        sh_degree,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_f32(buf: &mut Vec<u8>, v: f32) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    fn make_ply(vertices: &[Vec<f32>], props: &[&str]) -> Vec<u8> {
        let mut header = String::from("ply\nformat binary_little_endian 1.0\n");
        header.push_str(&format!("element vertex {}\n", vertices.len()));
        for p in props {
            header.push_str(&format!("property float {p}\n"));
        }
        header.push_str("end_header\n");

        let mut data = header.into_bytes();
        for v in vertices {
            assert_eq!(v.len(), props.len());
            for &value in v {
                push_f32(&mut data, value);
            }
        }
        data
    }

    #[test]
    fn parses_minimal_degree_zero_vertex() {
        let props = ["x", "y", "z", "f_dc_0", "f_dc_1", "f_dc_2", "opacity"];
        let data = make_ply(&[vec![1.0, 2.0, 3.0, 0.5, 0.0, -0.5, 4.0]], &props);

        let pc = parse_ply(&data).expect("parse should succeed");
        assert_eq!(pc.len(), 1);
        assert_eq!(pc.sh_degree, 0);
        assert_eq!(pc.sh.len(), 1);
        assert_eq!(pc.splats[0].position, Vec3::new(1.0, 2.0, 3.0));
        assert!((pc.sh[0][0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn detects_degree_one_from_rest_properties() {
        let mut props = vec!["x", "y", "z", "f_dc_0", "f_dc_1", "f_dc_2"];
        let rest_names: Vec<String> = (0..9).map(|i| format!("f_rest_{i}")).collect();
        props.extend(rest_names.iter().map(|s| s.as_str()));

        let mut vertex = vec![0.0, 0.0, 0.0, 0.1, 0.2, 0.3];
        vertex.extend((0..9).map(|i| i as f32 * 0.01));
        let data = make_ply(&[vertex], &props);

        let pc = parse_ply(&data).expect("parse should succeed");
        assert_eq!(pc.sh_degree, 1);
        assert_eq!(pc.coeffs_per_splat(), 4);
        // Channel-major rest layout: triple 1 gathers (rest 0, rest 3, rest 6).
        let triple = pc.sh_for(0)[1];
        assert!((triple[0] - 0.00).abs() < 1e-6);
        assert!((triple[1] - 0.03).abs() < 1e-6);
        assert!((triple[2] - 0.06).abs() < 1e-6);
    }

    #[test]
    fn rejects_ascii_format() {
        let data = b"ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\nend_header\n1.0\n";
        assert!(parse_ply(data).is_err());
    }

    #[test]
    fn rejects_truncated_vertex_data() {
        let props = ["x", "y", "z"];
        let mut data = make_ply(&[vec![1.0, 2.0, 3.0]], &props);
        data.truncate(data.len() - 4);
        assert!(parse_ply(&data).is_err());
    }

    #[test]
    fn rejects_unsupported_rest_count() {
        let props = ["x", "y", "z", "f_rest_0"];
        let data = make_ply(&[vec![0.0, 0.0, 0.0, 0.0]], &props);
        assert!(parse_ply(&data).is_err());
    }
}
