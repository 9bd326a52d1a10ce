use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Indexed triangle mesh read from an OBJ file.
///
/// All vertex streams have the same length. `texcoords` and `colors` are
/// only present when every referenced vertex supplies them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjMesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub texcoords: Option<Vec<Vec2>>,
    pub colors: Option<Vec<Vec3>>,
    pub indices: Vec<u32>,
}

impl ObjMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Axis aligned bounds of the positions, or `None` for an empty mesh.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.positions.first()?;
        Some(
            self.positions
                .iter()
                .fold((first, first), |(min, max), p| (min.min(*p), max.max(*p))),
        )
    }
}

/// Parses an OBJ file from memory.
///
/// Supports `v` (with optional trailing RGB vertex color), `vt`, `vn` and
/// `f`; polygons are fan triangulated and other statements are ignored.
pub fn load_obj_from_str(data: &str) -> Result<ObjMesh> {
    let mut positions = Vec::new();
    let mut colors = Vec::new();
    let mut texcoords = Vec::new();
    let mut normals = Vec::new();
    let mut faces: Vec<[FaceIndex; 3]> = Vec::new();

    for (line_no, line) in data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        match tag {
            "v" => {
                let values = parse_floats(parts)
                    .with_context(|| format!("invalid vertex on line {}", line_no + 1))?;
                match values.as_slice() {
                    [x, y, z] | [x, y, z, _] => positions.push(Vec3::new(*x, *y, *z)),
                    [x, y, z, r, g, b] => {
                        positions.push(Vec3::new(*x, *y, *z));
                        colors.push(Vec3::new(*r, *g, *b));
                    }
                    _ => {
                        return Err(anyhow!(
                            "vertex on line {} has {} components",
                            line_no + 1,
                            values.len()
                        ))
                    }
                }
            }
            "vt" => {
                let values = parse_floats(parts)
                    .with_context(|| format!("invalid texcoord on line {}", line_no + 1))?;
                if values.len() < 2 {
                    return Err(anyhow!("texcoord on line {} needs u and v", line_no + 1));
                }
                texcoords.push(Vec2::new(values[0], values[1]));
            }
            "vn" => {
                let values = parse_floats(parts)
                    .with_context(|| format!("invalid normal on line {}", line_no + 1))?;
                if values.len() != 3 {
                    return Err(anyhow!("normal on line {} needs 3 components", line_no + 1));
                }
                normals.push(Vec3::new(values[0], values[1], values[2]));
            }
            "f" => {
                let polygon = parse_face(parts)
                    .with_context(|| format!("invalid face on line {}", line_no + 1))?;
                triangulate_face(&polygon, &mut faces);
            }
            _ => {}
        }
    }

    if positions.is_empty() {
        return Err(anyhow!("OBJ file does not define any vertices"));
    }

    // Vertex colors only count when every vertex line carries one.
    let colors = (colors.len() == positions.len()).then_some(colors);

    let mut mesh = build_mesh(&positions, colors.as_deref(), &texcoords, &normals, &faces)?;
    if needs_normals(&mesh.normals) {
        compute_normals(&mut mesh);
    }
    Ok(mesh)
}

fn parse_floats<'a>(parts: impl Iterator<Item = &'a str>) -> Result<Vec<f32>> {
    parts
        .map(|part| {
            part.parse::<f32>()
                .map_err(|err| anyhow!("invalid number {part:?}: {err}"))
        })
        .collect()
}

fn parse_face<'a>(parts: impl Iterator<Item = &'a str>) -> Result<Vec<FaceIndex>> {
    let mut indices = Vec::new();
    for part in parts {
        let mut segments = part.split('/');
        let v = segments
            .next()
            .ok_or_else(|| anyhow!("missing vertex index"))?
            .parse::<i32>()?;
        let vt = parse_optional_index(segments.next())?;
        let vn = parse_optional_index(segments.next())?;
        indices.push(FaceIndex { v, vt, vn });
    }
    if indices.len() < 3 {
        return Err(anyhow!("faces must reference at least 3 vertices"));
    }
    Ok(indices)
}

fn parse_optional_index(segment: Option<&str>) -> Result<i32> {
    match segment {
        None | Some("") => Ok(0),
        Some(value) => value
            .parse::<i32>()
            .map_err(|err| anyhow!("invalid index {value:?}: {err}")),
    }
}

fn triangulate_face(polygon: &[FaceIndex], faces: &mut Vec<[FaceIndex; 3]>) {
    if polygon.len() < 3 {
        return;
    }
    for i in 1..(polygon.len() - 1) {
        faces.push([polygon[0], polygon[i], polygon[i + 1]]);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    position: usize,
    texcoord: Option<usize>,
    normal: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct FaceIndex {
    v: i32,
    vt: i32,
    vn: i32,
}

fn build_mesh(
    positions: &[Vec3],
    colors: Option<&[Vec3]>,
    texcoords: &[Vec2],
    normals: &[Vec3],
    faces: &[[FaceIndex; 3]],
) -> Result<ObjMesh> {
    let mut lookup: HashMap<Key, u32> = HashMap::new();
    let mut mesh = ObjMesh::default();
    let mut out_texcoords = Vec::new();
    let mut out_colors = Vec::new();
    let mut all_textured = true;

    for face in faces {
        for idx in face {
            let position = fix_index(idx.v, positions.len())
                .ok_or_else(|| anyhow!("vertex index {} out of range", idx.v))?;
            let texcoord = optional_index(idx.vt, texcoords.len(), "texcoord")?;
            let normal = optional_index(idx.vn, normals.len(), "normal")?;
            all_textured &= texcoord.is_some();
            let key = Key {
                position,
                texcoord,
                normal,
            };
            let next_index = mesh.positions.len() as u32;
            let entry = lookup.entry(key).or_insert_with(|| {
                mesh.positions.push(positions[position]);
                mesh.normals
                    .push(normal.map(|i| normals[i]).unwrap_or(Vec3::ZERO));
                out_texcoords.push(texcoord.map(|i| texcoords[i]).unwrap_or(Vec2::ZERO));
                if let Some(colors) = colors {
                    out_colors.push(colors[position]);
                }
                next_index
            });
            mesh.indices.push(*entry);
        }
    }

    if all_textured && !mesh.positions.is_empty() {
        mesh.texcoords = Some(out_texcoords);
    }
    if colors.is_some() {
        mesh.colors = Some(out_colors);
    }
    Ok(mesh)
}

/// Resolves a `vt`/`vn` reference. Zero means the face left it out.
fn optional_index(index: i32, len: usize, what: &str) -> Result<Option<usize>> {
    if index == 0 {
        return Ok(None);
    }
    fix_index(index, len)
        .map(Some)
        .ok_or_else(|| anyhow!("{what} index {index} out of range"))
}

fn fix_index(index: i32, len: usize) -> Option<usize> {
    if index > 0 {
        let zero_based = index as usize - 1;
        (zero_based < len).then_some(zero_based)
    } else if index < 0 {
        let abs = index.unsigned_abs() as usize;
        (abs <= len).then(|| len - abs)
    } else {
        None
    }
}

fn needs_normals(normals: &[Vec3]) -> bool {
    normals.iter().any(|normal| *normal == Vec3::ZERO)
}

fn compute_normals(mesh: &mut ObjMesh) {
    let mut accum = vec![Vec3::ZERO; mesh.vertex_count()];

    for triangle in mesh.indices.chunks_exact(3) {
        let i0 = triangle[0] as usize;
        let i1 = triangle[1] as usize;
        let i2 = triangle[2] as usize;
        let p0 = mesh.positions[i0];
        let p1 = mesh.positions[i1];
        let p2 = mesh.positions[i2];
        // Unnormalized cross product weights each face by its area.
        let normal = (p1 - p0).cross(p2 - p0);
        if normal.length_squared() > f32::EPSILON * f32::EPSILON {
            accum[i0] += normal;
            accum[i1] += normal;
            accum[i2] += normal;
        }
    }

    for (slot, normal) in mesh.normals.iter_mut().zip(accum) {
        if *slot == Vec3::ZERO {
            *slot = normal.normalize_or_zero();
        }
    }
}
