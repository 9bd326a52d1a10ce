use std::collections::{BTreeMap, HashMap};

use anyhow::{anyhow, Result};
use bytemuck::Pod;
use glam::{Quat, Vec2, Vec3, Vec4};
use log::{debug, warn};

use crate::document::{
    Accessor, AccessorType, Buffer, BufferView, ComponentType, Document, Material, Mesh, Mode,
    Node, PbrMetallicRoughness, Primitive, Scene, ARRAY_BUFFER, ELEMENT_ARRAY_BUFFER,
};
use crate::glb;
use crate::obj::ObjMesh;
use crate::scene::SceneObject;

/// Generator string written by the built-in exporter.
pub const GENERATOR: &str = concat!("glb-tools ", env!("CARGO_PKG_VERSION"));

/// Which objects an export includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportScope {
    #[default]
    Scene,
    Selection,
}

/// Options passed to a host's exporter. The output is always a binary glTF
/// container.
///
/// The default is the configuration `convert-model` uses: the whole scene,
/// with tangents, texture coordinates, normals, materials and vertex colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub scope: ExportScope,
    pub tangents: bool,
    pub texcoords: bool,
    pub normals: bool,
    pub materials: bool,
    pub colors: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            scope: ExportScope::Scene,
            tangents: true,
            texcoords: true,
            normals: true,
            materials: true,
            colors: true,
        }
    }
}

/// Scene object together with its loaded mesh, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedObject {
    pub object: SceneObject,
    pub mesh: Option<ObjMesh>,
}

/// Exports the objects as a GLB file image.
pub fn export_glb(objects: &[LoadedObject], options: &ExportOptions) -> Result<Vec<u8>> {
    let (document, bin) = build_document(objects, options)?;
    let json = document.to_compact_json()?;
    glb::encode(&json, (!bin.is_empty()).then_some(bin.as_slice()))
}

/// Builds the glTF document and the contents of its single binary buffer.
pub fn build_document(
    objects: &[LoadedObject],
    options: &ExportOptions,
) -> Result<(Document, Vec<u8>)> {
    let mut document = Document::new(GENERATOR);
    let mut buffer = BufferBuilder::default();
    let mut materials = MaterialTable::default();

    let exported = objects.iter().filter(|loaded| match options.scope {
        ExportScope::Scene => true,
        ExportScope::Selection => loaded.object.selected,
    });

    for loaded in exported {
        let object = &loaded.object;
        let mut node = Node::named(object.name.clone());
        apply_transform(&mut node, object);

        match &loaded.mesh {
            Some(mesh) if !mesh.indices.is_empty() => {
                let material = options
                    .materials
                    .then(|| materials.index_for(object.color, &object.name));
                let primitive = write_primitive(&mut buffer, mesh, material, options)?;
                node.mesh = Some(document.meshes.len() as u32);
                document.meshes.push(Mesh {
                    name: Some(object.name.clone()),
                    primitives: vec![primitive],
                });
            }
            Some(_) => warn!(
                "object {} has a mesh without faces; exporting it without one",
                object.name
            ),
            None => {}
        }
        document.nodes.push(node);
    }

    document.scene = Some(0);
    document.scenes = vec![Scene {
        nodes: (0..document.nodes.len() as u32).collect(),
    }];
    document.materials = materials.into_materials();

    let (views, accessors, bin) = buffer.finish();
    if !bin.is_empty() {
        document.buffers = vec![Buffer {
            uri: None,
            byte_length: bin.len() as u64,
        }];
    }
    document.buffer_views = views;
    document.accessors = accessors;
    debug!(
        "built document with {} nodes, {} meshes, {} bytes of geometry",
        document.nodes.len(),
        document.meshes.len(),
        bin.len()
    );
    Ok((document, bin))
}

fn apply_transform(node: &mut Node, object: &SceneObject) {
    if object.position != Vec3::ZERO {
        node.translation = Some(object.position.to_array());
    }
    let rotation = object.rotation_quat();
    if !rotation.abs_diff_eq(Quat::IDENTITY, 1e-6) {
        node.rotation = Some(rotation.normalize().to_array());
    }
    if object.scale != Vec3::ONE {
        node.scale = Some(object.scale.to_array());
    }
}

fn write_primitive(
    buffer: &mut BufferBuilder,
    mesh: &ObjMesh,
    material: Option<u32>,
    options: &ExportOptions,
) -> Result<Primitive> {
    let mut attributes = BTreeMap::new();

    let positions: Vec<[f32; 3]> = mesh.positions.iter().map(|p| p.to_array()).collect();
    let (min, max) = mesh
        .bounds()
        .ok_or_else(|| anyhow!("mesh has indices but no vertices"))?;
    let position = buffer.push(
        &positions,
        AccessorType::Vec3,
        ComponentType::Float,
        ARRAY_BUFFER,
        Some((min.to_array().to_vec(), max.to_array().to_vec())),
    );
    attributes.insert("POSITION".to_string(), position);

    if options.normals {
        let normals: Vec<[f32; 3]> = mesh.normals.iter().map(|n| n.to_array()).collect();
        let index = buffer.push(
            &normals,
            AccessorType::Vec3,
            ComponentType::Float,
            ARRAY_BUFFER,
            None,
        );
        attributes.insert("NORMAL".to_string(), index);
    }

    // glTF puts the texture origin at the top left, OBJ at the bottom left.
    let texcoords: Option<Vec<Vec2>> = mesh
        .texcoords
        .as_ref()
        .map(|uvs| uvs.iter().map(|uv| Vec2::new(uv.x, 1.0 - uv.y)).collect());

    if options.texcoords {
        if let Some(texcoords) = &texcoords {
            let data: Vec<[f32; 2]> = texcoords.iter().map(|uv| uv.to_array()).collect();
            let index = buffer.push(
                &data,
                AccessorType::Vec2,
                ComponentType::Float,
                ARRAY_BUFFER,
                None,
            );
            attributes.insert("TEXCOORD_0".to_string(), index);
        }
    }

    if options.tangents && options.normals {
        if let Some(texcoords) = &texcoords {
            let tangents: Vec<[f32; 4]> = compute_tangents(mesh, texcoords)
                .into_iter()
                .map(|t| t.to_array())
                .collect();
            let index = buffer.push(
                &tangents,
                AccessorType::Vec4,
                ComponentType::Float,
                ARRAY_BUFFER,
                None,
            );
            attributes.insert("TANGENT".to_string(), index);
        }
    }

    if options.colors {
        if let Some(colors) = &mesh.colors {
            let data: Vec<[f32; 3]> = colors.iter().map(|c| c.to_array()).collect();
            let index = buffer.push(
                &data,
                AccessorType::Vec3,
                ComponentType::Float,
                ARRAY_BUFFER,
                None,
            );
            attributes.insert("COLOR_0".to_string(), index);
        }
    }

    let indices = buffer.push(
        &mesh.indices,
        AccessorType::Scalar,
        ComponentType::UnsignedInt,
        ELEMENT_ARRAY_BUFFER,
        None,
    );

    Ok(Primitive {
        attributes,
        indices: Some(indices),
        mode: Mode::Triangles,
        material,
    })
}

/// Per-vertex tangents with the bitangent sign in `w`.
fn compute_tangents(mesh: &ObjMesh, texcoords: &[Vec2]) -> Vec<Vec4> {
    let count = mesh.vertex_count();
    let mut tangents = vec![Vec3::ZERO; count];
    let mut bitangents = vec![Vec3::ZERO; count];

    for triangle in mesh.indices.chunks_exact(3) {
        let [i0, i1, i2] = [
            triangle[0] as usize,
            triangle[1] as usize,
            triangle[2] as usize,
        ];
        let e1 = mesh.positions[i1] - mesh.positions[i0];
        let e2 = mesh.positions[i2] - mesh.positions[i0];
        let d1 = texcoords[i1] - texcoords[i0];
        let d2 = texcoords[i2] - texcoords[i0];
        let det = d1.x * d2.y - d2.x * d1.y;
        if det.abs() <= f32::EPSILON {
            continue;
        }
        let r = det.recip();
        let tangent = (e1 * d2.y - e2 * d1.y) * r;
        let bitangent = (e2 * d1.x - e1 * d2.x) * r;
        for i in [i0, i1, i2] {
            tangents[i] += tangent;
            bitangents[i] += bitangent;
        }
    }

    mesh.normals
        .iter()
        .zip(tangents.iter().zip(&bitangents))
        .map(|(normal, (tangent, bitangent))| {
            let orthogonal = (*tangent - *normal * normal.dot(*tangent)).normalize_or_zero();
            let tangent = if orthogonal == Vec3::ZERO {
                normal.any_orthonormal_vector()
            } else {
                orthogonal
            };
            let handedness = if normal.cross(tangent).dot(*bitangent) < 0.0 {
                -1.0
            } else {
                1.0
            };
            tangent.extend(handedness)
        })
        .collect()
}

#[derive(Debug, Default)]
struct BufferBuilder {
    data: Vec<u8>,
    views: Vec<BufferView>,
    accessors: Vec<Accessor>,
}

impl BufferBuilder {
    /// Appends one tightly packed stream as its own buffer view and returns
    /// the new accessor index.
    fn push<T: Pod>(
        &mut self,
        items: &[T],
        kind: AccessorType,
        component_type: ComponentType,
        target: u32,
        bounds: Option<(Vec<f32>, Vec<f32>)>,
    ) -> u32 {
        let bytes: &[u8] = bytemuck::cast_slice(items);
        // Both component types are four bytes wide.
        debug_assert_eq!(bytes.len(), items.len() * kind.components() * 4);
        // Keep every view on a four byte boundary.
        self.data.resize((self.data.len() + 3) & !3, 0);
        let offset = self.data.len() as u64;
        self.data.extend_from_slice(bytes);

        let view = self.views.len() as u32;
        self.views.push(BufferView {
            buffer: 0,
            byte_offset: offset,
            byte_length: bytes.len() as u64,
            target: Some(target),
        });
        let (min, max) = bounds.unzip();
        self.accessors.push(Accessor {
            buffer_view: view,
            component_type,
            count: items.len() as u32,
            kind,
            min,
            max,
        });
        self.accessors.len() as u32 - 1
    }

    fn finish(self) -> (Vec<BufferView>, Vec<Accessor>, Vec<u8>) {
        (self.views, self.accessors, self.data)
    }
}

/// One material per distinct base color, named after its first user.
#[derive(Debug, Default)]
struct MaterialTable {
    by_color: HashMap<[u32; 3], u32>,
    materials: Vec<Material>,
}

impl MaterialTable {
    fn index_for(&mut self, color: Vec3, owner: &str) -> u32 {
        let key = color.to_array().map(f32::to_bits);
        if let Some(index) = self.by_color.get(&key) {
            return *index;
        }
        let index = self.materials.len() as u32;
        self.materials.push(Material {
            name: Some(owner.to_string()),
            pbr_metallic_roughness: PbrMetallicRoughness {
                base_color_factor: color.extend(1.0).to_array(),
                metallic_factor: 0.0,
                roughness_factor: 0.5,
            },
            double_sided: false,
        });
        self.by_color.insert(key, index);
        index
    }

    fn into_materials(self) -> Vec<Material> {
        self.materials
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obj::load_obj_from_str;

    const TEXTURED_QUAD: &str = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
        vt 0 0\nvt 1 0\nvt 1 1\nvt 0 1\nvn 0 0 1\n\
        f 1/1/1 2/2/1 3/3/1 4/4/1\n";

    fn object(name: &str, mesh: Option<ObjMesh>) -> LoadedObject {
        LoadedObject {
            object: SceneObject {
                name: name.to_string(),
                object_type: "mesh".to_string(),
                ..SceneObject::default()
            },
            mesh,
        }
    }

    fn quad() -> ObjMesh {
        load_obj_from_str(TEXTURED_QUAD).unwrap()
    }

    #[test]
    fn default_options_include_every_stream() {
        let (document, bin) =
            build_document(&[object("Quad", Some(quad()))], &ExportOptions::default()).unwrap();
        let attributes = &document.meshes[0].primitives[0].attributes;
        for semantic in ["POSITION", "NORMAL", "TEXCOORD_0", "TANGENT"] {
            assert!(attributes.contains_key(semantic), "missing {semantic}");
        }
        assert!(!attributes.contains_key("COLOR_0"));
        assert!(document.unresolved_accessors().is_empty());
        assert_eq!(document.buffers[0].byte_length, bin.len() as u64);
        assert_eq!(document.materials.len(), 1);
    }

    #[test]
    fn disabled_streams_are_left_out() {
        let options = ExportOptions {
            normals: false,
            texcoords: false,
            materials: false,
            ..ExportOptions::default()
        };
        let (document, _) = build_document(&[object("Quad", Some(quad()))], &options).unwrap();
        let primitive = &document.meshes[0].primitives[0];
        assert_eq!(
            primitive.attributes.keys().collect::<Vec<_>>(),
            vec!["POSITION"]
        );
        assert!(primitive.material.is_none());
        assert!(document.materials.is_empty());
    }

    #[test]
    fn views_are_four_byte_aligned() {
        let objects = [object("A", Some(quad())), object("B", Some(quad()))];
        let (document, bin) = build_document(&objects, &ExportOptions::default()).unwrap();
        for view in &document.buffer_views {
            assert_eq!(view.byte_offset % 4, 0);
            assert!(view.byte_offset + view.byte_length <= bin.len() as u64);
        }
    }

    #[test]
    fn view_lengths_match_accessor_counts() {
        let mut mesh = quad();
        mesh.colors = Some(vec![Vec3::ONE; mesh.positions.len()]);
        let options = ExportOptions::default();
        let (document, _) = build_document(&[object("Quad", Some(mesh))], &options).unwrap();
        assert!(document.meshes[0].primitives[0]
            .attributes
            .contains_key("COLOR_0"));
        for accessor in &document.accessors {
            let view = &document.buffer_views[accessor.buffer_view as usize];
            let stride = accessor.kind.components() as u64 * 4;
            assert_eq!(view.byte_length, accessor.count as u64 * stride);
        }
    }

    #[test]
    fn position_accessor_carries_bounds() {
        let (document, _) =
            build_document(&[object("Quad", Some(quad()))], &ExportOptions::default()).unwrap();
        let position = document.meshes[0].primitives[0].attributes["POSITION"] as usize;
        let accessor = &document.accessors[position];
        assert_eq!(accessor.min.as_deref(), Some(&[0.0, 0.0, 0.0][..]));
        assert_eq!(accessor.max.as_deref(), Some(&[1.0, 1.0, 0.0][..]));
        assert_eq!(accessor.count, 4);
    }

    #[test]
    fn tangents_follow_texture_u_axis() {
        let mesh = quad();
        let texcoords: Vec<Vec2> = mesh
            .texcoords
            .as_ref()
            .unwrap()
            .iter()
            .map(|uv| Vec2::new(uv.x, 1.0 - uv.y))
            .collect();
        for tangent in compute_tangents(&mesh, &texcoords) {
            assert!((tangent.truncate() - Vec3::X).length() < 1e-5);
            assert_eq!(tangent.w.abs(), 1.0);
        }
    }

    #[test]
    fn selection_scope_skips_unselected_objects() {
        let mut selected = object("Body", Some(quad()));
        selected.object.selected = true;
        let objects = [selected, object("Legs", Some(quad()))];
        let options = ExportOptions {
            scope: ExportScope::Selection,
            ..ExportOptions::default()
        };
        let (document, _) = build_document(&objects, &options).unwrap();
        assert_eq!(document.nodes.len(), 1);
        assert_eq!(document.nodes[0].name.as_deref(), Some("Body"));
    }

    #[test]
    fn objects_without_meshes_become_plain_nodes() {
        let mut pivot = object("Pivot", None);
        pivot.object.position = Vec3::new(0.0, 0.5, 0.0);
        let (document, bin) = build_document(&[pivot], &ExportOptions::default()).unwrap();
        assert!(bin.is_empty());
        assert!(document.buffers.is_empty());
        assert_eq!(document.nodes[0].translation, Some([0.0, 0.5, 0.0]));
        assert!(document.nodes[0].mesh.is_none());
    }

    #[test]
    fn shared_colors_share_a_material() {
        let objects = [object("A", Some(quad())), object("B", Some(quad()))];
        let (document, _) = build_document(&objects, &ExportOptions::default()).unwrap();
        assert_eq!(document.materials.len(), 1);
        assert_eq!(document.meshes[1].primitives[0].material, Some(0));
    }

    #[test]
    fn vertex_colors_are_exported() {
        let mesh = load_obj_from_str("v 0 0 0 1 0 0\nv 1 0 0 0 1 0\nv 0 1 0 0 0 1\nf 1 2 3\n")
            .unwrap();
        let (document, _) =
            build_document(&[object("Tri", Some(mesh))], &ExportOptions::default()).unwrap();
        assert!(document.meshes[0].primitives[0]
            .attributes
            .contains_key("COLOR_0"));
    }
}
