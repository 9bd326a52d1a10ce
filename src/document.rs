use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Vertex buffer target for buffer views holding vertex attributes.
pub const ARRAY_BUFFER: u32 = 34962;
/// Index buffer target for buffer views holding primitive indices.
pub const ELEMENT_ARRAY_BUFFER: u32 = 34963;

/// Root of a glTF 2.0 JSON document.
///
/// Only the subset of the format produced by this crate is modelled. Field
/// order matches the order in which the fields are serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub asset: Asset,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<u32>,
    #[serde(default)]
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub meshes: Vec<Mesh>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<Material>,
    #[serde(default)]
    pub buffers: Vec<Buffer>,
    #[serde(default)]
    pub buffer_views: Vec<BufferView>,
    #[serde(default)]
    pub accessors: Vec<Accessor>,
}

impl Document {
    /// Creates an empty document stamped with the given generator name.
    pub fn new(generator: impl Into<String>) -> Self {
        Self {
            asset: Asset {
                version: "2.0".to_string(),
                generator: Some(generator.into()),
            },
            ..Self::default()
        }
    }

    /// Parses a document from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid glTF JSON document")
    }

    /// Serializes the document with two-space indentation.
    pub fn to_pretty_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize glTF document")
    }

    /// Serializes the document without whitespace, as embedded in a GLB.
    pub fn to_compact_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).context("failed to serialize glTF document")
    }

    /// Returns every accessor index referenced by a mesh primitive that has
    /// no entry in [`Document::accessors`], sorted and de-duplicated.
    pub fn unresolved_accessors(&self) -> Vec<u32> {
        let available = self.accessors.len();
        let mut missing: Vec<u32> = self
            .meshes
            .iter()
            .flat_map(|mesh| mesh.primitives.iter())
            .flat_map(|primitive| {
                primitive
                    .attributes
                    .values()
                    .copied()
                    .chain(primitive.indices)
            })
            .filter(|index| *index as usize >= available)
            .collect();
        missing.sort_unstable();
        missing.dedup();
        missing
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Asset {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Scene {
    #[serde(default)]
    pub nodes: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Node {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<u32>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "whole_numbers::serialize"
    )]
    pub translation: Option<[f32; 3]>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "whole_numbers::serialize"
    )]
    pub rotation: Option<[f32; 4]>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "whole_numbers::serialize"
    )]
    pub scale: Option<[f32; 3]>,
}

/// Writes whole-number components as JSON integers, so a node at the origin
/// prints `[0, 0, 0]`.
mod whole_numbers {
    use serde::ser::{SerializeSeq, Serializer};

    // Largest range in which every integer is exact in an f32.
    const EXACT: f32 = 16_777_216.0;

    pub fn serialize<S, const N: usize>(
        value: &Option<[f32; N]>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let Some(components) = value else {
            return serializer.serialize_none();
        };
        let mut seq = serializer.serialize_seq(Some(N))?;
        for &component in components {
            if component.fract() == 0.0 && component.abs() <= EXACT {
                seq.serialize_element(&(component as i32))?;
            } else {
                seq.serialize_element(&component)?;
            }
        }
        seq.end()
    }
}

impl Node {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Mesh {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub primitives: Vec<Primitive>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Primitive {
    pub attributes: BTreeMap<String, u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indices: Option<u32>,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<u32>,
}

/// Primitive topology. Serialized as the numeric glTF mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(into = "u32", try_from = "u32")]
pub enum Mode {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl From<Mode> for u32 {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Points => 0,
            Mode::Lines => 1,
            Mode::LineLoop => 2,
            Mode::LineStrip => 3,
            Mode::Triangles => 4,
            Mode::TriangleStrip => 5,
            Mode::TriangleFan => 6,
        }
    }
}

impl TryFrom<u32> for Mode {
    type Error = String;

    fn try_from(value: u32) -> std::result::Result<Self, Self::Error> {
        Ok(match value {
            0 => Mode::Points,
            1 => Mode::Lines,
            2 => Mode::LineLoop,
            3 => Mode::LineStrip,
            4 => Mode::Triangles,
            5 => Mode::TriangleStrip,
            6 => Mode::TriangleFan,
            other => return Err(format!("unknown primitive mode {other}")),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Buffer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    pub byte_length: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferView {
    pub buffer: u32,
    #[serde(default)]
    pub byte_offset: u64,
    pub byte_length: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessor {
    pub buffer_view: u32,
    pub component_type: ComponentType,
    pub count: u32,
    #[serde(rename = "type")]
    pub kind: AccessorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum ComponentType {
    UnsignedInt,
    Float,
}

impl From<ComponentType> for u32 {
    fn from(kind: ComponentType) -> Self {
        match kind {
            ComponentType::UnsignedInt => 5125,
            ComponentType::Float => 5126,
        }
    }
}

impl TryFrom<u32> for ComponentType {
    type Error = String;

    fn try_from(value: u32) -> std::result::Result<Self, Self::Error> {
        match value {
            5125 => Ok(ComponentType::UnsignedInt),
            5126 => Ok(ComponentType::Float),
            other => Err(format!("unsupported component type {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessorType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
}

impl AccessorType {
    /// Number of components per element.
    pub fn components(self) -> usize {
        match self {
            AccessorType::Scalar => 1,
            AccessorType::Vec2 => 2,
            AccessorType::Vec3 => 3,
            AccessorType::Vec4 => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub pbr_metallic_roughness: PbrMetallicRoughness,
    #[serde(default)]
    pub double_sided: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PbrMetallicRoughness {
    pub base_color_factor: [f32; 4],
    pub metallic_factor: f32,
    pub roughness_factor: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primitive(position: u32, indices: Option<u32>) -> Primitive {
        Primitive {
            attributes: BTreeMap::from([("POSITION".to_string(), position)]),
            indices,
            mode: Mode::Triangles,
            material: None,
        }
    }

    #[test]
    fn empty_lists_are_still_serialized() {
        let json = Document::new("test").to_pretty_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["bufferViews"], serde_json::json!([]));
        assert_eq!(value["accessors"], serde_json::json!([]));
        assert!(value.get("materials").is_none());
        assert_eq!(value["asset"]["version"], "2.0");
    }

    #[test]
    fn mode_serializes_as_number() {
        let mut doc = Document::new("test");
        doc.meshes.push(Mesh {
            name: None,
            primitives: vec![Primitive {
                mode: Mode::Lines,
                ..primitive(0, None)
            }],
        });
        let value: serde_json::Value =
            serde_json::from_str(&doc.to_pretty_json().unwrap()).unwrap();
        assert_eq!(value["meshes"][0]["primitives"][0]["mode"], 1);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let json = r#"{"asset":{"version":"2.0"},"meshes":[{"primitives":[{"attributes":{},"mode":9}]}]}"#;
        assert!(Document::from_json(json).is_err());
    }

    #[test]
    fn unresolved_accessors_reports_dangling_references() {
        let mut doc = Document::new("test");
        doc.meshes.push(Mesh {
            name: None,
            primitives: vec![primitive(0, Some(3)), primitive(3, Some(1))],
        });
        doc.accessors.push(Accessor {
            buffer_view: 0,
            component_type: ComponentType::Float,
            count: 0,
            kind: AccessorType::Vec3,
            min: None,
            max: None,
        });
        assert_eq!(doc.unresolved_accessors(), vec![1, 3]);
    }
}
