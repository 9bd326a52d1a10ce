//! Hand-built spider document used as a placeholder asset.
//!
//! The document has the shape of a glTF scene (a root node with body and
//! leg children, each pointing at a mesh) but carries no geometry: the only
//! buffer is empty and the accessor list is empty, so every accessor index
//! referenced by the meshes dangles. Loaders will reject it; it exists for
//! inspecting the scene layout only.

use std::collections::BTreeMap;

use anyhow::Result;
use log::warn;

use crate::document::{Buffer, Document, Mesh, Mode, Node, Primitive, Scene};

/// Generator string recorded in the stub's `asset` block.
pub const STUB_GENERATOR: &str = "Simple Spider Creator";

/// URI of the stub buffer: a data URI with an empty payload.
pub const EMPTY_DATA_URI: &str = "data:application/octet-stream;base64,";

/// Builds the spider stub document.
pub fn build_spider_stub() -> Document {
    let mut document = Document::new(STUB_GENERATOR);
    document.scene = Some(0);
    document.scenes = vec![Scene { nodes: vec![0] }];
    document.nodes = vec![
        Node {
            children: Some(vec![1, 2]),
            translation: Some([0.0, 0.5, 0.0]),
            ..Node::named("Spider")
        },
        Node {
            mesh: Some(0),
            ..Node::named("Body")
        },
        Node {
            mesh: Some(1),
            ..Node::named("Legs")
        },
    ];
    document.meshes = vec![
        placeholder_mesh("SpiderBody", 0, 1, Mode::Triangles),
        placeholder_mesh("SpiderLegs", 2, 3, Mode::Lines),
    ];
    // Geometry is never written, so the buffer stays empty.
    document.buffers = vec![Buffer {
        uri: Some(EMPTY_DATA_URI.to_string()),
        byte_length: 0,
    }];
    document
}

/// Builds the stub and renders it as two-space indented JSON.
pub fn render_spider_stub() -> Result<String> {
    let document = build_spider_stub();
    let missing = document.unresolved_accessors();
    if !missing.is_empty() {
        warn!("stub document references missing accessors {missing:?}");
    }
    document.to_pretty_json()
}

fn placeholder_mesh(name: &str, position: u32, indices: u32, mode: Mode) -> Mesh {
    Mesh {
        name: Some(name.to_string()),
        primitives: vec![Primitive {
            attributes: BTreeMap::from([("POSITION".to_string(), position)]),
            indices: Some(indices),
            mode,
            material: None,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn rendered() -> Value {
        serde_json::from_str(&render_spider_stub().unwrap()).expect("stub is valid JSON")
    }

    #[test]
    fn output_is_deterministic() {
        assert_eq!(render_spider_stub().unwrap(), render_spider_stub().unwrap());
    }

    #[test]
    fn root_node_has_body_and_legs_children() {
        let doc = rendered();
        assert_eq!(doc["nodes"][0]["name"], "Spider");
        assert_eq!(doc["nodes"][0]["children"], serde_json::json!([1, 2]));
        assert_eq!(doc["nodes"][1]["mesh"], 0);
        assert_eq!(doc["nodes"][2]["mesh"], 1);
    }

    #[test]
    fn body_is_triangles_and_legs_are_lines() {
        let doc = rendered();
        assert_eq!(doc["meshes"][0]["primitives"][0]["mode"], 4);
        assert_eq!(doc["meshes"][1]["primitives"][0]["mode"], 1);
    }

    // The stub never carries geometry. If this starts failing, the stub
    // gained real buffers and the assertion should move with it.
    #[test]
    fn stub_has_no_geometry() {
        let doc = rendered();
        assert_eq!(doc["buffers"][0]["byteLength"], 0);
        assert_eq!(doc["buffers"][0]["uri"], EMPTY_DATA_URI);
        assert_eq!(doc["accessors"], serde_json::json!([]));
        assert_eq!(doc["bufferViews"], serde_json::json!([]));
        assert_eq!(build_spider_stub().unresolved_accessors(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn whole_number_translation_prints_as_integers() {
        let doc = rendered();
        assert_eq!(doc["nodes"][0]["translation"], serde_json::json!([0, 0.5, 0]));
        assert!(doc["nodes"][0]["translation"][0].is_u64());

        let text = render_spider_stub().unwrap();
        assert!(text.contains("\"translation\": [\n        0,\n        0.5,\n        0\n      ]"));
    }

    #[test]
    fn uses_two_space_indentation() {
        let text = render_spider_stub().unwrap();
        assert!(text.starts_with("{\n  \"asset\": {\n    \"version\": \"2.0\""));
    }

    #[test]
    fn parses_back_into_the_same_document() {
        let text = render_spider_stub().unwrap();
        assert_eq!(Document::from_json(&text).unwrap(), build_spider_stub());
    }
}
