use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use glam::{EulerRot, Quat, Vec3};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

/// Scene description read by the native host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SceneDescription {
    pub objects: Vec<SceneObject>,
}

impl SceneDescription {
    /// Parses the XML scene format.
    ///
    /// ```xml
    /// <scene>
    ///   <object>
    ///     <name>Body</name>
    ///     <mesh>body.obj</mesh>
    ///     <color>40 30 20</color>
    ///     <position>0 0.5 0</position>
    ///   </object>
    /// </scene>
    /// ```
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid scene XML")?;
        if !document.root_element().has_tag_name("scene") {
            return Err(anyhow!(
                "expected <scene> root element, found <{}>",
                document.root_element().tag_name().name()
            ));
        }
        let mut objects = Vec::new();

        for node in document.descendants().filter(|n| n.has_tag_name("object")) {
            let mut object = SceneObject::default();
            object.name = required_text(&node, "name")?;
            object.object_type = optional_text(&node, "type").unwrap_or_else(|| "mesh".to_string());
            object.mesh = optional_text(&node, "mesh").map(PathBuf::from);
            object.color = parse_color(optional_text(&node, "color"), object.color)
                .with_context(|| format!("object {}", object.name))?;
            object.position = parse_vec3(optional_text(&node, "position"), object.position)
                .with_context(|| format!("object {}", object.name))?;
            object.rotation = parse_vec3(optional_text(&node, "rotation"), object.rotation)
                .with_context(|| format!("object {}", object.name))?;
            object.scale = parse_vec3(optional_text(&node, "scale"), object.scale)
                .with_context(|| format!("object {}", object.name))?;
            object.selected = parse_bool(optional_text(&node, "selected"))
                .with_context(|| format!("object {}", object.name))?;
            objects.push(object);
        }

        Ok(Self { objects })
    }

    /// Wraps a single mesh file as a one-object scene named after the file.
    pub fn single_mesh(mesh: impl AsRef<Path>) -> Self {
        let mesh = mesh.as_ref();
        let name = mesh
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Mesh".to_string());
        Self {
            objects: vec![SceneObject {
                name,
                object_type: "mesh".to_string(),
                mesh: Some(mesh.to_path_buf()),
                ..SceneObject::default()
            }],
        }
    }
}

/// Object placed in a scene description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<PathBuf>,
    #[serde(default = "default_color")]
    pub color: Vec3,
    #[serde(default)]
    pub position: Vec3,
    /// Euler angles in degrees, applied X, then Y, then Z.
    #[serde(default)]
    pub rotation: Vec3,
    #[serde(default = "default_scale")]
    pub scale: Vec3,
    #[serde(default)]
    pub selected: bool,
}

impl SceneObject {
    pub fn rotation_quat(&self) -> Quat {
        Quat::from_euler(
            EulerRot::ZYX,
            self.rotation.z.to_radians(),
            self.rotation.y.to_radians(),
            self.rotation.x.to_radians(),
        )
    }
}

impl Default for SceneObject {
    fn default() -> Self {
        Self {
            name: String::new(),
            object_type: String::new(),
            mesh: None,
            color: default_color(),
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            selected: false,
        }
    }
}

fn default_color() -> Vec3 {
    Vec3::ONE
}

fn default_scale() -> Vec3 {
    Vec3::ONE
}

fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String> {
    optional_text(node, tag).ok_or_else(|| anyhow!("<{tag}> tag is missing"))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_components(value: &str, what: &str) -> Result<Vec3> {
    let numbers = value
        .split_whitespace()
        .map(|component| {
            component
                .parse::<f32>()
                .map_err(|err| anyhow!("invalid {what} component {component:?}: {err}"))
        })
        .collect::<Result<Vec<_>>>()?;
    match numbers.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(anyhow!(
            "{what} needs 3 components, found {}",
            numbers.len()
        )),
    }
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    match value {
        Some(value) => parse_components(&value, "vector"),
        None => Ok(default),
    }
}

fn parse_color(value: Option<String>, default: Vec3) -> Result<Vec3> {
    match value {
        Some(value) => Ok(parse_components(&value, "color")? / 255.0),
        None => Ok(default),
    }
}

fn parse_bool(value: Option<String>) -> Result<bool> {
    match value.as_deref() {
        None | Some("false") | Some("0") => Ok(false),
        Some("true") | Some("1") => Ok(true),
        Some(other) => Err(anyhow!("expected true or false, found {other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
    <scene>
        <object>
            <name>Body</name>
            <mesh>meshes/body.obj</mesh>
            <color>255 128 0</color>
            <position>0 0.5 0</position>
            <selected>true</selected>
        </object>
        <object>
            <name>Pivot</name>
            <type>empty</type>
            <rotation>0 90 0</rotation>
            <scale>2 2 2</scale>
        </object>
    </scene>
    "#;

    #[test]
    fn parse_scene_populates_objects() {
        let scene = SceneDescription::from_xml(SAMPLE).unwrap();
        assert_eq!(scene.objects.len(), 2);
        let body = &scene.objects[0];
        assert_eq!(body.object_type, "mesh");
        assert_eq!(body.mesh.as_deref(), Some(Path::new("meshes/body.obj")));
        assert_eq!(body.position, Vec3::new(0.0, 0.5, 0.0));
        assert_eq!(body.color, Vec3::new(1.0, 128.0 / 255.0, 0.0));
        assert!(body.selected);

        let pivot = &scene.objects[1];
        assert_eq!(pivot.object_type, "empty");
        assert!(pivot.mesh.is_none());
        assert!(!pivot.selected);
        assert_eq!(pivot.scale, Vec3::splat(2.0));
    }

    #[test]
    fn rotation_is_converted_to_unit_quaternion() {
        let scene = SceneDescription::from_xml(SAMPLE).unwrap();
        let rotation = scene.objects[1].rotation_quat();
        assert!(rotation.is_normalized());
        let rotated = rotation * Vec3::X;
        assert!((rotated - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-5);
    }

    #[test]
    fn missing_name_is_an_error() {
        let bad = "<scene><object><type>mesh</type></object></scene>";
        assert!(SceneDescription::from_xml(bad).is_err());
    }

    #[test]
    fn short_vector_is_an_error() {
        let bad = "<scene><object><name>A</name><position>1 2</position></object></scene>";
        assert!(SceneDescription::from_xml(bad).is_err());
    }

    #[test]
    fn wrong_root_is_an_error() {
        assert!(SceneDescription::from_xml("<model/>").is_err());
    }

    #[test]
    fn single_mesh_is_named_after_file() {
        let scene = SceneDescription::single_mesh("assets/spider.obj");
        assert_eq!(scene.objects.len(), 1);
        assert_eq!(scene.objects[0].name, "spider");
    }
}
