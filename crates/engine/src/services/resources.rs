use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};
use thiserror::Error;
use tracing::debug;

use crate::world::{Camera, SoundParams, StateLayer, Vec3};

#[derive(Debug, Clone, PartialEq)]
pub struct BitmapDescriptor {
    pub filename: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetupDescriptor {
    pub name: String,
    pub camera: Camera,
    pub background: Option<BitmapDescriptor>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateDescriptor {
    pub setup: u32,
    pub layer: StateLayer,
    pub bitmap: BitmapDescriptor,
    pub zbitmap: Option<BitmapDescriptor>,
}

/// Parsed contents of a set resource, before any entity exists for it.
#[derive(Debug, Clone, PartialEq)]
pub struct SetDescriptor {
    pub name: String,
    pub setups: Vec<SetupDescriptor>,
    pub states: Vec<StateDescriptor>,
    pub sound: SoundParams,
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("failed to read resource {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed resource {path} at {line}:{column}: {message}")]
    Malformed {
        path: PathBuf,
        line: u32,
        column: u32,
        message: String,
    },
}

/// Opens named game resources.
pub trait ResourceLoader {
    /// `Ok(None)` when no resource with that name exists.
    fn open_set(&mut self, name: &str) -> Result<Option<SetDescriptor>, ResourceError>;
}

/// Reads `<Set>` XML descriptors from a data directory.
#[derive(Debug, Clone)]
pub struct DirResourceLoader {
    data_dir: PathBuf,
}

impl DirResourceLoader {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }
}

impl ResourceLoader for DirResourceLoader {
    fn open_set(&mut self, name: &str) -> Result<Option<SetDescriptor>, ResourceError> {
        let path = self.data_dir.join(name);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "set_resource_missing");
                return Ok(None);
            }
            Err(source) => return Err(ResourceError::Io { path, source }),
        };
        parse_set_document(&path, &raw).map(Some)
    }
}

/// In-memory resources, keyed by resource name.
#[derive(Debug, Clone, Default)]
pub struct MemoryResourceLoader {
    sets: HashMap<String, SetDescriptor>,
}

impl MemoryResourceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_set(&mut self, resource_name: impl Into<String>, set: SetDescriptor) {
        self.sets.insert(resource_name.into(), set);
    }

    pub fn with_set(mut self, resource_name: impl Into<String>, set: SetDescriptor) -> Self {
        self.insert_set(resource_name, set);
        self
    }
}

impl ResourceLoader for MemoryResourceLoader {
    fn open_set(&mut self, name: &str) -> Result<Option<SetDescriptor>, ResourceError> {
        Ok(self.sets.get(name).cloned())
    }
}

pub fn parse_set_document(path: &Path, raw: &str) -> Result<SetDescriptor, ResourceError> {
    let doc = Document::parse(raw).map_err(|error| ResourceError::Malformed {
        path: path.to_path_buf(),
        line: error.pos().row,
        column: error.pos().col,
        message: format!("malformed XML: {error}"),
    })?;
    let parser = SetParser { path, doc: &doc };
    parser.parse()
}

struct SetParser<'a, 'input> {
    path: &'a Path,
    doc: &'a Document<'input>,
}

impl<'a, 'input> SetParser<'a, 'input> {
    fn parse(&self) -> Result<SetDescriptor, ResourceError> {
        let root = self.doc.root_element();
        if root.tag_name().name() != "Set" {
            return Err(self.error_at(root, "root element must be <Set>"));
        }
        let name = self.required_attr(root, "name")?.to_string();

        let mut setups = Vec::new();
        let mut state_nodes = Vec::new();
        let mut sound = SoundParams::default();
        for child in root.children().filter(|node| node.is_element()) {
            match child.tag_name().name() {
                "Setup" => setups.push(self.parse_setup(child)?),
                "ObjectState" => state_nodes.push(child),
                "Sound" => {
                    sound = SoundParams {
                        min_volume: self.number_attr(child, "min")?,
                        max_volume: self.number_attr(child, "max")?,
                    };
                }
                other => {
                    return Err(self.error_at(child, &format!("unknown element <{other}> in <Set>")))
                }
            }
        }
        if setups.is_empty() {
            return Err(self.error_at(root, "<Set> needs at least one <Setup>"));
        }

        let mut states = Vec::new();
        for node in state_nodes {
            let setup_name = self.required_attr(node, "setup")?;
            let setup = setups
                .iter()
                .position(|setup| setup.name == setup_name)
                .ok_or_else(|| {
                    self.error_at(node, &format!("unknown setup '{setup_name}'"))
                })?;
            let layer_name = self.required_attr(node, "layer")?;
            let layer = StateLayer::parse(layer_name).ok_or_else(|| {
                self.error_at(node, &format!("invalid layer '{layer_name}'"))
            })?;
            let bitmap = self.bitmap(node, "bitmap")?.ok_or_else(|| {
                self.error_at(node, "missing required attribute 'bitmap'")
            })?;
            let zbitmap = self.bitmap(node, "zbitmap")?;
            states.push(StateDescriptor {
                setup: setup as u32,
                layer,
                bitmap,
                zbitmap,
            });
        }

        Ok(SetDescriptor {
            name,
            setups,
            states,
            sound,
        })
    }

    fn parse_setup(&self, node: Node<'_, '_>) -> Result<SetupDescriptor, ResourceError> {
        let name = self.required_attr(node, "name")?.to_string();
        let mut camera = Camera {
            fov: 60.0,
            ..Camera::default()
        };
        for child in node.children().filter(|child| child.is_element()) {
            if child.tag_name().name() != "Camera" {
                return Err(self.error_at(
                    child,
                    &format!("unknown element <{}> in <Setup>", child.tag_name().name()),
                ));
            }
            camera = Camera {
                position: self.vec3_attr(child, "position")?,
                interest: self.vec3_attr(child, "interest")?,
                roll: self.optional_number(child, "roll")?.unwrap_or(0.0),
                fov: self.optional_number(child, "fov")?.unwrap_or(60.0),
            };
        }
        Ok(SetupDescriptor {
            name,
            camera,
            background: self.bitmap(node, "background")?,
        })
    }

    /// `<attr>` names the file; `width`/`height` (or `<attr>_width`) give its size.
    fn bitmap(
        &self,
        node: Node<'_, '_>,
        attr: &str,
    ) -> Result<Option<BitmapDescriptor>, ResourceError> {
        let Some(filename) = node.attribute(attr) else {
            return Ok(None);
        };
        let (width_attr, height_attr) = if attr == "zbitmap" {
            ("zbitmap_width", "zbitmap_height")
        } else {
            ("width", "height")
        };
        Ok(Some(BitmapDescriptor {
            filename: filename.to_string(),
            width: self.optional_number(node, width_attr)?.unwrap_or(0),
            height: self.optional_number(node, height_attr)?.unwrap_or(0),
        }))
    }

    fn required_attr<'n>(
        &self,
        node: Node<'n, 'input>,
        attr: &str,
    ) -> Result<&'n str, ResourceError> {
        node.attribute(attr)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| self.error_at(node, &format!("missing required attribute '{attr}'")))
    }

    fn number_attr<T: std::str::FromStr>(
        &self,
        node: Node<'_, '_>,
        attr: &str,
    ) -> Result<T, ResourceError> {
        self.optional_number(node, attr)?
            .ok_or_else(|| self.error_at(node, &format!("missing required attribute '{attr}'")))
    }

    fn optional_number<T: std::str::FromStr>(
        &self,
        node: Node<'_, '_>,
        attr: &str,
    ) -> Result<Option<T>, ResourceError> {
        let Some(raw) = node.attribute(attr) else {
            return Ok(None);
        };
        raw.trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| self.error_at(node, &format!("attribute '{attr}' is not a number: '{raw}'")))
    }

    fn vec3_attr(&self, node: Node<'_, '_>, attr: &str) -> Result<Vec3, ResourceError> {
        let Some(raw) = node.attribute(attr) else {
            return Ok(Vec3::default());
        };
        let parts = raw
            .split_whitespace()
            .map(str::parse::<f32>)
            .collect::<Result<Vec<_>, _>>()
            .ok()
            .filter(|parts| parts.len() == 3)
            .ok_or_else(|| {
                self.error_at(node, &format!("attribute '{attr}' must be three numbers"))
            })?;
        Ok(Vec3::new(parts[0], parts[1], parts[2]))
    }

    fn error_at(&self, node: Node<'_, '_>, message: &str) -> ResourceError {
        let pos = self.doc.text_pos_at(node.range().start);
        ResourceError::Malformed {
            path: self.path.to_path_buf(),
            line: pos.row,
            column: pos.col,
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    const OFFICE: &str = r#"<Set name="mo.set">
  <Sound min="10" max="100"/>
  <Setup name="mo_ddtws" background="mo_ddtws.bm" width="640" height="480">
    <Camera position="0.5 1 2" interest="0 0 0" roll="0" fov="45"/>
  </Setup>
  <Setup name="mo_winws" background="mo_winws.bm"/>
  <ObjectState setup="mo_winws" layer="overlay" bitmap="mo_lamp.bm" width="32" height="64"/>
</Set>"#;

    #[test]
    fn parses_setups_states_and_sound() {
        let set = parse_set_document(Path::new("mo.set"), OFFICE).expect("parse");
        assert_eq!(set.name, "mo.set");
        assert_eq!(set.setups.len(), 2);
        assert_eq!(set.setups[0].camera.position, Vec3::new(0.5, 1.0, 2.0));
        assert_eq!(set.setups[0].camera.fov, 45.0);
        assert_eq!(
            set.setups[0].background.as_ref().map(|bitmap| bitmap.width),
            Some(640)
        );
        assert_eq!(set.states.len(), 1);
        assert_eq!(set.states[0].setup, 1);
        assert_eq!(set.states[0].layer, StateLayer::Overlay);
        assert_eq!(set.sound.min_volume, 10);
    }

    #[test]
    fn malformed_xml_reports_location() {
        let raw = "<Set name=\"x\">\n  <Setup name=\"one\"></Set>\n</Set>";
        let error = parse_set_document(Path::new("bad.set"), raw).expect_err("malformed");
        match error {
            ResourceError::Malformed { line, message, .. } => {
                assert_eq!(line, 2);
                assert!(message.contains("malformed XML"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_setup_reference_is_rejected() {
        let raw = r#"<Set name="a.set"><Setup name="one"/><ObjectState setup="two" layer="state" bitmap="x.bm"/></Set>"#;
        let error = parse_set_document(Path::new("a.set"), raw).expect_err("unknown setup");
        match error {
            ResourceError::Malformed { message, .. } => assert!(message.contains("two")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let temp = TempDir::new().expect("temp");
        let mut loader = DirResourceLoader::new(temp.path());
        assert!(loader.open_set("nowhere.set").expect("load").is_none());
    }

    #[test]
    fn directory_loader_reads_descriptor() {
        let temp = TempDir::new().expect("temp");
        fs::write(temp.path().join("mo.set"), OFFICE).expect("write");
        let mut loader = DirResourceLoader::new(temp.path());
        let set = loader.open_set("mo.set").expect("load").expect("present");
        assert_eq!(set.setups[1].name, "mo_winws");
    }
}
