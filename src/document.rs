use crate::{AttributeBag, BagId, GroupDataManager, MemoryBag, statics};
use anyhow::Context;
use flate2::{Compression, GzBuilder, read::GzDecoder};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::{Read, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// What the grouping layer needs from the application that owns the bags.
pub trait DocumentHost {
    /// Resolve a data path such as `objects.Cube` to a bag.
    fn resolve(&self, data_path: &str) -> Option<BagId>;

    fn bag(&self, id: BagId) -> Option<&dyn AttributeBag>;

    fn bag_mut(&mut self, id: BagId) -> Option<&mut dyn AttributeBag>;

    /// Every live bag: scenes first, then objects.
    fn bag_ids(&self) -> Vec<BagId>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json5,
    GzipJson5,
}

/// On-disk layout of a [`Document`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DocumentFile {
    #[serde(default)]
    scenes: IndexMap<String, MemoryBag>,
    #[serde(default)]
    objects: IndexMap<String, MemoryBag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    active_scene: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    active_object: Option<String>,
}

/// A standalone document of named scenes and objects, each carrying a bag
/// of custom properties.
#[derive(Debug, Clone)]
pub struct Document {
    pub source_path: Option<PathBuf>,
    pub format: DocumentFormat,
    scenes: IndexMap<String, MemoryBag>,
    objects: IndexMap<String, MemoryBag>,
    active_scene: Option<String>,
    active_object: Option<String>,
    next_id: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            source_path: None,
            format: DocumentFormat::Json5,
            scenes: IndexMap::new(),
            objects: IndexMap::new(),
            active_scene: None,
            active_object: None,
            next_id: 1,
        }
    }

    /// Read a document and prime `groups` from it.
    pub fn load_path(path: &Path, groups: &mut GroupDataManager) -> anyhow::Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("reading {path:?}"))?;
        let format = detect_format(path, &bytes);
        let text_bytes = match format {
            DocumentFormat::Json5 => bytes,
            DocumentFormat::GzipJson5 => {
                let mut decoder = GzDecoder::new(&bytes[..]);
                let mut out = Vec::new();
                decoder.read_to_end(&mut out).context("gzip decompress")?;
                out
            }
        };

        let text = std::str::from_utf8(&text_bytes).context("document is not valid UTF-8")?;
        let file: DocumentFile = json5::from_str(text).context("parsing JSON5")?;

        let mut doc = Self::from_file(file);
        doc.source_path = Some(path.to_path_buf());
        doc.format = format;

        let loaded = groups.on_document_load(&doc);
        info!(?path, bags = loaded, "Loaded document");
        Ok(doc)
    }

    /// Flush `groups` into the bags, then write the document.
    pub fn save_to_path(
        &mut self,
        path: &Path,
        groups: &mut GroupDataManager,
    ) -> anyhow::Result<()> {
        groups.on_document_save(self);

        let format = if path.extension().and_then(|e| e.to_str()) == Some("gz") {
            DocumentFormat::GzipJson5
        } else {
            DocumentFormat::Json5
        };
        let bytes = self.to_bytes(format)?;
        fs::write(path, &bytes).with_context(|| format!("writing {path:?}"))?;

        self.source_path = Some(path.to_path_buf());
        self.format = format;
        info!(?path, "Saved document");
        Ok(())
    }

    /// Close the document, dropping every cached store.
    pub fn close(self, groups: &mut GroupDataManager) {
        groups.clear();
        debug!(path = ?self.source_path, "Closed document");
    }

    pub fn to_bytes(&self, format: DocumentFormat) -> anyhow::Result<Vec<u8>> {
        let text = serde_json::to_string_pretty(&self.to_file()).context("serializing document")?;
        match format {
            DocumentFormat::Json5 => Ok(text.into_bytes()),
            DocumentFormat::GzipJson5 => {
                let mut encoder = GzBuilder::new()
                    .mtime(0)
                    .write(Vec::new(), Compression::default());
                encoder.write_all(text.as_bytes()).context("gzip compress")?;
                encoder.finish().context("gzip finish")
            }
        }
    }

    pub fn add_scene(&mut self, name: &str) -> BagId {
        let id = self.allocate_id();
        self.scenes.insert(name.to_string(), MemoryBag::new(id, name));
        if self.active_scene.is_none() {
            self.active_scene = Some(name.to_string());
        }
        BagId(id)
    }

    pub fn add_object(&mut self, name: &str) -> BagId {
        let id = self.allocate_id();
        self.objects.insert(name.to_string(), MemoryBag::new(id, name));
        BagId(id)
    }

    pub fn set_active_object(&mut self, name: Option<&str>) {
        self.active_object = name.map(str::to_string);
    }

    pub fn scene(&self, name: &str) -> Option<&MemoryBag> {
        self.scenes.get(name)
    }

    pub fn scene_mut(&mut self, name: &str) -> Option<&mut MemoryBag> {
        self.scenes.get_mut(name)
    }

    pub fn object(&self, name: &str) -> Option<&MemoryBag> {
        self.objects.get(name)
    }

    pub fn object_mut(&mut self, name: &str) -> Option<&mut MemoryBag> {
        self.objects.get_mut(name)
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn from_file(file: DocumentFile) -> Self {
        let mut doc = Self::new();
        for (name, mut bag) in file.scenes {
            bag.set_identity(doc.allocate_id(), &name);
            doc.scenes.insert(name, bag);
        }
        for (name, mut bag) in file.objects {
            bag.set_identity(doc.allocate_id(), &name);
            doc.objects.insert(name, bag);
        }
        doc.active_scene = file.active_scene.or_else(|| doc.scenes.keys().next().cloned());
        doc.active_object = file.active_object;
        doc
    }

    fn to_file(&self) -> DocumentFile {
        DocumentFile {
            scenes: self.scenes.clone(),
            objects: self.objects.clone(),
            active_scene: self.active_scene.clone(),
            active_object: self.active_object.clone(),
        }
    }

    fn bags(&self) -> impl Iterator<Item = &MemoryBag> {
        self.scenes.values().chain(self.objects.values())
    }

    fn find(&self, root: &str, name: &str) -> Option<&MemoryBag> {
        match root {
            statics::PATH_SCENES => self.scenes.get(name),
            statics::PATH_OBJECTS => self.objects.get(name),
            _ => None,
        }
    }
}

impl DocumentHost for Document {
    fn resolve(&self, data_path: &str) -> Option<BagId> {
        let bag = match data_path {
            statics::PATH_SCENE => self.scenes.get(self.active_scene.as_deref()?),
            statics::PATH_ACTIVE_OBJECT => self.objects.get(self.active_object.as_deref()?),
            _ => {
                let (root, name) = split_data_path(data_path)?;
                self.find(root, name)
            }
        };
        bag.map(|bag| bag.id())
    }

    fn bag(&self, id: BagId) -> Option<&dyn AttributeBag> {
        self.bags()
            .find(|bag| bag.id() == id)
            .map(|bag| bag as &dyn AttributeBag)
    }

    fn bag_mut(&mut self, id: BagId) -> Option<&mut dyn AttributeBag> {
        self.scenes
            .values_mut()
            .chain(self.objects.values_mut())
            .find(|bag| bag.id() == id)
            .map(|bag| bag as &mut dyn AttributeBag)
    }

    fn bag_ids(&self) -> Vec<BagId> {
        self.bags().map(|bag| bag.id()).collect()
    }
}

/// `objects.Cube` or `objects["Cube"]` -> `("objects", "Cube")`.
fn split_data_path(data_path: &str) -> Option<(&str, &str)> {
    if let Some((root, rest)) = data_path.split_once('[') {
        let name = rest
            .strip_suffix(']')?
            .trim_matches(|c| c == '"' || c == '\'');
        return Some((root, name));
    }
    data_path.split_once('.')
}

fn detect_format(path: &Path, bytes: &[u8]) -> DocumentFormat {
    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        return DocumentFormat::GzipJson5;
    }
    // Gzip magic: 1F 8B
    if bytes.len() >= 2 && bytes[0] == 0x1F && bytes[1] == 0x8B {
        return DocumentFormat::GzipJson5;
    }
    DocumentFormat::Json5
}

#[cfg(test)]
mod tests {
    use super::{Document, DocumentFormat, DocumentHost, detect_format, split_data_path};
    use crate::{AttributeBag, PropValue};
    use std::path::Path;

    #[test]
    fn detect_format_uses_extension_and_magic() {
        let gz_magic = [0x1F_u8, 0x8B_u8, 0x08_u8, 0x00_u8];
        let plain = b"{ scenes: {} }\n";

        assert_eq!(
            detect_format(Path::new("scene.json.gz"), plain),
            DocumentFormat::GzipJson5
        );
        assert_eq!(
            detect_format(Path::new("scene.json"), &gz_magic),
            DocumentFormat::GzipJson5
        );
        assert_eq!(
            detect_format(Path::new("scene.json5"), plain),
            DocumentFormat::Json5
        );
    }

    #[test]
    fn data_paths_accept_dotted_and_subscript_forms() {
        assert_eq!(split_data_path("objects.Cube"), Some(("objects", "Cube")));
        assert_eq!(
            split_data_path("objects[\"Cube.001\"]"),
            Some(("objects", "Cube.001"))
        );
        assert_eq!(split_data_path("objects[\"Cube\""), None);
        assert_eq!(split_data_path("objects"), None);
    }

    #[test]
    fn resolve_finds_scenes_objects_and_shortcuts() {
        let mut doc = Document::new();
        let scene = doc.add_scene("Scene");
        let cube = doc.add_object("Cube");
        doc.add_object("Lamp");

        assert_eq!(doc.resolve("scenes.Scene"), Some(scene));
        assert_eq!(doc.resolve("scene"), Some(scene));
        assert_eq!(doc.resolve("objects.Cube"), Some(cube));
        assert_eq!(doc.resolve("active_object"), None);
        assert_eq!(doc.resolve("objects.Missing"), None);
        assert_eq!(doc.resolve("meshes.Cube"), None);

        doc.set_active_object(Some("Cube"));
        assert_eq!(doc.resolve("active_object"), Some(cube));
        assert_eq!(doc.bag_ids().len(), 3);
        assert_eq!(doc.bag_ids()[0], scene);
    }

    #[test]
    fn bag_mut_writes_through() {
        let mut doc = Document::new();
        let cube = doc.add_object("Cube");
        doc.bag_mut(cube)
            .unwrap()
            .set("power", PropValue::Float(2.0))
            .unwrap();
        assert_eq!(
            doc.object("Cube").unwrap().get("power"),
            Some(&PropValue::Float(2.0))
        );
        assert_eq!(doc.bag(cube).unwrap().name(), "Cube");
    }
}
