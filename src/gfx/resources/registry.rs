//! Resource registry
//!
//! Owns every loaded model and texture. Each gets an immutable tag on
//! registration and is deduplicated by source path. Materials only hold
//! [`TextureRef`]s, so removing a texture clears it from every model.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::material::{TextureRef, TextureSlot};
use crate::gfx::import::{self, ImportConfig, ImportError};
use crate::gfx::rendering::backend::{ShadingBackend, TextureHandle};
use crate::gfx::rendering::renderer::{DrawModel, RenderConfig};
use crate::gfx::scene::Model;

/// Registry tag of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelTag(pub u32);

/// Registry tag of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureTag(pub u32);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown model {0:?}")]
    UnknownModel(ModelTag),
    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureTag),
    #[error("texture {} has {actual} bytes of pixel data, {width}x{height} RGBA needs {expected}", .path.display())]
    InvalidImage {
        path: PathBuf,
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug)]
struct TextureEntry {
    path: PathBuf,
    handle: TextureHandle,
    width: u32,
    height: u32,
}

#[derive(Debug)]
struct ModelEntry {
    path: PathBuf,
    model: Model,
}

/// Owner of models and textures
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    models: BTreeMap<ModelTag, ModelEntry>,
    model_paths: HashMap<PathBuf, ModelTag>,
    textures: BTreeMap<TextureTag, TextureEntry>,
    texture_paths: HashMap<PathBuf, TextureTag>,
    next_model: u32,
    next_texture: u32,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Imports a model, allocates its GPU buffers and registers it.
    ///
    /// A path that is already registered returns its existing tag. On
    /// failure nothing is registered and the error is logged and returned.
    pub fn load_model(
        &mut self,
        path: impl AsRef<Path>,
        config: &ImportConfig,
        backend: &mut dyn ShadingBackend,
    ) -> Result<ModelTag, ImportError> {
        let path = path.as_ref();
        let key = registry_key(path);
        if let Some(&tag) = self.model_paths.get(&key) {
            log::debug!("{} already loaded as {tag:?}", path.display());
            return Ok(tag);
        }

        let mut model = import::import(path, config).inspect_err(|err| {
            log::warn!("failed to import model: {err}");
        })?;

        let tag = ModelTag(self.next_model);
        self.next_model += 1;
        model.assign_tag(tag);
        model.init_gpu_buffers(backend);

        log::info!("registered model '{}' as {tag:?}", model.name);
        self.model_paths.insert(key.clone(), tag);
        self.models.insert(tag, ModelEntry { path: key, model });
        Ok(tag)
    }

    /// Uploads tightly packed RGBA8 pixels as a texture. Decoding image
    /// files is left to the caller.
    pub fn register_texture(
        &mut self,
        path: impl AsRef<Path>,
        width: u32,
        height: u32,
        rgba: &[u8],
        backend: &mut dyn ShadingBackend,
    ) -> Result<TextureTag, RegistryError> {
        let path = path.as_ref();
        let key = registry_key(path);
        if let Some(&tag) = self.texture_paths.get(&key) {
            return Ok(tag);
        }

        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected || expected == 0 {
            return Err(RegistryError::InvalidImage {
                path: path.to_path_buf(),
                width,
                height,
                expected,
                actual: rgba.len(),
            });
        }

        let handle = backend.create_texture(width, height, rgba);
        let tag = TextureTag(self.next_texture);
        self.next_texture += 1;

        log::info!("registered texture {} ({width}x{height}) as {tag:?}", path.display());
        self.texture_paths.insert(key.clone(), tag);
        self.textures.insert(
            tag,
            TextureEntry {
                path: key,
                handle,
                width,
                height,
            },
        );
        Ok(tag)
    }

    /// Binds a registered texture to `slot` on every node of a model
    pub fn assign_texture(
        &mut self,
        model: ModelTag,
        slot: TextureSlot,
        texture: TextureTag,
    ) -> Result<(), RegistryError> {
        let texture = self
            .texture(texture)
            .ok_or(RegistryError::UnknownTexture(texture))?;
        let entry = self
            .models
            .get_mut(&model)
            .ok_or(RegistryError::UnknownModel(model))?;
        entry.model.set_texture(slot, Some(texture));
        Ok(())
    }

    pub fn model(&self, tag: ModelTag) -> Option<&Model> {
        self.models.get(&tag).map(|entry| &entry.model)
    }

    pub fn model_mut(&mut self, tag: ModelTag) -> Option<&mut Model> {
        self.models.get_mut(&tag).map(|entry| &mut entry.model)
    }

    pub fn model_tag(&self, path: impl AsRef<Path>) -> Option<ModelTag> {
        self.model_paths.get(&registry_key(path.as_ref())).copied()
    }

    /// Registered models in tag order
    pub fn models(&self) -> impl Iterator<Item = (ModelTag, &Model)> {
        self.models.iter().map(|(&tag, entry)| (tag, &entry.model))
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    pub fn texture(&self, tag: TextureTag) -> Option<TextureRef> {
        self.textures.get(&tag).map(|entry| TextureRef {
            tag,
            handle: entry.handle,
        })
    }

    pub fn texture_tag(&self, path: impl AsRef<Path>) -> Option<TextureTag> {
        self.texture_paths.get(&registry_key(path.as_ref())).copied()
    }

    /// Pixel size of a registered texture
    pub fn texture_size(&self, tag: TextureTag) -> Option<(u32, u32)> {
        self.textures
            .get(&tag)
            .map(|entry| (entry.width, entry.height))
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Draws every model, returning the total number of draw calls
    pub fn draw_all(&self, backend: &mut dyn ShadingBackend, config: &RenderConfig) -> usize {
        self.models
            .values()
            .map(|entry| backend.draw_model(&entry.model, config))
            .sum()
    }

    /// Releases a model's GPU buffers and drops it
    pub fn remove_model(&mut self, tag: ModelTag, backend: &mut dyn ShadingBackend) -> bool {
        let Some(mut entry) = self.models.remove(&tag) else {
            return false;
        };
        self.model_paths.remove(&entry.path);
        entry.model.destroy(backend);
        true
    }

    /// Releases a texture and clears every material slot referencing it
    pub fn remove_texture(&mut self, tag: TextureTag, backend: &mut dyn ShadingBackend) -> bool {
        let Some(entry) = self.textures.remove(&tag) else {
            return false;
        };
        self.texture_paths.remove(&entry.path);
        for model in self.models.values_mut() {
            for index in 0..model.model.nodes().len() {
                if let Some(material) = model.model.material_mut(index) {
                    material.forget_texture(tag);
                }
            }
        }
        backend.release_texture(entry.handle);
        true
    }

    /// Releases everything. Tags are never reused.
    pub fn clear(&mut self, backend: &mut dyn ShadingBackend) {
        for (_, mut entry) in std::mem::take(&mut self.models) {
            entry.model.destroy(backend);
        }
        for (_, entry) in std::mem::take(&mut self.textures) {
            backend.release_texture(entry.handle);
        }
        self.model_paths.clear();
        self.texture_paths.clear();
    }
}

/// Canonical form of a path when it exists, the path as given otherwise
fn registry_key(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::rendering::recording::RecordingBackend;

    #[test]
    fn missing_model_registers_nothing() {
        let mut registry = ResourceRegistry::new();
        let mut backend = RecordingBackend::new();
        let err = registry
            .load_model("does/not/exist.fbx", &ImportConfig::default(), &mut backend)
            .unwrap_err();
        assert!(matches!(err, ImportError::NotFound(_)));
        assert_eq!(registry.model_count(), 0);
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn textures_are_deduplicated_and_tagged_in_order() {
        let mut registry = ResourceRegistry::new();
        let mut backend = RecordingBackend::new();
        let white = [255u8; 4];
        let a = registry
            .register_texture("a.png", 1, 1, &white, &mut backend)
            .unwrap();
        let b = registry
            .register_texture("b.png", 1, 1, &white, &mut backend)
            .unwrap();
        let again = registry
            .register_texture("a.png", 1, 1, &white, &mut backend)
            .unwrap();
        assert_eq!(a, TextureTag(0));
        assert_eq!(b, TextureTag(1));
        assert_eq!(again, a);
        assert_eq!(backend.live_textures(), 2);
        assert_eq!(registry.texture_size(b), Some((1, 1)));
        assert_eq!(registry.texture_tag("b.png"), Some(b));
    }

    #[test]
    fn rejects_wrong_pixel_count() {
        let mut registry = ResourceRegistry::new();
        let mut backend = RecordingBackend::new();
        let err = registry
            .register_texture("bad.png", 2, 2, &[0u8; 4], &mut backend)
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidImage { expected: 16, actual: 4, .. }));
        assert_eq!(registry.texture_count(), 0);
    }

    #[test]
    fn assignment_needs_known_tags() {
        let mut registry = ResourceRegistry::new();
        let mut backend = RecordingBackend::new();
        let texture = registry
            .register_texture("t.png", 1, 1, &[0u8; 4], &mut backend)
            .unwrap();
        assert_eq!(
            registry.assign_texture(ModelTag(3), TextureSlot::Albedo, texture),
            Err(RegistryError::UnknownModel(ModelTag(3)))
        );
        assert_eq!(
            registry.assign_texture(ModelTag(3), TextureSlot::Albedo, TextureTag(9)),
            Err(RegistryError::UnknownTexture(TextureTag(9)))
        );
    }

    #[test]
    fn clear_releases_textures() {
        let mut registry = ResourceRegistry::new();
        let mut backend = RecordingBackend::new();
        registry
            .register_texture("t.png", 1, 1, &[0u8; 4], &mut backend)
            .unwrap();
        assert!(registry.remove_texture(TextureTag(0), &mut backend));
        assert!(!registry.remove_texture(TextureTag(0), &mut backend));
        registry
            .register_texture("u.png", 1, 1, &[0u8; 4], &mut backend)
            .unwrap();
        registry.clear(&mut backend);
        assert_eq!(backend.live_textures(), 0);
        assert_eq!(registry.texture_count(), 0);
        // tags keep counting after a clear
        let next = registry
            .register_texture("t.png", 1, 1, &[0u8; 4], &mut backend)
            .unwrap();
        assert_eq!(next, TextureTag(2));
    }
}
