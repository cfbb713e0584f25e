//! Pixel storage for image annotations
//!
//! Image annotations only carry an [`ImageKey`]; the decoded pixels live here so that
//! copies, undo snapshots, and serialized annotation sets stay small.

use crate::error::CodecError;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Reference from an image annotation to its pixel data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageKey(Uuid);

impl ImageKey {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ImageKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImageStore {
    images: HashMap<ImageKey, Arc<RgbaImage>>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, image: RgbaImage) -> ImageKey {
        let key = ImageKey::new();
        self.images.insert(key, Arc::new(image));
        key
    }

    /// Decode PNG or JPEG bytes and store the pixels
    pub fn insert_encoded(&mut self, bytes: &[u8]) -> Result<ImageKey, CodecError> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|err| CodecError::InvalidImage(err.to_string()))?;
        Ok(self.insert(decoded.to_rgba8()))
    }

    pub fn get(&self, key: &ImageKey) -> Option<&Arc<RgbaImage>> {
        self.images.get(key)
    }

    /// Store the same pixels under a new key, for pasted copies
    pub fn duplicate(&mut self, key: &ImageKey) -> Option<ImageKey> {
        let pixels = self.images.get(key)?.as_ref().clone();
        Some(self.insert(pixels))
    }

    pub fn remove(&mut self, key: &ImageKey) -> Option<Arc<RgbaImage>> {
        self.images.remove(key)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
