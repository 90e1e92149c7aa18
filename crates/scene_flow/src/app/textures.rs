use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const MISSING_TEXTURE_KEY: &str = "missing";
pub const MISSING_TEXTURE_SIZE: (u32, u32) = (32, 48);
const MISSING_TEXTURE_COLOR: Rgba<u8> = Rgba([0xff, 0x00, 0x00, 0xff]);

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("texture key must not be empty")]
    EmptyKey,
    #[error("failed to load texture '{key}' from {path}: {source}")]
    Load {
        key: String,
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to read texture directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Decoded textures by key.
#[derive(Debug, Clone, Default)]
pub struct TextureRegistry {
    textures: HashMap<String, RgbaImage>,
}

impl TextureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, image: RgbaImage) -> Result<(), TextureError> {
        if key.is_empty() {
            return Err(TextureError::EmptyKey);
        }
        self.textures.insert(key.to_string(), image);
        Ok(())
    }

    pub fn load_file(&mut self, key: &str, path: &Path) -> Result<(), TextureError> {
        let image = image::open(path)
            .map_err(|source| TextureError::Load {
                key: key.to_string(),
                path: path.to_path_buf(),
                source,
            })?
            .to_rgba8();
        debug!(
            key,
            path = %path.display(),
            width = image.width(),
            height = image.height(),
            "texture_loaded"
        );
        self.insert(key, image)
    }

    /// Loads every `*.png` directly inside `dir`, keyed by file stem. A
    /// missing directory loads nothing; an undecodable file is skipped with a
    /// warning. Returns how many textures were loaded.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, TextureError> {
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "texture_dir_absent");
            return Ok(0);
        }
        let read_dir_error = |source| TextureError::ReadDir {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(read_dir_error)? {
            let path = entry.map_err(read_dir_error)?.path();
            let is_png = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
            if path.is_file() && is_png {
                paths.push(path);
            }
        }
        paths.sort();

        let mut loaded = 0usize;
        for path in paths {
            let Some(key) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match self.load_file(key, &path) {
                Ok(()) => loaded += 1,
                Err(error) => warn!(error = %error, "texture_load_failed"),
            }
        }
        info!(dir = %dir.display(), loaded, "textures_loaded");
        Ok(loaded)
    }

    pub fn exists(&self, key: &str) -> bool {
        self.textures.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&RgbaImage> {
        self.textures.get(key)
    }

    pub fn dimensions(&self, key: &str) -> Option<(u32, u32)> {
        self.get(key).map(RgbaImage::dimensions)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Returns `key` when present, otherwise logs a warning and returns the
    /// generated placeholder key.
    pub fn resolve_or_placeholder(&mut self, key: &str) -> String {
        if self.exists(key) {
            return key.to_string();
        }

        let mut available: Vec<&str> = self.textures.keys().map(String::as_str).collect();
        available.sort_unstable();
        warn!(key, available = ?available, "texture_missing_using_placeholder");

        self.textures
            .entry(MISSING_TEXTURE_KEY.to_string())
            .or_insert_with(|| {
                let (width, height) = MISSING_TEXTURE_SIZE;
                RgbaImage::from_pixel(width, height, MISSING_TEXTURE_COLOR)
            });
        MISSING_TEXTURE_KEY.to_string()
    }
}
