use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::atlas::Handle;
use crate::backend::GraphicsBackend;
use crate::batcher::AtlasBatcher;
use crate::error::{BatcherError, Result};

/// JSON description of a baked atlas: where every input image ended up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtlasManifest {
    pub atlas: String,
    pub width: u32,
    pub height: u32,
    pub images: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Normalized top-left and bottom-right corners.
    pub uv: [f32; 4],
}

impl AtlasManifest {
    pub fn from_batcher<B: GraphicsBackend>(
        batcher: &AtlasBatcher<B>,
        atlas_path: &Path,
        images: &[(PathBuf, Handle)],
    ) -> Result<Self> {
        let mut entries = Vec::with_capacity(images.len());

        for (path, handle) in images {
            let record = batcher
                .placement(handle)
                .ok_or(BatcherError::UnknownHandle(handle.key()))?;

            entries.push(ManifestEntry {
                name: path.display().to_string(),
                x: record.bounds.x,
                y: record.bounds.y,
                width: record.bounds.width,
                height: record.bounds.height,
                uv: [
                    record.top_left.x,
                    record.top_left.y,
                    record.bottom_right.x,
                    record.bottom_right.y,
                ],
            });
        }

        let size = batcher.atlas_size();
        Ok(Self {
            atlas: atlas_path.display().to_string(),
            width: size.width,
            height: size.height,
            images: entries,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self).map_err(std::io::Error::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use crate::config::BatcherConfig;
    use crate::source::SourceImage;
    use image::RgbaImage;

    #[test]
    fn test_manifest_lists_placements() {
        let config = BatcherConfig { initial_atlas_size: 16, ..BatcherConfig::default() };
        let mut batcher = AtlasBatcher::with_config(HeadlessBackend::default(), config).unwrap();
        let image = SourceImage::new(RgbaImage::new(8, 4));
        let handle = batcher.create_handle(&image).unwrap();

        let manifest = AtlasManifest::from_batcher(
            &batcher,
            Path::new("atlas.png"),
            &[(PathBuf::from("hero.png"), handle)],
        )
        .unwrap();

        assert_eq!(manifest.width, 16);
        assert_eq!(manifest.images[0].name, "hero.png");
        assert_eq!(manifest.images[0].uv, [0.0, 0.0, 0.5, 0.25]);

        let json = serde_json::to_string(&manifest).unwrap();
        let parsed: AtlasManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, manifest);
    }
}
