use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::device::{PixelFormat, RenderDevice, SamplerDesc, TextureUpload};

/// Decoded pixels as produced by an image decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub components_per_pixel: u8,
    pub bytes_per_component: u8,
    /// Tightly packed rows, native-endian components.
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    /// Upload format for this image, or `None` if the layout is unsupported
    /// or the pixel buffer does not match the stated dimensions.
    pub fn pixel_format(&self) -> Option<PixelFormat> {
        let format = PixelFormat::from_layout(self.components_per_pixel, self.bytes_per_component)?;
        let expected = self.width as usize * self.height as usize * format.bytes_per_pixel();
        (expected > 0 && expected == self.pixels.len()).then_some(format)
    }
}

/// Turns a resource path into pixels. `None` means the image has no data.
pub trait ImageDecoder {
    fn decode(&self, path: &str) -> Option<DecodedImage>;
}

/// Decodes images from files below a resource root using the `image` crate.
#[derive(Debug, Clone)]
pub struct FileImageDecoder {
    root: PathBuf,
}

impl FileImageDecoder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ImageDecoder for FileImageDecoder {
    fn decode(&self, path: &str) -> Option<DecodedImage> {
        let full = self.root.join(path);
        let img = match image::open(&full) {
            Ok(img) => img,
            Err(e) => {
                tracing::warn!("failed to decode {}: {e}", full.display());
                return None;
            }
        };
        let (width, height) = (img.width(), img.height());
        let (components_per_pixel, bytes_per_component, pixels) = match img {
            image::DynamicImage::ImageLuma8(buf) => (1, 1, buf.into_raw()),
            image::DynamicImage::ImageLumaA8(buf) => (2, 1, buf.into_raw()),
            image::DynamicImage::ImageRgb8(buf) => (3, 1, buf.into_raw()),
            image::DynamicImage::ImageRgba8(buf) => (4, 1, buf.into_raw()),
            image::DynamicImage::ImageLuma16(buf) => (1, 2, widen(buf.into_raw())),
            image::DynamicImage::ImageLumaA16(buf) => (2, 2, widen(buf.into_raw())),
            image::DynamicImage::ImageRgb16(buf) => (3, 2, widen(buf.into_raw())),
            image::DynamicImage::ImageRgba16(buf) => (4, 2, widen(buf.into_raw())),
            other => (4, 1, other.to_rgba8().into_raw()),
        };
        tracing::debug!(
            "decoded {} ({width}x{height}, {components_per_pixel}x{bytes_per_component}B)",
            full.display()
        );
        Some(DecodedImage {
            width,
            height,
            components_per_pixel,
            bytes_per_component,
            pixels,
        })
    }
}

fn widen(samples: Vec<u16>) -> Vec<u8> {
    bytemuck::cast_slice(&samples).to_vec()
}

/// Index of a cached texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(u32);

/// Path-keyed texture cache. Each distinct path is decoded and uploaded at most once.
///
/// Entries live for the whole session. Failed decodes are not cached, so a
/// later request for the same path decodes again. Not safe to populate from
/// more than one thread.
pub struct TextureCache<D: RenderDevice> {
    textures: Vec<D::Texture>,
    by_path: HashMap<String, TextureHandle>,
    sampler: SamplerDesc,
}

impl<D: RenderDevice> Default for TextureCache<D> {
    fn default() -> Self {
        Self::new(SamplerDesc::TRILINEAR_REPEAT)
    }
}

impl<D: RenderDevice> TextureCache<D> {
    pub fn new(sampler: SamplerDesc) -> Self {
        Self {
            textures: Vec::new(),
            by_path: HashMap::new(),
            sampler,
        }
    }

    /// Return the cached handle for `path`, decoding and uploading on first use.
    pub fn get_or_create(
        &mut self,
        device: &mut D,
        decoder: &dyn ImageDecoder,
        path: &str,
    ) -> Option<TextureHandle> {
        if path.is_empty() {
            return None;
        }
        if let Some(&handle) = self.by_path.get(path) {
            return Some(handle);
        }

        let image = decoder.decode(path)?;
        let Some(format) = image.pixel_format() else {
            tracing::warn!(
                path,
                components = image.components_per_pixel,
                bytes = image.bytes_per_component,
                "unsupported pixel layout, texture skipped"
            );
            return None;
        };

        let texture = device.create_texture(
            &TextureUpload {
                width: image.width,
                height: image.height,
                format,
                pixels: &image.pixels,
            },
            &self.sampler,
        );
        device.generate_mipmaps(&texture);

        let handle = TextureHandle(self.textures.len() as u32);
        self.textures.push(texture);
        self.by_path.insert(path.to_string(), handle);
        tracing::debug!(path, width = image.width, height = image.height, "texture uploaded");
        Some(handle)
    }

    /// Cached handle for `path` without decoding.
    pub fn get(&self, path: &str) -> Option<TextureHandle> {
        self.by_path.get(path).copied()
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&D::Texture> {
        self.textures.get(handle.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}
