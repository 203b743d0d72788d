//! Page provider backed by a directory of image files
//!
//! Every image in the directory, in file name order, is one page. Sizes are read
//! from the file headers; pixels are decoded on demand and kept in an LRU cache.

use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use fast_image_resize as fr;
use image::RgbaImage;
use log::{debug, warn};
use walkdir::WalkDir;

use super::bitmap::Bitmap;
use super::cache::PageImageCache;
use super::content::{PageContent, PageContentProvider, RenderRequest, SharedContent};
use super::geometry::{Rect, SizeF};
use crate::error::ProviderError;

const DEFAULT_CACHE_PAGES: usize = 8;
const PAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Pages loaded from image files
pub struct ImageDirectoryProvider {
    root: PathBuf,
    files: Vec<PathBuf>,
    cache: Arc<Mutex<PageImageCache>>,
}

impl ImageDirectoryProvider {
    /// Scan `dir` (non-recursively) for page images
    pub fn open(dir: &Path) -> Result<Self, ProviderError> {
        Self::with_cache_size(dir, DEFAULT_CACHE_PAGES)
    }

    pub fn with_cache_size(dir: &Path, cache_pages: usize) -> Result<Self, ProviderError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| ProviderError::Io {
                path: dir.to_path_buf(),
                source: e.into(),
            })?;
            if entry.file_type().is_file() && is_page_image(entry.path()) {
                files.push(entry.into_path());
            }
        }

        if files.is_empty() {
            return Err(ProviderError::EmptyDirectory(dir.to_path_buf()));
        }
        debug!("Found {} page images in {}", files.len(), dir.display());

        Ok(Self {
            root: dir.to_path_buf(),
            files,
            cache: Arc::new(Mutex::new(PageImageCache::new(cache_pages))),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    fn decode(&self, index: usize) -> Result<Arc<RgbaImage>, ProviderError> {
        let cached = self
            .cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(index);
        if let Some(image) = cached {
            return Ok(image);
        }

        let path = self
            .files
            .get(index)
            .ok_or_else(|| ProviderError::generic(format!("page {index} out of range")))?;
        let image = image::open(path)?.to_rgba8();
        debug!(
            "Decoded page {index} ({}x{}) from {}",
            image.width(),
            image.height(),
            path.display()
        );

        Ok(self
            .cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(index, image))
    }
}

impl PageContentProvider for ImageDirectoryProvider {
    fn count(&self) -> usize {
        self.files.len()
    }

    fn size_of(&self, index: usize) -> Option<SizeF> {
        let path = self.files.get(index)?;
        match imagesize::size(path) {
            Ok(size) => Some(SizeF::new(size.width as f32, size.height as f32)),
            Err(e) => {
                warn!("Failed to read size of {}: {e}", path.display());
                None
            }
        }
    }

    fn content_of(&self, index: usize) -> Option<SharedContent> {
        match self.decode(index) {
            Ok(image) => Some(Arc::new(ImagePage { index, image })),
            Err(e) => {
                warn!("Failed to load page {index}: {e}");
                None
            }
        }
    }
}

impl std::fmt::Debug for ImageDirectoryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageDirectoryProvider")
            .field("root", &self.root)
            .field("pages", &self.files.len())
            .finish_non_exhaustive()
    }
}

fn is_page_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            PAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// One decoded page image
pub struct ImagePage {
    index: usize,
    image: Arc<RgbaImage>,
}

impl ImagePage {
    fn render(&self, request: &RenderRequest) -> Result<Option<Bitmap>, ProviderError> {
        if request.is_degenerate() {
            return Ok(None);
        }
        let page = Rect::new(0, 0, request.page_width, request.page_height);
        let window = Rect::new(
            -request.start_x,
            -request.start_y,
            -request.start_x + request.bitmap_width,
            -request.start_y + request.bitmap_height,
        );
        let Some(visible) = page.intersect(&window) else {
            return Ok(Bitmap::new(
                request.bitmap_width as u32,
                request.bitmap_height as u32,
                super::bitmap::PixelFormat::Rgba8888,
            ));
        };

        let (img_w, img_h) = self.image.dimensions();
        let scale_x = img_w as f32 / request.page_width as f32;
        let scale_y = img_h as f32 / request.page_height as f32;
        let src_x = ((visible.left as f32 * scale_x) as u32).min(img_w.saturating_sub(1));
        let src_y = ((visible.top as f32 * scale_y) as u32).min(img_h.saturating_sub(1));
        let src_w = ((visible.width() as f32 * scale_x).ceil() as u32)
            .clamp(1, img_w - src_x);
        let src_h = ((visible.height() as f32 * scale_y).ceil() as u32)
            .clamp(1, img_h - src_y);

        let region = image::imageops::crop_imm(self.image.as_ref(), src_x, src_y, src_w, src_h)
            .to_image();
        let resized = resample(
            region,
            visible.width() as u32,
            visible.height() as u32,
            request.high_quality,
        )?;
        let piece = Bitmap::from_rgba(resized)
            .ok_or_else(|| ProviderError::generic("empty resample result"))?;

        if visible == window {
            return Ok(Some(piece));
        }
        let Some(mut bitmap) = Bitmap::new(
            request.bitmap_width as u32,
            request.bitmap_height as u32,
            piece.format(),
        ) else {
            return Ok(None);
        };
        bitmap.draw_bitmap(&piece, visible.left - window.left, visible.top - window.top);
        Ok(Some(bitmap))
    }
}

impl PageContent for ImagePage {
    fn size(&self) -> SizeF {
        let (w, h) = self.image.dimensions();
        SizeF::new(w as f32, h as f32)
    }

    fn render_to_bitmap(&self, request: &RenderRequest) -> Option<Bitmap> {
        match self.render(request) {
            Ok(bitmap) => bitmap,
            Err(e) => {
                warn!("Rendering page {} failed: {e}", self.index);
                None
            }
        }
    }
}

/// Resize with Lanczos3 for high quality renders and bilinear otherwise
pub fn resample(
    src: RgbaImage,
    width: u32,
    height: u32,
    high_quality: bool,
) -> Result<RgbaImage, ProviderError> {
    if src.dimensions() == (width, height) {
        return Ok(src);
    }
    let (src_width, src_height) = src.dimensions();
    let nonzero = |v: u32| {
        NonZeroU32::new(v).ok_or_else(|| ProviderError::generic("zero sized resample"))
    };

    let src_image = fr::Image::from_vec_u8(
        nonzero(src_width)?,
        nonzero(src_height)?,
        src.into_raw(),
        fr::PixelType::U8x4,
    )
    .map_err(|e| ProviderError::generic(e.to_string()))?;
    let mut dst_image = fr::Image::new(nonzero(width)?, nonzero(height)?, fr::PixelType::U8x4);

    let filter = if high_quality {
        fr::FilterType::Lanczos3
    } else {
        fr::FilterType::Bilinear
    };
    let mut resizer = fr::Resizer::new(fr::ResizeAlg::Convolution(filter));
    resizer
        .resize(&src_image.view(), &mut dst_image.view_mut())
        .map_err(|e| ProviderError::generic(e.to_string()))?;

    RgbaImage::from_raw(width, height, dst_image.into_vec())
        .ok_or_else(|| ProviderError::generic("resized buffer has the wrong length"))
}
