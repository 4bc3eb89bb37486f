//! Presentation surfaces for rendered composites
//!
//! The render loop pushes every composite into a [`PresentationSurface`] and
//! stops once the surface reports itself inactive. Two surfaces exist:
//!
//! - [`ProjectorWindow`] - a latest-frame slot read by the egui projector
//!   viewport. Closing the viewport deactivates it.
//! - [`PngSequenceSurface`] - headless output to numbered PNG files, written
//!   on a background thread.

use crate::error::{Result, SandboxError};
use crate::raster::ColorRaster;
use crossbeam_channel::{bounded, Sender, TrySendError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

/// Frames buffered between the render loop and the PNG writer
const PNG_QUEUE_DEPTH: usize = 4;

/// Output side of the render loop
#[cfg_attr(test, mockall::automock)]
pub trait PresentationSurface: Send {
    /// `false` once the surface has been closed; the render loop then exits
    fn is_active(&self) -> bool;

    /// Show `image`; must not block on the consumer
    fn update_image(&mut self, image: &ColorRaster) -> Result<()>;
}

struct ProjectorShared {
    name: String,
    fullscreen: bool,
    active: AtomicBool,
    frame: Mutex<(Arc<ColorRaster>, u64)>,
}

/// Handle to the projector output, shared by the render loop and the UI
#[derive(Clone)]
pub struct ProjectorWindow {
    shared: Arc<ProjectorShared>,
}

impl ProjectorWindow {
    /// Open a projector output showing `initial`
    pub fn create_window(name: impl Into<String>, initial: ColorRaster, fullscreen: bool) -> Self {
        let name = name.into();
        tracing::info!(
            "Created projector window '{}' ({}x{}, fullscreen: {})",
            name,
            initial.width(),
            initial.height(),
            fullscreen
        );
        Self {
            shared: Arc::new(ProjectorShared {
                name,
                fullscreen,
                active: AtomicBool::new(true),
                frame: Mutex::new((Arc::new(initial), 0)),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn is_fullscreen(&self) -> bool {
        self.shared.fullscreen
    }

    /// Latest image and how many updates it has seen
    pub fn latest(&self) -> (Arc<ColorRaster>, u64) {
        let frame = self
            .shared
            .frame
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        (Arc::clone(&frame.0), frame.1)
    }

    /// Mark the window closed
    pub fn close(&self) {
        if self.shared.active.swap(false, Ordering::SeqCst) {
            tracing::info!("Projector window '{}' closed", self.shared.name);
        }
    }
}

impl PresentationSurface for ProjectorWindow {
    fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    fn update_image(&mut self, image: &ColorRaster) -> Result<()> {
        let image = Arc::new(image.clone());
        let mut frame = self
            .shared
            .frame
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        frame.0 = image;
        frame.1 += 1;
        Ok(())
    }
}

/// Headless surface writing `frame_NNNNNN.png` files
pub struct PngSequenceSurface {
    dir: PathBuf,
    sender: Option<Sender<(u64, ColorRaster)>>,
    writer: Option<JoinHandle<()>>,
    frame_budget: Option<u64>,
    queued: u64,
    dropped: u64,
    written: Arc<AtomicU64>,
    failed: Arc<AtomicBool>,
}

impl PngSequenceSurface {
    /// Start a writer into `dir`, going inactive after `frame_budget` frames
    pub fn new(dir: impl Into<PathBuf>, frame_budget: Option<u64>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let (tx, rx) = bounded::<(u64, ColorRaster)>(PNG_QUEUE_DEPTH);
        let written = Arc::new(AtomicU64::new(0));
        let failed = Arc::new(AtomicBool::new(false));

        let writer = {
            let dir = dir.clone();
            let written = Arc::clone(&written);
            let failed = Arc::clone(&failed);
            std::thread::Builder::new()
                .name("png-writer".to_string())
                .spawn(move || {
                    for (index, image) in rx {
                        let path = dir.join(format!("frame_{:06}.png", index));
                        match save_color_png(&path, &image) {
                            Ok(()) => {
                                written.fetch_add(1, Ordering::SeqCst);
                            }
                            Err(e) => {
                                tracing::error!("Failed to write {:?}: {}", path, e);
                                failed.store(true, Ordering::SeqCst);
                                break;
                            }
                        }
                    }
                })?
        };

        tracing::info!("Writing frames to {:?}", dir);
        Ok(Self {
            dir,
            sender: Some(tx),
            writer: Some(writer),
            frame_budget,
            queued: 0,
            dropped: 0,
            written,
            failed,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Frames handed to the writer
    pub fn frames_queued(&self) -> u64 {
        self.queued
    }

    /// Frames dropped because the writer was behind
    pub fn frames_dropped(&self) -> u64 {
        self.dropped
    }

    /// Wait for queued frames to be written; returns how many were
    pub fn finish(mut self) -> u64 {
        self.shutdown();
        self.written.load(Ordering::SeqCst)
    }

    fn shutdown(&mut self) {
        self.sender.take();
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                tracing::error!("PNG writer thread panicked");
            }
        }
    }
}

impl PresentationSurface for PngSequenceSurface {
    fn is_active(&self) -> bool {
        !self.failed.load(Ordering::SeqCst)
            && self.frame_budget.map_or(true, |budget| self.queued < budget)
    }

    fn update_image(&mut self, image: &ColorRaster) -> Result<()> {
        if !self.is_active() {
            return Ok(());
        }
        let Some(sender) = &self.sender else {
            return Err(SandboxError::Presentation("PNG writer stopped".to_string()));
        };
        match sender.try_send((self.queued, image.clone())) {
            Ok(()) => {
                self.queued += 1;
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                tracing::debug!("PNG writer behind, dropped frame ({} total)", self.dropped);
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(SandboxError::Channel(
                "PNG writer disconnected".to_string(),
            )),
        }
    }
}

impl Drop for PngSequenceSurface {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Write a color raster as an 8-bit RGB PNG
pub fn save_color_png(path: impl AsRef<Path>, image: &ColorRaster) -> Result<()> {
    let path = path.as_ref();
    let buffer = image::RgbImage::from_raw(
        image.width() as u32,
        image.height() as u32,
        image.to_rgb_bytes(),
    )
    .ok_or_else(|| SandboxError::Image("Color buffer does not match dimensions".to_string()))?;
    buffer.save(path)?;
    tracing::debug!("Saved {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Raster;

    fn gradient() -> ColorRaster {
        Raster::from_fn(6, 4, |x, y| [x as u8 * 40, y as u8 * 60, 7])
    }

    #[test]
    fn test_save_color_png_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.png");
        save_color_png(&path, &gradient()).unwrap();

        let loaded = image::open(&path).unwrap().into_rgb8();
        assert_eq!(loaded.dimensions(), (6, 4));
        assert_eq!(loaded.into_raw(), gradient().to_rgb_bytes());
    }

    #[test]
    fn test_projector_window_slot() {
        let mut window = ProjectorWindow::create_window("Projector", Raster::filled(2, 2, [0; 3]), true);
        let viewer = window.clone();
        assert!(window.is_active());

        window.update_image(&gradient()).unwrap();
        let (image, generation) = viewer.latest();
        assert_eq!(*image, gradient());
        assert_eq!(generation, 1);

        viewer.close();
        assert!(!window.is_active());
    }

    #[test]
    fn test_png_sequence_respects_budget() {
        let dir = tempfile::tempdir().unwrap();
        let mut surface = PngSequenceSurface::new(dir.path(), Some(3)).unwrap();

        let mut attempts = 0;
        while surface.is_active() && attempts < 1000 {
            surface.update_image(&gradient()).unwrap();
            attempts += 1;
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert_eq!(surface.frames_queued(), 3);
        assert!(!surface.is_active());

        let written = surface.finish();
        assert_eq!(written, 3);
        assert!(dir.path().join("frame_000000.png").exists());
        assert!(dir.path().join("frame_000002.png").exists());
    }
}
