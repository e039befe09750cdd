//! Print queue: rasterize approved print requests and hand them to the rendering sink.
//!
//! The physical transport is not implemented here. [`RenderSink`] is the whole contract
//! with the device side; [`SpoolSink`] writes PNG files that an external printer driver
//! can pick up. A failed delivery leaves the message unprinted and is not retried.

pub mod raster;

use std::path::PathBuf;

use image::{GrayImage, ImageFormat};
use log::{debug, info};
use thiserror::Error;

use crate::config::PrinterConfig;
use crate::storage::MessageId;
pub use raster::{render, TrueTypeFace, Typeface};

/// Printable width of the common 58mm cat printers, in dots.
pub const DEFAULT_CANVAS_WIDTH: u32 = 384;

#[derive(Debug, Error)]
pub enum PrintError {
    #[error("font error: {0}")]
    Font(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("sink rejected job: {0}")]
    Sink(String),
}

/// A finished bitmap addressed to a device.
#[derive(Debug, Clone)]
pub struct PrintJob {
    pub message_id: MessageId,
    pub device: String,
    pub bitmap: GrayImage,
}

/// Consumer of finished bitmaps. `Ok` means the device side took ownership of the job.
pub trait RenderSink {
    fn deliver(&mut self, job: &PrintJob) -> Result<(), PrintError>;
}

/// Writes each job as `<device>-<message id>.png` into a spool directory.
pub struct SpoolSink {
    dir: PathBuf,
}

impl SpoolSink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, PrintError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, job: &PrintJob) -> PathBuf {
        self.dir
            .join(format!("{}-{:020}.png", job.device, job.message_id))
    }
}

impl RenderSink for SpoolSink {
    fn deliver(&mut self, job: &PrintJob) -> Result<(), PrintError> {
        let path = self.path_for(job);
        job.bitmap.save_with_format(&path, ImageFormat::Png)?;
        debug!("spooled job {} to {}", job.message_id, path.display());
        Ok(())
    }
}

pub struct PrintQueue {
    face: Box<dyn Typeface + Send>,
    sink: Box<dyn RenderSink + Send>,
    device: String,
    width: u32,
    height: u32,
}

impl PrintQueue {
    pub fn new<F, K>(face: F, sink: K, config: &PrinterConfig) -> Self
    where
        F: Typeface + Send + 'static,
        K: RenderSink + Send + 'static,
    {
        Self {
            face: Box::new(face),
            sink: Box::new(sink),
            device: config.device_name.clone(),
            width: config.width,
            height: config.height,
        }
    }

    pub fn render(&self, text: &str) -> GrayImage {
        render(text, self.face.as_ref(), self.width, self.height)
    }

    /// Render `text` and deliver it. Exactly one `deliver` call per invocation.
    pub fn print(&mut self, message_id: MessageId, text: &str) -> Result<(), PrintError> {
        let job = PrintJob {
            message_id,
            device: self.device.clone(),
            bitmap: self.render(text),
        };
        self.sink.deliver(&job)?;
        info!("printed message {} on {}", message_id, self.device);
        Ok(())
    }
}
