//! V4L2 camera probing and capture via the `v4l` crate.

use crate::frame::{self, Frame};
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

/// Fixed capture configuration: low enough to keep per-frame cost cheap,
/// high enough for face crops to be usable.
pub const CAPTURE_WIDTH: u32 = 640;
pub const CAPTURE_HEIGHT: u32 = 480;
pub const CAPTURE_FPS: u32 = 30;
/// Device indices tried by [`Camera::probe`]: /dev/video0 .. /dev/video4.
pub const PROBE_CANDIDATES: usize = 5;
/// Single mmap buffer so a slow consumer always sees the newest frame
/// instead of a stale queue.
const STREAM_BUFFERS: u32 = 1;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error(
        "no usable camera found after probing {PROBE_CANDIDATES} devices — \
         check that a camera is connected and not in use by another application"
    )]
    NoUsableDevice,
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
}

/// Info about a discovered V4L2 capture device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
}

/// An opened, format-negotiated camera device.
pub struct Camera {
    device: Device,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
}

impl Camera {
    /// Open a specific V4L2 device and negotiate the capture format.
    pub fn open(device_path: &str) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            if e.to_string().contains("busy") || e.to_string().contains("EBUSY") {
                CameraError::DeviceBusy
            } else {
                CameraError::DeviceNotFound(format!("{device_path}: {e}"))
            }
        })?;

        let caps = device.query_caps().map_err(|e| {
            CameraError::CaptureFailed(format!("failed to query capabilities: {e}"))
        })?;
        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::StreamingNotSupported);
        }

        let mut fmt = device.format().map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
        })?;
        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = CAPTURE_WIDTH;
        fmt.height = CAPTURE_HEIGHT;

        let negotiated = device.set_format(&fmt).map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to set format: {e}"))
        })?;
        if negotiated.fourcc != FourCC::new(b"YUYV") {
            return Err(CameraError::FormatNegotiationFailed(format!(
                "unsupported pixel format: {:?} (need YUYV)",
                negotiated.fourcc
            )));
        }

        // Frame rate is best-effort; drivers that cannot honor it keep
        // their own and the pipeline rate limit still applies.
        let params = v4l::video::capture::Parameters::with_fps(CAPTURE_FPS);
        if let Err(e) = device.set_params(&params) {
            tracing::warn!(device = device_path, error = %e, "failed to set frame rate");
        }

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            width = negotiated.width,
            height = negotiated.height,
            "opened camera"
        );

        Ok(Self {
            device,
            width: negotiated.width,
            height: negotiated.height,
            device_path: device_path.to_string(),
        })
    }

    /// Probe `/dev/video0..4` for a camera that both opens and delivers a
    /// non-empty first frame.
    ///
    /// A device that opens but cannot produce frames (common for metadata
    /// nodes) is rejected, not accepted.
    pub fn probe() -> Result<Self, CameraError> {
        tracing::info!("probing for a usable camera");
        for index in 0..PROBE_CANDIDATES {
            let path = format!("/dev/video{index}");
            let camera = match Camera::open(&path) {
                Ok(camera) => camera,
                Err(e) => {
                    tracing::debug!(device = %path, error = %e, "probe candidate rejected");
                    continue;
                }
            };
            match camera.verify_first_frame() {
                Ok(()) => {
                    tracing::info!(device = %path, "found working camera");
                    return Ok(camera);
                }
                Err(e) => {
                    tracing::debug!(device = %path, error = %e, "camera opened but cannot read frames");
                }
            }
        }
        Err(CameraError::NoUsableDevice)
    }

    /// Dequeue one frame and require it to be non-empty.
    fn verify_first_frame(&self) -> Result<(), CameraError> {
        let mut stream = self.start()?;
        let frame = stream.read()?;
        if frame.data.is_empty() {
            return Err(CameraError::CaptureFailed("empty first frame".into()));
        }
        Ok(())
    }

    /// Begin streaming. The stream borrows the device; dropping it stops
    /// streaming while the device stays open.
    pub fn start(&self) -> Result<FrameStream<'_>, CameraError> {
        let stream = MmapStream::with_buffers(&self.device, BufType::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| {
                CameraError::CaptureFailed(format!("failed to create mmap stream: {e}"))
            })?;
        Ok(FrameStream {
            stream,
            width: self.width,
            height: self.height,
        })
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        let mut devices = Vec::new();

        for i in 0..16 {
            let path = format!("/dev/video{i}");
            if !Path::new(&path).exists() {
                continue;
            }
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
                continue;
            }
            devices.push(DeviceInfo {
                path,
                name: caps.card.clone(),
                driver: caps.driver.clone(),
            });
        }

        devices
    }
}

/// Live capture stream yielding RGB24 frames.
pub struct FrameStream<'a> {
    stream: MmapStream<'a>,
    width: u32,
    height: u32,
}

impl FrameStream<'_> {
    /// Read the next frame. Any error here ends the capture session.
    pub fn read(&mut self) -> Result<Frame, CameraError> {
        let (buf, meta) = self
            .stream
            .next()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;

        let data = frame::yuyv_to_rgb(buf, self.width, self.height)
            .map_err(|e| CameraError::CaptureFailed(format!("YUYV conversion failed: {e}")))?;

        Ok(Frame {
            data,
            width: self.width,
            height: self.height,
            timestamp: std::time::Instant::now(),
            sequence: meta.sequence,
        })
    }
}
