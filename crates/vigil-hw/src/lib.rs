//! vigil-hw — Hardware abstraction for camera capture.
//!
//! Probes V4L2 devices for a usable webcam and streams RGB24 frames at a
//! fixed capture configuration.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo, FrameStream};
pub use frame::Frame;
