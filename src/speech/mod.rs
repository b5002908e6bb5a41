//! Speech devices: the capture source (speech-to-text) and the output sink
//! (text-to-speech).
//!
//! Both are exclusive, session-wide resources owned by the turn controller;
//! nothing else starts or stops them. Concrete terminal implementations live
//! in [`crate::console`].

pub mod device;

#[cfg(test)]
pub mod mock;

pub use device::{CaptureSource, DeviceError, OutputSink};
