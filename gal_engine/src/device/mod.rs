//! Device, backend trait and the headless null backend

mod device;
pub mod backend;
pub mod null_backend;
pub mod tables;
mod state_cache;
mod timestamp;

pub use device::{Device, DeviceStats, ViewParent};
pub use backend::{Backend, BackendObject, ViewTarget};
pub use null_backend::{NullBackend, NullBuffer, NullObject, NullQuery, NullSubmission, NullTexture};
pub use tables::*;
pub use timestamp::TimestampResult;
