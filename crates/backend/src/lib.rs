#![forbid(unsafe_code)]

pub mod client;
pub mod error;
pub mod http;
pub mod memory;

pub use client::{AttendanceBackend, CreatedSession, SessionRoster};
pub use error::{BackendConfigError, BackendError};
pub use http::{HttpBackend, HttpBackendConfig};
pub use memory::InMemoryBackend;
