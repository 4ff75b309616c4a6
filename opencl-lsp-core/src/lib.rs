//! Core library: JSON-RPC framing/dispatch and the OpenCL diagnostics engine.
//!
//! This crate has no process, no stdin/stdout, and no `main` — it is driven by a host
//! binary (see the `opencl-lsp` crate) that owns the byte pump, CLI flags, logger
//! initialization, and the LSP method handlers that bridge wire methods into
//! [`diagnostics::DiagnosticsEngine`] and [`endpoint::Endpoint`].

pub mod buildlog;
pub mod device;
pub mod diagnostics;
pub mod endpoint;
pub mod error;
pub mod header;
pub mod jsonrpc;

pub use device::{ClBackend, ClDevice, DeviceRecord, Opencl3Backend};
pub use diagnostics::{DiagnosticsEngine, SourceJob};
pub use endpoint::Endpoint;
pub use error::{Error, Result};
