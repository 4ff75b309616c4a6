use thiserror::Error;

use crate::jsonrpc::{ErrorCode, RpcError};

/// Crate-wide error type.
///
/// Protocol-facing errors (header/body parse failures, the lifecycle gate, unknown
/// methods) never reach this type — they are translated straight into JSON-RPC error
/// responses inside [`crate::endpoint::Endpoint`]. This enum covers the Diagnostics
/// Engine and Device Inspector failure modes instead.
#[derive(Error, Debug)]
pub enum Error {
    /// `DiagnosticsEngine::get` was called with no device selected and selection
    /// found nothing to auto-select either.
    #[error("no OpenCL device selected")]
    NoDevice,
    /// Platform enumeration itself failed (ICD loader missing, driver error, ...).
    #[error("OpenCL platform query failed: {0}")]
    CompilerUnavailable(String),
    /// A device's vendor/name/driver-version query failed.
    #[error("could not query OpenCL device info: {0}")]
    InfoUnavailable(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<&Error> for RpcError {
    /// A diagnostics/device failure never has a dedicated JSON-RPC code of its own —
    /// callers that need to surface one to the client (rather than publishing an empty
    /// diagnostics array, the usual path) report it as `InternalError`.
    fn from(err: &Error) -> Self {
        RpcError::new(ErrorCode::InternalError, err.to_string())
    }
}
