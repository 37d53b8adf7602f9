//! Error taxonomy (spec §7). Every fallible internal operation returns
//! `Result<T, VelocityError>`; the `ffi` boundary collapses these into the
//! neutral return values the taxonomy prescribes and never lets one cross
//! the C boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VelocityError {
    #[error("entry point called before init() or after shutdown()")]
    NotInitialized,

    #[error("GL-requiring call arrived without a current context")]
    ContextMissing,

    #[error("resource exhausted: {0}")]
    ResourceExhausted(&'static str),

    #[error("device error surfaced through glGetError: 0x{0:04X}")]
    DeviceError(u32),

    #[error("corrupted data rejected: {0}")]
    Corruption(&'static str),

    #[error("fence wait timed out")]
    FenceTimeout,
}

pub type Result<T> = std::result::Result<T, VelocityError>;
