//! Error codes reported to the host

use beauty_render::{EngineError, RenderError};
use thiserror::Error;

/// Result codes returned across the host boundary
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Ok = 0,
    NotInitialized = 101,
    AlreadyInitialized = 102,
    AlreadyReleased = 103,
    NotInCustomCaptureMode = 104,
    ProcessingDisabled = 105,
    InvalidSurfaceType = 106,
    FrameSkipped = 107,
    InvalidConfig = 108,
    RenderFailure = 109,
}

impl ErrorCode {
    pub fn value(self) -> i32 {
        self as i32
    }

    pub fn is_ok(self) -> bool {
        self == ErrorCode::Ok
    }
}

#[derive(Debug, Error)]
pub enum BeautyError {
    #[error("the beauty pipeline has been initialized already")]
    AlreadyInitialized,

    #[error("the beauty pipeline has not been initialized")]
    NotInitialized,

    #[error("the beauty pipeline has been released")]
    Released,

    #[error("preview surface must be a texture or surface view")]
    InvalidSurfaceType,

    #[error("external frames are only accepted in custom capture mode")]
    NotInCustomCaptureMode,

    #[error("beauty preset {0} is not supported")]
    UnsupportedPreset(u32),

    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    #[error("invalid value '{value}' for parameter '{key}'")]
    InvalidParameter { key: String, value: String },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl BeautyError {
    pub fn code(&self) -> ErrorCode {
        match self {
            BeautyError::AlreadyInitialized => ErrorCode::AlreadyInitialized,
            BeautyError::NotInitialized => ErrorCode::NotInitialized,
            BeautyError::Released | BeautyError::Render(RenderError::Released) => {
                ErrorCode::AlreadyReleased
            }
            BeautyError::InvalidSurfaceType => ErrorCode::InvalidSurfaceType,
            BeautyError::NotInCustomCaptureMode => ErrorCode::NotInCustomCaptureMode,
            BeautyError::UnsupportedPreset(_)
            | BeautyError::UnknownParameter(_)
            | BeautyError::InvalidParameter { .. }
            | BeautyError::Engine(_) => ErrorCode::InvalidConfig,
            BeautyError::Render(_) => ErrorCode::RenderFailure,
        }
    }
}

impl From<Result<(), BeautyError>> for ErrorCode {
    fn from(result: Result<(), BeautyError>) -> Self {
        match result {
            Ok(()) => ErrorCode::Ok,
            Err(e) => e.code(),
        }
    }
}
