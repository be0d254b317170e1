//! Error Types
//!
//! This module defines the error types used throughout the denoiser compiler.
//!
//! # Overview
//!
//! The main error type [`DenoiseError`] covers every failure mode of the
//! creation-time compiler and the per-frame dispatch assembler:
//! - Invalid creation requests (resolution, duplicate identifiers)
//! - Unsupported method values arriving from a raw (FFI-style) edge
//! - Per-frame contract violations (missing external textures, constant
//!   layout mismatches)
//!
//! Hosts that speak a flat status-code protocol can collapse any error to a
//! [`ResultCode`] with [`DenoiseError::code`].
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, DenoiseError>`.
//!
//! ```rust,ignore
//! use myth_denoise::errors::{DenoiseError, Result};
//!
//! fn create() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::core::{Identifier, ResourceType};

/// Flat status codes mirrored at the host boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResultCode {
    Success = 0,
    Failure = 1,
    InvalidArgument = 2,
    Unsupported = 3,
    NonUniqueIdentifier = 4,
}

/// The main error type of the denoiser compiler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DenoiseError {
    // ========================================================================
    // Creation-time Errors
    // ========================================================================
    /// A creation or settings request carried an out-of-range value.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A raw method value does not name a method compiled into this library.
    #[error("Unsupported method: {0}")]
    Unsupported(u32),

    /// Two methods in one creation request share an identifier.
    #[error("Identifier {0:?} is used by more than one method")]
    NonUniqueIdentifier(Identifier),

    /// Catch-all internal failure (inconsistent compiled layout, exhausted
    /// staging space).
    #[error("Denoiser failure: {0}")]
    Failure(String),

    // ========================================================================
    // Per-frame Errors
    // ========================================================================
    /// A pass packed a different number of constant bytes than it declared.
    #[error("Constant data size mismatch in '{pass}': declared {expected} bytes, packed {actual}")]
    ConstantSizeMismatch {
        /// Name of the offending pass
        pass: &'static str,
        /// Size declared when the pass was compiled
        expected: u32,
        /// Size actually produced by the packer
        actual: u32,
    },

    /// A pass references an external role that the host did not supply.
    #[error("Missing external resource {resource:?} required by {identifier:?}")]
    MissingResource {
        /// Method instance that needs the resource
        identifier: Identifier,
        /// The unbound role
        resource: ResourceType,
    },
}

impl DenoiseError {
    /// Collapses the error into the status code reported at the host boundary.
    #[must_use]
    pub fn code(&self) -> ResultCode {
        match self {
            Self::InvalidArgument(_) => ResultCode::InvalidArgument,
            Self::Unsupported(_) => ResultCode::Unsupported,
            Self::NonUniqueIdentifier(_) => ResultCode::NonUniqueIdentifier,
            Self::Failure(_) | Self::ConstantSizeMismatch { .. } | Self::MissingResource { .. } => {
                ResultCode::Failure
            }
        }
    }
}

/// Alias for `Result<T, DenoiseError>`.
pub type Result<T> = std::result::Result<T, DenoiseError>;
