// src/errors/mod.rs

//! Unified error handling module
//!
//! The POSIX layer reports failures as [`FsError`] (an [`Errno`] plus an
//! optional static context string), the timestamp bridge as [`TimeError`]
//! and the protocol installer as [`InstallError`]. Provider-side failures are
//! plain `r_efi::efi::Status` codes, because the substrate itself is the caller.

pub mod unified;

pub use unified::{ErrorContext, Errno, FsError, FsResult, InstallError, TimeError};
