// src/kernel/vfs/mod.rs
//! Synthetic volume
//!
//! [`provider`] implements the firmware file protocol for a fabricated,
//! read-only, one-level namespace; [`install`] registers it in the handle
//! database and binds the shell alias `vfs:`.

pub mod install;
pub mod provider;

pub use install::{install_vfs_protocol, InstallReport};
pub use provider::{NodeRole, ProviderNode, SyntheticVolume};
