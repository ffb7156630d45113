// src/kernel/mod.rs
//! Kernel-side services of the bridge
//!
//! - [`fs`]: POSIX-style streams over firmware file handles
//! - [`vfs`]: the synthetic volume and its installer
//! - [`time`]: calendar record to epoch seconds
//! - [`klog`]: `log` backend writing into the console driver

pub mod fs;
pub mod klog;
pub mod time;
pub mod vfs;
