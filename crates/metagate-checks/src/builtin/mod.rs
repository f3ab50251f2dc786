//! Built-in checks.
//!
//! Each submodule exposes a `register` function adding its checks to a
//! `CheckRegistry`. `register_all` registers every family.

#![cfg(feature = "builtin")]

pub mod attributes;
pub mod identity;
pub mod references;
pub mod security;
pub mod translations;
pub mod uniqueness;

use anyhow::Result;

use crate::registry::CheckRegistry;

/// Register every built-in check.
pub fn register_all(registry: &mut CheckRegistry) -> Result<()> {
    identity::register(registry)?;
    security::register(registry)?;
    uniqueness::register(registry)?;
    attributes::register(registry)?;
    translations::register(registry)?;
    references::register(registry)?;
    Ok(())
}
