//! Format plugins. Each submodule implements the `identify`/`open` pair the
//! [`crate::registry::Registry`] dispatches to, plus an [`crate::types::Image`]
//! implementation.

pub mod ccd;
pub mod qcow;
