//! Filesystem helpers for the managed installation tree.

pub mod metadata;
pub mod walker;
