//! Pure string transforms shared by the sync pipeline.

pub mod code;
pub mod handle;
