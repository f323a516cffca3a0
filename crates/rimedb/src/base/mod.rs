//! Builtin extensions.
//!
//! Each one is an ordinary `ExtensionDescriptor` built from the public
//! extension API; nothing here reaches into the pipeline internals.

pub mod soft_delete;
