//! Dojo CLI library - command implementations shared by the `dojo` binary
//! and its integration tests.

pub mod commands;
