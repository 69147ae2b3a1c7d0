/*
[INPUT]:  Public API exports for the sandbox crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod config;
pub mod demo;

pub use config::{DemoConfig, DemoKind, SandboxConfig};
pub use demo::{DemoReport, DemoRunner};
