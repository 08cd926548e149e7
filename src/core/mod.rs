//! Core application primitives (HTTP surface and its hardening, wiring, scheduling)

pub mod http;
pub mod redis;
pub mod runtime;
pub mod scheduler;
pub mod security;
pub mod validation;

pub use http::*;
pub use runtime::*;
pub use scheduler::*;
