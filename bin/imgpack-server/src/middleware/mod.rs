//! HTTP middleware stack.

pub mod cors;
pub mod guard;
pub mod trace;
