//! Domain model module declarations.

pub mod engine;
pub mod event;
pub mod scan;
pub mod session;
