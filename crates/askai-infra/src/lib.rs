//! Infrastructure for askai: the reqwest-backed answer endpoints and the
//! on-disk configuration loader.

pub mod config;
pub mod http;
