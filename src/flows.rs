//! Token acquisition flows.

pub mod client_credentials;
pub mod common;

pub use client_credentials::*;
pub use common::*;
