//! Lead capture client — contact form submissions and privacy requests.
//!
//! The endpoints themselves live elsewhere; this crate validates what the
//! site's forms collect and posts it as JSON, reporting the `success` flag
//! each endpoint answers with.

pub mod client;
pub mod types;

pub use client::LeadClient;
pub use types::*;
