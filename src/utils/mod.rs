//! Small helpers shared across the gateway's request path.
//!
//! - [`path`] - mount-stripping and upstream URL construction for the proxy.

pub mod path;
