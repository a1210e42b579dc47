//! formwizard - multi-step form wizard engine
//!
//! The `wizard` module holds the navigation and prerequisite engine. The
//! remaining modules wire it into a small HTTP server running a sample flow.

pub mod config;
pub mod logging;
pub mod sample;
pub mod server;
pub mod wizard;
