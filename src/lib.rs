//! Authentication core for the sparring booking service.
//!
//! [`auth`] holds the credential lifecycle (signing secrets, token issuance
//! and verification, background rotation) and the sliding-window request
//! limiter. [`sparring`] exposes them over HTTP and [`cli`] wires everything
//! together from command line arguments and environment variables.

pub mod auth;
pub mod cli;
pub mod sparring;
