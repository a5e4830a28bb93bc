//! # Connect Client
//!
//! [`AgentStatusApi`](awsext_core::AgentStatusApi) over the Amazon Connect
//! REST API, signed with AWS Signature Version 4. Role assumption for
//! `role_arn` configurations goes through STS.

mod client;
pub mod sigv4;
pub mod sts;

pub use client::{connect_endpoint, ConnectClient};
