//! AWS SDK implementation of [`failover_core::RdsApi`].
//!
//! One [`AwsRds`] is built per region. Both share the default credential
//! chain; the SDK's standard retry strategy handles throttling.

pub mod config;
pub mod rds;

pub use config::load;
pub use rds::AwsRds;
