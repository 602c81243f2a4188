//! Region-scoped AWS configuration.

use std::time::Duration;

use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};

/// Attempts per API call, including the first.
pub const MAX_ATTEMPTS: u32 = 5;

/// Loads the default configuration (environment, profile, instance role)
/// pinned to `region`.
pub async fn load(region: &str) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .retry_config(
            RetryConfig::standard()
                .with_max_attempts(MAX_ATTEMPTS)
                .with_initial_backoff(Duration::from_millis(200)),
        )
        .load()
        .await
}
