//! Integration with the third-party wearable vendor: HTTP access, OAuth
//! token upkeep, the shared quota manager and short-lived response caches.

pub mod cache;
pub mod client;
pub mod error;
pub mod gateway;
pub mod payload;
pub mod rate_limiter;
pub mod token;

pub use cache::{DataCategory, MetricCaches, Records, TtlCache};
pub use client::{HttpWearableApi, VendorResponse, WearableApi};
pub use error::{TokenError, WearableError};
pub use gateway::WearableGateway;
pub use rate_limiter::{QuotaDecision, RateLimitHeaders, RateLimitStatus, RateLimiter};
pub use token::{AccessTokenProvider, RepositoryTokenProvider};
