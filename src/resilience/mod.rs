//! 重试策略模块：为会话续期与分段合成提供有界的线性退避。
//!
//! # Retry Policy
//!
//! Upstream calls in this crate are protected by bounded retry counts rather
//! than deadlines. Both the discovery handshake and segment synthesis use the
//! same linear backoff shape:
//!
//! ```text
//! delay(attempt) = min(max_delay, step * (attempt + 1))
//! ```
//!
//! with `attempt` counted from zero.
//!
//! ```rust
//! use speech_relay::resilience::RetryConfig;
//! use std::time::Duration;
//!
//! let policy = RetryConfig::linear(5, Duration::from_millis(500))
//!     .with_max_delay(Duration::from_millis(4000));
//! assert_eq!(policy.delay_for(0), Duration::from_millis(500));
//! assert_eq!(policy.delay_for(9), Duration::from_millis(4000));
//! ```

mod retry;

pub use retry::RetryConfig;
