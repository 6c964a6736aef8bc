//! Policies shared by the crawler and the completer
//!
//! - `RetryPolicy`: how page fetches and page parses are retried
//! - `SamplingPolicy`: which out-edges survive once a tree gets deep

mod retry;
mod sampling;

pub use retry::RetryPolicy;
pub use sampling::SamplingPolicy;
