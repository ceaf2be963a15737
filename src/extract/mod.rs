//! Article extraction.
//!
//! Extraction happens in two steps for each URL:
//!
//! 1. **Fetching**: download the page within a fixed deadline ([`fetch`])
//! 2. **Cleaning**: strip navigation, ads and scripts, keeping the title and
//!    readable text ([`readability`])
//!
//! [`pool::ExtractionPool`] runs both steps for a whole batch concurrently.
//! Failures never abort a batch; each URL's outcome is recorded as an
//! [`ExtractionStatus`](crate::models::ExtractionStatus).
//!
//! | Status | Cause |
//! |--------|-------|
//! | `invalid_url` | Unparsable or non-http(s) URL; no request is made |
//! | `transport_error` | Connection failure, deadline exceeded, cancellation |
//! | `http_error` | Response status of 400 or above |
//! | `parse_error` | Blank body or non-textual content type |
//! | `success` | Title and content extracted (content may be empty) |

pub mod fetch;
pub mod pool;
pub mod readability;

pub use pool::{ExtractionPool, PoolSettings};
