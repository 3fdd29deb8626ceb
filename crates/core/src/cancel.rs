//! Cooperative cancellation
//!
//! I/O paths in the core accept a [`CancellationToken`] and check it before
//! each suspension point (segment reads, journal reads and commit attempts).
//! A cancelled operation returns `Error::Canceled` without mutating caller
//! state. Only the token's synchronous side is used; no runtime is needed.

use crate::error::{Error, Result};

pub use tokio_util::sync::CancellationToken;

/// Return `Error::Canceled` once `token` has been cancelled.
pub fn check(token: &CancellationToken) -> Result<()> {
    if token.is_cancelled() {
        Err(Error::Canceled)
    } else {
        Ok(())
    }
}
