//! Fixed generation policy.
//!
//! Named constants, not configuration: no command or config key changes
//! these.

use std::time::Duration;

/// Minimum number of input images a submission must carry.
pub const MIN_IMAGES: usize = 9;

/// Delay between consecutive status polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Delay before the next poll after a failed one.
pub const FAILURE_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Consecutive poll failures tolerated before switching to local generation.
pub const MAX_POLL_FAILURES: u32 = 3;
