//! Worker pools for parallel operations.
//!
//! Every parallel node builds its own pool sized to its child count, so a
//! child never waits for a worker held by a sibling. Nested parallel nodes
//! get nested pools.

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{Error, Result};

/// Stack size of pool workers. Operation trees nest, so leave headroom.
const WORKER_STACK_SIZE: usize = 8 * 1024 * 1024;

/// Build a pool of exactly `threads` workers named `{prefix}-{index}`.
///
/// # Arguments
///
/// * `threads` - Number of workers; zero is bumped to one
/// * `prefix` - Thread name prefix, visible in debuggers and panic messages
pub fn build_pool(threads: usize, prefix: &str) -> Result<ThreadPool> {
    let prefix = prefix.to_string();
    ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .stack_size(WORKER_STACK_SIZE)
        .thread_name(move |index| format!("{prefix}-{index}"))
        .build()
        .map_err(|e| Error::ThreadPool(e.to_string()))
}
