//! Shared environment configuration for embedders of the solver.
//!
//! Consolidates the `PGSOLVE_TRACE` and `PGSOLVE_WORKERS` reads (the latter
//! falling back to `RAYON_NUM_THREADS`) used when building
//! [`crate::driver::DriverOptions`] from the environment.

/// Read `PGSOLVE_TRACE`. Any value other than `0` enables tracing.
pub fn trace_enabled() -> bool {
    std::env::var("PGSOLVE_TRACE")
        .map(|v| v != "0")
        .unwrap_or(false)
}

/// Read `PGSOLVE_WORKERS` (fallback `RAYON_NUM_THREADS`). `None` means run
/// the solve loop on the calling thread.
pub fn worker_threads() -> Option<usize> {
    std::env::var("PGSOLVE_WORKERS")
        .or_else(|_| std::env::var("RAYON_NUM_THREADS"))
        .ok()
        .and_then(|s| s.parse().ok())
}

/// Build the global rayon pool with `n` threads, tolerating an
/// already-initialized pool. For embedders that share the pool with other
/// work; [`crate::driver::Driver::run`] builds its own scoped pool instead.
pub fn init_worker_pool_lenient(n: usize) -> usize {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n)
        .build_global()
        .ok(); // may fail if already initialized
    n
}
