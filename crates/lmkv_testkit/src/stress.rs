//! Stress helpers.
//!
//! Run many writes, or many concurrent readers sharing one environment, and
//! report throughput.

use lmkv_core::{Database, Environment, WriteFlags};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {name} ===");
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations to perform.
    pub operations: usize,
    /// Number of concurrent reader threads.
    pub threads: usize,
    /// Size of each value in bytes.
    pub value_size: usize,
    /// Writes per transaction.
    pub batch_size: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            value_size: 256,
            batch_size: 100,
        }
    }
}

/// Returns the key written by [`run_sequential_writes`] for `index`.
pub fn stress_key(index: usize) -> u64 {
    index as u64
}

/// Writes `config.operations` values to `db`, `config.batch_size` per
/// transaction.
pub fn run_sequential_writes(env: &Environment, db: &Database, config: &StressConfig) -> StressTestResult {
    let value = vec![0xAB_u8; config.value_size];
    let batch = config.batch_size.max(1);
    let mut successful = 0;
    let mut failed = 0;
    let start = Instant::now();

    for chunk_start in (0..config.operations).step_by(batch) {
        let chunk_end = (chunk_start + batch).min(config.operations);
        let result = env.write(|txn| {
            for i in chunk_start..chunk_end {
                db.put(txn, &stress_key(i), value.as_slice(), WriteFlags::empty())?;
            }
            Ok(())
        });
        match result {
            Ok(()) => successful += chunk_end - chunk_start,
            Err(_) => failed += chunk_end - chunk_start,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Reads back the keys written by [`run_sequential_writes`] from
/// `config.threads` threads at once, each in its own read transaction.
pub fn run_concurrent_reads(env: &Environment, db: &Database, config: &StressConfig) -> StressTestResult {
    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let threads = config.threads.max(1);
    let start = Instant::now();

    thread::scope(|scope| {
        for worker in 0..threads {
            let (successful, failed) = (&successful, &failed);
            scope.spawn(move || {
                let Ok(txn) = env.begin_ro_txn() else {
                    failed.fetch_add(1, Ordering::Relaxed);
                    return;
                };
                for i in (worker..config.operations).step_by(threads) {
                    match db.get::<u64, &[u8]>(&txn, &stress_key(i)) {
                        Ok(value) if value.len() == config.value_size => {
                            successful.fetch_add(1, Ordering::Relaxed);
                        }
                        _ => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            });
        }
    });

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}
