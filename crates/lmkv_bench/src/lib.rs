//! Benchmark utilities.

use lmkv_core::{Database, DatabaseFlags, EnvConfig, EnvFlags, Environment, WriteFlags};
use rand::Rng;
use tempfile::TempDir;

/// Generate random data of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Big-endian key for index `i`, so byte order matches numeric order.
pub fn bench_key(i: u64) -> [u8; 8] {
    i.to_be_bytes()
}

/// An environment in a temporary directory with one open table.
pub struct BenchEnv {
    /// The open environment.
    pub env: Environment,
    /// The benchmark table.
    pub db: Database,
    _dir: TempDir,
}

impl BenchEnv {
    /// Creates an empty environment with a plain table named `bench`.
    pub fn new() -> Self {
        Self::with_flags(DatabaseFlags::empty())
    }

    /// Creates an empty environment whose `bench` table uses `flags`.
    pub fn with_flags(flags: DatabaseFlags) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        // Durability is not what these benchmarks measure.
        let config = EnvConfig::new()
            .path(dir.path())
            .flags(EnvFlags::NO_SYNC | EnvFlags::NO_META_SYNC);
        let env = Environment::open_with(config).expect("failed to open environment");
        let db = env
            .write(|txn| Database::open_with(txn, "bench", flags | DatabaseFlags::CREATE))
            .expect("failed to open table");
        Self { env, db, _dir: dir }
    }

    /// Creates an environment holding `count` records of `value_size` bytes.
    pub fn populated(count: u64, value_size: usize) -> Self {
        let bench = Self::new();
        let value = random_data(value_size);
        bench
            .env
            .write(|txn| {
                for i in 0..count {
                    bench.db.put(txn, &bench_key(i), &value, WriteFlags::APPEND)?;
                }
                Ok(())
            })
            .expect("failed to populate table");
        bench
    }
}

impl Default for BenchEnv {
    fn default() -> Self {
        Self::new()
    }
}
