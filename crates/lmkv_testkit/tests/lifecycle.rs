//! Environment and transaction lifecycle across threads and reopen cycles.

use lmkv_core::{
    Database, DatabaseFlags, EnvFlags, Environment, OptionalExt, Status, Transaction, WriteFlags,
    DATA_FILE_NAME, LOCK_FILE_NAME,
};
use lmkv_testkit::prelude::*;
use std::sync::mpsc;
use std::thread;
use tempfile::TempDir;

#[test]
fn one_pending_writer_per_environment() {
    let test_env = TestEnv::new();
    let mut writer = test_env.begin_rw_txn().unwrap();

    thread::scope(|scope| {
        let handle = scope.spawn(|| {
            let mut other = Transaction::read_write(&test_env);
            other.begin()
        });
        let err = handle.join().unwrap().unwrap_err();
        assert_eq!(err, Status::ALREADY_ACTIVE);
        assert!(err.is_state_violation());
    });

    writer.commit().unwrap();
    let mut next = test_env.begin_rw_txn().unwrap();
    next.abort().unwrap();
}

#[test]
fn readers_run_beside_the_writer() {
    let test_env = TestEnv::new();
    let db = test_env
        .write(|txn| {
            let db = Database::open_with(txn, "t", DatabaseFlags::CREATE)?;
            db.put(txn, "k", "old", WriteFlags::empty())?;
            Ok(db)
        })
        .unwrap();

    let mut writer = test_env.begin_rw_txn().unwrap();
    db.put(&mut writer, "k", "new", WriteFlags::empty()).unwrap();

    let (tx, rx) = mpsc::channel();
    thread::scope(|scope| {
        scope.spawn(|| {
            let seen = test_env
                .read(|txn| db.get::<str, String>(txn, "k"))
                .unwrap();
            tx.send(seen).unwrap();
        });
    });
    assert_eq!(rx.recv().unwrap(), "old");

    writer.commit().unwrap();
    let seen = test_env
        .read(|txn| db.get::<str, String>(txn, "k"))
        .unwrap();
    assert_eq!(seen, "new");
}

#[test]
fn close_twice_is_harmless() {
    let dir = TempDir::new().unwrap();
    let mut env = Environment::open_with(test_config(dir.path())).unwrap();
    env.close();
    env.close();
    assert!(!env.is_open());
    assert!(dir.path().join(DATA_FILE_NAME).is_file());
    assert!(dir.path().join(LOCK_FILE_NAME).is_file());
}

#[test]
fn ephemeral_environment_deletes_once() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path()).flags(EnvFlags::EPHEMERAL);
    let mut env = Environment::open_with(config).unwrap();
    env.write(|txn| {
        let db = Database::open_with(txn, "t", DatabaseFlags::CREATE)?;
        db.put(txn, "k", "v", WriteFlags::empty())
    })
    .unwrap();

    env.close();
    assert!(!env.exists());
    env.close();
    assert!(!env.exists());
}

#[test]
fn ephemeral_environment_cleans_up_on_drop() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path()).flags(EnvFlags::EPHEMERAL);
    {
        let env = Environment::open_with(config).unwrap();
        assert!(env.exists());
    }
    assert!(!dir.path().join(DATA_FILE_NAME).exists());
    assert!(!dir.path().join(LOCK_FILE_NAME).exists());
}

#[test]
fn operations_after_close_are_rejected() {
    let mut test_env = TestEnv::new();
    test_env.close();

    let mut txn = Transaction::read_only(&test_env);
    assert_eq!(txn.begin(), Err(Status::INVALID_STATE));
    assert_eq!(test_env.flush(true), Err(Status::NOT_OPEN));
    assert_eq!(test_env.begin_rw_txn().unwrap_err(), Status::INVALID_STATE);
}

#[test]
fn table_limit_is_enforced() {
    let test_env = TestEnv::with_config(|config| config.max_tables(2));
    let mut txn = test_env.begin_rw_txn().unwrap();
    Database::open_with(&mut txn, "one", DatabaseFlags::CREATE).unwrap();
    Database::open_with(&mut txn, "two", DatabaseFlags::CREATE).unwrap();
    let err = Database::open_with(&mut txn, "three", DatabaseFlags::CREATE).unwrap_err();
    assert_eq!(err, Status::DBS_FULL);
}

#[test]
fn map_full_then_grow() {
    let mut test_env = TestEnv::with_config(|config| config.map_size(256 * 1024));
    let db = test_env
        .write(|txn| Database::open_with(txn, "t", DatabaseFlags::CREATE))
        .unwrap();

    let value = vec![7u8; 4096];
    let fill = |env: &Environment| {
        env.write(|txn| {
            for i in 0u32..256 {
                db.put(txn, &i, value.as_slice(), WriteFlags::empty())?;
            }
            Ok(())
        })
    };

    assert_eq!(fill(&test_env.env), Err(Status::MAP_FULL));
    test_env.grow_map_size(8 * 1024 * 1024).unwrap();
    fill(&test_env.env).unwrap();

    let stored = test_env
        .read(|txn| db.get::<u32, Vec<u8>>(txn, &255).optional())
        .unwrap();
    assert_eq!(stored, Some(value));
}

#[test]
fn open_missing_directory_then_retry() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("nested");
    let mut env = Environment::with_config(test_config(&target)).unwrap();

    let err = env.open().unwrap_err();
    assert_eq!(env.last_status(), err);
    assert!(!env.exists());

    std::fs::create_dir(&target).unwrap();
    env.open().unwrap();
    assert!(env.exists());
    assert!(env.last_status().is_ok());
}

#[test]
fn backup_copy_is_openable() {
    let test_env = TestEnv::new();
    test_env
        .write(|txn| {
            let db = Database::open_with(txn, "t", DatabaseFlags::CREATE)?;
            db.put(txn, "k", "v", WriteFlags::empty())
        })
        .unwrap();

    let backup = TempDir::new().unwrap();
    test_env.copy_to(backup.path(), false).unwrap();

    let copy = Environment::open_with(test_config(backup.path())).unwrap();
    let value = copy
        .write(|txn| {
            let db = Database::open_with(txn, "t", DatabaseFlags::empty())?;
            db.get::<str, String>(txn, "k")
        })
        .unwrap();
    assert_eq!(value, "v");
}
