use super::*;
use tempfile::TempDir;

#[test]
fn acquire_creates_and_drop_removes() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join(".build.lock");

    {
        let lock = BuildLock::acquire(&path).expect("should acquire lock");
        assert_eq!(lock.path(), path);
        assert!(BuildLock::is_held(&path));
        let contents = std::fs::read_to_string(&path).expect("lock readable");
        assert!(contents.starts_with(&format!("pid={}", std::process::id())));
    }

    assert!(!BuildLock::is_held(&path));
}

#[test]
fn second_acquire_is_busy() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join(".build.lock");

    let _held = BuildLock::acquire(&path).expect("should acquire lock");
    let second = BuildLock::acquire(&path);

    assert!(matches!(second, Err(LoreError::IndexBusy(_))));
    assert!(matches!(
        BuildLock::ensure_free(&path),
        Err(LoreError::IndexBusy(_))
    ));
}

#[test]
fn ensure_free_without_lock() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    assert!(BuildLock::ensure_free(&temp_dir.path().join(".build.lock")).is_ok());
}

#[test]
fn clear_stale_removes_leftover_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join(".build.lock");
    std::fs::write(&path, "pid=1").expect("write stale lock");

    assert!(BuildLock::clear_stale(&path).expect("clear"));
    assert!(!BuildLock::clear_stale(&path).expect("clear again"));
    assert!(BuildLock::acquire(&path).is_ok());
}

#[test]
fn acquire_creates_missing_parent() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("nested/base/.build.lock");

    let lock = BuildLock::acquire(&path).expect("should acquire lock");
    assert!(lock.path().exists());
}
