//! TTL expiry and get-and-modify schedule tests.
//!
//! These use real clocks with short TTLs, so each test sleeps a few seconds.

mod common;

use std::thread;
use std::time::Duration;

use fscache::{CacheKey, Modify, TtlPolicy};
use tempfile::TempDir;

use common::{key, make_cache, ORIGINAL_DATA};

fn append_test(value: String) -> Modify<String> {
    Modify::Set(value + "test")
}

#[test]
fn test_entry_expires_and_file_is_removed() {
    let temp_dir = TempDir::new().unwrap();
    let cache = make_cache(&temp_dir);
    let ttl_key = key("key1", "group1");

    cache.store(&ttl_key, &ORIGINAL_DATA, Some(1)).unwrap();
    assert_eq!(
        cache.retrieve::<String>(&ttl_key).unwrap().as_deref(),
        Some(ORIGINAL_DATA)
    );

    thread::sleep(Duration::from_millis(2100));

    assert!(cache.contains(&ttl_key), "Expired file lingers until read");
    assert!(cache.retrieve::<String>(&ttl_key).unwrap().is_none());
    assert!(!cache.contains(&ttl_key), "Expired file should be deleted on read");
}

#[test]
fn test_entry_without_ttl_survives() {
    let temp_dir = TempDir::new().unwrap();
    let cache = make_cache(&temp_dir);
    let forever = CacheKey::new("forever");

    cache.store(&forever, &ORIGINAL_DATA, None).unwrap();
    thread::sleep(Duration::from_millis(1100));
    assert!(cache.retrieve::<String>(&forever).unwrap().is_some());
}

#[test]
fn test_modify_preserves_original_ttl() {
    let temp_dir = TempDir::new().unwrap();
    let cache = make_cache(&temp_dir);
    let modify_key = key("key2", "group1");

    cache.store(&modify_key, &ORIGINAL_DATA, Some(2)).unwrap();
    let modified = cache
        .get_and_modify(&modify_key, TtlPolicy::Preserve, append_test)
        .unwrap();
    assert_eq!(modified.as_deref(), Some("this is my datatest"));

    let result: Option<String> = cache.retrieve(&modify_key).unwrap();
    assert_eq!(result.as_deref(), Some("this is my datatest"));

    // Past the original expiry: modify must not have extended it
    thread::sleep(Duration::from_millis(3100));
    assert!(cache.retrieve::<String>(&modify_key).unwrap().is_none());
}

#[test]
fn test_modify_with_reset_extends_ttl() {
    let temp_dir = TempDir::new().unwrap();
    let cache = make_cache(&temp_dir);
    let reset_key = key("key1", "group2");

    cache.store(&reset_key, &ORIGINAL_DATA, Some(3)).unwrap();
    thread::sleep(Duration::from_millis(2000));

    // Original entry expires in about a second; restart the clock
    let modified = cache
        .get_and_modify(&reset_key, TtlPolicy::Reset, append_test)
        .unwrap();
    assert!(modified.is_some());

    // Original expiry has passed, the reset one has not
    thread::sleep(Duration::from_millis(2000));
    let result: Option<String> = cache.retrieve(&reset_key).unwrap();
    assert_eq!(result.as_deref(), Some("this is my datatest"));

    // Now the reset window has elapsed as well
    thread::sleep(Duration::from_millis(2100));
    assert!(cache.retrieve::<String>(&reset_key).unwrap().is_none());
}

#[test]
fn test_modify_expired_entry_is_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let cache = make_cache(&temp_dir);
    let stale = CacheKey::new("stale");

    cache.store(&stale, &ORIGINAL_DATA, Some(1)).unwrap();
    thread::sleep(Duration::from_millis(2100));

    let result = cache
        .get_and_modify(&stale, TtlPolicy::Reset, |v: String| -> Modify<String> {
            panic!("transform called on expired value {v}")
        })
        .unwrap();
    assert!(result.is_none());
    assert!(!cache.contains(&stale));
}
