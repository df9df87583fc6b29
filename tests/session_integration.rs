//! Session integration tests.
//!
//! End-to-end behavior of sessions over the bundled storage backends:
//! reload round-trips, lifecycle edge cases and parallel writers.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use serde_json::json;
use tempfile::TempDir;

use auth_session::session::{self, Session};
use auth_session::{
    FileStorage, MemoryStorage, SessionError, SessionState, Storage, Ttl, Value,
};

const PREFIX: &str = "satoken:";

fn memory() -> Arc<dyn Storage> {
    Arc::new(MemoryStorage::new())
}

// ============================================================================
// Round-trip Tests
// ============================================================================

#[test]
fn test_scenario_set_reload_destroy() {
    let storage = memory();

    let s = Session::new("u1", Arc::clone(&storage), PREFIX).unwrap();
    s.set("role", "admin").unwrap();
    s.set("age", 30).unwrap();

    let loaded = session::load("u1", Arc::clone(&storage), PREFIX).unwrap();
    assert_eq!(loaded.get_string("role"), "admin");
    assert_eq!(loaded.get_int("age"), 30);

    loaded.destroy().unwrap();
    let err = session::load("u1", storage, PREFIX).unwrap_err();
    assert!(matches!(err, SessionError::NotFound(_)));
}

#[test]
fn test_roundtrip_every_value_kind() {
    let storage = memory();
    let s = Session::new("u1", Arc::clone(&storage), PREFIX).unwrap();

    s.set("text", "hello").unwrap();
    s.set("int", -42).unwrap();
    s.set("big", i64::MAX).unwrap();
    s.set("float", 2.5).unwrap();
    s.set("whole_float", 3.0).unwrap();
    s.set("flag", true).unwrap();
    s.set("perms", json!(["user:read", "admin:*"])).unwrap();
    s.set("profile", json!({"email": "a@example.com", "tags": [1, 2]}))
        .unwrap();

    let loaded = session::load("u1", storage, PREFIX).unwrap();

    assert_eq!(loaded.get("text"), Some(Value::from("hello")));
    assert_eq!(loaded.get("int"), Some(Value::Int(-42)));
    assert_eq!(loaded.get_int64("big"), i64::MAX);
    assert_eq!(loaded.get("float"), Some(Value::Float(2.5)));
    assert!(loaded.get_bool("flag"));
    assert_eq!(loaded.get_json("perms"), json!(["user:read", "admin:*"]));
    assert_eq!(loaded.get_json("profile")["email"], "a@example.com");

    // Typed getters resolve across numeric widening.
    assert_eq!(loaded.get_int("whole_float"), 3);
    assert_eq!(loaded.get_float("int"), -42.0);
    assert_eq!(loaded.get_int("float"), 2);
}

#[test]
fn test_persisted_record_shape() {
    let storage = memory();
    let s = Session::new("u1", Arc::clone(&storage), "app:").unwrap();
    s.set("k", "v").unwrap();

    let stored = storage.get("app:session:u1").unwrap().unwrap();
    let json: serde_json::Value = serde_json::from_str(stored.as_text().unwrap()).unwrap();
    let fields: HashSet<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();

    assert_eq!(fields, HashSet::from(["id", "createTime", "data"]));
    assert_eq!(json["createTime"], s.create_time());
    assert_eq!(storage.ttl("app:session:u1").unwrap(), Ttl::Persistent);
}

#[test]
fn test_roundtrip_through_file_backend() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sessions.json");

    {
        let storage: Arc<dyn Storage> = Arc::new(FileStorage::open(&path).unwrap());
        let s = session::create("1000", storage, PREFIX).unwrap();
        s.set("username", "admin").unwrap();
        s.set("logins", 3).unwrap();
    }

    let storage: Arc<dyn Storage> = Arc::new(FileStorage::open(&path).unwrap());
    let loaded = session::load("1000", storage, PREFIX).unwrap();
    assert_eq!(loaded.get_string("username"), "admin");
    assert_eq!(loaded.get_int("logins"), 3);
}

// ============================================================================
// Boundary & Idempotence Tests
// ============================================================================

#[test]
fn test_boundaries() {
    let storage = memory();

    assert!(session::load("", Arc::clone(&storage), PREFIX)
        .unwrap_err()
        .is_validation());
    assert!(session::load("missing-id", Arc::clone(&storage), PREFIX)
        .unwrap_err()
        .is_not_found());

    let s = Session::new("u1", Arc::clone(&storage), PREFIX).unwrap();
    assert!(matches!(s.set("", 1), Err(SessionError::EmptyKey)));
    assert!(storage.keys("*").unwrap().is_empty());
}

#[test]
fn test_delete_absent_and_double_destroy() {
    let storage = memory();
    let s = session::create("u1", Arc::clone(&storage), PREFIX).unwrap();

    s.delete("nothing-here").unwrap();
    assert!(s.is_empty());

    s.destroy().unwrap();
    s.destroy().unwrap();
    assert_eq!(s.state(), SessionState::Destroyed);
    assert!(!session::exists("u1", storage.as_ref(), PREFIX).unwrap());
}

#[test]
fn test_corrupt_record_is_invalid_data() {
    let storage = memory();
    storage
        .set("satoken:session:u1", "{\"id\": 5}".into(), auth_session::NO_EXPIRATION)
        .unwrap();

    let err = session::load("u1", storage, PREFIX).unwrap_err();
    assert!(matches!(err, SessionError::InvalidData(_)));
}

// ============================================================================
// Concurrency Tests
// ============================================================================

#[test]
fn test_parallel_sets_are_all_persisted() {
    let storage = memory();
    let s = Arc::new(Session::new("u1", Arc::clone(&storage), PREFIX).unwrap());

    let handles: Vec<_> = (0..64)
        .map(|i| {
            let s = Arc::clone(&s);
            thread::spawn(move || s.set(&format!("key-{}", i), i).unwrap())
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let loaded = session::load("u1", storage, PREFIX).unwrap();
    assert_eq!(loaded.size(), 64);
    for i in 0..64 {
        assert_eq!(loaded.get_int(&format!("key-{}", i)), i);
    }
}

#[test]
fn test_parallel_readers_and_writer() {
    let s = Arc::new(Session::new("u1", memory(), PREFIX).unwrap());
    s.set("counter", 0).unwrap();

    let writer = {
        let s = Arc::clone(&s);
        thread::spawn(move || {
            for i in 1..=200 {
                s.set("counter", i).unwrap();
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let s = Arc::clone(&s);
            thread::spawn(move || {
                let mut last = 0;
                for _ in 0..200 {
                    let now = s.get_int("counter");
                    assert!(now >= last, "counter went backwards");
                    last = now;
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }
    assert_eq!(s.get_int("counter"), 200);
}

#[test]
fn test_two_instances_last_write_wins() {
    let storage = memory();
    let a = session::create("u1", Arc::clone(&storage), PREFIX).unwrap();
    let b = session::load("u1", Arc::clone(&storage), PREFIX).unwrap();

    a.set("from_a", 1).unwrap();
    b.set("from_b", 2).unwrap();

    // b never saw a's write, so its full-record save drops it.
    let loaded = session::load("u1", storage, PREFIX).unwrap();
    assert!(loaded.has("from_b"));
    assert!(!loaded.has("from_a"));
}
