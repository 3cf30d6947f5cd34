#![allow(missing_docs)]

use std::{
    fs,
    io::Read,
    path::{Path, PathBuf},
};

use multigear_partial::{Entity, SpoolPolicy};
use uuid::Uuid;

#[test]
fn small_bodies_stay_in_memory() {
    let root = temp_root();
    let policy = policy_in(&root, Some(16));
    let mut entity = Entity::new();
    entity.append(b"hello ", &policy).expect("append");
    entity.append(b"world", &policy).expect("append");
    entity.seal().expect("seal");

    assert!(!entity.is_spooled());
    assert_eq!(entity.len(), 11);
    assert_eq!(entity.path(), None);
    assert_eq!(read_all(&entity), b"hello world");
    cleanup(&root);
}

#[test]
fn crossing_threshold_spools_once_with_configured_name() {
    let root = temp_root();
    let policy = policy_in(&root, Some(8));
    let mut entity = Entity::new();
    entity.append(b"12345678", &policy).expect("append");
    assert!(!entity.is_spooled(), "threshold itself stays in memory");

    entity.append(b"9", &policy).expect("append");
    assert!(entity.is_spooled());
    entity.append(b"abc", &policy).expect("append");
    entity.seal().expect("seal");

    let path = entity.path().expect("spooled path").to_path_buf();
    assert!(path.starts_with(&root));
    let name = path
        .file_name()
        .and_then(|value| value.to_str())
        .expect("valid file name");
    assert!(name.starts_with("TEST"));
    assert!(name.ends_with(".part"));
    assert_eq!(fs::read(&path).expect("read spool"), b"123456789abc");

    assert_eq!(read_all(&entity), b"123456789abc");
    assert_eq!(read_all(&entity), b"123456789abc", "reads are repeatable");

    entity.release().expect("release");
    assert!(!path.exists());
    assert!(entity.is_released());
    cleanup(&root);
}

#[test]
fn move_to_renames_spooled_body() {
    let root = temp_root();
    let policy = policy_in(&root, Some(0));
    let mut entity = Entity::new();
    entity.append(b"spooled", &policy).expect("append");
    entity.seal().expect("seal");
    let spool_path = entity.path().expect("spooled").to_path_buf();

    let destination = root.join("kept.bin");
    entity.move_to(&destination).expect("move");
    assert!(!spool_path.exists());
    assert_eq!(entity.path(), Some(destination.as_path()));
    assert_eq!(read_all(&entity), b"spooled");

    entity.release().expect("release");
    assert_eq!(
        fs::read(&destination).expect("moved file survives release"),
        b"spooled"
    );
    cleanup(&root);
}

#[test]
fn move_to_writes_out_memory_body() {
    let root = temp_root();
    let mut entity = Entity::from_bytes("in memory");
    let destination = root.join("memory.bin");
    entity.move_to(&destination).expect("move");

    assert_eq!(fs::read(&destination).expect("read"), b"in memory");
    assert_eq!(read_all(&entity), b"in memory");
    cleanup(&root);
}

#[test]
fn memory_only_policy_never_spools() {
    let policy = SpoolPolicy::memory_only();
    let mut entity = Entity::new();
    entity
        .append(&vec![b'x'; 64 * 1024], &policy)
        .expect("append");
    assert!(!entity.is_spooled());
    assert_eq!(entity.len(), 64 * 1024);
}

#[test]
fn released_entity_rejects_reads_and_writes() {
    let policy = SpoolPolicy::memory_only();
    let mut entity = Entity::from_bytes("gone");
    entity.release().expect("release");

    assert!(entity.read().is_err());
    assert!(entity.append(b"more", &policy).is_err());
    entity.release().expect("second release is a no-op");
}

#[test]
fn unwritable_spool_directory_fails_append() {
    let root = temp_root();
    let missing = root.join("does-not-exist");
    let policy = policy_in(&missing, Some(1));
    let mut entity = Entity::new();

    let err = entity.append(b"too big", &policy).expect_err("must fail");
    assert!(err.to_string().contains("failed to create spool file"));
    assert!(!entity.is_spooled());
    cleanup(&root);
}

#[test]
fn probe_checks_directory() {
    let root = temp_root();
    policy_in(&root, Some(1)).probe().expect("probe should succeed");
    assert_eq!(fs::read_dir(&root).expect("list").count(), 0);

    assert!(policy_in(&root.join("missing"), Some(1)).probe().is_err());
    cleanup(&root);
}

fn policy_in(dir: &Path, threshold: Option<u64>) -> SpoolPolicy {
    SpoolPolicy {
        threshold,
        dir: dir.to_path_buf(),
        prefix: "TEST".to_owned(),
        suffix: ".part".to_owned(),
    }
}

fn read_all(entity: &Entity) -> Vec<u8> {
    let mut out = Vec::new();
    entity
        .read()
        .expect("reader")
        .read_to_end(&mut out)
        .expect("read");
    out
}

fn temp_root() -> PathBuf {
    let root = std::env::temp_dir().join(format!("multigear-partial-{}", Uuid::new_v4()));
    fs::create_dir_all(&root).expect("create temp root");
    root
}

fn cleanup(root: &Path) {
    let _ = fs::remove_dir_all(root);
}
