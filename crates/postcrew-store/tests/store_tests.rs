//! Integration tests for postcrew-store: atomic saves, recovery, locked updates

use chrono::{Duration, Utc};
use postcrew_core::*;
use postcrew_store::DocumentStore;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn store() -> (TempDir, DocumentStore) {
    let tmp = TempDir::new().unwrap();
    let store = DocumentStore::open(tmp.path().join("data")).unwrap();
    (tmp, store)
}

fn new_entry() -> NewEntry {
    NewEntry {
        content_id: "run-1".into(),
        category: Category::Salary,
        cta_type: CtaType::Hard,
        caption: "salary talk for night shift nurses".into(),
        hashtags: vec!["#nurse".into()],
        slide_dir: Some("slides/run-1".into()),
    }
}

// ============================================================
// load / save
// ============================================================

#[test]
fn missing_documents_load_as_empty() {
    let (_tmp, store) = store();
    let q: PostingQueue = store.load().unwrap();
    assert!(q.entries.is_empty());
    let a: AgentStateDoc = store.load().unwrap();
    assert!(a.agents.is_empty());
    let c: SharedContext = store.load().unwrap();
    assert!(c.0.is_empty());
}

#[test]
fn save_then_load_roundtrip() {
    let (_tmp, store) = store();
    let mut q = PostingQueue::default();
    q.append(new_entry(), Utc::now());
    store.save(&mut q).unwrap();

    let back: PostingQueue = store.load().unwrap();
    assert_eq!(back.entries.len(), 1);
    assert!(back.updated.is_some());
    assert_eq!(store.path_of::<PostingQueue>().file_name().unwrap(), "queue.json");
}

#[test]
fn save_leaves_no_temp_files_behind() {
    let (_tmp, store) = store();
    let mut ctx = SharedContext::default();
    ctx.set("queue.pending", 3);
    store.save(&mut ctx).unwrap();
    store.save(&mut ctx).unwrap();

    let names: Vec<String> = fs::read_dir(store.dir())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["context.json".to_string()]);
}

#[test]
fn leftover_temp_files_are_purged_by_age() {
    let (_tmp, store) = store();
    let mut ctx = SharedContext::default();
    store.save(&mut ctx).unwrap();
    fs::write(store.dir().join(".tmpA1b2C3"), b"{ half writ").unwrap();

    // written just now, so an hour-old cutoff keeps it
    let kept = store.purge_temp_files_before(Utc::now() - Duration::hours(1)).unwrap();
    assert_eq!(kept, 0);
    assert!(store.dir().join(".tmpA1b2C3").exists());

    let removed = store.purge_temp_files_before(Utc::now() + Duration::minutes(1)).unwrap();
    assert_eq!(removed, 1);
    assert!(!store.dir().join(".tmpA1b2C3").exists());
    assert!(store.path_of::<SharedContext>().exists());
}

#[test]
fn truncated_document_is_unavailable() {
    let (_tmp, store) = store();
    fs::write(store.path_of::<AgentStateDoc>(), r#"{"agents": {"content_crea"#).unwrap();
    let err = store.load::<AgentStateDoc>().unwrap_err();
    assert!(err.is_document_unavailable(), "got {err}");
}

#[test]
fn load_or_default_does_not_touch_disk() {
    let (_tmp, store) = store();
    let path = store.path_of::<PostingQueue>();
    fs::write(&path, "not json").unwrap();
    let q: PostingQueue = store.load_or_default();
    assert!(q.entries.is_empty());
    assert_eq!(fs::read_to_string(&path).unwrap(), "not json");
}

// ============================================================
// update / update_or_recover
// ============================================================

#[test]
fn update_returns_closure_value_and_persists() {
    let (_tmp, store) = store();
    let id = store
        .update(|q: &mut PostingQueue| Ok(q.append(new_entry(), Utc::now())))
        .unwrap();
    assert_eq!(id, 1);
    let q: PostingQueue = store.load().unwrap();
    assert_eq!(q.get(1).unwrap().status, QueueStatus::Pending);
}

#[test]
fn failed_update_writes_nothing() {
    let (_tmp, store) = store();
    store
        .update(|q: &mut PostingQueue| Ok(q.append(new_entry(), Utc::now())))
        .unwrap();
    let before = fs::read_to_string(store.path_of::<PostingQueue>()).unwrap();

    let err = store
        .update(|q: &mut PostingQueue| q.transition(1, QueueStatus::Posted, Utc::now()))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));
    assert_eq!(fs::read_to_string(store.path_of::<PostingQueue>()).unwrap(), before);
}

#[test]
fn strict_update_refuses_corrupt_document() {
    let (_tmp, store) = store();
    fs::write(store.path_of::<AgentStateDoc>(), "{{{").unwrap();
    let err = store
        .update(|a: &mut AgentStateDoc| a.mark_running(AgentId::Reviewer, Utc::now()))
        .unwrap_err();
    assert!(err.is_document_unavailable());
    assert_eq!(fs::read_to_string(store.path_of::<AgentStateDoc>()).unwrap(), "{{{");
}

#[test]
fn recovering_update_quarantines_corrupt_document() {
    let (_tmp, store) = store();
    fs::write(store.path_of::<PostingQueue>(), "[garbage").unwrap();

    let id = store
        .update_or_recover(|q: &mut PostingQueue| Ok(q.append(new_entry(), Utc::now())))
        .unwrap();
    assert_eq!(id, 1);

    let quarantined: Vec<String> = fs::read_dir(store.dir())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with("queue.corrupt-"))
        .collect();
    assert_eq!(quarantined.len(), 1);
    let kept = fs::read_to_string(store.dir().join(&quarantined[0])).unwrap();
    assert_eq!(kept, "[garbage");
}

// ============================================================
// Concurrency
// ============================================================

fn bump(ctx: &mut SharedContext) {
    let n: u64 = ctx.get("counter").and_then(|v| v.parse().ok()).unwrap_or(0);
    ctx.set("counter", n + 1);
}

#[test]
fn raw_load_save_is_last_write_wins() {
    let (_tmp, store) = store();
    let mut a: SharedContext = store.load().unwrap();
    let mut b: SharedContext = store.load().unwrap();
    bump(&mut a);
    a.set("writer.a", "yes");
    bump(&mut b);
    store.save(&mut a).unwrap();
    store.save(&mut b).unwrap();

    let after: SharedContext = store.load().unwrap();
    assert_eq!(after.get("counter"), Some("1"));
    assert_eq!(after.get("writer.a"), None, "first writer's update is lost");
}

#[test]
fn locked_updates_lose_nothing() {
    let (_tmp, store) = store();
    let store = Arc::new(store);
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for _ in 0..25 {
                    store
                        .update(|ctx: &mut SharedContext| {
                            bump(ctx);
                            Ok(())
                        })
                        .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let ctx: SharedContext = store.load().unwrap();
    assert_eq!(ctx.get("counter"), Some("200"));
}
