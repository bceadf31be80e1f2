//! Tests for postcrew-core: enums, transition tables, documents, errors

use chrono::{Duration, Utc};
use postcrew_core::*;

fn entry(category: Category) -> NewEntry {
    NewEntry {
        content_id: "gen-001".into(),
        category,
        cta_type: CtaType::Soft,
        caption: "caption long enough to pass".into(),
        hashtags: vec![],
        slide_dir: None,
    }
}

const ALLOWED: [(QueueStatus, QueueStatus); 5] = [
    (QueueStatus::Pending, QueueStatus::Ready),
    (QueueStatus::Ready, QueueStatus::Posted),
    (QueueStatus::Pending, QueueStatus::Failed),
    (QueueStatus::Ready, QueueStatus::Failed),
    (QueueStatus::Failed, QueueStatus::Pending),
];

// ===========================================================================
// Queue transitions
// ===========================================================================

#[test]
fn transition_table_matches_allowed_set() {
    for from in QueueStatus::ALL {
        for to in QueueStatus::ALL {
            assert_eq!(
                from.can_transition(to),
                ALLOWED.contains(&(from, to)),
                "{from} -> {to}"
            );
        }
    }
}

#[test]
fn transition_sequences_only_follow_allowed_edges() {
    // Walk a long deterministic pseudo-random sequence of requests and check
    // that each either follows an allowed edge or leaves the entry unchanged.
    let mut q = PostingQueue::default();
    let now = Utc::now();
    let id = q.append(entry(Category::Career), now);
    let mut seed: u64 = 0x5eed;
    for _ in 0..500 {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let to = QueueStatus::ALL[(seed >> 33) as usize % 4];
        let before = q.get(id).unwrap().clone();
        match q.transition(id, to, now) {
            Ok(()) => {
                assert!(ALLOWED.contains(&(before.status, to)));
                assert_eq!(q.get(id).unwrap().status, to);
            }
            Err(Error::InvalidTransition { from, to: rejected, .. }) => {
                assert_eq!(from, before.status);
                assert_eq!(rejected, to);
                assert!(!ALLOWED.contains(&(from, to)));
                assert_eq!(q.get(id).unwrap(), &before);
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
        let e = q.get(id).unwrap();
        assert_eq!(e.posted_at.is_some(), e.status == QueueStatus::Posted);
        if e.status == QueueStatus::Posted {
            break;
        }
    }
}

#[test]
fn posted_is_terminal() {
    assert!(QueueStatus::Posted.is_terminal());
    for to in QueueStatus::ALL {
        assert!(!QueueStatus::Posted.can_transition(to));
    }
}

// ===========================================================================
// Serde shapes
// ===========================================================================

#[test]
fn enums_serialize_lowercase() {
    assert_eq!(serde_json::to_string(&Category::Aruaru).unwrap(), r#""aruaru""#);
    assert_eq!(serde_json::to_string(&QueueStatus::Ready).unwrap(), r#""ready""#);
    assert_eq!(serde_json::to_string(&CtaType::Hard).unwrap(), r#""hard""#);
    assert_eq!(
        serde_json::to_string(&TaskKind::EmergencyGenerate).unwrap(),
        r#""emergency_generate""#
    );
}

#[test]
fn unknown_cta_type_deserializes_as_unrecognized() {
    let cta: CtaType = serde_json::from_str(r#""medium""#).unwrap();
    assert_eq!(cta, CtaType::Unrecognized);
    assert!(!cta.is_valid());
}

#[test]
fn queue_entry_omits_unset_optionals() {
    let mut q = PostingQueue::default();
    q.append(entry(Category::Trend), Utc::now());
    let json = serde_json::to_string(&q.entries[0]).unwrap();
    assert!(!json.contains("posted_at"));
    assert!(!json.contains("validation_errors"));
    assert!(json.contains("\"status\":\"pending\""));
}

#[test]
fn minimal_queue_document_parses() {
    let json = r#"{
        "updated": "2026-01-05T09:00:00Z",
        "entries": [{
            "id": 4, "content_id": "c4", "category": "salary", "cta_type": "soft",
            "caption": "hello there friends", "status": "pending"
        }]
    }"#;
    let mut q: PostingQueue = serde_json::from_str(json).unwrap();
    assert_eq!(q.entries[0].hashtags.len(), 0);
    assert!(!q.entries[0].verified);
    assert_eq!(q.append(entry(Category::Aruaru), Utc::now()), 5);
}

#[test]
fn task_type_field_is_named_type() {
    let t = AgentTask::new(
        AgentId::HealthMonitor,
        AgentId::ContentCreator,
        TaskKind::EmergencyGenerate,
        "queue low",
        Utc::now(),
    );
    let json = serde_json::to_string(&t).unwrap();
    assert!(json.contains(r#""type":"emergency_generate""#));
    assert!(json.contains(r#""status":"pending""#));
}

// ===========================================================================
// Parsing
// ===========================================================================

#[test]
fn ids_parse_from_cli_spelling() {
    assert_eq!("content-creator".parse::<AgentId>().unwrap(), AgentId::ContentCreator);
    assert_eq!("Health_Monitor".parse::<AgentId>().unwrap(), AgentId::HealthMonitor);
    assert!("janitor".parse::<AgentId>().is_err());
    assert_eq!(" Career ".parse::<Category>().unwrap(), Category::Career);
    assert_eq!("generate-batch".parse::<TaskKind>().unwrap(), TaskKind::GenerateBatch);
    assert_eq!("posted".parse::<QueueStatus>().unwrap(), QueueStatus::Posted);
}

// ===========================================================================
// Agent state machine
// ===========================================================================

#[test]
fn agent_cycle_has_no_terminal_state() {
    let mut doc = AgentStateDoc::default();
    let now = Utc::now();
    for _ in 0..3 {
        doc.mark_running(AgentId::Reviewer, now).unwrap();
        doc.mark_completed(AgentId::Reviewer, now).unwrap();
    }
    doc.mark_running(AgentId::Reviewer, now).unwrap();
    doc.mark_failed(AgentId::Reviewer, "gate crashed", now).unwrap();
    doc.heal(AgentId::Reviewer).unwrap();
    doc.mark_running(AgentId::Reviewer, now + Duration::hours(25)).unwrap();
    assert_eq!(doc.status(AgentId::Reviewer), AgentStatus::Running);
}

#[test]
fn completed_cannot_fail_without_running() {
    let mut doc = AgentStateDoc::default();
    let now = Utc::now();
    doc.mark_running(AgentId::Publisher, now).unwrap();
    doc.mark_completed(AgentId::Publisher, now).unwrap();
    assert!(doc.mark_failed(AgentId::Publisher, "late", now).is_err());
    assert_eq!(doc.status(AgentId::Publisher), AgentStatus::Completed);
}

// ===========================================================================
// Shared context & errors
// ===========================================================================

#[test]
fn shared_context_is_a_flat_map() {
    let mut ctx = SharedContext::default();
    ctx.set("queue.pending", 4);
    ctx.set("queue.pending", 2);
    assert_eq!(ctx.get("queue.pending"), Some("2"));
    assert_eq!(serde_json::to_string(&ctx).unwrap(), r#"{"queue.pending":"2"}"#);
}

#[test]
fn error_display_messages() {
    let err = Error::InvalidTransition {
        id: 3,
        from: QueueStatus::Posted,
        to: QueueStatus::Pending,
    };
    assert_eq!(err.to_string(), "invalid transition for entry 3: posted -> pending");

    let err = Error::ValidationFailure {
        id: 7,
        reasons: vec!["caption too short".into(), "2 slides".into()],
    };
    assert_eq!(
        err.to_string(),
        "validation failed for entry 7: caption too short; 2 slides"
    );

    let err = Error::document_unavailable("agents", "expected value at line 1");
    assert!(err.is_document_unavailable());
    assert!(!Error::generation("exit 1").is_document_unavailable());
}
