//! # Property-Based Tests
//!
//! Identity, timeline, correlation and sanitization invariants checked with
//! proptest.

use proptest::collection::vec;
use proptest::prelude::*;
use tessera_core::export::{sanitize_analysis, sanitize_distribution, sanitize_threat_level};
use tessera_core::{CorrelationIndex, CorrelationType, GlobalId, MemoryStore, RedbStore, Timeline};

// =============================================================================
// STRATEGIES
// =============================================================================

fn obj_type() -> impl Strategy<Value = String> {
    "[a-z][a-z-]{0,15}"
}

fn subtype() -> impl Strategy<Value = String> {
    prop_oneof![Just(String::new()), "[a-z0-9_-]{1,12}"]
}

/// Ids may contain the separator.
fn id() -> impl Strategy<Value = String> {
    "[A-Za-z0-9:/._-]{1,40}"
}

fn gid() -> impl Strategy<Value = GlobalId> {
    (obj_type(), subtype(), id())
        .prop_map(|(t, s, i)| GlobalId::new(t, s, i).expect("valid components"))
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// canonical(parse(canonical(t, s, i))) == canonical(t, s, i)
    #[test]
    fn identity_round_trip(t in obj_type(), s in subtype(), i in id()) {
        let original = GlobalId::new(t.clone(), s.clone(), i.clone()).expect("valid");
        let canonical = original.to_string();
        let parsed = GlobalId::parse(&canonical).expect("parse");

        prop_assert_eq!(parsed.to_string(), canonical);
        prop_assert_eq!(parsed.obj_type(), t.as_str());
        prop_assert_eq!(parsed.subtype(), s.as_str());
        prop_assert_eq!(parsed.id(), i.as_str());
    }

    /// The last value is the one paired with the maximum timestamp.
    #[test]
    fn timeline_last_value_is_max_timestamp(
        timestamps in vec(-1_000_000i64..1_000_000, 1..40)
    ) {
        let store = MemoryStore::new();
        let owner = GlobalId::new("user-account", "telegram", "1").expect("gid");
        let timeline = Timeline::new(&store, &owner, "username");

        for (n, ts) in timestamps.iter().enumerate() {
            timeline.add_timestamp(*ts, &format!("v{n}")).expect("append");
        }

        let max = timestamps.iter().copied().max().expect("non-empty");
        // Latest insertion wins among equal maxima.
        let expected = timestamps
            .iter()
            .rposition(|ts| *ts == max)
            .map(|n| format!("v{n}"));

        prop_assert_eq!(timeline.get_last_value().expect("last"), expected);
        prop_assert_eq!(timeline.get_all_values().expect("all").len(), timestamps.len());
    }

    /// History is ascending by timestamp whatever the append order.
    #[test]
    fn timeline_history_is_sorted(timestamps in vec(0i64..10_000, 0..30)) {
        let store = MemoryStore::new();
        let owner = GlobalId::new("chat-subchannel", "uuid", "c/1").expect("gid");
        let timeline = Timeline::new(&store, &owner, "name");

        for ts in &timestamps {
            timeline.add_timestamp(*ts, "x").expect("append");
        }

        let entries = timeline.get_entries().expect("entries");
        prop_assert!(entries.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    /// addEdge twice == addEdge once, and neighbors are symmetric.
    #[test]
    fn correlation_idempotent_and_symmetric(
        pairs in vec((gid(), gid()), 1..15),
        repeats in 1usize..3
    ) {
        let store = MemoryStore::new();
        let index = CorrelationIndex::new(&store);
        let tag = CorrelationType::new("related").expect("tag");

        for _ in 0..repeats {
            for (a, b) in &pairs {
                index.add_edge(a, b, &tag).expect("edge");
            }
        }

        for (a, b) in &pairs {
            let from_a = index.get_edges(a, &tag).expect("edges");
            let from_b = index.get_edges(b, &tag).expect("edges");
            prop_assert!(from_a.contains(b));
            prop_assert!(from_b.contains(a));
        }

        let once = MemoryStore::new();
        let once_index = CorrelationIndex::new(&once);
        for (a, b) in &pairs {
            once_index.add_edge(a, b, &tag).expect("edge");
        }
        for (a, _) in &pairs {
            prop_assert_eq!(
                index.get_edges(a, &tag).expect("edges"),
                once_index.get_edges(a, &tag).expect("edges")
            );
        }
    }

    /// Sanitizers are total and always land inside their code range.
    #[test]
    fn sanitizers_are_total(n in any::<i64>(), text in ".{0,8}") {
        prop_assert!(sanitize_distribution(n) <= 3);
        prop_assert!((1..=4).contains(&sanitize_threat_level(n)));
        prop_assert!(sanitize_analysis(n) <= 2);

        prop_assert_eq!(sanitize_distribution(text.as_str()), 0);
        prop_assert_eq!(sanitize_threat_level(text.as_str()), 4);
        prop_assert_eq!(sanitize_analysis(text.as_str()), 0);
    }
}

// =============================================================================
// BACKEND PARITY
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// The durable backend answers timeline queries like the memory one.
    #[test]
    fn redb_timeline_matches_memory(timestamps in vec(0i64..1_000, 1..20)) {
        let dir = tempfile::tempdir().expect("tempdir");
        let durable = RedbStore::open(dir.path().join("t.redb")).expect("open");
        let volatile = MemoryStore::new();
        let owner = GlobalId::new("user-account", "twitter", "7").expect("gid");

        for (n, ts) in timestamps.iter().enumerate() {
            let value = format!("v{n}");
            Timeline::new(&durable, &owner, "username").add_timestamp(*ts, &value).expect("append");
            Timeline::new(&volatile, &owner, "username").add_timestamp(*ts, &value).expect("append");
        }

        prop_assert_eq!(
            Timeline::new(&durable, &owner, "username").get_entries().expect("entries"),
            Timeline::new(&volatile, &owner, "username").get_entries().expect("entries")
        );
        prop_assert_eq!(
            Timeline::new(&durable, &owner, "username").get_last_value().expect("last"),
            Timeline::new(&volatile, &owner, "username").get_last_value().expect("last")
        );
    }
}
