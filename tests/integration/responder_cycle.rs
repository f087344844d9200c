//! Poll cycles against a mock inbox and an in-memory seen store.

use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

use equity_bot::engine::evaluator::EvaluatorConfig;
use equity_bot::engine::EquityEngine;
use equity_bot::responder::{Responder, ResponderConfig};
use equity_bot::storage::SeenStore;
use equity_bot::types::PostKind;

use crate::mock_inbox::{comment, message, MockInbox};
use crate::scripted_calculator::ScriptedCalculator;

const AA_KK: &str = "0\nAA: 80.00%\nKK: 20.00%\n";

async fn setup(inbox: Arc<MockInbox>, config: ResponderConfig) -> (Responder, SeenStore) {
    let store = SeenStore::connect("sqlite::memory:").await.unwrap();
    let engine = EquityEngine::new(
        Arc::new(ScriptedCalculator::exact(AA_KK)),
        EvaluatorConfig::default(),
    );
    let responder = Responder::new(inbox, store.clone(), engine, config);
    (responder, store)
}

fn live() -> ResponderConfig {
    ResponderConfig {
        inbox_limit: 25,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_cycle_replies_records_and_marks_read() {
    let inbox = Arc::new(MockInbox::new(vec![
        comment("c1", "alice", "u/THE-equity-bot AA KK"),
        message("m1", "bob", "what do you think of {AA}?"),
    ]));
    let (responder, store) = setup(inbox.clone(), live()).await;

    let report = assert_ok!(responder.run_cycle().await);
    assert_eq!(report.fetched, 2);
    assert_eq!(report.replied, 2);
    assert_eq!(report.failed, 0);

    let replies = inbox.replies();
    assert_eq!(replies[0], ("c1".to_string(), "Range|Equity\n:--|--:\naa|0.8\nkk|0.2\n".to_string()));
    assert_eq!(replies[1].1, "Error: need at least 2 ranges to run analysis");
    assert!(inbox.is_read("c1") && inbox.is_read("m1"));

    let c1 = store.get("c1").await.unwrap().unwrap();
    assert_eq!(c1.kind, PostKind::Comment);
    assert!(c1.has_request);
    let m1 = store.get("m1").await.unwrap().unwrap();
    assert!(!m1.has_request);
}

#[tokio::test]
async fn test_redelivered_item_is_not_answered_twice() {
    let item = comment("c1", "alice", "AA KK");
    let inbox = Arc::new(MockInbox::new(vec![item.clone()]));
    let (responder, store) = setup(inbox.clone(), live()).await;

    assert_ok!(responder.run_cycle().await);
    inbox.redeliver(item);
    let report = assert_ok!(responder.run_cycle().await);

    assert_eq!(report.skipped, 1);
    assert_eq!(report.replied, 0);
    assert_eq!(inbox.replies().len(), 1);
    assert!(inbox.is_read("c1"));
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_dry_run_posts_nothing() {
    let inbox = Arc::new(MockInbox::new(vec![comment("c1", "alice", "AA KK")]));
    let config = ResponderConfig {
        dry_run: true,
        ..live()
    };
    let (responder, store) = setup(inbox.clone(), config).await;

    let report = assert_ok!(responder.run_cycle().await);
    assert_eq!(report.replied, 1);
    assert!(inbox.replies().is_empty());
    assert!(store.is_seen("c1").await.unwrap());
}

#[tokio::test]
async fn test_allowlist_skips_other_authors() {
    let inbox = Arc::new(MockInbox::new(vec![
        comment("c1", "stranger", "AA KK"),
        comment("c2", "BromeatMeco", "AA KK"),
    ]));
    let config = ResponderConfig {
        allowed_authors: vec!["bromeatmeco".into()],
        ..live()
    };
    let (responder, store) = setup(inbox.clone(), config).await;

    let report = assert_ok!(responder.run_cycle().await);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.replied, 1);
    assert_eq!(inbox.replies()[0].0, "c2");
    assert!(store.is_seen("c1").await.unwrap());
    assert!(inbox.is_read("c1"));
}

#[tokio::test]
async fn test_failed_reply_is_isolated_and_retried() {
    let inbox = Arc::new(MockInbox::new(vec![
        comment("c1", "alice", "AA KK"),
        comment("c2", "bob", "AA KK"),
    ]));
    inbox.fail_reply_to("c1");
    let (responder, store) = setup(inbox.clone(), live()).await;

    let report = assert_ok!(responder.run_cycle().await);
    assert_eq!(report.failed, 1);
    assert_eq!(report.replied, 1);
    // Unrecorded and unread, so the next cycle tries again.
    assert!(!store.is_seen("c1").await.unwrap());
    assert!(!inbox.is_read("c1"));
    assert!(store.is_seen("c2").await.unwrap());
}

#[tokio::test]
async fn test_fetch_error_fails_the_cycle() {
    let inbox = Arc::new(MockInbox::new(vec![comment("c1", "alice", "AA KK")]));
    inbox.set_error("503 Service Unavailable");
    let (responder, _store) = setup(inbox.clone(), live()).await;

    assert_err!(responder.run_cycle().await);

    inbox.clear_error();
    let report = assert_ok!(responder.run_cycle().await);
    assert_eq!(report.replied, 1);
}

#[tokio::test]
async fn test_inbox_limit_respected() {
    let items = (0..5)
        .map(|i| comment(&format!("c{i}"), "alice", "AA KK"))
        .collect();
    let inbox = Arc::new(MockInbox::new(items));
    let config = ResponderConfig {
        inbox_limit: 2,
        ..live()
    };
    let (responder, _store) = setup(inbox.clone(), config).await;

    let report = assert_ok!(responder.run_cycle().await);
    assert_eq!(report.fetched, 2);
    let report = assert_ok!(responder.run_cycle().await);
    assert_eq!(report.fetched, 2);
    assert_eq!(inbox.replies().len(), 4);
}

#[tokio::test]
async fn test_posted_reply_is_marked_read_even_if_record_fails() {
    let item = comment("c1", "alice", "AA KK");
    let inbox = Arc::new(MockInbox::new(vec![item.clone()]));
    let (responder, store) = setup(inbox.clone(), live()).await;
    inbox.record_on_reply(store.clone());

    let report = assert_ok!(responder.run_cycle().await);
    assert_eq!(report.replied, 1);
    assert_eq!(report.failed, 0);
    assert!(inbox.is_read("c1"));

    // Next cycle finds nothing unread; a redelivery is still skipped.
    let report = assert_ok!(responder.run_cycle().await);
    assert_eq!(report.fetched, 0);
    inbox.redeliver(item);
    let report = assert_ok!(responder.run_cycle().await);
    assert_eq!(report.skipped, 1);
    assert_eq!(inbox.replies().len(), 1);
}

#[tokio::test]
async fn test_own_comments_are_not_answered() {
    let inbox = Arc::new(MockInbox::new(vec![
        comment("c1", "THE-equity-bot", "Range|Equity\n:--|--:\naa|0.8\nkk|0.2\n"),
        comment("c2", "alice", "AA KK"),
    ]));
    let config = ResponderConfig {
        own_username: Some("the-equity-bot".into()),
        ..live()
    };
    let (responder, store) = setup(inbox.clone(), config).await;

    let report = assert_ok!(responder.run_cycle().await);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.replied, 1);
    assert_eq!(inbox.replies()[0].0, "c2");
    assert!(store.is_seen("c1").await.unwrap());
}
