//! Replay from a handwritten journal file into fresh read models.

use projections::Projector;

fn line(aggregate_id: &str, event_name: &str, payload: serde_json::Value) -> String {
    serde_json::json!({
        "aggregate_id": aggregate_id,
        "event_name": event_name,
        "payload": payload,
        "occurred_at": "2024-06-01T12:00:00Z",
    })
    .to_string()
}

#[tokio::test]
async fn replaying_a_known_journal_rebuilds_the_views() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.jsonl");

    let lines = [
        line(
            "p1",
            "payment.created",
            serde_json::json!({
                "payment_id": "p1", "user_id": "u1", "amount": 10,
                "service": "internet", "at": "2024-06-01T12:00:00Z"
            }),
        ),
        line(
            "p1",
            "payment.initialized",
            serde_json::json!({
                "payment_id": "p1", "user_id": "u1", "amount": 10,
                "service": "internet", "at": "2024-06-01T12:00:01Z"
            }),
        ),
        line(
            "p1",
            "payment.pending",
            serde_json::json!({
                "payment_id": "p1", "user_id": "u1", "at": "2024-06-01T12:00:02Z"
            }),
        ),
        line(
            "p1",
            "payment.completed",
            serde_json::json!({
                "payment_id": "p1", "user_id": "u1", "gateway_id": "gw_p1",
                "at": "2024-06-01T12:00:03Z"
            }),
        ),
        line(
            "u1",
            "wallet.credited",
            serde_json::json!({
                "user_id": "u1", "amount": 20, "at": "2024-06-01T12:00:00Z"
            }),
        ),
        line(
            "p1",
            "wallet.debited",
            serde_json::json!({
                "payment_id": "p1", "user_id": "u1", "amount": 10,
                "at": "2024-06-01T12:00:02Z"
            }),
        ),
    ];
    std::fs::write(&path, lines.join("\n") + "\n").unwrap();

    let journal = journal::EventJournal::with_file(&path).unwrap();
    let projector = Projector::new();
    projector.replay(&journal).await.unwrap();

    let payment = projector.get_payment("p1").await.unwrap();
    assert_eq!(payment.status, domain::Status::Succeeded);
    assert_eq!(payment.gateway_id.as_deref(), Some("gw_p1"));
    assert_eq!(payment.amount, 10);
    assert_eq!(payment.service, "internet");

    let wallet = projector.get_wallet("u1").await.unwrap();
    assert_eq!(wallet.balance, 10);
}

#[tokio::test]
async fn replay_is_stable_for_an_unchanged_log() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.jsonl");
    std::fs::write(
        &path,
        line(
            "u1",
            "wallet.credited",
            serde_json::json!({
                "user_id": "u1", "amount": 20, "at": "2024-06-01T12:00:00Z"
            }),
        ) + "\n",
    )
    .unwrap();

    let journal = journal::EventJournal::with_file(&path).unwrap();

    // Two fresh projectors fed the same log agree exactly.
    let first = Projector::new();
    first.replay(&journal).await.unwrap();
    let second = Projector::new();
    second.replay(&journal).await.unwrap();
    assert_eq!(
        first.get_wallet("u1").await.unwrap().balance,
        second.get_wallet("u1").await.unwrap().balance
    );
}
