//! 流水线跟踪与讲解流的端到端行为（使用 FakeBackendClient）

use std::sync::Arc;
use std::time::Duration;

use lazylearn::application::ports::{ChapterRef, ExplainRequest};
use lazylearn::application::services::{
    PipelineTracker, PipelineTrackerConfig, StreamConsumer, StreamState,
};
use lazylearn::application::ClientError;
use lazylearn::domain::pipeline::{
    ChapterId, ChapterSelection, ExtractionStatus, PipelineStatus, TextbookId,
};
use lazylearn::infrastructure::adapters::{snapshot_fixture, FakeBackendClient, ScriptedStream};

fn tracker(fake: &Arc<FakeBackendClient>, textbook_id: &str) -> PipelineTracker {
    PipelineTracker::new(
        TextbookId::from(textbook_id),
        fake.clone(),
        PipelineTrackerConfig::default(),
    )
}

#[tokio::test(start_paused = true)]
async fn test_extract_deferred_round_trip() {
    let fake = Arc::new(FakeBackendClient::new());
    fake.set_status(snapshot_fixture("tb-123", PipelineStatus::PartiallyExtracted));
    let tracker = tracker(&fake, "tb-123");

    let snapshot = tracker.fetch_status().await.unwrap();
    assert_eq!(snapshot.status(), PipelineStatus::PartiallyExtracted);
    assert!(!tracker.is_polling());

    tracker.extract_all_deferred().await.unwrap();

    let requests = fake.extract_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].1,
        vec![ChapterId::from("ch-2"), ChapterId::from("ch-3")]
    );
    assert_eq!(tracker.status(), Some(PipelineStatus::Extracting));
    assert!(tracker.is_polling());

    // 后端同样报告 extracting
    let refreshed = tracker.fetch_status().await.unwrap();
    assert_eq!(refreshed.status(), PipelineStatus::Extracting);
}

#[tokio::test(start_paused = true)]
async fn test_confirm_then_poll_until_settled() {
    let fake = Arc::new(FakeBackendClient::new());
    fake.set_status(snapshot_fixture("tb-123", PipelineStatus::AwaitingVerification));
    fake.push_progress(Ok(snapshot_fixture("tb-123", PipelineStatus::Extracting)));
    fake.push_progress(Err(ClientError::transport("connection reset")));
    fake.push_progress(Ok(snapshot_fixture("tb-123", PipelineStatus::FullyExtracted)));
    let tracker = tracker(&fake, "tb-123");

    let snapshot = tracker.fetch_status().await.unwrap();
    assert!(snapshot.status().needs_verification());

    let mut selection = ChapterSelection::preselected(&snapshot);
    assert!(selection.can_confirm());
    selection.toggle(ChapterId::from("ch-4"));
    let ack = tracker.confirm_selection(&selection).await.unwrap();
    assert_eq!(ack.selected_count, 3);
    assert_eq!(
        fake.confirm_requests()[0].1,
        vec![
            ChapterId::from("ch-1"),
            ChapterId::from("ch-2"),
            ChapterId::from("ch-4")
        ]
    );

    let mut rx = tracker.subscribe();
    let settled = tokio::time::timeout(Duration::from_secs(30), async {
        rx.wait_for(|s| s.as_ref().map_or(false, |s| !s.status().is_active()))
            .await
            .unwrap()
            .clone()
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(settled.status(), PipelineStatus::FullyExtracted);
    assert_eq!(fake.progress_calls(), 3);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(fake.progress_calls(), 3);
    assert!(!tracker.is_polling());
}

#[tokio::test]
async fn test_repeated_fetch_is_stable() {
    let fake = Arc::new(FakeBackendClient::new());
    fake.set_status(snapshot_fixture("tb-123", PipelineStatus::PartiallyExtracted));
    let tracker = tracker(&fake, "tb-123");

    let first = tracker.fetch_status().await.unwrap();
    let second = tracker.fetch_status().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(
        tracker
            .awaiting_extraction()
            .iter()
            .map(|c| c.status())
            .collect::<Vec<_>>(),
        vec![ExtractionStatus::Deferred, ExtractionStatus::Deferred]
    );
    assert_eq!(tracker.extracted_count(), 1);
}

#[tokio::test]
async fn test_explanation_streams_to_completion() {
    let fake = Arc::new(FakeBackendClient::new());
    fake.push_stream(Ok(ScriptedStream::new([
        "data: The Z-transform \n\n",
        "data: is defined as...\n\n",
        "data: [DONE]\n\n",
    ])));
    let mut consumer = StreamConsumer::new(fake.clone());

    consumer.explain(ExplainRequest::new(
        vec![ChapterRef::new(TextbookId::from("tb-123"), 2)],
        "What is the Z-transform?",
    ));
    let done = consumer.finished().await;

    assert_eq!(done.state, StreamState::Complete);
    assert_eq!(done.text, "The Z-transform is defined as...");
    assert_eq!(fake.explain_requests()[0].query, "What is the Z-transform?");
}

#[tokio::test]
async fn test_embedded_sentinel_does_not_terminate() {
    let fake = Arc::new(FakeBackendClient::new());
    fake.push_stream(Ok(ScriptedStream::new([
        "data: the marker [DONE] appears here\n\n",
        "data: and more\n\n",
        "data: [DONE]\n\n",
    ])));
    let mut consumer = StreamConsumer::new(fake.clone());

    consumer.explain(ExplainRequest::new(
        vec![ChapterRef::new(TextbookId::from("tb-123"), 2)],
        "Explain",
    ));
    let done = consumer.finished().await;
    assert_eq!(done.state, StreamState::Complete);
    assert_eq!(done.text, "the marker [DONE] appears hereand more");
}

#[tokio::test(start_paused = true)]
async fn test_superseded_stream_does_not_error() {
    let fake = Arc::new(FakeBackendClient::new());
    fake.push_stream(Ok(ScriptedStream::new(["data: first\n\n"])
        .with_chunk_delay(Duration::from_millis(100))
        .hold_open()));
    fake.push_stream(Ok(ScriptedStream::from_results(vec![Err(
        ClientError::transport("should not be observed"),
    )])
    .with_chunk_delay(Duration::from_secs(60))));
    let mut consumer = StreamConsumer::new(fake.clone());
    let request = ExplainRequest::new(
        vec![ChapterRef::new(TextbookId::from("tb-123"), 2)],
        "Explain",
    );

    consumer.explain(request.clone());
    let mut rx = consumer.subscribe();
    rx.wait_for(|s| s.text == "first").await.unwrap();

    consumer.explain(request);
    tokio::time::sleep(Duration::from_secs(1)).await;
    consumer.cancel();
    tokio::time::sleep(Duration::from_secs(120)).await;

    let snapshot = consumer.snapshot();
    assert_eq!(snapshot.generation, 2);
    assert_ne!(snapshot.state, StreamState::Error);
    assert_eq!(snapshot.error, None);
}
