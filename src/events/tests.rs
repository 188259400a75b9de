use super::*;
use crate::article::ArticleId;
use futures_util::StreamExt;

fn progress(status: ArticleStatus) -> EventKind {
    EventKind::ArticleCompleted(ArticleProgress {
        article_id: ArticleId::new("a-0123456789abcdef"),
        title: "Title".to_string(),
        status,
        candidates: 1,
        matches: vec![],
        errored_pairs: 0,
        error: None,
    })
}

#[test]
fn test_publish_without_subscribers_is_noop() {
    let emitter = EventEmitter::new(4);
    assert_eq!(emitter.emit(Uuid::new_v4(), progress(ArticleStatus::Rejected)), 0);
    assert_eq!(emitter.dropped_count(), 0);
}

#[tokio::test]
async fn test_every_subscriber_receives_events_in_order() {
    let emitter = EventEmitter::new(8);
    let mut a = emitter.subscribe();
    let mut b = emitter.subscribe();
    let run_id = Uuid::new_v4();

    emitter.emit(run_id, progress(ArticleStatus::Matched));
    emitter.emit(run_id, progress(ArticleStatus::Skipped));

    for sub in [&mut a, &mut b] {
        let first = sub.recv().await.unwrap();
        let second = sub.recv().await.unwrap();
        assert_eq!((first.seq, second.seq), (0, 1));
        assert_eq!(first.run_id, run_id);
    }
}

#[test]
fn test_full_subscriber_drops_instead_of_blocking() {
    let emitter = EventEmitter::new(2);
    let mut slow = emitter.subscribe();
    let run_id = Uuid::new_v4();

    for _ in 0..5 {
        emitter.emit(run_id, progress(ArticleStatus::Rejected));
    }

    assert_eq!(emitter.dropped_count(), 3);
    let received: Vec<_> = slow.drain().iter().map(|e| e.seq).collect();
    assert_eq!(received, vec![0, 1]);
    // Still subscribed after dropping.
    assert_eq!(emitter.subscriber_count(), 1);
}

#[test]
fn test_slow_subscriber_does_not_starve_fast_one() {
    let emitter = EventEmitter::new(1);
    let _slow = emitter.subscribe();
    let mut fast = emitter.subscribe();
    let run_id = Uuid::new_v4();

    for _ in 0..3 {
        emitter.emit(run_id, progress(ArticleStatus::Matched));
        assert!(fast.try_recv().is_some());
    }
    assert_eq!(emitter.dropped_count(), 2);
}

#[test]
fn test_closed_subscribers_are_pruned() {
    let emitter = EventEmitter::new(4);
    let dropped = emitter.subscribe();
    let _kept = emitter.subscribe();
    drop(dropped);

    emitter.emit(Uuid::new_v4(), progress(ArticleStatus::Errored));
    assert_eq!(emitter.subscriber_count(), 1);
}

#[tokio::test]
async fn test_subscriber_as_stream_ends_when_emitter_dropped() {
    let emitter = EventEmitter::new(4);
    let stream = emitter.subscribe().into_stream();
    emitter.emit(Uuid::new_v4(), progress(ArticleStatus::Matched));
    drop(emitter);

    let events: Vec<_> = stream.collect().await;
    assert_eq!(events.len(), 1);
}

#[tokio::test]
async fn test_json_lines_written_until_emitter_dropped() {
    let emitter = EventEmitter::new(4);
    let subscriber = emitter.subscribe();
    let run_id = Uuid::new_v4();
    emitter.emit(run_id, progress(ArticleStatus::Matched));
    emitter.emit(run_id, progress(ArticleStatus::Rejected));
    drop(emitter);

    let mut out = Vec::new();
    let written = subscriber.write_json_lines(&mut out).await.unwrap();
    assert_eq!(written, 2);

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<serde_json::Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["status"], "matched");
    assert_eq!(lines[1]["status"], "rejected");
}

#[tokio::test]
async fn test_json_lines_stop_at_first_write_error() {
    let emitter = EventEmitter::new(4);
    let subscriber = emitter.subscribe();
    emitter.emit(Uuid::new_v4(), progress(ArticleStatus::Matched));

    let (mut writer, reader) = tokio::io::duplex(64);
    drop(reader);

    let err = subscriber.write_json_lines(&mut writer).await.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);

    // The failed writer's subscription is gone; later events are not queued for it.
    emitter.emit(Uuid::new_v4(), progress(ArticleStatus::Rejected));
    assert_eq!(emitter.subscriber_count(), 0);
}

#[test]
fn test_event_serializes_flat_with_type_tag() {
    let event = ProgressEvent {
        seq: 7,
        run_id: Uuid::nil(),
        emitted_at: chrono::Utc::now(),
        kind: progress(ArticleStatus::Matched),
    };
    let json = serde_json::to_value(&event).unwrap();

    assert_eq!(json["type"], "article_completed");
    assert_eq!(json["status"], "matched");
    assert_eq!(json["seq"], 7);
    assert!(json.get("error").is_none());

    let back: ProgressEvent = serde_json::from_value(json).unwrap();
    assert_eq!(back, event);
}
