use std::sync::Once;
use std::time::Duration;

use digest_core::{
    update_job, ConnectionStatus, Effect, JobMsg, JobPhase, JobSession, JobStatus,
    JobStatusResponse, StreamInput, SubscriptionId, TranscriptSegment,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(digest_logging::initialize_for_tests);
}

fn status(raw: &str) -> JobStatusResponse {
    digest_core::payload::decode_job_status(raw).expect("valid status json")
}

/// Watches `job_id`, answers the status fetch with `in_progress`, and returns
/// the session plus the subscription it opened.
fn streaming_session(job_id: &str) -> (JobSession, SubscriptionId) {
    let (session, effects) = update_job(JobSession::new(), JobMsg::Watch(job_id.to_string()));
    let request = match &effects[..] {
        [Effect::FetchJobStatus { request, .. }] => *request,
        other => panic!("unexpected effects {other:?}"),
    };
    let (session, effects) = update_job(
        session,
        JobMsg::StatusFetched {
            request,
            result: Ok(status(r#"{"status":"in_progress"}"#)),
        },
    );
    let subscription = match &effects[..] {
        [Effect::OpenJobStream { subscription, job_id: opened }] => {
            assert_eq!(opened, job_id);
            *subscription
        }
        other => panic!("unexpected effects {other:?}"),
    };
    (session, subscription)
}

fn feed(mut session: JobSession, subscription: SubscriptionId, inputs: Vec<StreamInput>) -> JobSession {
    for input in inputs {
        let (next, effects) = update_job(session, JobMsg::Stream { subscription, input });
        assert!(effects.is_empty());
        session = next;
    }
    session
}

fn delta(json: &str) -> StreamInput {
    StreamInput::message(Some("update"), json)
}

#[test]
fn watch_fetches_status_before_streaming() {
    init_logging();
    let (session, effects) = update_job(JobSession::new(), JobMsg::Watch("vid1".into()));
    let view = session.view();
    assert!(view.loading);
    assert_eq!(view.connection, ConnectionStatus::Disconnected);
    assert!(matches!(
        &effects[..],
        [Effect::FetchJobStatus { job_id, .. }] if job_id == "vid1"
    ));
}

#[test]
fn completed_and_not_started_skip_streaming() {
    init_logging();
    for raw in [
        r#"{"status":"completed","state":{"video":{"title":"Done"}}}"#,
        r#"{"status":"not_started","video":{"title":"Queued"}}"#,
    ] {
        let (session, effects) = update_job(JobSession::new(), JobMsg::Watch("v".into()));
        let Effect::FetchJobStatus { request, .. } = effects[0].clone() else {
            panic!("expected fetch");
        };
        let (mut session, effects) = update_job(
            session,
            JobMsg::StatusFetched {
                request,
                result: Ok(status(raw)),
            },
        );
        assert!(effects.is_empty());
        assert_eq!(session.connection(), ConnectionStatus::Disconnected);
        assert!(session.is_settled());
        assert!(session.state().unwrap().video.is_some());
        assert!(session.consume_dirty());
    }
}

#[test]
fn completed_status_without_phase_reads_as_success() {
    init_logging();
    let (session, effects) = update_job(JobSession::new(), JobMsg::Watch("v".into()));
    let Effect::FetchJobStatus { request, .. } = effects[0].clone() else {
        panic!("expected fetch");
    };
    let (session, _) = update_job(
        session,
        JobMsg::StatusFetched {
            request,
            result: Ok(status(r#"{"status":"completed","state":{"video":{"title":"T"}}}"#)),
        },
    );
    assert_eq!(session.state().unwrap().status, JobPhase::Success);
    assert_eq!(session.view().job_status, Some(JobStatus::Completed));
}

#[test]
fn initial_fetch_failure_is_surfaced_without_retry() {
    init_logging();
    let (session, effects) = update_job(JobSession::new(), JobMsg::Watch("v".into()));
    let Effect::FetchJobStatus { request, .. } = effects[0].clone() else {
        panic!("expected fetch");
    };
    let (session, effects) = update_job(
        session,
        JobMsg::StatusFetched {
            request,
            result: Err("http status 500".into()),
        },
    );
    assert!(effects.is_empty());
    let view = session.view();
    assert_eq!(view.error.as_deref(), Some("http status 500"));
    assert_eq!(view.connection, ConnectionStatus::Error);
    assert!(!view.loading);

    // Retry is explicit.
    let (session, effects) = update_job(session, JobMsg::Refetch);
    assert!(matches!(&effects[..], [Effect::FetchJobStatus { .. }]));
    assert_eq!(session.view().error, None);
}

#[test]
fn first_message_snapshot_replaces_state() {
    init_logging();
    let (session, sub) = streaming_session("v");
    let session = feed(
        session,
        sub,
        vec![
            StreamInput::Connecting { attempt: 0 },
            StreamInput::Opened,
            StreamInput::message(
                None,
                r#"{"status":"transcribing","download_progress":100,"transcript_buffer":[{"start":0,"end":2,"text":"hi"}],"summary_buffer":""}"#,
            ),
        ],
    );
    let state = session.state().unwrap();
    assert_eq!(session.connection(), ConnectionStatus::Connected);
    assert_eq!(state.status, JobPhase::Transcribing);
    assert_eq!(state.download_progress, Some(100.0));
    assert_eq!(state.transcript_buffer.len(), 1);
    assert_eq!(session.view().job_status, Some(JobStatus::InProgress));
}

#[test]
fn status_update_is_idempotent() {
    init_logging();
    let (session, sub) = streaming_session("v");
    let update = r#"{"type":"status_update","data":{"status":"downloading","message":"go"}}"#;
    let once = feed(session.clone(), sub, vec![delta(update)]);
    let twice = feed(session, sub, vec![delta(update), delta(update)]);
    assert_eq!(once.state(), twice.state());
    assert_eq!(twice.state().unwrap().status, JobPhase::Downloading);
}

#[test]
fn success_status_completes_job() {
    init_logging();
    let (session, sub) = streaming_session("v");
    let session = feed(
        session,
        sub,
        vec![delta(r#"{"type":"status_update","data":{"status":"success"}}"#)],
    );
    assert_eq!(session.view().job_status, Some(JobStatus::Completed));
}

#[test]
fn download_progress_is_authoritative() {
    init_logging();
    let (session, sub) = streaming_session("v");
    let session = feed(
        session,
        sub,
        vec![
            delta(r#"{"type":"download_progress","data":{"progress":40}}"#),
            delta(r#"{"type":"download_progress","data":{"progress":12.5}}"#),
        ],
    );
    assert_eq!(session.state().unwrap().download_progress, Some(12.5));
}

#[test]
fn transcript_segments_keep_arrival_order() {
    init_logging();
    let (session, sub) = streaming_session("v");
    let session = feed(
        session,
        sub,
        vec![
            delta(r#"{"type":"transcript_segment","data":{"start":0,"end":2,"text":"hi"}}"#),
            delta(r#"{"type":"transcript_segment","data":{"start":2,"end":4,"text":"there"}}"#),
            delta(r#"{"type":"transcript_segment","data":{"start":1,"end":1.5,"text":"late"}}"#),
        ],
    );
    let texts: Vec<_> = session
        .state()
        .unwrap()
        .transcript_buffer
        .iter()
        .map(|segment| segment.text.as_str())
        .collect();
    assert_eq!(texts, vec!["hi", "there", "late"]);
    assert_eq!(
        session.state().unwrap().transcript_buffer[1],
        TranscriptSegment {
            start: 2.0,
            end: 4.0,
            text: "there".into()
        }
    );
}

#[test]
fn summary_chunks_concatenate() {
    init_logging();
    let (session, sub) = streaming_session("v");
    let session = feed(
        session,
        sub,
        vec![
            delta(r#"{"type":"summary_chunk","data":{"content":"Hel"}}"#),
            delta(r#"{"type":"summary_chunk","data":{"content":"lo"}}"#),
        ],
    );
    assert_eq!(session.state().unwrap().summary_buffer, "Hello");
}

#[test]
fn video_metadata_merges_fields() {
    init_logging();
    let (session, sub) = streaming_session("v");
    let session = feed(
        session,
        sub,
        vec![
            delta(r#"{"type":"video_metadata","data":{"title":"A"}}"#),
            delta(r#"{"type":"video_metadata","data":{"uploader":"B"}}"#),
        ],
    );
    let video = session.state().unwrap().video.clone().unwrap();
    assert_eq!(video.title.as_deref(), Some("A"));
    assert_eq!(video.uploader.as_deref(), Some("B"));
}

#[test]
fn error_event_surfaces_without_closing() {
    init_logging();
    let (session, sub) = streaming_session("v");
    let session = feed(
        session,
        sub,
        vec![
            StreamInput::Opened,
            delta(r#"{"type":"error","data":{"error":"yt-dlp failed"}}"#),
            delta(r#"{"type":"error","data":{}}"#),
        ],
    );
    let view = session.view();
    assert_eq!(view.error.as_deref(), Some("Processing error occurred"));
    assert_eq!(view.connection, ConnectionStatus::Error);
    assert_eq!(session.subscription(), Some(sub));
}

#[test]
fn malformed_payloads_are_dropped() {
    init_logging();
    let (session, sub) = streaming_session("v");
    let session = feed(
        session,
        sub,
        vec![
            StreamInput::Opened,
            delta(r#"{"type":"summary_chunk","data":{"content":"ok"}}"#),
            delta("not json"),
            delta(r#"{"type":"mystery","data":{}}"#),
            StreamInput::message(None, "{broken"),
        ],
    );
    assert_eq!(session.connection(), ConnectionStatus::Connected);
    assert_eq!(session.state().unwrap().summary_buffer, "ok");
    assert_eq!(session.view().error, None);
}

#[test]
fn transport_errors_then_give_up() {
    init_logging();
    let (session, sub) = streaming_session("v");
    let session = feed(
        session,
        sub,
        vec![
            StreamInput::Opened,
            StreamInput::TransportError {
                message: "reset".into(),
                retry_in: Duration::from_secs(1),
            },
        ],
    );
    assert_eq!(session.connection(), ConnectionStatus::Error);
    assert_eq!(session.view().error, None);

    let session = feed(
        session,
        sub,
        vec![StreamInput::GaveUp {
            message: "reset".into(),
        }],
    );
    assert_eq!(
        session.view().error.as_deref(),
        Some("Failed to connect to real-time updates after multiple attempts")
    );
    assert_eq!(session.subscription(), None);
    assert!(session.is_settled());
}

#[test]
fn server_close_disconnects() {
    init_logging();
    let (session, sub) = streaming_session("v");
    let session = feed(session, sub, vec![StreamInput::Opened, StreamInput::ServerClosed]);
    assert_eq!(session.connection(), ConnectionStatus::Disconnected);
    assert_eq!(session.subscription(), None);
}

#[test]
fn subject_change_closes_previous_and_ignores_stale_events() {
    init_logging();
    let (session, old_sub) = streaming_session("a");
    let session = feed(
        session,
        old_sub,
        vec![delta(r#"{"type":"summary_chunk","data":{"content":"old"}}"#)],
    );

    let (session, effects) = update_job(session, JobMsg::Watch("b".into()));
    assert_eq!(effects[0], Effect::CloseJobStream { subscription: old_sub });
    assert!(matches!(&effects[1], Effect::FetchJobStatus { job_id, .. } if job_id == "b"));
    assert_eq!(session.state(), None);

    // A late event from the superseded subscription changes nothing.
    let (session, effects) = update_job(
        session,
        JobMsg::Stream {
            subscription: old_sub,
            input: delta(r#"{"type":"summary_chunk","data":{"content":"stale"}}"#),
        },
    );
    assert!(effects.is_empty());
    assert_eq!(session.state(), None);
    assert_eq!(session.job_id(), Some("b"));
}

#[test]
fn stale_status_result_is_ignored() {
    init_logging();
    let (session, effects) = update_job(JobSession::new(), JobMsg::Watch("a".into()));
    let Effect::FetchJobStatus { request: first, .. } = effects[0].clone() else {
        panic!("expected fetch");
    };
    let (session, _) = update_job(session, JobMsg::Watch("b".into()));
    let (session, effects) = update_job(
        session,
        JobMsg::StatusFetched {
            request: first,
            result: Ok(status(r#"{"status":"in_progress"}"#)),
        },
    );
    assert!(effects.is_empty());
    assert!(session.view().loading);
}

#[test]
fn close_tears_down_subscription() {
    init_logging();
    let (session, sub) = streaming_session("v");
    let (mut session, effects) = update_job(session, JobMsg::Close);
    assert_eq!(effects, vec![Effect::CloseJobStream { subscription: sub }]);
    assert_eq!(session.job_id(), None);
    assert!(session.consume_dirty());
    assert!(!session.consume_dirty());
}
