use std::{sync::Arc, time::Duration};

use konspekt_core::{
    Config, EncodedMedia, HistoryStore, KonspektError, MemoryStore, Orchestrator, PipelineStage,
    mock::{BackendCall, ScriptedBackend},
    pipeline::NETWORK_ERROR_MESSAGE,
};
use tokio::sync::Notify;

const NEWTON: &str = "Newton's second law: F = m*a.";
const STRUCTURED: &str = r#"{
    "summary": "Force equals mass times acceleration.",
    "keySections": ["Second law of motion"],
    "formulas": ["F = m*a"],
    "glossary": [],
    "examQuestions": ["State Newton's second law."]
}"#;
const NOTES: &str = "# Dynamics\n- **Force** causes acceleration";

fn lecture() -> EncodedMedia {
    EncodedMedia {
        filename: "newton.mp3".into(),
        payload: vec![0x49, 0x44, 0x33, 0x04],
        content_type: "audio/mpeg".into(),
    }
}

fn config() -> Config {
    Config::default().with_api_key("test-key")
}

fn orchestrator(backend: &Arc<ScriptedBackend>) -> (Orchestrator, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let history = HistoryStore::load(Box::new(Arc::clone(&store)));
    let orchestrator = Orchestrator::new(backend.clone(), config(), history);
    orchestrator.load_media(lecture()).unwrap();
    (orchestrator, store)
}

fn is_structured(call: &BackendCall) -> bool {
    matches!(call, BackendCall::Structured { .. })
}

fn is_text(call: &BackendCall) -> bool {
    matches!(call, BackendCall::Text { .. })
}

fn is_transcribe(call: &BackendCall) -> bool {
    matches!(call, BackendCall::Transcribe { .. })
}

#[tokio::test]
async fn newton_lecture_produces_full_study_materials() {
    let backend = Arc::new(ScriptedBackend::succeeding(NEWTON, STRUCTURED, NOTES));
    let (orchestrator, _) = orchestrator(&backend);

    let materials = orchestrator.start_run().await.unwrap();

    assert_eq!(materials.transcript, NEWTON);
    assert_eq!(materials.summary, "Force equals mass times acceleration.");
    assert_eq!(materials.key_sections, vec!["Second law of motion"]);
    assert_eq!(materials.formulas, vec!["F = m*a"]);
    assert!(materials.glossary.is_empty());
    assert_eq!(materials.exam_questions, vec!["State Newton's second law."]);
    assert_eq!(materials.detailed_notes, NOTES);

    let calls = backend.calls();
    let BackendCall::Structured { prompt } = &calls[1] else {
        panic!("second call should be the structured stage, got {:?}", calls[1]);
    };
    assert!(prompt.contains(NEWTON));
    let BackendCall::Text { prompt } = &calls[2] else {
        panic!("third call should be the notes stage, got {:?}", calls[2]);
    };
    assert!(prompt.contains(NEWTON));

    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.stage, PipelineStage::Completed);
    assert_eq!(snapshot.progress, 100);
    assert!(snapshot.error.is_none());
    assert_eq!(snapshot.materials.as_deref(), Some(materials.as_ref()));

    let history = orchestrator.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].filename, "newton.mp3");
    assert_eq!(snapshot.saved_entry, Some(history[0].id));
}

#[tokio::test]
async fn empty_transcripts_fail_without_retry_and_skip_later_stages() {
    for transcript in ["", "   ", "\n\t"] {
        let backend = Arc::new(ScriptedBackend::new().then_transcript(transcript));
        let (orchestrator, _) = orchestrator(&backend);

        let error = orchestrator.start_run().await.unwrap_err();
        assert!(!error.retryable, "{transcript:?} should not be retryable");
        assert_eq!(error.message, KonspektError::EmptyTranscript.to_string());

        assert_eq!(backend.count(is_structured), 0);
        assert_eq!(backend.count(is_text), 0);

        let snapshot = orchestrator.snapshot();
        assert_eq!(snapshot.stage, PipelineStage::Failed);
        assert_eq!(snapshot.progress, 0);
        assert!(snapshot.materials.is_none());

        assert!(!orchestrator.retry_run().await.unwrap_err().retryable);
        assert!(orchestrator.start_run().await.is_err());
        assert_eq!(backend.count(is_transcribe), 1);
    }
}

#[tokio::test]
async fn transport_failures_are_retryable_at_every_stage() {
    let failing_at = [
        ScriptedBackend::new().then_transcript_err(KonspektError::Remote {
            cause: "Backend returned 503 Service Unavailable".into(),
        }),
        ScriptedBackend::new()
            .then_transcript(NEWTON)
            .then_structured_err(KonspektError::Remote {
                cause: "Backend returned 500 Internal Server Error".into(),
            }),
        ScriptedBackend::new()
            .then_transcript(NEWTON)
            .then_structured(STRUCTURED)
            .then_notes_err(KonspektError::Remote {
                cause: "Backend returned 429 Too Many Requests".into(),
            }),
    ];

    for backend in failing_at {
        let backend = Arc::new(backend);
        let (orchestrator, store) = orchestrator(&backend);

        let error = orchestrator.start_run().await.unwrap_err();
        assert!(error.retryable);
        assert!(error.message.starts_with("Backend returned"));

        let snapshot = orchestrator.snapshot();
        assert_eq!(snapshot.stage, PipelineStage::Failed);
        assert_eq!(snapshot.progress, 0);
        assert!(snapshot.materials.is_none());
        assert!(orchestrator.history().is_empty());
        assert!(HistoryStore::load(Box::new(store)).list().is_empty());
    }
}

#[tokio::test]
async fn network_failures_get_a_friendly_message() {
    let backend = Arc::new(ScriptedBackend::new().then_transcript_err(KonspektError::Remote {
        cause: "error sending request for url (https://example.invalid/v1beta)".into(),
    }));
    let (orchestrator, _) = orchestrator(&backend);

    let error = orchestrator.start_run().await.unwrap_err();
    assert!(error.retryable);
    assert_eq!(error.message, NETWORK_ERROR_MESSAGE);
}

#[tokio::test]
async fn malformed_structured_output_is_retryable() {
    for raw in [
        r#"{"summary": "s", "keySections": [],}"#,
        r#"{"summary": "s", "keySections": ["#,
        r#"{"summary": "missing every other field"}"#,
    ] {
        let backend = Arc::new(
            ScriptedBackend::new()
                .then_transcript(NEWTON)
                .then_structured(raw),
        );
        let (orchestrator, _) = orchestrator(&backend);

        let error = orchestrator.start_run().await.unwrap_err();
        assert!(error.retryable, "{raw} should be retryable");
        assert!(error.message.starts_with("Could not parse the structured response"));
        assert_eq!(backend.count(is_text), 0);
    }
}

#[tokio::test]
async fn fenced_structured_output_is_accepted() {
    let fenced = format!("```json\n{STRUCTURED}\n```");
    let backend = Arc::new(ScriptedBackend::succeeding(NEWTON, &fenced, NOTES));
    let (orchestrator, _) = orchestrator(&backend);

    let materials = orchestrator.start_run().await.unwrap();
    assert_eq!(materials.formulas, vec!["F = m*a"]);
}

#[tokio::test]
async fn retry_restarts_from_transcription_with_the_same_media() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .then_transcript(NEWTON)
            .then_structured_err(KonspektError::Remote {
                cause: "Backend returned 502 Bad Gateway".into(),
            })
            .then_transcript(NEWTON)
            .then_structured(STRUCTURED)
            .then_notes(NOTES),
    );
    let (orchestrator, _) = orchestrator(&backend);
    let loaded = orchestrator.media().unwrap();

    assert!(orchestrator.start_run().await.unwrap_err().retryable);
    let materials = orchestrator.retry_run().await.unwrap();

    assert!(Arc::ptr_eq(&loaded, &orchestrator.media().unwrap()));
    assert_eq!(materials.formulas, vec!["F = m*a"]);

    let transcriptions: Vec<BackendCall> = backend
        .calls()
        .into_iter()
        .filter(is_transcribe)
        .collect();
    assert_eq!(transcriptions.len(), 2);
    assert_eq!(transcriptions[0], transcriptions[1]);
    assert_eq!(orchestrator.history().len(), 1);
}

#[tokio::test]
async fn second_start_while_running_is_rejected() {
    let gate = Arc::new(Notify::new());
    let backend = Arc::new(
        ScriptedBackend::succeeding(NEWTON, STRUCTURED, NOTES).with_gate(Arc::clone(&gate)),
    );
    let (orchestrator, _) = orchestrator(&backend);
    let orchestrator = Arc::new(orchestrator);

    let mut updates = orchestrator.subscribe();
    let running = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move { orchestrator.start_run().await }
    });
    updates
        .wait_for(|s| s.stage == PipelineStage::Transcribing)
        .await
        .unwrap();

    let rejected = orchestrator.start_run().await.unwrap_err();
    assert!(!rejected.retryable);
    assert_eq!(rejected.message, KonspektError::Busy.to_string());
    assert!(matches!(
        orchestrator.load_media(lecture()),
        Err(KonspektError::Busy)
    ));
    assert_eq!(orchestrator.snapshot().stage, PipelineStage::Transcribing);

    gate.notify_one();
    let materials = running.await.unwrap().unwrap();
    assert_eq!(materials.transcript, NEWTON);
    assert_eq!(backend.count(is_transcribe), 1);
}

#[tokio::test]
async fn missing_credential_fails_before_any_call() {
    let backend = Arc::new(ScriptedBackend::succeeding(NEWTON, STRUCTURED, NOTES));
    let orchestrator = Orchestrator::new(
        backend.clone(),
        Config::default(),
        HistoryStore::load(Box::new(MemoryStore::new())),
    );
    orchestrator.load_media(lecture()).unwrap();

    let error = orchestrator.start_run().await.unwrap_err();
    assert!(!error.retryable);
    assert!(error.message.contains("GEMINI_API_KEY"));
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn starting_without_media_is_a_retryable_readiness_error() {
    let backend = Arc::new(ScriptedBackend::succeeding(NEWTON, STRUCTURED, NOTES));
    let orchestrator = Orchestrator::new(
        backend.clone(),
        config(),
        HistoryStore::load(Box::new(MemoryStore::new())),
    );

    let error = orchestrator.start_run().await.unwrap_err();
    assert!(error.retryable);
    assert!(backend.calls().is_empty());

    orchestrator.load_media(lecture()).unwrap();
    assert!(orchestrator.snapshot().error.is_none());
    assert!(orchestrator.start_run().await.is_ok());
}

#[tokio::test]
async fn new_media_clears_a_non_retryable_failure() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .then_transcript(" ")
            .then_transcript(NEWTON)
            .then_structured(STRUCTURED)
            .then_notes(""),
    );
    let (orchestrator, _) = orchestrator(&backend);

    assert!(!orchestrator.start_run().await.unwrap_err().retryable);

    orchestrator
        .load_media(EncodedMedia {
            filename: "newton-retake.wav".into(),
            ..lecture()
        })
        .unwrap();
    let materials = orchestrator.start_run().await.unwrap();

    // empty detailed notes are tolerated
    assert_eq!(materials.detailed_notes, "");
    assert_eq!(orchestrator.history()[0].filename, "newton-retake.wav");
}

#[tokio::test]
async fn history_write_failure_does_not_fail_the_run() {
    let backend = Arc::new(ScriptedBackend::succeeding(NEWTON, STRUCTURED, NOTES));
    let (orchestrator, store) = orchestrator(&backend);
    store.set_fail_writes(true);

    let materials = orchestrator.start_run().await.unwrap();
    let snapshot = orchestrator.snapshot();

    assert_eq!(snapshot.stage, PipelineStage::Completed);
    assert_eq!(snapshot.materials.as_deref(), Some(materials.as_ref()));
    assert_eq!(snapshot.saved_entry, None);
    assert!(orchestrator.history().is_empty());
}

#[tokio::test]
async fn deleting_history_entries_through_the_orchestrator() {
    let backend = Arc::new(
        ScriptedBackend::succeeding(NEWTON, STRUCTURED, NOTES)
            .then_transcript(NEWTON)
            .then_structured(STRUCTURED)
            .then_notes(NOTES),
    );
    let (orchestrator, _) = orchestrator(&backend);

    orchestrator.start_run().await.unwrap();
    orchestrator.start_run().await.unwrap();
    let ids: Vec<u64> = orchestrator.history().iter().map(|e| e.id).collect();
    assert_eq!(ids.len(), 2);

    assert!(orchestrator.delete_history_entry(ids[0]).unwrap());
    assert!(!orchestrator.delete_history_entry(ids[0]).unwrap());
    assert_eq!(orchestrator.history_entry(ids[1]).map(|e| e.id), Some(ids[1]));
    assert!(orchestrator.history_entry(ids[0]).is_none());
}

#[tokio::test]
async fn dismissing_an_error_returns_to_idle() {
    let backend = Arc::new(ScriptedBackend::new().then_transcript_err(KonspektError::Remote {
        cause: "Backend returned 503".into(),
    }));
    let (orchestrator, _) = orchestrator(&backend);

    orchestrator.start_run().await.unwrap_err();
    orchestrator.dismiss_error();

    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.stage, PipelineStage::Idle);
    assert!(snapshot.error.is_none());
    assert!(orchestrator.retry_run().await.is_err());
}

#[tokio::test]
async fn dismissing_a_non_retryable_failure_still_requires_new_media() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .then_transcript("")
            .then_transcript(NEWTON)
            .then_structured(STRUCTURED)
            .then_notes(NOTES),
    );
    let (orchestrator, _) = orchestrator(&backend);

    assert!(!orchestrator.start_run().await.unwrap_err().retryable);
    orchestrator.dismiss_error();
    assert_eq!(orchestrator.snapshot().stage, PipelineStage::Idle);

    let refused = orchestrator.start_run().await.unwrap_err();
    assert!(!refused.retryable);
    assert_eq!(backend.count(is_transcribe), 1);

    orchestrator.load_media(lecture()).unwrap();
    assert!(orchestrator.start_run().await.is_ok());
    assert_eq!(backend.count(is_transcribe), 2);
}

#[tokio::test(start_paused = true)]
async fn progress_climbs_while_a_stage_runs_and_resets_for_the_next() {
    let transcribed = Arc::new(Notify::new());
    let summarized = Arc::new(Notify::new());
    let backend = Arc::new(
        ScriptedBackend::succeeding(NEWTON, STRUCTURED, NOTES)
            .with_gate(Arc::clone(&transcribed))
            .with_structured_gate(Arc::clone(&summarized)),
    );
    let (orchestrator, _) = orchestrator(&backend);
    let orchestrator = Arc::new(orchestrator);

    let mut updates = orchestrator.subscribe();
    let running = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move { orchestrator.start_run().await }
    });
    updates
        .wait_for(|s| s.stage == PipelineStage::Transcribing)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;
    let early = orchestrator.snapshot().progress;
    tokio::time::sleep(Duration::from_secs(3)).await;
    let later = orchestrator.snapshot().progress;
    assert!(early > 0, "progress should move while transcribing");
    assert!(later > early);
    assert!(later < 100);

    transcribed.notify_one();
    let entered = updates
        .wait_for(|s| s.stage == PipelineStage::SummarizingStructured)
        .await
        .unwrap()
        .clone();
    assert_eq!(entered.progress, 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    let summarizing = orchestrator.snapshot().progress;
    assert!(summarizing > 0 && summarizing < 100);

    summarized.notify_one();
    running.await.unwrap().unwrap();
    let done = orchestrator.snapshot();
    assert_eq!(done.stage, PipelineStage::Completed);
    assert_eq!(done.progress, 100);
}
