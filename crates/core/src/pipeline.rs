use std::{
    future::Future,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::sync::watch;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    client::GenerationBackend,
    config::Config,
    error::{KonspektError, Result},
    history::HistoryStore,
    progress::ProgressTicker,
    prompts::{TRANSCRIPTION_INSTRUCTIONS, detailed_notes_prompt, study_guide_prompt},
    schema::study_guide_schema,
    types::{EncodedMedia, HistoryEntry, StructuredNotes, StudyMaterials},
};

pub const NETWORK_ERROR_MESSAGE: &str =
    "Network error: could not reach the generation service. Check your connection and try again.";

/// Substrings of transport-level failures, matched case-insensitively.
const NETWORK_MARKERS: &[&str] = &[
    "error sending request",
    "tcp connect error",
    "connection refused",
    "connection reset",
    "connection closed",
    "dns error",
    "failed to lookup address",
    "network is unreachable",
    "operation timed out",
    "failed to fetch",
    "networkerror",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PipelineStage {
    #[default]
    Idle,
    Transcribing,
    SummarizingStructured,
    ComposingDetailedNotes,
    Completed,
    Failed,
}

impl PipelineStage {
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            PipelineStage::Transcribing
                | PipelineStage::SummarizingStructured
                | PipelineStage::ComposingDetailedNotes
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Transcribing => "transcribing",
            PipelineStage::SummarizingStructured => "summarizing",
            PipelineStage::ComposingDetailedNotes => "composing notes",
            PipelineStage::Completed => "completed",
            PipelineStage::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineError {
    pub message: String,
    pub retryable: bool,
}

/// What observers see of the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct PipelineSnapshot {
    pub run_id: Option<Uuid>,
    pub stage: PipelineStage,
    /// 0..=100; simulated while a stage call is outstanding.
    pub progress: u8,
    pub filename: Option<String>,
    pub materials: Option<Arc<StudyMaterials>>,
    pub saved_entry: Option<u64>,
    pub error: Option<PipelineError>,
}

/// Map a failure to the message and retry policy shown to the user.
pub fn classify(err: &KonspektError) -> PipelineError {
    let retryable = match err {
        KonspektError::EmptyTranscript
        | KonspektError::Configuration { .. }
        | KonspektError::Read { .. }
        | KonspektError::Export { .. }
        | KonspektError::Busy
        | KonspektError::NotRetryable => false,
        _ => true,
    };

    let message = err.to_string();
    if retryable && is_network_failure(&message) {
        return PipelineError {
            message: NETWORK_ERROR_MESSAGE.to_string(),
            retryable: true,
        };
    }

    PipelineError { message, retryable }
}

pub fn is_network_failure(message: &str) -> bool {
    let message = message.to_lowercase();
    NETWORK_MARKERS.iter().any(|marker| message.contains(marker))
}

/// Clears the in-flight flag on every exit path, including a dropped run.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives the transcribe → structured summary → detailed notes workflow.
///
/// One orchestrator exists per session. Presentation code calls the command
/// methods and follows state changes through [`Orchestrator::subscribe`].
pub struct Orchestrator {
    backend: Arc<dyn GenerationBackend>,
    config: Config,
    history: Mutex<HistoryStore>,
    media: Mutex<Option<Arc<EncodedMedia>>>,
    state: Arc<watch::Sender<PipelineSnapshot>>,
    in_flight: AtomicBool,
    /// Set by a non-retryable failure; only new media clears it.
    awaiting_media: AtomicBool,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn GenerationBackend>, config: Config, history: HistoryStore) -> Self {
        let (state, _) = watch::channel(PipelineSnapshot::default());
        Self {
            backend,
            config,
            history: Mutex::new(history),
            media: Mutex::new(None),
            state: Arc::new(state),
            in_flight: AtomicBool::new(false),
            awaiting_media: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        self.state.borrow().clone()
    }

    pub fn media(&self) -> Option<Arc<EncodedMedia>> {
        self.media.lock().expect("media slot poisoned").clone()
    }

    /// Replace the media used by the next run.
    pub fn load_media(&self, media: EncodedMedia) -> Result<()> {
        if self.in_flight.load(Ordering::Acquire) {
            return Err(KonspektError::Busy);
        }

        let filename = media.filename.clone();
        *self.media.lock().expect("media slot poisoned") = Some(Arc::new(media));
        self.awaiting_media.store(false, Ordering::Release);

        self.state.send_modify(|s| {
            s.filename = Some(filename);
            s.error = None;
            if s.stage == PipelineStage::Failed {
                s.stage = PipelineStage::Idle;
            }
        });
        Ok(())
    }

    pub fn dismiss_error(&self) {
        self.state.send_if_modified(|s| {
            if s.stage != PipelineStage::Failed {
                return false;
            }
            s.stage = PipelineStage::Idle;
            s.error = None;
            true
        });
    }

    /// Run the full pipeline against the loaded media.
    ///
    /// Rejected while another run is in flight, or when the last failure was
    /// not retryable and no new media has been loaded since.
    pub async fn start_run(&self) -> std::result::Result<Arc<StudyMaterials>, PipelineError> {
        if self.awaiting_media.load(Ordering::Acquire) {
            tracing::debug!("start refused until new media is loaded");
            return Err(classify(&KonspektError::NotRetryable));
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(classify(&KonspektError::Busy));
        }
        let _guard = RunGuard(&self.in_flight);

        if let Err(e) = self.config.require_api_key() {
            return Err(self.fail(e));
        }
        let Some(media) = self.media() else {
            return Err(self.fail(KonspektError::NotReady));
        };

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", %run_id, filename = %media.filename);
        self.execute(run_id, media).instrument(span).await
    }

    /// Re-run from the first stage with the same media after a retryable failure.
    pub async fn retry_run(&self) -> std::result::Result<Arc<StudyMaterials>, PipelineError> {
        match self.snapshot().error {
            Some(error) if error.retryable => {
                tracing::info!(previous = %error.message, "retrying run");
                self.start_run().await
            }
            _ => Err(classify(&KonspektError::NotRetryable)),
        }
    }

    async fn execute(
        &self,
        run_id: Uuid,
        media: Arc<EncodedMedia>,
    ) -> std::result::Result<Arc<StudyMaterials>, PipelineError> {
        self.state.send_modify(|s| {
            *s = PipelineSnapshot {
                run_id: Some(run_id),
                filename: Some(media.filename.clone()),
                ..PipelineSnapshot::default()
            };
        });

        let transcript = self
            .run_stage(
                PipelineStage::Transcribing,
                self.backend.transcribe(&media, TRANSCRIPTION_INSTRUCTIONS),
            )
            .await
            .map_err(|e| self.fail(e))?;

        if transcript.trim().is_empty() {
            return Err(self.fail(KonspektError::EmptyTranscript));
        }
        tracing::info!(chars = transcript.len(), "transcript ready");

        let prompt = study_guide_prompt(&transcript);
        let schema = study_guide_schema();
        let structured = self
            .run_stage(
                PipelineStage::SummarizingStructured,
                self.backend.generate_structured(&prompt, &schema),
            )
            .await
            .and_then(|value| {
                serde_json::from_value::<StructuredNotes>(value).map_err(|e| {
                    KonspektError::MalformedResponse {
                        reason: e.to_string(),
                    }
                })
            })
            .map_err(|e| self.fail(e))?;

        let prompt = detailed_notes_prompt(&transcript);
        let detailed_notes = self
            .run_stage(
                PipelineStage::ComposingDetailedNotes,
                self.backend.generate_text(&prompt),
            )
            .await
            .map_err(|e| self.fail(e))?;

        let materials = Arc::new(StudyMaterials::assemble(
            transcript,
            structured,
            detailed_notes,
        ));
        self.complete(&media.filename, Arc::clone(&materials));
        Ok(materials)
    }

    async fn run_stage<T>(
        &self,
        stage: PipelineStage,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        self.state.send_modify(|s| {
            s.stage = stage;
            s.progress = 0;
        });
        tracing::info!(stage = stage.label(), "stage started");

        let state = Arc::clone(&self.state);
        let ticker = ProgressTicker::start(&self.config.progress, move |progress| {
            state.send_if_modified(|s| {
                if s.stage != stage || progress <= s.progress {
                    return false;
                }
                s.progress = progress;
                true
            });
        });

        let result = call.await;
        ticker.stop();

        if result.is_ok() {
            self.state.send_modify(|s| s.progress = 100);
            tracing::info!(stage = stage.label(), "stage finished");
        }
        result
    }

    fn complete(&self, filename: &str, materials: Arc<StudyMaterials>) {
        let saved = self
            .history
            .lock()
            .expect("history poisoned")
            .append(filename, (*materials).clone());

        let saved_entry = match saved {
            Ok(entry) => Some(entry.id),
            Err(e) => {
                tracing::warn!(error = %e, "run completed but could not be saved to history");
                None
            }
        };

        self.state.send_modify(|s| {
            s.stage = PipelineStage::Completed;
            s.progress = 100;
            s.materials = Some(materials);
            s.saved_entry = saved_entry;
            s.error = None;
        });
        tracing::info!("run completed");
    }

    fn fail(&self, err: KonspektError) -> PipelineError {
        let error = classify(&err);
        tracing::warn!(error = %err, retryable = error.retryable, "run failed");
        if !error.retryable {
            self.awaiting_media.store(true, Ordering::Release);
        }

        let published = error.clone();
        self.state.send_modify(|s| {
            s.stage = PipelineStage::Failed;
            s.progress = 0;
            s.materials = None;
            s.saved_entry = None;
            s.error = Some(published);
        });
        error
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.lock().expect("history poisoned").list().to_vec()
    }

    pub fn history_entry(&self, id: u64) -> Option<HistoryEntry> {
        self.history
            .lock()
            .expect("history poisoned")
            .get(id)
            .cloned()
    }

    pub fn delete_history_entry(&self, id: u64) -> Result<bool> {
        self.history.lock().expect("history poisoned").remove(id)
    }
}
