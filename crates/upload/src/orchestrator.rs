//! Upload orchestrator.
//!
//! Runs the session state machine for one source file:
//! `Planning -> Initiating | Resuming -> Transferring -> Completing -> Done`,
//! with `Aborting -> Aborted` on cancellation and `Failed` on any other error.
//! Parts are uploaded strictly one at a time in ascending order, and the
//! session is saved before the next part is requested.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use ferry_control_plane::{ControlPlane, ControlPlaneError};
use ferry_protocol::{
    CompletedPart, InitiateRequest, STALENESS_WINDOW, UploadProgress, UploadSession,
};
use ferry_session_store::SessionStore;
use ferry_transfer::{
    ChunkPlan, PartReader, PartTransport, PolicyViolation, RetryConfig, RetryError,
    RetryingPartUploader, UploadPolicy, progress_for,
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::controller::UploadController;
use crate::error::{UploadError, ValidationError};
use crate::types::{SessionSnapshot, UploadOptions, UploadOutcome, UploadState};

/// Drives resumable uploads against a control plane, a part transport and a
/// session store.
///
/// Cheap to clone; every clone shares the same collaborators. The caller must
/// not run two uploads for the same record id at once.
#[derive(Clone)]
pub struct UploadOrchestrator {
    control: Arc<dyn ControlPlane>,
    transport: Arc<dyn PartTransport>,
    store: Arc<dyn SessionStore>,
    retry: RetryConfig,
    policy: UploadPolicy,
}

impl UploadOrchestrator {
    pub fn new(
        control: Arc<dyn ControlPlane>,
        transport: Arc<dyn PartTransport>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            control,
            transport,
            store,
            retry: RetryConfig::default(),
            policy: UploadPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_policy(mut self, policy: UploadPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Spawns the upload of `source` and returns a controller for it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, source: impl Into<PathBuf>, options: UploadOptions) -> UploadController {
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(None);
        let this = self.clone();
        let source = source.into();
        let token = cancel.clone();

        let handle =
            tokio::spawn(async move { this.drive(&source, options, &token, &state_tx).await });

        UploadController::new(handle, cancel, state_rx)
    }

    /// Runs the upload of `source` on the current task.
    pub async fn run(
        &self,
        source: &Path,
        options: UploadOptions,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome, UploadError> {
        let (state_tx, _state_rx) = watch::channel(None);
        self.drive(source, options, cancel, &state_tx).await
    }

    async fn drive(
        &self,
        source: &Path,
        options: UploadOptions,
        cancel: &CancellationToken,
        state_tx: &watch::Sender<Option<SessionSnapshot>>,
    ) -> Result<UploadOutcome, UploadError> {
        let mut run = Run {
            control: self.control.as_ref(),
            store: self.store.as_ref(),
            policy: &self.policy,
            uploader: RetryingPartUploader::new(self.transport.clone(), self.retry.clone()),
            options,
            cancel,
            state_tx,
            state: UploadState::Planning,
            session: None,
            progress: None,
        };

        let result = run.execute(source).await;
        match &result {
            Ok(_) => {}
            Err(UploadError::Cancelled) => {
                if run.state != UploadState::Aborted {
                    run.publish(UploadState::Aborted);
                }
            }
            Err(e) => {
                warn!(
                    record_id = run.options.record_id.as_str(),
                    error = %e,
                    resumable = e.is_resumable(),
                    "upload failed"
                );
                run.publish(UploadState::Failed);
            }
        }
        result
    }

    // -----------------------------------------------------------------------
    // Resumable-upload accessors
    // -----------------------------------------------------------------------

    /// Returns `true` if a non-stale session is persisted for `record_id`.
    pub async fn has_resumable_upload(&self, record_id: &str) -> Result<bool, UploadError> {
        Ok(self.store.load(record_id).await?.is_some())
    }

    /// The persisted session for `record_id`, suitable for
    /// [`UploadOptions::resume_from`].
    pub async fn load_resumable(&self, record_id: &str) -> Result<Option<UploadSession>, UploadError> {
        Ok(self.store.load(record_id).await?)
    }

    /// Progress already covered by the persisted session for `record_id`.
    pub async fn upload_progress(&self, record_id: &str) -> Result<Option<UploadProgress>, UploadError> {
        Ok(self
            .store
            .load(record_id)
            .await?
            .map(|session| persisted_progress(&session)))
    }

    /// Every resumable session, sorted by record id.
    pub async fn resumable_uploads(&self) -> Result<Vec<(String, UploadSession)>, UploadError> {
        Ok(self.store.list_all().await?)
    }

    /// Permanently cancels a session that is not running: releases the
    /// server-side object and removes the record.
    ///
    /// Returns `false` if nothing was persisted for `record_id`.
    pub async fn discard(&self, record_id: &str) -> Result<bool, UploadError> {
        let Some(session) = self.store.load(record_id).await? else {
            return Ok(false);
        };

        if let Err(e) = self
            .control
            .abort(&session.session_id, &session.object_key)
            .await
        {
            warn!(record_id, session_id = %session.session_id, error = %e, "abort failed while discarding");
        }
        self.store.delete(record_id).await?;

        info!(record_id, session_id = %session.session_id, "resumable session discarded");
        Ok(true)
    }
}

/// Progress covered by a persisted session, as reported to a resuming caller.
pub fn persisted_progress(session: &UploadSession) -> UploadProgress {
    let current = session
        .completed_part_numbers()
        .last()
        .copied()
        .unwrap_or(0);
    match ChunkPlan::for_file(session.file_size) {
        Ok(plan) => progress_for(session, &plan, current),
        Err(_) => UploadProgress::new(current, session.total_parts, 0, session.file_size),
    }
}

/// State of one in-progress run.
struct Run<'a> {
    control: &'a dyn ControlPlane,
    store: &'a dyn SessionStore,
    policy: &'a UploadPolicy,
    uploader: RetryingPartUploader,
    options: UploadOptions,
    cancel: &'a CancellationToken,
    state_tx: &'a watch::Sender<Option<SessionSnapshot>>,
    state: UploadState,
    /// Last published copy of the session, for snapshots only.
    session: Option<UploadSession>,
    progress: Option<UploadProgress>,
}

impl Run<'_> {
    async fn execute(&mut self, source: &Path) -> Result<UploadOutcome, UploadError> {
        self.publish(UploadState::Planning);
        let (source, plan) = self.plan(source).await?;
        let source_ref = source.to_string_lossy().into_owned();

        let mut session = match self.options.resume_from.take() {
            Some(previous) => self.resume(previous, &source_ref, &plan)?,
            None => self.initiate(source_ref, &plan).await?,
        };

        match self.transfer(&mut session, &source, &plan).await {
            Ok(()) => {}
            Err(UploadError::Cancelled) => {
                self.abort(&session).await;
                return Err(UploadError::Cancelled);
            }
            Err(e) => return Err(e),
        }

        self.complete(session).await
    }

    /// Checks the source and the policy. Makes no network call.
    ///
    /// Returns the canonical source path, which identifies the source in the
    /// session and is the path every part is read from.
    async fn plan(&mut self, source: &Path) -> Result<(PathBuf, ChunkPlan), UploadError> {
        let unavailable = |e| ValidationError::SourceUnavailable {
            path: source.to_path_buf(),
            source: e,
        };
        let source = tokio::fs::canonicalize(source).await.map_err(unavailable)?;
        let meta = tokio::fs::metadata(&source).await.map_err(unavailable)?;
        if !meta.is_file() {
            return Err(ValidationError::NotAFile(source).into());
        }

        let file_size = meta.len();
        self.policy
            .validate(self.options.kind, file_size, &self.options.content_type)
            .map_err(ValidationError::from)?;

        let plan = ChunkPlan::for_file(file_size)
            .map_err(|_| ValidationError::Policy(PolicyViolation::EmptyFile))?;

        debug!(
            record_id = self.options.record_id.as_str(),
            file_size,
            total_parts = plan.total_parts(),
            source = %source.display(),
            "upload planned"
        );
        Ok((source, plan))
    }

    fn resume(
        &mut self,
        previous: UploadSession,
        source_ref: &str,
        plan: &ChunkPlan,
    ) -> Result<UploadSession, UploadError> {
        self.publish(UploadState::Resuming);

        if previous.is_stale_at(Utc::now(), STALENESS_WINDOW) {
            return Err(UploadError::ResumeMismatch(format!(
                "session {} is older than {} hours",
                previous.session_id,
                STALENESS_WINDOW.as_secs() / 3600
            )));
        }
        if previous.source_ref != source_ref {
            return Err(UploadError::ResumeMismatch(format!(
                "source {source_ref} does not match session source {}",
                previous.source_ref
            )));
        }
        if previous.file_size != plan.file_size() {
            return Err(UploadError::ResumeMismatch(format!(
                "file is {} bytes, session expects {}",
                plan.file_size(),
                previous.file_size
            )));
        }
        if previous.kind != self.options.kind {
            return Err(UploadError::ResumeMismatch(format!(
                "kind {} does not match session kind {}",
                self.options.kind, previous.kind
            )));
        }
        if previous.total_parts != plan.total_parts() {
            return Err(UploadError::ResumeMismatch(format!(
                "session has {} parts, plan has {}",
                previous.total_parts,
                plan.total_parts()
            )));
        }
        previous
            .validate()
            .map_err(|e| UploadError::ResumeMismatch(e.to_string()))?;

        info!(
            record_id = self.options.record_id.as_str(),
            session_id = %previous.session_id,
            completed = previous.completed_count(),
            total_parts = previous.total_parts,
            "resuming upload session"
        );
        self.session = Some(previous.clone());
        Ok(previous)
    }

    async fn initiate(
        &mut self,
        source_ref: String,
        plan: &ChunkPlan,
    ) -> Result<UploadSession, UploadError> {
        self.publish(UploadState::Initiating);
        self.check_cancelled()?;

        let request = InitiateRequest {
            kind: self.options.kind,
            file_size: plan.file_size(),
            content_type: self.options.content_type.clone(),
            file_name: self.options.file_name.clone(),
        };
        let response = self
            .control
            .initiate(&request)
            .await
            .map_err(|e| UploadError::control(None, e))?;

        let session = UploadSession::new(
            response.session_id,
            response.object_key,
            source_ref,
            plan.file_size(),
            request.content_type,
            request.kind,
            plan.total_parts(),
        );
        if let Err(e) = self.store.save(&self.options.record_id, &session).await {
            warn!(
                record_id = self.options.record_id.as_str(),
                session_id = %session.session_id,
                error = %e,
                "session could not be saved after initiate, aborting object"
            );
            if let Err(abort_err) = self
                .control
                .abort(&session.session_id, &session.object_key)
                .await
            {
                warn!(session_id = %session.session_id, error = %abort_err, "abort failed");
            }
            return Err(UploadError::NotPersisted(e));
        }

        info!(
            record_id = self.options.record_id.as_str(),
            session_id = %session.session_id,
            object_key = %session.object_key,
            total_parts = session.total_parts,
            "upload session initiated"
        );
        self.session = Some(session.clone());
        Ok(session)
    }

    async fn transfer(
        &mut self,
        session: &mut UploadSession,
        source: &Path,
        plan: &ChunkPlan,
    ) -> Result<(), UploadError> {
        self.publish(UploadState::Transferring);

        if session.completed_count() > 0 {
            self.emit_progress(session, plan, 0);
        }

        let mut reader = PartReader::open(source).await.map_err(UploadError::read)?;
        if reader.file_size() != plan.file_size() {
            return Err(UploadError::SourceChanged {
                expected: plan.file_size(),
                actual: reader.file_size(),
            });
        }

        for range in plan.parts() {
            let part_number = range.part_number;
            if session.contains_part(part_number) {
                self.emit_progress(session, plan, part_number);
                continue;
            }

            self.check_cancelled()?;

            let destination = tokio::select! {
                _ = self.cancel.cancelled() => return Err(UploadError::Cancelled),
                r = self.control.part_destination(&session.session_id, &session.object_key, part_number) => {
                    r.map_err(|e| UploadError::control(Some(part_number), e))?
                }
            };

            let body = tokio::select! {
                _ = self.cancel.cancelled() => return Err(UploadError::Cancelled),
                r = reader.read_part(&range) => r.map_err(UploadError::read)?,
            };

            let integrity_tag = match self
                .uploader
                .upload(&destination, body, &session.content_type, self.cancel)
                .await
            {
                Ok(tag) => tag,
                Err(RetryError::Cancelled) => return Err(UploadError::Cancelled),
                Err(RetryError::Exhausted { attempts, source }) => {
                    return Err(UploadError::PartUploadFailed {
                        part_number,
                        attempts,
                        source,
                    });
                }
            };

            session.record_part(CompletedPart {
                part_number,
                integrity_tag,
            })?;
            // Runs to completion; cancellation is observed before the next part.
            self.store.save(&self.options.record_id, session).await?;

            debug!(
                record_id = self.options.record_id.as_str(),
                part = part_number,
                total_parts = session.total_parts,
                "part uploaded"
            );
            self.session = Some(session.clone());
            self.emit_progress(session, plan, part_number);
        }

        Ok(())
    }

    async fn complete(&mut self, session: UploadSession) -> Result<UploadOutcome, UploadError> {
        self.publish(UploadState::Completing);

        let parts = session.sorted_parts();
        let object_key = self
            .control
            .complete(&session.session_id, &session.object_key, &parts)
            .await
            .map_err(|e| match e {
                ControlPlaneError::Unauthorized(message) => UploadError::Authentication {
                    message,
                    session_kept: true,
                },
                other => UploadError::Finalization(other),
            })?;

        let record_id = self.options.record_id.as_str();
        if let Err(e) = self.store.delete(record_id).await {
            warn!(record_id, error = %e, "finalized session could not be removed");
        }
        info!(record_id, object_key = %object_key, parts = parts.len(), "upload finalized");

        self.publish(UploadState::Done);
        Ok(UploadOutcome {
            object_key,
            final_session: session,
        })
    }

    /// Best-effort release of the server-side object, then removal of the record.
    async fn abort(&mut self, session: &UploadSession) {
        self.publish(UploadState::Aborting);
        let record_id = self.options.record_id.as_str();

        match self
            .control
            .abort(&session.session_id, &session.object_key)
            .await
        {
            Ok(()) => info!(record_id, session_id = %session.session_id, "upload cancelled, object aborted"),
            Err(e) => warn!(record_id, session_id = %session.session_id, error = %e, "abort failed after cancel"),
        }
        if let Err(e) = self.store.delete(record_id).await {
            warn!(record_id, error = %e, "cancelled session could not be removed");
        }

        self.publish(UploadState::Aborted);
    }

    fn emit_progress(&mut self, session: &UploadSession, plan: &ChunkPlan, current_part: u32) {
        let progress = progress_for(session, plan, current_part);
        if let Some(callback) = &self.options.on_progress {
            callback(progress.clone());
        }
        self.progress = Some(progress);
        self.publish(self.state);
    }

    fn publish(&mut self, state: UploadState) {
        self.state = state;
        self.state_tx.send_replace(Some(SessionSnapshot {
            state,
            session: self.session.clone(),
            progress: self.progress.clone(),
        }));
    }

    fn check_cancelled(&self) -> Result<(), UploadError> {
        if self.cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }
        Ok(())
    }
}
