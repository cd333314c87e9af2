//! Staging and upload lifecycle for one image-picking session.
//!
//! Commands go in through [`UploadOrchestrator`] methods; state comes out as
//! [`SessionSnapshot`] values, either on demand or through a `watch` channel.

use futures::StreamExt;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::{ApiError, ClientError};
use crate::models::{CandidateFile, FilePart, ImageUploadResponse, StagedFile, UploadResult};
use crate::services::file_policy::{validate_batch, FileValidation};
use crate::services::preview::PreviewRegistry;
use crate::services::transport::{Transport, UploadEvent, UploadEvents};

/// Seam between the session and whatever carries the bytes.
pub trait ImageUploader: Send + Sync {
    fn upload_images(
        &self,
        menu_id: &str,
        files: Vec<FilePart>,
        cancel: CancellationToken,
    ) -> UploadEvents<ImageUploadResponse>;
}

impl ImageUploader for Transport {
    fn upload_images(
        &self,
        menu_id: &str,
        files: Vec<FilePart>,
        cancel: CancellationToken,
    ) -> UploadEvents<ImageUploadResponse> {
        let path = format!("/api/menus/{}/images", urlencoding::encode(menu_id));
        self.upload_multipart(&path, "files", files, cancel)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Staged,
    Uploading,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagedFileInfo {
    pub name: String,
    pub media_type: String,
    pub size: u64,
}

/// Point-in-time view of the session; `files[i]` is previewed by `previews[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub files: Vec<StagedFileInfo>,
    pub previews: Vec<String>,
    pub results: Vec<UploadResult>,
    pub uploading: bool,
    pub progress: u8,
    pub error: Option<String>,
}

#[derive(Default)]
struct SessionState {
    staged: Vec<StagedFile>,
    results: Vec<UploadResult>,
    uploading: bool,
    progress: u8,
    error: Option<String>,
    completed: bool,
    in_flight: Option<CancellationToken>,
    /// Bumped by every upload start and reset; an upload may only settle
    /// into the generation it started in.
    generation: u64,
}

impl SessionState {
    fn phase(&self) -> SessionPhase {
        if self.uploading {
            SessionPhase::Uploading
        } else if self.staged.is_empty() {
            SessionPhase::Idle
        } else if self.completed {
            SessionPhase::Completed
        } else {
            SessionPhase::Staged
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase(),
            files: self
                .staged
                .iter()
                .map(|f| StagedFileInfo {
                    name: f.name().to_string(),
                    media_type: f.media_type().to_string(),
                    size: f.size(),
                })
                .collect(),
            previews: self.staged.iter().map(|f| f.preview().url()).collect(),
            results: self.results.clone(),
            uploading: self.uploading,
            progress: self.progress,
            error: self.error.clone(),
        }
    }
}

pub struct UploadOrchestrator {
    uploader: Arc<dyn ImageUploader>,
    previews: PreviewRegistry,
    state: Mutex<SessionState>,
    snapshots: watch::Sender<SessionSnapshot>,
}

impl UploadOrchestrator {
    pub fn new(uploader: Arc<dyn ImageUploader>, previews: PreviewRegistry) -> Self {
        let state = SessionState::default();
        let (snapshots, _) = watch::channel(state.snapshot());
        Self {
            uploader,
            previews,
            state: Mutex::new(state),
            snapshots,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, state: &SessionState) {
        self.snapshots.send_replace(state.snapshot());
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    /// Copies of the staged payloads, e.g. for creating a menu from them.
    pub fn staged_files(&self) -> Vec<CandidateFile> {
        self.lock()
            .staged
            .iter()
            .map(|f| CandidateFile::new(f.name(), f.media_type(), f.data().clone()))
            .collect()
    }

    /// Stage a batch. A rejected batch leaves the session untouched and the
    /// reason is returned in the validation result.
    pub fn add_files(&self, files: Vec<CandidateFile>) -> FileValidation {
        let mut state = self.lock();
        if state.uploading {
            return FileValidation::rejected("Cannot add files while an upload is in progress");
        }

        let validation = validate_batch(state.staged.len(), &files);
        if !validation.valid {
            tracing::warn!(
                staged = state.staged.len(),
                incoming = files.len(),
                error = validation.error.as_deref().unwrap_or_default(),
                "Rejected file batch"
            );
            return validation;
        }

        for file in files {
            let preview = self.previews.create(file.data.clone());
            state.staged.push(StagedFile::new(file, preview));
        }
        state.error = None;

        tracing::debug!(staged = state.staged.len(), "Files staged");
        self.publish(&state);
        validation
    }

    pub fn remove_file(&self, index: usize) -> Result<(), ClientError> {
        let mut state = self.lock();
        if state.uploading {
            return Err(ClientError::UploadInProgress);
        }
        if index >= state.staged.len() {
            return Err(ClientError::IndexOutOfRange {
                index,
                len: state.staged.len(),
            });
        }

        let (_, preview) = state.staged.remove(index).into_parts();
        self.previews.release(preview);

        self.publish(&state);
        Ok(())
    }

    /// Swap the file at `index` for `file`, validated as a one-file batch.
    pub fn replace_file(&self, index: usize, file: CandidateFile) -> Result<FileValidation, ClientError> {
        let mut state = self.lock();
        if state.uploading {
            return Err(ClientError::UploadInProgress);
        }
        if index >= state.staged.len() {
            return Err(ClientError::IndexOutOfRange {
                index,
                len: state.staged.len(),
            });
        }

        let validation = validate_batch(state.staged.len() - 1, std::slice::from_ref(&file));
        if !validation.valid {
            return Ok(validation);
        }

        let preview = self.previews.create(file.data.clone());
        let old = std::mem::replace(&mut state.staged[index], StagedFile::new(file, preview));
        let (_, old_preview) = old.into_parts();
        self.previews.release(old_preview);
        state.error = None;

        self.publish(&state);
        Ok(validation)
    }

    /// Drop every staged file. Completed results are kept.
    pub fn clear_files(&self) -> Result<(), ClientError> {
        let mut state = self.lock();
        if state.uploading {
            return Err(ClientError::UploadInProgress);
        }

        self.release_staged(&mut state);
        state.error = None;
        state.completed = false;

        self.publish(&state);
        Ok(())
    }

    /// Back to the initial empty state, results included, from any state.
    ///
    /// An upload in flight is cancelled and its outcome is not recorded.
    pub fn reset(&self) {
        let mut state = self.lock();
        if let Some(cancel) = state.in_flight.take() {
            tracing::info!("Reset cancels the upload in flight");
            cancel.cancel();
        }

        self.release_staged(&mut state);
        let generation = state.generation + 1;
        *state = SessionState {
            generation,
            ..SessionState::default()
        };

        self.publish(&state);
    }

    /// Abort the upload in flight. Returns false when nothing was uploading.
    pub fn cancel(&self) -> bool {
        match self.lock().in_flight.as_ref() {
            Some(cancel) => {
                cancel.cancel();
                true
            }
            None => false,
        }
    }

    fn release_staged(&self, state: &mut SessionState) {
        for staged in state.staged.drain(..) {
            let (_, preview) = staged.into_parts();
            self.previews.release(preview);
        }
    }

    /// Upload every staged file to `menu_id`.
    ///
    /// Failures are recorded in the session and returned. Staged files are
    /// kept either way; call [`clear_files`](Self::clear_files) to drop them.
    pub async fn upload(&self, menu_id: &str) -> Result<Vec<UploadResult>, ClientError> {
        let (parts, cancel, generation) = {
            let mut state = self.lock();
            if state.uploading {
                return Err(ClientError::UploadInProgress);
            }
            if state.staged.is_empty() {
                return Err(ClientError::NothingToUpload);
            }

            let cancel = CancellationToken::new();
            state.uploading = true;
            state.progress = 0;
            state.error = None;
            state.completed = false;
            state.in_flight = Some(cancel.clone());
            state.generation += 1;

            let parts: Vec<FilePart> = state.staged.iter().map(StagedFile::to_part).collect();
            self.publish(&state);
            (parts, cancel, state.generation)
        };

        tracing::info!(menu_id = %menu_id, file_count = parts.len(), "Uploading staged files");

        let mut guard = InFlightGuard {
            session: self,
            generation,
            cancel: cancel.clone(),
            armed: true,
        };

        let mut events = self.uploader.upload_images(menu_id, parts, cancel);
        let mut outcome = None;
        while let Some(event) = events.next().await {
            match event {
                UploadEvent::Progress(progress) => self.record_progress(generation, progress),
                UploadEvent::Completed(response) => {
                    outcome = Some(Ok(response.images));
                    break;
                }
                UploadEvent::Failed(error) => {
                    outcome = Some(Err(error));
                    break;
                }
            }
        }

        guard.armed = false;
        let outcome = outcome
            .unwrap_or_else(|| Err(ApiError::network("Upload ended without a response")));

        match outcome {
            Ok(images) => {
                tracing::info!(menu_id = %menu_id, uploaded = images.len(), "Upload completed");
                self.settle(generation, |state| {
                    state.progress = 100;
                    state.results.extend(images.iter().cloned());
                    state.completed = true;
                });
                Ok(images)
            }
            Err(error) => {
                tracing::error!(menu_id = %menu_id, error = %error, code = ?error.code, "Upload failed");
                let message = error.message.clone();
                self.settle(generation, |state| {
                    state.progress = 0;
                    state.error = Some(message);
                });
                Err(ClientError::Api(error))
            }
        }
    }

    fn record_progress(&self, generation: u64, progress: u8) {
        let mut state = self.lock();
        if state.generation != generation || !state.uploading {
            return;
        }
        let progress = progress.min(100);
        if progress > state.progress {
            state.progress = progress;
            self.publish(&state);
        }
    }

    /// Leave the uploading state, unless a reset already moved on.
    fn settle<F: FnOnce(&mut SessionState)>(&self, generation: u64, apply: F) {
        let mut state = self.lock();
        if state.generation != generation {
            tracing::debug!("Discarding outcome of a superseded upload");
            return;
        }
        state.uploading = false;
        state.in_flight = None;
        apply(&mut state);
        self.publish(&state);
    }
}

impl Drop for UploadOrchestrator {
    fn drop(&mut self) {
        let mut state = self.lock();
        if let Some(cancel) = state.in_flight.take() {
            cancel.cancel();
        }
        self.release_staged(&mut state);
    }
}

/// Settles the session as cancelled if the `upload` future is dropped
/// before the transport reports an outcome.
struct InFlightGuard<'a> {
    session: &'a UploadOrchestrator,
    generation: u64,
    cancel: CancellationToken,
    armed: bool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.cancel.cancel();
        self.session.settle(self.generation, |state| {
            state.progress = 0;
            state.error = Some("Upload cancelled".to_string());
        });
    }
}
