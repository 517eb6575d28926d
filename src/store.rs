// Gallery store
// Single owner of `GalleryState`. Actions go through `dispatch`, which runs the reducer,
// hands committed deletions to the worker and persists stats that changed.

use crate::config::AppConfig;
use crate::core::achievements::{check_achievements, initialize_achievements, merge_with_catalog};
use crate::core::analysis::{analyze_batch, smart_suggestions};
use crate::core::filters::{FilterType, apply_filter, filter_counts};
use crate::core::gallery::{GalleryAction, GalleryEffect, GalleryState, reduce};
use crate::core::photo::{PermissionStatus, Photo, PhotoDecision, SessionStats, StatsPatch};
use crate::services::deletion::{DeletionError, DeletionIntent, DeletionOutcome, DeletionWorker};
use crate::services::media::{MediaError, MediaSource, PhotoPage};
use crate::services::permissions::PermissionGate;
use crate::services::storage::Storage;
use chrono::{Local, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;

pub trait Clock: Send + Sync {
    /// Epoch milliseconds.
    fn now_ms(&self) -> i64;
    /// Calendar day used for streaks.
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// What was left of the deletion queue when the store closed.
#[derive(Debug, Default)]
pub struct CloseReport {
    /// Outcomes nobody had polled yet.
    pub outcomes: Vec<DeletionOutcome>,
    /// Batches whose photos are still in the library.
    pub failed: Vec<DeletionIntent>,
}

pub struct GalleryStore {
    state: GalleryState,
    config: AppConfig,
    media: Arc<dyn MediaSource>,
    storage: Storage,
    permissions: Arc<dyn PermissionGate>,
    clock: Arc<dyn Clock>,
    worker: DeletionWorker,
    in_flight: usize,
    failed: Vec<DeletionIntent>,
    favorites: Vec<String>,
}

impl GalleryStore {
    /// Spawns the deletion worker, so this must run inside a tokio runtime.
    pub fn new(
        config: AppConfig,
        media: Arc<dyn MediaSource>,
        storage: Storage,
        permissions: Arc<dyn PermissionGate>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let worker = DeletionWorker::spawn(media.clone(), config.retry_policy());
        Self {
            state: GalleryState::new(),
            config,
            media,
            storage,
            permissions,
            clock,
            worker,
            in_flight: 0,
            failed: Vec::new(),
            favorites: Vec::new(),
        }
    }

    pub fn state(&self) -> &GalleryState {
        &self.state
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn dispatch(&mut self, action: GalleryAction) {
        let stats_before = self.state.stats.clone();
        let effects = reduce(&mut self.state, action, self.clock.now_ms());

        for effect in effects {
            match effect {
                GalleryEffect::CommitDeletion { photo_ids, bytes } => {
                    self.submit(DeletionIntent::new(photo_ids, bytes));
                }
            }
        }

        if self.state.stats != stats_before {
            self.storage.save_stats(&self.state.stats);
        }
    }

    fn submit(&mut self, intent: DeletionIntent) {
        match self.worker.submit(intent.clone()) {
            Ok(()) => self.in_flight += 1,
            Err(e) => {
                log::error!("Cannot queue deletion batch {}: {}", intent.batch_id, e);
                self.failed.push(intent);
            }
        }
    }

    // Persistence

    pub fn load_persisted_data(&mut self) {
        let streak = self.storage.current_streak();
        let patch = match self.storage.stats() {
            Some(stats) => StatsPatch {
                current_streak: Some(streak),
                ..StatsPatch::lifetime(&stats)
            },
            None => StatsPatch::streak(streak),
        };
        self.dispatch(GalleryAction::UpdateStats(patch));

        if let Some(photo_id) = self.storage.last_photo_id() {
            self.dispatch(GalleryAction::SetResumePhoto { photo_id });
        }

        let achievements = match self.storage.achievements() {
            Some(persisted) if !persisted.is_empty() => merge_with_catalog(persisted),
            _ => initialize_achievements(),
        };
        self.dispatch(GalleryAction::SetAchievements(achievements));

        self.favorites = self.storage.favorites();
        log::info!(
            "Loaded persisted data: {} lifetime deletions, streak {}",
            self.state.stats.lifetime_deleted,
            self.state.stats.current_streak
        );
    }

    // Permissions

    pub fn check_permissions(&mut self) -> PermissionStatus {
        let status = self.permissions.status();
        self.dispatch(GalleryAction::SetPermissionStatus(status));
        status
    }

    pub fn request_permissions(&mut self) -> bool {
        let status = self.permissions.request();
        self.dispatch(GalleryAction::SetPermissionStatus(status));
        status == PermissionStatus::Granted
    }

    // Photos

    async fn fetch_page(&self, cursor: Option<String>) -> Result<PhotoPage, MediaError> {
        let media = self.media.clone();
        let page_size = self.config.page_size;
        tokio::task::spawn_blocking(move || media.list_photos(page_size, cursor.as_deref()))
            .await
            .map_err(|e| MediaError::Io(std::io::Error::other(e)))?
    }

    /// Loads the first page and jumps to the resume photo when it is on it.
    pub async fn load_photos(&mut self) -> Result<(), MediaError> {
        self.dispatch(GalleryAction::SetLoading(true));

        let page = match self.fetch_page(None).await {
            Ok(page) => page,
            Err(e) => {
                log::error!("Error loading photos: {}", e);
                self.dispatch(GalleryAction::SetLoading(false));
                return Err(e);
            }
        };

        self.dispatch(GalleryAction::LoadPhotosSuccess {
            photos: page.items,
            cursor: page.next_cursor,
            has_more: page.has_more,
        });

        let resume_index = self
            .state
            .last_resume_photo_id
            .as_ref()
            .and_then(|id| self.state.photos.iter().position(|p| &p.id == id));
        if let Some(index) = resume_index {
            log::info!("Resuming at photo {}", index + 1);
            self.dispatch(GalleryAction::SetCurrentIndex(index));
        }
        Ok(())
    }

    /// Returns `false` when there was nothing to load.
    pub async fn load_more_photos(&mut self) -> Result<bool, MediaError> {
        if !self.state.has_more_photos || self.state.is_loading {
            return Ok(false);
        }
        let Some(cursor) = self.state.photo_cursor.clone() else {
            return Ok(false);
        };

        self.dispatch(GalleryAction::SetLoading(true));
        match self.fetch_page(Some(cursor)).await {
            Ok(page) => {
                self.dispatch(GalleryAction::LoadMorePhotos {
                    photos: page.items,
                    cursor: page.next_cursor,
                    has_more: page.has_more,
                });
                Ok(true)
            }
            Err(e) => {
                log::error!("Error loading more photos: {}", e);
                self.dispatch(GalleryAction::SetLoading(false));
                Err(e)
            }
        }
    }

    pub fn should_preload(&self) -> bool {
        let remaining = self.state.photos.len().saturating_sub(self.state.current_index);
        self.state.has_more_photos && !self.state.is_loading && remaining <= self.config.preload_threshold
    }

    // Decisions

    pub fn mark_photo(&mut self, photo_id: &str, decision: PhotoDecision) {
        self.dispatch(GalleryAction::MarkDecision {
            photo_id: photo_id.to_string(),
            decision,
        });
        self.save_resume_point();
    }

    pub fn undo_decision(&mut self, photo_id: &str) {
        self.dispatch(GalleryAction::UndoDecision {
            photo_id: photo_id.to_string(),
        });
    }

    pub fn undo_last_decision(&mut self) {
        self.dispatch(GalleryAction::UndoLastDecision);
        self.save_resume_point();
    }

    fn save_resume_point(&self) {
        match self.state.current_photo() {
            Some(photo) => self.storage.save_last_photo_id(&photo.id),
            None => self.storage.clear_last_photo_id(),
        }
    }

    /// Deletes the photos now and waits for the library to confirm.
    pub async fn execute_deletions(&mut self, photo_ids: Vec<String>) -> Result<(), MediaError> {
        if photo_ids.is_empty() {
            return Ok(());
        }

        let media = self.media.clone();
        let ids = photo_ids.clone();
        tokio::task::spawn_blocking(move || media.bulk_delete(&ids))
            .await
            .map_err(|e| MediaError::Io(std::io::Error::other(e)))?
            .inspect_err(|e| log::error!("Error deleting photos: {}", e))?;

        log::info!("Deleted {} photo(s)", photo_ids.len());
        self.dispatch(GalleryAction::ExecuteDeletionsSuccess {
            deleted_ids: photo_ids,
        });
        Ok(())
    }

    /// Deletes every photo still marked for deletion inside the undo window.
    pub async fn commit_pending_deletions(&mut self) -> Result<usize, MediaError> {
        let pending = self.state.pending_deletions();
        let count = pending.len();
        self.execute_deletions(pending).await?;
        Ok(count)
    }

    // Committed deletions

    fn record_outcome(&mut self, outcome: &DeletionOutcome) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if let DeletionOutcome::Failed { intent, .. } = outcome {
            self.failed.push(intent.clone());
        }
    }

    /// Outcomes reported since the last poll, without waiting.
    pub fn poll_deletions(&mut self) -> Vec<DeletionOutcome> {
        let outcomes = self.worker.drain_outcomes();
        for outcome in &outcomes {
            self.record_outcome(outcome);
        }
        outcomes
    }

    /// Waits until every queued batch has been committed or has failed.
    pub async fn flush_deletions(&mut self) -> Vec<DeletionOutcome> {
        let mut outcomes = self.poll_deletions();
        while self.in_flight > 0 {
            let Some(outcome) = self.worker.next_outcome().await else {
                log::error!("Deletion worker stopped with {} batch(es) queued", self.in_flight);
                self.in_flight = 0;
                break;
            };
            self.record_outcome(&outcome);
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Batches the worker gave up on. Their photos are still in the library.
    pub fn failed_deletions(&self) -> &[DeletionIntent] {
        &self.failed
    }

    pub fn retry_failed_deletions(&mut self) -> Result<usize, DeletionError> {
        let failed = std::mem::take(&mut self.failed);
        let count = failed.len();
        for (i, intent) in failed.iter().enumerate() {
            if let Err(e) = self.worker.submit(intent.clone()) {
                self.failed.extend(failed[i..].iter().cloned());
                return Err(e);
            }
            self.in_flight += 1;
        }
        Ok(count)
    }

    /// Stops the deletion worker after its queue drains. Must be awaited on every exit
    /// path, or queued batches are lost with the runtime.
    pub async fn close(mut self) -> Result<CloseReport, DeletionError> {
        let mut outcomes = self.poll_deletions();
        let GalleryStore { worker, mut failed, .. } = self;

        let remaining = worker.shutdown().await?;
        for outcome in &remaining {
            if let DeletionOutcome::Failed { intent, .. } = outcome {
                failed.push(intent.clone());
            }
        }
        outcomes.extend(remaining);

        if !failed.is_empty() {
            log::error!("Closing with {} uncommitted deletion batch(es)", failed.len());
        }
        Ok(CloseReport { outcomes, failed })
    }

    // Sessions

    pub fn start_session(&mut self) {
        self.dispatch(GalleryAction::StartSession);
    }

    /// Closes the open session, records it and advances the streak.
    pub fn end_session(&mut self) -> Option<SessionStats> {
        let session = SessionStats {
            end_time: Some(self.clock.now_ms()),
            ..self.state.current_session.clone()?
        };

        self.storage.add_session(session.clone());
        let streak = self.storage.update_streak(self.clock.today());

        self.dispatch(GalleryAction::EndSession {
            stats: session.clone(),
        });
        self.dispatch(GalleryAction::UpdateStats(StatsPatch::streak(streak)));
        log::info!(
            "Session {} ended: {} reviewed, streak {}",
            session.session_id,
            session.photos_reviewed,
            streak
        );
        Some(session)
    }

    // Achievements

    /// Returns the ids unlocked by this check.
    pub fn check_and_update_achievements(&mut self) -> Vec<String> {
        let check = check_achievements(
            &self.state.achievements,
            &self.state.stats,
            self.state.current_session.as_ref(),
            self.clock.now_ms(),
        );
        self.dispatch(GalleryAction::SetAchievements(check.achievements));
        self.storage.save_achievements(&self.state.achievements);
        check.newly_unlocked
    }

    // Analysis

    /// Analyzes every loaded photo in chunks, yielding to the runtime between them.
    /// `progress` receives the number of photos analyzed so far and the total.
    pub async fn analyze_photos<F>(&mut self, mut progress: F)
    where
        F: FnMut(usize, usize),
    {
        if self.state.photos.is_empty() {
            return;
        }

        let photos = self.state.photos.clone();
        let chunk_size = self.config.analysis_chunk_size.max(1);
        let yield_every = self.config.analysis_yield_every.max(1);
        let mut done = 0;

        for (i, chunk) in photos.chunks(chunk_size).enumerate() {
            let analyses = analyze_batch(chunk, &photos, self.clock.now_ms());
            self.dispatch(GalleryAction::BatchSetAnalyses(analyses));

            done += chunk.len();
            progress(done, photos.len());

            if (i + 1) % yield_every == 0 {
                tokio::task::yield_now().await;
            }
        }
        log::debug!("Analyzed {} photo(s)", done);
    }

    pub fn smart_suggestions(&self) -> Vec<String> {
        smart_suggestions(&self.state.photos, &self.state.analyses)
    }

    pub fn filtered_photos(&self, filter: FilterType) -> Vec<&Photo> {
        apply_filter(
            &self.state.photos,
            filter,
            &self.state.analyses,
            &self.smart_suggestions(),
        )
    }

    pub fn filter_counts(&self) -> HashMap<FilterType, usize> {
        filter_counts(&self.state.photos, &self.state.analyses, &self.smart_suggestions())
    }

    // Favorites

    pub fn is_favorite(&self, photo_id: &str) -> bool {
        self.favorites.iter().any(|id| id == photo_id)
    }

    pub fn favorites(&self) -> &[String] {
        &self.favorites
    }

    /// Returns whether the photo is a favorite afterwards.
    pub fn toggle_favorite(&mut self, photo_id: &str) -> bool {
        let now_favorite = if self.is_favorite(photo_id) {
            self.favorites.retain(|id| id != photo_id);
            false
        } else {
            self.favorites.push(photo_id.to_string());
            true
        };
        self.storage.save_favorites(&self.favorites);
        now_favorite
    }
}
