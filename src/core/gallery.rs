// Gallery state machine
// Every transition goes through `reduce`. The reducer performs no I/O: work that has to
// touch the media library is handed back to the caller as a `GalleryEffect`.

use crate::core::achievements::Achievement;
use crate::core::analysis::PhotoAnalysis;
use crate::core::photo::{
    GalleryStats, PermissionStatus, Photo, PhotoDecision, SessionStats, StatsPatch, UndoHistoryItem,
};
use std::collections::{HashMap, HashSet, VecDeque};

/// Decisions older than this many steps can no longer be undone.
pub const UNDO_CAPACITY: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct GalleryState {
    pub photos: Vec<Photo>,
    pub current_index: usize,
    pub stats: GalleryStats,
    pub decisions: HashMap<String, PhotoDecision>,
    pub is_loading: bool,
    pub has_more_photos: bool,
    pub permission_status: PermissionStatus,
    pub photo_cursor: Option<String>,
    pub undo_history: VecDeque<UndoHistoryItem>,
    pub current_session: Option<SessionStats>,
    /// The session most recently closed with `EndSession`.
    pub last_session: Option<SessionStats>,
    pub last_resume_photo_id: Option<String>,
    pub analyses: HashMap<String, PhotoAnalysis>,
    pub achievements: Vec<Achievement>,
    pub unlocked_achievements: Vec<String>,
}

impl GalleryState {
    pub fn new() -> Self {
        Self {
            photos: Vec::new(),
            current_index: 0,
            stats: GalleryStats::default(),
            decisions: HashMap::new(),
            is_loading: false,
            has_more_photos: true,
            permission_status: PermissionStatus::Undetermined,
            photo_cursor: None,
            undo_history: VecDeque::new(),
            current_session: None,
            last_session: None,
            last_resume_photo_id: None,
            analyses: HashMap::new(),
            achievements: Vec::new(),
            unlocked_achievements: Vec::new(),
        }
    }

    pub fn current_photo(&self) -> Option<&Photo> {
        self.photos.get(self.current_index)
    }

    pub fn photo(&self, photo_id: &str) -> Option<&Photo> {
        self.photos.iter().find(|p| p.id == photo_id)
    }

    pub fn decision(&self, photo_id: &str) -> Option<PhotoDecision> {
        self.decisions.get(photo_id).copied()
    }

    /// Ids marked for deletion that are still inside the undo window, in photo order.
    pub fn pending_deletions(&self) -> Vec<String> {
        self.photos
            .iter()
            .filter(|p| self.decision(&p.id) == Some(PhotoDecision::Delete))
            .map(|p| p.id.clone())
            .collect()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_history.is_empty()
    }
}

impl Default for GalleryState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GalleryAction {
    LoadPhotosSuccess {
        photos: Vec<Photo>,
        cursor: Option<String>,
        has_more: bool,
    },
    LoadMorePhotos {
        photos: Vec<Photo>,
        cursor: Option<String>,
        has_more: bool,
    },
    MarkDecision {
        photo_id: String,
        decision: PhotoDecision,
    },
    UndoLastDecision,
    UndoDecision {
        photo_id: String,
    },
    ClearUndoHistory,
    ExecuteDeletionsSuccess {
        deleted_ids: Vec<String>,
    },
    SetPermissionStatus(PermissionStatus),
    SetLoading(bool),
    SetCurrentIndex(usize),
    ResetSession,
    StartSession,
    EndSession {
        stats: SessionStats,
    },
    SetResumePhoto {
        photo_id: String,
    },
    UpdateStats(StatsPatch),
    SetPhotoAnalysis {
        photo_id: String,
        analysis: PhotoAnalysis,
    },
    BatchSetAnalyses(HashMap<String, PhotoAnalysis>),
    SetAchievements(Vec<Achievement>),
    UnlockAchievement {
        achievement_id: String,
    },
}

/// Side effects a transition asks the caller to carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GalleryEffect {
    /// Photos that left the undo window while marked for deletion. The state already
    /// treats them as gone; the caller must delete them from the library.
    /// An evicted `delete` entry whose photo has since been re-marked `keep` is not
    /// committed: the current decision wins over the history entry.
    CommitDeletion { photo_ids: Vec<String>, bytes: u64 },
}

pub fn reduce(state: &mut GalleryState, action: GalleryAction, now: i64) -> Vec<GalleryEffect> {
    match action {
        GalleryAction::LoadPhotosSuccess {
            photos,
            cursor,
            has_more,
        } => {
            state.photos.clear();
            append_unique(state, photos);
            state.current_index = 0;
            state.photo_cursor = cursor;
            state.has_more_photos = has_more;
            state.is_loading = false;
            recount(state);
        }

        GalleryAction::LoadMorePhotos {
            photos,
            cursor,
            has_more,
        } => {
            append_unique(state, photos);
            state.photo_cursor = cursor;
            state.has_more_photos = has_more;
            state.is_loading = false;
            recount(state);
        }

        GalleryAction::MarkDecision { photo_id, decision } => {
            return mark_decision(state, photo_id, decision, now);
        }

        GalleryAction::UndoLastDecision => {
            let Some(last) = state.undo_history.pop_back() else {
                return Vec::new();
            };
            state.decisions.remove(&last.photo_id);
            state.current_index = state.current_index.saturating_sub(1);
            recount(state);
        }

        GalleryAction::UndoDecision { photo_id } => {
            if state.decisions.remove(&photo_id).is_none() {
                return Vec::new();
            }
            // a history entry for an undecided photo would undo nothing later
            state.undo_history.retain(|item| item.photo_id != photo_id);
            recount(state);
        }

        GalleryAction::ClearUndoHistory => state.undo_history.clear(),

        GalleryAction::ExecuteDeletionsSuccess { deleted_ids } => {
            let ids: HashSet<&str> = deleted_ids.iter().map(String::as_str).collect();
            let freed = remove_photos(state, &ids);
            state.decisions.clear();
            state.current_index = 0;
            state.undo_history.clear();
            state.stats.lifetime_deleted += ids.len() as u64;
            state.stats.lifetime_freed += freed;
            if let Some(session) = state.current_session.as_mut() {
                session.storage_freed += freed;
            }
            recount(state);
        }

        GalleryAction::SetPermissionStatus(status) => state.permission_status = status,

        GalleryAction::SetLoading(is_loading) => state.is_loading = is_loading,

        GalleryAction::SetCurrentIndex(index) => state.current_index = index,

        GalleryAction::ResetSession => {
            *state = GalleryState {
                permission_status: state.permission_status,
                ..GalleryState::new()
            };
        }

        GalleryAction::StartSession => {
            if state.current_session.is_none() {
                state.current_session = Some(SessionStats::start(now));
            }
        }

        GalleryAction::EndSession { stats } => {
            state.current_session = None;
            state.last_session = Some(stats);
            state.stats.total_sessions += 1;
        }

        GalleryAction::SetResumePhoto { photo_id } => state.last_resume_photo_id = Some(photo_id),

        GalleryAction::UpdateStats(patch) => {
            patch.apply_to(&mut state.stats);
            // decision-derived counters always follow the decisions map
            recount(state);
        }

        GalleryAction::SetPhotoAnalysis { photo_id, analysis } => {
            state.analyses.insert(photo_id, analysis);
        }

        GalleryAction::BatchSetAnalyses(analyses) => state.analyses.extend(analyses),

        GalleryAction::SetAchievements(achievements) => set_achievements(state, achievements),

        GalleryAction::UnlockAchievement { achievement_id } => {
            if state.unlocked_achievements.contains(&achievement_id) {
                return Vec::new();
            }
            let Some(achievement) = state.achievements.iter_mut().find(|a| a.id == achievement_id)
            else {
                return Vec::new();
            };
            if achievement.unlocked_at.is_none() {
                achievement.unlocked_at = Some(now);
            }
            state.unlocked_achievements.push(achievement_id);
        }
    }

    Vec::new()
}

fn mark_decision(
    state: &mut GalleryState,
    photo_id: String,
    decision: PhotoDecision,
    now: i64,
) -> Vec<GalleryEffect> {
    if state.photo(&photo_id).is_none() {
        log::debug!("Ignoring decision for unknown photo {}", photo_id);
        return Vec::new();
    }

    state.decisions.insert(photo_id.clone(), decision);
    state.undo_history.push_back(UndoHistoryItem {
        photo_id,
        decision,
        timestamp: now,
    });

    if let Some(session) = state.current_session.as_mut() {
        session.photos_reviewed += 1;
        match decision {
            PhotoDecision::Delete => session.photos_deleted += 1,
            PhotoDecision::Keep => session.photos_kept += 1,
        }
    }

    state.current_index += 1;

    let effects = evict_overflow(state);
    recount(state);
    effects
}

/// Drops history beyond `UNDO_CAPACITY`. Evicted deletions are committed.
fn evict_overflow(state: &mut GalleryState) -> Vec<GalleryEffect> {
    let mut committed: Vec<String> = Vec::new();

    while state.undo_history.len() > UNDO_CAPACITY {
        let Some(item) = state.undo_history.pop_front() else {
            break;
        };
        // a later keep for the same photo overrides the evicted delete
        let still_deleted = state.decision(&item.photo_id) == Some(PhotoDecision::Delete);
        if item.decision == PhotoDecision::Delete && still_deleted && !committed.contains(&item.photo_id) {
            committed.push(item.photo_id);
        }
    }

    if committed.is_empty() {
        return Vec::new();
    }

    let ids: HashSet<&str> = committed.iter().map(String::as_str).collect();
    let freed = remove_photos(state, &ids);
    state.undo_history.retain(|item| !ids.contains(item.photo_id.as_str()));

    state.stats.lifetime_deleted += committed.len() as u64;
    state.stats.lifetime_freed += freed;
    if let Some(session) = state.current_session.as_mut() {
        session.storage_freed += freed;
    }

    log::debug!("Committing {} evicted deletion(s), {} bytes", committed.len(), freed);

    vec![GalleryEffect::CommitDeletion {
        photo_ids: committed,
        bytes: freed,
    }]
}

/// Removes photos together with their decisions and analyses. Returns the bytes removed.
fn remove_photos(state: &mut GalleryState, ids: &HashSet<&str>) -> u64 {
    let removed_before_cursor = state
        .photos
        .iter()
        .take(state.current_index)
        .filter(|p| ids.contains(p.id.as_str()))
        .count();

    let mut freed = 0;
    state.photos.retain(|p| {
        let gone = ids.contains(p.id.as_str());
        if gone {
            freed += p.file_size;
        }
        !gone
    });

    for id in ids {
        state.decisions.remove(*id);
        state.analyses.remove(*id);
    }

    state.current_index = state.current_index.saturating_sub(removed_before_cursor);
    freed
}

fn append_unique(state: &mut GalleryState, photos: Vec<Photo>) {
    let mut seen: HashSet<String> = state.photos.iter().map(|p| p.id.clone()).collect();
    for photo in photos {
        if seen.insert(photo.id.clone()) {
            state.photos.push(photo);
        }
    }
}

/// Re-derives every decision-driven counter from the decisions map.
fn recount(state: &mut GalleryState) {
    let sizes: HashMap<&str, u64> = state
        .photos
        .iter()
        .map(|p| (p.id.as_str(), p.file_size))
        .collect();

    let mut to_delete = 0;
    let mut to_keep = 0;
    let mut storage_to_free = 0;
    for (photo_id, decision) in &state.decisions {
        match decision {
            PhotoDecision::Delete => {
                to_delete += 1;
                storage_to_free += sizes.get(photo_id.as_str()).copied().unwrap_or(0);
            }
            PhotoDecision::Keep => to_keep += 1,
        }
    }

    state.stats.total_photos = state.photos.len();
    state.stats.processed = state.decisions.len();
    state.stats.to_delete = to_delete;
    state.stats.to_keep = to_keep;
    state.stats.storage_to_free = storage_to_free;
}

/// Installs achievement progress without ever re-locking an unlocked entry.
fn set_achievements(state: &mut GalleryState, incoming: Vec<Achievement>) {
    let previous: HashMap<String, Option<i64>> = state
        .achievements
        .iter()
        .map(|a| (a.id.clone(), a.unlocked_at))
        .collect();

    state.achievements = incoming
        .into_iter()
        .map(|mut achievement| {
            if let Some(Some(unlocked_at)) = previous.get(&achievement.id) {
                achievement.unlocked_at = Some(*unlocked_at);
            }
            achievement
        })
        .collect();

    for achievement in &state.achievements {
        if achievement.is_unlocked() && !state.unlocked_achievements.contains(&achievement.id) {
            state.unlocked_achievements.push(achievement.id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::achievements::initialize_achievements;
    use crate::core::photo::BYTES_PER_MB;
    use crate::core::photo::fixtures::{library, photo};

    const NOW: i64 = 1_760_000_000_000;

    fn loaded(count: usize, size: u64) -> GalleryState {
        let mut state = GalleryState::new();
        reduce(
            &mut state,
            GalleryAction::LoadPhotosSuccess {
                photos: library(count, size),
                cursor: Some("c1".to_string()),
                has_more: true,
            },
            NOW,
        );
        state
    }

    fn mark(state: &mut GalleryState, id: &str, decision: PhotoDecision) -> Vec<GalleryEffect> {
        reduce(
            state,
            GalleryAction::MarkDecision {
                photo_id: id.to_string(),
                decision,
            },
            NOW,
        )
    }

    fn assert_counters_consistent(state: &GalleryState) {
        assert_eq!(state.stats.processed, state.decisions.len());
        assert_eq!(state.stats.to_delete + state.stats.to_keep, state.stats.processed);
        assert!(state.undo_history.len() <= UNDO_CAPACITY);
    }

    #[test]
    fn test_load_photos_replaces_and_resets() {
        let mut state = loaded(3, 10);
        assert_eq!(state.photos.len(), 3);
        assert_eq!(state.stats.total_photos, 3);
        assert_eq!(state.photo_cursor.as_deref(), Some("c1"));

        reduce(
            &mut state,
            GalleryAction::LoadPhotosSuccess {
                photos: library(2, 10),
                cursor: None,
                has_more: false,
            },
            NOW,
        );
        assert_eq!(state.photos.len(), 2);
        assert!(!state.has_more_photos);
        assert!(state.photo_cursor.is_none());
    }

    #[test]
    fn test_load_more_appends_and_skips_known_ids() {
        let mut state = loaded(2, 10);
        state.is_loading = true;
        reduce(
            &mut state,
            GalleryAction::LoadMorePhotos {
                photos: vec![photo("p2", 10, 0), photo("p3", 10, 0)],
                cursor: Some("c2".to_string()),
                has_more: false,
            },
            NOW,
        );
        let ids: Vec<&str> = state.photos.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2", "p3"]);
        assert_eq!(state.stats.total_photos, 3);
        assert_eq!(state.photo_cursor.as_deref(), Some("c2"));
        assert!(!state.is_loading);
    }

    #[test]
    fn test_mark_decision_updates_counters() {
        let mut state = loaded(5, 100);
        mark(&mut state, "p1", PhotoDecision::Delete);
        mark(&mut state, "p2", PhotoDecision::Keep);

        assert_eq!(state.stats.processed, 2);
        assert_eq!(state.stats.to_delete, 1);
        assert_eq!(state.stats.to_keep, 1);
        assert_eq!(state.stats.storage_to_free, 100);
        assert_eq!(state.current_index, 2);
        assert_eq!(state.undo_history.len(), 2);
        assert_eq!(state.undo_history[0].timestamp, NOW);
    }

    #[test]
    fn test_redecision_overwrites() {
        let mut state = loaded(3, 100);
        mark(&mut state, "p1", PhotoDecision::Delete);
        mark(&mut state, "p1", PhotoDecision::Keep);
        assert_eq!(state.decisions.len(), 1);
        assert_eq!(state.decision("p1"), Some(PhotoDecision::Keep));
        assert_counters_consistent(&state);
    }

    #[test]
    fn test_delete_then_keep_restores_storage() {
        let mut state = loaded(3, 700);
        mark(&mut state, "p2", PhotoDecision::Delete);
        let before = state.stats.storage_to_free;
        mark(&mut state, "p1", PhotoDecision::Delete);
        assert_eq!(state.stats.storage_to_free, before + 700);
        mark(&mut state, "p1", PhotoDecision::Keep);
        assert_eq!(state.stats.storage_to_free, before);
    }

    #[test]
    fn test_unknown_photo_is_ignored() {
        let mut state = loaded(2, 1);
        let snapshot = state.clone();
        let effects = mark(&mut state, "ghost", PhotoDecision::Delete);
        assert!(effects.is_empty());
        assert_eq!(state, snapshot);
    }

    #[test]
    fn test_counters_stay_consistent_over_long_sequences() {
        let mut state = loaded(20, 10);
        for i in 1..=20 {
            let decision = if i % 3 == 0 {
                PhotoDecision::Keep
            } else {
                PhotoDecision::Delete
            };
            mark(&mut state, &format!("p{}", i), decision);
            assert_counters_consistent(&state);
            if i % 4 == 0 {
                reduce(&mut state, GalleryAction::UndoLastDecision, NOW);
                assert_counters_consistent(&state);
            }
        }
    }

    #[test]
    fn test_deletes_commit_as_keeps_push_them_out() {
        let mut state = loaded(20, BYTES_PER_MB);
        for i in 1..=5 {
            mark(&mut state, &format!("p{}", i), PhotoDecision::Delete);
        }
        for i in 6..=10 {
            mark(&mut state, &format!("p{}", i), PhotoDecision::Keep);
        }
        // p1..p5 left the window one by one while p6..p10 were marked
        assert_eq!(state.photos.len(), 15);
        assert_eq!(state.stats.lifetime_deleted, 5);
        assert_eq!(state.stats.lifetime_freed, 5 * BYTES_PER_MB);
        assert_eq!(state.stats.processed, 5);
        assert_eq!(state.stats.to_delete, 0);
        assert_eq!(state.stats.to_keep, 5);
        assert_eq!(state.stats.storage_to_free, 0);
        assert_eq!(state.current_photo().map(|p| p.id.as_str()), Some("p11"));

        // the evicted entry is a keep, so nothing more is committed
        let effects = mark(&mut state, "p11", PhotoDecision::Delete);
        assert!(effects.is_empty());
        assert_eq!(state.photos.len(), 15);
        assert_eq!(state.decisions.len(), 6);
        assert_eq!(state.stats.storage_to_free, BYTES_PER_MB);
        assert_counters_consistent(&state);
    }

    #[test]
    fn test_eviction_scenario_from_fresh_history() {
        let mut state = loaded(20, BYTES_PER_MB);
        for i in 1..=5 {
            mark(&mut state, &format!("p{}", i), PhotoDecision::Delete);
        }
        // history is exactly full: nothing committed yet
        assert_eq!(state.photos.len(), 20);
        assert_eq!(state.stats.lifetime_deleted, 0);

        let effects = mark(&mut state, "p6", PhotoDecision::Delete);
        assert_eq!(
            effects,
            vec![GalleryEffect::CommitDeletion {
                photo_ids: vec!["p1".to_string()],
                bytes: BYTES_PER_MB,
            }]
        );
        assert_eq!(state.photos.len(), 19);
        assert!(state.photo("p1").is_none());
        assert!(state.decision("p1").is_none());
        assert_eq!(state.stats.lifetime_deleted, 1);
        assert_eq!(state.stats.lifetime_freed, BYTES_PER_MB);
        assert_eq!(state.decisions.len(), 5);
        assert_eq!(state.stats.storage_to_free, 5 * BYTES_PER_MB);
        assert_eq!(state.undo_history.len(), 5);
        // p1 sat before the cursor, so the cursor still points at p7
        assert_eq!(state.current_photo().map(|p| p.id.as_str()), Some("p7"));
        assert_counters_consistent(&state);
    }

    #[test]
    fn test_evicted_keep_is_not_committed() {
        let mut state = loaded(10, 1);
        mark(&mut state, "p1", PhotoDecision::Keep);
        for i in 2..=6 {
            let effects = mark(&mut state, &format!("p{}", i), PhotoDecision::Delete);
            assert!(effects.is_empty());
        }
        assert_eq!(state.photos.len(), 10);
        assert_eq!(state.decision("p1"), Some(PhotoDecision::Keep));
        assert_eq!(state.stats.lifetime_deleted, 0);
    }

    #[test]
    fn test_evicted_delete_overridden_by_keep_is_not_committed() {
        let mut state = loaded(10, 1);
        mark(&mut state, "p1", PhotoDecision::Delete);
        mark(&mut state, "p1", PhotoDecision::Keep);
        for i in 2..=5 {
            let effects = mark(&mut state, &format!("p{}", i), PhotoDecision::Keep);
            assert!(effects.is_empty());
        }
        assert!(state.photo("p1").is_some());
    }

    #[test]
    fn test_undo_last_on_empty_history_is_noop() {
        let mut state = loaded(3, 1);
        let snapshot = state.clone();
        let effects = reduce(&mut state, GalleryAction::UndoLastDecision, NOW);
        assert!(effects.is_empty());
        assert_eq!(state, snapshot);
    }

    #[test]
    fn test_undo_last_reverts_newest() {
        let mut state = loaded(3, 250);
        mark(&mut state, "p1", PhotoDecision::Keep);
        mark(&mut state, "p2", PhotoDecision::Delete);
        reduce(&mut state, GalleryAction::UndoLastDecision, NOW);

        assert!(state.decision("p2").is_none());
        assert_eq!(state.decision("p1"), Some(PhotoDecision::Keep));
        assert_eq!(state.stats.storage_to_free, 0);
        assert_eq!(state.current_index, 1);
        assert_eq!(state.undo_history.len(), 1);
    }

    #[test]
    fn test_undo_last_index_floors_at_zero() {
        let mut state = loaded(3, 1);
        mark(&mut state, "p1", PhotoDecision::Keep);
        reduce(&mut state, GalleryAction::SetCurrentIndex(0), NOW);
        reduce(&mut state, GalleryAction::UndoLastDecision, NOW);
        assert_eq!(state.current_index, 0);
    }

    #[test]
    fn test_undo_decision_by_id() {
        let mut state = loaded(4, 10);
        mark(&mut state, "p1", PhotoDecision::Delete);
        mark(&mut state, "p2", PhotoDecision::Keep);
        reduce(
            &mut state,
            GalleryAction::UndoDecision {
                photo_id: "p1".to_string(),
            },
            NOW,
        );
        assert!(state.decision("p1").is_none());
        assert_eq!(state.stats.to_delete, 0);
        assert_eq!(state.stats.storage_to_free, 0);
        assert!(state.undo_history.iter().all(|item| item.photo_id != "p1"));
        assert_eq!(state.undo_history.len(), 1);
        assert_counters_consistent(&state);

        let snapshot = state.clone();
        reduce(
            &mut state,
            GalleryAction::UndoDecision {
                photo_id: "p4".to_string(),
            },
            NOW,
        );
        assert_eq!(state, snapshot);
    }

    #[test]
    fn test_execute_deletions_success() {
        let mut state = loaded(5, 100);
        reduce(&mut state, GalleryAction::StartSession, NOW);
        mark(&mut state, "p1", PhotoDecision::Delete);
        mark(&mut state, "p2", PhotoDecision::Delete);
        mark(&mut state, "p3", PhotoDecision::Keep);

        reduce(
            &mut state,
            GalleryAction::ExecuteDeletionsSuccess {
                deleted_ids: vec!["p1".to_string(), "p2".to_string()],
            },
            NOW,
        );

        assert_eq!(state.photos.len(), 3);
        assert_eq!(state.current_index, 0);
        assert!(state.undo_history.is_empty());
        assert_eq!(state.stats.processed, 0);
        assert_eq!(state.stats.to_delete, 0);
        assert_eq!(state.stats.to_keep, 0);
        assert_eq!(state.stats.storage_to_free, 0);
        assert_eq!(state.stats.lifetime_deleted, 2);
        assert_eq!(state.stats.lifetime_freed, 200);
        assert_eq!(state.current_session.as_ref().map(|s| s.storage_freed), Some(200));
        assert_counters_consistent(&state);
    }

    #[test]
    fn test_session_lifecycle() {
        let mut state = loaded(3, 1);
        reduce(&mut state, GalleryAction::StartSession, NOW);
        let session_id = state.current_session.as_ref().unwrap().session_id.clone();

        // a second start keeps the open session
        reduce(&mut state, GalleryAction::StartSession, NOW + 1000);
        assert_eq!(state.current_session.as_ref().unwrap().session_id, session_id);

        mark(&mut state, "p1", PhotoDecision::Delete);
        mark(&mut state, "p2", PhotoDecision::Keep);
        let session = state.current_session.clone().unwrap();
        assert_eq!(session.photos_reviewed, 2);
        assert_eq!(session.photos_deleted, 1);
        assert_eq!(session.photos_kept, 1);

        reduce(&mut state, GalleryAction::EndSession { stats: session.clone() }, NOW);
        assert!(state.current_session.is_none());
        assert_eq!(state.last_session, Some(session));
        assert_eq!(state.stats.total_sessions, 1);
    }

    #[test]
    fn test_reset_session_keeps_permission() {
        let mut state = loaded(3, 1);
        reduce(&mut state, GalleryAction::SetPermissionStatus(PermissionStatus::Granted), NOW);
        mark(&mut state, "p1", PhotoDecision::Keep);
        reduce(&mut state, GalleryAction::ResetSession, NOW);

        assert_eq!(state.permission_status, PermissionStatus::Granted);
        assert!(state.photos.is_empty());
        assert!(state.decisions.is_empty());
        assert!(state.has_more_photos);
    }

    #[test]
    fn test_update_stats_merges_but_keeps_invariants() {
        let mut state = loaded(3, 1);
        mark(&mut state, "p1", PhotoDecision::Keep);
        reduce(
            &mut state,
            GalleryAction::UpdateStats(StatsPatch {
                processed: Some(99),
                lifetime_deleted: Some(12),
                current_streak: Some(4),
                ..Default::default()
            }),
            NOW,
        );
        assert_eq!(state.stats.lifetime_deleted, 12);
        assert_eq!(state.stats.current_streak, 4);
        assert_eq!(state.stats.processed, 1);
    }

    #[test]
    fn test_analyses_merge() {
        let mut state = loaded(2, 1);
        let analysis = crate::core::analysis::analyze_photo(&state.photos[0], &state.photos, NOW);
        reduce(
            &mut state,
            GalleryAction::SetPhotoAnalysis {
                photo_id: "p1".to_string(),
                analysis: analysis.clone(),
            },
            NOW,
        );
        let batch = crate::core::analysis::analyze_batch(&state.photos[1..], &state.photos, NOW);
        reduce(&mut state, GalleryAction::BatchSetAnalyses(batch), NOW);
        assert_eq!(state.analyses.len(), 2);
        assert_eq!(state.analyses["p1"], analysis);
    }

    #[test]
    fn test_unlock_achievement_is_idempotent() {
        let mut state = GalleryState::new();
        reduce(&mut state, GalleryAction::SetAchievements(initialize_achievements()), NOW);

        let unlock = |state: &mut GalleryState, id: &str, at: i64| {
            reduce(
                state,
                GalleryAction::UnlockAchievement {
                    achievement_id: id.to_string(),
                },
                at,
            )
        };

        unlock(&mut state, "first_steps", NOW);
        unlock(&mut state, "first_steps", NOW + 5);
        unlock(&mut state, "no_such_thing", NOW);

        assert_eq!(state.unlocked_achievements, vec!["first_steps"]);
        let first = state.achievements.iter().find(|a| a.id == "first_steps").unwrap();
        assert_eq!(first.unlocked_at, Some(NOW));
    }

    #[test]
    fn test_set_achievements_never_relocks() {
        let mut state = GalleryState::new();
        let mut unlocked = initialize_achievements();
        unlocked[0].unlocked_at = Some(7);
        reduce(&mut state, GalleryAction::SetAchievements(unlocked), NOW);
        assert_eq!(state.unlocked_achievements, vec!["first_steps"]);

        reduce(&mut state, GalleryAction::SetAchievements(initialize_achievements()), NOW);
        assert_eq!(state.achievements[0].unlocked_at, Some(7));
        assert_eq!(state.unlocked_achievements, vec!["first_steps"]);
    }

    #[test]
    fn test_simple_field_setters() {
        let mut state = GalleryState::new();
        reduce(&mut state, GalleryAction::SetLoading(true), NOW);
        reduce(&mut state, GalleryAction::SetCurrentIndex(3), NOW);
        reduce(
            &mut state,
            GalleryAction::SetResumePhoto {
                photo_id: "p9".to_string(),
            },
            NOW,
        );
        assert!(state.is_loading);
        assert_eq!(state.current_index, 3);
        assert_eq!(state.last_resume_photo_id.as_deref(), Some("p9"));
    }

    #[test]
    fn test_clear_undo_history() {
        let mut state = loaded(3, 1);
        mark(&mut state, "p1", PhotoDecision::Delete);
        reduce(&mut state, GalleryAction::ClearUndoHistory, NOW);
        assert!(!state.can_undo());
        assert_eq!(state.decision("p1"), Some(PhotoDecision::Delete));
        assert_eq!(state.pending_deletions(), vec!["p1"]);
    }
}
