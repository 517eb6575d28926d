use crate::core::photo::{BYTES_PER_MB, GalleryStats, SessionStats};
use serde::{Deserialize, Serialize};

const GB: u64 = 1024 * BYTES_PER_MB;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlocked_at: Option<i64>,
    /// Current value of the tracked metric.
    pub progress: u64,
    pub target: u64,
}

impl Achievement {
    pub fn is_unlocked(&self) -> bool {
        self.unlocked_at.is_some()
    }
}

/// Which counter an achievement tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Metric {
    Processed,
    ReviewedLifetime,
    DeletedOrPending,
    LifetimeFreed,
    Streak,
    SessionReviewed,
    LifetimeDeleted,
}

impl Metric {
    fn read(self, stats: &GalleryStats, session: Option<&SessionStats>) -> u64 {
        match self {
            Metric::Processed => stats.processed as u64,
            Metric::ReviewedLifetime => stats.lifetime_deleted + stats.processed as u64,
            Metric::DeletedOrPending => stats.to_delete as u64 + stats.lifetime_deleted,
            Metric::LifetimeFreed => stats.lifetime_freed,
            Metric::Streak => stats.current_streak as u64,
            Metric::SessionReviewed => session.map_or(0, |s| s.photos_reviewed as u64),
            Metric::LifetimeDeleted => stats.lifetime_deleted,
        }
    }
}

struct Definition {
    id: &'static str,
    title: &'static str,
    description: &'static str,
    icon: &'static str,
    target: u64,
    metric: Metric,
}

static DEFINITIONS: [Definition; 11] = [
    Definition {
        id: "first_steps",
        title: "First Steps",
        description: "Review your first photo",
        icon: "👶",
        target: 1,
        metric: Metric::Processed,
    },
    Definition {
        id: "getting_started",
        title: "Getting Started",
        description: "Review 10 photos",
        icon: "🚀",
        target: 10,
        metric: Metric::Processed,
    },
    Definition {
        id: "century_club",
        title: "Century Club",
        description: "Review 100 photos",
        icon: "💯",
        target: 100,
        metric: Metric::ReviewedLifetime,
    },
    Definition {
        id: "declutter_begins",
        title: "Declutter Begins",
        description: "Delete your first photo",
        icon: "🗑️",
        target: 1,
        metric: Metric::DeletedOrPending,
    },
    Definition {
        id: "space_saver",
        title: "Space Saver",
        description: "Free up 100MB of storage",
        icon: "💾",
        target: 100 * BYTES_PER_MB,
        metric: Metric::LifetimeFreed,
    },
    Definition {
        id: "storage_master",
        title: "Storage Master",
        description: "Free up 1GB of storage",
        icon: "🏆",
        target: GB,
        metric: Metric::LifetimeFreed,
    },
    Definition {
        id: "streak_3",
        title: "3-Day Streak",
        description: "Clean photos 3 days in a row",
        icon: "🔥",
        target: 3,
        metric: Metric::Streak,
    },
    Definition {
        id: "streak_7",
        title: "Week Warrior",
        description: "Clean photos 7 days in a row",
        icon: "⚡",
        target: 7,
        metric: Metric::Streak,
    },
    Definition {
        id: "streak_30",
        title: "Monthly Master",
        description: "Clean photos 30 days in a row",
        icon: "🌟",
        target: 30,
        metric: Metric::Streak,
    },
    Definition {
        id: "speed_demon",
        title: "Speed Demon",
        description: "Review 50 photos in one session",
        icon: "⚡",
        target: 50,
        metric: Metric::SessionReviewed,
    },
    Definition {
        id: "completionist",
        title: "Completionist",
        description: "Delete 500 photos total",
        icon: "✨",
        target: 500,
        metric: Metric::LifetimeDeleted,
    },
];

fn definition(id: &str) -> Option<&'static Definition> {
    DEFINITIONS.iter().find(|d| d.id == id)
}

/// Fresh, locked copies of the whole catalog.
pub fn initialize_achievements() -> Vec<Achievement> {
    DEFINITIONS
        .iter()
        .map(|d| Achievement {
            id: d.id.to_string(),
            title: d.title.to_string(),
            description: d.description.to_string(),
            icon: d.icon.to_string(),
            unlocked_at: None,
            progress: 0,
            target: d.target,
        })
        .collect()
}

/// Catalog entries missing from `persisted` are appended, so older saves pick up new achievements.
pub fn merge_with_catalog(persisted: Vec<Achievement>) -> Vec<Achievement> {
    let mut merged = persisted;
    for fresh in initialize_achievements() {
        if !merged.iter().any(|a| a.id == fresh.id) {
            merged.push(fresh);
        }
    }
    merged
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AchievementCheck {
    pub achievements: Vec<Achievement>,
    pub newly_unlocked: Vec<String>,
}

/// Recompute progress for every locked achievement and unlock those at target.
/// Unlocked achievements are returned untouched.
pub fn check_achievements(
    achievements: &[Achievement],
    stats: &GalleryStats,
    session: Option<&SessionStats>,
    now: i64,
) -> AchievementCheck {
    let mut newly_unlocked = Vec::new();

    let achievements = achievements
        .iter()
        .map(|achievement| {
            if achievement.is_unlocked() {
                return achievement.clone();
            }
            let Some(def) = definition(&achievement.id) else {
                return achievement.clone();
            };

            let progress = def.metric.read(stats, session);
            let mut updated = Achievement {
                progress,
                ..achievement.clone()
            };
            if progress >= def.target {
                updated.unlocked_at = Some(now);
                newly_unlocked.push(achievement.id.clone());
            }
            updated
        })
        .collect();

    AchievementCheck {
        achievements,
        newly_unlocked,
    }
}

fn is_storage_achievement(achievement: &Achievement) -> bool {
    definition(&achievement.id).is_some_and(|d| d.metric == Metric::LifetimeFreed)
}

pub fn format_progress(achievement: &Achievement) -> String {
    if is_storage_achievement(achievement) {
        let progress_mb = achievement.progress as f64 / BYTES_PER_MB as f64;
        let target_mb = achievement.target as f64 / BYTES_PER_MB as f64;
        if target_mb >= 1024.0 {
            return format!("{:.2}GB / {:.0}GB", progress_mb / 1024.0, target_mb / 1024.0);
        }
        return format!("{:.0}MB / {:.0}MB", progress_mb, target_mb);
    }

    format!("{} / {}", achievement.progress, achievement.target)
}

pub fn progress_percentage(achievement: &Achievement) -> f64 {
    if achievement.target == 0 {
        return 100.0;
    }
    (achievement.progress as f64 / achievement.target as f64 * 100.0).min(100.0)
}
