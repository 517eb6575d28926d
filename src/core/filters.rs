use crate::core::analysis::{OLD_PHOTO_DAYS, PhotoAnalysis};
use crate::core::photo::{BYTES_PER_MB, Photo};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

pub const LARGE_FILE_BYTES: u64 = 5 * BYTES_PER_MB;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    All,
    Suggested,
    Screenshots,
    Blurry,
    Old,
    Duplicates,
    Large,
}

impl FilterType {
    pub const ALL: [FilterType; 7] = [
        FilterType::All,
        FilterType::Suggested,
        FilterType::Screenshots,
        FilterType::Blurry,
        FilterType::Old,
        FilterType::Duplicates,
        FilterType::Large,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterType::All => "all",
            FilterType::Suggested => "suggested",
            FilterType::Screenshots => "screenshots",
            FilterType::Blurry => "blurry",
            FilterType::Old => "old",
            FilterType::Duplicates => "duplicates",
            FilterType::Large => "large",
        }
    }

    pub fn preset(&self) -> &'static PhotoFilter {
        FILTER_PRESETS
            .iter()
            .find(|preset| preset.filter_type == *self)
            .unwrap_or(&FILTER_PRESETS[0])
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterType::ALL
            .into_iter()
            .find(|filter| filter.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("unknown filter: {}", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoFilter {
    pub filter_type: FilterType,
    pub label: &'static str,
    pub icon: &'static str,
}

pub static FILTER_PRESETS: [PhotoFilter; 7] = [
    PhotoFilter { filter_type: FilterType::All, label: "All Photos", icon: "📷" },
    PhotoFilter { filter_type: FilterType::Suggested, label: "Smart Suggestions", icon: "✨" },
    PhotoFilter { filter_type: FilterType::Screenshots, label: "Screenshots", icon: "📱" },
    PhotoFilter { filter_type: FilterType::Blurry, label: "Blurry", icon: "😵" },
    PhotoFilter { filter_type: FilterType::Old, label: "Old (2+ years)", icon: "📅" },
    PhotoFilter { filter_type: FilterType::Duplicates, label: "Duplicates", icon: "👯" },
    PhotoFilter { filter_type: FilterType::Large, label: "Large Files", icon: "💾" },
];

fn is_large(photo: &Photo) -> bool {
    photo.file_size > LARGE_FILE_BYTES
}

fn is_old(analysis: &PhotoAnalysis) -> bool {
    analysis.age_in_days > OLD_PHOTO_DAYS
}

fn matches(
    filter: FilterType,
    photo: &Photo,
    analysis: Option<&PhotoAnalysis>,
    suggestions: &HashSet<&str>,
) -> bool {
    match filter {
        FilterType::All => true,
        FilterType::Suggested => suggestions.contains(photo.id.as_str()),
        FilterType::Screenshots => analysis.is_some_and(|a| a.is_screenshot),
        FilterType::Blurry => analysis.is_some_and(|a| a.is_blurry),
        FilterType::Old => analysis.is_some_and(is_old),
        FilterType::Duplicates => analysis.is_some_and(|a| a.is_potential_duplicate),
        FilterType::Large => is_large(photo),
    }
}

/// Photos matching `filter`, in list order.
pub fn apply_filter<'a>(
    photos: &'a [Photo],
    filter: FilterType,
    analyses: &HashMap<String, PhotoAnalysis>,
    smart_suggestions: &[String],
) -> Vec<&'a Photo> {
    if filter == FilterType::All {
        return photos.iter().collect();
    }

    let suggestions: HashSet<&str> = smart_suggestions.iter().map(String::as_str).collect();
    photos
        .iter()
        .filter(|photo| matches(filter, photo, analyses.get(&photo.id), &suggestions))
        .collect()
}

/// Badge counts for every filter over the same predicates as [`apply_filter`].
pub fn filter_counts(
    photos: &[Photo],
    analyses: &HashMap<String, PhotoAnalysis>,
    smart_suggestions: &[String],
) -> HashMap<FilterType, usize> {
    let suggestions: HashSet<&str> = smart_suggestions.iter().map(String::as_str).collect();
    let mut counts: HashMap<FilterType, usize> = FilterType::ALL.iter().map(|f| (*f, 0)).collect();

    for photo in photos {
        let analysis = analyses.get(&photo.id);
        for filter in FilterType::ALL {
            if matches(filter, photo, analysis, &suggestions) {
                *counts.entry(filter).or_default() += 1;
            }
        }
    }

    counts
}
