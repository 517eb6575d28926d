// Heuristic photo classification
// Everything here works from metadata only; no pixels are decoded.

use crate::core::photo::{MS_PER_DAY, Photo};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const SCREENSHOT_PATTERNS: [&str; 5] = ["screenshot", "screen_shot", "screen shot", "scrnshot", "scrn"];
const PORTRAIT_SCREEN_RATIO: (f64, f64) = (0.45, 0.6);
const LANDSCAPE_SCREEN_RATIO: (f64, f64) = (1.7, 2.2);

const BLUR_AGE_DAYS: i64 = 1825;
const BLUR_THRESHOLD: u8 = 50;
const OLD_BLUR_SCORE: u8 = 60;
const RECENT_BLUR_SCORE: u8 = 20;
const PLACEHOLDER_BRIGHTNESS: u8 = 50;

/// Two photos taken less than this apart with identical size count as duplicates.
pub const DUPLICATE_WINDOW_MS: i64 = 1000;

pub const OLD_PHOTO_DAYS: i64 = 730;
pub const SUGGESTION_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoAnalysis {
    pub photo_id: String,
    pub is_blurry: bool,
    /// 0-100, higher = more blurry.
    pub blur_score: u8,
    pub is_screenshot: bool,
    pub is_potential_duplicate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_group: Option<String>,
    pub age_in_days: i64,
    /// 0-100.
    pub brightness: u8,
    pub analyzed_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlurEstimate {
    pub is_blurry: bool,
    pub score: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DuplicateMatch {
    pub is_duplicate: bool,
    pub group: Option<String>,
}

/// Filename patterns, or a phone-screen aspect ratio on an `img`-named file.
pub fn is_screenshot(photo: &Photo) -> bool {
    let filename = photo.filename.to_lowercase();

    let has_screenshot_name = SCREENSHOT_PATTERNS
        .iter()
        .any(|pattern| filename.contains(pattern));

    let ratio = photo.aspect_ratio();
    let in_range = |(lo, hi): (f64, f64)| ratio >= lo && ratio <= hi;
    let is_phone_ratio = in_range(PORTRAIT_SCREEN_RATIO) || in_range(LANDSCAPE_SCREEN_RATIO);

    has_screenshot_name || (is_phone_ratio && filename.contains("img"))
}

/// Age-based stand-in for real blur detection.
pub fn detect_blur(photo: &Photo, now: i64) -> BlurEstimate {
    let is_old = now - photo.creation_time > BLUR_AGE_DAYS * MS_PER_DAY;
    let score = if is_old { OLD_BLUR_SCORE } else { RECENT_BLUR_SCORE };

    BlurEstimate {
        is_blurry: score > BLUR_THRESHOLD,
        score,
    }
}

/// Same non-zero size and creation time strictly within the duplicate window.
///
/// The group id is seeded from the earliest photo of this photo's own neighbourhood,
/// so overlapping neighbourhoods are not merged transitively.
pub fn find_duplicate(photo: &Photo, all_photos: &[Photo]) -> DuplicateMatch {
    if photo.file_size == 0 {
        return DuplicateMatch::default();
    }

    let mut related: Vec<&Photo> = all_photos
        .iter()
        .filter(|p| {
            p.id != photo.id
                && p.file_size == photo.file_size
                && (p.creation_time - photo.creation_time).abs() < DUPLICATE_WINDOW_MS
        })
        .collect();

    if related.is_empty() {
        return DuplicateMatch::default();
    }

    related.push(photo);
    // stable sort keeps the queried photo last among equal timestamps
    related.sort_by_key(|p| p.creation_time);

    DuplicateMatch {
        is_duplicate: true,
        group: Some(format!("dup_{}", related[0].id)),
    }
}

pub fn photo_age_days(photo: &Photo, now: i64) -> i64 {
    (now - photo.creation_time).div_euclid(MS_PER_DAY)
}

pub fn analyze_photo(photo: &Photo, all_photos: &[Photo], now: i64) -> PhotoAnalysis {
    let blur = detect_blur(photo, now);
    let duplicate = find_duplicate(photo, all_photos);

    PhotoAnalysis {
        photo_id: photo.id.clone(),
        is_blurry: blur.is_blurry,
        blur_score: blur.score,
        is_screenshot: is_screenshot(photo),
        is_potential_duplicate: duplicate.is_duplicate,
        duplicate_group: duplicate.group,
        age_in_days: photo_age_days(photo, now),
        brightness: PLACEHOLDER_BRIGHTNESS,
        analyzed_at: now,
    }
}

/// Analyze `photos` against the whole library, one after another.
pub fn analyze_batch(photos: &[Photo], all_photos: &[Photo], now: i64) -> HashMap<String, PhotoAnalysis> {
    photos
        .iter()
        .map(|photo| (photo.id.clone(), analyze_photo(photo, all_photos, now)))
        .collect()
}

/// Weighted deletion-candidate score.
pub fn suggestion_score(analysis: &PhotoAnalysis) -> u32 {
    let mut score = 0;
    if analysis.is_screenshot {
        score += 3;
    }
    if analysis.is_blurry {
        score += 2;
    }
    if analysis.age_in_days > OLD_PHOTO_DAYS {
        score += 1;
    }
    if analysis.is_potential_duplicate {
        score += 2;
    }
    score
}

pub fn is_suggested(analysis: &PhotoAnalysis) -> bool {
    suggestion_score(analysis) >= SUGGESTION_THRESHOLD
}

/// Ids of photos scoring at or above the suggestion threshold, in `order`.
pub fn smart_suggestions(order: &[Photo], analyses: &HashMap<String, PhotoAnalysis>) -> Vec<String> {
    order
        .iter()
        .filter(|photo| analyses.get(&photo.id).is_some_and(is_suggested))
        .map(|photo| photo.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::photo::fixtures::photo;

    const NOW: i64 = 1_760_000_000_000;

    fn named(filename: &str, width: u32, height: u32) -> Photo {
        Photo {
            filename: filename.to_string(),
            width,
            height,
            ..photo("x", 100, NOW)
        }
    }

    fn blank_analysis() -> PhotoAnalysis {
        PhotoAnalysis {
            photo_id: "a".to_string(),
            is_blurry: false,
            blur_score: 20,
            is_screenshot: false,
            is_potential_duplicate: false,
            duplicate_group: None,
            age_in_days: 10,
            brightness: 50,
            analyzed_at: NOW,
        }
    }

    #[test]
    fn test_screenshot_by_filename() {
        assert!(is_screenshot(&named("Screenshot_2024-01-01.png", 4000, 3000)));
        assert!(is_screenshot(&named("Screen Shot 2020.png", 4000, 3000)));
        assert!(is_screenshot(&named("SCRN_0001.PNG", 4000, 3000)));
        assert!(!is_screenshot(&named("DSC_0001.JPG", 4000, 3000)));
    }

    #[test]
    fn test_screenshot_by_aspect_ratio_needs_img_name() {
        // 1170x2532 is ~0.46
        assert!(is_screenshot(&named("IMG_1234.PNG", 1170, 2532)));
        assert!(!is_screenshot(&named("DSC_1234.PNG", 1170, 2532)));
        // landscape 2532x1170 is ~2.16
        assert!(is_screenshot(&named("img_5.png", 2532, 1170)));
        // 4:3 is outside both ranges
        assert!(!is_screenshot(&named("IMG_1234.JPG", 4032, 3024)));
    }

    #[test]
    fn test_blur_is_age_driven() {
        let recent = photo("r", 1, NOW - 10 * MS_PER_DAY);
        let ancient = photo("a", 1, NOW - 1826 * MS_PER_DAY);
        let boundary = photo("b", 1, NOW - 1825 * MS_PER_DAY);

        assert_eq!(detect_blur(&recent, NOW), BlurEstimate { is_blurry: false, score: 20 });
        assert_eq!(detect_blur(&ancient, NOW), BlurEstimate { is_blurry: true, score: 60 });
        assert!(!detect_blur(&boundary, NOW).is_blurry);
    }

    #[test]
    fn test_duplicate_window_is_strict() {
        let a = photo("a", 2048, 0);
        let b = photo("b", 2048, 999);
        let c = photo("c", 2048, 1000);

        let all = vec![a.clone(), b.clone()];
        assert!(find_duplicate(&a, &all).is_duplicate);

        let all = vec![a.clone(), c.clone()];
        assert!(!find_duplicate(&a, &all).is_duplicate);
        assert!(!find_duplicate(&c, &all).is_duplicate);
    }

    #[test]
    fn test_duplicate_groups_are_local() {
        let p0 = photo("p0", 4096, 0);
        let p500 = photo("p500", 4096, 500);
        let p1600 = photo("p1600", 4096, 1600);
        let all = vec![p0.clone(), p500.clone(), p1600.clone()];

        let m0 = find_duplicate(&p0, &all);
        let m500 = find_duplicate(&p500, &all);
        let m1600 = find_duplicate(&p1600, &all);

        assert_eq!(m0.group.as_deref(), Some("dup_p0"));
        assert_eq!(m500.group.as_deref(), Some("dup_p0"));
        assert!(!m1600.is_duplicate);
    }

    #[test]
    fn test_zero_size_is_never_duplicate() {
        let a = photo("a", 0, 0);
        let b = photo("b", 0, 10);
        assert!(!find_duplicate(&a, &[a.clone(), b]).is_duplicate);
    }

    #[test]
    fn test_duplicate_requires_same_size() {
        let a = photo("a", 100, 0);
        let b = photo("b", 101, 10);
        assert!(!find_duplicate(&a, &[a.clone(), b]).is_duplicate);
    }

    #[test]
    fn test_age_floors_to_whole_days() {
        let p = photo("a", 1, NOW - 3 * MS_PER_DAY - 5);
        assert_eq!(photo_age_days(&p, NOW), 3);
        let fresh = photo("b", 1, NOW - 1);
        assert_eq!(photo_age_days(&fresh, NOW), 0);
    }

    #[test]
    fn test_analyze_photo_fills_every_field() {
        let p = named("Screenshot.png", 1080, 1920);
        let analysis = analyze_photo(&p, std::slice::from_ref(&p), NOW);
        assert_eq!(analysis.photo_id, "x");
        assert!(analysis.is_screenshot);
        assert!(!analysis.is_blurry);
        assert!(!analysis.is_potential_duplicate);
        assert_eq!(analysis.brightness, 50);
        assert_eq!(analysis.analyzed_at, NOW);
    }

    #[test]
    fn test_analyze_batch_keys_by_id() {
        let photos = vec![photo("a", 1, NOW), photo("b", 2, NOW)];
        let analyses = analyze_batch(&photos[..1], &photos, NOW);
        assert_eq!(analyses.len(), 1);
        assert!(analyses.contains_key("a"));
    }

    #[test]
    fn test_suggestion_score_weights() {
        let analysis = PhotoAnalysis {
            is_screenshot: true,
            is_blurry: true,
            ..blank_analysis()
        };
        assert_eq!(suggestion_score(&analysis), 5);
        assert!(is_suggested(&analysis));

        let blurry_only = PhotoAnalysis {
            is_blurry: true,
            ..blank_analysis()
        };
        assert_eq!(suggestion_score(&blurry_only), 2);
        assert!(!is_suggested(&blurry_only));

        let blurry_and_old = PhotoAnalysis {
            is_blurry: true,
            age_in_days: 731,
            ..blank_analysis()
        };
        assert!(is_suggested(&blurry_and_old));
    }

    #[test]
    fn test_smart_suggestions_follow_photo_order() {
        let photos = vec![photo("b", 1, NOW), photo("a", 1, NOW), photo("c", 1, NOW)];
        let mut analyses = HashMap::new();
        for id in ["a", "b"] {
            analyses.insert(
                id.to_string(),
                PhotoAnalysis {
                    photo_id: id.to_string(),
                    is_screenshot: true,
                    ..blank_analysis()
                },
            );
        }
        assert_eq!(smart_suggestions(&photos, &analyses), vec!["b", "a"]);
    }
}
