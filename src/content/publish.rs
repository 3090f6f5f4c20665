//! Publication lifecycle applied on every post save.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::sanitize::sanitize_plain_text;

/// Assumed reading speed for the derived reading-time estimate.
const WORDS_PER_MINUTE: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Published,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
        }
    }

    pub fn parse(value: &str) -> Option<PostStatus> {
        match value {
            "draft" => Some(PostStatus::Draft),
            "published" => Some(PostStatus::Published),
            _ => None,
        }
    }
}

/// Resolve the publish timestamp for a save.
///
/// Publishing stamps `now` only when no timestamp is set yet, so
/// re-publishing preserves the original date. Demoting to draft clears the
/// timestamp unconditionally. Redundant saves are idempotent.
pub fn resolve_published_at(
    status: PostStatus,
    current: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match status {
        PostStatus::Published => current.or(Some(now)),
        PostStatus::Draft => None,
    }
}

/// Estimate reading time in minutes from the sanitized body word count,
/// never reporting less than one minute. Halves round to the even minute,
/// so 500 words at 200 wpm reads as 2 minutes, 700 as 4.
pub fn estimate_reading_time(body: &str) -> i32 {
    let words = sanitize_plain_text(body).split_whitespace().count();
    (words as f64 / WORDS_PER_MINUTE).round_ties_even().max(1.0) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_first_publish_stamps_now() {
        assert_eq!(
            resolve_published_at(PostStatus::Published, None, at(9)),
            Some(at(9))
        );
    }

    #[test]
    fn test_republish_preserves_original_timestamp() {
        assert_eq!(
            resolve_published_at(PostStatus::Published, Some(at(9)), at(12)),
            Some(at(9))
        );
    }

    #[test]
    fn test_demoting_to_draft_clears_timestamp() {
        assert_eq!(resolve_published_at(PostStatus::Draft, Some(at(9)), at(12)), None);
        assert_eq!(resolve_published_at(PostStatus::Draft, None, at(12)), None);
    }

    #[test]
    fn test_reading_time_floors_at_one_minute() {
        assert_eq!(estimate_reading_time(""), 1);
        assert_eq!(estimate_reading_time("<p>just a few words</p>"), 1);
    }

    #[test]
    fn test_reading_time_counts_sanitized_words() {
        let body = format!("<p>{}</p>", "word ".repeat(1000));
        assert_eq!(estimate_reading_time(&body), 5);
    }

    #[test]
    fn test_reading_time_rounds_halves_to_even() {
        // 500 words / 200 wpm = 2.5 -> 2; 700 / 200 = 3.5 -> 4
        assert_eq!(estimate_reading_time(&"word ".repeat(500)), 2);
        assert_eq!(estimate_reading_time(&"word ".repeat(700)), 4);
    }

    #[test]
    fn test_status_round_trips_through_strings() {
        assert_eq!(PostStatus::parse("draft"), Some(PostStatus::Draft));
        assert_eq!(PostStatus::parse("published"), Some(PostStatus::Published));
        assert_eq!(PostStatus::parse("archived"), None);
        assert_eq!(PostStatus::Published.as_str(), "published");
    }
}
