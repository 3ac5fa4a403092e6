//! Human-readable formatting helpers for listings and summaries.

use chrono::{DateTime, Utc};

/// Format a byte count with binary units (B, KiB, MiB, ...).
pub fn byte_count_binary(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let units = ["KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];
    format!("{:.1} {}", bytes as f64 / div as f64, units[exp])
}

/// Format a timestamp as a relative "ago" string.
pub fn human_duration(since: &DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(*since);

    let secs = duration.num_seconds();
    if secs < 0 {
        return "just now".to_string();
    }
    if secs < 60 {
        return format!("{secs} seconds ago");
    }

    let mins = duration.num_minutes();
    if mins < 60 {
        return format!("{mins} minutes ago");
    }

    let hours = duration.num_hours();
    if hours < 24 {
        return format!("{hours} hours ago");
    }

    let days = duration.num_days();
    if days < 30 {
        return format!("{days} days ago");
    }

    let months = days / 30;
    if months < 12 {
        return format!("{months} months ago");
    }

    format!("{} years ago", days / 365)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_byte_count_binary_bytes() {
        assert_eq!(byte_count_binary(0), "0 B");
        assert_eq!(byte_count_binary(1023), "1023 B");
    }

    #[test]
    fn test_byte_count_binary_kib() {
        assert_eq!(byte_count_binary(1024), "1.0 KiB");
        assert_eq!(byte_count_binary(1536), "1.5 KiB");
    }

    #[test]
    fn test_byte_count_binary_mib() {
        assert_eq!(byte_count_binary(5 * 1024 * 1024), "5.0 MiB");
    }

    #[test]
    fn test_byte_count_binary_gib() {
        assert_eq!(byte_count_binary(3 * 1024 * 1024 * 1024), "3.0 GiB");
    }

    #[test]
    fn test_human_duration_seconds() {
        let t = Utc::now() - Duration::seconds(30);
        assert!(human_duration(&t).contains("seconds ago"));
    }

    #[test]
    fn test_human_duration_hours() {
        let t = Utc::now() - Duration::hours(3);
        assert_eq!(human_duration(&t), "3 hours ago");
    }

    #[test]
    fn test_human_duration_future() {
        let t = Utc::now() + Duration::hours(1);
        assert_eq!(human_duration(&t), "just now");
    }
}
