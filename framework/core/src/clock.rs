use chrono::{Local, Utc};

/// Local wall-clock time as written at the start of every log and watcher line.
pub fn log_timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Identifier for a new sweep run, derived from the local start time.
pub fn new_run_id() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Seconds since the Unix epoch.
pub fn unix_timestamp() -> i64 {
    Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_format_run_id_as_date_and_time() {
        let run_id = new_run_id();
        assert_eq!(run_id.len(), "20240101_120000".len());
        assert_eq!(run_id.chars().nth(8), Some('_'));
        assert!(run_id
            .chars()
            .enumerate()
            .all(|(i, c)| i == 8 || c.is_ascii_digit()));
    }

    #[test]
    fn test_should_format_log_timestamp() {
        let stamp = log_timestamp();
        assert_eq!(stamp.len(), "2024-01-01 12:00:00".len());
        assert_eq!(&stamp[4..5], "-");
        assert_eq!(&stamp[10..11], " ");
    }
}
