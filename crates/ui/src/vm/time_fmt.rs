use chrono::{DateTime, Duration, Utc};

#[must_use]
pub fn format_datetime(value: DateTime<Utc>) -> String {
    value.to_rfc3339()
}

/// `mm:ss`, rounding partial seconds up so the display never shows `00:00` early.
#[must_use]
pub fn format_countdown(remaining: Duration) -> String {
    let millis = remaining.num_milliseconds().max(0);
    let secs = (millis + 999) / 1000;
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[must_use]
pub fn format_percent(value: f64) -> String {
    format!("{value:.1}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_rounds_up() {
        assert_eq!(format_countdown(Duration::seconds(120)), "02:00");
        assert_eq!(format_countdown(Duration::milliseconds(59_001)), "01:00");
        assert_eq!(format_countdown(Duration::zero()), "00:00");
        assert_eq!(format_countdown(Duration::seconds(-3)), "00:00");
    }

    #[test]
    fn percent_has_one_decimal() {
        assert_eq!(format_percent(75.0), "75.0%");
        assert_eq!(format_percent(100.0 / 3.0), "33.3%");
    }
}
