/// Human-readable travel time. Anything under an hour stays in minutes;
/// above that a remainder that rounds up to 60 rolls into the hour count.
pub fn format_duration(minutes: f64) -> String {
    let minutes = minutes.max(0.0);
    let total = minutes.round() as u64;
    if minutes < 60.0 {
        return format!("{total} minutes");
    }

    let hours = total / 60;
    let remainder = total % 60;
    let unit = if hours > 1 { "hours" } else { "hour" };
    if remainder == 0 {
        format!("{hours} {unit}")
    } else {
        format!("{hours} {unit} {remainder} minutes")
    }
}

pub fn format_distance(km: f64) -> String {
    if km < 1.0 {
        format!("{} meters", (km * 1000.0).round())
    } else {
        format!("{km:.1} km")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(format_duration(0.0), "0 minutes");
        assert_eq!(format_duration(45.4), "45 minutes");
        assert_eq!(format_duration(60.0), "1 hour");
        assert_eq!(format_duration(75.0), "1 hour 15 minutes");
        assert_eq!(format_duration(150.0), "2 hours 30 minutes");
        assert_eq!(format_duration(180.2), "3 hours");
    }

    #[test]
    fn rounded_remainder_carries() {
        assert_eq!(format_duration(119.7), "2 hours");
        assert_eq!(format_duration(60.4), "1 hour");
    }

    #[test]
    fn under_an_hour_stays_in_minutes() {
        assert_eq!(format_duration(59.6), "60 minutes");
        assert_eq!(format_duration(59.4), "59 minutes");
    }

    #[test]
    fn distances() {
        assert_eq!(format_distance(0.25), "250 meters");
        assert_eq!(format_distance(0.0), "0 meters");
        assert_eq!(format_distance(1.0), "1.0 km");
        assert_eq!(format_distance(111.19), "111.2 km");
    }
}
