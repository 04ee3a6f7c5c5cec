/// Parse a cue timestamp (`H+:MM:SS.mmm`, comma separator tolerated) into seconds
pub fn parse_cue_timestamp(s: &str) -> Option<f64> {
    let t = s.trim();

    let (hms, frac) = match t.split_once(['.', ',']) {
        Some((a, b)) => (a, Some(b)),
        None => (t, None),
    };

    let parts: Vec<&str> = hms.split(':').collect();
    let (h, m, sec) = match parts.as_slice() {
        [h, m, s] => (h.parse::<u64>().ok()?, m.parse::<u64>().ok()?, s.parse::<u64>().ok()?),
        [m, s] => (0, m.parse::<u64>().ok()?, s.parse::<u64>().ok()?),
        _ => return None,
    };
    if m >= 60 || sec >= 60 {
        return None;
    }

    let mut millis = ((h * 60 + m) * 60 + sec) * 1000;

    if let Some(frac) = frac {
        let mut digits: String = frac.trim().chars().take(3).collect();
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        while digits.len() < 3 {
            digits.push('0');
        }
        millis += digits.parse::<u64>().ok()?;
    }

    Some(millis as f64 / 1000.0)
}

/// Format seconds as a cue timestamp with the given millisecond separator
pub fn format_cue_timestamp(seconds: f64, ms_sep: char) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let mins = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1_000;
    let millis = total_ms % 1_000;
    format!("{:02}:{:02}:{:02}{}{:03}", hours, mins, secs, ms_sep, millis)
}

/// Parse a decimal seconds attribute (`"12.34"`) into seconds
pub fn parse_decimal_seconds(s: &str) -> Option<f64> {
    let value: f64 = s.trim().parse().ok()?;
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cue_timestamp() {
        assert_eq!(parse_cue_timestamp("00:00:01.500"), Some(1.5));
        assert_eq!(parse_cue_timestamp("01:02:03.004"), Some(3723.004));
        assert_eq!(parse_cue_timestamp("123:00:00.000"), Some(442800.0));
        assert_eq!(parse_cue_timestamp("0:00:02,25"), Some(2.25));
        assert_eq!(parse_cue_timestamp("00:05.000"), Some(5.0));
        assert_eq!(parse_cue_timestamp("00:61:00.000"), None);
        assert_eq!(parse_cue_timestamp("garbage"), None);
    }

    #[test]
    fn test_format_cue_timestamp() {
        assert_eq!(format_cue_timestamp(3723.004, '.'), "01:02:03.004");
        assert_eq!(format_cue_timestamp(0.5, ','), "00:00:00,500");
        assert_eq!(format_cue_timestamp(-3.0, '.'), "00:00:00.000");
    }

    #[test]
    fn test_parse_decimal_seconds() {
        assert_eq!(parse_decimal_seconds("12.34"), Some(12.34));
        assert_eq!(parse_decimal_seconds(" 7 "), Some(7.0));
        assert_eq!(parse_decimal_seconds("inf"), None);
        assert_eq!(parse_decimal_seconds("x"), None);
    }
}
