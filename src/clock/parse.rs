//! Duration syntax for time controls: decimal seconds with up to nine
//! fractional digits, nanosecond resolution.

use std::time::Duration;

use super::ControlError;

const NANOS_PER_SEC: u64 = 1_000_000_000;

pub(crate) fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos() as u64;
    if nanos % NANOS_PER_SEC == 0 {
        return (nanos / NANOS_PER_SEC).to_string();
    }
    let mut buf = [0u8; 9];
    let mut rem = nanos % NANOS_PER_SEC;
    for slot in buf.iter_mut().rev() {
        *slot = (rem % 10) as u8 + b'0';
        rem /= 10;
    }
    let mut size = 9;
    while size != 0 && buf[size - 1] == b'0' {
        size -= 1;
    }
    format!(
        "{}.{}",
        nanos / NANOS_PER_SEC,
        std::str::from_utf8(&buf[..size]).unwrap()
    )
}

pub(crate) fn parse_duration(s: &str) -> Result<Duration, ControlError> {
    let bad = || ControlError::BadDuration {
        token: s.to_string(),
    };

    let (secs_str, frac_str) = match s.find('.') {
        Some(dot) => (&s[..dot], &s[dot + 1..]),
        None => (s, ""),
    };
    if secs_str.is_empty() || !secs_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    if !frac_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    let secs: u64 = secs_str.parse().map_err(|_| bad())?;

    // Digits beyond nanosecond resolution are dropped.
    let frac_str = &frac_str[..frac_str.len().min(9)];
    let mut nanos: u64 = 0;
    if !frac_str.is_empty() {
        nanos = frac_str.parse().map_err(|_| bad())?;
        for _ in 0..9 - frac_str.len() {
            nanos *= 10;
        }
    }

    Ok(Duration::new(secs, nanos as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whole_seconds() {
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration("60").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("3600").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_fractions() {
        assert_eq!(parse_duration("0.5").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("1.25").unwrap(), Duration::from_millis(1250));
        assert_eq!(
            parse_duration("0.000000001").unwrap(),
            Duration::from_nanos(1)
        );
        // Digits beyond nanoseconds are truncated.
        assert_eq!(
            parse_duration("0.0000000019").unwrap(),
            Duration::from_nanos(1)
        );
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", ".", ".5", "-1", "1s", "1.2.3", "1.x", "x"] {
            assert!(parse_duration(bad).is_err(), "{bad:?} must not parse");
        }
    }

    #[test]
    fn test_format() {
        assert_eq!(format_duration(Duration::from_secs(60)), "60");
        assert_eq!(format_duration(Duration::from_millis(500)), "0.5");
        assert_eq!(format_duration(Duration::from_millis(1250)), "1.25");
        assert_eq!(format_duration(Duration::from_nanos(1)), "0.000000001");
        assert_eq!(format_duration(Duration::ZERO), "0");
    }

    #[test]
    fn test_round_trip() {
        for s in ["0", "1", "0.5", "179.999999999", "3.03"] {
            assert_eq!(format_duration(parse_duration(s).unwrap()), s);
        }
    }
}
