use crate::error::TimecodeError;

/// `HH:MM:SS,mmm` で表現できる最大値 (99:59:59,999)
pub const MAX_TIMECODE_MS: u64 = 359_999_999;

const MS_PER_SECOND: u64 = 1000;
const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;

/// ミリ秒を字幕タイムコード `HH:MM:SS,mmm` に変換
///
/// 範囲外の値は折り返さずに `TimecodeError::Range` を返す。
///
/// # Examples
///
/// ```
/// # use vdub::timecode::format_ms;
/// assert_eq!(format_ms(1500).unwrap(), "00:00:01,500");
/// assert_eq!(format_ms(3_723_004).unwrap(), "01:02:03,004");
/// ```
pub fn format_ms(ms: u64) -> Result<String, TimecodeError> {
    if ms > MAX_TIMECODE_MS {
        return Err(TimecodeError::Range(ms));
    }

    let hours = ms / MS_PER_HOUR;
    let minutes = (ms % MS_PER_HOUR) / MS_PER_MINUTE;
    let seconds = (ms % MS_PER_MINUTE) / MS_PER_SECOND;
    let millis = ms % MS_PER_SECOND;

    Ok(format!(
        "{:02}:{:02}:{:02},{:03}",
        hours, minutes, seconds, millis
    ))
}

/// 字幕タイムコード `HH:MM:SS,mmm` をミリ秒に変換
///
/// ミリ秒の区切りは `,` を正とするが、`.` も受け付ける。
/// 分・秒が60以上のものは不正な形式として扱う。
///
/// # Examples
///
/// ```
/// # use vdub::timecode::parse_timecode;
/// assert_eq!(parse_timecode("00:00:03,250").unwrap(), 3250);
/// assert!(parse_timecode("00:61:00,000").is_err());
/// ```
pub fn parse_timecode(s: &str) -> Result<u64, TimecodeError> {
    let invalid = || TimecodeError::Format(s.to_string());
    let trimmed = s.trim();

    let (clock, millis) = trimmed
        .split_once(',')
        .or_else(|| trimmed.split_once('.'))
        .ok_or_else(invalid)?;

    let mut parts = clock.split(':');
    let (hours, minutes, seconds) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(m), Some(s), None) => (h, m, s),
        _ => return Err(invalid()),
    };

    let hours = parse_field(hours, 2, &invalid)?;
    let minutes = parse_field(minutes, 2, &invalid)?;
    let seconds = parse_field(seconds, 2, &invalid)?;
    let millis = parse_field(millis, 3, &invalid)?;

    if minutes >= 60 || seconds >= 60 {
        return Err(invalid());
    }

    Ok(hours * MS_PER_HOUR + minutes * MS_PER_MINUTE + seconds * MS_PER_SECOND + millis)
}

/// 固定桁の数字フィールドを解釈
fn parse_field(
    field: &str,
    width: usize,
    invalid: &dyn Fn() -> TimecodeError,
) -> Result<u64, TimecodeError> {
    if field.len() != width || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    field.parse().map_err(|_| invalid())
}

/// 浮動小数の秒をミリ秒に変換（四捨五入）
///
/// 負値や非有限値は 0 として扱う。
pub fn seconds_to_ms(seconds: f64) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * 1000.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_basic() {
        assert_eq!(format_ms(0).unwrap(), "00:00:00,000");
        assert_eq!(format_ms(1500).unwrap(), "00:00:01,500");
        assert_eq!(format_ms(3250).unwrap(), "00:00:03,250");
        assert_eq!(format_ms(MAX_TIMECODE_MS).unwrap(), "99:59:59,999");
    }

    #[test]
    fn test_format_out_of_range() {
        assert_eq!(
            format_ms(MAX_TIMECODE_MS + 1),
            Err(TimecodeError::Range(MAX_TIMECODE_MS + 1))
        );
    }

    #[test]
    fn test_parse_basic() {
        assert_eq!(parse_timecode("00:00:02,965").unwrap(), 2965);
        assert_eq!(parse_timecode("00:01:30,500").unwrap(), 90_500);
        assert_eq!(parse_timecode("01:00:00,000").unwrap(), 3_600_000);
        assert_eq!(parse_timecode(" 00:00:01.250 ").unwrap(), 1250);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "",
            "00:00:01",
            "0:00:01,000",
            "00:00:01,00",
            "00:00:60,000",
            "00:60:00,000",
            "aa:00:00,000",
            "00:00:00:00,000",
            "-1:00:00,000",
        ] {
            assert!(parse_timecode(bad).is_err(), "should reject {:?}", bad);
        }
    }

    #[test]
    fn test_round_trip_sampled_range() {
        // 全範囲を一定間隔で確認（境界を含む）
        let mut t = 0u64;
        while t <= MAX_TIMECODE_MS {
            assert_eq!(parse_timecode(&format_ms(t).unwrap()).unwrap(), t);
            t += 9_973;
        }
        for t in [0, 1, 999, 1000, 59_999, 60_000, 3_599_999, 3_600_000, MAX_TIMECODE_MS] {
            assert_eq!(parse_timecode(&format_ms(t).unwrap()).unwrap(), t);
        }
    }

    #[test]
    fn test_seconds_to_ms() {
        assert_eq!(seconds_to_ms(1.5), 1500);
        assert_eq!(seconds_to_ms(3.25), 3250);
        assert_eq!(seconds_to_ms(0.0004), 0);
        assert_eq!(seconds_to_ms(0.0006), 1);
        assert_eq!(seconds_to_ms(-2.0), 0);
        assert_eq!(seconds_to_ms(f64::NAN), 0);
    }
}
