use chrono::{DateTime, Timelike, Utc};
use meter_core::TokenCounts;
use serde_json::Value;

/// Placeholder model the agent writes for turns it generated itself.
const SYNTHETIC_MODEL: &str = "<synthetic>";

/// Usage carried by one completed assistant turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnUsage {
    pub model: String,
    pub tokens: TokenCounts,
    pub timestamp: Option<DateTime<Utc>>,
    pub session_id: Option<String>,
}

fn count(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(Value::as_u64).unwrap_or(0)
}

fn parse_tokens(usage: &Value) -> TokenCounts {
    let cache_creation = count(usage, "cache_creation_input_tokens");
    let (cache_write_5m, cache_write_1h) = match usage.get("cache_creation") {
        Some(split) if split.is_object() => {
            let five = count(split, "ephemeral_5m_input_tokens");
            let hour = count(split, "ephemeral_1h_input_tokens");
            // Tokens the split does not account for are billed at the 5m rate.
            let unsplit = cache_creation.saturating_sub(five.saturating_add(hour));
            (five.saturating_add(unsplit), hour)
        }
        _ => (cache_creation, 0),
    };
    TokenCounts {
        input: count(usage, "input_tokens"),
        output: count(usage, "output_tokens"),
        cache_read: count(usage, "cache_read_input_tokens"),
        cache_write_5m,
        cache_write_1h,
    }
}

/// Epoch numbers of eleven digits and up are millis, shorter ones seconds.
fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value.unsigned_abs() >= 10_000_000_000 {
        DateTime::<Utc>::from_timestamp_millis(value)
    } else {
        DateTime::<Utc>::from_timestamp(value, 0)
    }
}

pub fn normalize_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(DateTime::<Utc>::from_naive_utc_and_offset(parsed, Utc));
    }
    if let Ok(parsed) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(DateTime::<Utc>::from_naive_utc_and_offset(parsed, Utc));
    }
    if !raw.is_empty() && raw.chars().all(|ch| ch.is_ascii_digit()) {
        return raw.parse::<i64>().ok().and_then(from_epoch);
    }
    None
}

/// Truncates to the millisecond precision records are stored with.
fn to_millis(ts: DateTime<Utc>) -> Option<DateTime<Utc>> {
    ts.with_nanosecond(ts.nanosecond() / 1_000_000 * 1_000_000)
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Extracts a completed turn from an already decoded transcript line.
pub fn parse_turn(value: &Value) -> Option<TurnUsage> {
    if value.get("type").and_then(Value::as_str) != Some("assistant") {
        return None;
    }
    let message = value.get("message")?;
    let usage = message.get("usage").filter(|usage| usage.is_object())?;
    let model = non_empty(message.get("model"))?;
    if model == SYNTHETIC_MODEL {
        return None;
    }
    let tokens = parse_tokens(usage);
    if tokens.is_empty() {
        return None;
    }
    let timestamp = value
        .get("timestamp")
        .and_then(|raw| match raw {
            Value::String(text) => normalize_timestamp(text),
            Value::Number(number) => number.as_i64().and_then(from_epoch),
            _ => None,
        })
        .and_then(to_millis);
    Some(TurnUsage {
        model,
        tokens,
        timestamp,
        session_id: non_empty(value.get("sessionId")),
    })
}

/// Decodes one transcript line. `Err` means the line is not JSON (a torn
/// write or a partial tail); `Ok(None)` means it carries no billable turn.
pub fn parse_line(line: &str) -> Result<Option<TurnUsage>, serde_json::Error> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(trimmed)?;
    Ok(parse_turn(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::SecondsFormat;

    fn assistant_line(usage: &str) -> String {
        format!(
            r#"{{"type":"assistant","sessionId":"sess-1","timestamp":"2025-06-15T12:00:00.123456Z","message":{{"model":"claude-sonnet-4-5-20250929","usage":{usage}}}}}"#
        )
    }

    #[test]
    fn parses_completed_turn_with_cache_split() {
        let line = assistant_line(
            r#"{"input_tokens":10,"output_tokens":20,"cache_read_input_tokens":30,"cache_creation_input_tokens":40,"cache_creation":{"ephemeral_5m_input_tokens":15,"ephemeral_1h_input_tokens":25}}"#,
        );
        let turn = parse_line(&line).expect("json").expect("turn");
        assert_eq!(turn.model, "claude-sonnet-4-5-20250929");
        assert_eq!(turn.session_id.as_deref(), Some("sess-1"));
        assert_eq!(
            turn.tokens,
            TokenCounts {
                input: 10,
                output: 20,
                cache_read: 30,
                cache_write_5m: 15,
                cache_write_1h: 25,
            }
        );
        let ts = turn.timestamp.expect("timestamp");
        assert_eq!(
            ts.to_rfc3339_opts(SecondsFormat::Millis, true),
            "2025-06-15T12:00:00.123Z"
        );
    }

    #[test]
    fn unsplit_cache_creation_is_billed_as_five_minute() {
        let line = assistant_line(
            r#"{"input_tokens":1,"output_tokens":2,"cache_creation_input_tokens":40}"#,
        );
        let turn = parse_line(&line).expect("json").expect("turn");
        assert_eq!(turn.tokens.cache_write_5m, 40);
        assert_eq!(turn.tokens.cache_write_1h, 0);

        let partial = assistant_line(
            r#"{"input_tokens":1,"cache_creation_input_tokens":40,"cache_creation":{"ephemeral_1h_input_tokens":10}}"#,
        );
        let turn = parse_line(&partial).expect("json").expect("turn");
        assert_eq!(turn.tokens.cache_write_5m, 30);
        assert_eq!(turn.tokens.cache_write_1h, 10);
    }

    #[test]
    fn ignores_non_billable_lines() {
        assert_eq!(parse_line("").expect("blank"), None);
        assert_eq!(
            parse_line(r#"{"type":"user","message":{"content":"hi"}}"#).expect("json"),
            None
        );
        let synthetic = r#"{"type":"assistant","message":{"model":"<synthetic>","usage":{"input_tokens":5}}}"#;
        assert_eq!(parse_line(synthetic).expect("json"), None);
        let zero = assistant_line(r#"{"input_tokens":0,"output_tokens":0}"#);
        assert_eq!(parse_line(&zero).expect("json"), None);
        let no_usage = r#"{"type":"assistant","message":{"model":"claude-opus-4-1"}}"#;
        assert_eq!(parse_line(no_usage).expect("json"), None);
    }

    #[test]
    fn torn_line_is_a_decode_error() {
        assert!(parse_line(r#"{"type":"assistant","message":{"mod"#).is_err());
    }

    #[test]
    fn missing_timestamp_and_session_are_left_for_the_caller() {
        let line = r#"{"type":"assistant","message":{"model":"claude-haiku-4-5","usage":{"output_tokens":3}}}"#;
        let turn = parse_line(line).expect("json").expect("turn");
        assert_eq!(turn.timestamp, None);
        assert_eq!(turn.session_id, None);
    }

    #[test]
    fn normalizes_timestamp_shapes() {
        let expected = "2025-06-15T12:00:00.000Z";
        for raw in [
            "2025-06-15T12:00:00Z",
            "2025-06-15T14:00:00+02:00",
            "2025-06-15T12:00:00",
            "2025-06-15 12:00:00",
            "1749988800",
            "1749988800000",
        ] {
            let ts = normalize_timestamp(raw).expect(raw);
            assert_eq!(ts.to_rfc3339_opts(SecondsFormat::Millis, true), expected, "{raw}");
        }
        assert_eq!(normalize_timestamp("yesterday"), None);
    }

    #[test]
    fn numeric_timestamps_follow_the_epoch_digit_rule() {
        let expected = "2025-06-15T12:00:00.000Z";
        for raw in ["1749988800", "1749988800000"] {
            let line = format!(
                r#"{{"type":"assistant","timestamp":{raw},"message":{{"model":"claude-haiku-4-5","usage":{{"output_tokens":3}}}}}}"#
            );
            let turn = parse_line(&line).expect("json").expect("turn");
            let ts = turn.timestamp.expect("timestamp");
            assert_eq!(ts.to_rfc3339_opts(SecondsFormat::Millis, true), expected, "{raw}");
        }
    }
}
