use serde::Deserialize;
use serde_json::Value;

/// Response from the `/trigger` endpoint. The API reports failures in-band,
/// so `snapshot_id` is optional and its absence is a submission error.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerResponse {
    pub snapshot_id: Option<String>,
}

/// Snapshot `status` values that mean the collection is still computing.
pub const IN_PROGRESS_STATUSES: &[&str] = &["running", "building", "collecting", "closing"];

/// A decoded snapshot fetch.
#[derive(Debug, Clone)]
pub enum SnapshotBody {
    /// Terminal: the full item list, errored inputs included.
    Items(Vec<Value>),
    /// The collection is still running; carries the reported status.
    InProgress(String),
    /// Anything else. The caller keeps waiting up to its deadline.
    Unknown(Value),
}

/// Decode a raw snapshot response body.
///
/// The API serves two encodings of the terminal case: a single JSON array,
/// or NDJSON with one object per line. NDJSON lines that fail to parse are
/// dropped individually; one corrupt line never aborts the poll.
pub fn decode_snapshot(body: &str) -> SnapshotBody {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        return match value {
            Value::Array(items) => SnapshotBody::Items(items),
            Value::Object(ref map) => match map.get("status").and_then(Value::as_str) {
                Some(status) if IN_PROGRESS_STATUSES.contains(&status) => {
                    SnapshotBody::InProgress(status.to_string())
                }
                _ => SnapshotBody::Unknown(value),
            },
            other => SnapshotBody::Unknown(other),
        };
    }

    let mut items = Vec::new();
    let mut dropped = 0usize;
    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(item) => items.push(item),
            Err(err) => {
                dropped += 1;
                tracing::warn!(%err, "Dropping malformed NDJSON line");
            }
        }
    }
    if items.is_empty() {
        // Not JSON and not NDJSON either: an HTML error page, an empty 200.
        // Terminal-with-nothing would end the job silently empty, so the
        // caller keeps waiting instead.
        tracing::warn!(dropped, "Snapshot body not decodable, still waiting");
        return SnapshotBody::Unknown(Value::String(body.to_string()));
    }
    if dropped > 0 {
        tracing::warn!(dropped, kept = items.len(), "Snapshot NDJSON had malformed lines");
    }
    SnapshotBody::Items(items)
}

/// Split terminal snapshot items into successes and errors.
/// An item is an error iff it carries an `error` field.
pub fn partition_items(items: Vec<Value>) -> (Vec<Value>, Vec<Value>) {
    items
        .into_iter()
        .partition(|item| item.get("error").is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn array_body_is_terminal() {
        let body = r#"[{"asin":"B01"},{"asin":"B02","error":"not found"}]"#;
        match decode_snapshot(body) {
            SnapshotBody::Items(items) => assert_eq!(items.len(), 2),
            other => panic!("expected items, got {other:?}"),
        }
    }

    #[test]
    fn running_status_is_in_progress() {
        for status in ["running", "building", "collecting", "closing"] {
            let body = format!(r#"{{"status":"{status}"}}"#);
            match decode_snapshot(&body) {
                SnapshotBody::InProgress(s) => assert_eq!(s, status),
                other => panic!("expected in-progress, got {other:?}"),
            }
        }
    }

    #[test]
    fn unexpected_object_is_unknown() {
        match decode_snapshot(r#"{"status":"exploded"}"#) {
            SnapshotBody::Unknown(_) => {}
            other => panic!("expected unknown, got {other:?}"),
        }
        match decode_snapshot(r#"{"message":"who knows"}"#) {
            SnapshotBody::Unknown(_) => {}
            other => panic!("expected unknown, got {other:?}"),
        }
    }

    #[test]
    fn ndjson_skips_malformed_lines() {
        let body = "{\"asin\":\"B01\"}\nnot json at all\n{\"asin\":\"B02\"}\n\n{\"asin\":\"B03\"}";
        match decode_snapshot(body) {
            SnapshotBody::Items(items) => assert_eq!(items.len(), 3),
            other => panic!("expected items, got {other:?}"),
        }
    }

    #[test]
    fn non_json_body_is_not_terminal() {
        // An HTML error page must not complete the job with zero items.
        match decode_snapshot("<html><body>Service busy</body></html>") {
            SnapshotBody::Unknown(_) => {}
            other => panic!("expected unknown, got {other:?}"),
        }
    }

    #[test]
    fn empty_body_is_not_terminal() {
        match decode_snapshot("") {
            SnapshotBody::Unknown(_) => {}
            other => panic!("expected unknown, got {other:?}"),
        }
        match decode_snapshot("   \n  \n") {
            SnapshotBody::Unknown(_) => {}
            other => panic!("expected unknown, got {other:?}"),
        }
    }

    #[test]
    fn partition_splits_on_error_field() {
        let items = vec![
            json!({"asin": "B01", "best_price": 9.99}),
            json!({"asin": "B02", "error": "blocked"}),
            json!({"asin": "B03"}),
        ];
        let (ok, errs) = partition_items(items);
        assert_eq!(ok.len(), 2);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0]["asin"], "B02");
    }
}
