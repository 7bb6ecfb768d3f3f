//! Timestamp and report envelope helpers shared by the CLI and the stores.

use serde_json::Value as JsonValue;
use ulid::Ulid;

/// Unix-epoch seconds with a `Z` suffix, e.g. `1771220592Z`.
pub fn now_epoch_z() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("{}Z", secs)
}

/// Wraps a JSON report produced by a CLI command.
///
/// Keys of `extra` are merged into the top level; they win over the base keys.
pub fn report_envelope(cmd: &str, status: &str, extra: JsonValue) -> JsonValue {
    let mut base = serde_json::json!({
        "apollo_version": env!("CARGO_PKG_VERSION"),
        "ts": now_epoch_z(),
        "report_id": Ulid::new().to_string(),
        "cmd": cmd,
        "status": status
    });
    if let (Some(base_obj), Some(extra_obj)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in extra_obj {
            base_obj.insert(k.clone(), v.clone());
        }
    }
    base
}
