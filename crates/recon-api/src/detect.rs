//! Mission-id detection from free-form chat queries.

use regex::Regex;
use std::sync::LazyLock;

static EXPLICIT_MISSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:mission|mission_id)\s+#?(\d+)").expect("regex compiles"));

static HASH_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)#(\d+)").expect("regex compiles"));

static MISSION_CONTEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)mission\D*(\d{1,10})(?:\s|$|\D)").expect("regex compiles"));

/// Pull a mission id out of queries like "mission 123", "#42" or
/// "tell me about mission 7".
pub fn detect_mission_id(query: &str) -> Option<i64> {
    if query.is_empty() {
        return None;
    }

    if let Some(caps) = EXPLICIT_MISSION.captures(query) {
        if let Ok(id) = caps[1].parse() {
            return Some(id);
        }
    }

    if let Some(caps) = HASH_ID.captures(query) {
        if let Ok(id) = caps[1].parse() {
            return Some(id);
        }
    }

    if let Some(caps) = MISSION_CONTEXT.captures(query) {
        if let Ok(id) = caps[1].parse::<i64>() {
            if (1..=999_999).contains(&id) {
                return Some(id);
            }
        }
    }

    None
}
