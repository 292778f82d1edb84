//! Field wrapper carrying its own creation and update timestamps.

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// Current wall-clock time in milliseconds.
pub fn now_millis() -> Timestamp {
    chrono::Utc::now().timestamp_millis()
}

/// A single mutable field of a secret.
///
/// Each property tracks its own recency so two copies of a secret can be
/// merged field by field. Invariant: `created <= last_updated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property<T> {
    pub value: T,
    pub created: Timestamp,
    pub last_updated: Timestamp,
}

impl<T> Property<T> {
    /// A property first set at `now`.
    pub fn new(value: T, now: Timestamp) -> Self {
        Self {
            value,
            created: now,
            last_updated: now,
        }
    }

    /// A property with explicit timestamps; `last_updated` is raised to
    /// `created` if it is earlier.
    pub fn with_times(value: T, created: Timestamp, last_updated: Timestamp) -> Self {
        Self {
            value,
            created,
            last_updated: last_updated.max(created),
        }
    }

    /// Replace the value, refreshing only this property's `last_updated`.
    pub fn set(&mut self, value: T, now: Timestamp) {
        self.value = value;
        self.last_updated = now.max(self.created);
    }

    /// Whichever of the two was updated last. Ties go to `theirs`.
    pub fn newest<'a>(ours: &'a Self, theirs: &'a Self) -> &'a Self {
        if ours.last_updated > theirs.last_updated {
            ours
        } else {
            theirs
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_refreshes_last_updated_only() {
        let mut prop = Property::new("a".to_string(), 100);
        prop.set("b".to_string(), 250);
        assert_eq!(prop.value, "b");
        assert_eq!(prop.created, 100);
        assert_eq!(prop.last_updated, 250);
    }

    #[test]
    fn last_updated_never_precedes_created() {
        let mut prop = Property::new(1, 500);
        prop.set(2, 10);
        assert_eq!(prop.last_updated, 500);

        let prop = Property::with_times(3, 400, 300);
        assert_eq!(prop.last_updated, 400);
    }

    #[test]
    fn newest_prefers_later_update_and_theirs_on_tie() {
        let old = Property::with_times("old", 1, 10);
        let new = Property::with_times("new", 1, 20);
        assert_eq!(Property::newest(&old, &new).value, "new");
        assert_eq!(Property::newest(&new, &old).value, "new");

        let tie = Property::with_times("tie", 1, 10);
        assert_eq!(Property::newest(&old, &tie).value, "tie");
    }

    #[test]
    fn json_shape_is_camel_case() {
        let prop = Property::new(vec!["x".to_string()], 7);
        let json = serde_json::to_value(&prop).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "value": ["x"], "created": 7, "lastUpdated": 7 })
        );
    }
}
