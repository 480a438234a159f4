//! Availability transitions between two observations of a scene

use crate::{Dataset, SceneId, SceneRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Classification of one observation against the stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Transition {
    /// First observation, downloadable
    NewAvailable,
    /// First observation, not downloadable
    NewUnavailable,
    /// Known scene that was unavailable and now is downloadable
    BecameAvailable,
    /// Known scene that was downloadable and no longer is
    BecameUnavailable,
    /// Availability is the same as the stored record
    Unchanged,
}

impl Transition {
    /// Classify an observed availability against what the store holds
    #[must_use]
    pub fn classify(previous: Option<&SceneRecord>, available: bool) -> Self {
        match (previous.map(|p| p.available), available) {
            (None, true) => Transition::NewAvailable,
            (None, false) => Transition::NewUnavailable,
            (Some(false), true) => Transition::BecameAvailable,
            (Some(true), false) => Transition::BecameUnavailable,
            (Some(_), _) => Transition::Unchanged,
        }
    }

    /// Whether this transition is reported as a change event
    #[inline]
    #[must_use]
    pub fn is_change(self) -> bool {
        !matches!(self, Transition::Unchanged)
    }

    /// Whether the scene is downloadable after this transition
    #[inline]
    #[must_use]
    pub fn ends_available(self) -> bool {
        matches!(self, Transition::NewAvailable | Transition::BecameAvailable)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Transition::NewAvailable => "NEW_AVAILABLE",
            Transition::NewUnavailable => "NEW_UNAVAILABLE",
            Transition::BecameAvailable => "BECAME_AVAILABLE",
            Transition::BecameUnavailable => "BECAME_UNAVAILABLE",
            Transition::Unchanged => "UNCHANGED",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique synchronization run identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Ulid);

impl RunId {
    /// Generate new run ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A committed availability change, handed to the notification side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub run_id: RunId,
    pub scene_id: SceneId,
    pub dataset: Dataset,
    pub transition: Transition,
    pub display_id: String,
    pub observed_at: DateTime<Utc>,
}

impl ChangeEvent {
    /// Event describing how `record` was reached
    #[must_use]
    pub fn for_record(run_id: RunId, record: &SceneRecord, transition: Transition) -> Self {
        Self {
            run_id,
            scene_id: record.scene_id.clone(),
            dataset: record.dataset,
            transition,
            display_id: record.display_id.clone(),
            observed_at: record.last_checked_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CatalogScene;
    use proptest::prelude::*;

    fn stored(available: bool) -> SceneRecord {
        SceneRecord::observe(
            Dataset::DeclassI,
            CatalogScene::new("E1", "D1").with_available(available),
            None,
            Utc::now(),
        )
    }

    #[test]
    fn classify_first_observation() {
        assert_eq!(Transition::classify(None, true), Transition::NewAvailable);
        assert_eq!(Transition::classify(None, false), Transition::NewUnavailable);
    }

    #[test]
    fn classify_known_scene() {
        assert_eq!(
            Transition::classify(Some(&stored(false)), true),
            Transition::BecameAvailable
        );
        assert_eq!(
            Transition::classify(Some(&stored(true)), false),
            Transition::BecameUnavailable
        );
        assert_eq!(
            Transition::classify(Some(&stored(true)), true),
            Transition::Unchanged
        );
    }

    #[test]
    fn serde_uses_screaming_case() {
        let json = serde_json::to_string(&Transition::BecameUnavailable).unwrap();
        assert_eq!(json, "\"BECAME_UNAVAILABLE\"");
        assert_eq!(Transition::BecameUnavailable.to_string(), "BECAME_UNAVAILABLE");
    }

    proptest! {
        #[test]
        fn prop_change_iff_availability_differs_or_new(
            previous in prop::option::of(any::<bool>()),
            available in any::<bool>(),
        ) {
            let record = previous.map(stored);
            let transition = Transition::classify(record.as_ref(), available);
            let expected_change = previous.map_or(true, |p| p != available);
            prop_assert_eq!(transition.is_change(), expected_change);
            if transition.is_change() {
                prop_assert_eq!(transition.ends_available(), available);
            }
        }
    }
}
