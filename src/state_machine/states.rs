use serde::{Deserialize, Serialize};
use std::fmt;

/// Release status definitions.
///
/// `Entered → Staged → Verified → Loaded → Shipped`, with the single back-edge
/// `Staged → Entered` taken when verification is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReleaseStatus {
    /// Order entered, waiting to be picked and staged
    #[default]
    Entered,
    /// Goods staged at a location, waiting for a second worker to verify
    Staged,
    /// Staged goods checked by someone other than the stager
    Verified,
    /// Goods on the truck
    Loaded,
    /// Left the yard with a bill of lading
    Shipped,
}

impl ReleaseStatus {
    pub const ALL: [ReleaseStatus; 5] = [
        Self::Entered,
        Self::Staged,
        Self::Verified,
        Self::Loaded,
        Self::Shipped,
    ];

    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Shipped)
    }

    /// Whether the workflow graph has an edge from `self` to `target`
    pub fn can_transition_to(&self, target: ReleaseStatus) -> bool {
        matches!(
            (self, target),
            (Self::Entered, Self::Staged)
                | (Self::Staged, Self::Verified)
                | (Self::Staged, Self::Entered)
                | (Self::Verified, Self::Loaded)
                | (Self::Loaded, Self::Shipped)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entered => "Entered",
            Self::Staged => "Staged",
            Self::Verified => "Verified",
            Self::Loaded => "Loaded",
            Self::Shipped => "Shipped",
        }
    }
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReleaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Invalid release status: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_display() {
        for status in ReleaseStatus::ALL {
            assert_eq!(status.to_string().parse::<ReleaseStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_free_form_strings_are_rejected() {
        assert!("staged".parse::<ReleaseStatus>().is_err());
        assert!("Cancelled".parse::<ReleaseStatus>().is_err());
        assert!(" Entered".parse::<ReleaseStatus>().is_err());
    }

    #[test]
    fn test_edges() {
        assert!(ReleaseStatus::Staged.can_transition_to(ReleaseStatus::Entered));
        assert!(!ReleaseStatus::Entered.can_transition_to(ReleaseStatus::Verified));
        assert!(!ReleaseStatus::Verified.can_transition_to(ReleaseStatus::Staged));
        assert!(ReleaseStatus::ALL
            .iter()
            .all(|target| !ReleaseStatus::Shipped.can_transition_to(*target)));
        assert!(ReleaseStatus::Shipped.is_terminal());
    }
}
