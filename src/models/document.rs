use super::lock::LockState;
use super::release::{Release, ReleaseId};
use serde::{Deserialize, Serialize};

/// Stored shape of a release: business fields and lock fields in one record.
///
/// Both halves are written in the same transaction, which keeps the lock and the
/// status atomic with respect to each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseDocument {
    #[serde(flatten)]
    pub release: Release,
    #[serde(flatten)]
    pub lock: LockState,
}

impl ReleaseDocument {
    pub fn new(release: Release) -> Self {
        Self {
            release,
            lock: LockState::default(),
        }
    }

    pub fn id(&self) -> &ReleaseId {
        &self.release.id
    }

    pub fn into_parts(self) -> (Release, LockState) {
        (self.release, self.lock)
    }
}

impl From<Release> for ReleaseDocument {
    fn from(release: Release) -> Self {
        Self::new(release)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActorRef;
    use chrono::Utc;

    #[test]
    fn test_document_flattens_lock_fields_next_to_release_fields() {
        let now = Utc::now();
        let mut document = ReleaseDocument::new(Release::new("R7", vec![], now));
        document.lock.grant(
            ActorRef {
                id: "u1".to_string(),
                name: "Dana".to_string(),
            },
            now,
        );

        let json = serde_json::to_value(&document).unwrap();
        assert_eq!(json["id"], "R7");
        assert_eq!(json["status"], "Entered");
        assert_eq!(json["lockHolder"]["name"], "Dana");
        assert!(json.get("lock").is_none());

        let parsed: ReleaseDocument = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, document);
    }

    #[test]
    fn test_missing_lock_fields_read_as_unlocked() {
        let release = Release::new("R8", vec![], Utc::now());
        let json = serde_json::to_value(&release).unwrap();
        let parsed: ReleaseDocument = serde_json::from_value(json).unwrap();
        assert!(!parsed.lock.is_held());
    }
}
