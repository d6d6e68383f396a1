use serde::{Deserialize, Serialize};

/// Complexity classes, ordered weakest to strongest.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialQuality {
    Unspecified,
    Something,
    Numeric,
    Alphabetic,
    Alphanumeric,
    Complex,
}

/// Device-policy authority. Queried for requirements, never mutated by this
/// core. Calls may fail only on the implementation's own transport; the
/// built-in `StaticPolicy` is infallible.
pub trait DevicePolicy: Send + Sync {
    /// Minimum complexity class a new credential must meet.
    fn required_quality(&self, user_id: i32) -> CredentialQuality;

    /// Reuse-history depth. Zero disables history enforcement.
    fn history_depth(&self, user_id: i32) -> usize;

    /// Failed-attempt ceiling at which the device should be wiped.
    /// Zero means no wipe policy.
    fn max_failed_for_wipe(&self, user_id: i32) -> u32;
}

/// Fixed policy values, the default when no policy authority is wired in.
#[derive(Debug, Clone)]
pub struct StaticPolicy {
    pub required_quality: CredentialQuality,
    pub history_depth: usize,
    pub max_failed_for_wipe: u32,
}

impl Default for StaticPolicy {
    fn default() -> Self {
        Self {
            required_quality: CredentialQuality::Unspecified,
            history_depth: 0,
            max_failed_for_wipe: 0,
        }
    }
}

impl DevicePolicy for StaticPolicy {
    fn required_quality(&self, _user_id: i32) -> CredentialQuality {
        self.required_quality
    }

    fn history_depth(&self, _user_id: i32) -> usize {
        self.history_depth
    }

    fn max_failed_for_wipe(&self, _user_id: i32) -> u32 {
        self.max_failed_for_wipe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_ordering() {
        assert!(CredentialQuality::Something < CredentialQuality::Numeric);
        assert!(CredentialQuality::Numeric < CredentialQuality::Alphanumeric);
        assert!(CredentialQuality::Alphanumeric < CredentialQuality::Complex);
    }
}
