use crate::error::LockError;

/// Trust-agent notification channel. This core only reports state; it never
/// initiates trust decisions. Both notifications are informational: a
/// transport failure from either is logged by the caller and swallowed.
pub trait TrustAgent: Send + Sync {
    /// The user authenticated successfully.
    fn user_present(&self, user_id: i32) -> Result<(), LockError>;

    /// The persisted trust-usually-managed flag changed for this user.
    fn trust_usually_managed_changed(&self, user_id: i32, managed: bool) -> Result<(), LockError>;
}

/// No trust agents registered.
#[derive(Debug, Default)]
pub struct NoopTrustAgent;

impl TrustAgent for NoopTrustAgent {
    fn user_present(&self, _user_id: i32) -> Result<(), LockError> {
        Ok(())
    }

    fn trust_usually_managed_changed(&self, _user_id: i32, _managed: bool) -> Result<(), LockError> {
        Ok(())
    }
}
