use sqlx::FromRow;
use uuid::Uuid;

/// One-time password reset grant. `used` flips to true exactly once.
#[derive(Debug, Clone, FromRow)]
pub struct PasswordResetRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub used: bool,
}

/// Result of an atomic redemption attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedeemOutcome {
    Redeemed,
    UnknownToken,
    AlreadyUsed,
    /// No user matches both the token subject and the record owner.
    UnknownUser,
}
