use serde::{Deserialize, Serialize};
use validator::Validate;

/// `{"user": {"email": ...}}`
#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub user: ResetRequestUser,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetRequestUser {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
}

/// `{"password_data": {"new_password": ..., "confirm_password": ...}}`
#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub password_data: PasswordData,
}

#[derive(Debug, Deserialize)]
pub struct PasswordData {
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize)]
pub struct ResetMessage {
    pub message: &'static str,
}
