use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;
use validator::Validate;

use super::repo_types::{Profile, User};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Request body for user registration: `{"user": {...}}`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub user: RegisterUser,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterUser {
    #[validate(length(min = 3, max = 32, message = "Username must be 3 to 32 characters long"))]
    pub username: String,
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    pub password: String,
}

/// Request body for login: `{"user": {...}}`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user: LoginUser,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginUser {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Flat partial update of the current user and their profile.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 3, max = 32, message = "Username must be 3 to 32 characters long"))]
    pub username: Option<String>,
    #[validate(email(message = "Enter a valid email address"))]
    pub email: Option<String>,
    #[validate(length(max = 100))]
    pub first_name: Option<String>,
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
    #[serde(default, with = "iso_date::option")]
    pub birth_date: Option<Date>,
    #[validate(length(max = 1000))]
    pub bio: Option<String>,
    #[validate(url(message = "Enter a valid image URL"))]
    pub image: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    pub country: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(url(message = "Enter a valid URL"))]
    pub website: Option<String>,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub is_verified: bool,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            is_verified: user.is_verified,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub token: String,
    pub message: String,
    pub data: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub message: String,
}

/// Current user with their profile.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    #[serde(flatten)]
    pub user: PublicUser,
    pub profile: Profile,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_user_validation() {
        let valid = RegisterUser {
            username: "ada_lovelace".into(),
            email: "ada@example.com".into(),
            password: "Str0ng!Pass".into(),
        };
        assert!(valid.validate().is_ok());

        let bad_email = RegisterUser {
            email: "ada-at-example.com".into(),
            ..valid_clone(&valid)
        };
        assert!(bad_email.validate().is_err());

        let short_name = RegisterUser {
            username: "ad".into(),
            ..valid_clone(&valid)
        };
        assert!(short_name.validate().is_err());
    }

    fn valid_clone(u: &RegisterUser) -> RegisterUser {
        RegisterUser {
            username: u.username.clone(),
            email: u.email.clone(),
            password: u.password.clone(),
        }
    }

    #[test]
    fn update_request_parses_partial_body() {
        let req: UpdateUserRequest = serde_json::from_value(serde_json::json!({
            "bio": "Poet of science",
            "birth_date": "1815-12-10"
        }))
        .unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.bio.as_deref(), Some("Poet of science"));
        assert!(req.birth_date.is_some());
        assert!(req.username.is_none());
    }

    #[test]
    fn update_request_rejects_bad_urls() {
        let req = UpdateUserRequest {
            website: Some("not a url".into()),
            ..Default::default()
        };
        assert!(req.validate().is_err());
    }
}
