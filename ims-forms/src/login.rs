use ims_auth::LoginRequest;
use validator::Validate;

use crate::controller::{FormDraft, FormField};
use crate::errors::FieldErrors;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
    Email,
    Password,
    RememberMe,
}

impl FormField for LoginField {
    fn name(&self) -> &'static str {
        match self {
            LoginField::Email => "email",
            LoginField::Password => "password",
            LoginField::RememberMe => "remember_me",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Validate)]
pub struct LoginDraft {
    #[validate(email(message = "must be a valid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
    pub remember_me: bool,
}

impl FormDraft for LoginDraft {
    type Field = LoginField;
    type Output = LoginRequest;

    fn set(&mut self, field: LoginField, value: &str) {
        match field {
            LoginField::Email => self.email = value.trim().to_string(),
            LoginField::Password => self.password = value.to_string(),
            LoginField::RememberMe => {
                self.remember_me = matches!(value.trim(), "true" | "on" | "1" | "yes")
            }
        }
    }

    fn check(&self) -> Result<LoginRequest, FieldErrors> {
        self.validate()
            .map_err(|e| FieldErrors::from_validation(&e))?;
        Ok(LoginRequest {
            email: self.email.clone(),
            password: self.password.clone(),
            remember_me: self.remember_me,
        })
    }
}
