//! Login, registration and password reset forms.

use std::sync::Arc;

use super::record;
use crate::auth::SessionManager;
use crate::backend::{SignUp, SignUpOutcome};
use crate::error::{Error, Result};
use crate::models::Session;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

pub struct AccountController {
    session: Arc<SessionManager>,
    last_error: Option<String>,
}

impl AccountController {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self {
            session,
            last_error: None,
        }
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<Session> {
        let result = self.session.sign_in(email, password).await;
        record(&mut self.last_error, result)
    }

    /// Every field is required and the passwords must match before the
    /// identity provider is called.
    pub async fn register(&mut self, form: RegisterForm) -> Result<SignUpOutcome> {
        let result = match check_registration(&form) {
            Ok(()) => {
                self.session
                    .sign_up(SignUp {
                        email: form.email.trim().to_string(),
                        password: form.password,
                        username: Some(form.username.trim().to_string()),
                    })
                    .await
            }
            Err(e) => Err(e),
        };
        record(&mut self.last_error, result)
    }

    pub async fn reset_password(&mut self, email: &str) -> Result<()> {
        let result = self.session.reset_password(email).await;
        record(&mut self.last_error, result)
    }

    pub async fn logout(&mut self) -> Result<()> {
        let result = self.session.sign_out().await;
        record(&mut self.last_error, result)
    }
}

fn check_registration(form: &RegisterForm) -> Result<()> {
    let blank = [
        form.username.trim(),
        form.email.trim(),
        form.password.as_str(),
        form.confirm_password.as_str(),
    ]
    .iter()
    .any(|field| field.is_empty());
    if blank {
        return Err(Error::Validation("all fields are required".into()));
    }
    if form.password != form.confirm_password {
        return Err(Error::Validation("passwords do not match".into()));
    }
    Ok(())
}
