//! Login and registration forms.
//!
//! Both forms validate locally before anything reaches the account store;
//! a validation failure moves the form straight to `Error`.

use super::fetch::{lock, FetchSlot, FetchState, TaskScope};
use crate::account::{AccountError, AccountStore};
use crate::context::AppContext;
use crate::model::User;
use regex::Regex;
use std::sync::{Arc, Mutex, OnceLock};
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

const MIN_USERNAME_CHARS: usize = 3;
const MIN_PASSWORD_CHARS: usize = 6;

/// Input rejected before it is sent anywhere.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("Email and password are required")]
    MissingCredentials,

    #[error("Please fill in every field")]
    MissingFields,

    #[error("Username must be at least 3 characters")]
    UsernameTooShort,

    #[error("Email address is not valid")]
    InvalidEmail,

    #[error("Password must be at least 6 characters")]
    PasswordTooShort,

    #[error("Passwords do not match")]
    PasswordMismatch,
}

const EMAIL_PATTERN: &str = r"^[A-Za-z0-9+_.-]+@(.+)$";

/// The compiled email pattern, or `None` if it failed to compile, in which
/// case every address is rejected.
fn email_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(EMAIL_PATTERN)).as_ref().ok()
}

/// Checks registration input in the order the form reports problems.
pub fn validate_registration(
    username: &str,
    email: &str,
    password: &str,
    confirmation: &str,
) -> Result<(), FormError> {
    if [username, email, password, confirmation]
        .iter()
        .any(|field| field.trim().is_empty())
    {
        return Err(FormError::MissingFields);
    }
    if username.chars().count() < MIN_USERNAME_CHARS {
        return Err(FormError::UsernameTooShort);
    }
    if !email_pattern().is_some_and(|pattern| pattern.is_match(email)) {
        return Err(FormError::InvalidEmail);
    }
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(FormError::PasswordTooShort);
    }
    if password != confirmation {
        return Err(FormError::PasswordMismatch);
    }
    Ok(())
}

/// Turns an account error into the message a form shows.
pub fn describe_auth_error(error: &AccountError) -> String {
    match error {
        AccountError::Auth { code } => match code.as_str() {
            "EMAIL_EXISTS" => "This email is already registered".to_string(),
            "WEAK_PASSWORD" => "Password is too weak".to_string(),
            "INVALID_LOGIN_CREDENTIALS" | "INVALID_PASSWORD" | "EMAIL_NOT_FOUND" => {
                "Incorrect email or password".to_string()
            }
            _ => error.to_string(),
        },
        _ => error.to_string(),
    }
}

#[derive(Default)]
struct LoginFields {
    email: String,
    password: String,
}

pub struct LoginForm {
    account: Arc<AccountStore>,
    fields: Mutex<LoginFields>,
    outcome: Arc<FetchSlot<User>>,
    scope: TaskScope,
}

impl LoginForm {
    pub fn new(ctx: &AppContext) -> Self {
        LoginForm {
            account: ctx.account(),
            fields: Mutex::default(),
            outcome: Arc::new(FetchSlot::new("login")),
            scope: ctx.task_scope(),
        }
    }

    pub fn update_email(&self, email: &str) {
        lock(&self.fields).email = email.to_string();
    }

    pub fn update_password(&self, password: &str) {
        lock(&self.fields).password = password.to_string();
    }

    pub fn email(&self) -> String {
        lock(&self.fields).email.clone()
    }

    pub fn submit(&self) {
        let (email, password) = {
            let fields = lock(&self.fields);
            (fields.email.trim().to_string(), fields.password.clone())
        };
        if email.is_empty() || password.trim().is_empty() {
            self.outcome.fail(FormError::MissingCredentials.to_string());
            return;
        }

        let ticket = self.outcome.begin();
        let account = Arc::clone(&self.account);
        let slot = Arc::clone(&self.outcome);
        self.scope.spawn(async move {
            let result = account
                .sign_in(&email, &password)
                .await
                .map_err(|e| describe_auth_error(&e));
            slot.resolve(ticket, result);
        });
    }

    pub fn reset(&self) {
        self.outcome.reset();
    }

    pub fn state(&self) -> FetchState<User> {
        self.outcome.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState<User>> {
        self.outcome.subscribe()
    }

    pub async fn settle(&self) {
        self.scope.settle().await;
    }
}

#[derive(Default)]
struct RegisterFields {
    username: String,
    email: String,
    password: String,
    confirmation: String,
}

pub struct RegisterForm {
    account: Arc<AccountStore>,
    fields: Mutex<RegisterFields>,
    outcome: Arc<FetchSlot<User>>,
    scope: TaskScope,
}

impl RegisterForm {
    pub fn new(ctx: &AppContext) -> Self {
        RegisterForm {
            account: ctx.account(),
            fields: Mutex::default(),
            outcome: Arc::new(FetchSlot::new("register")),
            scope: ctx.task_scope(),
        }
    }

    pub fn update_username(&self, username: &str) {
        lock(&self.fields).username = username.to_string();
    }

    pub fn update_email(&self, email: &str) {
        lock(&self.fields).email = email.to_string();
    }

    pub fn update_password(&self, password: &str) {
        lock(&self.fields).password = password.to_string();
    }

    pub fn update_confirmation(&self, confirmation: &str) {
        lock(&self.fields).confirmation = confirmation.to_string();
    }

    pub fn submit(&self) {
        let (username, email, password) = {
            let fields = lock(&self.fields);
            if let Err(e) = validate_registration(
                &fields.username,
                &fields.email,
                &fields.password,
                &fields.confirmation,
            ) {
                debug!(error = %e, "registration rejected");
                self.outcome.fail(e.to_string());
                return;
            }
            (
                fields.username.trim().to_string(),
                fields.email.trim().to_string(),
                fields.password.clone(),
            )
        };

        let ticket = self.outcome.begin();
        let account = Arc::clone(&self.account);
        let slot = Arc::clone(&self.outcome);
        self.scope.spawn(async move {
            let result = account
                .sign_up(&username, &email, &password)
                .await
                .map_err(|e| describe_auth_error(&e));
            slot.resolve(ticket, result);
        });
    }

    pub fn reset(&self) {
        self.outcome.reset();
    }

    pub fn state(&self) -> FetchState<User> {
        self.outcome.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState<User>> {
        self.outcome.subscribe()
    }

    pub async fn settle(&self) {
        self.scope.settle().await;
    }
}
