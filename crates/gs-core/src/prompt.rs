//! Interactive credential prompts.

use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Password};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("credential prompt failed: {0}")]
pub struct PromptError(pub String);

impl From<dialoguer::Error> for PromptError {
    fn from(e: dialoguer::Error) -> Self {
        PromptError(e.to_string())
    }
}

/// Username and password for the default auth flow.
#[derive(Clone)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Source of interactive credentials. Implementations block until answered.
pub trait CredentialPrompt: Send + Sync {
    /// Send the user to `login_url` and read back the API key they obtain there.
    fn api_key(&self, login_url: &str) -> Result<String, PromptError>;

    /// Ask for a username and a masked password.
    fn login(&self) -> Result<LoginCredentials, PromptError>;
}

/// Terminal prompts via `dialoguer`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl CredentialPrompt for TerminalPrompt {
    fn api_key(&self, login_url: &str) -> Result<String, PromptError> {
        eprintln!("Please visit {login_url} to obtain your API key.");
        let key: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("Paste your API key")
            .interact_text()?;
        Ok(key.trim().to_string())
    }

    fn login(&self) -> Result<LoginCredentials, PromptError> {
        let theme = ColorfulTheme::default();
        let username: String = Input::with_theme(&theme)
            .with_prompt("Username")
            .interact_text()?;
        let password = Password::with_theme(&theme)
            .with_prompt("Password")
            .interact()?;
        Ok(LoginCredentials { username, password })
    }
}
