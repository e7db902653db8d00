use std::io::{self, Write};

use anyhow::{anyhow, bail, Result};
use jobboard_core::models::NewApplication;
use jobboard_core::{
    ApiError, AuthError, AuthService, AuthState, Config, ErrorCategory, RegisterRequest,
};
use tracing::warn;

use crate::Command;

/// Password taken from the environment instead of prompting
const PASSWORD_ENV: &str = "JOBBOARD_PASSWORD";

pub async fn run(auth: &AuthService, config: &mut Config, command: Command) -> Result<()> {
    match command {
        Command::Login { username } => login(auth, config, username).await,
        Command::Register {
            username,
            email,
            role,
        } => {
            let password = prompt_password()?;
            let request = RegisterRequest {
                username,
                email,
                password,
                role,
            };
            auth.register(&request).await.map_err(describe_auth)?;
            println!("Account created. Run `jobboard login` to sign in.");
            Ok(())
        }
        Command::Logout => {
            auth.logout()?;
            println!("Logged out.");
            Ok(())
        }
        Command::Whoami => {
            match auth.state() {
                AuthState::Anonymous => println!("Not logged in."),
                AuthState::Authenticated(session) => {
                    println!("{} ({})", session.display_name(), session.role);
                    if let Some(email) = session.email() {
                        println!("{}", email);
                    }
                }
            }
            Ok(())
        }
        Command::Offers => {
            let offers = auth.client().list_offers().await.map_err(describe)?;
            if offers.is_empty() {
                println!("No offers.");
            }
            for offer in offers {
                println!(
                    "#{:<5} {:<30} {:<20} {:<20} {}",
                    offer.id,
                    offer.title,
                    offer.company_display(),
                    offer.location_display(),
                    offer.posted_display()
                );
            }
            Ok(())
        }
        Command::Applications => {
            require_session(auth)?;
            let applications = auth.client().list_applications().await.map_err(describe)?;
            if applications.is_empty() {
                println!("No applications.");
            }
            for application in applications {
                println!(
                    "#{:<5} {:<30} {:<14} {}",
                    application.id,
                    application.title_display(),
                    application.status,
                    application
                        .applied_date
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "-".to_string())
                );
            }
            Ok(())
        }
        Command::Apply {
            job,
            cv,
            cover_letter,
            candidate,
        } => {
            let session = require_session(auth)?;
            if !session.is_candidate() {
                bail!("Only candidate accounts can apply to offers.");
            }
            let candidate = candidate
                .or_else(|| session.user_id())
                .ok_or_else(|| anyhow!("Could not determine candidate id; pass --candidate"))?;
            let created = auth
                .client()
                .submit_application(&NewApplication {
                    job,
                    candidate,
                    cover_letter,
                    cv_path: cv,
                })
                .await
                .map_err(describe)?;
            println!("Application #{} submitted ({}).", created.id, created.status);
            Ok(())
        }
        Command::Get { path } => {
            let value: serde_json::Value = auth.client().get(&path).await.map_err(describe)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
    }
}

async fn login(auth: &AuthService, config: &mut Config, username: Option<String>) -> Result<()> {
    let username = match username {
        Some(u) => u,
        None => prompt_username(config.last_username.as_deref())?,
    };
    if username.is_empty() {
        bail!("Username required");
    }
    let password = match std::env::var(PASSWORD_ENV) {
        Ok(p) if !p.is_empty() => p,
        _ => prompt_password()?,
    };

    let session = auth
        .login(&username, &password)
        .await
        .map_err(describe_auth)?;

    config.last_username = Some(username);
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }

    println!("Logged in as {} ({}).", session.display_name(), session.role);
    Ok(())
}

fn require_session(auth: &AuthService) -> Result<jobboard_core::Session> {
    auth.session()
        .ok_or_else(|| anyhow!("Not logged in. Run `jobboard login` first."))
}

fn prompt_username(last: Option<&str>) -> Result<String> {
    match last {
        Some(last) => print!("Username [{}]: ", last),
        None => print!("Username: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    Ok(match (input.is_empty(), last) {
        (true, Some(last)) => last.to_string(),
        _ => input.to_string(),
    })
}

fn prompt_password() -> Result<String> {
    let password = rpassword::prompt_password("Password: ")?;
    Ok(password)
}

/// Turn an API failure into the message shown to the user.
fn user_message(err: &ApiError) -> String {
    match err.category() {
        ErrorCategory::Expired => "Session expired or credentials rejected.".to_string(),
        ErrorCategory::NotFound => "Not found.".to_string(),
        ErrorCategory::Server => "Server error. Please try again later.".to_string(),
        ErrorCategory::Network if err.is_timeout() => {
            "Connection timed out. Please try again.".to_string()
        }
        ErrorCategory::Network => {
            "Unable to connect to server. Check your connection.".to_string()
        }
        ErrorCategory::Validation | ErrorCategory::Local => err.to_string(),
    }
}

/// The friendly message is shown first, the raw error stays in the chain.
fn describe(err: ApiError) -> anyhow::Error {
    let msg = user_message(&err);
    anyhow::Error::new(err).context(msg)
}

fn describe_auth(err: AuthError) -> anyhow::Error {
    match err {
        AuthError::Api(err @ ApiError::Unauthorized(_)) => {
            anyhow::Error::new(err).context("Invalid username or password.")
        }
        AuthError::Api(e) => describe(e),
        other => other.into(),
    }
}
