//! Shared helpers for the subcommands: tracing setup, blocking dispatch,
//! and user rendering.

use anyhow::{Context, Result};
use gvbridge_store::{ExternalId, User};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber. `RUST_LOG` overrides the configured level.
pub fn init_tracing(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match config.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
}

// ---------------------------------------------------------------------------
// Blocking dispatch
// ---------------------------------------------------------------------------

/// Run a synchronous store call on the blocking pool.
pub async fn blocking<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("store task failed")
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Serializable view of the persisted part of a [`User`].
#[derive(Debug, Serialize)]
pub struct UserView<'a> {
    pub mxid: &'a str,
    pub external: Option<&'a ExternalId>,
    pub management_room: &'a str,
    pub space_room: &'a str,
    pub timezone: &'a str,
}

impl<'a> From<&'a User> for UserView<'a> {
    fn from(user: &'a User) -> Self {
        Self {
            mxid: &user.mxid,
            external: user.external.as_ref(),
            management_room: &user.management_room,
            space_room: &user.space_room,
            timezone: &user.timezone,
        }
    }
}

/// One tab-separated line; `-` marks empty fields.
pub fn render_line(user: &User) -> String {
    fn or_dash(value: &str) -> &str {
        if value.is_empty() { "-" } else { value }
    }

    let external = user
        .external
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "-".to_string());

    format!(
        "{}\t{}\t{}\t{}\t{}",
        user.mxid,
        external,
        or_dash(&user.management_room),
        or_dash(&user.space_room),
        or_dash(&user.timezone),
    )
}

/// Print users either as JSON or as tab-separated lines.
pub fn print_users(users: &[User], json: bool) -> Result<()> {
    if json {
        let views: Vec<UserView<'_>> = users.iter().map(UserView::from).collect();
        println!("{}", serde_json::to_string_pretty(&views)?);
    } else {
        for user in users {
            println!("{}", render_line(user));
        }
    }
    Ok(())
}
