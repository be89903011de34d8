//! CLI entry point for the gvbridge user database.
//!
//! The `gvbridge-db` command lists, inspects and edits bridge user records
//! directly in the SQLite file, for operators fixing accounts by hand.

mod config;
mod helpers;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use gvbridge_store::{Database, ExternalId, UserQuery};
use tracing::info;

use crate::config::{CliConfig, DEFAULT_CONFIG_PATH};
use crate::helpers::{blocking, init_tracing, print_users};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Inspect and edit gvbridge user records.
#[derive(Debug, Parser)]
#[command(name = "gvbridge-db", version)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List every user.
    List {
        #[arg(long)]
        json: bool,
    },

    /// Show one user by Matrix ID.
    Show {
        mxid: String,
        #[arg(long)]
        json: bool,
    },

    /// Find a user by the local part of their linked account.
    Find {
        username: String,
        #[arg(long)]
        json: bool,
    },

    /// Create a new user record.
    Create {
        mxid: String,
        /// Local part of the external account to link.
        #[arg(long)]
        external: Option<String>,
        #[arg(long, default_value = "")]
        management_room: String,
        #[arg(long, default_value = "")]
        space_room: String,
        #[arg(long, default_value = "")]
        timezone: String,
    },

    /// Change a user's timezone.
    SetTimezone { mxid: String, timezone: String },

    /// Link an external account to a user.
    Link { mxid: String, user: String },

    /// Remove the linked external account from a user.
    Unlink { mxid: String },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = CliConfig::load(&cli.config)?;
    init_tracing(&config.logging);

    let path = config.database.path.clone();
    let options = config.database.options();
    let db = blocking(move || Database::open_and_migrate(&path, &options))
        .await?
        .context("failed to open database")?;
    info!(path = %config.database.path.display(), "store initialized");

    let users = UserQuery::new(db, tracing::info_span!("user_store"));
    run(users, cli.command).await
}

async fn run(users: UserQuery, command: Commands) -> Result<()> {
    match command {
        Commands::List { json } => {
            let all = blocking(move || users.get_all()).await?;
            print_users(&all, json)
        }
        Commands::Show { mxid, json } => {
            let user = blocking(move || users.get_by_mxid(&mxid)).await?;
            match user {
                Some(user) => print_users(&[user], json),
                None => bail!("no such user"),
            }
        }
        Commands::Find { username, json } => {
            let user = blocking(move || users.get_by_username(&username)).await?;
            match user {
                Some(user) => print_users(&[user], json),
                None => bail!("no user linked to that account"),
            }
        }
        Commands::Create {
            mxid,
            external,
            management_room,
            space_room,
            timezone,
        } => {
            let created = blocking(move || {
                if users.get_by_mxid(&mxid).is_some() {
                    return Err(anyhow::anyhow!("user {mxid} already exists"));
                }
                let mut user = users.new_user();
                user.mxid = mxid.clone();
                if let Some(external) = external {
                    user.link_external(ExternalId::with_default_tags(external));
                }
                user.management_room = management_room;
                user.space_room = space_room;
                user.timezone = timezone;
                user.insert();
                // Writes report failure only through the log.
                users
                    .get_by_mxid(&mxid)
                    .with_context(|| format!("user {mxid} was not stored"))
            })
            .await??;
            print_users(&[created], false)
        }
        Commands::SetTimezone { mxid, timezone } => {
            edit(users, mxid, move |user| user.timezone = timezone).await
        }
        Commands::Link { mxid, user } => {
            edit(users, mxid, move |record| {
                record.link_external(ExternalId::with_default_tags(user))
            })
            .await
        }
        Commands::Unlink { mxid } => edit(users, mxid, |user| user.unlink_external()).await,
    }
}

/// Load a user, apply `change`, write it back and print the stored result.
async fn edit<F>(users: UserQuery, mxid: String, change: F) -> Result<()>
where
    F: FnOnce(&mut gvbridge_store::User) + Send + 'static,
{
    let updated = blocking(move || {
        let mut user = users
            .get_by_mxid(&mxid)
            .with_context(|| format!("no user {mxid}"))?;
        change(&mut user);
        user.update();
        users
            .get_by_mxid(&mxid)
            .with_context(|| format!("user {mxid} vanished during update"))
    })
    .await??;
    print_users(&[updated], false)
}
