//! CLI module for user records
//!
//! Subcommands:
//! - `migrate`: apply storage migrations
//! - `create-user`: create a user and print it
//! - `check-password`: compare a password against a stored user
//! - `show-user`: print a stored user

pub mod migrate;
pub mod user;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging;

/// User Records - manage persisted user accounts
#[derive(Parser)]
#[command(name = "user-records")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Apply pending storage migrations
    Migrate,

    /// Create a user and print its output representation
    CreateUser(user::CreateUserArgs),

    /// Check a password against a stored user
    CheckPassword(user::CheckPasswordArgs),

    /// Print a stored user
    ShowUser(user::ShowUserArgs),
}

/// Load `.env` and configuration, then install logging
pub fn bootstrap() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    logging::init_logging(&config.logging);

    Ok(config)
}
