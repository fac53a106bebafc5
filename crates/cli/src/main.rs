//! WINQER CLI - Database migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply dashboard migrations
//! winqer migrate
//!
//! # Grant a user a role on a store
//! winqer store assign --store 6f1c... --email owner@example.jp --role STORE_ADMIN
//!
//! # Drop analytics cache rows not refreshed for 30 days
//! winqer cache purge --older-than-days 30
//! ```
//!
//! # Environment Variables
//!
//! - `WINQER_DATABASE_URL` (or `DATABASE_URL`) - Supabase `PostgreSQL` connection string

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

use winqer_core::{StoreId, StoreRole};

mod commands;

#[derive(Parser)]
#[command(name = "winqer")]
#[command(author, version, about = "WINQER CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage store access
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
    /// Maintain the analytics cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum StoreAction {
    /// Assign a role on a store to an existing user
    Assign {
        /// Store ID
        #[arg(short, long)]
        store: StoreId,

        /// Email of a user who has signed in at least once
        #[arg(short, long)]
        email: String,

        /// `STORE_ADMIN` or `STORE_VIEWER`
        #[arg(short, long, default_value = "STORE_VIEWER")]
        role: StoreRole,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Delete cache rows last refreshed before the cutoff
    Purge {
        /// Age in days
        #[arg(long, default_value_t = 90)]
        older_than_days: u32,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Store { action } => match action {
            StoreAction::Assign { store, email, role } => {
                commands::store::assign(store, &email, role).await?;
            }
        },
        Commands::Cache { action } => match action {
            CacheAction::Purge { older_than_days } => {
                commands::cache::purge(older_than_days).await?;
            }
        },
    }
    Ok(())
}
