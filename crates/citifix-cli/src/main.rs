//! citifix - operator CLI for the citifix issue reporting platform
//!
//! Works directly on the data directory the API serves from.

use anyhow::Result;
use chrono::NaiveDate;
use citifix_core::{Category, ExportFormat, Period, Role, Status};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "citifix")]
#[command(about = "Operator CLI for the citifix issue reporting platform")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Data directory (defaults to $CITIFIX_DATA_DIR or the local data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new data directory
    Init,

    /// Manage user accounts
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// List issues
    List {
        /// Filter by status
        #[arg(short, long)]
        status: Option<Status>,

        /// Filter by category
        #[arg(short, long)]
        category: Option<Category>,

        /// Include issues flagged as duplicates
        #[arg(long)]
        duplicates: bool,

        /// Page number
        #[arg(long, default_value = "1")]
        page: usize,
    },

    /// Show issue details
    Show {
        /// Issue ID
        id: u64,
    },

    /// Show the points leaderboard
    Leaderboard {
        /// all_time, month or week
        #[arg(short, long, default_value = "all_time")]
        period: Period,
    },

    /// Show dashboard statistics
    Stats {
        /// Window in days for period figures
        #[arg(short, long, default_value = "30")]
        days: u32,
    },

    /// Export issues created between two dates (inclusive)
    Export {
        /// First day, YYYY-MM-DD
        start: NaiveDate,

        /// Last day, YYYY-MM-DD
        end: NaiveDate,

        /// json or csv
        #[arg(short, long, default_value = "json")]
        format: ExportFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create an account
    Add {
        name: String,
        email: String,

        #[arg(short, long)]
        password: String,

        /// citizen, officer or admin
        #[arg(short, long, default_value = "citizen")]
        role: Role,
    },

    /// Change a user's role
    Role {
        /// User ID
        id: u64,

        /// citizen, officer or admin
        role: Role,
    },

    /// List accounts
    List,
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let dir = cli.data_dir.as_deref();
    match cli.command {
        Commands::Init => commands::init(dir),
        Commands::User { command } => match command {
            UserCommands::Add {
                name,
                email,
                password,
                role,
            } => commands::user_add(dir, &name, &email, &password, role, cli.json),
            UserCommands::Role { id, role } => commands::user_role(dir, id, role, cli.json),
            UserCommands::List => commands::user_list(dir, cli.json),
        },
        Commands::List {
            status,
            category,
            duplicates,
            page,
        } => commands::list(dir, status, category, duplicates, page, cli.json),
        Commands::Show { id } => commands::show(dir, id, cli.json),
        Commands::Leaderboard { period } => commands::leaderboard(dir, period, cli.json),
        Commands::Stats { days } => commands::stats(dir, days, cli.json),
        Commands::Export {
            start,
            end,
            format,
            output,
        } => commands::export(dir, start, end, format, output.as_deref()),
    }
}
