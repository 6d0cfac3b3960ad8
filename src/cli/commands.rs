use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// `redesign` - Room-redesign client with a chained AI image pipeline.
#[derive(Parser, Debug)]
#[command(name = "redesign")]
#[command(version = "0.1.0")]
#[command(about = "Redesign a room from a photo and an inspiration image.", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the redesign pipeline over two images
    Run {
        /// Photo of the room to redesign
        #[arg(short, long)]
        original: PathBuf,

        /// Inspiration photo to borrow the style from
        #[arg(short, long)]
        inspiration: PathBuf,

        /// Export the result and download it to this path
        #[arg(short, long)]
        save: Option<PathBuf>,
    },

    /// Show authentication state and remaining free runs
    Status,

    /// Log in and store the session token
    Login {
        /// Account email (prompted when omitted)
        #[arg(long)]
        email: Option<String>,
    },

    /// Create an account and store the session token
    Register {
        /// Account email (prompted when omitted)
        #[arg(long)]
        email: Option<String>,
    },

    /// Clear the stored session token
    Logout,
}
