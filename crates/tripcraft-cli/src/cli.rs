//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI
//! arguments. The actual command implementations are in the `commands`
//! module.

use clap::{Parser, Subcommand};

/// Tripcraft - AI travel planning from the terminal
#[derive(Parser)]
#[command(name = "tripcraft")]
#[command(about = "AI-assisted travel planning and budget tracking", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask the planning assistant a free-form question
    Chat {
        /// The question or request
        message: String,
    },

    /// Generate a structured travel plan
    Plan {
        /// Destination, free text
        #[arg(short, long)]
        destination: String,

        /// Trip length in days
        #[arg(long, default_value = "3")]
        days: u32,

        /// Budget tier: 经济型, 舒适型, 豪华型
        #[arg(short, long, default_value = "舒适型")]
        budget: String,

        /// Travel style label
        #[arg(long, default_value = "休闲")]
        style: String,

        /// Interest tags, comma separated
        #[arg(short, long, default_value = "美食,历史")]
        interests: String,

        /// Number of travelers
        #[arg(short, long)]
        travelers: Option<u32>,

        /// Print the plan as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Analyze budget usage for a trip
    Budget {
        /// Destination, free text
        #[arg(short, long)]
        destination: String,

        /// Trip length in days
        #[arg(long, default_value = "3")]
        days: u32,

        /// Budget tier: 经济型, 舒适型, 豪华型
        #[arg(short, long, default_value = "舒适型")]
        budget: String,

        /// Amount already spent, in yuan
        #[arg(short, long, default_value = "0")]
        spent: f64,
    },

    /// Resolve a place name to coordinates
    Geocode {
        /// Place names to resolve
        #[arg(required = true)]
        addresses: Vec<String>,
    },
}
