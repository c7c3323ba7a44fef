//! CLI argument parsing and console formatting for the `ripd` binary.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ripd")]
#[command(about = "RIPv2 distance-vector routing engine")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the RIP engine against a configuration file
    Start {
        /// Configuration file path
        #[arg(short, long, default_value = "ripd.json")]
        config: String,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate a configuration file without starting the engine
    Validate {
        /// Configuration file to validate
        file: String,
    },
    /// Write a default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "ripd.json")]
        output: String,
    },
}

/// Plain-text console output, kept free of any particular terminal
/// library so it degrades sensibly when stdout isn't a tty.
pub struct CliFormatter;

impl CliFormatter {
    pub fn print_banner() {
        println!(
            "ripd {} — RIPv2 distance-vector routing engine",
            env!("CARGO_PKG_VERSION")
        );
    }

    pub fn print_success(message: &str) {
        println!("[ok] {}", message);
    }

    pub fn print_info(message: &str) {
        println!("[info] {}", message);
    }

    pub fn print_warning(message: &str) {
        println!("[warn] {}", message);
    }

    pub fn print_error(message: &str) {
        eprintln!("[error] {}", message);
    }
}
