use clap::{Parser, Subcommand};
use reqwest::Client;
use std::error::Error;

mod doctor;
mod processes;

use processes::ListArgs;

#[derive(clap::Parser, Debug)]
#[command(version, about = "Query and control processes through proctabd")]
struct Args {
    /// Base URL of the proctabd service
    #[clap(long, default_value = "http://127.0.0.1:3000")]
    url: String,

    /// Disable colorized output
    #[clap(long)]
    no_color: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// List processes, filtered, sorted and paginated by the daemon
    List(ListArgs),
    /// Show the parent/child process tree
    Tree,
    /// Show one process with its parent and children
    Detail {
        /// Process ID
        pid: i32,
    },
    /// Send SIGKILL to a process
    Kill {
        /// Process ID
        pid: i32,
    },
    /// Send a named signal (e.g. SIGTERM) to a process
    Signal {
        /// Process ID
        pid: i32,
        /// Signal name
        signal: String,
    },
    /// Check daemon health and connectivity
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    if args.no_color {
        colored::control::set_override(false);
    }
    let client = Client::new();
    let url = args.url.trim_end_matches('/');

    match args.command {
        Command::List(list) => processes::run_list(&client, url, &list).await,
        Command::Tree => processes::run_tree(&client, url).await,
        Command::Detail { pid } => processes::run_detail(&client, url, pid).await,
        Command::Kill { pid } => processes::run_kill(&client, url, pid).await,
        Command::Signal { pid, signal } => {
            processes::run_signal(&client, url, pid, &signal).await
        }
        Command::Doctor => doctor::run_doctor(&client, url).await,
    }
}
