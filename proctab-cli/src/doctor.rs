use colored::*;
use reqwest::Client;
use serde::Deserialize;
use std::error::Error;

#[derive(Deserialize, Debug)]
struct HealthResponse {
    #[allow(dead_code)]
    status: String,
    version: String,
}

#[derive(Deserialize, Debug)]
struct PageHead {
    total: usize,
}

pub async fn run_doctor(client: &Client, url: &str) -> Result<(), Box<dyn Error>> {
    println!("{}", "proctab doctor".bold().cyan());
    println!("{}", "Checking daemon health...".dimmed());
    println!();

    let mut all_good = true;

    // 1. Connectivity
    print!("• Daemon connectivity: ");
    match client.get(format!("{}/healthz", url)).send().await {
        Ok(resp) if resp.status().is_success() => match resp.json::<HealthResponse>().await {
            Ok(health) => println!("{} (v{})", "OK".green(), health.version),
            Err(_) => println!("{}", "OK (invalid JSON)".yellow()),
        },
        Ok(resp) => {
            println!("{} ({})", "FAILED".red(), resp.status());
            all_good = false;
        }
        Err(e) => {
            println!("{} ({})", "FAILED".red(), e);
            println!("  Is proctabd running at {}?", url);
            return Err("daemon unreachable".into());
        }
    }

    // 2. Snapshot
    print!("• Process snapshot:    ");
    match client
        .get(format!("{}/process", url))
        .query(&[("limit", "1")])
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => match resp.json::<PageHead>().await {
            Ok(page) if page.total > 0 => {
                println!("{} ({} processes visible)", "OK".green(), page.total)
            }
            Ok(_) => {
                println!("{}", "EMPTY".yellow());
                all_good = false;
            }
            Err(e) => {
                println!("{} ({})", "FAILED".red(), e);
                all_good = false;
            }
        },
        Ok(resp) => {
            println!("{} ({})", "FAILED".red(), resp.status());
            all_good = false;
        }
        Err(e) => {
            println!("{} ({})", "FAILED".red(), e);
            all_good = false;
        }
    }

    println!();
    if all_good {
        println!("{}", "All checks passed.".green().bold());
        Ok(())
    } else {
        println!("{}", "Some checks failed.".yellow().bold());
        Err("doctor found problems".into())
    }
}
