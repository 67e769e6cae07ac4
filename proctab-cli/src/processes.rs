use colored::*;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use std::error::Error;

#[derive(Debug, Deserialize)]
pub struct ProcessRow {
    pub pid: i32,
    pub ppid: i32,
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub cpu: f64,
    #[serde(default)]
    pub rss: u64,
    #[serde(default)]
    pub memory_percent: f32,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub cmd_line: String,
}

#[derive(Debug, Deserialize)]
struct Page {
    total: usize,
    items: Vec<ProcessRow>,
}

#[derive(Debug, Deserialize)]
struct TreeNode {
    process: ProcessRow,
    level: usize,
    children: Vec<TreeNode>,
}

#[derive(Debug, Deserialize)]
struct Detail {
    #[serde(flatten)]
    process: ProcessRow,
    #[serde(default)]
    exe: String,
    #[serde(default)]
    cwd: String,
    #[serde(default)]
    terminal: String,
    #[serde(default)]
    num_threads: i32,
    #[serde(default)]
    fds: i32,
    #[serde(default)]
    command_line: Vec<String>,
    parent: Option<ProcessRow>,
    #[serde(default)]
    children_detail: Vec<ProcessRow>,
    #[serde(default)]
    unavailable: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Default, Clone, clap::Args)]
pub struct ListArgs {
    /// Page number (1-based)
    #[arg(long)]
    pub page: Option<usize>,
    /// Page size
    #[arg(long)]
    pub limit: Option<usize>,
    /// Sort key: pid, cpu, memory, start_time or name
    #[arg(long)]
    pub sort_by: Option<String>,
    /// Sort direction: asc or desc
    #[arg(long)]
    pub sort_dir: Option<String>,
    /// Only processes in this state (e.g. R, S, Z)
    #[arg(long)]
    pub status: Option<String>,
    /// Only processes owned by this user
    #[arg(long)]
    pub user: Option<String>,
    /// Case-insensitive match on name, command line or PID
    #[arg(long)]
    pub search: Option<String>,
}

impl ListArgs {
    fn query(&self) -> Vec<(&'static str, String)> {
        let mut q = Vec::new();
        if let Some(page) = self.page {
            q.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit {
            q.push(("limit", limit.to_string()));
        }
        let strings = [
            ("sort_by", &self.sort_by),
            ("sort_dir", &self.sort_dir),
            ("status", &self.status),
            ("username", &self.user),
            ("search", &self.search),
        ];
        for (key, value) in strings {
            if let Some(v) = value {
                q.push((key, v.clone()));
            }
        }
        q
    }
}

/// Turn a non-2xx response into an error carrying the server's message.
async fn checked(resp: Response) -> Result<Response, Box<dyn Error>> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = match resp.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => "no error detail".to_string(),
    };
    Err(format!("server returned {status}: {message}").into())
}

pub async fn run_list(client: &Client, url: &str, args: &ListArgs) -> Result<(), Box<dyn Error>> {
    let resp = client
        .get(format!("{}/process", url))
        .query(&args.query())
        .send()
        .await?;
    let page: Page = checked(resp).await?.json().await?;

    println!(
        "{:<8} {:<8} {:<12} {:<3} {:<6} {:<10} {:<20} CMD",
        "PID", "PPID", "USER", "S", "CPU%", "RSS", "STARTED"
    );
    for p in &page.items {
        println!(
            "{:<8} {:<8} {:<12} {:<3} {:<6.1} {:<10} {:<20} {}",
            p.pid,
            p.ppid,
            truncate(&p.username, 12),
            status_colored(&p.status),
            p.cpu,
            format_bytes(p.rss),
            p.start_time,
            command(p)
        );
    }
    println!(
        "{}",
        format!("{} of {} processes", page.items.len(), page.total).dimmed()
    );
    Ok(())
}

pub async fn run_tree(client: &Client, url: &str) -> Result<(), Box<dyn Error>> {
    let resp = client.get(format!("{}/process/tree", url)).send().await?;
    let roots: Vec<TreeNode> = checked(resp).await?.json().await?;

    fn print_node(node: &TreeNode) {
        println!(
            "{}{} {} {}",
            "  ".repeat(node.level),
            node.process.pid.to_string().bold(),
            node.process.name,
            format!("[{}]", node.process.username).dimmed()
        );
        for child in &node.children {
            print_node(child);
        }
    }

    for root in &roots {
        print_node(root);
    }
    Ok(())
}

pub async fn run_detail(client: &Client, url: &str, pid: i32) -> Result<(), Box<dyn Error>> {
    let resp = client
        .get(format!("{}/process/detail", url))
        .query(&[("pid", pid)])
        .send()
        .await?;
    let d: Detail = checked(resp).await?.json().await?;
    let p = &d.process;

    println!("{} {}", p.pid.to_string().bold(), p.name.bold());
    println!("  user:     {}", p.username);
    println!("  state:    {}", status_colored(&p.status));
    println!("  started:  {}", p.start_time);
    println!("  cpu:      {:.1}%", p.cpu);
    println!(
        "  memory:   {} ({:.1}%)",
        format_bytes(p.rss),
        p.memory_percent
    );
    println!("  threads:  {}", d.num_threads);
    println!("  fds:      {}", d.fds);
    println!("  exe:      {}", d.exe);
    println!("  cwd:      {}", d.cwd);
    if !d.terminal.is_empty() {
        println!("  tty:      {}", d.terminal);
    }
    println!("  argv:     {}", d.command_line.join(" "));
    match &d.parent {
        Some(parent) => println!("  parent:   {} {}", parent.pid, parent.name),
        None => println!("  parent:   {}", "-".dimmed()),
    }
    if !d.children_detail.is_empty() {
        println!("  children:");
        for child in &d.children_detail {
            println!("    {} {}", child.pid, child.name);
        }
    }
    if !d.unavailable.is_empty() {
        println!(
            "  {}",
            format!("unavailable: {}", d.unavailable.join(", ")).yellow()
        );
    }
    Ok(())
}

pub async fn run_kill(client: &Client, url: &str, pid: i32) -> Result<(), Box<dyn Error>> {
    let resp = client
        .post(format!("{}/process/kill", url))
        .json(&json!({ "pid": pid }))
        .send()
        .await?;
    checked(resp).await?;
    println!("{}", format!("SIGKILL sent to {pid}").green());
    Ok(())
}

pub async fn run_signal(
    client: &Client,
    url: &str,
    pid: i32,
    signal: &str,
) -> Result<(), Box<dyn Error>> {
    let resp = client
        .post(format!("{}/process/signal", url))
        .json(&json!({ "pid": pid, "signal": signal }))
        .send()
        .await?;
    checked(resp).await?;
    println!("{}", format!("{signal} sent to {pid}").green());
    Ok(())
}

fn command(p: &ProcessRow) -> &str {
    if p.cmd_line.is_empty() {
        &p.name
    } else {
        &p.cmd_line
    }
}

fn status_colored(status: &str) -> ColoredString {
    match status {
        "R" => status.green(),
        "Z" => status.red(),
        "T" | "t" => status.yellow(),
        "D" => status.magenta(),
        _ => status.normal(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max - 1).collect();
        format!("{cut}+")
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "K", "M", "G"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes}B")
    } else {
        format!("{:.1}{}", value, UNITS[unit])
    }
}
