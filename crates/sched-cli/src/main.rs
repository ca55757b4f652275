mod output;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use sched_client::{execute, HttpSchedulerClient, Overrides, SchedulerApi, Settings};
use sched_core::{
    DashCommand, Dashboard, LastRunKey, LastRunQuery, Mutation, NewTaskForm, Page, Task, TaskKind,
};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sched")]
#[command(about = "Command line client for the task scheduler", long_about = None)]
struct Cli {
    #[arg(long, global = true, env = "SCHED_BASE_URL")]
    base_url: Option<String>,
    #[arg(long, global = true, env = "SCHED_USER")]
    user: Option<String>,
    #[arg(long, global = true, env = "SCHED_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    #[arg(long, global = true, env = "SCHED_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,
    #[arg(long, global = true, env = "SCHED_RETRIES")]
    retries: Option<u32>,
    #[arg(long, global = true, env = "SCHED_CONFIG")]
    config: Option<PathBuf>,
    /// Print JSON instead of tables
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
    #[arg(long, global = true, default_value_t = false)]
    debug: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List scheduled tasks
    List,
    /// Enable a task by task id or schedule id
    Enable { task: String },
    /// Disable a task by task id or schedule id
    Disable { task: String },
    /// Delete a task
    Delete { task_id: String },
    /// Schedule a new task
    Add {
        task_id: String,
        #[arg(long, default_value = "lastdata")]
        kind: TaskKind,
        #[arg(long)]
        network: String,
        #[arg(long)]
        chain_id: String,
        /// Run interval, e.g. 30s, 5m, 1h30m
        #[arg(long)]
        interval: String,
        #[arg(long, default_value = "")]
        height_from: String,
        #[arg(long, default_value = "")]
        height_to: String,
    },
    /// Show recent runs of a task
    Runs {
        task: String,
        #[arg(long, default_value_t = 1)]
        page: u64,
        #[arg(long)]
        limit: Option<u64>,
    },
    /// Show the last observed height per chain
    Heights,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            base_url: self.base_url.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            timeout_secs: self.timeout_secs,
            retries: self.retries,
            debug: self.debug,
            ..Overrides::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.overrides(), cli.config.as_deref())
        .context("failed to load configuration")?;
    init_logging(settings.debug);

    let api = HttpSchedulerClient::new(
        settings
            .client_config()
            .context("invalid scheduler connection settings")?,
    )
    .context("failed to build http client")?;

    run(&api, &settings, cli.command, cli.json).await
}

async fn run(
    api: &HttpSchedulerClient,
    settings: &Settings,
    command: Commands,
    json: bool,
) -> Result<()> {
    match command {
        Commands::List => {
            let tasks = api.list_tasks().await.context("failed to list tasks")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else {
                println!("{}", output::tasks_table(&tasks));
            }
        }
        Commands::Enable { task } => {
            mutate(api, settings, &task, json, |task| Mutation::enable(task)).await?;
        }
        Commands::Disable { task } => {
            mutate(api, settings, &task, json, |task| Mutation::disable(task)).await?;
        }
        Commands::Delete { task_id } => {
            mutate(api, settings, &task_id, json, |task| Mutation::delete(task)).await?;
        }
        Commands::Add {
            task_id,
            kind,
            network,
            chain_id,
            interval,
            height_from,
            height_to,
        } => {
            let request = NewTaskForm {
                task_id,
                kind,
                network,
                chain_id,
                interval,
                height_from,
                height_to,
            }
            .validate()?;
            let mut dash = Dashboard::new(settings.page_size);
            let start = dash.start();
            drive(api, &mut dash, start).await;
            let command = dash
                .request_mutation(Mutation::Add(request.clone()))
                .map_err(|busy| anyhow!(busy))?;
            drive(api, &mut dash, vec![command]).await;
            report(&dash, &request.task_id, json)?;
        }
        Commands::Runs { task, page, limit } => {
            let tasks = api.list_tasks().await.context("failed to list tasks")?;
            let task = find_task(&tasks, &task)?;
            let limit = limit.unwrap_or(settings.page_size).max(1);
            let query = LastRunQuery::new(LastRunKey::from_task(task), page_window(page, limit));
            let records = api
                .list_running(&query.request())
                .await
                .context("failed to list runs")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&output::runs_json(&records))?);
            } else {
                println!("{}", output::runs_table(&records));
            }
        }
        Commands::Heights => {
            let heights = api.last_heights().await.context("failed to list heights")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&heights)?);
            } else {
                println!("{}", output::heights_table(&heights));
            }
        }
    }
    Ok(())
}

/// Runs commands until the dashboard has no follow-up work.
async fn drive(api: &HttpSchedulerClient, dash: &mut Dashboard, commands: Vec<DashCommand>) {
    let mut queue = commands;
    while let Some(command) = queue.pop() {
        debug!(event = "cli_command", ?command);
        let event = execute(api, command).await;
        queue.extend(dash.apply(event));
    }
}

async fn mutate(
    api: &HttpSchedulerClient,
    settings: &Settings,
    reference: &str,
    json: bool,
    build: impl FnOnce(&Task) -> Mutation,
) -> Result<()> {
    let mut dash = Dashboard::new(settings.page_size);
    let start = dash.start();
    drive(api, &mut dash, start).await;
    if let Some(err) = dash.tasks().last_error() {
        bail!("failed to list tasks: {}", err.message);
    }
    let task = find_task(dash.tasks().items(), reference)?.clone();
    let command = dash
        .request_mutation(build(&task))
        .map_err(|busy| anyhow!(busy))?;
    drive(api, &mut dash, vec![command]).await;
    report(&dash, &task.task_id, json)
}

/// Prints the re-fetched state of `task_id` and fails on a backend rejection.
fn report(dash: &Dashboard, task_id: &str, json: bool) -> Result<()> {
    let refreshed = dash.tasks().items().iter().find(|t| t.task_id == task_id);
    match (refreshed, json) {
        (Some(task), true) => println!("{}", serde_json::to_string_pretty(task)?),
        (Some(task), false) => println!("{}", output::task_detail(task)),
        (None, _) => println!("{task_id} is not scheduled"),
    }
    if let Some(err) = dash.tasks().last_error() {
        bail!("refresh failed: {}", err.message);
    }
    if let Some(status) = dash.tasks().status() {
        bail!("{status}");
    }
    Ok(())
}

/// One-based page number to an offset window; huge page numbers clamp instead of overflowing.
fn page_window(page: u64, limit: u64) -> Page {
    Page {
        limit,
        offset: page.saturating_sub(1).saturating_mul(limit),
    }
}

fn find_task<'a>(tasks: &'a [Task], reference: &str) -> Result<&'a Task> {
    tasks
        .iter()
        .find(|task| task.task_id == reference)
        .or_else(|| tasks.iter().find(|task| task.id.as_deref() == Some(reference)))
        .ok_or_else(|| anyhow!("no task matches '{reference}'"))
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        let level = std::env::var("SCHED_LOG_LEVEL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| "warn".to_string());
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
