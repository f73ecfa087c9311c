mod app;
mod config;
mod domain;
mod logging;
mod repo;
mod ui;
mod usecase;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use app::App;
use config::{Config, Overrides};
use domain::todo::{Todo, UserId};
use repo::http::HttpTodoRepo;
use repo::memory::InMemoryTodoRepo;
use usecase::dispatch::Dispatcher;

/// User id the demo store is seeded for when none is configured.
const DEMO_USER_ID: UserId = 1;

#[derive(Parser, Debug)]
#[command(author, version, about = "todos — terminal client for a remote todo list", long_about = None)]
struct Args {
    /// Base URL of the todo service (env TODOS_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Owner of the todos to manage (env TODOS_USER_ID)
    #[arg(long)]
    user_id: Option<UserId>,

    /// Tick interval of render loop in milliseconds
    #[arg(long, default_value_t = 120)]
    tick_ms: u64,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,

    /// Use an in-memory service seeded with sample todos
    #[arg(long, default_value_t = false)]
    demo: bool,

    /// Path to the log file (default: OS data dir)
    #[arg(long)]
    log_file: Option<std::path::PathBuf>,
}

impl From<Args> for Overrides {
    fn from(args: Args) -> Self {
        Overrides {
            api_url: args.api_url,
            user_id: args.user_id,
            timeout_secs: args.timeout_secs,
            tick_ms: args.tick_ms,
            demo: args.demo,
            log_file: args.log_file,
        }
    }
}

fn main() -> Result<()> {
    let config = Config::resolve(Args::parse().into())?;
    logging::init(&config.log_file)?;
    info!(api_url = %config.api_url, demo = config.demo, "starting");

    if config.demo {
        let user_id = config.user_id.unwrap_or(DEMO_USER_ID);
        let dispatcher = Dispatcher::new(InMemoryTodoRepo::with_seed(seed_todos(user_id)))?;
        return ui::run(App::new(user_id), dispatcher, config.tick);
    }

    let Some(user_id) = config.user_id else {
        info!("no user id configured");
        return ui::run_user_warning();
    };
    let repo = HttpTodoRepo::new(&config.api_url, config.timeout)?;
    ui::run(App::new(user_id), Dispatcher::new(repo)?, config.tick)
}

fn seed_todos(user_id: UserId) -> Vec<Todo> {
    ["Write documentation", "Review open pull requests", "Draft release notes"]
        .into_iter()
        .enumerate()
        .map(|(idx, title)| Todo {
            id: idx as i64 + 1,
            user_id,
            title: title.to_string(),
            completed: idx == 2,
        })
        .collect()
}
