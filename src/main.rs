use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::Result;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use taskboard::models::{self, Task, TaskId};
use taskboard::{Backend, BackendKind, Change, Config, EditSession, FilterMode, Store};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(about = "taskboard - a small task list kept in local storage")]
#[command(version)]
struct Cli {
    /// Config file (default: <config dir>/taskboard/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the task data
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Storage backend
    #[arg(short, long, value_enum)]
    backend: Option<BackendKind>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task to the top of the list
    Add {
        /// Task text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// Due date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,

        /// Due time (HH:MM)
        #[arg(long, value_parser = parse_time_arg)]
        time: Option<NaiveTime>,
    },

    /// Show tasks
    List {
        /// Which tasks to show (default from config)
        #[arg(short, long, value_enum)]
        filter: Option<FilterMode>,
    },

    /// Mark a task done, or not done again
    Toggle { id: TaskId },

    /// Change a task's text, date or time
    Edit {
        id: TaskId,

        #[arg(long)]
        text: Option<String>,

        #[arg(long, value_parser = parse_date_arg, conflicts_with = "clear_date")]
        date: Option<NaiveDate>,

        #[arg(long)]
        clear_date: bool,

        #[arg(long, value_parser = parse_time_arg, conflicts_with = "clear_time")]
        time: Option<NaiveTime>,

        #[arg(long)]
        clear_time: bool,
    },

    /// Delete a task
    Remove {
        id: TaskId,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Delete all completed tasks
    ClearCompleted {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show total, completed and pending counts
    Stats,
}

fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
    models::parse_date(s).map_err(|e| e.to_string())
}

fn parse_time_arg(s: &str) -> Result<NaiveTime, String> {
    models::parse_time(s).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }

    let mut store = Store::open_with_key(config.open_backend()?, &config.key)?;
    if let Some(backup) = store.backup_key() {
        eprintln!(
            "{}",
            format!("Some stored tasks could not be read; a copy was kept under '{}'", backup).yellow()
        );
    }

    match cli.command {
        Commands::Add { text, date, time } => match store.add(&text.join(" "), date, time)? {
            Some(task) => println!("{} {}", "Added".green(), render(&task)),
            None => println!("{}", "Nothing to add: task text is empty".yellow()),
        },
        Commands::List { filter } => {
            let mode = filter.unwrap_or(config.default_filter);
            let view = store.filtered(mode);
            if view.is_empty() {
                println!("{}", empty_message(mode).dimmed());
            }
            for task in view {
                println!("{}", render(task));
            }
            print_stats(&store);
        }
        Commands::Toggle { id } => match store.toggle(id)? {
            Change::NotFound => not_found(id),
            _ => {
                if let Some(task) = store.get(id) {
                    println!("{}", render(task));
                }
            }
        },
        Commands::Edit {
            id,
            text,
            date,
            clear_date,
            time,
            clear_time,
        } => {
            let Some(mut session) = EditSession::begin(&store, id) else {
                not_found(id);
                return Ok(());
            };

            let touched = text.is_some() || date.is_some() || clear_date || time.is_some() || clear_time;
            if !touched {
                session.cancel();
                println!("{}", "Nothing to change".yellow());
                return Ok(());
            }

            if let Some(text) = text {
                session.text = text;
            }
            if clear_date {
                session.date = None;
            } else if date.is_some() {
                session.date = date;
            }
            if clear_time {
                session.time = None;
            } else if time.is_some() {
                session.time = time;
            }

            match session.commit(&mut store)? {
                Change::Applied => {
                    if let Some(task) = store.get(id) {
                        println!("{} {}", "Updated".green(), render(task));
                    }
                }
                Change::Rejected => println!("{}", "Edit discarded: task text cannot be empty".yellow()),
                Change::NotFound => not_found(id),
            }
        }
        Commands::Remove { id, yes } => {
            if store.get(id).is_none() {
                not_found(id);
                return Ok(());
            }
            if yes || confirm("Are you sure you want to delete this task?")? {
                store.remove(id)?;
                println!("{}", "Deleted".green());
            }
        }
        Commands::ClearCompleted { yes } => {
            let completed = store.stats().completed;
            if completed == 0 {
                println!("{}", "No completed tasks to clear!".yellow());
                return Ok(());
            }
            let plural = if completed > 1 { "s" } else { "" };
            if yes || confirm(&format!("Delete {} completed task{}?", completed, plural))? {
                let removed = store.clear_completed()?;
                println!("{} {} task{}", "Cleared".green(), removed, plural);
            }
        }
        Commands::Stats => print_stats(&store),
    }

    Ok(())
}

fn render(task: &Task) -> String {
    let mark = if task.completed { "[x]".green() } else { "[ ]".normal() };
    let text = if task.completed {
        task.text.strikethrough().dimmed()
    } else {
        task.text.bold()
    };

    let mut line = format!("{} {} {}", mark, text, format!("#{}", task.id).dimmed());
    if !task.has_schedule() {
        return line;
    }
    line.push_str("  ");
    if let Some(date) = task.date {
        line.push_str(&format!(" {}", date.format("%b %-d, %Y").to_string().cyan()));
    }
    if let Some(time) = task.time {
        line.push_str(&format!(" {}", models::format_time(&time).cyan()));
    }
    line
}

fn empty_message(mode: FilterMode) -> &'static str {
    match mode {
        FilterMode::All => "No tasks yet",
        FilterMode::Active => "No active tasks",
        FilterMode::Completed => "No completed tasks",
    }
}

fn print_stats<B: Backend>(store: &Store<B>) {
    let stats = store.stats();
    println!(
        "{} total, {} completed, {} pending",
        stats.total.to_string().bold(),
        stats.completed.to_string().green(),
        stats.pending.to_string().yellow()
    );
}

fn not_found(id: TaskId) {
    println!("{}", format!("No task with id {}", id).red());
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
