use std::fmt;

use progress_core::model::{IdentitySources, ModuleId, Theme, UnitId};
use services::{
    Clock, DashboardState, DashboardView, EngineConfig, EventBus, SessionContext,
};
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { name: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidUrl { flag: &'static str, raw: String },
    InvalidId { raw: String },
    InvalidNumber { flag: &'static str, raw: String },
    InvalidTheme { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { name } => write!(f, "missing <{name}>"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidUrl { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidId { raw } => write!(f, "invalid id: {raw:?}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidTheme { raw } => {
                write!(f, "invalid theme: {raw} (expected light, dark or system)")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- dashboard           [options]");
    eprintln!("  cargo run -p app -- progress            [options]");
    eprintln!("  cargo run -p app -- complete <module> <unit> [--units <n>] [--link <path>] [options]");
    eprintln!("  cargo run -p app -- resume              [options]");
    eprintln!("  cargo run -p app -- notifications       [--poll <email>] [options]");
    eprintln!("  cargo run -p app -- clear-notifications [options]");
    eprintln!("  cargo run -p app -- add-module <module>    [options]");
    eprintln!("  cargo run -p app -- remove-module <module> [options]");
    eprintln!("  cargo run -p app -- theme [light|dark|system] [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>     default sqlite:progress.sqlite3");
    eprintln!("  --learner <id>        learner id for this session");
    eprintln!("  --page-url <url>      page URL carrying ?learner= / ?learnerId=");
    eprintln!("  --api <url>           learner API base URL");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LEARN_DB_URL, LEARN_LEARNER_ID, LEARN_API_BASE_URL,");
    eprintln!("  LEARN_TOAST_TIMEOUT_SECS, LEARN_NOTIFICATION_POLL_SECS,");
    eprintln!("  LEARN_NOTIFICATION_HISTORY_LIMIT, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Dashboard,
    Progress,
    Complete {
        module: ModuleId,
        unit: UnitId,
        units: Option<u32>,
        link: Option<String>,
    },
    Resume,
    Notifications {
        poll: Option<String>,
    },
    ClearNotifications,
    AddModule(ModuleId),
    RemoveModule(ModuleId),
    Theme(Option<Theme>),
}

struct Args {
    db_url: String,
    learner: Option<String>,
    page_url: Option<Url>,
    api: Option<Url>,
    command: Command,
}

fn parse_id<T: std::str::FromStr>(raw: Option<String>, name: &'static str) -> Result<T, ArgsError> {
    let raw = raw.ok_or(ArgsError::MissingArgument { name })?;
    raw.parse().map_err(|_| ArgsError::InvalidId { raw })
}

fn parse_url(raw: String, flag: &'static str) -> Result<Url, ArgsError> {
    Url::parse(&raw).map_err(|_| ArgsError::InvalidUrl { flag, raw })
}

impl Args {
    fn parse(name: &str, args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("LEARN_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://progress.sqlite3".into(), normalize_sqlite_url);
        let mut learner = std::env::var("LEARN_LEARNER_ID").ok();
        let mut page_url = None;
        let mut api = None;
        let mut units = None;
        let mut link = None;
        let mut poll = None;
        let mut positional = Vec::new();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--learner" => learner = Some(require_value(args, "--learner")?),
                "--page-url" => {
                    page_url = Some(parse_url(require_value(args, "--page-url")?, "--page-url")?);
                }
                "--api" => api = Some(parse_url(require_value(args, "--api")?, "--api")?),
                "--units" => {
                    let value = require_value(args, "--units")?;
                    let parsed: u32 = value.parse().map_err(|_| ArgsError::InvalidNumber {
                        flag: "--units",
                        raw: value.clone(),
                    })?;
                    units = Some(parsed);
                }
                "--link" => link = Some(require_value(args, "--link")?),
                "--poll" => poll = Some(require_value(args, "--poll")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ if arg.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let command = match name {
            "dashboard" => Command::Dashboard,
            "progress" => Command::Progress,
            "complete" => Command::Complete {
                module: parse_id(positional.next(), "module")?,
                unit: parse_id(positional.next(), "unit")?,
                units,
                link,
            },
            "resume" => Command::Resume,
            "notifications" => Command::Notifications { poll },
            "clear-notifications" => Command::ClearNotifications,
            "add-module" => Command::AddModule(parse_id(positional.next(), "module")?),
            "remove-module" => Command::RemoveModule(parse_id(positional.next(), "module")?),
            "theme" => Command::Theme(
                positional
                    .next()
                    .map(|raw| Theme::from_label(&raw).ok_or(ArgsError::InvalidTheme { raw }))
                    .transpose()?,
            ),
            other => return Err(ArgsError::UnknownArg(other.to_string())),
        };
        if let Some(extra) = positional.next() {
            return Err(ArgsError::UnknownArg(extra));
        }

        Ok(Self {
            db_url,
            learner,
            page_url,
            api,
            command,
        })
    }

    fn identity_sources(&self) -> IdentitySources {
        let sources = IdentitySources::new().with_session(self.learner.clone());
        match &self.page_url {
            Some(url) => sources.with_page_url(url),
            None => sources,
        }
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn print_view(view: &DashboardView) {
    if let Some(snapshot) = &view.snapshot {
        println!(
            "{} | level {} | {} xp | streak {} (best {})",
            snapshot.profile.name,
            snapshot.profile.level,
            snapshot.profile.xp,
            snapshot.streak.current,
            snapshot.streak.longest
        );
    }
    if let Some(stats) = &view.badge_stats {
        println!("badges: {}/{}", stats.unlocked, stats.total);
    }
    if view.modules.is_empty() {
        println!("no active modules; add one with `add-module <module>`");
    }
    for module in &view.modules {
        let percent = module
            .percent
            .map_or_else(|| "-".to_string(), |p| format!("{p}%"));
        println!("  {:<12} {:<32} {percent:>5}", module.module_id, module.title);
    }
    if let Some(resume) = &view.resume {
        println!("continue: {} -> {}", resume.module_id, resume.link);
    }
    for record in &view.raised {
        println!("* {}: {}", record.title(), record.body());
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let name = match argv.next() {
        None => "dashboard".to_string(),
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => first,
    };

    let parsed = Args::parse(&name, &mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let mut config = EngineConfig::from_env()?;
    if let Some(api) = parsed.api.clone() {
        config = config.with_api_base_url(api);
    }

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let ctx = SessionContext::open_sqlite(
        &parsed.db_url,
        parsed.identity_sources(),
        config,
        Clock::default_clock(),
        EventBus::default(),
    )
    .await?;

    if ctx.learner().is_none() {
        eprintln!("no learner identity; pass --learner <id> or sign in first");
    }

    match parsed.command {
        Command::Dashboard => match ctx.dashboard().refresh().await {
            DashboardState::Fresh(view) => print_view(&view),
            DashboardState::Degraded(view) => {
                println!("(offline: showing cached values, run again to retry)");
                print_view(&view);
            }
            DashboardState::SignedOut => {}
        },
        Command::Progress => match ctx.dashboard().progress_overview().await {
            Some(overview) => {
                println!("overall: {}%", overview.overall_percent);
                for topic in overview.topics {
                    println!("  {:<32} {:>3}%", topic.title, topic.percent);
                }
            }
            None => println!("progress unavailable"),
        },
        Command::Complete {
            module,
            unit,
            units,
            link,
        } => {
            let dashboard = ctx.dashboard();
            dashboard.refresh().await;
            let catalogue = dashboard.catalogue();
            let unit_count = units
                .or_else(|| catalogue.unit_total(&module))
                .unwrap_or_default();
            let link = link.or_else(|| catalogue.find(&module).map(|m| m.default_link()));
            let record = ctx
                .progress()
                .record_unit_completion(&module, unit, unit_count, link.as_deref())
                .await;
            match record {
                Some(record) => {
                    let percent = dashboard.module_percent(&module).await.or(record.percent());
                    println!(
                        "{module}: {} units complete ({})",
                        record.completed_count(),
                        percent.map_or_else(|| "unknown total".to_string(), |p| format!("{p}%"))
                    );
                }
                None => println!("not recorded"),
            }
        }
        Command::Resume => {
            let dashboard = ctx.dashboard();
            let active = match dashboard.refresh().await {
                DashboardState::Fresh(view) | DashboardState::Degraded(view) => view.active_modules,
                DashboardState::SignedOut => ctx.modules().active_modules().await,
            };
            match ctx
                .resume()
                .resolve_resume_target(&active, &dashboard.catalogue())
                .await
            {
                Some(target) => println!("{} -> {}", target.module_id, target.link),
                None => println!("no active modules; add one with `add-module <module>`"),
            }
        }
        Command::Notifications { poll } => {
            let center = ctx.notifications();
            if let Some(account) = poll {
                let poller =
                    services::NotificationPoller::new(ctx.api(), center.clone(), account);
                match poller.poll_once().await {
                    Ok(added) => info!(added, "server notifications fetched"),
                    Err(err) => eprintln!("could not fetch server notifications: {err}"),
                }
            }
            let items = center.history_view().await;
            if items.is_empty() {
                println!("no notifications");
            }
            for item in items {
                println!("[{:>8}] {} {}", item.when, item.title, item.body);
            }
        }
        Command::ClearNotifications => {
            ctx.notifications().clear_history().await;
            println!("notification history cleared");
        }
        Command::AddModule(module) => {
            let selection = ctx.modules().add_module(&module).await?;
            println!("active modules: {}", join_ids(selection.modules()));
        }
        Command::RemoveModule(module) => {
            let selection = ctx.modules().remove_module(&module).await?;
            println!("active modules: {}", join_ids(selection.modules()));
        }
        Command::Theme(None) => println!("{}", ctx.preferences().theme().await.as_str()),
        Command::Theme(Some(theme)) => {
            if ctx.preferences().set_theme(theme).await {
                println!("theme set to {}", theme.as_str());
            } else {
                println!("theme not saved");
            }
        }
    }

    ctx.teardown().await;
    Ok(())
}

fn join_ids(ids: &[ModuleId]) -> String {
    if ids.is_empty() {
        return "(none)".to_string();
    }
    ids.iter().map(ModuleId::as_str).collect::<Vec<_>>().join(", ")
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
