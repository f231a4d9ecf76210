use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use ath_core::{
    AddToHomescreen, DisabledStorage, Environment, Hooks, InertReason, Markup, MessageTable,
    Navigator, Options, Persisted, Session, SessionStore, ShowOutcome, SimHost, Status, Storage,
    sniff,
};
use ath_store::{OriginStore, list_origins};
use clap::{Args, Parser, Subcommand};

/// Mobile Safari on iOS 9, the reference compatible browser.
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 9_1 like Mac OS X) AppleWebKit/601.1.46 (KHTML, like Gecko) Version/9.0 Mobile/13B143 Safari/601.1";

#[derive(Parser)]
#[command(name = "ath", about = "Add-to-homescreen callout simulator and session inspector")]
struct Cli {
    /// Options file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Message table (JSON: locale -> os -> text); replaces the built-in presets
    #[arg(long, global = true)]
    messages: Option<PathBuf>,

    /// Storage directory (default: $ATH_DATA_DIR or ~/.addtohomescreen)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct BrowserArgs {
    /// User agent string
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    ua: String,

    /// Browser language tag, e.g. en-US
    #[arg(long)]
    language: Option<String>,

    /// navigator.standalone value; omit when the browser has no such flag
    #[arg(long)]
    standalone: Option<bool>,

    #[arg(long, default_value_t = 1.0)]
    pixel_ratio: f64,

    /// Simulate a browser without event listener support
    #[arg(long)]
    no_listeners: bool,
}

impl BrowserArgs {
    fn navigator(&self) -> Navigator {
        let mut nav = Navigator::new(self.ua.clone())
            .with_standalone(self.standalone)
            .with_pixel_ratio(self.pixel_ratio);
        if let Some(lang) = &self.language {
            nav = nav.with_language(lang.clone());
        }
        nav.supports_event_listeners = !self.no_listeners;
        nav
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the environment snapshot for a browser
    Sniff {
        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Simulate one page visit
    Visit(VisitArgs),

    /// Print the callout markup
    Render {
        #[command(flatten)]
        browser: BrowserArgs,

        /// Touch icon href
        #[arg(long)]
        icon: Option<String>,
    },

    /// Inspect or change the persisted session of an origin
    Session {
        /// Any URL on the origin
        url: String,

        #[command(subcommand)]
        action: SessionAction,
    },

    /// List origins with stored data
    Origins,
}

#[derive(Args)]
struct VisitArgs {
    /// Page URL
    url: String,

    #[command(flatten)]
    browser: BrowserArgs,

    /// Call show() after construction
    #[arg(long)]
    show: bool,

    /// Call show(true), skipping pacing and the display cap
    #[arg(long)]
    force: bool,

    /// Run timers and transitions until nothing is pending
    #[arg(long)]
    run: bool,

    /// Milliseconds until the document finishes loading
    #[arg(long, default_value_t = 0)]
    loading: u64,

    /// Touch icon href declared by the page
    #[arg(long)]
    icon: Option<String>,

    /// Clock in Unix milliseconds (default: now)
    #[arg(long)]
    at: Option<i64>,

    /// Simulate storage that refuses every operation
    #[arg(long)]
    private: bool,

    /// Print the host's activity log
    #[arg(long)]
    trace: bool,
}

#[derive(Subcommand)]
enum SessionAction {
    Show,
    OptOut,
    OptIn,
    Clear,
    ClearCount,
    /// Delete a stored record (default: the session itself)
    Remove { key: Option<String> },
}

fn data_dir(cli: &Cli) -> Option<PathBuf> {
    cli.data_dir
        .clone()
        .or_else(|| std::env::var("ATH_DATA_DIR").ok().map(PathBuf::from))
}

fn open_origin(cli: &Cli, url: &str) -> Result<OriginStore> {
    OriginStore::open(url, data_dir(cli).as_deref()).context("failed to open origin storage")
}

fn load_options(path: Option<&Path>) -> Result<Options> {
    let Some(path) = path else {
        return Ok(Options::default());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("invalid options in {}", path.display()))
}

fn load_messages(path: Option<&Path>) -> Result<MessageTable> {
    let Some(path) = path else {
        return Ok(MessageTable::builtin());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    MessageTable::from_json(&content)
        .with_context(|| format!("invalid message table in {}", path.display()))
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Sniff { browser } => cmd_sniff(browser),
        Commands::Visit(args) => cmd_visit(&cli, args),
        Commands::Render { browser, icon } => cmd_render(&cli, browser, icon.as_deref()),
        Commands::Session { url, action } => cmd_session(&cli, url, action),
        Commands::Origins => cmd_origins(&cli),
    }
}

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

/// Logs each callback and remembers the order they fired in.
#[derive(Default)]
struct CliHooks {
    fired: Vec<&'static str>,
}

impl CliHooks {
    fn record(&mut self, name: &'static str) {
        tracing::info!("hook {name}");
        self.fired.push(name);
    }
}

impl Hooks for CliHooks {
    fn on_init(&mut self, _env: &Environment) {
        self.record("init");
    }
    fn on_show(&mut self, _session: &Session) {
        self.record("show");
    }
    fn on_remove(&mut self, _session: &Session) {
        self.record("remove");
    }
    fn on_add(&mut self) {
        self.record("add");
    }
    fn on_private(&mut self) {
        self.record("private");
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_sniff(browser: &BrowserArgs) -> Result<()> {
    let env = sniff(&browser.navigator());
    let json = serde_json::to_string_pretty(&env).context("failed to serialize environment")?;
    println!("{json}");
    Ok(())
}

fn cmd_visit(cli: &Cli, args: &VisitArgs) -> Result<()> {
    let options = load_options(cli.config.as_deref())?;
    let messages = load_messages(cli.messages.as_deref())?;

    let url = args.url.as_str();
    let now = args.at.unwrap_or_else(ath_core::time::now_unix_millis);
    let mut host = SimHost::new(args.browser.navigator(), url, now).loading_for(args.loading);
    if let Some(src) = &args.icon {
        host = host.with_icon(src, 0, false);
    }

    let (storage, origin): (Box<dyn Storage>, String) = if args.private {
        (Box::new(DisabledStorage), "(private)".to_string())
    } else {
        let origin_store = open_origin(cli, url)?;
        let origin = origin_store.origin().to_string();
        (Box::new(origin_store.into_store()), origin)
    };

    let mut ath =
        AddToHomescreen::with_messages(options, messages, host, storage, CliHooks::default())
            .context("invalid options")?;

    let outcome = if args.show || args.force {
        Some(ath.show(args.force))
    } else {
        None
    };
    if args.run {
        ath.run_until_idle();
    }

    println!("origin:     {origin}");
    println!("status:     {}", describe_status(ath.status()));
    println!("phase:      {:?}", ath.phase());
    if let Some(outcome) = outcome {
        println!("show:       {}", describe_outcome(outcome));
    }
    println!("url:        {}", ath.host().current_href());
    println!("persistent: {}", ath.has_persistence());
    println!("hooks:      {}", ath.hooks().fired.join(", "));
    println!(
        "last shown: {}",
        ath_core::time::millis_to_iso8601(ath.session().last_display_time)
    );
    println!(
        "session:    {}",
        ath.session().to_json().context("failed to serialize session")?
    );

    if args.trace {
        for entry in ath.host().journal() {
            println!("+{:>7}ms  {}", entry.at_millis - now, entry.what);
        }
    }
    Ok(())
}

fn cmd_render(cli: &Cli, browser: &BrowserArgs, icon: Option<&str>) -> Result<()> {
    let options = load_options(cli.config.as_deref())?;
    let messages = load_messages(cli.messages.as_deref())?;

    let raw = sniff(&browser.navigator());
    let config = options.normalize(&raw).context("invalid options")?;
    let env = if config.debug {
        raw.with_debug_override(config.forced_os)
    } else {
        raw
    };

    let template = ath_core::message::resolve(&config.message, &messages, &env.language, env.os);
    let icon = icon.filter(|_| config.icon).map(str::to_string);
    let markup = Markup::build(&env, &config, icon, ath_core::render_html(&template));
    println!("{}", markup.to_html());
    Ok(())
}

fn cmd_session(cli: &Cli, url: &str, action: &SessionAction) -> Result<()> {
    let options = load_options(cli.config.as_deref())?;
    let origin_store = open_origin(cli, url)?;
    let origin = origin_store.origin().to_string();
    let mut sessions = SessionStore::new(origin_store.into_store(), options.app_id.clone());

    if let SessionAction::Remove { key } = action {
        let key = key.as_deref().unwrap_or(&options.app_id);
        if !sessions.remove(key) {
            bail!("failed to remove '{key}' for {origin}");
        }
        println!("removed '{key}' for {origin}");
        return Ok(());
    }

    let mut session = sessions.load().unwrap_or_default();
    let label = match action {
        SessionAction::Show => None,
        SessionAction::OptOut => {
            session.opt_out();
            Some("opted out")
        }
        SessionAction::OptIn => {
            session.opt_in();
            Some("opted in")
        }
        SessionAction::Clear => {
            session.clear();
            Some("cleared")
        }
        SessionAction::ClearCount => {
            session.clear_display_count();
            Some("display count cleared")
        }
        SessionAction::Remove { .. } => None,
    };

    if let Some(label) = label {
        if sessions.save(&session) != Persisted::Saved {
            bail!("failed to save session for {origin}");
        }
        println!("{label} for {origin}");
    }

    println!("origin:     {origin}");
    println!("key:        {}", sessions.key());
    println!("returning:  {}", session.returning_visitor);
    println!("displays:   {}", session.display_count);
    println!(
        "last shown: {}",
        ath_core::time::millis_to_iso8601(session.last_display_time)
    );
    println!("opted out:  {}", session.opted_out);
    println!("added:      {}", session.added);
    Ok(())
}

fn cmd_origins(cli: &Cli) -> Result<()> {
    let base = data_dir(cli).unwrap_or_else(ath_store::default_base_dir);
    let origins = list_origins(&base).context("failed to list origins")?;
    if origins.is_empty() {
        println!("(no origins)");
    }
    for origin in origins {
        println!("{origin}");
    }
    Ok(())
}

fn describe_status(status: Status) -> String {
    match status {
        Status::Ready => "ready".to_string(),
        Status::Inert(InertReason::NoEventListeners) => {
            "inert (no event listener support)".to_string()
        }
        Status::Inert(InertReason::Suppressed(reason)) => format!("inert ({reason})"),
    }
}

fn describe_outcome(outcome: ShowOutcome) -> &'static str {
    match outcome {
        ShowOutcome::Shown => "shown",
        ShowOutcome::Deferred => "deferred until the document loads",
        ShowOutcome::AlreadyShown => "already on screen",
        ShowOutcome::NotReady => "not ready",
        ShowOutcome::TooSoon => "displayed recently",
        ShowOutcome::LimitReached => "display limit reached",
    }
}
