use std::env;
use std::fmt;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use axum::http::Method;
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use config::{Config, Environment, File, FileFormat};
use log::{LevelFilter, debug, info};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use esg_auth::api::{self, AppState, HttpSettings};
use esg_auth::auth::{AccessPolicy, AuthConfig, CredentialVerifier, TokenCodec};
use esg_auth::db::Database;
use esg_auth::member::{MemberRepository, MemberService};
use esg_auth::storage::{self, StorageConfig};

const APP_NAME: &str = "esg-auth";

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn async_main(ctx: RuntimeContext, cmd: ServeCommand) -> Result<()> {
    handle_serve(&ctx, cmd).await
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    // Only `serve` bootstraps a missing config; `init` writes it explicitly.
    let create_config = matches!(cli.command, Command::Serve(_));
    let ctx = RuntimeContext::new(cli.common.clone(), create_config)?;
    ctx.init_logging()?;
    debug!("resolved paths: {}", ctx.paths);

    match cli.command {
        Command::Serve(cmd) => async_main(ctx, cmd),
        Command::Init(cmd) => handle_init(&ctx, cmd),
        Command::Config { command } => handle_config(&ctx, command),
        Command::Completions { shell } => handle_completions(shell),
    }
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "ESG member authentication service.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Reduce output to only errors
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    quiet: bool,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Enable debug logging (equivalent to -vv)
    #[arg(long, global = true)]
    debug: bool,
    /// Enable trace logging (overrides other levels)
    #[arg(long, global = true)]
    trace: bool,
    /// Output machine readable JSON
    #[arg(long, global = true, conflicts_with = "yaml")]
    json: bool,
    /// Output machine readable YAML
    #[arg(long, global = true)]
    yaml: bool,
    /// Disable ANSI colors in output
    #[arg(long = "no-color", global = true, conflicts_with = "color")]
    no_color: bool,
    /// Control color output (auto, always, never)
    #[arg(long, value_enum, default_value_t = ColorOption::Auto, global = true)]
    color: ColorOption,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorOption {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the HTTP API server
    Serve(ServeCommand),
    /// Create config directories and default files
    Init(InitCommand),
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Args)]
struct ServeCommand {
    /// Host address to bind to (overrides server.host)
    #[arg(long)]
    host: Option<String>,
    /// Port to listen on (overrides server.port)
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Debug, Clone, Args)]
struct InitCommand {
    /// Recreate configuration even if it already exists
    #[arg(long = "force")]
    force: bool,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Output the effective configuration
    Show,
    /// Print the resolved config file path
    Path,
}

#[derive(Debug, Clone)]
struct RuntimeContext {
    common: CommonOpts,
    paths: AppPaths,
    config: AppConfig,
}

impl RuntimeContext {
    fn new(common: CommonOpts, create_config: bool) -> Result<Self> {
        let paths = AppPaths::discover(common.config.clone())?;
        let config = load_or_init_config(&paths, create_config)?;
        let paths = paths.apply_overrides(&config)?;
        Ok(Self {
            common,
            paths,
            config,
        })
    }

    fn init_logging(&self) -> Result<()> {
        use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

        if self.common.quiet {
            log::set_max_level(LevelFilter::Error);
        }

        let level = match self.effective_log_level() {
            LevelFilter::Off => "off",
            LevelFilter::Error => "error",
            LevelFilter::Warn => "warn",
            LevelFilter::Info => "info",
            LevelFilter::Debug => "debug",
            LevelFilter::Trace => "trace",
        };

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("esg_auth={level},tower_http={level}")));

        // Records from the `log` facade are bridged by `try_init`.
        if self.common.json {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .ok();
        } else {
            let force_color = matches!(self.common.color, ColorOption::Always)
                || env::var_os("FORCE_COLOR").is_some();
            let disable_color = self.common.no_color
                || matches!(self.common.color, ColorOption::Never)
                || env::var_os("NO_COLOR").is_some()
                || (!force_color && !io::stderr().is_terminal());

            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_ansi(!disable_color))
                .try_init()
                .ok();
        }

        Ok(())
    }

    fn effective_log_level(&self) -> LevelFilter {
        if self.common.quiet {
            LevelFilter::Error
        } else if self.common.trace {
            LevelFilter::Trace
        } else if self.common.debug {
            LevelFilter::Debug
        } else {
            match self.common.verbose {
                0 => self
                    .config
                    .logging
                    .level
                    .parse()
                    .unwrap_or(LevelFilter::Info),
                1 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }
}

#[derive(Debug, Clone)]
struct AppPaths {
    config_file: PathBuf,
    data_dir: PathBuf,
    database_file: PathBuf,
    upload_dir: PathBuf,
}

impl AppPaths {
    fn discover(override_path: Option<PathBuf>) -> Result<Self> {
        let config_file = match override_path {
            Some(path) => {
                let expanded = expand_path(path)?;
                if expanded.is_dir() {
                    expanded.join("config.toml")
                } else {
                    expanded
                }
            }
            None => default_config_dir()?.join("config.toml"),
        };

        if config_file.parent().is_none() {
            return Err(anyhow!("invalid config file path: {config_file:?}"));
        }

        let data_dir = default_data_dir()?;

        Ok(Self {
            config_file,
            database_file: data_dir.join("members.db"),
            upload_dir: data_dir.join("uploads").join("images"),
            data_dir,
        })
    }

    fn apply_overrides(mut self, cfg: &AppConfig) -> Result<Self> {
        if let Some(ref path) = cfg.database.path {
            self.database_file = expand_str_path(path)?;
        }
        if let Some(ref dir) = cfg.storage.upload_dir {
            self.upload_dir = expand_str_path(dir)?;
        }
        Ok(self)
    }
}

impl fmt::Display for AppPaths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "config: {}, data: {}, database: {}, uploads: {}",
            self.config_file.display(),
            self.data_dir.display(),
            self.database_file.display(),
            self.upload_dir.display()
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct AppConfig {
    logging: LoggingConfig,
    server: ServerConfig,
    database: DatabaseConfig,
    auth: AuthConfig,
    storage: StorageSettings,
    metrics: MetricsConfig,
}

impl AppConfig {
    /// Copy safe to print: a literal signing secret is masked.
    fn redacted(&self) -> Self {
        let mut config = self.clone();
        if let Some(secret) = &config.auth.jwt_secret {
            if !secret.starts_with("env:") {
                config.auth.jwt_secret = Some("<redacted>".to_string());
            }
        }
        config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct LoggingConfig {
    level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct ServerConfig {
    host: String,
    port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct MetricsConfig {
    /// Record account counters and serve them at `/metrics`.
    enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct DatabaseConfig {
    /// Database file. Defaults to `<data_dir>/members.db`.
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct StorageSettings {
    /// Upload directory. Defaults to `<data_dir>/uploads/images`.
    upload_dir: Option<String>,
    /// URL prefix uploaded images are served under.
    public_prefix: String,
    /// Maximum request body size in bytes.
    max_upload_bytes: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            upload_dir: None,
            public_prefix: "/images".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl StorageSettings {
    fn validate(&self) -> Result<()> {
        let prefix = &self.public_prefix;
        if !prefix.starts_with('/') || prefix.ends_with('/') || prefix.len() < 2 {
            return Err(anyhow!(
                "storage.public_prefix must look like \"/images\" (got {prefix:?})"
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(anyhow!("storage.max_upload_bytes must be positive"));
        }
        Ok(())
    }
}

async fn handle_serve(ctx: &RuntimeContext, cmd: ServeCommand) -> Result<()> {
    info!("Starting {} server...", APP_NAME);

    let config = &ctx.config;
    config
        .auth
        .validate()
        .context("Invalid auth configuration")?;
    config
        .storage
        .validate()
        .context("Invalid storage configuration")?;

    let codec = TokenCodec::new(&config.auth).context("building token codec")?;
    info!(
        "Token lifetime: {}h, bcrypt cost: {}",
        config.auth.token_lifetime_hours, config.auth.bcrypt_cost
    );

    info!("Database path: {}", ctx.paths.database_file.display());
    let database = Database::new(&ctx.paths.database_file).await?;

    fs::create_dir_all(&ctx.paths.upload_dir).with_context(|| {
        format!(
            "creating upload directory {}",
            ctx.paths.upload_dir.display()
        )
    })?;
    info!("Upload directory: {}", ctx.paths.upload_dir.display());

    let blobs = storage::create_storage(StorageConfig::Local {
        base_path: ctx.paths.upload_dir.clone(),
        public_prefix: config.storage.public_prefix.clone(),
    });

    let members = MemberService::new(
        Arc::new(MemberRepository::new(database.pool().clone())),
        CredentialVerifier::bcrypt(config.auth.bcrypt_cost),
        codec.clone(),
        blobs,
    );

    let mut policy = AccessPolicy::member_service(&config.storage.public_prefix);
    let metrics_handle = if config.metrics.enabled {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("installing metrics recorder")?;
        esg_auth::metrics::describe();
        policy = policy.public(Some(Method::GET), "/metrics");
        info!("Metrics enabled at /metrics");
        Some(handle)
    } else {
        None
    };

    let mut state = AppState::new(
        members,
        codec,
        policy,
        HttpSettings {
            allowed_origins: config.auth.allowed_origins.clone(),
            upload_dir: ctx.paths.upload_dir.clone(),
            public_prefix: config.storage.public_prefix.clone(),
            max_upload_bytes: config.storage.max_upload_bytes,
        },
    );
    if let Some(handle) = metrics_handle {
        state = state.with_metrics(handle);
    }
    let app = api::create_router(state);

    let host = cmd.host.unwrap_or_else(|| config.server.host.clone());
    let port = cmd.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("invalid address")?;

    info!("Listening on http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .context("binding to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running server")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

fn handle_init(ctx: &RuntimeContext, cmd: InitCommand) -> Result<()> {
    if ctx.paths.config_file.exists() && !cmd.force {
        return Err(anyhow!(
            "config already exists at {} (use --force to overwrite)",
            ctx.paths.config_file.display()
        ));
    }

    write_default_config(&ctx.paths.config_file)?;
    info!("Wrote default config to {}", ctx.paths.config_file.display());
    Ok(())
}

fn handle_config(ctx: &RuntimeContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let config = ctx.config.redacted();
            if ctx.common.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&config).context("serializing config to JSON")?
                );
            } else if ctx.common.yaml {
                println!(
                    "{}",
                    serde_yaml::to_string(&config).context("serializing config to YAML")?
                );
            } else {
                println!(
                    "{}",
                    toml::to_string_pretty(&config).context("serializing config to TOML")?
                );
            }
            Ok(())
        }
        ConfigCommand::Path => {
            println!("{}", ctx.paths.config_file.display());
            Ok(())
        }
    }
}

fn handle_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, APP_NAME, &mut io::stdout());
    Ok(())
}

fn load_or_init_config(paths: &AppPaths, create_if_missing: bool) -> Result<AppConfig> {
    if create_if_missing && !paths.config_file.exists() {
        write_default_config(&paths.config_file)?;
    }

    build_config(&paths.config_file)
}

fn build_config(config_file: &Path) -> Result<AppConfig> {
    let env_prefix = env_prefix();
    let built = Config::builder()
        .set_default("logging.level", "info")?
        .add_source(
            File::from(config_file)
                .format(FileFormat::Toml)
                .required(false),
        )
        .add_source(Environment::with_prefix(env_prefix.as_str()).separator("__"))
        .build()?;

    let config: AppConfig = built.try_deserialize()?;
    Ok(config)
}

/// Default config with a freshly generated signing secret.
fn default_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = Some(AuthConfig::generate_jwt_secret());
    config
}

fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {parent:?}"))?;
    }

    let config = default_config();
    let toml = toml::to_string_pretty(&config).context("serializing default config to TOML")?;
    let mut body = default_config_header(path);
    body.push_str(&toml);
    fs::write(path, body).with_context(|| format!("writing config file to {}", path.display()))
}

fn default_config_header(path: &Path) -> String {
    let mut buffer = String::new();
    buffer.push_str("# Configuration for ");
    buffer.push_str(APP_NAME);
    buffer.push('\n');
    buffer.push_str("# File: ");
    buffer.push_str(&path.display().to_string());
    buffer.push('\n');
    buffer.push_str("# The signing secret below was generated for this installation.\n");
    buffer.push_str("# Use \"env:VAR_NAME\" to read it from the environment instead.\n");
    buffer.push('\n');
    buffer
}

fn expand_path(path: PathBuf) -> Result<PathBuf> {
    if let Some(text) = path.to_str() {
        expand_str_path(text)
    } else {
        Ok(path)
    }
}

fn expand_str_path(text: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(text).context("expanding path")?;
    Ok(PathBuf::from(expanded.to_string()))
}

fn default_config_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        let mut path = PathBuf::from(dir);
        path.push(APP_NAME);
        return Ok(path);
    }

    if let Some(mut dir) = dirs::config_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    dirs::home_dir()
        .map(|home| home.join(".config").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine configuration directory"))
}

fn default_data_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }

    if let Some(mut dir) = dirs::data_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    dirs::home_dir()
        .map(|home| home.join(".local").join("share").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine data directory"))
}

fn env_prefix() -> String {
    APP_NAME
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_env_prefix() {
        assert_eq!(env_prefix(), "ESG_AUTH");
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        write_default_config(&path).unwrap();

        let body = fs::read_to_string(&path).unwrap();
        assert!(body.starts_with("# Configuration for esg-auth"));

        let config = build_config(&path).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.token_lifetime_hours, 1);
        assert_eq!(config.storage.public_prefix, "/images");
        assert_eq!(config.storage.max_upload_bytes, 10 * 1024 * 1024);
        assert!(config.auth.validate().is_ok());
    }

    #[test]
    fn test_redacted_masks_literal_secret_only() {
        let config = default_config();
        let shown = config.redacted();
        assert_eq!(shown.auth.jwt_secret.as_deref(), Some("<redacted>"));

        let mut from_env = AppConfig::default();
        from_env.auth.jwt_secret = Some("env:ESG_AUTH_JWT_SECRET".to_string());
        assert_eq!(
            from_env.redacted().auth.jwt_secret.as_deref(),
            Some("env:ESG_AUTH_JWT_SECRET")
        );
    }

    #[test]
    fn test_storage_settings_validation() {
        let mut settings = StorageSettings::default();
        assert!(settings.validate().is_ok());

        for prefix in ["", "/", "images", "/images/"] {
            settings.public_prefix = prefix.to_string();
            assert!(settings.validate().is_err(), "{prefix:?} should be rejected");
        }

        settings = StorageSettings::default();
        settings.max_upload_bytes = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_config_file_only_created_on_request() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let paths = AppPaths {
            config_file: dir.path().join("cfg").join("config.toml"),
            database_file: data_dir.join("members.db"),
            upload_dir: data_dir.join("uploads/images"),
            data_dir,
        };

        let config = load_or_init_config(&paths, false).unwrap();
        assert!(!paths.config_file.exists());
        assert!(config.auth.jwt_secret.is_none());
        assert!(config.metrics.enabled);

        let config = load_or_init_config(&paths, true).unwrap();
        assert!(paths.config_file.exists());
        let secret = config.auth.jwt_secret.clone().unwrap();

        // A second load keeps the generated secret.
        let again = load_or_init_config(&paths, true).unwrap();
        assert_eq!(again.auth.jwt_secret.as_deref(), Some(secret.as_str()));
    }

    #[test]
    fn test_path_overrides() {
        let paths = AppPaths {
            config_file: PathBuf::from("/tmp/esg/config.toml"),
            data_dir: PathBuf::from("/tmp/esg"),
            database_file: PathBuf::from("/tmp/esg/members.db"),
            upload_dir: PathBuf::from("/tmp/esg/uploads/images"),
        };
        let mut config = AppConfig::default();
        config.database.path = Some("/srv/esg/db.sqlite".to_string());
        config.storage.upload_dir = Some("/srv/esg/images".to_string());

        let paths = paths.apply_overrides(&config).unwrap();
        assert_eq!(paths.database_file, PathBuf::from("/srv/esg/db.sqlite"));
        assert_eq!(paths.upload_dir, PathBuf::from("/srv/esg/images"));
    }
}
