//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::handler::HandlerKind;

pub use cli::{CliArgs, Command, ContentOverrides, ResolveArgs, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "blogpit";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_STORE_ROOT: &str = "content";
const DEFAULT_STORE_RESCAN_MS: u64 = 1000;
const DEFAULT_CACHE_CAPACITY: usize = 512;
const DEFAULT_TITLE: &str = "blogpit";
const DEFAULT_SITE_URL: &str = "http://127.0.0.1:3000/";
pub const DEFAULT_SPAM_MESSAGE: &str =
    "Comments are temporarily disabled, due to flying spamming monkeys";

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub store: StoreSettings,
    pub content: ContentSettings,
    pub cache: CacheSettings,
    pub blog: BlogSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub root: PathBuf,
    /// How long a working-tree fingerprint is trusted before the tree is walked again.
    pub rescan_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct ContentSettings {
    pub handler: HandlerKind,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub capacity: usize,
}

/// Site-facing behaviour of the blog routes.
#[derive(Debug, Clone)]
pub struct BlogSettings {
    /// Route prefix, empty or `/segment` without a trailing slash.
    pub mount_path: String,
    pub title: String,
    /// Absolute base URL, always ending in `/`.
    pub site_url: Url,
    pub comments: bool,
    pub serve_xhr_raw: bool,
    pub spam_message: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("BLOGPIT").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Resolve(args)) => raw.apply_content_overrides(&args.content),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    store: RawStoreSettings,
    content: RawContentSettings,
    cache: RawCacheSettings,
    blog: RawBlogSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        self.apply_content_overrides(&overrides.content);

        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(capacity) = overrides.cache_capacity {
            self.cache.capacity = Some(capacity);
        }
        if let Some(mount) = overrides.blog_mount_path.as_ref() {
            self.blog.mount_path = Some(mount.clone());
        }
        if let Some(title) = overrides.blog_title.as_ref() {
            self.blog.title = Some(title.clone());
        }
        if let Some(url) = overrides.blog_site_url.as_ref() {
            self.blog.site_url = Some(url.clone());
        }
        if let Some(comments) = overrides.blog_comments {
            self.blog.comments = Some(comments);
        }
        if let Some(raw) = overrides.blog_serve_xhr_raw {
            self.blog.serve_xhr_raw = Some(raw);
        }
        if let Some(message) = overrides.blog_spam_message.as_ref() {
            self.blog.spam_message = Some(message.clone());
        }
    }

    fn apply_content_overrides(&mut self, overrides: &ContentOverrides) {
        if let Some(root) = overrides.store_root.as_ref() {
            self.store.root = Some(root.clone());
        }
        if let Some(handler) = overrides.content_handler.as_ref() {
            self.content.handler = Some(handler.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            store,
            content,
            cache,
            blog,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            store: build_store_settings(store)?,
            content: build_content_settings(content)?,
            cache: build_cache_settings(cache),
            blog: build_blog_settings(blog)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_store_settings(store: RawStoreSettings) -> Result<StoreSettings, LoadError> {
    let root = store
        .root
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_ROOT));
    if root.as_os_str().is_empty() {
        return Err(LoadError::invalid("store.root", "path must not be empty"));
    }
    let rescan_interval =
        Duration::from_millis(store.rescan_interval_ms.unwrap_or(DEFAULT_STORE_RESCAN_MS));
    Ok(StoreSettings {
        root,
        rescan_interval,
    })
}

fn build_content_settings(content: RawContentSettings) -> Result<ContentSettings, LoadError> {
    let handler = match content.handler {
        Some(value) => value
            .parse::<HandlerKind>()
            .map_err(|reason| LoadError::invalid("content.handler", reason))?,
        None => HandlerKind::default(),
    };
    Ok(ContentSettings { handler })
}

fn build_cache_settings(cache: RawCacheSettings) -> CacheSettings {
    CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        capacity: cache.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY).max(1),
    }
}

fn build_blog_settings(blog: RawBlogSettings) -> Result<BlogSettings, LoadError> {
    let mount_path = normalize_mount_path(blog.mount_path.as_deref().unwrap_or_default())?;

    let title = blog
        .title
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    let site_url = parse_site_url(blog.site_url.as_deref().unwrap_or(DEFAULT_SITE_URL))?;

    let spam_message = blog
        .spam_message
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SPAM_MESSAGE.to_string());

    Ok(BlogSettings {
        mount_path,
        title,
        site_url,
        comments: blog.comments.unwrap_or(false),
        serve_xhr_raw: blog.serve_xhr_raw.unwrap_or(false),
        spam_message,
    })
}

fn normalize_mount_path(value: &str) -> Result<String, LoadError> {
    let trimmed = value.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    if trimmed.contains(['{', '}', '*', '?', '#']) {
        return Err(LoadError::invalid(
            "blog.mount_path",
            format!("`{value}` contains characters reserved for routing"),
        ));
    }
    Ok(format!("/{trimmed}"))
}

fn parse_site_url(value: &str) -> Result<Url, LoadError> {
    let mut url = Url::parse(value.trim())
        .map_err(|err| LoadError::invalid("blog.site_url", format!("invalid url: {err}")))?;
    if url.cannot_be_a_base() {
        return Err(LoadError::invalid(
            "blog.site_url",
            "url must be an absolute http(s) base",
        ));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStoreSettings {
    root: Option<PathBuf>,
    rescan_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawContentSettings {
    handler: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    capacity: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBlogSettings {
    mount_path: Option<String>,
    title: Option<String>,
    site_url: Option<String>,
    comments: Option<bool>,
    serve_xhr_raw: Option<bool>,
    spam_message: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}
