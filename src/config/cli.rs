use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the blogpit binary.
#[derive(Debug, Parser)]
#[command(name = "blogpit", version, about = "Serve a content store as a blog")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "BLOGPIT_CONFIG_FILE", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP server.
    Serve(Box<ServeArgs>),
    /// Print what a request path resolves to and exit.
    Resolve(ResolveArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub content: ContentOverrides,

    /// Request path relative to the blog root, e.g. `blog/` or `blog/rss`.
    #[arg(value_name = "PATH", default_value = "")]
    pub path: String,
}

/// Options that pick which content is served and how it is read.
#[derive(Debug, Args, Default, Clone)]
pub struct ContentOverrides {
    /// Override the content store directory.
    #[arg(long = "store-root", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub store_root: Option<PathBuf>,

    /// Override the content handler (plain|markdown).
    #[arg(long = "content-handler", value_name = "KIND")]
    pub content_handler: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub content: ContentOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Toggle the lookup cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the number of cached lookups.
    #[arg(long = "cache-capacity", value_name = "COUNT")]
    pub cache_capacity: Option<usize>,

    /// Serve the blog below this path prefix.
    #[arg(long = "blog-mount-path", value_name = "PATH")]
    pub blog_mount_path: Option<String>,

    /// Override the site title.
    #[arg(long = "blog-title", value_name = "TITLE")]
    pub blog_title: Option<String>,

    /// Override the absolute site URL used in feeds.
    #[arg(long = "blog-site-url", value_name = "URL")]
    pub blog_site_url: Option<String>,

    /// Toggle comment submission.
    #[arg(
        long = "blog-comments",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub blog_comments: Option<bool>,

    /// Toggle raw article text for XHR clients.
    #[arg(
        long = "blog-serve-xhr-raw",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub blog_serve_xhr_raw: Option<bool>,

    /// Override the message shown when the spam trap fires.
    #[arg(long = "blog-spam-message", value_name = "TEXT")]
    pub blog_spam_message: Option<String>,
}
