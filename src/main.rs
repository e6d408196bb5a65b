use std::{net::SocketAddr, process, sync::Arc};

use blogpit::{
    application::{
        blog::{Blog, Resolution},
        error::AppError,
        store::ContentStore,
    },
    cache::{CacheBackend, CacheConfig, LruCacheBackend},
    config,
    domain::article::Article,
    infra::{
        error::InfraError,
        http::{self, HttpState},
        store::{MemoryStore, WorkdirStore},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Resolve(args) => run_resolve(settings, &args.path).await,
    }
}

fn build_blog(settings: &config::Settings, store: Arc<dyn ContentStore>) -> Blog {
    let cache_config = CacheConfig::from(&settings.cache);
    let cache: Option<Arc<dyn CacheBackend>> = if cache_config.enabled {
        Some(Arc::new(LruCacheBackend::new(&cache_config)))
    } else {
        None
    };
    Blog::new(store, settings.content.handler.build(), cache)
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let root = &settings.store.root;
    if !root.is_dir() {
        return Err(AppError::from(InfraError::store_root(root.clone())));
    }

    let store =
        WorkdirStore::new(root.clone()).with_rescan_interval(settings.store.rescan_interval);
    let blog = build_blog(&settings, Arc::new(store));
    let state = HttpState {
        blog: Arc::new(blog),
        site: Arc::new(settings.blog.clone()),
    };
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::bind(settings.server.addr, err)))?;

    info!(
        addr = %settings.server.addr,
        root = %root.display(),
        handler = %settings.content.handler,
        mount_path = %settings.blog.mount_path,
        "serving blog"
    );

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
    let server = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = shutdown_rx.changed().await;
    });
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        result = &mut server => return flatten_server_result(result),
        _ = shutdown_signal() => {}
    }

    info!(
        grace_seconds = settings.server.graceful_shutdown.as_secs(),
        "shutdown requested, draining connections"
    );
    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(settings.server.graceful_shutdown, &mut server).await {
        Ok(result) => flatten_server_result(result),
        Err(_) => {
            warn!("graceful shutdown timed out, aborting open connections");
            server.abort();
            Ok(())
        }
    }
}

fn flatten_server_result(
    result: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::unexpected(format!("server error: {err}"))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

async fn run_resolve(settings: config::Settings, path: &str) -> Result<(), AppError> {
    let root = &settings.store.root;
    let store: Arc<dyn ContentStore> = if root.is_dir() {
        Arc::new(
            WorkdirStore::new(root.clone()).with_rescan_interval(settings.store.rescan_interval),
        )
    } else {
        warn!(root = %root.display(), "store root missing, resolving against an empty store");
        Arc::new(MemoryStore::new())
    };
    let blog = build_blog(&settings, store);

    let path = path.trim_start_matches('/');
    let resolution = blog.resolve(path).await?;
    println!("{} {}", resolution.kind(), describe(&resolution));

    match resolution {
        Resolution::NotFound => Err(AppError::NotFound),
        _ => Ok(()),
    }
}

fn describe(resolution: &Resolution) -> String {
    match resolution {
        Resolution::NotFound => String::new(),
        Resolution::Listing(listing) | Resolution::Feed(listing) => {
            let sections = listing.sections.join(",");
            let articles = listing
                .articles
                .iter()
                .map(|item| item.name.as_str())
                .collect::<Vec<_>>()
                .join(",");
            format!("{} sections=[{sections}] articles=[{articles}]", listing.path)
        }
        Resolution::Article { path, article } => match article.as_ref() {
            Article::Binary(data) => {
                let mime = mime_guess::from_path(path).first_or_octet_stream();
                format!("{path} {mime} {} bytes", data.len())
            }
            Article::Document(document) => format!(
                "{path} title={:?}",
                document.title().unwrap_or_default()
            ),
        },
    }
}
