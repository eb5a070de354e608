use std::{
    io::{self, Read, Write},
    net::SocketAddr,
    process,
    sync::Arc,
};

use axum_extra::extract::cookie::Key;
use june::{
    application::{
        error::AppError,
        render::{MarkdownRenderer, RenderPipelineConfig, SafeHtmlRenderer},
        startup,
    },
    cache::{CacheConfig, build_html_cache},
    config::{self, RenderArgs, SecuritySettings},
    infra::{
        db::{PgSessionFactory, PostgresRepositories},
        error::InfraError,
        http::{self, HttpState},
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

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;
    startup::announce(&settings);

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Render(args) => run_render(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(InfraError::from)?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;

    let repositories = Arc::new(PostgresRepositories::new(pool.clone()));
    let state = HttpState {
        members: repositories.clone(),
        health: repositories,
        sessions: Arc::new(PgSessionFactory::new(pool)),
        renderer: build_markdown_renderer(&settings)?,
        site: Arc::new(settings.site.clone()),
        cookie_key: cookie_key(&settings.security)?,
        trust_forwarded_headers: settings.server.trust_forwarded_headers,
    };

    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(addr = %settings.server.addr, "listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}

async fn run_render(settings: config::Settings, args: RenderArgs) -> Result<(), AppError> {
    let source = if args.file.as_os_str() == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(InfraError::from)?;
        buffer
    } else {
        tokio::fs::read_to_string(&args.file)
            .await
            .map_err(InfraError::from)?
    };

    let html = build_markdown_renderer(&settings)?.markdown(&source);
    io::stdout()
        .write_all(html.as_bytes())
        .map_err(InfraError::from)?;
    Ok(())
}

fn build_markdown_renderer(settings: &config::Settings) -> Result<MarkdownRenderer, AppError> {
    let pipeline = SafeHtmlRenderer::new(&RenderPipelineConfig::from(&settings.render))
        .map_err(|err| AppError::unexpected(err.to_string()))?;
    let cache = build_html_cache(&CacheConfig::from(&settings.cache));
    Ok(MarkdownRenderer::new(Arc::new(pipeline), cache))
}

fn cookie_key(security: &SecuritySettings) -> Result<Key, AppError> {
    match security.cookie_secret.as_ref() {
        Some(secret) => Key::try_from(secret.as_bytes())
            .map_err(|err| InfraError::configuration(format!("invalid cookie secret: {err}")).into()),
        None => {
            warn!("security.cookie_secret is not set; member sessions will not survive a restart");
            Ok(Key::generate())
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received");
}
