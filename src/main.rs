use std::{process, sync::Arc, time::Duration};

use remote_purge::{
    application::{
        error::AppError,
        key_store::KeyStore,
        panel::PurgePanel,
        purge::{PurgeAction, PurgeFanout, PurgeService},
        regeneration::{KeyRegenerationGuard, RegenerationParams},
        repos::OptionStore,
    },
    config,
    infra::{
        cache::{ResponseCache, ResponseCachePurge},
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AdminState, PublicState},
        memory::MemoryOptionStore,
        nonce::InMemoryNonceService,
        telemetry,
        webhook::WebhookPurge,
    },
};
use remote_purge_api_types::PurgeResponseBody;
use tokio::try_join;
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

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::ShowUrl(_) => run_show_url(settings).await,
        config::Command::Regenerate(_) => run_regenerate(settings).await,
        config::Command::Trigger(args) => run_trigger(args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let store = init_store(&settings).await?;
    let keys = KeyStore::with_option_name(store.clone(), settings.purge.option_name.clone());
    let key = keys.ensure_initialized().await?;
    info!(
        target = "remote_purge::serve",
        fingerprint = %key.fingerprint(),
        "purge key ready"
    );

    let app = build_application_context(store, keys, &settings)?;
    serve_http(&settings, app.public_state, app.admin_state).await
}

async fn run_show_url(settings: config::Settings) -> Result<(), AppError> {
    let store = init_persistent_store(&settings).await?;
    let keys = KeyStore::with_option_name(store, settings.purge.option_name.clone());
    keys.ensure_initialized().await?;

    print_purge_url(&purge_panel(keys, &settings)).await
}

async fn run_regenerate(settings: config::Settings) -> Result<(), AppError> {
    let store = init_persistent_store(&settings).await?;
    let keys = KeyStore::with_option_name(store, settings.purge.option_name.clone());
    let key = keys.regenerate().await?;
    info!(
        target = "remote_purge::regenerate",
        fingerprint = %key.fingerprint(),
        "purge key rotated from the command line"
    );

    print_purge_url(&purge_panel(keys, &settings)).await
}

async fn run_trigger(args: config::TriggerArgs) -> Result<(), AppError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.timeout_seconds.max(1)))
        .build()
        .map_err(|err| AppError::from(InfraError::configuration(format!("http client: {err}"))))?;

    let response = client
        .get(args.url.clone())
        .send()
        .await
        .map_err(|err| AppError::from(InfraError::remote(err.to_string())))?;
    let status = response.status();
    let body: PurgeResponseBody = response.json().await.map_err(|err| {
        AppError::from(InfraError::remote(format!(
            "unexpected response (HTTP {status}): {err}"
        )))
    })?;

    println!("{}: {}", body.status, body.message);

    if !body.status.is_success() {
        return Err(AppError::from(InfraError::remote(format!(
            "purge rejected (HTTP {status}): {}",
            body.message
        ))));
    }

    info!(
        target = "remote_purge::trigger",
        url = %args.url.origin().ascii_serialization(),
        status = status.as_u16(),
        "remote purge accepted"
    );
    Ok(())
}

async fn print_purge_url(panel: &PurgePanel) -> Result<(), AppError> {
    let url = panel
        .purge_url()
        .await?
        .ok_or_else(|| AppError::unexpected("purge key missing after initialization"))?;
    println!("{url}");
    Ok(())
}

fn purge_panel(keys: KeyStore, settings: &config::Settings) -> PurgePanel {
    PurgePanel::new(
        keys,
        settings.purge.site_url.clone(),
        settings.purge.query_param.clone(),
    )
}

async fn init_store(settings: &config::Settings) -> Result<Arc<dyn OptionStore>, AppError> {
    let Some(database_url) = settings.database.url.as_ref() else {
        warn!(
            target = "remote_purge::store",
            "no database url configured; purge key lives in memory and is lost on restart"
        );
        return Ok(Arc::new(MemoryOptionStore::new()));
    };

    connect_store(database_url, settings).await
}

async fn init_persistent_store(
    settings: &config::Settings,
) -> Result<Arc<dyn OptionStore>, AppError> {
    let database_url = settings
        .require_database_url()
        .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;
    connect_store(database_url, settings).await
}

async fn connect_store(
    database_url: &str,
    settings: &config::Settings,
) -> Result<Arc<dyn OptionStore>, AppError> {
    let pool = PostgresRepositories::connect(
        database_url,
        settings.database.max_connections.get(),
        settings.database.acquire_timeout,
    )
    .await
    .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

struct ApplicationContext {
    public_state: PublicState,
    admin_state: AdminState,
}

fn build_application_context(
    store: Arc<dyn OptionStore>,
    keys: KeyStore,
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let cache = ResponseCache::new(settings.cache.response_limit);

    let mut fanout = PurgeFanout::new().with(Arc::new(ResponseCachePurge::new(cache.clone())));
    if let Some(endpoint) = settings.purge.webhook_url.clone() {
        let webhook = WebhookPurge::new(endpoint, settings.purge.webhook_timeout)?;
        info!(
            target = "remote_purge::serve",
            endpoint = %webhook.endpoint(),
            "purge webhook enabled"
        );
        fanout = fanout.with(Arc::new(webhook));
    }
    let purge_action: Arc<dyn PurgeAction> = Arc::new(fanout);

    let nonces = Arc::new(InMemoryNonceService::new(
        settings.regeneration.nonce_ttl,
        settings.regeneration.nonce_capacity.get(),
    ));
    let regeneration = Arc::new(KeyRegenerationGuard::new(
        keys.clone(),
        nonces,
        RegenerationParams {
            nonce_param: settings.regeneration.query_param.clone(),
            status_param: settings.regeneration.status_param.clone(),
        },
    ));

    let public_state = PublicState {
        purge: Arc::new(PurgeService::new(keys.clone(), purge_action.clone())),
        purge_param: Arc::from(settings.purge.query_param.as_str()),
        cache,
        store: store.clone(),
    };

    let admin_state = AdminState {
        panel: Arc::new(purge_panel(keys, settings)),
        regeneration,
        purge_action,
        store,
    };

    Ok(ApplicationContext {
        public_state,
        admin_state,
    })
}

async fn serve_http(
    settings: &config::Settings,
    public_state: PublicState,
    admin_state: AdminState,
) -> Result<(), AppError> {
    let public_router = http::build_public_router(public_state);
    let admin_router = http::build_admin_router(admin_state);

    let public_listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let admin_listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "remote_purge::serve",
        public = %settings.server.public_addr,
        admin = %settings.server.admin_addr,
        "listeners bound"
    );

    let public_server = axum::serve(public_listener, public_router.into_make_service());
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service());

    try_join!(public_server, admin_server)
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}
