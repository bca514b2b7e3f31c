use std::sync::Arc;
use std::time::Duration;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use dotenvy::dotenv;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod events;
mod model;
mod routes;
mod service;
mod store;
mod utils;

use api::AppState;
use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::events::{EventSink, TracingEventSink};
use crate::service::payroll_time::PayrollTimeCalculationService;
use crate::service::time_clock::{ReconcileStatus, TimeClockService};
use crate::store::mysql::{
    MySqlDirectoryStore, MySqlPayPeriodStore, MySqlPolicyStore, MySqlTimeEntryStore,
};
use crate::store::{DirectoryStore, PayPeriodStore, PolicyStore, TimeEntryStore};
use crate::utils::policy_cache::resolve_policy;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Time & Attendance service"
}

/// One reconciliation sweep: force-close stale entries for every company
/// that still has open ones.
async fn sweep_stale_entries(
    entries: &Arc<dyn TimeEntryStore>,
    policies: &Arc<dyn PolicyStore>,
    time_clock: &TimeClockService,
) -> anyhow::Result<()> {
    for company_id in entries.companies_with_active().await? {
        let policy = resolve_policy(policies.as_ref(), company_id).await?;
        let outcomes = time_clock.auto_clock_out_stale(company_id, &policy).await?;
        if !outcomes.is_empty() {
            let failures = outcomes
                .iter()
                .filter(|o| o.status == ReconcileStatus::Failure)
                .count();
            info!(
                company_id,
                reconciled = outcomes.len(),
                failures,
                "stale entry sweep"
            );
        }
    }
    Ok(())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let config = Config::from_env();

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url).await;

    let entries: Arc<dyn TimeEntryStore> = Arc::new(MySqlTimeEntryStore::new(pool.clone()));
    let periods: Arc<dyn PayPeriodStore> = Arc::new(MySqlPayPeriodStore::new(pool.clone()));
    let directory: Arc<dyn DirectoryStore> = Arc::new(MySqlDirectoryStore::new(pool.clone()));
    let policies: Arc<dyn PolicyStore> = Arc::new(MySqlPolicyStore::new(pool.clone()));
    let events: Arc<dyn EventSink> = Arc::new(TracingEventSink);

    let state = AppState {
        time_clock: TimeClockService::new(entries.clone(), directory.clone(), events.clone()),
        payroll: PayrollTimeCalculationService::new(
            entries.clone(),
            periods.clone(),
            directory.clone(),
            events.clone(),
        ),
        policies: policies.clone(),
        periods: periods.clone(),
    };

    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    // Background reconciler: the batch trigger for auto clock-out.
    let sweep_clock = state.time_clock.clone();
    let sweep_entries = entries.clone();
    let sweep_policies = policies.clone();
    let sweep_every = config.reconcile_interval_secs;
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(Duration::from_secs(sweep_every));
        loop {
            interval.tick().await;
            if let Err(e) =
                sweep_stale_entries(&sweep_entries, &sweep_policies, &sweep_clock).await
            {
                tracing::error!(error = %e, "stale entry sweep failed");
            }
        }
    });

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(state.clone()))
            .app_data(Data::new(config.clone()))
            .service(index)
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await
}
