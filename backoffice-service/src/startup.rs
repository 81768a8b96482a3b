use crate::config::Config;
use crate::handlers;
use crate::services::{
    metrics, Database, LocalStorage, PaymentGateway, ReminderService, Storage,
};
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::tracing::request_id_middleware;
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub jwt_secret: String,
    pub reminder: ReminderService,
    pub gateway: PaymentGateway,
    pub storage: Arc<dyn Storage>,
    pub max_receipt_bytes: usize,
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
}

impl Application {
    pub async fn build(config: Config) -> Result<Self, AppError> {
        let db = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;
        db.run_migrations().await?;

        metrics::init_metrics();

        let reminder = ReminderService::new(config.reminder.clone(), config.smtp.clone())?;
        let gateway = PaymentGateway::new(config.gateway.clone());
        let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new(&config.storage));

        let state = AppState {
            db,
            jwt_secret: config.auth.jwt_secret.expose_secret().clone(),
            reminder,
            gateway,
            storage,
            max_receipt_bytes: config.storage.max_receipt_bytes,
        };

        let app = router(state);

        let addr = format!("{}:{}", config.server.host, config.server.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, app);

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_handler))
        // Onboarding and company settings
        .route("/onboarding", post(handlers::companies::onboard_company))
        .route(
            "/company",
            get(handlers::companies::get_company).patch(handlers::companies::update_company),
        )
        // Team
        .route(
            "/users",
            get(handlers::users::list_users).post(handlers::users::invite_user),
        )
        .route(
            "/users/:id",
            patch(handlers::users::update_user_role).delete(handlers::users::delete_user),
        )
        // Customers
        .route(
            "/customers",
            get(handlers::customers::list_customers).post(handlers::customers::create_customer),
        )
        .route(
            "/customers/:id",
            get(handlers::customers::get_customer).patch(handlers::customers::update_customer),
        )
        .route(
            "/customers/:id/deactivate",
            post(handlers::customers::deactivate_customer),
        )
        .route(
            "/customers/:id/reactivate",
            post(handlers::customers::reactivate_customer),
        )
        // Quotes
        .route(
            "/quotes",
            get(handlers::quotes::list_quotes).post(handlers::quotes::create_quote),
        )
        .route(
            "/quotes/:id",
            get(handlers::quotes::get_quote)
                .patch(handlers::quotes::update_quote)
                .delete(handlers::quotes::delete_quote),
        )
        .route("/quotes/:id/send", post(handlers::quotes::send_quote))
        .route("/quotes/:id/accept", post(handlers::quotes::accept_quote))
        .route("/quotes/:id/reject", post(handlers::quotes::reject_quote))
        .route("/quotes/:id/convert", post(handlers::quotes::convert_quote))
        // Invoices
        .route(
            "/invoices",
            get(handlers::invoices::list_invoices).post(handlers::invoices::create_invoice),
        )
        .route(
            "/invoices/:id",
            get(handlers::invoices::get_invoice)
                .patch(handlers::invoices::update_invoice)
                .delete(handlers::invoices::delete_invoice),
        )
        .route("/invoices/:id/pay", post(handlers::invoices::pay_invoice))
        .route(
            "/invoices/:id/mark-paid",
            post(handlers::invoices::mark_invoice_paid),
        )
        .route(
            "/invoices/:id/cancel",
            post(handlers::invoices::cancel_invoice),
        )
        .route(
            "/invoices/:id/refund",
            post(handlers::invoices::refund_invoice),
        )
        .route(
            "/invoices/:id/reminder",
            post(handlers::invoices::send_reminder),
        )
        .route(
            "/invoices/:id/payments",
            get(handlers::invoices::list_invoice_payments),
        )
        // Loads
        .route(
            "/loads",
            get(handlers::loads::list_loads).post(handlers::loads::create_load),
        )
        .route(
            "/loads/:id",
            get(handlers::loads::get_load)
                .patch(handlers::loads::update_load)
                .delete(handlers::loads::delete_load),
        )
        .route("/loads/:id/assign", post(handlers::loads::assign_load))
        .route("/loads/:id/status", post(handlers::loads::set_load_status))
        // Expenses
        .route(
            "/expenses",
            get(handlers::expenses::list_expenses).post(handlers::expenses::create_expense),
        )
        .route(
            "/expenses/:id",
            get(handlers::expenses::get_expense).patch(handlers::expenses::update_expense),
        )
        .route(
            "/expenses/:id/approve",
            post(handlers::expenses::approve_expense),
        )
        .route(
            "/expenses/:id/reject",
            post(handlers::expenses::reject_expense),
        )
        .route(
            "/expenses/:id/receipt",
            post(handlers::expenses::upload_receipt),
        )
        // Reporting and super-admin console
        .route("/dashboard", get(handlers::admin::company_dashboard))
        .route("/admin/companies", get(handlers::admin::list_companies))
        .route(
            "/admin/companies/:id/suspend",
            post(handlers::admin::suspend_company),
        )
        .route(
            "/admin/companies/:id/reactivate",
            post(handlers::admin::reactivate_company),
        )
        // Receipt uploads run up to 5 MiB; leave headroom over axum's
        // 2 MiB default.
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(middleware::from_fn(
            crate::middleware::metrics_middleware,
        ))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
