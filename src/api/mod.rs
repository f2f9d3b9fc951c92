//! HTTP API. JSON in and out; every route under `/api` passes through the
//! auth middleware and checks the caller's role before touching the books.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use time::Date;

use shiv_core::format::parse_iso_date;

use crate::{
    auth::auth_middleware,
    books::Books,
    config::AuthConfig,
    error::{BooksError, BooksResult},
};

mod accounts;
mod documents;
mod extract;
mod masters;
mod reports;

pub use extract::{ApiJson, ApiPath, ApiQuery};

#[derive(Clone)]
pub struct AppState {
    pub books: Arc<Books>,
    pub metrics: Option<PrometheusHandle>,
}

/// Optional `YYYY-MM-DD` query parameters shared by reports and statements.
#[derive(Debug, Default, Deserialize)]
pub struct DateQuery {
    pub as_of: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub date: Option<String>,
}

pub(crate) fn query_date(value: Option<&str>, name: &str) -> BooksResult<Option<Date>> {
    value
        .map(|v| parse_iso_date(v).ok_or_else(|| BooksError::validation(format!("{name} must be a YYYY-MM-DD date, got {v}"))))
        .transpose()
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics are disabled").into_response(),
    }
}

pub fn router(state: AppState, auth: Arc<AuthConfig>) -> Router {
    let api = Router::new()
        .route("/contacts", get(masters::list_contacts).post(masters::create_contact))
        .route(
            "/contacts/:id",
            get(masters::get_contact).put(masters::update_contact).delete(masters::delete_contact),
        )
        .route("/products", get(masters::list_products).post(masters::create_product))
        .route(
            "/products/:id",
            get(masters::get_product).put(masters::update_product).delete(masters::delete_product),
        )
        .route("/accounts", get(accounts::list_accounts).post(accounts::create_account))
        .route("/accounts/tree", get(accounts::account_tree))
        .route(
            "/accounts/:id",
            get(accounts::get_account).put(accounts::update_account).delete(accounts::delete_account),
        )
        .route("/accounts/:id/statement", get(accounts::account_statement))
        .route("/invoices", get(documents::list_invoices).post(documents::create_invoice))
        .route("/invoices/overdue", get(documents::overdue_invoices))
        .route(
            "/invoices/:id",
            get(documents::get_invoice).put(documents::update_invoice).delete(documents::delete_invoice),
        )
        .route("/invoices/:id/post", post(documents::post_invoice))
        .route("/invoices/:id/cancel", post(documents::cancel_invoice))
        .route("/invoices/:id/html", get(documents::invoice_html))
        .route("/payments", get(documents::list_payments).post(documents::record_payment))
        .route("/payments/:id", get(documents::get_payment))
        .route("/orders", get(documents::list_orders).post(documents::create_order))
        .route(
            "/orders/:id",
            get(documents::get_order).put(documents::update_order).delete(documents::delete_order),
        )
        .route("/orders/:id/confirm", post(documents::confirm_order))
        .route("/orders/:id/cancel", post(documents::cancel_order))
        .route("/orders/:id/invoice", post(documents::invoice_order))
        .route("/reports/trial-balance", get(reports::trial_balance))
        .route("/reports/balance-sheet", get(reports::balance_sheet))
        .route("/reports/profit-loss", get(reports::profit_and_loss))
        .route("/reports/dashboard", get(reports::dashboard))
        .route("/settings/company", get(masters::get_settings).put(masters::update_settings))
        .route("/settings/taxes", get(masters::list_taxes).post(masters::create_tax))
        .route(
            "/settings/taxes/:id",
            get(masters::get_tax).put(masters::update_tax).delete(masters::delete_tax),
        )
        .route("/settings/currencies", get(masters::list_currencies).post(masters::upsert_currency))
        .route_layer(middleware::from_fn(auth_middleware))
        .layer(Extension(auth));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .nest("/api", api)
        .with_state(state)
}
