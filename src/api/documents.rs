use axum::{
    extract::State,
    http::StatusCode,
    response::Html,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shiv_core::{
    models::write::{InvoiceInput, OrderInput, PaymentInput},
    storage::{InvoiceFilter, OrderFilter, PaymentFilter},
    Invoice, InvoiceKind, Order, Payment,
};

use super::{query_date, ApiJson, ApiPath, ApiQuery, AppState, DateQuery};
use crate::{
    auth::{CallerIdentity, Permission},
    books::{today, Page, Pagination},
    error::BooksResult,
    render,
};

#[derive(Debug, Deserialize)]
pub struct OverdueQuery {
    pub kind: Option<InvoiceKind>,
}

pub async fn list_invoices(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiQuery(filter): ApiQuery<InvoiceFilter>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> BooksResult<Json<Page<Invoice>>> {
    caller.require(Permission::Read)?;
    Ok(Json(state.books.list_invoices(&filter, &page)?))
}

/// Customer invoices unless `kind=vendor_bill`.
pub async fn overdue_invoices(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiQuery(q): ApiQuery<OverdueQuery>,
) -> BooksResult<Json<Vec<Invoice>>> {
    caller.require(Permission::Read)?;
    let kind = q.kind.unwrap_or(InvoiceKind::CustomerInvoice);
    Ok(Json(state.books.overdue_invoices(kind, today())?))
}

pub async fn create_invoice(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiJson(input): ApiJson<InvoiceInput>,
) -> BooksResult<(StatusCode, Json<Invoice>)> {
    caller.require(Permission::Write)?;
    Ok((StatusCode::CREATED, Json(state.books.create_invoice(input)?)))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiPath(id): ApiPath<Uuid>,
) -> BooksResult<Json<Invoice>> {
    caller.require(Permission::Read)?;
    Ok(Json(state.books.get_invoice(id)?))
}

pub async fn update_invoice(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<InvoiceInput>,
) -> BooksResult<Json<Invoice>> {
    caller.require(Permission::Write)?;
    Ok(Json(state.books.update_invoice(id, input)?))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiPath(id): ApiPath<Uuid>,
) -> BooksResult<StatusCode> {
    caller.require(Permission::Write)?;
    state.books.delete_invoice(id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn post_invoice(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiPath(id): ApiPath<Uuid>,
) -> BooksResult<Json<Invoice>> {
    caller.require(Permission::Write)?;
    Ok(Json(state.books.post_invoice(id)?))
}

pub async fn cancel_invoice(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiPath(id): ApiPath<Uuid>,
) -> BooksResult<Json<Invoice>> {
    caller.require(Permission::Write)?;
    Ok(Json(state.books.cancel_invoice(id)?))
}

pub async fn invoice_html(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiPath(id): ApiPath<Uuid>,
) -> BooksResult<Html<String>> {
    caller.require(Permission::Read)?;
    let invoice = state.books.get_invoice(id)?;
    let contact = state.books.get_contact(invoice.contact_id)?;
    let settings = state.books.settings()?;
    Ok(Html(render::invoice_html(&invoice, &contact, &settings)?))
}

pub async fn list_payments(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiQuery(filter): ApiQuery<PaymentFilter>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> BooksResult<Json<Page<Payment>>> {
    caller.require(Permission::Read)?;
    Ok(Json(state.books.list_payments(&filter, &page)?))
}

pub async fn record_payment(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiJson(input): ApiJson<PaymentInput>,
) -> BooksResult<(StatusCode, Json<Payment>)> {
    caller.require(Permission::Write)?;
    Ok((StatusCode::CREATED, Json(state.books.record_payment(input)?)))
}

pub async fn get_payment(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiPath(id): ApiPath<Uuid>,
) -> BooksResult<Json<Payment>> {
    caller.require(Permission::Read)?;
    Ok(Json(state.books.get_payment(id)?))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiQuery(filter): ApiQuery<OrderFilter>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> BooksResult<Json<Page<Order>>> {
    caller.require(Permission::Read)?;
    Ok(Json(state.books.list_orders(&filter, &page)?))
}

pub async fn create_order(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiJson(input): ApiJson<OrderInput>,
) -> BooksResult<(StatusCode, Json<Order>)> {
    caller.require(Permission::Write)?;
    Ok((StatusCode::CREATED, Json(state.books.create_order(input)?)))
}

pub async fn get_order(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiPath(id): ApiPath<Uuid>,
) -> BooksResult<Json<Order>> {
    caller.require(Permission::Read)?;
    Ok(Json(state.books.get_order(id)?))
}

pub async fn update_order(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<OrderInput>,
) -> BooksResult<Json<Order>> {
    caller.require(Permission::Write)?;
    Ok(Json(state.books.update_order(id, input)?))
}

pub async fn delete_order(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiPath(id): ApiPath<Uuid>,
) -> BooksResult<StatusCode> {
    caller.require(Permission::Write)?;
    state.books.delete_order(id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn confirm_order(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiPath(id): ApiPath<Uuid>,
) -> BooksResult<Json<Order>> {
    caller.require(Permission::Write)?;
    Ok(Json(state.books.confirm_order(id)?))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiPath(id): ApiPath<Uuid>,
) -> BooksResult<Json<Order>> {
    caller.require(Permission::Write)?;
    Ok(Json(state.books.cancel_order(id)?))
}

/// The invoice is dated `?date=YYYY-MM-DD`, or today.
pub async fn invoice_order(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(q): ApiQuery<DateQuery>,
) -> BooksResult<(StatusCode, Json<Invoice>)> {
    caller.require(Permission::Write)?;
    let date = query_date(q.date.as_deref(), "date")?.unwrap_or_else(today);
    Ok((StatusCode::CREATED, Json(state.books.invoice_order(id, date)?)))
}
