use axum::{
    extract::State,
    Extension, Json,
};

use shiv_core::{
    format::first_of_month,
    reports::{BalanceSheet, ProfitAndLoss, TrialBalance},
};

use super::{query_date, ApiQuery, AppState, DateQuery};
use crate::{
    auth::{CallerIdentity, Permission},
    books::{today, Dashboard},
    error::BooksResult,
};

pub async fn trial_balance(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiQuery(q): ApiQuery<DateQuery>,
) -> BooksResult<Json<TrialBalance>> {
    caller.require(Permission::Reports)?;
    let as_of = query_date(q.as_of.as_deref(), "as_of")?.unwrap_or_else(today);
    Ok(Json(state.books.trial_balance(as_of)?))
}

pub async fn balance_sheet(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiQuery(q): ApiQuery<DateQuery>,
) -> BooksResult<Json<BalanceSheet>> {
    caller.require(Permission::Reports)?;
    let as_of = query_date(q.as_of.as_deref(), "as_of")?.unwrap_or_else(today);
    Ok(Json(state.books.balance_sheet(as_of)?))
}

pub async fn profit_and_loss(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiQuery(q): ApiQuery<DateQuery>,
) -> BooksResult<Json<ProfitAndLoss>> {
    caller.require(Permission::Reports)?;
    let to = query_date(q.to.as_deref(), "to")?.unwrap_or_else(today);
    let from = query_date(q.from.as_deref(), "from")?.unwrap_or_else(|| first_of_month(to));
    Ok(Json(state.books.profit_and_loss(from, to)?))
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiQuery(q): ApiQuery<DateQuery>,
) -> BooksResult<Json<Dashboard>> {
    caller.require(Permission::Reports)?;
    let as_of = query_date(q.as_of.as_deref(), "as_of")?.unwrap_or_else(today);
    Ok(Json(state.books.dashboard(as_of)?))
}
