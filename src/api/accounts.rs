use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use shiv_core::{coa::AccountNode, format::first_of_month, models::write::AccountInput, Account};

use super::{query_date, ApiJson, ApiPath, ApiQuery, AppState, DateQuery};
use crate::{
    auth::{CallerIdentity, Permission},
    books::{today, AccountStatement},
    error::BooksResult,
};

pub async fn list_accounts(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
) -> BooksResult<Json<Vec<Account>>> {
    caller.require(Permission::Read)?;
    Ok(Json(state.books.list_accounts()?))
}

pub async fn account_tree(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
) -> BooksResult<Json<Vec<AccountNode>>> {
    caller.require(Permission::Read)?;
    Ok(Json(state.books.account_tree()?))
}

pub async fn create_account(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiJson(input): ApiJson<AccountInput>,
) -> BooksResult<(StatusCode, Json<Account>)> {
    caller.require(Permission::Admin)?;
    Ok((StatusCode::CREATED, Json(state.books.create_account(input)?)))
}

pub async fn get_account(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiPath(id): ApiPath<Uuid>,
) -> BooksResult<Json<Account>> {
    caller.require(Permission::Read)?;
    Ok(Json(state.books.get_account(id)?))
}

pub async fn update_account(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<AccountInput>,
) -> BooksResult<Json<Account>> {
    caller.require(Permission::Admin)?;
    Ok(Json(state.books.update_account(id, input)?))
}

pub async fn delete_account(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiPath(id): ApiPath<Uuid>,
) -> BooksResult<StatusCode> {
    caller.require(Permission::Admin)?;
    state.books.delete_account(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `from` defaults to the first of the current month, `to` to today.
pub async fn account_statement(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(q): ApiQuery<DateQuery>,
) -> BooksResult<Json<AccountStatement>> {
    caller.require(Permission::Reports)?;
    let to = query_date(q.to.as_deref(), "to")?.unwrap_or_else(today);
    let from = query_date(q.from.as_deref(), "from")?.unwrap_or_else(|| first_of_month(to));
    Ok(Json(state.books.account_statement(id, from, to)?))
}
