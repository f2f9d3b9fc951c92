use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use shiv_core::{
    models::write::{ContactInput, ProductInput, TaxInput},
    storage::{ContactFilter, ProductFilter},
    CompanySettings, Contact, Currency, Product, Tax,
};

use super::{ApiJson, ApiPath, ApiQuery, AppState};
use crate::{
    auth::{CallerIdentity, Permission},
    books::{Page, Pagination},
    error::BooksResult,
};

pub async fn list_contacts(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiQuery(filter): ApiQuery<ContactFilter>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> BooksResult<Json<Page<Contact>>> {
    caller.require(Permission::Read)?;
    Ok(Json(state.books.list_contacts(&filter, &page)?))
}

pub async fn create_contact(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiJson(input): ApiJson<ContactInput>,
) -> BooksResult<(StatusCode, Json<Contact>)> {
    caller.require(Permission::Write)?;
    Ok((StatusCode::CREATED, Json(state.books.create_contact(input)?)))
}

pub async fn get_contact(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiPath(id): ApiPath<Uuid>,
) -> BooksResult<Json<Contact>> {
    caller.require(Permission::Read)?;
    Ok(Json(state.books.get_contact(id)?))
}

pub async fn update_contact(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<ContactInput>,
) -> BooksResult<Json<Contact>> {
    caller.require(Permission::Write)?;
    Ok(Json(state.books.update_contact(id, input)?))
}

pub async fn delete_contact(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiPath(id): ApiPath<Uuid>,
) -> BooksResult<StatusCode> {
    caller.require(Permission::DeleteMaster)?;
    state.books.delete_contact(id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_products(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiQuery(filter): ApiQuery<ProductFilter>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> BooksResult<Json<Page<Product>>> {
    caller.require(Permission::Read)?;
    Ok(Json(state.books.list_products(&filter, &page)?))
}

pub async fn create_product(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiJson(input): ApiJson<ProductInput>,
) -> BooksResult<(StatusCode, Json<Product>)> {
    caller.require(Permission::Write)?;
    Ok((StatusCode::CREATED, Json(state.books.create_product(input)?)))
}

pub async fn get_product(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiPath(id): ApiPath<Uuid>,
) -> BooksResult<Json<Product>> {
    caller.require(Permission::Read)?;
    Ok(Json(state.books.get_product(id)?))
}

pub async fn update_product(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<ProductInput>,
) -> BooksResult<Json<Product>> {
    caller.require(Permission::Write)?;
    Ok(Json(state.books.update_product(id, input)?))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiPath(id): ApiPath<Uuid>,
) -> BooksResult<StatusCode> {
    caller.require(Permission::DeleteMaster)?;
    state.books.delete_product(id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_settings(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
) -> BooksResult<Json<CompanySettings>> {
    caller.require(Permission::Read)?;
    Ok(Json(state.books.settings()?))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiJson(settings): ApiJson<CompanySettings>,
) -> BooksResult<Json<CompanySettings>> {
    caller.require(Permission::Admin)?;
    Ok(Json(state.books.update_settings(settings)?))
}

pub async fn list_taxes(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
) -> BooksResult<Json<Vec<Tax>>> {
    caller.require(Permission::Read)?;
    Ok(Json(state.books.list_taxes()?))
}

pub async fn create_tax(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiJson(input): ApiJson<TaxInput>,
) -> BooksResult<(StatusCode, Json<Tax>)> {
    caller.require(Permission::Admin)?;
    Ok((StatusCode::CREATED, Json(state.books.create_tax(input)?)))
}

pub async fn get_tax(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiPath(id): ApiPath<Uuid>,
) -> BooksResult<Json<Tax>> {
    caller.require(Permission::Read)?;
    Ok(Json(state.books.get_tax(id)?))
}

pub async fn update_tax(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<TaxInput>,
) -> BooksResult<Json<Tax>> {
    caller.require(Permission::Admin)?;
    Ok(Json(state.books.update_tax(id, input)?))
}

pub async fn delete_tax(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiPath(id): ApiPath<Uuid>,
) -> BooksResult<StatusCode> {
    caller.require(Permission::Admin)?;
    state.books.delete_tax(id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_currencies(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
) -> BooksResult<Json<Vec<Currency>>> {
    caller.require(Permission::Read)?;
    Ok(Json(state.books.list_currencies()?))
}

pub async fn upsert_currency(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiJson(currency): ApiJson<Currency>,
) -> BooksResult<Json<Currency>> {
    caller.require(Permission::Admin)?;
    Ok(Json(state.books.upsert_currency(currency)?))
}
