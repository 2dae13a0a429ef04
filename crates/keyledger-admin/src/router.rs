use std::str::FromStr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use keyledger_common::{
    Custody, EmployeeId, EmployeeInput, KeyId, KeyInput, KeyStatus, KeyUpdate, TransactionAction,
};
use keyledger_core::{EntityStore, StoreError};

use crate::views::{self, Period, StatusFilter, TransactionFilter};

const DEFAULT_OPERATOR: &str = "admin";

#[derive(Clone)]
struct AdminState {
    store: Arc<EntityStore>,
    admin_key: Option<Arc<str>>,
}

/// JSON API over the entity store. With `admin_key` set, every route
/// requires it.
pub fn admin_router(store: Arc<EntityStore>, admin_key: Option<String>) -> Router {
    let state = AdminState {
        store,
        admin_key: admin_key.map(Arc::from),
    };

    Router::new()
        .route("/api/health", get(health))
        .route("/api/dashboard", get(dashboard))
        .route("/api/employees", get(list_employees).post(create_employee))
        .route(
            "/api/employees/{id}",
            get(get_employee).put(update_employee).delete(delete_employee),
        )
        .route("/api/keys", get(list_keys).post(create_key))
        .route("/api/keys/{id}", put(update_key).delete(delete_key))
        .route("/api/keys/{id}/issue", post(issue_key))
        .route("/api/keys/{id}/return", post(return_key))
        .route("/api/transactions", get(list_transactions))
        .route("/api/reload", post(reload_snapshot))
        .with_state(state)
}

async fn health(State(state): State<AdminState>, headers: HeaderMap) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }

    match state.store.health().await {
        Ok(()) => Json(json!({ "status": "ok" })).into_response(),
        Err(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": err.kind(), "message": err.to_string() })),
        )
            .into_response(),
    }
}

async fn dashboard(State(state): State<AdminState>, headers: HeaderMap) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }

    let snapshot = state.store.snapshot();
    Json(views::dashboard(&snapshot, OffsetDateTime::now_utc())).into_response()
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    search: Option<String>,
}

async fn list_employees(
    State(state): State<AdminState>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }

    let snapshot = state.store.snapshot();
    let items = views::employee_list(&snapshot, query.search.as_deref(), today());
    Json(json!({ "count": items.len(), "items": items })).into_response()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmployeePayload {
    name: Option<String>,
    employee_number: Option<String>,
    #[serde(rename = "type")]
    category: Option<String>,
    start_date: Option<String>,
}

impl EmployeePayload {
    fn into_input(self) -> Result<EmployeeInput, StoreError> {
        let start_date = present("startDate", self.start_date)?;
        Ok(EmployeeInput {
            name: present("name", self.name)?,
            employee_number: present("employeeNumber", self.employee_number)?,
            category: parse_field("type", self.category)?,
            start_date: Date::parse(
                start_date.trim(),
                format_description!("[year]-[month]-[day]"),
            )
            .map_err(|err| StoreError::validation("startDate", err.to_string()))?,
        })
    }
}

async fn create_employee(
    State(state): State<AdminState>,
    headers: HeaderMap,
    payload: Result<Json<EmployeePayload>, JsonRejection>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }

    let input = match lenient(payload).and_then(EmployeePayload::into_input) {
        Ok(input) => input,
        Err(err) => return store_error(err),
    };
    match state.store.add_employee(input).await {
        Ok(employee) => (StatusCode::CREATED, Json(employee)).into_response(),
        Err(err) => store_error(err),
    }
}

async fn get_employee(
    State(state): State<AdminState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }

    let id: EmployeeId = match parse_id(&id) {
        Ok(id) => id,
        Err(err) => return store_error(err),
    };
    let snapshot = state.store.snapshot();
    match views::employee_detail(&snapshot, id, today()) {
        Some(detail) => Json(detail).into_response(),
        None => store_error(StoreError::NotFound {
            entity: "employee",
            id: id.as_uuid(),
        }),
    }
}

async fn update_employee(
    State(state): State<AdminState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<EmployeePayload>, JsonRejection>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }

    let parsed = parse_id::<EmployeeId>(&id)
        .and_then(|id| Ok((id, lenient(payload)?.into_input()?)));
    let (id, input) = match parsed {
        Ok(parsed) => parsed,
        Err(err) => return store_error(err),
    };
    match state.store.update_employee(id, input).await {
        Ok(employee) => Json(employee).into_response(),
        Err(err) => store_error(err),
    }
}

async fn delete_employee(
    State(state): State<AdminState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }

    let id: EmployeeId = match parse_id(&id) {
        Ok(id) => id,
        Err(err) => return store_error(err),
    };
    match state.store.delete_employee(id).await {
        Ok(released) => Json(json!({ "status": "ok", "releasedKeys": released })).into_response(),
        Err(err) => store_error(err),
    }
}

#[derive(Debug, Default, Deserialize)]
struct KeyQuery {
    search: Option<String>,
    status: Option<String>,
}

async fn list_keys(
    State(state): State<AdminState>,
    headers: HeaderMap,
    Query(query): Query<KeyQuery>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }

    let status = match query.status.as_deref().map(StatusFilter::from_str).transpose() {
        Ok(status) => status.unwrap_or_default(),
        Err(err) => return store_error(StoreError::validation("status", err.to_string())),
    };
    let snapshot = state.store.snapshot();
    let items = views::key_list(&snapshot, query.search.as_deref(), status);
    Json(json!({ "count": items.len(), "items": items })).into_response()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyPayload {
    key_number: Option<String>,
    #[serde(rename = "type")]
    key_type: Option<String>,
    length: Option<String>,
    #[serde(alias = "opmerking")]
    note: Option<String>,
    status: Option<String>,
    assigned_to: Option<String>,
}

impl KeyPayload {
    /// Custody fields are ignored: new keys always start out available.
    fn into_input(self) -> Result<KeyInput, StoreError> {
        Ok(KeyInput {
            key_number: present("keyNumber", self.key_number)?,
            key_type: parse_field("type", self.key_type)?,
            length: parse_field("length", self.length)?,
            note: self.note,
        })
    }

    /// Without an explicit status the assignment decides it. With neither,
    /// the key keeps its current custody.
    fn into_update(self, handled_by: String) -> Result<KeyUpdate, StoreError> {
        let assigned_to = match self.assigned_to.filter(|v| !v.trim().is_empty()) {
            Some(raw) => Some(parse_id::<EmployeeId>(&raw).map_err(|_| {
                StoreError::validation("assignedTo", format!("not an employee id: {raw:?}"))
            })?),
            None => None,
        };
        let status = match self.status.filter(|v| !v.trim().is_empty()) {
            Some(raw) => Some(
                raw.parse::<KeyStatus>()
                    .map_err(|err| StoreError::validation("status", err.to_string()))?,
            ),
            None if assigned_to.is_some() => Some(KeyStatus::Issued),
            None => None,
        };
        let custody = status
            .map(|status| Custody::from_parts(status, assigned_to))
            .transpose()
            .map_err(|err| StoreError::validation("assignedTo", err.to_string()))?;
        Ok(KeyUpdate {
            key_number: present("keyNumber", self.key_number)?,
            key_type: parse_field("type", self.key_type)?,
            length: parse_field("length", self.length)?,
            note: self.note,
            custody,
            handled_by: Some(handled_by),
        })
    }
}

async fn create_key(
    State(state): State<AdminState>,
    headers: HeaderMap,
    payload: Result<Json<KeyPayload>, JsonRejection>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }

    let input = match lenient(payload).and_then(KeyPayload::into_input) {
        Ok(input) => input,
        Err(err) => return store_error(err),
    };
    match state.store.add_key(input).await {
        Ok(key) => (StatusCode::CREATED, Json(key)).into_response(),
        Err(err) => store_error(err),
    }
}

async fn update_key(
    State(state): State<AdminState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<KeyPayload>, JsonRejection>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }

    let operator = operator(&headers);
    let parsed = parse_id::<KeyId>(&id)
        .and_then(|id| Ok((id, lenient(payload)?.into_update(operator)?)));
    let (id, update) = match parsed {
        Ok(parsed) => parsed,
        Err(err) => return store_error(err),
    };
    match state.store.update_key(id, update).await {
        Ok(key) => Json(key).into_response(),
        Err(err) => store_error(err),
    }
}

async fn delete_key(
    State(state): State<AdminState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }

    let id: KeyId = match parse_id(&id) {
        Ok(id) => id,
        Err(err) => return store_error(err),
    };
    match state.store.delete_key(id).await {
        Ok(()) => Json(json!({ "status": "ok" })).into_response(),
        Err(err) => store_error(err),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssuePayload {
    employee_id: Option<String>,
    notes: Option<String>,
}

impl IssuePayload {
    fn into_request(
        self,
        key_id: KeyId,
    ) -> Result<(KeyId, EmployeeId, Option<String>), StoreError> {
        let employee_id = parse_field("employeeId", self.employee_id)?;
        Ok((key_id, employee_id, self.notes))
    }
}

async fn issue_key(
    State(state): State<AdminState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<IssuePayload>, JsonRejection>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }

    let parsed = parse_id::<KeyId>(&id).and_then(|id| lenient(payload)?.into_request(id));
    let (key_id, employee_id, notes) = match parsed {
        Ok(parsed) => parsed,
        Err(err) => return store_error(err),
    };
    match state
        .store
        .issue_key(key_id, employee_id, &operator(&headers), notes)
        .await
    {
        Ok(transaction) => (StatusCode::CREATED, Json(transaction)).into_response(),
        Err(err) => store_error(err),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ReturnPayload {
    notes: Option<String>,
}

async fn return_key(
    State(state): State<AdminState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<ReturnPayload>, JsonRejection>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }

    let parsed = parse_id::<KeyId>(&id).and_then(|id| Ok((id, lenient(payload)?.notes)));
    let (key_id, notes) = match parsed {
        Ok(parsed) => parsed,
        Err(err) => return store_error(err),
    };
    match state
        .store
        .return_key(key_id, &operator(&headers), notes)
        .await
    {
        Ok(transaction) => Json(json!({ "transaction": transaction })).into_response(),
        Err(err) => store_error(err),
    }
}

#[derive(Debug, Default, Deserialize)]
struct TransactionQuery {
    search: Option<String>,
    action: Option<String>,
    period: Option<String>,
}

impl TransactionQuery {
    fn into_filter(self) -> Result<TransactionFilter, StoreError> {
        let action = match self.action.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(raw) => Some(
                raw.parse::<TransactionAction>()
                    .map_err(|err| StoreError::validation("action", err.to_string()))?,
            ),
        };
        let period = match self.period {
            Some(raw) => raw
                .parse::<Period>()
                .map_err(|err| StoreError::validation("period", err.to_string()))?,
            None => Period::All,
        };
        Ok(TransactionFilter {
            search: self.search,
            action,
            period,
        })
    }
}

async fn list_transactions(
    State(state): State<AdminState>,
    headers: HeaderMap,
    Query(query): Query<TransactionQuery>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }

    let filter = match query.into_filter() {
        Ok(filter) => filter,
        Err(err) => return store_error(err),
    };
    let snapshot = state.store.snapshot();
    Json(views::transaction_overview(
        &snapshot,
        &filter,
        OffsetDateTime::now_utc(),
    ))
    .into_response()
}

async fn reload_snapshot(State(state): State<AdminState>, headers: HeaderMap) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }

    match state.store.refresh().await {
        Ok(()) => Json(json!({ "status": "ok" })).into_response(),
        Err(err) => store_error(err),
    }
}

fn store_error(err: StoreError) -> Response {
    let status = match &err {
        StoreError::Validation { .. } => StatusCode::BAD_REQUEST,
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::InvalidState(_) => StatusCode::CONFLICT,
        StoreError::Persistence(_) => {
            tracing::error!(error = %err, "persistence failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(json!({ "error": err.kind(), "message": err.to_string() })),
    )
        .into_response()
}

/// A request without a JSON body counts as an empty form.
fn lenient<T: Default>(payload: Result<Json<T>, JsonRejection>) -> Result<T, StoreError> {
    match payload {
        Ok(Json(payload)) => Ok(payload),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(T::default()),
        Err(rejection) => Err(StoreError::validation("body", rejection.body_text())),
    }
}

fn present(field: &'static str, value: Option<String>) -> Result<String, StoreError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| StoreError::validation(field, "is required"))
}

fn parse_field<T>(field: &'static str, value: Option<String>) -> Result<T, StoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    present(field, value)?
        .parse()
        .map_err(|err: T::Err| StoreError::validation(field, err.to_string()))
}

fn parse_id<T>(raw: &str) -> Result<T, StoreError>
where
    T: FromStr<Err = uuid::Error>,
{
    raw.parse()
        .map_err(|err: uuid::Error| StoreError::validation("id", err.to_string()))
}

fn operator(headers: &HeaderMap) -> String {
    header_value(headers, "x-operator")
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_OPERATOR.to_string())
}

fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

#[allow(clippy::result_large_err)]
fn require_admin(state: &AdminState, headers: &HeaderMap) -> Result<(), Response> {
    let Some(admin_key) = state.admin_key.as_deref() else {
        return Ok(());
    };
    if is_admin(headers, admin_key) {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "unauthorized").into_response())
    }
}

fn is_admin(headers: &HeaderMap, admin_key: &str) -> bool {
    if let Some(value) = header_value(headers, "x-admin-key") {
        return value == admin_key;
    }

    let Some(auth) = header_value(headers, "authorization") else {
        return false;
    };
    let auth = auth.trim();
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .is_some_and(|token| token.trim() == admin_key)
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}
