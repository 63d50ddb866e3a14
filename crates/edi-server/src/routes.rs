//! HTTP surface

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Method};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{delete, get, post};
use axum::{Extension, Json, Router};
use edi_adapter_db::{AcknowledgmentRecord, DocumentDetail, DocumentRecord};
use edi_pipeline::{Error, ProcessOutcome};
use edi_profile::PartnerProfile;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::decode::{self, ApiQuery, BodyFormat, PageQuery};
use crate::error::ApiResult;
use crate::middleware::{self, PartnerContext, X_REQUEST_ID};
use crate::state::AppState;

/// The full application with its middleware stack.
pub fn router(state: AppState) -> Router {
    let ingest = post(process).route_layer(from_fn_with_state(state.clone(), middleware::circuit_breaker));

    let api = Router::new()
        .route("/api/v1/process", ingest)
        .route("/api/v1/documents", get(list_documents))
        .route("/api/v1/documents/get", get(get_document))
        .route("/api/v1/documents/ack", post(acknowledge_document))
        .route("/api/v1/profiles", get(list_profiles))
        .route("/api/v1/profiles/import", post(import_profile))
        .route("/api/v1/profiles/get", get(get_profile))
        .route("/api/v1/profiles/export", get(export_profile))
        .route("/api/v1/profiles/delete", delete(delete_profile))
        .layer(
            ServiceBuilder::new()
                .layer(from_fn_with_state(state.clone(), middleware::enforce_timeout))
                .layer(from_fn_with_state(state.clone(), middleware::bulkhead))
                .layer(from_fn_with_state(state.clone(), middleware::rate_limit)),
        );

    Router::new()
        .route("/health", get(health))
        .merge(api)
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(middleware::request_id))
                .layer(from_fn(middleware::partner_context))
                .layer(from_fn(middleware::recover_panics))
                .layer(from_fn(middleware::access_log))
                .layer(cors())
                .layer(from_fn(middleware::security_headers)),
        )
        .with_state(state)
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers([X_REQUEST_ID])
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": &*state.service_name,
    }))
}

async fn process(
    State(state): State<AppState>,
    Extension(partner): Extension<PartnerContext>,
    headers: HeaderMap,
    body: Body,
) -> ApiResult<Json<ProcessOutcome>> {
    let partner_id = decode::partner_id(partner.partner_id())?;
    let format = decode::body_format(&headers)?;
    let bytes = decode::read_body(&headers, body).await?;
    let payload = decode::edi_payload(format, bytes)?;

    let processor = &state.processor;
    let (partner_id, payload) = (partner_id.as_str(), payload.as_slice());
    let outcome = state
        .write_retry
        .run(move || processor.process(partner_id, payload))
        .await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
struct ListDocumentsQuery {
    partner_id: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn list_documents(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListDocumentsQuery>,
) -> ApiResult<Json<Vec<DocumentRecord>>> {
    let page = PageQuery {
        limit: query.limit,
        offset: query.offset,
    }
    .page()?;
    let partner_id = match query.partner_id.as_deref().filter(|p| !p.is_empty()) {
        Some(partner_id) => Some(decode::partner_id(Some(partner_id))?),
        None => None,
    };

    let documents = &state.documents;
    let partner_id = partner_id.as_deref();
    let listed = state
        .read_retry
        .run(move || async move { documents.list(partner_id, page).await.map_err(Error::from) })
        .await?;
    Ok(Json(listed))
}

#[derive(Debug, Deserialize)]
struct DocumentIdQuery {
    id: Option<String>,
}

impl DocumentIdQuery {
    fn id(&self) -> Result<Uuid, Error> {
        let raw = self
            .id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::invalid_field("id", "id is required", "required"))?;
        Uuid::parse_str(raw).map_err(|_| Error::invalid_field("id", "id must be a UUID", "uuid"))
    }
}

async fn get_document(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<DocumentIdQuery>,
) -> ApiResult<Json<DocumentDetail>> {
    let id = query.id()?;
    let documents = &state.documents;
    let detail = state
        .read_retry
        .run(move || async move { documents.get_detail(id).await.map_err(Error::from) })
        .await?;
    Ok(Json(detail))
}

async fn acknowledge_document(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<DocumentIdQuery>,
) -> ApiResult<Json<AcknowledgmentRecord>> {
    let id = query.id()?;
    let acks = &state.acks;
    let ack = state.write_retry.run(move || acks.acknowledge(id)).await?;
    Ok(Json(ack))
}

#[derive(Debug, Serialize)]
struct ProfileMessage {
    partner_id: String,
    message: &'static str,
}

async fn import_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> ApiResult<Json<ProfileMessage>> {
    if decode::body_format(&headers)? != BodyFormat::Json {
        return Err(Error::invalid_field("Content-Type", "profiles must be imported as application/json", "content_type").into());
    }
    let bytes = decode::read_body(&headers, body).await?;

    let profiles = state.profiles.as_ref();
    let bytes = &bytes[..];
    let profile = state
        .write_retry
        .run(move || async move { profiles.import(bytes).await.map_err(Error::from) })
        .await?;
    Ok(Json(ProfileMessage {
        partner_id: profile.partner_id,
        message: "profile imported successfully",
    }))
}

#[derive(Debug, Deserialize)]
struct ListProfilesQuery {
    #[serde(default)]
    include_inactive: bool,
}

async fn list_profiles(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListProfilesQuery>,
) -> ApiResult<Json<Vec<PartnerProfile>>> {
    let profiles = state.profiles.as_ref();
    let active_only = !query.include_inactive;
    let listed = state
        .read_retry
        .run(move || async move { profiles.list(active_only).await.map_err(Error::from) })
        .await?;
    Ok(Json(listed))
}

#[derive(Debug, Deserialize)]
struct PartnerQuery {
    partner_id: Option<String>,
}

async fn load_profile(state: &AppState, query: &PartnerQuery) -> Result<PartnerProfile, Error> {
    let partner_id = decode::partner_id(query.partner_id.as_deref())?;
    let profiles = state.profiles.as_ref();
    let partner_id = partner_id.as_str();
    state
        .read_retry
        .run(move || async move { profiles.get(partner_id).await.map_err(Error::from) })
        .await
}

async fn get_profile(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PartnerQuery>,
) -> ApiResult<Json<PartnerProfile>> {
    Ok(Json(load_profile(&state, &query).await?))
}

async fn export_profile(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PartnerQuery>,
) -> ApiResult<Json<Value>> {
    let profile = load_profile(&state, &query).await?;
    Ok(Json(edi_profile::export(&profile).map_err(Error::from)?))
}

async fn delete_profile(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PartnerQuery>,
) -> ApiResult<Json<ProfileMessage>> {
    let partner_id = decode::partner_id(query.partner_id.as_deref())?;
    let profiles = state.profiles.as_ref();
    let id = partner_id.as_str();
    state
        .write_retry
        .run(move || async move { profiles.delete(id).await.map_err(Error::from) })
        .await?;
    Ok(Json(ProfileMessage {
        partner_id,
        message: "profile deleted",
    }))
}
