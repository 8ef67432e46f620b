//! Routes the handful of read-only endpoints (§4.8) onto the core pipeline:
//! directory resolve → profile fetch → parse → compile → execute → encode.

use crate::config::GatewayConfig;
use crate::domain::{Profile, ResourceId, ResourceRef};
use crate::downstream::client::DownstreamClient;
use crate::downstream::profile_store::ProfileStore;
use crate::downstream::resource_directory::ResourceDirectory;
use crate::encoders::csv::build_csv_body;
use crate::encoders::flat_json::build_flat_json_body;
use crate::encoders::json::build_json_page;
use crate::error::{GatewayError, GatewayResult};
use crate::executor::execute;
use crate::observability::with_trace_id;
use crate::query::compiler::require_aggregation_allowed;
use crate::query::parser::parse_plan;
use crate::query::plan::QueryPlan;
use crate::swagger::build_swagger_document;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub client: Arc<DownstreamClient>,
    pub directory: Arc<dyn ResourceDirectory>,
    pub profiles: Arc<dyn ProfileStore>,
    pub config: Arc<GatewayConfig>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/resources/:id/", get(resource_metadata))
        .route("/api/resources/:id/profile/", get(resource_profile))
        .route("/api/resources/:id/data/", get(resource_data))
        .route("/api/resources/:id/data/csv/", get(resource_data_csv))
        .route("/api/resources/:id/data/json/", get(resource_data_json))
        .route("/api/resources/:id/swagger/", get(resource_swagger))
        .route("/api/aggregation-exceptions/", get(aggregation_exceptions))
        .route("/api/metrics/:id/", get(resource_metrics))
        .route("/api/assistant/query/", get(assistant_query))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// Bind `0.0.0.0:{config.port}` and serve until the process is signalled to
/// stop. Matches the teacher's bind-failure diagnostics.
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let port = state.config.port;
    let router = build_router(state);

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind port {port}: {e}");
            if e.kind() == std::io::ErrorKind::AddrInUse {
                error!("port {port} is already in use; try a different PORT");
            }
            return Err(e).map_err(Into::into);
        }
    };

    info!("tabular-gateway listening on port {port}");
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

async fn resolve_and_profile(
    state: &AppState,
    resource_id: ResourceId,
) -> GatewayResult<(ResourceRef, Profile)> {
    let resource = state.directory.resolve(resource_id).await?;
    let profile = state.profiles.profile(&resource).await?;
    Ok((resource, profile))
}

fn parse_query(raw: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(raw.as_bytes())
        .into_owned()
        .collect()
}

fn build_plan(
    state: &AppState,
    profile: &Profile,
    raw_query: &str,
) -> GatewayResult<(QueryPlan, Vec<(String, String)>)> {
    let pairs = parse_query(raw_query);
    let plan = parse_plan(&pairs, profile, state.config.page_size_default, state.config.page_size_max)?;
    Ok((plan, pairs))
}

async fn health_check(State(state): State<AppState>) -> Response {
    let downstream_ok = state.client.select("resources", &[]).await.is_ok();
    let status = if downstream_ok {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(json!({ "status": if downstream_ok { "ok" } else { "degraded" } }))).into_response()
}

async fn resource_metadata(
    State(state): State<AppState>,
    Path(id): Path<ResourceId>,
) -> Result<Json<serde_json::Value>, GatewayError> {
    with_trace_id("resource_metadata", async {
        let resource = state.directory.resolve(id).await?;
        let base = state.config.public_base_url();
        Ok(Json(json!({
            "resource_id": resource.resource_id,
            "status": resource.status,
            "dataset_id": resource.dataset_id,
            "aggregation_allowed": resource.aggregation_allowed,
            "url": resource.url,
            "created_at": resource.created_at,
            "links": {
                "self": format!("{base}/api/resources/{id}/"),
                "profile": format!("{base}/api/resources/{id}/profile/"),
                "data": format!("{base}/api/resources/{id}/data/"),
                "data_csv": format!("{base}/api/resources/{id}/data/csv/"),
                "data_json": format!("{base}/api/resources/{id}/data/json/"),
                "swagger": format!("{base}/api/resources/{id}/swagger/"),
            },
        })))
    })
    .await
}

async fn resource_profile(
    State(state): State<AppState>,
    Path(id): Path<ResourceId>,
) -> Result<Json<Profile>, GatewayError> {
    with_trace_id("resource_profile", async {
        let resource = state.directory.resolve(id).await?;
        let profile = state.profiles.profile(&resource).await?;
        Ok(Json(profile))
    })
    .await
}

async fn resource_data(
    State(state): State<AppState>,
    Path(id): Path<ResourceId>,
    raw_query: axum::extract::RawQuery,
) -> Result<Json<serde_json::Value>, GatewayError> {
    with_trace_id("resource_data", async {
        let (resource, profile) = resolve_and_profile(&state, id).await?;
        let (plan, pairs) = build_plan(&state, &profile, raw_query.0.as_deref().unwrap_or_default())?;
        require_aggregation_allowed(&plan, &resource)?;

        let executed = execute(&state.client, &plan, &resource).await?;
        let base = state.config.public_base_url();
        let page = build_json_page(
            &base,
            id,
            &format!("/api/resources/{id}/data/"),
            &pairs,
            plan.page,
            plan.page_size,
            executed.total,
            executed.rows,
        );
        Ok(Json(serde_json::to_value(page).map_err(|e| GatewayError::Internal(e.to_string()))?))
    })
    .await
}

async fn resource_data_csv(
    State(state): State<AppState>,
    Path(id): Path<ResourceId>,
    raw_query: axum::extract::RawQuery,
) -> Result<Response, GatewayError> {
    let (resource, profile) = resolve_and_profile(&state, id).await?;
    let (plan, _pairs) = build_plan(&state, &profile, raw_query.0.as_deref().unwrap_or_default())?;
    require_aggregation_allowed(&plan, &resource)?;

    let client = (*state.client).clone();
    let body = build_csv_body(client, plan, resource);
    Ok((
        [(axum::http::header::CONTENT_TYPE, "text/csv")],
        body,
    )
        .into_response())
}

async fn resource_data_json(
    State(state): State<AppState>,
    Path(id): Path<ResourceId>,
    raw_query: axum::extract::RawQuery,
) -> Result<Response, GatewayError> {
    let (resource, profile) = resolve_and_profile(&state, id).await?;
    let (plan, _pairs) = build_plan(&state, &profile, raw_query.0.as_deref().unwrap_or_default())?;
    require_aggregation_allowed(&plan, &resource)?;

    let client = (*state.client).clone();
    let body = build_flat_json_body(client, plan, resource);
    Ok((
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response())
}

async fn resource_swagger(
    State(state): State<AppState>,
    Path(id): Path<ResourceId>,
) -> Result<Json<serde_json::Value>, GatewayError> {
    with_trace_id("resource_swagger", async {
        let resource = state.directory.resolve(id).await?;
        let profile = state.profiles.profile(&resource).await?;
        let base = state.config.public_base_url();
        Ok(Json(build_swagger_document(id, &profile, &base)))
    })
    .await
}

/// List of resources with aggregation enabled. No dedicated directory read
/// model exists for this in the downstream contract beyond the per-resource
/// exception lookup, so this endpoint is intentionally narrow: it reports
/// only the `ALLOW_AGGREGATION` config overlay, which is the gateway's own
/// source of truth for resources it grants aggregation outside the
/// downstream `exceptions` table.
async fn aggregation_exceptions(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "resource_ids": state.config.allow_aggregation }))
}

async fn resource_metrics(
    State(state): State<AppState>,
    Path(id): Path<ResourceId>,
    raw_query: axum::extract::RawQuery,
) -> Result<Json<serde_json::Value>, GatewayError> {
    with_trace_id("resource_metrics", async {
        let (resource, profile) = resolve_and_profile(&state, id).await?;
        let (plan, pairs) = build_plan(&state, &profile, raw_query.0.as_deref().unwrap_or_default())?;
        if !plan.is_aggregated() {
            return Err(GatewayError::InvalidParameter {
                column: "(none)".to_string(),
                suffix: "groupby/count/sum/avg/min/max".to_string(),
            });
        }
        require_aggregation_allowed(&plan, &resource)?;

        let executed = execute(&state.client, &plan, &resource).await?;
        let base = state.config.public_base_url();
        let page = build_json_page(
            &base,
            id,
            &format!("/api/metrics/{id}/"),
            &pairs,
            plan.page,
            plan.page_size,
            executed.total,
            executed.rows,
        );
        Ok(Json(serde_json::to_value(page).map_err(|e| GatewayError::Internal(e.to_string()))?))
    })
    .await
}

#[derive(serde::Deserialize)]
struct AssistantQuery {
    #[allow(dead_code)]
    q: Option<String>,
}

async fn assistant_query(Query(_params): Query<AssistantQuery>) -> Response {
    (
        axum::http::StatusCode::NOT_IMPLEMENTED,
        Json(json!({
            "errors": [{
                "code": "not_implemented",
                "message": "natural-language query translation is not implemented by this gateway",
            }]
        })),
    )
        .into_response()
}
