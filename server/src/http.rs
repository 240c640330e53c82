use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{self, HeaderName, HeaderValue, Method},
    routing::{get, post},
};
use platform_api::{ApiError, ApiResult};
use platform_authz::{Action, Resource, ResourceKind, Role, get_user_permissions};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{CurrentUser, TokenKeys},
    membership::{MembershipLookup, OrganizationRef},
};

#[derive(Clone)]
pub struct AppState {
    pub keys: Arc<TokenKeys>,
    pub directory: Arc<dyn MembershipLookup>,
    pub cors_allowed_origins: Arc<[String]>,
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    addr: SocketAddr,
}

impl ServeConfig {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::from((host, port)),
        }
    }
}

pub async fn serve(config: ServeConfig, state: AppState) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!(%config.addr, "authz server listening");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    let allow_origin = if allowed.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed)
    };
    CorsLayer::new()
        .allow_headers([http::header::CONTENT_TYPE, http::header::AUTHORIZATION])
        .allow_methods([Method::POST, Method::GET])
        .allow_origin(allow_origin)
}

pub fn build_router(state: AppState) -> Router {
    let header_name = HeaderName::from_static("x-request-id");
    Router::new()
        .route("/health", get(health_handler))
        .route("/organizations/{slug}/membership", get(membership_handler))
        .route("/organizations/{slug}/permissions", get(permissions_handler))
        .route("/organizations/{slug}/authorize", post(authorize_handler))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name.clone(), MakeRequestUuid))
                .layer(PropagateRequestIdLayer::new(header_name))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.cors_allowed_origins)),
        )
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct MembershipResponse {
    membership: MembershipPayload,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MembershipPayload {
    organization_id: Uuid,
    role: Role,
}

#[instrument(name = "http.membership", skip_all, fields(%slug, user = %user.id))]
async fn membership_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(slug): Path<String>,
) -> ApiResult<Json<MembershipResponse>> {
    let membership = state.directory.membership(&slug, user.id).await?;
    Ok(Json(MembershipResponse {
        membership: MembershipPayload {
            organization_id: membership.organization.id,
            role: membership.role,
        },
    }))
}

#[derive(Serialize)]
struct PermissionsResponse {
    role: Role,
    permissions: Vec<GrantPayload>,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
struct GrantPayload {
    action: Action,
    subject: ResourceKind,
}

#[instrument(name = "http.permissions", skip_all, fields(%slug, user = %user.id))]
async fn permissions_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(slug): Path<String>,
) -> ApiResult<Json<PermissionsResponse>> {
    let membership = state.directory.membership(&slug, user.id).await?;
    let permissions = get_user_permissions(user.id, membership.role)
        .granted()?
        .into_iter()
        .map(|(action, subject)| GrantPayload { action, subject })
        .collect();
    Ok(Json(PermissionsResponse {
        role: membership.role,
        permissions,
    }))
}

#[derive(Deserialize)]
struct AuthorizeRequest {
    action: String,
    resource: Value,
}

#[derive(Serialize)]
struct AuthorizeResponse {
    allowed: bool,
    role: Role,
}

#[instrument(name = "http.authorize", skip_all, fields(%slug, user = %user.id))]
async fn authorize_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(slug): Path<String>,
    Json(request): Json<AuthorizeRequest>,
) -> ApiResult<Json<AuthorizeResponse>> {
    let membership = state.directory.membership(&slug, user.id).await?;
    let action = request.action.parse::<Action>()?;
    let resource = scope_to_organization(
        Resource::from_json(&request.resource)?,
        &membership.organization,
    )?;
    let allowed = get_user_permissions(user.id, membership.role).can(action, resource)?;
    Ok(Json(AuthorizeResponse {
        allowed,
        role: membership.role,
    }))
}

/// Organization questions are answered against the directory's record, so the
/// owner always comes from storage rather than from the request body.
fn scope_to_organization(
    resource: Resource,
    organization: &OrganizationRef,
) -> ApiResult<Resource> {
    match resource {
        Resource::Instance(instance) if instance.kind() == ResourceKind::Organization => {
            if instance.id() != organization.id {
                return Err(ApiError::InvalidInput(format!(
                    "organization {} is not `{}`",
                    instance.id(),
                    organization.slug
                )));
            }
            Ok(organization.as_resource().into())
        }
        Resource::Type(ResourceKind::Organization) => Ok(organization.as_resource().into()),
        other => Ok(other),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    };
}
