use crate::cnpj;
use crate::config::Config;
use crate::consultation::{ConsultationInput, ConsultationService};
use crate::errors::AppError;
use crate::fallback::CnpjResolver;
use crate::models::{
    ConsultCnpjRequest, ConsultationFilter, ConsultationStatus, ConsultationUpdate,
    ListConsultationsQuery, RequestMetadata,
};
use crate::storage::{PgStore, Store};
use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use moka::future::Cache;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Application configuration.
    pub config: Config,
    /// In-flight consultation guard keyed by `cnpj:produto`, closing the
    /// race between the cooldown check and the audit insert for
    /// concurrent identical requests.
    pub inflight: Cache<String, i64>,
}

/// Authenticated caller identity.
///
/// JWT verification happens at the upstream gateway; the verified identity
/// arrives on trusted headers.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| {
                AppError::Unauthorized("missing or invalid x-user-id header".to_string())
            })?;

        let role = parts
            .headers
            .get("x-user-role")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("user")
            .to_string();

        Ok(AuthUser { id, role })
    }
}

/// Builds the in-flight guard key for a consultation request.
pub fn inflight_key(cnpj: &str, produto: Option<&str>) -> String {
    format!("{}:{}", cnpj::clean(cnpj), produto.unwrap_or(""))
}

/// Claims the in-flight slot for a key. Returns false when another
/// request already holds it; a successful claim must be paired with
/// [`release_inflight`] once the request finishes.
pub async fn claim_inflight(inflight: &Cache<String, i64>, key: &str) -> bool {
    let entry = inflight
        .entry(key.to_string())
        .or_insert(Utc::now().timestamp())
        .await;
    entry.is_fresh()
}

/// Releases a claimed in-flight slot.
pub async fn release_inflight(inflight: &Cache<String, i64>, key: &str) {
    inflight.invalidate(key).await;
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "cnpj-consulta-api",
            "version": "0.1.0"
        })),
    )
}

/// POST /api/v1/consultations/cnpj
///
/// Runs the full consultation workflow: validation, cooldown, audit
/// record, cache-or-resolve, persistence.
pub async fn consult_cnpj(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Json(body): Json<ConsultCnpjRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("POST /consultations/cnpj - user: {}", user.id);

    let metadata = RequestMetadata {
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        ip_address: headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string()),
    };

    // Guard against concurrent identical requests racing the cooldown
    // check. The slot is released once this request finishes; the TTL on
    // the cache is only a safety net.
    let guard_key = inflight_key(&body.cnpj, body.produto.as_deref());
    if !claim_inflight(&state.inflight, &guard_key).await {
        return Err(AppError::ConsultationInProgress);
    }

    let service = ConsultationService::new(
        PgStore::new(state.db.clone()),
        CnpjResolver::new(&state.config),
    );
    let input = ConsultationInput {
        cnpj: body.cnpj,
        produto: body.produto,
        metadata,
    };

    let result = service.consult(input, user.id, Utc::now()).await;
    release_inflight(&state.inflight, &guard_key).await;

    let outcome = result?;
    let message = if outcome.from_cache {
        "CNPJ consulted successfully (cache)"
    } else {
        "CNPJ consulted successfully"
    };

    Ok(Json(json!({
        "success": true,
        "message": message,
        "data": {
            "company": outcome.company,
            "consultation": outcome.consultation,
        }
    })))
}

/// GET /api/v1/consultations
///
/// Paginated listing with status/favorite filters. Admins see every
/// user's consultations; everyone else only their own.
pub async fn list_consultations(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ListConsultationsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let status = match query.status.as_deref() {
        Some(raw) => Some(ConsultationStatus::parse(raw).ok_or(AppError::BadRequest {
            code: "INVALID_STATUS",
            message: format!("Invalid status filter: {}", raw),
        })?),
        None => None,
    };

    let filter = ConsultationFilter {
        user_id: if user.is_admin() { None } else { Some(user.id) },
        status,
        favorite: query.favorite.filter(|f| *f),
        page: query.page.unwrap_or(1),
        limit: query.limit.unwrap_or(10),
    };

    let store = PgStore::new(state.db.clone());
    let (consultations, pagination) = store.list_consultations(&filter).await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "consultations": consultations,
            "pagination": pagination,
        }
    })))
}

/// GET /api/v1/consultations/stats
pub async fn consultation_stats(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = PgStore::new(state.db.clone());
    let stats = store.consultation_stats(user.id).await?;

    Ok(Json(json!({
        "success": true,
        "data": { "stats": stats }
    })))
}

/// DELETE /api/v1/consultations/:id
///
/// Only the owning user may delete. Deleting a SUCCESS consultation lifts
/// its cooldown, since cooldown only counts persisted SUCCESS records.
pub async fn delete_consultation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = PgStore::new(state.db.clone());

    let consultation = store.find_consultation_by_id(id).await?;
    match consultation {
        Some(c) if c.user_id == user.id => {
            store.delete_consultation(id).await?;
            Ok(Json(json!({
                "success": true,
                "message": "Consultation deleted successfully"
            })))
        }
        _ => Err(AppError::NotFound {
            code: "CONSULTATION_NOT_FOUND_OR_UNAUTHORIZED",
            message: "Consultation not found or not authorized".to_string(),
        }),
    }
}

/// PATCH /api/v1/consultations/:id/favorite
pub async fn toggle_favorite(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = PgStore::new(state.db.clone());

    let consultation = store
        .find_consultation_by_id(id)
        .await?
        .filter(|c| c.user_id == user.id)
        .ok_or(AppError::NotFound {
            code: "CONSULTATION_NOT_FOUND",
            message: "Consultation not found".to_string(),
        })?;

    let is_favorite = !consultation.is_favorite;
    let updated = store
        .update_consultation(id, ConsultationUpdate::favorite(is_favorite))
        .await?
        .ok_or(AppError::NotFound {
            code: "CONSULTATION_NOT_FOUND",
            message: "Consultation not found".to_string(),
        })?;

    let message = if is_favorite {
        "Added to favorites"
    } else {
        "Removed from favorites"
    };

    Ok(Json(json!({
        "success": true,
        "message": message,
        "data": { "consultation": updated }
    })))
}
