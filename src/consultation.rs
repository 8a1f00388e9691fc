//! CNPJ consultation workflow.
//!
//! Orchestrates one lookup end to end: validate input, enforce the
//! 3-month cooldown, create the PENDING audit record, serve from the
//! 24h company cache or resolve through the registry fallback, persist
//! the company, and drive the consultation to its terminal state.
//!
//! The one hard invariant: once the audit record exists, every failure
//! path updates it to ERROR before the error response is returned. A
//! consultation is never left PENDING by a completed request.

use crate::cnpj;
use crate::cooldown::{check_cooldown, is_company_fresh, CooldownVerdict};
use crate::errors::AppError;
use crate::fallback::ResolveCompany;
use crate::models::{
    Company, Consultation, ConsultationSource, ConsultationUpdate, NewConsultation, Produto,
    RequestMetadata,
};
use crate::storage::Store;
use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

/// Input to one consultation attempt.
#[derive(Debug, Clone)]
pub struct ConsultationInput {
    pub cnpj: String,
    /// Raw product value; validated here so missing and invalid values get
    /// distinct error codes.
    pub produto: Option<String>,
    pub metadata: RequestMetadata,
}

/// Result of a successful consultation.
#[derive(Debug, Clone)]
pub struct ConsultationOutcome {
    pub company: Company,
    pub consultation: Consultation,
    /// True when the company was served from the local 24h cache.
    pub from_cache: bool,
}

/// The consultation workflow controller, generic over its persistence and
/// resolution seams.
pub struct ConsultationService<S, R> {
    store: S,
    resolver: R,
}

impl<S: Store, R: ResolveCompany> ConsultationService<S, R> {
    pub fn new(store: S, resolver: R) -> Self {
        Self { store, resolver }
    }

    /// Runs the full consultation workflow for one request.
    pub async fn consult(
        &self,
        input: ConsultationInput,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ConsultationOutcome, AppError> {
        // 1. Product validation
        let produto_raw = input.produto.as_deref().ok_or(AppError::BadRequest {
            code: "PRODUCT_REQUIRED",
            message: "Product is required".to_string(),
        })?;
        let produto = Produto::parse(produto_raw).ok_or(AppError::BadRequest {
            code: "INVALID_PRODUCT",
            message: format!("Invalid product: {}", produto_raw),
        })?;

        // 2. CNPJ validation
        let digits = cnpj::clean(&input.cnpj);
        if !cnpj::validate(&digits) {
            return Err(AppError::BadRequest {
                code: "INVALID_CNPJ",
                message: "Invalid CNPJ".to_string(),
            });
        }
        let formatted = cnpj::format(&digits).map_err(|e| AppError::BadRequest {
            code: "INVALID_CNPJ",
            message: e.to_string(),
        })?;

        // 3. Cooldown: one successful consultation per CNPJ+produto per
        //    3 months. Blocked requests leave no audit record.
        if let CooldownVerdict::Blocked {
            last_consultation_at,
            next_allowed_at,
        } = check_cooldown(&self.store, &formatted, produto, now).await?
        {
            tracing::info!(
                "Cooldown active for {} / {}: next allowed at {}",
                formatted,
                produto.as_str(),
                next_allowed_at
            );
            return Err(AppError::RecentlyConsulted {
                last_consultation_at,
                next_allowed_at,
            });
        }

        // 4. Audit record, created before any external call so failures
        //    stay traceable.
        let metadata = serde_json::to_value(&input.metadata)
            .map_err(|e| AppError::InternalError(format!("serializing metadata: {}", e)))?;
        let consultation = self
            .store
            .create_consultation(NewConsultation {
                cnpj: formatted.clone(),
                produto,
                user_id,
                metadata,
            })
            .await?;

        tracing::info!(
            "Consultation {} created for {} / {}",
            consultation.id,
            formatted,
            produto.as_str()
        );

        // 5-6. Resolve and persist; any failure past this point must still
        //      drive the audit record to ERROR.
        match self
            .resolve_and_persist(&consultation, &formatted, &digits, user_id, now)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let message = match &e {
                    AppError::ConsultationFailed(msg) => msg.clone(),
                    other => other.to_string(),
                };
                if let Err(update_err) = self
                    .store
                    .update_consultation(
                        consultation.id,
                        ConsultationUpdate::error(json!({ "message": message })),
                    )
                    .await
                {
                    tracing::error!(
                        "Failed to mark consultation {} as ERROR: {}",
                        consultation.id,
                        update_err
                    );
                }
                Err(e)
            }
        }
    }

    /// Cache check, registry resolution and persistence. Split out so the
    /// caller can convert any failure into the terminal ERROR update.
    async fn resolve_and_persist(
        &self,
        consultation: &Consultation,
        formatted: &str,
        digits: &str,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ConsultationOutcome, AppError> {
        let existing = self.store.find_company_by_cnpj(formatted).await?;

        // Cache hit: company refreshed within the last 24h
        if let Some(company) = &existing {
            if is_company_fresh(company, now) {
                tracing::info!("Cache hit for {} ({})", formatted, company.id);

                let snapshot = serde_json::to_value(company)
                    .map_err(|e| AppError::InternalError(format!("serializing company: {}", e)))?;
                let updated = self
                    .store
                    .update_consultation(
                        consultation.id,
                        ConsultationUpdate::success(
                            ConsultationSource::Cache,
                            company.id,
                            snapshot,
                        ),
                    )
                    .await?
                    .ok_or_else(|| {
                        AppError::InternalError("consultation disappeared mid-update".to_string())
                    })?;

                return Ok(ConsultationOutcome {
                    company: company.clone(),
                    consultation: updated,
                    from_cache: true,
                });
            }
        }

        // Cache miss or stale: go through the registry fallback chain
        let resolved = self
            .resolver
            .resolve(digits)
            .await
            .map_err(|e| AppError::ConsultationFailed(e.to_string()))?;

        let snapshot = serde_json::to_value(&resolved.company)
            .map_err(|e| AppError::InternalError(format!("serializing result: {}", e)))?;

        // Upsert: one company row per CNPJ, updated in place
        let company = match existing {
            Some(company) => {
                self.store
                    .update_company(company.id, &resolved.company, now)
                    .await?
            }
            None => {
                self.store
                    .create_company(&resolved.company, user_id, now)
                    .await?
            }
        };

        let updated = self
            .store
            .update_consultation(
                consultation.id,
                ConsultationUpdate::success(resolved.source, company.id, snapshot),
            )
            .await?
            .ok_or_else(|| {
                AppError::InternalError("consultation disappeared mid-update".to_string())
            })?;

        tracing::info!(
            "Consultation {} resolved via {:?}",
            consultation.id,
            resolved.source
        );

        Ok(ConsultationOutcome {
            company,
            consultation: updated,
            from_cache: false,
        })
    }
}
