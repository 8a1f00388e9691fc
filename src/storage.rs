//! Persistence layer for companies and consultations.
//!
//! The workflow controller talks to storage through the [`Store`] trait
//! (constructor-injected, so tests can run against in-memory fakes).
//! [`PgStore`] is the production implementation over Postgres.

use crate::errors::{AppError, ResultExt};
use crate::models::{
    Company, Consultation, ConsultationFilter, ConsultationStats, ConsultationUpdate,
    NewConsultation, Pagination, Produto, ResolvedCompany,
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::future::Future;
use uuid::Uuid;

/// Persistence capability consumed by the consultation workflow.
pub trait Store {
    fn find_company_by_cnpj(
        &self,
        cnpj: &str,
    ) -> impl Future<Output = Result<Option<Company>, AppError>> + Send;

    fn create_company(
        &self,
        data: &ResolvedCompany,
        added_by: Uuid,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Company, AppError>> + Send;

    fn update_company(
        &self,
        id: Uuid,
        data: &ResolvedCompany,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Company, AppError>> + Send;

    fn create_consultation(
        &self,
        new: NewConsultation,
    ) -> impl Future<Output = Result<Consultation, AppError>> + Send;

    fn update_consultation(
        &self,
        id: Uuid,
        update: ConsultationUpdate,
    ) -> impl Future<Output = Result<Option<Consultation>, AppError>> + Send;

    /// Most recent SUCCESS consultation for a CNPJ+produto pair created at
    /// or after `since`. Drives the cooldown rule.
    fn find_latest_successful_consultation(
        &self,
        cnpj: &str,
        produto: Produto,
        since: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<Consultation>, AppError>> + Send;

    fn find_consultation_by_id(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<Consultation>, AppError>> + Send;

    fn delete_consultation(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    fn list_consultations(
        &self,
        filter: &ConsultationFilter,
    ) -> impl Future<Output = Result<(Vec<Consultation>, Pagination), AppError>> + Send;

    fn consultation_stats(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = Result<ConsultationStats, AppError>> + Send;
}

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl Store for PgStore {
    async fn find_company_by_cnpj(&self, cnpj: &str) -> Result<Option<Company>, AppError> {
        let company =
            sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE cnpj = $1 LIMIT 1")
                .bind(cnpj)
                .fetch_optional(&self.pool)
                .await
                .context("looking up company by CNPJ")?;

        Ok(company)
    }

    async fn create_company(
        &self,
        data: &ResolvedCompany,
        added_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Company, AppError> {
        let cnaes = serde_json::to_value(&data.cnaes_secundarios)
            .map_err(|e| AppError::InternalError(format!("serializing CNAEs: {}", e)))?;

        let company = sqlx::query_as::<_, Company>(
            r#"
            INSERT INTO companies (
                id, cnpj, razao_social, nome_fantasia, situacao, porte,
                capital_social, data_abertura, cnae_principal, cnae_descricao,
                cnaes_secundarios, natureza_juridica, street, number, complement,
                neighborhood, city, state, zip_code, phone, email, data_source,
                added_by, last_updated, created_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $24
            )
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.cnpj)
        .bind(&data.razao_social)
        .bind(&data.nome_fantasia)
        .bind(data.situacao)
        .bind(data.porte)
        .bind(&data.capital_social)
        .bind(data.data_abertura)
        .bind(&data.cnae_principal)
        .bind(&data.cnae_descricao)
        .bind(cnaes)
        .bind(&data.natureza_juridica)
        .bind(&data.street)
        .bind(&data.number)
        .bind(&data.complement)
        .bind(&data.neighborhood)
        .bind(&data.city)
        .bind(&data.state)
        .bind(&data.zip_code)
        .bind(&data.phone)
        .bind(&data.email)
        .bind(data.data_source)
        .bind(added_by)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("creating company record")?;

        Ok(company)
    }

    async fn update_company(
        &self,
        id: Uuid,
        data: &ResolvedCompany,
        now: DateTime<Utc>,
    ) -> Result<Company, AppError> {
        let cnaes = serde_json::to_value(&data.cnaes_secundarios)
            .map_err(|e| AppError::InternalError(format!("serializing CNAEs: {}", e)))?;

        let company = sqlx::query_as::<_, Company>(
            r#"
            UPDATE companies SET
                razao_social = $2, nome_fantasia = $3, situacao = $4, porte = $5,
                capital_social = $6, data_abertura = $7, cnae_principal = $8,
                cnae_descricao = $9, cnaes_secundarios = $10,
                natureza_juridica = $11, street = $12, number = $13,
                complement = $14, neighborhood = $15, city = $16, state = $17,
                zip_code = $18, phone = $19, email = $20, data_source = $21,
                last_updated = $22, updated_at = $22
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.razao_social)
        .bind(&data.nome_fantasia)
        .bind(data.situacao)
        .bind(data.porte)
        .bind(&data.capital_social)
        .bind(data.data_abertura)
        .bind(&data.cnae_principal)
        .bind(&data.cnae_descricao)
        .bind(cnaes)
        .bind(&data.natureza_juridica)
        .bind(&data.street)
        .bind(&data.number)
        .bind(&data.complement)
        .bind(&data.neighborhood)
        .bind(&data.city)
        .bind(&data.state)
        .bind(&data.zip_code)
        .bind(&data.phone)
        .bind(&data.email)
        .bind(data.data_source)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("updating company record")?;

        Ok(company)
    }

    async fn create_consultation(&self, new: NewConsultation) -> Result<Consultation, AppError> {
        let consultation = sqlx::query_as::<_, Consultation>(
            r#"
            INSERT INTO consultations (id, cnpj, produto, user_id, status, is_favorite, metadata, created_at)
            VALUES ($1, $2, $3, $4, 'PENDING', FALSE, $5, NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.cnpj)
        .bind(new.produto)
        .bind(new.user_id)
        .bind(&new.metadata)
        .fetch_one(&self.pool)
        .await
        .context("creating consultation record")?;

        Ok(consultation)
    }

    async fn update_consultation(
        &self,
        id: Uuid,
        update: ConsultationUpdate,
    ) -> Result<Option<Consultation>, AppError> {
        let consultation = sqlx::query_as::<_, Consultation>(
            r#"
            UPDATE consultations SET
                status = COALESCE($2, status),
                source = COALESCE($3, source),
                company_id = COALESCE($4, company_id),
                result = COALESCE($5, result),
                error = COALESCE($6, error),
                is_favorite = COALESCE($7, is_favorite),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.status)
        .bind(update.source)
        .bind(update.company_id)
        .bind(update.result)
        .bind(update.error)
        .bind(update.is_favorite)
        .fetch_optional(&self.pool)
        .await
        .context("updating consultation record")?;

        Ok(consultation)
    }

    async fn find_latest_successful_consultation(
        &self,
        cnpj: &str,
        produto: Produto,
        since: DateTime<Utc>,
    ) -> Result<Option<Consultation>, AppError> {
        let consultation = sqlx::query_as::<_, Consultation>(
            r#"
            SELECT * FROM consultations
            WHERE cnpj = $1 AND produto = $2 AND status = 'SUCCESS' AND created_at >= $3
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(cnpj)
        .bind(produto)
        .bind(since)
        .fetch_optional(&self.pool)
        .await
        .context("querying cooldown window")?;

        Ok(consultation)
    }

    async fn find_consultation_by_id(&self, id: Uuid) -> Result<Option<Consultation>, AppError> {
        let consultation =
            sqlx::query_as::<_, Consultation>("SELECT * FROM consultations WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(consultation)
    }

    async fn delete_consultation(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM consultations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_consultations(
        &self,
        filter: &ConsultationFilter,
    ) -> Result<(Vec<Consultation>, Pagination), AppError> {
        let page = filter.page.max(1);
        let limit = filter.limit.clamp(1, 100);
        let offset = (page - 1) * limit;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM consultations
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::bool IS NULL OR is_favorite = $3)
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.status)
        .bind(filter.favorite)
        .fetch_one(&self.pool)
        .await
        .context("counting consultations")?;

        let consultations = sqlx::query_as::<_, Consultation>(
            r#"
            SELECT * FROM consultations
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::bool IS NULL OR is_favorite = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.status)
        .bind(filter.favorite)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("listing consultations")?;

        let total_pages = if total == 0 { 0 } else { (total + limit - 1) / limit };
        let pagination = Pagination {
            current_page: page,
            total_pages,
            total,
            has_next: page * limit < total,
            has_prev: page > 1,
        };

        Ok((consultations, pagination))
    }

    async fn consultation_stats(&self, user_id: Uuid) -> Result<ConsultationStats, AppError> {
        let stats = sqlx::query_as::<_, ConsultationStats>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'SUCCESS') AS successful,
                COUNT(*) FILTER (WHERE status = 'ERROR') AS failed,
                COUNT(*) FILTER (WHERE is_favorite) AS favorites
            FROM consultations
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .context("computing consultation stats")?;

        Ok(stats)
    }
}
