use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============ Domain Enums ============

/// Registration status of a company at the federal registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Situacao {
    Ativa,
    Baixada,
    Suspensa,
    Inapta,
}

/// Company size bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Porte {
    Mei,
    Me,
    Epp,
    Medio,
    Grande,
}

/// Benefit/service line a consultation is performed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Produto {
    Fleet,
    TicketRestaurant,
    Pay,
    Alimenta,
    Abastecimento,
    Outras,
}

impl Produto {
    /// Parses the wire representation (e.g. `TICKET_RESTAURANT`).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "FLEET" => Some(Self::Fleet),
            "TICKET_RESTAURANT" => Some(Self::TicketRestaurant),
            "PAY" => Some(Self::Pay),
            "ALIMENTA" => Some(Self::Alimenta),
            "ABASTECIMENTO" => Some(Self::Abastecimento),
            "OUTRAS" => Some(Self::Outras),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fleet => "FLEET",
            Self::TicketRestaurant => "TICKET_RESTAURANT",
            Self::Pay => "PAY",
            Self::Alimenta => "ALIMENTA",
            Self::Abastecimento => "ABASTECIMENTO",
            Self::Outras => "OUTRAS",
        }
    }
}

/// Lifecycle status of a consultation. Starts at `Pending` and transitions
/// exactly once to a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsultationStatus {
    Pending,
    Success,
    Error,
    NotFound,
}

impl ConsultationStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(Self::Pending),
            "SUCCESS" => Some(Self::Success),
            "ERROR" => Some(Self::Error),
            "NOT_FOUND" => Some(Self::NotFound),
            _ => None,
        }
    }
}

/// Where a successful consultation result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsultationSource {
    ReceitaFederal,
    Cache,
    ApiExterna,
}

/// Origin of the data stored on a company record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSource {
    ReceitaFederal,
    Manual,
    ApiExterna,
}

// ============ Database Models ============

/// A cached company registry record. Exactly one row exists per real-world
/// CNPJ (unique index); rows are updated in place on fresher lookups.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: Uuid,
    /// Canonical formatted CNPJ (`NN.NNN.NNN/NNNN-NN`), unique.
    pub cnpj: String,
    /// Legal name.
    pub razao_social: String,
    /// Trade name.
    pub nome_fantasia: Option<String>,
    pub situacao: Situacao,
    pub porte: Porte,
    pub capital_social: BigDecimal,
    pub data_abertura: Option<NaiveDate>,
    /// Primary CNAE activity code.
    pub cnae_principal: Option<String>,
    pub cnae_descricao: Option<String>,
    /// Secondary CNAE activities, stored as a JSON array of `{codigo, descricao}`.
    pub cnaes_secundarios: Option<serde_json::Value>,
    pub natureza_juridica: Option<String>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub data_source: DataSource,
    /// User who first consulted this company.
    pub added_by: Option<Uuid>,
    /// Timestamp used for the 24h freshness check.
    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Audit/history record of one lookup attempt. Created as `PENDING` before
/// any external call and updated exactly once with the terminal outcome.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consultation {
    pub id: Uuid,
    /// Canonical formatted CNPJ that was consulted.
    pub cnpj: String,
    pub produto: Produto,
    pub user_id: Uuid,
    /// Set on success, pointing at the resolved company.
    pub company_id: Option<Uuid>,
    pub status: ConsultationStatus,
    pub source: Option<ConsultationSource>,
    /// Snapshot of the resolved company data at consultation time.
    pub result: Option<serde_json::Value>,
    /// Error detail when the consultation failed.
    pub error: Option<serde_json::Value>,
    pub is_favorite: bool,
    /// Request context captured for auditing (user agent, IP).
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

// ============ Resolved Company Shape ============

/// A secondary activity code as returned by the registries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CnaeEntry {
    pub codigo: Option<String>,
    pub descricao: Option<String>,
}

/// Canonical company shape produced by the registry clients, before it is
/// persisted. Both external APIs map into this structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCompany {
    pub cnpj: String,
    pub razao_social: String,
    pub nome_fantasia: Option<String>,
    pub situacao: Situacao,
    pub porte: Porte,
    pub capital_social: BigDecimal,
    pub data_abertura: Option<NaiveDate>,
    pub cnae_principal: Option<String>,
    pub cnae_descricao: Option<String>,
    pub cnaes_secundarios: Vec<CnaeEntry>,
    pub natureza_juridica: Option<String>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub data_source: DataSource,
}

// ============ Persistence Inputs ============

/// Fields for a new PENDING consultation row.
#[derive(Debug, Clone)]
pub struct NewConsultation {
    pub cnpj: String,
    pub produto: Produto,
    pub user_id: Uuid,
    pub metadata: serde_json::Value,
}

/// Partial update applied to a consultation. `None` fields are left as-is.
#[derive(Debug, Clone, Default)]
pub struct ConsultationUpdate {
    pub status: Option<ConsultationStatus>,
    pub source: Option<ConsultationSource>,
    pub company_id: Option<Uuid>,
    pub result: Option<serde_json::Value>,
    pub error: Option<serde_json::Value>,
    pub is_favorite: Option<bool>,
}

impl ConsultationUpdate {
    /// Terminal SUCCESS update linking the consultation to its company.
    pub fn success(
        source: ConsultationSource,
        company_id: Uuid,
        result: serde_json::Value,
    ) -> Self {
        Self {
            status: Some(ConsultationStatus::Success),
            source: Some(source),
            company_id: Some(company_id),
            result: Some(result),
            ..Default::default()
        }
    }

    /// Terminal ERROR update carrying the causing message.
    pub fn error(detail: serde_json::Value) -> Self {
        Self {
            status: Some(ConsultationStatus::Error),
            error: Some(detail),
            ..Default::default()
        }
    }

    pub fn favorite(value: bool) -> Self {
        Self {
            is_favorite: Some(value),
            ..Default::default()
        }
    }
}

/// Filters and paging for consultation listings.
#[derive(Debug, Clone)]
pub struct ConsultationFilter {
    /// Restrict to a single user; `None` lists all users (admin view).
    pub user_id: Option<Uuid>,
    pub status: Option<ConsultationStatus>,
    pub favorite: Option<bool>,
    pub page: i64,
    pub limit: i64,
}

// ============ API Payloads ============

/// Request context captured on each consultation for auditing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetadata {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// Body of `POST /api/v1/consultations/cnpj`. `produto` stays raw so the
/// workflow can distinguish missing from invalid values.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsultCnpjRequest {
    pub cnpj: String,
    pub produto: Option<String>,
}

/// Query parameters for the consultation listing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ListConsultationsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub favorite: Option<bool>,
}

/// Paging envelope returned alongside listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

/// Per-user consultation counters.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationStats {
    pub total: i64,
    pub successful: i64,
    pub failed: i64,
    pub favorites: i64,
}
