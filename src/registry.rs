//! External registry clients.
//!
//! Two interchangeable clients resolve a clean 14-digit CNPJ into the
//! canonical [`ResolvedCompany`] shape: ReceitaWS (primary) and BrasilAPI
//! (secondary). Each maps its vendor-specific JSON with the shared helpers
//! at the bottom of this module and tags the record with its data source.

use crate::cnpj;
use crate::config::Config;
use crate::models::{CnaeEntry, DataSource, Porte, ResolvedCompany, Situacao};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Per-request timeout for both registries.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = "cnpj-consulta-api/0.1.0";

/// Failure taxonomy shared by both registry clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// HTTP 429 from the registry.
    RateLimited,
    /// HTTP 404: the CNPJ is not known to this registry.
    NotFound,
    /// The 10s request timeout elapsed.
    Timeout,
    /// Any other failure, carrying the upstream message.
    Upstream(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::RateLimited => {
                write!(f, "query limit exceeded, try again later")
            }
            RegistryError::NotFound => write!(f, "CNPJ not found at the registry"),
            RegistryError::Timeout => write!(f, "registry request timed out"),
            RegistryError::Upstream(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Shared GET + status handling for both clients.
async fn fetch_json(client: &Client, url: &str) -> Result<Value, RegistryError> {
    let response = client
        .get(url)
        .header("User-Agent", USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                RegistryError::Timeout
            } else {
                RegistryError::Upstream(format!("request failed: {}", e))
            }
        })?;

    match response.status() {
        StatusCode::TOO_MANY_REQUESTS => return Err(RegistryError::RateLimited),
        StatusCode::NOT_FOUND => return Err(RegistryError::NotFound),
        status if !status.is_success() => {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::Upstream(format!(
                "registry returned status {}: {}",
                status, body
            )));
        }
        _ => {}
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| RegistryError::Upstream(format!("failed to parse registry response: {}", e)))
}

/// Primary client: ReceitaWS (`GET {base}/cnpj/{cnpj}`).
pub struct ReceitaWsClient {
    client: Client,
    base_url: String,
}

impl ReceitaWsClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.receitaws_base_url.clone(),
        }
    }

    /// Resolves a clean CNPJ, tagging the record `RECEITA_FEDERAL`.
    pub async fn fetch(&self, clean_cnpj: &str) -> Result<ResolvedCompany, RegistryError> {
        let url = format!("{}/cnpj/{}", self.base_url, clean_cnpj);
        tracing::info!("ReceitaWS: consulting CNPJ {}", clean_cnpj);

        let data = fetch_json(&self.client, &url).await?;

        // ReceitaWS reports business errors inside a 200 body
        if data.get("status").and_then(|v| v.as_str()) == Some("ERROR") {
            let message = data
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("CNPJ lookup error")
                .to_string();
            return Err(RegistryError::Upstream(message));
        }

        let cnpj = format_cnpj_field(&data)?;
        let razao_social = str_field(&data, "nome").unwrap_or_default();
        let nome_fantasia = str_field(&data, "fantasia")
            .filter(|s| !s.is_empty())
            .or_else(|| str_field(&data, "nome"));

        let (cnae_principal, cnae_descricao) = data
            .get("atividade_principal")
            .and_then(|v| v.as_array())
            .and_then(|a| a.first())
            .map(|entry| {
                (
                    str_field(entry, "code"),
                    str_field(entry, "text"),
                )
            })
            .unwrap_or((None, None));

        let cnaes_secundarios = data
            .get("atividades_secundarias")
            .and_then(|v| v.as_array())
            .map(|entries| {
                entries
                    .iter()
                    .map(|entry| CnaeEntry {
                        codigo: str_field(entry, "code"),
                        descricao: str_field(entry, "text"),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(ResolvedCompany {
            cnpj,
            razao_social,
            nome_fantasia,
            situacao: map_situacao(str_field(&data, "situacao").as_deref()),
            porte: map_porte(str_field(&data, "porte").as_deref()),
            capital_social: parse_capital_br(str_field(&data, "capital_social").as_deref()),
            data_abertura: str_field(&data, "abertura")
                .as_deref()
                .and_then(parse_date),
            cnae_principal,
            cnae_descricao,
            cnaes_secundarios,
            natureza_juridica: str_field(&data, "natureza_juridica"),
            street: str_field(&data, "logradouro"),
            number: str_field(&data, "numero"),
            complement: str_field(&data, "complemento"),
            neighborhood: str_field(&data, "bairro"),
            city: str_field(&data, "municipio"),
            state: str_field(&data, "uf"),
            zip_code: str_field(&data, "cep"),
            phone: str_field(&data, "telefone"),
            email: str_field(&data, "email"),
            data_source: DataSource::ReceitaFederal,
        })
    }
}

/// Secondary client: BrasilAPI (`GET {base}/api/cnpj/v1/{cnpj}`).
///
/// Same registry data as ReceitaWS but a different response shape; notably
/// it has no email field and returns `capital_social` as a plain number.
pub struct BrasilApiClient {
    client: Client,
    base_url: String,
}

impl BrasilApiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.brasilapi_base_url.clone(),
        }
    }

    /// Resolves a clean CNPJ, tagging the record `API_EXTERNA`.
    pub async fn fetch(&self, clean_cnpj: &str) -> Result<ResolvedCompany, RegistryError> {
        let url = format!("{}/api/cnpj/v1/{}", self.base_url, clean_cnpj);
        tracing::info!("BrasilAPI: consulting CNPJ {}", clean_cnpj);

        let data = fetch_json(&self.client, &url).await?;

        let cnpj = format_cnpj_field(&data)?;
        let razao_social = str_field(&data, "razao_social").unwrap_or_default();
        let nome_fantasia = str_field(&data, "nome_fantasia")
            .filter(|s| !s.is_empty())
            .or_else(|| str_field(&data, "razao_social"));

        let cnaes_secundarios = data
            .get("cnaes_secundarios")
            .and_then(|v| v.as_array())
            .map(|entries| {
                entries
                    .iter()
                    .map(|entry| CnaeEntry {
                        codigo: code_field(entry, "codigo"),
                        descricao: str_field(entry, "descricao"),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(ResolvedCompany {
            cnpj,
            razao_social,
            nome_fantasia,
            situacao: map_situacao(
                str_field(&data, "descricao_situacao_cadastral").as_deref(),
            ),
            porte: map_porte(str_field(&data, "porte").as_deref()),
            capital_social: capital_from_value(data.get("capital_social")),
            data_abertura: str_field(&data, "data_inicio_atividade")
                .as_deref()
                .and_then(parse_date),
            cnae_principal: code_field(&data, "cnae_fiscal"),
            cnae_descricao: str_field(&data, "cnae_fiscal_descricao"),
            cnaes_secundarios,
            natureza_juridica: str_field(&data, "natureza_juridica"),
            street: str_field(&data, "logradouro"),
            number: str_field(&data, "numero"),
            complement: str_field(&data, "complemento"),
            neighborhood: str_field(&data, "bairro"),
            city: str_field(&data, "municipio"),
            state: str_field(&data, "uf"),
            zip_code: str_field(&data, "cep"),
            phone: str_field(&data, "ddd_telefone_1"),
            // BrasilAPI does not return an email
            email: None,
            data_source: DataSource::ApiExterna,
        })
    }
}

// ============ Shared Mapping Helpers ============

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(|v| v.as_str()).map(String::from)
}

/// Reads a field that some registries return as a number and others as a
/// string (CNAE codes).
fn code_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Formats the registry's own `cnpj` field into the canonical mask.
fn format_cnpj_field(data: &Value) -> Result<String, RegistryError> {
    let raw = str_field(data, "cnpj")
        .ok_or_else(|| RegistryError::Upstream("registry response missing cnpj".to_string()))?;
    cnpj::format(&raw)
        .map_err(|e| RegistryError::Upstream(format!("registry returned malformed CNPJ: {}", e)))
}

/// Maps a registration-status string onto [`Situacao`].
///
/// Case-insensitive substring match; unrecognized values default to ATIVA.
pub fn map_situacao(situacao: Option<&str>) -> Situacao {
    let Some(situacao) = situacao else {
        return Situacao::Ativa;
    };
    let upper = situacao.to_uppercase();

    if upper.contains("BAIXADA") {
        Situacao::Baixada
    } else if upper.contains("SUSPENSA") {
        Situacao::Suspensa
    } else if upper.contains("INAPTA") {
        Situacao::Inapta
    } else {
        Situacao::Ativa
    }
}

/// Maps a company-size string onto [`Porte`]; unrecognized values default
/// to ME.
pub fn map_porte(porte: Option<&str>) -> Porte {
    let Some(porte) = porte else {
        return Porte::Me;
    };
    let upper = porte.to_uppercase();

    if upper.contains("MEI") {
        Porte::Mei
    } else if upper.contains("EPP") {
        Porte::Epp
    } else if upper.contains("MÉDIO") || upper.contains("MEDIO") {
        Porte::Medio
    } else if upper.contains("GRANDE") {
        Porte::Grande
    } else {
        // "PEQUENO", "ME" and everything unrecognized
        Porte::Me
    }
}

/// Parses a registry date: `DD/MM/YYYY` (ReceitaWS) or ISO-8601
/// (BrasilAPI). Returns `None` on anything unparseable, never errors.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .ok()
}

/// Parses a Brazilian-formatted monetary string (`1.000.000,00`) into a
/// decimal; defaults to zero.
pub fn parse_capital_br(value: Option<&str>) -> BigDecimal {
    value
        .map(|raw| {
            let normalized: String = raw
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == ',')
                .collect::<String>()
                .replace(',', ".");
            BigDecimal::from_str(&normalized).unwrap_or_default()
        })
        .unwrap_or_default()
}

/// Parses a JSON number or numeric string into a decimal; defaults to zero.
pub fn capital_from_value(value: Option<&Value>) -> BigDecimal {
    match value {
        Some(Value::Number(n)) => BigDecimal::from_str(&n.to_string()).unwrap_or_default(),
        Some(Value::String(s)) => BigDecimal::from_str(s).unwrap_or_default(),
        _ => BigDecimal::default(),
    }
}
