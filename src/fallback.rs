//! Primary → secondary registry fallback.
//!
//! A consultation that misses the local cache goes through [`CnpjResolver`]:
//! ReceitaWS first, BrasilAPI only if the primary fails, and an aggregated
//! error preserving both failures verbatim when neither source answers.
//! There is no retry within a single client call and no circuit breaker.

use crate::cnpj;
use crate::config::Config;
use crate::models::{ConsultationSource, ResolvedCompany};
use crate::registry::{BrasilApiClient, ReceitaWsClient, RegistryError};
use std::fmt;
use std::future::Future;

/// A resolved company together with the registry that answered.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub company: ResolvedCompany,
    pub source: ConsultationSource,
}

/// Errors produced by the fallback orchestration.
#[derive(Debug, Clone)]
pub enum ResolveError {
    /// The CNPJ failed validation before any network call.
    InvalidCnpj,
    /// Both registries failed; each attempt is kept as `(service, error)`.
    AllSourcesFailed(Vec<(&'static str, RegistryError)>),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::InvalidCnpj => write!(f, "invalid CNPJ"),
            ResolveError::AllSourcesFailed(attempts) => {
                let detail = attempts
                    .iter()
                    .map(|(service, error)| format!("{}: {}", service, error))
                    .collect::<Vec<_>>()
                    .join("; ");
                write!(f, "all lookup sources failed: {}", detail)
            }
        }
    }
}

impl std::error::Error for ResolveError {}

/// Capability of resolving a clean CNPJ into company data. The workflow
/// controller is generic over this seam so tests can substitute fakes.
pub trait ResolveCompany {
    fn resolve(
        &self,
        clean_cnpj: &str,
    ) -> impl Future<Output = Result<Resolved, ResolveError>> + Send;
}

/// Production resolver holding both registry clients.
pub struct CnpjResolver {
    primary: ReceitaWsClient,
    secondary: BrasilApiClient,
}

impl CnpjResolver {
    pub fn new(config: &Config) -> Self {
        Self {
            primary: ReceitaWsClient::new(config),
            secondary: BrasilApiClient::new(config),
        }
    }
}

impl ResolveCompany for CnpjResolver {
    /// Tries ReceitaWS, then BrasilAPI; every consultation that reaches
    /// this point re-attempts both sources.
    async fn resolve(&self, clean_cnpj: &str) -> Result<Resolved, ResolveError> {
        if !cnpj::validate(clean_cnpj) {
            return Err(ResolveError::InvalidCnpj);
        }

        let primary_error = match self.primary.fetch(clean_cnpj).await {
            Ok(company) => {
                return Ok(Resolved {
                    company,
                    source: ConsultationSource::ReceitaFederal,
                })
            }
            Err(e) => {
                tracing::warn!("ReceitaWS lookup failed for {}: {}", clean_cnpj, e);
                e
            }
        };

        match self.secondary.fetch(clean_cnpj).await {
            Ok(company) => Ok(Resolved {
                company,
                source: ConsultationSource::ApiExterna,
            }),
            Err(secondary_error) => {
                tracing::error!(
                    "BrasilAPI lookup also failed for {}: {}",
                    clean_cnpj,
                    secondary_error
                );
                Err(ResolveError::AllSourcesFailed(vec![
                    ("ReceitaWS", primary_error),
                    ("BrasilAPI", secondary_error),
                ]))
            }
        }
    }
}
