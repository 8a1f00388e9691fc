//! Integration tests with mocked external registries.
//! Exercises both clients and the fallback orchestration without hitting
//! the real ReceitaWS/BrasilAPI services.
use cnpj_consulta_api::config::Config;
use cnpj_consulta_api::fallback::{CnpjResolver, ResolveCompany, ResolveError};
use cnpj_consulta_api::models::{ConsultationSource, DataSource, Porte, Situacao};
use cnpj_consulta_api::registry::{BrasilApiClient, ReceitaWsClient, RegistryError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const VALID_CNPJ: &str = "11222333000181";

/// Helper function to create a test config pointing at mock servers
fn create_test_config(receitaws_url: String, brasilapi_url: String) -> Config {
    Config {
        database_url: "postgresql://test".to_string(),
        port: 8080,
        db_max_connections: 5,
        receitaws_base_url: receitaws_url,
        brasilapi_base_url: brasilapi_url,
    }
}

fn receitaws_body() -> serde_json::Value {
    serde_json::json!({
        "status": "OK",
        "cnpj": "11.222.333/0001-81",
        "nome": "EMPRESA DE TESTE LTDA",
        "fantasia": "TESTE",
        "situacao": "ATIVA",
        "abertura": "15/03/2010",
        "capital_social": "1.500.000,00",
        "atividade_principal": [
            {"code": "62.01-5-01", "text": "Desenvolvimento de programas de computador"}
        ],
        "atividades_secundarias": [
            {"code": "62.02-3-00", "text": "Desenvolvimento e licenciamento de programas"}
        ],
        "natureza_juridica": "206-2 - Sociedade Empresária Limitada",
        "logradouro": "RUA EXEMPLO",
        "numero": "100",
        "complemento": "SALA 1",
        "bairro": "CENTRO",
        "municipio": "SAO PAULO",
        "uf": "SP",
        "cep": "01.001-000",
        "telefone": "(11) 3000-0000",
        "email": "contato@teste.com.br",
        "porte": "DEMAIS"
    })
}

fn brasilapi_body() -> serde_json::Value {
    serde_json::json!({
        "cnpj": "11222333000181",
        "razao_social": "EMPRESA DE TESTE LTDA",
        "nome_fantasia": "TESTE",
        "descricao_situacao_cadastral": "Ativa",
        "data_inicio_atividade": "2010-03-15",
        "capital_social": 1500000,
        "cnae_fiscal": 6201501,
        "cnae_fiscal_descricao": "Desenvolvimento de programas de computador",
        "cnaes_secundarios": [
            {"codigo": 6202300, "descricao": "Desenvolvimento e licenciamento de programas"}
        ],
        "natureza_juridica": "Sociedade Empresária Limitada",
        "logradouro": "RUA EXEMPLO",
        "numero": "100",
        "complemento": "SALA 1",
        "bairro": "CENTRO",
        "municipio": "SAO PAULO",
        "uf": "SP",
        "cep": "01001000",
        "ddd_telefone_1": "1130000000",
        "porte": "EPP"
    })
}

#[tokio::test]
async fn receitaws_maps_response_into_canonical_company() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/cnpj/{}", VALID_CNPJ)))
        .respond_with(ResponseTemplate::new(200).set_body_json(receitaws_body()))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri(), "http://unused".to_string());
    let client = ReceitaWsClient::new(&config);

    let company = client.fetch(VALID_CNPJ).await.unwrap();

    assert_eq!(company.cnpj, "11.222.333/0001-81");
    assert_eq!(company.razao_social, "EMPRESA DE TESTE LTDA");
    assert_eq!(company.nome_fantasia.as_deref(), Some("TESTE"));
    assert_eq!(company.situacao, Situacao::Ativa);
    assert_eq!(company.porte, Porte::Me); // "DEMAIS" falls back to ME
    assert_eq!(
        company.data_abertura,
        chrono::NaiveDate::from_ymd_opt(2010, 3, 15)
    );
    assert_eq!(company.cnae_principal.as_deref(), Some("62.01-5-01"));
    assert_eq!(company.cnaes_secundarios.len(), 1);
    assert_eq!(company.email.as_deref(), Some("contato@teste.com.br"));
    assert_eq!(company.data_source, DataSource::ReceitaFederal);
    assert_eq!(
        company.capital_social,
        bigdecimal::BigDecimal::from(1_500_000)
    );
}

#[tokio::test]
async fn receitaws_maps_http_429_to_rate_limited() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/cnpj/{}", VALID_CNPJ)))
        .respond_with(ResponseTemplate::new(429))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri(), "http://unused".to_string());
    let client = ReceitaWsClient::new(&config);

    let err = client.fetch(VALID_CNPJ).await.unwrap_err();
    assert_eq!(err, RegistryError::RateLimited);
}

#[tokio::test]
async fn receitaws_maps_http_404_to_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/cnpj/{}", VALID_CNPJ)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri(), "http://unused".to_string());
    let client = ReceitaWsClient::new(&config);

    let err = client.fetch(VALID_CNPJ).await.unwrap_err();
    assert_eq!(err, RegistryError::NotFound);
}

#[tokio::test]
async fn receitaws_error_body_becomes_upstream_error() {
    let mock_server = MockServer::start().await;

    // ReceitaWS reports business errors inside a 200 body
    Mock::given(method("GET"))
        .and(path(format!("/cnpj/{}", VALID_CNPJ)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "ERROR",
            "message": "CNPJ inválido"
        })))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri(), "http://unused".to_string());
    let client = ReceitaWsClient::new(&config);

    let err = client.fetch(VALID_CNPJ).await.unwrap_err();
    assert_eq!(err, RegistryError::Upstream("CNPJ inválido".to_string()));
}

#[tokio::test]
async fn brasilapi_maps_response_into_canonical_company() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/api/cnpj/v1/{}", VALID_CNPJ)))
        .respond_with(ResponseTemplate::new(200).set_body_json(brasilapi_body()))
        .mount(&mock_server)
        .await;

    let config = create_test_config("http://unused".to_string(), mock_server.uri());
    let client = BrasilApiClient::new(&config);

    let company = client.fetch(VALID_CNPJ).await.unwrap();

    assert_eq!(company.cnpj, "11.222.333/0001-81");
    assert_eq!(company.situacao, Situacao::Ativa);
    assert_eq!(company.porte, Porte::Epp);
    // Numeric CNAE codes are normalized to strings
    assert_eq!(company.cnae_principal.as_deref(), Some("6201501"));
    assert_eq!(
        company.data_abertura,
        chrono::NaiveDate::from_ymd_opt(2010, 3, 15)
    );
    // BrasilAPI has no email field
    assert_eq!(company.email, None);
    assert_eq!(company.data_source, DataSource::ApiExterna);
    assert_eq!(
        company.capital_social,
        bigdecimal::BigDecimal::from(1_500_000)
    );
}

#[tokio::test]
async fn fallback_uses_primary_when_it_succeeds() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/cnpj/{}", VALID_CNPJ)))
        .respond_with(ResponseTemplate::new(200).set_body_json(receitaws_body()))
        .mount(&primary)
        .await;

    // The secondary must never be called
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(brasilapi_body()))
        .expect(0)
        .mount(&secondary)
        .await;

    let config = create_test_config(primary.uri(), secondary.uri());
    let resolver = CnpjResolver::new(&config);

    let resolved = resolver.resolve(VALID_CNPJ).await.unwrap();
    assert_eq!(resolved.source, ConsultationSource::ReceitaFederal);
    assert_eq!(resolved.company.data_source, DataSource::ReceitaFederal);
}

#[tokio::test]
async fn fallback_switches_to_secondary_on_primary_failure() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/cnpj/{}", VALID_CNPJ)))
        .respond_with(ResponseTemplate::new(429))
        .mount(&primary)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/api/cnpj/v1/{}", VALID_CNPJ)))
        .respond_with(ResponseTemplate::new(200).set_body_json(brasilapi_body()))
        .mount(&secondary)
        .await;

    let config = create_test_config(primary.uri(), secondary.uri());
    let resolver = CnpjResolver::new(&config);

    let resolved = resolver.resolve(VALID_CNPJ).await.unwrap();
    assert_eq!(resolved.source, ConsultationSource::ApiExterna);
    assert_eq!(resolved.company.data_source, DataSource::ApiExterna);
}

#[tokio::test]
async fn fallback_aggregates_both_errors_when_all_sources_fail() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/cnpj/{}", VALID_CNPJ)))
        .respond_with(ResponseTemplate::new(429))
        .mount(&primary)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/api/cnpj/v1/{}", VALID_CNPJ)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&secondary)
        .await;

    let config = create_test_config(primary.uri(), secondary.uri());
    let resolver = CnpjResolver::new(&config);

    let err = resolver.resolve(VALID_CNPJ).await.unwrap_err();
    let message = err.to_string();

    // Both service names and both underlying messages must be preserved
    assert!(message.contains("ReceitaWS"));
    assert!(message.contains("BrasilAPI"));
    assert!(message.contains("limit exceeded"));
    assert!(message.contains("not found"));

    match err {
        ResolveError::AllSourcesFailed(attempts) => {
            assert_eq!(attempts.len(), 2);
            assert_eq!(attempts[0], ("ReceitaWS", RegistryError::RateLimited));
            assert_eq!(attempts[1], ("BrasilAPI", RegistryError::NotFound));
        }
        other => panic!("expected AllSourcesFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn fallback_rejects_invalid_cnpj_without_network_calls() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&primary)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&secondary)
        .await;

    let config = create_test_config(primary.uri(), secondary.uri());
    let resolver = CnpjResolver::new(&config);

    let err = resolver.resolve("11111111111111").await.unwrap_err();
    assert!(matches!(err, ResolveError::InvalidCnpj));
}
