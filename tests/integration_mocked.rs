/// Integration tests with mocked upstream APIs
/// Exercises both JSON adapters without hitting real external services
mod common;

use common::{VALID_CNPJ, VALID_CPF};
use rust_consulta_api::errors::UpstreamError;
use rust_consulta_api::models::{IdKind, TaxpayerId};
use rust_consulta_api::services::{PersonApiService, RegistryApiService};
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn registry(server: &MockServer) -> RegistryApiService {
    RegistryApiService::with_base_url(format!("{}/v1/cnpj/", server.uri()), Duration::from_secs(2))
        .unwrap()
}

fn person(server: &MockServer, timeout: Duration) -> PersonApiService {
    PersonApiService::with_base_url(
        format!("{}/api/consulta", server.uri()),
        "test_key".to_string(),
        timeout,
    )
    .unwrap()
}

fn cnpj() -> TaxpayerId {
    TaxpayerId::parse(VALID_CNPJ, IdKind::Cnpj).unwrap()
}

fn cpf() -> TaxpayerId {
    TaxpayerId::parse(VALID_CPF, IdKind::Cpf).unwrap()
}

#[tokio::test]
async fn test_registry_successful_response() {
    let mock_server = MockServer::start().await;

    let body = serde_json::json!({
        "status": "OK",
        "cnpj": "11.222.333/0001-81",
        "nome": "EMPRESA TESTE LTDA",
        "atividade_principal": [{"code": "62.01-5-01", "text": "Desenvolvimento de software"}]
    });

    Mock::given(method("GET"))
        .and(path("/v1/cnpj/11222333000181"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .expect(1)
        .mount(&mock_server)
        .await;

    let data = registry(&mock_server).lookup_company(&cnpj()).await.unwrap();
    assert_eq!(data["nome"], "EMPRESA TESTE LTDA");
}

#[tokio::test]
async fn test_registry_error_status_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/cnpj/11222333000181"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "ERROR",
            "message": "CNPJ inválido"
        })))
        .mount(&mock_server)
        .await;

    let err = registry(&mock_server).lookup_company(&cnpj()).await.unwrap_err();
    assert_eq!(err, UpstreamError::not_found("CNPJ inválido"));
}

#[tokio::test]
async fn test_registry_error_status_carries_upstream_code() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/cnpj/11222333000181"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "ERROR",
            "message": "CNPJ rejeitado pela Receita Federal",
            "code": "rejected"
        })))
        .mount(&mock_server)
        .await;

    let err = registry(&mock_server).lookup_company(&cnpj()).await.unwrap_err();
    assert_eq!(
        err,
        UpstreamError::NotFound {
            message: "CNPJ rejeitado pela Receita Federal".to_string(),
            code: Some("rejected".to_string()),
        }
    );
}

#[tokio::test]
async fn test_registry_404_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let err = registry(&mock_server).lookup_company(&cnpj()).await.unwrap_err();
    assert!(matches!(err, UpstreamError::NotFound { .. }));
}

#[tokio::test]
async fn test_registry_server_error_is_upstream_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&mock_server)
        .await;

    let err = registry(&mock_server).lookup_company(&cnpj()).await.unwrap_err();
    assert!(matches!(err, UpstreamError::UpstreamFailure(_)));
}

#[tokio::test]
async fn test_registry_malformed_body_is_upstream_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&mock_server)
        .await;

    let err = registry(&mock_server).lookup_company(&cnpj()).await.unwrap_err();
    assert!(matches!(err, UpstreamError::UpstreamFailure(_)));
}

#[tokio::test]
async fn test_person_api_sends_key_and_cpf() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/consulta"))
        .and(query_param("cpf", "11144477735"))
        .and(header("X-API-KEY", "test_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"nome": "João da Silva", "genero": "M", "data_nascimento": "1990-01-01"}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let data = person(&mock_server, Duration::from_secs(2))
        .lookup_person(&cpf())
        .await
        .unwrap();
    assert_eq!(data["data"]["nome"], "João da Silva");
}

#[tokio::test]
async fn test_person_api_error_field_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/consulta"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "error": "CPF não encontrado na base"
        })))
        .mount(&mock_server)
        .await;

    let err = person(&mock_server, Duration::from_secs(2))
        .lookup_person(&cpf())
        .await
        .unwrap_err();
    assert_eq!(err, UpstreamError::not_found("CPF não encontrado na base"));
}

#[tokio::test]
async fn test_person_api_false_error_field_is_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "error": false,
            "nome": "Ana"
        })))
        .mount(&mock_server)
        .await;

    let data = person(&mock_server, Duration::from_secs(2))
        .lookup_person(&cpf())
        .await
        .unwrap();
    assert_eq!(data["nome"], "Ana");
}

#[tokio::test]
async fn test_person_api_empty_or_zero_error_field_is_success() {
    for error in [serde_json::json!(""), serde_json::json!(0), serde_json::json!(null)] {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": error.clone(),
                "nome": "Ana"
            })))
            .mount(&mock_server)
            .await;

        let data = person(&mock_server, Duration::from_secs(2))
            .lookup_person(&cpf())
            .await
            .unwrap();
        assert_eq!(data["nome"], "Ana", "error field {}", error);
    }
}

#[tokio::test]
async fn test_person_api_non_success_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    let err = person(&mock_server, Duration::from_secs(2))
        .lookup_person(&cpf())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        UpstreamError::UpstreamFailure("API externa retornou status: 401".to_string())
    );
}

#[tokio::test]
async fn test_person_api_slow_response_is_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"nome": "Lento"}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&mock_server)
        .await;

    let err = person(&mock_server, Duration::from_millis(100))
        .lookup_person(&cpf())
        .await
        .unwrap_err();
    assert!(matches!(err, UpstreamError::Timeout(_)));
}
