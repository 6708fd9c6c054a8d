use formulary::cli::describe::Edits;
use formulary::core::FormType;
use formulary::{AppCommand, DraftAction, RateAction};
use std::fs;
use tracing::info;

mod test_utils {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn mount_get(mock_server: &MockServer, url_path: &str, mock_response: &str) {
        Mock::given(method("GET"))
            .and(path(url_path))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(mock_server)
            .await;
    }

    pub async fn create_portal_mock_server() -> MockServer {
        let mock_server = MockServer::start().await;

        mount_get(
            &mock_server,
            "/api/equity/formulas/for-form/profit",
            r#"{
                "ok": true,
                "formulas": {
                    "company_value_l": {
                        "formula_key": "company_value_l",
                        "expression": "profit_l / (expected_profit_pct / 100)",
                        "version": 1
                    },
                    "investment_l": {
                        "formula_key": "investment_l",
                        "expression": "company_value_l * 0.1",
                        "version": 1
                    },
                    "investment_usd": {
                        "formula_key": "investment_usd",
                        "expression": "investment_l / exchange_rate",
                        "version": 4,
                        "effective_from": "2024-06-01T00:00:00"
                    }
                }
            }"#,
        )
        .await;
        mount_get(
            &mock_server,
            "/api/fx-rates/current",
            r#"{
                "success": true,
                "rate": {
                    "from_currency": "HNL",
                    "to_currency": "USD",
                    "rate": "25.2500",
                    "valid_from": "2024-01-01T00:00:00",
                    "valid_to": null
                }
            }"#,
        )
        .await;
        mount_get(
            &mock_server,
            "/api/equity/formulas",
            r#"{
                "ok": true,
                "formulas": [{
                    "formula_id": 3,
                    "formula_key": "investment_usd",
                    "field_label": "Investment (USD)",
                    "expression": "investment_l / exchange_rate",
                    "description": "Lempiras converted at the current rate",
                    "version": 4,
                    "effective_from": "2024-06-01T00:00:00"
                }]
            }"#,
        )
        .await;
        mount_get(
            &mock_server,
            "/api/equity/formulas/history/investment_usd",
            r#"{
                "ok": true,
                "history": [
                    {
                        "version": 4,
                        "expression": "investment_l / exchange_rate",
                        "effective_from": "2024-06-01T00:00:00",
                        "effective_to": null,
                        "changed_by": "ana@example.org"
                    },
                    {
                        "version": 3,
                        "expression": "investment_l / 24.5",
                        "effective_from": "2024-01-01T00:00:00",
                        "effective_to": "2024-06-01T00:00:00"
                    }
                ]
            }"#,
        )
        .await;
        mount_get(
            &mock_server,
            "/api/auth/check-session",
            r#"{"authenticated": true, "email": "Ana@Example.org"}"#,
        )
        .await;

        mock_server
    }

    pub fn write_config(
        base_url: &str,
        data_path: Option<&std::path::Path>,
    ) -> tempfile::NamedTempFile {
        let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        let mut content = format!(
            r#"
portal:
  base_url: "{base_url}"
  retries: 1
  retry_delay_ms: 1
"#
        );
        if let Some(path) = data_path {
            content.push_str(&format!("data_path: \"{}\"\n", path.display()));
        }
        std::fs::write(config_file.path(), content).expect("Failed to write config file");
        config_file
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[test_log::test(tokio::test)]
async fn test_eval_and_describe_run_offline() {
    let result = formulary::run_command(
        AppCommand::Eval {
            expression: "profit_l / (expected_profit_pct / 100)".to_string(),
            bindings: strings(&["profit_l=50000", "expected_profit_pct=15.5"]),
        },
        Some("/nonexistent/config.yaml"),
    )
    .await;
    assert!(result.is_ok(), "Eval failed with: {:?}", result.err());

    let result = formulary::run_command(
        AppCommand::Eval {
            expression: "investment_l / exchange_rate".to_string(),
            bindings: strings(&["investment_l=1000", "exchange_rate=0"]),
        },
        None,
    )
    .await;
    assert!(result.unwrap_err().to_string().contains("unevaluable"));

    let result = formulary::run_command(
        AppCommand::Describe {
            expression: "investment_l / 24".to_string(),
            edits: Edits {
                operators: strings(&["1=*"]),
                numbers: strings(&["2=0.04"]),
            },
            bindings: Some(strings(&["investment_l=2500"])),
        },
        None,
    )
    .await;
    assert!(result.is_ok(), "Describe failed with: {:?}", result.err());
}

#[test_log::test(tokio::test)]
async fn test_compute_flow_with_mock() {
    let mock_server = test_utils::create_portal_mock_server().await;
    let config_file = test_utils::write_config(&mock_server.uri(), None);
    let config_path = config_file.path().to_str().unwrap();

    let result = formulary::run_command(
        AppCommand::Compute {
            form: FormType::Profit,
            inputs: strings(&["profit_l=50000", "expected_profit_pct=15.5"]),
        },
        Some(config_path),
    )
    .await;
    assert!(result.is_ok(), "Compute failed with: {:?}", result.err());

    let requests = mock_server.received_requests().await.unwrap();
    let paths: Vec<&str> = requests.iter().map(|r| r.url.path()).collect();
    info!(?paths, "Portal requests");
    assert!(paths.contains(&"/api/equity/formulas/for-form/profit"));
    assert!(paths.contains(&"/api/fx-rates/current"));
}

#[test_log::test(tokio::test)]
async fn test_formulas_and_history_with_mock() {
    let mock_server = test_utils::create_portal_mock_server().await;
    let config_file = test_utils::write_config(&mock_server.uri(), None);
    let config_path = config_file.path().to_str().unwrap();

    for command in [
        AppCommand::Formulas { form: None },
        AppCommand::Formulas {
            form: Some(FormType::Profit),
        },
        AppCommand::History {
            formula_key: Some("investment_usd".to_string()),
        },
    ] {
        let result = formulary::run_command(command.clone(), Some(config_path)).await;
        assert!(result.is_ok(), "{command:?} failed with: {:?}", result.err());
    }

    // The change log endpoint is not mocked, so the 404 surfaces as an error.
    let result =
        formulary::run_command(AppCommand::History { formula_key: None }, Some(config_path)).await;
    assert!(result.unwrap_err().to_string().contains("404"));
}

#[test_log::test(tokio::test)]
async fn test_update_flow_with_mock() {
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, ResponseTemplate};

    let mock_server = test_utils::create_portal_mock_server().await;
    Mock::given(method("PUT"))
        .and(path("/api/equity/formulas/update/investment_usd"))
        .and(body_partial_json(serde_json::json!({
            "expression": "investment_l / 25.25",
            "reason": "Rate fixed for Q3"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"ok": true, "old_version": 4, "new_version": 5}"#),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    let config_file = test_utils::write_config(&mock_server.uri(), None);
    let config_path = config_file.path().to_str().unwrap();

    let result = formulary::run_command(
        AppCommand::Update {
            formula_key: "investment_usd".to_string(),
            expression: "  investment_l / 25.25 ".to_string(),
            description: String::new(),
            reason: "Rate fixed for Q3".to_string(),
        },
        Some(config_path),
    )
    .await;
    assert!(result.is_ok(), "Update failed with: {:?}", result.err());

    // Rejected locally, so the PUT expectation above stays at one call.
    let result = formulary::run_command(
        AppCommand::Update {
            formula_key: "investment_usd".to_string(),
            expression: "investment_l / __import__".to_string(),
            description: String::new(),
            reason: "Try something".to_string(),
        },
        Some(config_path),
    )
    .await;
    assert!(result.unwrap_err().to_string().contains("Invalid formula expression"));
}

#[test_log::test(tokio::test)]
async fn test_rates_flow_with_mock() {
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, ResponseTemplate};

    let mock_server = test_utils::create_portal_mock_server().await;
    test_utils::mount_get(
        &mock_server,
        "/api/fx-rates/all",
        r#"{
            "success": true,
            "rates": [{
                "from_currency": "HNL",
                "to_currency": "USD",
                "rate": "25.2500",
                "valid_from": "2024-01-01T00:00:00",
                "valid_to": null
            }]
        }"#,
    )
    .await;
    test_utils::mount_get(
        &mock_server,
        "/api/fx-rates/history",
        r#"{"success": true, "history": []}"#,
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/api/fx-rates/update"))
        .and(body_partial_json(serde_json::json!({
            "rate": 25.75,
            "effective_date": "2024-08-01T00:00:00",
            "reason": "Central bank reference"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{
                "success": true,
                "rate": {"from_currency": "HNL", "to_currency": "USD", "rate": "25.75",
                         "valid_from": "2024-08-01T00:00:00", "valid_to": null}
            }"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;
    let config_file = test_utils::write_config(&mock_server.uri(), None);
    let config_path = config_file.path().to_str().unwrap();

    let result =
        formulary::run_command(AppCommand::Rates(RateAction::List), Some(config_path)).await;
    assert!(result.is_ok(), "Rates list failed with: {:?}", result.err());

    let result = formulary::run_command(
        AppCommand::Rates(RateAction::Update {
            rate: 25.75,
            effective_date: "2024-08-01".to_string(),
            reason: "Central bank reference".to_string(),
        }),
        Some(config_path),
    )
    .await;
    assert!(result.is_ok(), "Rates update failed with: {:?}", result.err());

    // Rejected locally, so the POST expectation above stays at one call.
    let result = formulary::run_command(
        AppCommand::Rates(RateAction::Update {
            rate: 0.0,
            effective_date: "2024-08-01".to_string(),
            reason: "Typo".to_string(),
        }),
        Some(config_path),
    )
    .await;
    assert!(result.unwrap_err().to_string().contains("valid exchange rate"));
}

#[test_log::test(tokio::test)]
async fn test_draft_save_with_mock_session() {
    let mock_server = test_utils::create_portal_mock_server().await;
    let data_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config_file = test_utils::write_config(&mock_server.uri(), Some(data_dir.path()));
    let config_path = config_file.path().to_str().unwrap();

    let result = formulary::run_command(
        AppCommand::Draft(DraftAction::Save(
            FormType::Matching,
            strings(&["investment_l=75000", "is_matching=true"]),
        )),
        Some(config_path),
    )
    .await;
    assert!(result.is_ok(), "Draft save failed with: {:?}", result.err());
    assert!(data_dir.path().join("drafts").exists());
}

#[test_log::test(tokio::test)]
async fn test_draft_clear_without_session() {
    let mock_server = wiremock::MockServer::start().await;
    let data_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config_file = test_utils::write_config(&mock_server.uri(), Some(data_dir.path()));

    let result = formulary::run_command(
        AppCommand::Draft(DraftAction::Clear(FormType::Profit)),
        Some(config_file.path().to_str().unwrap()),
    )
    .await;
    assert!(result.is_ok(), "Draft clear failed with: {:?}", result.err());
}

#[test_log::test(tokio::test)]
async fn test_setup_writes_config_once() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config_path = dir.path().join("config.yaml");
    let config_path = config_path.to_str().unwrap();

    formulary::run_command(AppCommand::Setup, Some(config_path))
        .await
        .expect("Setup failed");
    assert!(fs::read_to_string(config_path).unwrap().contains("portal:"));

    let config = formulary::load_config(Some(config_path)).unwrap();
    assert_eq!(config.portal.retries, 3);

    let result = formulary::run_command(AppCommand::Setup, Some(config_path)).await;
    assert!(result.unwrap_err().to_string().contains("already exists"));
}
