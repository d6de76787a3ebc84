//! Reads the real process environment, so it lives in its own test binary.

use glgot::Client;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_environment_is_read_on_every_call() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v4/user"))
        .and(header("private-token", "MYTOKEN"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"username": "first"})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v4/user"))
        .and(header("private-token", "MYOTHERTOKEN"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"username": "second"})))
        .mount(&server)
        .await;

    let client = Client::new().unwrap();

    // no slash, it is added
    std::env::set_var("GITLAB_ENDPOINT", format!("{}/api/v4", server.uri()));
    std::env::set_var("GITLAB_TOKEN", "MYTOKEN");
    let first = client.get("user", None).await.unwrap();

    std::env::set_var("GITLAB_TOKEN", "MYOTHERTOKEN");
    let second = client.get("user", None).await.unwrap();

    std::env::remove_var("GITLAB_TOKEN");
    std::env::remove_var("GITLAB_ENDPOINT");

    assert_eq!(first.json().unwrap()["username"], "first");
    assert_eq!(second.json().unwrap()["username"], "second");
}

#[cfg(unix)]
#[test]
fn test_non_utf8_variable_does_not_break_settings() {
    use glgot::{EnvSource, Settings};
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    std::env::set_var("GLGOT_BINARY_VALUE", OsStr::from_bytes(&[0x66, 0xff, 0x6f]));

    let settings = Settings::from_env(&EnvSource::Process);

    std::env::remove_var("GLGOT_BINARY_VALUE");

    assert!(settings.is_ok());
}
