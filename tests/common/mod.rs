#![allow(dead_code)]

use serde_json::json;
use wattson::auth::TokenSet;
use wattson::config::Config;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TENANT: &str = "tenant.onmicrosoft.com";
pub const POLICY: &str = "b2c_1_signin";
pub const TRANSACTION: &str = "eyJUSUQiOiJ0eC0xIn0";
pub const CSRF: &str = "csrf-123";
pub const CODE: &str = "auth-code-1";
pub const USERNAME: &str = "user@example.com";
pub const PASSWORD: &str = "hunter2";

pub fn b2c_path(suffix: &str) -> String {
    format!("/{TENANT}/{POLICY}/{suffix}")
}

pub fn config_for(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.account.username = USERNAME.to_string();
    config.account.password = PASSWORD.to_string();
    config.endpoints.auth_base = server.uri();
    config.endpoints.tenant = TENANT.to_string();
    config.endpoints.policy = POLICY.to_string();
    config.endpoints.api_base = server.uri();
    config.http.timeout_secs = 5;
    config
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn valid_tokens(access_token: &str) -> TokenSet {
    TokenSet::from_response(
        json!({
            "access_token": access_token,
            "refresh_token": "rt-valid",
            "expires_on": now() + 3600,
        }),
        now(),
    )
    .unwrap()
}

pub fn expired_tokens(access_token: &str, refresh_token: Option<&str>) -> TokenSet {
    let mut body = json!({
        "access_token": access_token,
        "expires_on": now() - 10,
    });
    if let Some(rt) = refresh_token {
        body["refresh_token"] = json!(rt);
    }
    TokenSet::from_response(body, now()).unwrap()
}

/// Authorize page that sets the CSRF cookie and embeds the transaction id
pub async fn mount_authorize(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(b2c_path("oauth2/v2.0/authorize")))
        .and(query_param("code_challenge_method", "S256"))
        .and(query_param("response_type", "code"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", format!("x-ms-cpim-csrf={CSRF}; Path=/").as_str())
                .set_body_string(format!(
                    r#"<html><script>var SETTINGS = {{"csrf":"{CSRF}","transId":"StateProperties={TRANSACTION}"}};</script></html>"#
                )),
        )
        .mount(server)
        .await;
}

pub async fn mount_self_asserted(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(b2c_path("SelfAsserted")))
        .and(query_param("tx", format!("StateProperties={TRANSACTION}").as_str()))
        .and(query_param("p", POLICY))
        .and(header("X-CSRF-TOKEN", CSRF))
        .and(body_string_contains("signInName=user%40example.com"))
        .respond_with(response)
        .mount(server)
        .await;
}

pub async fn mount_confirmed(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(b2c_path("api/CombinedSigninAndSignup/confirmed")))
        .and(query_param("csrf_token", CSRF))
        .and(query_param("tx", format!("StateProperties={TRANSACTION}").as_str()))
        .respond_with(response)
        .mount(server)
        .await;
}

pub fn code_redirect() -> ResponseTemplate {
    ResponseTemplate::new(302).insert_header(
        "Location",
        format!("msauth.com.seasnve.watts://auth/?state=s&code={CODE}&client_info=x").as_str(),
    )
}

pub async fn mount_code_exchange(server: &MockServer, access_token: &str) {
    Mock::given(method("POST"))
        .and(path(b2c_path("oauth2/v2.0/token")))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains(format!("code={CODE}").as_str()))
        .and(body_string_contains("code_verifier="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access_token,
            "refresh_token": "rt-from-login",
            "expires_in": 3600,
            "id_token": "id-1"
        })))
        .mount(server)
        .await;
}

/// Every page of a successful sign-in, ending in `access_token`
pub async fn mount_successful_login(server: &MockServer, access_token: &str) {
    mount_authorize(server).await;
    mount_self_asserted(
        server,
        ResponseTemplate::new(200).set_body_string(r#"{"status":"200"}"#),
    )
    .await;
    mount_confirmed(server, code_redirect()).await;
    mount_code_exchange(server, access_token).await;
}
