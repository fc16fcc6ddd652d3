mod common;

use nila_oidc_rp::prelude::*;
use serde_json::json;

use common::{TestProvider, END_SESSION_ENDPOINT};

#[tokio::test]
async fn authorization_url_requires_state_and_nonce() {
    let provider = TestProvider::with_discovery().await;
    let rp = provider.relying_party();

    let err = rp
        .authorization_url(&AuthorizationParams::new().nonce("n"))
        .await
        .unwrap_err();
    assert!(matches!(err, NilaOidcError::MissingParameter("state")));
    assert_eq!(err.to_string(), r#"Required parameter "state" missing"#);

    let err = rp
        .authorization_url(&AuthorizationParams::new().state("s").nonce(""))
        .await
        .unwrap_err();
    assert!(matches!(err, NilaOidcError::MissingParameter("nonce")));
    assert_eq!(err.kind(), ErrorKind::MissingParameter);
}

#[tokio::test]
async fn authorization_url_extends_the_existing_query() {
    let provider = TestProvider::with_discovery().await;
    let rp = provider.relying_party();

    let url = rp
        .authorization_url(&AuthorizationParams::new().state("s").nonce("n"))
        .await
        .unwrap();

    assert_eq!(
        url,
        format!(
            "{}/oauth2/authorize?p=test-policy&scope=openid&response_type=id_token&response_mode=query&state=s&nonce=n&client_id=test-client&redirect_uri=https%3A%2F%2Fapp.test%2Fcallback",
            provider.server.uri()
        )
    );
}

#[tokio::test]
async fn authorization_url_uses_overrides_and_extra_parameters() {
    let provider = TestProvider::with_discovery().await;
    let rp = provider.relying_party();

    let params = AuthorizationParams::new()
        .state("s")
        .nonce("n")
        .scope("openid profile")
        .response_type("code")
        .response_mode("form_post")
        .redirect_uri("https://app.test/other")
        .param("prompt", "login");
    let url = rp.authorization_url(&params).await.unwrap();

    assert!(url.contains("scope=openid+profile&response_type=code&response_mode=form_post&state=s&nonce=n"));
    assert!(url.contains("redirect_uri=https%3A%2F%2Fapp.test%2Fother"));
    assert!(url.ends_with("&prompt=login"));
}

#[tokio::test]
async fn base_authorization_url_is_returned_verbatim() {
    let provider = TestProvider::with_discovery().await;
    let rp = provider.relying_party();

    assert_eq!(
        rp.base_authorization_url().await.unwrap(),
        format!("{}/oauth2/authorize?p=test-policy", provider.server.uri())
    );
}

#[tokio::test]
async fn end_session_url_only_carries_given_parameters() {
    let provider = TestProvider::with_discovery().await;
    let rp = provider.relying_party();

    assert_eq!(
        rp.end_session_url(None, None, None).await.unwrap(),
        END_SESSION_ENDPOINT
    );
    assert_eq!(
        rp.end_session_url(Some("https://logout.test"), None, None)
            .await
            .unwrap(),
        "https://login.test/logout?post_logout_redirect_uri=https%3A%2F%2Flogout.test"
    );
    assert_eq!(
        rp.end_session_url(Some("https://logout.test"), Some("xyz"), None)
            .await
            .unwrap(),
        "https://login.test/logout?post_logout_redirect_uri=https%3A%2F%2Flogout.test&state=xyz"
    );
    assert_eq!(
        rp.end_session_url(Some(""), Some("xyz"), None).await.unwrap(),
        "https://login.test/logout?state=xyz"
    );
    assert_eq!(
        rp.end_session_url(Some("https://app.test/"), Some("xyz"), Some("abc"))
            .await
            .unwrap(),
        "https://login.test/logout?post_logout_redirect_uri=https%3A%2F%2Fapp.test%2F&state=xyz&id_token_hint=abc"
    );
}

#[tokio::test]
async fn end_session_url_appends_to_an_existing_query() {
    let provider = TestProvider::start().await;
    let mut document = provider.discovery_document();
    document["end_session_endpoint"] = json!("https://login.test/logout?p=test-policy");
    provider.mount_discovery(document).await;

    let url = provider
        .relying_party()
        .end_session_url(None, Some("xyz"), None)
        .await
        .unwrap();
    assert_eq!(url, "https://login.test/logout?p=test-policy&state=xyz");
}

#[tokio::test]
async fn token_and_userinfo_endpoints() {
    let provider = TestProvider::with_discovery().await;
    let rp = provider.relying_party();
    let base = provider.server.uri();

    assert_eq!(rp.access_token_endpoint().await.unwrap(), format!("{base}/oauth2/token"));
    assert_eq!(
        rp.resource_owner_details_endpoint().await.unwrap(),
        format!("{base}/userinfo")
    );
}

#[tokio::test]
async fn missing_end_session_endpoint_is_a_configuration_error() {
    let provider = TestProvider::start().await;
    let mut document = provider.discovery_document();
    document.as_object_mut().unwrap().remove("end_session_endpoint");
    provider.mount_discovery(document).await;

    let err = provider
        .relying_party()
        .end_session_url(None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, NilaOidcError::MissingConfigurationKey(ref key) if key == "end_session_endpoint"));
}

#[test]
fn generated_values_are_random_alphanumeric() {
    let state = generate_state(DEFAULT_RANDOM_LENGTH);
    let nonce = generate_nonce(DEFAULT_RANDOM_LENGTH);

    assert_eq!(state.len(), DEFAULT_RANDOM_LENGTH);
    assert_eq!(generate_nonce(8).len(), 8);
    assert_ne!(state, nonce);
    assert!(state.chars().chain(nonce.chars()).all(|c| c.is_ascii_alphanumeric()));
}

#[tokio::test]
async fn relative_end_session_endpoint_is_extended_as_is() {
    let provider = TestProvider::start().await;
    let mut document = provider.discovery_document();
    document["end_session_endpoint"] = json!("/logout");
    provider.mount_discovery(document).await;

    let url = provider
        .relying_party()
        .end_session_url(Some("https://logout.test"), None, None)
        .await
        .unwrap();
    assert_eq!(url, "/logout?post_logout_redirect_uri=https%3A%2F%2Flogout.test");
}
