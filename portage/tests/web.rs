use chrono::Utc;
use portage::{
    Identity, Request,
    http::{StatusCode, header},
};
use serde_json::json;

mod common;
use common::{portage, token};

#[tokio::test]
async fn echo_round_trip() {
    let app = portage();
    let response = app
        .handle(Request::get("/actions/echo").with_query("val", "bar"))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, Some(json!("bar")));
}

#[tokio::test]
async fn missing_and_unknown_arguments_are_rejected() {
    let app = portage();
    let missing = app.handle(Request::get("/actions/echo")).await;
    assert_eq!(missing.status, StatusCode::UNPROCESSABLE_ENTITY);

    let unknown = app
        .handle(Request::get("/actions/echo").with_query("val", "a").with_query("extra", "b"))
        .await;
    assert_eq!(unknown.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn scoped_action_needs_a_credential() {
    let app = portage();

    let anonymous = app.handle(Request::get("/actions/reveal-secret")).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let user = token(&Identity::new("bob").with_scope("user"));
    let forbidden = app
        .handle(Request::get("/actions/reveal-secret").with_bearer(&user))
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

    let root = token(&Identity::new("ada").with_scope("root"));
    let allowed = app
        .handle(Request::get("/actions/reveal-secret").with_bearer(&root))
        .await;
    assert_eq!(allowed.status, StatusCode::OK);
    assert_eq!(allowed.body, Some(json!("classified")));
}

#[tokio::test]
async fn expired_and_forged_tokens_are_rejected() {
    let app = portage();
    let expired = token(
        &Identity::new("ada")
            .with_scope("root")
            .expiring_at(Utc::now() - chrono::Duration::hours(1)),
    );
    let response = app
        .handle(Request::get("/actions/reveal-secret").with_bearer(&expired))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let forged = portage::HmacAuthorizer::new("other-secret");
    let forged =
        portage::Authorizer::encode(&forged, &Identity::new("ada").with_scope("root")).unwrap();
    let response = app
        .handle(Request::get("/actions/reveal-secret").with_bearer(&forged))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn identity_is_injected_and_cannot_be_spoofed() {
    let app = portage();
    let bob = token(&Identity::new("bob").with_scope("user"));
    let response = app
        .handle(
            Request::get("/actions/whoami")
                .with_query("caller", r#"{"sub":"mallory"}"#)
                .with_bearer(&bob),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, Some(json!("bob")));
    assert!(response.header(header::CACHE_CONTROL).is_none());
}

#[tokio::test]
async fn ttl_responses_share_an_etag() {
    let app = portage();
    let before = Utc::now();
    let first = app.handle(Request::get("/actions/server-motd")).await;
    let second = app.handle(Request::get("/actions/server-motd")).await;
    assert_eq!(first.status, StatusCode::OK);

    let etag = first.header(header::ETAG).unwrap().to_string();
    assert_eq!(second.header(header::ETAG), Some(etag.as_str()));

    let expires = first.header(header::EXPIRES).unwrap();
    let expires = chrono::DateTime::parse_from_rfc2822(expires).unwrap().with_timezone(&Utc);
    let ahead = (expires - before).num_seconds();
    assert!((29..=31).contains(&ahead), "expires {ahead}s ahead");
    assert!(first.header(header::CACHE_CONTROL).unwrap().starts_with("public"));
}

#[tokio::test]
async fn matching_etag_gets_not_modified() {
    let app = portage();
    let first = app.handle(Request::get("/actions/server-motd")).await;
    let etag = first.header(header::ETAG).unwrap().to_string();

    let revalidated = app
        .handle(Request::get("/actions/server-motd").with_header("if-none-match", &etag))
        .await;
    assert_eq!(revalidated.status, StatusCode::NOT_MODIFIED);
    assert!(revalidated.body.is_none());
    assert_eq!(revalidated.header(header::ETAG), Some(etag.as_str()));

    let stale = app
        .handle(Request::get("/actions/server-motd").with_header("if-none-match", "\"other\""))
        .await;
    assert_eq!(stale.status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_paths_and_methods() {
    let app = portage();
    let missing = app.handle(Request::get("/actions/nope")).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let wrong_method = app
        .handle(Request::post("/actions/echo", json!({ "val": "x" })))
        .await;
    assert_eq!(wrong_method.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(wrong_method.header(header::ALLOW), Some("GET"));
}

#[test]
fn describe_filters_by_visibility() {
    let app = portage();
    let anonymous = app.describe(None);
    assert!(anonymous.find("echo").is_some());
    assert!(anonymous.find("reveal_secret").is_none());

    let root = Identity::new("ada").with_scope("root");
    let doc = app.describe(Some(&root));
    let secret = doc.find("reveal_secret").unwrap();
    assert!(secret.authenticated);
}
