//! End-to-end calls through the reqwest transport against a mock server.

mod common;

use httpbind::config::BasicAuthConfig;
use httpbind::constants;
use httpbind::invocation::{Arg, Invocation};
use httpbind::metadata::{InterfaceDecl, MethodDecl, ParamDecl, ReturnKind, ReturnShape};
use httpbind::response::Reply;
use httpbind::{ClientBuilder, Error};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// The client API blocks, so calls run off the async test thread.
async fn blocking<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    tokio::task::spawn_blocking(f).await.expect("blocking task panicked")
}

fn users() -> InterfaceDecl {
    InterfaceDecl::new("Users")
        .path("/users")
        .header("X-Api-Client", "httpbind-tests")
        .method(
            MethodDecl::get("get")
                .path("/{id}")
                .fallback(constants::FALLBACK_NULL_ON_404)
                .param(ParamDecl::path("id")),
        )
        .method(
            MethodDecl::get("list")
                .returns(ReturnShape::of(ReturnKind::JsonList))
                .param(ParamDecl::query("role").nullable()),
        )
        .method(
            MethodDecl::post("create")
                .param(ParamDecl::binder("user", constants::BINDER_JSON)),
        )
        .method(
            MethodDecl::head("exists")
                .path("/{id}")
                .returns(ReturnShape::of(ReturnKind::Boolean))
                .fallback(constants::FALLBACK_FALSE_ON_404)
                .param(ParamDecl::path("id")),
        )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn get_parses_json_and_sends_static_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/42"))
        .and(header("X-Api-Client", "httpbind-tests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 42, "name": "Ada"})))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let reply = blocking(move || {
        common::client(&uri, vec![users()]).call("Users", "get", vec!["42".into()])
    })
    .await
    .unwrap();
    assert_eq!(reply, Reply::Json(json!({"id": 42, "name": "Ada"})));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn not_found_becomes_null_through_the_declared_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/7"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such user"))
        .mount(&server)
        .await;

    let uri = server.uri();
    let reply = blocking(move || {
        common::client(&uri, vec![users()]).call("Users", "get", vec!["7".into()])
    })
    .await
    .unwrap();
    assert!(reply.is_null());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn head_404_maps_to_false() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/users/7"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/users/1"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let uri = server.uri();
    let (missing, present) = blocking(move || {
        let client = common::client(&uri, vec![users()]);
        (
            client.call("Users", "exists", vec!["7".into()]),
            client.call("Users", "exists", vec!["1".into()]),
        )
    })
    .await;
    assert_eq!(missing.unwrap().as_bool(), Some(false));
    assert_eq!(present.unwrap().as_bool(), Some(true));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn post_sends_a_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({"name": "Grace"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let reply = blocking(move || {
        common::client(&uri, vec![users()]).call(
            "Users",
            "create",
            vec![Arg::Json(json!({"name": "Grace"}))],
        )
    })
    .await
    .unwrap();
    assert_eq!(reply.as_json(), Some(&json!({"id": 1})));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn list_with_query_param() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("role", "admin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}, {"id": 2}])))
        .mount(&server)
        .await;

    let uri = server.uri();
    let reply = blocking(move || {
        common::client(&uri, vec![users()]).call("Users", "list", vec!["admin".into()])
    })
    .await
    .unwrap();
    assert_eq!(reply.to_json(), json!([{"id": 1}, {"id": 2}]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn configured_basic_auth_is_applied_by_filter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("Authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hi"))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let reply = blocking(move || {
        let mut config = common::test_config();
        config.basic_auth = Some(BasicAuthConfig {
            user: "user".into(),
            password: "pass".into(),
        });
        ClientBuilder::new(config)
            .endpoint(uri)
            .interface(
                InterfaceDecl::new("Session").filter(constants::FILTER_BASIC_AUTH).method(
                    MethodDecl::get("me")
                        .path("/me")
                        .returns(ReturnShape::of(ReturnKind::Text)),
                ),
            )
            .build()
            .expect("client builds")
            .call("Session", "me", vec![])
    })
    .await
    .unwrap();
    assert_eq!(reply.as_text(), Some("hi"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn idempotent_request_is_retried_after_503() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/9"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 9})))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let reply = blocking(move || {
        common::client(&uri, vec![users()]).call("Users", "get", vec!["9".into()])
    })
    .await
    .unwrap();
    assert_eq!(reply.to_json(), json!({"id": 9}));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn post_is_not_retried_and_surfaces_the_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let err = blocking(move || {
        common::client(&uri, vec![users()]).call("Users", "create", vec![Arg::Json(json!({}))])
    })
    .await
    .unwrap_err();
    match err {
        Error::Http { status, body, .. } => {
            assert_eq!(status, 503);
            assert_eq!(body.as_deref(), Some("maintenance"));
        }
        other => panic!("expected an HTTP error, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn declared_timeout_cuts_a_slow_response_short() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let uri = server.uri();
    let err = blocking(move || {
        common::client(
            &uri,
            vec![InterfaceDecl::new("Reports").method(
                MethodDecl::get("slow")
                    .path("/slow")
                    .timeout(Duration::from_millis(100)),
            )],
        )
        .call("Reports", "slow", vec![])
    })
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }), "{err:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn deferred_method_resolves_through_the_handle() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs/3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"state": "done"})))
        .mount(&server)
        .await;

    let uri = server.uri();
    let reply = blocking(move || -> Result<Reply, Error> {
        let client = common::client(
            &uri,
            vec![InterfaceDecl::new("Jobs").method(
                MethodDecl::get("get")
                    .path("/jobs/{id}")
                    .returns(ReturnShape::deferred(ReturnKind::Json))
                    .param(ParamDecl::path("id")),
            )],
        );
        let id = client.metadata("Jobs", "get")?.id;
        let outcome = client.invoke(Invocation::new(id, vec!["3".into()]))?;
        assert!(outcome.is_deferred());
        outcome.into_reply()
    })
    .await
    .unwrap();
    assert_eq!(reply.to_json(), json!({"state": "done"}));
}
