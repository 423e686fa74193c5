//! Endpoint resolution through a client: parameters, qualifiers, defaults and
//! sub-client callers.

mod common;

use common::{echo_client, test_config, text};
use httpbind::endpoint::FixedUri;
use httpbind::invocation::{Arg, Invocation};
use httpbind::metadata::{InterfaceDecl, MethodDecl, ParamDecl};
use httpbind::Error;
use url::Url;

const DEFAULT: &str = "http://default.example:8080";

fn line(client: &httpbind::RestClient, interface: &str, method: &str, args: Vec<Arg>) -> String {
    client
        .call(interface, method, args)
        .expect("call succeeds")
        .as_text()
        .expect("text reply")
        .to_string()
}

#[test]
fn default_endpoint_is_used_without_declarations() {
    let client = echo_client(
        test_config(),
        Some(DEFAULT),
        vec![InterfaceDecl::new("Api").method(MethodDecl::get("ping").path("/ping").returns(text()))],
        |_| {},
    );
    assert_eq!(line(&client, "Api", "ping", vec![]), "GET http://default.example:8080/ping");
}

#[test]
fn qualifier_from_configuration_wins_over_default() {
    let mut config = test_config();
    config
        .endpoints
        .insert("storage".to_string(), "https://storage.example".to_string());
    let client = echo_client(
        config,
        Some(DEFAULT),
        vec![InterfaceDecl::new("Blobs")
            .endpoint("storage")
            .method(MethodDecl::get("list").path("/blobs").returns(text()))],
        |_| {},
    );
    assert_eq!(line(&client, "Blobs", "list", vec![]), "GET https://storage.example/blobs");
}

#[test]
fn registered_supplier_is_not_replaced_by_configuration() {
    let mut config = test_config();
    config
        .endpoints
        .insert("storage".to_string(), "https://from-config.example".to_string());
    let client = echo_client(
        config,
        Some(DEFAULT),
        vec![InterfaceDecl::new("Blobs")
            .endpoint("storage")
            .method(MethodDecl::get("list").returns(text()))],
        |strategies| {
            strategies.register_endpoint(
                "storage",
                FixedUri(Url::parse("https://registered.example").unwrap()),
            );
        },
    );
    assert_eq!(line(&client, "Blobs", "list", vec![]), "GET https://registered.example/");
}

#[test]
fn method_qualifier_overrides_interface_qualifier() {
    let client = echo_client(
        test_config(),
        Some(DEFAULT),
        vec![InterfaceDecl::new("Blobs")
            .endpoint("storage")
            .method(MethodDecl::get("status").endpoint("health").returns(text()))],
        |strategies| {
            strategies.register_endpoint(
                "storage",
                FixedUri(Url::parse("https://storage.example").unwrap()),
            );
            strategies.register_endpoint("health", || -> Result<Url, Error> {
                Ok(Url::parse("https://health.example/v2").unwrap())
            });
        },
    );
    assert_eq!(line(&client, "Blobs", "status", vec![]), "GET https://health.example/v2");
}

#[test]
fn endpoint_parameter_wins_over_qualifier() {
    let client = echo_client(
        test_config(),
        Some(DEFAULT),
        vec![InterfaceDecl::new("Blobs").endpoint("storage").method(
            MethodDecl::get("get")
                .path("/item")
                .returns(text())
                .param(ParamDecl::endpoint("location").nullable()),
        )],
        |strategies| {
            strategies.register_endpoint(
                "storage",
                FixedUri(Url::parse("https://storage.example").unwrap()),
            );
        },
    );
    assert_eq!(
        line(&client, "Blobs", "get", vec!["https://cdn.example".into()]),
        "GET https://cdn.example/item"
    );
    // A null endpoint argument falls through to the qualifier.
    assert_eq!(
        line(&client, "Blobs", "get", vec![Arg::Null]),
        "GET https://storage.example/item"
    );
}

#[test]
fn relative_endpoint_parameter_is_rebased_onto_default() {
    let client = echo_client(
        test_config(),
        Some(DEFAULT),
        vec![InterfaceDecl::new("Api").method(
            MethodDecl::get("get")
                .returns(text())
                .param(ParamDecl::endpoint("base")),
        )],
        |_| {},
    );
    assert_eq!(
        line(&client, "Api", "get", vec!["/tenants/acme".into()]),
        "GET http://default.example:8080/tenants/acme"
    );
}

#[test]
fn endpoint_parser_combines_several_parameters() {
    let client = echo_client(
        test_config(),
        None,
        vec![InterfaceDecl::new("Regional").method(
            MethodDecl::get("list")
                .path("/items")
                .returns(text())
                .param(ParamDecl::endpoint("region").endpoint_parser("regional"))
                .param(ParamDecl::endpoint("account")),
        )],
        |strategies| {
            strategies.register_endpoint_parser("regional", |values: &[Arg]| -> Result<String, Error> {
                let parts: Vec<String> = values.iter().filter_map(Arg::as_param_string).collect();
                Ok(format!("https://{}.{}.example", parts[1], parts[0]))
            });
        },
    );
    assert_eq!(
        line(&client, "Regional", "list", vec!["eu".into(), "acme".into()]),
        "GET https://acme.eu.example/items"
    );
}

#[test]
fn missing_endpoint_is_a_configuration_error() {
    let client = echo_client(
        test_config(),
        None,
        vec![InterfaceDecl::new("Api").method(MethodDecl::get("ping").returns(text()))],
        |_| {},
    );
    if std::env::var_os(httpbind::constants::ENV_HTTPBIND_ENDPOINT).is_some() {
        return;
    }
    let err = client.call("Api", "ping", vec![]).unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }), "{err:?}");
    assert!(err.to_string().contains("Api.ping"), "{err}");
}

#[test]
fn relative_qualifier_without_default_is_a_configuration_error() {
    let client = echo_client(
        test_config(),
        None,
        vec![InterfaceDecl::new("Api").method(
            MethodDecl::get("get").returns(text()).param(ParamDecl::endpoint("base")),
        )],
        |_| {},
    );
    if std::env::var_os(httpbind::constants::ENV_HTTPBIND_ENDPOINT).is_some() {
        return;
    }
    let err = client.call("Api", "get", vec!["/relative".into()]).unwrap_err();
    assert!(err.to_string().contains("relative"), "{err}");
}

#[test]
fn sub_client_uses_the_caller_endpoint() {
    let client = echo_client(
        test_config(),
        Some(DEFAULT),
        vec![
            InterfaceDecl::new("Account").method(
                MethodDecl::delegate("container", "Container")
                    .path("/{container}")
                    .param(ParamDecl::endpoint("account"))
                    .param(ParamDecl::path("container")),
            ),
            InterfaceDecl::new("Container").method(
                MethodDecl::get("blob")
                    .path("/{name}")
                    .returns(text())
                    .param(ParamDecl::path("name")),
            ),
        ],
        |_| {},
    );
    let id = client.metadata("Account", "container").unwrap().id;
    let container = client
        .delegate(Invocation::new(
            id,
            vec!["https://acme.blob.example".into(), "photos".into()],
        ))
        .unwrap();
    assert_eq!(
        line(&container, "Container", "blob", vec!["cat.jpg".into()]),
        "GET https://acme.blob.example/photos/cat.jpg"
    );
}

#[test]
fn sub_client_host_prefix_applies_to_the_caller_endpoint() {
    let client = echo_client(
        test_config(),
        Some("http://storage.example"),
        vec![
            InterfaceDecl::new("Storage")
                .method(MethodDecl::delegate("bucket", "Bucket").param(ParamDecl::delegate("bucket"))),
            InterfaceDecl::new("Bucket").method(
                MethodDecl::get("list")
                    .returns(text())
                    .param(ParamDecl::host_prefix("name")),
            ),
        ],
        |_| {},
    );
    let id = client.metadata("Storage", "bucket").unwrap().id;
    let bucket = client
        .delegate(Invocation::new(id, vec!["photos".into()]))
        .unwrap();
    assert_eq!(
        line(&bucket, "Bucket", "list", vec!["photos".into()]),
        "GET http://photos.storage.example/"
    );
}
