//! Request building from merged metadata and call-time arguments

mod common;

use common::{build, build_with};
use httpbind::constants;
use httpbind::engine::builder::RequestBuilder;
use httpbind::invocation::{Arg, Invocation};
use httpbind::metadata::{InterfaceDecl, MethodDecl, MethodMetadata, ParamDecl};
use httpbind::options::RequestOptions;
use httpbind::request::GeneratedRequest;
use httpbind::strategies::Strategies;
use httpbind::Error;
use indexmap::IndexMap;
use serde_json::{json, Value};
use url::Url;

fn objects() -> InterfaceDecl {
    InterfaceDecl::new("Objects")
}

fn body_json(request: &httpbind::request::HttpRequest) -> Value {
    serde_json::from_slice(request.payload().expect("payload").body()).expect("json body")
}

#[test]
fn interface_entries_come_before_method_entries() {
    let interface = objects().query("a", "1").header("X-A", "1");
    let method = MethodDecl::get("list").query("b", "2").header("X-B", "2");
    let request = build(&interface, &method, vec![]).unwrap();

    assert_eq!(request.endpoint().as_str(), "http://localhost:9999/?a=1&b=2");
    let names: Vec<&str> = request.headers().iter().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["X-A", "X-B"]);
}

#[test]
fn method_without_value_replaces_interface_entry() {
    let interface = objects().query("acl", "private");
    let method = MethodDecl::get("acl").query_flag("acl");
    let request = build(&interface, &method, vec![]).unwrap();
    assert_eq!(request.endpoint().as_str(), "http://localhost:9999/?acl");
}

#[test]
fn path_values_are_encoded_unless_skipped() {
    let method = MethodDecl::get("get").path("/{key}").param(ParamDecl::path("key"));
    let encoded = build(&objects(), &method, vec!["a/b c".into()]).unwrap();
    assert_eq!(encoded.endpoint().path(), "/a%2Fb%20c");

    let skipping = method.clone().skip_encoding("/");
    let raw = build(&objects(), &skipping, vec!["a/b".into()]).unwrap();
    assert_eq!(raw.endpoint().path(), "/a/b");

    let slash = build(&objects(), &skipping, vec!["/".into()]).unwrap();
    assert_eq!(slash.endpoint().path(), "//");
}

#[test]
fn null_required_argument_is_rejected_before_building() {
    let method = MethodDecl::get("get")
        .path("/{key}")
        .param(ParamDecl::path("key"))
        .param(ParamDecl::header("x-trace").key("X-Trace"));
    let err = build(&objects(), &method, vec!["k".into(), Arg::Null]).unwrap_err();
    match err {
        Error::Argument {
            method,
            param,
            position,
            ..
        } => {
            assert_eq!(method, "Objects.get");
            assert_eq!(param, "X-Trace");
            assert_eq!(position, 1);
        }
        other => panic!("expected an argument error, got {other:?}"),
    }
}

#[test]
fn nullable_header_is_omitted() {
    let method = MethodDecl::get("get").param(ParamDecl::header("X-Trace").nullable());
    let request = build(&objects(), &method, vec![Arg::Null]).unwrap();
    assert!(!request.headers().contains("X-Trace"));
}

#[test]
fn list_values_give_one_header_each() {
    let method = MethodDecl::get("get").param(ParamDecl::header("X-Tag"));
    let request = build(
        &objects(),
        &method,
        vec![Arg::List(vec!["a".into(), "b".into()])],
    )
    .unwrap();
    assert_eq!(request.headers().get_all("X-Tag"), vec!["a", "b"]);
}

#[test]
fn matrix_params_follow_the_path() {
    let method = MethodDecl::get("get")
        .path("/items")
        .matrix("v", "1")
        .param(ParamDecl::matrix("lang"));
    let request = build(&objects(), &method, vec!["en".into()]).unwrap();
    assert_eq!(request.endpoint().as_str(), "http://localhost:9999/items;v=1;lang=en");
}

#[test]
fn options_headers_accumulate_but_payload_is_last_wins() {
    let method = MethodDecl::post("put").param(ParamDecl::options_varargs("options"));
    let options = vec![
        RequestOptions::new()
            .header("X-Opt", "1")
            .query_param("q", "1")
            .payload("first"),
        RequestOptions::new()
            .header("X-Opt", "2")
            .query_param("q", "2")
            .payload("second"),
    ];
    let request = build(&objects(), &method, vec![Arg::OptionsList(options)]).unwrap();

    assert_eq!(request.headers().get_all("X-Opt"), vec!["1", "2"]);
    assert_eq!(request.endpoint().query(), Some("q=1&q=2"));
    let payload = request.payload().unwrap();
    assert_eq!(payload.body_text(), "second");
    assert_eq!(payload.content_type(), Some(constants::CONTENT_TYPE_TEXT));
}

#[test]
fn options_contribute_matrix_and_form_params() {
    let method = MethodDecl::post("login")
        .path("/session")
        .form("client", "cli")
        .param(ParamDecl::options("options"));
    let options = RequestOptions::new()
        .matrix_param("v", "2")
        .form_param("grant", "password");
    let request = build(&objects(), &method, vec![Arg::Options(options)]).unwrap();

    assert_eq!(request.endpoint().as_str(), "http://localhost:9999/session;v=2");
    let payload = request.payload().unwrap();
    assert_eq!(payload.body_text(), "client=cli&grant=password");
    assert_eq!(
        payload.content_type(),
        Some(constants::CONTENT_TYPE_FORM)
    );
}

#[test]
fn options_path_suffix_is_appended() {
    let method = MethodDecl::get("get")
        .path("/items")
        .param(ParamDecl::options("options"));
    let request = build(
        &objects(),
        &method,
        vec![Arg::Options(RequestOptions::new().path_suffix("/archived"))],
    )
    .unwrap();
    assert_eq!(request.endpoint().path(), "/items/archived");
}

#[test]
fn content_headers_move_into_payload_metadata() {
    let method = MethodDecl::post("upload")
        .header("Content-Disposition", "attachment; filename=x.txt")
        .header("X-Other", "kept")
        .param(ParamDecl::binder("body", constants::BINDER_STRING));
    let request = build(&objects(), &method, vec!["hello".into()]).unwrap();

    assert!(!request.headers().contains(constants::HEADER_CONTENT_DISPOSITION));
    assert_eq!(request.headers().get("X-Other"), Some("kept"));
    let metadata = request.payload().unwrap().metadata();
    assert_eq!(
        metadata.content_disposition.as_deref(),
        Some("attachment; filename=x.txt")
    );
    assert_eq!(metadata.content_type.as_deref(), Some(constants::CONTENT_TYPE_TEXT));
    assert_eq!(metadata.content_length, Some(5));
}

#[test]
fn content_type_without_payload_gives_an_empty_body_on_payload_verbs() {
    let put = MethodDecl::put("mkdir").header("Content-Type", "application/x-directory");
    let request = build(&objects(), &put, vec![]).unwrap();
    let payload = request.payload().expect("empty payload");
    assert!(payload.is_empty());
    assert_eq!(payload.content_type(), Some("application/x-directory"));
    assert_eq!(payload.metadata().content_length, Some(0));

    let get = MethodDecl::get("stat").header("Content-Type", "application/x-directory");
    let request = build(&objects(), &get, vec![]).unwrap();
    assert!(request.payload().is_none());
}

#[test]
fn produces_and_consumes_replace_headers() {
    let interface = objects().header("Accept", "text/html");
    let method = MethodDecl::put("put")
        .produces(constants::CONTENT_TYPE_XML)
        .consumes(constants::CONTENT_TYPE_JSON)
        .param(ParamDecl::binder("body", constants::BINDER_STRING));
    let request = build(&interface, &method, vec!["<a/>".into()]).unwrap();

    assert_eq!(request.headers().get_all("Accept"), vec![constants::CONTENT_TYPE_JSON]);
    assert_eq!(
        request.payload().unwrap().content_type(),
        Some(constants::CONTENT_TYPE_XML)
    );
}

#[test]
fn form_params_become_an_url_encoded_body() {
    let method = MethodDecl::post("login")
        .form("grant", "password")
        .param(ParamDecl::form("user"));
    let request = build(&objects(), &method, vec!["bob smith".into()]).unwrap();
    let payload = request.payload().unwrap();
    assert_eq!(payload.body_text(), "grant=password&user=bob%20smith");
    assert_eq!(payload.content_type(), Some(constants::CONTENT_TYPE_FORM));
}

#[test]
fn payload_params_become_a_json_object() {
    let method = MethodDecl::post("create")
        .param(ParamDecl::payload("name"))
        .param(ParamDecl::payload("size"))
        .param(ParamDecl::payload("note").nullable());
    let request = build(
        &objects(),
        &method,
        vec!["n".into(), Arg::Int(3), Arg::Null],
    )
    .unwrap();
    assert_eq!(body_json(&request), json!({"name": "n", "size": 3}));
    assert_eq!(
        request.payload().unwrap().content_type(),
        Some(constants::CONTENT_TYPE_JSON)
    );
}

#[test]
fn wrap_with_nests_the_payload_map() {
    let method = MethodDecl::post("create")
        .wrap_with("user")
        .payload_param("role", "admin")
        .param(ParamDecl::payload("name"));
    let request = build(&objects(), &method, vec!["n".into()]).unwrap();
    assert_eq!(body_json(&request), json!({"user": {"name": "n", "role": "admin"}}));
}

#[test]
fn wrap_with_parameter_wraps_one_value() {
    let method = MethodDecl::post("create").param(ParamDecl::wrap_with("tags", "tags"));
    let request = build(
        &objects(),
        &method,
        vec![Arg::Json(json!(["a", "b"]))],
    )
    .unwrap();
    assert_eq!(body_json(&request), json!({"tags": ["a", "b"]}));
}

#[test]
fn payload_template_sees_path_tokens_and_defaults() {
    let mut tokens = IndexMap::new();
    tokens.insert("api_version".to_string(), "v1".to_string());
    let method = MethodDecl::post("create")
        .path("/{bucket}")
        .payload("<Create bucket=\"{bucket}\" version=\"{version}\">{name}</Create>")
        .payload_param("version", "{api_version}")
        .produces(constants::CONTENT_TYPE_XML)
        .param(ParamDecl::path("bucket"))
        .param(ParamDecl::payload("name"));
    let request = build_with(
        &Strategies::new(),
        &tokens,
        &objects(),
        &method,
        vec!["photos".into(), "n".into()],
    )
    .unwrap();
    let payload = request.payload().unwrap();
    assert_eq!(
        payload.body_text(),
        "<Create bucket=\"photos\" version=\"v1\">n</Create>"
    );
    assert_eq!(payload.content_type(), Some(constants::CONTENT_TYPE_XML));
}

#[test]
fn payload_template_with_missing_value_fails() {
    let method = MethodDecl::post("create").payload("{missing}");
    let err = build(&objects(), &method, vec![]).unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }), "{err:?}");
}

#[test]
fn base_tokens_expand_in_paths() {
    let mut tokens = IndexMap::new();
    tokens.insert("api_version".to_string(), "2024-01-01".to_string());
    let request = build_with(
        &Strategies::new(),
        &tokens,
        &objects().path("/{api_version}"),
        &MethodDecl::get("list").path("/items"),
        vec![],
    )
    .unwrap();
    assert_eq!(request.endpoint().path(), "/2024-01-01/items");
}

#[test]
fn host_prefix_rewrites_the_host() {
    let method = MethodDecl::get("get").param(ParamDecl::host_prefix("bucket"));
    let request = build(&objects(), &method, vec!["holy".into()]).unwrap();
    assert_eq!(request.endpoint().as_str(), "http://holy.localhost:9999/");

    let dashed = MethodDecl::get("get").param(ParamDecl::host_prefix("bucket").separator("-"));
    let request = build(&objects(), &dashed, vec!["holy".into()]).unwrap();
    assert_eq!(request.endpoint().host_str(), Some("holy-localhost"));
}

#[test]
fn empty_host_prefix_is_an_argument_error() {
    let method = MethodDecl::get("get").param(ParamDecl::host_prefix("bucket"));
    let err = build(&objects(), &method, vec!["".into()]).unwrap_err();
    assert!(matches!(err, Error::Argument { ref param, .. } if param == "bucket"), "{err:?}");
}

#[test]
fn virtual_host_header_uses_the_endpoint_host() {
    let interface = objects().virtual_host();
    let request = build(&interface, &MethodDecl::get("list"), vec![]).unwrap();
    assert_eq!(request.headers().get(constants::HEADER_HOST), Some("localhost:9999"));
}

#[test]
fn param_parser_runs_before_binding() {
    let mut strategies = Strategies::new();
    strategies.register_param_parser("upper", |arg: &Arg| -> Result<Arg, Error> {
        Ok(Arg::Str(arg.as_param_string().unwrap_or_default().to_uppercase()))
    });
    let method = MethodDecl::get("get").param(ParamDecl::query("region").parser("upper"));
    let request = build_with(
        &strategies,
        &IndexMap::new(),
        &objects(),
        &method,
        vec!["eu".into()],
    )
    .unwrap();
    assert_eq!(request.endpoint().query(), Some("region=EU"));
}

#[test]
fn filters_run_in_order_and_strip_expect_when_configured() {
    let method = MethodDecl::put("put")
        .header("Expect", "100-continue")
        .filter(constants::FILTER_CONTENT_MD5)
        .param(ParamDecl::binder("body", constants::BINDER_STRING));
    let metadata = MethodMetadata::merge(&objects(), &method).unwrap();
    let strategies = Strategies::new();
    let default = Url::parse(common::DEFAULT_ENDPOINT).unwrap();
    let tokens = IndexMap::new();
    let builder = RequestBuilder::new(&strategies, Some(&default), &tokens, true);
    let invocation = Invocation::new(metadata.id.clone(), vec!["hello".into()]);
    let request = builder
        .build(&metadata, &invocation, None)
        .unwrap()
        .seal()
        .unwrap();

    assert!(!request.headers().contains(constants::HEADER_EXPECT));
    assert_eq!(
        request.payload().unwrap().metadata().content_md5.as_deref(),
        Some("XUFAKrxLKna5cZ2REBfFkg==")
    );
}

#[test]
fn too_many_arguments_is_an_argument_error() {
    let err = build(&objects(), &MethodDecl::get("list"), vec!["extra".into()]).unwrap_err();
    assert!(matches!(err, Error::Argument { .. }), "{err:?}");
}

#[test]
fn bound_values_can_be_read_back_from_the_request() {
    let method = MethodDecl::get("find")
        .path("/{bucket}/{key}")
        .param(ParamDecl::path("bucket"))
        .param(ParamDecl::path("key"))
        .param(ParamDecl::query("prefix"))
        .param(ParamDecl::query("marker"));
    let args = ["photos", "a b/c.jpg", "2024/", "x&y=z"];
    let request = build(
        &objects(),
        &method,
        args.iter().map(|arg| Arg::from(*arg)).collect(),
    )
    .unwrap();

    let mut read_back: Vec<String> = request
        .endpoint()
        .path_segments()
        .unwrap()
        .map(|segment| urlencoding::decode(segment).unwrap().into_owned())
        .collect();
    read_back.extend(
        request
            .endpoint()
            .query_pairs()
            .map(|(_, value)| value.into_owned()),
    );
    assert_eq!(read_back, args);
}

#[test]
fn applying_the_filter_chain_twice_changes_nothing() {
    let mut strategies = Strategies::new();
    strategies.register_filter(
        constants::FILTER_BASIC_AUTH,
        httpbind::filters::BasicAuthentication::new("user", "pass"),
    );
    let method = MethodDecl::put("put")
        .header("Expect", "100-continue")
        .filter(constants::FILTER_BASIC_AUTH)
        .filter(constants::FILTER_CONTENT_MD5)
        .param(ParamDecl::binder("body", constants::BINDER_STRING));
    let metadata = MethodMetadata::merge(&objects(), &method).unwrap();
    let default = Url::parse(common::DEFAULT_ENDPOINT).unwrap();
    let tokens = IndexMap::new();
    let builder = RequestBuilder::new(&strategies, Some(&default), &tokens, true);
    let invocation = Invocation::new(metadata.id.clone(), vec!["hello".into()]);
    let generated = builder.build(&metadata, &invocation, None).unwrap();
    assert_eq!(generated.filters().len(), 3);

    let once = generated.clone().seal().unwrap();
    let twice = GeneratedRequest::new(
        once.clone(),
        generated.invocation().clone(),
        None,
        generated.filters().to_vec(),
    )
    .seal()
    .unwrap();

    assert_eq!(once, twice);
    assert_eq!(
        twice.headers().get_all(constants::HEADER_AUTHORIZATION),
        vec!["Basic dXNlcjpwYXNz"]
    );
}

#[test]
fn template_default_applies_when_nothing_is_bound() {
    let unbound = MethodDecl::get("get").path("/{id:abc}");
    let request = build(&objects(), &unbound, vec![]).unwrap();
    assert_eq!(request.endpoint().path(), "/abc");

    let bound = MethodDecl::get("get")
        .path("/{id:abc}")
        .param(ParamDecl::path("id"));
    let request = build(&objects(), &bound, vec!["xyz".into()]).unwrap();
    assert_eq!(request.endpoint().path(), "/xyz");

    let client = common::echo_client(
        common::test_config(),
        Some(common::DEFAULT_ENDPOINT),
        vec![objects().path("/{version:v2}").method(MethodDecl::get("ping").path("/ping"))],
        |_| {},
    );
    client.validate().unwrap();
    assert_eq!(
        client.call("Objects", "ping", vec![]).unwrap().as_text(),
        Some("GET http://localhost:9999/v2/ping")
    );
}
