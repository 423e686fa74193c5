//! Centralized string constants for the httpbind engine
//!
//! This module contains commonly used string literals to:
//! - Reduce string duplication
//! - Keep header and content-type spellings consistent between the
//!   request builder, the transport and the response transforms

// HTTP Headers
pub const HEADER_ACCEPT: &str = "Accept";
pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_CONTENT_LENGTH: &str = "Content-Length";
pub const HEADER_CONTENT_DISPOSITION: &str = "Content-Disposition";
pub const HEADER_CONTENT_ENCODING: &str = "Content-Encoding";
pub const HEADER_CONTENT_LANGUAGE: &str = "Content-Language";
pub const HEADER_CONTENT_MD5: &str = "Content-MD5";
pub const HEADER_EXPECT: &str = "Expect";
pub const HEADER_EXPIRES: &str = "Expires";
pub const HEADER_HOST: &str = "Host";
pub const HEADER_LOCATION: &str = "Location";
pub const HEADER_TRANSFER_ENCODING: &str = "Transfer-Encoding";

/// Headers that describe a payload rather than the request; they travel in
/// the payload's content metadata instead of the request header map.
pub const CONTENT_HEADERS: &[&str] = &[
    HEADER_CONTENT_TYPE,
    HEADER_CONTENT_LENGTH,
    HEADER_CONTENT_DISPOSITION,
    HEADER_CONTENT_ENCODING,
    HEADER_CONTENT_LANGUAGE,
    HEADER_CONTENT_MD5,
    HEADER_EXPIRES,
];

// Header values
pub const TRANSFER_ENCODING_CHUNKED: &str = "chunked";

// Content Types
pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_XML: &str = "application/xml";
pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";
pub const CONTENT_TYPE_MULTIPART: &str = "multipart/form-data";
pub const CONTENT_TYPE_TEXT: &str = "text/plain";
pub const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";

// Content type identifiers
pub const CONTENT_TYPE_IDENTIFIER_JSON: &str = "json";

/// Fixed marker separating multipart body parts.
pub const MULTIPART_BOUNDARY: &str = "--HTTPBIND--";

// Template tokens always available to path templates
pub const TOKEN_API_VERSION: &str = "api_version";
pub const TOKEN_BUILD_VERSION: &str = "build_version";

// Built-in strategy names
pub const BINDER_JSON: &str = "json";
pub const BINDER_STRING: &str = "string";
pub const BINDER_BYTES: &str = "bytes";
pub const MAP_BINDER_JSON: &str = "json_map";
pub const PARAM_PARSER_IDENTITY: &str = "identity";
pub const FILTER_STRIP_EXPECT: &str = "strip_expect";
pub const FILTER_BASIC_AUTH: &str = "basic_auth";
pub const FILTER_CONTENT_MD5: &str = "content_md5";
pub const FALLBACK_MAP_4XX: &str = "map_4xx";
pub const FALLBACK_NULL_ON_404: &str = "null_on_404";
pub const FALLBACK_VOID_ON_404: &str = "void_on_404";
pub const FALLBACK_FALSE_ON_404: &str = "false_on_404";
pub const FALLBACK_TRUE_ON_404: &str = "true_on_404";
pub const FALLBACK_EMPTY_LIST_ON_404: &str = "empty_list_on_404";
pub const FALLBACK_NULL_ON_TIMEOUT: &str = "null_on_timeout";
pub const FALLBACK_PROPAGATE: &str = "propagate";

// Environment Variables
pub const ENV_HTTPBIND_ENDPOINT: &str = "HTTPBIND_ENDPOINT";
pub const ENV_HTTPBIND_LOG: &str = "HTTPBIND_LOG";
pub const ENV_HTTPBIND_LOG_FORMAT: &str = "HTTPBIND_LOG_FORMAT";
pub const ENV_HTTPBIND_LOG_FILE: &str = "HTTPBIND_LOG_FILE";
pub const ENV_HTTPBIND_LOG_MAX_BODY: &str = "HTTPBIND_LOG_MAX_BODY";

// Error Context Messages
pub const ERR_API_CREDENTIALS: &str =
    "Check your API credentials and authentication configuration.";
pub const ERR_ENDPOINT_NOT_FOUND: &str = "Check that the API endpoint and parameters are correct.";
pub const ERR_CONFLICT: &str = "The resource is in a state that does not allow this operation.";
pub const ERR_SERVER_ERROR: &str = "The API server is experiencing issues. Try again later.";
pub const ERR_CONNECTION: &str = "Check that the API server is running and accessible.";
pub const ERR_TIMEOUT: &str =
    "The call exceeded its declared timeout. Raise the timeout or declare a timeout fallback.";
pub const ERR_METADATA: &str = "Check the interface and method declarations for this call.";
pub const ERR_ARGUMENT: &str = "Check the arguments passed for this call.";
pub const ERR_FILE_NOT_FOUND: &str = "Check that the file path is correct and the file exists.";
pub const ERR_YAML_SYNTAX: &str = "Check that your definitions file is valid YAML syntax.";
pub const ERR_JSON_SYNTAX: &str = "Check that your request body or response contains valid JSON.";
pub const ERR_TOML_SYNTAX: &str = "Check that your configuration file is valid TOML syntax.";

// File extensions
pub const FILE_EXT_TOML: &str = "toml";
pub const FILE_EXT_YAML: &str = "yaml";
pub const FILE_EXT_YML: &str = "yml";

/// Check if a header name is authentication-related
#[must_use]
pub fn is_auth_header(name: &str) -> bool {
    matches!(
        name.to_lowercase().as_str(),
        "authorization"
            | "proxy-authorization"
            | "x-api-key"
            | "x-api-token"
            | "x-auth-token"
            | "api-key"
            | "token"
            | "cookie"
    )
}

/// Check if a content type is JSON
#[must_use]
pub fn is_json_content_type(content_type: &str) -> bool {
    content_type
        .to_lowercase()
        .contains(CONTENT_TYPE_IDENTIFIER_JSON)
}
