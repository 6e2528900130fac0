//! External transport boundary.
//!
//! The core never talks to the network directly; it hands a validated
//! descriptor to a [`Transport`]. The bundled [`HttpTransport`] drives
//! reqwest and buffers the response body so hooks and validators can read
//! it repeatedly. Failures translating the descriptor into a request are
//! reported as [`RouteError::TransportArgs`], distinct from wire failures.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::RouteError;
use crate::compose::{Descriptor, Method};

/// Performs the actual network call for a composed request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        method: Method,
        url: &str,
        descriptor: &Descriptor,
    ) -> Result<Response, RouteError>;
}

/// A fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    url: String,
    headers: HashMap<String, String>,
    cookies: HashMap<String, String>,
    body: Vec<u8>,
}

impl Response {
    /// Assemble a response from parts. Header names are stored lowercased;
    /// cookies are parsed out of `set-cookie` values.
    #[must_use]
    pub fn new(status: u16, url: impl Into<String>, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        let mut cookies = HashMap::new();
        let mut stored = HashMap::new();
        for (name, value) in headers {
            let name = name.to_ascii_lowercase();
            if name == "set-cookie"
                && let Some((cookie_name, cookie_value)) =
                    value.split(';').next().and_then(|pair| pair.split_once('='))
            {
                cookies.insert(cookie_name.trim().to_string(), cookie_value.trim().to_string());
            }
            stored.insert(name, value);
        }
        Self {
            status,
            url: url.into(),
            headers: stored,
            cookies,
            body,
        }
    }

    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Look up a header by name, case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    #[must_use]
    pub fn cookies(&self) -> &HashMap<String, String> {
        &self.cookies
    }

    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.body
    }

    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserialize the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::BadResponse`] when the body is not valid JSON
    /// for the requested type.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, RouteError> {
        serde_json::from_slice(&self.body).map_err(|e| RouteError::BadResponse(e.to_string()))
    }
}

/// reqwest-backed transport.
///
/// A client is built per request so descriptor keys that configure the
/// client (`verify`, `proxies`, redirect policy, `cert`) apply to exactly
/// the call that carried them.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpTransport;

impl HttpTransport {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn build_client(descriptor: &Descriptor) -> Result<reqwest::Client, RouteError> {
        let mut builder = reqwest::Client::builder();
        if let Some(value) = descriptor.get("verify")
            && value == &Value::Bool(false)
        {
            builder = builder.danger_accept_invalid_certs(true);
        }
        match descriptor.get("follow_redirects").or_else(|| descriptor.get("allow_redirects")) {
            Some(Value::Bool(false)) => {
                builder = builder.redirect(reqwest::redirect::Policy::none());
            }
            Some(Value::Bool(true)) => {
                builder = builder.redirect(reqwest::redirect::Policy::limited(10));
            }
            _ => {}
        }
        if let Some(proxies) = descriptor.get("proxies") {
            builder = apply_proxies(builder, proxies)?;
        }
        if let Some(Value::String(path)) = descriptor.get("cert") {
            let pem = std::fs::read(path)
                .map_err(|e| RouteError::TransportArgs(format!("reading cert '{path}': {e}")))?;
            let identity = reqwest::Identity::from_pem(&pem)
                .map_err(|e| RouteError::TransportArgs(format!("loading cert '{path}': {e}")))?;
            builder = builder.identity(identity);
        }
        builder
            .build()
            .map_err(|e| RouteError::TransportArgs(format!("building client: {e}")))
    }

    fn build_request(
        client: &reqwest::Client,
        method: Method,
        url: Url,
        descriptor: &Descriptor,
    ) -> Result<reqwest::RequestBuilder, RouteError> {
        let reqwest_method = reqwest::Method::from_bytes(method.as_str().as_bytes())
            .map_err(|e| RouteError::TransportArgs(format!("method '{method}': {e}")))?;
        let mut request = client.request(reqwest_method, url);

        if let Some(params) = descriptor.get("params") {
            let pairs = flatten_pairs("params", params)?;
            request = request.query(&pairs);
        }
        if let Some(headers) = descriptor.get("headers") {
            for (name, value) in flatten_pairs("headers", headers)? {
                request = request.header(name, value);
            }
        }
        if let Some(cookies) = descriptor.get("cookies") {
            let rendered: Vec<String> = flatten_pairs("cookies", cookies)?
                .into_iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            request = request.header(reqwest::header::COOKIE, rendered.join("; "));
        }
        request = apply_auth(request, descriptor.get("auth"))?;
        if let Some(timeout) = descriptor.get("timeout") {
            request = request.timeout(parse_timeout(timeout)?);
        }
        for key in ["stream", "extensions"] {
            if descriptor.contains_key(key) {
                debug!("descriptor key '{key}' is not supported by HttpTransport; ignoring");
            }
        }

        if method.has_body() {
            request = apply_body(request, descriptor)?;
        } else if let Some(content) = descriptor.get("content") {
            request = request.body(render_content(content));
        }
        Ok(request)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        method: Method,
        url: &str,
        descriptor: &Descriptor,
    ) -> Result<Response, RouteError> {
        let url = Url::parse(url)
            .map_err(|e| RouteError::TransportArgs(format!("invalid url '{url}': {e}")))?;
        let client = Self::build_client(descriptor)?;
        let request = Self::build_request(&client, method, url, descriptor)?;

        let response = request.send().await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().await?.to_vec();
        Ok(Response::new(status, final_url, headers, body))
    }
}

/// Render an object value as flat string pairs for query/header/cookie use.
fn flatten_pairs(key: &str, value: &Value) -> Result<Vec<(String, String)>, RouteError> {
    let Value::Object(map) = value else {
        return Err(RouteError::TransportArgs(format!(
            "'{key}' must be an object, got {value}"
        )));
    };
    Ok(map.iter().map(|(k, v)| (k.clone(), render_scalar(v))).collect())
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse `timeout` seconds into a bounded duration. Negative, NaN and
/// overflowing values are all rejected rather than aborting the process.
fn parse_timeout(value: &Value) -> Result<Duration, RouteError> {
    value
        .as_f64()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| {
            RouteError::TransportArgs(format!(
                "timeout must be a non-negative number of seconds, got {value}"
            ))
        })
}

fn render_content(value: &Value) -> Vec<u8> {
    match value {
        Value::String(s) => s.clone().into_bytes(),
        other => other.to_string().into_bytes(),
    }
}

fn apply_auth(
    request: reqwest::RequestBuilder,
    auth: Option<&Value>,
) -> Result<reqwest::RequestBuilder, RouteError> {
    match auth {
        None => Ok(request),
        // A bare string is a bearer token.
        Some(Value::String(token)) => Ok(request.bearer_auth(token)),
        Some(Value::Object(map)) => {
            let username = map.get("username").map(render_scalar).ok_or_else(|| {
                RouteError::TransportArgs("'auth' object requires a 'username'".to_string())
            })?;
            let password = map.get("password").map(render_scalar);
            Ok(request.basic_auth(username, password))
        }
        Some(other) => Err(RouteError::TransportArgs(format!(
            "'auth' must be a string or object, got {other}"
        ))),
    }
}

/// Body precedence for POST/PUT/PATCH: `json`, then `data` (form), then
/// `files` (multipart), then raw `content`.
fn apply_body(
    request: reqwest::RequestBuilder,
    descriptor: &Descriptor,
) -> Result<reqwest::RequestBuilder, RouteError> {
    if let Some(json) = descriptor.get("json") {
        return Ok(request.json(json));
    }
    if let Some(data) = descriptor.get("data") {
        let pairs: HashMap<String, String> = flatten_pairs("data", data)?.into_iter().collect();
        return Ok(request.form(&pairs));
    }
    if let Some(files) = descriptor.get("files") {
        let mut form = reqwest::multipart::Form::new();
        for (name, value) in flatten_pairs("files", files)? {
            form = form.text(name, value);
        }
        return Ok(request.multipart(form));
    }
    if let Some(content) = descriptor.get("content") {
        return Ok(request.body(render_content(content)));
    }
    Ok(request)
}

fn apply_proxies(
    builder: reqwest::ClientBuilder,
    proxies: &Value,
) -> Result<reqwest::ClientBuilder, RouteError> {
    let build = |url: &str| {
        reqwest::Proxy::all(url)
            .map_err(|e| RouteError::TransportArgs(format!("proxy '{url}': {e}")))
    };
    match proxies {
        Value::String(url) => Ok(builder.proxy(build(url)?)),
        Value::Object(map) => {
            let mut builder = builder;
            for (scheme, url) in map {
                let Value::String(url) = url else {
                    return Err(RouteError::TransportArgs(format!(
                        "proxy entry '{scheme}' must be a string url"
                    )));
                };
                let proxy = match scheme.as_str() {
                    "http" => reqwest::Proxy::http(url),
                    "https" => reqwest::Proxy::https(url),
                    _ => reqwest::Proxy::all(url),
                }
                .map_err(|e| RouteError::TransportArgs(format!("proxy '{url}': {e}")))?;
                builder = builder.proxy(proxy);
            }
            Ok(builder)
        }
        other => Err(RouteError::TransportArgs(format!(
            "'proxies' must be a string or object, got {other}"
        ))),
    }
}
