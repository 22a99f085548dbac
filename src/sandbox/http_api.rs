//! HTTP capability handed to scripts.
//!
//! Scripts run on a blocking thread; each call blocks on the host's
//! [`HttpFetch`] through the runtime handle and is capped by what is left of
//! the invocation deadline.

use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use rhai::{Blob, Dynamic, EvalAltResult, Map as ScriptMap};
use tokio::runtime::Handle;
use tracing::debug;

use super::convert::{dynamic_to_json, json_to_dynamic, script_error};
use super::promise::ScriptPromise;
use crate::resolver::{HttpFetch, HttpRequest, HttpResponse};

type ScriptResult<T> = Result<T, Box<EvalAltResult>>;

#[derive(Clone)]
pub(crate) struct ScriptHttp {
    fetch: Arc<dyn HttpFetch>,
    runtime: Handle,
    deadline: Instant,
    parser_type: Arc<str>,
    default_headers: Arc<Mutex<Vec<(String, String)>>>,
}

impl ScriptHttp {
    pub(crate) fn new(
        fetch: Arc<dyn HttpFetch>,
        runtime: Handle,
        deadline: Instant,
        parser_type: &str,
    ) -> Self {
        Self {
            fetch,
            runtime,
            deadline,
            parser_type: Arc::from(parser_type),
            default_headers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Adds a header sent with every later request of this invocation.
    pub(crate) fn put_header(&self, name: &str, value: &str) {
        let mut headers = self
            .default_headers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        headers.push((name.to_string(), value.to_string()));
    }

    pub(crate) fn get(&self, url: &str) -> ScriptResult<ScriptResponse> {
        self.send(HttpRequest::get(url))
    }

    pub(crate) fn get_no_redirect(&self, url: &str) -> ScriptResult<ScriptResponse> {
        self.send(HttpRequest::get(url).no_redirect())
    }

    pub(crate) fn post(&self, url: &str, body: &str) -> ScriptResult<ScriptResponse> {
        self.send(HttpRequest::post(url, body))
    }

    pub(crate) fn post_json(&self, url: &str, data: &Dynamic) -> ScriptResult<ScriptResponse> {
        let body = serde_json::to_string(&dynamic_to_json(data))
            .map_err(|error| script_error(format!("cannot encode JSON body: {error}")))?;
        self.send(HttpRequest::post(url, body).header("Content-Type", "application/json"))
    }

    pub(crate) fn post_form(&self, url: &str, fields: &ScriptMap) -> ScriptResult<ScriptResponse> {
        let body = fields
            .iter()
            .map(|(key, value)| {
                format!(
                    "{}={}",
                    urlencoding::encode(key),
                    urlencoding::encode(&value.to_string())
                )
            })
            .collect::<Vec<_>>()
            .join("&");
        self.send(
            HttpRequest::post(url, body)
                .header("Content-Type", "application/x-www-form-urlencoded"),
        )
    }

    /// `multipart/form-data` POST. Strings and other scalars become text
    /// fields, blobs become `application/octet-stream` file parts named after
    /// their field, and `()` values are skipped.
    pub(crate) fn post_multipart(
        &self,
        url: &str,
        fields: &ScriptMap,
    ) -> ScriptResult<ScriptResponse> {
        let boundary = multipart_boundary();
        let mut body = String::new();
        for (key, value) in fields {
            if value.is_unit() {
                continue;
            }
            let name = key.replace('"', "%22");
            let _ = write!(body, "--{boundary}\r\n");
            if let Some(bytes) = value.clone().try_cast::<Blob>() {
                let content = String::from_utf8(bytes).map_err(|_| {
                    script_error(format!("multipart field '{key}' is not valid UTF-8"))
                })?;
                let _ = write!(
                    body,
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{name}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n{content}\r\n"
                );
            } else {
                let _ = write!(
                    body,
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                );
            }
        }
        let _ = write!(body, "--{boundary}--\r\n");
        self.send(HttpRequest::post(url, body).header(
            "Content-Type",
            format!("multipart/form-data; boundary={boundary}"),
        ))
    }

    /// Generic request; an empty body sends none.
    pub(crate) fn request(
        &self,
        method: &str,
        url: &str,
        headers: &ScriptMap,
        body: &str,
    ) -> ScriptResult<ScriptResponse> {
        let mut request = HttpRequest::new(method, url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.to_string());
        }
        if !body.is_empty() {
            request = request.body(body);
        }
        self.send(request)
    }

    /// Non-blocking style GET: returns a promise already settled with the
    /// response, or rejected with the error message.
    pub(crate) fn get_async(&self, url: &str) -> ScriptPromise {
        match self.get(url) {
            Ok(response) => ScriptPromise::fulfilled(Dynamic::from(response)),
            Err(error) => ScriptPromise::rejected(match *error {
                EvalAltResult::ErrorRuntime(value, _) => value,
                other => Dynamic::from(other.to_string()),
            }),
        }
    }

    fn send(&self, mut request: HttpRequest) -> ScriptResult<ScriptResponse> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(script_error(format!(
                "HTTP {} {} not sent: script deadline reached",
                request.method, request.url
            )));
        }

        let defaults = self
            .default_headers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let explicit = std::mem::take(&mut request.headers);
        for (name, value) in defaults.into_iter().chain(explicit) {
            request = request.header(name, value);
        }
        request = request.timeout(remaining);

        debug!(
            parser_type = %self.parser_type,
            method = %request.method,
            url = %request.url,
            "Script HTTP request"
        );
        let label = format!("HTTP {} {}", request.method, request.url);
        self.runtime
            .block_on(self.fetch.execute(request))
            .map(ScriptResponse::new)
            .map_err(|error| script_error(format!("{label} failed: {error}")))
    }
}

fn multipart_boundary() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_nanos());
    format!("----sharelink{nanos:x}")
}

/// Response handed back to scripts.
#[derive(Clone, Debug)]
pub(crate) struct ScriptResponse(Arc<HttpResponse>);

impl ScriptResponse {
    pub(crate) fn new(response: HttpResponse) -> Self {
        Self(Arc::new(response))
    }

    pub(crate) fn status(&self) -> i64 {
        i64::from(self.0.status)
    }

    pub(crate) fn body(&self) -> String {
        self.0.body.clone()
    }

    pub(crate) fn header(&self, name: &str) -> Dynamic {
        self.0
            .header(name)
            .map_or(Dynamic::UNIT, |value| Dynamic::from(value.to_string()))
    }

    pub(crate) fn headers(&self) -> ScriptMap {
        let mut map = ScriptMap::new();
        for (name, value) in &self.0.headers {
            map.entry(name.to_ascii_lowercase().into())
                .or_insert_with(|| Dynamic::from(value.clone()));
        }
        map
    }

    pub(crate) fn is_success(&self) -> bool {
        self.0.is_success()
    }

    pub(crate) fn json(&self) -> ScriptResult<Dynamic> {
        let value: serde_json::Value = self
            .0
            .json()
            .map_err(|error| script_error(format!("response body is not JSON: {error}")))?;
        Ok(json_to_dynamic(&value))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::resolver::HttpError;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Echoes the request back in the body as `METHOD URL|headers|body`.
    struct Echo;

    #[async_trait]
    impl HttpFetch for Echo {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
            let headers: Vec<String> = request
                .headers
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            Ok(HttpResponse {
                status: if request.follow_redirects { 200 } else { 302 },
                headers: vec![("Content-Type".into(), "text/plain".into())],
                body: format!(
                    "{} {}|{}|{}",
                    request.method,
                    request.url,
                    headers.join(","),
                    request.body.unwrap_or_default()
                ),
            })
        }
    }

    fn http(deadline: Instant) -> (tokio::runtime::Runtime, ScriptHttp) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let http = ScriptHttp::new(Arc::new(Echo), runtime.handle().clone(), deadline, "demo");
        (runtime, http)
    }

    #[test]
    fn test_default_headers_apply_and_explicit_headers_win() {
        let (_runtime, http) = http(Instant::now() + Duration::from_secs(10));
        http.put_header("Referer", "https://a.example");
        http.put_header("X-Token", "t1");

        let mut headers = ScriptMap::new();
        headers.insert("x-token".into(), Dynamic::from("t2".to_string()));
        let response = http
            .request("put", "https://api.example/x", &headers, "payload")
            .unwrap();
        assert_eq!(
            response.body(),
            "PUT https://api.example/x|Referer=https://a.example,x-token=t2|payload"
        );
    }

    #[test]
    fn test_get_no_redirect_and_header_lookup() {
        let (_runtime, http) = http(Instant::now() + Duration::from_secs(10));
        let response = http.get_no_redirect("https://a.example/r").unwrap();
        assert_eq!(response.status(), 302);
        assert!(!response.is_success());
        assert_eq!(
            response.header("content-type").into_string().unwrap(),
            "text/plain"
        );
        assert!(response.header("location").is_unit());
    }

    #[test]
    fn test_post_form_encodes_fields() {
        let (_runtime, http) = http(Instant::now() + Duration::from_secs(10));
        let mut fields = ScriptMap::new();
        fields.insert("a".into(), Dynamic::from("x y".to_string()));
        fields.insert("b".into(), Dynamic::from(2_i64));
        let response = http.post_form("https://a.example/f", &fields).unwrap();
        assert!(response.body().ends_with("|a=x%20y&b=2"), "{}", response.body());
        assert!(response.body().contains("Content-Type=application/x-www-form-urlencoded"));
    }

    #[test]
    fn test_post_multipart_builds_parts() {
        let (_runtime, http) = http(Instant::now() + Duration::from_secs(10));
        let mut fields = ScriptMap::new();
        fields.insert("token".into(), Dynamic::from("abc".to_string()));
        fields.insert("page".into(), Dynamic::from(2_i64));
        fields.insert("skipped".into(), Dynamic::UNIT);
        fields.insert("file".into(), Dynamic::from_blob(b"hello".to_vec()));
        let body = http
            .post_multipart("https://a.example/upload", &fields)
            .unwrap()
            .body();

        let (head, payload) = body.split_once("|--").unwrap();
        let boundary = head
            .split("boundary=")
            .nth(1)
            .and_then(|rest| rest.split([',', '|']).next())
            .unwrap();
        assert!(head.starts_with("POST https://a.example/upload|"));
        assert!(payload.starts_with(&format!("{boundary}\r\n")));
        assert!(payload.contains("name=\"token\"\r\n\r\nabc\r\n"));
        assert!(payload.contains("name=\"page\"\r\n\r\n2\r\n"));
        assert!(payload.contains(
            "name=\"file\"; filename=\"file\"\r\nContent-Type: application/octet-stream\r\n\r\nhello\r\n"
        ));
        assert!(!payload.contains("skipped"));
        assert!(payload.ends_with(&format!("{boundary}--\r\n")));
    }

    #[test]
    fn test_post_multipart_rejects_binary_blob() {
        let (_runtime, http) = http(Instant::now() + Duration::from_secs(10));
        let mut fields = ScriptMap::new();
        fields.insert("raw".into(), Dynamic::from_blob(vec![0xff, 0xfe]));
        let err = http.post_multipart("https://a.example/upload", &fields).unwrap_err();
        assert!(err.to_string().contains("not valid UTF-8"), "{err}");
    }

    #[test]
    fn test_expired_deadline_refuses_request() {
        let (_runtime, http) = http(Instant::now());
        let err = http.get("https://a.example").unwrap_err();
        assert!(err.to_string().contains("deadline"));
        assert!(http.get_async("https://a.example").outcome().unwrap().is_err());
    }

    #[test]
    fn test_json_parses_body() {
        let response = ScriptResponse::new(HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: r#"{"data":{"url":"https://cdn.example/f"}}"#.into(),
        });
        let value = response.json().unwrap();
        let map = value.try_cast::<ScriptMap>().unwrap();
        assert!(map.contains_key("data"));
        let bad = ScriptResponse::new(HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: "<html>".into(),
        });
        assert!(bad.json().is_err());
    }
}
