//! Network primitive.
//!
//! [`Fetch`] is the single capability through which the bridge talks to the
//! arena. [`HttpFetch`] implements it with a `reqwest` client that owns the
//! session cookie jar, so calls carry the browsing context's credentials.
//!
//! When a cookie file is watched, it is re-read before every call and any
//! changed cookies are written into the jar. Cookies removed from the file
//! stay in the jar until the bridge is rebuilt.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use parking_lot::Mutex;
use reqwest::cookie::Jar;
use reqwest::{Client, Method};
use tracing::{info, trace, warn};
use url::Url;

use crate::error::{Error, Result};

use super::cookies::{Cookie, add_to_jar, build_jar};

// ============================================================================
// Types
// ============================================================================

/// Response body as a stream of byte reads.
pub type BodyStream = BoxStream<'static, Result<Vec<u8>>>;

// ============================================================================
// FetchRequest
// ============================================================================

/// An outbound network call.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// HTTP method.
    pub method: Method,
    /// Target URL.
    pub url: Url,
    /// Extra request headers.
    pub headers: Vec<(&'static str, String)>,
    /// Request body.
    pub body: Option<String>,
}

impl FetchRequest {
    /// Creates a GET request.
    #[inline]
    #[must_use]
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Creates a POST request with a body.
    #[inline]
    #[must_use]
    pub fn post(url: Url, body: impl Into<String>) -> Self {
        Self {
            method: Method::POST,
            url,
            headers: Vec::new(),
            body: Some(body.into()),
        }
    }

    /// Adds a header.
    #[inline]
    #[must_use]
    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

// ============================================================================
// FetchResponse
// ============================================================================

/// The response to a [`FetchRequest`], body not yet read.
pub struct FetchResponse {
    /// HTTP status code.
    pub status: u16,
    /// Streamed body.
    pub body: BodyStream,
}

impl fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl FetchResponse {
    /// Returns `true` for a 2xx status.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Reads the whole body as (lossy) UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns the first read error of the body stream.
    pub async fn text(self) -> Result<String> {
        let bytes: Vec<u8> = self
            .body
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok::<_, Error>(acc)
            })
            .await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

// ============================================================================
// Fetch
// ============================================================================

/// The network-call capability of the browsing context.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Issues a call and returns once response headers are received.
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse>;
}

#[async_trait]
impl<F: Fetch + ?Sized> Fetch for Arc<F> {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        (**self).fetch(request).await
    }
}

// ============================================================================
// HttpFetch
// ============================================================================

/// [`Fetch`] backed by a `reqwest` client with the arena cookie jar.
#[derive(Debug, Clone)]
pub struct HttpFetch {
    client: Client,
    /// Jar shared with the client.
    jar: Arc<Jar>,
    /// Arena origin the cookies are scoped to.
    base_url: Url,
    /// Cookie file re-read before each call.
    cookie_file: Option<Arc<CookieFile>>,
}

/// A watched cookie header file and the cookies last applied from it.
#[derive(Debug)]
struct CookieFile {
    path: PathBuf,
    applied: Mutex<Vec<Cookie>>,
}

impl HttpFetch {
    /// Creates the client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Arena origin the cookies are scoped to
    /// * `cookies` - Session cookies
    /// * `user_agent` - User agent sent on every call
    /// * `timeout` - Limit on connecting and on each wait for body bytes.
    ///   A stream that keeps producing bytes may run for any length of time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the client cannot be built.
    pub fn new(
        base_url: &Url,
        cookies: &[Cookie],
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let jar = Arc::new(build_jar(cookies, base_url));
        let client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .user_agent(user_agent)
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            jar,
            base_url: base_url.clone(),
            cookie_file: None,
        })
    }

    /// Re-reads `path` before every call.
    #[must_use]
    pub fn watch_cookie_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cookie_file = Some(Arc::new(CookieFile {
            path: path.into(),
            applied: Mutex::new(Vec::new()),
        }));
        self
    }

    /// Applies the watched cookie file to the jar if its cookies changed.
    ///
    /// Returns `true` when the jar was updated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] / [`Error::Config`] if the file cannot be used;
    /// the jar is left as it was.
    pub fn refresh_cookies(&self) -> Result<bool> {
        let Some(file) = &self.cookie_file else {
            return Ok(false);
        };

        let cookies = Cookie::load_file(&file.path)?;
        let mut applied = file.applied.lock();
        if *applied == cookies {
            return Ok(false);
        }

        add_to_jar(&self.jar, &cookies, &self.base_url);
        info!(
            path = %file.path.display(),
            count = cookies.len(),
            "Session cookies applied from file"
        );
        *applied = cookies;
        Ok(true)
    }
}

#[async_trait]
impl Fetch for HttpFetch {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        trace!(method = %request.method, url = %request.url, "Issuing call");

        if let Err(e) = self.refresh_cookies() {
            warn!(error = %e, "Cookie file reload failed, keeping current cookies");
        }

        let mut builder = self.client.request(request.method, request.url);
        for (name, value) in request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(Error::from))
            .boxed();

        Ok(FetchResponse { status, body })
    }
}

// ============================================================================
// Tests
// ============================================================================
