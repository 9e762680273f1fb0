use std::future::Future;

use axum::{
    body::Bytes,
    http::header,
    response::{IntoResponse, Response},
};
use moka::future::Cache;
use serde::Serialize;
use tracing::debug;

use crate::{
    config::CacheConfig,
    error::{Error, Result},
};

/// `(endpoint, caller, params)`: a cached report is never shared between callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReportKey {
    pub endpoint: &'static str,
    pub caller: String,
    pub params: String,
}

impl ReportKey {
    pub fn new(endpoint: &'static str, caller: &str, params: &impl Serialize) -> Result<Self> {
        Ok(Self {
            endpoint,
            caller: caller.to_string(),
            params: serde_json::to_string(params)?,
        })
    }
}

/// Serialized report body, ready to be written out.
#[derive(Debug, Clone)]
pub struct CachedJson(pub Bytes);

impl IntoResponse for CachedJson {
    fn into_response(self) -> Response {
        (
            [(header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())],
            self.0,
        )
            .into_response()
    }
}

/// Memoizes serialized reports for a bounded time. Concurrent requests for the same
/// key wait on one computation.
#[derive(Clone)]
pub struct ReportCache {
    inner: Cache<ReportKey, Bytes>,
}

impl ReportCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(config.capacity)
                .time_to_live(config.ttl())
                .build(),
        }
    }

    pub async fn get_or_compute<T, F>(&self, key: ReportKey, compute: F) -> Result<CachedJson>
    where
        T: Serialize,
        F: Future<Output = Result<T>>,
    {
        debug!("report cache lookup: {:?}", key);
        self.inner
            .try_get_with(key, async move {
                let report = compute.await?;
                Ok::<_, Error>(Bytes::from(serde_json::to_vec(&report)?))
            })
            .await
            .map(CachedJson)
            .map_err(Error::Cached)
    }
}
