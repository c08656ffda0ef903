//! Response-like values returned by fetch operations.
//!
//! A fetch operation does not hand the query its data directly. It resolves to
//! a response whose body is parsed afterwards with [`FetchResponse::json`].
//! Both steps can fail independently.

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::query::QueryError;

/// A response whose body can be parsed as JSON.
pub trait FetchResponse: Send + 'static {
    /// Parses the body into `T`.
    fn json<T>(self) -> BoxFuture<'static, Result<T, QueryError>>
    where
        T: DeserializeOwned + Send + 'static;
}

/// An in-memory response carrying a status code and a raw body.
///
/// # Example
///
/// ```
/// use stale_query::response::{FetchResponse, JsonResponse};
///
/// # futures::executor::block_on(async {
/// let response = JsonResponse::ok(&vec![1, 2, 3]).unwrap();
/// let parsed: Vec<u32> = response.json().await.unwrap();
/// assert_eq!(parsed, vec![1, 2, 3]);
/// # });
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonResponse {
    status: u16,
    body: Vec<u8>,
}

impl JsonResponse {
    /// Creates a response from a status code and a raw body.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Serializes `value` into a `200 OK` response.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::ParseError`] if `value` cannot be serialized.
    pub fn ok<T: Serialize + ?Sized>(value: &T) -> Result<Self, QueryError> {
        Self::with_status(200, value)
    }

    /// Serializes `value` into a response with the given status.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::ParseError`] if `value` cannot be serialized.
    pub fn with_status<T: Serialize + ?Sized>(status: u16, value: &T) -> Result<Self, QueryError> {
        let body = serde_json::to_vec(value).map_err(|e| QueryError::ParseError(e.to_string()))?;
        Ok(Self::new(status, body))
    }

    /// Returns the status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Returns the raw body.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

impl FetchResponse for JsonResponse {
    fn json<T>(self) -> BoxFuture<'static, Result<T, QueryError>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        async move {
            serde_json::from_slice(&self.body).map_err(|e| QueryError::ParseError(e.to_string()))
        }
        .boxed()
    }
}

#[cfg(feature = "http")]
impl FetchResponse for reqwest::Response {
    fn json<T>(self) -> BoxFuture<'static, Result<T, QueryError>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        async move {
            Self::json::<T>(self)
                .await
                .map_err(|e| QueryError::ParseError(e.to_string()))
        }
        .boxed()
    }
}
