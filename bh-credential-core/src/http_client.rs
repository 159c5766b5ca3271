// Copyright (C) 2020-2025  The Blockhouse Technology Limited (TBTL).
//
// This program is free software: you can redistribute it and/or modify it
// under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// This program is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public
// License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! The HTTP contract consumed by parsers, resolvers and the renderer.

use std::future::Future;

use bherror::{traits::ForeignError as _, Error, Result};
pub use http::{HeaderMap, StatusCode};
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::FetchError;

/// Response returned by an [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code of the response.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Raw response body.
    pub data: Vec<u8>,
}

impl HttpResponse {
    async fn from_reqwest(response: reqwest::Response) -> reqwest::Result<Self> {
        let status = response.status();
        let headers = response.headers().clone();
        let data = response.bytes().await?.to_vec();

        Ok(Self {
            status,
            headers,
            data,
        })
    }

    /// Returns the body of a `200 OK` response with a non-empty body.
    pub fn into_ok_data(self, url: &str) -> Result<Vec<u8>, FetchError> {
        if self.status != StatusCode::OK {
            return Err(Error::root(FetchError::UnexpectedStatus(
                self.status.as_u16(),
                url.to_owned(),
            )));
        }

        if self.data.is_empty() {
            return Err(Error::root(FetchError::InvalidBody(url.to_owned())));
        }

        Ok(self.data)
    }
}

/// Interface providing functionality of sending HTTP requests.
///
/// The core never builds its own connections, so an implementation can
/// restrict the reachable hosts, impose timeouts or retry as it sees fit.
pub trait HttpClient: Send + Sync {
    /// Error type used by this trait.
    type Err: std::error::Error + Send + Sync + 'static;

    /// Performs an HTTP GET request to `url`.
    fn get(
        &self,
        url: &str,
        headers: HeaderMap,
    ) -> impl Future<Output = std::result::Result<HttpResponse, Self::Err>> + Send;

    /// Performs an HTTP POST request to `url` with the given `body`.
    fn post(
        &self,
        url: &str,
        body: Vec<u8>,
        headers: HeaderMap,
    ) -> impl Future<Output = std::result::Result<HttpResponse, Self::Err>> + Send;
}

/// [`HttpClient`] implementation using the [`reqwest`] crate.
#[derive(Debug, Clone, Default)]
pub struct ReqwestHttpClient(Client);

impl ReqwestHttpClient {
    /// Construct [`ReqwestHttpClient`] from [`Client`].
    pub fn new(client: Client) -> Self {
        Self(client)
    }
}

impl HttpClient for ReqwestHttpClient {
    type Err = reqwest::Error;

    fn get(
        &self,
        url: &str,
        headers: HeaderMap,
    ) -> impl Future<Output = reqwest::Result<HttpResponse>> + Send {
        let request = self.0.get(url).headers(headers);
        async move { HttpResponse::from_reqwest(request.send().await?).await }
    }

    fn post(
        &self,
        url: &str,
        body: Vec<u8>,
        headers: HeaderMap,
    ) -> impl Future<Output = reqwest::Result<HttpResponse>> + Send {
        let request = self.0.post(url).headers(headers).body(body);
        async move { HttpResponse::from_reqwest(request.send().await?).await }
    }
}

/// Fetches `url` and returns the body of a successful response.
///
/// Transport failures, non-`200` statuses and empty bodies are all reported
/// as [`FetchError`]s.
pub async fn fetch<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>, FetchError> {
    tracing::debug!(url, "fetching remote document");

    client
        .get(url, HeaderMap::new())
        .await
        .foreign_err(|| FetchError::RequestFailed(url.to_owned()))?
        .into_ok_data(url)
}

/// Fetches `url` and deserializes the body of a successful response as JSON.
pub async fn fetch_json<C, T>(client: &C, url: &str) -> Result<T, FetchError>
where
    C: HttpClient,
    T: DeserializeOwned,
{
    let data = fetch(client, url).await?;

    serde_json::from_slice(&data).foreign_err(|| FetchError::InvalidBody(url.to_owned()))
}
