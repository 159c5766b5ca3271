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

//! In-memory [`HttpClient`] for tests of the crates built on top of this one.

use std::{
    collections::HashMap,
    future::{ready, Future},
    sync::{Arc, Mutex},
};

use serde_json::Value;

use crate::{HeaderMap, HttpClient, HttpResponse, StatusCode};

/// [`HttpClient`] serving canned responses from memory.
///
/// Requests to unknown URLs get an empty `404 Not Found` response. Clones
/// share the request log.
#[derive(Debug, Clone, Default)]
pub struct StubHttpClient {
    responses: HashMap<String, (StatusCode, Vec<u8>)>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubHttpClient {
    /// Creates a client without any response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `body` with the given `status` on `url`.
    pub fn with_response(mut self, url: &str, status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        self.responses
            .insert(url.to_owned(), (status, body.into()));
        self
    }

    /// Serves the serialized `json` with `200 OK` on `url`.
    pub fn with_json(self, url: &str, json: &Value) -> Self {
        let body = serde_json::to_vec(json).unwrap();
        self.with_response(url, StatusCode::OK, body)
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn respond(&self, url: &str) -> HttpResponse {
        self.requests.lock().unwrap().push(url.to_owned());

        let (status, data) = self
            .responses
            .get(url)
            .cloned()
            .unwrap_or((StatusCode::NOT_FOUND, Vec::new()));

        HttpResponse {
            status,
            headers: HeaderMap::new(),
            data,
        }
    }
}

impl HttpClient for StubHttpClient {
    type Err = std::io::Error;

    fn get(
        &self,
        url: &str,
        _headers: HeaderMap,
    ) -> impl Future<Output = std::io::Result<HttpResponse>> + Send {
        ready(Ok(self.respond(url)))
    }

    fn post(
        &self,
        url: &str,
        _body: Vec<u8>,
        _headers: HeaderMap,
    ) -> impl Future<Output = std::io::Result<HttpResponse>> + Send {
        ready(Ok(self.respond(url)))
    }
}
