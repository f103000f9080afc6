// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::cmp::Ordering;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::future;
use std::mem;
use std::pin::Pin;
use std::str::FromStr;
use std::task::ready;
use std::task::Context;
use std::task::Poll;

use bytes::Bytes;
use bytes::BytesMut;
use futures::Stream;
use futures::StreamExt;
use futures::TryStreamExt;
use http::header::HeaderMap;
use http::header::CONTENT_ENCODING;
use http::header::CONTENT_LENGTH;
use http::Request;
use http::Response;

use crate::error::Error;
use crate::error::ErrorKind;
use crate::error::Result;

/// Body used in async HTTP requests.
#[derive(Debug, Clone)]
pub enum AsyncBody {
    /// An empty body.
    Empty,
    /// Body with bytes.
    Bytes(Bytes),
}

/// HttpClient that used across kodofs.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

/// We don't want users to know details about our clients.
impl Debug for HttpClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient").finish()
    }
}

impl HttpClient {
    /// Create a new http client.
    pub fn new() -> Result<Self> {
        let client = reqwest::ClientBuilder::new().build().map_err(|err| {
            Error::new(ErrorKind::Unexpected, "http client build failed")
                .with_operation("HttpClient::new")
                .set_source(err)
        })?;

        Ok(Self { client })
    }

    /// Construct `Self` with given [`reqwest::Client`].
    ///
    /// Callers can tune timeout, proxy and tls behavior on the client
    /// before handing it over.
    pub fn with(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Send a request and consume its response into memory.
    pub async fn send(&self, req: Request<AsyncBody>) -> Result<Response<Bytes>> {
        let (parts, body) = self.fetch(req).await?.into_parts();
        let bs = body.to_bytes().await?;
        Ok(Response::from_parts(parts, bs))
    }

    /// Fetch a request and return a streamable [`HttpBody`].
    pub async fn fetch(&self, req: Request<AsyncBody>) -> Result<Response<HttpBody>> {
        // Uri stores all string alike data in `Bytes` which means
        // the clone here is cheap.
        let uri = req.uri().clone();
        let is_head = req.method() == http::Method::HEAD;

        let (parts, body) = req.into_parts();

        let mut req_builder = self
            .client
            .request(
                parts.method,
                reqwest::Url::from_str(&uri.to_string()).expect("input request url must be valid"),
            )
            .version(parts.version)
            .headers(parts.headers);

        // Don't set body if body is empty.
        if let AsyncBody::Bytes(bs) = body {
            if !bs.is_empty() {
                req_builder = req_builder.body(reqwest::Body::from(bs));
            }
        }

        let mut resp = req_builder.send().await.map_err(|err| {
            Error::new(ErrorKind::Unexpected, "send http request")
                .with_operation("HttpClient::fetch")
                .with_context("url", uri.to_string())
                .with_temporary(is_temporary_error(&err))
                .set_source(err)
        })?;

        // Get content length from header so that we can check it.
        //
        // - If the request method is HEAD, we will ignore content length.
        // - If response contains content_encoding, we should omit its content length.
        let content_length = if is_head || parse_content_encoding(resp.headers())?.is_some() {
            None
        } else {
            parse_content_length(resp.headers())?
        };

        let mut hr = Response::builder()
            .status(resp.status())
            .version(resp.version())
            // Insert uri into response extension so that we can fetch
            // it later.
            .extension(uri.clone());

        // Swap headers directly instead of copy the entire map.
        mem::swap(hr.headers_mut().unwrap(), resp.headers_mut());

        let stream = resp
            .bytes_stream()
            .try_filter(|v| future::ready(!v.is_empty()))
            .map_err(move |err| {
                Error::new(ErrorKind::Unexpected, "read data from http response")
                    .with_operation("HttpClient::fetch")
                    .with_context("url", uri.to_string())
                    .with_temporary(is_temporary_error(&err))
                    .set_source(err)
            });

        let bs = HttpBody::new(stream, content_length);

        let resp = hr.body(bs).expect("response must build succeed");
        Ok(resp)
    }
}

#[inline]
fn is_temporary_error(err: &reqwest::Error) -> bool {
    // error sending request
    err.is_request()||
    // request or response body error
    err.is_body() ||
    // error decoding response body, for example, connection reset.
    err.is_decode()
}

/// The streaming body that [`HttpClient`] returned.
///
/// `HttpBody` is a [`Stream`] of [`Bytes`]. The stream checks the consumed
/// size against the response's `Content-Length` when it finishes, so a
/// truncated transfer surfaces as an error instead of a short read.
pub struct HttpBody {
    stream: Box<dyn Stream<Item = Result<Bytes>> + Send + Sync + Unpin + 'static>,
    size: Option<u64>,
    consumed: u64,
    finished: bool,
}

impl HttpBody {
    /// Create a new `HttpBody` with given stream and optional size.
    pub fn new<S>(stream: S, size: Option<u64>) -> Self
    where
        S: Stream<Item = Result<Bytes>> + Send + Sync + Unpin + 'static,
    {
        HttpBody {
            stream: Box::new(stream),
            size,
            consumed: 0,
            finished: false,
        }
    }

    /// Check if the consumed data is equal to the expected content length.
    #[inline]
    fn check(&self) -> Result<()> {
        let Some(expect) = self.size else {
            return Ok(());
        };

        let actual = self.consumed;
        match actual.cmp(&expect) {
            Ordering::Equal => Ok(()),
            Ordering::Less => Err(Error::new(
                ErrorKind::Unexpected,
                format!("http response got too little data, expect: {expect}, actual: {actual}"),
            )
            .set_temporary()),
            Ordering::Greater => Err(Error::new(
                ErrorKind::Unexpected,
                format!("http response got too much data, expect: {expect}, actual: {actual}"),
            )
            .set_temporary()),
        }
    }

    /// Read all remaining data from the body.
    pub async fn to_bytes(mut self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        while let Some(bs) = self.next().await.transpose()? {
            buf.extend_from_slice(&bs);
        }
        Ok(buf.freeze())
    }
}

impl Stream for HttpBody {
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        match ready!(Pin::new(&mut self.stream).poll_next(cx)) {
            Some(Ok(bs)) => {
                self.consumed += bs.len() as u64;
                Poll::Ready(Some(Ok(bs)))
            }
            Some(Err(err)) => {
                self.finished = true;
                Poll::Ready(Some(Err(err)))
            }
            None => {
                self.finished = true;
                match self.check() {
                    Ok(()) => Poll::Ready(None),
                    Err(err) => Poll::Ready(Some(Err(err))),
                }
            }
        }
    }
}

/// Parse content length from header map.
pub(crate) fn parse_content_length(headers: &HeaderMap) -> Result<Option<u64>> {
    headers
        .get(CONTENT_LENGTH)
        .map(|v| {
            let v = v.to_str().map_err(|e| {
                Error::new(ErrorKind::Unexpected, "header value has to be valid utf-8 string")
                    .set_source(e)
            })?;
            v.parse::<u64>().map_err(|e| {
                Error::new(ErrorKind::Unexpected, "header value is not valid integer").set_source(e)
            })
        })
        .transpose()
}

/// Parse content encoding from header map.
pub(crate) fn parse_content_encoding(headers: &HeaderMap) -> Result<Option<&str>> {
    headers
        .get(CONTENT_ENCODING)
        .map(|v| {
            v.to_str().map_err(|e| {
                Error::new(ErrorKind::Unexpected, "header value has to be valid utf-8 string")
                    .set_source(e)
            })
        })
        .transpose()
}
