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

use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Write;
use std::time::Duration;

use base64::engine::general_purpose;
use base64::Engine;
use bytes::Bytes;
use chrono::DateTime;
use chrono::Utc;
use http::header;
use http::header::CONTENT_DISPOSITION;
use http::header::CONTENT_TYPE;
use http::Request;
use http::Response;
use http::StatusCode;
use serde::Deserialize;

use crate::client::AsyncBody;
use crate::client::HttpBody;
use crate::client::HttpClient;
use crate::error::new_json_deserialize_error;
use crate::error::new_request_build_error;
use crate::error::parse_error;
use crate::error::Error;
use crate::error::ErrorKind;
use crate::error::Result;
use crate::multipart::FormDataPart;
use crate::multipart::Multipart;
use crate::path::build_abs_path;
use crate::path::get_basename;
use crate::path::percent_encode_path;
use crate::signer::KodoSigner;
use crate::signer::PutPolicy;

pub(crate) mod constants {
    use std::time::Duration;

    pub const DEFAULT_RS_ENDPOINT: &str = "https://rs.qiniuapi.com";
    pub const DEFAULT_RSF_ENDPOINT: &str = "https://rsf.qiniuapi.com";
    pub const DEFAULT_UP_ENDPOINT: &str = "https://upload.qiniup.com";
    pub const DEFAULT_DOMAIN_SUFFIX: &str = "qiniudn.com";

    /// Kodo caps one list page at 1000 items.
    pub const LIST_MAX_LIMIT: usize = 1000;
    /// Lifetime of the upload token signed for each form upload.
    pub const UPLOAD_TOKEN_TTL: u64 = 3600;
    /// Lifetime of the URLs signed for plain reads.
    pub const DEFAULT_SIGNED_URL_TTL: Duration = Duration::from_secs(3600);
}

/// KodoCore carries the signed request layer shared by all operations.
///
/// Kodo splits its API over three hosts: `rs` for single object management,
/// `rsf` for listing and `up` for uploads. Downloads go through the bucket's
/// bound domain instead and are authorized by signed URL rather than header.
#[derive(Clone)]
pub struct KodoCore {
    /// The root of this core.
    pub root: String,
    /// The bucket of this backend.
    pub bucket: String,
    /// The bound download domain of this backend.
    pub domain: String,
    /// Scheme of download URLs, `http` or `https`.
    pub scheme: &'static str,

    pub rs_endpoint: String,
    pub rsf_endpoint: String,
    pub up_endpoint: String,

    /// Signer of this backend.
    pub signer: KodoSigner,
    pub client: HttpClient,
}

impl Debug for KodoCore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KodoCore")
            .field("root", &self.root)
            .field("bucket", &self.bucket)
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

impl KodoCore {
    #[inline]
    pub async fn send(&self, req: Request<AsyncBody>) -> Result<Response<Bytes>> {
        self.client.send(req).await
    }

    /// Encode `bucket:key` the way Kodo's management APIs address entries.
    pub fn encode_entry(&self, key: &str) -> String {
        general_purpose::URL_SAFE.encode(format!("{}:{}", self.bucket, key))
    }

    /// Sign a management request with the QBox scheme.
    ///
    /// `sign_body` must be set for form encoded bodies, which Kodo includes
    /// in the signature data.
    pub fn sign(&self, req: &mut Request<AsyncBody>, sign_body: bool) -> Result<()> {
        let path_and_query = req
            .uri()
            .path_and_query()
            .map(|v| v.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        let body = if sign_body {
            match req.body() {
                AsyncBody::Bytes(bs) => Some(bs.clone()),
                AsyncBody::Empty => None,
            }
        } else {
            None
        };

        let authorization = self.signer.authorization(&path_and_query, body.as_deref());

        req.headers_mut()
            .insert(header::AUTHORIZATION, authorization.parse().unwrap());

        Ok(())
    }

    pub async fn stat_object(&self, path: &str) -> Result<StatObjectResponse> {
        let p = build_abs_path(&self.root, path);

        let url = format!("{}/stat/{}", self.rs_endpoint, self.encode_entry(&p));

        let mut req = Request::get(&url)
            .body(AsyncBody::Empty)
            .map_err(new_request_build_error)?;

        self.sign(&mut req, false)?;

        let resp = self.send(req).await?;
        match resp.status() {
            StatusCode::OK => {
                serde_json::from_slice(resp.body()).map_err(new_json_deserialize_error)
            }
            _ => Err(parse_error(resp)),
        }
    }

    /// Construct one list page request.
    ///
    /// Kodo's list API distinguishes an absent parameter from an empty one,
    /// so empty prefix, delimiter and marker as well as a zero limit are
    /// omitted from the query entirely.
    pub fn list_objects_request(
        &self,
        path: &str,
        marker: &str,
        delimiter: &str,
        limit: Option<usize>,
    ) -> Result<Request<AsyncBody>> {
        let p = build_abs_path(&self.root, path);

        let mut url = format!("{}/list?bucket={}", self.rsf_endpoint, self.bucket);

        if !p.is_empty() {
            write!(url, "&prefix={}", percent_encode_path(&p))
                .expect("write into string must succeed");
        }

        if !delimiter.is_empty() {
            write!(url, "&delimiter={delimiter}").expect("write into string must succeed");
        }

        if !marker.is_empty() {
            write!(url, "&marker={}", percent_encode_path(marker))
                .expect("write into string must succeed");
        }

        // A zero limit means unset.
        if let Some(limit) = limit.filter(|v| *v != 0) {
            write!(url, "&limit={}", limit.min(constants::LIST_MAX_LIMIT))
                .expect("write into string must succeed");
        }

        Request::get(&url)
            .body(AsyncBody::Empty)
            .map_err(new_request_build_error)
    }

    pub async fn list_objects(
        &self,
        path: &str,
        marker: &str,
        delimiter: &str,
        limit: Option<usize>,
    ) -> Result<ListObjectsResponse> {
        let mut req = self.list_objects_request(path, marker, delimiter, limit)?;

        self.sign(&mut req, false)?;

        let resp = self.send(req).await?;
        match resp.status() {
            StatusCode::OK => {
                serde_json::from_slice(resp.body()).map_err(new_json_deserialize_error)
            }
            _ => Err(parse_error(resp)),
        }
    }

    /// Public download URL for the given path.
    pub fn download_url(&self, path: &str) -> String {
        let p = build_abs_path(&self.root, path);

        format!("{}://{}/{}", self.scheme, self.domain, percent_encode_path(&p))
    }

    /// Signed download URL for the given path, valid for `expire`.
    ///
    /// Signed URLs work against public buckets too, so downloads always go
    /// through this form.
    pub fn sign_download_url(&self, path: &str, expire: Duration) -> String {
        let deadline = Utc::now().timestamp() + expire.as_secs() as i64;

        self.signer.sign_download_url(&self.download_url(path), deadline)
    }

    pub async fn download_object(
        &self,
        path: &str,
        expire: Duration,
    ) -> Result<Response<HttpBody>> {
        let url = self.sign_download_url(path, expire);

        let req = Request::get(&url)
            .body(AsyncBody::Empty)
            .map_err(new_request_build_error)?;

        self.client.fetch(req).await
    }

    /// Upload an object through Kodo's form upload endpoint.
    ///
    /// The form carries the upload token, the target key and the file
    /// content, in that order.
    pub async fn upload_object(
        &self,
        path: &str,
        content_type: Option<&str>,
        bs: Bytes,
    ) -> Result<()> {
        let p = build_abs_path(&self.root, path);

        let deadline = Utc::now().timestamp() as u64 + constants::UPLOAD_TOKEN_TTL;
        let policy = PutPolicy::new(&self.bucket, &p, deadline);
        let token = self.signer.upload_token(&policy)?;

        let mut file_part = FormDataPart::new("file")
            .header(
                CONTENT_DISPOSITION,
                format!(
                    "form-data; name=\"file\"; filename=\"{}\"",
                    percent_encode_path(get_basename(&p))
                )
                .parse()
                .expect("percent encoded filename must be valid header"),
            )
            .content(bs);
        if let Some(mime) = content_type {
            file_part = file_part.header(
                CONTENT_TYPE,
                mime.parse().map_err(|err| {
                    Error::new(ErrorKind::Unexpected, "content type is not valid header value")
                        .with_operation("KodoCore::upload_object")
                        .set_source(err)
                })?,
            );
        }

        let multipart = Multipart::new()
            .part(FormDataPart::new("token").content(token))
            .part(FormDataPart::new("key").content(p))
            .part(file_part);

        let req = multipart.apply(Request::post(&self.up_endpoint))?;

        let resp = self.send(req).await?;
        match resp.status() {
            StatusCode::OK => Ok(()),
            _ => Err(parse_error(resp)),
        }
    }

    pub async fn delete_object(&self, path: &str) -> Result<()> {
        let p = build_abs_path(&self.root, path);

        let url = format!("{}/delete/{}", self.rs_endpoint, self.encode_entry(&p));

        let mut req = Request::post(&url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(AsyncBody::Empty)
            .map_err(new_request_build_error)?;

        self.sign(&mut req, false)?;

        let resp = self.send(req).await?;
        match resp.status().as_u16() {
            200 => Ok(()),
            // Deleting an already absent key is not an error.
            612 => Ok(()),
            _ => Err(parse_error(resp)),
        }
    }

    pub async fn move_object(&self, from: &str, to: &str) -> Result<()> {
        let from = build_abs_path(&self.root, from);
        let to = build_abs_path(&self.root, to);

        let url = format!(
            "{}/move/{}/{}",
            self.rs_endpoint,
            self.encode_entry(&from),
            self.encode_entry(&to)
        );

        let mut req = Request::post(&url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(AsyncBody::Empty)
            .map_err(new_request_build_error)?;

        self.sign(&mut req, false)?;

        let resp = self.send(req).await?;
        match resp.status() {
            StatusCode::OK => Ok(()),
            _ => Err(parse_error(resp)),
        }
    }

    pub async fn copy_object(&self, from: &str, to: &str) -> Result<()> {
        let from = build_abs_path(&self.root, from);
        let to = build_abs_path(&self.root, to);

        let url = format!(
            "{}/copy/{}/{}",
            self.rs_endpoint,
            self.encode_entry(&from),
            self.encode_entry(&to)
        );

        let mut req = Request::post(&url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(AsyncBody::Empty)
            .map_err(new_request_build_error)?;

        self.sign(&mut req, false)?;

        let resp = self.send(req).await?;
        match resp.status() {
            StatusCode::OK => Ok(()),
            _ => Err(parse_error(resp)),
        }
    }

    pub(crate) fn batch_delete_body(&self, paths: &[String]) -> String {
        paths
            .iter()
            .map(|p| {
                format!(
                    "op=/delete/{}",
                    self.encode_entry(&build_abs_path(&self.root, p))
                )
            })
            .collect::<Vec<String>>()
            .join("&")
    }

    /// Delete a set of objects in one batch request.
    ///
    /// Kodo answers 200 only when every op succeeded; a partial failure
    /// comes back as 298 and surfaces as an error for the whole batch.
    pub async fn batch_delete(&self, paths: &[String]) -> Result<()> {
        let url = format!("{}/batch", self.rs_endpoint);

        let body = self.batch_delete_body(paths);

        let mut req = Request::post(&url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(AsyncBody::Bytes(Bytes::from(body)))
            .map_err(new_request_build_error)?;

        self.sign(&mut req, true)?;

        let resp = self.send(req).await?;
        match resp.status() {
            StatusCode::OK => Ok(()),
            _ => Err(parse_error(resp)),
        }
    }

    /// Decode image metadata of an object through the `imageInfo` query
    /// operation on the download domain.
    pub async fn image_info(&self, path: &str) -> Result<ImageInfo> {
        let url = format!("{}?imageInfo", self.download_url(path));

        let req = Request::get(&url)
            .body(AsyncBody::Empty)
            .map_err(new_request_build_error)?;

        let resp = self.send(req).await?;
        match resp.status() {
            StatusCode::OK => {
                serde_json::from_slice(resp.body()).map_err(new_json_deserialize_error)
            }
            _ => Err(parse_error(resp)),
        }
    }
}

/// Convert Kodo's `putTime` into a UTC timestamp.
///
/// `putTime` is in units of 100 nanoseconds since the Unix epoch.
pub(crate) fn parse_put_time(put_time: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(put_time / 10_000_000, ((put_time % 10_000_000) * 100) as u32)
}

/// Response of the list objects API.
///
/// An absent or empty `marker` means the listing is exhausted.
#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListObjectsResponse {
    pub marker: Option<String>,
    pub common_prefixes: Vec<String>,
    pub items: Vec<ListItem>,
}

/// One object record inside a list page.
#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListItem {
    pub key: String,
    pub hash: String,
    pub fsize: u64,
    pub mime_type: String,
    pub put_time: i64,
}

/// Response of the stat API.
#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatObjectResponse {
    pub fsize: u64,
    pub hash: String,
    pub mime_type: String,
    pub put_time: i64,
}

/// Image metadata decoded by the `imageInfo` query operation.
#[derive(Default, Debug, Clone, Eq, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageInfo {
    /// Image format, e.g. `png` or `jpeg`.
    pub format: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Color model, e.g. `nrgba` or `ycbcr`.
    pub color_model: String,
}
