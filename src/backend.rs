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
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::Response;
use http::StatusCode;
use log::debug;

use crate::client::HttpBody;
use crate::client::HttpClient;
use crate::config::KodoConfig;
use crate::core::constants;
use crate::core::parse_put_time;
use crate::core::ImageInfo;
use crate::core::KodoCore;
use crate::error::parse_error;
use crate::error::Error;
use crate::error::ErrorKind;
use crate::error::Result;
use crate::lister::KodoLister;
use crate::lister::PageLister;
use crate::metadata::Entry;
use crate::metadata::EntryMode;
use crate::metadata::Metadata;
use crate::path::normalize_path;
use crate::path::normalize_root;
use crate::signer::KodoSigner;
use crate::writer::KodoWriter;

/// Builder of [`KodoBackend`].
#[derive(Default)]
pub struct KodoBuilder {
    config: KodoConfig,

    http_client: Option<HttpClient>,
}

impl Debug for KodoBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut d = f.debug_struct("KodoBuilder");

        d.field("config", &self.config);
        d.finish_non_exhaustive()
    }
}

impl KodoBuilder {
    /// Create a builder from a deserialized config.
    pub fn from_config(config: KodoConfig) -> Self {
        Self {
            config,
            http_client: None,
        }
    }

    /// Set root of this backend.
    ///
    /// All operations will happen under this root.
    pub fn root(&mut self, root: &str) -> &mut Self {
        self.config.root = if root.is_empty() {
            None
        } else {
            Some(root.to_string())
        };

        self
    }

    /// bucket of this backend.
    ///
    /// It is required. e.g. `test`
    pub fn bucket(&mut self, bucket: &str) -> &mut Self {
        self.config.bucket = bucket.to_string();

        self
    }

    /// access key of this backend.
    ///
    /// It is required.
    pub fn access_key(&mut self, access_key: &str) -> &mut Self {
        self.config.access_key = if access_key.is_empty() {
            None
        } else {
            Some(access_key.to_string())
        };

        self
    }

    /// secret key of this backend.
    ///
    /// It is required.
    pub fn secret_key(&mut self, secret_key: &str) -> &mut Self {
        self.config.secret_key = if secret_key.is_empty() {
            None
        } else {
            Some(secret_key.to_string())
        };

        self
    }

    /// Set the domain downloads go through.
    ///
    /// Defaults to the test domain Kodo binds to every bucket,
    /// `<bucket>.qiniudn.com`.
    pub fn domain(&mut self, domain: &str) -> &mut Self {
        self.config.domain = if domain.is_empty() {
            None
        } else {
            Some(domain.to_string())
        };

        self
    }

    /// Build download URLs with https instead of http.
    pub fn use_https(&mut self, use_https: bool) -> &mut Self {
        self.config.use_https = use_https;

        self
    }

    /// Override the object management endpoint.
    pub fn rs_endpoint(&mut self, endpoint: &str) -> &mut Self {
        self.config.rs_endpoint = if endpoint.is_empty() {
            None
        } else {
            Some(endpoint.to_string())
        };

        self
    }

    /// Override the listing endpoint.
    pub fn rsf_endpoint(&mut self, endpoint: &str) -> &mut Self {
        self.config.rsf_endpoint = if endpoint.is_empty() {
            None
        } else {
            Some(endpoint.to_string())
        };

        self
    }

    /// Override the upload endpoint.
    pub fn up_endpoint(&mut self, endpoint: &str) -> &mut Self {
        self.config.up_endpoint = if endpoint.is_empty() {
            None
        } else {
            Some(endpoint.to_string())
        };

        self
    }

    /// Set the timeout applied to every remote call, each list page
    /// fetch included.
    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.config.timeout = Some(timeout);

        self
    }

    /// Specify the http client that used by this service.
    pub fn http_client(&mut self, client: HttpClient) -> &mut Self {
        self.http_client = Some(client);
        self
    }

    /// Build the backend, validating the config.
    pub fn build(self) -> Result<KodoBackend> {
        debug!("backend build started: {:?}", &self);

        let root = normalize_root(&self.config.root.clone().unwrap_or_default());
        debug!("backend use root {}", &root);

        if self.config.bucket.is_empty() {
            return Err(Error::new(ErrorKind::ConfigInvalid, "bucket is empty")
                .with_operation("Builder::build")
                .with_context("service", "kodo"));
        }
        debug!("backend use bucket {}", &self.config.bucket);

        let access_key = match &self.config.access_key {
            Some(access_key) => Ok(access_key.clone()),
            None => Err(Error::new(ErrorKind::ConfigInvalid, "access_key is empty")
                .with_operation("Builder::build")
                .with_context("service", "kodo")),
        }?;

        let secret_key = match &self.config.secret_key {
            Some(secret_key) => Ok(secret_key.clone()),
            None => Err(Error::new(ErrorKind::ConfigInvalid, "secret_key is empty")
                .with_operation("Builder::build")
                .with_context("service", "kodo")),
        }?;

        let domain = match &self.config.domain {
            Some(domain) => domain.trim_end_matches('/').to_string(),
            None => format!("{}.{}", self.config.bucket, constants::DEFAULT_DOMAIN_SUFFIX),
        };
        debug!("backend use domain {}", &domain);

        let scheme = if self.config.use_https { "https" } else { "http" };

        let rs_endpoint = match &self.config.rs_endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => constants::DEFAULT_RS_ENDPOINT.to_string(),
        };
        let rsf_endpoint = match &self.config.rsf_endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => constants::DEFAULT_RSF_ENDPOINT.to_string(),
        };
        let up_endpoint = match &self.config.up_endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => constants::DEFAULT_UP_ENDPOINT.to_string(),
        };

        let client = if let Some(client) = self.http_client {
            client
        } else {
            let mut builder = reqwest::ClientBuilder::new();
            if let Some(timeout) = self.config.timeout {
                builder = builder.timeout(timeout);
            }
            let client = builder.build().map_err(|err| {
                Error::new(ErrorKind::Unexpected, "failed to build http client")
                    .with_operation("Builder::build")
                    .with_context("service", "kodo")
                    .set_source(err)
            })?;
            HttpClient::with(client)
        };

        let signer = KodoSigner {
            access_key,
            secret_key,
        };

        Ok(KodoBackend {
            core: Arc::new(KodoCore {
                root,
                bucket: self.config.bucket.clone(),
                domain,
                scheme,
                rs_endpoint,
                rsf_endpoint,
                up_endpoint,
                signer,
                client,
            }),
        })
    }
}

/// Backend exposing Qiniu Kodo buckets as a file tree.
///
/// Kodo stores a flat namespace of keys. Directories exist only as key
/// prefixes, so directory operations are emulated: listing groups keys by
/// `/`, creating a directory touches nothing and removing one deletes the
/// keys it prefixes.
#[derive(Debug, Clone)]
pub struct KodoBackend {
    core: Arc<KodoCore>,
}

impl KodoBackend {
    /// Check whether an object exists at `path`.
    ///
    /// Directory paths only report true when a placeholder object with
    /// that exact key exists.
    pub async fn exists(&self, path: &str) -> Result<bool> {
        match self.stat(path).await {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Fetch the metadata of the object at `path`.
    ///
    /// The entry mode is always [`EntryMode::FILE`] since only real
    /// objects answer a stat.
    pub async fn stat(&self, path: &str) -> Result<Metadata> {
        let path = normalize_path(path);

        let resp = self.core.stat_object(&path).await?;

        let mut meta = Metadata::new(EntryMode::FILE);
        meta.set_content_length(resp.fsize);
        if !resp.mime_type.is_empty() {
            meta.set_content_type(&resp.mime_type);
        }
        if !resp.hash.is_empty() {
            meta.set_etag(&resp.hash);
        }
        if let Some(put_time) = parse_put_time(resp.put_time) {
            meta.set_last_modified(put_time);
        }

        Ok(meta)
    }

    /// Content length in bytes of the object at `path`.
    pub async fn content_length(&self, path: &str) -> Result<u64> {
        Ok(self.stat(path).await?.content_length())
    }

    /// Content type recorded for the object at `path`.
    pub async fn content_type(&self, path: &str) -> Result<Option<String>> {
        Ok(self.stat(path).await?.content_type().map(|v| v.to_string()))
    }

    /// Upload time of the object at `path` in whole seconds since the
    /// Unix epoch.
    pub async fn timestamp(&self, path: &str) -> Result<Option<i64>> {
        Ok(self.stat(path).await?.timestamp())
    }

    /// Read the whole object at `path`.
    pub async fn read(&self, path: &str) -> Result<Bytes> {
        self.reader(path).await?.to_bytes().await
    }

    /// Open a streaming reader over the object at `path`.
    ///
    /// Reads go through a signed download URL, which works against public
    /// and private buckets alike.
    pub async fn reader(&self, path: &str) -> Result<HttpBody> {
        let path = normalize_path(path);

        let resp = self
            .core
            .download_object(&path, constants::DEFAULT_SIGNED_URL_TTL)
            .await?;

        let status = resp.status();
        match status {
            StatusCode::OK | StatusCode::PARTIAL_CONTENT => Ok(resp.into_body()),
            _ => {
                let (part, body) = resp.into_parts();
                let buf = body.to_bytes().await?;
                Err(parse_error(Response::from_parts(part, buf)))
            }
        }
    }

    /// Write `bs` to the object at `path`, replacing any previous content.
    pub async fn write(&self, path: &str, bs: impl Into<Bytes>) -> Result<()> {
        let path = normalize_path(path);

        self.core.upload_object(&path, None, bs.into()).await
    }

    /// Open a buffered writer for the object at `path`.
    pub fn writer(&self, path: &str) -> KodoWriter {
        let path = normalize_path(path);

        KodoWriter::new(self.core.clone(), &path)
    }

    /// Delete the object at `path`.
    ///
    /// Deleting an absent object succeeds.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let path = normalize_path(path);

        self.core.delete_object(&path).await
    }

    /// Move the object at `from` to `to`.
    pub async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let from = normalize_path(from);
        let to = normalize_path(to);

        self.core.move_object(&from, &to).await
    }

    /// Copy the object at `from` to `to`.
    pub async fn copy(&self, from: &str, to: &str) -> Result<()> {
        let from = normalize_path(from);
        let to = normalize_path(to);

        self.core.copy_object(&from, &to).await
    }

    /// Create a directory at `path`.
    ///
    /// Directories only exist as key prefixes, so there is nothing to
    /// create and the call succeeds without touching the service.
    pub async fn create_dir(&self, _path: &str) -> Result<()> {
        Ok(())
    }

    /// List the entries under the prefix `path`.
    ///
    /// With `recursive` unset, keys are grouped by `/` into directory
    /// entries the way a filesystem would nest them; otherwise every key
    /// under the prefix is returned flat. Entries arrive in the order the
    /// service pages them out. Any page fetch error fails the whole call
    /// and no partial listing is returned.
    pub async fn list(&self, path: &str, recursive: bool) -> Result<Vec<Entry>> {
        let mut lister = self.lister(path, recursive);

        let mut entries = Vec::new();
        while let Some(entry) = lister.next().await? {
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Open a streaming lister over the entries under the prefix `path`.
    pub fn lister(&self, path: &str, recursive: bool) -> PageLister<KodoLister> {
        let path = normalize_path(path);

        PageLister::new(KodoLister::new(self.core.clone(), &path, recursive, None))
    }

    /// Remove every object under the prefix `path`.
    ///
    /// The whole subtree is listed first, then deleted in a single batch
    /// request. An empty subtree succeeds without issuing the batch. A
    /// partially failed batch surfaces as an error for the whole call and
    /// nothing is retried.
    pub async fn remove_all(&self, path: &str) -> Result<()> {
        let entries = self.list(path, true).await?;

        let paths = entries
            .iter()
            .map(|v| v.path().to_string())
            .collect::<Vec<String>>();
        if paths.is_empty() {
            return Ok(());
        }

        self.core.batch_delete(&paths).await
    }

    /// Public download URL of the object at `path`.
    pub fn url(&self, path: &str) -> String {
        let path = normalize_path(path);

        self.core.download_url(&path)
    }

    /// Signed download URL of the object at `path`, valid for `expire`.
    pub fn signed_url(&self, path: &str, expire: Duration) -> String {
        let path = normalize_path(path);

        self.core.sign_download_url(&path, expire)
    }

    /// Decode image metadata of the object at `path`.
    pub async fn image_info(&self, path: &str) -> Result<ImageInfo> {
        let path = normalize_path(path);

        self.core.image_info(&path).await
    }
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose;
    use base64::Engine;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::body_string;
    use wiremock::matchers::body_string_contains;
    use wiremock::matchers::header_exists;
    use wiremock::matchers::method;
    use wiremock::matchers::path;
    use wiremock::matchers::query_param;
    use wiremock::matchers::query_param_is_missing;
    use wiremock::Mock;
    use wiremock::MockServer;
    use wiremock::ResponseTemplate;

    use super::*;

    fn test_backend(server: &MockServer) -> KodoBackend {
        let mut builder = KodoBuilder::default();
        builder
            .bucket("test")
            .access_key("ak")
            .secret_key("sk")
            .domain(&server.address().to_string())
            .rs_endpoint(&server.uri())
            .rsf_endpoint(&server.uri())
            .up_endpoint(&server.uri());

        builder.build().expect("backend must build")
    }

    fn encode_entry(key: &str) -> String {
        general_purpose::URL_SAFE.encode(format!("test:{key}"))
    }

    #[test]
    fn test_builder_rejects_incomplete_config() {
        let err = KodoBuilder::default().build().expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);

        let mut builder = KodoBuilder::default();
        builder.bucket("test");
        let err = builder.build().expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);

        let mut builder = KodoBuilder::default();
        builder.bucket("test").access_key("ak");
        let err = builder.build().expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_url_uses_domain_and_scheme() {
        let mut builder = KodoBuilder::default();
        builder
            .bucket("test")
            .access_key("ak")
            .secret_key("sk")
            .domain("cdn.example.com");
        let backend = builder.build().expect("backend must build");
        assert_eq!(backend.url("a/b.txt"), "http://cdn.example.com/a/b.txt");
        // Paths are normalized before they reach the service.
        assert_eq!(backend.url("/a//b.txt"), "http://cdn.example.com/a/b.txt");

        let mut builder = KodoBuilder::default();
        builder
            .bucket("test")
            .access_key("ak")
            .secret_key("sk")
            .use_https(true);
        let backend = builder.build().expect("backend must build");
        assert_eq!(backend.url("a/b.txt"), "https://test.qiniudn.com/a/b.txt");
    }

    #[test]
    fn test_signed_url_carries_deadline_and_token() {
        let mut builder = KodoBuilder::default();
        builder
            .bucket("test")
            .access_key("ak")
            .secret_key("sk")
            .domain("cdn.example.com");
        let backend = builder.build().expect("backend must build");

        let url = backend.signed_url("a/b.txt", Duration::from_secs(3600));
        assert!(url.starts_with("http://cdn.example.com/a/b.txt?e="));
        assert!(url.contains("&token=ak:"));
    }

    #[tokio::test]
    async fn test_create_dir_touches_nothing() {
        let mut builder = KodoBuilder::default();
        builder.bucket("test").access_key("ak").secret_key("sk");
        let backend = builder.build().expect("backend must build");

        backend
            .create_dir("pending/uploads/")
            .await
            .expect("create dir must succeed");
    }

    #[tokio::test]
    async fn test_stat_decodes_object_metadata() {
        let _ = env_logger::builder().is_test(true).try_init();

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/stat/{}", encode_entry("dir/file.jpg"))))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{
                    "fsize": 12345,
                    "hash": "FgHk-_iqpnZji6PsNr4ghsK5qEwR",
                    "mimeType": "image/jpeg",
                    "putTime": 13603956734587420
                }"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let backend = test_backend(&server);

        let meta = backend.stat("dir/file.jpg").await.expect("stat must succeed");
        assert_eq!(meta.mode(), EntryMode::FILE);
        assert_eq!(meta.content_length(), 12345);
        assert_eq!(meta.content_type(), Some("image/jpeg"));
        assert_eq!(meta.etag(), Some("FgHk-_iqpnZji6PsNr4ghsK5qEwR"));
        assert_eq!(meta.timestamp(), Some(1360395673));
    }

    #[tokio::test]
    async fn test_timestamp_floors_to_whole_seconds() {
        let _ = env_logger::builder().is_test(true).try_init();

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/stat/{}", encode_entry("a.txt"))))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"fsize": 1, "hash": "h", "mimeType": "text/plain", "putTime": 137000000000}"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let backend = test_backend(&server);

        let ts = backend.timestamp("a.txt").await.expect("stat must succeed");
        assert_eq!(ts, Some(13700));
    }

    #[tokio::test]
    async fn test_exists_maps_not_found_to_false() {
        let _ = env_logger::builder().is_test(true).try_init();

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/stat/{}", encode_entry("present.txt"))))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"fsize": 1, "hash": "h", "mimeType": "text/plain", "putTime": 0}"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/stat/{}", encode_entry("missing.txt"))))
            .respond_with(ResponseTemplate::new(612).set_body_raw(
                r#"{"error": "no such file or directory"}"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let backend = test_backend(&server);

        assert!(backend.exists("present.txt").await.expect("must succeed"));
        assert!(!backend.exists("missing.txt").await.expect("must succeed"));
    }

    #[tokio::test]
    async fn test_exists_propagates_other_errors() {
        let _ = env_logger::builder().is_test(true).try_init();

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/stat/{}", encode_entry("a.txt"))))
            .respond_with(ResponseTemplate::new(503).set_body_raw(
                r#"{"error": "service unavailable"}"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let backend = test_backend(&server);

        let err = backend.exists("a.txt").await.expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::Unexpected);
        assert!(err.is_temporary());
    }

    #[tokio::test]
    async fn test_list_concatenates_pages_in_order() {
        let _ = env_logger::builder().is_test(true).try_init();

        let server = MockServer::start().await;
        // The first page request carries no marker.
        Mock::given(method("GET"))
            .and(path("/list"))
            .and(query_param("bucket", "test"))
            .and(query_param("prefix", "dir/"))
            .and(query_param("delimiter", "/"))
            .and(query_param_is_missing("marker"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{
                    "marker": "m1",
                    "commonPrefixes": ["dir/sub/"],
                    "items": [
                        {"key": "dir/x.txt", "hash": "hx", "fsize": 1, "mimeType": "text/plain", "putTime": 137000000000},
                        {"key": "dir/y.txt", "hash": "hy", "fsize": 2, "mimeType": "text/plain", "putTime": 137000000000}
                    ]
                }"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;
        // The second resumes from the returned marker and ends the listing
        // with an empty one.
        Mock::given(method("GET"))
            .and(path("/list"))
            .and(query_param("bucket", "test"))
            .and(query_param("marker", "m1"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{
                    "marker": "",
                    "items": [
                        {"key": "dir/z.txt", "hash": "hz", "fsize": 3, "mimeType": "text/plain", "putTime": 137000000000}
                    ]
                }"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let backend = test_backend(&server);

        let entries = backend.list("dir/", false).await.expect("list must succeed");
        let got = entries
            .iter()
            .map(|v| (v.path().to_string(), v.mode()))
            .collect::<Vec<_>>();
        assert_eq!(
            got,
            vec![
                ("dir/sub/".to_string(), EntryMode::DIR),
                ("dir/x.txt".to_string(), EntryMode::FILE),
                ("dir/y.txt".to_string(), EntryMode::FILE),
                ("dir/z.txt".to_string(), EntryMode::FILE),
            ]
        );
    }

    #[tokio::test]
    async fn test_list_discards_results_on_page_error() {
        let _ = env_logger::builder().is_test(true).try_init();

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list"))
            .and(query_param_is_missing("marker"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{
                    "marker": "m1",
                    "items": [
                        {"key": "dir/x.txt", "hash": "hx", "fsize": 1, "mimeType": "text/plain", "putTime": 137000000000}
                    ]
                }"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/list"))
            .and(query_param("marker", "m1"))
            .respond_with(ResponseTemplate::new(503).set_body_raw(
                r#"{"error": "service unavailable"}"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let backend = test_backend(&server);

        let err = backend
            .list("dir/", false)
            .await
            .expect_err("listing must fail");
        assert_eq!(err.kind(), ErrorKind::Unexpected);
        assert!(err.is_temporary());
    }

    #[tokio::test]
    async fn test_remove_all_deletes_in_one_batch() {
        let _ = env_logger::builder().is_test(true).try_init();

        let server = MockServer::start().await;
        // Removal lists the subtree flat, so no delimiter is sent.
        Mock::given(method("GET"))
            .and(path("/list"))
            .and(query_param("bucket", "test"))
            .and(query_param("prefix", "dir/"))
            .and(query_param_is_missing("delimiter"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{
                    "items": [
                        {"key": "dir/a.txt", "hash": "ha", "fsize": 1, "mimeType": "text/plain", "putTime": 137000000000},
                        {"key": "dir/b", "hash": "hb", "fsize": 2, "mimeType": "application/octet-stream", "putTime": 137000000000}
                    ]
                }"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/batch"))
            .and(header_exists("authorization"))
            .and(body_string(format!(
                "op=/delete/{}&op=/delete/{}",
                encode_entry("dir/a.txt"),
                encode_entry("dir/b")
            )))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"[{"code": 200, "data": {}}, {"code": 200, "data": {}}]"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let backend = test_backend(&server);

        backend
            .remove_all("dir/")
            .await
            .expect("removal must succeed");
    }

    #[tokio::test]
    async fn test_remove_all_of_empty_prefix_skips_batch() {
        let _ = env_logger::builder().is_test(true).try_init();

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(r#"{"items": []}"#, "application/json"),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/batch"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let backend = test_backend(&server);

        backend
            .remove_all("dir/")
            .await
            .expect("removal must succeed");
    }

    #[tokio::test]
    async fn test_remove_all_surfaces_partial_failure() {
        let _ = env_logger::builder().is_test(true).try_init();

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{
                    "items": [
                        {"key": "dir/a.txt", "hash": "ha", "fsize": 1, "mimeType": "text/plain", "putTime": 137000000000}
                    ]
                }"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/batch"))
            .respond_with(ResponseTemplate::new(298).set_body_raw(
                r#"[{"code": 612, "data": {"error": "no such file or directory"}}]"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let backend = test_backend(&server);

        let err = backend
            .remove_all("dir/")
            .await
            .expect_err("removal must fail");
        assert_eq!(err.kind(), ErrorKind::Unexpected);
    }

    #[tokio::test]
    async fn test_write_uploads_form() {
        let _ = env_logger::builder().is_test(true).try_init();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_string_contains("name=\"token\""))
            .and(body_string_contains("name=\"key\""))
            .and(body_string_contains("dir/hello.txt"))
            .and(body_string_contains("hello world"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"hash": "h", "key": "dir/hello.txt"}"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let backend = test_backend(&server);

        backend
            .write("dir/hello.txt", "hello world")
            .await
            .expect("write must succeed");
    }

    #[tokio::test]
    async fn test_writer_uploads_on_close() {
        let _ = env_logger::builder().is_test(true).try_init();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_string_contains("content-type: text/plain"))
            .and(body_string_contains("hello world"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"hash": "h", "key": "dir/hello.txt"}"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let backend = test_backend(&server);

        let mut w = backend
            .writer("dir/hello.txt")
            .with_content_type("text/plain");
        w.write("hello ");
        w.write("world");
        w.close().await.expect("close must succeed");
    }

    #[tokio::test]
    async fn test_read_round_trips_content() {
        let _ = env_logger::builder().is_test(true).try_init();

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dir/hello.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(&b"hello world"[..]))
            .expect(1)
            .mount(&server)
            .await;

        let backend = test_backend(&server);

        let bs = backend.read("dir/hello.txt").await.expect("read must succeed");
        assert_eq!(bs, Bytes::from_static(b"hello world"));
    }

    #[tokio::test]
    async fn test_read_of_missing_object_maps_not_found() {
        let _ = env_logger::builder().is_test(true).try_init();

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dir/missing.txt"))
            .respond_with(ResponseTemplate::new(404).set_body_raw(
                r#"{"error": "no such file or directory"}"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let backend = test_backend(&server);

        let err = backend
            .read("dir/missing.txt")
            .await
            .expect_err("read must fail");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_rename_moves_the_object() {
        let _ = env_logger::builder().is_test(true).try_init();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!(
                "/move/{}/{}",
                encode_entry("old.txt"),
                encode_entry("new.txt")
            )))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let backend = test_backend(&server);

        backend
            .rename("old.txt", "new.txt")
            .await
            .expect("rename must succeed");
    }

    #[tokio::test]
    async fn test_copy_duplicates_the_object() {
        let _ = env_logger::builder().is_test(true).try_init();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!(
                "/copy/{}/{}",
                encode_entry("src.txt"),
                encode_entry("dst.txt")
            )))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let backend = test_backend(&server);

        backend
            .copy("src.txt", "dst.txt")
            .await
            .expect("copy must succeed");
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing_object() {
        let _ = env_logger::builder().is_test(true).try_init();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/delete/{}", encode_entry("gone.txt"))))
            .respond_with(ResponseTemplate::new(612).set_body_raw(
                r#"{"error": "no such file or directory"}"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let backend = test_backend(&server);

        backend
            .delete("gone.txt")
            .await
            .expect("delete must succeed");
    }

    #[tokio::test]
    async fn test_image_info_decodes_response() {
        let _ = env_logger::builder().is_test(true).try_init();

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img.png"))
            .and(query_param("imageInfo", ""))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"format": "png", "width": 1710, "height": 1082, "colorModel": "nrgba"}"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let backend = test_backend(&server);

        let info = backend.image_info("img.png").await.expect("must succeed");
        assert_eq!(info.format, "png");
        assert_eq!(info.width, 1710);
        assert_eq!(info.height, 1082);
        assert_eq!(info.color_model, "nrgba");
    }
}
