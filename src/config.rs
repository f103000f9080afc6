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
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

/// Config for Qiniu Kodo services support.
#[derive(Default, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
#[non_exhaustive]
pub struct KodoConfig {
    /// root of this backend.
    ///
    /// All operations will happen under this root.
    pub root: Option<String>,
    /// bucket of this backend.
    pub bucket: String,
    /// access key of this backend.
    pub access_key: Option<String>,
    /// secret key of this backend.
    pub secret_key: Option<String>,
    /// download domain bound to the bucket.
    ///
    /// Defaults to `<bucket>.qiniudn.com` when unset.
    pub domain: Option<String>,
    /// whether download URLs use https.
    ///
    /// Kodo's default test domains speak plain http, so this defaults to
    /// `false`.
    pub use_https: bool,
    /// endpoint of the management (`rs`) service.
    ///
    /// Defaults to `https://rs.qiniuapi.com`.
    pub rs_endpoint: Option<String>,
    /// endpoint of the list (`rsf`) service.
    ///
    /// Defaults to `https://rsf.qiniuapi.com`.
    pub rsf_endpoint: Option<String>,
    /// endpoint of the upload (`up`) service.
    ///
    /// Defaults to `https://upload.qiniup.com`.
    pub up_endpoint: Option<String>,
    /// timeout applied to every remote call, including each page fetch of
    /// a listing.
    ///
    /// No timeout is applied when unset.
    pub timeout: Option<Duration>,
}

impl Debug for KodoConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut ds = f.debug_struct("Config");

        ds.field("root", &self.root);
        ds.field("bucket", &self.bucket);
        ds.field("access_key", &self.access_key);
        ds.field("domain", &self.domain);
        ds.field("use_https", &self.use_https);

        ds.finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secret_key() {
        let config = KodoConfig {
            bucket: "test-bucket".to_string(),
            access_key: Some("ak".to_string()),
            secret_key: Some("very-secret".to_string()),
            ..Default::default()
        };

        let repr = format!("{config:?}");
        assert!(repr.contains("test-bucket"));
        assert!(!repr.contains("very-secret"));
    }

    #[test]
    fn test_config_deserializes_from_json() {
        let config: KodoConfig = serde_json::from_str(
            r#"{"bucket":"b","access_key":"ak","secret_key":"sk","domain":"cdn.example.com"}"#,
        )
        .expect("config must deserialize");

        assert_eq!(config.bucket, "b");
        assert_eq!(config.domain.as_deref(), Some("cdn.example.com"));
        assert!(!config.use_https);
        assert_eq!(config.timeout, None);
    }
}
