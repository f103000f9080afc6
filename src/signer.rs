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

use base64::engine::general_purpose;
use base64::Engine;
use hmac::Hmac;
use hmac::Mac;
use serde::Serialize;
use sha1::Sha1;

use crate::error::new_json_serialize_error;
use crate::error::Result;

type HmacSha1 = Hmac<Sha1>;

/// KodoSigner signs requests with Kodo's `QBox` scheme.
///
/// All three Kodo credentials surfaces run over the same HMAC-SHA1 core:
///
/// - management requests carry an `Authorization: QBox <ak>:<sign>` header;
/// - uploads carry a token signed over an encoded [`PutPolicy`];
/// - private downloads carry `e` (deadline) and `token` query parameters.
///
/// Base64 is always the url-safe alphabet with padding, matching Kodo's
/// `urlsafe_base64` everywhere.
#[derive(Clone, Default)]
pub struct KodoSigner {
    pub access_key: String,
    pub secret_key: String,
}

impl KodoSigner {
    fn sign_data(&self, data: &[u8]) -> String {
        let mut mac = HmacSha1::new_from_slice(self.secret_key.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(data);
        let sign = mac.finalize().into_bytes();

        general_purpose::URL_SAFE.encode(sign.as_slice())
    }

    /// Generate the `QBox` authorization header value for a management
    /// request.
    ///
    /// The signing data is `<path>[?<query>]\n`, followed by the request
    /// body. Pass the body only when the request is form encoded; other
    /// body types are excluded from the signature.
    pub fn authorization(&self, path_and_query: &str, body: Option<&[u8]>) -> String {
        let mut data = Vec::with_capacity(path_and_query.len() + 1);
        data.extend_from_slice(path_and_query.as_bytes());
        data.push(b'\n');
        if let Some(body) = body {
            data.extend_from_slice(body);
        }

        format!("QBox {}:{}", self.access_key, self.sign_data(&data))
    }

    /// Generate an upload token over the given put policy.
    ///
    /// The token shape is `<ak>:<sign>:<encoded_policy>` where the policy is
    /// url-safe base64 of its JSON form.
    pub fn upload_token(&self, policy: &PutPolicy) -> Result<String> {
        let encoded = general_purpose::URL_SAFE
            .encode(serde_json::to_vec(policy).map_err(new_json_serialize_error)?);
        let sign = self.sign_data(encoded.as_bytes());

        Ok(format!("{}:{}:{}", self.access_key, sign, encoded))
    }

    /// Attach `e` (deadline) and `token` query parameters to a download URL.
    ///
    /// The URL including the deadline is what gets signed, so the returned
    /// URL must be used as is.
    pub fn sign_download_url(&self, url: &str, deadline: i64) -> String {
        let to_sign = if url.contains('?') {
            format!("{url}&e={deadline}")
        } else {
            format!("{url}?e={deadline}")
        };
        let token = format!("{}:{}", self.access_key, self.sign_data(to_sign.as_bytes()));

        format!("{to_sign}&token={token}")
    }
}

/// PutPolicy is the upload policy signed into an upload token.
#[derive(Debug, Serialize)]
pub struct PutPolicy {
    pub scope: String,
    pub deadline: u64,
}

impl PutPolicy {
    /// Policy scoped to one key in the bucket, usable until `deadline`
    /// (seconds since the Unix epoch).
    pub fn new(bucket: &str, key: &str, deadline: u64) -> Self {
        Self {
            scope: format!("{bucket}:{key}"),
            deadline,
        }
    }
}
