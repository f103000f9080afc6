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

use std::sync::Arc;

use bytes::Bytes;
use bytes::BytesMut;

use crate::core::KodoCore;
use crate::error::Result;

/// A buffered one shot writer.
///
/// Kodo's form upload takes the whole object in a single request, so
/// written chunks accumulate in memory until [`KodoWriter::close`] sends
/// them. Dropping the writer without closing uploads nothing.
pub struct KodoWriter {
    core: Arc<KodoCore>,

    path: String,
    content_type: Option<String>,
    buf: BytesMut,
}

impl KodoWriter {
    pub(crate) fn new(core: Arc<KodoCore>, path: &str) -> Self {
        Self {
            core,
            path: path.to_string(),
            content_type: None,
            buf: BytesMut::new(),
        }
    }

    /// Set the content type stored for the uploaded object.
    ///
    /// When unset, Kodo sniffs one from the content.
    pub fn with_content_type(mut self, v: &str) -> Self {
        self.content_type = Some(v.to_string());
        self
    }

    /// Append a chunk to the pending object.
    pub fn write(&mut self, bs: impl Into<Bytes>) {
        self.buf.extend_from_slice(&bs.into());
    }

    /// Upload the accumulated content and finish the write.
    pub async fn close(self) -> Result<()> {
        self.core
            .upload_object(&self.path, self.content_type.as_deref(), self.buf.freeze())
            .await
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::client::HttpClient;
    use crate::core::constants;
    use crate::signer::KodoSigner;

    fn test_writer() -> KodoWriter {
        let core = KodoCore {
            root: "/".to_string(),
            bucket: "b".to_string(),
            domain: "b.qiniudn.com".to_string(),
            scheme: "http",
            rs_endpoint: constants::DEFAULT_RS_ENDPOINT.to_string(),
            rsf_endpoint: constants::DEFAULT_RSF_ENDPOINT.to_string(),
            up_endpoint: constants::DEFAULT_UP_ENDPOINT.to_string(),
            signer: KodoSigner {
                access_key: "ak".to_string(),
                secret_key: "sk".to_string(),
            },
            client: HttpClient::new().expect("client must build"),
        };

        KodoWriter::new(Arc::new(core), "a/b.txt")
    }

    #[test]
    fn test_writes_accumulate_in_order() {
        let mut w = test_writer();
        w.write(Bytes::from_static(b"hello "));
        w.write(Bytes::from_static(b"world"));

        assert_eq!(w.buf.freeze(), Bytes::from_static(b"hello world"));
    }

    #[test]
    fn test_content_type_is_recorded() {
        let w = test_writer().with_content_type("text/plain");
        assert_eq!(w.content_type.as_deref(), Some("text/plain"));
    }
}
