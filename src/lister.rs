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

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use crate::core::parse_put_time;
use crate::core::KodoCore;
use crate::error::Result;
use crate::metadata::Entry;
use crate::metadata::EntryMode;
use crate::metadata::Metadata;
use crate::path::build_rel_path;
use crate::path::infer_entry_mode;

/// The context passed between pages of a [`PageList`].
#[derive(Default)]
pub struct PageContext {
    /// Set when the service has confirmed there are no more pages.
    ///
    /// Exhaustion is a normal outcome of listing, not an error. Once `done`
    /// is set no further page is fetched.
    pub done: bool,
    /// The continuation token to send with the next page request.
    pub token: String,
    /// Entries decoded from the current page.
    pub entries: VecDeque<Entry>,
}

/// PageList is the trait for services whose listing is served in pages
/// addressed by a continuation token.
///
/// Implementations only decode one page; [`PageLister`] drives the paging
/// loop around them.
pub trait PageList: Send + Sync + Unpin + 'static {
    /// Fetch the page addressed by `ctx.token` and replace the token with
    /// the one for the page after it.
    fn next_page(&self, ctx: &mut PageContext) -> impl Future<Output = Result<()>> + Send;
}

/// PageLister drains pages fetched by a [`PageList`] one entry at a time.
pub struct PageLister<L: PageList> {
    inner: L,
    ctx: PageContext,
}

impl<L> PageLister<L>
where
    L: PageList,
{
    /// Create a new lister that starts before the first page.
    pub fn new(l: L) -> Self {
        Self {
            inner: l,
            ctx: PageContext::default(),
        }
    }

    /// Return the next entry, fetching further pages as needed.
    ///
    /// The loop is iterative so that arbitrarily long listings use constant
    /// stack. Pages that decode to zero entries are skipped over. An error
    /// from the underlying fetch is returned as is and no further entry is
    /// produced from the failed page.
    pub async fn next(&mut self) -> Result<Option<Entry>> {
        loop {
            if let Some(entry) = self.ctx.entries.pop_front() {
                return Ok(Some(entry));
            }
            if self.ctx.done {
                return Ok(None);
            }

            self.inner.next_page(&mut self.ctx).await?;
        }
    }
}

/// Lister over the keys under one prefix of a Kodo bucket.
pub struct KodoLister {
    core: Arc<KodoCore>,

    path: String,
    delimiter: &'static str,
    limit: Option<usize>,
}

impl KodoLister {
    /// Create a lister over `path`.
    ///
    /// A recursive lister walks every key under the prefix; otherwise keys
    /// are grouped by `/` and nested levels come back as directory entries.
    pub(crate) fn new(
        core: Arc<KodoCore>,
        path: &str,
        recursive: bool,
        limit: Option<usize>,
    ) -> Self {
        let delimiter = if recursive { "" } else { "/" };
        Self {
            core,
            path: path.to_string(),
            delimiter,
            limit,
        }
    }
}

impl PageList for KodoLister {
    async fn next_page(&self, ctx: &mut PageContext) -> Result<()> {
        let output = self
            .core
            .list_objects(&self.path, &ctx.token, self.delimiter, self.limit)
            .await?;

        // An absent marker and an empty one both mean the listing is
        // exhausted.
        ctx.done = match output.marker.as_ref() {
            None => true,
            Some(marker) => marker.is_empty(),
        };
        ctx.token = output.marker.unwrap_or_default();

        for prefix in output.common_prefixes {
            let path = build_rel_path(&self.core.root, &prefix);

            ctx.entries
                .push_back(Entry::new(&path, Metadata::new(EntryMode::DIR)));
        }

        for object in output.items {
            let mut path = build_rel_path(&self.core.root, &object.key);
            if path.is_empty() {
                path = "/".to_string();
            }

            let mut meta = Metadata::new(infer_entry_mode(&path));
            meta.set_content_length(object.fsize);
            if !object.mime_type.is_empty() {
                meta.set_content_type(&object.mime_type);
            }
            if !object.hash.is_empty() {
                meta.set_etag(&object.hash);
            }
            if let Some(put_time) = parse_put_time(object.put_time) {
                meta.set_last_modified(put_time);
            }

            ctx.entries.push_back(Entry::new(&path, meta));
        }

        Ok(())
    }
}
