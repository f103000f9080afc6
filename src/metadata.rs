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

use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;

use chrono::DateTime;
use chrono::Utc;

/// EntryMode represents the mode of an entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub enum EntryMode {
    /// FILE means the entry has data to read.
    FILE,
    /// DIR means the entry can be listed.
    DIR,
    /// Unknown means we don't know what we can do on this entry.
    #[default]
    Unknown,
}

impl EntryMode {
    /// Check if this mode is FILE.
    pub fn is_file(self) -> bool {
        self == EntryMode::FILE
    }

    /// Check if this mode is DIR.
    pub fn is_dir(self) -> bool {
        self == EntryMode::DIR
    }
}

impl Display for EntryMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            EntryMode::FILE => write!(f, "file"),
            EntryMode::DIR => write!(f, "dir"),
            EntryMode::Unknown => write!(f, "unknown"),
        }
    }
}

/// Metadata carries all the known information of an entry, normalized from
/// Kodo's stat and list records into one shape.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct Metadata {
    mode: EntryMode,

    content_length: Option<u64>,
    content_type: Option<String>,
    etag: Option<String>,
    last_modified: Option<DateTime<Utc>>,
}

impl Metadata {
    /// Create a new metadata.
    pub fn new(mode: EntryMode) -> Self {
        Self {
            mode,

            content_length: None,
            content_type: None,
            etag: None,
            last_modified: None,
        }
    }

    /// mode represent this entry's mode.
    pub fn mode(&self) -> EntryMode {
        self.mode
    }

    /// Returns `true` if this metadata is for a file.
    pub fn is_file(&self) -> bool {
        self.mode.is_file()
    }

    /// Returns `true` if this metadata is for a directory.
    pub fn is_dir(&self) -> bool {
        self.mode.is_dir()
    }

    /// Set mode for entry.
    pub fn set_mode(&mut self, v: EntryMode) -> &mut Self {
        self.mode = v;
        self
    }

    /// Set mode for entry.
    pub fn with_mode(mut self, v: EntryMode) -> Self {
        self.mode = v;
        self
    }

    /// Content length of this entry.
    ///
    /// `Content-Length` HTTP header, or the `fsize` field of a Kodo record.
    /// Directories always have a content length of 0.
    pub fn content_length(&self) -> u64 {
        self.content_length.unwrap_or_default()
    }

    /// Set content length of this entry.
    pub fn set_content_length(&mut self, v: u64) -> &mut Self {
        self.content_length = Some(v);
        self
    }

    /// Set content length of this entry.
    pub fn with_content_length(mut self, v: u64) -> Self {
        self.content_length = Some(v);
        self
    }

    /// Content type of this entry, the `mimeType` field of a Kodo record.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Set content type of this entry.
    pub fn set_content_type(&mut self, v: &str) -> &mut Self {
        self.content_type = Some(v.to_string());
        self
    }

    /// Set content type of this entry.
    pub fn with_content_type(mut self, v: String) -> Self {
        self.content_type = Some(v);
        self
    }

    /// ETag of this entry, the `hash` field of a Kodo record.
    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    /// Set ETag of this entry.
    pub fn set_etag(&mut self, v: &str) -> &mut Self {
        self.etag = Some(v.to_string());
        self
    }

    /// Set ETag of this entry.
    pub fn with_etag(mut self, v: String) -> Self {
        self.etag = Some(v);
        self
    }

    /// Last modified of this entry.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.last_modified
    }

    /// Set last modified of this entry.
    pub fn set_last_modified(&mut self, v: DateTime<Utc>) -> &mut Self {
        self.last_modified = Some(v);
        self
    }

    /// Set last modified of this entry.
    pub fn with_last_modified(mut self, v: DateTime<Utc>) -> Self {
        self.last_modified = Some(v);
        self
    }

    /// Last modified of this entry as whole seconds since the Unix epoch.
    pub fn timestamp(&self) -> Option<i64> {
        self.last_modified.map(|v| v.timestamp())
    }
}

/// Entry is the uniform record returned by list operations: a path relative
/// to the backend root, paired with its normalized metadata.
///
/// # Notes
///
/// An entry classified as a directory does not necessarily carry a trailing
/// slash in its path. Kodo is a flat keyspace, so directory-ness of a bare
/// key is inferred, not recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    path: String,
    meta: Metadata,
}

impl Entry {
    /// Create a new entry by its corresponding underlying storage.
    pub fn new(path: &str, meta: Metadata) -> Entry {
        Self::with(path.to_string(), meta)
    }

    /// Create a new entry with given value.
    pub fn with(mut path: String, meta: Metadata) -> Entry {
        // Normalize path as `/` if it's empty.
        if path.is_empty() {
            path = "/".to_string();
        }

        Entry { path, meta }
    }

    /// Get the path of entry.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Get entry's mode.
    pub fn mode(&self) -> EntryMode {
        self.meta.mode()
    }

    /// Get the metadata of entry.
    pub fn metadata(&self) -> &Metadata {
        &self.meta
    }

    /// Consume this entry to get its path and metadata.
    pub fn into_parts(self) -> (String, Metadata) {
        (self.path, self.meta)
    }
}
