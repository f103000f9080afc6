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

//! Filesystem-style access to Qiniu Kodo object storage.
//!
//! Kodo stores a flat namespace of keys. This crate layers the usual
//! filesystem verbs on top of it: directories are emulated through key
//! prefixes, listings group keys by `/` and walk the service's marker
//! pagination, and object records are mapped onto file entries with
//! length, content type and upload time.
//!
//! # Quick Start
//!
//! ```no_run
//! use kodofs::KodoBuilder;
//! use kodofs::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut builder = KodoBuilder::default();
//!     builder
//!         .bucket("example")
//!         .access_key("access_key")
//!         .secret_key("secret_key")
//!         .domain("example.qiniudn.com");
//!     let backend = builder.build()?;
//!
//!     // Write data.
//!     backend.write("dir/hello.txt", "Hello, World!").await?;
//!
//!     // Fetch metadata.
//!     let meta = backend.stat("dir/hello.txt").await?;
//!     println!("length: {}", meta.content_length());
//!
//!     // List one directory level.
//!     for entry in backend.list("dir/", false).await? {
//!         println!("{} ({})", entry.path(), entry.mode());
//!     }
//!
//!     // Delete.
//!     backend.delete("dir/hello.txt").await?;
//!
//!     Ok(())
//! }
//! ```

// Make sure all our public APIs have docs.
#![warn(missing_docs)]
// Deny unused qualifications.
#![deny(unused_qualifications)]

mod backend;
pub use backend::KodoBackend;
pub use backend::KodoBuilder;

mod client;
pub use client::AsyncBody;
pub use client::HttpBody;
pub use client::HttpClient;

mod config;
pub use config::KodoConfig;

mod core;
pub use self::core::ImageInfo;

mod error;
pub use error::Error;
pub use error::ErrorKind;
pub use error::Result;

mod lister;
pub use lister::KodoLister;
pub use lister::PageContext;
pub use lister::PageList;
pub use lister::PageLister;

mod metadata;
pub use metadata::Entry;
pub use metadata::EntryMode;
pub use metadata::Metadata;

mod multipart;
mod path;
mod signer;

mod writer;
pub use writer::KodoWriter;
