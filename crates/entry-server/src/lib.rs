//! Streaming SSR entry point.
//!
//! Renders a document through a `Renderer`, either streaming from the shell
//! or waiting for all content. The render is bounded by an abort timeout and
//! its output gets a comment injected after `<body>`.
//!
//! # Example
//!
//! ```rust,ignore
//! use entry_server::prelude::*;
//!
//! let server = EntryServer::new(MyRenderer).with_config(EntryConfig::default());
//!
//! let response = server
//!     .handle_request(&request, StatusCode::OK, HeaderMap::new(), entry_ctx, load_ctx)
//!     .await?;
//! ```

mod body;
mod driver;
mod server;

pub mod prelude;

pub use body::*;
pub use server::*;
