//! Vidloader Core - Asynchronous embed loader for video players
//!
//! This crate loads a third-party video player into a page:
//! - Parameter validation and normalization
//! - Embed construction (in-page player element or iframe) with responsive,
//!   picture-in-picture and playlist wrapping
//! - CDN URL resolution
//! - Player script caching and runtime initialization
//! - Environment reset and deferred disposal cleanup
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Vidloader Core                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐          │
//! │  │    Param     │  │    Embed     │  │     URL      │          │
//! │  │  Normalizer  │  │   Builder    │  │   Resolver   │          │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘          │
//! │         │                 │                 │                   │
//! │         └─────────────────┼─────────────────┘                   │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │                    │   Loader    │                              │
//! │                    └──────┬──────┘                              │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────────┐           │
//! │  │    Script    │  │ Environment │  │    Script    │           │
//! │  │    Cache     │  │             │  │     Host     │           │
//! │  └──────────────┘  └─────────────┘  └──────────────┘           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vidloader_core::{EmbedParams, Environment, HeadlessHost, Loader, LoaderConfig};
//!
//! # async fn run() -> vidloader_core::Result<()> {
//! let env = Environment::new(LoaderConfig::default(), Arc::new(HeadlessHost::default()));
//! let body = env.document().await.body();
//!
//! let loader = Loader::new(env.clone());
//! let outcome = loader.load(EmbedParams::new("1234", body)).await?;
//! println!("{:?}", outcome.embed_type());
//!
//! env.reset().await;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod config;
pub mod dom;
pub mod params;
pub mod url;
pub mod cache;
pub mod runtime;
pub mod host;
pub mod headless;
pub mod embed;
pub mod environment;
pub mod loader;

pub use error::{Error, Result};
pub use config::LoaderConfig;
pub use dom::{Document, NodeId, Selector};
pub use params::{
    EmbedOptions, EmbedParams, EmbedRequest, EmbedType, ParamValue, PlaylistConfig,
    PlaylistOption, RefNode, RefNodeInsert, ResponsiveConfig, ResponsiveOption,
};
pub use url::UrlResolver;
pub use cache::{cache_key, ScriptCache};
pub use runtime::{
    EmbedRuntime, GlobalBinding, GlobalScope, LoaderBinding, PlayerEvent, PlayerFactory,
    PlayerHandle, PlayerRegistry, ScriptExports,
};
pub use host::{ScriptError, ScriptEvaluator, ScriptHost};
#[cfg(feature = "http")]
pub use host::{HttpScriptHost, ProbeReport};
pub use headless::{HeadlessHost, StubPlayer, StubRuntime};
pub use embed::{create_embed, EmbedPlacement};
pub use environment::{CleanupQueue, CleanupTask, Environment, ResetReport};
pub use loader::{LoadOutcome, LoadStage, Loader};

pub const EMBED_TYPE_IN_PAGE: &str = "in-page";
pub const EMBED_TYPE_IFRAME: &str = "iframe";

pub const REF_NODE_INSERT_APPEND: &str = "append";
pub const REF_NODE_INSERT_PREPEND: &str = "prepend";
pub const REF_NODE_INSERT_BEFORE: &str = "before";
pub const REF_NODE_INSERT_AFTER: &str = "after";
pub const REF_NODE_INSERT_REPLACE: &str = "replace";

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the loader library
pub fn init() {
    tracing::info!(version = VERSION, "Vidloader Core initialized");
}
