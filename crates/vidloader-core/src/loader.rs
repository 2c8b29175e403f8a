//! Load orchestration
//!
//! A load runs its steps strictly in order and stops at the first failure:
//!
//! ```text
//! normalize -> embed -> (iframe: done)
//!                    -> script (on cache miss) -> init player -> done
//! ```
//!
//! There are no retries and no cancellation. Two overlapping loads of the
//! same player both miss the cache and both fetch the script.

use crate::dom::NodeId;
use crate::embed::{create_embed, EmbedPlacement};
use crate::environment::{CleanupTask, Environment};
use crate::params::{normalize, EmbedParams, EmbedRequest, EmbedType, RefNodeInsert, EMBED_TAG_NAME_VIDEOJS};
use crate::runtime::{PlayerEvent, PlayerHandle};
use crate::{Error, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const INIT_FAILED: &str = "Could not initialize the player.";
const VIDEOJS_TAG_HINT: &str = "Make sure a recent version of the player is in use \
    (v6.11.0 or newer). Alternatively, pass `\"video\"` for `embedOptions.tagName`.";

/// A resolved load
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    /// The player was initialized
    InPage {
        player: Arc<dyn PlayerHandle>,
        embed: NodeId,
    },
    /// The iframe was inserted; nothing more is observable from here
    Iframe { embed: NodeId },
}

impl LoadOutcome {
    pub fn embed_type(&self) -> EmbedType {
        match self {
            LoadOutcome::InPage { .. } => EmbedType::InPage,
            LoadOutcome::Iframe { .. } => EmbedType::Iframe,
        }
    }

    pub fn embed(&self) -> NodeId {
        match self {
            LoadOutcome::InPage { embed, .. } | LoadOutcome::Iframe { embed } => *embed,
        }
    }

    pub fn player(&self) -> Option<&Arc<dyn PlayerHandle>> {
        match self {
            LoadOutcome::InPage { player, .. } => Some(player),
            LoadOutcome::Iframe { .. } => None,
        }
    }
}

/// Step a load was in when it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Normalizing,
    Embedding,
    LoadingScript,
    Initializing,
    Resolved,
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoadStage::Normalizing => "normalizing",
            LoadStage::Embedding => "embedding",
            LoadStage::LoadingScript => "loading-script",
            LoadStage::Initializing => "initializing",
            LoadStage::Resolved => "resolved",
        };
        f.write_str(s)
    }
}

/// Loads players into an [`Environment`]
#[derive(Debug, Clone)]
pub struct Loader {
    env: Arc<Environment>,
}

impl Loader {
    pub fn new(env: Arc<Environment>) -> Self {
        Self { env }
    }

    pub fn environment(&self) -> &Arc<Environment> {
        &self.env
    }

    /// Load a player.
    ///
    /// `onSuccess`/`onFailure` callbacks in `params` are invoked with the
    /// outcome, and the same outcome is returned.
    #[instrument(skip(self, params), fields(player = ?params.player_id, embed_type = ?params.embed_type))]
    pub async fn load(&self, mut params: EmbedParams) -> Result<LoadOutcome> {
        let on_success = params.on_success.take();
        let on_failure = params.on_failure.take();

        let mut stage = LoadStage::Normalizing;
        let result = self.run(params, &mut stage).await;

        match &result {
            Ok(outcome) => {
                info!(embed = %outcome.embed(), embed_type = %outcome.embed_type(), "Player loaded");
                if let Some(callback) = on_success {
                    callback(outcome);
                }
            }
            Err(e) => {
                warn!(stage = %stage, code = e.error_code(), error = %e, "Player load failed");
                if let Some(callback) = on_failure {
                    callback(e);
                }
            }
        }

        result
    }

    async fn run(&self, params: EmbedParams, stage: &mut LoadStage) -> Result<LoadOutcome> {
        let (request, placement, src, cached) = {
            let mut doc = self.env.document.write().await;
            let mut request = normalize(params, &doc)?;

            *stage = LoadStage::Embedding;
            let urls = self.env.urls.read().await;
            let placement = create_embed(&mut doc, &mut request, &urls)?;

            if request.is_iframe() {
                *stage = LoadStage::Resolved;
                return Ok(LoadOutcome::Iframe {
                    embed: placement.embed,
                });
            }

            let src = urls.resolve(&request);
            let cached = self.env.scripts.read().await.has(&request);

            if cached {
                debug!(src = %src, "Player script already loaded");
            } else {
                let parent = match request.ref_node_insert {
                    RefNodeInsert::Replace => placement.target_parent,
                    _ => Some(placement.target),
                };
                if let Some(parent) = parent {
                    let script = doc.create_element("script");
                    doc.set_attribute(script, "async", "");
                    doc.set_attribute(script, "charset", "utf-8");
                    doc.set_attribute(script, "src", &src);
                    doc.append_child(parent, script);
                }
            }

            (request, placement, src, cached)
        };

        if !cached {
            *stage = LoadStage::LoadingScript;
            let exports = self
                .env
                .host
                .load_script(&src)
                .await
                .map_err(|source| Error::ScriptDownload {
                    url: src.clone(),
                    source,
                })?;

            self.env.scripts.write().await.store_resolved(&request, &src);
            self.env.globals.write().await.install(exports);
            debug!(src = %src, "Player script loaded");
        }

        *stage = LoadStage::Initializing;
        let player = self.init_player(&request, &placement).await?;

        *stage = LoadStage::Resolved;
        Ok(LoadOutcome::InPage {
            player,
            embed: placement.embed,
        })
    }

    async fn init_player(
        &self,
        request: &EmbedRequest,
        placement: &EmbedPlacement,
    ) -> Result<Arc<dyn PlayerHandle>> {
        let mut doc = self.env.document.write().await;

        let factory = self
            .env
            .globals
            .read()
            .await
            .factory_for(&request.player_id, &request.embed_id)
            .ok_or_else(|| Error::MissingPlayerFunction {
                player_id: request.player_id.clone(),
            })?;

        let player = factory
            .create(&mut doc, placement.embed, request.options.as_ref())
            .map_err(|cause| init_error(request, cause))?;

        // The runtime removes the embed itself; wrappers and the playlist
        // are ours to remove once it is done.
        let mut nodes = Vec::new();
        if placement.root != placement.embed {
            nodes.push(placement.root);
        }
        nodes.extend(placement.playlist);

        if !nodes.is_empty() {
            let task = CleanupTask {
                player_id: player.id().to_string(),
                nodes,
            };
            player.one(PlayerEvent::Dispose, self.env.cleanup_listener(task));
        }

        debug!(player = player.id(), "Player initialized");
        Ok(player)
    }
}

fn init_error(request: &EmbedRequest, cause: String) -> Error {
    let message = if request.embed_options.tag_name() == EMBED_TAG_NAME_VIDEOJS {
        format!("{} {}", INIT_FAILED, VIDEOJS_TAG_HINT)
    } else {
        INIT_FAILED.to_string()
    };
    Error::PlayerInit { message, cause }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoaderConfig;
    use crate::headless::HeadlessHost;
    use crate::params::EmbedOptions;

    fn loader() -> (Loader, Arc<HeadlessHost>) {
        let host = Arc::new(HeadlessHost::default());
        let env = Environment::new(LoaderConfig::default(), host.clone());
        (Loader::new(env), host)
    }

    #[test]
    fn test_init_error_hint() {
        let mut request = EmbedRequest::new(Some("1"), "p", "e");
        match init_error(&request, "boom".into()) {
            Error::PlayerInit { message, cause } => {
                assert!(message.starts_with(INIT_FAILED));
                assert!(message.contains("v6.11.0"));
                assert_eq!(cause, "boom");
            }
            other => panic!("unexpected {:?}", other),
        }

        request.embed_options = EmbedOptions {
            tag_name: Some("video".into()),
            ..Default::default()
        };
        assert_eq!(init_error(&request, "boom".into()).to_string(), INIT_FAILED);
    }

    #[tokio::test]
    async fn test_iframe_skips_script() {
        let (loader, host) = loader();
        let body = loader.environment().document().await.body();

        let mut params = EmbedParams::new("1", body);
        params.embed_type = Some("iframe".into());
        let outcome = loader.load(params).await.unwrap();

        assert_eq!(outcome.embed_type(), EmbedType::Iframe);
        assert!(outcome.player().is_none());
        assert!(host.requests().is_empty());
        assert!(loader.environment().scripts().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_player_function() {
        let (loader, host) = loader();
        let src = "https://players.brightcove.net/1/default_default/index.min.js";
        host.serve(src, crate::runtime::ScriptExports::new());
        let body = loader.environment().document().await.body();

        let err = loader.load(EmbedParams::new("1", body)).await.unwrap_err();
        assert!(matches!(err, Error::MissingPlayerFunction { ref player_id } if player_id == "default"));

        // The embed stays in the document
        let doc = loader.environment().document().await;
        assert_eq!(doc.query_selector_all("video-js").len(), 1);
    }

    #[tokio::test]
    async fn test_stage_reported_on_validation_failure() {
        let (loader, _) = loader();
        let err = loader.load(EmbedParams::default()).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(LoadStage::LoadingScript.to_string(), "loading-script");
    }
}
