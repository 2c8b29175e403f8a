//! Loader environment
//!
//! Everything a load touches outside its own request lives here instead of
//! in process globals: the page, the global scope player runtimes install
//! into, the script cache, the CDN base URL and the script host. Each
//! environment is isolated, so tests can run side by side.
//!
//! Locks are always taken in the order document, urls, scripts, globals,
//! and never held across a script load.

use crate::cache::ScriptCache;
use crate::config::LoaderConfig;
use crate::dom::{Document, NodeId, Selector};
use crate::host::ScriptHost;
use crate::params::EmbedRequest;
use crate::runtime::{
    lock, split_player_embed_key, GlobalScope, Listener, PlayerHandle, PlayerRegistry,
};
use crate::url::UrlResolver;
use serde::Serialize;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, instrument, warn};

/// Markup to detach once a disposed player has finished tearing down
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupTask {
    pub player_id: String,
    pub nodes: Vec<NodeId>,
}

/// Cleanup scheduled by dispose listeners.
///
/// Each listener also spawns the task that drains the queue one tick later,
/// once the disposing caller has released the document.
#[derive(Debug, Default)]
pub struct CleanupQueue {
    tasks: Mutex<Vec<CleanupTask>>,
}

impl CleanupQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&self, task: CleanupTask) {
        debug!(player = %task.player_id, nodes = task.nodes.len(), "Cleanup scheduled");
        lock(&self.tasks).push(task);
    }

    pub fn drain(&self) -> Vec<CleanupTask> {
        std::mem::take(&mut *lock(&self.tasks))
    }

    pub fn len(&self) -> usize {
        lock(&self.tasks).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.tasks).is_empty()
    }
}

/// What a reset tore down
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResetReport {
    pub scripts_removed: usize,
    pub players_disposed: usize,
    pub globals_removed: usize,
    pub containers_removed: usize,
}

pub struct Environment {
    config: LoaderConfig,
    pub(crate) document: RwLock<Document>,
    pub(crate) urls: RwLock<UrlResolver>,
    pub(crate) scripts: RwLock<ScriptCache>,
    pub(crate) globals: RwLock<GlobalScope>,
    pub(crate) cleanup: Arc<CleanupQueue>,
    pub(crate) host: Arc<dyn ScriptHost>,
}

impl Environment {
    /// Environment with an empty page and no player runtimes
    pub fn new(config: LoaderConfig, host: Arc<dyn ScriptHost>) -> Arc<Self> {
        let globals = GlobalScope::new(&config);
        Self::with_page(config, host, Document::new(), globals)
    }

    /// Environment over an existing page and globals.
    ///
    /// Player runtimes already present in `globals` are detected and cached
    /// so that requests without an account id reuse them.
    pub fn with_page(
        config: LoaderConfig,
        host: Arc<dyn ScriptHost>,
        document: Document,
        globals: GlobalScope,
    ) -> Arc<Self> {
        let mut scripts = ScriptCache::new();
        for key in globals.embed_runtime_keys() {
            if let Some((player_id, embed_id)) = split_player_embed_key(&key) {
                scripts.store_detected(player_id, embed_id);
            }
        }
        if !scripts.is_empty() {
            info!(detected = scripts.len(), "Detected preloaded players");
        }

        Arc::new(Self {
            urls: RwLock::new(UrlResolver::new(config.base_url.clone())),
            config,
            document: RwLock::new(document),
            scripts: RwLock::new(scripts),
            globals: RwLock::new(globals),
            cleanup: Arc::new(CleanupQueue::new()),
            host,
        })
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn host(&self) -> &Arc<dyn ScriptHost> {
        &self.host
    }

    pub async fn document(&self) -> RwLockReadGuard<'_, Document> {
        self.document.read().await
    }

    pub async fn document_mut(&self) -> RwLockWriteGuard<'_, Document> {
        self.document.write().await
    }

    pub async fn globals(&self) -> RwLockReadGuard<'_, GlobalScope> {
        self.globals.read().await
    }

    pub async fn globals_mut(&self) -> RwLockWriteGuard<'_, GlobalScope> {
        self.globals.write().await
    }

    pub async fn scripts(&self) -> RwLockReadGuard<'_, ScriptCache> {
        self.scripts.read().await
    }

    pub async fn base_url(&self) -> String {
        self.urls.read().await.base_url().to_string()
    }

    pub async fn set_base_url(&self, base_url: impl Into<String>) {
        let base_url = base_url.into();
        info!(base_url = %base_url, "CDN base URL changed");
        self.urls.write().await.set_base_url(base_url);
    }

    /// Script or iframe URL for `request` without loading anything
    pub async fn resolve_url(&self, request: &EmbedRequest) -> String {
        self.urls.read().await.resolve(request)
    }

    pub fn cleanup_queue(&self) -> &Arc<CleanupQueue> {
        &self.cleanup
    }

    /// Detach the markup of every disposed player scheduled so far.
    /// Returns the number of nodes removed from the document.
    pub async fn run_deferred_cleanup(&self) -> usize {
        let mut doc = self.document.write().await;
        Self::apply_cleanup(&mut doc, self.cleanup.drain())
    }

    fn apply_cleanup(doc: &mut Document, tasks: Vec<CleanupTask>) -> usize {
        let mut removed = 0;
        for task in tasks {
            for node in task.nodes {
                if doc.parent(node).is_some() {
                    doc.remove(node);
                    removed += 1;
                }
            }
            debug!(player = %task.player_id, "Player markup cleaned up");
        }
        removed
    }

    /// Dispose listener that queues `task` and removes its nodes a tick
    /// after the player is disposed, however the disposal was triggered.
    ///
    /// Outside a tokio runtime the task stays queued until the next
    /// [`run_deferred_cleanup`](Self::run_deferred_cleanup) or reset.
    pub(crate) fn cleanup_listener(self: &Arc<Self>, task: CleanupTask) -> Listener {
        let env = Arc::downgrade(self);
        Box::new(move || {
            let Some(strong) = env.upgrade() else {
                return;
            };
            strong.cleanup.schedule(task);
            drop(strong);

            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(Self::deferred_cleanup(env));
                }
                Err(_) => warn!("No async runtime, player cleanup left queued"),
            }
        })
    }

    async fn deferred_cleanup(env: Weak<Environment>) {
        tokio::task::yield_now().await;
        if let Some(env) = env.upgrade() {
            // Blocks until the disposing caller drops the document
            env.run_deferred_cleanup().await;
        }
    }

    /// Dispose one player and, a tick later, remove the wrappers the loader
    /// put around it. The wrappers are gone when this returns.
    pub async fn dispose_player(&self, player: &dyn PlayerHandle) {
        {
            let mut doc = self.document.write().await;
            player.dispose(&mut doc);
        }

        // The runtime finishes its own teardown before wrappers go
        tokio::task::yield_now().await;

        self.run_deferred_cleanup().await;
    }

    /// Tear down everything player runtimes and loads have left behind:
    /// cached script elements, live players, runtime globals and the cache
    /// itself. Best-effort and idempotent.
    #[instrument(skip(self))]
    pub async fn reset(&self) -> ResetReport {
        let mut doc = self.document.write().await;
        let mut scripts = self.scripts.write().await;
        let mut globals = self.globals.write().await;
        let mut report = ResetReport::default();

        scripts.for_each(|src, key| {
            if src.is_empty() {
                return;
            }
            let matching = doc.find_all(&Selector::tag("script").with_attribute("src", src));
            if matching.is_empty() {
                warn!(key, src, "No script element found for cached player");
            }
            for el in matching {
                doc.remove(el);
                report.scripts_removed += 1;
            }
        });
        scripts.clear();

        let mut registries: Vec<Arc<PlayerRegistry>> = globals.runtime_registries();
        registries.extend(
            globals
                .embed_runtime_keys()
                .iter()
                .filter_map(|key| globals.embed_runtime(key))
                .filter_map(|rt| rt.registry.clone()),
        );
        for registry in registries {
            report.players_disposed += registry.dispose_all(&mut doc);
        }

        for name in globals.runtime_global_names() {
            globals.remove(&name);
            report.globals_removed += 1;
        }

        report.containers_removed = Self::apply_cleanup(&mut doc, self.cleanup.drain());

        info!(
            scripts = report.scripts_removed,
            players = report.players_disposed,
            globals = report.globals_removed,
            "Environment reset"
        );
        report
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("config", &self.config)
            .field("pending_cleanup", &self.cleanup.len())
            .finish_non_exhaustive()
    }
}
