//! Headless script host
//!
//! Serves an in-process stub player runtime instead of downloading
//! anything. The CLI renders embed markup with it, and tests use it to drive
//! the loader end to end.
//!
//! Every served script creates a fresh [`StubRuntime`] and exports:
//! - the loader global with the runtime as fallback init function and, when
//!   the URL names a `{playerId}_{embedId}` directory, as that embed's runtime
//! - a `videojs`-style registry global holding the runtime's players

use crate::config::LoaderConfig;
use crate::dom::{Document, NodeId};
use crate::host::{ScriptError, ScriptHost};
use crate::runtime::{
    lock, split_player_embed_key, EmbedRuntime, GlobalBinding, Listener, LoaderBinding,
    PlayerEvent, PlayerFactory, PlayerHandle, PlayerRegistry, ScriptExports,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::debug;

static NEXT_PLAYER: AtomicUsize = AtomicUsize::new(1);

/// A player created by [`StubRuntime`]
pub struct StubPlayer {
    id: String,
    element: Mutex<Option<NodeId>>,
    options: Option<serde_json::Value>,
    disposed: AtomicBool,
    listeners: Mutex<Vec<(PlayerEvent, Listener)>>,
    registry: Weak<PlayerRegistry>,
}

impl StubPlayer {
    /// Options the player was initialized with
    pub fn options(&self) -> Option<&serde_json::Value> {
        self.options.as_ref()
    }
}

impl PlayerHandle for StubPlayer {
    fn id(&self) -> &str {
        &self.id
    }

    fn element(&self) -> Option<NodeId> {
        *lock(&self.element)
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn dispose(&self, doc: &mut Document) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(el) = lock(&self.element).take() {
            doc.remove(el);
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.vacate(&self.id);
        }

        let listeners: Vec<Listener> = lock(&self.listeners)
            .drain(..)
            .filter(|(event, _)| *event == PlayerEvent::Dispose)
            .map(|(_, listener)| listener)
            .collect();
        debug!(player = %self.id, listeners = listeners.len(), "Stub player disposed");
        for listener in listeners {
            listener();
        }
    }

    fn one(&self, event: PlayerEvent, listener: Listener) {
        if self.is_disposed() {
            return;
        }
        lock(&self.listeners).push((event, listener));
    }
}

/// In-process stand-in for a player runtime
pub struct StubRuntime {
    src: String,
    registry: Arc<PlayerRegistry>,
    players: Mutex<Vec<Arc<StubPlayer>>>,
    init_error: Option<String>,
}

impl StubRuntime {
    pub fn new(src: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            src: src.into(),
            registry: PlayerRegistry::new(),
            players: Mutex::new(Vec::new()),
            init_error: None,
        })
    }

    /// Runtime whose init function always fails with `message`
    pub fn failing(src: impl Into<String>, message: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            src: src.into(),
            registry: PlayerRegistry::new(),
            players: Mutex::new(Vec::new()),
            init_error: Some(message.into()),
        })
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn registry(&self) -> Arc<PlayerRegistry> {
        self.registry.clone()
    }

    /// Every player this runtime created, disposed or not
    pub fn players(&self) -> Vec<Arc<StubPlayer>> {
        lock(&self.players).clone()
    }
}

impl PlayerFactory for StubRuntime {
    fn create(
        &self,
        doc: &mut Document,
        embed: NodeId,
        options: Option<&serde_json::Value>,
    ) -> Result<Arc<dyn PlayerHandle>, String> {
        if let Some(message) = &self.init_error {
            return Err(message.clone());
        }
        if !doc.is_element(embed) {
            return Err(format!("{} is not an element", embed));
        }

        let id = match doc.attribute(embed, "id") {
            Some(id) if !id.is_empty() => id,
            _ => {
                let id = format!("vjs_video_{}", NEXT_PLAYER.fetch_add(1, Ordering::SeqCst));
                doc.set_attribute(embed, "id", &id);
                id
            }
        };
        doc.add_class(embed, "vjs-initialized");

        let player = Arc::new(StubPlayer {
            id,
            element: Mutex::new(Some(embed)),
            options: options.cloned(),
            disposed: AtomicBool::new(false),
            listeners: Mutex::new(Vec::new()),
            registry: Arc::downgrade(&self.registry),
        });

        self.registry.register(player.clone());
        lock(&self.players).push(player.clone());
        Ok(player)
    }
}

#[derive(Default)]
struct HeadlessState {
    failing: HashSet<String>,
    overrides: HashMap<String, ScriptExports>,
    failing_init: HashMap<String, String>,
    requests: Vec<String>,
    runtimes: Vec<Arc<StubRuntime>>,
}

/// [`ScriptHost`] serving stub runtimes from memory
pub struct HeadlessHost {
    loader_global: String,
    registry_global: String,
    state: Mutex<HeadlessState>,
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new(&LoaderConfig::default())
    }
}

impl HeadlessHost {
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            loader_global: config.loader_global.clone(),
            registry_global: config.registry_global_prefix.clone(),
            state: Mutex::new(HeadlessState::default()),
        }
    }

    /// Make requests for `src` fail as if the network did
    pub fn fail(&self, src: impl Into<String>) {
        lock(&self.state).failing.insert(src.into());
    }

    /// Serve fixed exports for `src`
    pub fn serve(&self, src: impl Into<String>, exports: ScriptExports) {
        lock(&self.state).overrides.insert(src.into(), exports);
    }

    /// Serve a runtime for `src` whose init function fails with `message`
    pub fn fail_init(&self, src: impl Into<String>, message: impl Into<String>) {
        lock(&self.state)
            .failing_init
            .insert(src.into(), message.into());
    }

    /// Script URLs requested so far, in order
    pub fn requests(&self) -> Vec<String> {
        lock(&self.state).requests.clone()
    }

    /// Runtimes created by served scripts, in load order
    pub fn runtimes(&self) -> Vec<Arc<StubRuntime>> {
        lock(&self.state).runtimes.clone()
    }

    /// Exports a stub player script would define for `src`
    pub fn exports_for(&self, runtime: &Arc<StubRuntime>) -> ScriptExports {
        let factory: Arc<dyn PlayerFactory> = runtime.clone();
        let mut embeds = BTreeMap::new();

        if let Some(key) = player_embed_segment(&runtime.src) {
            embeds.insert(
                key,
                EmbedRuntime {
                    factory: factory.clone(),
                    registry: Some(runtime.registry()),
                },
            );
        }

        ScriptExports::new()
            .with(
                self.loader_global.clone(),
                GlobalBinding::Loader(LoaderBinding {
                    fallback: Some(factory),
                    embeds,
                }),
            )
            .with(self.registry_global.clone(), GlobalBinding::Registry(runtime.registry()))
    }
}

/// The `{playerId}_{embedId}` directory of a CDN script URL
fn player_embed_segment(src: &str) -> Option<String> {
    let path = src.split(['?', '#']).next().unwrap_or(src);
    let mut segments = path.rsplit('/');
    segments.next()?;
    let dir = segments.next()?;
    split_player_embed_key(dir).map(|_| dir.to_string())
}

#[async_trait]
impl ScriptHost for HeadlessHost {
    async fn load_script(&self, src: &str) -> Result<ScriptExports, ScriptError> {
        lock(&self.state).requests.push(src.to_string());

        // Script loads never complete synchronously
        tokio::task::yield_now().await;

        let runtime = {
            let mut state = lock(&self.state);
            if state.failing.contains(src) {
                return Err(ScriptError::Unavailable(src.to_string()));
            }
            if let Some(exports) = state.overrides.get(src) {
                return Ok(exports.clone());
            }

            let runtime = match state.failing_init.get(src) {
                Some(message) => StubRuntime::failing(src, message.clone()),
                None => StubRuntime::new(src),
            };
            state.runtimes.push(runtime.clone());
            runtime
        };

        debug!(src, "Serving stub player runtime");
        Ok(self.exports_for(&runtime))
    }
}
