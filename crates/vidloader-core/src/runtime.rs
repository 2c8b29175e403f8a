//! Player runtime model
//!
//! The third-party player is consumed, never implemented, here. It shows up
//! as three capabilities:
//! - a [`PlayerFactory`] (the runtime's init function) that turns an embed
//!   element into a player
//! - the [`PlayerHandle`] it returns, which can be disposed and observed
//! - [`PlayerRegistry`]s of live players that the runtime keeps
//!
//! Instead of ambient globals, these live in an explicit [`GlobalScope`]
//! owned by the loader environment. Loading a player script yields
//! [`ScriptExports`] that are installed into that scope.

use crate::config::LoaderConfig;
use crate::dom::{Document, NodeId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Events a player can be observed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerEvent {
    /// Fired once the player has torn down its own element
    Dispose,
}

/// One-shot event listener
pub type Listener = Box<dyn FnOnce() + Send + Sync>;

/// A live player owned by the runtime
pub trait PlayerHandle: Send + Sync {
    fn id(&self) -> &str;

    /// The element the player is attached to; `None` after disposal
    fn element(&self) -> Option<NodeId>;

    fn is_disposed(&self) -> bool;

    /// Tear the player down, removing its own element from the document
    fn dispose(&self, doc: &mut Document);

    /// Run `listener` the next time `event` fires
    fn one(&self, event: PlayerEvent, listener: Listener);
}

impl fmt::Debug for dyn PlayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerHandle")
            .field("id", &self.id())
            .field("element", &self.element())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// The runtime's player constructor
pub trait PlayerFactory: Send + Sync {
    /// Initialize a player on `embed`. Errors carry the runtime's message.
    fn create(
        &self,
        doc: &mut Document,
        embed: NodeId,
        options: Option<&serde_json::Value>,
    ) -> std::result::Result<Arc<dyn PlayerHandle>, String>;
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Live players known to a runtime, keyed by player id. Disposed players
/// leave a vacant entry behind.
#[derive(Default)]
pub struct PlayerRegistry {
    players: Mutex<BTreeMap<String, Option<Arc<dyn PlayerHandle>>>>,
}

impl PlayerRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, player: Arc<dyn PlayerHandle>) {
        lock(&self.players).insert(player.id().to_string(), Some(player));
    }

    pub fn vacate(&self, id: &str) {
        if let Some(entry) = lock(&self.players).get_mut(id) {
            *entry = None;
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn PlayerHandle>> {
        lock(&self.players).get(id).cloned().flatten()
    }

    /// Players that have not been vacated
    pub fn live(&self) -> Vec<Arc<dyn PlayerHandle>> {
        lock(&self.players).values().flatten().cloned().collect()
    }

    /// Dispose every live player, returning how many were disposed.
    ///
    /// Players are collected first so their disposal may touch the registry.
    pub fn dispose_all(&self, doc: &mut Document) -> usize {
        let live = self.live();
        for player in &live {
            player.dispose(doc);
        }
        live.len()
    }
}

impl fmt::Debug for PlayerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let players = lock(&self.players);
        f.debug_struct("PlayerRegistry")
            .field("entries", &players.len())
            .field("live", &players.values().filter(|p| p.is_some()).count())
            .finish()
    }
}

/// Runtime installed for one `{playerId}_{embedId}` configuration
#[derive(Clone)]
pub struct EmbedRuntime {
    pub factory: Arc<dyn PlayerFactory>,
    pub registry: Option<Arc<PlayerRegistry>>,
}

/// The loader global: a shared init function plus per-embed runtimes
#[derive(Clone, Default)]
pub struct LoaderBinding {
    pub fallback: Option<Arc<dyn PlayerFactory>>,
    pub embeds: BTreeMap<String, EmbedRuntime>,
}

#[derive(Clone)]
pub enum GlobalBinding {
    Loader(LoaderBinding),
    Registry(Arc<PlayerRegistry>),
    Value(serde_json::Value),
}

impl fmt::Debug for GlobalBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlobalBinding::Loader(l) => f
                .debug_struct("Loader")
                .field("fallback", &l.fallback.is_some())
                .field("embeds", &l.embeds.keys().collect::<Vec<_>>())
                .finish(),
            GlobalBinding::Registry(r) => f.debug_tuple("Registry").field(r).finish(),
            GlobalBinding::Value(v) => f.debug_tuple("Value").field(v).finish(),
        }
    }
}

/// Globals defined by evaluating a player script
#[derive(Debug, Clone, Default)]
pub struct ScriptExports {
    pub bindings: Vec<(String, GlobalBinding)>,
}

impl ScriptExports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, binding: GlobalBinding) -> Self {
        self.bindings.push((name.into(), binding));
        self
    }
}

/// Splits `player_embed` when both halves are non-empty ASCII alphanumerics
pub fn split_player_embed_key(key: &str) -> Option<(&str, &str)> {
    let (player, embed) = key.split_once('_')?;
    let valid = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric());
    (valid(player) && valid(embed)).then_some((player, embed))
}

/// Named global bindings visible to the loader and the player runtime
#[derive(Debug, Clone)]
pub struct GlobalScope {
    loader_global: String,
    registry_prefix: String,
    bindings: BTreeMap<String, GlobalBinding>,
}

impl Default for GlobalScope {
    fn default() -> Self {
        Self::new(&LoaderConfig::default())
    }
}

impl GlobalScope {
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            loader_global: config.loader_global.clone(),
            registry_prefix: config.registry_global_prefix.to_ascii_lowercase(),
            bindings: BTreeMap::new(),
        }
    }

    pub fn loader_global(&self) -> &str {
        &self.loader_global
    }

    pub fn get(&self, name: &str) -> Option<&GlobalBinding> {
        self.bindings.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, binding: GlobalBinding) {
        self.bindings.insert(name.into(), binding);
    }

    pub fn remove(&mut self, name: &str) -> Option<GlobalBinding> {
        self.bindings.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.bindings.keys().cloned().collect()
    }

    pub fn loader(&self) -> Option<&LoaderBinding> {
        match self.bindings.get(&self.loader_global) {
            Some(GlobalBinding::Loader(l)) => Some(l),
            _ => None,
        }
    }

    pub fn registry(&self, name: &str) -> Option<Arc<PlayerRegistry>> {
        match self.bindings.get(name) {
            Some(GlobalBinding::Registry(r)) => Some(r.clone()),
            _ => None,
        }
    }

    /// Merge script exports. A loader binding keeps previously installed
    /// embed runtimes; everything else is overwritten.
    pub fn install(&mut self, exports: ScriptExports) {
        for (name, binding) in exports.bindings {
            match binding {
                GlobalBinding::Loader(new) => {
                    if let Some(GlobalBinding::Loader(existing)) = self.bindings.get_mut(&name) {
                        if new.fallback.is_some() {
                            existing.fallback = new.fallback;
                        }
                        existing.embeds.extend(new.embeds);
                    } else {
                        self.bindings.insert(name, GlobalBinding::Loader(new));
                    }
                }
                other => {
                    self.bindings.insert(name, other);
                }
            }
        }
    }

    /// The init function for a player configuration: its own runtime first,
    /// then the shared fallback.
    pub fn factory_for(&self, player_id: &str, embed_id: &str) -> Option<Arc<dyn PlayerFactory>> {
        let loader = self.loader()?;
        loader
            .embeds
            .get(&format!("{}_{}", player_id, embed_id))
            .map(|rt| rt.factory.clone())
            .or_else(|| loader.fallback.clone())
    }

    /// Loader sub-globals named like `{playerId}_{embedId}`
    pub fn embed_runtime_keys(&self) -> Vec<String> {
        self.loader()
            .map(|l| {
                l.embeds
                    .keys()
                    .filter(|k| split_player_embed_key(k).is_some())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn embed_runtime(&self, key: &str) -> Option<&EmbedRuntime> {
        self.loader()?.embeds.get(key)
    }

    /// Globals created by player runtimes: the loader global itself and
    /// anything starting with the registry prefix, case-insensitively.
    pub fn runtime_global_names(&self) -> Vec<String> {
        self.bindings
            .keys()
            .filter(|k| {
                *k == &self.loader_global
                    || k.to_ascii_lowercase().starts_with(&self.registry_prefix)
            })
            .cloned()
            .collect()
    }

    /// Registries bound directly under a runtime global name
    pub fn runtime_registries(&self) -> Vec<Arc<PlayerRegistry>> {
        self.runtime_global_names()
            .iter()
            .filter_map(|name| self.registry(name))
            .collect()
    }
}
