//! Script cache
//!
//! Tracks player scripts that were downloaded or found already present.
//! Keys are `accountId_playerId_embedId`, where a missing account id becomes
//! `*`; that is the shape of entries recorded for players detected at
//! startup, whose account is unknown.

use crate::params::EmbedRequest;
use crate::url::UrlResolver;
use std::collections::BTreeMap;

/// Cache key for a player configuration
pub fn cache_key(account_id: Option<&str>, player_id: &str, embed_id: &str) -> String {
    let account = account_id.filter(|a| !a.is_empty()).unwrap_or("*");
    format!("{}_{}_{}", account, player_id, embed_id)
}

#[derive(Debug, Clone, Default)]
pub struct ScriptCache {
    entries: BTreeMap<String, String>,
}

impl ScriptCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(request: &EmbedRequest) -> String {
        cache_key(
            request.account_id.as_deref(),
            &request.player_id,
            &request.embed_id,
        )
    }

    /// Record a request. The value is the script URL when an account is
    /// known, or empty when nothing was downloaded.
    pub fn store(&mut self, request: &EmbedRequest, urls: &UrlResolver) {
        self.store_resolved(request, &urls.resolve(request));
    }

    /// Record a request whose script URL is already known
    pub fn store_resolved(&mut self, request: &EmbedRequest, src: &str) {
        let value = if request.account_id.is_some() {
            src.to_string()
        } else {
            String::new()
        };
        self.entries.insert(Self::key(request), value);
    }

    /// Record a player found without a download
    pub fn store_detected(&mut self, player_id: &str, embed_id: &str) {
        self.entries
            .insert(cache_key(None, player_id, embed_id), String::new());
    }

    pub fn has(&self, request: &EmbedRequest) -> bool {
        self.entries.contains_key(&Self::key(request))
    }

    pub fn get(&self, request: &EmbedRequest) -> Option<&str> {
        self.entries.get(&Self::key(request)).map(String::as_str)
    }

    /// Visit every entry as `(value, key)`
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&str, &str),
    {
        for (key, value) in &self.entries {
            visit(value, key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key() {
        assert_eq!(cache_key(Some("0"), "1", "2"), "0_1_2");
        assert_eq!(cache_key(None, "1", "2"), "*_1_2");
        assert_eq!(cache_key(Some(""), "1", "2"), "*_1_2");
        assert_eq!(ScriptCache::key(&EmbedRequest::new(Some("0"), "1", "2")), "0_1_2");
    }

    #[test]
    fn test_store_with_account() {
        let mut cache = ScriptCache::new();
        let urls = UrlResolver::default();
        let req = EmbedRequest::new(Some("1"), "2", "3");

        assert!(!cache.has(&req));
        cache.store(&req, &urls);
        assert!(cache.has(&req));
        assert_eq!(cache.get(&req), Some("https://players.brightcove.net/1/2_3/index.min.js"));
    }

    #[test]
    fn test_store_without_account() {
        let mut cache = ScriptCache::new();
        let req = EmbedRequest::new(None, "2", "3");
        cache.store(&req, &UrlResolver::default());
        assert_eq!(cache.get(&req), Some(""));

        cache.store_detected("4", "5");
        assert!(cache.has(&EmbedRequest::new(None, "4", "5")));
        assert!(!cache.has(&EmbedRequest::new(Some("1"), "4", "5")));
    }

    #[test]
    fn test_stored_value_survives_base_change() {
        let mut cache = ScriptCache::new();
        let mut urls = UrlResolver::default();
        let req = EmbedRequest::new(Some("1"), "2", "3");
        cache.store(&req, &urls);
        urls.set_base_url("https://cdn.example/");
        assert_eq!(cache.get(&req), Some("https://players.brightcove.net/1/2_3/index.min.js"));
    }

    #[test]
    fn test_for_each_and_clear() {
        let mut cache = ScriptCache::new();
        let urls = UrlResolver::default();
        cache.store(&EmbedRequest::new(Some("1"), "a", "b"), &urls);
        cache.store_detected("c", "d");

        let mut seen = Vec::new();
        cache.for_each(|value, key| seen.push((key.to_string(), value.to_string())));
        seen.sort();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], ("*_c_d".to_string(), String::new()));
        assert_eq!(seen[1].0, "1_a_b");

        cache.clear();
        assert!(cache.is_empty());
    }
}
