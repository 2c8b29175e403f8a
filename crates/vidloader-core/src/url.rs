//! Player URL resolution

use crate::config::DEFAULT_BASE_URL;
use crate::params::{url_encoded_param, EmbedRequest};

/// Parameters forwarded as query string to iframe embeds, in output order
pub const IFRAME_QUERY_PARAMS: &[&str] = &[
    "applicationId",
    "catalogSearch",
    "catalogSequence",
    "playlistId",
    "playlistVideoId",
    "videoId",
];

/// Computes CDN locations for player scripts and iframe documents.
///
/// The base is mutable configuration. Resolved URLs are plain strings, so
/// values already recorded elsewhere are unaffected by a later base change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlResolver {
    base_url: String,
}

impl Default for UrlResolver {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl UrlResolver {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_base_url(&mut self, base_url: impl Into<String>) {
        self.base_url = base_url.into();
    }

    /// `{base}{account}/{player}_{embed}/index.{ext}[?query]`, or `playerUrl`
    /// verbatim when the request carries one.
    pub fn resolve(&self, request: &EmbedRequest) -> String {
        if let Some(url) = &request.player_url {
            return url.clone();
        }

        let iframe = request.is_iframe();
        let ext = if iframe {
            "html"
        } else if request.embed_options.unminified {
            "js"
        } else {
            "min.js"
        };

        let account = urlencoding::encode(request.account_id.as_deref().unwrap_or_default());
        let player = urlencoding::encode(&request.player_id);
        let embed = urlencoding::encode(&request.embed_id);

        let mut url = format!(
            "{}{}/{}_{}/index.{}",
            self.base_url, account, player, embed, ext
        );

        if iframe {
            url.push_str(&query_string(request));
        }

        url
    }
}

fn query_string(request: &EmbedRequest) -> String {
    let pairs: Vec<String> = IFRAME_QUERY_PARAMS
        .iter()
        .filter_map(|&key| {
            let value = url_encoded_param(key, request.param(key)?)?;
            Some(format!("{}={}", urlencoding::encode(key), value))
        })
        .collect();

    if pairs.is_empty() {
        String::new()
    } else {
        format!("?{}", pairs.join("&"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{EmbedType, ParamValue};
    use serde_json::json;
    use std::collections::HashMap;

    fn request(account: &str, player: &str, embed: &str) -> EmbedRequest {
        EmbedRequest::new(Some(account), player, embed)
    }

    #[test]
    fn test_in_page_url() {
        let resolver = UrlResolver::default();
        assert_eq!(
            resolver.resolve(&request("1", "2", "3")),
            "https://players.brightcove.net/1/2_3/index.min.js"
        );
    }

    #[test]
    fn test_unminified_url() {
        let mut req = request("1", "2", "3");
        req.embed_options.unminified = true;
        assert_eq!(
            UrlResolver::default().resolve(&req),
            "https://players.brightcove.net/1/2_3/index.js"
        );
    }

    #[test]
    fn test_iframe_url() {
        let mut req = request("1", "2", "3");
        req.embed_type = EmbedType::Iframe;
        assert_eq!(
            UrlResolver::default().resolve(&req),
            "https://players.brightcove.net/1/2_3/index.html"
        );
    }

    #[test]
    fn test_iframe_query_params() {
        let mut req = request("1", "2", "3");
        req.embed_type = EmbedType::Iframe;
        req.playlist_id = Some("a".into());
        req.playlist_video_id = Some("b".into());
        req.video_id = Some("c".into());
        req.application_id = Some("app".into());
        assert_eq!(
            UrlResolver::default().resolve(&req),
            "https://players.brightcove.net/1/2_3/index.html?applicationId=app&playlistId=a&playlistVideoId=b&videoId=c"
        );
    }

    #[test]
    fn test_in_page_ignores_query_params() {
        let mut req = request("1", "2", "3");
        req.playlist_id = Some("a".into());
        req.video_id = Some("c".into());
        assert_eq!(
            UrlResolver::default().resolve(&req),
            "https://players.brightcove.net/1/2_3/index.min.js"
        );
    }

    #[test]
    fn test_encodes_all_components() {
        let mut req = request(";", ",", "/");
        req.embed_type = EmbedType::Iframe;
        req.playlist_id = Some("?".into());
        req.playlist_video_id = Some(":".into());
        req.video_id = Some("@".into());
        assert_eq!(
            UrlResolver::default().resolve(&req),
            "https://players.brightcove.net/%3B/%2C_%2F/index.html?playlistId=%3F&playlistVideoId=%3A&videoId=%40"
        );
    }

    #[test]
    fn test_catalog_params_are_json_encoded() {
        let mut req = request("1", "2", "3");
        req.embed_type = EmbedType::Iframe;
        req.catalog_search = Some(ParamValue::json(json!({"q": "x"})));
        req.catalog_sequence = Some(ParamValue::json(json!([{"x": 1}])));
        assert_eq!(
            UrlResolver::default().resolve(&req),
            "https://players.brightcove.net/1/2_3/index.html?catalogSearch=%7B%22q%22%3A%22x%22%7D&catalogSequence=%5B%7B%22x%22%3A1%7D%5D"
        );
    }

    #[test]
    fn test_unencodable_param_is_dropped() {
        let mut bad = HashMap::new();
        bad.insert((0, 0), 1);

        let mut req = request("1", "2", "3");
        req.embed_type = EmbedType::Iframe;
        req.catalog_search = Some(ParamValue::structured(bad));
        req.video_id = Some("v".into());
        assert_eq!(
            UrlResolver::default().resolve(&req),
            "https://players.brightcove.net/1/2_3/index.html?videoId=v"
        );
    }

    #[test]
    fn test_player_url_override() {
        let mut req = request("1", "2", "3");
        req.player_url = Some("something!".into());
        assert_eq!(UrlResolver::default().resolve(&req), "something!");
    }

    #[test]
    fn test_set_base_url() {
        let mut resolver = UrlResolver::default();
        let before = resolver.resolve(&request("1", "2", "3"));
        resolver.set_base_url("https://cdn.example/");
        assert_eq!(resolver.base_url(), "https://cdn.example/");
        assert_eq!(resolver.resolve(&request("1", "2", "3")), "https://cdn.example/1/2_3/index.min.js");
        assert_eq!(before, "https://players.brightcove.net/1/2_3/index.min.js");
    }
}
