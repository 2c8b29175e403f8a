//! Embed parameters and their normalization
//!
//! [`EmbedParams`] is what callers hand to the loader, either built in code
//! or deserialized from camelCase JSON. [`normalize`] merges defaults,
//! validates in a fixed order and produces the canonical [`EmbedRequest`]
//! that the rest of the pipeline works from.

use crate::dom::{Document, NodeId};
use crate::loader::LoadOutcome;
use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Sentinel used for `playerId` and `embedId` when absent
pub const DEFAULT_ID: &str = "default";

pub const DEFAULT_ASPECT_RATIO: &str = "16:9";
pub const DEFAULT_MAX_WIDTH: &str = "100%";

pub const EMBED_TAG_NAME_VIDEO: &str = "video";
pub const EMBED_TAG_NAME_VIDEOJS: &str = "video-js";

/// Parameters that are JSON-encoded when given as non-string values
pub const JSON_ALLOWED_PARAMS: &[&str] = &["catalogSearch", "catalogSequence"];

/// How the player is embedded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbedType {
    #[default]
    InPage,
    Iframe,
}

impl EmbedType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbedType::InPage => "in-page",
            EmbedType::Iframe => "iframe",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "in-page" => Some(EmbedType::InPage),
            "iframe" => Some(EmbedType::Iframe),
            _ => None,
        }
    }
}

impl fmt::Display for EmbedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the embed goes relative to the reference node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefNodeInsert {
    /// Last child of the reference node
    #[default]
    Append,
    /// First child of the reference node
    Prepend,
    /// Previous sibling of the reference node
    Before,
    /// Next sibling of the reference node
    After,
    /// Takes the reference node's place in its parent
    Replace,
}

impl RefNodeInsert {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefNodeInsert::Append => "append",
            RefNodeInsert::Prepend => "prepend",
            RefNodeInsert::Before => "before",
            RefNodeInsert::After => "after",
            RefNodeInsert::Replace => "replace",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "append" => Some(RefNodeInsert::Append),
            "prepend" => Some(RefNodeInsert::Prepend),
            "before" => Some(RefNodeInsert::Before),
            "after" => Some(RefNodeInsert::After),
            "replace" => Some(RefNodeInsert::Replace),
            _ => None,
        }
    }
}

impl fmt::Display for RefNodeInsert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target location of an embed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefNode {
    Node(NodeId),
    /// Resolved with `query_selector` when the embed is inserted
    Selector(String),
}

impl From<NodeId> for RefNode {
    fn from(id: NodeId) -> Self {
        RefNode::Node(id)
    }
}

impl From<&str> for RefNode {
    fn from(selector: &str) -> Self {
        RefNode::Selector(selector.to_string())
    }
}

impl From<String> for RefNode {
    fn from(selector: String) -> Self {
        RefNode::Selector(selector)
    }
}

fn selector_ref_node<'de, D>(deserializer: D) -> std::result::Result<Option<RefNode>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(RefNode::Selector))
}

/// A structured parameter value, serialized to JSON only when needed.
///
/// Encoding can fail (for example a map keyed by tuples), in which case the
/// attribute or query parameter it feeds is dropped.
#[derive(Clone)]
pub struct StructuredValue(Arc<dyn Fn() -> serde_json::Result<String> + Send + Sync>);

impl StructuredValue {
    pub fn encode(&self) -> serde_json::Result<String> {
        (self.0)()
    }
}

impl fmt::Debug for StructuredValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.encode() {
            Ok(json) => write!(f, "StructuredValue({})", json),
            Err(_) => f.write_str("StructuredValue(<unencodable>)"),
        }
    }
}

/// Value of a pass-through identity or catalog parameter
#[derive(Debug, Clone)]
pub enum ParamValue {
    Text(String),
    Structured(StructuredValue),
}

impl ParamValue {
    pub fn structured<T>(value: T) -> Self
    where
        T: Serialize + Send + Sync + 'static,
    {
        ParamValue::Structured(StructuredValue(Arc::new(move || serde_json::to_string(&value))))
    }

    pub fn json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => ParamValue::Text(s),
            other => Self::structured(other),
        }
    }

    /// Empty text and JSON `null` count as unset
    fn is_blank(&self) -> bool {
        match self {
            ParamValue::Text(s) => s.is_empty(),
            ParamValue::Structured(v) => matches!(v.encode().as_deref(), Ok("null")),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<serde_json::Value> for ParamValue {
    fn from(value: serde_json::Value) -> Self {
        ParamValue::json(value)
    }
}

impl<'de> Deserialize<'de> for ParamValue {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(ParamValue::json(serde_json::Value::deserialize(deserializer)?))
    }
}

/// String form of a parameter for a DOM attribute or query string.
///
/// Text is trimmed. Structured values are JSON for the catalog parameters and
/// their plain rendering otherwise (`1`, `true`, or the bare string).
/// Returns `None` for blank values and for values that fail to encode.
pub fn param_string(key: &str, value: &ParamValue) -> Option<String> {
    if value.is_blank() {
        return None;
    }

    match value {
        ParamValue::Text(s) => Some(s.trim().to_string()),
        ParamValue::Structured(v) => match v.encode() {
            Ok(json) if JSON_ALLOWED_PARAMS.contains(&key) => Some(json),
            Ok(json) => Some(
                serde_json::from_str::<String>(&json)
                    .unwrap_or(json)
                    .trim()
                    .to_string(),
            ),
            Err(e) => {
                debug!(param = key, error = %e, "Dropping parameter that cannot be encoded");
                None
            }
        },
    }
}

/// `param_string`, percent-encoded for a URL
pub fn url_encoded_param(key: &str, value: &ParamValue) -> Option<String> {
    param_string(key, value).map(|s| urlencoding::encode(&s).into_owned())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaylistConfig {
    /// Use a `<ul>` container instead of a `<div>`
    pub legacy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlaylistOption {
    Enabled(bool),
    Config(PlaylistConfig),
}

impl PlaylistOption {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, PlaylistOption::Enabled(false))
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, PlaylistOption::Config(PlaylistConfig { legacy: true }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResponsiveConfig {
    /// `width:height`, defaults to 16:9
    pub aspect_ratio: Option<String>,
    /// CSS `max-width` of the outer container, defaults to 100%
    pub max_width: Option<String>,
    /// Iframe embeds reserve extra height for a horizontal playlist
    pub iframe_horizontal_playlist: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsiveOption {
    Enabled(bool),
    Config(ResponsiveConfig),
}

impl ResponsiveOption {
    /// Effective settings, or `None` when responsive wrapping is off
    pub fn config(&self) -> Option<ResponsiveConfig> {
        match self {
            ResponsiveOption::Enabled(true) => Some(ResponsiveConfig::default()),
            ResponsiveOption::Enabled(false) => None,
            ResponsiveOption::Config(c) => Some(c.clone()),
        }
    }
}

/// Rendering modifiers
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbedOptions {
    /// Wrap in a picture-in-picture container
    pub pip: bool,
    /// Add a playlist container after the embed
    pub playlist: Option<PlaylistOption>,
    /// Wrap in intrinsic-ratio containers
    pub responsive: Option<ResponsiveOption>,
    /// `video-js` (default) or `video`
    pub tag_name: Option<String>,
    /// Request the unminified player script
    pub unminified: bool,
}

impl EmbedOptions {
    pub fn tag_name(&self) -> &str {
        match self.tag_name.as_deref() {
            Some(tag) if !tag.is_empty() => tag,
            _ => EMBED_TAG_NAME_VIDEOJS,
        }
    }

    pub fn playlist_enabled(&self) -> bool {
        self.playlist.map(|p| p.is_enabled()).unwrap_or(false)
    }

    pub fn responsive(&self) -> Option<ResponsiveConfig> {
        self.responsive.as_ref().and_then(ResponsiveOption::config)
    }
}

/// Customization hook run on the bare embed before wrapping and insertion.
/// Returning an element makes it the embed from then on.
pub type EmbedCreatedHook = Box<dyn FnOnce(&mut Document, NodeId) -> Option<NodeId> + Send>;
pub type SuccessCallback = Box<dyn FnOnce(&LoadOutcome) + Send>;
pub type FailureCallback = Box<dyn FnOnce(&Error) + Send>;

/// Caller-supplied parameters
#[derive(Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbedParams {
    pub account_id: Option<String>,
    pub player_id: Option<String>,
    pub embed_id: Option<String>,
    pub embed_type: Option<String>,
    #[serde(deserialize_with = "selector_ref_node")]
    pub ref_node: Option<RefNode>,
    pub ref_node_insert: Option<String>,
    pub embed_options: Option<EmbedOptions>,
    /// Handed to the player runtime untouched
    pub options: Option<serde_json::Value>,
    pub player_url: Option<String>,

    pub ad_config_id: Option<ParamValue>,
    pub application_id: Option<ParamValue>,
    pub catalog_search: Option<ParamValue>,
    pub catalog_sequence: Option<ParamValue>,
    pub delivery_config_id: Option<ParamValue>,
    pub playlist_id: Option<ParamValue>,
    pub playlist_video_id: Option<ParamValue>,
    pub poster: Option<ParamValue>,
    pub video_id: Option<ParamValue>,

    #[serde(skip)]
    pub on_embed_created: Option<EmbedCreatedHook>,
    #[serde(skip)]
    pub on_success: Option<SuccessCallback>,
    #[serde(skip)]
    pub on_failure: Option<FailureCallback>,
}

impl EmbedParams {
    pub fn new(account_id: impl Into<String>, ref_node: impl Into<RefNode>) -> Self {
        Self {
            account_id: Some(account_id.into()),
            ref_node: Some(ref_node.into()),
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn with_embed_created<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&mut Document, NodeId) -> Option<NodeId> + Send + 'static,
    {
        self.on_embed_created = Some(Box::new(hook));
        self
    }

    pub fn with_callbacks<S, F>(mut self, on_success: S, on_failure: F) -> Self
    where
        S: FnOnce(&LoadOutcome) + Send + 'static,
        F: FnOnce(&Error) + Send + 'static,
    {
        self.on_success = Some(Box::new(on_success));
        self.on_failure = Some(Box::new(on_failure));
        self
    }
}

/// Canonical, validated request threading through the pipeline
pub struct EmbedRequest {
    pub account_id: Option<String>,
    pub player_id: String,
    pub embed_id: String,
    pub embed_type: EmbedType,
    /// Cleared once the embed has been inserted
    pub ref_node: Option<RefNode>,
    pub ref_node_insert: RefNodeInsert,
    pub embed_options: EmbedOptions,
    pub options: Option<serde_json::Value>,
    pub player_url: Option<String>,

    pub ad_config_id: Option<ParamValue>,
    pub application_id: Option<ParamValue>,
    pub catalog_search: Option<ParamValue>,
    pub catalog_sequence: Option<ParamValue>,
    pub delivery_config_id: Option<ParamValue>,
    pub playlist_id: Option<ParamValue>,
    pub playlist_video_id: Option<ParamValue>,
    pub poster: Option<ParamValue>,
    pub video_id: Option<ParamValue>,

    pub on_embed_created: Option<EmbedCreatedHook>,
}

impl EmbedRequest {
    /// Request with defaults and no target, useful for URL resolution and
    /// cache lookups
    pub fn new(account_id: Option<&str>, player_id: &str, embed_id: &str) -> Self {
        Self {
            account_id: account_id.map(str::to_string),
            player_id: player_id.to_string(),
            embed_id: embed_id.to_string(),
            embed_type: EmbedType::InPage,
            ref_node: None,
            ref_node_insert: RefNodeInsert::Append,
            embed_options: EmbedOptions::default(),
            options: None,
            player_url: None,
            ad_config_id: None,
            application_id: None,
            catalog_search: None,
            catalog_sequence: None,
            delivery_config_id: None,
            playlist_id: None,
            playlist_video_id: None,
            poster: None,
            video_id: None,
            on_embed_created: None,
        }
    }

    /// Pass-through parameter by its camelCase name
    pub fn param(&self, key: &str) -> Option<&ParamValue> {
        match key {
            "adConfigId" => self.ad_config_id.as_ref(),
            "applicationId" => self.application_id.as_ref(),
            "catalogSearch" => self.catalog_search.as_ref(),
            "catalogSequence" => self.catalog_sequence.as_ref(),
            "deliveryConfigId" => self.delivery_config_id.as_ref(),
            "playlistId" => self.playlist_id.as_ref(),
            "playlistVideoId" => self.playlist_video_id.as_ref(),
            "poster" => self.poster.as_ref(),
            "videoId" => self.video_id.as_ref(),
            _ => None,
        }
    }

    pub fn is_iframe(&self) -> bool {
        self.embed_type == EmbedType::Iframe
    }
}

impl fmt::Debug for EmbedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbedRequest")
            .field("account_id", &self.account_id)
            .field("player_id", &self.player_id)
            .field("embed_id", &self.embed_id)
            .field("embed_type", &self.embed_type)
            .field("ref_node", &self.ref_node)
            .field("ref_node_insert", &self.ref_node_insert)
            .field("embed_options", &self.embed_options)
            .field("player_url", &self.player_url)
            .finish_non_exhaustive()
    }
}

/// `digits:digits`, as width and height
pub fn parse_aspect_ratio(value: &str) -> Option<(f64, f64)> {
    let (w, h) = value.split_once(':')?;
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(w) || !digits(h) {
        return None;
    }
    Some((w.parse().ok()?, h.parse().ok()?))
}

fn is_present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.is_empty())
}

/// Merge defaults over `params` and validate.
///
/// Checks run in a fixed order and the first violation wins. The document is
/// only read, to confirm that a node given as `refNode` is attached.
pub fn normalize(params: EmbedParams, doc: &Document) -> Result<EmbedRequest> {
    if !is_present(&params.account_id) && !is_present(&params.player_url) {
        return Err(Error::AccountIdRequired);
    }

    match &params.ref_node {
        None => return Err(Error::RefNodeRequired),
        Some(RefNode::Selector(s)) if s.is_empty() => return Err(Error::RefNodeRequired),
        Some(RefNode::Node(id)) if !doc.is_element(*id) || !doc.is_connected(*id) => {
            return Err(Error::RefNodeDetached)
        }
        Some(_) => {}
    }

    let embed_type = match params.embed_type.as_deref() {
        None => EmbedType::default(),
        Some(value) => EmbedType::parse(value).ok_or(Error::InvalidEmbedType)?,
    };

    if embed_type == EmbedType::Iframe && params.options.is_some() {
        return Err(Error::OptionsWithIframe);
    }

    let embed_options = params.embed_options.unwrap_or_default();

    if let Some(tag) = embed_options.tag_name.as_deref() {
        if !tag.is_empty() && tag != EMBED_TAG_NAME_VIDEO && tag != EMBED_TAG_NAME_VIDEOJS {
            return Err(Error::InvalidTagName(tag.to_string()));
        }
    }

    if let Some(ratio) = embed_options
        .responsive()
        .and_then(|r| r.aspect_ratio)
        .filter(|r| !r.is_empty())
    {
        if parse_aspect_ratio(&ratio).is_none() {
            return Err(Error::InvalidAspectRatio(ratio));
        }
    }

    let ref_node_insert = match params.ref_node_insert.as_deref() {
        None => RefNodeInsert::default(),
        Some(value) => RefNodeInsert::parse(value).ok_or(Error::InvalidRefNodeInsert)?,
    };

    Ok(EmbedRequest {
        account_id: params.account_id.filter(|s| !s.is_empty()),
        player_id: params.player_id.unwrap_or_else(|| DEFAULT_ID.to_string()),
        embed_id: params.embed_id.unwrap_or_else(|| DEFAULT_ID.to_string()),
        embed_type,
        ref_node: params.ref_node,
        ref_node_insert,
        embed_options,
        options: params.options,
        player_url: params.player_url.filter(|s| !s.is_empty()),
        ad_config_id: params.ad_config_id,
        application_id: params.application_id,
        catalog_search: params.catalog_search,
        catalog_sequence: params.catalog_sequence,
        delivery_config_id: params.delivery_config_id,
        playlist_id: params.playlist_id,
        playlist_video_id: params.playlist_video_id,
        poster: params.poster,
        video_id: params.video_id,
        on_embed_created: params.on_embed_created,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn params_for(doc: &Document) -> EmbedParams {
        EmbedParams::new("1", doc.body())
    }

    fn err(params: EmbedParams, doc: &Document) -> Error {
        match normalize(params, doc) {
            Err(e) => e,
            Ok(_) => panic!("expected a validation error"),
        }
    }

    #[test]
    fn test_defaults_are_merged() {
        let doc = Document::new();
        let req = normalize(params_for(&doc), &doc).unwrap();
        assert_eq!(req.player_id, "default");
        assert_eq!(req.embed_id, "default");
        assert_eq!(req.embed_type, EmbedType::InPage);
        assert_eq!(req.ref_node_insert, RefNodeInsert::Append);
        assert_eq!(req.embed_options.tag_name(), "video-js");
    }

    #[test]
    fn test_account_id_checked_first() {
        let doc = Document::new();
        let params = EmbedParams {
            embed_type: Some("bogus".into()),
            ref_node_insert: Some("bogus".into()),
            ..Default::default()
        };
        assert!(matches!(err(params, &doc), Error::AccountIdRequired));
        assert!(matches!(err(EmbedParams::default(), &doc), Error::AccountIdRequired));
    }

    #[test]
    fn test_player_url_allows_missing_account() {
        let doc = Document::new();
        let params = EmbedParams {
            player_url: Some("https://cdn.example/player.js".into()),
            ref_node: Some(doc.body().into()),
            ..Default::default()
        };
        let req = normalize(params, &doc).unwrap();
        assert_eq!(req.account_id, None);
    }

    #[test]
    fn test_ref_node_rules() {
        let mut doc = Document::new();
        let detached = doc.create_element("div");
        let text = doc.create_text("x");
        doc.append_child(doc.body(), text);

        let missing = EmbedParams {
            account_id: Some("1".into()),
            ..Default::default()
        };
        assert!(matches!(err(missing, &doc), Error::RefNodeRequired));
        assert!(matches!(err(EmbedParams::new("1", ""), &doc), Error::RefNodeRequired));
        assert!(matches!(err(EmbedParams::new("1", detached), &doc), Error::RefNodeDetached));
        assert!(matches!(err(EmbedParams::new("1", text), &doc), Error::RefNodeDetached));

        // Selectors are resolved later, at insertion
        assert!(normalize(EmbedParams::new("1", "#nowhere"), &doc).is_ok());
    }

    #[test]
    fn test_embed_type_and_options() {
        let doc = Document::new();

        let mut params = params_for(&doc);
        params.embed_type = Some("popup".into());
        assert!(matches!(err(params, &doc), Error::InvalidEmbedType));

        let mut params = params_for(&doc);
        params.embed_type = Some("iframe".into());
        params.options = Some(json!({"autoplay": true}));
        assert!(matches!(err(params, &doc), Error::OptionsWithIframe));
    }

    #[test]
    fn test_tag_name_validation() {
        let doc = Document::new();
        for (tag, ok) in [("video", true), ("video-js", true), ("", true), ("audio", false)] {
            let mut params = params_for(&doc);
            params.embed_options = Some(EmbedOptions {
                tag_name: Some(tag.into()),
                ..Default::default()
            });
            assert_eq!(normalize(params, &doc).is_ok(), ok, "tag {:?}", tag);
        }
    }

    #[test]
    fn test_aspect_ratio_validation() {
        let doc = Document::new();
        let mut params = params_for(&doc);
        params.embed_options = Some(EmbedOptions {
            responsive: Some(ResponsiveOption::Config(ResponsiveConfig {
                aspect_ratio: Some("4x3".into()),
                ..Default::default()
            })),
            ..Default::default()
        });
        match err(params, &doc) {
            Error::InvalidAspectRatio(v) => assert_eq!(v, "4x3"),
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(parse_aspect_ratio("4:3"), Some((4.0, 3.0)));
        assert_eq!(parse_aspect_ratio("16:"), None);
        assert_eq!(parse_aspect_ratio("1.5:1"), None);
    }

    #[test]
    fn test_ref_node_insert_checked_last() {
        let doc = Document::new();
        let mut params = params_for(&doc);
        params.ref_node_insert = Some("inside".into());
        assert!(matches!(err(params, &doc), Error::InvalidRefNodeInsert));

        let mut params = params_for(&doc);
        params.ref_node_insert = Some("replace".into());
        assert_eq!(normalize(params, &doc).unwrap().ref_node_insert, RefNodeInsert::Replace);
    }

    #[test]
    fn test_from_json() {
        let params = EmbedParams::from_json(
            r##"{
                "accountId": "1",
                "playerId": "abc",
                "refNode": "#player",
                "embedOptions": {"playlist": {"legacy": true}, "responsive": true, "pip": true},
                "catalogSearch": {"q": "tags:sports"},
                "videoId": 123
            }"##,
        )
        .unwrap();

        assert_eq!(params.ref_node, Some(RefNode::Selector("#player".into())));
        let options = params.embed_options.unwrap();
        assert!(options.pip && options.playlist_enabled());
        assert!(options.playlist.unwrap().is_legacy());
        assert_eq!(options.responsive(), Some(ResponsiveConfig::default()));
        assert_eq!(
            param_string("catalogSearch", params.catalog_search.as_ref().unwrap()).as_deref(),
            Some(r#"{"q":"tags:sports"}"#)
        );
        assert_eq!(param_string("videoId", params.video_id.as_ref().unwrap()).as_deref(), Some("123"));
    }

    #[test]
    fn test_param_string() {
        assert_eq!(param_string("x", &"  foo \t".into()).as_deref(), Some("foo"));
        assert_eq!(param_string("x", &"".into()), None);
        assert_eq!(param_string("x", &ParamValue::structured(1)).as_deref(), Some("1"));
        assert_eq!(
            param_string("catalogSearch", &ParamValue::json(json!([{"x": 1}]))).as_deref(),
            Some(r#"[{"x":1}]"#)
        );
        assert_eq!(param_string("catalogSearch", &ParamValue::json(json!(null))), None);

        // Maps with non-string keys cannot be JSON-encoded
        let mut unencodable = HashMap::new();
        unencodable.insert((1, 2), "x");
        assert_eq!(param_string("catalogSearch", &ParamValue::structured(unencodable)), None);
    }

    #[test]
    fn test_url_encoded_param() {
        assert_eq!(url_encoded_param("x", &"  ? \t".into()).as_deref(), Some("%3F"));
        assert_eq!(
            url_encoded_param("catalogSearch", &ParamValue::json(json!([{"x": 1}]))).as_deref(),
            Some("%5B%7B%22x%22%3A1%7D%5D")
        );
    }
}
