//! Embed construction and insertion
//!
//! Builds the bare embed (an iframe or an in-page player element), lets the
//! caller customize it, wraps it for picture-in-picture and responsive
//! sizing, and inserts the result relative to the reference node.

use crate::dom::{Document, NodeId};
use crate::params::{
    param_string, parse_aspect_ratio, EmbedOptions, EmbedRequest, EmbedType, RefNode,
    RefNodeInsert, DEFAULT_ASPECT_RATIO, DEFAULT_MAX_WIDTH,
};
use crate::url::UrlResolver;
use crate::{Error, Result};
use tracing::debug;

/// Pass-through parameters and the in-page attributes they map to. Account,
/// player and embed ids are not mapped; players are initialized explicitly,
/// never by attribute scanning.
const PARAM_ATTRIBUTES: &[(&str, &str)] = &[
    ("adConfigId", "data-ad-config-id"),
    ("applicationId", "data-application-id"),
    ("catalogSearch", "data-catalog-search"),
    ("catalogSequence", "data-catalog-sequence"),
    ("deliveryConfigId", "data-delivery-config-id"),
    ("playlistId", "data-playlist-id"),
    ("playlistVideoId", "data-playlist-video-id"),
    ("poster", "poster"),
    ("videoId", "data-video-id"),
];

pub const IFRAME_ALLOW: &str = "autoplay;encrypted-media;fullscreen";
pub const PIP_CONTAINER_CLASS: &str = "vjs-pip-container";
pub const PLAYLIST_CLASS: &str = "vjs-playlist";

/// Where an embed ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbedPlacement {
    /// The element handed to the player runtime
    pub embed: NodeId,
    /// Outermost inserted node: the embed or its outermost wrapper
    pub root: NodeId,
    /// Playlist container inserted after the embed
    pub playlist: Option<NodeId>,
    /// The resolved reference node
    pub target: NodeId,
    /// Parent of the reference node at insertion time
    pub target_parent: Option<NodeId>,
}

/// Resolve `refNode` to an element with a parent.
pub fn resolve_ref_node(doc: &Document, ref_node: Option<&RefNode>) -> Result<NodeId> {
    match ref_node {
        None => Err(Error::RefNodeRequired),
        Some(RefNode::Selector(selector)) => doc
            .query_selector(selector)
            .filter(|&n| doc.is_element(n) && doc.parent(n).is_some())
            .ok_or_else(|| Error::RefNodeNotFound(selector.clone())),
        Some(RefNode::Node(id)) => {
            if doc.is_element(*id) && doc.is_connected(*id) && doc.parent(*id).is_some() {
                Ok(*id)
            } else {
                Err(Error::RefNodeDetached)
            }
        }
    }
}

fn create_iframe_embed(doc: &mut Document, request: &EmbedRequest, urls: &UrlResolver) -> NodeId {
    let el = doc.create_element("iframe");
    doc.set_attribute(el, "allow", IFRAME_ALLOW);
    doc.set_attribute(el, "allowfullscreen", "allowfullscreen");
    doc.set_attribute(el, "src", &urls.resolve(request));
    el
}

fn create_in_page_embed(doc: &mut Document, request: &EmbedRequest) -> NodeId {
    let el = doc.create_element(request.embed_options.tag_name());

    for &(key, attr) in PARAM_ATTRIBUTES {
        if let Some(value) = request.param(key).and_then(|v| param_string(key, v)) {
            doc.set_attribute(el, attr, &value);
        }
    }

    doc.set_attribute(el, "controls", "controls");
    doc.add_class(el, "video-js");
    el
}

fn wrap_responsive(
    doc: &mut Document,
    embed_type: EmbedType,
    options: &EmbedOptions,
    el: NodeId,
) -> NodeId {
    let Some(responsive) = options.responsive() else {
        return el;
    };

    for (prop, value) in [
        ("position", "absolute"),
        ("top", "0px"),
        ("right", "0px"),
        ("bottom", "0px"),
        ("left", "0px"),
        ("width", "100%"),
        ("height", "100%"),
    ] {
        doc.set_style(el, prop, value);
    }

    let ratio = responsive
        .aspect_ratio
        .as_deref()
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_ASPECT_RATIO);
    let max_width = responsive
        .max_width
        .as_deref()
        .filter(|w| !w.is_empty())
        .unwrap_or(DEFAULT_MAX_WIDTH);

    let mut padding_top = padding_percent(ratio);

    // A horizontal playlist takes a fifth of an iframe's height
    if embed_type == EmbedType::Iframe && responsive.iframe_horizontal_playlist {
        padding_top *= 1.25;
    }

    let inner = doc.create_element("div");
    doc.set_style(inner, "padding-top", &format!("{}%", padding_top));
    doc.append_child(inner, el);

    let outer = doc.create_element("div");
    doc.set_style(outer, "position", "relative");
    doc.set_style(outer, "display", "block");
    doc.set_style(outer, "max-width", max_width);
    doc.append_child(outer, inner);

    outer
}

/// `height / width * 100` for a `width:height` ratio
pub fn padding_percent(aspect_ratio: &str) -> f64 {
    match parse_aspect_ratio(aspect_ratio) {
        Some((w, h)) if w > 0.0 => h / w * 100.0,
        _ => {
            debug!(aspect_ratio, "Unusable aspect ratio, using the default");
            9.0 / 16.0 * 100.0
        }
    }
}

fn wrap_pip(doc: &mut Document, options: &EmbedOptions, el: NodeId) -> NodeId {
    if !options.pip {
        return el;
    }

    let pip = doc.create_element("div");
    doc.add_class(pip, PIP_CONTAINER_CLASS);
    doc.append_child(pip, el);
    pip
}

fn insert(doc: &mut Document, mode: RefNodeInsert, target: NodeId, node: NodeId) {
    let parent = doc.parent(target);

    match (mode, parent) {
        (RefNodeInsert::Before, Some(parent)) => doc.insert_before(parent, node, Some(target)),
        (RefNodeInsert::After, Some(parent)) => {
            let next = doc.next_element_sibling(target);
            doc.insert_before(parent, node, next);
        }
        (RefNodeInsert::Replace, Some(parent)) => doc.replace_child(parent, node, target),
        (RefNodeInsert::Prepend, _) => {
            let first = doc.first_child(target);
            doc.insert_before(target, node, first);
        }
        _ => doc.append_child(target, node),
    }
}

/// Create, customize, wrap and insert the embed for `request`.
///
/// The reference node is resolved before anything is created, so a bad
/// `refNode` leaves the document untouched. On success `request.ref_node` is
/// cleared and the returned placement names the real embed element, never a
/// wrapper.
pub fn create_embed(
    doc: &mut Document,
    request: &mut EmbedRequest,
    urls: &UrlResolver,
) -> Result<EmbedPlacement> {
    let target = resolve_ref_node(doc, request.ref_node.as_ref())?;
    let target_parent = doc.parent(target);

    let mut embed = match request.embed_type {
        EmbedType::Iframe => create_iframe_embed(doc, request, urls),
        EmbedType::InPage => create_in_page_embed(doc, request),
    };

    if let Some(hook) = request.on_embed_created.take() {
        if let Some(replacement) = hook(doc, embed) {
            if doc.is_element(replacement) {
                embed = replacement;
            }
        }
    }

    let options = &request.embed_options;
    let wrapped = wrap_responsive(doc, request.embed_type, options, embed);
    let root = wrap_pip(doc, options, wrapped);

    insert(doc, request.ref_node_insert, target, root);

    // Needs the final position of the embed, so it comes after insertion
    let playlist = if options.playlist_enabled() {
        let legacy = options.playlist.map(|p| p.is_legacy()).unwrap_or(false);
        let playlist = doc.create_element(if legacy { "ul" } else { "div" });
        doc.add_class(playlist, PLAYLIST_CLASS);
        if let Some(parent) = doc.parent(embed) {
            let next = doc.next_element_sibling(embed);
            doc.insert_before(parent, playlist, next);
        }
        Some(playlist)
    } else {
        None
    };

    request.ref_node = None;

    debug!(
        embed = %embed,
        root = %root,
        mode = %request.ref_node_insert,
        embed_type = %request.embed_type,
        "Embed inserted"
    );

    Ok(EmbedPlacement {
        embed,
        root,
        playlist,
        target,
        target_parent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{
        EmbedOptions, ParamValue, PlaylistConfig, PlaylistOption, ResponsiveConfig,
        ResponsiveOption,
    };
    use serde_json::json;
    use std::collections::HashMap;

    struct Page {
        doc: Document,
        container: NodeId,
        first: NodeId,
        last: NodeId,
    }

    /// `<div id="container"><p id="first"></p><p id="last"></p></div>`
    fn page() -> Page {
        let mut doc = Document::new();
        let container = doc.create_element("div");
        doc.set_attribute(container, "id", "container");
        doc.append_child(doc.body(), container);

        let first = doc.create_element("p");
        doc.set_attribute(first, "id", "first");
        let last = doc.create_element("p");
        doc.set_attribute(last, "id", "last");
        doc.append_child(container, first);
        doc.append_child(container, last);

        Page { doc, container, first, last }
    }

    fn request_at(target: impl Into<RefNode>) -> EmbedRequest {
        let mut req = EmbedRequest::new(Some("1"), "2", "3");
        req.ref_node = Some(target.into());
        req
    }

    fn build(page: &mut Page, req: &mut EmbedRequest) -> EmbedPlacement {
        create_embed(&mut page.doc, req, &UrlResolver::default()).unwrap()
    }

    #[test]
    fn test_in_page_embed_attributes() {
        let mut p = page();
        let mut req = request_at(p.container);
        req.application_id = Some(" app ".into());
        req.catalog_search = Some(ParamValue::json(json!({"q": "tags:x"})));
        req.catalog_sequence = Some(ParamValue::json(json!([{"x": 1}])));
        req.video_id = Some(ParamValue::structured(42));
        req.poster = Some("https://img.example/p.jpg".into());
        req.playlist_id = Some("".into());

        let placed = build(&mut p, &mut req);
        let doc = &p.doc;
        let el = placed.embed;

        assert_eq!(doc.tag_name(el), Some("video-js"));
        assert_eq!(doc.attribute(el, "data-application-id").as_deref(), Some("app"));
        assert_eq!(doc.attribute(el, "data-catalog-search").as_deref(), Some(r#"{"q":"tags:x"}"#));
        assert_eq!(doc.attribute(el, "data-catalog-sequence").as_deref(), Some(r#"[{"x":1}]"#));
        assert_eq!(doc.attribute(el, "data-video-id").as_deref(), Some("42"));
        assert_eq!(doc.attribute(el, "poster").as_deref(), Some("https://img.example/p.jpg"));
        assert!(!doc.has_attribute(el, "data-playlist-id"));
        assert!(!doc.has_attribute(el, "data-account"));
        assert_eq!(doc.attribute(el, "controls").as_deref(), Some("controls"));
        assert!(doc.has_class(el, "video-js"));
        assert_eq!(placed.root, el);
        assert_eq!(req.ref_node, None);
    }

    #[test]
    fn test_unencodable_catalog_value_is_omitted() {
        let mut bad = HashMap::new();
        bad.insert((1, 1), "x");

        let mut p = page();
        let mut req = request_at(p.container);
        req.catalog_search = Some(ParamValue::structured(bad));
        let placed = build(&mut p, &mut req);
        assert!(!p.doc.has_attribute(placed.embed, "data-catalog-search"));
    }

    #[test]
    fn test_video_tag_name() {
        let mut p = page();
        let mut req = request_at(p.container);
        req.embed_options.tag_name = Some("video".into());
        let placed = build(&mut p, &mut req);
        assert_eq!(p.doc.tag_name(placed.embed), Some("video"));
    }

    #[test]
    fn test_iframe_embed() {
        let mut p = page();
        let mut req = request_at(p.container);
        req.embed_type = EmbedType::Iframe;
        req.video_id = Some("v1".into());

        let placed = build(&mut p, &mut req);
        let doc = &p.doc;
        assert_eq!(doc.tag_name(placed.embed), Some("iframe"));
        assert_eq!(doc.attribute(placed.embed, "allow").as_deref(), Some(IFRAME_ALLOW));
        assert_eq!(
            doc.attribute(placed.embed, "allowfullscreen").as_deref(),
            Some("allowfullscreen")
        );
        assert_eq!(
            doc.attribute(placed.embed, "src").as_deref(),
            Some("https://players.brightcove.net/1/2_3/index.html?videoId=v1")
        );
        assert!(!doc.has_attribute(placed.embed, "data-video-id"));
    }

    #[test]
    fn test_insert_append_and_prepend() {
        let mut p = page();
        let mut req = request_at(p.container);
        let placed = build(&mut p, &mut req);
        assert_eq!(p.doc.children(p.container), &[p.first, p.last, placed.embed]);

        let mut p = page();
        let mut req = request_at(p.container);
        req.ref_node_insert = RefNodeInsert::Prepend;
        let placed = build(&mut p, &mut req);
        assert_eq!(p.doc.children(p.container), &[placed.embed, p.first, p.last]);
    }

    #[test]
    fn test_insert_before_and_after() {
        let mut p = page();
        let mut req = request_at(p.last);
        req.ref_node_insert = RefNodeInsert::Before;
        let placed = build(&mut p, &mut req);
        assert_eq!(p.doc.children(p.container), &[p.first, placed.embed, p.last]);
        assert!(p.doc.children(p.last).is_empty());

        let mut p = page();
        let mut req = request_at(p.first);
        req.ref_node_insert = RefNodeInsert::After;
        let placed = build(&mut p, &mut req);
        assert_eq!(p.doc.children(p.container), &[p.first, placed.embed, p.last]);
        assert!(p.doc.children(p.first).is_empty());
    }

    #[test]
    fn test_insert_replace() {
        let mut p = page();
        let mut req = request_at(p.first);
        req.ref_node_insert = RefNodeInsert::Replace;
        let placed = build(&mut p, &mut req);
        assert_eq!(p.doc.children(p.container), &[placed.embed, p.last]);
        assert!(!p.doc.is_connected(p.first));
        assert_eq!(placed.target_parent, Some(p.container));
    }

    #[test]
    fn test_selector_ref_node() {
        let mut p = page();
        let placed = build(&mut p, &mut request_at("#last"));
        assert_eq!(p.doc.parent(placed.embed), Some(p.last));
    }

    #[test]
    fn test_unresolved_selector_leaves_document_untouched() {
        let mut p = page();
        let before = p.doc.to_html(p.doc.root());
        let hook_ran = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = hook_ran.clone();

        let mut req = request_at("#missing");
        req.on_embed_created = Some(Box::new(move |_: &mut Document, _: NodeId| {
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
            None
        }));

        let err = create_embed(&mut p.doc, &mut req, &UrlResolver::default()).unwrap_err();
        assert!(matches!(err, Error::RefNodeNotFound(ref s) if s == "#missing"));
        assert_eq!(p.doc.to_html(p.doc.root()), before);
        assert!(!hook_ran.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn test_responsive_defaults() {
        let mut p = page();
        let mut req = request_at(p.container);
        req.embed_options.responsive = Some(ResponsiveOption::Enabled(true));
        let placed = build(&mut p, &mut req);
        let doc = &p.doc;

        let inner = doc.parent(placed.embed).unwrap();
        let outer = doc.parent(inner).unwrap();
        assert_eq!(placed.root, outer);
        assert_eq!(doc.parent(outer), Some(p.container));
        assert_eq!(doc.style(inner, "padding-top"), Some("56.25%"));
        assert_eq!(doc.style(outer, "max-width"), Some("100%"));
        assert_eq!(doc.style(outer, "position"), Some("relative"));
        assert_eq!(doc.style(placed.embed, "position"), Some("absolute"));
        assert_eq!(doc.style(placed.embed, "width"), Some("100%"));
        assert_eq!(doc.style(placed.embed, "height"), Some("100%"));
    }

    #[test]
    fn test_responsive_custom_ratio() {
        let mut p = page();
        let mut req = request_at(p.container);
        req.embed_options.responsive = Some(ResponsiveOption::Config(ResponsiveConfig {
            aspect_ratio: Some("4:3".into()),
            max_width: Some("960px".into()),
            ..Default::default()
        }));
        let placed = build(&mut p, &mut req);
        let inner = p.doc.parent(placed.embed).unwrap();
        let outer = p.doc.parent(inner).unwrap();
        assert_eq!(p.doc.style(inner, "padding-top"), Some("75%"));
        assert_eq!(p.doc.style(outer, "max-width"), Some("960px"));
    }

    #[test]
    fn test_iframe_horizontal_playlist_padding() {
        let mut p = page();
        let mut req = request_at(p.container);
        req.embed_type = EmbedType::Iframe;
        req.embed_options.responsive = Some(ResponsiveOption::Config(ResponsiveConfig {
            iframe_horizontal_playlist: true,
            ..Default::default()
        }));
        let placed = build(&mut p, &mut req);
        let inner = p.doc.parent(placed.embed).unwrap();
        assert_eq!(p.doc.style(inner, "padding-top"), Some("70.3125%"));
    }

    #[test]
    fn test_pip_wraps_responsive() {
        let mut p = page();
        let mut req = request_at(p.container);
        req.embed_options = EmbedOptions {
            pip: true,
            responsive: Some(ResponsiveOption::Enabled(true)),
            ..Default::default()
        };
        let placed = build(&mut p, &mut req);
        let doc = &p.doc;

        assert!(doc.has_class(placed.root, PIP_CONTAINER_CLASS));
        let outer = doc.first_child(placed.root).unwrap();
        assert_eq!(doc.style(outer, "position"), Some("relative"));
        let inner = doc.first_child(outer).unwrap();
        assert_eq!(doc.first_child(inner), Some(placed.embed));
    }

    #[test]
    fn test_playlist_follows_embed_inside_wrappers() {
        let mut p = page();
        let mut req = request_at(p.container);
        req.embed_options = EmbedOptions {
            pip: true,
            playlist: Some(PlaylistOption::Enabled(true)),
            ..Default::default()
        };
        let placed = build(&mut p, &mut req);
        let playlist = placed.playlist.unwrap();

        assert_eq!(p.doc.tag_name(playlist), Some("div"));
        assert!(p.doc.has_class(playlist, PLAYLIST_CLASS));
        assert_eq!(p.doc.children(placed.root), &[placed.embed, playlist]);
    }

    #[test]
    fn test_legacy_playlist_without_wrappers() {
        let mut p = page();
        let mut req = request_at(p.first);
        req.ref_node_insert = RefNodeInsert::After;
        req.embed_options.playlist = Some(PlaylistOption::Config(PlaylistConfig { legacy: true }));
        let placed = build(&mut p, &mut req);
        let playlist = placed.playlist.unwrap();

        assert_eq!(p.doc.tag_name(playlist), Some("ul"));
        assert_eq!(p.doc.children(p.container), &[p.first, placed.embed, playlist, p.last]);
    }

    #[test]
    fn test_embed_created_hook_replaces_embed() {
        let mut p = page();
        let mut req = request_at(p.container);
        req.on_embed_created = Some(Box::new(|doc: &mut Document, bare| {
            doc.set_attribute(bare, "data-custom", "1");
            let wrapper = doc.create_element("video");
            doc.set_attribute(wrapper, "data-replacement", "yes");
            Some(wrapper)
        }));
        let placed = build(&mut p, &mut req);
        assert_eq!(p.doc.attribute(placed.embed, "data-replacement").as_deref(), Some("yes"));
        assert_eq!(p.doc.children(p.container).last(), Some(&placed.embed));
    }

    #[test]
    fn test_embed_created_hook_mutates_in_place() {
        let mut p = page();
        let mut req = request_at(p.container);
        req.on_embed_created = Some(Box::new(|doc: &mut Document, bare| {
            doc.set_attribute(bare, "data-custom", "1");
            None
        }));
        let placed = build(&mut p, &mut req);
        assert_eq!(p.doc.attribute(placed.embed, "data-custom").as_deref(), Some("1"));
        assert!(req.on_embed_created.is_none());
    }
}
