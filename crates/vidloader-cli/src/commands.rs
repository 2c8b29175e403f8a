//! CLI command implementations

use crate::output::{format_output, print_status, OutputFormat};
use crate::PlayerArgs;
use anyhow::Context;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;
use vidloader_core::{
    EmbedParams, EmbedRequest, EmbedType, Environment, HeadlessHost, HttpScriptHost, LoadOutcome,
    Loader, LoaderConfig, ParamValue, RefNode, UrlResolver,
};

/// Load configuration from `path`, or from the environment
pub fn load_config(path: Option<&Path>) -> anyhow::Result<LoaderConfig> {
    let config = match path {
        Some(path) => LoaderConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => LoaderConfig::from_env()?,
    };
    debug!(base_url = %config.base_url, "Configuration loaded");
    Ok(config)
}

fn resolver(config: &LoaderConfig, args: &PlayerArgs) -> anyhow::Result<UrlResolver> {
    let base = args.base.as_deref().unwrap_or(&config.base_url);
    Url::parse(base).with_context(|| format!("invalid base URL {:?}", base))?;
    Ok(UrlResolver::new(base))
}

fn request(args: &PlayerArgs) -> EmbedRequest {
    let mut request = EmbedRequest::new(Some(&args.account), &args.player, &args.embed);
    if args.iframe {
        request.embed_type = EmbedType::Iframe;
    }
    request.embed_options.unminified = args.unminified;
    request.video_id = args.video_id.clone().map(ParamValue::Text);
    request.playlist_id = args.playlist_id.clone().map(ParamValue::Text);
    request
}

#[derive(Serialize)]
struct UrlReport {
    url: String,
    cache_key: String,
    embed_type: EmbedType,
}

/// Print the resolved URL for a player
pub fn url(config: &LoaderConfig, args: &PlayerArgs, format: &str) -> anyhow::Result<()> {
    let request = request(args);
    let report = UrlReport {
        url: resolver(config, args)?.resolve(&request),
        cache_key: vidloader_core::ScriptCache::key(&request),
        embed_type: request.embed_type,
    };

    if format == "json" {
        println!("{}", format_output(&report, format));
    } else {
        println!("{}", report.url);
    }
    Ok(())
}

#[derive(Serialize)]
struct RenderReport {
    embed_type: EmbedType,
    player_id: Option<String>,
    html: String,
}

/// Run a load against a headless page and print the resulting markup
pub async fn render(
    config: &LoaderConfig,
    path: &Path,
    fragment: bool,
    format: &str,
) -> anyhow::Result<()> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading parameters {}", path.display()))?;
    let mut params = EmbedParams::from_json(&json).context("parsing embed parameters")?;
    if params.ref_node.is_none() {
        params.ref_node = Some(RefNode::Selector("body".into()));
    }
    let target = match &params.ref_node {
        Some(RefNode::Selector(s)) => s.clone(),
        _ => "body".to_string(),
    };

    let host = Arc::new(HeadlessHost::new(config));
    let env = Environment::new(config.clone(), host);
    let loader = Loader::new(env.clone());

    let outcome = loader.load(params).await?;
    info!(embed_type = %outcome.embed_type(), "Embed rendered");

    let doc = env.document().await;
    // A replaced target is gone, and then the whole page is printed
    let html = match doc.query_selector(&target) {
        Some(node) if fragment => doc.to_html(node),
        _ => doc.to_html(doc.root()),
    };

    let report = RenderReport {
        embed_type: outcome.embed_type(),
        player_id: match &outcome {
            LoadOutcome::InPage { player, .. } => Some(player.id().to_string()),
            LoadOutcome::Iframe { .. } => None,
        },
        html,
    };

    if format == "json" {
        println!("{}", format_output(&report, format));
    } else {
        println!("{}", report.html);
    }
    Ok(())
}

/// Progress line printed before probing; JSON output stays a single document
fn check_banner(src: &str, format: &str) -> Option<String> {
    match OutputFormat::from(format) {
        OutputFormat::Json => None,
        OutputFormat::Text => Some(format!("Checking: {}", src)),
    }
}

/// Probe the player URL. Returns whether it was served successfully.
pub async fn check(config: &LoaderConfig, args: &PlayerArgs, format: &str) -> anyhow::Result<bool> {
    let src = resolver(config, args)?.resolve(&request(args));
    if let Some(banner) = check_banner(&src, format) {
        println!("{}", banner);
    }

    let host = HttpScriptHost::new(config)?;
    let report = host.probe(&src).await?;

    if format == "json" {
        println!("{}", format_output(&report, format));
    } else {
        print_status(report.is_success(), &format!("HTTP {}", report.status));
        if let Some(content_type) = &report.content_type {
            println!("  Content-Type: {}", content_type);
        }
        if let Some(length) = report.content_length {
            println!("  Content-Length: {} bytes", length);
        }
    }

    Ok(report.is_success())
}
