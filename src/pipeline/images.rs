//! Image resolution: make every image the engine needs a local file.
//!
//! Two entry points:
//!
//! * [`resolve_markup`] / [`resolve_fragments`] scan LaTeX for
//!   `\includegraphics[width=...]{<source>}`, download every distinct remote
//!   source into the workspace photo area, and rewrite each reference whose
//!   download succeeded to `./Photo/Qpbank/<file>`. Local references are left
//!   alone, so running the resolver on its own output is a no-op.
//! * [`resolve_named_images`] materialises the request's `images` map
//!   (name → URL, inline base64, or local path) under the given names.
//!
//! ## Failure policy
//!
//! Every image is best-effort. A failed fetch, decode or copy becomes an
//! [`AssetWarning`] in the returned [`ImageReport`]; it never aborts sibling
//! downloads or the request. Downloads run concurrently and are joined as a
//! batch before the caller moves on to rendering.

use crate::error::{AssetWarning, Qp2PdfError};
use crate::pipeline::workspace::Workspace;
use crate::progress::CompileProgressCallback;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// `\includegraphics[width=<...>]{<source>}`; group 1 is the sizing
/// attribute, group 2 the source.
static RE_INCLUDEGRAPHICS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\includegraphics\[(width=[^\]]*)\]\{([^}]+)\}").unwrap());

/// Marker that introduces inline image data.
const INLINE_PREFIX: &str = "data:image";

// ── Classification ───────────────────────────────────────────────────────

/// Where an image source string points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource<'a> {
    /// `http://` or `https://` URL.
    RemoteUrl(&'a str),
    /// Base64 payload following `data:image/...;base64,`.
    InlineEncoded(&'a str),
    /// Existing file on the local filesystem.
    LocalPath(&'a Path),
    /// None of the above.
    Unrecognized,
}

/// Check if the source string looks like a URL.
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Classify an image source string.
pub fn classify(source: &str) -> ImageSource<'_> {
    if is_url(source) {
        return ImageSource::RemoteUrl(source);
    }
    if source.starts_with(INLINE_PREFIX) {
        return match source.split_once(',') {
            Some((_, payload)) => ImageSource::InlineEncoded(payload),
            None => ImageSource::Unrecognized,
        };
    }
    let path = Path::new(source);
    if path.is_file() {
        return ImageSource::LocalPath(path);
    }
    ImageSource::Unrecognized
}

// ── Report ───────────────────────────────────────────────────────────────

/// Outcome of a resolution pass.
#[derive(Debug, Clone, Default)]
pub struct ImageReport {
    /// File names written to the photo area.
    pub resolved: Vec<String>,
    /// Per-image failures; informational only.
    pub warnings: Vec<AssetWarning>,
}

impl ImageReport {
    pub fn merge(&mut self, other: ImageReport) {
        self.resolved.extend(other.resolved);
        self.warnings.extend(other.warnings);
    }

    fn record(
        &mut self,
        name: &str,
        outcome: Result<usize, AssetWarning>,
        progress: Option<&dyn CompileProgressCallback>,
    ) {
        match outcome {
            Ok(bytes) => {
                info!("Resolved image {} ({} bytes)", name, bytes);
                if let Some(cb) = progress {
                    cb.on_image_resolved(name, bytes);
                }
                self.resolved.push(name.to_string());
            }
            Err(w) => {
                warn!("{}", w);
                if let Some(cb) = progress {
                    cb.on_image_failed(name, w.to_string());
                }
                self.warnings.push(w);
            }
        }
    }
}

// ── Fetching ─────────────────────────────────────────────────────────────

/// HTTP client scoped to one request.
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: reqwest::Client,
}

impl ImageFetcher {
    /// Build a client whose every request is bounded by `timeout_secs`.
    pub fn new(timeout_secs: u64) -> Result<Self, Qp2PdfError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Qp2PdfError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Download `url` and write the body to `dest`.
    pub async fn fetch_to(&self, url: &str, dest: &Path) -> Result<usize, AssetWarning> {
        let failed = |reason: String| AssetWarning::DownloadFailed {
            url: url.to_string(),
            reason,
        };

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                failed("timed out".to_string())
            } else {
                failed(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(failed(format!("HTTP {}", response.status())));
        }

        let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
        write_asset(dest, &bytes).await?;
        Ok(bytes.len())
    }
}

async fn write_asset(dest: &Path, bytes: &[u8]) -> Result<(), AssetWarning> {
    tokio::fs::write(dest, bytes)
        .await
        .map_err(|e| AssetWarning::WriteFailed {
            name: file_label(dest),
            reason: e.to_string(),
        })
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ── File naming ──────────────────────────────────────────────────────────

/// Local file name for a remote image.
///
/// Uses the last URL path segment, with characters TeX or the filesystem
/// would trip over replaced by `_`. Falls back to
/// `downloaded_image_<hash>.jpg` when the URL has no usable segment.
pub fn file_name_for_url(url: &str) -> String {
    let segment = reqwest::Url::parse(url).ok().and_then(|parsed| {
        parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))
    });

    match segment {
        Some(s) if !s.is_empty() && s != "." && s != ".." => sanitise_file_name(&s),
        _ => format!("downloaded_image_{}.jpg", short_hash(url)),
    }
}

fn sanitise_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn short_hash(s: &str) -> String {
    let digest = Sha256::digest(s.as_bytes());
    hex::encode(&digest[..8])
}

/// Returns `true` if `name` can be used directly as a file in the photo area.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

/// Assign each distinct URL a distinct file name.
///
/// Names already present in `photo_dir` (named images, earlier passes) are
/// never reused, so a download cannot overwrite another file.
fn plan_downloads(urls: BTreeSet<&str>, photo_dir: &Path) -> BTreeMap<String, String> {
    let mut plan = BTreeMap::new();
    let mut taken = BTreeSet::new();
    for url in urls {
        let mut name = file_name_for_url(url);
        if photo_dir.join(&name).exists() || !taken.insert(name.clone()) {
            name = format!("{}_{}", short_hash(url), name);
            taken.insert(name.clone());
        }
        plan.insert(url.to_string(), name);
    }
    plan
}

// ── Markup resolution ────────────────────────────────────────────────────

/// Resolve remote images referenced in one markup string.
///
/// Returns the rewritten markup; text without remote references is
/// returned unchanged.
pub async fn resolve_markup(
    markup: &str,
    workspace: &Workspace,
    fetcher: &ImageFetcher,
    progress: Option<&dyn CompileProgressCallback>,
) -> (String, ImageReport) {
    let mut fragments = vec![markup.to_string()];
    let report = resolve_fragments(&mut fragments, workspace, fetcher, progress).await;
    let resolved = fragments.pop().unwrap_or_default();
    (resolved, report)
}

/// Resolve remote images across many fragments with one download batch.
///
/// A URL shared by several fragments is fetched once.
pub async fn resolve_fragments(
    fragments: &mut [String],
    workspace: &Workspace,
    fetcher: &ImageFetcher,
    progress: Option<&dyn CompileProgressCallback>,
) -> ImageReport {
    let urls: BTreeSet<&str> = fragments
        .iter()
        .flat_map(|f| RE_INCLUDEGRAPHICS.captures_iter(f))
        .filter_map(|caps| caps.get(2).map(|m| m.as_str()))
        .filter(|src| is_url(src))
        .collect();

    let mut report = ImageReport::default();
    if urls.is_empty() {
        return report;
    }

    let photo_dir = workspace.photo_dir();
    let plan = plan_downloads(urls, photo_dir);
    info!("Downloading {} referenced images", plan.len());

    let outcomes = join_all(plan.iter().map(|(url, name)| async move {
        let outcome = fetcher.fetch_to(url, &photo_dir.join(name)).await;
        (url.as_str(), name.as_str(), outcome)
    }))
    .await;

    let mut fetched = BTreeMap::new();
    for (url, name, outcome) in outcomes {
        if outcome.is_ok() {
            fetched.insert(url, name);
        }
        report.record(name, outcome, progress);
    }

    for fragment in fragments.iter_mut() {
        *fragment = rewrite_references(fragment, &fetched);
    }

    report
}

/// Point each reference whose download succeeded at its local copy.
fn rewrite_references(markup: &str, fetched: &BTreeMap<&str, &str>) -> String {
    RE_INCLUDEGRAPHICS
        .replace_all(markup, |caps: &Captures<'_>| match fetched.get(&caps[2]) {
            Some(name) => format!(
                "\\includegraphics[{}]{{{}}}",
                &caps[1],
                Workspace::photo_reference(name)
            ),
            None => {
                if is_url(&caps[2]) {
                    debug!("Leaving unresolved reference to {}", &caps[2]);
                }
                caps[0].to_string()
            }
        })
        .into_owned()
}

// ── Named images ─────────────────────────────────────────────────────────

/// Write each `name → source` entry into the photo area under `name`.
pub async fn resolve_named_images(
    images: &BTreeMap<String, String>,
    workspace: &Workspace,
    fetcher: &ImageFetcher,
    progress: Option<&dyn CompileProgressCallback>,
) -> ImageReport {
    let mut report = ImageReport::default();
    if images.is_empty() {
        debug!("No named images to process");
        return report;
    }
    info!("Processing {} named images", images.len());

    let photo_dir = workspace.photo_dir();
    let mut remote = Vec::new();

    for (name, source) in images {
        if !is_plain_file_name(name) {
            report.record(name, Err(AssetWarning::InvalidName(name.clone())), progress);
            continue;
        }
        let dest = photo_dir.join(name);

        let outcome = match classify(source) {
            ImageSource::RemoteUrl(url) => {
                remote.push((name.as_str(), url, dest));
                continue;
            }
            ImageSource::InlineEncoded(payload) => decode_inline(name, payload, &dest).await,
            ImageSource::LocalPath(path) => tokio::fs::copy(path, &dest)
                .await
                .map(|n| n as usize)
                .map_err(|e| AssetWarning::CopyFailed {
                    name: name.clone(),
                    source_path: path.display().to_string(),
                    reason: e.to_string(),
                }),
            ImageSource::Unrecognized => Err(AssetWarning::Unrecognized {
                name: name.clone(),
                preview: source.chars().take(50).collect(),
            }),
        };
        report.record(name, outcome, progress);
    }

    let outcomes = join_all(remote.iter().map(|(name, url, dest)| async move {
        (*name, fetcher.fetch_to(url, dest).await)
    }))
    .await;

    for (name, outcome) in outcomes {
        report.record(name, outcome, progress);
    }

    report
}

async fn decode_inline(name: &str, payload: &str, dest: &Path) -> Result<usize, AssetWarning> {
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| AssetWarning::DecodeFailed {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
    write_asset(dest, &bytes).await?;
    Ok(bytes.len())
}
