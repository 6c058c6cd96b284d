//! Engine configuration.

use std::path::PathBuf;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

/// ASCII that cannot appear literally in a URL path. Slugs keep `#`, `%` and
/// `?`, which would otherwise start a fragment, an escape or a query.
const PATH_ESCAPED: &AsciiSet = &CONTROLS
  .add(b' ')
  .add(b'"')
  .add(b'#')
  .add(b'%')
  .add(b'<')
  .add(b'>')
  .add(b'?')
  .add(b'`');

/// `url_path` as it appears in an `href` or an absolute URL.
///
/// Only ASCII is escaped; non-ASCII text stays readable, and browsers encode
/// it themselves. [`PathRegistry::resolve_external`](crate::PathRegistry::resolve_external)
/// decodes the result back to `url_path`.
pub fn encode_path(url_path: &str) -> String {
  let mut out = String::with_capacity(url_path.len());
  let mut buf = [0; 4];
  for ch in url_path.chars() {
    if ch.is_ascii() {
      out.extend(utf8_percent_encode(ch.encode_utf8(&mut buf), PATH_ESCAPED));
    } else {
      out.push(ch);
    }
  }
  out
}

/// Host and port the generated site is served from.
///
/// Used in both directions: to build absolute URLs for display, and to decide
/// whether an external URL found in a document points back into this site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
  pub host:        String,
  pub port:        u16,
  /// Additional host names accepted when resolving external URLs.
  /// `localhost` and `127.0.0.1` are always accepted.
  pub extra_hosts: Vec<String>,
}

impl Origin {
  pub fn new(host: impl Into<String>, port: u16) -> Self {
    Self { host: host.into(), port, extra_hosts: Vec::new() }
  }

  pub fn accepts_host(&self, host: &str) -> bool {
    host.eq_ignore_ascii_case(&self.host)
      || host == "localhost"
      || host == "127.0.0.1"
      || self.extra_hosts.iter().any(|h| h.eq_ignore_ascii_case(host))
  }

  /// Absolute URL for a site path (`/owner/category/title.html`).
  pub fn public_url(&self, url_path: &str) -> String {
    format!("http://{}:{}{}", self.host, self.port, encode_path(url_path))
  }
}

/// Everything the engine needs to know about the generated site.
#[derive(Debug, Clone)]
pub struct SiteConfig {
  pub origin:                Origin,
  /// Root of the generated file tree.
  pub output_dir:            PathBuf,
  /// Static files copied into `output_dir` by
  /// [`SyncEngine::prepare_output`](crate::SyncEngine::prepare_output).
  pub assets_dir:            Option<PathBuf>,
  /// Public listing page, relative to `output_dir`.
  pub listing_path:          String,
  /// Wipe `output_dir` before the first cycle.
  pub clean_output_on_start: bool,
}

impl SiteConfig {
  pub fn new(output_dir: impl Into<PathBuf>, origin: Origin) -> Self {
    Self {
      origin,
      output_dir: output_dir.into(),
      assets_dir: None,
      listing_path: "index.html".to_owned(),
      clean_output_on_start: true,
    }
  }
}
