//! Reference resolution for links found in document bodies.
//!
//! Resolution happens in two phases around the renderer. The renderer first
//! reports every link it discovers ([`DiscoveredLink`]); this module then
//! resolves them against the [`PathRegistry`] and produces a [`LinkTable`]
//! that the renderer consults while emitting HTML. The body mutations and
//! reference edges found along the way are returned to the caller, which
//! persists them after the render succeeds.

use std::collections::{BTreeMap, BTreeSet};

use folio_core::{document::Cid, store::PathStore};
use tracing::debug;

use crate::{PathRegistry, Result, config::encode_path};

/// Scheme of internal, rename-proof links: `cite://<cid>`.
pub const CITE_SCHEME: &str = "cite://";

/// `href` rendered for a link whose target CID has no current path.
pub const ORPHAN_HREF: &str = "#unknown-cid";

/// Source syntax of a discovered link. Only inline links and autolinks carry
/// their destination in the matched text, so only those can be rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
  /// `[text](dest "title")`
  Inline,
  /// `<dest>`
  Autolink,
  /// Reference-style and other links; resolved but never rewritten.
  Other,
}

/// A link as it appears in a document's markdown source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLink {
  /// Byte offset of the link in the body. Also the key into [`LinkTable`].
  pub offset:  usize,
  /// Exact source text of the link.
  pub matched:   String,
  /// Byte length of the `[label` part of [`matched`](Self::matched). The
  /// destination is the first occurrence of `dest` after it.
  pub label_end: usize,
  pub dest:      String,
  /// Plain text of the link label.
  pub text:      String,
  pub kind:      LinkKind,
}

/// How the renderer should emit one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkResolution {
  pub target:    Option<Cid>,
  pub href:      String,
  /// Replacement for the visible label, if any.
  pub display:   Option<String>,
  /// Canonical source text that should replace [`DiscoveredLink::matched`].
  pub rewritten: Option<String>,
}

/// Resolutions keyed by [`DiscoveredLink::offset`]. Links absent from the
/// table are rendered unchanged.
pub type LinkTable = BTreeMap<usize, LinkResolution>;

/// Everything one pass of resolution produced for a document.
#[derive(Debug, Default)]
pub struct ResolvedLinks {
  pub table:     LinkTable,
  /// Full outgoing edge set of the document.
  pub edges:     BTreeSet<Cid>,
  /// `(old, new)` literal substitutions to persist into the body, deduplicated.
  pub mutations: Vec<(String, String)>,
}

/// CID embedded in a `cite://` destination.
pub fn cite_target(dest: &str) -> Option<&str> { dest.strip_prefix(CITE_SCHEME) }

pub fn cite_url(cid: &Cid) -> String { format!("{CITE_SCHEME}{cid}") }

fn looks_like_url(text: &str) -> bool {
  let text = text.trim_start();
  text.starts_with("http://") || text.starts_with("https://")
}

/// Resolve every discovered link of one document.
pub async fn resolve_links<P: PathStore>(
  registry: &PathRegistry<P>,
  links: &[DiscoveredLink],
) -> Result<ResolvedLinks> {
  let mut out = ResolvedLinks::default();

  for link in links {
    let (target, rewritten) = match cite_target(&link.dest) {
      Some(raw) => match Cid::parse(raw) {
        Ok(cid) => (cid, None),
        Err(_) => {
          out.table.insert(link.offset, orphan(link));
          continue;
        }
      },
      None => match registry.resolve_external(&link.dest).await? {
        Some(cid) => {
          let rewritten = rewrite(link, &cid);
          (cid, rewritten)
        }
        None => continue,
      },
    };

    let resolution = match registry.resolve(&target).await? {
      Some(path) => {
        let show_url = link.kind == LinkKind::Autolink || looks_like_url(&link.text);
        LinkResolution {
          display: show_url.then(|| registry.origin().public_url(&path)),
          href: encode_path(&path),
          target: Some(target.clone()),
          rewritten,
        }
      }
      None => LinkResolution {
        target: Some(target.clone()),
        rewritten,
        ..orphan(link)
      },
    };
    debug!(
      dest = %link.dest,
      target = %target,
      href = %resolution.href,
      "resolved link"
    );

    if let Some(new) = &resolution.rewritten {
      let pair = (link.matched.clone(), new.clone());
      if !out.mutations.contains(&pair) {
        out.mutations.push(pair);
      }
    }
    out.edges.insert(target);
    out.table.insert(link.offset, resolution);
  }

  Ok(out)
}

fn orphan(link: &DiscoveredLink) -> LinkResolution {
  LinkResolution {
    target:    None,
    href:      ORPHAN_HREF.to_owned(),
    display:   (link.kind == LinkKind::Autolink).then(|| link.dest.clone()),
    rewritten: None,
  }
}

/// Source text of `link` with its destination replaced by `cite://<cid>`.
fn rewrite(link: &DiscoveredLink, cid: &Cid) -> Option<String> {
  match link.kind {
    LinkKind::Autolink => Some(format!("<{}>", cite_url(cid))),
    LinkKind::Inline => {
      // A title may repeat the URL, so search forward from the label.
      let after_label = link.matched.get(link.label_end..)?;
      let at = link.label_end + after_label.find(link.dest.as_str())?;
      let mut out = String::with_capacity(link.matched.len());
      out.push_str(&link.matched[..at]);
      out.push_str(&cite_url(cid));
      out.push_str(&link.matched[at + link.dest.len()..]);
      Some(out)
    }
    LinkKind::Other => None,
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use folio_store_sqlite::SqliteStore;

  use super::*;
  use crate::Origin;

  fn cid(s: &str) -> Cid { Cid::parse(s).unwrap() }

  fn link(offset: usize, matched: &str, dest: &str, text: &str, kind: LinkKind) -> DiscoveredLink {
    DiscoveredLink {
      offset,
      matched: matched.into(),
      label_end: matched.find("](").map_or(0, |at| at + 1),
      dest: dest.into(),
      text: text.into(),
      kind,
    }
  }

  async fn registry() -> PathRegistry<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let reg = PathRegistry::new(Arc::new(store), Origin::new("127.0.0.1", 8080));
    reg.assign(&cid("target"), "alice", "Default", "Intro").await.unwrap();
    reg
  }

  #[test]
  fn inline_rewrite_keeps_label_and_title() {
    let l = link(
      0,
      "[see](http://127.0.0.1:8080/a.html \"t\")",
      "http://127.0.0.1:8080/a.html",
      "see",
      LinkKind::Inline,
    );
    assert_eq!(rewrite(&l, &cid("abc")).as_deref(), Some("[see](cite://abc \"t\")"));
  }

  #[test]
  fn inline_rewrite_leaves_a_title_repeating_the_url() {
    let url = "http://127.0.0.1:8080/a.html";
    let l = link(0, &format!("[{url}]({url} \"{url}\")"), url, url, LinkKind::Inline);
    assert_eq!(
      rewrite(&l, &cid("abc")).as_deref(),
      Some(format!("[{url}](cite://abc \"{url}\")").as_str())
    );
  }

  #[tokio::test]
  async fn cite_links_resolve_to_current_path() {
    let reg = registry().await;
    let links = [link(4, "[x](cite://target)", "cite://target", "x", LinkKind::Inline)];

    let out = resolve_links(&reg, &links).await.unwrap();
    let res = &out.table[&4];
    assert_eq!(res.href, "/alice/default/intro.html");
    assert_eq!(res.display, None);
    assert!(out.mutations.is_empty());
    assert_eq!(out.edges, BTreeSet::from([cid("target")]));
  }

  #[tokio::test]
  async fn external_links_are_rewritten_once() {
    let reg = registry().await;
    let url = "http://127.0.0.1:8080/alice/default/intro.html";
    let matched = format!("[{url}]({url})");
    let links = [
      link(0, &matched, url, url, LinkKind::Inline),
      link(90, &matched, url, url, LinkKind::Inline),
      link(200, &format!("<{url}>"), url, url, LinkKind::Autolink),
    ];

    let out = resolve_links(&reg, &links).await.unwrap();
    assert_eq!(out.mutations, [
      (matched.clone(), format!("[{url}](cite://target)")),
      (format!("<{url}>"), "<cite://target>".to_owned()),
    ]);
    assert_eq!(out.table[&0].display.as_deref(), Some(url));
    assert_eq!(out.table[&200].href, "/alice/default/intro.html");
  }

  #[tokio::test]
  async fn unknown_targets_use_the_orphan_href() {
    let reg = registry().await;
    let links = [
      link(0, "[x](cite://gone)", "cite://gone", "x", LinkKind::Inline),
      link(20, "<cite://gone>", "cite://gone", "cite://gone", LinkKind::Autolink),
      link(40, "[y](cite://bad%20cid)", "cite://bad%20cid", "y", LinkKind::Inline),
    ];

    let out = resolve_links(&reg, &links).await.unwrap();
    assert!(out.table.values().all(|r| r.href == ORPHAN_HREF));
    assert_eq!(out.table[&20].display.as_deref(), Some("cite://gone"));
    assert_eq!(out.edges, BTreeSet::from([cid("gone")]));
  }

  #[tokio::test]
  async fn foreign_urls_are_left_alone() {
    let reg = registry().await;
    let links = [link(
      0,
      "[x](https://example.com/alice/default/intro.html)",
      "https://example.com/alice/default/intro.html",
      "x",
      LinkKind::Inline,
    )];

    let out = resolve_links(&reg, &links).await.unwrap();
    assert!(out.table.is_empty());
    assert!(out.edges.is_empty());
  }
}
