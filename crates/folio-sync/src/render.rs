//! HTML rendering for documents, owner indexes, and the public listing.
//!
//! [`Renderer`] is the seam to the template layer. The engine only needs link
//! discovery plus three page kinds; [`MarkdownRenderer`] is the built-in
//! implementation on top of pulldown-cmark.
//!
//! Rendering must be a pure function of its inputs: the engine relies on
//! byte-identical output for unchanged documents to skip file writes.

use std::{collections::BTreeMap, fmt::Write as _};

use chrono::{DateTime, SecondsFormat, Utc};
use folio_core::{
  document::{Cid, Document},
  slug::DEFAULT_CATEGORY,
};
use pulldown_cmark::{Event, LinkType, Options, Parser, Tag, TagEnd, html::push_html};

use crate::{
  config::encode_path,
  links::{DiscoveredLink, LinkKind, LinkTable},
};

/// One row of an index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
  pub cid:        Cid,
  pub owner:      String,
  pub title:      String,
  pub category:   String,
  pub summary:    String,
  pub url_path:   String,
  pub updated_at: DateTime<Utc>,
}

impl IndexEntry {
  pub fn new(doc: Document, url_path: String) -> Self {
    Self {
      cid: doc.cid,
      owner: doc.owner,
      title: doc.title,
      category: doc.category,
      summary: doc.summary,
      url_path,
      updated_at: doc.updated_at,
    }
  }
}

pub trait Renderer: Send + Sync {
  /// Every link in `body`, in source order.
  fn discover_links(&self, body: &str) -> Vec<DiscoveredLink>;

  /// Full HTML page for `doc`, published at `url_path`. Links present in
  /// `links` (keyed by source offset) are emitted with the resolved `href`.
  fn render_document(&self, doc: &Document, url_path: &str, links: &LinkTable) -> String;

  /// `/{owner}/index.html`. `entries` are newest first.
  fn render_owner_index(&self, owner: &str, entries: &[IndexEntry]) -> String;

  /// Public listing page. `entries` are newest first.
  fn render_listing(&self, entries: &[IndexEntry]) -> String;
}

// ─── MarkdownRenderer ────────────────────────────────────────────────────────

/// Default renderer: CommonMark with GFM tables, strikethrough, and task
/// lists, wrapped in a minimal HTML shell.
#[derive(Debug, Clone, Default)]
pub struct MarkdownRenderer {
  /// Stylesheet linked from every page, e.g. `/style.css` from the assets
  /// directory.
  pub stylesheet: Option<String>,
}

fn options() -> Options {
  Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS | Options::ENABLE_TABLES
}

fn link_kind(link_type: LinkType) -> LinkKind {
  match link_type {
    LinkType::Inline => LinkKind::Inline,
    LinkType::Autolink => LinkKind::Autolink,
    _ => LinkKind::Other,
  }
}

impl MarkdownRenderer {
  fn markdown_to_html(&self, body: &str, links: &LinkTable) -> String {
    let mut events = Vec::new();
    // Set while skipping the label of a link whose text is replaced.
    let mut replacing = false;

    for (event, range) in Parser::new_ext(body, options()).into_offset_iter() {
      match event {
        Event::Start(Tag::Link { link_type, dest_url, title, id }) => {
          match links.get(&range.start) {
            Some(res) => {
              events.push(Event::Start(Tag::Link {
                link_type,
                dest_url: res.href.clone().into(),
                title,
                id,
              }));
              if let Some(display) = &res.display {
                events.push(Event::Text(display.clone().into()));
                replacing = true;
              }
            }
            None => events.push(Event::Start(Tag::Link { link_type, dest_url, title, id })),
          }
        }
        Event::End(TagEnd::Link) => {
          replacing = false;
          events.push(Event::End(TagEnd::Link));
        }
        _ if replacing => {}
        other => events.push(other),
      }
    }

    let mut html = String::with_capacity(body.len() * 2);
    push_html(&mut html, events.into_iter());
    html
  }

  fn page(&self, title: &str, meta: &[(&str, &str)], content: &str) -> String {
    let mut out = String::with_capacity(content.len() + 512);
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    for (name, value) in meta {
      let _ = writeln!(
        out,
        "<meta name=\"{}\" content=\"{}\">",
        escape_html(name),
        escape_html(value)
      );
    }
    let _ = writeln!(out, "<title>{}</title>", escape_html(title));
    if let Some(href) = &self.stylesheet {
      let _ = writeln!(out, "<link rel=\"stylesheet\" href=\"{}\">", escape_html(href));
    }
    out.push_str("</head>\n<body>\n");
    out.push_str(content);
    out.push_str("</body>\n</html>\n");
    out
  }
}

impl Renderer for MarkdownRenderer {
  fn discover_links(&self, body: &str) -> Vec<DiscoveredLink> {
    let mut found = Vec::new();
    let mut open: Option<DiscoveredLink> = None;

    for (event, range) in Parser::new_ext(body, options()).into_offset_iter() {
      match event {
        Event::Start(Tag::Link { link_type, dest_url, .. }) => {
          open = Some(DiscoveredLink {
            offset:    range.start,
            matched:   body[range].to_owned(),
            // Just past `[`; widened by every label event below.
            label_end: 1,
            dest:      dest_url.into_string(),
            text:      String::new(),
            kind:      link_kind(link_type),
          });
        }
        Event::End(TagEnd::Link) => found.extend(open.take()),
        event => {
          if let Some(link) = &mut open {
            link.label_end = link.label_end.max(range.end - link.offset);
            if let Event::Text(text) | Event::Code(text) = event {
              link.text.push_str(&text);
            }
          }
        }
      }
    }
    found
  }

  fn render_document(&self, doc: &Document, url_path: &str, links: &LinkTable) -> String {
    let mut content = String::new();
    let _ = writeln!(
      content,
      "<nav><a href=\"/{owner}/index.html\">{owner}</a> / {category}</nav>",
      owner = escape_html(&doc.owner),
      category = escape_html(display_category(&doc.category)),
    );
    let _ = writeln!(
      content,
      "<article data-path=\"{}\">\n<h1>{}</h1>",
      escape_html(url_path),
      escape_html(&doc.title)
    );
    let _ = writeln!(
      content,
      "<p class=\"meta\"><time datetime=\"{}\">{}</time></p>",
      doc.updated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
      doc.updated_at.format("%Y-%m-%d")
    );
    if !doc.summary.trim().is_empty() {
      let _ = writeln!(
        content,
        "<div class=\"summary\">{}</div>",
        escape_html(doc.summary.trim())
      );
    }
    content.push_str(&self.markdown_to_html(&doc.body, links));
    content.push_str("</article>\n");

    self.page(
      &doc.title,
      &[("post-cid", doc.cid.as_str()), ("post-author", &doc.owner)],
      &content,
    )
  }

  fn render_owner_index(&self, owner: &str, entries: &[IndexEntry]) -> String {
    // Category order is alphabetical; entry order within a category is kept.
    let mut by_category: BTreeMap<&str, Vec<&IndexEntry>> = BTreeMap::new();
    for entry in entries {
      by_category
        .entry(display_category(&entry.category))
        .or_default()
        .push(entry);
    }

    let mut content = String::new();
    let _ = writeln!(content, "<h1>{}</h1>", escape_html(owner));
    for (category, entries) in by_category {
      let _ = writeln!(content, "<section>\n<h2>{}</h2>\n<ul>", escape_html(category));
      for entry in entries {
        push_entry(&mut content, entry, false);
      }
      content.push_str("</ul>\n</section>\n");
    }

    self.page(owner, &[("post-author", owner)], &content)
  }

  fn render_listing(&self, entries: &[IndexEntry]) -> String {
    let mut content = String::from("<h1>Latest</h1>\n<ul>\n");
    for entry in entries {
      push_entry(&mut content, entry, true);
    }
    content.push_str("</ul>\n");
    self.page("Latest", &[], &content)
  }
}

fn push_entry(out: &mut String, entry: &IndexEntry, with_owner: bool) {
  let _ = write!(
    out,
    "<li><a href=\"{}\">{}</a> <time datetime=\"{}\">{}</time>",
    escape_html(&encode_path(&entry.url_path)),
    escape_html(&entry.title),
    entry.updated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    entry.updated_at.format("%Y-%m-%d"),
  );
  if with_owner {
    let _ = write!(
      out,
      " <a class=\"author\" href=\"/{owner}/index.html\">{owner}</a>",
      owner = escape_html(&entry.owner)
    );
  }
  if !entry.summary.trim().is_empty() {
    let _ = write!(out, "<p>{}</p>", escape_html(entry.summary.trim()));
  }
  out.push_str("</li>\n");
}

fn display_category(category: &str) -> &str {
  let category = category.trim();
  if category.is_empty() { DEFAULT_CATEGORY } else { category }
}

fn escape_html(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for ch in s.chars() {
    match ch {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      c => out.push(c),
    }
  }
  out
}
