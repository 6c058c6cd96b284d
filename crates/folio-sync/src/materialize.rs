//! Site materializer: the only code that touches the output tree.
//!
//! Paths handed in are site-relative (`alice/blog/post.html`, with or
//! without a leading slash). Anything that would escape the output root is
//! refused with [`Error::UnsafePath`].

use std::{
  io::ErrorKind,
  path::{Component, Path, PathBuf},
  sync::atomic::{AtomicU64, Ordering},
};

use tokio::fs;
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Result of [`Materializer::write_page`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
  Written,
  /// The file already held identical bytes; nothing was written.
  Unchanged,
}

/// Distinguishes temp files of concurrent writers to the same page.
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct Materializer {
  root: PathBuf,
}

impl Materializer {
  pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

  pub fn root(&self) -> &Path { &self.root }

  /// Filesystem location of a site-relative path.
  pub fn locate(&self, rel: &str) -> Result<PathBuf> {
    let trimmed = rel.trim_start_matches('/');
    let rel_path = Path::new(trimmed);
    let safe = !trimmed.is_empty()
      && !trimmed.contains('\\')
      && rel_path.components().all(|c| matches!(c, Component::Normal(_)));
    if !safe {
      return Err(Error::UnsafePath(rel.to_owned()));
    }
    Ok(self.root.join(rel_path))
  }

  /// Write `html` to `rel` unless the file already holds exactly these bytes.
  ///
  /// Goes through a sibling temp file and a rename, so readers never observe
  /// a partially written page.
  pub async fn write_page(&self, rel: &str, html: &str) -> Result<WriteOutcome> {
    let path = self.locate(rel)?;
    match fs::read(&path).await {
      Ok(existing) if existing == html.as_bytes() => {
        debug!(path = %path.display(), "page unchanged");
        return Ok(WriteOutcome::Unchanged);
      }
      Ok(_) => {}
      Err(e) if e.kind() == ErrorKind::NotFound => {}
      Err(e) => return Err(Error::fs(&path)(e)),
    }

    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).await.map_err(Error::fs(parent))?;
    }
    let tmp = temp_sibling(&path);
    fs::write(&tmp, html).await.map_err(Error::fs(&tmp))?;
    if let Err(e) = fs::rename(&tmp, &path).await {
      let _ = fs::remove_file(&tmp).await;
      return Err(Error::fs(&path)(e));
    }
    info!(path = %path.display(), "page written");
    Ok(WriteOutcome::Written)
  }

  /// Delete the page at `rel`, then remove parent directories left empty.
  /// Returns `false` if there was no file.
  pub async fn remove_page(&self, rel: &str) -> Result<bool> {
    let path = self.locate(rel)?;
    match fs::remove_file(&path).await {
      Ok(()) => {}
      Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
      Err(e) => return Err(Error::fs(&path)(e)),
    }
    info!(path = %path.display(), "page removed");

    let mut dir = path.parent();
    while let Some(d) = dir {
      if d == self.root.as_path() || fs::remove_dir(d).await.is_err() {
        break;
      }
      debug!(dir = %d.display(), "pruned empty directory");
      dir = d.parent();
    }
    Ok(true)
  }

  /// Make the output root ready for a first cycle: optionally wipe it,
  /// recreate it, and copy the contents of `assets` into it. Returns the
  /// number of asset files copied.
  pub async fn prepare(&self, clean: bool, assets: Option<&Path>) -> Result<usize> {
    if clean {
      match fs::remove_dir_all(&self.root).await {
        Ok(()) => info!(root = %self.root.display(), "cleaned output directory"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(Error::fs(&self.root)(e)),
      }
    }
    fs::create_dir_all(&self.root).await.map_err(Error::fs(&self.root))?;

    let Some(assets) = assets else {
      return Ok(0);
    };
    if !fs::try_exists(assets).await.map_err(Error::fs(assets))? {
      warn!(assets = %assets.display(), "assets directory not found");
      return Ok(0);
    }
    let copied = copy_dir(assets, &self.root).await?;
    info!(copied, from = %assets.display(), "assets copied");
    Ok(copied)
  }
}

fn temp_sibling(path: &Path) -> PathBuf {
  let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
  let name = path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_default();
  path.with_file_name(format!(".{name}.{}.{seq}.tmp", std::process::id()))
}

/// Copy the tree under `src` into `dest`, overwriting existing files.
async fn copy_dir(src: &Path, dest: &Path) -> Result<usize> {
  let mut copied = 0;
  let mut pending = vec![(src.to_path_buf(), dest.to_path_buf())];

  while let Some((from, to)) = pending.pop() {
    fs::create_dir_all(&to).await.map_err(Error::fs(&to))?;
    let mut entries = fs::read_dir(&from).await.map_err(Error::fs(&from))?;
    while let Some(entry) = entries.next_entry().await.map_err(Error::fs(&from))? {
      let src_path = entry.path();
      let dest_path = to.join(entry.file_name());
      let file_type = entry.file_type().await.map_err(Error::fs(&src_path))?;
      if file_type.is_dir() {
        pending.push((src_path, dest_path));
      } else {
        fs::copy(&src_path, &dest_path).await.map_err(Error::fs(&src_path))?;
        copied += 1;
      }
    }
  }
  Ok(copied)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn refuses_paths_outside_the_root() {
    let m = Materializer::new("/srv/site");
    for rel in ["", "/", "../etc/passwd", "a/../../b", "./a.html", "a\\..\\b"] {
      assert!(matches!(m.locate(rel), Err(Error::UnsafePath(_))), "{rel:?}");
    }
    assert_eq!(
      m.locate("/alice/blog/post.html").unwrap(),
      PathBuf::from("/srv/site/alice/blog/post.html")
    );
  }

  #[tokio::test]
  async fn identical_content_is_not_rewritten() {
    let dir = tempfile::tempdir().unwrap();
    let m = Materializer::new(dir.path());

    assert_eq!(m.write_page("a/b/c.html", "one").await.unwrap(), WriteOutcome::Written);
    assert_eq!(m.write_page("a/b/c.html", "one").await.unwrap(), WriteOutcome::Unchanged);
    assert_eq!(m.write_page("a/b/c.html", "two").await.unwrap(), WriteOutcome::Written);
    assert_eq!(std::fs::read_to_string(dir.path().join("a/b/c.html")).unwrap(), "two");

    // No temp files left behind.
    assert_eq!(std::fs::read_dir(dir.path().join("a/b")).unwrap().count(), 1);
  }

  #[tokio::test]
  async fn removal_prunes_empty_directories() {
    let dir = tempfile::tempdir().unwrap();
    let m = Materializer::new(dir.path());
    m.write_page("alice/index.html", "idx").await.unwrap();
    m.write_page("alice/blog/post.html", "p").await.unwrap();

    assert!(m.remove_page("/alice/blog/post.html").await.unwrap());
    assert!(!dir.path().join("alice/blog").exists());
    assert!(dir.path().join("alice/index.html").exists());
    assert!(!m.remove_page("/alice/blog/post.html").await.unwrap());
    assert!(dir.path().exists());
  }

  #[tokio::test]
  async fn prepare_cleans_and_copies_assets() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("public");
    let assets = dir.path().join("assets");
    std::fs::create_dir_all(assets.join("js")).unwrap();
    std::fs::write(assets.join("app.js"), "app").unwrap();
    std::fs::write(assets.join("js/post.js"), "post").unwrap();
    std::fs::create_dir_all(&out).unwrap();
    std::fs::write(out.join("stale.html"), "old").unwrap();

    let m = Materializer::new(&out);
    assert_eq!(m.prepare(true, Some(&assets)).await.unwrap(), 2);
    assert!(!out.join("stale.html").exists());
    assert_eq!(std::fs::read_to_string(out.join("js/post.js")).unwrap(), "post");

    // Without cleaning, existing pages survive.
    std::fs::write(out.join("kept.html"), "k").unwrap();
    m.prepare(false, None).await.unwrap();
    assert!(out.join("kept.html").exists());
  }
}
