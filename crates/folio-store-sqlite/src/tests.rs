//! Integration tests for `SqliteStore` against an in-memory database.

use std::collections::BTreeSet;

use folio_core::{
  document::{Cid, DocumentPatch, NewDocument, Placement},
  store::{DocumentStore, PathStore},
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn cid(s: &str) -> Cid { Cid::parse(s).unwrap() }

// ─── Owners ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn owner_names_are_unique() {
  let s = store().await;
  let alice = s.add_owner("alice").await.unwrap();
  assert_eq!(alice.name, "alice");

  let err = s.add_owner("alice").await.unwrap_err();
  assert!(matches!(err, Error::OwnerExists(name) if name == "alice"));
}

#[tokio::test]
async fn owner_names_must_be_path_safe() {
  let s = store().await;
  for name in ["../etc", "a/b", "c#d", "index.html"] {
    let err = s.add_owner(name).await.unwrap_err();
    assert!(
      matches!(err, Error::Core(folio_core::Error::InvalidOwnerName(_))),
      "{name:?}: {err}"
    );
  }
}

#[tokio::test]
async fn create_for_unknown_owner_fails() {
  let s = store().await;
  let err = s
    .create_document(42, NewDocument::new("Intro", "Default"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::OwnerNotFound(42)));
}

// ─── Documents ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_document() {
  let s = store().await;
  let alice = s.add_owner("alice").await.unwrap();

  let doc = s
    .create_document(alice.owner_id, NewDocument::new("Intro", "Default").with_body("hi"))
    .await
    .unwrap()
    .placed()
    .unwrap();
  assert_eq!(doc.owner, "alice");
  assert_eq!(doc.body, "hi");
  assert!(!doc.is_public);

  let fetched = s.get_fields(&doc.cid).await.unwrap().unwrap();
  assert_eq!(fetched, doc);
}

#[tokio::test]
async fn same_slug_slot_is_a_collision() {
  let s = store().await;
  let alice = s.add_owner("alice").await.unwrap();
  let bob = s.add_owner("bob").await.unwrap();

  s.create_document(alice.owner_id, NewDocument::new("Post", "Blog"))
    .await
    .unwrap()
    .placed()
    .unwrap();

  // Same slugs after lowercasing and whitespace handling.
  let again = s
    .create_document(alice.owner_id, NewDocument::new("  post ", "blog"))
    .await
    .unwrap();
  assert_eq!(again, Placement::Collision);

  // Different owner, different slot.
  let other = s
    .create_document(bob.owner_id, NewDocument::new("Post", "Blog"))
    .await
    .unwrap();
  assert!(matches!(other, Placement::Placed(_)));
}

#[tokio::test]
async fn update_into_taken_slot_is_a_collision() {
  let s = store().await;
  let alice = s.add_owner("alice").await.unwrap();
  s.create_document(alice.owner_id, NewDocument::new("A", "c")).await.unwrap();
  let b = s
    .create_document(alice.owner_id, NewDocument::new("B", "c"))
    .await
    .unwrap()
    .placed()
    .unwrap();

  let patch = DocumentPatch { title: Some("A".into()), ..Default::default() };
  assert_eq!(s.update_document(&b.cid, patch).await.unwrap(), Placement::Collision);

  // The failed update left the row untouched.
  assert_eq!(s.get_fields(&b.cid).await.unwrap().unwrap().title, "B");
}

#[tokio::test]
async fn update_bumps_timestamp_and_keeps_unpatched_fields() {
  let s = store().await;
  let alice = s.add_owner("alice").await.unwrap();
  let doc = s
    .create_document(alice.owner_id, NewDocument::new("A", "c").with_body("body"))
    .await
    .unwrap()
    .placed()
    .unwrap();

  let patch = DocumentPatch { summary: Some("short".into()), ..Default::default() };
  let updated = s.update_document(&doc.cid, patch).await.unwrap().placed().unwrap();
  assert_eq!(updated.body, "body");
  assert_eq!(updated.summary, "short");
  assert!(updated.updated_at >= doc.updated_at);
}

#[tokio::test]
async fn update_missing_document_fails() {
  let s = store().await;
  let err = s
    .update_document(&cid("nope"), DocumentPatch::default())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::DocumentNotFound(_)));
}

#[tokio::test]
async fn public_listing_filters_private_documents() {
  let s = store().await;
  let alice = s.add_owner("alice").await.unwrap();
  let a = s
    .create_document(alice.owner_id, NewDocument::new("A", "c"))
    .await
    .unwrap()
    .placed()
    .unwrap();
  s.create_document(alice.owner_id, NewDocument::new("B", "c")).await.unwrap();

  assert!(s.list_public_documents().await.unwrap().is_empty());
  assert!(s.set_public(&a.cid, true).await.unwrap());
  let public = s.list_public_documents().await.unwrap();
  assert_eq!(public.len(), 1);
  assert_eq!(public[0].cid, a.cid);

  assert!(!s.set_public(&cid("missing"), true).await.unwrap());
  assert_eq!(s.list_owner_documents("alice").await.unwrap().len(), 2);
  assert!(s.list_owner_documents("bob").await.unwrap().is_empty());
}

#[tokio::test]
async fn mutate_body_replaces_every_literal_occurrence() {
  let s = store().await;
  let alice = s.add_owner("alice").await.unwrap();
  let doc = s
    .create_document(
      alice.owner_id,
      NewDocument::new("A", "c").with_body("see [x](http://h/a.html) and [x](http://h/a.html) (.*)"),
    )
    .await
    .unwrap()
    .placed()
    .unwrap();

  assert!(
    s.mutate_body(&doc.cid, "[x](http://h/a.html)", "[x](cite://abc)")
      .await
      .unwrap()
  );
  // Regex metacharacters are matched literally.
  assert!(s.mutate_body(&doc.cid, "(.*)", "(literal)").await.unwrap());
  assert!(!s.mutate_body(&doc.cid, "absent", "x").await.unwrap());

  let body = s.get_fields(&doc.cid).await.unwrap().unwrap().body;
  assert_eq!(body, "see [x](cite://abc) and [x](cite://abc) (literal)");
}

#[tokio::test]
async fn delete_document_drops_outgoing_edges() {
  let s = store().await;
  let alice = s.add_owner("alice").await.unwrap();
  let doc = s
    .create_document(alice.owner_id, NewDocument::new("A", "c"))
    .await
    .unwrap()
    .placed()
    .unwrap();
  let target = cid("target1");
  s.replace_reference_edges(&doc.cid, &BTreeSet::from([target.clone()]))
    .await
    .unwrap();

  assert!(s.delete_document(&doc.cid).await.unwrap());
  assert!(!s.delete_document(&doc.cid).await.unwrap());
  assert!(s.get_fields(&doc.cid).await.unwrap().is_none());
  assert!(s.referencing(&target).await.unwrap().is_empty());
}

// ─── Reference edges ─────────────────────────────────────────────────────────

#[tokio::test]
async fn reference_edges_are_replaced_not_merged() {
  let s = store().await;
  let (a, b, t1, t2) = (cid("a"), cid("b"), cid("t1"), cid("t2"));

  s.replace_reference_edges(&a, &BTreeSet::from([t1.clone(), t2.clone()])).await.unwrap();
  s.replace_reference_edges(&b, &BTreeSet::from([t1.clone()])).await.unwrap();
  assert_eq!(s.referencing(&t1).await.unwrap(), [a.clone(), b.clone()]);
  assert_eq!(s.referencing(&t2).await.unwrap(), [a.clone()]);

  s.replace_reference_edges(&a, &BTreeSet::new()).await.unwrap();
  assert_eq!(s.referencing(&t1).await.unwrap(), [b]);
  assert!(s.referencing(&t2).await.unwrap().is_empty());
}

// ─── Path mappings ───────────────────────────────────────────────────────────

#[tokio::test]
async fn mapping_roundtrip_and_removal() {
  let s = store().await;
  let a = cid("a");

  s.upsert_mapping(&a, "/alice/blog/post.html").await.unwrap();
  assert_eq!(s.path_for_cid(&a).await.unwrap().as_deref(), Some("/alice/blog/post.html"));
  assert_eq!(s.cid_for_path("/alice/blog/post.html").await.unwrap(), Some(a.clone()));

  s.upsert_mapping(&a, "/alice/blog/renamed.html").await.unwrap();
  assert!(s.cid_for_path("/alice/blog/post.html").await.unwrap().is_none());

  assert_eq!(
    s.remove_mapping(&a).await.unwrap().as_deref(),
    Some("/alice/blog/renamed.html")
  );
  assert!(s.path_for_cid(&a).await.unwrap().is_none());
  assert!(s.remove_mapping(&a).await.unwrap().is_none());
}

#[tokio::test]
async fn reverse_lookup_prefers_latest_assignment() {
  let s = store().await;
  let (old, new) = (cid("old"), cid("new"));

  s.upsert_mapping(&old, "/alice/c/p.html").await.unwrap();
  s.upsert_mapping(&new, "/alice/c/p.html").await.unwrap();
  assert_eq!(s.cid_for_path("/alice/c/p.html").await.unwrap(), Some(new.clone()));

  // Re-asserting an unchanged mapping does not steal the path back.
  s.upsert_mapping(&old, "/alice/c/p.html").await.unwrap();
  assert_eq!(s.cid_for_path("/alice/c/p.html").await.unwrap(), Some(new));
}
