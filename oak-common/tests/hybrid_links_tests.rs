//! Integration tests for hybrid back-reference maintenance
//!
//! Covers create/update/delete of hybrids and the parent guard on delete.

use oak_common::{Error, RecordStore, Species};

async fn store() -> RecordStore {
    RecordStore::open_in_memory()
        .await
        .expect("in-memory store")
}

async fn hybrids_of(store: &RecordStore, name: &str) -> Vec<String> {
    store.get_species(name).await.unwrap().hybrids
}

#[tokio::test]
async fn test_new_hybrid_links_both_parents() {
    let store = store().await;
    store.save_species(Species::new("macrocarpa")).await.unwrap();
    store.save_species(Species::new("alba")).await.unwrap();

    store
        .save_species(Species::hybrid("× bebbiana", Some("alba"), Some("macrocarpa")))
        .await
        .unwrap();

    assert_eq!(hybrids_of(&store, "alba").await, vec!["× bebbiana"]);
    assert_eq!(hybrids_of(&store, "macrocarpa").await, vec!["× bebbiana"]);
}

#[tokio::test]
async fn test_parent_saved_after_hybrid_still_lists_it() {
    let store = store().await;

    // Hybrid first: neither parent has a row yet
    store
        .save_species(Species::hybrid("× bebbiana", Some("alba"), Some("macrocarpa")))
        .await
        .unwrap();
    store.save_species(Species::new("alba")).await.unwrap();

    assert_eq!(hybrids_of(&store, "alba").await, vec!["× bebbiana"]);
    assert!(!store.species_exists("macrocarpa").await.unwrap());
}

#[tokio::test]
async fn test_changing_parent_moves_back_reference() {
    let store = store().await;
    for name in ["alba", "macrocarpa", "rubra"] {
        store.save_species(Species::new(name)).await.unwrap();
    }
    store
        .save_species(Species::hybrid("× bebbiana", Some("alba"), Some("macrocarpa")))
        .await
        .unwrap();

    let mut hybrid = store.get_species("× bebbiana").await.unwrap();
    hybrid.parent1 = Some("rubra".to_string());
    store.save_species(hybrid).await.unwrap();

    assert!(hybrids_of(&store, "alba").await.is_empty());
    assert_eq!(hybrids_of(&store, "rubra").await, vec!["× bebbiana"]);
    assert_eq!(hybrids_of(&store, "macrocarpa").await, vec!["× bebbiana"]);
}

#[tokio::test]
async fn test_swapping_parent_slots_keeps_lists_stable() {
    let store = store().await;
    store.save_species(Species::new("alba")).await.unwrap();
    store.save_species(Species::new("macrocarpa")).await.unwrap();
    store
        .save_species(Species::hybrid("× bebbiana", Some("alba"), Some("macrocarpa")))
        .await
        .unwrap();

    store
        .save_species(Species::hybrid("× bebbiana", Some("macrocarpa"), Some("alba")))
        .await
        .unwrap();

    assert_eq!(hybrids_of(&store, "alba").await, vec!["× bebbiana"]);
    assert_eq!(hybrids_of(&store, "macrocarpa").await, vec!["× bebbiana"]);
}

#[tokio::test]
async fn test_resaving_parent_preserves_its_hybrids() {
    let store = store().await;
    store.save_species(Species::new("alba")).await.unwrap();
    store
        .save_species(Species::hybrid("× jackiana", Some("alba"), Some("bicolor")))
        .await
        .unwrap();

    // An edit of the parent that carries no hybrids list must not drop the link
    let mut alba = Species::new("alba");
    alba.author = Some("L.".to_string());
    let saved = store.save_species(alba).await.unwrap();

    assert_eq!(saved.hybrids, vec!["× jackiana"]);
    assert_eq!(hybrids_of(&store, "alba").await, vec!["× jackiana"]);
}

#[tokio::test]
async fn test_deleting_hybrid_unlinks_from_parents() {
    let store = store().await;
    store.save_species(Species::new("alba")).await.unwrap();
    store.save_species(Species::new("macrocarpa")).await.unwrap();
    store
        .save_species(Species::hybrid("× bebbiana", Some("alba"), Some("macrocarpa")))
        .await
        .unwrap();
    store
        .save_species(Species::hybrid("× jackiana", Some("alba"), None))
        .await
        .unwrap();

    store.delete_species("× bebbiana").await.unwrap();

    assert_eq!(hybrids_of(&store, "alba").await, vec!["× jackiana"]);
    assert!(hybrids_of(&store, "macrocarpa").await.is_empty());
    assert!(matches!(
        store.get_species("× bebbiana").await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_deleting_parent_is_rejected() {
    let store = store().await;
    store.save_species(Species::new("alba")).await.unwrap();
    store
        .save_species(Species::hybrid("× bebbiana", Some("alba"), None))
        .await
        .unwrap();

    let err = store.delete_species("alba").await.unwrap_err();
    match err {
        Error::ReferentialConflict { key, dependents, .. } => {
            assert_eq!(key, "alba");
            assert_eq!(dependents, vec!["× bebbiana".to_string()]);
        }
        other => panic!("expected ReferentialConflict, got {other:?}"),
    }

    // Nothing changed
    assert!(store.species_exists("alba").await.unwrap());
    assert_eq!(hybrids_of(&store, "alba").await, vec!["× bebbiana"]);
}

#[tokio::test]
async fn test_delete_with_unlink_clears_parent_slots() {
    let store = store().await;
    store.save_species(Species::new("alba")).await.unwrap();
    store.save_species(Species::new("macrocarpa")).await.unwrap();
    store
        .save_species(Species::hybrid("× bebbiana", Some("alba"), Some("macrocarpa")))
        .await
        .unwrap();

    let unlinked = store.delete_species_unlinking("alba").await.unwrap();
    assert_eq!(unlinked, vec!["× bebbiana".to_string()]);

    let hybrid = store.get_species("× bebbiana").await.unwrap();
    assert_eq!(hybrid.parent1, None);
    assert_eq!(hybrid.parent2.as_deref(), Some("macrocarpa"));
    assert_eq!(hybrids_of(&store, "macrocarpa").await, vec!["× bebbiana"]);
    assert!(!store.species_exists("alba").await.unwrap());
}

#[tokio::test]
async fn test_delete_missing_species_is_not_found() {
    let store = store().await;
    assert!(matches!(
        store.delete_species("nonexistent").await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_index_consistent_after_mixed_operations() {
    let store = store().await;
    for name in ["alba", "macrocarpa", "rubra", "velutina"] {
        store.save_species(Species::new(name)).await.unwrap();
    }
    store
        .save_species(Species::hybrid("× bebbiana", Some("alba"), Some("macrocarpa")))
        .await
        .unwrap();
    store
        .save_species(Species::hybrid("× leana", Some("rubra"), Some("velutina")))
        .await
        .unwrap();
    store
        .save_species(Species::hybrid("× bebbiana", Some("rubra"), None))
        .await
        .unwrap();
    store.delete_species("× leana").await.unwrap();
    store.delete_species("macrocarpa").await.unwrap();

    assert!(store.audit_hybrids().await.unwrap().is_empty());
    assert_eq!(hybrids_of(&store, "rubra").await, vec!["× bebbiana"]);
    assert!(hybrids_of(&store, "velutina").await.is_empty());
}

#[tokio::test]
async fn test_failed_unlinking_delete_rolls_back_cleared_slots() {
    let store = store().await;
    store.save_species(Species::new("macrocarpa")).await.unwrap();
    // "ghost" is named as a parent but never stored
    store
        .save_species(Species::hybrid("× phantasma", Some("ghost"), Some("macrocarpa")))
        .await
        .unwrap();

    // Slot clearing runs first, then the delete itself fails
    let err = store.delete_species_unlinking("ghost").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let hybrid = store.get_species("× phantasma").await.unwrap();
    assert_eq!(hybrid.parent1.as_deref(), Some("ghost"));
    assert_eq!(hybrid.parent2.as_deref(), Some("macrocarpa"));
    assert_eq!(hybrids_of(&store, "macrocarpa").await, vec!["× phantasma"]);
    assert!(store.audit_hybrids().await.unwrap().is_empty());
}
