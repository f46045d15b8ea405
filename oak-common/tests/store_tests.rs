//! Integration tests for the record store against a database file

use oak_common::{
    Error, RecordStore, Source, SourceType, Species, SpeciesSource,
};
use tempfile::TempDir;

async fn file_store(dir: &TempDir) -> RecordStore {
    RecordStore::open(&dir.path().join("catalog").join("oak.db"))
        .await
        .expect("open file-backed store")
}

#[tokio::test]
async fn test_data_survives_reopen() {
    let dir = TempDir::new().unwrap();

    let source_id = {
        let store = file_store(&dir).await;
        let source = store
            .create_source(&Source::new(SourceType::Observation, "Field notes 2024"))
            .await
            .unwrap();
        store.save_species(Species::new("alba")).await.unwrap();
        store
            .save_species(Species::hybrid("× bebbiana", Some("alba"), None))
            .await
            .unwrap();
        store.close().await;
        source.id.unwrap()
    };

    let store = file_store(&dir).await;
    assert_eq!(
        store.get_source(source_id).await.unwrap().name,
        "Field notes 2024"
    );
    assert_eq!(
        store.get_species("alba").await.unwrap().hybrids,
        vec!["× bebbiana"]
    );
}

#[tokio::test]
async fn test_source_delete_blocked_while_referenced() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir).await;

    let source = store
        .create_source(&Source::new(SourceType::Book, "Oaks of the World"))
        .await
        .unwrap();
    let id = source.id.unwrap();
    store.save_species(Species::new("alba")).await.unwrap();

    let mut record = SpeciesSource::new("alba", id);
    record.fields.range = Some("Eastern North America".to_string());
    store.save_species_source(&record).await.unwrap();

    let err = store.delete_source(id).await.unwrap_err();
    assert!(matches!(err, Error::ReferentialConflict { .. }));
    assert!(err.is_recoverable());

    store.delete_species_source("alba", id).await.unwrap();
    store.delete_source(id).await.unwrap();
    assert!(matches!(store.get_source(id).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_one_record_per_species_and_source() {
    let store = RecordStore::open_in_memory().await.unwrap();
    let id = store
        .create_source(&Source::new(SourceType::Book, "Oaks of the World"))
        .await
        .unwrap()
        .id
        .unwrap();
    store.save_species(Species::new("alba")).await.unwrap();

    let mut record = SpeciesSource::new("alba", id);
    record.fields.leaves = Some("green".to_string());
    store.save_species_source(&record).await.unwrap();

    record.fields.leaves = Some("dark green".to_string());
    store.save_species_source(&record).await.unwrap();

    let records = store.list_species_sources("alba").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].fields.leaves.as_deref(), Some("dark green"));
}

#[tokio::test]
async fn test_attributed_record_requires_species_and_source() {
    let store = RecordStore::open_in_memory().await.unwrap();
    let id = store
        .create_source(&Source::new(SourceType::Book, "Oaks of the World"))
        .await
        .unwrap()
        .id
        .unwrap();

    let err = store
        .save_species_source(&SpeciesSource::new("alba", id))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    store.save_species(Species::new("alba")).await.unwrap();
    let err = store
        .save_species_source(&SpeciesSource::new("alba", id + 1))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_species_delete_cascades_to_attributed_records() {
    let store = RecordStore::open_in_memory().await.unwrap();
    let id = store
        .create_source(&Source::new(SourceType::Book, "Oaks of the World"))
        .await
        .unwrap()
        .id
        .unwrap();
    store.save_species(Species::new("alba")).await.unwrap();
    store
        .save_species_source(&SpeciesSource::new("alba", id))
        .await
        .unwrap();

    store.delete_species("alba").await.unwrap();

    assert!(store.list_species_sources("alba").await.unwrap().is_empty());
    // Source is free to go now
    store.delete_source(id).await.unwrap();
}

#[tokio::test]
async fn test_species_with_sources_orders_preferred_first() {
    let store = RecordStore::open_in_memory().await.unwrap();
    let book = store
        .create_source(&Source::new(SourceType::Book, "Oaks of the World"))
        .await
        .unwrap()
        .id
        .unwrap();
    let site = store
        .create_source(&Source::new(SourceType::Website, "Oak Observations"))
        .await
        .unwrap()
        .id
        .unwrap();
    store.save_species(Species::new("alba")).await.unwrap();

    store
        .save_species_source(&SpeciesSource::new("alba", book))
        .await
        .unwrap();
    let mut preferred = SpeciesSource::new("alba", site);
    preferred.fields.is_preferred = Some(true);
    preferred.fields.local_names = Some(vec!["white oak".to_string()]);
    store.save_species_source(&preferred).await.unwrap();

    let view = store.species_with_sources("alba").await.unwrap();
    assert_eq!(view.species.scientific_name, "alba");
    let names: Vec<&str> = view.sources.iter().map(|s| s.source_name.as_str()).collect();
    assert_eq!(names, vec!["Oak Observations", "Oaks of the World"]);

    // Local names are searchable
    let hits = store.search_species("white oak", 10).await.unwrap();
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn test_stats_and_source_search() {
    let store = RecordStore::open_in_memory().await.unwrap();
    let mut book = Source::new(SourceType::Book, "Oaks of the World");
    book.author = Some("Le Hardÿ de Beaulieu".to_string());
    store.create_source(&book).await.unwrap();
    store
        .create_source(&Source::new(SourceType::Paper, "Phylogeny of Quercus"))
        .await
        .unwrap();

    store.save_species(Species::new("alba")).await.unwrap();
    store.save_species(Species::new("macrocarpa")).await.unwrap();
    store
        .save_species(Species::hybrid("× bebbiana", Some("alba"), Some("macrocarpa")))
        .await
        .unwrap();

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.species, 2);
    assert_eq!(stats.hybrids, 1);
    assert_eq!(stats.sources, 2);
    assert_eq!(stats.attributed_records, 0);

    let found = store.search_sources("beaulieu").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "Oaks of the World");
}
