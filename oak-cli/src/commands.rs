//! Subcommand handlers

use crate::cli::{ImportArgs, ListArgs, SourceArgs, SourceCommands, TaxaCommands};
use crate::prompt::PromptResolver;
use anyhow::{bail, Context, Result};
use dialoguer::{theme::ColorfulTheme, Confirm};
use oak_common::config::TomlConfig;
use oak_common::merge::{load_document, EntryOutcome, ImportBatch, ImportReport};
use oak_common::names::normalize_hybrid_name;
use oak_common::taxa::TaxaFile;
use oak_common::{Error, RecordStore, Source, Species, SpeciesSource};
use serde::Serialize;
use std::io::IsTerminal;
use std::path::Path;
use tracing::{info, warn};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn normalize_slot(slot: &mut Option<String>) {
    if let Some(name) = slot {
        *name = normalize_hybrid_name(name);
    }
}

/// Apply the same `x` to `×` rewrite as single-record commands, so a batch never adds a second key
fn normalize_batch(batch: &mut ImportBatch) {
    for entry in &mut batch.entries {
        let species = &mut entry.species;
        species.scientific_name = normalize_hybrid_name(species.scientific_name.trim());
        normalize_slot(&mut species.parent1);
        normalize_slot(&mut species.parent2);
    }
}

pub async fn source(store: &RecordStore, command: SourceCommands) -> Result<()> {
    match command {
        SourceCommands::Add(args) => add_source(store, args).await,
        SourceCommands::List { query } => {
            let sources = match query {
                Some(query) => store.search_sources(&query).await?,
                None => store.list_sources().await?,
            };
            for source in &sources {
                let year = source.year.map(|y| format!(" ({})", y)).unwrap_or_default();
                println!(
                    "{:>4}  {:<11}  {}{}",
                    source.id.unwrap_or_default(),
                    source.source_type,
                    source.name,
                    year
                );
            }
            Ok(())
        }
        SourceCommands::Show { id } => print_json(&store.get_source(id).await?),
        SourceCommands::Delete { id } => {
            store
                .delete_source(id)
                .await
                .with_context(|| format!("Failed to delete source {}", id))?;
            println!("Deleted source {}", id);
            Ok(())
        }
    }
}

async fn add_source(store: &RecordStore, args: SourceArgs) -> Result<()> {
    let source = Source {
        id: None,
        source_type: args.source_type,
        name: args.name,
        description: args.description,
        author: args.author,
        year: args.year,
        url: args.url,
        isbn: args.isbn,
        doi: args.doi,
        notes: args.notes,
        license: args.license,
        license_url: args.license_url,
    };
    let created = store.create_source(&source).await?;
    println!(
        "Created source {}: {}",
        created.id.unwrap_or_default(),
        created.name
    );
    Ok(())
}

pub async fn list(store: &RecordStore, args: ListArgs) -> Result<()> {
    let filter = args.filter();
    let total = store.count_species(&filter).await?;
    let species = store
        .list_species_filtered(&filter, args.limit, args.offset)
        .await?;

    for entry in &species {
        let marker = if entry.is_hybrid { " [hybrid]" } else { "" };
        match &entry.author {
            Some(author) => println!("{} {}{}", entry.scientific_name, author, marker),
            None => println!("{}{}", entry.scientific_name, marker),
        }
    }
    println!("-- {} of {} species", species.len(), total);
    Ok(())
}

pub async fn show(store: &RecordStore, name: &str) -> Result<()> {
    let name = normalize_hybrid_name(name.trim());
    print_json(&store.species_with_sources(&name).await?)
}

pub async fn find(store: &RecordStore, query: &str, limit: i64) -> Result<()> {
    let hits = store.search_species(query, limit).await?;
    if hits.is_empty() {
        println!("No species match '{}'", query);
    }
    for species in &hits {
        println!("{}", species.scientific_name);
    }
    Ok(())
}

pub async fn save(store: &RecordStore, file: &Path) -> Result<()> {
    let mut species: Species = load_document(file)
        .with_context(|| format!("Failed to read species from {}", file.display()))?;
    species.scientific_name = normalize_hybrid_name(species.scientific_name.trim());
    normalize_slot(&mut species.parent1);
    normalize_slot(&mut species.parent2);

    for (level, name) in store.unlisted_taxa(&species).await? {
        warn!("{} '{}' is not in the taxa reference list", level, name);
    }

    let saved = store.save_species(species).await?;
    println!("Saved {}", saved.scientific_name);
    if !saved.hybrids.is_empty() {
        println!("  hybrids: {}", saved.hybrids.join(", "));
    }
    Ok(())
}

pub async fn attribute(store: &RecordStore, file: &Path) -> Result<()> {
    let mut record: SpeciesSource = load_document(file)
        .with_context(|| format!("Failed to read source data from {}", file.display()))?;
    record.scientific_name = normalize_hybrid_name(record.scientific_name.trim());

    let saved = store.save_species_source(&record).await?;
    println!(
        "Saved data for {} from source {}",
        saved.scientific_name, saved.source_id
    );
    Ok(())
}

pub async fn delete(store: &RecordStore, name: &str, unlink_hybrids: bool, force: bool) -> Result<()> {
    let name = normalize_hybrid_name(name.trim());
    // Surface NotFound before asking
    store.get_species(&name).await?;

    if !force {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Delete species '{}'?", name))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Cancelled");
            return Ok(());
        }
    }

    if unlink_hybrids {
        let unlinked = store.delete_species_unlinking(&name).await?;
        println!("Deleted {}", name);
        if !unlinked.is_empty() {
            println!("  parent cleared on: {}", unlinked.join(", "));
        }
    } else {
        match store.delete_species(&name).await {
            Err(e @ Error::ReferentialConflict { .. }) => {
                bail!("{}; use --unlink-hybrids to clear their parent slots", e)
            }
            result => result?,
        }
        println!("Deleted {}", name);
    }
    Ok(())
}

pub async fn import(store: &RecordStore, args: ImportArgs, config: &TomlConfig) -> Result<()> {
    let mut batch = ImportBatch::load(&args.file)
        .with_context(|| format!("Failed to read import batch {}", args.file.display()))?;
    normalize_batch(&mut batch);
    let policy = args.policy.unwrap_or(config.import.conflict_policy);
    info!(
        "Importing {} entries from {} (policy {:?})",
        batch.len(),
        args.file.display(),
        policy
    );

    let report = match policy.automatic() {
        Some(mut resolver) => {
            store
                .import_batch(&batch, args.source_id, resolver.as_mut())
                .await?
        }
        None => {
            if !std::io::stdin().is_terminal() {
                bail!("Conflict policy 'prompt' needs a terminal; pass --policy keep|accept|skip|reject");
            }
            let mut resolver = PromptResolver::new();
            store
                .import_batch(&batch, args.source_id, &mut resolver)
                .await?
        }
    };

    if args.json {
        print_json(&report)
    } else {
        print_report(&report);
        Ok(())
    }
}

fn print_report(report: &ImportReport) {
    for entry in &report.entries {
        match &entry.outcome {
            EntryOutcome::Redundant => {}
            EntryOutcome::Failed(reason) => {
                println!("{:>5}  {:<18} {}: {}", entry.index, "failed", entry.scientific_name, reason)
            }
            EntryOutcome::ConflictResolved(resolved) => {
                let fields: Vec<String> = resolved.iter().map(|r| r.field.to_string()).collect();
                println!(
                    "{:>5}  {:<18} {} ({})",
                    entry.index,
                    entry.outcome.label(),
                    entry.scientific_name,
                    fields.join(", ")
                )
            }
            other => println!("{:>5}  {:<18} {}", entry.index, other.label(), entry.scientific_name),
        }
    }

    let s = report.summary();
    println!(
        "Import {}: {} created, {} updated, {} redundant, {} resolved, {} skipped, {} failed",
        report.run_id, s.created, s.updated, s.redundant, s.conflict_resolved, s.skipped, s.failed
    );
}

pub async fn audit_hybrids(store: &RecordStore, repair: bool) -> Result<()> {
    if repair {
        let repaired = store.repair_hybrids().await?;
        println!("Repaired {} hybrids lists", repaired);
        return Ok(());
    }

    let drift = store.audit_hybrids().await?;
    if drift.is_empty() {
        println!("All hybrids lists are consistent");
        return Ok(());
    }
    for entry in &drift {
        println!("{}", entry.species);
        println!("  stored:   [{}]", entry.stored.join(", "));
        println!("  expected: [{}]", entry.expected.join(", "));
    }
    bail!("{} species have inconsistent hybrids lists; rerun with --repair", drift.len())
}

pub async fn stats(store: &RecordStore) -> Result<()> {
    let stats = store.stats().await?;
    println!("species:            {}", stats.species);
    println!("hybrids:            {}", stats.hybrids);
    println!("sources:            {}", stats.sources);
    println!("attributed records: {}", stats.attributed_records);
    Ok(())
}

pub async fn export(store: &RecordStore, file: Option<&Path>) -> Result<()> {
    let export = store.export_catalog().await?;
    let json = serde_json::to_string_pretty(&export)?;
    match file {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "Exported {} species to {}",
                export.metadata.species_count,
                path.display()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}

pub async fn taxa(store: &RecordStore, command: TaxaCommands) -> Result<()> {
    match command {
        TaxaCommands::Import { file, clear } => {
            let taxa = TaxaFile::load(&file)
                .with_context(|| format!("Failed to read taxa from {}", file.display()))?;
            let summary = store.import_taxa(&taxa, clear).await?;
            println!(
                "Imported {} taxa, {} already present",
                summary.imported, summary.skipped
            );
            Ok(())
        }
        TaxaCommands::List { level } => {
            let taxa = store.list_taxa(level).await?;
            for taxon in &taxa {
                let indent = if level.is_some() { 0 } else { taxon.level.depth() * 2 };
                let parent = taxon
                    .parent
                    .as_deref()
                    .map(|p| format!(" (in {})", p))
                    .unwrap_or_default();
                let author = taxon.author.as_deref().map(|a| format!(" {}", a)).unwrap_or_default();
                println!(
                    "{:indent$}{:<10}  {}{}{}",
                    "",
                    taxon.level,
                    taxon.name,
                    author,
                    parent,
                    indent = indent
                );
            }
            println!("-- {} taxa", taxa.len());
            Ok(())
        }
        TaxaCommands::Show { name, level } => print_json(&store.get_taxon(name.trim(), level).await?),
    }
}
