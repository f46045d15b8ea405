//! Command-line definitions

use clap::{Args, Parser, Subcommand};
use oak_common::merge::ConflictPolicy;
use oak_common::search::SpeciesFilter;
use oak_common::taxa::TaxonLevel;
use oak_common::SourceType;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "oak",
    version,
    about = "Oak (Quercus) taxonomy catalog",
    long_about = "Records oak species, hybrids and source-attributed descriptive data, \
                  and merges bulk imports without silently overwriting stored values."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database file (overrides OAK_DATABASE and the config file)
    #[arg(long, global = true, value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Config file (defaults to <config dir>/oak/config.toml)
    #[arg(long, global = true, env = "OAK_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Debug logging for this run
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage sources
    Source {
        #[command(subcommand)]
        command: SourceCommands,
    },

    /// List species, optionally filtered by taxonomy
    List(ListArgs),

    /// Show a species with all attributed source data
    Show {
        /// Scientific name
        name: String,
    },

    /// Search species by name, author, synonym or local name
    Find {
        query: String,

        #[arg(long, default_value_t = 50)]
        limit: i64,
    },

    /// Create or update a species from a JSON/YAML document
    Save {
        file: PathBuf,
    },

    /// Create or update a source-attributed record from a JSON/YAML document
    Attribute {
        file: PathBuf,
    },

    /// Delete a species
    Delete {
        name: String,

        /// Clear this species from hybrids that name it as a parent
        #[arg(long)]
        unlink_hybrids: bool,

        /// Do not ask for confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Merge a batch of species attributed to one source
    Import(ImportArgs),

    /// Check every stored hybrids list against the parent slots
    AuditHybrids {
        /// Rewrite lists that drifted
        #[arg(long)]
        repair: bool,
    },

    /// Row counts
    Stats,

    /// Write the whole catalog as JSON
    Export {
        /// Output file (stdout when omitted)
        file: Option<PathBuf>,
    },

    /// Subgenus, section, subsection and complex reference data
    Taxa {
        #[command(subcommand)]
        command: TaxaCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum TaxaCommands {
    /// Load a JSON/YAML file with subgenera, sections, subsections and complexes lists
    Import {
        file: PathBuf,

        /// Remove all stored taxa first
        #[arg(long)]
        clear: bool,
    },

    /// List taxa, optionally of one level
    List {
        /// subgenus, section, subsection or complex
        level: Option<TaxonLevel>,
    },

    /// Show one taxon
    Show {
        name: String,

        #[arg(long)]
        level: TaxonLevel,
    },
}

#[derive(Subcommand, Debug)]
pub enum SourceCommands {
    /// Register a new source
    Add(SourceArgs),

    /// List sources, optionally matching a search term
    List {
        #[arg(long)]
        query: Option<String>,
    },

    /// Show one source
    Show { id: i64 },

    /// Delete a source that no species data refers to
    Delete { id: i64 },
}

#[derive(Args, Debug)]
pub struct SourceArgs {
    /// book, paper, website, observation, database or other
    #[arg(long = "type", value_name = "TYPE")]
    pub source_type: SourceType,

    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub author: Option<String>,

    #[arg(long)]
    pub year: Option<i32>,

    #[arg(long)]
    pub url: Option<String>,

    #[arg(long)]
    pub isbn: Option<String>,

    #[arg(long)]
    pub doi: Option<String>,

    #[arg(long)]
    pub notes: Option<String>,

    #[arg(long)]
    pub license: Option<String>,

    #[arg(long)]
    pub license_url: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(long)]
    pub subgenus: Option<String>,

    #[arg(long)]
    pub section: Option<String>,

    #[arg(long)]
    pub subsection: Option<String>,

    #[arg(long)]
    pub complex: Option<String>,

    /// Only hybrids
    #[arg(long, conflicts_with = "no_hybrids")]
    pub hybrids: bool,

    /// Exclude hybrids
    #[arg(long)]
    pub no_hybrids: bool,

    #[arg(long, default_value_t = 100)]
    pub limit: i64,

    #[arg(long, default_value_t = 0)]
    pub offset: i64,
}

impl ListArgs {
    pub fn filter(&self) -> SpeciesFilter {
        let hybrid = match (self.hybrids, self.no_hybrids) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        SpeciesFilter {
            subgenus: self.subgenus.clone(),
            section: self.section.clone(),
            subsection: self.subsection.clone(),
            complex: self.complex.clone(),
            hybrid,
        }
    }
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSON or YAML list of entries
    pub file: PathBuf,

    /// Source every entry's data is attributed to
    #[arg(long)]
    pub source_id: i64,

    /// prompt, keep, accept, skip or reject (defaults to the config file's import.conflict_policy)
    #[arg(long)]
    pub policy: Option<ConflictPolicy>,

    /// Print the full report as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_import_with_policy() {
        let cli = Cli::try_parse_from([
            "oak", "import", "batch.yaml", "--source-id", "3", "--policy", "accept",
        ])
        .unwrap();
        match cli.command {
            Commands::Import(args) => {
                assert_eq!(args.source_id, 3);
                assert_eq!(args.policy, Some(ConflictPolicy::Accept));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        let result = Cli::try_parse_from([
            "oak", "import", "batch.yaml", "--source-id", "3", "--policy", "merge",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_source_add_parses_type() {
        let cli = Cli::try_parse_from([
            "oak", "source", "add", "--type", "book", "--name", "Oaks of the World",
        ])
        .unwrap();
        match cli.command {
            Commands::Source {
                command: SourceCommands::Add(args),
            } => assert_eq!(args.source_type, SourceType::Book),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_taxa_list_level() {
        let cli = Cli::try_parse_from(["oak", "taxa", "list", "section"]).unwrap();
        match cli.command {
            Commands::Taxa {
                command: TaxaCommands::List { level },
            } => assert_eq!(level, Some(TaxonLevel::Section)),
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Cli::try_parse_from(["oak", "taxa", "list", "series"]).is_err());
    }

    #[test]
    fn test_export_file_is_optional() {
        let cli = Cli::try_parse_from(["oak", "export"]).unwrap();
        assert!(matches!(cli.command, Commands::Export { file: None }));
    }

    #[test]
    fn test_list_filter_flags() {
        let cli =
            Cli::try_parse_from(["oak", "list", "--section", "Lobatae", "--no-hybrids"]).unwrap();
        match cli.command {
            Commands::List(args) => {
                let filter = args.filter();
                assert_eq!(filter.section.as_deref(), Some("Lobatae"));
                assert_eq!(filter.hybrid, Some(false));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
