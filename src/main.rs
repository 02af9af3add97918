//! Job matcher: semantic candidate and job posting matching

use clap::Parser;
use job_matcher::cli::{self, Cli, Commands, ConfigAction};
use job_matcher::config::{Config, OutputFormat};
use job_matcher::embedding::{EmbeddingPipeline, EmbeddingProvider, Enricher, HttpEmbeddingProvider};
use job_matcher::error::{MatcherError, Result};
use job_matcher::geocoding::{
    geocode_missing, CityTableGeocoder, NominatimGeocoder, RateLimitedGeocoder,
};
use job_matcher::input::InputManager;
use job_matcher::matching::{MatchQuery, MatchService};
use job_matcher::output::formatter::save_report_to_file;
use job_matcher::output::ReportGenerator;
use job_matcher::processing::normalizer::TextNormalizer;
use job_matcher::processing::requirements::RequirementExtractor;
use job_matcher::processing::tagger::{CategoryRuleTable, CategoryTagger};
use job_matcher::storage::backfill::{BackfillRunner, BackfillTarget};
use job_matcher::storage::feed::{FeedIngestor, IngestReport};
use job_matcher::storage::{CandidateStore, InMemoryStore, JobStore};
use log::{error, info};
use std::collections::HashSet;
use std::process;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };
    if let Some(store) = cli.store {
        config.storage.snapshot_path = store;
    }

    if let Err(e) = run_command(cli.command, config).await {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn output_format(output: &str) -> Result<OutputFormat> {
    cli::parse_output_format(output).map_err(MatcherError::InvalidInput)
}

fn load_tagger(config: &Config) -> Result<CategoryTagger> {
    let table = CategoryRuleTable::load(&config.taxonomy.category_map_path)?;
    let tagger = CategoryTagger::new(&table)?;
    info!("Loaded {} category rules", tagger.tag_count());
    Ok(tagger)
}

fn build_enricher(config: &Config) -> Result<Enricher> {
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(HttpEmbeddingProvider::new(&config.embedding)?);
    info!("Embedding with {} via {}", provider.model(), provider.name());
    let pipeline = EmbeddingPipeline::new(provider, &config.embedding, &config.processing)?;
    Enricher::new(config, load_tagger(config)?, pipeline)
}

async fn stored_job(store: &InMemoryStore, id: &str) -> Result<job_matcher::model::JobPosting> {
    store
        .get_job(id)
        .await?
        .ok_or_else(|| MatcherError::NotFound(format!("job {}", id)))
}

async fn run_command(command: Commands, config: Config) -> Result<()> {
    let reports = ReportGenerator::from_config(&config.output);

    match command {
        Commands::Normalize { input, output } => {
            cli::validate_file_extension(&input, &["txt", "md"]).map_err(MatcherError::InvalidInput)?;
            let format = output_format(&output)?;

            let text = InputManager::new().extract_text(&input).await?;
            let normalized = TextNormalizer::new(&config.processing)?.normalize_with_sections(&text);
            println!("{}", reports.formatter(format).format_normalized(&normalized)?);
        }

        Commands::Requirements { job, text, output } => {
            let format = output_format(&output)?;
            let extractor = RequirementExtractor::new(config.processing.max_text_chars)?;

            let (id, requirements) = match (job, text) {
                (Some(id), _) => {
                    let store = InMemoryStore::open(&config.storage.snapshot_path)?;
                    let job = stored_job(&store, &id).await?;
                    (id, extractor.extract(&job))
                }
                (None, Some(path)) => {
                    let description = InputManager::new().extract_text(&path).await?;
                    let id = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
                    (id, extractor.extract_parts(&description, None, false))
                }
                (None, None) => {
                    return Err(MatcherError::InvalidInput("Pass --job or --text".to_string()));
                }
            };
            println!("{}", reports.formatter(format).format_requirements(&id, &requirements)?);
        }

        Commands::Tag { job, text } => {
            let tagger = load_tagger(&config)?;
            let tags = match (job, text) {
                (Some(id), _) => {
                    let store = InMemoryStore::open(&config.storage.snapshot_path)?;
                    tagger.tag_job(&stored_job(&store, &id).await?)
                }
                (None, Some(path)) => tagger.tag_candidate(&InputManager::new().extract_text(&path).await?),
                (None, None) => {
                    return Err(MatcherError::InvalidInput("Pass --job or --text".to_string()));
                }
            };
            if tags.is_empty() {
                println!("(no category tags)");
            }
            for tag in tags.iter() {
                println!("{}", tag);
            }
        }

        Commands::Import { jobs, candidates } => {
            let store = InMemoryStore::open(&config.storage.snapshot_path)?;
            let manager = InputManager::new();

            if let Some(path) = jobs {
                for job in manager.load_jobs(&path).await? {
                    store.upsert_job(job).await?;
                }
            }
            if let Some(path) = candidates {
                for candidate in manager.load_candidates(&path).await? {
                    store.upsert_candidate(candidate).await?;
                }
            }
            store.persist().await?;
            println!("Store now holds {} jobs", store.job_count().await);
        }

        Commands::Candidate {
            id,
            document,
            wish,
            city,
            radius_km,
            fields,
        } => {
            cli::validate_file_extension(&document, &["pdf", "txt", "md"])
                .map_err(MatcherError::InvalidInput)?;
            let store = InMemoryStore::open(&config.storage.snapshot_path)?;

            let mut candidate = InputManager::new().candidate_from_document(&id, &document).await?;
            candidate.wish_text = wish;
            candidate.location = match &city {
                Some(city) => CityTableGeocoder::default().lookup(city),
                None => None,
            };
            candidate.city = city;
            candidate.radius_km = radius_km;
            candidate.allowed_fields = fields;

            store.upsert_candidate(candidate).await?;
            store.persist().await?;
            println!("Stored candidate {}; run `backfill candidates` to embed it", id);
        }

        Commands::Ingest { pages, complete, output } => {
            let format = output_format(&output)?;
            let store = InMemoryStore::open(&config.storage.snapshot_path)?;
            let ingestor = FeedIngestor::new(&store, config.feed.min_active_ids);
            let now = chrono::Utc::now();

            let mut report = IngestReport::default();
            let mut seen = HashSet::new();
            for page in &pages {
                let content = tokio::fs::read_to_string(page).await?;
                let postings = FeedIngestor::parse_page(&content)?;
                seen.extend(postings.iter().map(|p| p.id.clone()));

                let page_report = ingestor.ingest(postings, now).await?;
                report.inserted += page_report.inserted;
                report.text_changed += page_report.text_changed;
                report.unchanged += page_report.unchanged;
                report.expired += page_report.expired;
            }
            report.expired += ingestor.expire_past_deadline(now).await?;
            if complete {
                report.deactivated = ingestor.deactivate_missing(&seen).await?;
            }

            store.persist().await?;
            println!("{}", reports.formatter(format).format_ingest(&report)?);
        }

        Commands::Geocode { online, endpoint } => {
            let store = InMemoryStore::open(&config.storage.snapshot_path)?;
            let table = CityTableGeocoder::default();
            let mut report = geocode_missing(&store, &table).await?;

            if online {
                let interval = Duration::from_millis(config.geocoding.min_interval_ms);
                let remote = NominatimGeocoder::new(endpoint, Duration::from_secs(config.embedding.timeout_secs))?;
                let limited = RateLimitedGeocoder::new(remote, interval);
                let remote_report = geocode_missing(&store, &limited).await?;
                report.resolved += remote_report.resolved;
                report.unresolved = remote_report.unresolved;
                report.failed = remote_report.failed;
            }

            store.persist().await?;
            println!("{}", reports.formatter(OutputFormat::Console).format_geocode(&report)?);
        }

        Commands::Backfill {
            target,
            max_pages,
            quiet,
            output,
        } => {
            let format = output_format(&output)?;
            let store = InMemoryStore::open(&config.storage.snapshot_path)?;
            let enricher = build_enricher(&config)?;
            let runner = BackfillRunner::new(&enricher, &config.backfill)
                .with_progress(!quiet)
                .with_max_pages(max_pages);

            let result = match target {
                BackfillTarget::Jobs => runner.run_jobs(&store).await,
                BackfillTarget::Candidates => runner.run_candidates(&store).await,
            };
            // Pages written before a failure are kept.
            store.persist().await?;
            println!("{}", reports.formatter(format).format_backfill(&result?)?);
        }

        Commands::Match {
            candidate,
            radius,
            top_k,
            vector,
            policy,
            min_similarity,
            no_category_gate,
            bypass_ungated,
            include_unknown_location,
            detailed,
            output,
            save,
        } => {
            let format = output_format(&output)?;
            let store = InMemoryStore::open(&config.storage.snapshot_path)?;

            let mut query = MatchQuery::from_config(&config.matching);
            query.radius_km = radius;
            query.vector_choice = vector;
            query.category_gate = !no_category_gate;
            query.bypass_ungated |= bypass_ungated;
            query.include_unknown_location |= include_unknown_location;
            if let Some(top_k) = top_k {
                query.top_k = top_k;
            }
            if let Some(policy) = policy {
                query.policy.kind = policy;
            }
            if min_similarity.is_some() {
                query.min_similarity = min_similarity;
            }

            let geocoder = CityTableGeocoder::default();
            let result = MatchService::new(&store, &store)
                .with_geocoder(&geocoder)
                .match_candidate(&candidate, &query)
                .await?;

            let mut output_config = config.output.clone();
            output_config.detailed |= detailed;
            let rendered = ReportGenerator::from_config(&output_config)
                .formatter(format)
                .format_match(&result)?;

            match save {
                Some(path) => {
                    save_report_to_file(&rendered, &path)?;
                    println!("Saved {} matches to {}", result.entries.len(), path.display());
                }
                None => println!("{}", rendered),
            }
        }

        Commands::Config { action } => match action {
            Some(ConfigAction::Show) | None => {
                let content = toml::to_string_pretty(&config)
                    .map_err(|e| MatcherError::Configuration(format!("Failed to serialize config: {}", e)))?;
                println!("{}", content);
            }
            Some(ConfigAction::Path) => println!("{}", Config::config_path().display()),
            Some(ConfigAction::Reset) => {
                let path = Config::config_path();
                Config::default().save_to(&path)?;
                println!("Configuration reset: {}", path.display());
            }
        },
    }

    Ok(())
}
