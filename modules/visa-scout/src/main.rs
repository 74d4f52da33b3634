use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ai_client::OpenAi;
use visa_scout::pipeline::Pipeline;
use visa_scout::resolver::{HttpProbe, LivenessProbe};
use visa_scout::resumes::load_resumes;
use visa_scout::scoring::{select_strategy, LlmAdapter, OpenAiAdapter};
use visa_scout::scraper::{BrowserlessScraper, ChromeScraper, PageScraper};
use visa_scout::search::{
    BingSearcher, DuckDuckGoSearcher, FallbackSearcher, SerperSearcher, WebSearcher,
};
use visa_scout::seen_store::JsonFileSeenStore;
use visa_scout::sponsors::{load_overrides, SponsorRegistry};
use visa_scout_common::{Config, Resume, ScoutError};

#[derive(Parser)]
#[command(name = "visa-scout", about = "Daily QA job discovery across UK visa sponsors")]
struct Cli {
    /// Output directory for artifacts and the seen store (overrides DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory of .txt, .md and .pdf resumes (overrides RESUMES_DIR)
    #[arg(long)]
    resumes_dir: Option<PathBuf>,

    /// Sponsor register CSV (overrides SPONSOR_REGISTER_PATH)
    #[arg(long)]
    registry: Option<PathBuf>,

    #[arg(long)]
    max_companies: Option<usize>,

    #[arg(long)]
    daily_job_limit: Option<usize>,

    /// Score with the keyword heuristic even when an API key is set
    #[arg(long)]
    no_llm: bool,
}

impl Cli {
    fn apply(self, config: &mut Config) -> Result<(), ScoutError> {
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        if let Some(dir) = self.resumes_dir {
            config.resumes_dir = dir;
        }
        if let Some(path) = self.registry {
            config.sponsor_register_path = path;
        }
        if let Some(n) = self.max_companies {
            config.max_companies = n;
        }
        if let Some(n) = self.daily_job_limit {
            config.daily_job_limit = n;
        }
        if self.no_llm {
            config.llm_enabled = false;
        }
        config.validate()
    }
}

/// Serper when keyed, then the keyless HTML backends in order.
fn searcher(config: &Config) -> Result<Arc<dyn WebSearcher>> {
    let mut chain: Vec<Arc<dyn WebSearcher>> = Vec::new();
    if let Some(ref key) = config.serper_api_key {
        chain.push(Arc::new(SerperSearcher::new(key, config.probe_timeout)?));
    }
    chain.push(Arc::new(DuckDuckGoSearcher::new(config.probe_timeout)?));
    chain.push(Arc::new(BingSearcher::new(config.probe_timeout)?));

    let searcher = FallbackSearcher::new(chain);
    info!(searchers = ?searcher.names(), "Search client ready");
    Ok(Arc::new(searcher))
}

fn page_scraper(config: &Config) -> Result<Arc<dyn PageScraper>> {
    let scraper: Arc<dyn PageScraper> = match config.browserless_url {
        Some(ref url) => Arc::new(BrowserlessScraper::new(
            url,
            config.browserless_token.as_deref(),
            config.render_timeout,
        )?),
        None => Arc::new(ChromeScraper::new(&config.chrome_bin, config.render_timeout)),
    };
    Ok(scraper)
}

fn llm_adapter(config: &Config) -> Option<Arc<dyn LlmAdapter>> {
    let key = config.openai_api_key.as_deref().filter(|_| config.llm_available())?;
    let mut ai = OpenAi::new(key, config.llm_model.as_str());
    if let Some(ref base_url) = config.openai_base_url {
        ai = ai.with_base_url(base_url.as_str());
    }
    info!(model = config.llm_model.as_str(), "Scoring with LLM");
    Some(Arc::new(OpenAiAdapter::new(ai)))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("visa_scout=info".parse()?))
        .init();

    info!("Visa Scout starting...");

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    cli.apply(&mut config)?;

    // Local inputs first; any failure here stops the run before the network is touched.
    let registry = SponsorRegistry::from_path(&config.sponsor_register_path)?;
    let overrides = load_overrides(&config.career_pages_file);

    let resumes: Arc<[Resume]> = load_resumes(&config.resumes_dir, &config.pdftotext_bin)
        .await?
        .into();
    if resumes.is_empty() {
        return Err(ScoutError::Config(format!(
            "no resumes found in {}",
            config.resumes_dir.display()
        ))
        .into());
    }

    let probe: Arc<dyn LivenessProbe> = Arc::new(HttpProbe::new(config.probe_timeout)?);
    let seen = Box::new(JsonFileSeenStore::new(config.seen_store_path()));

    let mut pipeline = Pipeline::from_config(
        &config,
        searcher(&config)?,
        probe,
        page_scraper(&config)?,
        select_strategy(llm_adapter(&config)),
        seen,
    )?;

    let outcome = pipeline.run(&registry, &overrides, resumes).await?;

    for (rank, scored) in outcome.ranked.iter().enumerate() {
        info!(
            rank = rank + 1,
            sponsor = scored.posting.sponsor_name.as_str(),
            title = scored.posting.title.as_str(),
            resume = scored.resume_id.as_str(),
            match_score = scored.resume_match_score,
            url = scored.posting.url.as_str(),
            "Ranked posting"
        );
    }
    println!("{}", outcome.stats);

    Ok(())
}
