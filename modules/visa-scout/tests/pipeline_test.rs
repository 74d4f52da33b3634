//! End-to-end pipeline runs against mocked search, probe, render and LLM boundaries.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use visa_scout::artifacts::{JOBS_RANKED, JOBS_RAW};
use visa_scout::pipeline::Pipeline;
use visa_scout::scoring::{select_strategy, LlmAdapter, ScoringStrategy};
use visa_scout::search::SearchResult;
use visa_scout::seen_store::{JsonFileSeenStore, SeenStore};
use visa_scout::sponsors::SponsorRegistry;
use visa_scout::testing::{career_page_html, MockLlm, MockProbe, MockScraper, MockSearcher};
use visa_scout_common::{Config, Resume};

const ACME: &str = "Acme Software Ltd";
const ACME_CAREERS: &str = "https://acme.example/careers";

fn acme_page() -> String {
    career_page_html(&[
        ("/jobs/senior-qa-engineer", "Senior QA Engineer"),
        ("/jobs/sdet", "SDET (Playwright)"),
        ("/jobs/sdet?utm_source=feed", "SDET (Playwright)"),
        ("/jobs/test-automation-engineer", "Test Automation Engineer"),
        ("/jobs/junior-qa", "Junior QA Tester"),
        ("/jobs/qa-contract", "QA Engineer - Contract"),
        ("/jobs/manual-qa-tester", "Manual QA Tester"),
        ("/jobs/backend", "Backend Engineer"),
        ("https://www.linkedin.com/jobs/view/123", "QA Engineer"),
        ("mailto:jobs@acme.example", "QA jobs inbox"),
    ])
}

fn config(data_dir: &Path, extra: &[(&str, &str)]) -> Config {
    let mut env: HashMap<String, String> = HashMap::from([
        ("DATA_DIR".to_string(), data_dir.display().to_string()),
        ("CONCURRENT_BROWSERS".to_string(), "2".to_string()),
    ]);
    for (k, v) in extra {
        env.insert(k.to_string(), v.to_string());
    }
    Config::from_lookup(|key| env.get(key).cloned()).unwrap()
}

fn registry(csv: &str) -> SponsorRegistry {
    SponsorRegistry::from_reader(csv.as_bytes()).unwrap()
}

fn acme_registry() -> SponsorRegistry {
    registry(
        "Organisation Name,Town/City,County,Type & Rating,Route\n\
         Acme Software Ltd,London,,Worker (A rating),Skilled Worker\n\
         Baker Bakery Ltd,Leeds,,Worker (A rating),Skilled Worker\n\
         Delta Data Ltd,Bristol,,Worker (A rating),Temporary Worker\n",
    )
}

fn overrides(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn resumes(texts: &[(&str, &str)]) -> Arc<[Resume]> {
    texts
        .iter()
        .map(|(id, text)| Resume {
            id: id.to_string(),
            text: text.to_string(),
        })
        .collect::<Vec<_>>()
        .into()
}

fn qa_resume() -> Arc<[Resume]> {
    resumes(&[(
        "qa.txt",
        "Senior QA engineer. Test automation with Playwright, Selenium and Python. SDET.",
    )])
}

fn pipeline(
    config: &Config,
    searcher: MockSearcher,
    scraper: MockScraper,
    strategy: Arc<dyn ScoringStrategy>,
) -> Pipeline {
    Pipeline::from_config(
        config,
        Arc::new(searcher),
        Arc::new(MockProbe::new().default_status(200)),
        Arc::new(scraper),
        strategy,
        Box::new(JsonFileSeenStore::new(config.seen_store_path())),
    )
    .unwrap()
}

#[tokio::test]
async fn run_keeps_only_wanted_roles_from_tech_skilled_worker_sponsors() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &[]);
    let scraper = MockScraper::new().on_page(ACME_CAREERS, &acme_page());
    let mut pipeline = pipeline(&config, MockSearcher::new(), scraper, select_strategy(None));

    let outcome = pipeline
        .run(&acme_registry(), &overrides(&[(ACME, ACME_CAREERS)]), qa_resume())
        .await
        .unwrap();

    assert_eq!(outcome.stats.sponsors_in_registry, 3);
    assert_eq!(outcome.stats.sponsors_filtered, 1);
    assert_eq!(outcome.stats.career_pages_resolved, 1);
    assert_eq!(outcome.stats.postings_scraped, 3);

    let mut urls: Vec<&str> = outcome.ranked.iter().map(|s| s.posting.url.as_str()).collect();
    urls.sort();
    assert_eq!(
        urls,
        vec![
            "https://acme.example/jobs/sdet",
            "https://acme.example/jobs/senior-qa-engineer",
            "https://acme.example/jobs/test-automation-engineer",
        ]
    );
    assert!(outcome.ranked.iter().all(|s| s.posting.sponsor_name == ACME));
}

#[tokio::test]
async fn second_run_over_same_pages_outputs_nothing_new() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &[]);
    let sponsors = overrides(&[(ACME, ACME_CAREERS)]);

    let first = pipeline(
        &config,
        MockSearcher::new(),
        MockScraper::new().on_page(ACME_CAREERS, &acme_page()),
        select_strategy(None),
    )
    .run(&acme_registry(), &sponsors, qa_resume())
    .await
    .unwrap();
    assert_eq!(first.ranked.len(), 3);
    assert_eq!(first.stats.fingerprints_recorded, 3);
    assert!(config.seen_store_path().exists());

    let mut second = pipeline(
        &config,
        MockSearcher::new(),
        MockScraper::new().on_page(ACME_CAREERS, &acme_page()),
        select_strategy(None),
    );
    let outcome = second
        .run(&acme_registry(), &sponsors, qa_resume())
        .await
        .unwrap();

    assert!(outcome.ranked.is_empty());
    assert_eq!(outcome.stats.duplicates_prior_runs, 3);
    assert_eq!(outcome.stats.new_postings, 0);
    assert_eq!(outcome.stats.fingerprints_recorded, 0);
    assert_eq!(second.seen_store().len(), 3);
    for scored in &first.ranked {
        assert!(second.seen_store().has(&scored.fingerprint));
    }
}

#[tokio::test]
async fn cap_keeps_top_ranked_but_records_everything_scored() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &[("DAILY_JOB_LIMIT", "4")]);

    let links: Vec<(String, String)> = (0..10)
        .map(|i| (format!("/jobs/qa-{i}"), format!("QA Engineer {i}")))
        .collect();
    let link_refs: Vec<(&str, &str)> = links
        .iter()
        .map(|(h, t)| (h.as_str(), t.as_str()))
        .collect();
    let scraper = MockScraper::new().on_page(ACME_CAREERS, &career_page_html(&link_refs));

    let mut pipeline = pipeline(&config, MockSearcher::new(), scraper, select_strategy(None));
    let outcome = pipeline
        .run(&acme_registry(), &overrides(&[(ACME, ACME_CAREERS)]), qa_resume())
        .await
        .unwrap();

    assert_eq!(outcome.stats.postings_scored, 10);
    assert_eq!(outcome.ranked.len(), 4);
    assert_eq!(outcome.stats.postings_output, 4);
    assert_eq!(outcome.stats.fingerprints_recorded, 10);
    assert_eq!(pipeline.seen_store().len(), 10);
    assert!(outcome
        .ranked
        .windows(2)
        .all(|w| w[0].composite_rank >= w[1].composite_rank));

    let ranked_csv = std::fs::read_to_string(dir.path().join(JOBS_RANKED)).unwrap();
    assert_eq!(ranked_csv.lines().count(), 5);
    let raw_csv = std::fs::read_to_string(dir.path().join(JOBS_RAW)).unwrap();
    assert_eq!(raw_csv.lines().count(), 11);
}

#[tokio::test]
async fn concurrent_renders_never_exceed_browser_limit() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &[("CONCURRENT_BROWSERS", "3")]);

    let mut csv = String::from("Organisation Name,Route\n");
    let mut sponsor_urls = Vec::new();
    for i in 0..30 {
        csv.push_str(&format!("Sponsor{i} Software Ltd,Skilled Worker\n"));
        sponsor_urls.push((
            format!("Sponsor{i} Software Ltd"),
            format!("https://sponsor{i}.example/careers"),
        ));
    }
    let overrides: HashMap<String, String> = sponsor_urls.into_iter().collect();

    let scraper = MockScraper::new()
        .on_any_page(&career_page_html(&[("/jobs/sdet", "SDET")]))
        .with_delay(Duration::from_millis(20));
    let mut pipeline = pipeline(
        &config,
        MockSearcher::new(),
        scraper.clone(),
        select_strategy(None),
    );

    let outcome = pipeline
        .run(&registry(&csv), &overrides, qa_resume())
        .await
        .unwrap();

    assert_eq!(scraper.renders(), 30);
    assert!(scraper.peak_concurrency() <= 3, "peak {}", scraper.peak_concurrency());
    assert!(scraper.peak_concurrency() >= 1);
    assert_eq!(outcome.stats.pages_rendered, 30);
    assert_eq!(outcome.stats.new_postings, 30);
}

#[tokio::test]
async fn disabled_llm_falls_back_to_heuristic_without_calls() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(
        dir.path(),
        &[("OPENAI_API_KEY", "sk-test"), ("LLM_ENABLED", "false")],
    );
    let llm = MockLlm::new().respond_with("{}");
    let adapter = config
        .llm_available()
        .then(|| Arc::new(llm.clone()) as Arc<dyn LlmAdapter>);

    let mut pipeline = pipeline(
        &config,
        MockSearcher::new(),
        MockScraper::new().on_page(ACME_CAREERS, &acme_page()),
        select_strategy(adapter),
    );
    let outcome = pipeline
        .run(&acme_registry(), &overrides(&[(ACME, ACME_CAREERS)]), qa_resume())
        .await
        .unwrap();

    assert_eq!(llm.calls(), 0);
    assert_eq!(outcome.ranked.len(), 3);
    for scored in &outcome.ranked {
        assert_eq!(scored.scored_by, "heuristic");
        assert!(scored.qa_relevance <= 10);
        assert!(scored.resume_match_score <= 100);
        assert!(!scored.reason.contains('\n'));
    }
}

#[tokio::test]
async fn best_of_three_resumes_wins_each_posting() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &[]);
    let llm = MockLlm::new()
        .on_resume("a.txt", 40)
        .on_resume("b.txt", 85)
        .on_resume("c.txt", 60);

    let mut pipeline = pipeline(
        &config,
        MockSearcher::new(),
        MockScraper::new().on_page(ACME_CAREERS, &acme_page()),
        select_strategy(Some(Arc::new(llm.clone()))),
    );
    let outcome = pipeline
        .run(
            &acme_registry(),
            &overrides(&[(ACME, ACME_CAREERS)]),
            resumes(&[("a.txt", "one"), ("b.txt", "two"), ("c.txt", "three")]),
        )
        .await
        .unwrap();

    assert_eq!(llm.calls(), 9);
    assert_eq!(outcome.stats.pairs_scored, 9);
    assert_eq!(outcome.ranked.len(), 3);
    for scored in &outcome.ranked {
        assert_eq!(scored.resume_id, "b.txt");
        assert_eq!(scored.resume_match_score, 85);
        assert_eq!(scored.scored_by, "llm");
    }
}

#[tokio::test]
async fn malformed_llm_responses_skip_pairs_and_the_run_completes() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &[]);
    let llm = MockLlm::new()
        .on_resume("a.txt", 55)
        .on_resume_raw("b.txt", "Sure! Here is the score: 90");

    let mut pipeline = pipeline(
        &config,
        MockSearcher::new(),
        MockScraper::new().on_page(ACME_CAREERS, &acme_page()),
        select_strategy(Some(Arc::new(llm))),
    );
    let outcome = pipeline
        .run(
            &acme_registry(),
            &overrides(&[(ACME, ACME_CAREERS)]),
            resumes(&[("a.txt", "one"), ("b.txt", "two")]),
        )
        .await
        .unwrap();

    assert_eq!(outcome.stats.pairs_failed, 3);
    assert_eq!(outcome.stats.pairs_scored, 3);
    assert_eq!(outcome.ranked.len(), 3);
    assert!(outcome.ranked.iter().all(|s| s.resume_id == "a.txt"));
}

#[tokio::test]
async fn search_resolution_skips_aggregators_and_counts_unresolved() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &[]);
    let csv = "Organisation Name,Route\n\
               Bluefin Tech Ltd,Skilled Worker\n\
               Nowhere Digital Ltd,Skilled Worker\n";

    let searcher = MockSearcher::new()
        .on_search(
            "Bluefin Tech Ltd careers",
            vec![
                SearchResult::new("https://uk.linkedin.com/company/bluefin", "Bluefin | LinkedIn"),
                SearchResult::new("https://www.bluefin-tech.co.uk/careers", "Careers at Bluefin"),
            ],
        )
        .on_search(
            "Nowhere Digital Ltd careers",
            vec![SearchResult::new("https://www.indeed.co.uk/q-nowhere", "Indeed")],
        );
    let scraper = MockScraper::new().on_page(
        "https://www.bluefin-tech.co.uk/careers",
        &career_page_html(&[("/roles/sdet", "SDET")]),
    );

    let mut pipeline = pipeline(&config, searcher.clone(), scraper, select_strategy(None));
    let outcome = pipeline
        .run(&registry(csv), &HashMap::new(), qa_resume())
        .await
        .unwrap();

    assert_eq!(outcome.stats.career_pages_resolved, 1);
    assert_eq!(outcome.stats.sponsors_unresolved, 1);
    assert_eq!(outcome.ranked.len(), 1);
    assert_eq!(outcome.ranked[0].posting.sponsor_name, "Bluefin Tech Ltd");
    assert_eq!(
        outcome.ranked[0].posting.career_page_url,
        "https://www.bluefin-tech.co.uk/careers"
    );
    // Nowhere Digital retries once in safe mode without the "Ltd" suffix.
    assert_eq!(searcher.calls(), 3);
}

#[tokio::test]
async fn corrupt_seen_store_aborts_before_network_activity() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &[]);
    std::fs::write(config.seen_store_path(), "{ not json").unwrap();

    let searcher = MockSearcher::new();
    let scraper = MockScraper::new().on_any_page(&acme_page());
    let mut pipeline = pipeline(&config, searcher.clone(), scraper.clone(), select_strategy(None));

    let result = pipeline
        .run(&acme_registry(), &HashMap::new(), qa_resume())
        .await;

    assert!(result.is_err());
    assert_eq!(searcher.calls(), 0);
    assert_eq!(scraper.renders(), 0);
    assert_eq!(
        std::fs::read_to_string(config.seen_store_path()).unwrap(),
        "{ not json"
    );
}
