use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{debug, info, warn};
use url::Url;

use visa_scout_common::{ScoutError, SponsorRecord, VisaRoute};

/// Sector (or, failing that, organisation name) fragments that mark a sponsor as tech.
pub const TECH_SECTOR_KEYWORDS: &[&str] = &[
    "tech",
    "software",
    "digital",
    "ai",
    "data",
    "cloud",
    "robotics",
    "electronics",
    "automation",
    "solutions",
    "systems",
    "cyber",
];

const NAME_COLUMNS: &[&str] = &[
    "organisation name",
    "organisation",
    "organization name",
    "company name",
    "organisationname",
    "name",
];
const ROUTE_COLUMNS: &[&str] = &["route", "routes", "visa route"];
const SECTOR_COLUMNS: &[&str] = &["sector", "industry", "occupation", "sector/occupation"];
const TOWN_COLUMNS: &[&str] = &["town/city", "town", "city"];
const COUNTY_COLUMNS: &[&str] = &["county"];

/// All registry rows for one organisation, merged.
#[derive(Debug, Clone, Default)]
pub struct RegisteredSponsor {
    pub name: String,
    pub routes: Vec<VisaRoute>,
    pub sectors: Vec<String>,
    pub town: Option<String>,
    pub county: Option<String>,
}

impl RegisteredSponsor {
    pub fn offers_skilled_worker(&self) -> bool {
        self.routes.contains(&VisaRoute::SkilledWorker)
    }

    fn location(&self) -> Option<String> {
        match (&self.town, &self.county) {
            (Some(town), Some(county)) => Some(format!("{town}, {county}")),
            (Some(one), None) | (None, Some(one)) => Some(one.clone()),
            (None, None) => None,
        }
    }

    /// Tech classification. Returns the tags to carry on the record, or `None` when the
    /// sponsor is not tech.
    fn tech_tags(&self) -> Option<BTreeSet<String>> {
        if !self.sectors.is_empty() {
            let text = self.sectors.join(" ").to_lowercase();
            if !contains_any(&text, TECH_SECTOR_KEYWORDS) {
                return None;
            }
            let tags = self
                .sectors
                .iter()
                .flat_map(|cell| cell.split([',', ';', '/']))
                .map(|tag| tag.trim().to_lowercase())
                .filter(|tag| !tag.is_empty())
                .collect();
            return Some(tags);
        }

        let name = self.name.to_lowercase();
        let matched: BTreeSet<String> = TECH_SECTOR_KEYWORDS
            .iter()
            .filter(|kw| name.contains(*kw))
            .map(|kw| kw.to_string())
            .collect();
        (!matched.is_empty()).then_some(matched)
    }
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| text.contains(kw))
}

/// The parsed sponsor registry, grouped by organisation in first-appearance order.
#[derive(Debug, Clone)]
pub struct SponsorRegistry {
    sponsors: Vec<RegisteredSponsor>,
}

fn find_column(headers: &csv::StringRecord, candidates: &[&str]) -> Option<usize> {
    let normalized: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
    candidates
        .iter()
        .find_map(|candidate| normalized.iter().position(|h| h == candidate))
}

fn cell(record: &csv::StringRecord, column: Option<usize>) -> Option<String> {
    column
        .and_then(|idx| record.get(idx))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

impl SponsorRegistry {
    pub fn from_path(path: &Path) -> Result<Self, ScoutError> {
        let file = File::open(path).map_err(|e| {
            ScoutError::Registry(format!("cannot open {}: {e}", path.display()))
        })?;
        let registry = Self::from_reader(file)?;
        info!(
            path = %path.display(),
            sponsors = registry.len(),
            "Loaded sponsor registry"
        );
        Ok(registry)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ScoutError> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr
            .headers()
            .map_err(|e| ScoutError::Registry(format!("unreadable header row: {e}")))?
            .clone();
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(ScoutError::Registry("registry has no header row".to_string()));
        }

        let name_col = find_column(&headers, NAME_COLUMNS)
            .ok_or_else(|| ScoutError::Registry("no organisation name column".to_string()))?;
        let route_col = find_column(&headers, ROUTE_COLUMNS)
            .ok_or_else(|| ScoutError::Registry("no route column".to_string()))?;
        let sector_col = find_column(&headers, SECTOR_COLUMNS);
        let town_col = find_column(&headers, TOWN_COLUMNS);
        let county_col = find_column(&headers, COUNTY_COLUMNS);

        let mut sponsors: Vec<RegisteredSponsor> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for result in rdr.records() {
            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "Skipping malformed registry row");
                    continue;
                }
            };
            let Some(name) = cell(&record, Some(name_col)) else {
                continue;
            };

            let slot = *index.entry(name.clone()).or_insert_with(|| {
                sponsors.push(RegisteredSponsor {
                    name: name.clone(),
                    ..Default::default()
                });
                sponsors.len() - 1
            });
            let sponsor = &mut sponsors[slot];

            if let Some(routes) = cell(&record, Some(route_col)) {
                for route in VisaRoute::parse_list(&routes) {
                    if !sponsor.routes.contains(&route) {
                        sponsor.routes.push(route);
                    }
                }
            }
            if let Some(sector) = cell(&record, sector_col) {
                if !sponsor.sectors.contains(&sector) {
                    sponsor.sectors.push(sector);
                }
            }
            if sponsor.town.is_none() {
                sponsor.town = cell(&record, town_col);
            }
            if sponsor.county.is_none() {
                sponsor.county = cell(&record, county_col);
            }
        }

        if sponsors.is_empty() {
            return Err(ScoutError::Registry("registry contains no sponsors".to_string()));
        }

        Ok(Self { sponsors })
    }

    pub fn len(&self) -> usize {
        self.sponsors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sponsors.is_empty()
    }

    pub fn sponsors(&self) -> &[RegisteredSponsor] {
        &self.sponsors
    }

    /// Skilled Worker tech sponsors, truncated to `max_companies` in registry order.
    pub fn filter(
        &self,
        overrides: &HashMap<String, String>,
        max_companies: usize,
    ) -> Vec<SponsorRecord> {
        let records: Vec<SponsorRecord> = self
            .sponsors
            .iter()
            .filter(|s| s.offers_skilled_worker())
            .filter_map(|s| {
                let sector_tags = s.tech_tags()?;
                Some(SponsorRecord {
                    name: s.name.clone(),
                    visa_route: VisaRoute::SkilledWorker,
                    sector_tags,
                    override_career_url: overrides.get(&s.name).cloned(),
                    location: s.location(),
                })
            })
            .take(max_companies)
            .collect();

        info!(
            registry = self.len(),
            retained = records.len(),
            max_companies,
            "Sponsor filter complete"
        );
        records
    }
}

/// Load the career-page override file: a JSON object of exact sponsor name to URL.
///
/// Missing or malformed files yield no overrides. Entries whose URL is not absolute http(s)
/// are dropped.
pub fn load_overrides(path: &Path) -> HashMap<String, String> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No career page overrides file");
            return HashMap::new();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read career page overrides");
            return HashMap::new();
        }
    };
    parse_overrides(&raw)
}

pub fn parse_overrides(raw: &str) -> HashMap<String, String> {
    let parsed: HashMap<String, String> = match serde_json::from_str(raw) {
        Ok(map) => map,
        Err(e) => {
            warn!(error = %e, "Malformed career page overrides, ignoring");
            return HashMap::new();
        }
    };

    parsed
        .into_iter()
        .filter_map(|(name, url)| {
            let url = url.trim().to_string();
            match Url::parse(&url) {
                Ok(u) if matches!(u.scheme(), "http" | "https") => Some((name, url)),
                _ => {
                    warn!(sponsor = %name, url, "Ignoring non-absolute override URL");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(csv: &str) -> SponsorRegistry {
        SponsorRegistry::from_reader(csv.as_bytes()).unwrap()
    }

    const SAMPLE: &str = "\
Organisation Name,Town/City,County,Type & Rating,Route
Acme Software Ltd,London,,Worker (A rating),Skilled Worker
Acme Software Ltd,London,,Worker (A rating),Global Business Mobility: Senior or Specialist Worker
Bakery Co,Leeds,West Yorkshire,Worker (A rating),Skilled Worker
DataWorks Ltd,Bristol,,Temporary Worker,Creative Worker
Cloud Nine Systems,Reading,Berkshire,Worker (A rating),Skilled Worker
";

    #[test]
    fn groups_rows_by_organisation() {
        let reg = registry(SAMPLE);
        assert_eq!(reg.len(), 4);
        let acme = &reg.sponsors()[0];
        assert_eq!(acme.routes.len(), 2);
        assert!(acme.offers_skilled_worker());
    }

    #[test]
    fn filter_keeps_only_skilled_worker_tech_sponsors() {
        let reg = registry(SAMPLE);
        let out = reg.filter(&HashMap::new(), 150);
        let names: Vec<&str> = out.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Acme Software Ltd", "Cloud Nine Systems"]);
        assert!(out.iter().all(|s| s.visa_route == VisaRoute::SkilledWorker));
        assert_eq!(out[1].location.as_deref(), Some("Reading, Berkshire"));
        assert!(out[0].sector_tags.contains("software"));
    }

    #[test]
    fn filter_truncates_in_registry_order() {
        let reg = registry(SAMPLE);
        let out = reg.filter(&HashMap::new(), 1);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "Acme Software Ltd");
    }

    #[test]
    fn sector_column_takes_precedence_over_name() {
        let csv = "\
Organisation Name,Route,Sector
Plain Name Ltd,Skilled Worker,Information Technology / Software
Data Bakery,Skilled Worker,Food Production
";
        let out = registry(csv).filter(&HashMap::new(), 10);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "Plain Name Ltd");
        assert!(out[0].sector_tags.contains("software"));
        assert!(out[0].sector_tags.contains("information technology"));
    }

    #[test]
    fn overrides_attach_by_exact_name() {
        let reg = registry(SAMPLE);
        let overrides = HashMap::from([(
            "Cloud Nine Systems".to_string(),
            "https://cloudnine.example/careers".to_string(),
        )]);
        let out = reg.filter(&overrides, 150);
        assert_eq!(out[0].override_career_url, None);
        assert_eq!(
            out[1].override_career_url.as_deref(),
            Some("https://cloudnine.example/careers")
        );
    }

    #[test]
    fn header_columns_match_case_insensitively() {
        let csv = "company name,VISA ROUTE\nByte Tech,skilled worker\n";
        let out = registry(csv).filter(&HashMap::new(), 10);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn empty_registry_is_fatal() {
        let err = SponsorRegistry::from_reader("".as_bytes()).unwrap_err();
        assert!(matches!(err, ScoutError::Registry(_)));

        let err = SponsorRegistry::from_reader("Organisation Name,Route\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ScoutError::Registry(_)));
    }

    #[test]
    fn missing_name_column_is_fatal() {
        let err = SponsorRegistry::from_reader("Foo,Route\nx,Skilled Worker\n".as_bytes())
            .unwrap_err();
        assert!(err.to_string().contains("organisation name"));
    }

    #[test]
    fn missing_registry_file_is_fatal() {
        let err = SponsorRegistry::from_path(Path::new("/nonexistent/register.csv")).unwrap_err();
        assert!(matches!(err, ScoutError::Registry(_)));
    }

    #[test]
    fn overrides_drop_relative_urls_and_tolerate_garbage() {
        let parsed = parse_overrides(
            r#"{"Acme": "https://acme.example/jobs", "Globex": "/careers", "Initech": "ftp://x"}"#,
        );
        assert_eq!(parsed.len(), 1);
        assert!(parsed.contains_key("Acme"));

        assert!(parse_overrides("not json").is_empty());
    }

    #[test]
    fn missing_overrides_file_is_empty() {
        assert!(load_overrides(Path::new("/nonexistent/career_pages.json")).is_empty());
    }
}
