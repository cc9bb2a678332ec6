pub mod strategies;

use scraper::Html;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ScraperSettings;
use crate::http::{FetchError, HttpClient, HttpRequest};
use crate::types::{Airdrop, AirdropStatus};
use strategies::{default_strategies, ExtractionStrategy, RawListing};

pub struct AirdropScraper {
    http: HttpClient,
    settings: ScraperSettings,
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl AirdropScraper {
    pub fn new(http: HttpClient, settings: ScraperSettings) -> Self {
        Self {
            http,
            settings,
            strategies: default_strategies(),
        }
    }

    pub async fn try_scrape(&self) -> Result<Vec<Airdrop>, FetchError> {
        let request = HttpRequest::get(&self.settings.listing_url)
            .header("User-Agent", self.settings.user_agent.clone())
            .timeout(Duration::from_secs(self.settings.timeout_seconds));
        let body = self.http.get_text(request).await?;

        Ok(extract_airdrops(
            &body,
            &self.strategies,
            &self.settings.base_origin,
            self.settings.max_items,
        ))
    }

    /// Scrapes the listing page; a failed fetch yields an empty list.
    #[instrument(skip(self), fields(url = %self.settings.listing_url))]
    pub async fn scrape_airdrops(&self) -> Vec<Airdrop> {
        match self.try_scrape().await {
            Ok(airdrops) => {
                if airdrops.is_empty() {
                    warn!("No airdrops extracted from {}", self.settings.listing_url);
                } else {
                    info!("Scraped {} airdrops", airdrops.len());
                }
                airdrops
            }
            Err(e) => {
                error!("Error scraping airdrops: {}", e);
                Vec::new()
            }
        }
    }
}

/// Runs the strategies in order and keeps the first pass that produced a valid record.
pub fn extract_airdrops(
    html: &str,
    strategies: &[Box<dyn ExtractionStrategy>],
    base_origin: &str,
    max_items: usize,
) -> Vec<Airdrop> {
    let document = Html::parse_document(html);

    for strategy in strategies {
        let airdrops = finalize(strategy.as_ref(), strategy.extract(&document), base_origin, max_items);
        if !airdrops.is_empty() {
            debug!("Strategy '{}' matched {} airdrops", strategy.name(), airdrops.len());
            return airdrops;
        }
        debug!("Strategy '{}' matched nothing", strategy.name());
    }

    Vec::new()
}

fn finalize(
    strategy: &dyn ExtractionStrategy,
    listings: Vec<RawListing>,
    base_origin: &str,
    max_items: usize,
) -> Vec<Airdrop> {
    let mut seen = HashSet::new();

    listings
        .into_iter()
        .filter_map(|listing| {
            let title = listing.title?;
            let link = resolve_link(&listing.href?, base_origin)?;
            if !seen.insert(link.clone()) {
                return None;
            }
            Some(Airdrop {
                id: format!("{}-{}", strategy.id_prefix(), listing.position),
                title,
                link,
                reward: listing.reward,
                category: listing.category,
                status_kind: AirdropStatus::classify(listing.status.as_deref()),
                status: listing.status,
                description: listing.description,
            })
        })
        .take(max_items)
        .collect()
}

/// Resolves `href` against the site origin; fragments and non-web schemes yield `None`.
pub fn resolve_link(href: &str, base_origin: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let base = Url::parse(base_origin).ok()?;
    let resolved = base.join(href).ok()?;
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{StubReply, StubTransport};
    use std::sync::Arc;

    const CARDS: &str = r#"<html><body>
        <div class="airdrop-item">
          <h3>Alpha Protocol</h3>
          <a href="/alpha">Details</a>
          <span class="value">1,000 ALPHA</span>
          <span class="tag">DeFi</span>
          <span class="state">Ongoing</span>
          <p>Bridge once to qualify.</p>
        </div>
        <article>
          <h2>Beta Chain</h2>
          <a href="https://beta.example/claim">Claim</a>
          <div class="status-pill">Ended</div>
        </article>
        <div class="card"><h3>No link here</h3></div>
        <div class="card"><a href="/orphan">Untitled</a></div>
      </body></html>"#;

    const ANCHORS_ONLY: &str = r#"<html><body>
        <nav><a href="/about">About</a></nav>
        <ul>
          <li><a href="/airdrop/gamma">Gamma Drop</a></li>
          <li><a href="claim/delta" title="Delta Claim"></a></li>
        </ul>
      </body></html>"#;

    fn settings() -> ScraperSettings {
        ScraperSettings {
            listing_url: "https://airdrops.example/".to_string(),
            base_origin: "https://airdrops.example".to_string(),
            ..ScraperSettings::default()
        }
    }

    #[test]
    fn test_card_pass_extracts_and_resolves_links() {
        let airdrops = extract_airdrops(CARDS, &default_strategies(), "https://airdrops.example", 50);

        assert_eq!(airdrops.len(), 2);

        let alpha = &airdrops[0];
        assert_eq!(alpha.title, "Alpha Protocol");
        assert_eq!(alpha.link, "https://airdrops.example/alpha");
        assert_eq!(alpha.reward.as_deref(), Some("1,000 ALPHA"));
        assert_eq!(alpha.category.as_deref(), Some("DeFi"));
        assert_eq!(alpha.status.as_deref(), Some("Ongoing"));
        assert_eq!(alpha.status_kind, AirdropStatus::Active);
        assert_eq!(alpha.description.as_deref(), Some("Bridge once to qualify."));

        let beta = &airdrops[1];
        assert_eq!(beta.link, "https://beta.example/claim");
        assert_eq!(beta.status_kind, AirdropStatus::Ended);
        assert!(beta.reward.is_none());
    }

    #[test]
    fn test_anchor_pass_runs_when_cards_yield_nothing() {
        let airdrops = extract_airdrops(ANCHORS_ONLY, &default_strategies(), "https://airdrops.example", 50);

        let titles: Vec<&str> = airdrops.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Gamma Drop", "Delta Claim"]);
        assert_eq!(airdrops[0].link, "https://airdrops.example/airdrop/gamma");
        assert_eq!(airdrops[1].link, "https://airdrops.example/claim/delta");
        assert!(airdrops[0].id.starts_with("airdrop-fallback-"));
        assert_eq!(airdrops[0].status_kind, AirdropStatus::Unknown);
    }

    #[test]
    fn test_link_resolution() {
        let base = "https://airdrops.example";
        assert_eq!(resolve_link("/alpha", base).as_deref(), Some("https://airdrops.example/alpha"));
        assert_eq!(resolve_link("beta", base).as_deref(), Some("https://airdrops.example/beta"));
        assert_eq!(resolve_link("//cdn.example/gamma", base).as_deref(), Some("https://cdn.example/gamma"));
        assert_eq!(resolve_link("https://other.example/x", base).as_deref(), Some("https://other.example/x"));
        assert!(resolve_link("#", base).is_none());
        assert!(resolve_link("javascript:void(0)", base).is_none());
        assert!(resolve_link("mailto:team@airdrops.example", base).is_none());
    }

    #[test]
    fn test_output_is_capped() {
        let page: String = (0..80)
            .map(|i| format!(r#"<article><h2>Drop {i}</h2><a href="/d/{i}">go</a></article>"#))
            .collect();

        let airdrops = extract_airdrops(&page, &default_strategies(), "https://airdrops.example", 50);

        assert_eq!(airdrops.len(), 50);
        assert_eq!(airdrops[49].title, "Drop 49");
    }

    #[test]
    fn test_page_without_matches_is_empty() {
        let airdrops = extract_airdrops(
            "<html><body><a href='/about'>About</a></body></html>",
            &default_strategies(),
            "https://airdrops.example",
            50,
        );
        assert!(airdrops.is_empty());
    }

    #[tokio::test]
    async fn test_scrape_sends_user_agent_and_fails_soft() {
        let stub = Arc::new(StubTransport::new().on("airdrops.example", StubReply::status(503, "busy")));
        let scraper = AirdropScraper::new(HttpClient::new(stub.clone()), settings());

        assert!(scraper.scrape_airdrops().await.is_empty());

        let request = &stub.requests()[0];
        assert!(request.header_value("user-agent").is_some());
        assert_eq!(request.timeout, Duration::from_secs(15));
    }
}
