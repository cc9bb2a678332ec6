//! Ordered extraction passes over an airdrop listing page.
//!
//! Each strategy either produces raw listings or nothing; the scraper tries
//! them in order and keeps the first pass that yields a usable record.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

/// Fields as found on the page, before link resolution and validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawListing {
    pub position: usize,
    pub title: Option<String>,
    pub href: Option<String>,
    pub reward: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub description: Option<String>,
}

pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Prefix for ids of records produced by this pass.
    fn id_prefix(&self) -> &'static str;

    fn extract(&self, document: &Html) -> Vec<RawListing>;
}

fn compile(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

static CARD_CONTAINERS: Lazy<Option<Selector>> =
    Lazy::new(|| compile(r#".airdrop-item, .card, article, [class*="airdrop"]"#));
static CARD_TITLE: Lazy<Option<Selector>> = Lazy::new(|| compile(r#"h2, h3, .title, [class*="title"]"#));
static CARD_LINK: Lazy<Option<Selector>> = Lazy::new(|| compile("a"));
static CARD_REWARD: Lazy<Option<Selector>> = Lazy::new(|| compile(r#"[class*="reward"], .value, .amount"#));
static CARD_CATEGORY: Lazy<Option<Selector>> = Lazy::new(|| compile(r#"[class*="category"], .tag, .badge"#));
static CARD_STATUS: Lazy<Option<Selector>> = Lazy::new(|| compile(r#"[class*="status"], .state"#));
static CARD_DESCRIPTION: Lazy<Option<Selector>> = Lazy::new(|| compile(r#"p, .description, [class*="desc"]"#));

static CLAIM_ANCHORS: Lazy<Option<Selector>> = Lazy::new(|| compile(r#"a[href*="airdrop"], a[href*="claim"]"#));

/// Whitespace-collapsed text of an element and its descendants.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    let text = element.text().collect::<Vec<_>>().concat();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

fn first_text(scope: ElementRef<'_>, selector: &Option<Selector>) -> Option<String> {
    let selector = selector.as_ref()?;
    scope.select(selector).next().map(element_text).and_then(non_empty)
}

fn first_href(scope: ElementRef<'_>) -> Option<String> {
    let selector = CARD_LINK.as_ref()?;
    scope
        .select(selector)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string())
        .and_then(non_empty)
}

/// Card-like containers with per-field selector candidates.
pub struct CardStrategy;

impl ExtractionStrategy for CardStrategy {
    fn name(&self) -> &'static str {
        "card"
    }

    fn id_prefix(&self) -> &'static str {
        "airdrop"
    }

    fn extract(&self, document: &Html) -> Vec<RawListing> {
        let Some(containers) = CARD_CONTAINERS.as_ref() else {
            return Vec::new();
        };

        document
            .select(containers)
            .enumerate()
            .map(|(position, card)| RawListing {
                position,
                title: first_text(card, &CARD_TITLE),
                href: first_href(card),
                reward: first_text(card, &CARD_REWARD),
                category: first_text(card, &CARD_CATEGORY),
                status: first_text(card, &CARD_STATUS),
                description: first_text(card, &CARD_DESCRIPTION),
            })
            .collect()
    }
}

/// Bare anchors whose target looks like an airdrop or claim page.
pub struct AnchorStrategy;

impl ExtractionStrategy for AnchorStrategy {
    fn name(&self) -> &'static str {
        "anchor"
    }

    fn id_prefix(&self) -> &'static str {
        "airdrop-fallback"
    }

    fn extract(&self, document: &Html) -> Vec<RawListing> {
        let Some(anchors) = CLAIM_ANCHORS.as_ref() else {
            return Vec::new();
        };

        document
            .select(anchors)
            .enumerate()
            .map(|(position, anchor)| {
                let title = non_empty(element_text(anchor)).or_else(|| {
                    anchor
                        .value()
                        .attr("title")
                        .map(|t| t.trim().to_string())
                        .and_then(non_empty)
                });
                RawListing {
                    position,
                    title,
                    href: anchor
                        .value()
                        .attr("href")
                        .map(|h| h.trim().to_string())
                        .and_then(non_empty),
                    ..Default::default()
                }
            })
            .collect()
    }
}

pub fn default_strategies() -> Vec<Box<dyn ExtractionStrategy>> {
    vec![Box::new(CardStrategy), Box::new(AnchorStrategy)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_fields_take_first_match() {
        let html = Html::parse_document(
            r#"<div class="card">
                 <span class="badge">DeFi</span>
                 <h3>  Layer   Zero </h3>
                 <h2>Second heading</h2>
                 <a href="/layerzero">Open</a>
                 <div class="reward-box">$500</div>
                 <p>First paragraph</p>
                 <p>Second paragraph</p>
               </div>"#,
        );

        let listings = CardStrategy.extract(&html);

        assert_eq!(listings.len(), 1);
        let card = &listings[0];
        assert_eq!(card.title.as_deref(), Some("Layer Zero"));
        assert_eq!(card.href.as_deref(), Some("/layerzero"));
        assert_eq!(card.reward.as_deref(), Some("$500"));
        assert_eq!(card.category.as_deref(), Some("DeFi"));
        assert_eq!(card.description.as_deref(), Some("First paragraph"));
        assert!(card.status.is_none());
    }

    #[test]
    fn test_anchor_title_falls_back_to_title_attribute() {
        let html = Html::parse_document(
            r#"<a href="/claim/abc" title="Claim ABC"></a>
               <a href="/about">About</a>"#,
        );

        let listings = AnchorStrategy.extract(&html);

        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].title.as_deref(), Some("Claim ABC"));
    }
}
