use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use scraper::Html;

use crate::http::FetchError;
use crate::types::NewsItem;

/// Parses an RSS 2.0 document, falling back to Atom.
pub fn parse_feed(body: &str, source: &str, fetched_at: DateTime<Utc>) -> Result<Vec<NewsItem>, FetchError> {
    match rss::Channel::read_from(body.as_bytes()) {
        Ok(channel) => Ok(normalize_rss(&channel, source, fetched_at)),
        Err(rss_err) => match atom_syndication::Feed::read_from(body.as_bytes()) {
            Ok(feed) => Ok(normalize_atom(&feed, source, fetched_at)),
            Err(atom_err) => Err(FetchError::Parse(format!(
                "not RSS ({}) or Atom ({})",
                rss_err, atom_err
            ))),
        },
    }
}

fn normalize_rss(channel: &rss::Channel, source: &str, fetched_at: DateTime<Utc>) -> Vec<NewsItem> {
    channel
        .items()
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let guid = item.guid().map(|g| g.value()).and_then(non_blank);
            let link = item.link().and_then(non_blank);

            let content = item
                .description()
                .or(item.content())
                .map(strip_markup)
                .and_then(|s| non_blank(&s).map(str::to_string))
                .or_else(|| item.content().and_then(non_blank).map(str::to_string));

            NewsItem {
                id: item_id(source, guid.or(link), index),
                title: item.title().and_then(non_blank).unwrap_or("No title").to_string(),
                link: link.unwrap_or("#").to_string(),
                pub_date: item
                    .pub_date()
                    .and_then(non_blank)
                    .map(normalize_date)
                    .unwrap_or_else(|| format_date(fetched_at)),
                content,
                source: source.to_string(),
                image: media_content_url(item).or_else(|| item.enclosure().map(|e| e.url().to_string())),
            }
        })
        .collect()
}

fn media_content_url(item: &rss::Item) -> Option<String> {
    item.extensions()
        .get("media")
        .and_then(|media| media.get("content"))
        .and_then(|contents| contents.first())
        .and_then(|content| content.attrs().get("url"))
        .and_then(|url| non_blank(url))
        .map(str::to_string)
}

fn normalize_atom(feed: &atom_syndication::Feed, source: &str, fetched_at: DateTime<Utc>) -> Vec<NewsItem> {
    feed.entries()
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let link = entry
                .links()
                .iter()
                .find(|l| l.rel() == "alternate")
                .or_else(|| entry.links().first())
                .map(|l| l.href())
                .and_then(non_blank);

            let content = entry
                .summary()
                .map(|s| strip_markup(s.as_str()))
                .or_else(|| entry.content().and_then(|c| c.value()).map(strip_markup))
                .and_then(|s| non_blank(&s).map(str::to_string));

            // atom_syndication reports a missing <updated> as the epoch.
            let published = entry
                .published()
                .or_else(|| (entry.updated().timestamp() != 0).then(|| entry.updated()))
                .map(|date| date.with_timezone(&Utc))
                .unwrap_or(fetched_at);

            NewsItem {
                id: item_id(source, non_blank(entry.id()).or(link), index),
                title: non_blank(entry.title().as_str()).unwrap_or("No title").to_string(),
                link: link.unwrap_or("#").to_string(),
                pub_date: format_date(published),
                content,
                source: source.to_string(),
                image: entry
                    .links()
                    .iter()
                    .find(|l| l.rel() == "enclosure")
                    .map(|l| l.href().to_string()),
            }
        })
        .collect()
}

fn item_id(source: &str, key: Option<&str>, index: usize) -> String {
    match key {
        Some(key) => format!("{}-{}", source, key),
        None => format!("{}-{}", source, index),
    }
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// RFC 2822 / RFC 3339 dates become RFC 3339 UTC; anything else is kept verbatim.
pub fn normalize_date(raw: &str) -> String {
    match parse_timestamp(raw) {
        Some(millis) => Utc
            .timestamp_millis_opt(millis)
            .single()
            .map(format_date)
            .unwrap_or_else(|| raw.to_string()),
        None => raw.to_string(),
    }
}

/// Epoch milliseconds for a feed date, if it parses.
pub fn parse_timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .ok()
        .map(|d| d.timestamp_millis())
}

/// Plain-text snippet with markup removed and whitespace collapsed.
pub fn strip_markup(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text = fragment.root_element().text().collect::<Vec<_>>().concat();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
