//! Best-effort write-through cache.
//!
//! Fetched entities are upserted into Postgres keyed by their natural key.
//! Nothing in the hub reads these tables back; writes run on detached tasks
//! and their failures are only logged.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::types::{Airdrop, NewsItem, Token};

#[derive(Debug, Clone, PartialEq)]
pub enum CacheRecord {
    News(NewsItem),
    Airdrop(Airdrop),
    Token(Token),
}

impl CacheRecord {
    /// Natural key the upsert conflicts on.
    pub fn key(&self) -> &str {
        match self {
            CacheRecord::News(item) => &item.link,
            CacheRecord::Airdrop(airdrop) => &airdrop.link,
            CacheRecord::Token(token) => &token.coin_id,
        }
    }
}

pub trait CacheSink: Send + Sync {
    /// Never fails and never blocks the caller.
    fn try_write(&self, record: CacheRecord);

    fn try_write_all(&self, records: Vec<CacheRecord>) {
        for record in records {
            self.try_write(record);
        }
    }
}

/// Used when no database is configured.
pub struct NoopCacheSink;

impl CacheSink for NoopCacheSink {
    fn try_write(&self, _record: CacheRecord) {}
}

pub struct PgCacheSink {
    pool: PgPool,
}

impl PgCacheSink {
    /// Connections are opened on first write, so a down database never delays startup.
    pub fn connect_lazy(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new().max_connections(5).connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    pub async fn upsert(pool: &PgPool, record: &CacheRecord) -> Result<(), sqlx::Error> {
        match record {
            CacheRecord::News(item) => {
                sqlx::query(
                    r#"
                    INSERT INTO news_cache (link, title, source, pub_date, content, image, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, NOW())
                    ON CONFLICT (link) DO UPDATE SET
                        title = EXCLUDED.title,
                        source = EXCLUDED.source,
                        pub_date = EXCLUDED.pub_date,
                        content = EXCLUDED.content,
                        image = EXCLUDED.image,
                        updated_at = NOW()
                    "#,
                )
                .bind(&item.link)
                .bind(&item.title)
                .bind(&item.source)
                .bind(&item.pub_date)
                .bind(&item.content)
                .bind(&item.image)
                .execute(pool)
                .await?;
            }
            CacheRecord::Airdrop(airdrop) => {
                sqlx::query(
                    r#"
                    INSERT INTO airdrop_cache (link, title, reward, category, status, description, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, NOW())
                    ON CONFLICT (link) DO UPDATE SET
                        title = EXCLUDED.title,
                        reward = EXCLUDED.reward,
                        category = EXCLUDED.category,
                        status = EXCLUDED.status,
                        description = EXCLUDED.description,
                        updated_at = NOW()
                    "#,
                )
                .bind(&airdrop.link)
                .bind(&airdrop.title)
                .bind(&airdrop.reward)
                .bind(&airdrop.category)
                .bind(&airdrop.status)
                .bind(&airdrop.description)
                .execute(pool)
                .await?;
            }
            CacheRecord::Token(token) => {
                sqlx::query(
                    r#"
                    INSERT INTO token_cache (coin_id, symbol, name, price, price_change_24h, market_cap, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, NOW())
                    ON CONFLICT (coin_id) DO UPDATE SET
                        symbol = EXCLUDED.symbol,
                        name = EXCLUDED.name,
                        price = EXCLUDED.price,
                        price_change_24h = EXCLUDED.price_change_24h,
                        market_cap = EXCLUDED.market_cap,
                        updated_at = NOW()
                    "#,
                )
                .bind(&token.coin_id)
                .bind(&token.symbol)
                .bind(&token.name)
                .bind(token.price)
                .bind(token.price_change_24h)
                .bind(token.market_cap)
                .execute(pool)
                .await?;
            }
        }
        Ok(())
    }
}

impl CacheSink for PgCacheSink {
    fn try_write(&self, record: CacheRecord) {
        let pool = self.pool.clone();
        tokio::spawn(async move {
            match PgCacheSink::upsert(&pool, &record).await {
                Ok(()) => debug!("Cached {}", record.key()),
                Err(e) => warn!("Cache upsert for {} failed: {}", record.key(), e),
            }
        });
    }
}

/// Postgres sink when a database URL is configured, otherwise a no-op.
pub fn sink_from_url(database_url: Option<&str>) -> Arc<dyn CacheSink> {
    match database_url {
        Some(url) => match PgCacheSink::connect_lazy(url) {
            Ok(sink) => {
                info!("✅ Cache sink initialized");
                Arc::new(sink)
            }
            Err(e) => {
                warn!("❌ Invalid database URL, cache writes disabled: {}", e);
                Arc::new(NoopCacheSink)
            }
        },
        None => {
            info!("No DATABASE_URL configured, cache writes disabled");
            Arc::new(NoopCacheSink)
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records writes so handlers can be checked for firing them.
    #[derive(Default)]
    pub struct RecordingSink {
        pub records: Mutex<Vec<CacheRecord>>,
    }

    impl CacheSink for RecordingSink {
        fn try_write(&self, record: CacheRecord) {
            self.records
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_keys_are_natural_keys() {
        let token = Token {
            coin_id: "bitcoin".to_string(),
            ..Default::default()
        };
        assert_eq!(CacheRecord::Token(token).key(), "bitcoin");
    }

    #[test]
    fn test_missing_database_url_yields_noop_sink() {
        let sink = sink_from_url(None);
        sink.try_write_all(vec![CacheRecord::Token(Token::default())]);
    }

    #[tokio::test]
    async fn test_pg_sink_write_does_not_block_or_fail_when_unreachable() {
        let sink = PgCacheSink::connect_lazy("postgres://nobody@127.0.0.1:1/none").unwrap();
        sink.try_write(CacheRecord::Token(Token::default()));
    }
}
