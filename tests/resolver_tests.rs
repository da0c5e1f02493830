//! Tiered price resolution against a real SQLite store.

mod support;

use chrono::Duration;
use rust_decimal_macros::dec;

use skincache::application::resolver::Tier;
use skincache::error::FetchError;
use skincache::testkit::domain::{epoch, key, price, redline};
use skincache::testkit::fetcher::ScriptedFetcher;
use support::temp_db::TempDb;

#[tokio::test]
async fn redline_is_fetched_cached_then_refetched_when_stale() {
    let db = TempDb::create("redline");
    let fetcher = ScriptedFetcher::new();
    fetcher.set_price(&redline(), price(dec!(12.50)));
    let h = support::start(db.connector(), fetcher).await;

    let first = h.service.resolve(&redline()).await.unwrap();
    assert_eq!(first.tier, Tier::Fetched);
    assert_eq!(first.record.price, price(dec!(12.50)));
    assert_eq!(first.record.update_count, 1);
    assert_eq!(first.record.last_updated, epoch());

    let second = h.service.resolve(&redline()).await.unwrap();
    assert_eq!(second.tier, Tier::Memory);
    assert_eq!(second.record, first.record);
    assert_eq!(h.fetcher.calls(), 1);

    h.clock.advance(Duration::days(10));
    h.fetcher.set_price(&redline(), price(dec!(13.10)));

    let third = h.service.resolve(&redline()).await.unwrap();
    assert_eq!(third.tier, Tier::Fetched);
    assert_eq!(third.record.price, price(dec!(13.10)));
    assert_eq!(third.record.update_count, 2);
    assert_eq!(third.record.last_updated, epoch() + Duration::days(10));
    assert_eq!(h.fetcher.calls(), 2);

    h.service.shutdown().await;
}

#[tokio::test]
async fn fresh_store_record_is_served_without_fetching() {
    let db = TempDb::create("warm");
    let seeding = ScriptedFetcher::new();
    seeding.set_price(&redline(), price(dec!(9)));
    let first = support::start(db.connector(), seeding).await;
    first.service.get_price(&redline()).await.unwrap();
    first.service.shutdown().await;

    // A new process: empty memory cache, same database file.
    let second = support::start(db.connector(), ScriptedFetcher::new()).await;
    second.clock.advance(Duration::days(6));

    let resolution = second.service.resolve(&redline()).await.unwrap();
    assert_eq!(resolution.tier, Tier::Store);
    assert_eq!(resolution.record.price, price(dec!(9)));
    assert_eq!(second.fetcher.calls(), 0);

    let again = second.service.resolve(&redline()).await.unwrap();
    assert_eq!(again.tier, Tier::Memory);

    second.service.shutdown().await;
}

#[tokio::test]
async fn record_older_than_the_window_is_a_miss() {
    let db = TempDb::create("stale");
    let seeding = ScriptedFetcher::new();
    seeding.set_price(&redline(), price(dec!(9)));
    let first = support::start(db.connector(), seeding).await;
    first.service.get_price(&redline()).await.unwrap();
    first.service.shutdown().await;

    let fetcher = ScriptedFetcher::new();
    fetcher.set_price(&redline(), price(dec!(11)));
    let second = support::start(db.connector(), fetcher).await;
    second.clock.advance(Duration::days(8));

    let resolution = second.service.resolve(&redline()).await.unwrap();
    assert_eq!(resolution.tier, Tier::Fetched);
    assert_eq!(resolution.record.price, price(dec!(11)));
    assert_eq!(resolution.record.update_count, 2);
    assert_eq!(second.fetcher.calls_for(&redline()), 1);

    second.service.shutdown().await;
}

#[tokio::test]
async fn failed_lookup_is_reported_and_not_stored() {
    let db = TempDb::create("unlisted");
    let fetcher = ScriptedFetcher::new();
    fetcher.set_error(
        &key("Souvenir Mystery"),
        FetchError::NotListed("Souvenir Mystery".to_string()),
    );
    let h = support::start(db.connector(), fetcher).await;

    let result = h.service.get_price(&key("Souvenir Mystery")).await;
    assert!(matches!(result, Err(FetchError::NotListed(_))));

    let stats = h.service.stats().await;
    assert_eq!(stats.store.total_count, 0);
    assert_eq!(stats.cached_entries, 0);

    h.service.shutdown().await;
}

#[tokio::test]
async fn stats_summarise_the_store() {
    let db = TempDb::create("stats");
    let fetcher = ScriptedFetcher::new();
    fetcher.set_price(&key("A"), price(dec!(1)));
    fetcher.set_price(&key("B"), price(dec!(2)));
    fetcher.set_price(&key("C"), price(dec!(4)));
    let h = support::start(db.connector(), fetcher).await;

    h.service.get_price(&key("A")).await.unwrap();
    h.clock.advance(Duration::days(8));
    h.service.get_price(&key("B")).await.unwrap();
    h.service.get_price(&key("C")).await.unwrap();

    let stats = h.service.stats().await;
    assert_eq!(stats.store.total_count, 3);
    assert_eq!(stats.store.recently_updated_count, 2);
    assert_eq!(stats.store.average_price, dec!(2.33));
    assert_eq!(stats.store.last_update, Some(epoch() + Duration::days(8)));

    h.service.shutdown().await;
}
