//! Scaling tests for the feed with synthetic 20k-item stores.
//!
//! Measures the key operations on a populated feed:
//! - Publishing with live fan-out
//! - Registering readers against a large store (backfill)
//! - Interest changes (resync)
//! - Reopen and journal replay

use std::time::Instant;
use tagfeed::{ContentInput, Feed, FeedConfig, SubscriberSpec, Tag};
use tempfile::TempDir;

const ITEM_COUNT: usize = 20_000;
const READER_COUNT: usize = 500;

/// Timing helper
struct Timer {
    start: Instant,
    name: &'static str,
}

impl Timer {
    fn new(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }

    fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    fn report(&self) {
        println!("  {} took {:.2}ms", self.name, self.elapsed_ms());
    }

    fn report_with_count(&self, count: usize) {
        let ms = self.elapsed_ms();
        println!(
            "  {} took {:.2}ms ({} ops, {:.0} ops/sec)",
            self.name,
            ms,
            count,
            if ms > 0.0 { count as f64 / (ms / 1000.0) } else { 0.0 }
        );
    }
}

fn tag_for(i: usize) -> Tag {
    Tag::ALL[i % Tag::ALL.len()]
}

// =============================================================================
// Test: 20k items, 500 readers, in memory
// =============================================================================

#[test]
fn test_scaling_in_memory_fanout() {
    println!("\n=== 20k Items, 500 Readers, In Memory ===");

    let feed = Feed::in_memory();

    let timer = Timer::new("Register readers");
    for i in 0..READER_COUNT {
        feed.register(SubscriberSpec::reader(format!("r{}", i), [tag_for(i)]))
            .unwrap();
    }
    timer.report_with_count(READER_COUNT);

    let timer = Timer::new("Publish 20k items");
    let mut delivered = 0;
    for i in 0..ITEM_COUNT {
        let published = feed
            .publish(ContentInput::new("desk", format!("story {}", i), "body", [tag_for(i)]))
            .unwrap();
        delivered += published.report.delivered_count();
    }
    timer.report_with_count(ITEM_COUNT);

    // Each item matches one tag's worth of readers
    let per_item = READER_COUNT / Tag::ALL.len();
    assert_eq!(delivered, ITEM_COUNT * per_item);

    let stats = feed.stats();
    println!(
        "  Feed stats: {} items, {} timeline entries",
        stats.item_count, stats.timeline_entries
    );
    assert_eq!(stats.timeline_entries as usize, delivered);

    let timer = Timer::new("Resync 50 readers to two tags");
    for i in 0..50 {
        let len = feed
            .set_interests(&format!("r{}", i).as_str().into(), [tag_for(i), tag_for(i + 1)])
            .unwrap()
            .timeline_len;
        assert_eq!(len, 2 * ITEM_COUNT / Tag::ALL.len());
    }
    timer.report_with_count(50);

    let timer = Timer::new("Late reader backfill (all tags)");
    let view = feed
        .register(SubscriberSpec::reader("late", Tag::ALL))
        .unwrap();
    timer.report();
    assert_eq!(view.timeline_len, ITEM_COUNT);

    println!("  ✓ In-memory fan-out test passed");
}

// =============================================================================
// Test: durable feed reopen
// =============================================================================

#[test]
fn test_scaling_reopen() {
    println!("\n=== 20k Items, Durable Reopen ===");

    let dir = TempDir::new().unwrap();
    let config = FeedConfig {
        sync_interval: 1000,
        ..FeedConfig::at(dir.path().join("feed"))
    };

    {
        let feed = Feed::open(config.clone()).unwrap();
        for i in 0..50 {
            feed.register(SubscriberSpec::reader(format!("r{}", i), [tag_for(i)]))
                .unwrap();
        }

        let timer = Timer::new("Publish 20k items to disk");
        for i in 0..ITEM_COUNT {
            feed.publish(ContentInput::new("desk", format!("story {}", i), "body", [tag_for(i)]))
                .unwrap();
        }
        timer.report_with_count(ITEM_COUNT);

        let timer = Timer::new("Sync to disk");
        feed.sync().unwrap();
        timer.report();
    }

    let timer = Timer::new("Reopen feed (replay journal)");
    let feed = Feed::open(config).unwrap();
    timer.report();

    assert_eq!(feed.all_items().len(), ITEM_COUNT);
    for i in 0..50 {
        let timeline = feed.timeline(&format!("r{}", i).as_str().into()).unwrap();
        assert_eq!(timeline.len(), ITEM_COUNT / Tag::ALL.len());
    }

    println!("  ✓ Reopen test passed");
}
