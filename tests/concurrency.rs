//! Concurrent publish, resync and membership changes.
//!
//! Whatever the interleaving, once every thread is done each timeline must
//! equal a fresh rebuild from the store with the reader's final interests.

use std::sync::Arc;
use std::thread;
use tagfeed::{
    ContentInput, Feed, FeedConfig, FeedError, ItemId, SubscriberId, SubscriberSpec, Tag,
};
use tempfile::TempDir;

const PUBLISHERS: usize = 4;
const ITEMS_PER_PUBLISHER: usize = 100;
const READERS: usize = 16;
const CHURNERS: usize = 4;

fn ids(feed: &Feed, id: &SubscriberId) -> Vec<ItemId> {
    feed.timeline(id)
        .unwrap()
        .iter()
        .map(|item| item.id)
        .collect()
}

fn expected(feed: &Feed, id: &SubscriberId) -> Vec<ItemId> {
    let interests = feed.subscriber(id).unwrap().interests;
    let snapshot = feed.all_items();
    let matched = snapshot.matching(&interests).map(|item| item.id).collect();
    matched
}

fn spawn_publishers(feed: &Arc<Feed>) -> Vec<thread::JoinHandle<()>> {
    (0..PUBLISHERS)
        .map(|p| {
            let feed = Arc::clone(feed);
            thread::spawn(move || {
                for i in 0..ITEMS_PER_PUBLISHER {
                    let tag = Tag::ALL[(p + i) % Tag::ALL.len()];
                    feed.publish(ContentInput::new(
                        format!("desk-{}", p),
                        format!("story {}-{}", p, i),
                        "body",
                        [tag],
                    ))
                    .unwrap();
                }
            })
        })
        .collect()
}

#[test]
fn test_publish_during_resync() {
    let feed = Arc::new(
        Feed::open(FeedConfig {
            parallel_fanout_threshold: 4,
            ..Default::default()
        })
        .unwrap(),
    );

    let readers: Vec<SubscriberId> = (0..READERS)
        .map(|i| {
            let id = SubscriberId::new(format!("r{}", i));
            feed.register(SubscriberSpec::reader(
                id.as_str(),
                [Tag::ALL[i % Tag::ALL.len()]],
            ))
            .unwrap();
            id
        })
        .collect();

    let mut handles = spawn_publishers(&feed);

    {
        let feed = Arc::clone(&feed);
        let readers = readers.clone();
        handles.push(thread::spawn(move || {
            for round in 0..20 {
                for (i, id) in readers.iter().enumerate() {
                    let a = Tag::ALL[(i + round) % Tag::ALL.len()];
                    let b = Tag::ALL[(i + round * 3) % Tag::ALL.len()];
                    feed.set_interests(id, [a, b]).unwrap();
                }
            }
        }));
    }

    {
        let feed = Arc::clone(&feed);
        let readers = readers.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..20 {
                for id in &readers {
                    feed.resync(id).unwrap();
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(feed.all_items().len(), PUBLISHERS * ITEMS_PER_PUBLISHER);
    for id in &readers {
        assert_eq!(ids(&feed, id), expected(&feed, id), "timeline of {}", id);
    }
}

#[test]
fn test_register_during_publish() {
    let feed = Arc::new(Feed::in_memory());
    let mut handles = spawn_publishers(&feed);

    let late: Vec<SubscriberId> = {
        let feed = Arc::clone(&feed);
        let registrar = thread::spawn(move || {
            (0..READERS)
                .map(|i| {
                    let view = feed
                        .register(SubscriberSpec::reader(format!("late{}", i), Tag::ALL))
                        .unwrap();
                    view.id
                })
                .collect::<Vec<_>>()
        });
        let late = registrar.join().unwrap();
        for handle in handles.drain(..) {
            handle.join().unwrap();
        }
        late
    };

    // Every item reached every late reader exactly once, by backfill or live
    for id in &late {
        let timeline = ids(&feed, id);
        assert_eq!(timeline.len(), PUBLISHERS * ITEMS_PER_PUBLISHER);
        assert_eq!(timeline, expected(&feed, id));
    }
}

#[test]
fn test_membership_churn_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let config = FeedConfig {
        parallel_fanout_threshold: 4,
        sync_interval: 1000,
        ..FeedConfig::at(dir.path().join("feed"))
    };

    let feed = Arc::new(Feed::open(config.clone()).unwrap());
    let steady: Vec<SubscriberId> = (0..READERS)
        .map(|i| SubscriberId::new(format!("r{}", i)))
        .collect();
    let churners: Vec<SubscriberId> = (0..CHURNERS)
        .map(|i| SubscriberId::new(format!("churn{}", i)))
        .collect();
    for (i, id) in steady.iter().chain(&churners).enumerate() {
        feed.register(SubscriberSpec::reader(id.as_str(), [Tag::ALL[i % Tag::ALL.len()]]))
            .unwrap();
    }

    let mut handles = spawn_publishers(&feed);

    {
        let feed = Arc::clone(&feed);
        let churners = churners.clone();
        handles.push(thread::spawn(move || {
            for round in 0..20 {
                for (i, id) in churners.iter().enumerate() {
                    feed.unregister(id).unwrap();
                    let tag = Tag::ALL[(i + round) % Tag::ALL.len()];
                    feed.register(SubscriberSpec::reader(id.as_str(), [tag, Tag::Sport]))
                        .unwrap();
                }
            }
        }));
    }

    {
        let feed = Arc::clone(&feed);
        let steady = steady.clone();
        handles.push(thread::spawn(move || {
            for round in 0..10 {
                for (i, id) in steady.iter().enumerate() {
                    let a = Tag::ALL[(i + round) % Tag::ALL.len()];
                    feed.set_interests(id, [a]).unwrap();
                }
            }
        }));
    }

    {
        let feed = Arc::clone(&feed);
        let all: Vec<SubscriberId> = steady.iter().chain(&churners).cloned().collect();
        handles.push(thread::spawn(move || {
            for _ in 0..20 {
                for id in &all {
                    match feed.resync(id) {
                        // Churners are briefly absent between unregister and register
                        Ok(_) | Err(FeedError::UnknownSubscriber(_)) => {}
                        Err(e) => panic!("resync of {} failed: {}", id, e),
                    }
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let mut before = Vec::new();
    for id in feed.subscribers() {
        let timeline = ids(&feed, &id);
        assert_eq!(timeline, expected(&feed, &id), "timeline of {}", id);
        before.push((id, timeline));
    }
    assert_eq!(before.len(), READERS + CHURNERS);

    assert_eq!(Arc::strong_count(&feed), 1);
    drop(feed);

    let feed = Feed::open(config).unwrap();
    assert_eq!(feed.all_items().len(), PUBLISHERS * ITEMS_PER_PUBLISHER);
    assert_eq!(feed.subscribers().len(), before.len());
    for (id, timeline) in &before {
        assert_eq!(&ids(&feed, id), timeline, "replayed timeline of {}", id);
        assert_eq!(&expected(&feed, id), timeline);
    }
}
