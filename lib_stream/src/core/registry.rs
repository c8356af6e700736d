//! # Subscription Registry
//!
//! Maps each topic to its per-event handlers and remembers the reference the
//! topic was last joined with. Caller threads add and remove entries while
//! the dispatch loop reads them and the protocol driver iterates them on
//! every (re)join, so all access goes through one `RwLock` with short
//! critical sections: iteration works on a snapshot, never under the lock.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use crate::codec::events::ANY_EVENT;
use crate::codec::{Message, Topic};

/// A caller-supplied callback. Errors are logged by the dispatch loop and
/// otherwise ignored.
pub type Handler = Arc<dyn Fn(&Message) -> anyhow::Result<()> + Send + Sync>;

/// Handlers registered on one topic.
#[derive(Clone, Default)]
struct TopicEntry {
    handlers: HashMap<String, Handler>,
    /// Reference of the most recent `phx_join` for this topic.
    join_ref: Option<u64>,
}

#[derive(Default)]
pub struct Registry {
    topics: RwLock<BTreeMap<Topic, TopicEntry>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `(topic, event)`, replacing any previous
    /// handler for the same pair. Returns `true` if the topic is new.
    pub fn insert(&self, topic: Topic, event: &str, handler: Handler) -> bool {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        let is_new = !topics.contains_key(&topic);
        topics
            .entry(topic)
            .or_default()
            .handlers
            .insert(event.to_string(), handler);
        is_new
    }

    /// Drops every handler of `topic`. Returns `false` if it was not registered.
    pub fn remove(&self, topic: &Topic) -> bool {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        topics.remove(topic).is_some()
    }

    /// Drops every topic, returning what was registered.
    pub fn drain(&self) -> Vec<Topic> {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *topics).into_keys().collect()
    }

    /// Finds the handler for an inbound frame: exact event first, then the
    /// topic's `"*"` handler.
    pub fn lookup(&self, topic: &Topic, event: &str) -> Option<Handler> {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        let entry = topics.get(topic)?;
        entry
            .handlers
            .get(event)
            .or_else(|| entry.handlers.get(ANY_EVENT))
            .cloned()
    }

    /// Snapshot of the registered topics, in stable order.
    pub fn topics(&self) -> Vec<Topic> {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        topics.keys().cloned().collect()
    }

    pub fn contains(&self, topic: &Topic) -> bool {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        topics.contains_key(topic)
    }

    pub fn len(&self) -> usize {
        self.topics.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records the reference used to join `topic`. No-op if it has since been removed.
    pub fn record_join_ref(&self, topic: &Topic, reference: u64) {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = topics.get_mut(topic) {
            entry.join_ref = Some(reference);
        }
    }

    pub fn join_ref(&self, topic: &Topic) -> Option<u64> {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        topics.get(topic).and_then(|entry| entry.join_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>) -> Handler {
        let counter = Arc::clone(counter);
        Arc::new(move |_msg: &Message| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn frame(topic: &str, event: &str) -> Message {
        Message::decode(&format!(
            r#"{{"topic":"{}","event":"{}","payload":{{}},"ref":null}}"#,
            topic, event
        ))
        .unwrap()
    }

    #[test]
    fn test_topic_set_tracks_subscribe_and_unsubscribe() {
        let registry = Registry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let azuki = Topic::collection("azuki");
        let doodles = Topic::collection("doodles");

        assert!(registry.insert(azuki.clone(), "item_listed", counting(&counter)));
        assert!(!registry.insert(azuki.clone(), "item_sold", counting(&counter)));
        assert!(registry.insert(doodles.clone(), "*", counting(&counter)));
        assert_eq!(registry.topics(), vec![azuki.clone(), doodles.clone()]);

        // Removing a topic drops all of its event handlers at once.
        assert!(registry.remove(&azuki));
        assert!(!registry.remove(&azuki));
        assert_eq!(registry.topics(), vec![doodles.clone()]);
        assert!(registry.lookup(&azuki, "item_sold").is_none());

        assert_eq!(registry.drain(), vec![doodles]);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_resubscribe_replaces_handler() {
        let registry = Registry::new();
        let stale = Arc::new(AtomicUsize::new(0));
        let fresh = Arc::new(AtomicUsize::new(0));
        let topic = Topic::all_collections();

        registry.insert(topic.clone(), "item_listed", counting(&stale));
        registry.insert(topic.clone(), "item_listed", counting(&fresh));

        let handler = registry.lookup(&topic, "item_listed").unwrap();
        handler(&frame("collection:*", "item_listed")).unwrap();

        assert_eq!(stale.load(Ordering::SeqCst), 0);
        assert_eq!(fresh.load(Ordering::SeqCst), 1);
        assert_eq!(registry.topics(), vec![topic]);
    }

    #[test]
    fn test_lookup_falls_back_to_wildcard_event() {
        let registry = Registry::new();
        let exact = Arc::new(AtomicUsize::new(0));
        let any = Arc::new(AtomicUsize::new(0));
        let topic = Topic::collection("azuki");

        registry.insert(topic.clone(), "item_sold", counting(&exact));
        registry.insert(topic.clone(), "*", counting(&any));

        registry.lookup(&topic, "item_sold").unwrap()(&frame("collection:azuki", "item_sold")).unwrap();
        registry.lookup(&topic, "trait_offer").unwrap()(&frame("collection:azuki", "trait_offer")).unwrap();

        assert_eq!(exact.load(Ordering::SeqCst), 1);
        assert_eq!(any.load(Ordering::SeqCst), 1);
        assert!(registry.lookup(&Topic::collection("other"), "item_sold").is_none());
    }

    #[test]
    fn test_join_ref_is_recorded_per_topic() {
        let registry = Registry::new();
        let topic = Topic::collection("azuki");
        let counter = Arc::new(AtomicUsize::new(0));

        registry.record_join_ref(&topic, 3);
        assert_eq!(registry.join_ref(&topic), None);

        registry.insert(topic.clone(), "item_listed", counting(&counter));
        registry.record_join_ref(&topic, 5);
        assert_eq!(registry.join_ref(&topic), Some(5));
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        let registry = Arc::new(Registry::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let writers: Vec<_> = (0..4)
            .map(|w| {
                let registry = Arc::clone(&registry);
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let topic = Topic::collection(&format!("c{}-{}", w, i));
                        registry.insert(topic.clone(), "*", counting(&counter));
                        if i % 2 == 0 {
                            registry.remove(&topic);
                        }
                    }
                })
            })
            .collect();
        let reader = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                for _ in 0..100 {
                    for topic in registry.topics() {
                        let _ = registry.lookup(&topic, "item_listed");
                    }
                }
            })
        };

        for handle in writers {
            handle.join().unwrap();
        }
        reader.join().unwrap();
        assert_eq!(registry.len(), 200);
    }
}
