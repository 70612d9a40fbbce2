//! Outbound push queue.
//!
//! Client-driven writes and creations queue a full-document snapshot here; the
//! client drains the queue and hands each snapshot to the transport. Snapshots
//! are taken at queue time, so each push reflects the tree as it was right after
//! the write that caused it.
//!
//! This is an in-memory queue - pending pushes are lost on reset. The next poll
//! brings the client back in line with the server.

use std::collections::VecDeque;

use crate::document::Document;

/// FIFO queue of documents waiting to be pushed.
#[derive(Debug, Default)]
pub struct Outbox {
    pending: VecDeque<Document>,
}

impl Outbox {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
        }
    }

    /// Queue a document for pushing.
    pub fn enqueue(&mut self, document: Document) {
        self.pending.push_back(document);
    }

    /// Take all queued documents, oldest first.
    pub fn drain(&mut self) -> Vec<Document> {
        self.pending.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Drop everything still queued.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Element;

    #[test]
    fn test_enqueue_and_drain() {
        let mut outbox = Outbox::new();

        outbox.enqueue(Document::new().with_element(Element::new("First")));
        outbox.enqueue(Document::new().with_element(Element::new("Second")));

        assert_eq!(outbox.len(), 2);
        assert!(!outbox.is_empty());

        let drained = outbox.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].elements[0].name, "First");
        assert_eq!(drained[1].elements[0].name, "Second");

        assert!(outbox.is_empty());
        assert_eq!(outbox.len(), 0);
    }

    #[test]
    fn test_empty_outbox() {
        let mut outbox = Outbox::new();

        assert!(outbox.is_empty());
        assert!(outbox.drain().is_empty());

        outbox.enqueue(Document::new());
        outbox.clear();
        assert!(outbox.is_empty());
    }
}
