//! Outbound command queue between the foreground and the poller.

use crate::error::SessionError;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};

/// A mutation waiting to be executed on the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundCommand {
    pub seq: u64,
    pub text: String,
    /// Transport failures seen so far.
    pub attempts: u32,
}

/// Producer side. Cheap to clone; every clone feeds the same FIFO.
#[derive(Debug, Clone)]
pub struct CommandQueue {
    tx: UnboundedSender<OutboundCommand>,
    next_seq: Arc<Mutex<u64>>,
}

impl CommandQueue {
    pub fn channel() -> (CommandQueue, CommandBacklog) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = CommandQueue {
            tx,
            next_seq: Arc::new(Mutex::new(0)),
        };
        let backlog = CommandBacklog {
            rx,
            pending: VecDeque::new(),
            disconnected: false,
        };
        (queue, backlog)
    }

    /// Append a command. Never blocks; returns its sequence number.
    pub fn enqueue(&self, text: impl Into<String>) -> Result<u64, SessionError> {
        // Numbering and sending under one lock keeps seq order equal to
        // delivery order when several threads enqueue at once.
        let mut next_seq = self.next_seq.lock().unwrap_or_else(PoisonError::into_inner);
        *next_seq += 1;
        let command = OutboundCommand {
            seq: *next_seq,
            text: text.into(),
            attempts: 0,
        };
        let seq = command.seq;
        self.tx.send(command).map_err(|_| SessionError::QueueClosed)?;
        tracing::debug!("Queued command #{}", seq);
        Ok(seq)
    }
}

/// Consumer side, owned by the poller.
///
/// A command that hit a transport failure is put back at the head so that
/// the order in which commands reach the cluster never changes.
#[derive(Debug)]
pub struct CommandBacklog {
    rx: UnboundedReceiver<OutboundCommand>,
    pending: VecDeque<OutboundCommand>,
    disconnected: bool,
}

impl CommandBacklog {
    /// Move everything currently in the channel to the pending list.
    pub fn collect(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(command) => self.pending.push_back(command),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    break;
                }
            }
        }
    }

    pub fn pop_front(&mut self) -> Option<OutboundCommand> {
        self.pending.pop_front()
    }

    pub fn push_front(&mut self, command: OutboundCommand) {
        self.pending.push_front(command);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// All producers are gone and nothing is left to run.
    pub fn is_finished(&self) -> bool {
        self.disconnected && self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let (queue, mut backlog) = CommandQueue::channel();
        for text in ["a", "b", "c"] {
            queue.enqueue(text).unwrap();
        }
        backlog.collect();
        let texts: Vec<String> = std::iter::from_fn(|| backlog.pop_front())
            .map(|c| c.text)
            .collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_push_front_keeps_head() {
        let (queue, mut backlog) = CommandQueue::channel();
        queue.enqueue("first").unwrap();
        queue.enqueue("second").unwrap();
        backlog.collect();
        let mut head = backlog.pop_front().unwrap();
        head.attempts += 1;
        backlog.push_front(head);
        assert_eq!(backlog.len(), 2);
        let head = backlog.pop_front().unwrap();
        assert_eq!(head.text, "first");
        assert_eq!(head.attempts, 1);
    }

    #[test]
    fn test_concurrent_producers_do_not_interleave() {
        let (queue, mut backlog) = CommandQueue::channel();
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        queue.enqueue(format!("scancel {}{:03}", t, i)).unwrap();
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        backlog.collect();
        let commands: Vec<OutboundCommand> = std::iter::from_fn(|| backlog.pop_front()).collect();
        assert_eq!(commands.len(), 400);
        assert!(commands.windows(2).all(|w| w[0].seq < w[1].seq));
        for t in 0..8 {
            let prefix = format!("scancel {}", t);
            let mine: Vec<&str> = commands
                .iter()
                .map(|c| c.text.as_str())
                .filter(|text| text.starts_with(&prefix))
                .collect();
            let expected: Vec<String> = (0..50).map(|i| format!("scancel {}{:03}", t, i)).collect();
            assert_eq!(mine, expected);
        }
    }

    #[test]
    fn test_disconnect_detected_after_drain() {
        let (queue, mut backlog) = CommandQueue::channel();
        queue.enqueue("scancel 1").unwrap();
        drop(queue);
        backlog.collect();
        assert!(!backlog.is_finished());
        backlog.pop_front();
        assert!(backlog.is_finished());
    }

    #[test]
    fn test_enqueue_after_consumer_dropped() {
        let (queue, backlog) = CommandQueue::channel();
        drop(backlog);
        assert_eq!(queue.enqueue("scancel 1"), Err(SessionError::QueueClosed));
    }
}
