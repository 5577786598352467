use std::collections::VecDeque;
use std::fmt;

use bytes::Bytes;

use crate::error::{FrameError, Result};

/// Result delivered to a command's completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Data(Bytes),
    Bit(bool),
}

impl Reply {
    /// Bit value, or `None` for a data reply.
    pub fn bit(&self) -> Option<bool> {
        match self {
            Reply::Bit(bit) => Some(*bit),
            Reply::Data(_) => None,
        }
    }

    /// Data payload; a bit reply yields an empty payload.
    pub fn into_data(self) -> Bytes {
        match self {
            Reply::Data(data) => data,
            Reply::Bit(_) => Bytes::new(),
        }
    }
}

/// Callback run once when a command's reply is correlated (or abandoned).
pub type Completion = Box<dyn FnOnce(Result<Reply>) + Send + 'static>;

/// An outstanding command: how many data bytes its reply carries and who to tell.
pub struct Descriptor {
    size: u8,
    completion: Option<Completion>,
}

impl Descriptor {
    pub fn new(size: u8, completion: Option<Completion>) -> Self {
        Self { size, completion }
    }

    /// Expected data payload size; zero for commands answered with HIGH/LOW.
    pub fn size(&self) -> u8 {
        self.size
    }

    /// Consume the descriptor, running its completion if one was given.
    pub fn complete(self, result: Result<Reply>) {
        if let Some(completion) = self.completion {
            completion(result);
        }
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("size", &self.size)
            .field("completion", &self.completion.is_some())
            .finish()
    }
}

/// FIFO of outstanding reply descriptors for one port.
///
/// The coprocessor answers commands strictly in order and replies carry no
/// sequence number, so the Nth reply frame always belongs to the Nth
/// descriptor pushed here.
#[derive(Debug, Default)]
pub struct ReplyQueue {
    pending: VecDeque<Descriptor>,
}

impl ReplyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, descriptor: Descriptor) {
        self.pending.push_back(descriptor);
    }

    pub fn pop(&mut self) -> Result<Descriptor> {
        self.pending
            .pop_front()
            .ok_or(FrameError::NoPendingCommand)
    }

    /// Payload size declared by the oldest descriptor.
    pub fn head_size(&self) -> Option<u8> {
        self.pending.front().map(Descriptor::size)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Remove every outstanding descriptor, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = Descriptor> + '_ {
        self.pending.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn recording(log: &Arc<Mutex<Vec<(usize, Reply)>>>, id: usize) -> Completion {
        let log = Arc::clone(log);
        Box::new(move |result| log.lock().unwrap().push((id, result.unwrap())))
    }

    #[test]
    fn pops_in_push_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut queue = ReplyQueue::new();
        queue.push(Descriptor::new(1, Some(recording(&log, 0))));
        queue.push(Descriptor::new(0, Some(recording(&log, 1))));
        assert_eq!(queue.head_size(), Some(1));

        queue
            .pop()
            .unwrap()
            .complete(Ok(Reply::Data(Bytes::from_static(&[0x88]))));
        assert_eq!(queue.head_size(), Some(0));
        queue.pop().unwrap().complete(Ok(Reply::Bit(true)));

        let log = log.lock().unwrap();
        assert_eq!(log[0], (0, Reply::Data(Bytes::from_static(&[0x88]))));
        assert_eq!(log[1], (1, Reply::Bit(true)));
        assert!(queue.is_empty());
    }

    #[test]
    fn pop_on_empty_queue_fails() {
        let mut queue = ReplyQueue::new();
        assert!(matches!(queue.pop(), Err(FrameError::NoPendingCommand)));
        assert_eq!(queue.head_size(), None);
    }

    #[test]
    fn completion_is_optional() {
        let mut queue = ReplyQueue::new();
        queue.push(Descriptor::new(0, None));
        queue.pop().unwrap().complete(Ok(Reply::Bit(false)));
    }

    #[test]
    fn drain_empties_queue() {
        let mut queue = ReplyQueue::new();
        queue.push(Descriptor::new(2, None));
        queue.push(Descriptor::new(0, None));
        assert_eq!(queue.drain().count(), 2);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn reply_accessors() {
        assert_eq!(Reply::Bit(false).bit(), Some(false));
        assert_eq!(Reply::Data(Bytes::from_static(&[1])).bit(), None);
        assert!(Reply::Bit(true).into_data().is_empty());
    }
}
