use chainstate_core::BlockRef;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;

/// Publish-subscribe hub delivering committed block references.
///
/// Subscribers receive future commits only; dropping the receiver
/// unsubscribes (dead senders are swept on the next publish).
#[derive(Clone, Default)]
pub struct BlockNotifier {
    senders: Arc<Mutex<Vec<Sender<BlockRef>>>>,
}

impl BlockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<BlockRef> {
        let (sender, receiver) = unbounded();
        self.senders.lock().push(sender);
        receiver
    }

    pub fn notify(&self, block: &BlockRef) {
        self.senders.lock().retain(|sender| sender.send(block.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainstate_core::Header;
    use std::sync::Arc;

    fn block(level: u64) -> BlockRef {
        let header = Header {
            predecessor: level.into(),
            level,
            fitness: vec![],
            validation_passes: 0,
            operations_hash: 0.into(),
            context: 0.into(),
            timestamp: 0,
            payload: vec![],
        };
        BlockRef::new(header.hash(), Arc::new(header))
    }

    #[test]
    fn test_subscribe_and_sweep() {
        let notifier = BlockNotifier::new();
        let first = notifier.subscribe();
        notifier.notify(&block(1));

        // A late subscriber only sees future commits
        let second = notifier.subscribe();
        notifier.notify(&block(2));

        assert_eq!(first.try_iter().map(|b| b.level()).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(second.try_iter().map(|b| b.level()).collect::<Vec<_>>(), vec![2]);

        drop(first);
        notifier.notify(&block(3));
        assert_eq!(notifier.senders.lock().len(), 1);
    }
}
