use konkt_entities::time::Timestamp;

/// The source of the current wall-clock time.
///
/// Injected into the cache and the quota tracker so that tests can
/// run against a controlled clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}
