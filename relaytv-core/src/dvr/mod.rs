pub mod error;
pub mod models;
pub mod store;

use std::path::{Path, PathBuf};

pub use error::{StoreError, StoreResult};
pub use models::{DvrCounts, NewTimer, Recording, Timer, TimerKind};
pub use store::{SqliteDvrStore, SqliteDvrStoreBuilder};

/// The persistence calls the scheduler and dispatcher depend on.
///
/// Calls are synchronous; implementations are expected to be quick enough to
/// run inline on the scheduler task.
pub trait DvrStore: Send + Sync {
    /// Timers whose window contains `now_ms` (`start <= now < end`).
    fn due_timers(&self, now_ms: i64) -> StoreResult<Vec<Timer>>;

    fn create_recording(
        &self,
        title: &str,
        channel: &str,
        start_ms: i64,
        end_ms: i64,
        path: &Path,
    ) -> StoreResult<i64>;

    fn update_recording_end(&self, id: i64, end_ms: i64) -> StoreResult<bool>;

    fn delete_timer(&self, id: i64) -> StoreResult<bool>;

    fn recording_path(&self, id: i64) -> StoreResult<Option<PathBuf>>;
}
