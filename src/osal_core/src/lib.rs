//! The object-table core: fixed-capacity, name-unique registries for tasks,
//! queues, binary semaphores, counting semaphores, mutexes, and timers,
//! generic over any [`osal_port::Port`].
//!
//! Every registry follows the same reserve/commit/rollback create protocol
//! (see [`registry::Registry`]) and the same destroy-then-free-slot
//! teardown. The binary-semaphore and timer registries layer genuinely
//! nontrivial state machines on top of that shared skeleton; the rest are
//! thin typed wrappers.

pub mod binsem;
pub mod countsem;
pub mod error;
pub mod mutex;
pub mod queue;
pub mod registry;
pub mod task;
pub mod timer;

pub use binsem::{BinSemInfo, BinSemRegistry};
pub use countsem::CountSemRegistry;
pub use error::OsError;
pub use mutex::MutexRegistry;
pub use queue::{QueueRegistry, QueueTimeout};
pub use task::{TaskInfo, TaskRegistry, UNKNOWN_CREATOR, UNREGISTERED_TASK_ID};
pub use timer::{TimerInfo, TimerRegistry, UserTimerCallback};
