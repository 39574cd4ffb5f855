pub mod cache;
pub mod codec;
pub mod config;
pub mod deps;
#[cfg(feature = "desktop")]
pub mod desktop;
pub mod error;
pub mod gateway;
pub mod job;
pub mod resolver;
pub mod settings;
pub mod supervisor;
pub mod terminate;

pub use codec::{ProtocolEvent, TerminalPayload, TerminalResult};
pub use config::{DeploymentMode, EngineConfig};
pub use error::{CacheIoError, ErrorPayload, JobError};
pub use gateway::{EventSink, Gateway, JobEvent};
pub use job::{Action, JobRequest};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Mutex, MutexGuard, OnceLock};

    pub fn env_lock() -> MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}
