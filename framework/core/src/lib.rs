mod clock;
mod error;
mod sample;
mod shutdown;

pub mod prelude {
    pub use crate::clock::{log_timestamp, new_run_id, unix_timestamp};
    pub use crate::error::SweepError;
    pub use crate::sample::SignalSample;
    pub use crate::shutdown::{DelegatedShutdownListener, ShutdownHandle, ShutdownSignalError};
}
