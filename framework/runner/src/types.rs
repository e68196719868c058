/// Result type used across the runner. Errors carry context from the boundary where they
/// happened and can be downcast to [plateau_sweep_core::prelude::SweepError] or
/// [plateau_sweep_core::prelude::ShutdownSignalError] where it matters.
pub type SweepResult<T> = anyhow::Result<T>;
