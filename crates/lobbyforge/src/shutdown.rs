//! Running session cleanup when the process is told to stop.
//!
//! Every live session registers a close hook in a
//! [`ShutdownHooks`] registry. Wiring that registry to a signal is the
//! host's job; these helpers cover the common case.
//!
//! ```rust,no_run
//! use lobbyforge::prelude::*;
//! use lobbyforge::shutdown;
//!
//! # async fn run(hooks: ShutdownHooks) -> std::io::Result<()> {
//! let closed = shutdown::close_on_ctrl_c(&hooks).await?;
//! println!("closed {closed} session(s)");
//! # Ok(())
//! # }
//! ```

use std::future::Future;

use lobbyforge_session::ShutdownHooks;

/// Waits for Ctrl-C, then runs every registered hook.
///
/// Returns how many hooks ran.
///
/// # Errors
/// Returns the I/O error if the signal handler couldn't be installed. No
/// hooks run in that case.
pub async fn close_on_ctrl_c(hooks: &ShutdownHooks) -> std::io::Result<usize> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("ctrl-c received, closing sessions");
    Ok(hooks.run())
}

/// Waits for `signal` to resolve, then runs every registered hook.
pub async fn close_on<F>(signal: F, hooks: &ShutdownHooks) -> usize
where
    F: Future<Output = ()>,
{
    signal.await;
    let ran = hooks.run();
    tracing::debug!(ran, "shutdown signal handled");
    ran
}
