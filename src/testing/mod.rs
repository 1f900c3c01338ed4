//! Deterministic assertions over a container's emitted items.
//!
//! ```ignore
//! testing::test(view_model, |test| async move {
//!     test.expect_initial_state().await?;
//!     test.container().intent(|scope| async move {
//!         scope.reduce(|state| state.incremented());
//!         Ok(())
//!     })?;
//!     assert_eq!(test.await_state().await?.count, 1);
//!     Ok(())
//! })
//! .await?;
//! ```

mod error;
mod harness;
mod recorder;

use std::future::Future;

use crate::config::TestSettings;
use crate::container::ContainerHost;
use crate::telemetry::init_tracing;

pub use error::HarnessError;
pub use harness::ContainerTest;
pub use recorder::{Arrival, ItemRecorder, RecorderPhase};

/// Run `body` against `host` with default [`TestSettings`].
///
/// Recording starts before `body` runs. After `body` returns, every
/// recorded item must have been consumed.
pub async fn test<H, F, Fut>(host: H, body: F) -> anyhow::Result<()>
where
    H: ContainerHost + Send + Sync + 'static,
    F: FnOnce(ContainerTest<H>) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    test_with(host, TestSettings::default(), body).await
}

/// Same as [`test`] with explicit settings.
///
/// Installs file logging first when `STATEHOST_LOG` is set, see
/// [`init_tracing`].
pub async fn test_with<H, F, Fut>(host: H, settings: TestSettings, body: F) -> anyhow::Result<()>
where
    H: ContainerHost + Send + Sync + 'static,
    F: FnOnce(ContainerTest<H>) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    init_tracing();
    let harness = ContainerTest::attach(host, settings);
    body(harness.clone()).await?;
    harness.ensure_all_items_consumed()?;
    Ok(())
}
