/*! Integration tests for Treesync.
 *
 * This test suite is organized as a single integration test binary
 * following the pattern described by matklad in
 * https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html
 *
 * The module structure mirrors the main library structure:
 * - path: Tests for path parsing and step identity
 * - session: Tests for local writes, reconciliation and notification order
 * - sync: Tests for the poll scheduler and the client lifecycle
 */

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("treesync=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

mod helpers;
mod path;
mod session;
mod sync;
