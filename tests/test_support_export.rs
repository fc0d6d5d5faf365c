//! The `test-utils` feature exposes the in-memory WSL to downstream tests.
//!
//! Run with: `cargo test --features test-utils --test test_support_export`

#![cfg(feature = "test-utils")]

use std::sync::Arc;
use std::time::Duration;

use wslkit::Wsl;
use wslkit::test_support::FakeWslApi;

#[test]
fn fake_drives_the_public_api() {
    let api = Arc::new(FakeWslApi::new().with_distro("Alpine"));
    let wsl = Wsl::with_api(api.clone()).settle_delay(Duration::ZERO);

    let mut cmd = wsl.distro("Alpine").command("true");
    cmd.run().unwrap();

    assert_eq!(api.launches().len(), 1);
    assert_eq!(api.close_count(api.handles()[0]), 1);
}
