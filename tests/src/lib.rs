//! # Realworld Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── dispatch_benchmarks.rs   # Registry and envelope hot paths
//! └── src/integration/
//!     ├── fixtures.rs              # Broker + listener + invoker harness
//!     ├── correlation.rs           # Registry delivery, timeout, races
//!     ├── events_bridge.rs         # Invoke over a real broker round trip
//!     ├── transports.rs            # REST / RPC dispatch and the directory file
//!     └── runtime_flows.rs         # Auth flows through the service runtime
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p rw-tests
//!
//! # By area
//! cargo test -p rw-tests integration::events_bridge::
//!
//! # Benchmarks
//! cargo bench -p rw-tests
//! ```

pub mod integration;
