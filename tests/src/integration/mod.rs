//! Cross-crate dispatch scenarios.

#[cfg(test)]
mod fixtures;

mod correlation;
mod events_bridge;
mod runtime_flows;
mod trace_propagation;
mod transports;
