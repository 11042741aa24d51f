//! eqi-daemon library target.
//!
//! Exposes the router, state and rebalance orchestration for integration
//! tests. The binary `main.rs` depends on this library target.

pub mod api_types;
pub mod rebalance;
pub mod routes;
pub mod state;
