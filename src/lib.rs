//! Keeps the host routes a GoBGP daemon announces in line with the IP
//! allocations an IPAM allocator records in etcd.
//!
//! Two loops share one [`Reconciler`]: a periodic full resync that diffs the
//! whole desired set against the announced set, and a watch loop that applies
//! allocation changes as they happen.

mod agent;
mod codec;
mod config;
pub(crate) mod constants;
mod errors;
pub mod metrics;
pub mod proto;
mod reconciler;
mod route;
mod source;
pub mod utils;

pub use agent::*;
pub use codec::*;
pub use config::*;
pub use errors::*;
pub use reconciler::*;
pub use route::*;
pub use source::*;

//-----------------------------------------------------------
// Test utils
