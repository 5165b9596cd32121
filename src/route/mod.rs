//! Actual state: the host routes the routing daemon currently announces.
//!
//! The reconciler issues exactly three requests against a
//! [`RouteController`]: list, announce one address and withdraw one address.
//! Both loops call the same controller concurrently, so implementations must
//! be safe to share; announce and withdraw are expected to be idempotent.

mod gobgp;
pub use gobgp::*;


#[cfg(test)]
use mockall::automock;
use tonic::async_trait;

use crate::IpIdentity;
use crate::Result;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait RouteController: Send + Sync + 'static {
    /// Every announced prefix as a CIDR string (`10.0.0.5/32`).
    ///
    /// No ordering or deduplication is promised beyond what the daemon
    /// returns.
    ///
    /// # Errors
    /// Returns [`crate::RouteError`] or a network error when the daemon
    /// cannot be queried.
    async fn list_announced(&self) -> Result<Vec<String>>;

    /// Announces a host route for `ip`. Announcing an address that is
    /// already announced is not an error condition for the caller.
    ///
    /// # Errors
    /// Returns [`crate::RouteError`] when the daemon rejects the path.
    async fn announce(
        &self,
        ip: IpIdentity,
    ) -> Result<()>;

    /// Withdraws the host route for `ip`. Withdrawing an address that is not
    /// announced is not an error condition for the caller.
    ///
    /// # Errors
    /// Returns [`crate::RouteError`] when the daemon rejects the removal.
    async fn withdraw(
        &self,
        ip: IpIdentity,
    ) -> Result<()>;
}
