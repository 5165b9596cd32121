use std::collections::BTreeSet;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Mutex;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tonic::async_trait;

use crate::ChangeEvent;
use crate::ChangeStream;
use crate::DesiredStateSource;
use crate::IpIdentity;
use crate::KeyCodec;
use crate::NetworkError;
use crate::Result;
use crate::RouteController;
use crate::RouteError;
use crate::SourceError;

fn unreachable(endpoint: &str) -> crate::Error {
    NetworkError::ConnectError {
        endpoint: endpoint.to_string(),
        reason: "connection refused".to_string(),
    }
    .into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteCall {
    Announce(IpIdentity),
    Withdraw(IpIdentity),
}

#[derive(Debug, Default)]
struct RouteTableState {
    prefixes: BTreeSet<String>,
    calls: Vec<RouteCall>,
    rejected: BTreeSet<IpIdentity>,
    unreachable: bool,
}

/// Routing daemon fake holding raw CIDR strings, so non host routes can be
/// seeded next to the host routes the agent manages.
#[derive(Debug, Default)]
pub struct InMemoryRouteTable {
    state: Mutex<RouteTableState>,
}

impl InMemoryRouteTable {
    pub fn with_prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let table = Self::default();
        table.state.lock().unwrap().prefixes = prefixes.into_iter().map(Into::into).collect();
        table
    }

    /// Every prefix currently in the table
    pub fn prefixes(&self) -> BTreeSet<String> {
        self.state.lock().unwrap().prefixes.clone()
    }

    /// Host routes currently in the table
    pub fn announced(&self) -> BTreeSet<IpIdentity> {
        self.prefixes()
            .iter()
            .filter_map(|cidr| KeyCodec::decode_announced(cidr))
            .collect()
    }

    /// Every announce and withdraw attempt, in call order
    pub fn calls(&self) -> Vec<RouteCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Makes every later announce or withdraw of `ip` fail
    pub fn reject(
        &self,
        ip: IpIdentity,
    ) {
        self.state.lock().unwrap().rejected.insert(ip);
    }

    pub fn set_unreachable(
        &self,
        unreachable: bool,
    ) {
        self.state.lock().unwrap().unreachable = unreachable;
    }
}

#[async_trait]
impl RouteController for InMemoryRouteTable {
    async fn list_announced(&self) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        if state.unreachable {
            return Err(unreachable("gobgp"));
        }
        Ok(state.prefixes.iter().cloned().collect())
    }

    async fn announce(
        &self,
        ip: IpIdentity,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(RouteCall::Announce(ip));
        if state.unreachable {
            return Err(unreachable("gobgp"));
        }
        if state.rejected.contains(&ip) {
            return Err(RouteError::AnnounceRejected {
                ip,
                source: Box::new(tonic::Status::internal("rejected by fake")),
            }
            .into());
        }
        state.prefixes.insert(format!("{}/{}", ip, ip.host_prefix_len()));
        Ok(())
    }

    async fn withdraw(
        &self,
        ip: IpIdentity,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(RouteCall::Withdraw(ip));
        if state.unreachable {
            return Err(unreachable("gobgp"));
        }
        if state.rejected.contains(&ip) {
            return Err(RouteError::WithdrawRejected {
                ip,
                source: Box::new(tonic::Status::internal("rejected by fake")),
            }
            .into());
        }
        state.prefixes.remove(&format!("{}/{}", ip, ip.host_prefix_len()));
        Ok(())
    }
}

#[derive(Debug, Default)]
struct StoreState {
    keys: BTreeSet<String>,
    watchers: Vec<mpsc::UnboundedSender<Result<ChangeEvent>>>,
    unreachable: bool,
    failing_subscribes: usize,
}

/// Allocation store fake. Every `put`/`delete` is broadcast to the open
/// subscriptions in call order.
#[derive(Debug, Default)]
pub struct InMemoryAllocationStore {
    state: Mutex<StoreState>,
    lists: AtomicUsize,
    subscriptions: AtomicUsize,
}

impl InMemoryAllocationStore {
    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::default();
        store.state.lock().unwrap().keys = keys.into_iter().map(Into::into).collect();
        store
    }

    pub fn put(
        &self,
        key: impl Into<String>,
    ) {
        let key = key.into();
        let mut state = self.state.lock().unwrap();
        state.keys.insert(key.clone());
        state
            .watchers
            .retain(|tx| tx.send(Ok(ChangeEvent::create(key.clone()))).is_ok());
    }

    pub fn delete(
        &self,
        key: &str,
    ) {
        let mut state = self.state.lock().unwrap();
        state.keys.remove(key);
        state
            .watchers
            .retain(|tx| tx.send(Ok(ChangeEvent::delete(key))).is_ok());
    }

    /// Ends every open subscription stream
    pub fn disconnect_watchers(&self) {
        self.state.lock().unwrap().watchers.clear();
    }

    /// Ends every open subscription with a transport error
    pub fn fail_watchers(&self) {
        let mut state = self.state.lock().unwrap();
        for tx in state.watchers.drain(..) {
            let _ = tx.send(Err(SourceError::WatchCanceled {
                reason: "injected failure".to_string(),
                compact_revision: 0,
            }
            .into()));
        }
    }

    /// The next `n` subscribe calls fail
    pub fn fail_next_subscribes(
        &self,
        n: usize,
    ) {
        self.state.lock().unwrap().failing_subscribes = n;
    }

    pub fn set_unreachable(
        &self,
        unreachable: bool,
    ) {
        self.state.lock().unwrap().unreachable = unreachable;
    }

    pub fn open_watchers(&self) -> usize {
        self.state.lock().unwrap().watchers.len()
    }

    pub fn list_count(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DesiredStateSource for InMemoryAllocationStore {
    async fn list(
        &self,
        host_prefix: &str,
    ) -> Result<Vec<String>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        if state.unreachable {
            return Err(unreachable("etcd"));
        }
        Ok(state
            .keys
            .iter()
            .filter(|key| key.starts_with(host_prefix))
            .cloned()
            .collect())
    }

    async fn subscribe(
        &self,
        _host_prefix: &str,
    ) -> Result<ChangeStream> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if state.unreachable {
            return Err(unreachable("etcd"));
        }
        if state.failing_subscribes > 0 {
            state.failing_subscribes -= 1;
            return Err(unreachable("etcd"));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        state.watchers.push(tx);
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }
}
