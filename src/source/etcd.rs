use std::collections::VecDeque;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures::stream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::async_trait;
use tonic::transport::Channel;
use tonic::transport::ClientTlsConfig;
use tonic::transport::Endpoint;
use tonic::Streaming;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::ChangeEvent;
use super::ChangeKind;
use super::ChangeStream;
use super::DesiredStateSource;
use crate::proto::etcdserverpb::kv_client::KvClient;
use crate::proto::etcdserverpb::watch_client::WatchClient;
use crate::proto::etcdserverpb::watch_request::RequestUnion;
use crate::proto::etcdserverpb::RangeRequest;
use crate::proto::etcdserverpb::WatchCreateRequest;
use crate::proto::etcdserverpb::WatchRequest;
use crate::proto::etcdserverpb::WatchResponse;
use crate::proto::mvccpb::event::EventType;
use crate::utils::net::address_str;
use crate::NetworkError;
use crate::Result;
use crate::SourceError;
use crate::StoreConfig;

/// etcd v3 backed desired state source.
///
/// Listing is a prefix range read. Subscriptions are bidirectional watch
/// streams that resume after the last revision this source delivered.
#[derive(Debug, Clone)]
pub struct EtcdSource {
    kv: KvClient<Channel>,
    watch: WatchClient<Channel>,
    request_timeout: Duration,
    /// Highest revision delivered by any watch session, 0 when unknown
    last_revision: Arc<AtomicI64>,
}

impl EtcdSource {
    /// Connects to the first reachable endpoint in configuration order.
    ///
    /// # Errors
    /// Returns [`SourceError::Unreachable`] when no endpoint accepts a
    /// connection, or an io error when TLS material cannot be read.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let tls = match &config.tls {
            Some(tls) => Some(tls.client_tls_config()?),
            None => None,
        };

        for address in &config.endpoints {
            match Self::connect_endpoint(address, config, tls.clone()).await {
                Ok(channel) => {
                    info!(endpoint = %address, "Connected to allocation store");
                    return Ok(Self::from_channel(
                        channel,
                        Duration::from_millis(config.request_timeout_in_ms),
                    ));
                }
                Err(e) => {
                    warn!(endpoint = %address, "Allocation store endpoint unavailable: {}", e);
                }
            }
        }

        Err(SourceError::Unreachable {
            endpoints: config.endpoints.clone(),
        }
        .into())
    }

    pub fn from_channel(
        channel: Channel,
        request_timeout: Duration,
    ) -> Self {
        Self {
            kv: KvClient::new(channel.clone()),
            watch: WatchClient::new(channel),
            request_timeout,
            last_revision: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Revision the next subscription resumes after, 0 when it starts from now
    pub fn resume_revision(&self) -> i64 {
        self.last_revision.load(Ordering::SeqCst)
    }

    async fn connect_endpoint(
        address: &str,
        config: &StoreConfig,
        tls: Option<ClientTlsConfig>,
    ) -> Result<Channel> {
        let url = match tls {
            Some(_) => format!("https://{}", address.trim_start_matches("https://")),
            None => address_str(address),
        };

        let mut endpoint = Endpoint::from_shared(url).map_err(|_| NetworkError::InvalidURI(address.into()))?;
        endpoint = endpoint
            .connect_timeout(Duration::from_millis(config.connect_timeout_in_ms))
            .tcp_keepalive(Some(Duration::from_secs(config.tcp_keepalive_in_secs)))
            .http2_keep_alive_interval(Duration::from_secs(config.http2_keep_alive_interval_in_secs))
            .keep_alive_while_idle(true);
        if let Some(tls) = tls {
            endpoint = endpoint.tls_config(tls)?;
        }

        endpoint.connect().await.map_err(|e| {
            NetworkError::ConnectError {
                endpoint: address.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

#[async_trait]
impl DesiredStateSource for EtcdSource {
    async fn list(
        &self,
        host_prefix: &str,
    ) -> Result<Vec<String>> {
        let mut request = tonic::Request::new(RangeRequest {
            key: host_prefix.as_bytes().to_vec(),
            range_end: prefix_range_end(host_prefix.as_bytes()),
            keys_only: true,
            ..Default::default()
        });
        request.set_timeout(self.request_timeout);

        let mut client = self.kv.clone();
        let response = client
            .range(request)
            .await
            .map_err(|status| SourceError::Status(Box::new(status)))?
            .into_inner();

        debug!(
            prefix = %host_prefix,
            count = response.kvs.len(),
            "Listed allocation keys"
        );
        Ok(response
            .kvs
            .into_iter()
            .map(|kv| String::from_utf8_lossy(&kv.key).into_owned())
            .collect())
    }

    async fn subscribe(
        &self,
        host_prefix: &str,
    ) -> Result<ChangeStream> {
        let start_revision = match self.last_revision.load(Ordering::SeqCst) {
            0 => 0,
            last => last + 1,
        };

        let (request_tx, request_rx) = mpsc::channel(1);
        request_tx
            .send(WatchRequest {
                request_union: Some(RequestUnion::CreateRequest(WatchCreateRequest {
                    key: host_prefix.as_bytes().to_vec(),
                    range_end: prefix_range_end(host_prefix.as_bytes()),
                    start_revision,
                    ..Default::default()
                })),
            })
            .await
            .map_err(|_| SourceError::WatchRequestClosed)?;

        let mut client = self.watch.clone();
        let inbound = client
            .watch(ReceiverStream::new(request_rx))
            .await
            .map_err(|status| SourceError::Status(Box::new(status)))?
            .into_inner();

        info!(prefix = %host_prefix, start_revision, "Watch subscription opened");
        let session = WatchSession {
            _requests: request_tx,
            inbound,
            pending: VecDeque::new(),
            last_revision: self.last_revision.clone(),
            start_revision,
            finished: false,
        };
        Ok(session.into_stream())
    }
}

/// One watch stream. Events of a response are queued and handed out one by
/// one so the caller observes store order.
struct WatchSession {
    // Dropping the outbound half makes the store close the watch
    _requests: mpsc::Sender<WatchRequest>,
    inbound: Streaming<WatchResponse>,
    pending: VecDeque<ChangeEvent>,
    last_revision: Arc<AtomicI64>,
    start_revision: i64,
    finished: bool,
}

impl WatchSession {
    fn into_stream(self) -> ChangeStream {
        stream::unfold(self, |mut session| async move {
            session.next_event().await.map(|item| (item, session))
        })
        .boxed()
    }

    async fn next_event(&mut self) -> Option<Result<ChangeEvent>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }
            if self.finished {
                return None;
            }

            match self.inbound.message().await {
                Ok(Some(response)) => {
                    if let Err(e) = self.absorb(response) {
                        self.finished = true;
                        return Some(Err(e));
                    }
                }
                Ok(None) => {
                    debug!("Watch stream closed by store");
                    self.finished = true;
                }
                Err(status) => {
                    self.finished = true;
                    return Some(Err(SourceError::Status(Box::new(status)).into()));
                }
            }
        }
    }

    fn absorb(
        &mut self,
        response: WatchResponse,
    ) -> Result<()> {
        if response.canceled {
            if response.compact_revision > 0 {
                // Resume point is gone; next session starts from now
                self.last_revision.store(0, Ordering::SeqCst);
            }
            return Err(SourceError::WatchCanceled {
                reason: response.cancel_reason,
                compact_revision: response.compact_revision,
            }
            .into());
        }

        if response.created {
            trace!(watch_id = response.watch_id, "Watch created");
            if self.start_revision == 0 {
                if let Some(header) = &response.header {
                    self.last_revision.fetch_max(header.revision, Ordering::SeqCst);
                }
            }
        }

        for event in response.events {
            let kind = match event.r#type() {
                EventType::Put => ChangeKind::Create,
                EventType::Delete => ChangeKind::Delete,
            };
            let Some(kv) = event.kv else {
                continue;
            };
            self.last_revision.fetch_max(kv.mod_revision, Ordering::SeqCst);
            self.pending.push_back(ChangeEvent {
                kind,
                key: String::from_utf8_lossy(&kv.key).into_owned(),
            });
        }
        Ok(())
    }
}

/// Smallest key greater than every key starting with `prefix`.
pub(crate) fn prefix_range_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xff {
            end.push(last + 1);
            return end;
        }
    }
    // Every byte was 0xff: range to the end of the keyspace
    vec![0]
}
