use std::collections::VecDeque;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::Mutex;

use futures::Stream;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::Request;
use tonic::Response;
use tonic::Status;
use tonic::Streaming;
use tracing::debug;

use crate::proto::etcdserverpb::kv_server::Kv;
use crate::proto::etcdserverpb::kv_server::KvServer;
use crate::proto::etcdserverpb::watch_request::RequestUnion;
use crate::proto::etcdserverpb::watch_server::Watch;
use crate::proto::etcdserverpb::watch_server::WatchServer;
use crate::proto::etcdserverpb::RangeRequest;
use crate::proto::etcdserverpb::RangeResponse;
use crate::proto::etcdserverpb::ResponseHeader;
use crate::proto::etcdserverpb::WatchCreateRequest;
use crate::proto::etcdserverpb::WatchRequest;
use crate::proto::etcdserverpb::WatchResponse;
use crate::proto::mvccpb::event::EventType;
use crate::proto::mvccpb::Event;
use crate::proto::mvccpb::KeyValue;

/// Scripted etcd KV + Watch server.
///
/// Range reads are answered from `keys` honoring `[key, range_end)`. Each
/// watch session replays the next script from `watch_sessions` and then ends
/// the stream; with no script left the stream ends right away.
#[derive(Debug, Default)]
pub struct MockEtcdService {
    pub keys: Vec<String>,
    pub range_error: Option<Status>,
    pub watch_sessions: Mutex<VecDeque<Vec<Result<WatchResponse, Status>>>>,
    pub range_requests: Mutex<Vec<RangeRequest>>,
    pub watch_creates: Mutex<Vec<WatchCreateRequest>>,
}

impl MockEtcdService {
    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn push_session(
        &self,
        responses: Vec<Result<WatchResponse, Status>>,
    ) {
        self.watch_sessions.lock().unwrap().push_back(responses);
    }

    pub fn recorded_creates(&self) -> Vec<WatchCreateRequest> {
        self.watch_creates.lock().unwrap().clone()
    }

    /// Binds on an ephemeral port and serves until `rx` fires.
    pub async fn serve(
        self: Arc<Self>,
        rx: oneshot::Receiver<()>,
    ) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        debug!("starting mock etcd service: {addr}");

        tokio::spawn(async move {
            tonic::transport::Server::builder()
                .add_service(KvServer::from_arc(self.clone()))
                .add_service(WatchServer::from_arc(self))
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async {
                    rx.await.ok();
                })
                .await
                .unwrap();
        });

        addr
    }
}

pub fn watch_created(revision: i64) -> WatchResponse {
    WatchResponse {
        header: Some(ResponseHeader {
            revision,
            ..Default::default()
        }),
        watch_id: 1,
        created: true,
        ..Default::default()
    }
}

pub fn watch_canceled(compact_revision: i64) -> WatchResponse {
    WatchResponse {
        watch_id: 1,
        canceled: true,
        compact_revision,
        cancel_reason: "mvcc: required revision has been compacted".to_string(),
        ..Default::default()
    }
}

pub fn watch_events(events: Vec<Event>) -> WatchResponse {
    let revision = events
        .iter()
        .filter_map(|e| e.kv.as_ref().map(|kv| kv.mod_revision))
        .max()
        .unwrap_or_default();
    WatchResponse {
        header: Some(ResponseHeader {
            revision,
            ..Default::default()
        }),
        watch_id: 1,
        events,
        ..Default::default()
    }
}

pub fn put_event(
    key: &str,
    mod_revision: i64,
) -> Event {
    event(EventType::Put, key, mod_revision)
}

pub fn delete_event(
    key: &str,
    mod_revision: i64,
) -> Event {
    event(EventType::Delete, key, mod_revision)
}

fn event(
    kind: EventType,
    key: &str,
    mod_revision: i64,
) -> Event {
    Event {
        r#type: kind as i32,
        kv: Some(KeyValue {
            key: key.as_bytes().to_vec(),
            mod_revision,
            ..Default::default()
        }),
        prev_kv: None,
    }
}

#[tonic::async_trait]
impl Kv for MockEtcdService {
    async fn range(
        &self,
        request: Request<RangeRequest>,
    ) -> std::result::Result<Response<RangeResponse>, Status> {
        let request = request.into_inner();
        self.range_requests.lock().unwrap().push(request.clone());
        if let Some(status) = &self.range_error {
            return Err(status.clone());
        }

        let kvs: Vec<KeyValue> = self
            .keys
            .iter()
            .filter(|key| {
                let key = key.as_bytes();
                key >= request.key.as_slice()
                    && (request.range_end == [0] || key < request.range_end.as_slice())
            })
            .map(|key| KeyValue {
                key: key.as_bytes().to_vec(),
                ..Default::default()
            })
            .collect();

        Ok(Response::new(RangeResponse {
            header: Some(ResponseHeader::default()),
            count: kvs.len() as i64,
            kvs,
            more: false,
        }))
    }
}

#[tonic::async_trait]
impl Watch for MockEtcdService {
    type WatchStream = Pin<Box<dyn Stream<Item = std::result::Result<WatchResponse, Status>> + Send + 'static>>;

    async fn watch(
        &self,
        request: Request<Streaming<WatchRequest>>,
    ) -> std::result::Result<Response<Self::WatchStream>, Status> {
        let mut inbound = request.into_inner();
        let first = inbound
            .message()
            .await?
            .ok_or_else(|| Status::invalid_argument("watch opened without a request"))?;
        if let Some(RequestUnion::CreateRequest(create)) = first.request_union {
            self.watch_creates.lock().unwrap().push(create);
        }

        let script = self.watch_sessions.lock().unwrap().pop_front().unwrap_or_default();
        Ok(Response::new(Box::pin(tokio_stream::iter(script))))
    }
}
