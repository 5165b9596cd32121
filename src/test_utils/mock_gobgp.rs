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
use tracing::debug;

use crate::proto::gobgpapi::gobgp_api_server::GobgpApi;
use crate::proto::gobgpapi::gobgp_api_server::GobgpApiServer;
use crate::proto::gobgpapi::AddPathRequest;
use crate::proto::gobgpapi::AddPathResponse;
use crate::proto::gobgpapi::DeletePathRequest;
use crate::proto::gobgpapi::Destination;
use crate::proto::gobgpapi::ListPathRequest;
use crate::proto::gobgpapi::ListPathResponse;

/// Scripted GoBGP api server recording every request it receives.
#[derive(Debug, Default)]
pub struct MockGobgpService {
    /// Destinations streamed back by ListPath
    pub prefixes: Vec<String>,
    pub list_error: Option<Status>,
    pub add_error: Option<Status>,
    pub delete_error: Option<Status>,
    pub add_requests: Mutex<Vec<AddPathRequest>>,
    pub delete_requests: Mutex<Vec<DeletePathRequest>>,
    pub list_requests: Mutex<Vec<ListPathRequest>>,
}

impl MockGobgpService {
    pub fn with_prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn recorded_adds(&self) -> Vec<AddPathRequest> {
        self.add_requests.lock().unwrap().clone()
    }

    pub fn recorded_deletes(&self) -> Vec<DeletePathRequest> {
        self.delete_requests.lock().unwrap().clone()
    }

    pub fn recorded_lists(&self) -> Vec<ListPathRequest> {
        self.list_requests.lock().unwrap().clone()
    }

    /// Binds on an ephemeral port and serves until `rx` fires.
    pub async fn serve(
        self: Arc<Self>,
        rx: oneshot::Receiver<()>,
    ) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        debug!("starting mock gobgp service: {addr}");

        tokio::spawn(async move {
            tonic::transport::Server::builder()
                .add_service(GobgpApiServer::from_arc(self))
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async {
                    rx.await.ok();
                })
                .await
                .unwrap();
        });

        addr
    }
}

#[tonic::async_trait]
impl GobgpApi for MockGobgpService {
    type ListPathStream = Pin<Box<dyn Stream<Item = std::result::Result<ListPathResponse, Status>> + Send + 'static>>;

    async fn add_path(
        &self,
        request: Request<AddPathRequest>,
    ) -> std::result::Result<Response<AddPathResponse>, Status> {
        self.add_requests.lock().unwrap().push(request.into_inner());
        match &self.add_error {
            Some(status) => Err(status.clone()),
            None => Ok(Response::new(AddPathResponse { uuid: vec![1, 2, 3] })),
        }
    }

    async fn delete_path(
        &self,
        request: Request<DeletePathRequest>,
    ) -> std::result::Result<Response<()>, Status> {
        self.delete_requests.lock().unwrap().push(request.into_inner());
        match &self.delete_error {
            Some(status) => Err(status.clone()),
            None => Ok(Response::new(())),
        }
    }

    async fn list_path(
        &self,
        request: Request<ListPathRequest>,
    ) -> std::result::Result<Response<Self::ListPathStream>, Status> {
        self.list_requests.lock().unwrap().push(request.into_inner());
        if let Some(status) = &self.list_error {
            return Err(status.clone());
        }

        let responses: Vec<std::result::Result<ListPathResponse, Status>> = self
            .prefixes
            .iter()
            .map(|prefix| {
                Ok(ListPathResponse {
                    destination: Some(Destination {
                        prefix: prefix.clone(),
                        paths: vec![],
                    }),
                })
            })
            .collect();
        Ok(Response::new(Box::pin(tokio_stream::iter(responses))))
    }
}
