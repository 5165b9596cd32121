//! Agent Error Hierarchy
//!
//! Errors are grouped by the collaborator that produced them. None of them is
//! fatal to the steady-state reconciliation loops; only startup-class failures
//! (see [`Error::is_fatal`]) stop the process.

use config::ConfigError;
use tokio::task::JoinError;

use crate::IpIdentity;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Infrastructure-level failures (network, io)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Configuration loading failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration validation failures
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Allocation store failures
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Routing daemon failures
    #[error(transparent)]
    Route(#[from] RouteError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl Error {
    /// Only startup-class errors halt the process. Everything else is
    /// deferred to the next loop iteration or the next event.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_) | Error::InvalidConfig(_) | Error::Fatal(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Metrics server unavailable")]
    ServerUnavailable,
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Socket level connect failure to a single endpoint
    #[error("Connect to {endpoint} failed: {reason}")]
    ConnectError { endpoint: String, reason: String },

    /// Malformed endpoint addresses
    #[error("Invalid URI format: {0}")]
    InvalidURI(String),

    /// gRPC transport layer errors
    #[error(transparent)]
    TonicError(#[from] Box<tonic::transport::Error>),

    /// gRPC status code errors
    #[error(transparent)]
    TonicStatusError(#[from] Box<tonic::Status>),

    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),

    #[error("{0}")]
    SignalSendFailed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// None of the configured store endpoints accepted a connection
    #[error("Allocation store unreachable at {endpoints:?}")]
    Unreachable { endpoints: Vec<String> },

    /// The store canceled the watch, e.g. because the resume revision was compacted
    #[error("Watch canceled by store (compact_revision={compact_revision}): {reason}")]
    WatchCanceled { reason: String, compact_revision: i64 },

    /// The outbound half of the watch stream could not be written
    #[error("Watch request channel closed")]
    WatchRequestClosed,

    #[error("Allocation store rpc failed: {0}")]
    Status(#[from] Box<tonic::Status>),
}

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// The routing daemon only carries IPv4 host routes
    #[error("Address family of {0} is not supported by the routing daemon")]
    UnsupportedFamily(IpIdentity),

    #[error("Announce {ip} rejected: {source}")]
    AnnounceRejected {
        ip: IpIdentity,
        #[source]
        source: Box<tonic::Status>,
    },

    #[error("Withdraw {ip} rejected: {source}")]
    WithdrawRejected {
        ip: IpIdentity,
        #[source]
        source: Box<tonic::Status>,
    },

    #[error("Listing announced paths failed: {0}")]
    ListFailed(#[source] Box<tonic::Status>),
}

// ============== Conversion Implementations ============== //
impl From<NetworkError> for Error {
    fn from(e: NetworkError) -> Self {
        Error::System(SystemError::Network(e))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::System(SystemError::Io(e))
    }
}

impl From<tonic::transport::Error> for Error {
    fn from(err: tonic::transport::Error) -> Self {
        NetworkError::TonicError(Box::new(err)).into()
    }
}

impl From<JoinError> for Error {
    fn from(err: JoinError) -> Self {
        NetworkError::TaskFailed(err).into()
    }
}
