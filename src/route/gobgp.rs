use std::time::Duration;

use prost::Message;
use tonic::async_trait;
use tonic::transport::Channel;
use tonic::transport::Endpoint;
use tonic::Code;
use tracing::debug;
use tracing::info;

use super::RouteController;
use crate::constants::ANY_TYPE_URL_PREFIX;
use crate::constants::DEFAULT_NEXT_HOP;
use crate::constants::ORIGIN_IGP;
use crate::proto::gobgpapi::family::Afi;
use crate::proto::gobgpapi::family::Safi;
use crate::proto::gobgpapi::gobgp_api_client::GobgpApiClient;
use crate::proto::gobgpapi::list_path_request::SortType;
use crate::proto::gobgpapi::AddPathRequest;
use crate::proto::gobgpapi::DeletePathRequest;
use crate::proto::gobgpapi::Family;
use crate::proto::gobgpapi::IpAddressPrefix;
use crate::proto::gobgpapi::ListPathRequest;
use crate::proto::gobgpapi::NextHopAttribute;
use crate::proto::gobgpapi::OriginAttribute;
use crate::proto::gobgpapi::Path;
use crate::proto::gobgpapi::TableType;
use crate::utils::net::address_str;
use crate::IpIdentity;
use crate::NetworkError;
use crate::Result;
use crate::RouteError;
use crate::RoutingConfig;

/// GoBGP gRPC route controller.
///
/// Paths are injected into the global RIB as IPv4 unicast /32 prefixes with a
/// fixed next hop and ORIGIN IGP. The underlying channel multiplexes every
/// request, so clones can be used from both reconciliation loops.
#[derive(Debug, Clone)]
pub struct GobgpController {
    client: GobgpApiClient<Channel>,
    request_timeout: Duration,
}

impl GobgpController {
    /// Dials the GoBGP api endpoint.
    ///
    /// # Errors
    /// Returns a network error when the daemon does not accept the connection
    /// within the configured connect timeout.
    pub async fn connect(config: &RoutingConfig) -> Result<Self> {
        let channel = Endpoint::from_shared(address_str(&config.target))
            .map_err(|_| NetworkError::InvalidURI(config.target.clone()))?
            .connect_timeout(Duration::from_millis(config.connect_timeout_in_ms))
            .connect()
            .await
            .map_err(|e| NetworkError::ConnectError {
                endpoint: config.target.clone(),
                reason: e.to_string(),
            })?;

        info!(endpoint = %config.target, "Connected to routing daemon");
        Ok(Self::from_channel(
            channel,
            Duration::from_millis(config.request_timeout_in_ms),
        ))
    }

    pub fn from_channel(
        channel: Channel,
        request_timeout: Duration,
    ) -> Self {
        Self {
            client: GobgpApiClient::new(channel),
            request_timeout,
        }
    }

    fn request<T>(
        &self,
        message: T,
    ) -> tonic::Request<T> {
        let mut request = tonic::Request::new(message);
        request.set_timeout(self.request_timeout);
        request
    }
}

#[async_trait]
impl RouteController for GobgpController {
    async fn list_announced(&self) -> Result<Vec<String>> {
        let request = self.request(ListPathRequest {
            table_type: TableType::Global as i32,
            family: Some(ipv4_unicast()),
            sort_type: SortType::Prefix as i32,
            ..Default::default()
        });

        let mut client = self.client.clone();
        let mut stream = client
            .list_path(request)
            .await
            .map_err(|status| RouteError::ListFailed(Box::new(status)))?
            .into_inner();

        let mut prefixes = Vec::new();
        while let Some(response) = stream
            .message()
            .await
            .map_err(|status| RouteError::ListFailed(Box::new(status)))?
        {
            if let Some(destination) = response.destination {
                prefixes.push(destination.prefix);
            }
        }

        debug!(count = prefixes.len(), "Listed announced prefixes");
        Ok(prefixes)
    }

    async fn announce(
        &self,
        ip: IpIdentity,
    ) -> Result<()> {
        let request = self.request(AddPathRequest {
            table_type: TableType::Global as i32,
            path: Some(host_path(ip)?),
            ..Default::default()
        });

        let mut client = self.client.clone();
        match client.add_path(request).await {
            Ok(_) => {
                debug!(%ip, "Announced host route");
                Ok(())
            }
            Err(status) if status.code() == Code::AlreadyExists => {
                debug!(%ip, "Host route already announced");
                Ok(())
            }
            Err(status) => Err(RouteError::AnnounceRejected {
                ip,
                source: Box::new(status),
            }
            .into()),
        }
    }

    async fn withdraw(
        &self,
        ip: IpIdentity,
    ) -> Result<()> {
        let request = self.request(DeletePathRequest {
            table_type: TableType::Global as i32,
            path: Some(host_path(ip)?),
            ..Default::default()
        });

        let mut client = self.client.clone();
        match client.delete_path(request).await {
            Ok(_) => {
                debug!(%ip, "Withdrew host route");
                Ok(())
            }
            Err(status) if status.code() == Code::NotFound => {
                debug!(%ip, "Host route was not announced");
                Ok(())
            }
            Err(status) => Err(RouteError::WithdrawRejected {
                ip,
                source: Box::new(status),
            }
            .into()),
        }
    }
}

fn ipv4_unicast() -> Family {
    Family {
        afi: Afi::Ip as i32,
        safi: Safi::Unicast as i32,
    }
}

/// Builds the /32 path for `ip` with the fixed attribute set.
pub(crate) fn host_path(ip: IpIdentity) -> Result<Path> {
    if !ip.is_ipv4() {
        return Err(RouteError::UnsupportedFamily(ip).into());
    }

    Ok(Path {
        nlri: Some(pack_any(
            "IPAddressPrefix",
            &IpAddressPrefix {
                prefix_len: u32::from(ip.host_prefix_len()),
                prefix: ip.to_string(),
            },
        )),
        pattrs: vec![
            pack_any("OriginAttribute", &OriginAttribute { origin: ORIGIN_IGP }),
            pack_any(
                "NextHopAttribute",
                &NextHopAttribute {
                    next_hop: DEFAULT_NEXT_HOP.to_string(),
                },
            ),
        ],
        family: Some(ipv4_unicast()),
        ..Default::default()
    })
}

fn pack_any<M: Message>(
    type_name: &str,
    message: &M,
) -> prost_types::Any {
    prost_types::Any {
        type_url: format!("{ANY_TYPE_URL_PREFIX}gobgpapi.{type_name}"),
        value: message.encode_to_vec(),
    }
}
