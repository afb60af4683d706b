//! Native RFCOMM/SPP socket transport (BlueZ)

use super::{Connector, DeviceIdentity, Link, TransportError, TransportKind};
use async_trait::async_trait;
use bluer::rfcomm::{SocketAddr, Stream};
use bluer::Address;
use std::time::Duration;

/// Connects to `AA:BB:CC:DD:EE:FF` or `AA:BB:CC:DD:EE:FF/<channel>`
#[derive(Debug, Clone)]
pub struct RfcommConnector {
    default_channel: u8,
    timeout_secs: u64,
}

impl RfcommConnector {
    /// Create a new RFCOMM connector
    pub fn new(default_channel: u8, timeout_secs: u64) -> Self {
        Self {
            default_channel,
            timeout_secs,
        }
    }

    fn socket_addr(&self, address: &str) -> Result<SocketAddr, TransportError> {
        let (mac, channel) = match address.split_once('/') {
            Some((mac, channel)) => {
                let channel = channel
                    .parse::<u8>()
                    .map_err(|_| TransportError::InvalidAddress(address.to_string()))?;
                (mac, channel)
            }
            None => (address, self.default_channel),
        };
        let mac: Address = mac
            .parse()
            .map_err(|_| TransportError::InvalidAddress(address.to_string()))?;
        Ok(SocketAddr::new(mac, channel))
    }
}

#[async_trait]
impl Connector for RfcommConnector {
    async fn connect(&self, identity: &DeviceIdentity) -> Result<Link, TransportError> {
        let target = self.socket_addr(identity.address())?;
        tracing::info!(
            "Connecting to Bluetooth device {} on channel {}",
            target.addr,
            target.channel
        );

        let stream = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            Stream::connect(target),
        )
        .await
        .map_err(|_| TransportError::Timeout(self.timeout_secs))?
        .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        Ok(Link::new(stream))
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Rfcomm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_with_channel() {
        let connector = RfcommConnector::new(1, 10);
        let addr = connector.socket_addr("AA:BB:CC:DD:EE:FF/3").unwrap();
        assert_eq!(addr.channel, 3);
        assert_eq!(addr.addr.to_string(), "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn test_parse_address_default_channel() {
        let connector = RfcommConnector::new(1, 10);
        assert_eq!(connector.socket_addr("AA:BB:CC:DD:EE:FF").unwrap().channel, 1);
        assert!(connector.socket_addr("not-a-mac").is_err());
    }
}
