// Pick a transport from configuration and what the host exposes
use crate::application::transport::{Transport, TransportSelector};
use crate::infrastructure::byte_stream_transport::{ByteStreamTransport, LinkTarget};
use crate::infrastructure::config::{TransportMode, TransportSettings};
use crate::infrastructure::websocket_transport::WebSocketTransport;

pub struct ConfiguredSelector {
    settings: TransportSettings,
}

impl ConfiguredSelector {
    pub fn new(settings: TransportSettings) -> Self {
        Self { settings }
    }

    /// Byte-stream target to use, if the configuration and host allow one.
    ///
    /// In auto mode a serial device only counts when its node exists, so an
    /// unplugged adapter falls through to the next option.
    pub fn byte_stream_target(&self) -> Option<LinkTarget> {
        let device = self.settings.serial_device.clone();
        let tcp = self.settings.tcp_address.clone();

        match self.settings.mode {
            TransportMode::Serial => device.map(LinkTarget::Device),
            TransportMode::Tcp => tcp.map(LinkTarget::Tcp),
            TransportMode::Websocket => None,
            TransportMode::Auto => device
                .filter(|path| path.exists())
                .map(LinkTarget::Device)
                .or_else(|| tcp.map(LinkTarget::Tcp)),
        }
    }
}

impl TransportSelector for ConfiguredSelector {
    fn select(&self) -> Box<dyn Transport> {
        match self.byte_stream_target() {
            Some(target) => Box::new(ByteStreamTransport::new(
                target,
                self.settings.read_buffer_bytes,
            )),
            None => Box::new(WebSocketTransport::new(self.settings.websocket_url.clone())),
        }
    }
}
