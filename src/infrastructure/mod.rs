// Infrastructure layer - External links and adapters
pub mod byte_stream_transport;
pub mod chunked_json;
pub mod config;
pub mod http_response;
pub mod transport_selector;
pub mod websocket_transport;
