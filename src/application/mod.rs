// Application layer - Ingest pipeline and connection lifecycle
pub mod aggregate_store;
pub mod connection_controller;
pub mod frame_decoder;
pub mod ingest;
pub mod record_parser;
pub mod transport;
