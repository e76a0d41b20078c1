// Domain layer - Telemetry records and bounded aggregates
pub mod aggregate;
pub mod connection;
pub mod telemetry;
