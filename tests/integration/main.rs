//! Integration tests with mock HTTP servers and scripted transports

pub mod mock_server;

mod batch;
mod caching;
mod end_to_end;
mod resilience;
