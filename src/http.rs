//! HTTP transport, request pipeline, and outgoing-request helpers.

pub mod debug;
pub mod pipeline;
pub mod proxy;
pub mod transport;
