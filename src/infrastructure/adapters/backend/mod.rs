//! Backend Adapter - 教材流水线后端客户端实现

mod dto;
mod fake_backend_client;
mod http_backend_client;

pub use fake_backend_client::{snapshot_fixture, FakeBackendClient, ScriptedStream};
pub use http_backend_client::{HttpBackendClient, HttpBackendClientConfig};
