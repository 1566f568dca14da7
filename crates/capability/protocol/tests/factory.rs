use async_trait::async_trait;
use domain::{Operation, Protocol};
use sgbind_protocol::{
    build_client, Credentials, GrpcInvoker, ProtocolError, ResolvedRequest,
};
use std::sync::Arc;

fn request(uri: &str, topic: &str) -> ResolvedRequest {
    ResolvedRequest {
        uri: uri.to_string(),
        topic: topic.to_string(),
        timeout_ms: 1000,
        ..ResolvedRequest::default()
    }
}

struct EchoInvoker;

#[async_trait]
impl GrpcInvoker for EchoInvoker {
    async fn invoke(
        &self,
        _endpoint: &str,
        method: &str,
        _request: &[u8],
    ) -> Result<Vec<u8>, ProtocolError> {
        Ok(format!("called {}", method).into_bytes())
    }
}

#[tokio::test]
async fn opcua_has_no_client() {
    let err = build_client(
        Protocol::OpcUa,
        request("opc.tcp://server:4840", ""),
        Credentials::none(),
        32,
        None,
    )
    .err()
    .expect("must fail");
    assert!(matches!(err, ProtocolError::ConfigParse(_)));
}

#[tokio::test]
async fn grpc_requires_injected_invoker() {
    let err = build_client(
        Protocol::Grpc,
        request("http://server:50051", "plant.Telemetry/GetValue"),
        Credentials::none(),
        32,
        None,
    )
    .err()
    .expect("must fail");
    assert!(matches!(err, ProtocolError::ConfigParse(_)));
}

#[tokio::test]
async fn grpc_read_goes_through_invoker() {
    let mut client = build_client(
        Protocol::Grpc,
        request("http://server:50051", "plant.Telemetry/GetValue"),
        Credentials::none(),
        32,
        Some(Arc::new(EchoInvoker)),
    )
    .expect("build");

    client.connect().await.expect("connect");
    let payload = client.read().await.expect("read");
    assert_eq!(payload.bytes, b"called plant.Telemetry/GetValue");
}

#[tokio::test]
async fn stream_is_unsupported_where_not_native() {
    let mut client = build_client(
        Protocol::Rest,
        request("https://plant.example/v", ""),
        Credentials::none(),
        32,
        None,
    )
    .expect("build");
    client.connect().await.expect("connect");

    let err = client.start_stream().await.expect_err("must fail");
    match err {
        ProtocolError::Unsupported {
            protocol,
            operation,
        } => {
            assert_eq!(protocol, Protocol::Rest);
            assert_eq!(operation, Operation::Stream);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
