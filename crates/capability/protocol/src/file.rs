//! 文件客户端：读整个文件内容，写出覆盖写入。
//!
//! 多用于本地联调与仿真数据回放。

use crate::client::ProtocolClient;
use crate::error::ProtocolError;
use crate::types::{Payload, ResolvedRequest};
use async_trait::async_trait;
use domain::Protocol;
use std::path::PathBuf;

pub struct FileClient {
    request: ResolvedRequest,
    path: Option<PathBuf>,
}

impl FileClient {
    pub fn new(request: ResolvedRequest) -> Self {
        Self {
            request,
            path: None,
        }
    }

    fn parse_path(&self) -> Result<PathBuf, ProtocolError> {
        let uri = self.request.uri.as_str();
        let path = match uri.strip_prefix("file://") {
            Some(rest) => rest,
            None => uri,
        };
        if path.is_empty() {
            return Err(ProtocolError::ConfigParse("empty file path".to_string()));
        }
        Ok(PathBuf::from(path))
    }

    fn path(&self) -> Result<&PathBuf, ProtocolError> {
        self.path
            .as_ref()
            .ok_or_else(|| ProtocolError::Connection("not connected".to_string()))
    }
}

#[async_trait]
impl ProtocolClient for FileClient {
    fn protocol(&self) -> Protocol {
        Protocol::File
    }

    async fn connect(&mut self) -> Result<(), ProtocolError> {
        self.path = Some(self.parse_path()?);
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.path = None;
    }

    async fn read(&mut self) -> Result<Payload, ProtocolError> {
        let bytes = tokio::fs::read(self.path()?).await?;
        Ok(Payload::now(bytes))
    }

    async fn write(&mut self, payload: &[u8]) -> Result<(), ProtocolError> {
        tokio::fs::write(self.path()?, payload).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResolvedRequest;

    fn client(uri: &str) -> FileClient {
        FileClient::new(ResolvedRequest {
            uri: uri.to_string(),
            timeout_ms: 1000,
            ..ResolvedRequest::default()
        })
    }

    #[tokio::test]
    async fn read_round_trip_through_temp_file() {
        let path = std::env::temp_dir().join("sgbind-file-client-test.txt");
        let uri = format!("file://{}", path.display());
        let mut file = client(&uri);
        file.connect().await.expect("connect");

        file.write(b"21.5").await.expect("write");
        let payload = file.read().await.expect("read");
        assert_eq!(payload.bytes, b"21.5");

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let mut file = client("file:///no/such/sgbind/path.txt");
        file.connect().await.expect("connect");
        let err = file.read().await.expect_err("must fail");
        assert!(matches!(err, ProtocolError::Io(_)));
    }

    #[tokio::test]
    async fn empty_path_rejected_at_connect() {
        let mut file = client("file://");
        let err = file.connect().await.expect_err("must fail");
        assert!(matches!(err, ProtocolError::ConfigParse(_)));
    }
}
