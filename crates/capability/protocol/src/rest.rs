//! REST 客户端：读取取响应体，写出把值提交到端点。

use crate::client::ProtocolClient;
use crate::error::ProtocolError;
use crate::types::{Credentials, Payload, ResolvedRequest};
use async_trait::async_trait;
use domain::Protocol;
use reqwest::Method;
use sgbind_auth::CredentialMaterial;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub struct RestClient {
    request: ResolvedRequest,
    credentials: Credentials,
    http: Option<reqwest::Client>,
}

impl RestClient {
    pub fn new(request: ResolvedRequest, credentials: Credentials) -> Self {
        Self {
            request,
            credentials,
            http: None,
        }
    }

    fn method(&self, default: Method) -> Result<Method, ProtocolError> {
        match self.request.http_method.as_deref() {
            None => Ok(default),
            Some(name) => Method::from_str(&name.to_ascii_uppercase())
                .map_err(|_| ProtocolError::ConfigParse(format!("http method: {}", name))),
        }
    }

    fn build_request(
        &self,
        method: Method,
        body: Option<Vec<u8>>,
    ) -> Result<reqwest::RequestBuilder, ProtocolError> {
        let http = self
            .http
            .as_ref()
            .ok_or_else(|| ProtocolError::Connection("not connected".to_string()))?;
        let mut builder = http.request(method, &self.request.uri);
        for (name, value) in &self.request.headers {
            builder = builder.header(name, value);
        }
        builder = match &self.credentials.material {
            CredentialMaterial::Empty | CredentialMaterial::ClientCert { .. } => builder,
            CredentialMaterial::Basic { username, password } => {
                builder.basic_auth(username, Some(password))
            }
            CredentialMaterial::Bearer(token) => builder.bearer_auth(token),
            CredentialMaterial::ApiKey { header, value } => builder.header(header, value),
        };
        if let Some(body) = body {
            builder = builder.body(body);
        }
        Ok(builder)
    }

    async fn execute(&self, builder: reqwest::RequestBuilder) -> Result<Payload, ProtocolError> {
        let response = builder
            .send()
            .await
            .map_err(|e| ProtocolError::Connection(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProtocolError::Read(format!("http status {}", status)));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProtocolError::Read(e.to_string()))?;
        Ok(Payload::now(bytes.to_vec()))
    }
}

#[async_trait]
impl ProtocolClient for RestClient {
    fn protocol(&self) -> Protocol {
        Protocol::Rest
    }

    async fn connect(&mut self) -> Result<(), ProtocolError> {
        let mut builder =
            reqwest::Client::builder().timeout(Duration::from_millis(self.request.timeout_ms));
        // mTLS 材料在建连接池时装配
        if let CredentialMaterial::ClientCert {
            cert_pem, key_pem, ..
        } = &self.credentials.material
        {
            let pem = format!("{}\n{}", cert_pem, key_pem);
            let identity = reqwest::Identity::from_pem(pem.as_bytes())
                .map_err(|e| ProtocolError::ConfigParse(format!("client cert: {}", e)))?;
            builder = builder.identity(identity);
        }
        let http = builder
            .build()
            .map_err(|e| ProtocolError::Connection(e.to_string()))?;
        self.http = Some(http);
        debug!(uri = %self.request.uri, "rest client ready");
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.http = None;
    }

    async fn read(&mut self) -> Result<Payload, ProtocolError> {
        let method = self.method(Method::GET)?;
        let body = self.request.body.as_ref().map(|b| b.clone().into_bytes());
        let builder = self.build_request(method, body)?;
        self.execute(builder).await
    }

    async fn write(&mut self, payload: &[u8]) -> Result<(), ProtocolError> {
        let method = self.method(Method::POST)?;
        let builder = self.build_request(method, Some(payload.to_vec()))?;
        self.execute(builder)
            .await
            .map(|_| ())
            .map_err(|e| match e {
                ProtocolError::Read(msg) => ProtocolError::Write(msg),
                other => other,
            })
    }
}
