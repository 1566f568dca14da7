//! WebSocket 客户端：文本/二进制消息的单次读取、发送与流订阅。

use crate::buffer::{stream_channel, StreamHandle, StreamSender};
use crate::client::{with_timeout, ProtocolClient};
use crate::error::ProtocolError;
use crate::types::{Credentials, Payload, ResolvedRequest};
use async_trait::async_trait;
use domain::Protocol;
use futures_util::{SinkExt, StreamExt};
use sgbind_auth::CredentialMaterial;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WebsocketClient {
    request: ResolvedRequest,
    credentials: Credentials,
    stream_capacity: usize,
    stream: Option<WsStream>,
}

impl WebsocketClient {
    pub fn new(request: ResolvedRequest, credentials: Credentials, stream_capacity: usize) -> Self {
        Self {
            request,
            credentials,
            stream_capacity,
            stream: None,
        }
    }

    fn handshake_request(
        &self,
    ) -> Result<tokio_tungstenite::tungstenite::handshake::client::Request, ProtocolError> {
        let mut url = url::Url::parse(&self.request.uri)
            .map_err(|e| ProtocolError::ConfigParse(format!("websocket uri: {}", e)))?;
        // Basic 凭据走 URI userinfo
        if let CredentialMaterial::Basic { username, password } = &self.credentials.material {
            url.set_username(username)
                .map_err(|_| ProtocolError::ConfigParse("websocket uri username".to_string()))?;
            url.set_password(Some(password))
                .map_err(|_| ProtocolError::ConfigParse("websocket uri password".to_string()))?;
        }

        let mut handshake = url
            .as_str()
            .into_client_request()
            .map_err(|e| ProtocolError::ConfigParse(format!("websocket request: {}", e)))?;

        let headers = handshake.headers_mut();
        for (name, value) in &self.request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ProtocolError::ConfigParse(format!("header name: {}", e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ProtocolError::ConfigParse(format!("header value: {}", e)))?;
            headers.insert(name, value);
        }
        match &self.credentials.material {
            CredentialMaterial::Bearer(token) => {
                let value = HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| ProtocolError::ConfigParse(format!("bearer token: {}", e)))?;
                headers.insert("authorization", value);
            }
            CredentialMaterial::ApiKey { header, value } => {
                let name = HeaderName::from_bytes(header.as_bytes())
                    .map_err(|e| ProtocolError::ConfigParse(format!("header name: {}", e)))?;
                let value = HeaderValue::from_str(value)
                    .map_err(|e| ProtocolError::ConfigParse(format!("header value: {}", e)))?;
                headers.insert(name, value);
            }
            _ => {}
        }
        Ok(handshake)
    }
}

#[async_trait]
impl ProtocolClient for WebsocketClient {
    fn protocol(&self) -> Protocol {
        Protocol::Websocket
    }

    async fn connect(&mut self) -> Result<(), ProtocolError> {
        let handshake = self.handshake_request()?;
        let stream = with_timeout(self.request.timeout_ms, async {
            let (stream, _response) = connect_async(handshake)
                .await
                .map_err(|e| ProtocolError::Connection(e.to_string()))?;
            Ok(stream)
        })
        .await?;
        debug!(uri = %self.request.uri, "websocket connected");
        self.stream = Some(stream);
        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.close(None).await;
        }
    }

    async fn read(&mut self) -> Result<Payload, ProtocolError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| ProtocolError::Connection("not connected".to_string()))?;
        with_timeout(self.request.timeout_ms, async {
            loop {
                match stream.next().await {
                    Some(Ok(Message::Text(text))) => {
                        return Ok(Payload::now(text.into_bytes()));
                    }
                    Some(Ok(Message::Binary(bytes))) => return Ok(Payload::now(bytes)),
                    Some(Ok(Message::Close(_))) | None => return Err(ProtocolError::StreamClosed),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(ProtocolError::Read(e.to_string())),
                }
            }
        })
        .await
    }

    async fn write(&mut self, payload: &[u8]) -> Result<(), ProtocolError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| ProtocolError::Connection("not connected".to_string()))?;
        let message = match String::from_utf8(payload.to_vec()) {
            Ok(text) => Message::Text(text),
            Err(_) => Message::Binary(payload.to_vec()),
        };
        with_timeout(self.request.timeout_ms, async {
            stream
                .send(message)
                .await
                .map_err(|e| ProtocolError::Write(e.to_string()))
        })
        .await
    }

    async fn start_stream(&mut self) -> Result<StreamHandle, ProtocolError> {
        let stream = self
            .stream
            .take()
            .ok_or_else(|| ProtocolError::Connection("not connected".to_string()))?;
        let (sender, handle) = stream_channel(self.stream_capacity);
        tokio::spawn(pump(stream, sender));
        Ok(handle)
    }
}

async fn pump(mut stream: WsStream, sender: StreamSender) {
    loop {
        if sender.is_closed() {
            break;
        }
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                if !sender.push(Payload::now(text.into_bytes())) {
                    break;
                }
            }
            Some(Ok(Message::Binary(bytes))) => {
                if !sender.push(Payload::now(bytes)) {
                    break;
                }
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!(error = %e, "websocket stream closed");
                break;
            }
        }
    }
    let _ = stream.close(None).await;
}
