//! MQTT 客户端。
//!
//! 连接经纪人后支持三种用法：单次读取（订阅后取首条匹配消息）、
//! 发布写出、原生流订阅（泵任务向有界缓冲投递）。

use crate::buffer::{stream_channel, StreamHandle, StreamSender};
use crate::client::{with_timeout, ProtocolClient};
use crate::error::ProtocolError;
use crate::types::{Credentials, Payload, ResolvedRequest};
use async_trait::async_trait;
use domain::{now_epoch_ms, Protocol};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use sgbind_auth::CredentialMaterial;
use std::time::Duration;
use tracing::{debug, warn};

pub struct MqttClient {
    request: ResolvedRequest,
    credentials: Credentials,
    stream_capacity: usize,
    client: Option<AsyncClient>,
    eventloop: Option<EventLoop>,
}

impl MqttClient {
    pub fn new(request: ResolvedRequest, credentials: Credentials, stream_capacity: usize) -> Self {
        Self {
            request,
            credentials,
            stream_capacity,
            client: None,
            eventloop: None,
        }
    }

    fn qos(&self) -> QoS {
        match self.request.qos {
            0 => QoS::AtMostOnce,
            1 => QoS::AtLeastOnce,
            _ => QoS::ExactlyOnce,
        }
    }

    fn options(&self) -> Result<MqttOptions, ProtocolError> {
        let url = url::Url::parse(&self.request.uri)
            .map_err(|e| ProtocolError::ConfigParse(format!("mqtt uri: {}", e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| ProtocolError::ConfigParse("mqtt uri missing host".to_string()))?
            .to_string();
        let port = url.port().unwrap_or(1883);

        let client_id = format!("sgbind-{}", now_epoch_ms());
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(30));
        if let CredentialMaterial::Basic { username, password } = &self.credentials.material {
            options.set_credentials(username, password);
        }
        Ok(options)
    }

    async fn subscribe(&mut self) -> Result<(), ProtocolError> {
        let qos = self.qos();
        let topic = self.request.topic.clone();
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| ProtocolError::Connection("not connected".to_string()))?;
        client
            .subscribe(topic, qos)
            .await
            .map_err(|e| ProtocolError::Read(e.to_string()))
    }
}

#[async_trait]
impl ProtocolClient for MqttClient {
    fn protocol(&self) -> Protocol {
        Protocol::Mqtt
    }

    async fn connect(&mut self) -> Result<(), ProtocolError> {
        let options = self.options()?;
        let (client, mut eventloop) = AsyncClient::new(options, 16);

        // 等到 ConnAck 才算连接成功
        with_timeout(self.request.timeout_ms, async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
                    Ok(_) => {}
                    Err(e) => return Err(ProtocolError::Connection(e.to_string())),
                }
            }
        })
        .await?;

        debug!(uri = %self.request.uri, "mqtt connected");
        self.client = Some(client);
        self.eventloop = Some(eventloop);
        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some(client) = self.client.take() {
            let _ = client.disconnect().await;
        }
        self.eventloop = None;
    }

    async fn read(&mut self) -> Result<Payload, ProtocolError> {
        self.subscribe().await?;
        let filter = self.request.topic.clone();
        let eventloop = self
            .eventloop
            .as_mut()
            .ok_or_else(|| ProtocolError::Connection("not connected".to_string()))?;

        let payload = with_timeout(self.request.timeout_ms, async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        if matches_filter(&filter, &publish.topic) {
                            return Ok(Payload::now(publish.payload.to_vec()));
                        }
                    }
                    Ok(_) => {}
                    Err(e) => return Err(ProtocolError::Read(e.to_string())),
                }
            }
        })
        .await?;

        // 单次读取取到首条即退订
        if let Some(client) = self.client.as_ref() {
            let _ = client.unsubscribe(filter).await;
        }
        Ok(payload)
    }

    async fn write(&mut self, payload: &[u8]) -> Result<(), ProtocolError> {
        let qos = self.qos();
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| ProtocolError::Connection("not connected".to_string()))?;
        client
            .publish(
                self.request.topic.clone(),
                qos,
                self.request.retain,
                payload.to_vec(),
            )
            .await
            .map_err(|e| ProtocolError::Write(e.to_string()))?;

        // 驱动事件循环把报文发出去；qos > 0 等确认
        let wait_ack = self.request.qos > 0;
        let eventloop = self
            .eventloop
            .as_mut()
            .ok_or_else(|| ProtocolError::Connection("not connected".to_string()))?;
        with_timeout(self.request.timeout_ms, async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Publish(_))) if !wait_ack => return Ok(()),
                    Ok(Event::Incoming(Packet::PubAck(_)))
                    | Ok(Event::Incoming(Packet::PubComp(_))) => return Ok(()),
                    Ok(_) => {}
                    Err(e) => return Err(ProtocolError::Write(e.to_string())),
                }
            }
        })
        .await
    }

    async fn start_stream(&mut self) -> Result<StreamHandle, ProtocolError> {
        self.subscribe().await?;
        let client = self
            .client
            .take()
            .ok_or_else(|| ProtocolError::Connection("not connected".to_string()))?;
        let eventloop = self
            .eventloop
            .take()
            .ok_or_else(|| ProtocolError::Connection("not connected".to_string()))?;

        let (sender, handle) = stream_channel(self.stream_capacity);
        let filter = self.request.topic.clone();
        tokio::spawn(pump(client, eventloop, filter, sender));
        Ok(handle)
    }
}

/// 流泵：把匹配 topic 的消息灌进缓冲，消费端停止后断开退出。
async fn pump(client: AsyncClient, mut eventloop: EventLoop, filter: String, sender: StreamSender) {
    loop {
        if sender.is_closed() {
            break;
        }
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if !matches_filter(&filter, &publish.topic) {
                    continue;
                }
                if !sender.push(Payload::now(publish.payload.to_vec())) {
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "mqtt stream closed");
                break;
            }
        }
    }
    let _ = client.disconnect().await;
}

/// MQTT topic 过滤器匹配（支持 `+` 与 `#`）。
pub fn matches_filter(filter: &str, topic: &str) -> bool {
    let mut filter_parts = filter.split('/');
    let mut topic_parts = topic.split('/');
    loop {
        match (filter_parts.next(), topic_parts.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::matches_filter;

    #[test]
    fn exact_and_wildcard_filters() {
        assert!(matches_filter("plant/line/temp", "plant/line/temp"));
        assert!(matches_filter("plant/+/temp", "plant/line7/temp"));
        assert!(matches_filter("plant/#", "plant/line7/temp/raw"));
        assert!(!matches_filter("plant/+/temp", "plant/line7/pressure"));
        assert!(!matches_filter("plant/line/temp", "plant/line"));
        assert!(!matches_filter("plant/line", "plant/line/temp"));
    }
}
