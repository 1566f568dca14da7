//! Modbus TCP 客户端。
//!
//! 地址表达式放在描述符的 topic 字段：`<区域>:<地址>[:<数量>]`，
//! 区域为 holding/input/coil/discrete。寄存器值按数量拼装：
//! 1 个按无符号 16 位、2 个按 float32、4 个按 float64 解释，
//! 统一序列化为文本载荷交给上层抽取。

use crate::client::{with_timeout, ProtocolClient};
use crate::error::ProtocolError;
use crate::types::{Payload, ResolvedRequest};
use async_trait::async_trait;
use domain::Protocol;
use std::net::SocketAddr;
use std::str::FromStr;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;
use tracing::debug;

/// 寄存器区域
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterTable {
    Holding,
    Input,
    Coil,
    Discrete,
}

/// 解析后的地址表达式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressSpec {
    pub table: RegisterTable,
    pub address: u16,
    pub count: u16,
}

impl FromStr for AddressSpec {
    type Err = ProtocolError;

    fn from_str(expr: &str) -> Result<Self, Self::Err> {
        let mut parts = expr.split(':');
        let table = match parts.next() {
            Some("holding") => RegisterTable::Holding,
            Some("input") => RegisterTable::Input,
            Some("coil") => RegisterTable::Coil,
            Some("discrete") => RegisterTable::Discrete,
            other => {
                return Err(ProtocolError::ConfigParse(format!(
                    "unknown register table: {}",
                    other.unwrap_or("")
                )))
            }
        };
        let address = parts
            .next()
            .and_then(|a| a.parse::<u16>().ok())
            .ok_or_else(|| {
                ProtocolError::ConfigParse(format!("invalid register address: {}", expr))
            })?;
        let count = match parts.next() {
            None => 1,
            Some(c) => c.parse::<u16>().map_err(|_| {
                ProtocolError::ConfigParse(format!("invalid register count: {}", expr))
            })?,
        };
        if count == 0 || count > 4 {
            return Err(ProtocolError::ConfigParse(format!(
                "register count out of range: {}",
                count
            )));
        }
        if parts.next().is_some() {
            return Err(ProtocolError::ConfigParse(format!(
                "malformed address expression: {}",
                expr
            )));
        }
        Ok(Self {
            table,
            address,
            count,
        })
    }
}

pub struct ModbusClient {
    request: ResolvedRequest,
    ctx: Option<Context>,
}

impl ModbusClient {
    pub fn new(request: ResolvedRequest) -> Self {
        Self { request, ctx: None }
    }

    fn endpoint(&self) -> Result<(SocketAddr, u8), ProtocolError> {
        let url = url::Url::parse(&self.request.uri)
            .map_err(|e| ProtocolError::ConfigParse(format!("modbus uri: {}", e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| ProtocolError::ConfigParse("modbus uri missing host".to_string()))?;
        let port = url.port().unwrap_or(502);
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .map_err(|e| ProtocolError::ConfigParse(format!("modbus address: {}", e)))?;

        let slave = url
            .query_pairs()
            .find(|(name, _)| name == "slave")
            .map(|(_, value)| value.parse::<u8>())
            .transpose()
            .map_err(|_| ProtocolError::ConfigParse("invalid slave id".to_string()))?
            .unwrap_or(1);
        Ok((addr, slave))
    }

    fn ctx(&mut self) -> Result<&mut Context, ProtocolError> {
        self.ctx
            .as_mut()
            .ok_or_else(|| ProtocolError::Connection("not connected".to_string()))
    }
}

#[async_trait]
impl ProtocolClient for ModbusClient {
    fn protocol(&self) -> Protocol {
        Protocol::Modbus
    }

    async fn connect(&mut self) -> Result<(), ProtocolError> {
        let (addr, slave) = self.endpoint()?;
        let mut ctx = with_timeout(self.request.timeout_ms, async {
            tcp::connect(addr)
                .await
                .map_err(|e| ProtocolError::Connection(e.to_string()))
        })
        .await?;
        ctx.set_slave(Slave(slave));
        debug!(%addr, slave, "modbus connected");
        self.ctx = Some(ctx);
        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some(mut ctx) = self.ctx.take() {
            let _ = ctx.disconnect().await;
        }
    }

    async fn read(&mut self) -> Result<Payload, ProtocolError> {
        let spec = AddressSpec::from_str(&self.request.topic)?;
        let timeout_ms = self.request.timeout_ms;
        let ctx = self.ctx()?;

        let text = with_timeout(timeout_ms, async {
            match spec.table {
                RegisterTable::Holding => {
                    let registers = ctx
                        .read_holding_registers(spec.address, spec.count)
                        .await
                        .map_err(|e| ProtocolError::Read(e.to_string()))?
                        .map_err(|e| ProtocolError::Read(format!("exception: {:?}", e)))?;
                    registers_to_text(&registers)
                }
                RegisterTable::Input => {
                    let registers = ctx
                        .read_input_registers(spec.address, spec.count)
                        .await
                        .map_err(|e| ProtocolError::Read(e.to_string()))?
                        .map_err(|e| ProtocolError::Read(format!("exception: {:?}", e)))?;
                    registers_to_text(&registers)
                }
                RegisterTable::Coil => {
                    let bits = ctx
                        .read_coils(spec.address, spec.count)
                        .await
                        .map_err(|e| ProtocolError::Read(e.to_string()))?
                        .map_err(|e| ProtocolError::Read(format!("exception: {:?}", e)))?;
                    bits_to_text(&bits)
                }
                RegisterTable::Discrete => {
                    let bits = ctx
                        .read_discrete_inputs(spec.address, spec.count)
                        .await
                        .map_err(|e| ProtocolError::Read(e.to_string()))?
                        .map_err(|e| ProtocolError::Read(format!("exception: {:?}", e)))?;
                    bits_to_text(&bits)
                }
            }
        })
        .await?;
        Ok(Payload::now(text.into_bytes()))
    }

    async fn write(&mut self, payload: &[u8]) -> Result<(), ProtocolError> {
        let spec = AddressSpec::from_str(&self.request.topic)?;
        let text = String::from_utf8_lossy(payload).trim().to_string();
        let timeout_ms = self.request.timeout_ms;
        let ctx = self.ctx()?;

        with_timeout(timeout_ms, async {
            match spec.table {
                RegisterTable::Holding => {
                    let value = text.parse::<f64>().map_err(|_| {
                        ProtocolError::DataParse(format!("not a register value: {}", text))
                    })?;
                    if !(0.0..=u16::MAX as f64).contains(&value) {
                        return Err(ProtocolError::DataParse(format!(
                            "register value out of range: {}",
                            text
                        )));
                    }
                    ctx.write_single_register(spec.address, value.round() as u16)
                        .await
                        .map_err(|e| ProtocolError::Write(e.to_string()))?
                        .map_err(|e| ProtocolError::Write(format!("exception: {:?}", e)))
                }
                RegisterTable::Coil => {
                    let on = matches!(text.to_ascii_lowercase().as_str(), "true" | "1" | "on");
                    ctx.write_single_coil(spec.address, on)
                        .await
                        .map_err(|e| ProtocolError::Write(e.to_string()))?
                        .map_err(|e| ProtocolError::Write(format!("exception: {:?}", e)))
                }
                RegisterTable::Input | RegisterTable::Discrete => {
                    Err(ProtocolError::Write("register table is read-only".to_string()))
                }
            }
        })
        .await
    }
}

fn registers_to_text(registers: &[u16]) -> Result<String, ProtocolError> {
    match registers.len() {
        1 => Ok(registers[0].to_string()),
        2 => {
            let bits = ((registers[0] as u32) << 16) | registers[1] as u32;
            Ok(f32::from_bits(bits).to_string())
        }
        4 => {
            let bits = ((registers[0] as u64) << 48)
                | ((registers[1] as u64) << 32)
                | ((registers[2] as u64) << 16)
                | registers[3] as u64;
            Ok(f64::from_bits(bits).to_string())
        }
        n => Err(ProtocolError::DataParse(format!(
            "unsupported register count: {}",
            n
        ))),
    }
}

fn bits_to_text(bits: &[bool]) -> Result<String, ProtocolError> {
    match bits.first() {
        Some(bit) => Ok(bit.to_string()),
        None => Err(ProtocolError::DataParse("empty coil response".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_expression_parses() {
        let spec = AddressSpec::from_str("holding:40001").expect("parse");
        assert_eq!(spec.table, RegisterTable::Holding);
        assert_eq!(spec.address, 40001);
        assert_eq!(spec.count, 1);

        let spec = AddressSpec::from_str("input:100:2").expect("parse");
        assert_eq!(spec.table, RegisterTable::Input);
        assert_eq!(spec.count, 2);
    }

    #[test]
    fn bad_address_expressions_rejected() {
        assert!(AddressSpec::from_str("flash:1").is_err());
        assert!(AddressSpec::from_str("holding").is_err());
        assert!(AddressSpec::from_str("holding:abc").is_err());
        assert!(AddressSpec::from_str("holding:1:0").is_err());
        assert!(AddressSpec::from_str("holding:1:9").is_err());
        assert!(AddressSpec::from_str("holding:1:2:3").is_err());
    }

    #[test]
    fn register_words_combine_by_count() {
        assert_eq!(registers_to_text(&[100]).expect("one"), "100");
        let bits = 21.5f32.to_bits();
        let words = [(bits >> 16) as u16, bits as u16];
        assert_eq!(registers_to_text(&words).expect("two"), "21.5");
    }
}
