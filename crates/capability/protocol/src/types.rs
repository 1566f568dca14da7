//! 协议层共享类型。

use domain::now_epoch_ms;
use sgbind_auth::CredentialMaterial;

/// 变量替换之后的连接请求。
///
/// 描述符中的 uri/topic/body/headers 在调度器里完成 `${var}` 解析，
/// 协议客户端拿到的是已经落定的字面值。
#[derive(Debug, Clone, Default)]
pub struct ResolvedRequest {
    pub uri: String,
    /// topic / SQL 语句 / gRPC 方法 / 寄存器地址表达式，按协议解释。
    pub topic: String,
    pub body: Option<String>,
    pub http_method: Option<String>,
    pub headers: Vec<(String, String)>,
    pub qos: u8,
    pub retain: bool,
    pub timeout_ms: u64,
}

/// 一次读取/一条流消息的原始载荷。
#[derive(Debug, Clone)]
pub struct Payload {
    pub bytes: Vec<u8>,
    pub received_at_ms: i64,
}

impl Payload {
    pub fn now(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            received_at_ms: now_epoch_ms(),
        }
    }
}

/// 客户端握手时使用的凭据材料。
#[derive(Debug, Clone)]
pub struct Credentials {
    pub material: CredentialMaterial,
}

impl Credentials {
    pub fn none() -> Self {
        Self {
            material: CredentialMaterial::Empty,
        }
    }
}

impl From<CredentialMaterial> for Credentials {
    fn from(material: CredentialMaterial) -> Self {
        Self { material }
    }
}
