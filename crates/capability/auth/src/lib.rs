//! 认证解析：把 (method, profile) 映射为不透明凭据材料。
//!
//! 凭据由外部提供者拥有；运行时只在会话存活期间持有解析结果，
//! 从不落盘。材料对协议无感：各协议客户端自己决定如何把它
//! 应用到握手上（HTTP 头、MQTT 用户名口令、TLS 证书）。

use async_trait::async_trait;
use domain::AuthMethod;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// 认证解析错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// 外部提供者中不存在该 profile。
    #[error("auth profile not found: {profile}")]
    ProfileNotFound { profile: String },

    /// profile 声明的 scheme 与描述符的 method 不一致。
    #[error("auth scheme mismatch for profile {profile}: declared {declared}, requested {requested}")]
    SchemeMismatch {
        profile: String,
        declared: AuthMethod,
        requested: AuthMethod,
    },

    /// 提供者自身故障（查询失败等）。
    #[error("credential provider error: {0}")]
    Provider(String),
}

/// 不透明凭据材料。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialMaterial {
    Empty,
    Basic {
        username: String,
        password: String,
    },
    /// Bearer / OAuth2 访问令牌。
    Bearer(String),
    ApiKey {
        header: String,
        value: String,
    },
    /// PEM 编码的客户端证书/私钥，可选 CA。
    ClientCert {
        cert_pem: String,
        key_pem: String,
        ca_pem: Option<String>,
    },
}

/// 一个已解析的认证 profile：声明的 scheme + 材料。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthProfile {
    pub scheme: AuthMethod,
    pub material: CredentialMaterial,
}

/// 外部凭据提供者抽象。
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// 按名称查找 profile；不存在时返回 `Ok(None)`。
    async fn lookup(&self, profile: &str) -> Result<Option<AuthProfile>, AuthError>;
}

/// 内存凭据提供者（测试与宿主进程接线用）。
#[derive(Default)]
pub struct StaticCredentialProvider {
    profiles: RwLock<HashMap<String, AuthProfile>>,
}

impl StaticCredentialProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, profile: AuthProfile) {
        if let Ok(mut profiles) = self.profiles.write() {
            profiles.insert(name.into(), profile);
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn lookup(&self, profile: &str) -> Result<Option<AuthProfile>, AuthError> {
        let profiles = self
            .profiles
            .read()
            .map_err(|_| AuthError::Provider("lock failed".to_string()))?;
        Ok(profiles.get(profile).cloned())
    }
}

/// 认证解析器。
#[derive(Clone)]
pub struct AuthResolver {
    provider: Arc<dyn CredentialProvider>,
}

impl AuthResolver {
    pub fn new(provider: Arc<dyn CredentialProvider>) -> Self {
        Self { provider }
    }

    /// 解析 (method, profile) 为凭据材料。
    ///
    /// method 为 `none` 时无条件返回空凭据；其余 method 要求 profile
    /// 存在且声明 scheme 与 method 一致。
    pub async fn resolve(
        &self,
        method: AuthMethod,
        profile: Option<&str>,
    ) -> Result<CredentialMaterial, AuthError> {
        if method == AuthMethod::None {
            return Ok(CredentialMaterial::Empty);
        }

        let name = profile.unwrap_or("");
        let resolved = self
            .provider
            .lookup(name)
            .await?
            .ok_or_else(|| AuthError::ProfileNotFound {
                profile: name.to_string(),
            })?;

        if resolved.scheme != method {
            return Err(AuthError::SchemeMismatch {
                profile: name.to_string(),
                declared: resolved.scheme,
                requested: method,
            });
        }

        Ok(resolved.material)
    }
}
