//! SQL 客户端：查询结果取首行首列，写出执行参数化语句。

use crate::client::{with_timeout, ProtocolClient};
use crate::error::ProtocolError;
use crate::types::{Credentials, Payload, ResolvedRequest};
use async_trait::async_trait;
use domain::Protocol;
use sgbind_auth::CredentialMaterial;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Column, PgPool, Row};
use tracing::debug;

pub struct SqlClient {
    request: ResolvedRequest,
    credentials: Credentials,
    pool: Option<PgPool>,
}

impl SqlClient {
    pub fn new(request: ResolvedRequest, credentials: Credentials) -> Self {
        Self {
            request,
            credentials,
            pool: None,
        }
    }

    /// 连接串：uri 自带用户名密码则原样使用，否则注入 Basic 凭据。
    fn database_url(&self) -> Result<String, ProtocolError> {
        let mut url = url::Url::parse(&self.request.uri)
            .map_err(|e| ProtocolError::ConfigParse(format!("sql uri: {}", e)))?;
        if url.username().is_empty() {
            if let CredentialMaterial::Basic { username, password } = &self.credentials.material {
                url.set_username(username)
                    .map_err(|_| ProtocolError::ConfigParse("sql uri username".to_string()))?;
                url.set_password(Some(password))
                    .map_err(|_| ProtocolError::ConfigParse("sql uri password".to_string()))?;
            }
        }
        Ok(url.to_string())
    }

    fn pool(&self) -> Result<&PgPool, ProtocolError> {
        self.pool
            .as_ref()
            .ok_or_else(|| ProtocolError::Connection("not connected".to_string()))
    }
}

#[async_trait]
impl ProtocolClient for SqlClient {
    fn protocol(&self) -> Protocol {
        Protocol::Sql
    }

    async fn connect(&mut self) -> Result<(), ProtocolError> {
        let database_url = self.database_url()?;
        let pool = with_timeout(self.request.timeout_ms, async {
            PgPoolOptions::new()
                .max_connections(2)
                .connect(&database_url)
                .await
                .map_err(|e| ProtocolError::Connection(e.to_string()))
        })
        .await?;
        debug!(uri = %self.request.uri, "sql pool ready");
        self.pool = Some(pool);
        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
        }
    }

    async fn read(&mut self) -> Result<Payload, ProtocolError> {
        let query = self.request.topic.clone();
        let pool = self.pool()?;
        let row = with_timeout(self.request.timeout_ms, async {
            sqlx::query(&query)
                .fetch_one(pool)
                .await
                .map_err(|e| ProtocolError::Read(e.to_string()))
        })
        .await?;

        if row.columns().is_empty() {
            return Err(ProtocolError::DataParse("query returned no columns".to_string()));
        }

        // 首列按常见标量类型逐个尝试，统一序列化为文本载荷
        let text = if let Ok(v) = row.try_get::<f64, _>(0) {
            v.to_string()
        } else if let Ok(v) = row.try_get::<i64, _>(0) {
            v.to_string()
        } else if let Ok(v) = row.try_get::<i32, _>(0) {
            v.to_string()
        } else if let Ok(v) = row.try_get::<bool, _>(0) {
            v.to_string()
        } else if let Ok(v) = row.try_get::<String, _>(0) {
            v
        } else {
            return Err(ProtocolError::DataParse(
                "first column is not a supported scalar type".to_string(),
            ));
        };
        Ok(Payload::now(text.into_bytes()))
    }

    async fn write(&mut self, payload: &[u8]) -> Result<(), ProtocolError> {
        let query = self.request.topic.clone();
        let value = String::from_utf8_lossy(payload).to_string();
        let pool = self.pool()?;
        with_timeout(self.request.timeout_ms, async {
            // 语句含占位符时把值作为 $1 绑定，否则原样执行
            let result = if query.contains("$1") {
                sqlx::query(&query).bind(&value).execute(pool).await
            } else {
                sqlx::query(&query).execute(pool).await
            };
            result
                .map(|_| ())
                .map_err(|e| ProtocolError::Write(e.to_string()))
        })
        .await
    }
}
