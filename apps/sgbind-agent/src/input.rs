//! 场景导出与认证 profile 文件加载。
//!
//! 场景文件是宿主场景图的一次 JSON 导出：节点路径、节点级
//! context、每个属性的元数据字典。这里只做反序列化与展开，
//! 绑定声明的解析与校验在发现层完成。

use domain::AuthMethod;
use serde::Deserialize;
use serde_json::{Map, Value as Json};
use sgbind_auth::{AuthProfile, CredentialMaterial, StaticCredentialProvider};
use sgbind_discovery::AttributeRecord;
use std::collections::HashMap;
use std::str::FromStr;

type BoxError = Box<dyn std::error::Error>;

#[derive(Debug, Deserialize)]
pub struct SceneFile {
    #[serde(default)]
    pub globals: HashMap<String, String>,
    #[serde(default)]
    pub nodes: Vec<SceneNode>,
}

#[derive(Debug, Deserialize)]
pub struct SceneNode {
    pub path: String,
    /// 节点级变量，对后代节点可见。
    #[serde(default)]
    pub context: Option<Map<String, Json>>,
    #[serde(default)]
    pub attributes: Vec<SceneAttribute>,
}

#[derive(Debug, Deserialize)]
pub struct SceneAttribute {
    pub name: String,
    #[serde(rename = "valueType", default)]
    pub value_type: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Json>,
}

/// 读取场景文件，展开为属性记录与文件级全局变量。
pub fn load_scene(path: &str) -> Result<(Vec<AttributeRecord>, HashMap<String, String>), BoxError> {
    let text = std::fs::read_to_string(path)?;
    let scene: SceneFile = serde_json::from_str(&text)?;
    Ok(flatten_scene(scene))
}

fn flatten_scene(scene: SceneFile) -> (Vec<AttributeRecord>, HashMap<String, String>) {
    let mut records = Vec::new();
    for node in scene.nodes {
        // 节点级 context 作为一条无属性名的记录进入遍历，
        // 只参与作用域收集，不会被当成绑定声明。
        if let Some(context) = node.context {
            let mut metadata = Map::new();
            metadata.insert("context".to_string(), Json::Object(context));
            records.push(AttributeRecord {
                node_path: node.path.clone(),
                attribute: String::new(),
                metadata,
                value_type: None,
            });
        }
        for attribute in node.attributes {
            records.push(AttributeRecord {
                node_path: node.path.clone(),
                attribute: attribute.name,
                metadata: attribute.metadata,
                value_type: attribute.value_type,
            });
        }
    }
    (records, scene.globals)
}

#[derive(Debug, Deserialize)]
struct ProfilesFile {
    #[serde(default)]
    profiles: HashMap<String, ProfileEntry>,
}

#[derive(Debug, Deserialize)]
struct ProfileEntry {
    scheme: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    header: Option<String>,
    #[serde(default)]
    value: Option<String>,
    #[serde(rename = "certFile", default)]
    cert_file: Option<String>,
    #[serde(rename = "keyFile", default)]
    key_file: Option<String>,
    #[serde(rename = "caFile", default)]
    ca_file: Option<String>,
}

/// 读取认证 profile 文件并装入内存提供者。
///
/// mtls/cert 的证书材料按文件路径引用，在加载时读入 PEM 文本。
pub fn load_profiles(path: &str) -> Result<StaticCredentialProvider, BoxError> {
    let text = std::fs::read_to_string(path)?;
    let file: ProfilesFile = serde_json::from_str(&text)?;

    let provider = StaticCredentialProvider::new();
    for (name, entry) in file.profiles {
        let scheme = AuthMethod::from_str(&entry.scheme)
            .map_err(|err| format!("profile {name}: {err}"))?;
        let material = build_material(&name, scheme, entry)?;
        provider.insert(name, AuthProfile { scheme, material });
    }
    Ok(provider)
}

fn build_material(
    name: &str,
    scheme: AuthMethod,
    entry: ProfileEntry,
) -> Result<CredentialMaterial, BoxError> {
    let material = match scheme {
        AuthMethod::None => CredentialMaterial::Empty,
        AuthMethod::Basic => CredentialMaterial::Basic {
            username: entry.username.unwrap_or_default(),
            password: entry.password.unwrap_or_default(),
        },
        AuthMethod::Bearer | AuthMethod::OAuth2 => {
            CredentialMaterial::Bearer(entry.token.unwrap_or_default())
        }
        AuthMethod::ApiKey => CredentialMaterial::ApiKey {
            header: entry.header.unwrap_or_else(|| "x-api-key".to_string()),
            value: entry.value.unwrap_or_default(),
        },
        AuthMethod::Mtls | AuthMethod::Cert => {
            let cert_file = entry
                .cert_file
                .ok_or_else(|| format!("profile {name}: missing certFile"))?;
            let key_file = entry
                .key_file
                .ok_or_else(|| format!("profile {name}: missing keyFile"))?;
            let ca_pem = match entry.ca_file {
                Some(ca_file) => Some(std::fs::read_to_string(&ca_file)?),
                None => None,
            };
            CredentialMaterial::ClientCert {
                cert_pem: std::fs::read_to_string(&cert_file)?,
                key_pem: std::fs::read_to_string(&key_file)?,
                ca_pem,
            }
        }
    };
    Ok(material)
}
