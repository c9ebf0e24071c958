use crate::adapters::as3_client::As3Client;
use crate::core::render::DeclarationRenderer;
use crate::domain::model::{ApplicationSpec, Configuration, DeclarationSettings};
use crate::utils::error::{As3Error, Result};
use crate::utils::validation::{validate_non_empty_string, validate_path, validate_range, validate_url, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECONDS: u64 = 60;
const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 5;
const DEFAULT_TASK_TIMEOUT_SECONDS: u64 = 300;

/// The inventory file: device connection, declaration settings and applications.
/// Unknown keys anywhere in the file are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeployConfig {
    pub provider: Option<ProviderConfig>,
    pub declaration: DeclarationConfig,
    #[serde(default)]
    pub applications: Vec<ApplicationSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    pub server: String,
    pub user: String,
    pub password: String,
    pub validate_certs: Option<bool>,
    pub timeout_seconds: Option<u64>,
    pub poll_interval_seconds: Option<u64>,
    pub task_timeout_seconds: Option<u64>,
}

/// The `[declaration]` table: declaration header fields and optional
/// template override paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeclarationConfig {
    pub partition: String,
    pub schema_version: Option<String>,
    pub id: Option<String>,
    pub document_template: Option<String>,
    pub application_template: Option<String>,
}

impl DeclarationConfig {
    pub fn settings(&self) -> DeclarationSettings {
        DeclarationSettings {
            partition: self.partition.clone(),
            schema_version: self.schema_version.clone(),
            id: self.id.clone(),
        }
    }
}

impl DeployConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            As3Error::config(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content)
            .map_err(|e| As3Error::config(format!("TOML parsing error: {}", e)))
    }

    /// 替換環境變數 (例如 ${BIGIP_PASSWORD})；未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| As3Error::config(e.to_string()))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| {
                tracing::warn!("Environment variable {} is not set, leaving it verbatim", var_name);
                format!("${{{}}}", var_name)
            })
        });

        Ok(result.to_string())
    }

    /// Builds the validated variable model.
    pub fn variables(&self) -> Result<Configuration> {
        Configuration::new(&self.declaration.settings(), &self.applications)
    }

    pub fn renderer(&self) -> Result<DeclarationRenderer> {
        let document = self.declaration.document_template.as_deref().map(Path::new);
        let application = self.declaration.application_template.as_deref().map(Path::new);
        DeclarationRenderer::from_paths(document, application)
    }

    pub fn provider(&self) -> Result<&ProviderConfig> {
        self.provider
            .as_ref()
            .ok_or_else(|| As3Error::config("a [provider] section is required to contact the device"))
    }

    pub fn client(&self) -> Result<As3Client> {
        self.provider()?.client()
    }

    pub fn validate_config(&self) -> Result<()> {
        if let Some(provider) = &self.provider {
            provider.validate()?;
        }

        if let Some(path) = &self.declaration.document_template {
            validate_path("declaration.document_template", path)?;
        }
        if let Some(path) = &self.declaration.application_template {
            validate_path("declaration.application_template", path)?;
        }

        self.variables().map(|_| ())
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds.unwrap_or(DEFAULT_POLL_INTERVAL_SECONDS))
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_seconds.unwrap_or(DEFAULT_TASK_TIMEOUT_SECONDS))
    }

    pub fn client(&self) -> Result<As3Client> {
        As3Client::builder(&self.server, &self.user, &self.password)
            .validate_certs(self.validate_certs.unwrap_or(true))
            .request_timeout(self.timeout())
            .poll_interval(self.poll_interval())
            .task_timeout(self.task_timeout())
            .build()
    }
}

impl Validate for ProviderConfig {
    fn validate(&self) -> Result<()> {
        validate_url("provider.server", &self.server)?;
        validate_non_empty_string("provider.user", &self.user)?;
        validate_non_empty_string("provider.password", &self.password)?;

        if let Some(timeout) = self.timeout_seconds {
            validate_range("provider.timeout_seconds", timeout, 1, 3600)?;
        }
        if let Some(interval) = self.poll_interval_seconds {
            validate_range("provider.poll_interval_seconds", interval, 1, 600)?;
        }
        if let Some(timeout) = self.task_timeout_seconds {
            validate_range("provider.task_timeout_seconds", timeout, 1, 86400)?;
        }
        Ok(())
    }
}

impl Validate for DeployConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const PLAYBOOK_VARS: &str = r#"
[provider]
server = "https://10.1.1.245"
user = "admin"
password = "admin"
validate_certs = false

[declaration]
partition = "ColNew"

[[applications]]
name = "web"
vsip = "10.39.2.1"
vsport = 80
memberport = 8080
poolname = "web_pool"
members = ["10.39.2.2", "10.39.2.3", "10.39.2.4"]
"#;

    #[test]
    fn test_parse_playbook_style_inventory() {
        let config = DeployConfig::from_toml_str(PLAYBOOK_VARS).unwrap();

        assert_eq!(config.declaration.partition, "ColNew");
        assert_eq!(config.applications.len(), 1);
        assert_eq!(config.applications[0].virtual_ip, "10.39.2.1");
        assert_eq!(config.applications[0].virtual_port, 80);
        assert_eq!(config.applications[0].pool_name, "web_pool");
        assert!(config.validate().is_ok());

        let provider = config.provider().unwrap();
        assert_eq!(provider.validate_certs, Some(false));
        assert_eq!(provider.poll_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_out_of_range_port_reaches_validation() {
        let content = PLAYBOOK_VARS.replace("vsport = 80", "vsport = 70000");

        let config = DeployConfig::from_toml_str(&content).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, As3Error::ValidationError { ref field, .. } if field == "applications[0].virtual_port"));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("AS3_DEPLOY_TEST_PASSWORD", "s3cr3t");

        let content = PLAYBOOK_VARS.replace(
            "password = \"admin\"",
            "password = \"${AS3_DEPLOY_TEST_PASSWORD}\"",
        );
        let config = DeployConfig::from_toml_str(&content).unwrap();
        assert_eq!(config.provider().unwrap().password, "s3cr3t");

        std::env::remove_var("AS3_DEPLOY_TEST_PASSWORD");
    }

    #[test]
    fn test_unset_env_var_left_verbatim() {
        let content = PLAYBOOK_VARS.replace(
            "user = \"admin\"",
            "user = \"${AS3_DEPLOY_TEST_SURELY_UNSET}\"",
        );
        let config = DeployConfig::from_toml_str(&content).unwrap();
        assert_eq!(config.provider().unwrap().user, "${AS3_DEPLOY_TEST_SURELY_UNSET}");
    }

    #[test]
    fn test_invalid_provider_url() {
        let content = PLAYBOOK_VARS.replace("https://10.1.1.245", "10.1.1.245");
        let config = DeployConfig::from_toml_str(&content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_provider_is_optional_for_rendering() {
        let content = PLAYBOOK_VARS
            .split("[declaration]")
            .nth(1)
            .map(|rest| format!("[declaration]{}", rest))
            .unwrap();
        let config = DeployConfig::from_toml_str(&content).unwrap();

        assert!(config.validate().is_ok());
        assert!(matches!(config.client(), Err(As3Error::ConfigError { .. })));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = DeployConfig::from_toml_str("[declaration\npartition = 1").unwrap_err();
        assert_eq!(err.exit_code(), 1);
        assert!(matches!(err, As3Error::ConfigError { .. }));
    }

    #[test]
    fn test_unknown_keys_are_config_errors() {
        let cases = [
            // 舊的 [templates] 表已不再支援
            format!("{}\n[templates]\ndocument = \"doc.json\"\n", PLAYBOOK_VARS),
            PLAYBOOK_VARS.replace("validate_certs = false", "validate_cert = false"),
            PLAYBOOK_VARS.replace("partition = \"ColNew\"", "partition = \"ColNew\"\ntemplate = \"app.json\""),
            PLAYBOOK_VARS.replace("poolname = \"web_pool\"", "poolname = \"web_pool\"\nmonitor = [\"http\"]"),
            PLAYBOOK_VARS.replace("poolname = \"web_pool\"", "poolname = \"web_pool\"\nservice-class = \"Service_HTTP\""),
        ];

        for content in &cases {
            let err = DeployConfig::from_toml_str(content).unwrap_err();
            assert!(
                matches!(err, As3Error::ConfigError { ref message } if message.contains("unknown field")),
                "expected unknown field error, got {:?}",
                err
            );
        }
    }

    #[test]
    fn test_template_paths_read_from_declaration_table() {
        let content = PLAYBOOK_VARS.replace(
            "partition = \"ColNew\"",
            "partition = \"ColNew\"\ndocument_template = \"doc.json\"\napplication_template = \"app.json\"",
        );
        let config = DeployConfig::from_toml_str(&content).unwrap();

        assert_eq!(config.declaration.document_template.as_deref(), Some("doc.json"));
        assert_eq!(config.declaration.application_template.as_deref(), Some("app.json"));
        assert_eq!(config.declaration.settings().partition, "ColNew");
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(PLAYBOOK_VARS.as_bytes()).unwrap();

        let config = DeployConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.variables().unwrap().partition(), "ColNew");
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = DeployConfig::from_file("/nonexistent/as3-deploy.toml").unwrap_err();
        assert!(matches!(err, As3Error::ConfigError { .. }));
    }
}
