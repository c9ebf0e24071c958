use crate::utils::error::{As3Error, Result};
use crate::utils::validation::{
    first_duplicate, validate_identifier, validate_ip, validate_non_empty_string, validate_port,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

pub const DEFAULT_SCHEMA_VERSION: &str = "3.50.0";
pub const DEFAULT_LOAD_BALANCING_MODE: &str = "round-robin";
pub const DEFAULT_MONITOR: &str = "tcp";

/// One application record as written in the inventory file.
///
/// Ports are kept as wide integers so out-of-range values are reported by
/// validation rather than by the TOML parser.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ApplicationSpec {
    pub name: String,
    #[serde(alias = "vsip")]
    pub virtual_ip: String,
    #[serde(alias = "vsport")]
    pub virtual_port: i64,
    #[serde(alias = "memberport")]
    pub member_port: i64,
    #[serde(alias = "poolname")]
    pub pool_name: String,
    #[serde(default)]
    pub members: Vec<String>,
    pub service_class: Option<String>,
    pub load_balancing_mode: Option<String>,
    pub monitors: Option<Vec<String>>,
}

/// Declaration-level settings: partition and the ADC header fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DeclarationSettings {
    pub partition: String,
    pub schema_version: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceClass {
    #[serde(rename = "Service_TCP")]
    Tcp,
    #[serde(rename = "Service_HTTP")]
    Http,
    #[serde(rename = "Service_HTTPS")]
    Https,
    #[serde(rename = "Service_UDP")]
    Udp,
    #[serde(rename = "Service_L4")]
    L4,
}

impl ServiceClass {
    pub const ALL: [ServiceClass; 5] = [
        ServiceClass::Tcp,
        ServiceClass::Http,
        ServiceClass::Https,
        ServiceClass::Udp,
        ServiceClass::L4,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceClass::Tcp => "Service_TCP",
            ServiceClass::Http => "Service_HTTP",
            ServiceClass::Https => "Service_HTTPS",
            ServiceClass::Udp => "Service_UDP",
            ServiceClass::L4 => "Service_L4",
        }
    }
}

impl Default for ServiceClass {
    fn default() -> Self {
        ServiceClass::Tcp
    }
}

impl fmt::Display for ServiceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceClass {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ServiceClass::ALL
            .into_iter()
            .find(|class| class.as_str() == s)
            .ok_or_else(|| {
                let allowed: Vec<&str> = ServiceClass::ALL.iter().map(|c| c.as_str()).collect();
                format!("unknown service class '{}' (allowed: {})", s, allowed.join(", "))
            })
    }
}

/// A validated application: one virtual server fronting one pool.
#[derive(Debug, Clone, PartialEq)]
pub struct Application {
    name: String,
    virtual_ip: IpAddr,
    virtual_port: u16,
    member_port: u16,
    pool_name: String,
    members: Vec<IpAddr>,
    service_class: ServiceClass,
    load_balancing_mode: String,
    monitors: Vec<String>,
}

impl Application {
    /// Validates a single record. `index` is its position in the inventory and
    /// only shows up in error field paths.
    pub fn from_spec(index: usize, spec: &ApplicationSpec) -> Result<Self> {
        let field = |name: &str| format!("applications[{}].{}", index, name);

        validate_identifier(&field("name"), &spec.name)?;
        validate_identifier(&field("pool_name"), &spec.pool_name)?;
        if spec.pool_name == service_key(&spec.name) {
            return Err(As3Error::validation(
                field("pool_name"),
                format!("'{}' collides with the virtual server name", spec.pool_name),
            ));
        }

        let virtual_ip = validate_ip(&field("virtual_ip"), &spec.virtual_ip)?;
        let virtual_port = validate_port(&field("virtual_port"), spec.virtual_port)?;
        let member_port = validate_port(&field("member_port"), spec.member_port)?;

        if spec.members.is_empty() {
            return Err(As3Error::validation(
                field("members"),
                "at least one pool member is required",
            ));
        }
        let members = spec
            .members
            .iter()
            .enumerate()
            .map(|(i, member)| validate_ip(&format!("{}[{}]", field("members"), i), member))
            .collect::<Result<Vec<_>>>()?;
        if let Some(dup) = first_duplicate(&members) {
            return Err(As3Error::validation(
                field("members"),
                format!("member {} is listed more than once", dup),
            ));
        }

        let service_class = match &spec.service_class {
            Some(raw) => raw
                .parse::<ServiceClass>()
                .map_err(|e| As3Error::validation(field("service_class"), e))?,
            None => ServiceClass::default(),
        };

        let load_balancing_mode = match &spec.load_balancing_mode {
            Some(mode) => {
                validate_non_empty_string(&field("load_balancing_mode"), mode)?;
                mode.clone()
            }
            None => DEFAULT_LOAD_BALANCING_MODE.to_string(),
        };

        let monitors = match &spec.monitors {
            Some(monitors) => {
                for (i, monitor) in monitors.iter().enumerate() {
                    validate_non_empty_string(&format!("{}[{}]", field("monitors"), i), monitor)?;
                }
                monitors.clone()
            }
            None => vec![DEFAULT_MONITOR.to_string()],
        };

        Ok(Self {
            name: spec.name.clone(),
            virtual_ip,
            virtual_port,
            member_port,
            pool_name: spec.pool_name.clone(),
            members,
            service_class,
            load_balancing_mode,
            monitors,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn virtual_ip(&self) -> IpAddr {
        self.virtual_ip
    }

    pub fn virtual_port(&self) -> u16 {
        self.virtual_port
    }

    pub fn member_port(&self) -> u16 {
        self.member_port
    }

    pub fn pool_name(&self) -> &str {
        &self.pool_name
    }

    pub fn members(&self) -> &[IpAddr] {
        &self.members
    }

    pub fn service_class(&self) -> ServiceClass {
        self.service_class
    }

    pub fn load_balancing_mode(&self) -> &str {
        &self.load_balancing_mode
    }

    pub fn monitors(&self) -> &[String] {
        &self.monitors
    }

    /// Name of the virtual server object inside the AS3 application.
    pub fn service_name(&self) -> String {
        service_key(&self.name)
    }
}

fn service_key(app_name: &str) -> String {
    format!("{}_vs", app_name)
}

/// The validated variable model for one run. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    partition: String,
    schema_version: String,
    declaration_id: String,
    applications: Vec<Application>,
}

impl Configuration {
    pub fn new(settings: &DeclarationSettings, specs: &[ApplicationSpec]) -> Result<Self> {
        validate_identifier("declaration.partition", &settings.partition)?;

        if specs.is_empty() {
            return Err(As3Error::validation(
                "applications",
                "at least one application is required",
            ));
        }

        let applications = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| Application::from_spec(i, spec))
            .collect::<Result<Vec<_>>>()?;

        if let Some(dup) = first_duplicate(applications.iter().map(|a| &a.name)) {
            return Err(As3Error::validation(
                "applications.name",
                format!("application name '{}' is used more than once", dup),
            ));
        }
        if let Some(dup) = first_duplicate(applications.iter().map(|a| &a.pool_name)) {
            return Err(As3Error::validation(
                "applications.pool_name",
                format!("pool name '{}' is used more than once", dup),
            ));
        }

        let schema_version = match &settings.schema_version {
            Some(version) => {
                validate_non_empty_string("declaration.schema_version", version)?;
                version.clone()
            }
            None => DEFAULT_SCHEMA_VERSION.to_string(),
        };
        let declaration_id = match &settings.id {
            Some(id) => {
                validate_non_empty_string("declaration.id", id)?;
                id.clone()
            }
            None => format!("{}-declaration", settings.partition),
        };

        Ok(Self {
            partition: settings.partition.clone(),
            schema_version,
            declaration_id,
            applications,
        })
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    pub fn declaration_id(&self) -> &str {
        &self.declaration_id
    }

    pub fn applications(&self) -> &[Application] {
        &self.applications
    }
}

/// A rendered AS3 document, ready to hand to a deploy agent.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub tenant: String,
    pub body: serde_json::Value,
}

impl Declaration {
    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.body)?)
    }
}

/// What the device reported back for a submission or removal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeployReport {
    pub tenant: String,
    pub message: String,
    pub task_id: Option<String>,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn web_spec() -> ApplicationSpec {
        ApplicationSpec {
            name: "web".to_string(),
            virtual_ip: "10.39.2.1".to_string(),
            virtual_port: 80,
            member_port: 8080,
            pool_name: "web_pool".to_string(),
            members: vec![
                "10.39.2.2".to_string(),
                "10.39.2.3".to_string(),
                "10.39.2.4".to_string(),
            ],
            service_class: None,
            load_balancing_mode: None,
            monitors: None,
        }
    }

    fn settings() -> DeclarationSettings {
        DeclarationSettings {
            partition: "ColNew".to_string(),
            schema_version: None,
            id: None,
        }
    }

    #[test]
    fn test_valid_configuration_applies_defaults() {
        let config = Configuration::new(&settings(), &[web_spec()]).unwrap();

        assert_eq!(config.partition(), "ColNew");
        assert_eq!(config.schema_version(), DEFAULT_SCHEMA_VERSION);
        assert_eq!(config.declaration_id(), "ColNew-declaration");

        let app = &config.applications()[0];
        assert_eq!(app.virtual_port(), 80);
        assert_eq!(app.member_port(), 8080);
        assert_eq!(app.members().len(), 3);
        assert_eq!(app.service_class(), ServiceClass::Tcp);
        assert_eq!(app.load_balancing_mode(), "round-robin");
        assert_eq!(app.monitors(), ["tcp".to_string()]);
        assert_eq!(app.service_name(), "web_vs");
    }

    #[test]
    fn test_empty_members_rejected() {
        let mut spec = web_spec();
        spec.members.clear();

        let err = Configuration::new(&settings(), &[spec]).unwrap_err();
        assert!(matches!(err, As3Error::ValidationError { ref field, .. } if field == "applications[0].members"));
    }

    #[test]
    fn test_out_of_range_ports_rejected() {
        for bad in [0, 70000] {
            let mut spec = web_spec();
            spec.virtual_port = bad;
            let err = Configuration::new(&settings(), &[spec]).unwrap_err();
            assert!(matches!(err, As3Error::ValidationError { .. }));

            let mut spec = web_spec();
            spec.member_port = bad;
            let err = Configuration::new(&settings(), &[spec]).unwrap_err();
            assert!(matches!(err, As3Error::ValidationError { .. }));
        }
    }

    #[test]
    fn test_duplicate_pool_name_rejected() {
        let mut api = web_spec();
        api.name = "api".to_string();

        let err = Configuration::new(&settings(), &[web_spec(), api]).unwrap_err();
        match err {
            As3Error::ValidationError { field, message } => {
                assert_eq!(field, "applications.pool_name");
                assert!(message.contains("web_pool"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut other = web_spec();
        other.pool_name = "other_pool".to_string();

        let err = Configuration::new(&settings(), &[web_spec(), other]).unwrap_err();
        assert!(matches!(err, As3Error::ValidationError { ref field, .. } if field == "applications.name"));
    }

    #[test]
    fn test_bad_addresses_rejected() {
        let mut spec = web_spec();
        spec.virtual_ip = "10.39.2".to_string();
        assert!(Configuration::new(&settings(), &[spec]).is_err());

        let mut spec = web_spec();
        spec.members.push("not-an-ip".to_string());
        let err = Configuration::new(&settings(), &[spec]).unwrap_err();
        assert!(matches!(err, As3Error::ValidationError { ref field, .. } if field == "applications[0].members[3]"));

        let mut spec = web_spec();
        spec.members.push("10.39.2.2".to_string());
        assert!(Configuration::new(&settings(), &[spec]).is_err());
    }

    #[test]
    fn test_service_class_parsing() {
        let mut spec = web_spec();
        spec.service_class = Some("Service_HTTP".to_string());
        let config = Configuration::new(&settings(), &[spec]).unwrap();
        assert_eq!(config.applications()[0].service_class(), ServiceClass::Http);

        let mut spec = web_spec();
        spec.service_class = Some("Service_FTP".to_string());
        assert!(Configuration::new(&settings(), &[spec]).is_err());
    }

    #[test]
    fn test_empty_inventory_and_bad_partition_rejected() {
        assert!(Configuration::new(&settings(), &[]).is_err());

        let bad = DeclarationSettings {
            partition: "Col New".to_string(),
            schema_version: None,
            id: None,
        };
        assert!(Configuration::new(&bad, &[web_spec()]).is_err());
    }

    #[test]
    fn test_reserved_property_names_rejected() {
        for reserved in ["class", "schemaVersion", "id", "label", "remark"] {
            let bad = DeclarationSettings {
                partition: reserved.to_string(),
                ..settings()
            };
            let err = Configuration::new(&bad, &[web_spec()]).unwrap_err();
            assert!(matches!(err, As3Error::ValidationError { ref field, .. } if field == "declaration.partition"));

            let mut spec = web_spec();
            spec.name = reserved.to_string();
            let err = Configuration::new(&settings(), &[spec]).unwrap_err();
            assert!(matches!(err, As3Error::ValidationError { ref field, .. } if field == "applications[0].name"));

            let mut spec = web_spec();
            spec.pool_name = reserved.to_string();
            let err = Configuration::new(&settings(), &[spec]).unwrap_err();
            assert!(matches!(err, As3Error::ValidationError { ref field, .. } if field == "applications[0].pool_name"));
        }
    }

    #[test]
    fn test_pool_name_cannot_shadow_virtual_server() {
        let mut spec = web_spec();
        spec.pool_name = "web_vs".to_string();
        assert!(Configuration::new(&settings(), &[spec]).is_err());
    }
}
