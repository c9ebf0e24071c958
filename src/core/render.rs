use crate::core::template::{Bindings, Template};
use crate::domain::model::{Application, Configuration, Declaration};
use crate::utils::error::{As3Error, Result};
use serde_json::{json, Map, Value};
use std::path::Path;

/// AS3 → ADC → Tenant frame. `{{applications}}` splices the rendered
/// application objects into the tenant.
pub const DEFAULT_DOCUMENT_TEMPLATE: &str = r#"{
  "class": "AS3",
  "action": "deploy",
  "persist": true,
  "declaration": {
    "class": "ADC",
    "schemaVersion": "{{schema_version}}",
    "id": "{{declaration_id}}",
    "{{partition}}": {
      "class": "Tenant",
      "{{applications}}": null
    }
  }
}"#;

/// One AS3 Application holding a virtual server and its pool.
pub const DEFAULT_APPLICATION_TEMPLATE: &str = r#"{
  "{{name}}": {
    "class": "Application",
    "{{service_name}}": {
      "class": "{{service_class}}",
      "virtualAddresses": ["{{virtual_ip}}"],
      "virtualPort": "{{virtual_port}}",
      "pool": "{{pool_name}}"
    },
    "{{pool_name}}": {
      "class": "Pool",
      "loadBalancingMode": "{{load_balancing_mode}}",
      "monitors": "{{monitors}}",
      "members": [
        {
          "servicePort": "{{member_port}}",
          "serverAddresses": "{{members}}",
          "shareNodes": true
        }
      ]
    }
  }
}"#;

/// Turns a validated [`Configuration`] into an AS3 declaration. Pure: no I/O
/// after construction, and the same input always renders the same bytes.
#[derive(Debug, Clone)]
pub struct DeclarationRenderer {
    document: Template,
    application: Template,
}

impl DeclarationRenderer {
    pub fn new(document: Template, application: Template) -> Self {
        Self {
            document,
            application,
        }
    }

    pub fn with_defaults() -> Result<Self> {
        Ok(Self::new(
            Template::parse("built-in document template", DEFAULT_DOCUMENT_TEMPLATE)?,
            Template::parse("built-in application template", DEFAULT_APPLICATION_TEMPLATE)?,
        ))
    }

    /// Built-in templates, each replaced by a file when a path is given.
    pub fn from_paths(document: Option<&Path>, application: Option<&Path>) -> Result<Self> {
        let defaults = Self::with_defaults()?;
        let document = match document {
            Some(path) => Template::from_file(path)?,
            None => defaults.document,
        };
        let application = match application {
            Some(path) => Template::from_file(path)?,
            None => defaults.application,
        };
        Ok(Self::new(document, application))
    }

    pub fn render(&self, config: &Configuration) -> Result<Declaration> {
        let mut applications = Map::new();

        for app in config.applications() {
            let rendered = self
                .application
                .render(&application_bindings(config.partition(), app))?;
            let Value::Object(entries) = rendered else {
                return Err(As3Error::template(
                    self.application.name(),
                    "application template must render to a JSON object",
                ));
            };
            for (key, value) in entries {
                if applications.contains_key(&key) {
                    return Err(As3Error::template(
                        key.clone(),
                        format!("application '{}' renders a key that is already taken", app.name()),
                    ));
                }
                applications.insert(key, value);
            }
        }

        tracing::debug!(
            "Rendered {} application object(s) for partition {}",
            applications.len(),
            config.partition()
        );

        let body = self.document.render(&document_bindings(config, applications))?;
        if !body.is_object() {
            return Err(As3Error::template(
                self.document.name(),
                "document template must render to a JSON object",
            ));
        }

        Ok(Declaration {
            tenant: config.partition().to_string(),
            body,
        })
    }

    pub fn render_to_string(&self, config: &Configuration) -> Result<String> {
        self.render(config)?.to_pretty_json()
    }
}

pub fn application_bindings(partition: &str, app: &Application) -> Bindings {
    let members: Vec<String> = app.members().iter().map(|ip| ip.to_string()).collect();

    let mut bindings = Map::new();
    bindings.insert("partition".into(), json!(partition));
    bindings.insert("name".into(), json!(app.name()));
    bindings.insert("service_name".into(), json!(app.service_name()));
    bindings.insert("service_class".into(), json!(app.service_class().as_str()));
    bindings.insert("virtual_ip".into(), json!(app.virtual_ip().to_string()));
    bindings.insert("virtual_port".into(), json!(app.virtual_port()));
    bindings.insert("member_port".into(), json!(app.member_port()));
    bindings.insert("pool_name".into(), json!(app.pool_name()));
    bindings.insert("members".into(), json!(members));
    bindings.insert("load_balancing_mode".into(), json!(app.load_balancing_mode()));
    bindings.insert("monitors".into(), json!(app.monitors()));
    bindings
}

fn document_bindings(config: &Configuration, applications: Map<String, Value>) -> Bindings {
    let mut bindings = Map::new();
    bindings.insert("partition".into(), json!(config.partition()));
    bindings.insert("schema_version".into(), json!(config.schema_version()));
    bindings.insert("declaration_id".into(), json!(config.declaration_id()));
    bindings.insert("applications".into(), Value::Object(applications));
    bindings
}
