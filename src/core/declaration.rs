//! Reads a rendered AS3 declaration back into the objects it configures.

use crate::utils::error::{As3Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::net::{IpAddr, SocketAddr};

/// One virtual server address and the pool it forwards to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceBinding {
    pub tenant: String,
    pub application: String,
    pub service: String,
    pub destination: SocketAddr,
    pub pool_name: String,
    pub members: Vec<SocketAddr>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceObject {
    #[serde(default)]
    virtual_addresses: Vec<String>,
    virtual_port: u16,
    pool: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PoolObject {
    #[serde(default)]
    members: Vec<PoolMemberObject>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PoolMemberObject {
    service_port: u16,
    #[serde(default)]
    server_addresses: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct As3Document {
    adc: Map<String, Value>,
}

impl As3Document {
    /// Accepts either a full AS3 request (`"class": "AS3"`) or a bare ADC declaration.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| As3Error::template("$", format!("declaration is not valid JSON: {}", e)))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let adc = match class_of(&value) {
            Some("AS3") => value.get("declaration").cloned().ok_or_else(|| {
                As3Error::template("$.declaration", "AS3 request has no declaration")
            })?,
            Some("ADC") => value,
            other => {
                return Err(As3Error::template(
                    "$.class",
                    format!("expected AS3 or ADC, found {:?}", other),
                ))
            }
        };

        match adc {
            Value::Object(map) if class_of_map(&map) == Some("ADC") => Ok(Self { adc: map }),
            _ => Err(As3Error::template(
                "$.declaration",
                "declaration is not an ADC object",
            )),
        }
    }

    pub fn schema_version(&self) -> Option<&str> {
        self.adc.get("schemaVersion").and_then(Value::as_str)
    }

    pub fn tenants(&self) -> Vec<&str> {
        objects_of_class(&self.adc, "Tenant")
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Every virtual server in document order, resolved against its pool.
    pub fn service_bindings(&self) -> Result<Vec<ServiceBinding>> {
        let mut bindings = Vec::new();

        for (tenant, tenant_body) in objects_of_class(&self.adc, "Tenant") {
            for (application, app_body) in objects_of_class(tenant_body, "Application") {
                for (service, service_body) in app_body.iter().filter_map(as_object) {
                    if !class_of_map(service_body).is_some_and(|c| c.starts_with("Service_")) {
                        continue;
                    }
                    let path = format!("{}/{}/{}", tenant, application, service);
                    bindings.extend(resolve_service(
                        &path,
                        tenant,
                        application,
                        service,
                        service_body,
                        app_body,
                    )?);
                }
            }
        }

        Ok(bindings)
    }
}

fn resolve_service(
    path: &str,
    tenant: &str,
    application: &str,
    service: &str,
    service_body: &Map<String, Value>,
    app_body: &Map<String, Value>,
) -> Result<Vec<ServiceBinding>> {
    let object: ServiceObject = serde_json::from_value(Value::Object(service_body.clone()))
        .map_err(|e| As3Error::template(path, e.to_string()))?;

    let pool_name = match object.pool {
        // pools may be referenced by full path, e.g. /Tenant/App/pool
        Some(pool) => pool.rsplit('/').next().unwrap_or(&pool).to_string(),
        None => return Ok(Vec::new()),
    };

    let pool_path = format!("{}/{}/{}", tenant, application, pool_name);
    let pool_body = app_body
        .get(&pool_name)
        .filter(|body| class_of(body) == Some("Pool"))
        .ok_or_else(|| As3Error::template(&pool_path, "referenced pool is not declared"))?;
    let pool: PoolObject = serde_json::from_value(pool_body.clone())
        .map_err(|e| As3Error::template(&pool_path, e.to_string()))?;

    let mut members = Vec::new();
    for group in &pool.members {
        for address in &group.server_addresses {
            members.push(SocketAddr::new(parse_ip(&pool_path, address)?, group.service_port));
        }
    }

    object
        .virtual_addresses
        .iter()
        .map(|address| -> Result<ServiceBinding> {
            Ok(ServiceBinding {
                tenant: tenant.to_string(),
                application: application.to_string(),
                service: service.to_string(),
                destination: SocketAddr::new(parse_ip(path, address)?, object.virtual_port),
                pool_name: pool_name.clone(),
                members: members.clone(),
            })
        })
        .collect()
}

fn parse_ip(path: &str, address: &str) -> Result<IpAddr> {
    address
        .parse()
        .map_err(|_| As3Error::template(path, format!("'{}' is not an IP address", address)))
}

fn as_object<'a>((key, value): (&'a String, &'a Value)) -> Option<(&'a String, &'a Map<String, Value>)> {
    value.as_object().map(|map| (key, map))
}

fn objects_of_class<'a>(
    parent: &'a Map<String, Value>,
    class: &'a str,
) -> impl Iterator<Item = (&'a String, &'a Map<String, Value>)> + 'a {
    parent
        .iter()
        .filter_map(as_object)
        .filter(move |(_, body)| class_of_map(body) == Some(class))
}

fn class_of(value: &Value) -> Option<&str> {
    value.get("class").and_then(Value::as_str)
}

fn class_of_map(map: &Map<String, Value>) -> Option<&str> {
    map.get("class").and_then(Value::as_str)
}
