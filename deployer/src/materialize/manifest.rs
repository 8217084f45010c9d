//! Compose manifest port remapping
//!
//! The manifest is parsed, the published side of each managed port binding
//! is rewritten, and the document is serialized back. A binding is managed
//! when it maps one of the stack's container ports from that port's default
//! host port, or from the host port the previous run wrote. Anything else
//! (another service reusing container port 80 under its own host port, say)
//! is left alone.

use serde_yaml::{Mapping, Value};

use crate::config::model::Ports;
use crate::errors::DeployError;

/// One rewritten binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortChange {
    pub service: String,
    pub container_port: u16,
    pub from: u16,
    pub to: u16,
}

/// A published port the deployer manages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub container: u16,
    pub default: u16,
    pub wanted: u16,
    /// Host port written by the previous run, when known
    pub previous: Option<u16>,
}

impl Binding {
    /// Whether `host:container` is a binding this deployer owns
    fn matches(&self, host: u16, container: u16) -> bool {
        container == self.container && (host == self.default || Some(host) == self.previous)
    }
}

/// Managed bindings for the configured ports
///
/// `previous` are the ports recorded by the last run; they let a later run
/// move or revert a binding it wrote itself.
pub fn desired_bindings(ports: &Ports, previous: Option<&Ports>) -> Vec<Binding> {
    let wanted = [ports.http, ports.https, ports.api, ports.frontend];
    let defaults = Ports::default();
    let defaults = [defaults.http, defaults.https, defaults.api, defaults.frontend];
    let previous = previous.map(|p| [p.http, p.https, p.api, p.frontend]);
    (0..wanted.len())
        .map(|i| Binding {
            container: Ports::CONTAINER_PORTS[i],
            default: defaults[i],
            wanted: wanted[i],
            previous: previous.map(|p| p[i]),
        })
        .collect()
}

fn find_binding(bindings: &[Binding], host: u16, container: u16) -> Option<u16> {
    bindings
        .iter()
        .find(|b| b.matches(host, container))
        .map(|b| b.wanted)
        .filter(|wanted| *wanted != host)
}

/// Split a short-syntax binding into `(ip prefix, host, container, protocol
/// suffix)`; `None` when there is no published port or it is a range
fn split_short(binding: &str) -> Option<(Option<&str>, u16, u16, &str)> {
    let (ports, proto) = match binding.split_once('/') {
        Some((ports, _)) => (ports, &binding[ports.len()..]),
        None => (binding, ""),
    };
    let mut parts = ports.rsplitn(3, ':');
    let container = parts.next()?.parse().ok()?;
    let host = parts.next()?.parse().ok()?;
    let ip = parts.next();
    Some((ip, host, container, proto))
}

fn join_short(ip: Option<&str>, host: u16, container: u16, proto: &str) -> String {
    match ip {
        Some(ip) => format!("{}:{}:{}{}", ip, host, container, proto),
        None => format!("{}:{}{}", host, container, proto),
    }
}

fn value_port(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Rewrite one entry of a service's `ports` list; returns `(from, to,
/// container)` when it changed
fn remap_entry(entry: &mut Value, bindings: &[Binding]) -> Option<(u16, u16, u16)> {
    match entry {
        Value::String(binding) => {
            let (ip, host, container, proto) = split_short(binding)?;
            let wanted = find_binding(bindings, host, container)?;
            *binding = join_short(ip, wanted, container, proto);
            Some((host, wanted, container))
        }
        Value::Mapping(mapping) => {
            let container = mapping.get("target").and_then(value_port)?;
            let published = mapping.get_mut("published")?;
            let host = value_port(published)?;
            let wanted = find_binding(bindings, host, container)?;
            // Keep the author's quoting style
            let quoted = matches!(published, Value::String(_));
            *published = if quoted {
                Value::String(wanted.to_string())
            } else {
                Value::Number(wanted.into())
            };
            Some((host, wanted, container))
        }
        _ => None,
    }
}

/// Apply the configured ports to every managed binding; returns what changed
pub fn remap_ports(
    doc: &mut Value,
    ports: &Ports,
    previous: Option<&Ports>,
) -> Result<Vec<PortChange>, DeployError> {
    let services = doc
        .get_mut("services")
        .and_then(Value::as_mapping_mut)
        .ok_or_else(|| DeployError::ManifestError("no services section".to_string()))?;

    let bindings = desired_bindings(ports, previous);
    let mut changes = Vec::new();
    for (name, service) in services.iter_mut() {
        let Some(entries) = service.get_mut("ports").and_then(Value::as_sequence_mut) else {
            continue;
        };
        let service_name = name.as_str().unwrap_or_default().to_string();
        for entry in entries.iter_mut() {
            if let Some((from, to, container_port)) = remap_entry(entry, &bindings) {
                changes.push(PortChange {
                    service: service_name.clone(),
                    container_port,
                    from,
                    to,
                });
            }
        }
    }
    Ok(changes)
}

/// Parse manifest text into a YAML document
pub fn parse_manifest(contents: &str) -> Result<Value, DeployError> {
    let doc: Value = serde_yaml::from_str(contents)?;
    if !matches!(doc, Value::Mapping(_)) {
        return Err(DeployError::ManifestError(
            "top level is not a mapping".to_string(),
        ));
    }
    Ok(doc)
}

pub fn render_manifest(doc: &Value) -> Result<String, DeployError> {
    Ok(serde_yaml::to_string(doc)?)
}

/// Services that publish no ports
pub fn services_without_ports(doc: &Value) -> Vec<String> {
    doc.get("services")
        .and_then(Value::as_mapping)
        .map(Mapping::iter)
        .into_iter()
        .flatten()
        .filter(|(_, service)| service.get("ports").is_none())
        .filter_map(|(name, _)| name.as_str().map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
services:
  postgres:
    image: postgres:17-alpine
    container_name: medicare_postgres
  nginx:
    image: nginx:alpine
    ports:
      - "80:80"
      - "443:443"
  backend:
    build: ./backend
    ports:
      - "127.0.0.1:8000:8000/tcp"
  frontend:
    build: ./frontend
    ports:
      - target: 3000
        published: 3000
        protocol: tcp
"#;

    fn ports(http: u16, https: u16, api: u16, frontend: u16) -> Ports {
        Ports {
            http,
            https,
            api,
            frontend,
        }
    }

    #[test]
    fn test_split_short_forms() {
        assert_eq!(split_short("80:80"), Some((None, 80, 80, "")));
        assert_eq!(
            split_short("127.0.0.1:8000:8000/tcp"),
            Some((Some("127.0.0.1"), 8000, 8000, "/tcp"))
        );
        assert_eq!(split_short("[::1]:443:443"), Some((Some("[::1]"), 443, 443, "")));
        assert_eq!(split_short("3000"), None);
        assert_eq!(split_short("8000-8010:8000-8010"), None);
    }

    #[test]
    fn test_defaults_change_nothing() {
        let mut doc = parse_manifest(MANIFEST).unwrap();
        let before = doc.clone();
        let changes = remap_ports(&mut doc, &Ports::default(), None).unwrap();
        assert!(changes.is_empty());
        assert_eq!(doc, before);
    }

    #[test]
    fn test_remap_all_syntaxes() {
        let mut doc = parse_manifest(MANIFEST).unwrap();
        let changes = remap_ports(&mut doc, &ports(8080, 8443, 9000, 3100), None).unwrap();
        assert_eq!(changes.len(), 4);

        let services = &doc["services"];
        assert_eq!(services["nginx"]["ports"][0], Value::from("8080:80"));
        assert_eq!(services["nginx"]["ports"][1], Value::from("8443:443"));
        assert_eq!(
            services["backend"]["ports"][0],
            Value::from("127.0.0.1:9000:8000/tcp")
        );
        assert_eq!(services["frontend"]["ports"][0]["published"], Value::from(3100));
        assert_eq!(services["frontend"]["ports"][0]["protocol"], Value::from("tcp"));
    }

    #[test]
    fn test_rerun_does_not_compound() {
        let mut doc = parse_manifest(MANIFEST).unwrap();
        let configured = ports(8080, 443, 8000, 3000);
        remap_ports(&mut doc, &configured, None).unwrap();
        let once = render_manifest(&doc).unwrap();

        let mut again = parse_manifest(&once).unwrap();
        let changes = remap_ports(&mut again, &configured, Some(&configured)).unwrap();
        assert!(changes.is_empty());
        assert_eq!(render_manifest(&again).unwrap(), once);
        assert_eq!(again["services"]["nginx"]["ports"][0], Value::from("8080:80"));
    }

    #[test]
    fn test_only_targeted_fields_change() {
        let original = parse_manifest(MANIFEST).unwrap();
        let mut doc = original.clone();
        remap_ports(&mut doc, &ports(8081, 443, 8000, 3000), None).unwrap();

        // Put the one targeted field back and the documents must be equal
        doc["services"]["nginx"]["ports"][0] = Value::from("80:80");
        assert_eq!(doc, original);
    }

    #[test]
    fn test_other_services_on_container_port_untouched() {
        let manifest = r#"
services:
  frontend:
    ports:
      - "3000:80"
  nginx:
    ports:
      - "80:80"
"#;
        let original = parse_manifest(manifest).unwrap();

        let mut doc = original.clone();
        assert!(remap_ports(&mut doc, &Ports::default(), None).unwrap().is_empty());
        assert_eq!(doc, original);

        let changes = remap_ports(&mut doc, &ports(8080, 443, 8000, 3000), None).unwrap();
        assert_eq!(
            changes,
            vec![PortChange {
                service: "nginx".to_string(),
                container_port: 80,
                from: 80,
                to: 8080,
            }]
        );
        assert_eq!(doc["services"]["frontend"]["ports"][0], Value::from("3000:80"));
    }

    #[test]
    fn test_previous_run_binding_moves_and_reverts() {
        let mut doc = parse_manifest(MANIFEST).unwrap();
        let first = ports(8080, 443, 8000, 3000);
        remap_ports(&mut doc, &first, None).unwrap();

        // Without the previous ports the rewritten binding is not ours
        let mut unknown = doc.clone();
        assert!(remap_ports(&mut unknown, &Ports::default(), None).unwrap().is_empty());

        let moved = ports(9090, 443, 8000, 3000);
        let changes = remap_ports(&mut doc, &moved, Some(&first)).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(doc["services"]["nginx"]["ports"][0], Value::from("9090:80"));

        remap_ports(&mut doc, &Ports::default(), Some(&moved)).unwrap();
        assert_eq!(doc, parse_manifest(MANIFEST).unwrap());
    }

    #[test]
    fn test_missing_services_section() {
        let mut doc = parse_manifest("version: '3.8'\n").unwrap();
        assert!(matches!(
            remap_ports(&mut doc, &Ports::default(), None),
            Err(DeployError::ManifestError(_))
        ));
    }

    #[test]
    fn test_services_without_ports() {
        let doc = parse_manifest(MANIFEST).unwrap();
        assert_eq!(services_without_ports(&doc), vec!["postgres".to_string()]);
    }
}
