//! Policy 관련 명령어

use std::collections::BTreeMap;

use knl_core::permissions::{Action, Grant, PolicyStore, Resource, Role};
use serde_json::json;

use crate::config::CliConfig;
use crate::OutputFormat;

/// `policy list` 필터
#[derive(Debug, Default)]
pub struct GrantQuery {
    pub role: Option<String>,
    pub action: Option<String>,
    pub resource: Option<String>,
}

/// 파싱된 필터
struct ParsedQuery {
    role: Option<Role>,
    action: Option<Action>,
    resource: Option<Resource>,
}

impl GrantQuery {
    fn parse(&self) -> anyhow::Result<ParsedQuery> {
        let role = self
            .role
            .as_deref()
            .map(|s| Role::from_str(s).ok_or_else(|| anyhow::anyhow!("Unknown role: {}", s)))
            .transpose()?;
        let action = self
            .action
            .as_deref()
            .map(|s| Action::from_str(s).ok_or_else(|| anyhow::anyhow!("Unknown action: {}", s)))
            .transpose()?;
        let resource = self
            .resource
            .as_deref()
            .map(|s| {
                Resource::from_str(s).ok_or_else(|| anyhow::anyhow!("Unknown resource: {}", s))
            })
            .transpose()?;
        Ok(ParsedQuery {
            role,
            action,
            resource,
        })
    }
}

impl ParsedQuery {
    fn matches(&self, grant: &Grant) -> bool {
        self.role.map_or(true, |r| r == grant.role)
            && self.action.map_or(true, |a| a == grant.action)
            && self.resource.map_or(true, |r| r == grant.resource)
    }
}

pub fn validate(config: &CliConfig, format: OutputFormat) -> anyhow::Result<()> {
    let store = config.load_policy()?;
    let counts = grant_counts(&store);

    match format {
        OutputFormat::Json => {
            let out = json!({
                "source": config.policy_source(),
                "valid": true,
                "grants": store.len(),
                "resources": counts,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!("Policy {} is valid ({} grants)", config.policy_source(), store.len());
            for (resource, count) in counts {
                println!("- {}: {} grants", resource, count);
            }
        }
    }

    Ok(())
}

pub fn list(config: &CliConfig, format: OutputFormat, query: GrantQuery) -> anyhow::Result<()> {
    let store = config.load_policy()?;
    let query = query.parse()?;
    let grants: Vec<&Grant> = store.grants().filter(|g| query.matches(g)).collect();

    match format {
        OutputFormat::Json => {
            let out: Vec<_> = grants.iter().map(|g| grant_json(g)).collect();
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            if grants.is_empty() {
                println!("No grants found");
                return Ok(());
            }
            println!(
                "{:<12} {:<8} {:<6} {:<11} FIELDS",
                "RESOURCE", "ACTION", "ROLE", "CONDITION"
            );
            for grant in grants {
                println!(
                    "{:<12} {:<8} {:<6} {:<11} {}",
                    grant.resource.as_str(),
                    grant.action.as_str(),
                    grant.role.as_str(),
                    condition_label(grant),
                    grant.fields
                );
            }
        }
    }

    Ok(())
}

/// 리소스별 grant 수
fn grant_counts(store: &PolicyStore) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for grant in store.grants() {
        *counts.entry(grant.resource.as_str()).or_insert(0) += 1;
    }
    counts
}

fn condition_label(grant: &Grant) -> &'static str {
    grant
        .condition
        .map(|c| c.comparator.as_str())
        .unwrap_or("-")
}

fn grant_json(grant: &Grant) -> serde_json::Value {
    json!({
        "resource": grant.resource.as_str(),
        "action": grant.action.as_str(),
        "role": grant.role.as_str(),
        "condition": grant.condition.map(|c| c.comparator.as_str()),
        "fields": grant.fields.to_declaration(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use knl_core::permissions::GrantRecord;

    #[test]
    fn test_query_filters_grants() {
        let store = PolicyStore::new(vec![
            GrantRecord::new("user", "read", "user").when_owner("EQUALS"),
            GrantRecord::new("admin", "read", "user"),
            GrantRecord::new("admin", "read", "users"),
        ])
        .unwrap();

        let query = GrantQuery {
            role: Some("admin".to_string()),
            ..Default::default()
        }
        .parse()
        .unwrap();
        assert_eq!(store.grants().filter(|g| query.matches(g)).count(), 2);

        let query = GrantQuery {
            resource: Some("user".to_string()),
            ..Default::default()
        }
        .parse()
        .unwrap();
        assert_eq!(store.grants().filter(|g| query.matches(g)).count(), 2);
    }

    #[test]
    fn test_query_rejects_unknown_names() {
        let query = GrantQuery {
            action: Some("execute".to_string()),
            ..Default::default()
        };
        assert!(query.parse().is_err());
    }

    #[test]
    fn test_grant_counts() {
        let store = PolicyStore::new(vec![
            GrantRecord::new("staff", "read", "dog"),
            GrantRecord::new("staff", "delete", "dog"),
            GrantRecord::new("admin", "read", "users"),
        ])
        .unwrap();

        let counts = grant_counts(&store);
        assert_eq!(counts.get("dog"), Some(&2));
        assert_eq!(counts.get("users"), Some(&1));
    }

    #[test]
    fn test_grant_json() {
        let grant = Grant::from_record(
            &GrantRecord::new("user", "update", "messages")
                .when_owner("EQUALS")
                .with_fields(["title", "paragraph"]),
        )
        .unwrap();

        assert_eq!(
            grant_json(&grant),
            json!({
                "resource": "messages",
                "action": "update",
                "role": "user",
                "condition": "EQUALS",
                "fields": ["paragraph", "title"],
            })
        );
        assert_eq!(condition_label(&grant), "EQUALS");
    }
}
