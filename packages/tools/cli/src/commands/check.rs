//! 권한 평가 확인 명령어

use knl_core::permissions::{AccessEvaluator, Action, PolicyStore, Requester, Resource};
use serde_json::{json, Value};

use crate::config::CliConfig;
use crate::OutputFormat;

/// `check` 요청
#[derive(Debug, Default)]
pub struct CheckRequest {
    pub role: String,
    pub id: String,
    pub action: String,
    pub resource: String,
    pub data: Option<String>,
    pub payload: Option<String>,
}

/// 평가 결과
#[derive(Debug, PartialEq)]
struct CheckOutcome {
    granted: bool,
    data: Option<Value>,
    payload: Option<Value>,
}

impl CheckOutcome {
    fn to_json(&self) -> Value {
        json!({
            "granted": self.granted,
            "data": self.data,
            "payload": self.payload,
        })
    }
}

pub fn run(config: &CliConfig, format: OutputFormat, request: CheckRequest) -> anyhow::Result<()> {
    let store = config.load_policy()?;
    let outcome = evaluate(&store, &request)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&outcome.to_json())?);
        }
        OutputFormat::Text => {
            let verdict = if outcome.granted { "granted" } else { "denied" };
            println!(
                "{} on {} as {}#{}: {}",
                request.action, request.resource, request.role, request.id, verdict
            );
            if let Some(data) = &outcome.data {
                println!("visible data: {}", serde_json::to_string_pretty(data)?);
            }
            if let Some(payload) = &outcome.payload {
                println!("accepted payload: {}", serde_json::to_string_pretty(payload)?);
            }
        }
    }

    Ok(())
}

fn evaluate(store: &PolicyStore, request: &CheckRequest) -> anyhow::Result<CheckOutcome> {
    let action = Action::from_str(&request.action)
        .ok_or_else(|| anyhow::anyhow!("Unknown action: {}", request.action))?;
    let resource = Resource::from_str(&request.resource)
        .ok_or_else(|| anyhow::anyhow!("Unknown resource: {}", request.resource))?;
    let data = parse_json("--data", request.data.as_deref())?;
    let payload = parse_json("--payload", request.payload.as_deref())?;

    let requester = Requester::new(request.id.as_str(), request.role.as_str());
    let decision =
        AccessEvaluator::new(store).evaluate(&requester, action, resource, data.as_ref());

    Ok(CheckOutcome {
        granted: decision.granted(),
        data: data.as_ref().and_then(|d| decision.apply(d)),
        payload: payload.as_ref().and_then(|p| decision.apply(p)),
    })
}

fn parse_json(flag: &str, raw: Option<&str>) -> anyhow::Result<Option<Value>> {
    raw.map(|s| {
        serde_json::from_str(s).map_err(|e| anyhow::anyhow!("Invalid JSON for {}: {}", flag, e))
    })
    .transpose()
}
