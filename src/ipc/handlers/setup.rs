use crate::calc::{EngineSettings, MAX_GPA_DECIMALS};
use crate::ipc::helpers::{db, engine_settings, req_str, respond, HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::recompute;
use serde_json::{json, Map, Value};
use tracing::info;

#[derive(Clone, Copy)]
enum SetupSection {
    Engine,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "engine" => Some(Self::Engine),
            _ => None,
        }
    }
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_choice(v: &Value, key: &str, choices: &[&str]) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    choices
        .iter()
        .find(|c| c.eq_ignore_ascii_case(s.trim()))
        .map(|c| c.to_string())
        .ok_or_else(|| format!("{} must be one of: {}", key, choices.join(", ")))
}

fn merge_engine_patch(current: &mut Map<String, Value>, patch: &Map<String, Value>) -> Result<(), String> {
    for (k, v) in patch {
        match k.as_str() {
            "rankPolicy" => {
                let p = parse_choice(v, k, &["sequential", "competition"])?;
                current.insert(k.clone(), Value::String(p));
            }
            "gpaDecimals" => {
                let n = parse_i64_range(v, k, 0, MAX_GPA_DECIMALS as i64)?;
                current.insert(k.clone(), Value::from(n));
            }
            "percentRounding" => {
                let p = parse_choice(v, k, &["none", "nearestWhole"])?;
                current.insert(k.clone(), Value::String(p));
            }
            _ => return Err(format!("unknown engine field: {}", k)),
        }
    }
    Ok(())
}

fn handle_setup_get(state: &mut AppState, _req: &Request) -> HandlerResult {
    let conn = db(state)?;
    let engine = engine_settings(conn)?;
    Ok(json!({ "engine": engine }))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db(state)?;
    let section_raw = req_str(&req.params, "section")?;
    let Some(SetupSection::Engine) = SetupSection::parse(section_raw) else {
        return Err(HandlerErr::bad_params("unknown section")
            .with_details(json!({ "section": section_raw })));
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("patch must be an object"));
    };

    let current = engine_settings(conn)?;
    let mut merged = match serde_json::to_value(current) {
        Ok(Value::Object(m)) => m,
        _ => Map::new(),
    };
    merge_engine_patch(&mut merged, patch).map_err(HandlerErr::bad_params)?;
    let updated: EngineSettings = serde_json::from_value(Value::Object(merged))
        .map_err(|e| HandlerErr::bad_params(e.to_string()))?;
    let refreshed = recompute::update_settings(conn, &current, &updated)
        .map_err(|e| HandlerErr::new("db_update_failed", format!("{e:#}")))?;
    info!(?updated, refreshed, "engine settings updated");
    Ok(json!({ "engine": updated, "gpasRefreshed": refreshed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "setup.get" => handle_setup_get(state, req),
        "setup.update" => handle_setup_update(state, req),
        _ => return None,
    };
    Some(respond(&req.id, res))
}
