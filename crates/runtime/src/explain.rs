//! Plan rendering for `--explain`.

use srql_common::models::Value;
use srql_query::{ExecutionPlan, PlanStep};
use std::fmt::Write;

/// Render a plan as an indented step listing with the generated
/// statements and their bound parameters.
pub fn explain_plan(plan: &ExecutionPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "plan: {}", plan.fingerprint);
    for (i, step) in plan.steps.iter().enumerate() {
        let n = i + 1;
        match step {
            PlanStep::TimeSeries(ts) => {
                let _ = writeln!(out, "{n}. timeseries scan: {}", ts.entity);
                let _ = writeln!(out, "   {}", ts.statement.sql);
                for (p, value) in ts.statement.params.iter().enumerate() {
                    let slot = p + 1;
                    if ts.statement.key_slot == Some(p) {
                        let _ = writeln!(out, "   ${slot} = <correlating keys>");
                    } else {
                        let _ = writeln!(out, "   ${slot} = {}", render_param(value));
                    }
                }
                if let Some(field) = &ts.key_field {
                    let _ = writeln!(out, "   produces keys from: {field}");
                }
            }
            PlanStep::Graph(graph) => {
                let _ = writeln!(out, "{n}. graph scan: {}", graph.entity);
                let _ = writeln!(out, "   {}", graph.statement.text);
                for (name, value) in &graph.statement.bind_vars {
                    if graph.key_slot.as_deref() == Some(name.as_str()) {
                        let _ = writeln!(out, "   @{name} = <correlating keys>");
                    } else {
                        let _ = writeln!(out, "   @{name} = {}", render_param(value));
                    }
                }
                if let Some(field) = &graph.key_field {
                    let _ = writeln!(out, "   produces keys from: {field}");
                }
            }
            PlanStep::Merge(merge) => {
                let base = if merge.base_is_first { "first" } else { "second" };
                let _ = writeln!(
                    out,
                    "{n}. merge on {} = {} (base rows: {base} step)",
                    merge.first_key, merge.second_key
                );
                if !merge.order_by.is_empty() {
                    let spec: Vec<String> = merge
                        .order_by
                        .iter()
                        .map(|(col, desc)| {
                            format!("{col} {}", if *desc { "desc" } else { "asc" })
                        })
                        .collect();
                    let _ = writeln!(out, "   order by: {}", spec.join(", "));
                }
                if let Some(limit) = merge.limit {
                    let _ = writeln!(out, "   limit: {limit}");
                }
            }
        }
    }
    out
}

fn render_param(value: &Value) -> String {
    match value {
        Value::Str(s) => format!("'{s}'"),
        Value::StrList(items) => format!("[{}]", items.join(", ")),
        other => other.render(),
    }
}
