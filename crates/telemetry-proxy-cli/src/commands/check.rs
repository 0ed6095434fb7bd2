//! Check command - Report whether a call site would be instrumented.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use telemetry_proxy::prelude::*;
use telemetry_proxy::telemetry_proxy_core::FilterPolicy;

use crate::OutputFormat;

/// Arguments for the check command.
#[derive(Args)]
pub struct CheckArgs {
    /// Declaring namespace, e.g. `app::services`
    #[arg(short, long, default_value = "")]
    pub namespace: String,

    /// Declaring type name, e.g. `WeatherService`
    #[arg(short, long = "type", default_value = "")]
    pub type_name: String,

    /// Treat the member as private
    #[arg(long)]
    pub private: bool,

    /// Parameter names to test against the redaction rule
    #[arg(long = "parameter")]
    pub parameters: Vec<String>,

    /// Print the effective options as TOML
    #[arg(long)]
    pub show_config: bool,
}

/// Check result.
#[derive(Debug, Serialize)]
struct CheckResult {
    namespace: String,
    type_name: String,
    visibility: Visibility,
    instrumented: bool,
    reasons: Vec<String>,
    redacted: Vec<String>,
}

/// Evaluate the filter rules for one site.
fn evaluate(args: &CheckArgs, policy: &FilterPolicy) -> CheckResult {
    let visibility = if args.private {
        Visibility::Private
    } else {
        Visibility::Public
    };

    let mut reasons = Vec::new();
    if policy.is_namespace_ignored(&args.namespace) {
        reasons.push(format!("namespace '{}' is ignored", args.namespace));
    }
    if policy.is_type_ignored(&args.type_name) {
        reasons.push(format!("type '{}' is ignored", args.type_name));
    }
    if policy.is_visibility_ignored(visibility) {
        reasons.push("private members are ignored".to_string());
    }

    let redacted = args
        .parameters
        .iter()
        .filter(|name| policy.options().redacts(name))
        .cloned()
        .collect();

    CheckResult {
        namespace: args.namespace.clone(),
        type_name: args.type_name.clone(),
        visibility,
        instrumented: !policy.is_ignored(&args.namespace, &args.type_name, visibility),
        reasons,
        redacted,
    }
}

/// Execute the check command.
pub fn execute(args: CheckArgs, options: ProxyOptions, format: OutputFormat) -> Result<()> {
    let policy = FilterPolicy::new(Arc::new(options));
    let result = evaluate(&args, &policy);

    match format {
        OutputFormat::Human => {
            if args.show_config {
                println!("{}", policy.options().to_toml_string());
            }
            let site = format!("{}::{}", result.namespace, result.type_name);
            if result.instrumented {
                println!("Instrumented: {} ({:?})", site, result.visibility);
            } else {
                println!("Skipped: {} ({:?})", site, result.visibility);
                for reason in &result.reasons {
                    println!("  - {}", reason);
                }
            }
            if !result.redacted.is_empty() {
                println!("Redacted parameters: {}", result.redacted.join(", "));
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::JsonCompact => {
            println!("{}", serde_json::to_string(&result)?);
        }
    }

    Ok(())
}
