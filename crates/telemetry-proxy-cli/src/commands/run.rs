//! Run command - Call the sample weather service through a proxy.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use serde::Serialize;

use telemetry_proxy::prelude::*;
use telemetry_proxy_registry::ServiceRegistry;

use crate::OutputFormat;
use crate::weather::{Forecast, Weather, WeatherService};

/// Interception engine selection.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum Engine {
    /// One span per call
    #[default]
    Trace,
    /// One log record per call
    Log,
}

impl From<Engine> for EngineKind {
    fn from(engine: Engine) -> Self {
        match engine {
            Engine::Trace => EngineKind::Trace,
            Engine::Log => EngineKind::Log,
        }
    }
}

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Interception engine
    #[arg(short, long, default_value = "trace")]
    pub engine: Engine,

    /// Summary index to look up (0-9 exist)
    #[arg(long, default_value = "3")]
    pub index: usize,

    /// Forecast start temperature in Celsius
    #[arg(long, default_value = "12", allow_hyphen_values = true)]
    pub start: i32,

    /// Number of forecast days
    #[arg(long, default_value = "5")]
    pub days: u8,

    /// Region passed to connect
    #[arg(long, default_value = "eu-west")]
    pub region: String,

    /// Access key passed to connect
    #[arg(long, default_value = "demo-key")]
    pub access_key: String,

    /// Tag secret-looking arguments as "***"
    #[arg(long)]
    pub redact: bool,

    /// Resolve the service from a registry scope
    #[arg(long)]
    pub scoped: bool,
}

/// Everything one run produced.
#[derive(Debug, Serialize)]
struct RunReport {
    engine: String,
    summary: Option<String>,
    error: Option<String>,
    forecast: Vec<Forecast>,
    connected: bool,
    spans: Vec<SpanRecord>,
    records: Vec<LogRecord>,
}

/// Execute the run command.
pub fn execute(
    args: RunArgs,
    options: ProxyOptions,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let redact = options.redact_secrets || args.redact;
    let options = options.with_redact_secrets(redact);

    let source = Arc::new(TraceSource::new("tproxy"));
    let spans = Arc::new(CollectingExporter::default());
    source.add_exporter(Arc::clone(&spans) as Arc<dyn SpanExporter>);
    let sink = Arc::new(CollectingLogSink::default());

    let factory = ProxyFactory::builder(args.engine.into())
        .with_options(options)
        .with_trace_source(source)
        .with_log_sink(Arc::clone(&sink) as Arc<dyn LogSink>)
        .build();

    if !quiet {
        tracing::info!(engine = %factory.kind(), scoped = args.scoped, "Running weather sample");
    }

    let weather: Arc<dyn Weather> = if args.scoped {
        let registry = ServiceRegistry::new(factory.clone());
        registry.register_scoped::<dyn Weather, WeatherService>();
        let weather = registry
            .scope()
            .resolve::<dyn Weather>()
            .context("Failed to resolve weather service")?;
        weather
    } else {
        factory
            .create::<dyn Weather, WeatherService>()
            .context("Failed to create weather proxy")?
    };

    let summary = weather.summary(args.index);
    let forecast = weather.forecast(args.start, args.days);
    let connected = weather.connect(&args.region, &args.access_key);

    let report = RunReport {
        engine: factory.kind().to_string(),
        summary: summary.as_ref().ok().map(|summary| summary.to_string()),
        error: summary.as_ref().err().map(ToString::to_string),
        forecast,
        connected,
        spans: spans.spans(),
        records: sink.records(),
    };

    match format {
        OutputFormat::Human => print_human(&args, &report, quiet),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::JsonCompact => println!("{}", serde_json::to_string(&report)?),
    }

    Ok(())
}

fn print_human(args: &RunArgs, report: &RunReport, quiet: bool) {
    if !quiet {
        println!("Engine: {}", report.engine);
        match (&report.summary, &report.error) {
            (Some(summary), _) => println!("Summary #{}: {}", args.index, summary),
            (None, Some(error)) => println!("Summary #{}: {}", args.index, error),
            (None, None) => {}
        }
        println!("Forecast:");
        for day in &report.forecast {
            println!(
                "  Day {}: {} C / {} F  {}",
                day.day, day.temperature_c, day.temperature_f, day.summary
            );
        }
        println!("Connected: {}", report.connected);
        println!();
    }

    if !report.spans.is_empty() {
        println!("Spans ({}):", report.spans.len());
        for span in &report.spans {
            println!(
                "  {} [{}] {:?}",
                span.name,
                status_text(&span.status),
                span.duration
            );
            for (key, value) in &span.tags {
                println!("    {} = {}", key, value);
            }
        }
    }

    if !report.records.is_empty() {
        println!("Log records ({}):", report.records.len());
        for record in &report.records {
            println!("  [{}] {}: {}", record.level, record.category, record.message());
            if let Some(error) = &record.error {
                println!("  Error: {}", error);
            }
        }
    }
}

fn status_text(status: &SpanStatus) -> String {
    match status {
        SpanStatus::Unset => "unset".to_string(),
        SpanStatus::Ok => "ok".to_string(),
        SpanStatus::Error { kind, message } => format!("{}: {}", kind, message),
    }
}
