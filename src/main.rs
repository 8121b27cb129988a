//! CRAM - Climate Resilience Action Matrix
//!
//! A terminal client for the CRAM backend: Barangay Resilience Readiness
//! Scores, hazard layers, weather and mutual-aid support requests for
//! Negros Oriental.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (connection, config, storage, etc.)

mod analysis;
mod api;
mod cli;
mod config;
mod glossary;
mod models;
mod poll;
mod report;
mod support;
#[cfg(test)]
mod testing;
mod weather;

use analysis::{alerts, build_alerts, top_risk, RecordFilter};
use anyhow::{Context, Result};
use api::{ApiClient, HazardLayer, MunicipalityLookup, PageWalk};
use chrono::{DateTime, Local, Utc};
use cli::{Args, Command, OutputFormat, ReportFormat, SupportCommand};
use config::{Config, DEFAULT_CONFIG_FILE};
use futures::join;
use indicatif::{ProgressBar, ProgressStyle};
use models::{Record, RiskLevel, Statistics};
use poll::{PollTask, Snapshot};
use report::{BarangayReport, DashboardReport};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use support::{NewSupportRequest, SupportStore};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use weather::{icon_url, CurrentWeather, WeatherClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if matches!(args.command, Command::InitConfig) {
        return handle_init_config(args.config.as_deref());
    }

    init_logging(&args)?;

    info!("CRAM v{}", env!("CARGO_PKG_VERSION"));
    debug!("Command: {:?}", args.command);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle init-config: generate a default .cram.toml.
fn handle_init_config(target: Option<&Path>) -> Result<()> {
    let path = target.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            path.display()
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("✅ Created {} with default settings.", path.display());
    println!("   Edit it to set the API URL, weather location and polling intervals.");
    println!("   Keep the weather API key in CRAM_WEATHER_API_KEY rather than the file.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) -> Result<()> {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Dispatch one command. Returns the exit code.
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    let quiet = args.quiet;

    match args.command {
        Command::Dashboard { no_ai, format } => run_dashboard(&config, quiet, !no_ai, format).await,
        Command::Barangays {
            risk,
            municipality,
            coastal,
            top,
            format,
        } => {
            let filter = RecordFilter {
                risk: risk.map(RiskLevel::from),
                municipality,
                coastal_only: coastal,
            };
            run_barangays(&config, quiet, &filter, top, format).await
        }
        Command::Barangay { id, ai, format } => run_barangay(&config, id, ai, format).await,
        Command::Municipalities { format } => run_municipalities(&config, quiet, format).await,
        Command::Municipality { id, no_ai, format } => {
            run_municipality(&config, quiet, id, !no_ai, format).await
        }
        Command::AirQuality { ai, format } => run_air_quality(&config, ai, format).await,
        Command::Hazards { layer, format } => run_hazards(&config, layer.into(), format).await,
        Command::Cyclones { format } => run_cyclones(&config, format).await,
        Command::Alerts { dismiss, format } => run_alerts(&config, quiet, &dismiss, format).await,
        Command::Report {
            barangay,
            output,
            format,
            no_ai,
        } => run_report(&config, quiet, barangay, &output, format, !no_ai).await,
        Command::Weather { days, format } => run_weather(&config, days, format).await,
        Command::Watch { weather, interval } => run_watch(&config, weather, interval).await,
        Command::Support { action } => run_support(&config, action).await,
        Command::Glossary { term } => Ok(run_glossary(term.as_deref())),
        Command::InitConfig => handle_init_config(args.config.as_deref()).map(|()| 0),
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

fn api_client(config: &Config) -> Result<ApiClient> {
    ApiClient::new(&config.api.base_url, config.api.timeout_seconds)
}

/// Spinner shown while listings are walked. `None` in quiet mode.
fn spinner(quiet: bool, prefix: &str) -> Option<ProgressBar> {
    if quiet {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    Some(pb)
}

fn finish(pb: Option<ProgressBar>) {
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Truncate to `width` characters for table columns.
fn fit(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}

fn format_unix(timestamp: i64, pattern: &str) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|t| t.with_timezone(&Local).format(pattern).to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// One row of the barangay listing.
#[derive(Debug, Serialize)]
struct BarangayRow<'a> {
    id: Option<i64>,
    name: &'a str,
    municipality: &'a str,
    score: f64,
    risk_level: RiskLevel,
    is_coastal: bool,
}

impl<'a> From<&'a Record> for BarangayRow<'a> {
    fn from(record: &'a Record) -> Self {
        Self {
            id: record.id(),
            name: record.name(),
            municipality: record.municipality(),
            score: record.score(),
            risk_level: record.risk_level(),
            is_coastal: record.is_coastal(),
        }
    }
}

fn print_barangay_table(rows: &[BarangayRow<'_>]) {
    println!(
        "   {:<6} {:<28} {:<24} {:>6}  Risk",
        "ID", "Barangay", "Municipality", "Score"
    );
    for row in rows {
        println!(
            "   {:<6} {:<28} {:<24} {:>6.1}  {} {}{}",
            row.id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string()),
            fit(row.name, 28),
            fit(row.municipality, 24),
            row.score,
            row.risk_level.emoji(),
            row.risk_level,
            if row.is_coastal { " 🌊" } else { "" }
        );
    }
}

fn warn_if_partial(walk: &PageWalk, what: &str) {
    if !walk.is_complete() {
        println!(
            "   ⚠️  Only {} {} loaded from {} page(s) ({}); results are partial.",
            walk.records.len(),
            what,
            walk.pages_fetched,
            walk.end
        );
    }
}

async fn run_dashboard(
    config: &Config,
    quiet: bool,
    with_ai: bool,
    format: OutputFormat,
) -> Result<i32> {
    let client = api_client(config)?;
    let chatty = format == OutputFormat::Table;

    if chatty {
        println!("📡 Loading dashboard from {}", client.base_url());
    }
    let pb = spinner(quiet || !chatty, "Loading barangays");
    let overview = client.overview(with_ai, pb.as_ref()).await;
    finish(pb);

    let support = match SupportStore::open(&config.support.storage_path) {
        Ok(store) => Some(store.summary()),
        Err(e) => {
            warn!("Support requests unavailable: {}", e);
            None
        }
    };

    let report = DashboardReport::build(&overview, support, client.base_url(), Utc::now());

    if format == OutputFormat::Json {
        print_json(&report)?;
        return Ok(0);
    }

    println!("\n📊 Regional Overview:");
    match report.statistics {
        Some(ref stats) => print_statistics(stats),
        None => println!("   Statistics unavailable."),
    }
    println!(
        "   Loaded: {} barangays{}",
        report.barangays_loaded,
        if report.complete { "" } else { " (incomplete)" }
    );

    println!("\n🎯 Risk Distribution:");
    let line: Vec<String> = RiskLevel::all()
        .into_iter()
        .map(|level| {
            format!(
                "{} {}: {}",
                level.emoji(),
                level,
                report.distribution.get(level)
            )
        })
        .collect();
    println!("   {}", line.join(" | "));
    println!(
        "   🌊 Coastal: {} | ⛰️  Inland: {}",
        report.coastal.coastal, report.coastal.inland
    );

    if !report.top_risk.is_empty() {
        println!("\n🔥 Highest Risk:");
        for (i, entry) in report.top_risk.iter().enumerate() {
            println!(
                "   {}. {} {} ({}) - {:.1}",
                i + 1,
                entry.risk_level.emoji(),
                entry.name,
                entry.municipality,
                entry.score
            );
        }
    }

    if !report.air_quality.is_empty() {
        println!("\n🌫️  Air Quality:");
        for reading in &report.air_quality {
            println!(
                "   {} - AQI {:.1} ({})",
                reading.municipality(),
                reading.avg_aqi,
                reading.aqi_label()
            );
        }
        println!("   Run `cram air-quality` for every municipality.");
    }
    if let Some(ref text) = report.air_quality_analysis {
        println!("\n🤖 AI Analysis:\n{}", text.trim());
    }

    println!("\n🚨 Alerts: {}", report.alerts.len());
    if let Some(ref support) = report.support {
        println!(
            "🤝 Support requests: {} active ({} critical), {} resolved",
            support.active, support.critical_active, support.resolved
        );
    }

    Ok(0)
}

fn print_statistics(stats: &Statistics) {
    println!(
        "   Barangays: {} | Municipalities: {} | Coastal: {}",
        stats.total_barangays, stats.total_municipalities, stats.coastal_barangays
    );
    let resilience = &stats.resilience_stats;
    if let Some(avg) = resilience.avg_score {
        println!("   Average BRRS: {:.1}", avg);
    }
    println!(
        "   Reported: 🔴 High {} | 🟡 Medium {} | 🟢 Low {}",
        resilience.high_risk, resilience.medium_risk, resilience.low_risk
    );
}

async fn run_barangays(
    config: &Config,
    quiet: bool,
    filter: &RecordFilter,
    top: Option<usize>,
    format: OutputFormat,
) -> Result<i32> {
    let client = api_client(config)?;
    let pb = spinner(quiet || format == OutputFormat::Json, "Loading barangays");
    let walk = client.barangays(pb.as_ref()).await;
    finish(pb);

    let mut selected = filter.apply(&walk.records);
    if let Some(n) = top {
        selected = top_risk(selected, n);
    }
    let rows: Vec<BarangayRow<'_>> = selected.into_iter().map(BarangayRow::from).collect();

    if format == OutputFormat::Json {
        print_json(&rows)?;
        return Ok(0);
    }

    println!("🏘️  Barangays ({} of {})\n", rows.len(), walk.records.len());
    warn_if_partial(&walk, "barangays");
    if rows.is_empty() {
        println!("   No barangays match the filter.");
    } else {
        print_barangay_table(&rows);
    }

    Ok(0)
}

async fn run_barangay(config: &Config, id: i64, with_ai: bool, format: OutputFormat) -> Result<i32> {
    let client = api_client(config)?;

    let record = client
        .barangay(id)
        .await
        .with_context(|| format!("Failed to load barangay {}", id))?;

    let narrative = if with_ai {
        match client.barangay_ai_analysis(id).await {
            Ok(narrative) => Some(narrative),
            Err(e) => {
                warn!("AI analysis failed: {}", e);
                None
            }
        }
    } else {
        None
    };

    let report = BarangayReport::from_record(&record, narrative.as_ref(), client.base_url(), Utc::now());

    if format == OutputFormat::Json {
        print_json(&report)?;
        return Ok(0);
    }

    let profile = &report.barangay;
    let scores = &report.scores;
    println!("🏘️  {} ({}, {})", profile.name, profile.municipality, profile.province);
    if let Some(population) = profile.population {
        println!("   Population: {}", population);
    }
    println!("   Coastal: {}", if profile.is_coastal { "Yes 🌊" } else { "No" });
    println!(
        "\n📈 BRRS: {:.1} - {} {} Risk",
        scores.overall_score,
        scores.risk_level.emoji(),
        scores.risk_level
    );
    for (label, value) in [
        ("Hazard exposure", scores.hazard_exposure_score),
        ("Health sensitivity", scores.health_sensitivity_score),
        ("Adaptive capacity", scores.adaptive_capacity_score),
    ] {
        if let Some(value) = value {
            println!("   {}: {:.1}", label, value);
        }
    }

    if !report.hazards.is_empty() {
        println!("\n⚠️  Hazards:");
        for hazard in &report.hazards {
            println!(
                "   - {}: {}",
                hazard.hazard_type.replace('_', " "),
                hazard.susceptibility
            );
        }
    }

    if let Some(ref text) = report.analysis {
        println!("\n🤖 AI Analysis:\n{}", text.trim());
    }

    Ok(0)
}

async fn run_municipalities(config: &Config, quiet: bool, format: OutputFormat) -> Result<i32> {
    let client = api_client(config)?;
    let pb = spinner(quiet || format == OutputFormat::Json, "Loading municipalities");
    let walk = client.municipalities(pb.as_ref()).await;
    finish(pb);

    if format == OutputFormat::Json {
        let attributes: Vec<_> = walk.records.iter().map(|r| &r.attributes).collect();
        print_json(&attributes)?;
        return Ok(0);
    }

    println!("🏛️  Municipalities ({})\n", walk.records.len());
    warn_if_partial(&walk, "municipalities");
    for record in &walk.records {
        let population = record
            .population()
            .map(|p| format!("pop. {}", p))
            .unwrap_or_default();
        println!(
            "   {:<6} {:<28} {}",
            record.id().map(|id| id.to_string()).unwrap_or_else(|| "-".to_string()),
            fit(record.name(), 28),
            population
        );
    }

    Ok(0)
}

async fn run_municipality(
    config: &Config,
    quiet: bool,
    id: i64,
    with_report: bool,
    format: OutputFormat,
) -> Result<i32> {
    let client = api_client(config)?;
    let pb = spinner(quiet || format == OutputFormat::Json, "Loading municipalities");
    let lookup = client.municipality_detail(id, with_report, pb.as_ref()).await;
    finish(pb);

    let detail = match lookup {
        MunicipalityLookup::Found(detail) => detail,
        MunicipalityLookup::Missing(walk) => {
            eprintln!("❌ Municipality {} not found.", id);
            warn_if_partial(&walk, "municipalities");
            return Ok(1);
        }
    };

    if format == OutputFormat::Json {
        print_json(&detail)?;
        return Ok(0);
    }

    let municipality = &detail.municipality;
    let text = |key: &str| municipality.get(key).and_then(|v| v.as_str()).map(str::to_string);
    let number = |key: &str| municipality.get(key).and_then(|v| v.as_f64());

    println!(
        "🏛️  {} ({})",
        municipality.name(),
        municipality.province().unwrap_or("Negros Oriental")
    );
    if let Some(classification) = text("classification") {
        println!("   Classification: {}", classification);
    }
    println!(
        "   Barangays: {}",
        number("barangay_count").map(|n| n as u64).unwrap_or(0)
    );
    if let Some(population) = municipality.population() {
        println!("   Population: {}", population);
    }
    if let Some(area) = number("land_area") {
        println!("   Land area: {} km²", area);
    }

    if !with_report {
        return Ok(0);
    }

    println!("\n🤖 AI Strategic Report:");
    match detail.report.as_ref() {
        Some(report) => {
            match report.text() {
                Some(text) => println!("{}", text.trim()),
                None => println!("   The report response carried no text."),
            }
            if let Some(data) = report.0.get("data") {
                let count = |key: &str| data.get(key).and_then(|v| v.as_u64()).unwrap_or(0);
                let avg = data
                    .get("avg_brrs")
                    .and_then(|v| v.as_f64())
                    .map(|v| format!("{:.1}", v))
                    .unwrap_or_else(|| "N/A".to_string());
                println!(
                    "\n   Avg BRRS: {} | High risk: {} | Medium risk: {} | Coastal: {}",
                    avg,
                    count("high_risk_count"),
                    count("medium_risk_count"),
                    count("coastal_count")
                );
            }
            if let Some(at) = report.generated_at() {
                println!("\n   Generated {}", at);
            }
        }
        None => println!("   ⚠️  AI report unavailable right now."),
    }

    Ok(0)
}

async fn run_air_quality(config: &Config, with_ai: bool, format: OutputFormat) -> Result<i32> {
    let client = api_client(config)?;
    let view = client
        .air_quality_view(with_ai)
        .await
        .context("Failed to load air quality")?;

    if format == OutputFormat::Json {
        print_json(&view)?;
        return Ok(0);
    }

    println!("🌫️  Air Quality ({} municipalities)\n", view.readings.len());
    if view.readings.is_empty() {
        println!("   No readings available.");
    } else {
        println!(
            "   {:<24} {:>4}  {:<10} {:>6} {:>6} {:>6} {:>6}  Period",
            "Municipality", "AQI", "Level", "PM2.5", "PM10", "O3", "NO2"
        );
        let cell = |value: Option<f64>| {
            value
                .map(|v| format!("{:.1}", v))
                .unwrap_or_else(|| "-".to_string())
        };
        for reading in &view.readings {
            println!(
                "   {:<24} {:>4.1}  {:<10} {:>6} {:>6} {:>6} {:>6}  {}-{:02}",
                fit(reading.municipality(), 24),
                reading.avg_aqi,
                reading.aqi_label(),
                cell(reading.avg_pm25),
                cell(reading.avg_pm10),
                cell(reading.avg_o3),
                cell(reading.avg_no2),
                reading.year,
                reading.month
            );
        }
    }

    if with_ai {
        match view.analysis.as_ref().and_then(|n| n.text()) {
            Some(text) => println!("\n🤖 AI Analysis:\n{}", text.trim()),
            None => println!("\n   ⚠️  AI analysis unavailable right now."),
        }
    }

    Ok(0)
}

async fn run_hazards(config: &Config, layer: HazardLayer, format: OutputFormat) -> Result<i32> {
    let client = api_client(config)?;
    let records = client.hazard_layer(layer).await;

    if format == OutputFormat::Json {
        print_json(&records)?;
        return Ok(0);
    }

    println!("🌀 {} layer: {} feature(s)", layer, records.len());
    let mut by_level: std::collections::BTreeMap<String, usize> = Default::default();
    for record in &records {
        let level = record
            .get("susceptibility")
            .and_then(|v| v.as_str())
            .unwrap_or("Unspecified")
            .to_string();
        *by_level.entry(level).or_default() += 1;
    }
    for (level, count) in by_level {
        println!("   {}: {}", level, count);
    }

    Ok(0)
}

async fn run_cyclones(config: &Config, format: OutputFormat) -> Result<i32> {
    let client = api_client(config)?;
    let tracks = client
        .cyclone_tracks()
        .await
        .context("Failed to load cyclone tracks")?;

    if format == OutputFormat::Json {
        print_json(&tracks)?;
        return Ok(0);
    }

    println!("🌀 Cyclone tracks affecting Negros: {}", tracks.len());
    for track in &tracks {
        let year = track
            .get("year")
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("   {} ({})", track.name(), year);
    }

    Ok(0)
}

async fn run_alerts(
    config: &Config,
    quiet: bool,
    dismissed: &[String],
    format: OutputFormat,
) -> Result<i32> {
    let client = api_client(config)?;
    let pb = spinner(quiet || format == OutputFormat::Json, "Loading barangays");
    let walk = client.barangays(pb.as_ref()).await;
    finish(pb);

    let mut active = build_alerts(&walk.records, Utc::now());
    for id in dismissed {
        if !alerts::dismiss(&mut active, id) {
            warn!("No alert with id {}", id);
        }
    }

    if format == OutputFormat::Json {
        print_json(&active)?;
        return Ok(0);
    }

    warn_if_partial(&walk, "barangays");
    if active.is_empty() {
        println!("✅ No active risk alerts.");
        return Ok(0);
    }

    println!("🚨 {} alert(s):\n", active.len());
    for alert in &active {
        println!("   {} [{}] {}", alert.kind.emoji(), alert.id, alert.title);
        println!("      {}", alert.message);
    }

    Ok(0)
}

async fn run_report(
    config: &Config,
    quiet: bool,
    barangay: Option<i64>,
    output: &Path,
    format: ReportFormat,
    with_ai: bool,
) -> Result<i32> {
    let client = api_client(config)?;
    let now = Utc::now();

    let content = match barangay {
        Some(id) => {
            println!("📝 Building report for barangay {}...", id);
            let record = client
                .barangay(id)
                .await
                .with_context(|| format!("Failed to load barangay {}", id))?;
            let narrative = if with_ai {
                client
                    .barangay_ai_analysis(id)
                    .await
                    .map_err(|e| warn!("AI analysis failed: {}", e))
                    .ok()
            } else {
                None
            };
            let report =
                BarangayReport::from_record(&record, narrative.as_ref(), client.base_url(), now);
            match format {
                ReportFormat::Json => report::generate_json_report(&report)?,
                ReportFormat::Markdown => report::generate_barangay_markdown(&report),
            }
        }
        None => {
            println!("📝 Building regional dashboard report...");
            let pb = spinner(quiet, "Loading barangays");
            let overview = client.overview(with_ai, pb.as_ref()).await;
            finish(pb);

            let support = SupportStore::open(&config.support.storage_path)
                .map(|store| store.summary())
                .map_err(|e| warn!("Support requests unavailable: {}", e))
                .ok();
            let report = DashboardReport::build(&overview, support, client.base_url(), now);
            match format {
                ReportFormat::Json => report::generate_json_report(&report)?,
                ReportFormat::Markdown => report::generate_dashboard_markdown(&report),
            }
        }
    };

    report::write_report(&content, output)?;
    println!("\n✅ Report saved to: {}", output.display());
    Ok(0)
}

async fn run_weather(config: &Config, days: usize, format: OutputFormat) -> Result<i32> {
    let client = WeatherClient::new(&config.weather, config.api.timeout_seconds)?;

    let (current, forecast, weather_alerts) =
        join!(client.current(), client.forecast(), client.alerts());
    let current = current.context("Failed to load current weather")?;
    let forecast = forecast
        .map_err(|e| warn!("Forecast unavailable: {}", e))
        .ok();
    let daily = forecast.as_ref().map(|f| f.daily(days)).unwrap_or_default();

    if format == OutputFormat::Json {
        print_json(&serde_json::json!({
            "current": current,
            "daily": daily,
            "alerts": weather_alerts,
        }))?;
        return Ok(0);
    }

    print_current_weather(&current);

    if !daily.is_empty() {
        println!("\n📅 Forecast:");
        for entry in &daily {
            let description = entry
                .weather
                .first()
                .map(|c| c.description.as_str())
                .unwrap_or("-");
            let rain = entry
                .pop
                .map(|p| format!(" | 🌧️  {:.0}%", p * 100.0))
                .unwrap_or_default();
            println!(
                "   {}  {:>5.1}°  {}{}",
                format_unix(entry.dt, "%a %d %b"),
                entry.main.temp,
                description,
                rain
            );
        }
    }

    if weather_alerts.is_empty() {
        println!("\n✅ No active weather alerts.");
    } else {
        println!("\n⛈️  Weather alerts:");
        for alert in &weather_alerts {
            println!(
                "   {} ({}) {} to {}",
                alert.event,
                alert.sender_name,
                format_unix(alert.start, "%d %b %H:%M"),
                format_unix(alert.end, "%d %b %H:%M")
            );
        }
    }

    Ok(0)
}

fn print_current_weather(current: &CurrentWeather) {
    let place = if current.name.is_empty() {
        "region centre"
    } else {
        current.name.as_str()
    };
    println!("🌤️  Weather for {}", place);
    if let Some(condition) = current.condition() {
        println!(
            "   {} ({})",
            condition.description,
            icon_url(&condition.icon)
        );
    }
    println!(
        "   🌡️  {:.1}° (feels like {:.1}°) | 💧 {:.0}% | 🌬️  {:.1} | {:.0} hPa",
        current.main.temp,
        current.main.feels_like,
        current.main.humidity,
        current.wind.speed,
        current.main.pressure
    );
}

async fn run_watch(config: &Config, with_weather: bool, interval: Option<u64>) -> Result<i32> {
    let client = api_client(config)?;
    let period = Duration::from_secs(interval.unwrap_or(config.polling.statistics_interval_seconds));

    let stats_client = client.clone();
    let mut statistics = PollTask::spawn("statistics", period, move || {
        let client = stats_client.clone();
        async move { client.statistics().await }
    });

    let mut weather = if with_weather {
        let weather_client = WeatherClient::new(&config.weather, config.api.timeout_seconds)?;
        Some(PollTask::spawn(
            "weather",
            Duration::from_secs(config.polling.weather_interval_seconds),
            move || {
                let client = weather_client.clone();
                async move { client.current().await }
            },
        ))
    } else {
        None
    };
    let mut weather_live = weather.is_some();

    println!(
        "👀 Watching {} every {}s. Press Ctrl-C to stop.\n",
        client.base_url(),
        period.as_secs()
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                println!(
                    "\n👋 Stopped watching. Last statistics update: {}",
                    clock(statistics.snapshot().last_update)
                );
                break;
            }
            update = statistics.next_update() => match update {
                Some(snapshot) => print_statistics_snapshot(&snapshot),
                None => {
                    warn!("{} polling stopped", statistics.name());
                    break;
                }
            },
            update = next_update(&mut weather), if weather_live => match update {
                Some(snapshot) => print_weather_snapshot(&snapshot),
                None => weather_live = false,
            },
        }
    }

    statistics.cancel();
    Ok(0)
}

/// Next update of an optional task; never resolves when there is none.
async fn next_update<T>(task: &mut Option<PollTask<T>>) -> Option<Snapshot<T>>
where
    T: Clone + Send + Sync + 'static,
{
    match task {
        Some(task) => task.next_update().await,
        None => std::future::pending().await,
    }
}

fn clock(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}

fn print_statistics_snapshot(snapshot: &Snapshot<Statistics>) {
    if let Some(ref e) = snapshot.error {
        println!(
            "[{}] ⚠️  statistics refresh failed: {}",
            Local::now().format("%H:%M:%S"),
            e
        );
        if snapshot.data.is_some() {
            println!("           showing data from {}", clock(snapshot.last_update));
        }
        return;
    }

    if let Some(ref stats) = snapshot.data {
        let resilience = &stats.resilience_stats;
        println!(
            "[{}] 📊 {} barangays | 🔴 {} 🟡 {} 🟢 {} | avg BRRS {}",
            clock(snapshot.last_update),
            stats.total_barangays,
            resilience.high_risk,
            resilience.medium_risk,
            resilience.low_risk,
            resilience
                .avg_score
                .map(|s| format!("{:.1}", s))
                .unwrap_or_else(|| "N/A".to_string())
        );
    }
}

fn print_weather_snapshot(snapshot: &Snapshot<CurrentWeather>) {
    match (&snapshot.data, &snapshot.error) {
        (_, Some(e)) => println!(
            "[{}] ⚠️  weather refresh failed: {}",
            Local::now().format("%H:%M:%S"),
            e
        ),
        (Some(current), None) => println!(
            "[{}] 🌤️  {:.1}° {} | 💧 {:.0}%",
            clock(snapshot.last_update),
            current.main.temp,
            current
                .condition()
                .map(|c| c.description.as_str())
                .unwrap_or(""),
            current.main.humidity
        ),
        (None, None) => {}
    }
}

fn run_glossary(term: Option<&str>) -> i32 {
    match term {
        Some(query) => match glossary::lookup(query) {
            Some(entry) => {
                println!("📖 {}\n\n{}", entry.title, entry.content);
                0
            }
            None => {
                eprintln!("❌ Unknown term '{}'. Run `cram glossary` for the list.", query);
                1
            }
        },
        None => {
            println!("📖 Glossary\n");
            for entry in glossary::TERMS {
                println!("   {:<20} {}", entry.key, entry.title);
            }
            0
        }
    }
}

async fn run_support(config: &Config, action: SupportCommand) -> Result<i32> {
    let storage_path: &PathBuf = &config.support.storage_path;
    let mut store = SupportStore::open(storage_path).with_context(|| {
        format!(
            "Failed to open support storage at {}",
            storage_path.display()
        )
    })?;

    match action {
        SupportCommand::List { status, format } => {
            let requests: Vec<_> = match status {
                Some(status) => store.list_by_status(status),
                None => store.list().iter().collect(),
            };

            if format == OutputFormat::Json {
                print_json(&requests)?;
                return Ok(0);
            }

            if requests.is_empty() {
                println!("🤝 No support requests.");
                return Ok(0);
            }

            println!("🤝 Support requests ({}):\n", requests.len());
            for request in &requests {
                println!(
                    "   {} #{} [{}] {} {} x {} for {} ({})",
                    request.urgency.emoji(),
                    request.id,
                    request.status,
                    request.resource_type.emoji(),
                    request.resource_type,
                    request.quantity,
                    request.barangay_name,
                    request.municipality
                );
                println!("      {}", request.description);
                println!(
                    "      Contact: {} {}{} | {}",
                    request.contact_person,
                    request.contact_number,
                    request
                        .contact_email
                        .as_ref()
                        .map(|e| format!(" {}", e))
                        .unwrap_or_default(),
                    request
                        .timestamp
                        .with_timezone(&Local)
                        .format("%Y-%m-%d %H:%M")
                );
            }

            let summary = store.summary();
            println!(
                "\n   Active: {} ({} critical) | Resolved: {}",
                summary.active, summary.critical_active, summary.resolved
            );
            println!("   Stored in {}", store.storage_path().display());
        }
        SupportCommand::Create {
            barangay,
            resource,
            quantity,
            urgency,
            description,
            contact_person,
            contact_number,
            contact_email,
        } => {
            let client = api_client(config)?;
            let known = match client.barangay(barangay).await {
                Ok(record) => vec![record],
                Err(e) => {
                    warn!("Could not look up barangay {}: {}", barangay, e);
                    Vec::new()
                }
            };

            let request = store
                .create(
                    NewSupportRequest {
                        barangay_id: barangay,
                        resource_type: resource,
                        quantity,
                        urgency,
                        description,
                        contact_person,
                        contact_number,
                        contact_email,
                    },
                    &known,
                    Utc::now(),
                )
                .context("Failed to create support request")?;

            println!(
                "✅ Created support request #{} ({} {}) for {}",
                request.id,
                request.urgency.emoji(),
                request.urgency,
                request.barangay_name
            );
        }
        SupportCommand::Resolve { id } => {
            let request = store
                .resolve(id)
                .with_context(|| format!("Failed to resolve support request {}", id))?;
            println!(
                "✅ Resolved support request #{} for {}",
                request.id, request.barangay_name
            );
        }
    }

    Ok(0)
}
