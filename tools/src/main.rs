//! churn-runner: headless runner for the churn prediction engine.
//!
//! Usage:
//!   churn-runner --data-dir ./data --population data/population/customers.csv --db churn.db
//!   churn-runner --data-dir ./data --synthetic 2000 --seed 42
//!   churn-runner --data-dir ./data --ipc-mode

use anyhow::Result;
use churnguard_core::{
    analyzer::{AggregateStats, Analysis},
    config::ChurnConfig,
    customer::RawCustomerRecord,
    error::ChurnError,
    model::{ModelBundle, ModelInfo},
    population::Population,
    service::{AnalyticsService, PredictionService},
    store::ChurnStore,
    synthetic::SyntheticPopulation,
};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Predict {
        record: RawCustomerRecord,
        #[serde(default)]
        customer_id: Option<String>,
    },
    Stats,
    Analysis,
    ModelInfo,
    History {
        #[serde(default = "default_history_limit")]
        limit: usize,
    },
    Quit,
}

fn default_history_limit() -> usize {
    20
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let synthetic = parse_arg(&args, "--synthetic", 0usize);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = string_arg(&args, "--db").unwrap_or(":memory:");
    let data_dir = string_arg(&args, "--data-dir").unwrap_or("./data");
    let default_population = format!("{data_dir}/population/customers.csv");
    let population_path = string_arg(&args, "--population").unwrap_or(&default_population);

    if !ipc_mode {
        println!("ChurnGuard: churn-runner");
        println!("  data_dir:   {data_dir}");
        if synthetic > 0 {
            println!("  population: synthetic {synthetic} (seed {seed})");
        } else {
            println!("  population: {population_path}");
        }
        println!("  db:         {db}");
        println!("  started:    {}", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC"));
        println!();
    }

    // Bundle and config failures are fatal: no service starts without them.
    let bundle = Arc::new(ModelBundle::load(data_dir)?);
    let config = ChurnConfig::load(data_dir)?;

    let store = if db == ":memory:" { ChurnStore::in_memory()? } else { ChurnStore::open(db)? };
    store.migrate()?;

    let loaded = if synthetic > 0 {
        SyntheticPopulation::generate(synthetic, seed, &bundle)?
    } else {
        Population::from_csv_path(Path::new(population_path))?
    };
    store.replace_population(&loaded)?;
    let population = Arc::new(store.load_population()?);

    let predictor = PredictionService::new(Arc::clone(&bundle), config.clone());
    let mut analytics = AnalyticsService::new(Arc::clone(&bundle), config, population);

    if ipc_mode {
        run_ipc_loop(&predictor, &mut analytics, &store)?;
    } else {
        let stats = analytics.get_aggregate_stats()?;
        let analysis = analytics.get_analysis()?;
        print_summary(&stats, &analysis, &analytics.get_model_info());
    }

    Ok(())
}

fn run_ipc_loop(
    predictor: &PredictionService,
    analytics: &mut AnalyticsService,
    store: &ChurnStore,
) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        match handle_line(&buffer, predictor, analytics, store) {
            Some(line) => {
                writeln!(stdout, "{}", line)?;
                stdout.flush()?;
            }
            None => break,
        }
    }
    Ok(())
}

/// One request line in, one response value out. `None` means quit.
fn handle_line(
    line: &str,
    predictor: &PredictionService,
    analytics: &mut AnalyticsService,
    store: &ChurnStore,
) -> Option<serde_json::Value> {
    let cmd: IpcCommand = match serde_json::from_str(line) {
        Ok(c) => c,
        Err(e) => {
            return Some(serde_json::json!({ "error": "invalid_command", "message": e.to_string() }));
        }
    };

    let response = match cmd {
        IpcCommand::Quit => return None,
        IpcCommand::Predict { record, customer_id } => predictor
            .predict(&record)
            .and_then(|result| {
                let id = store.record_prediction(customer_id.as_deref(), &result)?;
                log::debug!("prediction {id} recorded");
                Ok(serde_json::to_value(&result)?)
            }),
        IpcCommand::Stats => analytics
            .get_aggregate_stats()
            .and_then(|s| Ok(serde_json::to_value(&s)?)),
        IpcCommand::Analysis => analytics
            .get_analysis()
            .and_then(|a| Ok(serde_json::to_value(&a)?)),
        IpcCommand::ModelInfo => {
            serde_json::to_value(analytics.get_model_info()).map_err(ChurnError::from)
        }
        IpcCommand::History { limit } => store
            .recent_predictions(limit)
            .and_then(|h| Ok(serde_json::to_value(&h)?)),
    };

    Some(match response {
        Ok(value) => value,
        Err(e) => {
            log::warn!("ipc request failed: {e}");
            error_json(&e)
        }
    })
}

fn error_json(e: &ChurnError) -> serde_json::Value {
    serde_json::json!({ "error": e.code(), "message": e.to_string() })
}

fn print_summary(stats: &AggregateStats, analysis: &Analysis, info: &ModelInfo) {
    println!("=== MODEL ===");
    println!("  version:        {}", info.version);
    println!("  type:           {}", info.model_type);
    println!("  trained_at:     {}", info.trained_at.format("%Y-%m-%d"));
    println!("  roc_auc:        {:.4}", info.metrics.roc_auc);
    for m in &info.members {
        println!("  member:         {} ({}, weight {}, {} trees)", m.name, m.kind, m.weight, m.trees);
    }

    println!();
    println!("=== POPULATION ===");
    println!("  customers:      {}", stats.total_customers);
    println!("  churned:        {}", stats.churned_customers);
    println!("  churn rate:     {:.2}%", stats.overall_churn_rate.yes * 100.0);
    for (contract, rate) in &stats.contract_impact {
        println!("  {contract:<15} {rate:.1}%");
    }
    println!("  top features:");
    for f in &stats.feature_importance {
        println!("    {:<24} {:.4}", f.feature.name(), f.importance);
    }

    println!();
    println!("=== SIGNIFICANCE TESTS ===");
    for t in &analysis.statistical_tests {
        println!(
            "  {:<17} {:<15} stat={:>12.2} p={:.3e}{}",
            t.variable,
            format!("{:?}", t.test_kind),
            t.statistic,
            t.p_value,
            if t.significant { "  *" } else { "" }
        );
    }

    println!();
    println!("=== SEGMENTS ===");
    for s in analysis.segments.iter().chain(&analysis.contract_segments) {
        println!(
            "  {:<26} churn {:>5.1}%  size {:>6}  ({:.1}% of base)",
            s.label, s.churn_rate, s.size, s.pct_of_total
        );
    }
    for i in &analysis.insufficient {
        println!("  {:<26} skipped: {} of {} required", i.subject, i.actual, i.required);
    }

    println!();
    println!("=== FINANCIAL IMPACT ===");
    match &analysis.financial_impact {
        Some(f) => {
            println!("  avg monthly loss:      ${:.2}", f.avg_monthly_loss);
            println!("  annual loss/churner:   ${:.2}", f.avg_annual_loss_per_customer);
            println!("  total annual exposure: ${:.2}", f.total_annual_exposure);
            println!("  avg lifetime:          {:.1} months", f.avg_customer_lifetime_months);
            println!("  roi per saved:         ${:.2}", f.roi_per_saved_customer);
            println!("  roi potential:         ${:.2}", f.roi_potential);
        }
        None => println!("  (not enough churned customers)"),
    }
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    const POPULATION_CSV: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../data/population/customers.csv");

    const RECORD: &str = r#"{"gender":"Male","SeniorCitizen":0,"Partner":"No","Dependents":"No","tenure":2,"PhoneService":"Yes","MultipleLines":"No","InternetService":"Fiber optic","OnlineSecurity":"No","OnlineBackup":"No","DeviceProtection":"No","TechSupport":"No","StreamingTV":"No","StreamingMovies":"No","Contract":"CONTRACT","PaperlessBilling":"Yes","PaymentMethod":"Electronic check","MonthlyCharges":85.0,"TotalCharges":170.0}"#;

    fn setup() -> (PredictionService, AnalyticsService, ChurnStore) {
        let bundle = Arc::new(ModelBundle::reference().unwrap());
        let config = ChurnConfig::default_test();
        let store = ChurnStore::in_memory().unwrap();
        store.migrate().unwrap();
        let population = Population::from_csv_path(Path::new(POPULATION_CSV)).unwrap();
        store.replace_population(&population).unwrap();

        let predictor = PredictionService::new(Arc::clone(&bundle), config.clone());
        let analytics = AnalyticsService::new(bundle, config, Arc::new(store.load_population().unwrap()));
        (predictor, analytics, store)
    }

    fn predict_line(contract: &str, customer_id: &str) -> String {
        let record = RECORD.replace("CONTRACT", contract);
        format!(r#"{{"type":"predict","customer_id":"{customer_id}","record":{record}}}"#)
    }

    #[test]
    fn predict_returns_result_and_records_history() {
        let (p, mut a, s) = setup();
        let out = handle_line(&predict_line("Month-to-month", "C-1"), &p, &mut a, &s).unwrap();

        assert_eq!(out["risk_level"], "High");
        assert!(out["churn_probability"].as_f64().unwrap() > 0.7);
        assert_eq!(s.prediction_count().unwrap(), 1);

        let history = handle_line(r#"{"type":"history"}"#, &p, &mut a, &s).unwrap();
        assert_eq!(history.as_array().unwrap().len(), 1);
        assert_eq!(history[0]["customer_id"], "C-1");
    }

    #[test]
    fn bad_record_returns_error_code_and_records_nothing() {
        let (p, mut a, s) = setup();
        let out = handle_line(&predict_line("Three year", "C-2"), &p, &mut a, &s).unwrap();

        assert_eq!(out["error"], "feature_error");
        assert!(out["message"].as_str().unwrap().contains("Contract"));
        assert_eq!(s.prediction_count().unwrap(), 0);
    }

    #[test]
    fn malformed_json_is_invalid_command() {
        let (p, mut a, s) = setup();
        let out = handle_line("{not json", &p, &mut a, &s).unwrap();
        assert_eq!(out["error"], "invalid_command");

        let out = handle_line(r#"{"type":"launch"}"#, &p, &mut a, &s).unwrap();
        assert_eq!(out["error"], "invalid_command");
    }

    #[test]
    fn stats_analysis_and_model_info_dispatch() {
        let (p, mut a, s) = setup();
        let stats = handle_line(r#"{"type":"stats"}"#, &p, &mut a, &s).unwrap();
        assert_eq!(stats["total_customers"], 60);
        assert_eq!(stats["churned_customers"], 23);

        let analysis = handle_line(r#"{"type":"analysis"}"#, &p, &mut a, &s).unwrap();
        assert!(analysis["statistical_tests"].as_array().unwrap().len() > 0);

        let info = handle_line(r#"{"type":"model_info"}"#, &p, &mut a, &s).unwrap();
        assert_eq!(info["version"], "2.0");
    }

    #[test]
    fn huge_history_limit_lists_everything() {
        let (p, mut a, s) = setup();
        for i in 0..3 {
            handle_line(&predict_line("One year", &format!("C-{i}")), &p, &mut a, &s).unwrap();
        }
        let line = format!(r#"{{"type":"history","limit":{}}}"#, usize::MAX);
        let history = handle_line(&line, &p, &mut a, &s).unwrap();
        assert_eq!(history.as_array().unwrap().len(), 3);
    }

    #[test]
    fn quit_ends_the_session() {
        let (p, mut a, s) = setup();
        assert!(handle_line(r#"{"type":"quit"}"#, &p, &mut a, &s).is_none());
    }
}
