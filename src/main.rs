//! Order Movement Report
//! Lists orders still in transit and how long since each last moved
//!
//! Run: ./target/release/order_movement --input data/orders.json [--now "2025-08-04 12:00"]
//!      [--bucket over72h] [--json]

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDateTime};
use clap::Parser;
use order_movement::fields::{self, LogicalField};
use order_movement::{
    analyze, datetime, ingest, logging, AgeBucket, AnalysisResult, EnrichedOrder,
};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "order_movement")]
#[command(about = "Report orders still in movement and the time since their last update")]
struct Args {
    /// Order export: a JSON array or a CSV file with a header row
    #[arg(long, default_value = "data/orders.json")]
    input: PathBuf,

    /// Reference time, e.g. "2025-08-04 12:00" (defaults to the local clock)
    #[arg(long)]
    now: Option<String>,

    /// Print the full analysis as JSON instead of the text report
    #[arg(long)]
    json: bool,

    /// How many stalled orders to list
    #[arg(long, default_value = "10")]
    top: usize,

    /// Also list the orders in one age bucket: under12h, 12to24h, 24to48h,
    /// 48to72h, over72h or unknown
    #[arg(long)]
    bucket: Option<String>,
}

fn print_section_header(title: &str) {
    println!("\n{}", "═".repeat(80));
    println!("  {}", title);
    println!("{}\n", "═".repeat(80));
}

/// 1234567.8 -> "1,234,568"
fn format_amount(amount: f64) -> String {
    let rounded = amount.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if rounded < 0 {
        format!("-{}", out)
    } else {
        out
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() > max_len {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}

fn resolve_now(raw: Option<&str>) -> Result<NaiveDateTime> {
    match raw {
        Some(s) => datetime::parse_datetime_str(s)
            .with_context(|| format!("unrecognized --now value: {:?}", s)),
        None => Ok(Local::now().naive_local()),
    }
}

fn resolve_bucket(raw: &str) -> Result<AgeBucket> {
    let name = raw.trim();
    let bucket = AgeBucket::from(name);
    if bucket == AgeBucket::Unknown && name != AgeBucket::Unknown.as_str() {
        bail!("unrecognized --bucket value: {:?}", raw);
    }
    Ok(bucket)
}

fn order_reference(order: &EnrichedOrder) -> String {
    fields::text(&order.raw, LogicalField::OrderId).unwrap_or_else(|| "-".to_string())
}

fn print_order_rows(orders: &[&EnrichedOrder], top: usize) {
    println!(
        "  {:14} {:20} {:20} {:18} {:>8} {:>7}",
        "Order", "Status", "Carrier", "Region", "Idle", "Alert"
    );
    println!("  {}", "-".repeat(92));

    for order in orders.iter().take(top) {
        println!(
            "  {:14} {:20} {:20} {:18} {:>8} {:>7}",
            truncate(&order_reference(order), 14),
            truncate(&order.status, 20),
            truncate(&order.carrier, 20),
            truncate(&order.region, 18),
            order.age_label,
            order.age_severity.as_str()
        );
    }
    if orders.len() > top {
        println!("  ... and {} more", orders.len() - top);
    }
}

fn print_summary(result: &AnalysisResult) {
    print_section_header("1. ORDERS IN MOVEMENT");

    println!("  Orders in movement:   {:>14}", result.orders_in_movement.len());
    println!("  Total order value:    {:>14}", format_amount(result.total_value));
    println!("  Shipping cost:        {:>14}", format_amount(result.total_shipping_cost));
    println!("  Provider cost:        {:>14}", format_amount(result.total_provider_cost));
    println!("  Potential profit:     {:>14}", format_amount(result.potential_profit));
    println!("  Carriers:             {:>14}", result.carriers.len());
    println!("  Regions:              {:>14}", result.regions.len());
    println!("  Unreadable dates:     {:>14}", result.data_quality.len());
}

fn print_group_table(title: &str, label: &str, groups: &BTreeMap<String, Vec<EnrichedOrder>>) {
    print_section_header(title);

    println!(
        "  {:28} {:>8} {:>14} {:>14} {:>8}",
        label, "Orders", "Value", "Profit", "Stalled"
    );
    println!("  {}", "-".repeat(76));

    let mut rows: Vec<(&String, &Vec<EnrichedOrder>)> = groups.iter().collect();
    rows.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(b.0)));

    for (name, orders) in rows {
        let value: f64 = orders.iter().map(|o| o.order_value).sum();
        let profit: f64 = orders.iter().map(|o| o.calculated_profit).sum();
        let stalled = orders
            .iter()
            .filter(|o| matches!(o.age_bucket, AgeBucket::From48To72h | AgeBucket::Over72h))
            .count();

        println!(
            "  {:28} {:>8} {:>14} {:>14} {:>8}",
            truncate(name, 28),
            orders.len(),
            format_amount(value),
            format_amount(profit),
            stalled
        );
    }
}

fn print_age_distribution(result: &AnalysisResult) {
    print_section_header("5. TIME SINCE LAST MOVEMENT");

    let total = result.orders_in_movement.len().max(1) as f64;
    println!("  {:10} {:>8} {:>8} {:>8}  {}", "Bucket", "Orders", "Share", "Alert", "Visual");
    println!("  {}", "-".repeat(60));

    for bucket in AgeBucket::ALL {
        let count = result.bucket_count(bucket);
        let pct = count as f64 / total * 100.0;
        let bar = "#".repeat((pct / 5.0) as usize);
        println!(
            "  {:10} {:>8} {:>7.1}% {:>8}  {}",
            bucket.as_str(),
            count,
            pct,
            bucket.severity().as_str(),
            bar
        );
    }
}

fn print_stalled(result: &AnalysisResult, top: usize) {
    print_section_header("6. STALLED ORDERS");

    let stalled = result.stalled_orders();
    if stalled.is_empty() {
        println!("  No orders idle for 48h or more.");
        return;
    }
    print_order_rows(&stalled, top);
}

fn print_bucket(result: &AnalysisResult, bucket: AgeBucket, top: usize) {
    print_section_header(&format!("7. ORDERS IN BUCKET {}", bucket));

    let orders: Vec<&EnrichedOrder> = result
        .by_age_bucket
        .get(&bucket)
        .map(|orders| orders.iter().collect())
        .unwrap_or_default();
    if orders.is_empty() {
        println!("  No orders in this bucket.");
        return;
    }
    print_order_rows(&orders, top);
}

fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    let now = resolve_now(args.now.as_deref())?;
    let bucket = args.bucket.as_deref().map(resolve_bucket).transpose()?;
    let records = ingest::load_records(&args.input)
        .with_context(|| format!("failed to load {}", args.input.display()))?;

    info!("Analyzing {} records as of {}", records.len(), now);
    let result = analyze(&records, now);

    if !result.data_quality.is_empty() {
        warn!(
            "{} date values could not be read; those orders are reported as unknown age",
            result.data_quality.len()
        );
    }

    if args.json {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        serde_json::to_writer_pretty(&mut handle, &result)?;
        writeln!(handle)?;
        return Ok(());
    }

    println!("\n{}", "█".repeat(80));
    println!(
        "{}  ORDER MOVEMENT REPORT - as of {}  {}",
        "█".repeat(14),
        now.format("%Y-%m-%d %H:%M"),
        "█".repeat(15)
    );
    println!("{}", "█".repeat(80));

    print_summary(&result);
    if result.is_empty() {
        println!("\n  Nothing in movement.");
        return Ok(());
    }
    print_group_table("2. BY STATUS", "Status", &result.by_status);
    print_group_table("3. BY CARRIER", "Carrier", &result.by_carrier);
    print_group_table("4. BY REGION", "Region", &result.by_region);
    print_age_distribution(&result);
    print_stalled(&result, args.top);
    if let Some(bucket) = bucket {
        print_bucket(&result, bucket, args.top);
    }

    println!("\n{}", "█".repeat(80));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0.0), "0");
        assert_eq!(format_amount(999.4), "999");
        assert_eq!(format_amount(1234567.8), "1,234,568");
        assert_eq!(format_amount(-45000.0), "-45,000");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Servientrega", 20), "Servientrega");
        assert_eq!(truncate("Transportadora Nacional", 10), "Transpo...");
    }

    #[test]
    fn test_resolve_now() {
        let now = resolve_now(Some("2025-08-04 12:30")).unwrap();
        assert_eq!(now.format("%Y-%m-%d %H:%M").to_string(), "2025-08-04 12:30");
        assert!(resolve_now(Some("tomorrow")).is_err());
    }

    #[test]
    fn test_resolve_bucket() {
        assert_eq!(resolve_bucket("over72h").unwrap(), AgeBucket::Over72h);
        assert_eq!(resolve_bucket(" 12to24h ").unwrap(), AgeBucket::From12To24h);
        assert_eq!(resolve_bucket("unknown").unwrap(), AgeBucket::Unknown);
        assert!(resolve_bucket("3days").is_err());
    }
}
