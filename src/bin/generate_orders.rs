//! Synthetic order export generator
//!
//! Writes order rows the way store exports drift in practice: accented, plain or
//! legacy lowercase headers, combined or split movement dates, day-first strings,
//! two-digit years, spreadsheet serials and the occasional unreadable value.
//!
//! Usage:
//!   cargo run --release --bin generate_orders -- [OPTIONS]
//!
//! Options:
//!   --count <N>          Number of rows (default: 500)
//!   --now <DATETIME>     Reference time for movement ages (default: local clock)
//!   --max-idle <HOURS>   Oldest last movement to generate (default: 120)
//!   --legacy-rate <F>    Share of rows using legacy lowercase keys (default: 0.25)
//!   --garbage-rate <F>   Share of rows with an unreadable date (default: 0.03)
//!   --seed <N>           Random seed for reproducibility (optional)
//!   --output <PATH>      Output path, .json or .csv (default: data/orders.json)

use anyhow::{bail, Context, Result};
use chrono::{Duration, Local, NaiveDate, NaiveDateTime, Timelike};
use clap::Parser;
use csv::WriterBuilder;
use order_movement::{datetime, logging, RawOrderRecord};
use rand::prelude::*;
use rand::rngs::StdRng;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "generate_orders")]
#[command(about = "Generate a synthetic order export with inconsistent keys and date formats")]
struct Args {
    /// Number of rows to generate
    #[arg(long, default_value = "500")]
    count: usize,

    /// Reference time, e.g. "2025-08-04 12:00"
    #[arg(long)]
    now: Option<String>,

    /// Oldest last movement, in hours before now
    #[arg(long, default_value = "120")]
    max_idle: i64,

    /// Share of rows written with legacy lowercase keys (0.0 - 1.0)
    #[arg(long, default_value = "0.25")]
    legacy_rate: f64,

    /// Share of rows whose movement date is unreadable (0.0 - 1.0)
    #[arg(long, default_value = "0.03")]
    garbage_rate: f64,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Output path (.json or .csv)
    #[arg(long, default_value = "data/orders.json")]
    output: PathBuf,
}

/// (status, weight)
const STATUSES: [(&str, u32); 10] = [
    ("EN TRANSITO", 30),
    ("EN REPARTO", 12),
    ("EN BODEGA TRANSPORTADORA", 8),
    ("GUIA GENERADA", 10),
    ("NOVEDAD", 6),
    ("PENDIENTE", 5),
    ("ENTREGADO", 20),
    ("CANCELADO", 4),
    ("DEVOLUCION", 3),
    ("RECHAZADO", 2),
];

const CARRIERS: [&str; 6] = [
    "Servientrega",
    "Interrapidísimo",
    "Coordinadora",
    "Envía",
    "TCC",
    "Domina",
];

const REGIONS: [&str; 8] = [
    "Antioquia",
    "Bogotá D.C.",
    "Valle del Cauca",
    "Atlántico",
    "Santander",
    "Cundinamarca",
    "Bolívar",
    "Nariño",
];

#[derive(Debug, Clone, Copy, PartialEq)]
enum KeyStyle {
    Accented,
    Plain,
    Legacy,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DateEncoding {
    CombinedIso,
    CombinedDayFirst,
    SplitStrings,
    SplitSerial,
    TwoDigitYear,
    Missing,
}

const ENCODINGS: [DateEncoding; 6] = [
    DateEncoding::CombinedIso,
    DateEncoding::CombinedDayFirst,
    DateEncoding::SplitStrings,
    DateEncoding::SplitSerial,
    DateEncoding::TwoDigitYear,
    DateEncoding::Missing,
];

struct Keys {
    id: &'static str,
    status: &'static str,
    carrier: &'static str,
    region: &'static str,
    value: &'static str,
    shipping: &'static str,
    provider: &'static str,
    profit: &'static str,
    combined: &'static str,
    date: &'static str,
    time: &'static str,
}

fn keys(style: KeyStyle) -> Keys {
    match style {
        KeyStyle::Accented => Keys {
            id: "NÚMERO GUÍA",
            status: "ESTATUS",
            carrier: "TRANSPORTADORA",
            region: "DEPARTAMENTO DESTINO",
            value: "TOTAL DE LA ORDEN",
            shipping: "PRECIO FLETE",
            provider: "TOTAL EN PRECIOS DE PROVEEDOR",
            profit: "GANANCIA",
            combined: "ÚLTIMO MOVIMIENTO",
            date: "FECHA DE ÚLTIMO MOVIMIENTO",
            time: "HORA DE ÚLTIMO MOVIMIENTO",
        },
        KeyStyle::Plain => Keys {
            id: "NUMERO GUIA",
            status: "ESTATUS",
            carrier: "TRANSPORTADORA",
            region: "REGION",
            value: "VALOR",
            shipping: "FLETE",
            provider: "COSTO PROVEEDOR",
            profit: "GANANCIA",
            combined: "ULTIMO MOVIMIENTO",
            date: "FECHA DE ULTIMO MOVIMIENTO",
            time: "HORA DE ULTIMO MOVIMIENTO",
        },
        KeyStyle::Legacy => Keys {
            id: "guia",
            status: "estatus",
            carrier: "transportadora",
            region: "region",
            value: "valor",
            shipping: "flete",
            provider: "costo_proveedor",
            profit: "ganancia",
            combined: "ultimo_movimiento",
            date: "fecha",
            time: "hora",
        },
    }
}

fn pick_status(rng: &mut impl Rng) -> &'static str {
    let total: u32 = STATUSES.iter().map(|(_, w)| w).sum();
    let mut roll = rng.gen_range(0..total);
    for (status, weight) in STATUSES {
        if roll < weight {
            return status;
        }
        roll -= weight;
    }
    STATUSES[0].0
}

fn serial_parts(at: NaiveDateTime) -> (i64, f64) {
    let days = NaiveDate::from_ymd_opt(1899, 12, 30)
        .map(|epoch| (at.date() - epoch).num_days())
        .unwrap_or(0);
    let fraction = at.num_seconds_from_midnight() as f64 / 86_400.0;
    (days, fraction)
}

/// Money rounded to the nearest hundred pesos
fn money(amount: f64) -> f64 {
    (amount / 100.0).round() * 100.0
}

fn generate_record(
    index: usize,
    now: NaiveDateTime,
    args: &Args,
    rng: &mut impl Rng,
) -> RawOrderRecord {
    let style = if rng.gen::<f64>() < args.legacy_rate {
        KeyStyle::Legacy
    } else if rng.gen_bool(0.5) {
        KeyStyle::Accented
    } else {
        KeyStyle::Plain
    };
    let k = keys(style);

    let mut record = RawOrderRecord::new();
    record.insert(k.id.to_string(), json!(format!("{:06}", 240000 + index)));
    record.insert(k.status.to_string(), json!(pick_status(rng)));

    // a few rows come without carrier or region
    if rng.gen::<f64>() > 0.05 {
        if let Some(carrier) = CARRIERS.choose(rng) {
            record.insert(k.carrier.to_string(), json!(carrier));
        }
    }
    if rng.gen::<f64>() > 0.05 {
        if let Some(region) = REGIONS.choose(rng) {
            record.insert(k.region.to_string(), json!(region));
        }
    }

    let value = money(rng.gen_range(40_000.0..400_000.0));
    let shipping = money(rng.gen_range(8_000.0..25_000.0));
    let provider = money(value * rng.gen_range(0.4..0.7));
    if style == KeyStyle::Legacy {
        record.insert(k.value.to_string(), json!(value.to_string()));
        record.insert(k.shipping.to_string(), json!(format!("${}", shipping)));
    } else {
        record.insert(k.value.to_string(), json!(value));
        record.insert(k.shipping.to_string(), json!(shipping));
    }
    record.insert(k.provider.to_string(), json!(provider));
    if rng.gen_bool(0.2) {
        record.insert(k.profit.to_string(), json!(value - provider - shipping));
    }

    // slight future skew shows up in real exports
    let idle_minutes = rng.gen_range(-90..args.max_idle.max(1) * 60);
    let at = now - Duration::minutes(idle_minutes);

    if rng.gen::<f64>() < args.garbage_rate {
        record.insert(k.date.to_string(), json!("sin fecha"));
        return record;
    }

    match ENCODINGS.choose(rng).copied().unwrap_or(DateEncoding::Missing) {
        DateEncoding::CombinedIso => {
            let stamp = at.format("%Y-%m-%dT%H:%M:%S").to_string();
            record.insert(k.combined.to_string(), json!(stamp));
        }
        DateEncoding::CombinedDayFirst => {
            let stamp = at.format("%d/%m/%Y %H:%M").to_string();
            record.insert(k.combined.to_string(), json!(stamp));
        }
        DateEncoding::SplitStrings => {
            record.insert(k.date.to_string(), json!(at.format("%d/%m/%Y").to_string()));
            record.insert(k.time.to_string(), json!(at.format("%H:%M:%S").to_string()));
        }
        DateEncoding::SplitSerial => {
            let (days, fraction) = serial_parts(at);
            record.insert(k.date.to_string(), json!(days));
            record.insert(k.time.to_string(), json!(fraction));
        }
        DateEncoding::TwoDigitYear => {
            record.insert(k.date.to_string(), json!(at.format("%d.%m.%y").to_string()));
            record.insert(k.time.to_string(), json!(at.format("%H:%M").to_string()));
        }
        DateEncoding::Missing => {}
    }
    record
}

fn write_json(path: &Path, records: &[RawOrderRecord]) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, records)?;
    Ok(())
}

/// One column per key seen in any row; missing cells stay empty
fn write_csv(path: &Path, records: &[RawOrderRecord]) -> Result<()> {
    let headers: BTreeSet<&String> = records.iter().flat_map(|r| r.keys()).collect();
    let mut writer = WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(headers.iter().map(|h| h.as_str()))?;

    for record in records {
        let row: Vec<String> = headers
            .iter()
            .map(|h| match record.get(h.as_str()) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            })
            .collect();
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    let now = match args.now.as_deref() {
        Some(s) => datetime::parse_datetime_str(s)
            .with_context(|| format!("unrecognized --now value: {:?}", s))?,
        None => Local::now().naive_local(),
    };

    let mut rng: StdRng = match args.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    info!("Generating {} orders relative to {}", args.count, now);
    let records: Vec<RawOrderRecord> = (0..args.count)
        .map(|i| generate_record(i, now, &args, &mut rng))
        .collect();

    if let Some(parent) = args.output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let extension = args
        .output
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("json") => write_json(&args.output, &records)?,
        Some("csv") => write_csv(&args.output, &records)?,
        _ => bail!("output must end in .json or .csv: {}", args.output.display()),
    }

    info!("Wrote {} orders to {}", records.len(), args.output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use order_movement::{analyze, ingest, AgeBucket};

    fn args() -> Args {
        Args {
            count: 300,
            now: None,
            max_idle: 120,
            legacy_rate: 0.25,
            garbage_rate: 0.05,
            seed: Some(7),
            output: PathBuf::from("unused.json"),
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 8, 4)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn generate(seed: u64) -> Vec<RawOrderRecord> {
        let args = args();
        let mut rng = StdRng::seed_from_u64(seed);
        (0..args.count)
            .map(|i| generate_record(i, now(), &args, &mut rng))
            .collect()
    }

    #[test]
    fn test_same_seed_same_rows() {
        assert_eq!(generate(42), generate(42));
    }

    #[test]
    fn test_generated_rows_analyze_consistently() {
        let records = generate(7);
        let result = analyze(&records, now());

        assert!(!result.orders_in_movement.is_empty());
        assert!(result.orders_in_movement.len() < records.len());
        assert_eq!(
            result.age_buckets_count.values().sum::<usize>(),
            result.orders_in_movement.len()
        );
        // every encoding except missing/garbage resolves to a timestamp
        let known = result.orders_in_movement.len() - result.bucket_count(AgeBucket::Unknown);
        assert!(known > 0);
    }

    #[test]
    fn test_serial_parts() {
        let at = NaiveDate::from_ymd_opt(2024, 7, 31)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap();
        assert_eq!(serial_parts(at), (45504, 0.75));
    }

    #[test]
    fn test_csv_output_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.csv");
        let records = generate(3);
        write_csv(&path, &records).unwrap();

        let loaded = ingest::load_records(&path).unwrap();
        assert_eq!(loaded.len(), records.len());
        assert_eq!(
            analyze(&loaded, now()).orders_in_movement.len(),
            analyze(&records, now()).orders_in_movement.len()
        );
    }
}
