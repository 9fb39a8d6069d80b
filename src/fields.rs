//! Field normalization for loosely-structured order rows
//! Each logical field is read from a prioritized list of alternate header names

use crate::models::RawOrderRecord;
use serde_json::Value;

pub const NO_STATUS: &str = "Sin estado";
pub const NO_CARRIER: &str = "Sin transportadora";
pub const NO_REGION: &str = "Sin región";

/// Logical fields the engine reads from a raw row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalField {
    OrderId,
    Status,
    Carrier,
    Region,
    OrderValue,
    ShippingCost,
    ProviderCost,
    Profit,
    LastMovement,
    MovementDate,
    MovementTime,
}

impl LogicalField {
    /// Header names in priority order: current export, unaccented variant, legacy key
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            LogicalField::OrderId => &["ID", "NÚMERO GUÍA", "NUMERO GUIA", "id", "guia"],
            LogicalField::Status => &["ESTATUS", "estatus"],
            LogicalField::Carrier => &["TRANSPORTADORA", "transportadora"],
            LogicalField::Region => &["DEPARTAMENTO DESTINO", "REGIÓN", "REGION", "region"],
            LogicalField::OrderValue => &["TOTAL DE LA ORDEN", "VALOR", "valor"],
            LogicalField::ShippingCost => &["PRECIO FLETE", "FLETE", "flete"],
            LogicalField::ProviderCost => &[
                "TOTAL EN PRECIOS DE PROVEEDOR",
                "COSTO PROVEEDOR",
                "costo_proveedor",
            ],
            LogicalField::Profit => &["GANANCIA", "ganancia"],
            LogicalField::LastMovement => &[
                "ÚLTIMO MOVIMIENTO",
                "ULTIMO MOVIMIENTO",
                "ultimo_movimiento",
            ],
            LogicalField::MovementDate => &[
                "FECHA DE ÚLTIMO MOVIMIENTO",
                "FECHA DE ULTIMO MOVIMIENTO",
                "fecha_ultimo_movimiento",
                "FECHA",
                "fecha",
            ],
            LogicalField::MovementTime => &[
                "HORA DE ÚLTIMO MOVIMIENTO",
                "HORA DE ULTIMO MOVIMIENTO",
                "hora_ultimo_movimiento",
                "HORA",
                "hora",
            ],
        }
    }

    /// First alias holding a usable value, with the key it was found under
    pub fn resolve<'a>(self, record: &'a RawOrderRecord) -> Option<(&'static str, &'a Value)> {
        self.aliases()
            .iter()
            .find_map(|key| record.get(*key).filter(|v| is_present(v)).map(|v| (*key, v)))
    }
}

/// Null and blank strings count as missing
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

/// Text value of a field, trimmed. Numbers and booleans are stringified.
pub fn text(record: &RawOrderRecord, field: LogicalField) -> Option<String> {
    let (_, value) = field.resolve(record)?;
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn text_or(record: &RawOrderRecord, field: LogicalField, sentinel: &str) -> String {
    text(record, field).unwrap_or_else(|| sentinel.to_string())
}

/// Numeric value of a field if present and parsable
pub fn number(record: &RawOrderRecord, field: LogicalField) -> Option<f64> {
    field.resolve(record).and_then(|(_, v)| coerce_number(v))
}

/// Numeric value of a field, 0 when missing or unparsable
pub fn amount(record: &RawOrderRecord, field: LogicalField) -> f64 {
    number(record, field).unwrap_or(0.0)
}

pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => parse_amount(s),
        _ => None,
    }
}

/// Parse a money-like string: "1500", " $ 1 500.50 ", "1,250,000"
pub fn parse_amount(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let unsigned = trimmed.strip_prefix('$').unwrap_or(trimmed);
    let compact: String = unsigned.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }

    let parse = |s: &str| s.parse::<f64>().ok().filter(|f| f.is_finite());
    parse(&compact).or_else(|| parse(&compact.replace(',', "")))
}

/// Normalized view of the fields the aggregator needs
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFields {
    pub status: String,
    pub carrier: String,
    pub region: String,
    pub order_value: f64,
    pub shipping_cost: f64,
    pub provider_cost: f64,
    pub explicit_profit: Option<f64>,
}

impl NormalizedFields {
    pub fn from_record(record: &RawOrderRecord) -> Self {
        Self {
            status: text_or(record, LogicalField::Status, NO_STATUS),
            carrier: text_or(record, LogicalField::Carrier, NO_CARRIER),
            region: text_or(record, LogicalField::Region, NO_REGION),
            order_value: amount(record, LogicalField::OrderValue),
            shipping_cost: amount(record, LogicalField::ShippingCost),
            provider_cost: amount(record, LogicalField::ProviderCost),
            explicit_profit: number(record, LogicalField::Profit),
        }
    }

    /// Source-supplied profit when present, otherwise value minus costs
    pub fn profit(&self) -> f64 {
        self.explicit_profit
            .unwrap_or(self.order_value - self.provider_cost - self.shipping_cost)
    }

    pub fn has_carrier(&self) -> bool {
        self.carrier != NO_CARRIER
    }

    pub fn has_region(&self) -> bool {
        self.region != NO_REGION
    }
}
