//! Invoice schema requested from the vision model.
//!
//! Every field is optional because the model may not find it on the page.
//! The schema owns field-level normalization (e-mail format, currency
//! casing); the extraction core never looks inside records.

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::lenient;

lazy_static! {
    static ref EMAIL: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
}

/// A complete invoice representation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Invoice {
    #[serde(default, deserialize_with = "lenient::text")]
    pub invoiced_date: Option<String>,

    #[serde(default, deserialize_with = "lenient::text")]
    pub due_date: Option<String>,

    #[serde(default, deserialize_with = "lenient::text")]
    pub invoice_number: Option<String>,

    /// Purchase order number.
    #[serde(default, deserialize_with = "lenient::text")]
    pub po_number: Option<String>,

    /// Free-text vehicle description on repair-shop invoices.
    #[serde(default, deserialize_with = "lenient::text")]
    pub vehicle_info: Option<String>,

    /// Sender (seller).
    #[serde(default, deserialize_with = "lenient::nested")]
    pub from_info: Info,

    /// Recipient (buyer).
    #[serde(default, deserialize_with = "lenient::nested")]
    pub to_info: Info,

    #[serde(default, deserialize_with = "lenient::list")]
    pub line_items: Option<Vec<LineItem>>,

    #[serde(default, deserialize_with = "lenient::text")]
    pub payment_method: Option<String>,

    /// Totals block.
    #[serde(default, deserialize_with = "lenient::nested")]
    pub amount: Amount,
}

/// Contact block of a party.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Info {
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "lenient::text")]
    pub email: Option<String>,

    #[serde(default, deserialize_with = "lenient::text")]
    pub phone_number: Option<String>,

    #[serde(default, deserialize_with = "lenient::nested")]
    pub address: Address,
}

/// Postal address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Address {
    #[serde(default, deserialize_with = "lenient::text")]
    pub street: Option<String>,

    #[serde(default, deserialize_with = "lenient::text")]
    pub city: Option<String>,

    #[serde(default, deserialize_with = "lenient::text")]
    pub state: Option<String>,

    #[serde(default, deserialize_with = "lenient::text")]
    pub postal_code: Option<String>,

    #[serde(default, deserialize_with = "lenient::text")]
    pub country: Option<String>,
}

/// A single line item on the invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LineItem {
    #[serde(default, deserialize_with = "lenient::text")]
    pub part_number: Option<String>,

    #[serde(default, deserialize_with = "lenient::text")]
    pub description: Option<String>,

    /// Warehouse bin the part was picked from.
    #[serde(default, deserialize_with = "lenient::text")]
    pub bin_location: Option<String>,

    /// Labor operation code.
    #[serde(default, deserialize_with = "lenient::text")]
    pub opcode: Option<String>,

    #[serde(default, with = "lenient::decimal")]
    #[schemars(with = "Option<f64>")]
    pub unit_price: Option<Decimal>,

    #[serde(default, with = "lenient::decimal")]
    #[schemars(with = "Option<f64>")]
    pub labor_cost: Option<Decimal>,

    #[serde(default, with = "lenient::decimal")]
    #[schemars(with = "Option<f64>")]
    pub other_cost: Option<Decimal>,

    #[serde(default, deserialize_with = "lenient::count")]
    pub quantity_ordered: Option<i64>,

    #[serde(default, deserialize_with = "lenient::count")]
    pub quantity_shipped: Option<i64>,

    #[serde(default, with = "lenient::decimal")]
    #[schemars(with = "Option<f64>")]
    pub amount: Option<Decimal>,
}

/// Invoice totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Amount {
    #[serde(default, with = "lenient::decimal")]
    #[schemars(with = "Option<f64>")]
    pub sub_total: Option<Decimal>,

    #[serde(default, with = "lenient::decimal")]
    #[schemars(with = "Option<f64>")]
    pub total: Option<Decimal>,

    #[serde(default, with = "lenient::decimal")]
    #[schemars(with = "Option<f64>")]
    pub vat: Option<Decimal>,

    /// ISO 4217 code, upper case after normalization.
    #[serde(default, deserialize_with = "lenient::text")]
    pub currency: Option<String>,

    #[serde(default, with = "lenient::decimal")]
    #[schemars(with = "Option<f64>")]
    pub core_charge: Option<Decimal>,

    #[serde(default, with = "lenient::decimal")]
    #[schemars(with = "Option<f64>")]
    pub sales_tax: Option<Decimal>,

    #[serde(default, with = "lenient::decimal")]
    #[schemars(with = "Option<f64>")]
    pub labor_amount: Option<Decimal>,

    #[serde(default, with = "lenient::decimal")]
    #[schemars(with = "Option<f64>")]
    pub misc_charges: Option<Decimal>,

    #[serde(default, with = "lenient::decimal")]
    #[schemars(with = "Option<f64>")]
    pub parts_amount: Option<Decimal>,
}

impl Info {
    /// Drop e-mail addresses that do not look like one.
    pub fn normalize(&mut self) {
        if let Some(email) = &self.email {
            if !EMAIL.is_match(email) {
                self.email = None;
            }
        }
    }
}

impl Amount {
    /// Upper-case the currency code.
    pub fn normalize(&mut self) {
        self.currency = self.currency.take().map(|c| c.to_uppercase());
    }
}

impl Invoice {
    /// Build an invoice from a raw record, coercing field by field.
    ///
    /// Unknown keys are ignored, uncoercible values become `None`.
    pub fn from_record(record: &Map<String, Value>) -> Self {
        serde_json::from_value(Value::Object(record.clone())).unwrap_or_default()
    }

    /// Serialize into a record with every schema field present.
    pub fn to_record(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Apply field-level normalization rules.
    pub fn normalize(&mut self) {
        self.from_info.normalize();
        self.to_info.normalize();
        self.amount.normalize();
    }

    /// JSON Schema used for guided decoding.
    pub fn json_schema() -> Value {
        let schema = schemars::schema_for!(Invoice);
        serde_json::to_value(&schema).unwrap_or_default()
    }
}
