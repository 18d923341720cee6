use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::util;

/// Free-form JSON fields carried alongside the typed ones.
pub type Fields = Map<String, Value>;

/// Production stage that partitions the order and item collections.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Injection,
    Slush,
    Spray,
}

impl OrderType {
    pub const ALL: [OrderType; 3] = [Self::Injection, Self::Slush, Self::Spray];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Injection => "injection",
            Self::Slush => "slush",
            Self::Spray => "spray",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "injection" => Ok(Self::Injection),
            "slush" => Ok(Self::Slush),
            "spray" => Ok(Self::Spray),
            _ => Err(format!("Invalid order type: {}", s)),
        }
    }
}

/// Order status labels. Stored as plain strings on the order; the enum
/// only names the three conventional values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    InProgress,
    Done,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "待生产",
            Self::InProgress => "生产中",
            Self::Done => "已完成",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemStatus {
    Pending,
    Resolved,
}

impl ProblemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "待处理",
            Self::Resolved => "已解决",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequisitionStatus {
    PendingIssue,
    Issued,
}

impl RequisitionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingIssue => "待出库",
            Self::Issued => "已出库",
        }
    }
}

/// Work order header. Everything except the bookkeeping fields is free-form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    #[serde(default, deserialize_with = "util::de_lenient_i64")]
    pub id: i64,
    #[serde(default, deserialize_with = "util::de_loose_string")]
    pub status: String,
    #[serde(default, deserialize_with = "util::de_loose_string")]
    pub created_at: String,
    #[serde(default, deserialize_with = "util::de_loose_string")]
    pub updated_at: String,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Order {
    /// Header field rendered as text; absent or non-scalar values are empty.
    pub fn text(&self, key: &str) -> String {
        field_text(&self.fields, key)
    }
}

/// Line entry of an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    #[serde(default, deserialize_with = "util::de_lenient_i64")]
    pub id: i64,
    #[serde(default, deserialize_with = "util::de_lenient_i64")]
    pub order_id: i64,
    #[serde(default, deserialize_with = "util::de_lenient_i64")]
    pub sort_order: i64,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Item {
    pub const RESERVED: [&'static str; 3] = ["id", "order_id", "sort_order"];

    pub fn text(&self, key: &str) -> String {
        field_text(&self.fields, key)
    }

    /// Merge free-form fields, leaving the identity and position untouched.
    pub fn merge_fields(&mut self, fields: Fields) {
        for (key, value) in fields {
            if Self::RESERVED.contains(&key.as_str()) {
                continue;
            }
            self.fields.insert(key, value);
        }
    }
}

/// An order annotated with its items, as returned by list and get.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Problem {
    #[serde(default, deserialize_with = "util::de_lenient_i64")]
    pub id: i64,
    #[serde(default, deserialize_with = "util::de_loose_string")]
    pub order_type: String,
    #[serde(default, deserialize_with = "util::de_lenient_opt_i64")]
    pub order_id: Option<i64>,
    #[serde(default, deserialize_with = "util::de_loose_string")]
    pub order_number: String,
    #[serde(default, deserialize_with = "util::de_loose_string")]
    pub description: String,
    #[serde(default, deserialize_with = "util::de_loose_string")]
    pub reported_by: String,
    #[serde(default, deserialize_with = "util::de_loose_string")]
    pub status: String,
    #[serde(default, deserialize_with = "util::de_loose_string")]
    pub created_at: String,
    #[serde(default)]
    pub resolved_at: Option<String>,
}

/// One row of the material price table. Unknown keys are kept as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaterialPrice {
    #[serde(default, deserialize_with = "util::de_loose_string")]
    pub material: String,
    #[serde(default, deserialize_with = "util::de_lenient_f64")]
    pub unit_price: f64,
    #[serde(default, deserialize_with = "util::de_loose_string")]
    pub notes: String,
    #[serde(flatten)]
    pub extra: Fields,
}

impl MaterialPrice {
    pub fn new(material: impl Into<String>, unit_price: f64) -> Self {
        Self {
            material: material.into(),
            unit_price,
            notes: String::new(),
            extra: Fields::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Requisition {
    #[serde(default, deserialize_with = "util::de_lenient_i64")]
    pub id: i64,
    #[serde(default, deserialize_with = "util::de_loose_string")]
    pub req_number: String,
    #[serde(default, deserialize_with = "util::de_loose_string")]
    pub date: String,
    #[serde(default, deserialize_with = "util::de_lenient_opt_i64")]
    pub order_id: Option<i64>,
    #[serde(default, deserialize_with = "util::de_loose_string")]
    pub order_number: String,
    #[serde(default, deserialize_with = "util::de_loose_string")]
    pub material: String,
    #[serde(default, deserialize_with = "util::de_lenient_f64")]
    pub requested_weight_kg: f64,
    #[serde(default, deserialize_with = "util::de_loose_string")]
    pub applicant: String,
    #[serde(default, deserialize_with = "util::de_loose_string")]
    pub notes: String,
    #[serde(default, deserialize_with = "util::de_loose_string")]
    pub status: String,
    #[serde(default)]
    pub issued_at: Option<String>,
    #[serde(default, deserialize_with = "util::de_loose_string")]
    pub created_at: String,
}

/// Per-material usage totals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaterialStat {
    pub seq: usize,
    pub material: String,
    pub unit_price: f64,
    pub notes: String,
    pub total_actual_weight: f64,
    pub total_amount: f64,
}

/// Order header joined onto one of its items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InjectionCostRow {
    pub order_number: String,
    pub doc_number: String,
    pub date: String,
    pub workshop: String,
    pub mold_id: String,
    pub mold_name: String,
    pub injection_cost: Value,
    pub notes: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub total: usize,
    pub pending: usize,
    #[serde(rename = "inProgress")]
    pub in_progress: usize,
    pub done: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderStats {
    pub injection: StatusCounts,
    pub slush: StatusCounts,
    pub spray: StatusCounts,
}

fn field_text(fields: &Fields, key: &str) -> String {
    match fields.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}
