//! Read-only aggregations over the document: material usage, the injection
//! cost rollup and per-type status counts.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::Value;

use super::document::Document;
use super::models::*;
use crate::util;

/// Filters for [`Document::material_stats`]. Empty strings mean "unset".
#[derive(Debug, Clone, Default)]
pub struct MaterialStatsFilter {
    /// `YYYY-MM` prefix matched against the order `date`.
    pub month: Option<String>,
    /// Case-insensitive substring of `order_number` + `doc_number`.
    pub order_number: Option<String>,
}

impl MaterialStatsFilter {
    fn month(&self) -> Option<&str> {
        self.month.as_deref().filter(|m| !m.is_empty())
    }

    fn search(&self) -> Option<String> {
        self.order_number
            .as_deref()
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase)
    }

    fn is_active(&self) -> bool {
        self.month().is_some() || self.search().is_some()
    }

    fn matches(&self, order: &Order) -> bool {
        if let Some(month) = self.month() {
            if !order.text("date").starts_with(month) {
                return false;
            }
        }
        if let Some(q) = self.search() {
            let haystack = format!("{}{}", order.text("order_number"), order.text("doc_number"));
            if !haystack.to_lowercase().contains(&q) {
                return false;
            }
        }
        true
    }
}

impl Document {
    /// Material usage totals keyed by material, seeded from the price table
    /// so every priced material appears even without usage. Only injection
    /// items are counted.
    pub fn material_stats(&self, filter: &MaterialStatsFilter) -> Vec<MaterialStat> {
        let mut stats: IndexMap<String, MaterialStat> = IndexMap::new();
        for (i, price) in self.material_prices().iter().enumerate() {
            stats.insert(
                price.material.clone(),
                MaterialStat {
                    seq: i + 1,
                    material: price.material.clone(),
                    unit_price: price.unit_price,
                    notes: price.notes.clone(),
                    total_actual_weight: 0.0,
                    total_amount: 0.0,
                },
            );
        }

        let book = self.book(OrderType::Injection);
        let valid_orders: Option<HashSet<i64>> = filter.is_active().then(|| {
            book.orders
                .iter()
                .filter(|o| filter.matches(o))
                .map(|o| o.id)
                .collect()
        });

        for item in book.items {
            let material = item.text("material");
            if material.is_empty() {
                continue;
            }
            if let Some(valid) = &valid_orders {
                if !valid.contains(&item.order_id) {
                    continue;
                }
            }
            let next_seq = stats.len() + 1;
            let entry = stats.entry(material.clone()).or_insert_with(|| MaterialStat {
                seq: next_seq,
                material,
                unit_price: 0.0,
                notes: String::new(),
                total_actual_weight: 0.0,
                total_amount: 0.0,
            });
            entry.total_actual_weight += numeric_field(item, "actual_weight_kg");
            entry.total_amount += numeric_field(item, "actual_amount_hkd");
        }

        stats.into_values().collect()
    }

    /// One row per injection item, joined with its order header, in stored
    /// order then `sort_order`. `month` filters on the order `date` prefix.
    pub fn injection_costs(&self, month: Option<&str>) -> Vec<InjectionCostRow> {
        let month = month.filter(|m| !m.is_empty());
        let book = self.book(OrderType::Injection);
        let mut rows = Vec::new();
        for order in book.orders {
            let date = order.text("date");
            if let Some(month) = month {
                if !date.starts_with(month) {
                    continue;
                }
            }
            for item in book.items_of(order.id) {
                let injection_cost = item
                    .fields
                    .get("injection_cost")
                    .filter(|v| util::is_truthy(v))
                    .cloned()
                    .unwrap_or(Value::Null);
                rows.push(InjectionCostRow {
                    order_number: order.text("order_number"),
                    doc_number: order.text("doc_number"),
                    date: date.clone(),
                    workshop: order.text("workshop"),
                    mold_id: item.text("mold_id"),
                    mold_name: item.text("mold_name"),
                    injection_cost,
                    notes: item.text("notes"),
                });
            }
        }
        rows
    }

    /// Total and per-status order counts for every order type.
    pub fn order_stats(&self) -> OrderStats {
        let counts = |ty: OrderType| {
            let book = self.book(ty);
            StatusCounts {
                total: book.orders.len(),
                pending: book.count_status(OrderStatus::Pending),
                in_progress: book.count_status(OrderStatus::InProgress),
                done: book.count_status(OrderStatus::Done),
            }
        };
        OrderStats {
            injection: counts(OrderType::Injection),
            slush: counts(OrderType::Slush),
            spray: counts(OrderType::Spray),
        }
    }
}

fn numeric_field(item: &Item, key: &str) -> f64 {
    item.fields.get(key).and_then(util::coerce_f64).unwrap_or(0.0)
}
