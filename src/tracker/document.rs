//! The persisted document and every mutation on it.
//!
//! All entity IDs come from one [`IdCounter`], so an ID is unique across
//! orders, items, problems and requisitions alike. Per-order-type access
//! goes through [`OrderBook`] / [`OrderBookMut`], which borrow the matching
//! order and item vectors plus the shared counter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::models::*;
use crate::errors::TrackerError;
use crate::util;

/// Monotonic ID source shared by every collection (`nextId` on disk).
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct IdCounter(i64);

impl Default for IdCounter {
    fn default() -> Self {
        Self(1)
    }
}

/// A null, string or otherwise unusable `nextId` falls back to the default;
/// [`Document::backfill`] then lifts it above the largest ID present.
impl<'de> Deserialize<'de> for IdCounter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value
            .as_ref()
            .and_then(util::coerce_i64)
            .map(Self)
            .unwrap_or_default())
    }
}

impl IdCounter {
    pub fn peek(&self) -> i64 {
        self.0
    }

    pub fn allocate(&mut self) -> i64 {
        let id = self.0;
        self.0 += 1;
        id
    }

    /// Make sure the next allocation is strictly greater than `max_id`.
    fn ensure_above(&mut self, max_id: i64) -> bool {
        if self.0 <= max_id {
            self.0 = max_id + 1;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    #[serde(default)]
    pub injection_orders: Vec<Order>,
    #[serde(default)]
    pub injection_items: Vec<Item>,
    #[serde(default)]
    pub slush_orders: Vec<Order>,
    #[serde(default)]
    pub slush_items: Vec<Item>,
    #[serde(default)]
    pub spray_orders: Vec<Order>,
    #[serde(default)]
    pub spray_items: Vec<Item>,
    #[serde(default)]
    pub problems: Vec<Problem>,
    #[serde(default)]
    pub material_prices: Option<Vec<MaterialPrice>>,
    #[serde(default)]
    pub material_requisitions: Vec<Requisition>,
    #[serde(rename = "nextId", default)]
    pub next_id: IdCounter,
}

/// Input for [`Document::create_problem`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewProblem {
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
}

/// Filters for [`Document::list_problems`]; both optional, AND-combined.
#[derive(Debug, Clone, Default)]
pub struct ProblemFilter {
    pub order_type: Option<String>,
    /// `Some(None)` is a filter that could not be parsed and matches nothing.
    pub order_id: Option<Option<i64>>,
}

/// Input for [`Document::create_requisition`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewRequisition {
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
}

impl Document {
    /// Fresh document seeded with the given price list.
    pub fn new(default_prices: &[MaterialPrice]) -> Self {
        Self {
            injection_orders: Vec::new(),
            injection_items: Vec::new(),
            slush_orders: Vec::new(),
            slush_items: Vec::new(),
            spray_orders: Vec::new(),
            spray_items: Vec::new(),
            problems: Vec::new(),
            material_prices: Some(default_prices.to_vec()),
            material_requisitions: Vec::new(),
            next_id: IdCounter::default(),
        }
    }

    /// Bring a document written by an older version up to the current
    /// schema. Returns true when anything was changed.
    pub fn backfill(&mut self, default_prices: &[MaterialPrice]) -> bool {
        let mut changed = false;
        if self.material_prices.is_none() {
            self.material_prices = Some(default_prices.to_vec());
            changed = true;
        }
        let max_id = self.max_id();
        changed |= self.next_id.ensure_above(max_id);
        changed
    }

    /// Largest ID used by any entity, or 0 for an empty document.
    pub fn max_id(&self) -> i64 {
        let order_ids = OrderType::ALL.into_iter().flat_map(move |ty| {
            let OrderBook { orders, items, .. } = self.book(ty);
            orders.iter().map(|o| o.id).chain(items.iter().map(|i| i.id))
        });
        order_ids
            .chain(self.problems.iter().map(|p| p.id))
            .chain(self.material_requisitions.iter().map(|r| r.id))
            .max()
            .unwrap_or(0)
    }

    pub fn book(&self, order_type: OrderType) -> OrderBook<'_> {
        let (orders, items) = match order_type {
            OrderType::Injection => (&self.injection_orders, &self.injection_items),
            OrderType::Slush => (&self.slush_orders, &self.slush_items),
            OrderType::Spray => (&self.spray_orders, &self.spray_items),
        };
        OrderBook {
            order_type,
            orders,
            items,
        }
    }

    pub fn book_mut(&mut self, order_type: OrderType) -> OrderBookMut<'_> {
        let (orders, items) = match order_type {
            OrderType::Injection => (&mut self.injection_orders, &mut self.injection_items),
            OrderType::Slush => (&mut self.slush_orders, &mut self.slush_items),
            OrderType::Spray => (&mut self.spray_orders, &mut self.spray_items),
        };
        OrderBookMut {
            order_type,
            orders,
            items,
            ids: &mut self.next_id,
        }
    }

    // ── Problems ─────────────────────────────────────────────────────

    pub fn create_problem(&mut self, new: NewProblem, now: DateTime<Utc>) -> Problem {
        let problem = Problem {
            id: self.next_id.allocate(),
            order_type: new.order_type,
            order_id: new.order_id,
            order_number: new.order_number,
            description: new.description,
            reported_by: new.reported_by,
            status: ProblemStatus::Pending.as_str().to_string(),
            created_at: util::iso_timestamp(now),
            resolved_at: None,
        };
        self.problems.push(problem.clone());
        problem
    }

    pub fn list_problems(&self, filter: &ProblemFilter) -> Vec<Problem> {
        let mut list: Vec<Problem> = self
            .problems
            .iter()
            .filter(|p| match &filter.order_type {
                Some(ty) => &p.order_type == ty,
                None => true,
            })
            .filter(|p| match filter.order_id {
                Some(id) => id.is_some() && p.order_id == id,
                None => true,
            })
            .cloned()
            .collect();
        list.sort_by(|a, b| b.id.cmp(&a.id));
        list
    }

    pub fn resolve_problem(&mut self, id: i64, now: DateTime<Utc>) -> Result<Problem, TrackerError> {
        let problem = self
            .problems
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(TrackerError::ProblemNotFound { id })?;
        problem.status = ProblemStatus::Resolved.as_str().to_string();
        problem.resolved_at = Some(util::iso_timestamp(now));
        Ok(problem.clone())
    }

    // ── Material prices ──────────────────────────────────────────────

    pub fn material_prices(&self) -> &[MaterialPrice] {
        self.material_prices.as_deref().unwrap_or(&[])
    }

    pub fn replace_material_prices(&mut self, prices: Vec<MaterialPrice>) -> &[MaterialPrice] {
        self.material_prices.insert(prices)
    }

    // ── Requisitions ─────────────────────────────────────────────────

    /// Create a requisition numbered `LL-YYYYMMDD-NNN`, where `NNN` counts
    /// the requisitions already carrying today's date stamp.
    pub fn create_requisition(&mut self, new: NewRequisition, now: DateTime<Utc>) -> Requisition {
        let date_stamp = now.format("%Y%m%d").to_string();
        let seq = self
            .material_requisitions
            .iter()
            .filter(|r| r.req_number.contains(&date_stamp))
            .count()
            + 1;
        let date = if new.date.is_empty() {
            now.format("%Y-%m-%d").to_string()
        } else {
            new.date
        };
        let requisition = Requisition {
            id: self.next_id.allocate(),
            req_number: format!("LL-{}-{:03}", date_stamp, seq),
            date,
            order_id: new.order_id.filter(|id| *id != 0),
            order_number: new.order_number,
            material: new.material,
            requested_weight_kg: new.requested_weight_kg,
            applicant: new.applicant,
            notes: new.notes,
            status: RequisitionStatus::PendingIssue.as_str().to_string(),
            issued_at: None,
            created_at: util::iso_timestamp(now),
        };
        self.material_requisitions.push(requisition.clone());
        requisition
    }

    pub fn list_requisitions(&self, order_id: Option<Option<i64>>) -> Vec<Requisition> {
        let mut list: Vec<Requisition> = self
            .material_requisitions
            .iter()
            .filter(|r| match order_id {
                Some(id) => id.is_some() && r.order_id == id,
                None => true,
            })
            .cloned()
            .collect();
        list.sort_by(|a, b| b.id.cmp(&a.id));
        list
    }

    pub fn set_requisition_status(
        &mut self,
        id: i64,
        status: String,
        now: DateTime<Utc>,
    ) -> Result<Requisition, TrackerError> {
        let requisition = self
            .material_requisitions
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(TrackerError::RequisitionNotFound { id })?;
        if status == RequisitionStatus::Issued.as_str() {
            requisition.issued_at = Some(util::iso_timestamp(now));
        }
        requisition.status = status;
        Ok(requisition.clone())
    }

    /// Remove a requisition; returns whether one was removed.
    pub fn delete_requisition(&mut self, id: i64) -> bool {
        let before = self.material_requisitions.len();
        self.material_requisitions.retain(|r| r.id != id);
        self.material_requisitions.len() != before
    }
}

/// Read-only view of one order type's orders and items.
pub struct OrderBook<'a> {
    pub order_type: OrderType,
    pub orders: &'a [Order],
    pub items: &'a [Item],
}

impl<'a> OrderBook<'a> {
    /// Items of one order, by `sort_order` ascending.
    pub fn items_of(&self, order_id: i64) -> Vec<Item> {
        let mut items: Vec<Item> = self
            .items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| i.sort_order);
        items
    }

    /// All orders, newest first, each with its items.
    pub fn list(&self) -> Vec<OrderWithItems> {
        let mut orders: Vec<&Order> = self.orders.iter().collect();
        orders.sort_by(|a, b| b.id.cmp(&a.id));
        orders
            .into_iter()
            .map(|o| OrderWithItems {
                order: o.clone(),
                items: self.items_of(o.id),
            })
            .collect()
    }

    pub fn get(&self, id: i64) -> Option<OrderWithItems> {
        let order = self.orders.iter().find(|o| o.id == id)?;
        Some(OrderWithItems {
            order: order.clone(),
            items: self.items_of(id),
        })
    }

    pub fn count_status(&self, status: OrderStatus) -> usize {
        self.orders
            .iter()
            .filter(|o| o.status == status.as_str())
            .count()
    }
}

/// Mutable view of one order type plus the document's shared ID counter.
pub struct OrderBookMut<'a> {
    pub order_type: OrderType,
    orders: &'a mut Vec<Order>,
    items: &'a mut Vec<Item>,
    ids: &'a mut IdCounter,
}

impl<'a> OrderBookMut<'a> {
    pub fn view(&self) -> OrderBook<'_> {
        OrderBook {
            order_type: self.order_type,
            orders: self.orders.as_slice(),
            items: self.items.as_slice(),
        }
    }

    /// Create an order. A missing or empty `status` defaults to pending;
    /// client-supplied bookkeeping keys are ignored.
    pub fn create(
        &mut self,
        mut header: Fields,
        items: Option<Vec<Fields>>,
        now: DateTime<Utc>,
    ) -> OrderWithItems {
        let stamp = util::iso_timestamp(now);
        let status = match header.remove("status") {
            Some(value) if util::is_truthy(&value) => util::loose_string(value),
            _ => OrderStatus::Pending.as_str().to_string(),
        };
        for key in ["id", "created_at", "updated_at"] {
            header.remove(key);
        }

        let order = Order {
            id: self.ids.allocate(),
            status,
            created_at: stamp.clone(),
            updated_at: stamp,
            fields: header,
        };
        self.orders.push(order.clone());
        let items = self.push_items(order.id, items.unwrap_or_default());
        OrderWithItems { order, items }
    }

    /// Shallow-merge `header` into the order. When `items` is supplied every
    /// existing item of the order is discarded and replaced.
    pub fn update(
        &mut self,
        id: i64,
        header: Fields,
        items: Option<Vec<Fields>>,
        now: DateTime<Utc>,
    ) -> Result<OrderWithItems, TrackerError> {
        let order_type = self.order_type;
        let order = self
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(TrackerError::OrderNotFound { order_type, id })?;

        for (key, value) in header {
            match key.as_str() {
                "id" | "updated_at" => {}
                "status" => order.status = util::loose_string(value),
                "created_at" => order.created_at = util::loose_string(value),
                _ => {
                    order.fields.insert(key, value);
                }
            }
        }
        order.updated_at = util::iso_timestamp(now);

        if let Some(items) = items {
            self.items.retain(|i| i.order_id != id);
            self.push_items(id, items);
        }

        self.view()
            .get(id)
            .ok_or(TrackerError::OrderNotFound { order_type, id })
    }

    /// Remove the order and its items. Missing orders are ignored.
    pub fn delete(&mut self, id: i64) -> bool {
        let before = self.orders.len();
        self.orders.retain(|o| o.id != id);
        self.items.retain(|i| i.order_id != id);
        self.orders.len() != before
    }

    /// Set status and `updated_at`. Returns false (and changes nothing) when
    /// the order does not exist.
    pub fn set_status(&mut self, id: i64, status: String, now: DateTime<Utc>) -> bool {
        match self.orders.iter_mut().find(|o| o.id == id) {
            Some(order) => {
                order.status = status;
                order.updated_at = util::iso_timestamp(now);
                true
            }
            None => false,
        }
    }

    /// Merge partial field updates into items of one order. Each update is
    /// matched by `(id, order_id)`; unmatched updates are skipped. Returns
    /// the number of items touched.
    pub fn patch_items(&mut self, order_id: i64, updates: Vec<(i64, Fields)>) -> usize {
        let mut touched = 0;
        for (item_id, fields) in updates {
            if let Some(item) = self
                .items
                .iter_mut()
                .find(|i| i.id == item_id && i.order_id == order_id)
            {
                item.merge_fields(fields);
                touched += 1;
            }
        }
        touched
    }

    /// Append items in array order with fresh IDs and `sort_order` 0..N-1.
    fn push_items(&mut self, order_id: i64, items: Vec<Fields>) -> Vec<Item> {
        let mut created = Vec::with_capacity(items.len());
        for (position, mut fields) in items.into_iter().enumerate() {
            for key in Item::RESERVED {
                fields.remove(key);
            }
            let item = Item {
                id: self.ids.allocate(),
                order_id,
                sort_order: position as i64,
                fields,
            };
            self.items.push(item.clone());
            created.push(item);
        }
        created
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::{Value, json};
    use std::collections::HashSet;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap()
    }

    fn later() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 10, 0, 0).unwrap()
    }

    fn fields_from(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => Fields::new(),
        }
    }

    fn items(values: &[Value]) -> Option<Vec<Fields>> {
        Some(values.iter().cloned().map(fields_from).collect())
    }

    #[test]
    fn test_new_document_starts_counter_at_one() {
        let doc = Document::new(&[MaterialPrice::new("ABS", 18.0)]);
        assert_eq!(doc.next_id.peek(), 1);
        assert_eq!(doc.material_prices().len(), 1);
        assert_eq!(doc.max_id(), 0);
    }

    #[test]
    fn test_unusable_next_id_is_repaired_by_backfill() {
        let mut doc: Document = serde_json::from_value(json!({
            "problems": [{"id": 9}],
            "nextId": null
        }))
        .unwrap();
        assert_eq!(doc.next_id.peek(), 1);
        assert!(doc.backfill(&[]));
        assert_eq!(doc.next_id.peek(), 10);

        let doc: Document = serde_json::from_value(json!({"nextId": "40"})).unwrap();
        assert_eq!(doc.next_id.peek(), 40);
    }

    #[test]
    fn test_create_order_defaults_status_and_stamps() {
        let mut doc = Document::new(&[]);
        let created = doc.book_mut(OrderType::Injection).create(
            fields_from(json!({"order_number": "PO-1", "id": 999, "status": ""})),
            None,
            now(),
        );
        assert_eq!(created.order.id, 1);
        assert_eq!(created.order.status, "待生产");
        assert_eq!(created.order.created_at, "2026-10-18T09:00:00.000Z");
        assert_eq!(created.order.created_at, created.order.updated_at);
        assert_eq!(created.order.text("order_number"), "PO-1");
        assert!(!created.order.fields.contains_key("id"));
        assert!(created.items.is_empty());
    }

    #[test]
    fn test_create_order_keeps_supplied_status() {
        let mut doc = Document::new(&[]);
        let created = doc
            .book_mut(OrderType::Spray)
            .create(fields_from(json!({"status": "生产中"})), None, now());
        assert_eq!(created.order.status, "生产中");
    }

    #[test]
    fn test_create_order_with_items_assigns_sequential_sort_order() {
        let mut doc = Document::new(&[]);
        let created = doc.book_mut(OrderType::Slush).create(
            Fields::new(),
            items(&[json!({"material": "PVC"}), json!({"material": "TPR", "sort_order": 42}), json!({"material": "PP"})]),
            now(),
        );
        let sort_orders: Vec<i64> = created.items.iter().map(|i| i.sort_order).collect();
        assert_eq!(sort_orders, vec![0, 1, 2]);
        let materials: Vec<String> = created.items.iter().map(|i| i.text("material")).collect();
        assert_eq!(materials, vec!["PVC", "TPR", "PP"]);
        assert!(created.items.iter().all(|i| i.order_id == created.order.id));
        assert_eq!(doc.next_id.peek(), 5);
    }

    #[test]
    fn test_ids_are_unique_across_every_collection() {
        let mut doc = Document::new(&[]);
        let mut seen = HashSet::new();
        for ty in OrderType::ALL {
            let created = doc
                .book_mut(ty)
                .create(Fields::new(), items(&[json!({}), json!({})]), now());
            assert!(seen.insert(created.order.id));
            for item in created.items {
                assert!(seen.insert(item.id));
            }
        }
        let problem = doc.create_problem(NewProblem::default(), now());
        assert!(seen.insert(problem.id));
        let requisition = doc.create_requisition(NewRequisition::default(), now());
        assert!(seen.insert(requisition.id));
        assert_eq!(seen.len(), 11);
    }

    #[test]
    fn test_list_sorts_orders_desc_and_items_asc() {
        let mut doc = Document::new(&[]);
        let mut book = doc.book_mut(OrderType::Injection);
        book.create(Fields::new(), None, now());
        book.create(Fields::new(), items(&[json!({"n": 0}), json!({"n": 1})]), now());
        book.create(Fields::new(), None, now());

        // Shuffle storage order to prove the sort does the work.
        doc.injection_items.reverse();
        doc.injection_orders.swap(0, 1);

        let listed = doc.book(OrderType::Injection).list();
        let ids: Vec<i64> = listed.iter().map(|o| o.order.id).collect();
        assert_eq!(ids, vec![5, 2, 1]);
        let with_items = listed.iter().find(|o| o.order.id == 2).unwrap();
        let sort_orders: Vec<i64> = with_items.items.iter().map(|i| i.sort_order).collect();
        assert_eq!(sort_orders, vec![0, 1]);
    }

    #[test]
    fn test_get_missing_order_is_none() {
        let doc = Document::new(&[]);
        assert!(doc.book(OrderType::Spray).get(1).is_none());
    }

    #[test]
    fn test_update_merges_header_shallowly() {
        let mut doc = Document::new(&[]);
        let created = doc.book_mut(OrderType::Injection).create(
            fields_from(json!({"order_number": "PO-7", "workshop": "A"})),
            None,
            now(),
        );
        let updated = doc
            .book_mut(OrderType::Injection)
            .update(
                created.order.id,
                fields_from(json!({"workshop": "B", "id": 500})),
                None,
                later(),
            )
            .unwrap();
        assert_eq!(updated.order.id, created.order.id);
        assert_eq!(updated.order.text("order_number"), "PO-7");
        assert_eq!(updated.order.text("workshop"), "B");
        assert_eq!(updated.order.created_at, "2026-10-18T09:00:00.000Z");
        assert_eq!(updated.order.updated_at, "2026-10-18T10:00:00.000Z");
    }

    #[test]
    fn test_update_without_items_keeps_items() {
        let mut doc = Document::new(&[]);
        let created = doc
            .book_mut(OrderType::Slush)
            .create(Fields::new(), items(&[json!({"a": 1})]), now());
        let updated = doc
            .book_mut(OrderType::Slush)
            .update(created.order.id, Fields::new(), None, later())
            .unwrap();
        assert_eq!(updated.items, created.items);
    }

    #[test]
    fn test_update_with_items_replaces_all_previous_items() {
        let mut doc = Document::new(&[]);
        let created = doc.book_mut(OrderType::Injection).create(
            Fields::new(),
            items(&[json!({"m": "old1"}), json!({"m": "old2"})]),
            now(),
        );
        let old_ids: HashSet<i64> = created.items.iter().map(|i| i.id).collect();

        let updated = doc
            .book_mut(OrderType::Injection)
            .update(created.order.id, Fields::new(), items(&[json!({"m": "new"})]), later())
            .unwrap();
        assert_eq!(updated.items.len(), 1);
        assert_eq!(updated.items[0].sort_order, 0);
        assert!(!old_ids.contains(&updated.items[0].id));

        let fetched = doc.book(OrderType::Injection).get(created.order.id).unwrap();
        assert!(fetched.items.iter().all(|i| !old_ids.contains(&i.id)));
        assert_eq!(doc.injection_items.len(), 1);
    }

    #[test]
    fn test_update_missing_order_is_not_found() {
        let mut doc = Document::new(&[]);
        let err = doc
            .book_mut(OrderType::Spray)
            .update(77, Fields::new(), None, now())
            .unwrap_err();
        assert!(matches!(err, TrackerError::OrderNotFound { id: 77, order_type: OrderType::Spray }));
    }

    #[test]
    fn test_delete_cascades_only_to_own_items() {
        let mut doc = Document::new(&[]);
        let mut book = doc.book_mut(OrderType::Injection);
        let first = book.create(Fields::new(), items(&[json!({}), json!({})]), now());
        let second = book.create(Fields::new(), items(&[json!({"keep": true})]), now());

        assert!(book.delete(first.order.id));
        assert!(!book.delete(first.order.id));

        let view = doc.book(OrderType::Injection);
        assert!(view.get(first.order.id).is_none());
        assert_eq!(view.get(second.order.id).unwrap().items, second.items);
        assert_eq!(doc.injection_items.len(), 1);
    }

    #[test]
    fn test_set_status_on_missing_order_changes_nothing() {
        let mut doc = Document::new(&[]);
        doc.book_mut(OrderType::Slush).create(Fields::new(), None, now());
        let before = doc.clone();
        assert!(!doc.book_mut(OrderType::Slush).set_status(99, "已完成".into(), later()));
        assert_eq!(doc, before);
    }

    #[test]
    fn test_set_status_stamps_updated_at() {
        let mut doc = Document::new(&[]);
        let created = doc.book_mut(OrderType::Slush).create(Fields::new(), None, now());
        assert!(doc.book_mut(OrderType::Slush).set_status(created.order.id, "已完成".into(), later()));
        let order = &doc.slush_orders[0];
        assert_eq!(order.status, "已完成");
        assert_eq!(order.updated_at, "2026-10-18T10:00:00.000Z");
    }

    #[test]
    fn test_patch_items_matches_id_and_order() {
        let mut doc = Document::new(&[]);
        let mut book = doc.book_mut(OrderType::Injection);
        let first = book.create(Fields::new(), items(&[json!({"material": "ABS"})]), now());
        let second = book.create(Fields::new(), items(&[json!({"material": "PP"})]), now());

        let updates = vec![
            (
                first.items[0].id,
                fields_from(json!({"actual_weight_kg": 10, "sort_order": 9})),
            ),
            // Belongs to the other order: must be skipped.
            (second.items[0].id, fields_from(json!({"actual_weight_kg": 99}))),
        ];
        assert_eq!(book.patch_items(first.order.id, updates), 1);

        let first_item = &doc.book(OrderType::Injection).get(first.order.id).unwrap().items[0];
        assert_eq!(first_item.fields["actual_weight_kg"], 10);
        assert_eq!(first_item.text("material"), "ABS");
        assert_eq!(first_item.sort_order, 0);
        let second_item = &doc.book(OrderType::Injection).get(second.order.id).unwrap().items[0];
        assert!(!second_item.fields.contains_key("actual_weight_kg"));
    }

    #[test]
    fn test_problems_filter_and_sort() {
        let mut doc = Document::new(&[]);
        for (ty, order_id) in [("injection", 1), ("slush", 1), ("injection", 2)] {
            doc.create_problem(
                NewProblem {
                    order_type: ty.into(),
                    order_id: Some(order_id),
                    ..Default::default()
                },
                now(),
            );
        }

        let all = doc.list_problems(&ProblemFilter::default());
        let ids: Vec<i64> = all.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert!(all.iter().all(|p| p.status == "待处理" && p.resolved_at.is_none()));

        let filtered = doc.list_problems(&ProblemFilter {
            order_type: Some("injection".into()),
            order_id: Some(Some(1)),
        });
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, 1);

        let unparsable = doc.list_problems(&ProblemFilter {
            order_type: None,
            order_id: Some(None),
        });
        assert!(unparsable.is_empty());
    }

    #[test]
    fn test_resolve_problem() {
        let mut doc = Document::new(&[]);
        let problem = doc.create_problem(NewProblem::default(), now());
        let resolved = doc.resolve_problem(problem.id, later()).unwrap();
        assert_eq!(resolved.status, "已解决");
        assert_eq!(resolved.resolved_at.as_deref(), Some("2026-10-18T10:00:00.000Z"));
        assert!(matches!(
            doc.resolve_problem(999, later()),
            Err(TrackerError::ProblemNotFound { id: 999 })
        ));
    }

    #[test]
    fn test_replace_material_prices_overwrites_list() {
        let mut doc = Document::new(&[MaterialPrice::new("ABS", 18.0), MaterialPrice::new("PP", 9.0)]);
        let stored = doc.replace_material_prices(vec![MaterialPrice::new("PC", 30.0)]);
        assert_eq!(stored.len(), 1);
        assert_eq!(doc.material_prices()[0].material, "PC");
    }

    #[test]
    fn test_requisition_numbers_count_per_day() {
        let mut doc = Document::new(&[]);
        let numbers: Vec<String> = (0..3)
            .map(|_| doc.create_requisition(NewRequisition::default(), now()).req_number)
            .collect();
        assert_eq!(numbers, vec!["LL-20261018-001", "LL-20261018-002", "LL-20261018-003"]);

        let next_day = Utc.with_ymd_and_hms(2026, 10, 19, 1, 0, 0).unwrap();
        let req = doc.create_requisition(NewRequisition::default(), next_day);
        assert_eq!(req.req_number, "LL-20261019-001");
    }

    #[test]
    fn test_requisition_defaults() {
        let mut doc = Document::new(&[]);
        let req = doc.create_requisition(
            NewRequisition {
                order_id: Some(0),
                material: "ABS".into(),
                ..Default::default()
            },
            now(),
        );
        assert_eq!(req.date, "2026-10-18");
        assert_eq!(req.order_id, None);
        assert_eq!(req.status, "待出库");
        assert_eq!(req.requested_weight_kg, 0.0);
        assert!(req.issued_at.is_none());

        let dated = doc.create_requisition(
            NewRequisition {
                date: "2026-10-01".into(),
                order_id: Some(4),
                ..Default::default()
            },
            now(),
        );
        assert_eq!(dated.date, "2026-10-01");
        assert_eq!(dated.order_id, Some(4));
    }

    #[test]
    fn test_requisition_status_and_delete() {
        let mut doc = Document::new(&[]);
        let req = doc.create_requisition(NewRequisition::default(), now());

        let pending = doc.set_requisition_status(req.id, "待出库".into(), later()).unwrap();
        assert!(pending.issued_at.is_none());

        let issued = doc.set_requisition_status(req.id, "已出库".into(), later()).unwrap();
        assert_eq!(issued.status, "已出库");
        assert_eq!(issued.issued_at.as_deref(), Some("2026-10-18T10:00:00.000Z"));

        assert!(matches!(
            doc.set_requisition_status(404, "已出库".into(), later()),
            Err(TrackerError::RequisitionNotFound { id: 404 })
        ));

        assert!(doc.delete_requisition(req.id));
        assert!(!doc.delete_requisition(req.id));
    }

    #[test]
    fn test_list_requisitions_filters_by_order() {
        let mut doc = Document::new(&[]);
        for order_id in [Some(3), None, Some(3)] {
            doc.create_requisition(
                NewRequisition {
                    order_id,
                    ..Default::default()
                },
                now(),
            );
        }
        let ids: Vec<i64> = doc.list_requisitions(Some(Some(3))).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(doc.list_requisitions(None).len(), 3);
    }

    #[test]
    fn test_backfill_fills_prices_and_raises_counter() {
        let mut doc: Document = serde_json::from_value(json!({
            "injection_orders": [{"id": 40, "status": "待生产"}],
            "problems": [{"id": 41}],
            "nextId": 5
        }))
        .unwrap();
        assert!(doc.material_prices.is_none());

        assert!(doc.backfill(&[MaterialPrice::new("ABS", 18.0)]));
        assert_eq!(doc.material_prices().len(), 1);
        assert_eq!(doc.next_id.peek(), 42);
        assert!(doc.material_requisitions.is_empty());
        assert!(!doc.backfill(&[]));
    }

    #[test]
    fn test_document_serializes_next_id_key() {
        let doc = Document::new(&[]);
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["nextId"], 1);
        assert_eq!(value["material_requisitions"], json!([]));
    }
}
