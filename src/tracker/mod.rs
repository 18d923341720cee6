//! Production order tracker: the HTTP back-end shared by the engineering,
//! molding, painting and warehouse front-ends.
//!
//! ## Overview
//!
//! Every piece of state lives in one JSON document on disk. Each request
//! loads the whole document, reads or mutates it in memory, and writes it
//! back atomically. IDs come from a single counter shared by every
//! collection.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (axum Router, ServerConfig)          │
//! │ (HTML)   │ <─────── │    └─ api.rs  (route handlers, AppState)         │
//! └──────────┘          │         │                                        │
//!                       │         │ StoreHandle::read / write              │
//!                       │         v                                        │
//!                       │  store.rs  (JsonStore, mutex + file lock)        │
//!                       │         │                                        │
//!                       │         │ &Document / &mut Document              │
//!                       │         v                                        │
//!                       │  document.rs  (IdCounter, OrderBook, problems,   │
//!                       │                prices, requisitions)             │
//!                       │  reports.rs   (material stats, injection costs,  │
//!                       │                status counts)                    │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Supporting Modules
//!
//! | Module    | Responsibility                                              |
//! |-----------|-------------------------------------------------------------|
//! | `models`  | Entities and enums: `Order`, `Item`, `OrderType`, `Problem` |
//!
//! ## Typical Request Flow (create an order)
//!
//! 1. `POST /api/{order_type}` → `api::create_order()`
//! 2. The path segment is parsed into an `OrderType`; unknown types are 404.
//! 3. `StoreHandle::write` takes the mutex and an exclusive lock on
//!    `<data file>.lock`, then loads the document.
//! 4. `OrderBookMut::create` allocates the order ID, then one ID per item
//!    with `sort_order` 0..N-1.
//! 5. The document is written to `<data file>.tmp` and renamed into place.

pub mod api;
pub mod document;
pub mod models;
pub mod reports;
pub mod server;
pub mod store;
