//! # Corpus
//!
//! *corpus — a body of documents.*
//!
//! Corpus is a deferred-query data layer for schemaless, remote
//! document stores that natively support only per-field equality/range
//! filtering and flat document retrieval. It layers a relational-style
//! vocabulary — composable predicates, lazy querysets, groupby-style
//! aggregation, bulk delete — over a thin "collection of free-form
//! documents" transport.
//!
//! ## What's inside
//!
//! ### Deferred querysets
//! A [`QuerySet`] is an immutable query descriptor: every `filter` returns
//! a new one, and the result set materializes at most once per instance.
//!
//! ```rust,ignore
//! let users = Collection::new("users", connector.clone());
//! let admins = users.filter(Q::eq("role", "admin")).await;
//! for user in admins.fetch().await? {
//!     println!("{}", user.id());
//! }
//! ```
//!
//! ### Predicate algebra
//! [`Q`] predicates compose with `&` and `|`. Text search lookups
//! (`name__icontains`) compile to a closed range bounded by a sentinel
//! codepoint, since the store only understands `=`, `>=`, and `<=`. OR is
//! compiled as one native fetch per branch, merged client-side.
//!
//! ### Client-side aggregation
//! `values(&["field"])` groups the materialized records and reports each
//! group's cardinality as `dcount` — the historical behavior, even where a
//! caller meant an average. `values_agg` computes real sums and averages
//! for callers that opt in.
//!
//! ### Soft-offline degradation
//! The [`Connector`] builds the one store handle for the process lazily
//! and exactly once. When construction fails it logs and settles into an
//! absent handle: reads come back empty, `create` echoes without
//! persisting, deletes no-op. Nothing crashes for want of a store.
//!
//! ## Feature flags
//!
//! | Flag     | Default | Description                       |
//! |----------|---------|-----------------------------------|
//! | `sqlite` | ✓       | SQLite document adapter via sqlx  |

pub mod adapters;
pub mod connector;
pub mod error;
pub mod manager;
pub mod query;
pub mod queryset;
pub mod record;
pub mod values;

pub use crate::adapters::Adapter;
pub use crate::connector::{Connector, ConnectorConfig};
pub use crate::error::Error;
pub use crate::manager::Collection;
pub use crate::query::{Comparison, Constraint, FieldValue, Q, ToFieldValue};
pub use crate::queryset::QuerySet;
pub use crate::record::{FieldMap, Record};
pub use crate::values::{Aggregate, GroupRow};
