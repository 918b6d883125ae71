//! `PostgreSQL` relational backend for the lucky draw registry.
//!
//! Implements the `EventRepository` contract from `lucky-draw-core` over two
//! tables: one row per event and one row per claimed number, with the
//! composite key `(event_name, number)` enforcing uniqueness in storage as
//! well as in memory.
//!
//! `save` reconciles the tables with the in-memory set inside a single
//! transaction: rows for events that are no longer live are deleted (drawn
//! and cancelled events must not come back on the next load), then the
//! remaining rows are upserted.
//!
//! # Example
//!
//! ```ignore
//! use lucky_draw_postgres::PostgresEventRepository;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let repository = PostgresEventRepository::new("postgres://localhost/lucky_draw").await?;
//!     repository.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod repository;

pub use repository::PostgresEventRepository;
