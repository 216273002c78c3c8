//! # vidnest
//!
//! A social-video REST backend. Users publish videos, comment, like, post
//! short text updates, subscribe to channels and curate playlists. Every
//! read endpoint returns a viewer-relative view (counts plus "does the
//! caller like / follow this" flags) produced by a single SQL statement.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │    routes    │──▶│    store     │──▶│    SQLite    │
//! │ axum + auth  │   │ view shaping │   │   (sqlx)     │
//! └──────┬───────┘   └──────────────┘   └──────────────┘
//!        │
//!        ├──────────▶ media  (local dir / Cloudinary)
//!        └──────────▶ oauth  (Google sign-in)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! vidnest --config ./config/vidnest.toml init
//! vidnest --config ./config/vidnest.toml serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | Connection pool |
//! | [`migrate`] | Schema creation |
//! | [`models`] | Records, views and id helpers |
//! | [`pagination`] | Page and sort contract |
//! | [`store`] | Queries and view shaping per entity |
//! | [`auth`] | Passwords, JWT sessions, the `AuthUser` extractor |
//! | [`media`] | Media storage backends |
//! | [`oauth`] | Google identity federation |
//! | [`routes`] | HTTP handlers |
//! | [`server`] | Router, layers and the serve loop |
//! | [`error`] | Error taxonomy and JSON error body |
//! | [`logging`] | Tracing subscriber setup |

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod media;
pub mod migrate;
pub mod models;
pub mod oauth;
pub mod pagination;
pub mod routes;
pub mod server;
pub mod store;
