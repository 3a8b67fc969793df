//! API Module
//!
//! HTTP handlers and routing for the admin console REST API.
//!
//! # Endpoints
//! - `GET /health`, `GET /cache/stats`
//! - `GET /applications`, `GET /usage`
//! - `GET /users`, `GET /users/stats`, `PATCH /users/:id/status`, `DELETE /users/:id`
//! - `GET /licenses`, `POST /licenses`, `GET /licenses/stats`, `DELETE /licenses/:id`
//! - `POST /licenses/verify`, `POST /licenses/redeem`

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
