//! Gateway: HTTP server for the WhatsApp webhook.
//!
//! Single port serves health checks, the subscription handshake (`GET /webhook`) and
//! webhook deliveries (`POST /webhook`). Deliveries are always acknowledged with 200.

mod server;

pub use server::{build_router, http_client, run_gateway, GatewayState};
