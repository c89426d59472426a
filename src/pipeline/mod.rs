//! Pipeline stages for content routing and field extraction.
//!
//! Each submodule is one step, and every step except extraction is a pure
//! function of its inputs.
//!
//! ## Data Flow
//!
//! ```text
//! content_type ──▶ extract ──▶ route ──▶ request ──▶ [inference] ──▶ response
//! (media type)     (lopdf)     (once)    (blocks)                    (record)
//!                     │
//!                  classify + encode
//! ```
//!
//! 1. [`content_type`]: declared media type to `Document`, `Image` or
//!    `Unsupported`, plus the concrete sub-format
//! 2. [`extract`]: decode each page's image XObjects in `spawn_blocking`;
//!    failures are logged and skipped
//! 3. [`classify`]: logo vs scanned document from `(width, height)` alone
//! 4. [`encode`]: re-encode extracted images as JPEG; base64 for wire bodies
//! 5. [`route`]: pick exactly one [`route::ProcessingRoute`]
//! 6. [`request`]: ordered content blocks, system instruction, decoding
//! 7. [`response`]: JSON object to flat attributes with provenance

pub mod classify;
pub mod content_type;
pub mod encode;
pub mod extract;
pub mod request;
pub mod response;
pub mod route;
