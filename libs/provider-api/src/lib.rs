//! Provider API wire models
//!
//! Shapes of the hosting provider's deployments API (Vercel `v13`). The
//! orchestrator converts these into its own fixed descriptor type and never
//! passes them further.

pub mod models;
