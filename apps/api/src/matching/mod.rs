//! Matching: scoring one loan application against every eligible lender.
//!
//! `orchestrator` drives the three-phase pipeline, `scoring` owns the LLM
//! comparison, `store` is the orchestrator's persistence seam, and `trigger`
//! dispatches runs from the upload handlers.

pub mod orchestrator;
pub mod prompts;
pub mod scoring;
pub mod store;
pub mod trigger;
