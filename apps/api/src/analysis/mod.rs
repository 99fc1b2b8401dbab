//! Career analysis: collects the profile cards, asks the model for a report,
//! and stores it beside the cards and in the history log.

pub mod archive;
pub mod handlers;
pub mod orchestrator;
pub mod prompts;
