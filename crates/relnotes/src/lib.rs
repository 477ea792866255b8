//! Posts a plain-text deployment report for the latest Azure DevOps release
//! of a branch to a Slack channel.

pub mod cli;
pub mod config;
pub mod devops;
pub mod lookup;
pub mod model;
pub mod orchestrator;
pub mod report;
pub mod sink;

#[cfg(test)]
mod fakes;
