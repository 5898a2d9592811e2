//! sorting-hat - An interactive file relocation utility
//!
//! This library relocates files, directories and zip archives into
//! categorized destination trees. Each path becomes a [`Job`] whose
//! destination is built interactively from its author tag and name; jobs are
//! moved in a batch, and conflicts or files in use are resolved afterwards
//! with user-chosen policies.

pub mod builder;
pub mod cli;
pub mod config;
pub mod fsops;
pub mod job;
pub mod naming;
pub mod orchestrator;
pub mod output;
pub mod policy;
pub mod prompt;
pub mod result;

pub use builder::{BuildError, DestinationBuilder};
pub use config::{Config, ConfigError, Subcategory, ValidatedConfig};
pub use fsops::{FailureKind, MoveError};
pub use job::{Job, JobKind, ValidationError};
pub use orchestrator::{Orchestrator, RunSummary};
pub use policy::{BusyPolicy, DuplicatePolicy, Policy};
pub use prompt::{AnswerSource, ConsoleAnswers, PromptError, ScriptedAnswers, StopFlag};
pub use result::{Action, MoveResult, MoveStatus};

pub use cli::{Args, RunError, run_cli};
