//! Deploy Module
//!
//! Orchestrates one deployment of a source store tree onto a receiver.
//!
//! ## Structure
//!
//! - `options` - Request and tuning types (`DeploymentRequest`, `Destination`, `EngineSettings`)
//! - `state` - Orchestrator state machine (`DeployState`, `StateTracker`)
//! - `walker` - Depth-first tree walk applying merge-join decisions
//! - `use_case` - Core use case logic (`DeployUseCase`)
//!
//! ## Usage
//!
//! ```ignore
//! use treeship::application::deploy::{DeploymentRequest, Destination, DeployUseCase};
//!
//! let use_case = DeployUseCase::new(store, session, locks);
//! let request = DeploymentRequest::new("site:/www".parse()?, Destination::new("web01", 44100, "live", "/"));
//! let report = use_case.execute(&request)?;
//! ```

mod options;
mod state;
mod use_case;
mod walker;

pub use options::{DeploymentRequest, Destination, EngineSettings};
pub use state::{DeployState, StateTracker};
pub use use_case::DeployUseCase;
