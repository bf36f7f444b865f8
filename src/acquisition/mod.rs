//! Acquisition: session state machine, its estimator hook and the polling runner.

pub mod controller;
pub mod runner;
pub mod session;

pub use controller::Acquisition;
pub use runner::{AcquisitionRunner, RunReport};
pub use session::{poll, FinishCause, Session, SessionState, Step};
