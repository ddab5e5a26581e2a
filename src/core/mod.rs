//! Core tutoring components
//!
//! Sessions own a conversation store and a turn dispatcher; the moon panel is
//! a pure function of the date.

pub mod dispatcher;
pub mod moon;
pub mod session;

pub use dispatcher::{
    DispatchState, DispatcherSettings, IgnoreReason, SubmitOutcome, TurnDispatcher,
};
pub use session::{SessionRegistry, SessionView, TutorSession};
