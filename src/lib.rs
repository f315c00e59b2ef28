//! Gate expensive or long-lived resources behind a count of their active users.
//!
//! [`Refcounter`] is the core primitive. [`Dispatcher`] and [`Producer`] are two ways of
//! driving a resource from it: through acquire/release hooks, and through
//! [`Refcounter::decrement_and_test`] with caller-driven teardown.

#![forbid(unsafe_code)]

mod panic;

pub mod constants;
pub mod dispatch;
pub mod error;
pub mod producer;
pub mod refcount;
pub mod worker;

pub use dispatch::{DispatchReport, Dispatcher, Handler, HandlerId, Registration};
pub use error::Error;
pub use producer::Producer;
pub use refcount::{Refcounter, Underflow};
pub use worker::Worker;
