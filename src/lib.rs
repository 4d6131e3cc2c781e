//! Exam timetabling engine.
//!
//! The [ilp] module holds a generic bounded-integer linear model and a
//! deterministic branch-and-bound solver. The [sched] module translates an
//! exam calendar, a subject catalogue, conflict data and per-student burden
//! caps into such a model and drives it to a timetable.

pub mod ilp;
pub mod sched;
