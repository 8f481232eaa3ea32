//! End-to-end scenarios for the predeposit guarantee workspace.
//!
//! The actual tests live under `tests/`; this crate only wires the members
//! together.
