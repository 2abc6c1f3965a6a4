//! End-to-end tests across the relation layer and the B-tree engine.
//!
//! Each test file covers one scenario, using deterministic inputs so that
//! failures reproduce.

#![cfg(test)]

mod helpers;

mod test_clustered_table;
mod test_concrete_scenario;
mod test_create_rollback;
mod test_delete_reinsert;
mod test_reopen;
