//! Caregraph - graph aggregation and recursive mutation for clinical record trees
//!
//! This crate provides the generic engine that lets domain entities (patients,
//! records, diagnoses, management plans, ...) be treated as nested trees over an
//! entity-relationship graph:
//! - Static schema registry with a memoized relation cache
//! - Composite Cypher query generation (one round trip per nested subtree)
//! - Materialization of aggregated rows into JSON entity trees
//! - Recursive patch/delete engines over a live entity arena

pub mod clinical;
pub mod composite_query;
pub mod config;
pub mod entity_registry;
pub mod materializer;
pub mod mutation;
pub mod store;
