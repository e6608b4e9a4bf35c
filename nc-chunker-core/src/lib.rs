#![doc = "nc-chunker-core: core pipeline library for nc-chunker."]

//! Resolves NetCDF/HDF5 sources (local or remote), indexes each one into a
//! per-source chunk-index artifact, and consolidates the artifacts of a dataset
//! into a single merged index.
//!
//! # Usage
//! Build a [`config::ChunkerConfig`], pick collaborators (the defaults are
//! [`storage::DefaultStorage`], [`translate::SignatureTranslator`] and
//! [`combine::GroupStackCombiner`]) and call [`pipeline::run`].

pub mod combine;
pub mod config;
pub mod consolidate;
pub mod contract;
pub mod error;
pub mod index_store;
pub mod indexer;
pub mod pipeline;
pub mod resolve;
pub mod storage;
pub mod translate;
