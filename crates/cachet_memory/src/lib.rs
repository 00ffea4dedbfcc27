// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-memory storage adapter for the `cachet` caching library.
//!
//! This crate provides [`MemoryAdapter`], a process-local backend built on
//! moka with per-entry TTL expiration and TTL-bounded lock records. It is
//! the reference adapter: fast enough for production L1 tiers and
//! deterministic enough for tests.

mod adapter;
mod builder;

#[doc(inline)]
pub use adapter::MemoryAdapter;
#[doc(inline)]
pub use builder::MemoryAdapterBuilder;
