//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types and functions for
//! easy glob importing:
//!
//! ```ignore
//! use courier::prelude::*;
//! ```

pub use crate::{
    Body, Direction, Doer, DoerExt, Error, Method, Pipeline, PipelineConfig, Request,
    RequestBuilder, Response, Result, SharedPool, StatusCode, Url, from_json, header, to_json,
};
pub use serde::{Deserialize, Serialize};
