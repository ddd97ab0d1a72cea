// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
mod application;
pub mod request;
pub mod response;

pub use application::{AbciResult, Application, BoxError};
