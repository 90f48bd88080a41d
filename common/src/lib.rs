//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

#[macro_use]
extern crate log;

/// Simple timer
pub mod timer;

/// Point-to-point async message pool
pub mod pool;

/// Collections utils
pub mod vectors;
