//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
#![crate_name = "protocol"]

#[macro_use]
extern crate log;

pub mod secure_join;

pub mod shared {
    /// Type of the input expected right now
    pub type TDomain = u64;

    /// Feature matrix type, column major
    pub type TFeatures = Vec<Vec<TDomain>>;
}
