// Copyright 2021-2024 Fastly, Inc.

pub mod check;
pub mod compare;
pub mod report;
pub mod snapshot;
pub mod state;
pub mod util;
