// Copyright (c) 2024-2026 Ikigai Contributors
//
// SPDX-License-Identifier: Apache-2.0
mod credentials;
mod loader;
mod paths;
mod schema;

pub use credentials::{api_key_env_var, resolve_api_key, Credentials};
pub use loader::load;
pub use paths::Paths;
pub use schema::*;
