// Copyright 2025 Infercast Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Infercast CLI
//!
//! Building blocks for the `infercast` binary.
//!
//! - [`inventory`] - reading endpoint addresses from list files and INI inventories
//! - [`prompts`] - prompt files and the movie prompt templates
//! - [`repair`] - pulling JSON objects out of model output
//! - [`smoke`] - sequential one-request-per-endpoint check
//! - [`movies`] - the synopsis and details batch tasks

pub mod inventory;
pub mod movies;
pub mod prompts;
pub mod repair;
pub mod smoke;
