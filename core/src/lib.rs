// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Decodes Parquet column chunks into typed, nullable column buffers laid out for
//! GPU-parallel consumption: a dense value array, an LSB-first validity bitmap and a null
//! count per column.

#![allow(clippy::upper_case_acronyms)]
#![deny(clippy::clone_on_ref_ptr)]

use log::{info, LevelFilter};
use log4rs::{
    append::console::{ConsoleAppender, Target},
    config::{load_config_file, Appender, Deserializers, Root},
    encode::pattern::PatternEncoder,
    Config,
};
use once_cell::sync::OnceCell;

use errors::{DecodeError, DecodeResult};

#[macro_use]
pub mod errors;
#[macro_use]
pub mod common;
pub mod parquet;

static LOGGER: OnceCell<()> = OnceCell::new();

/// Installs the log4rs backend for the `log` facade.
///
/// `log_conf_path` names a log4rs YAML config file. `None` or an empty path falls back to a
/// console appender at `INFO`. Only the first successful call has any effect.
pub fn init_logging(log_conf_path: Option<&str>) -> DecodeResult<()> {
    LOGGER.get_or_try_init(|| {
        let log_config = match log_conf_path {
            Some(path) if !path.is_empty() => load_config_file(path, Deserializers::default())
                .map_err(|err| DecodeError::Config(err.to_string()))?,
            _ => default_logger_config()?,
        };

        // another logger may already be installed by the host process
        let _ = log4rs::init_config(log_config);

        info!(
            "gdf-parquet library version {} initialized",
            env!("CARGO_PKG_VERSION")
        );
        Ok::<(), DecodeError>(())
    })?;
    Ok(())
}

const LOG_PATTERN: &str = "{d(%y/%m/%d %H:%M:%S)} {l} {f}: {m}{n}";

// Creates a default log4rs config, which logs to console with `INFO` level.
fn default_logger_config() -> DecodeResult<Config> {
    let console_append = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();
    let appender = Appender::builder().build("console", Box::new(console_append));
    let root = Root::builder().appender("console").build(LevelFilter::Info);
    Config::builder()
        .appender(appender)
        .build(root)
        .map_err(|err| DecodeError::Config(err.to_string()))
}
