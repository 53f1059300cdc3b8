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

//! HyperJoin split planner binary.

use std::env;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::sync::Arc;

use clap::Parser;
use hyperjoin_core::catalog::InMemoryBucketCatalog;
use hyperjoin_core::error::Result;
use hyperjoin_core::HYPERJOIN_VERSION;
use hyperjoin_planner::config::Config;
use hyperjoin_planner::planner::JoinSplitPlanner;
use log::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // parse options
    let opt = Config::parse();

    let rust_log = env::var(EnvFilter::DEFAULT_ENV);
    let log_filter = EnvFilter::new(rust_log.unwrap_or(opt.log_level_setting.clone()));

    // logs go to stderr, stdout carries the plan
    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_thread_names(opt.print_thread_info)
        .with_thread_ids(opt.print_thread_info)
        .with_writer(io::stderr)
        .with_env_filter(log_filter)
        .init();

    info!(
        "HyperJoin v{HYPERJOIN_VERSION} planning {} x {}",
        opt.catalog_a, opt.catalog_b
    );

    let catalog_a = Arc::new(InMemoryBucketCatalog::from_json_file(&opt.catalog_a)?);
    let catalog_b = Arc::new(InMemoryBucketCatalog::from_json_file(&opt.catalog_b)?);

    let mut planner =
        JoinSplitPlanner::try_from_config(catalog_a, catalog_b, &opt.hyperjoin_config()?)?;
    if let Some(path) = &opt.key_samples {
        let samples: Vec<i64> = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        planner = planner.with_key_samples(samples);
    }

    let plan = planner.plan()?;

    match &opt.output {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(&mut writer, &plan)?;
            writer.flush()?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, &plan)?;
            writeln!(stdout)?;
        }
    }

    Ok(())
}
