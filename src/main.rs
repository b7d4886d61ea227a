// Copyright 2026 Daniel Pelikan
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

//! CarroBot Remote console

mod console;

use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use carrobot_remote::clock::SystemClock;
use carrobot_remote::config::Config;
use carrobot_remote::sensor::RandomDistanceSensor;
use carrobot_remote::transport::SimulatedTransport;
use carrobot_remote::RobotSession;
use console::{ConsoleIntent, ConsoleObserver, HELP};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("carrobot_remote=info".parse()?),
        )
        .init();

    info!("Starting CarroBot Remote v{}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load()?;
    info!("Configuration loaded from {}", Config::default_path().display());

    let default_address = config.connection.default_wifi_address.clone();
    let transport = Arc::new(SimulatedTransport::new(config.simulation.clone()));
    let session = RobotSession::new(
        config,
        transport,
        Arc::new(SystemClock),
        Arc::new(RandomDistanceSensor),
    );
    let _observer = session.observe(Arc::new(ConsoleObserver));

    println!("{}", HELP);
    info!("Ready. Speed {}.", session.speed());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("Input closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match ConsoleIntent::parse(&line) {
                    Ok(ConsoleIntent::Quit) => {
                        info!("Quit requested");
                        break;
                    }
                    Ok(intent) => {
                        let session = session.clone();
                        let default_address = default_address.clone();
                        tokio::spawn(async move {
                            console::execute(&session, intent, &default_address).await;
                        });
                    }
                    Err(e) => println!("{}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    session.shutdown().await;
    info!("CarroBot Remote stopped");
    Ok(())
}
