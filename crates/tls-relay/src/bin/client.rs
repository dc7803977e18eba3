// Copyright 2024-2026 Farlight Networks, LLC
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

//! Relay client binary.
//!
//! Reads `./client.json` and the TLS material under `./cert/`, dials
//! the event channel, and runs the egress role beside the target
//! service. Loss of the event channel ends the process.

use tls_relay::{tls, Client, ClientConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ClientConfig::load_default()?;

    let identity = tls::load_role_identity("client")?;
    let pinned_server = tls::load_role_peer("server")?;
    let tls_config = tls::client_config(identity, pinned_server)?;

    let client = Client::connect(config, tls_config).await?;
    info!("relay client running");
    client.run().await?;

    Ok(())
}
