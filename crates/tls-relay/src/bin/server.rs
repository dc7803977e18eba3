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

//! Relay server binary.
//!
//! Reads `./server.json` and the TLS material under `./cert/`, then
//! runs the ingress role: a public listener for external clients and a
//! mutually-authenticated event listener for the client component.

use tls_relay::{tls, Server, ServerConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::load_default()?;

    let identity = tls::load_role_identity("server")?;
    let pinned_client = tls::load_role_peer("client")?;
    let tls_config = tls::server_config(identity, pinned_client)?;

    let server = Server::bind(&config, tls_config).await?;
    info!("relay server starting");
    server.run().await?;

    Ok(())
}
