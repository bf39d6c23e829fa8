mod api;
mod state;

use anyhow::Context;
use log::{info, warn};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    result::Result as StdResult,
};
use suhoon_gemini::GeminiClient;
use suhoon_logic::TrackerSettings;
use tokio::net::TcpListener;

use state::ServerState;

type Result<T = (), E = anyhow::Error> = StdResult<T, E>;

#[tokio::main]
async fn main() -> Result {
    colog::init();

    let args = std::env::args().collect::<Vec<_>>();
    let socket_addr = args
        .get(1)
        .map(|raw_binding| raw_binding.parse::<SocketAddr>())
        .transpose()
        .context("Invalid socket addr passed")?
        .unwrap_or(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 3000));

    let client = GeminiClient::from_env()
        .inspect_err(|why| warn!("AI diagnosis disabled: {why:#}"))
        .ok();

    if let Some(client) = &client {
        info!("Using {} for diagnosis", client.model());
    }

    let state = ServerState::new(client, TrackerSettings::default())?;
    let _reaper = state.spawn_reaper();

    let listener = TcpListener::bind(socket_addr)
        .await
        .with_context(|| format!("Failed to bind to {socket_addr}"))?;

    info!(
        "Starting suhoon server {} on {socket_addr}",
        env!("CARGO_PKG_VERSION")
    );

    axum::serve(listener, api::router(state))
        .await
        .context("Error while running server")
}
