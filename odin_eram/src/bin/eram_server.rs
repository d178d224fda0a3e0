/*
 * Copyright © 2025, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

#![allow(unused)]

use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use anyhow::Result;
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{info,warn,error};
use tracing_subscriber::EnvFilter;
use odin_common::{define_cli, sim_clock::WallClock};
use odin_eram::{
    load_config, EramConfig, Upstream, LiveUpstream,
    actor::{spawn_tracker,start_janitor_timer,TrackerActor,Terminate},
    commands::CommandContext,
    poller::spawn_poller,
    ws_service::{router,EramServerState,RadarBroadcaster,WS_ROUTE}
};

define_cli! { ARGS [about="ERAM track reconciliation server"] =
    config: Option<PathBuf> [short, long, help="path of the RON config file (built-in defaults if not set)"],
    port: Option<u16> [short, long, env="PORT", help="listen port, overrides the configured one"]
}

#[tokio::main]
async fn main()->Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter( EnvFilter::try_from_default_env().unwrap_or_else( |_| EnvFilter::new("info")))
        .init();

    let mut config = match &ARGS.config {
        Some(path) => load_config( path)?,
        None => {
            info!("no config file given, using defaults");
            EramConfig::default()
        }
    };
    if let Some(port) = ARGS.port {
        config.server.sock_addr.set_port( port);
    }
    let config = Arc::new( config);

    let (update_tx, _) = broadcast::channel::<String>( config.channel_bounds);
    let upstream: Arc<dyn Upstream> = Arc::new( LiveUpstream::new( &config)?);

    let actor = TrackerActor::new( config.clone(), Arc::new(WallClock), RadarBroadcaster::new( update_tx.clone()));
    let (tracker, tracker_task) = spawn_tracker( actor, config.channel_bounds);

    let poller_task = spawn_poller( upstream.clone(), tracker.clone(), config.reconcile_interval, config.fetch_timeout);
    let janitor_task = start_janitor_timer( tracker.clone(), config.janitor_interval);

    let state = EramServerState {
        commands: CommandContext {
            upstream,
            tracker: tracker.clone(),
            sectors: config.sectors.clone(),
            sector_role: config.sector_role.clone()
        },
        updates: update_tx
    };
    let app = router( state).into_make_service_with_connect_info::<SocketAddr>();

    let listener = TcpListener::bind( config.server.sock_addr).await?;
    info!("serving ws://{}{}", config.server.sock_addr, WS_ROUTE);
    axum::serve( listener, app).with_graceful_shutdown( shutdown_signal()).await?;

    poller_task.abort();
    janitor_task.abort();
    if tracker.send_msg( Terminate).await.is_ok() {
        tracker_task.await.ok();
    }
    Ok(())
}

async fn shutdown_signal () {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("cannot listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
