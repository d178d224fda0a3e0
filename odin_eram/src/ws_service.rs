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

//! the websocket interface for radar viewers. All messages are JSON text frames of the form
//! `{"event": <name>, "data": <payload>}`. Track snapshots are broadcast to all connections, replies to
//! commands (availability) only go to the requesting connection

use std::{collections::BTreeMap, net::SocketAddr};
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::{Response,IntoResponse},
    routing::{Router,get},
    extract::connect_info::ConnectInfo
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::{Serialize,Deserialize};
use serde_json::Value;
use tokio::sync::{broadcast,mpsc,oneshot};
use tracing::{debug,info,warn,error,trace};

use crate::{
    Track, TrackStore,
    actor::{ExecSnapshotAction,SnapshotAction,TrackerHandle},
    commands::{dispatch,ClientEvent,CommandContext,CommandReply},
    errors::{OdinEramError,Result}
};

pub const WS_ROUTE: &str = "/ws";

pub const RADAR_UPDATE: &str = "radarUpdate";
pub const AVAILABILITY_STATUS: &str = "availabilityStatus";

const DIRECT_BOUNDS: usize = 16; // per connection queue for replies

#[derive(Serialize)]
struct OutboundMsg<'a,T> where T: Serialize {
    event: &'a str,
    data: T,
}

#[derive(Deserialize)]
struct InboundMsg {
    event: String,
    #[serde(default)]
    data: Value,
}

pub fn parse_client_event (text: &str)->Result<ClientEvent> {
    let msg: InboundMsg = serde_json::from_str(text)?;
    ClientEvent::from_event( &msg.event, msg.data)
}

/// the `radarUpdate` message for a callsign keyed track map
pub fn radar_update_json<T: Serialize> (tracks: &T)->Result<String> {
    Ok( serde_json::to_string( &OutboundMsg { event: RADAR_UPDATE, data: tracks })?)
}

pub fn store_update_json (store: &TrackStore)->Result<String> {
    let tracks: BTreeMap<&str,&Track> = store.iter().map( |(k,t)| (k.as_str(), t)).collect();
    radar_update_json( &tracks)
}

pub fn availability_json (availability: &BTreeMap<String,bool>)->Result<String> {
    Ok( serde_json::to_string( &OutboundMsg { event: AVAILABILITY_STATUS, data: availability })?)
}

/// the tracker update action that pushes full snapshots to all connected viewers
#[derive(Debug,Clone)]
pub struct RadarBroadcaster {
    tx: broadcast::Sender<String>,
}

impl RadarBroadcaster {
    pub fn new (tx: broadcast::Sender<String>)->Self { RadarBroadcaster{tx} }
}

impl SnapshotAction for RadarBroadcaster {
    fn execute (&self, store: &TrackStore) {
        match store_update_json( store) {
            Ok(msg) => {
                if self.tx.send(msg).is_err() { trace!("no viewers connected") }
            }
            Err(e) => error!("failed to serialize radar update: {e}")
        }
    }
}

/// subscribe to `updates` and serialize the current store from within the tracker. Updates are only
/// broadcast by the tracker, so the receiver sees exactly the changes that follow the returned snapshot
pub async fn subscribe_with_snapshot (tracker: &TrackerHandle, updates: &broadcast::Sender<String>)
    ->Result<(broadcast::Receiver<String>, String)>
{
    let (tx,rx) = oneshot::channel();
    let updates = updates.clone();
    tracker.send_msg( ExecSnapshotAction( Box::new( move |store: &TrackStore| {
        let rx = updates.subscribe();
        tx.send( store_update_json( store).map( |msg| (rx,msg))).ok();
    }))).await?;
    rx.await.map_err( |_| OdinEramError::TrackerNotRunning)?
}

#[derive(Clone)]
pub struct EramServerState {
    pub commands: CommandContext,
    pub updates: broadcast::Sender<String>,
}

pub fn router (state: EramServerState)->Router {
    Router::new().route( WS_ROUTE, get( move |ws: WebSocketUpgrade, ci: ConnectInfo<SocketAddr>| { ws_handler( ws, ci, state.clone()) }))
}

async fn ws_handler (ws: WebSocketUpgrade, ConnectInfo(addr): ConnectInfo<SocketAddr>, state: EramServerState)->Response {
    ws.on_upgrade( move |socket| handle_socket( socket, addr, state)).into_response()
}

async fn handle_socket (ws: WebSocket, remote_addr: SocketAddr, state: EramServerState) {
    info!("viewer {remote_addr} connected");

    let (mut ws_sender, mut ws_receiver) = ws.split();
    let (direct_tx, mut direct_rx) = mpsc::channel::<String>( DIRECT_BOUNDS);

    let mut updates = match subscribe_with_snapshot( &state.commands.tracker, &state.updates).await {
        Ok((updates,msg)) => {
            direct_tx.try_send(msg).ok();
            updates
        }
        Err(e) => {
            warn!("no initial snapshot for {remote_addr}: {e}");
            state.updates.subscribe()
        }
    };

    let writer_task = tokio::spawn( async move {
        loop {
            let msg = tokio::select! {
                biased;
                msg = direct_rx.recv() => match msg {
                    Some(msg) => msg,
                    None => break
                },
                res = updates.recv() => match res {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(n)) => { debug!("viewer {remote_addr} skipped {n} updates"); continue }
                    Err(broadcast::error::RecvError::Closed) => break
                }
            };

            if ws_sender.send( Message::Text( msg.into())).await.is_err() { break }
        }
    });

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Text(text) => {
                match parse_client_event( text.as_str()) {
                    Ok(event) => handle_event( &state.commands, event, &direct_tx).await,
                    Err(e) => warn!("ignoring message from {remote_addr}: {e}")
                }
            }
            Message::Close(_) => break,
            _ => {} // ping/pong is handled by axum, we don't use binary messages
        }
    }

    writer_task.abort();
    info!("viewer {remote_addr} disconnected");
}

/// commands that need upstream requests run in their own task so that they don't block the connection
async fn handle_event (ctx: &CommandContext, event: ClientEvent, reply_tx: &mpsc::Sender<String>) {
    if event.needs_upstream() {
        let ctx = ctx.clone();
        let reply_tx = reply_tx.clone();
        tokio::spawn( async move { run_command( &ctx, event, &reply_tx).await });
    } else {
        run_command( ctx, event, reply_tx).await
    }
}

async fn run_command (ctx: &CommandContext, event: ClientEvent, reply_tx: &mpsc::Sender<String>) {
    match dispatch( ctx, event).await {
        Ok(Some(CommandReply::Availability(availability))) => {
            match availability_json( &availability) {
                Ok(msg) => { reply_tx.send(msg).await.ok(); }
                Err(e) => error!("failed to serialize availability: {e}")
            }
        }
        Ok(None) => {}
        Err(e) => warn!("command failed: {e}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_envelope () {
        let e = parse_client_event( r#"{"event":"acceptHandoff","data":{"callsign":"DAL123"}}"#).unwrap();
        assert!( matches!( e, ClientEvent::AcceptHandoff(ref r) if r.callsign == "DAL123"));

        let e = parse_client_event( r#"{"event":"checkAvailability"}"#).unwrap();
        assert_eq!( e, ClientEvent::CheckAvailability);

        assert!( parse_client_event("not json").is_err());
        assert!( parse_client_event( r#"{"data":{}}"#).is_err());
    }

    #[test]
    fn test_outbound_envelope () {
        let mut a = BTreeMap::new();
        a.insert( "IRCC".to_string(), true);
        let v: Value = serde_json::from_str( &availability_json(&a).unwrap()).unwrap();
        assert_eq!( v, json!({"event": "availabilityStatus", "data": {"IRCC": true}}));

        let v: Value = serde_json::from_str( &store_update_json( &TrackStore::new()).unwrap()).unwrap();
        assert_eq!( v, json!({"event": "radarUpdate", "data": {}}));
    }
}
