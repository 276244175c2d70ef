//! Transport engine over the `webrtc` crate.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

use super::{event_channel, EngineEvent, EngineEventReceiver, EngineEventSender, TransportEngine};
use crate::config::IceConfig;
use crate::error::{Result, SignalError};
use crate::protocol::{ConnectionState, IceCandidate, SdpType, SessionDescription};
use crate::relay::lock;

/// Label of the data channel created by the offering side
pub const DATA_CHANNEL_LABEL: &str = "WebRTCData";

fn engine_error(e: webrtc::Error) -> SignalError {
    SignalError::EngineOperationFailed(e.to_string())
}

fn map_ice_state(state: RTCIceConnectionState) -> Option<ConnectionState> {
    match state {
        RTCIceConnectionState::New => Some(ConnectionState::New),
        RTCIceConnectionState::Checking => Some(ConnectionState::Checking),
        RTCIceConnectionState::Connected => Some(ConnectionState::Connected),
        RTCIceConnectionState::Completed => Some(ConnectionState::Completed),
        RTCIceConnectionState::Disconnected => Some(ConnectionState::Disconnected),
        RTCIceConnectionState::Failed => Some(ConnectionState::Failed),
        RTCIceConnectionState::Closed => Some(ConnectionState::Closed),
        _ => None,
    }
}

fn to_rtc(desc: SessionDescription) -> Result<RTCSessionDescription> {
    let converted = match desc.kind {
        SdpType::Offer => RTCSessionDescription::offer(desc.sdp),
        SdpType::PrAnswer => RTCSessionDescription::pranswer(desc.sdp),
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp),
    };
    converted.map_err(|e| SignalError::RemoteDescriptionRejected(e.to_string()))
}

fn from_rtc(desc: RTCSessionDescription) -> Result<SessionDescription> {
    let kind = match desc.sdp_type {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Pranswer => SdpType::PrAnswer,
        RTCSdpType::Answer => SdpType::Answer,
        other => {
            return Err(SignalError::EngineOperationFailed(format!(
                "unsupported description type: {other}"
            )))
        },
    };
    Ok(SessionDescription::new(kind, desc.sdp))
}

fn to_candidate_init(candidate: IceCandidate) -> RTCIceCandidateInit {
    RTCIceCandidateInit {
        candidate: candidate.sdp,
        sdp_mid: candidate.sdp_mid,
        sdp_mline_index: u16::try_from(candidate.sdp_mline_index).ok(),
        username_fragment: None,
    }
}

/// Route data channel messages to the event channel and remember the channel
fn attach_data_channel(
    dc: &Arc<RTCDataChannel>,
    slot: &Arc<Mutex<Option<Arc<RTCDataChannel>>>>,
    events: &EngineEventSender,
) {
    let label = dc.label().to_string();
    let events = events.clone();
    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        if events.send(EngineEvent::DataReceived(msg.data)).is_err() {
            debug!("engine event receiver dropped");
        }
        Box::pin(async {})
    }));

    let open_label = label.clone();
    dc.on_open(Box::new(move || {
        info!("Data channel open: {}", open_label);
        Box::pin(async {})
    }));

    *lock(slot) = Some(dc.clone());
    debug!(label = %label, "data channel attached");
}

/// Engine backed by an `RTCPeerConnection`
pub struct PeerConnectionEngine {
    pc: Arc<RTCPeerConnection>,
    events: EngineEventSender,
    data_channel: Arc<Mutex<Option<Arc<RTCDataChannel>>>>,
    pending_candidates: tokio::sync::Mutex<Vec<RTCIceCandidateInit>>,
}

impl PeerConnectionEngine {
    /// Build a peer connection using the configured ICE servers
    pub async fn new(ice: &IceConfig) -> Result<(Self, EngineEventReceiver)> {
        let api = APIBuilder::new().build();
        let mut config = RTCConfiguration::default();
        if !ice.servers.is_empty() {
            config.ice_servers = vec![RTCIceServer {
                urls: ice.servers.clone(),
                ..Default::default()
            }];
        }

        let pc = Arc::new(api.new_peer_connection(config).await.map_err(engine_error)?);
        let (events, rx) = event_channel();
        let data_channel = Arc::new(Mutex::new(None));

        let candidate_events = events.clone();
        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            // None marks the end of gathering
            if let Some(candidate) = candidate {
                match candidate.to_json() {
                    Ok(init) => {
                        let discovered = IceCandidate::new(
                            init.candidate,
                            init.sdp_mline_index.map(i32::from).unwrap_or(0),
                            init.sdp_mid,
                        );
                        if candidate_events
                            .send(EngineEvent::LocalCandidate(discovered))
                            .is_err()
                        {
                            debug!("engine event receiver dropped");
                        }
                    },
                    Err(e) => warn!(error = %e, "could not serialize local candidate"),
                }
            } else {
                debug!("candidate gathering complete");
            }
            Box::pin(async {})
        }));

        let state_events = events.clone();
        pc.on_ice_connection_state_change(Box::new(move |state: RTCIceConnectionState| {
            debug!(state = %state, "ICE connection state changed");
            if let Some(state) = map_ice_state(state) {
                if state_events
                    .send(EngineEvent::ConnectionStateChanged(state))
                    .is_err()
                {
                    debug!("engine event receiver dropped");
                }
            }
            Box::pin(async {})
        }));

        let slot = data_channel.clone();
        let channel_events = events.clone();
        pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            attach_data_channel(&dc, &slot, &channel_events);
            Box::pin(async {})
        }));

        info!(servers = ice.servers.len(), "Peer connection created");

        let engine = Self {
            pc,
            events,
            data_channel,
            pending_candidates: tokio::sync::Mutex::new(Vec::new()),
        };
        Ok((engine, rx))
    }

    async fn ensure_data_channel(&self) -> Result<()> {
        if lock(&self.data_channel).is_some() {
            return Ok(());
        }

        let dc = self
            .pc
            .create_data_channel(DATA_CHANNEL_LABEL, Some(RTCDataChannelInit::default()))
            .await
            .map_err(engine_error)?;
        attach_data_channel(&dc, &self.data_channel, &self.events);
        Ok(())
    }

    async fn flush_pending_candidates(&self) {
        let pending: Vec<_> = self.pending_candidates.lock().await.drain(..).collect();
        for init in pending {
            if let Err(e) = self.pc.add_ice_candidate(init).await {
                warn!(error = %e, "could not apply queued candidate");
            }
        }
    }
}

#[async_trait]
impl TransportEngine for PeerConnectionEngine {
    async fn create_offer(&self) -> Result<SessionDescription> {
        self.ensure_data_channel().await?;
        let offer = self.pc.create_offer(None).await.map_err(engine_error)?;
        from_rtc(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self.pc.create_answer(None).await.map_err(engine_error)?;
        from_rtc(answer)
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        let desc = to_rtc(desc)
            .map_err(|e| SignalError::EngineOperationFailed(e.to_string()))?;
        self.pc
            .set_local_description(desc)
            .await
            .map_err(engine_error)
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        let desc = to_rtc(desc)?;
        self.pc
            .set_remote_description(desc)
            .await
            .map_err(|e| SignalError::RemoteDescriptionRejected(e.to_string()))?;
        self.flush_pending_candidates().await;
        Ok(())
    }

    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = to_candidate_init(candidate);

        if self.pc.remote_description().await.is_none() {
            debug!("remote description not set yet, queuing candidate");
            self.pending_candidates.lock().await.push(init);
            return Ok(());
        }

        self.pc.add_ice_candidate(init).await.map_err(engine_error)
    }

    async fn send_data(&self, data: Bytes) -> Result<()> {
        let dc = lock(&self.data_channel).clone();
        match dc {
            Some(dc) => {
                dc.send(&data).await.map_err(engine_error)?;
                Ok(())
            },
            None => Err(SignalError::EngineOperationFailed(
                "data channel not open".to_string(),
            )),
        }
    }

    async fn close(&self) -> Result<()> {
        self.pc.close().await.map_err(engine_error)?;
        if self
            .events
            .send(EngineEvent::ConnectionStateChanged(ConnectionState::Closed))
            .is_err()
        {
            debug!("engine event receiver dropped");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "webrtc"
    }
}
