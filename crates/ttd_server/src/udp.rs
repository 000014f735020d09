//! Server discovery over UDP.
//!
//! A client looking for games sends `CLIENT_FIND_SERVER`; the server answers
//! with `SERVER_RESPONSE` carrying its game info, refreshed from the world at
//! the moment of the request.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{ToSocketAddrs, UdpSocket};
use tokio::sync::RwLock;
use ttd_core::world::World;

use crate::game_info::{serialize_network_game_info, GameInfoError, NetworkServerGameInfo};
use crate::packet::{PacketError, PacketReader, PacketWriter, UDP_MTU};
use crate::{Result, ServerConfig};

/// UDP packet types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UdpPacketType {
    /// Query for a server's game info.
    ClientFindServer = 0,
    /// Reply with the game info.
    ServerResponse = 1,
}

impl UdpPacketType {
    /// Packet type from its wire byte.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::ClientFindServer),
            1 => Some(Self::ServerResponse),
            _ => None,
        }
    }
}

/// What the responder needs to answer a query.
#[derive(Debug)]
pub struct ServerState {
    /// The running game.
    pub world: World,
    /// Announced info; refreshed on every query.
    pub info: NetworkServerGameInfo,
    /// Connected clients.
    pub clients_on: u8,
    /// Connected spectators.
    pub spectators_on: u8,
    /// Whether replies carry NewGRF names.
    pub send_newgrf_names: bool,
}

/// State shared between the responder and the game loop.
pub type SharedState = Arc<RwLock<ServerState>>;

impl ServerState {
    /// State for `world` served under `config`.
    #[must_use]
    pub fn new(config: &ServerConfig, world: World) -> Self {
        let info = NetworkServerGameInfo::from_config(config, &config.revision, &world);
        Self {
            world,
            info,
            clients_on: 0,
            spectators_on: 0,
            send_newgrf_names: config.send_newgrf_names,
        }
    }

    /// Wrap into a [`SharedState`].
    #[must_use]
    pub fn shared(self) -> SharedState {
        Arc::new(RwLock::new(self))
    }

    /// Refresh the game info and encode a `SERVER_RESPONSE` packet.
    ///
    /// If the NewGRF names do not fit a datagram the reply is sent without them.
    pub fn server_response(&mut self) -> std::result::Result<Vec<u8>, GameInfoError> {
        self.info
            .refresh(&self.world, self.clients_on, self.spectators_on);

        let mut packet = PacketWriter::new(UdpPacketType::ServerResponse as u8);
        match serialize_network_game_info(&mut packet, &self.info, self.send_newgrf_names) {
            Ok(()) => return Ok(packet.finish()),
            Err(GameInfoError::Packet(PacketError::Overflow { .. })) if self.send_newgrf_names => {
                tracing::debug!(
                    grfs = self.info.grfs.len(),
                    "game info too large with NewGRF names, sending without"
                );
            }
            Err(err) => return Err(err),
        }

        let mut packet = PacketWriter::new(UdpPacketType::ServerResponse as u8);
        serialize_network_game_info(&mut packet, &self.info, false)?;
        Ok(packet.finish())
    }
}

/// Answers discovery queries on a UDP socket.
#[derive(Debug)]
pub struct UdpResponder {
    socket: UdpSocket,
    state: SharedState,
}

impl UdpResponder {
    /// Bind to `addr`.
    pub async fn bind(addr: impl ToSocketAddrs, state: SharedState) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        tracing::info!(addr = %socket.local_addr()?, "server discovery listening");
        Ok(Self { socket, state })
    }

    /// Address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Handle one datagram; returns the reply to send, if any.
    pub async fn handle_packet(&self, bytes: &[u8]) -> Result<Option<Vec<u8>>> {
        let reader = PacketReader::new(bytes)?;
        match UdpPacketType::from_u8(reader.packet_type()) {
            Some(UdpPacketType::ClientFindServer) => {
                let reply = self.state.write().await.server_response()?;
                Ok(Some(reply))
            }
            // Only clients act on responses.
            Some(UdpPacketType::ServerResponse) => Ok(None),
            None => Err(PacketError::UnknownType(reader.packet_type()).into()),
        }
    }

    /// Serve queries until `shutdown` completes.
    ///
    /// Malformed datagrams are logged and dropped; socket errors end the loop.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut buffer = vec![0u8; UDP_MTU];
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("server discovery stopped");
                    return Ok(());
                }
                received = self.socket.recv_from(&mut buffer) => {
                    let (len, peer) = received?;
                    match self.handle_packet(&buffer[..len]).await {
                        Ok(Some(reply)) => {
                            self.socket.send_to(&reply, peer).await?;
                            tracing::debug!(%peer, bytes = reply.len(), "answered server query");
                        }
                        Ok(None) => {}
                        Err(err) => tracing::warn!(%peer, error = %err, "dropping UDP packet"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_info::{
        deserialize_network_game_info, GrfIdentifier, NETWORK_MAX_GRF_COUNT,
    };
    use crate::NewGrfConfig;
    use std::time::Duration;
    use tokio::sync::oneshot;
    use ttd_core::ids::CompanyId;
    use ttd_core::money::Money;

    fn test_state(config: &ServerConfig) -> SharedState {
        let mut world = World::default();
        world.map = config.map_info();
        world.date = 700_000;
        world.add_company(CompanyId(0), "First", Money(1_000));
        ServerState::new(config, world).shared()
    }

    fn find_server() -> Vec<u8> {
        PacketWriter::new(UdpPacketType::ClientFindServer as u8).finish()
    }

    async fn query(client: &UdpSocket, addr: SocketAddr) -> NetworkServerGameInfo {
        client.send_to(&find_server(), addr).await.unwrap();
        let mut buffer = vec![0u8; UDP_MTU];
        let (len, _) = tokio::time::timeout(Duration::from_secs(5), client.recv_from(&mut buffer))
            .await
            .expect("server answered in time")
            .unwrap();
        let mut reader = PacketReader::new(&buffer[..len]).unwrap();
        assert_eq!(reader.packet_type(), UdpPacketType::ServerResponse as u8);
        deserialize_network_game_info(&mut reader, None).unwrap()
    }

    #[tokio::test]
    async fn test_find_server_returns_fresh_info() {
        let config = ServerConfig {
            server_name: "Coal Valley".to_string(),
            password: Some("secret".to_string()),
            ..ServerConfig::default()
        };
        let state = test_state(&config);
        let responder = UdpResponder::bind("127.0.0.1:0", state.clone()).await.unwrap();
        let addr = responder.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        let server = tokio::spawn(responder.run(async move {
            let _ = stopped.await;
        }));
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let info = query(&client, addr).await;
        assert_eq!(info.server_name, "Coal Valley");
        assert!(info.use_password);
        assert_eq!(info.companies_on, 1);
        assert_eq!(info.game_date, 700_000);
        assert_eq!(info.start_date, 700_000);

        {
            let mut state = state.write().await;
            state.world.date += 30;
            state.world.add_company(CompanyId(1), "Second", Money(1_000));
            state.clients_on = 2;
        }
        let info = query(&client, addr).await;
        assert_eq!(info.companies_on, 2);
        assert_eq!(info.clients_on, 2);
        assert_eq!(info.game_date, 700_030);
        assert_eq!(info.start_date, 700_000);

        stop.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_malformed_packet_does_not_stop_server() {
        let state = test_state(&ServerConfig::default());
        let responder = UdpResponder::bind("127.0.0.1:0", state).await.unwrap();
        let addr = responder.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        let server = tokio::spawn(responder.run(async move {
            let _ = stopped.await;
        }));
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        client.send_to(&[200, 0, 0], addr).await.unwrap();
        let info = query(&client, addr).await;
        assert_eq!(info.server_name, ServerConfig::default().server_name);

        stop.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_handle_packet_by_type() {
        let state = test_state(&ServerConfig::default());
        let responder = UdpResponder::bind("127.0.0.1:0", state).await.unwrap();

        assert!(responder.handle_packet(&find_server()).await.unwrap().is_some());
        let response = PacketWriter::new(UdpPacketType::ServerResponse as u8).finish();
        assert!(responder.handle_packet(&response).await.unwrap().is_none());
        let unknown = PacketWriter::new(9).finish();
        assert!(matches!(
            responder.handle_packet(&unknown).await,
            Err(crate::ServerError::Packet(PacketError::UnknownType(9)))
        ));
    }

    #[test]
    fn test_oversized_names_are_dropped_from_reply() {
        let newgrfs = (0..NETWORK_MAX_GRF_COUNT)
            .map(|i| NewGrfConfig {
                ident: GrfIdentifier {
                    grfid: u32::try_from(i).unwrap(),
                    md5sum: [7; 16],
                },
                name: "n".repeat(79),
                is_static: false,
            })
            .collect();
        let config = ServerConfig {
            newgrfs,
            ..ServerConfig::default()
        };
        let mut state = ServerState::new(&config, World::default());
        let reply = state.server_response().unwrap();
        assert!(reply.len() <= UDP_MTU);

        let mut reader = PacketReader::new(&reply).unwrap();
        let info = deserialize_network_game_info(&mut reader, None).unwrap();
        assert_eq!(info.grfs.len(), NETWORK_MAX_GRF_COUNT);
        assert!(info.grfs.iter().all(|g| g.name.is_empty()));
    }

    #[test]
    fn test_static_grfs_are_not_announced() {
        let grf = |grfid, is_static| NewGrfConfig {
            ident: GrfIdentifier {
                grfid,
                md5sum: [0; 16],
            },
            name: format!("grf {grfid}"),
            is_static,
        };
        let config = ServerConfig {
            newgrfs: vec![grf(1, false), grf(2, true), grf(3, false)],
            ..ServerConfig::default()
        };
        let state = ServerState::new(&config, World::default());
        let ids: Vec<u32> = state.info.grfs.iter().map(|g| g.ident.grfid).collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
