//! Command pipeline: trait checks, test run, lockstep queueing, execution.
//!
//! Offline, a posted command is tested and executed right away. In a network
//! game a posted command is only tested locally; it then travels to the
//! server, which stamps it with an execution frame and distributes it, and
//! every peer executes it from its queue in the same frame and order.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    execute, CommandCallback, CommandContext, CommandCost, CommandFlags, CommandInfo,
    CommandResult, DoCommandFlags,
};
use crate::command::Command;
use crate::error::{GameError, Result};
use crate::ids::{ClientId, CompanyId};
use crate::link_refresher;
use crate::order_backup;
use crate::replay::CommandLog;
use crate::strings::{
    StringId, STR_ERROR_NOT_ALLOWED_WHILE_IN_MULTIPLAYER, STR_ERROR_NOT_ENOUGH_CASH_REQUIRES_CURRENCY,
    STR_ERROR_ONLY_AVAILABLE_TO_SERVER,
};
use crate::world::World;

/// Role of this peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkMode {
    /// Single player: commands execute immediately.
    Offline,
    /// Network server: accepts, orders and distributes commands.
    Server,
    /// Network client: sends commands to the server and executes what it
    /// distributes.
    Client,
}

/// A command rejected by its static flags before any handler ran.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Only the server may issue this command.
    #[error("command {0} may only be issued by the server")]
    ServerOnly(&'static str),

    /// The command is not available in network games.
    #[error("command {0} is not allowed while in multiplayer")]
    OfflineOnly(&'static str),

    /// Only a server accepts commands from clients.
    #[error("this peer is not a server")]
    NotServer,
}

impl CommandError {
    /// Message shown to the issuing player.
    #[must_use]
    pub const fn message(&self) -> StringId {
        match self {
            Self::ServerOnly(_) | Self::NotServer => STR_ERROR_ONLY_AVAILABLE_TO_SERVER,
            Self::OfflineOnly(_) => STR_ERROR_NOT_ALLOWED_WHILE_IN_MULTIPLAYER,
        }
    }
}

/// A command as issued by a player or script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    /// The command.
    pub command: Command,
    /// Acting company.
    pub company: CompanyId,
    /// Callback run on the issuing client after execution.
    pub callback: CommandCallback,
    /// Skip the local test run in network games.
    pub no_test_if_in_network: bool,
    /// Only test and report the cost; never execute.
    pub estimate_only: bool,
}

impl CommandRequest {
    /// Request to run `command` for `company`.
    #[must_use]
    pub fn new(command: Command, company: CompanyId) -> Self {
        Self {
            command,
            company,
            callback: CommandCallback::None,
            no_test_if_in_network: false,
            estimate_only: false,
        }
    }

    /// Builder: run `callback` after execution.
    #[must_use]
    pub fn with_callback(mut self, callback: CommandCallback) -> Self {
        self.callback = callback;
        self
    }

    /// Builder: skip the local test run in network games.
    ///
    /// For command sequences whose later members depend on the effects of
    /// earlier ones that have not been executed yet.
    #[must_use]
    pub fn no_test_if_in_network(mut self) -> Self {
        self.no_test_if_in_network = true;
        self
    }

    /// Builder: only estimate the cost.
    ///
    /// The estimate is reported even when the company cannot pay it.
    #[must_use]
    pub fn estimate_only(mut self) -> Self {
        self.estimate_only = true;
        self
    }
}

/// A command on the wire and in the execution queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandPacket {
    /// Frame in which every peer executes the command.
    pub frame: u32,
    /// Acting company.
    pub company: CompanyId,
    /// Client that issued the command.
    pub client: ClientId,
    /// The command.
    pub command: Command,
    /// Callback run on the issuing client.
    pub callback: CommandCallback,
    /// Skip the test run in network games.
    pub no_test_if_in_network: bool,
}

impl CommandPacket {
    /// Wire encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to encode command: {}", e)))
    }

    /// Decode a packet received from the network.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed input.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| GameError::InvalidState(format!("Failed to decode command: {}", e)))
    }
}

/// What happened to a posted command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    /// Executed on this peer.
    Executed,
    /// Sent for lockstep execution.
    Queued,
    /// Tested only, at the caller's request.
    Estimated,
    /// Failed its test or execution.
    Failed,
}

/// Result of posting or executing a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOutcome {
    /// What happened.
    pub kind: OutcomeKind,
    /// Cost (or failure) reported by the handler; zero for queued commands.
    pub cost: CommandCost,
    /// Created id, if the command created something.
    pub result: CommandResult,
}

impl CommandOutcome {
    const fn new(kind: OutcomeKind, cost: CommandCost, result: CommandResult) -> Self {
        Self { kind, cost, result }
    }

    /// Whether the command did not fail.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.kind != OutcomeKind::Failed
    }
}

/// Runs commands against a [`World`] and keeps the lockstep queues.
#[derive(Debug)]
pub struct CommandDispatcher {
    mode: NetworkMode,
    local_client: ClientId,
    frame: u32,
    /// Client: commands waiting to be sent to the server.
    outbox: Vec<CommandPacket>,
    /// Server: accepted commands waiting for distribution.
    pending: Vec<CommandPacket>,
    /// Frame-stamped commands waiting for execution.
    queue: VecDeque<CommandPacket>,
    last_error: Option<StringId>,
    log: Option<CommandLog>,
}

impl CommandDispatcher {
    /// Dispatcher for a peer in `mode` identified as `local_client`.
    #[must_use]
    pub fn new(mode: NetworkMode, local_client: ClientId) -> Self {
        Self {
            mode,
            local_client,
            frame: 0,
            outbox: Vec::new(),
            pending: Vec::new(),
            queue: VecDeque::new(),
            last_error: None,
            log: None,
        }
    }

    /// Single player dispatcher.
    #[must_use]
    pub fn offline() -> Self {
        Self::new(NetworkMode::Offline, ClientId::SERVER)
    }

    /// Dispatcher of a network server.
    #[must_use]
    pub fn server() -> Self {
        Self::new(NetworkMode::Server, ClientId::SERVER)
    }

    /// Dispatcher of network client `id`.
    #[must_use]
    pub fn client(id: ClientId) -> Self {
        Self::new(NetworkMode::Client, id)
    }

    /// Dispatcher replaying recorded packets: no callbacks fire.
    #[must_use]
    pub fn replay(mode: NetworkMode, frame: u32) -> Self {
        let mut dispatcher = Self::new(mode, ClientId::INVALID);
        dispatcher.frame = frame;
        dispatcher
    }

    /// Role of this peer.
    #[must_use]
    pub const fn mode(&self) -> NetworkMode {
        self.mode
    }

    /// Client id of this peer.
    #[must_use]
    pub const fn local_client(&self) -> ClientId {
        self.local_client
    }

    /// Frame executed next.
    #[must_use]
    pub const fn frame(&self) -> u32 {
        self.frame
    }

    /// Message of the last failed command issued by this peer.
    #[must_use]
    pub const fn last_error(&self) -> Option<StringId> {
        self.last_error
    }

    /// Number of commands waiting for execution.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    const fn is_networked(&self) -> bool {
        !matches!(self.mode, NetworkMode::Offline)
    }

    fn check_traits(&self, info: CommandInfo) -> std::result::Result<(), CommandError> {
        if info.flags.contains(CommandFlags::OFFLINE) && self.is_networked() {
            return Err(CommandError::OfflineOnly(info.name));
        }
        if info.flags.contains(CommandFlags::SERVER) && self.mode == NetworkMode::Client {
            return Err(CommandError::ServerOnly(info.name));
        }
        Ok(())
    }

    /// Issue a command from this peer.
    ///
    /// Commands violating their static flags are rejected with an error
    /// before any handler runs. Otherwise the command is tested; a failing
    /// test is reported as a failed outcome. Offline the command then
    /// executes; in a network game it is queued for lockstep execution.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] when the command's flags forbid it here.
    pub fn post(
        &mut self,
        world: &mut World,
        request: CommandRequest,
    ) -> std::result::Result<CommandOutcome, CommandError> {
        let CommandRequest {
            mut command,
            company,
            callback,
            no_test_if_in_network,
            estimate_only,
        } = request;
        let info = command.tag().info();
        if let Err(err) = self.check_traits(info) {
            tracing::warn!(command = info.name, error = %err, "command rejected");
            self.last_error = Some(err.message());
            return Err(err);
        }
        if info.flags.contains(CommandFlags::CLIENT_ID) {
            command.set_client_id(self.local_client);
        }
        let company = acting_company(info, company);
        if !runs_as_spectator(info) && !world.companies.contains_key(&company) {
            return Ok(self.fail(true, info, CommandCost::cmd_error()));
        }

        let packet = CommandPacket {
            frame: self.frame,
            company,
            client: self.local_client,
            command,
            callback,
            no_test_if_in_network,
        };

        let skip_test = self.is_networked() && no_test_if_in_network;
        let mut test_cost = None;
        if !skip_test {
            let query = if estimate_only {
                DoCommandFlags::QUERY_COST
            } else {
                DoCommandFlags::empty()
            };
            let cost = test_packet(world, &packet, info, query);
            if cost.failed() {
                return Ok(self.fail(true, info, cost));
            }
            test_cost = Some(cost);
        }
        if estimate_only {
            let cost = test_cost.unwrap_or_default();
            return Ok(CommandOutcome::new(
                OutcomeKind::Estimated,
                cost,
                CommandResult::None,
            ));
        }

        match self.mode {
            NetworkMode::Offline => {
                self.record(&packet);
                Ok(self.execute_packet(world, &packet, test_cost))
            }
            NetworkMode::Client => {
                tracing::trace!(command = info.name, "command sent to server");
                self.outbox.push(packet);
                Ok(queued())
            }
            NetworkMode::Server => {
                self.pending.push(packet);
                Ok(queued())
            }
        }
    }

    /// Client: commands to send to the server.
    pub fn take_outbox(&mut self) -> Vec<CommandPacket> {
        std::mem::take(&mut self.outbox)
    }

    /// Server: accept a command sent by client `from`.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] if this peer is not a server or the client
    /// may not issue the command.
    pub fn accept_from_client(
        &mut self,
        mut packet: CommandPacket,
        from: ClientId,
    ) -> std::result::Result<(), CommandError> {
        if self.mode != NetworkMode::Server {
            return Err(CommandError::NotServer);
        }
        let info = packet.command.tag().info();
        if info.flags.contains(CommandFlags::SERVER) && from != ClientId::SERVER {
            tracing::warn!(command = info.name, client = from.0, "server command from client");
            return Err(CommandError::ServerOnly(info.name));
        }
        if info.flags.contains(CommandFlags::OFFLINE) {
            return Err(CommandError::OfflineOnly(info.name));
        }
        if info.flags.contains(CommandFlags::CLIENT_ID) {
            packet.command.set_client_id(from);
        }
        packet.client = from;
        packet.company = acting_company(info, packet.company);
        self.pending.push(packet);
        Ok(())
    }

    /// Server: stamp accepted commands with the current frame and queue them
    /// locally. Returns the packets to send to every client.
    pub fn distribute(&mut self) -> Vec<CommandPacket> {
        let frame = self.frame;
        let packets: Vec<CommandPacket> = self
            .pending
            .drain(..)
            .map(|mut packet| {
                packet.frame = frame;
                packet
            })
            .collect();
        self.queue.extend(packets.iter().cloned());
        packets
    }

    /// Queue a command distributed by the server.
    pub fn receive(&mut self, packet: CommandPacket) {
        self.queue.push_back(packet);
    }

    /// Execute every queued command due in the current frame, then advance
    /// the world clock by one tick. Returns the number of commands run.
    pub fn execute_frame(&mut self, world: &mut World) -> usize {
        let mut executed = 0;
        while self.queue.front().is_some_and(|p| p.frame <= self.frame) {
            let Some(packet) = self.queue.pop_front() else {
                break;
            };
            self.record(&packet);
            let info = packet.command.tag().info();
            let skip_test = self.is_networked() && packet.no_test_if_in_network;
            let local = packet.client == self.local_client;
            let test_cost = if skip_test {
                None
            } else {
                let cost = test_packet(world, &packet, info, DoCommandFlags::empty());
                if cost.failed() {
                    self.fail(local, info, cost);
                    executed += 1;
                    continue;
                }
                Some(cost)
            };
            self.execute_packet(world, &packet, test_cost);
            executed += 1;
        }
        world.tick();
        self.frame += 1;
        executed
    }

    /// Run the handler for real and apply the consequences.
    fn execute_packet(
        &mut self,
        world: &mut World,
        packet: &CommandPacket,
        test_cost: Option<CommandCost>,
    ) -> CommandOutcome {
        let info = packet.command.tag().info();
        let local = packet.client == self.local_client;
        let ctx = CommandContext {
            flags: info.flags.to_do_flags().union(DoCommandFlags::EXEC),
            company: packet.company,
        };
        let (cost, result) = execute(world, &ctx, &packet.command);

        if let Some(test) = test_cost {
            if !info.flags.contains(CommandFlags::NO_TEST)
                && (test.cost() != cost.cost() || test.succeeded() != cost.succeeded())
            {
                tracing::error!(
                    command = info.name,
                    test_cost = test.cost().0,
                    exec_cost = cost.cost().0,
                    "test and execution disagree; desync likely"
                );
            }
        }
        if cost.failed() {
            return self.fail(local, info, cost);
        }

        if let Some(company) = world.companies.get_mut(&packet.company) {
            company.money -= cost.cost();
        }
        if info.refreshes_links {
            if let Some(vehicle) = packet.command.order_vehicle() {
                link_refresher::refresh_order_sharers(world, vehicle);
            }
        }
        #[cfg(feature = "debug-validation")]
        validate_world(world);

        tracing::debug!(
            command = info.name,
            company = packet.company.0,
            cost = cost.cost().0,
            "command executed"
        );
        if local {
            self.run_callback(world, packet.callback, result);
        }
        CommandOutcome::new(OutcomeKind::Executed, cost, result)
    }

    fn run_callback(&mut self, world: &mut World, callback: CommandCallback, result: CommandResult) {
        match (callback, result) {
            (CommandCallback::BuildPrimaryVehicle, CommandResult::Vehicle(vehicle)) => {
                let user = self.local_client;
                order_backup::restore(self, world, vehicle, user);
            }
            _ => {}
        }
    }

    fn fail(&mut self, local: bool, info: CommandInfo, cost: CommandCost) -> CommandOutcome {
        tracing::debug!(command = info.name, message = cost.message().0, "command failed");
        if local {
            self.last_error = Some(cost.message());
        }
        CommandOutcome::new(OutcomeKind::Failed, cost, CommandResult::None)
    }

    fn record(&mut self, packet: &CommandPacket) {
        if let Some(log) = &mut self.log {
            log.record(packet.clone());
        }
    }

    /// Start recording executed commands, taking a snapshot of `world`.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be serialized.
    pub fn start_recording(&mut self, world: &World) -> Result<()> {
        self.log = Some(CommandLog::new(world, self.mode, self.frame)?);
        Ok(())
    }

    /// Stop recording and return the log, sealed with the final state of
    /// `world`.
    pub fn finish_recording(&mut self, world: &World) -> Option<CommandLog> {
        let mut log = self.log.take()?;
        log.finalize(self.frame, world.state_hash());
        Some(log)
    }
}

/// Company a command acts for: server and spectator commands act without one.
fn acting_company(info: CommandInfo, company: CompanyId) -> CompanyId {
    if runs_as_spectator(info) {
        CompanyId::SPECTATOR
    } else {
        company
    }
}

fn runs_as_spectator(info: CommandInfo) -> bool {
    info.flags
        .intersects(CommandFlags::SERVER.union(CommandFlags::SPECTATOR))
}

fn queued() -> CommandOutcome {
    CommandOutcome::new(OutcomeKind::Queued, CommandCost::new(), CommandResult::None)
}

/// Test run of `packet`, including the affordability check.
fn test_packet(
    world: &mut World,
    packet: &CommandPacket,
    info: CommandInfo,
    extra: DoCommandFlags,
) -> CommandCost {
    let ctx = CommandContext {
        flags: info.flags.to_do_flags().union(extra),
        company: packet.company,
    };
    let (mut cost, _) = execute(world, &ctx, &packet.command);
    if cost.succeeded() && !ctx.query_cost() && !info.flags.contains(CommandFlags::NO_TEST) {
        let money = world.companies.get(&packet.company).map(|c| c.money);
        if cost.cost().0 > 0 && money.is_some_and(|m| m < cost.cost()) {
            cost.make_error(STR_ERROR_NOT_ENOUGH_CASH_REQUIRES_CURRENCY);
        }
    }
    cost
}

/// Check structural invariants of orders after every command.
#[cfg(feature = "debug-validation")]
fn validate_world(world: &World) {
    for (id, list) in world.order_lists.iter() {
        let len = list.len();
        let targets_ok = list
            .orders()
            .iter()
            .filter_map(crate::order::Order::skip_to)
            .all(|target| usize::from(target) < len.max(1));
        if !targets_ok {
            tracing::error!(list = id.0, "conditional skip target out of range");
        }
        debug_assert!(targets_ok);
        for sharer in list.sharers() {
            let linked = world.vehicles.get(*sharer).is_some_and(|v| v.orders == Some(id));
            if !linked {
                tracing::error!(list = id.0, vehicle = sharer.0, "sharer not linked to list");
            }
            debug_assert!(linked);
        }
    }
    for (id, vehicle) in world.vehicles.iter() {
        let len = world.num_orders(id);
        let in_range = len == 0 || usize::from(vehicle.cur_implicit_order_index) < len;
        debug_assert!(in_range, "order index of vehicle {} out of range", id.0);
    }
}
