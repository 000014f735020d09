//! Determinism and lockstep test harness.
//!
//! Tools for verifying that command execution is deterministic:
//! - Replay the same command script several times and compare state hashes
//! - Run a server and its clients in lockstep and compare their worlds
//! - Locate the first frame at which two runs diverge

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use ttd_core::command::{CommandDispatcher, CommandRequest};
use ttd_core::ids::ClientId;
use ttd_core::world::World;

/// Result of a determinism verification run.
#[derive(Debug, Clone)]
pub struct DeterminismResult {
    /// Whether all runs produced identical state hashes.
    pub is_deterministic: bool,
    /// State hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of frames executed per run.
    pub frames: u32,
}

impl DeterminismResult {
    /// Get the number of unique hashes (should be 1 for deterministic).
    #[must_use]
    pub fn unique_hashes(&self) -> usize {
        let mut unique = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique.len()
    }

    /// Panic with a detailed message if not deterministic.
    ///
    /// # Panics
    ///
    /// Panics if the simulation runs produced different state hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            panic!(
                "Command execution is NOT deterministic!\n\
                 Frames: {}\n\
                 Runs: {}\n\
                 Unique hashes: {}\n\
                 Hashes: {:?}",
                self.frames,
                self.hashes.len(),
                self.unique_hashes(),
                self.hashes
            );
        }
    }
}

/// A command issued by one peer in a given frame.
#[derive(Debug, Clone)]
pub struct ScriptedCommand {
    /// Frame in which the command is posted.
    pub frame: u32,
    /// Issuing peer: 0 is the server (or the offline game), `n` is client `n`.
    pub peer: usize,
    /// The command.
    pub request: CommandRequest,
}

impl ScriptedCommand {
    /// Command posted by `peer` in `frame`.
    #[must_use]
    pub fn new(frame: u32, peer: usize, request: CommandRequest) -> Self {
        Self {
            frame,
            peer,
            request,
        }
    }
}

/// Run `script` offline against `world` for `frames` frames.
///
/// Commands rejected by their flags are skipped. Returns the final state hash.
pub fn run_script(world: &mut World, script: &[ScriptedCommand], frames: u32) -> u64 {
    let mut dispatcher = CommandDispatcher::offline();
    for frame in 0..frames {
        for step in script.iter().filter(|s| s.frame == frame) {
            if let Err(err) = dispatcher.post(world, step.request.clone()) {
                tracing::debug!(frame, error = %err, "scripted command rejected");
            }
        }
        dispatcher.execute_frame(world);
    }
    world.state_hash()
}

/// Run `script` offline `runs` times on fresh worlds from `setup` and compare
/// the final state hashes.
///
/// # Example
///
/// ```ignore
/// use ttd_test_utils::determinism::verify_determinism;
/// use ttd_test_utils::fixtures::Scenario;
///
/// let result = verify_determinism(5, 100, || Scenario::new().world, &script);
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<Setup>(
    runs: usize,
    frames: u32,
    setup: Setup,
    script: &[ScriptedCommand],
) -> DeterminismResult
where
    Setup: Fn() -> World,
{
    let hashes: Vec<u64> = (0..runs)
        .map(|_| {
            let mut world = setup();
            run_script(&mut world, script, frames)
        })
        .collect();
    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        frames,
    }
}

/// Final state of a lockstep session.
#[derive(Debug)]
pub struct LockstepResult {
    /// World of the server.
    pub server: World,
    /// Worlds of the clients, in client order.
    pub clients: Vec<World>,
    /// Frames executed.
    pub frames: u32,
    /// Commands rejected by their flags before leaving their peer.
    pub rejected: usize,
}

impl LockstepResult {
    /// Whether every client ended with the server's state.
    #[must_use]
    pub fn in_sync(&self) -> bool {
        self.clients.iter().all(|client| *client == self.server)
    }

    /// Panic with the diverging hashes if a client desynced.
    ///
    /// # Panics
    ///
    /// Panics if a client world differs from the server world.
    pub fn assert_in_sync(&self) {
        if !self.in_sync() {
            let client_hashes: Vec<u64> = self.clients.iter().map(World::state_hash).collect();
            panic!(
                "Lockstep peers desynced!\n\
                 Frames: {}\n\
                 Server hash: {}\n\
                 Client hashes: {:?}",
                self.frames,
                self.server.state_hash(),
                client_hashes
            );
        }
    }
}

/// Run a server and `num_clients` clients in lockstep, each on its own copy
/// of the world from `setup`, feeding them `script`.
///
/// Per frame: scripted commands are posted, client outboxes travel to the
/// server, the server distributes what it accepted, and every peer executes
/// the frame.
pub fn run_lockstep<Setup>(
    setup: Setup,
    num_clients: usize,
    script: &[ScriptedCommand],
    frames: u32,
) -> LockstepResult
where
    Setup: Fn() -> World,
{
    let mut server_world = setup();
    let mut server = CommandDispatcher::server();
    let mut peers: Vec<(CommandDispatcher, World)> = (0..num_clients)
        .map(|n| {
            let id = ClientId(u32::try_from(n).unwrap_or(u32::MAX).saturating_add(2));
            (CommandDispatcher::client(id), setup())
        })
        .collect();
    let mut rejected = 0;

    for frame in 0..frames {
        for step in script.iter().filter(|s| s.frame == frame) {
            let posted = if step.peer == 0 {
                server.post(&mut server_world, step.request.clone())
            } else if let Some((dispatcher, world)) = peers.get_mut(step.peer - 1) {
                dispatcher.post(world, step.request.clone())
            } else {
                continue;
            };
            if posted.is_err() {
                rejected += 1;
            }
        }
        for (dispatcher, _) in &mut peers {
            let from = dispatcher.local_client();
            for packet in dispatcher.take_outbox() {
                if server.accept_from_client(packet, from).is_err() {
                    rejected += 1;
                }
            }
        }
        let packets = server.distribute();
        for (dispatcher, _) in &mut peers {
            for packet in &packets {
                dispatcher.receive(packet.clone());
            }
        }
        server.execute_frame(&mut server_world);
        for (dispatcher, world) in &mut peers {
            dispatcher.execute_frame(world);
        }
    }

    LockstepResult {
        server: server_world,
        clients: peers.into_iter().map(|(_, world)| world).collect(),
        frames,
        rejected,
    }
}

/// Run `script` on two fresh worlds frame by frame and return the first frame
/// after which their hashes differ.
pub fn find_first_divergence<Setup>(
    setup: Setup,
    script: &[ScriptedCommand],
    frames: u32,
) -> Option<u32>
where
    Setup: Fn() -> World,
{
    let mut first = setup();
    let mut second = setup();
    if first.state_hash() != second.state_hash() {
        return Some(0);
    }
    let mut first_dispatcher = CommandDispatcher::offline();
    let mut second_dispatcher = CommandDispatcher::offline();
    for frame in 0..frames {
        for step in script.iter().filter(|s| s.frame == frame) {
            let _ = first_dispatcher.post(&mut first, step.request.clone());
            let _ = second_dispatcher.post(&mut second, step.request.clone());
        }
        first_dispatcher.execute_frame(&mut first);
        second_dispatcher.execute_frame(&mut second);
        if first.state_hash() != second.state_hash() {
            return Some(frame + 1);
        }
    }
    None
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for orders and commands.
///
/// Station ids start at 1, matching the fixture's first station.
pub mod strategies {
    use proptest::prelude::*;
    use ttd_core::cargo::CargoId;
    use ttd_core::command::{Command, CommandRequest};
    use ttd_core::ids::{StationId, VehicleId};
    use ttd_core::money::Money;
    use ttd_core::order::{ConditionComparator, ConditionVariable, LoadType, Order, UnloadType};
    use ttd_core::order_list::VehicleOrderId;

    use crate::fixtures::COMPANY;

    /// Load types.
    pub fn arb_load() -> impl Strategy<Value = LoadType> {
        prop_oneof![
            Just(LoadType::LoadIfPossible),
            Just(LoadType::FullLoad),
            Just(LoadType::FullLoadAny),
            Just(LoadType::NoLoad),
        ]
    }

    /// Unload types.
    pub fn arb_unload() -> impl Strategy<Value = UnloadType> {
        prop_oneof![
            Just(UnloadType::UnloadIfPossible),
            Just(UnloadType::Unload),
            Just(UnloadType::Transfer),
            Just(UnloadType::NoUnload),
        ]
    }

    /// Cargos of the fixture world.
    pub fn arb_cargo() -> impl Strategy<Value = CargoId> {
        prop_oneof![Just(CargoId::PASSENGERS), Just(CargoId::COAL)]
    }

    /// A single order valid in a list of `len` orders over stations
    /// `1..=stations`.
    pub fn arb_order(stations: u16, len: usize) -> impl Strategy<Value = Order> {
        let max_target = VehicleOrderId::try_from(len.max(1) - 1).unwrap_or(VehicleOrderId::MAX);
        prop_oneof![
            4 => (1..=stations, arb_load(), arb_unload()).prop_map(|(s, load, unload)| {
                Order::goto_station(StationId(s))
                    .with_load(load)
                    .with_unload(unload)
            }),
            1 => (1..=stations).prop_map(|s| Order::goto_waypoint(StationId(s))),
            1 => (1..=stations, arb_cargo())
                .prop_map(|(s, cargo)| Order::goto_station(StationId(s)).with_refit(cargo)),
            1 => (1..=stations).prop_map(|s| {
                Order::goto_station(StationId(s)).with_refit(CargoId::AUTO_REFIT)
            }),
            1 => (0..=max_target, 0..=100u16).prop_map(|(target, value)| {
                Order::conditional(
                    ConditionVariable::LoadPercentage,
                    ConditionComparator::LessThan,
                    value,
                    target,
                )
            }),
            1 => (0..=max_target).prop_map(Order::jump),
        ]
    }

    /// Order lists of `1..=max_len` orders whose jumps stay in range.
    pub fn arb_order_list(stations: u16, max_len: usize) -> impl Strategy<Value = Vec<Order>> {
        (1..=max_len.max(1))
            .prop_flat_map(move |len| prop::collection::vec(arb_order(stations, len), len))
    }

    /// Commands against `vehicle` of the fixture company. Some are expected
    /// to fail; failures must be deterministic too.
    pub fn arb_command(vehicle: VehicleId, stations: u16) -> impl Strategy<Value = CommandRequest> {
        let command = prop_oneof![
            3 => (0..6u8, arb_order(stations, 6))
                .prop_map(move |(sel, order)| Command::InsertOrder { vehicle, sel, order }),
            1 => (0..6u8).prop_map(move |sel| Command::DeleteOrder { vehicle, sel }),
            1 => (0..6u8, 0..6u8).prop_map(move |(from, to)| Command::MoveOrder { vehicle, from, to }),
            1 => (0..6u8).prop_map(move |sel| Command::SkipToOrder { vehicle, sel }),
            1 => (0..6u8, proptest::option::of(arb_cargo()))
                .prop_map(move |(sel, cargo)| Command::OrderRefit { vehicle, sel, cargo }),
            1 => (0..1000i64).prop_map(|amount| Command::MoneyCheat { amount: Money(amount) }),
        ];
        command.prop_map(|command| CommandRequest::new(command, COMPANY))
    }
}
