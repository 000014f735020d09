//! Command logs for recording and replaying games.
//!
//! A log stores a snapshot of the world taken when recording started and
//! every command executed afterwards, stamped with its frame. Because the
//! core is deterministic, replaying the log onto the snapshot recreates the
//! exact final state; the stored final hash verifies that.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::command::{CommandDispatcher, CommandPacket, NetworkMode};
use crate::error::{GameError, Result};
use crate::world::World;

/// Command log file format version for compatibility.
pub const COMMAND_LOG_VERSION: u32 = 1;

/// A recorded game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLog {
    /// Log format version.
    pub version: u32,
    /// Role of the recording peer; decides which test runs are skipped.
    pub mode: NetworkMode,
    /// Serialized world at the start of recording.
    pub initial_state: Vec<u8>,
    /// Frame at the start of recording.
    pub initial_frame: u32,
    /// Executed commands in execution order.
    pub packets: Vec<CommandPacket>,
    /// Frame at the end of recording.
    pub final_frame: u32,
    /// State hash at the end of recording.
    pub final_hash: u64,
}

impl CommandLog {
    /// Start a log from the current state of `world`.
    ///
    /// # Errors
    /// Returns an error if the world cannot be serialized.
    pub fn new(world: &World, mode: NetworkMode, frame: u32) -> Result<Self> {
        Ok(Self {
            version: COMMAND_LOG_VERSION,
            mode,
            initial_state: world.serialize()?,
            initial_frame: frame,
            packets: Vec::new(),
            final_frame: frame,
            final_hash: 0,
        })
    }

    /// Append an executed command.
    pub fn record(&mut self, packet: CommandPacket) {
        self.packets.push(packet);
    }

    /// Seal the log with the end-of-game frame and state hash.
    pub fn finalize(&mut self, final_frame: u32, final_hash: u64) {
        self.final_frame = final_frame;
        self.final_hash = final_hash;
    }

    /// Save the log to a file.
    ///
    /// # Errors
    /// Returns an error if serialization or file writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = bincode::serialize(self).map_err(|e| {
            GameError::InvalidState(format!("Failed to serialize command log: {}", e))
        })?;
        std::fs::write(path.as_ref(), bytes).map_err(|e| {
            GameError::InvalidState(format!("Failed to write command log file: {}", e))
        })?;
        Ok(())
    }

    /// Load a log from a file.
    ///
    /// # Errors
    /// Returns an error if file reading or deserialization fails, or the
    /// log was written by an incompatible version.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref()).map_err(|e| {
            GameError::InvalidState(format!("Failed to read command log file: {}", e))
        })?;
        let log: Self = bincode::deserialize(&bytes).map_err(|e| {
            GameError::InvalidState(format!("Failed to deserialize command log: {}", e))
        })?;

        if log.version != COMMAND_LOG_VERSION {
            return Err(GameError::InvalidState(format!(
                "Command log version mismatch: expected {}, got {}",
                COMMAND_LOG_VERSION, log.version
            )));
        }

        Ok(log)
    }

    /// World at the start of recording.
    ///
    /// # Errors
    /// Returns an error if the snapshot cannot be deserialized.
    pub fn restore_initial_state(&self) -> Result<World> {
        World::deserialize(&self.initial_state)
    }

    /// Commands executed in `frame`.
    #[must_use]
    pub fn packets_at_frame(&self, frame: u32) -> Vec<&CommandPacket> {
        self.packets.iter().filter(|p| p.frame == frame).collect()
    }

    /// Number of recorded frames.
    #[must_use]
    pub const fn duration(&self) -> u32 {
        self.final_frame.saturating_sub(self.initial_frame)
    }

    /// Number of recorded commands.
    #[must_use]
    pub fn command_count(&self) -> usize {
        self.packets.len()
    }
}

/// Plays a [`CommandLog`] back frame by frame.
#[derive(Debug)]
pub struct LogPlayer {
    log: CommandLog,
    world: World,
    dispatcher: CommandDispatcher,
}

impl LogPlayer {
    /// Player positioned at the start of `log`.
    ///
    /// # Errors
    /// Returns an error if the initial state cannot be restored.
    pub fn new(log: CommandLog) -> Result<Self> {
        let (world, dispatcher) = Self::rewind(&log)?;
        Ok(Self {
            log,
            world,
            dispatcher,
        })
    }

    fn rewind(log: &CommandLog) -> Result<(World, CommandDispatcher)> {
        let world = log.restore_initial_state()?;
        let mut dispatcher = CommandDispatcher::replay(log.mode, log.initial_frame);
        for packet in &log.packets {
            dispatcher.receive(packet.clone());
        }
        Ok((world, dispatcher))
    }

    /// Execute one frame. Returns true if there are more frames to play.
    pub fn advance(&mut self) -> bool {
        if self.is_finished() {
            return false;
        }
        self.dispatcher.execute_frame(&mut self.world);
        !self.is_finished()
    }

    /// Jump to `target_frame`, replaying from the start.
    ///
    /// # Errors
    /// Returns an error if state restoration fails.
    pub fn seek(&mut self, target_frame: u32) -> Result<()> {
        let (world, dispatcher) = Self::rewind(&self.log)?;
        self.world = world;
        self.dispatcher = dispatcher;
        while self.dispatcher.frame() < target_frame && !self.is_finished() {
            self.dispatcher.execute_frame(&mut self.world);
        }
        Ok(())
    }

    /// Frame executed next.
    #[must_use]
    pub const fn current_frame(&self) -> u32 {
        self.dispatcher.frame()
    }

    /// Current world state.
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// The log being played.
    #[must_use]
    pub const fn log(&self) -> &CommandLog {
        &self.log
    }

    /// Whether the final frame was reached.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.dispatcher.frame() >= self.log.final_frame
    }

    /// Replay the whole log and compare the final state hash.
    ///
    /// # Errors
    /// Returns [`GameError::DesyncDetected`] when the replayed state differs.
    pub fn verify(&mut self) -> Result<()> {
        self.seek(self.log.final_frame)?;
        let local_hash = self.world.state_hash();
        if local_hash != self.log.final_hash {
            return Err(GameError::DesyncDetected {
                frame: self.log.final_frame,
                local_hash,
                remote_hash: self.log.final_hash,
            });
        }
        Ok(())
    }
}
