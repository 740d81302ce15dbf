//! Lock-free command queue for real-time engine control
//!
//! The control surface (a non-real-time thread) pushes [`EngineCommand`]
//! values into a wait-free SPSC ring buffer; the audio thread drains the
//! queue at the start of every tick. Parameters therefore change only at
//! block boundaries and the audio thread never observes a torn update —
//! there is no mutex anywhere on the audio path.

use crate::types::SliceId;

/// Normal nudge distance for the loop start offset, in frames
pub const NUDGE_FRAMES: i64 = 10_000;

/// Fast nudge distance, in frames
pub const FAST_NUDGE_FRAMES: i64 = 100_000;

/// Commands sent from the control surface to the audio thread
///
/// Every command except [`EngineCommand::SelectSlice`] acts on the currently
/// selected slice. Each variant is one atomic operation on the engine,
/// applied at a block boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    /// Route subsequent parameter edits to this slice
    SelectSlice(SliceId),
    /// Toggle the selected slice between stopped and playing
    TogglePlay,
    /// Toggle the selected slice's mute flag (orthogonal to play state)
    ToggleMute,
    /// Move the selected slice's loop start by a signed frame count.
    /// A move that would leave the open interval (0, total_frames) is a
    /// complete no-op, not a clamp.
    Nudge { frames: i64 },
    /// Lengthen the selected slice's loop window
    GrowLoop,
    /// Shorten the selected slice's loop window
    ShrinkLoop,
    /// Raise the selected slice's volume by one step
    VolumeUp,
    /// Lower the selected slice's volume by one step
    VolumeDown,
    /// Widen the notch cut from the middle of the pass band
    LowpassUp,
    /// Narrow the notch
    LowpassDown,
    /// Widen the pass band around the center bin
    HighpassUp,
    /// Narrow the pass band
    HighpassDown,
}

/// Capacity of the command queue
///
/// The control surface emits single keystrokes, so bursts stay tiny; 64
/// leaves generous headroom while keeping the queue cache-friendly.
pub const COMMAND_QUEUE_CAPACITY: usize = 64;

/// Create a new command channel (producer/consumer pair)
///
/// The producer side belongs to the control thread, the consumer side to the
/// audio thread.
pub fn command_channel() -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}

/// Command sender for the control thread
///
/// Wraps the lock-free producer; every send is non-blocking.
pub struct CommandSender {
    pub(crate) producer: rtrb::Producer<EngineCommand>,
}

impl CommandSender {
    /// Send a command to the audio engine.
    ///
    /// Returns `Err(cmd)` if the queue is full (the command is handed back).
    pub fn send(&mut self, cmd: EngineCommand) -> Result<(), EngineCommand> {
        self.producer.push(cmd).map_err(|e| match e {
            rtrb::PushError::Full(value) => value,
        })
    }

    /// Whether the queue currently has room
    pub fn has_space(&self) -> bool {
        self.producer.slots() > 0
    }
}
