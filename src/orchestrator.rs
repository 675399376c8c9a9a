//! Per-frame pass ordering.
//!
//! A frame is three fixed stages:
//!
//! | Stage | Priority | Work |
//! |-------|-----------------|------|
//! | [`FrameStage::CaptureDepth`] | -2 | render the opaque scene into every registered capture channel |
//! | [`FrameStage::DisableAutoClear`] | -1 | stop implicit clears so later overlays composite |
//! | [`FrameStage::PresentFinal`] | +1 | clear the surface and draw the composed scene |
//!
//! Stages run in enum order. Every capture of frame *k* is recorded before
//! the present of frame *k*, so particle fields always sample depth produced
//! from the current camera.
//!
//! The orchestrator only decides *what runs when*; the work itself is done
//! by a [`FrameExecutor`], which lets the ordering be tested without a GPU.

use crate::registry::Channel;

/// One stage of a frame, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FrameStage {
    CaptureDepth,
    DisableAutoClear,
    PresentFinal,
}

impl FrameStage {
    /// All stages in the order they run.
    pub const ORDER: [FrameStage; 3] = [
        FrameStage::CaptureDepth,
        FrameStage::DisableAutoClear,
        FrameStage::PresentFinal,
    ];

    /// Numeric priority in a callback-list scheduler (lower runs first).
    pub fn priority(self) -> i32 {
        match self {
            FrameStage::CaptureDepth => -2,
            FrameStage::DisableAutoClear => -1,
            FrameStage::PresentFinal => 1,
        }
    }
}

/// Per-frame values handed to every stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    /// Frame number, starting at 0.
    pub frame: u64,
    /// Seconds since the scene started.
    pub elapsed: f32,
}

/// Does the work behind each stage.
pub trait FrameExecutor {
    type Error;

    /// Render the opaque scene into `channel`'s capture target and publish it.
    fn capture_depth(&mut self, channel: Channel, frame: &FrameInfo) -> Result<(), Self::Error>;

    /// Turn off implicit clearing of the output surface.
    fn disable_auto_clear(&mut self, frame: &FrameInfo) -> Result<(), Self::Error>;

    /// Clear the visible surface and draw the full scene to it.
    fn present(&mut self, frame: &FrameInfo) -> Result<(), Self::Error>;
}

/// Runs the stages of each frame in order.
#[derive(Debug, Default)]
pub struct FrameOrchestrator {
    captures: Vec<Channel>,
    frame: u64,
}

impl FrameOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a depth capture on `channel` every frame.
    ///
    /// Volumes sharing a channel share one capture: returns `false` if the
    /// channel was already registered.
    pub fn register_capture(&mut self, channel: Channel) -> bool {
        if self.captures.contains(&channel) {
            return false;
        }
        self.captures.push(channel);
        true
    }

    /// Stop capturing `channel`.
    pub fn unregister_capture(&mut self, channel: Channel) {
        self.captures.retain(|c| *c != channel);
    }

    /// Channels captured each frame, in registration order.
    pub fn captures(&self) -> &[Channel] {
        &self.captures
    }

    /// Number of frames completed.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Run one frame.
    ///
    /// An error from any stage aborts the rest of the frame and is returned;
    /// the frame counter does not advance, and the next call starts over
    /// from the capture stage.
    pub fn run_frame<E: FrameExecutor>(
        &mut self,
        executor: &mut E,
        elapsed: f32,
    ) -> Result<FrameInfo, E::Error> {
        let info = FrameInfo {
            frame: self.frame,
            elapsed,
        };

        for stage in FrameStage::ORDER {
            match stage {
                FrameStage::CaptureDepth => {
                    for &channel in &self.captures {
                        executor.capture_depth(channel, &info)?;
                    }
                }
                FrameStage::DisableAutoClear => executor.disable_auto_clear(&info)?,
                FrameStage::PresentFinal => executor.present(&info)?,
            }
        }

        self.frame += 1;
        Ok(info)
    }
}
