//! Collaborator traits
//!
//! The scheduler drives hardware it does not own: the main CPU core, the
//! secondary CPU, the FM synthesis chip, the line renderer and the platform
//! audio interface. Each is reached through one trait here, and a
//! [`Collaborators`] bundle lends all of them to the scheduler for the
//! duration of a call.

use crate::Result;

/// Autovector level of the vertical interrupt
pub const VINT_LEVEL: u8 = 6;
/// Autovector level of the horizontal interrupt
pub const HINT_LEVEL: u8 = 4;

/// Main CPU core
///
/// # Example
///
/// ```
/// use genesis_sync::bus::MainCpu;
///
/// struct Spin { pending: Option<u8> }
///
/// impl MainCpu for Spin {
///     fn execute(&mut self, budget: u32) -> u32 { budget }
///     fn step(&mut self) -> u32 { 4 }
///     fn raise_autovector(&mut self, level: u8) { self.pending = Some(level); }
/// }
/// ```
pub trait MainCpu {
    /// Run for up to `budget` clocks
    ///
    /// # Returns
    ///
    /// Clocks actually consumed. This may exceed `budget` by the tail of the
    /// last instruction. Zero means the core is idle (halted or stopped).
    fn execute(&mut self, budget: u32) -> u32;

    /// Run exactly one instruction and return the clocks it took
    fn step(&mut self) -> u32;

    /// Raise an autovectored interrupt at `level`
    fn raise_autovector(&mut self, level: u8);
}

/// Secondary (sound) CPU
pub trait SubCpu {
    /// The field boundary line was reached
    fn notify_field_boundary_interrupt(&mut self);

    /// A new field begins; drop per-field state
    fn reset_field_state(&mut self);
}

/// FM synthesis chip
pub trait FmChip {
    /// Render `left.len()` stereo samples (both slices have the same length)
    fn update(&mut self, left: &mut [i16], right: &mut [i16]);

    /// Write `data` to port 0-3 (address/data pairs for banks 0 and 1)
    fn write(&mut self, port: u8, data: u8);

    /// Read the status port at `addr`
    fn read(&mut self, addr: u8) -> u8;

    /// Reset the chip
    fn reset(&mut self) {}
}

/// Video line renderer
pub trait LineRenderer {
    /// Render visible row `row` (0 is the first visible line)
    fn render_line(&mut self, row: u32);

    /// The last line of the field has been rendered
    fn end_of_field(&mut self);
}

/// Platform audio interface
///
/// Consumes one field of stereo samples at a time and reports how much
/// audio is still queued for playback.
pub trait AudioOutput {
    /// Open the device and begin playback
    ///
    /// # Errors
    ///
    /// Fails when the device or its sample format is unavailable.
    fn start(&mut self) -> Result<()>;

    /// Stop playback and release the device
    fn stop(&mut self);

    /// Pause playback, keeping queued audio
    fn pause(&mut self);

    /// Resume after [`pause`](AudioOutput::pause)
    fn resume(&mut self);

    /// Queue one field of samples (both slices have the same length)
    fn output(&mut self, left: &[i16], right: &[i16]);

    /// Stereo frames queued but not yet played
    fn buffered_count(&self) -> usize;
}

/// Borrowed set of collaborators for one scheduler call
pub struct Collaborators<'a> {
    /// Main CPU
    pub cpu: &'a mut dyn MainCpu,
    /// Secondary CPU
    pub sub_cpu: &'a mut dyn SubCpu,
    /// FM chip
    pub fm: &'a mut dyn FmChip,
    /// Line renderer
    pub renderer: &'a mut dyn LineRenderer,
    /// Platform audio
    pub audio: &'a mut dyn AudioOutput,
}

/// Stand-in for hardware that is not attached
///
/// Acts as a silent FM chip, a sub CPU that ignores notifications and a
/// renderer that draws nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Detached;

impl SubCpu for Detached {
    fn notify_field_boundary_interrupt(&mut self) {}
    fn reset_field_state(&mut self) {}
}

impl FmChip for Detached {
    fn update(&mut self, left: &mut [i16], right: &mut [i16]) {
        left.fill(0);
        right.fill(0);
    }

    fn write(&mut self, _port: u8, _data: u8) {}

    fn read(&mut self, _addr: u8) -> u8 {
        0
    }
}

impl LineRenderer for Detached {
    fn render_line(&mut self, _row: u32) {}
    fn end_of_field(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_fm_is_silent() {
        let mut fm = Detached;
        let mut left = [5i16; 8];
        let mut right = [-5i16; 8];
        fm.update(&mut left, &mut right);
        assert!(left.iter().chain(right.iter()).all(|&s| s == 0));
        assert_eq!(fm.read(0), 0);
    }
}
