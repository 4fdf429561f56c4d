/// Number of restarts a single loop may perform.
pub const MAX_LOOP_ITERATIONS: u32 = 2;

/// Bounds how many times a run may restart from the top.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopController {
  current: u32,
}

impl LoopController {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn can_loop(&self) -> bool {
    self.current < MAX_LOOP_ITERATIONS
  }

  /// Advance the counter. Saturates at the ceiling, so extra calls never
  /// re-open the loop.
  pub fn increment_iteration(&mut self) {
    self.current = (self.current + 1).min(MAX_LOOP_ITERATIONS);
  }

  pub fn current_iteration(&self) -> u32 {
    self.current
  }

  pub fn max_iterations(&self) -> u32 {
    MAX_LOOP_ITERATIONS
  }

  pub fn reset(&mut self) {
    self.current = 0;
  }
}
