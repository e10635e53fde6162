//! The cycle-accurate global scheduler.
//!
//! Interleaves CPUs running at different clock ratios with a sorted queue
//! of deferred hardware events. The scheduler itself holds only the
//! event queue and the global cycle counter; stepping a CPU and firing a
//! task are delegated to a [`SchedulerHost`] so this module can be unit
//! tested without constructing a whole [`crate::sim::Core`].

use crate::cpu::CpuId;

/// Identifies a deferred hardware event.
///
/// Opaque to the scheduler itself (it only orders and fires these); the
/// [`SchedulerHost`] interprets each variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskId {
    /// Ends the current `run_frame` call.
    FrameEnd,
    /// Rebases `global_cycles`, every per-CPU `cycles`, and every event
    /// deadline to keep values bounded.
    ResetCycles,
    /// Parks a halted CPU (scheduled by `CpuCore::halt`).
    ArmStop(CpuId),
    /// Drains one step of the GPU command list.
    GpuCommandStep,
    /// A device-defined periodic task (DMA completion, timer tick, VBlank),
    /// identified by a small integer the MMIO layer assigns.
    Device(u32),
}

/// A single entry in the scheduler's event queue.
#[derive(Clone, Copy, Debug)]
struct Event {
    task: TaskId,
    deadline: u64,
    /// Insertion order, used to break deadline ties FIFO.
    seq: u64,
}

/// Global cycle counter and sorted event queue.
pub struct Scheduler {
    /// Monotonically increasing global cycle count.
    pub global_cycles: u64,
    /// Events sorted ascending by `(deadline, seq)`; `events[0]` is always
    /// the next event to fire.
    events: Vec<Event>,
    next_seq: u64,
    /// Set by `run_frame` entry, cleared by the frame-end task.
    pub running: bool,
}

/// Per-component hooks the scheduler needs to drive a frame.
///
/// Implemented by [`crate::sim::Core`]; a test can implement this on a
/// much smaller mock to exercise scheduler ordering in isolation.
pub trait SchedulerHost {
    /// CPUs the scheduler should consider stepping this frame — `{A11-0,
    /// A11-1}` normally, `{A11-0..A11-3, A9}` under extra mode (*A11*
    /// cores 2/3 are gated by that flag; A9 always runs).
    fn active_cpus(&self) -> &[CpuId];
    /// The cycle at which `id` is next due to run an opcode, or `-1` if
    /// halted (matches `CpuCore::cycles`'s halted sentinel).
    fn cpu_cycles(&self, id: CpuId) -> i64;
    /// Clock divider for `id`: ×1 for A11 cores, ×2 for A9 (and any DSP).
    fn clock_divider(&self, id: CpuId) -> u64;
    /// Executes exactly one opcode on `id` and returns its cycle cost
    /// (pre-division; the scheduler applies the clock divider).
    fn run_opcode(&mut self, id: CpuId) -> u64;
    /// Sets `id`'s next-due cycle directly (used after `run_opcode`).
    fn set_cpu_cycles(&mut self, id: CpuId, cycles: i64);
    /// Invoked when a scheduled task's deadline has passed; may call
    /// `scheduler.schedule` to queue a follow-up.
    fn fire_task(&mut self, task: TaskId, scheduler: &mut Scheduler);
}

impl Scheduler {
    /// Creates an idle scheduler with no pending events.
    #[must_use]
    pub fn new() -> Self {
        Self {
            global_cycles: 0,
            events: Vec::new(),
            next_seq: 0,
            running: false,
        }
    }

    /// Inserts an event at `global_cycles + delay`, keeping `events`
    /// sorted by `(deadline, seq)` so ties resolve FIFO.
    pub fn schedule(&mut self, task_id: TaskId, delay: u64) {
        let deadline = self.global_cycles + delay;
        let seq = self.next_seq;
        self.next_seq += 1;
        let pos = self
            .events
            .partition_point(|e| (e.deadline, e.seq) <= (deadline, seq));
        self.events.insert(pos, Event {
            task: task_id,
            deadline,
            seq,
        });
    }

    /// The deadline of the next pending event, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<u64> {
        self.events.first().map(|e| e.deadline)
    }

    /// Subtracts `delta` from `global_cycles` and every pending event's
    /// deadline, keeping relative ordering intact (periodic
    /// rebase, fired by the host's `TaskId::ResetCycles` handler; the host
    /// is responsible for rebasing each `CpuCore::cycles` the same way).
    pub fn rebase(&mut self, delta: u64) {
        self.global_cycles = self.global_cycles.saturating_sub(delta);
        for event in &mut self.events {
            event.deadline = event.deadline.saturating_sub(delta);
        }
    }

    /// Removes and returns any number of pending events whose variant
    /// matches `task`, used by tests and by device teardown.
    pub fn cancel_matching(&mut self, mut matches: impl FnMut(TaskId) -> bool) {
        self.events.retain(|e| !matches(e.task));
    }

    /// Runs exactly one display frame's worth of work.
    pub fn run_frame(&mut self, host: &mut impl SchedulerHost) {
        self.running = true;
        while self.running {
            // Advance CPUs up to the next event boundary.
            while self.next_deadline().is_none_or(|d| d > self.global_cycles) {
                let mut any_ran = false;
                for &id in host.active_cpus() {
                    if host.cpu_cycles(id) <= self.global_cycles as i64 {
                        let cost = host.run_opcode(id);
                        let divider = host.clock_divider(id);
                        let next = self.global_cycles + cost * divider;
                        host.set_cpu_cycles(id, next as i64);
                        any_ran = true;
                    }
                }
                let min_cycles = host
                    .active_cpus()
                    .iter()
                    .map(|&id| host.cpu_cycles(id))
                    .filter(|&c| c >= 0)
                    .min();
                match min_cycles {
                    Some(min) if (min as u64) > self.global_cycles => {
                        self.global_cycles = min as u64;
                    }
                    Some(_) => {
                        // Every enabled CPU is already due; avoid spinning
                        // forever if none actually ran (all halted at the
                        // same instant as the next event).
                        if !any_ran {
                            break;
                        }
                    }
                    None => break, // every CPU halted; fall through to events
                }
            }

            let Some(deadline) = self.next_deadline() else {
                // No CPU is runnable and no event is pending: nothing more
                // can happen this frame. The host is expected to always
                // have a FrameEnd event queued, so this is defensive.
                break;
            };
            self.global_cycles = self.global_cycles.max(deadline);

            while let Some(event) = self.events.first().copied() {
                if event.deadline > self.global_cycles {
                    break;
                }
                self.events.remove(0);
                host.fire_task(event.task, self);
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingHost {
        order: Vec<&'static str>,
        cpus: Vec<CpuId>,
        cycles: std::collections::HashMap<CpuId, i64>,
    }

    impl RecordingHost {
        fn new() -> Self {
            let cpus = vec![CpuId::A11_0];
            let mut cycles = std::collections::HashMap::new();
            cycles.insert(CpuId::A11_0, -1); // halted: never steps
            Self {
                order: Vec::new(),
                cpus,
                cycles,
            }
        }
    }

    impl SchedulerHost for RecordingHost {
        fn active_cpus(&self) -> &[CpuId] {
            &self.cpus
        }
        fn cpu_cycles(&self, id: CpuId) -> i64 {
            self.cycles[&id]
        }
        fn clock_divider(&self, _id: CpuId) -> u64 {
            1
        }
        fn run_opcode(&mut self, _id: CpuId) -> u64 {
            1
        }
        fn set_cpu_cycles(&mut self, id: CpuId, cycles: i64) {
            self.cycles.insert(id, cycles);
        }
        fn fire_task(&mut self, task: TaskId, scheduler: &mut Scheduler) {
            match task {
                TaskId::Device(1) => self.order.push("B"),
                TaskId::Device(2) => self.order.push("A"),
                TaskId::FrameEnd => scheduler.running = false,
                _ => {}
            }
        }
    }

    /// Scenario 4: schedule A at delay 100 then B at delay
    /// 50 (in that order); `run_frame` must fire B then A.
    #[test]
    fn events_fire_in_deadline_order_not_insertion_order() {
        let mut scheduler = Scheduler::new();
        let mut host = RecordingHost::new();
        scheduler.schedule(TaskId::Device(2), 100); // "A"
        scheduler.schedule(TaskId::Device(1), 50); // "B"
        scheduler.schedule(TaskId::FrameEnd, 150);

        scheduler.run_frame(&mut host);

        assert_eq!(host.order, vec!["B", "A"]);
        assert_eq!(scheduler.global_cycles, 150);
    }

    #[test]
    fn ties_resolve_fifo() {
        let mut scheduler = Scheduler::new();
        let mut host = RecordingHost::new();
        scheduler.schedule(TaskId::Device(1), 10); // inserted first
        scheduler.schedule(TaskId::Device(2), 10); // same deadline, later
        scheduler.schedule(TaskId::FrameEnd, 10);

        scheduler.run_frame(&mut host);

        assert_eq!(host.order, vec!["B", "A"]);
    }

    #[test]
    fn no_event_has_a_smaller_deadline_than_global_cycles_after_run_frame() {
        let mut scheduler = Scheduler::new();
        let mut host = RecordingHost::new();
        scheduler.schedule(TaskId::Device(1), 20);
        scheduler.schedule(TaskId::FrameEnd, 20);

        scheduler.run_frame(&mut host);

        assert_eq!(scheduler.global_cycles, 20);
        assert!(scheduler.next_deadline().is_none());
    }
}
