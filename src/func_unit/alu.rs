use crate::config::Config;
use crate::func_unit::{FuncUnit, REG_DELAY};
use crate::port::{self, Clock};
use crate::sim::Component;
use crate::sync::Arc;
use crate::trace;
use crate::types::{AluOp, Op};
use crate::warp;

/// Integer unit: fixed-latency arithmetic and branches, multi-cycle
/// multiply, iterative divide.
pub struct AluUnit {
    config: Arc<Config>,
    scheduler: warp::SchedulerRef,
    inner: FuncUnit,
}

impl AluUnit {
    #[must_use]
    pub fn new(
        clock: &Clock,
        core_id: usize,
        config: Arc<Config>,
        scheduler: warp::SchedulerRef,
    ) -> Self {
        let inner = FuncUnit::new(clock, format!("core{core_id}-alu-unit"), config.issue_width);
        Self {
            config,
            scheduler,
            inner,
        }
    }

    #[must_use]
    pub fn input(&self, lane: usize) -> port::Ref<trace::Ref> {
        Arc::clone(&self.inner.inputs[lane])
    }

    #[must_use]
    pub fn output(&self, lane: usize) -> port::Ref<trace::Ref> {
        Arc::clone(&self.inner.outputs[lane])
    }
}

impl Component for AluUnit {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn tick(&mut self, cycle: u64) {
        for iw in 0..self.inner.issue_width() {
            let Some(trace) = self.inner.inputs[iw].lock().pop() else {
                continue;
            };
            let Op::Alu(op) = trace.op else {
                panic!("{}: non-ALU trace dispatched: {trace}", self.inner.name);
            };
            let delay = match op {
                AluOp::Arith | AluOp::Branch | AluOp::Syscall => 2 + REG_DELAY,
                AluOp::Imul => self.config.latency_imul + REG_DELAY,
                AluOp::Idiv => self.config.xlen + REG_DELAY,
            };
            log::debug!("{}: cycle={cycle:04} op={op}, {trace}", self.inner.name);
            self.inner.outputs[iw].lock().push(Arc::clone(&trace), delay);
            if trace.eop && trace.fetch_stall {
                self.scheduler.lock().resume(trace.wid);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AluUnit;
    use crate::config::Config;
    use crate::port;
    use crate::sim::Simulator;
    use crate::sync::Arc;
    use crate::trace::{self, Builder};
    use crate::types::{AluOp, Op};
    use crate::warp::testing::Recorder;

    /// Run until the port shows a visible head, returning that cycle.
    fn arrival(sim: &mut Simulator, port: &port::Ref<trace::Ref>) -> u64 {
        for _ in 0..256 {
            if port.lock().front().is_some() {
                return sim.cycle();
            }
            sim.tick();
        }
        panic!("trace never arrived");
    }

    #[test]
    fn arith_retires_four_cycles_after_issue() {
        let config = Arc::new(Config {
            issue_width: 2,
            ..Config::default()
        });
        let recorder = Recorder::shared();
        let mut sim = Simulator::new();
        let alu = sim.add(AluUnit::new(&sim.clock(), 0, config, recorder.clone()));

        let trace = Builder::new(Op::Alu(AluOp::Arith)).build();
        alu.lock().input(0).lock().push(trace, 1);

        // issued visible at cycle 1, retires at 1 + 4
        let output = alu.lock().output(0);
        assert_eq!(arrival(&mut sim, &output), 5);
        assert!(recorder.lock().resumed.is_empty());
    }

    #[test]
    fn imul_takes_the_configured_latency() {
        let config = Arc::new(Config {
            issue_width: 2,
            latency_imul: 3,
            ..Config::default()
        });
        let recorder = Recorder::shared();
        let mut sim = Simulator::new();
        let alu = sim.add(AluUnit::new(&sim.clock(), 0, config, recorder));

        let trace = Builder::new(Op::Alu(AluOp::Imul)).build();
        alu.lock().input(0).lock().push(trace, 1);

        let output = alu.lock().output(0);
        assert_eq!(arrival(&mut sim, &output), 1 + 3 + 2);
    }

    #[test]
    fn idiv_takes_xlen_cycles() {
        let config = Arc::new(Config {
            issue_width: 2,
            xlen: 32,
            ..Config::default()
        });
        let recorder = Recorder::shared();
        let mut sim = Simulator::new();
        let alu = sim.add(AluUnit::new(&sim.clock(), 0, config, recorder));

        let trace = Builder::new(Op::Alu(AluOp::Idiv)).build();
        alu.lock().input(0).lock().push(trace, 1);

        let output = alu.lock().output(0);
        assert_eq!(arrival(&mut sim, &output), 1 + 32 + 2);
    }

    #[test]
    fn fetch_stalled_end_of_packet_resumes_the_warp() {
        let config = Arc::new(Config {
            issue_width: 2,
            ..Config::default()
        });
        let recorder = Recorder::shared();
        let mut sim = Simulator::new();
        let alu = sim.add(AluUnit::new(&sim.clock(), 0, config, recorder.clone()));

        let mut builder = Builder::new(Op::Alu(AluOp::Branch));
        builder.wid = 3;
        builder.fetch_stall = true;
        alu.lock().input(1).lock().push(builder.build(), 1);

        sim.run(2);
        assert_eq!(recorder.lock().resumed, vec![3]);
    }

    #[test]
    fn partial_issue_does_not_resume() {
        let config = Arc::new(Config {
            issue_width: 2,
            ..Config::default()
        });
        let recorder = Recorder::shared();
        let mut sim = Simulator::new();
        let alu = sim.add(AluUnit::new(&sim.clock(), 0, config, recorder.clone()));

        let mut builder = Builder::new(Op::Alu(AluOp::Arith));
        builder.eop = false;
        builder.fetch_stall = true;
        alu.lock().input(0).lock().push(builder.build(), 1);

        sim.run(2);
        assert!(recorder.lock().resumed.is_empty());
    }
}
