use crate::config::Config;
use crate::func_unit::{FuncUnit, REG_DELAY};
use crate::port::{self, Clock};
use crate::sim::Component;
use crate::sync::Arc;
use crate::trace;
use crate::types::{FpuOp, Op};

/// Floating-point unit.
///
/// Purely a latency model; FP ops never drive `fetch_stall`, so there is
/// no warp-resume side effect here.
pub struct FpuUnit {
    config: Arc<Config>,
    inner: FuncUnit,
}

impl FpuUnit {
    #[must_use]
    pub fn new(clock: &Clock, core_id: usize, config: Arc<Config>) -> Self {
        let inner = FuncUnit::new(clock, format!("core{core_id}-fpu-unit"), config.issue_width);
        Self { config, inner }
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

impl Component for FpuUnit {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn tick(&mut self, cycle: u64) {
        for iw in 0..self.inner.issue_width() {
            let Some(trace) = self.inner.inputs[iw].lock().pop() else {
                continue;
            };
            let Op::Fpu(op) = trace.op else {
                panic!("{}: non-FPU trace dispatched: {trace}", self.inner.name);
            };
            let delay = match op {
                FpuOp::Fncp => 2 + REG_DELAY,
                FpuOp::Fma => self.config.latency_fma + REG_DELAY,
                FpuOp::Fdiv => self.config.latency_fdiv + REG_DELAY,
                FpuOp::Fsqrt => self.config.latency_fsqrt + REG_DELAY,
                FpuOp::Fcvt => self.config.latency_fcvt + REG_DELAY,
            };
            log::debug!("{}: cycle={cycle:04} op={op}, {trace}", self.inner.name);
            self.inner.outputs[iw].lock().push(trace, delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FpuUnit;
    use crate::config::Config;
    use crate::port;
    use crate::sim::Simulator;
    use crate::sync::Arc;
    use crate::trace::{self, Builder};
    use crate::types::{FpuOp, Op};

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
    fn non_compute_retires_four_cycles_after_issue() {
        let config = Arc::new(Config {
            issue_width: 2,
            ..Config::default()
        });
        let mut sim = Simulator::new();
        let fpu = sim.add(FpuUnit::new(&sim.clock(), 0, config));

        fpu.lock()
            .input(0)
            .lock()
            .push(Builder::new(Op::Fpu(FpuOp::Fncp)).build(), 1);
        let output = fpu.lock().output(0);
        assert_eq!(arrival(&mut sim, &output), 5);
    }

    #[test]
    fn variable_latency_ops_follow_the_config() {
        let config = Arc::new(Config {
            issue_width: 2,
            latency_fma: 4,
            latency_fdiv: 16,
            latency_fsqrt: 10,
            latency_fcvt: 7,
            ..Config::default()
        });
        for (op, latency) in [
            (FpuOp::Fma, 4),
            (FpuOp::Fdiv, 16),
            (FpuOp::Fsqrt, 10),
            (FpuOp::Fcvt, 7),
        ] {
            let mut sim = Simulator::new();
            let fpu = sim.add(FpuUnit::new(&sim.clock(), 0, config.clone()));
            fpu.lock()
                .input(1)
                .lock()
                .push(Builder::new(Op::Fpu(op)).build(), 1);
            let output = fpu.lock().output(1);
            assert_eq!(arrival(&mut sim, &output), 1 + latency + 2);
        }
    }

    #[test]
    fn lanes_drain_independently_in_one_cycle() {
        let config = Arc::new(Config {
            issue_width: 2,
            ..Config::default()
        });
        let mut sim = Simulator::new();
        let fpu = sim.add(FpuUnit::new(&sim.clock(), 0, config));

        for lane in 0..2 {
            fpu.lock()
                .input(lane)
                .lock()
                .push(Builder::new(Op::Fpu(FpuOp::Fncp)).build(), 1);
        }
        sim.run(5);
        let fpu = fpu.lock();
        assert!(fpu.output(0).lock().front().is_some());
        assert!(fpu.output(1).lock().front().is_some());
    }
}
