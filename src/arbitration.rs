use crate::mem::Tagged;
use crate::port::{self, Clock, Port};
use crate::sim::Component;

/// Grant policy of the arbiter fabric.
///
/// `Priority` always scans a group from slot 0; `RoundRobin` resumes the
/// scan one past the previous grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Policy {
    Priority,
    RoundRobin,
}

fn check_arity(num_inputs: usize, num_outputs: usize, delay: u64) -> usize {
    assert!(delay >= 1, "arbiter with zero forward delay");
    assert!(num_outputs >= 1, "arbiter needs at least one output");
    assert!(
        num_inputs >= num_outputs,
        "arbiter cannot fan out ({num_inputs} inputs, {num_outputs} outputs)"
    );
    assert_eq!(
        num_inputs % num_outputs,
        0,
        "arbiter inputs must partition evenly across outputs"
    );
    let group = num_inputs / num_outputs;
    assert!(
        group.is_power_of_two(),
        "arbiter group size {group} must be a power of two"
    );
    group
}

/// N-to-M multiplexer over one request channel.
///
/// Inputs are partitioned into `num_outputs` groups; each output grants at
/// most one input per cycle, scanning its group from a cursor. With equal
/// arity the inputs are bound straight through and `tick` is a no-op.
pub struct Mux<T> {
    name: String,
    pub inputs: Vec<port::Ref<T>>,
    pub outputs: Vec<port::Ref<T>>,
    policy: Policy,
    delay: u64,
    cursors: Vec<usize>,
    group: usize,
}

impl<T> Mux<T> {
    #[must_use]
    pub fn new(
        clock: &Clock,
        name: impl Into<String>,
        policy: Policy,
        num_inputs: usize,
        num_outputs: usize,
        delay: u64,
    ) -> Self {
        let group = check_arity(num_inputs, num_outputs, delay);
        let inputs: Vec<_> = (0..num_inputs).map(|_| Port::shared(clock)).collect();
        let outputs: Vec<_> = (0..num_outputs).map(|_| Port::shared(clock)).collect();
        if num_inputs == num_outputs {
            for (input, output) in inputs.iter().zip(&outputs) {
                input.lock().bind(output);
            }
        }
        Self {
            name: name.into(),
            inputs,
            outputs,
            policy,
            delay,
            cursors: vec![0; num_outputs],
            group,
        }
    }

    fn advance_cursor(&mut self, output: usize, grant: usize) {
        if self.policy == Policy::RoundRobin {
            self.cursors[output] = grant + 1;
        }
    }
}

impl<T> Component for Mux<T>
where
    T: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn tick(&mut self, _cycle: u64) {
        if self.inputs.len() == self.outputs.len() {
            return;
        }
        for o in 0..self.outputs.len() {
            for r in 0..self.group {
                let i = (self.cursors[o] + r) & (self.group - 1);
                let j = o * self.group + i;
                let granted = self.inputs[j].lock().pop();
                if let Some(value) = granted {
                    self.outputs[o].lock().push(value, self.delay);
                    self.advance_cursor(o, i);
                    break;
                }
            }
        }
    }

    fn reset(&mut self) {
        for cursor in &mut self.cursors {
            *cursor = 0;
        }
    }
}

/// N-to-M request/response switch.
///
/// The request path arbitrates like `Mux`; on the way out the source's
/// group slot is encoded into the low `log2(group)` bits of the tag, and
/// the reverse transform routes each response back to the input that
/// produced the request. With equal arity both paths are bound straight
/// through and the tag is untouched.
pub struct Switch<Req, Rsp> {
    name: String,
    pub req_in: Vec<port::Ref<Req>>,
    pub rsp_in: Vec<port::Ref<Rsp>>,
    pub req_out: Vec<port::Ref<Req>>,
    pub rsp_out: Vec<port::Ref<Rsp>>,
    policy: Policy,
    delay: u64,
    cursors: Vec<usize>,
    lg_group: u32,
}

impl<Req, Rsp> Switch<Req, Rsp> {
    #[must_use]
    pub fn new(
        clock: &Clock,
        name: impl Into<String>,
        policy: Policy,
        num_inputs: usize,
        num_outputs: usize,
        delay: u64,
    ) -> Self {
        let group = check_arity(num_inputs, num_outputs, delay);
        let req_in: Vec<_> = (0..num_inputs).map(|_| Port::shared(clock)).collect();
        let rsp_in: Vec<_> = (0..num_inputs).map(|_| Port::shared(clock)).collect();
        let req_out: Vec<_> = (0..num_outputs).map(|_| Port::shared(clock)).collect();
        let rsp_out: Vec<_> = (0..num_outputs).map(|_| Port::shared(clock)).collect();
        if num_inputs == num_outputs {
            for i in 0..num_inputs {
                req_in[i].lock().bind(&req_out[i]);
                rsp_out[i].lock().bind(&rsp_in[i]);
            }
        }
        Self {
            name: name.into(),
            req_in,
            rsp_in,
            req_out,
            rsp_out,
            policy,
            delay,
            cursors: vec![0; num_outputs],
            lg_group: group.trailing_zeros(),
        }
    }

    fn advance_cursor(&mut self, output: usize, grant: usize) {
        if self.policy == Policy::RoundRobin {
            self.cursors[output] = grant + 1;
        }
    }
}

impl<Req, Rsp> Component for Switch<Req, Rsp>
where
    Req: Tagged + std::fmt::Display + Send + 'static,
    Rsp: Tagged + std::fmt::Display + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn tick(&mut self, _cycle: u64) {
        if self.req_in.len() == self.req_out.len() {
            return;
        }
        let group = 1usize << self.lg_group;
        for o in 0..self.req_out.len() {
            // response path: decode the source slot from the low tag bits
            let returned = self.rsp_out[o].lock().pop();
            if let Some(mut rsp) = returned {
                let i = (rsp.tag() & (group as u64 - 1)) as usize;
                rsp.set_tag(rsp.tag() >> self.lg_group);
                log::trace!("{} rsp{o}: {rsp}", self.name);
                self.rsp_in[o * group + i].lock().push(rsp, 1);
            }

            // request path
            for r in 0..group {
                let i = (self.cursors[o] + r) & (group - 1);
                let j = o * group + i;
                let granted = self.req_in[j].lock().pop();
                if let Some(mut req) = granted {
                    req.set_tag((req.tag() << self.lg_group) | i as u64);
                    log::trace!("{} req{j}: {req}", self.name);
                    self.req_out[o].lock().push(req, self.delay);
                    self.advance_cursor(o, i);
                    break;
                }
            }
        }
    }

    fn reset(&mut self) {
        for cursor in &mut self.cursors {
            *cursor = 0;
        }
    }
}

/// The switch instance the memory fabric uses.
pub type MemSwitch = Switch<crate::mem::MemReq, crate::mem::MemRsp>;

#[cfg(test)]
mod tests {
    use super::{Mux, Policy, Switch};
    use crate::mem::{AddrSpace, MemReq, MemRsp};
    use crate::sim::Simulator;

    fn mem_req(addr: u64, tag: u64) -> MemReq {
        MemReq {
            addr,
            write: false,
            space: AddrSpace::Global,
            tag,
            cid: 0,
            uuid: 0,
        }
    }

    #[test]
    fn round_robin_serves_each_backlogged_input_once_per_window() {
        let mut sim = Simulator::new();
        let mux = sim.add(Mux::<u32>::new(
            &sim.clock(),
            "mux-4to1",
            Policy::RoundRobin,
            4,
            1,
            1,
        ));
        {
            let mux = mux.lock();
            for (i, input) in mux.inputs.iter().enumerate() {
                let mut input = input.lock();
                input.push(i as u32, 1);
                input.push(10 + i as u32, 1);
            }
        }

        // two full windows of four grants
        sim.run(10);
        let output = mux.lock().outputs[0].clone();
        let mut served = Vec::new();
        while let Some(value) = output.lock().pop() {
            served.push(value);
        }
        assert_eq!(served, vec![0, 1, 2, 3, 10, 11, 12, 13]);
    }

    #[test]
    fn priority_always_rescans_from_slot_zero() {
        let mut sim = Simulator::new();
        let mux = sim.add(Mux::<u32>::new(
            &sim.clock(),
            "mux-prio",
            Policy::Priority,
            4,
            1,
            1,
        ));
        {
            let mux = mux.lock();
            let mut one = mux.inputs[1].lock();
            one.push(10, 1);
            one.push(11, 1);
            drop(one);
            mux.inputs[2].lock().push(20, 1);
        }

        sim.run(5);
        let output = mux.lock().outputs[0].clone();
        let mut served = Vec::new();
        while let Some(value) = output.lock().pop() {
            served.push(value);
        }
        assert_eq!(served, vec![10, 11, 20]);
    }

    #[test]
    fn equal_arity_mux_is_a_bound_bypass() {
        let mut sim = Simulator::new();
        let mux = sim.add(Mux::<u32>::new(
            &sim.clock(),
            "mux-bypass",
            Policy::RoundRobin,
            2,
            2,
            1,
        ));
        mux.lock().inputs[1].lock().push(5, 1);
        sim.run(1);
        assert_eq!(mux.lock().outputs[1].lock().pop(), Some(5));
    }

    #[test]
    fn switch_encodes_source_slot_in_low_tag_bits() {
        let mut sim = Simulator::new();
        let switch = sim.add(Switch::<MemReq, MemRsp>::new(
            &sim.clock(),
            "mem-switch",
            Policy::RoundRobin,
            4,
            1,
            1,
        ));
        {
            let switch = switch.lock();
            for (i, input) in switch.req_in.iter().enumerate() {
                input.lock().push(mem_req(0x1000 + i as u64, 7), 1);
            }
        }

        sim.run(5);
        let switch = switch.lock();
        let mut seen = Vec::new();
        while let Some(req) = switch.req_out[0].lock().pop() {
            seen.push(req);
        }
        assert_eq!(seen.len(), 4);
        for (grant, req) in seen.iter().enumerate() {
            assert_eq!(req.tag & 0b11, grant as u64);
            assert_eq!(req.tag >> 2, 7);
        }
    }

    #[test]
    fn switch_routes_responses_back_to_the_requesting_input() {
        let mut sim = Simulator::new();
        let switch = sim.add(Switch::<MemReq, MemRsp>::new(
            &sim.clock(),
            "mem-switch",
            Policy::RoundRobin,
            4,
            1,
            1,
        ));
        {
            let switch = switch.lock();
            for (i, input) in switch.req_in.iter().enumerate() {
                input.lock().push(mem_req(0x2000 + i as u64, i as u64), 1);
            }
        }

        // echo every transmitted request back as a response, lossless
        for _ in 0..12 {
            sim.tick();
            let switch = switch.lock();
            while let Some(req) = switch.req_out[0].lock().pop() {
                let rsp = MemRsp {
                    tag: req.tag,
                    cid: req.cid,
                    uuid: req.uuid,
                };
                switch.rsp_out[0].lock().push(rsp, 1);
            }
        }

        let switch = switch.lock();
        for (i, rsp_in) in switch.rsp_in.iter().enumerate() {
            let rsp = rsp_in.lock().pop().expect("response was routed back");
            // round trip is the identity on the original tag
            assert_eq!(rsp.tag, i as u64);
        }
    }

    #[test]
    fn equal_arity_switch_leaves_tags_untouched() {
        let mut sim = Simulator::new();
        let switch = sim.add(Switch::<MemReq, MemRsp>::new(
            &sim.clock(),
            "bypass-switch",
            Policy::Priority,
            2,
            2,
            1,
        ));
        switch.lock().req_in[1].lock().push(mem_req(0x42, 9), 1);
        sim.run(1);
        let switch = switch.lock();
        let req = switch.req_out[1].lock().pop().expect("bypass bound");
        assert_eq!(req.tag, 9);
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn non_power_of_two_group_is_fatal() {
        let sim = Simulator::new();
        let _ = Mux::<u32>::new(&sim.clock(), "bad", Policy::Priority, 6, 2, 1);
    }

    #[test]
    #[should_panic(expected = "cannot fan out")]
    fn more_outputs_than_inputs_is_fatal() {
        let sim = Simulator::new();
        let _ = Mux::<u32>::new(&sim.clock(), "bad", Policy::Priority, 1, 2, 1);
    }
}
