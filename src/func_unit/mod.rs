pub mod alu;
pub mod fpu;
pub mod load_store;
pub mod sfu;

pub use alu::AluUnit;
pub use fpu::FpuUnit;
pub use load_store::LoadStoreUnit;
pub use sfu::SfuUnit;

use crate::port::{self, Clock, Port};
use crate::trace;

/// Fixed pipeline-register delay between a unit's issue and its
/// writeback; compute latency is added on top per sub-op.
pub const REG_DELAY: u64 = 2;

/// Issue-lane plumbing shared by every functional unit.
///
/// One input and one output port per issue lane; the front-end selects
/// the lane, the unit consumes ready inputs on its tick.
pub struct FuncUnit {
    pub name: String,
    pub inputs: Vec<port::Ref<trace::Ref>>,
    pub outputs: Vec<port::Ref<trace::Ref>>,
}

impl FuncUnit {
    #[must_use]
    pub fn new(clock: &Clock, name: String, issue_width: usize) -> Self {
        Self {
            name,
            inputs: (0..issue_width).map(|_| Port::shared(clock)).collect(),
            outputs: (0..issue_width).map(|_| Port::shared(clock)).collect(),
        }
    }

    #[must_use]
    pub fn issue_width(&self) -> usize {
        self.inputs.len()
    }
}
