/// Functional-unit class a decoded micro-op issues to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumCount)]
#[strum(serialize_all = "UPPERCASE")]
pub enum FuClass {
    Alu,
    Lsu,
    Fpu,
    Sfu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum AluOp {
    Arith,
    Branch,
    Syscall,
    Imul,
    Idiv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum FpuOp {
    Fncp,
    Fma,
    Fdiv,
    Fsqrt,
    Fcvt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum LsuOp {
    Load,
    Store,
    Fence,
}

/// Special-function sub-ops.
///
/// `Cmov` is carried in the enumeration for front-end compatibility but
/// has no execution path; dispatching it is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum SfuOp {
    Tmc,
    Wspawn,
    Split,
    Join,
    Bar,
    Pred,
    Csrrw,
    Csrrs,
    Csrrc,
    Tex,
    Raster,
    Om,
    Cmov,
}

/// A class-tagged sub-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Alu(AluOp),
    Fpu(FpuOp),
    Lsu(LsuOp),
    Sfu(SfuOp),
}

impl Op {
    #[must_use]
    pub fn class(&self) -> FuClass {
        match self {
            Op::Alu(_) => FuClass::Alu,
            Op::Fpu(_) => FuClass::Fpu,
            Op::Lsu(_) => FuClass::Lsu,
            Op::Sfu(_) => FuClass::Sfu,
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Op::Alu(op) => write!(f, "{op}"),
            Op::Fpu(op) => write!(f, "{op}"),
            Op::Lsu(op) => write!(f, "{op}"),
            Op::Sfu(op) => write!(f, "{op}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AluOp, FuClass, Op, SfuOp};

    #[test]
    fn op_class_follows_the_tag() {
        assert_eq!(Op::Alu(AluOp::Imul).class(), FuClass::Alu);
        assert_eq!(Op::Sfu(SfuOp::Bar).class(), FuClass::Sfu);
    }

    #[test]
    fn display_matches_mnemonics() {
        assert_eq!(Op::Alu(AluOp::Arith).to_string(), "ARITH");
        assert_eq!(Op::Sfu(SfuOp::Csrrw).to_string(), "CSRRW");
        assert_eq!(FuClass::Lsu.to_string(), "LSU");
    }
}
