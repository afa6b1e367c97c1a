use crate::config::Config;
use crate::port::{self, Clock, Port};
use crate::sim::Component;
use crate::sync::Arc;
use crate::trace;

/// Coprocessor engine classes reachable from the SFU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Kind {
    Raster,
    Tex,
    Om,
}

/// Port bundle of one external coprocessor engine.
///
/// The engine itself is out of scope; the core only owns the hand-off
/// ports. The SFU pushes traces into `input` and drains `output` for
/// traces addressed to its core — engines may be shared across cores, so
/// non-matching traces are left in place.
pub struct Unit {
    pub kind: Kind,
    pub input: port::Ref<trace::Ref>,
    pub output: port::Ref<trace::Ref>,
}

impl Unit {
    #[must_use]
    pub fn new(clock: &Clock, kind: Kind) -> Self {
        Self {
            kind,
            input: Port::shared(clock),
            output: Port::shared(clock),
        }
    }
}

/// Per-core arena of coprocessor handles.
///
/// The SFU holds port handles resolved from here by index, never
/// references into another object.
pub struct Registry {
    pub raster: Vec<Unit>,
    pub tex: Vec<Unit>,
    pub om: Vec<Unit>,
}

impl Registry {
    #[must_use]
    pub fn new(clock: &Clock, config: &Config) -> Self {
        Self {
            raster: (0..config.num_raster_units)
                .map(|_| Unit::new(clock, Kind::Raster))
                .collect(),
            tex: (0..config.num_tex_units)
                .map(|_| Unit::new(clock, Kind::Tex))
                .collect(),
            om: (0..config.num_om_units)
                .map(|_| Unit::new(clock, Kind::Om))
                .collect(),
        }
    }

    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.raster.iter().chain(&self.tex).chain(&self.om)
    }
}

/// Fixed-latency stand-in engine.
///
/// Moves one trace per cycle from a unit's input to its output. Used by
/// the demo driver and the tests in place of real engine internals.
pub struct Passthrough {
    name: String,
    latency: u64,
    input: port::Ref<trace::Ref>,
    output: port::Ref<trace::Ref>,
}

impl Passthrough {
    #[must_use]
    pub fn new(name: impl Into<String>, unit: &Unit, latency: u64) -> Self {
        assert!(latency >= 1, "coprocessor with zero latency");
        Self {
            name: name.into(),
            latency,
            input: Arc::clone(&unit.input),
            output: Arc::clone(&unit.output),
        }
    }
}

impl Component for Passthrough {
    fn name(&self) -> &str {
        &self.name
    }

    fn tick(&mut self, cycle: u64) {
        let Some(trace) = self.input.lock().pop() else {
            return;
        };
        log::debug!("{}: cycle={cycle:04} {trace}", self.name);
        self.output.lock().push(trace, self.latency);
    }
}
