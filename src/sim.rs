use crate::port::Clock;
use crate::sync::{Arc, Mutex};

/// A simulation object.
///
/// `tick` is invoked exactly once per cycle, in registration order.
/// Pushes performed during a tick carry a delay of at least one cycle, so
/// no object observes another object's same-cycle output.
pub trait Component {
    fn name(&self) -> &str;

    fn tick(&mut self, cycle: u64);

    fn reset(&mut self) {}
}

trait Registered {
    fn tick(&self, cycle: u64);
    fn reset(&self);
}

impl<C> Registered for Arc<Mutex<C>>
where
    C: Component,
{
    fn tick(&self, cycle: u64) {
        self.lock().tick(cycle);
    }

    fn reset(&self) {
        self.lock().reset();
    }
}

/// Deterministic tick driver.
///
/// Owns the cycle counter and the registration list. Each `tick` advances
/// simulated time by one cycle after every registered object has run.
#[derive(Default)]
pub struct Simulator {
    clock: Clock,
    objects: Vec<Box<dyn Registered>>,
}

impl Simulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock.clone()
    }

    #[must_use]
    pub fn cycle(&self) -> u64 {
        self.clock.now()
    }

    pub fn register<C>(&mut self, component: &Arc<Mutex<C>>)
    where
        C: Component + 'static,
    {
        self.objects.push(Box::new(Arc::clone(component)));
    }

    /// Construct, register and return a shared handle in one step.
    pub fn add<C>(&mut self, component: C) -> Arc<Mutex<C>>
    where
        C: Component + 'static,
    {
        let component = Arc::new(Mutex::new(component));
        self.register(&component);
        component
    }

    pub fn tick(&mut self) {
        let cycle = self.clock.now();
        log::trace!("===== cycle {cycle:04} =====");
        for object in &self.objects {
            object.tick(cycle);
        }
        self.clock.advance();
    }

    pub fn run(&mut self, cycles: u64) {
        for _ in 0..cycles {
            self.tick();
        }
    }

    pub fn reset(&mut self) {
        for object in &self.objects {
            object.reset();
        }
        self.clock.rewind();
    }
}
