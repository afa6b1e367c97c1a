use clap::Parser;
use color_eyre::eyre;
use console::style;
use itertools::iproduct;
use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use bitvec::array::BitArray;
use warpsim::arbitration::{MemSwitch, Policy};
use warpsim::mem::{MemReq, MemRsp};
use warpsim::port;
use warpsim::trace::{self, Builder, Payload, MAX_THREADS};
use warpsim::types::{AluOp, FpuOp, FuClass, LsuOp, Op, SfuOp};
use warpsim::{warp, Component, Config, Core, Simulator};

#[derive(Debug, Parser)]
#[command(author, version, about = "SIMT core back-end cycle simulator", long_about = None)]
struct Options {
    /// Warps to drive
    #[arg(long, default_value = "4")]
    warps: usize,
    /// Instructions per warp
    #[arg(long, default_value = "32")]
    instructions: usize,
    /// Cycle cap
    #[arg(long, default_value = "100000")]
    max_cycles: u64,
    /// Latency of the toy downstream memory
    #[arg(long, default_value = "8")]
    mem_latency: u64,
    /// JSON core configuration
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

/// Fixed-latency memory stub behind the per-bank switch.
struct ToyMemory {
    name: String,
    latency: u64,
    req: port::Ref<MemReq>,
    rsp: port::Ref<MemRsp>,
}

impl Component for ToyMemory {
    fn name(&self) -> &str {
        &self.name
    }

    fn tick(&mut self, _cycle: u64) {
        while let Some(req) = self.req.lock().pop() {
            let rsp = MemRsp {
                tag: req.tag,
                cid: req.cid,
                uuid: req.uuid,
            };
            self.rsp.lock().push(rsp, self.latency);
        }
    }
}

/// Synthetic per-warp instruction stream.
fn build_streams(options: &Options, config: &Config) -> Vec<VecDeque<trace::Ref>> {
    let mut tmask: trace::ThreadMask = BitArray::ZERO;
    for lane in 0..config.num_lsu_lanes {
        tmask.set(lane, true);
    }
    let mut streams: Vec<VecDeque<trace::Ref>> = vec![VecDeque::new(); options.warps];
    for (wid, slot) in iproduct!(0..options.warps, 0..options.instructions) {
        let mut builder = match slot % 8 {
            0 => Builder::new(Op::Alu(AluOp::Arith)),
            1 => {
                let mut builder = Builder::new(Op::Lsu(LsuOp::Load));
                builder.payload = Payload::Mem {
                    addrs: (0..MAX_THREADS as u64)
                        .map(|lane| 0x1000_0000 + (wid as u64) * 0x100 + lane * 4)
                        .collect(),
                };
                builder
            }
            2 => Builder::new(Op::Fpu(FpuOp::Fma)),
            3 => Builder::new(Op::Alu(AluOp::Imul)),
            4 => {
                let mut builder = Builder::new(Op::Lsu(LsuOp::Store));
                builder.payload = Payload::Mem {
                    addrs: (0..MAX_THREADS as u64)
                        .map(|lane| 0x2000_0000 + (wid as u64) * 0x100 + lane * 4)
                        .collect(),
                };
                builder
            }
            5 => Builder::new(Op::Fpu(FpuOp::Fncp)),
            6 => Builder::new(Op::Sfu(SfuOp::Csrrw)),
            _ => {
                // rendezvous: every warp parks until the last one arrives
                let mut builder = Builder::new(Op::Sfu(SfuOp::Bar));
                builder.fetch_stall = true;
                builder.payload = Payload::Control {
                    arg1: slot as u64,
                    arg2: options.warps as u64,
                };
                builder
            }
        };
        builder.wid = wid;
        builder.tmask = tmask;
        streams[wid].push_back(builder.build());
    }
    streams
}

fn main() -> eyre::Result<()> {
    env_logger::init();
    color_eyre::install()?;
    let options = Options::parse();

    let config: Config = match &options.config {
        Some(path) => serde_json::from_reader(BufReader::new(File::open(path)?))?,
        None => Config::default(),
    };
    config.validate()?;
    let config = std::sync::Arc::new(config);

    let mut sim = Simulator::new();
    let table = warp::Table::shared(options.warps);
    let core = Core::new(&mut sim, 0, config.clone(), table.clone());

    // stand-in coprocessor engines
    for (i, unit) in core.coprocessors.units().enumerate() {
        sim.add(warpsim::coprocessor::Passthrough::new(
            format!("{}{}", unit.kind, i),
            unit,
            4,
        ));
    }

    // per-bank toy memory behind a lane switch
    for (b, adapter) in core.lsu_adapters.iter().enumerate() {
        let switch = MemSwitch::new(
            &sim.clock(),
            format!("mem-switch{b}"),
            Policy::RoundRobin,
            config.num_lsu_lanes,
            1,
            1,
        );
        {
            let adapter = adapter.lock();
            for lane in 0..config.num_lsu_lanes {
                adapter.req_out[lane].lock().bind(&switch.req_in[lane]);
                switch.rsp_in[lane].lock().bind(&adapter.rsp_out[lane]);
            }
        }
        let memory = ToyMemory {
            name: format!("toy-memory{b}"),
            latency: options.mem_latency,
            req: switch.req_out[0].clone(),
            rsp: switch.rsp_out[0].clone(),
        };
        sim.add(switch);
        sim.add(memory);
    }

    let mut streams = build_streams(&options, &config);
    let total: usize = streams.iter().map(VecDeque::len).sum();
    let mut issued = 0usize;
    let mut retired = 0usize;

    while retired < total && sim.cycle() < options.max_cycles {
        // front-end: one issue per ready warp per cycle
        for (wid, stream) in streams.iter_mut().enumerate() {
            if stream.is_empty() || !table.lock().is_ready(wid) {
                continue;
            }
            let trace = stream.pop_front().expect("stream is non-empty");
            if trace.fetch_stall {
                table.lock().suspend(wid);
            }
            core.issue(wid % config.issue_width, trace);
            issued += 1;
        }

        sim.tick();

        // writeback collector
        for class in [FuClass::Alu, FuClass::Fpu, FuClass::Lsu, FuClass::Sfu] {
            for iw in 0..config.issue_width {
                while let Some(trace) = core.output(class, iw).lock().pop() {
                    log::trace!("writeback: {trace}");
                    retired += 1;
                }
            }
        }
    }

    if retired < total {
        log::warn!(
            "cycle cap reached with {} of {total} traces in flight; results are unreliable",
            issued - retired,
        );
    }

    let cycles = sim.cycle();
    let stats = *core.stats.lock();
    eprintln!(
        "{} cycles={cycles} issued={issued} retired={retired} ipc={:.3}",
        style("done:").green().bold(),
        retired as f64 / cycles.max(1) as f64,
    );
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
