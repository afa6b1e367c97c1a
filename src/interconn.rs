use crate::config::Config;
use crate::mem::{AddrSpace, LsuReq, LsuRsp, MemReq, MemRsp};
use crate::port::{self, Clock, Port};
use crate::sim::Component;
use crate::sync::Arc;

const DC_PATH: u64 = 0;
const LMEM_PATH: u64 = 1;

/// Two-way demultiplexer between an LSU bank and its memory paths.
///
/// Requests are routed by address classification: `Shared` to the
/// local-memory pair, everything else to the data-cache pair. A 1-bit
/// path discriminant is appended to the tag on the way down and stripped
/// when the two response streams merge back onto `rsp_in`.
///
/// `req_in`/`rsp_in` face the LSU; the LSU pushes requests into `req_in`
/// and pops completions from `rsp_in`.
pub struct LocalMemDemux {
    name: String,
    config: Arc<Config>,
    delay: u64,
    pub req_in: port::Ref<LsuReq>,
    pub rsp_in: port::Ref<LsuRsp>,
    pub req_lmem: port::Ref<LsuReq>,
    pub rsp_lmem: port::Ref<LsuRsp>,
    pub req_dc: port::Ref<LsuReq>,
    pub rsp_dc: port::Ref<LsuRsp>,
}

impl LocalMemDemux {
    #[must_use]
    pub fn new(clock: &Clock, name: impl Into<String>, config: Arc<Config>, delay: u64) -> Self {
        assert!(delay >= 1, "demux with zero forward delay");
        Self {
            name: name.into(),
            config,
            delay,
            req_in: Port::shared(clock),
            rsp_in: Port::shared(clock),
            req_lmem: Port::shared(clock),
            rsp_lmem: Port::shared(clock),
            req_dc: Port::shared(clock),
            rsp_dc: Port::shared(clock),
        }
    }

    fn merge_response(&self, source: &port::Ref<LsuRsp>, path: u64) {
        let returned = source.lock().pop();
        if let Some(mut rsp) = returned {
            debug_assert_eq!(rsp.tag & 1, path, "response on the wrong merge port");
            rsp.tag >>= 1;
            log::trace!("{}: rsp {rsp}", self.name);
            self.rsp_in.lock().push(rsp, 1);
        }
    }
}

impl Component for LocalMemDemux {
    fn name(&self) -> &str {
        &self.name
    }

    fn tick(&mut self, _cycle: u64) {
        self.merge_response(&self.rsp_lmem, LMEM_PATH);
        self.merge_response(&self.rsp_dc, DC_PATH);

        let incoming = self.req_in.lock().pop();
        if let Some(mut req) = incoming {
            let lane = req
                .mask
                .first_one()
                .expect("memory request with an empty lane mask");
            let shared =
                AddrSpace::classify(req.addrs[lane], &self.config) == AddrSpace::Shared;
            log::trace!("{}: req {req}", self.name);
            if shared {
                req.tag = (req.tag << 1) | LMEM_PATH;
                self.req_lmem.lock().push(req, self.delay);
            } else {
                req.tag = (req.tag << 1) | DC_PATH;
                self.req_dc.lock().push(req, self.delay);
            }
        }
    }
}

/// Adapter between a per-bank LSU request stream and per-lane memory
/// ports.
///
/// One `LsuReq` explodes into up to `num_lsu_lanes` single-lane `MemReq`s
/// that keep the originating tag; lane responses coalesce back into
/// `LsuRsp`s whose mask records which lanes answered this cycle. Partial
/// coalescing is expected — the LSU absorbs partials.
pub struct LsuMemAdapter {
    name: String,
    config: Arc<Config>,
    delay: u64,
    pub req_in: port::Ref<LsuReq>,
    pub rsp_in: port::Ref<LsuRsp>,
    pub req_out: Vec<port::Ref<MemReq>>,
    pub rsp_out: Vec<port::Ref<MemRsp>>,
}

impl LsuMemAdapter {
    #[must_use]
    pub fn new(clock: &Clock, name: impl Into<String>, config: Arc<Config>, delay: u64) -> Self {
        assert!(delay >= 1, "adapter with zero forward delay");
        let num_lanes = config.num_lsu_lanes;
        Self {
            name: name.into(),
            config,
            delay,
            req_in: Port::shared(clock),
            rsp_in: Port::shared(clock),
            req_out: (0..num_lanes).map(|_| Port::shared(clock)).collect(),
            rsp_out: (0..num_lanes).map(|_| Port::shared(clock)).collect(),
        }
    }
}

impl Component for LsuMemAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn tick(&mut self, _cycle: u64) {
        // coalesce lane responses by tag, keeping first-seen tag order
        let mut merged: Vec<LsuRsp> = Vec::new();
        for (lane, port) in self.rsp_out.iter().enumerate() {
            let returned = port.lock().pop();
            let Some(rsp) = returned else { continue };
            match merged.iter_mut().find(|m| m.tag == rsp.tag) {
                Some(m) => {
                    m.mask.set(lane, true);
                }
                None => {
                    let mut m = LsuRsp::new();
                    m.tag = rsp.tag;
                    m.cid = rsp.cid;
                    m.uuid = rsp.uuid;
                    m.mask.set(lane, true);
                    merged.push(m);
                }
            }
        }
        for rsp in merged {
            log::trace!("{}: rsp {rsp}", self.name);
            self.rsp_in.lock().push(rsp, 1);
        }

        let incoming = self.req_in.lock().pop();
        if let Some(req) = incoming {
            log::trace!("{}: req {req}", self.name);
            for lane in req.mask.iter_ones() {
                let addr = req.addrs[lane];
                let mem_req = MemReq {
                    addr,
                    write: req.write,
                    space: AddrSpace::classify(addr, &self.config),
                    tag: req.tag,
                    cid: req.cid,
                    uuid: req.uuid,
                };
                self.req_out[lane].lock().push(mem_req, self.delay);
            }
        }
    }
}
