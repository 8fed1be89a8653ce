//! # Regbus Peripheral
//!
//! A responder for the regbus register-access protocol: decodes incoming
//! request frames from a byte transport, reads or mutates a register map
//! and answers with the matching response frame.
//!
//! ## Architecture
//!
//! The crate is built around two components:
//!
//! - **[`RegisterSpace`] Trait**: the storage the responder serves. The
//!   provided [`SparseRegisters`] models a device whose registers power up
//!   in an undefined state: the first read of a never-written address
//!   synthesizes a pseudo-random value, stores it, and every later read
//!   returns that same value.
//! - **[`peripheral::Peripheral`]**: the serving loop. It owns a
//!   [`StreamParser`](regbus_protocol::parser::StreamParser) for the
//!   request direction, so fragmented and noisy input is handled
//!   transparently; malformed stretches simply produce no response.
//!
//! ## Randomness
//!
//! The reset-value source is an injected [`rand::RngCore`], so peripheral
//! behavior is reproducible: seed it with
//! [`SparseRegisters::seeded`] in tests, or let
//! [`SparseRegisters::new`] draw entropy from the OS.
//!
//! ## Example
//!
//! ```ignore
//! use regbus_peripheral::{SparseRegisters, peripheral::Peripheral};
//!
//! let registers = SparseRegisters::new();
//! let peripheral = Peripheral::new(registers, transport);
//! peripheral.serve().await?;   // runs until the transport closes
//! ```
//!
//! ## Error handling
//!
//! The protocol defines no error-response frame. A request the parser
//! cannot reconstruct is skipped silently; the controller's timeout is the
//! only signal it gets. Request CRCs are not validated either, matching the
//! behavior of the hardware this responder stands in for.
//!
//! ## Logging
//!
//! The serving loop logs through the `log` facade: connection lifecycle at
//! info, each decoded request and sent response at debug.

pub mod peripheral;

use std::collections::HashMap;

use rand::RngCore;
use rand::SeedableRng;
use rand::rngs::StdRng;

type WatchHook = Box<dyn FnMut(u32, u32) + Send>;

/// Storage the peripheral serves: a flat 32-bit address space of 32-bit
/// cells.
///
/// `load` takes `&mut self` because reading may populate state (see
/// [`SparseRegisters`]).
pub trait RegisterSpace {
    /// Store `data` at `addr`.
    fn store(&mut self, addr: u32, data: u32);

    /// Return the value at `addr`.
    fn load(&mut self, addr: u32) -> u32;
}

/// Sparse register map with pseudo-random reset values.
///
/// Addresses start out unpopulated. A write populates its cell; a read of
/// an unpopulated cell synthesizes a value from the injected RNG and stores
/// it, so repeat reads of the same address agree.
pub struct SparseRegisters<R = StdRng> {
    cells: HashMap<u32, u32>,
    rng: R,
    watch: Option<WatchHook>,
}

impl SparseRegisters<StdRng> {
    /// A register map whose reset values are drawn from OS entropy.
    pub fn new() -> SparseRegisters<StdRng> {
        SparseRegisters::with_rng(StdRng::from_entropy())
    }

    /// A register map with reproducible reset values.
    pub fn seeded(seed: u64) -> SparseRegisters<StdRng> {
        SparseRegisters::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl Default for SparseRegisters<StdRng> {
    fn default() -> Self {
        SparseRegisters::new()
    }
}

impl<R: RngCore> SparseRegisters<R> {
    /// A register map drawing reset values from `rng`.
    pub fn with_rng(rng: R) -> SparseRegisters<R> {
        SparseRegisters {
            cells: HashMap::new(),
            rng,
            watch: None,
        }
    }

    /// Register a callback fired with `(addr, value)` whenever a cell is
    /// populated or overwritten, synthesized reset values included.
    pub fn on_change(mut self, hook: impl FnMut(u32, u32) + Send + 'static) -> Self {
        self.watch = Some(Box::new(hook));
        self
    }

    /// Number of populated cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The populated cells, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.cells.iter().map(|(&addr, &data)| (addr, data))
    }

    fn notify(&mut self, addr: u32, data: u32) {
        if let Some(hook) = &mut self.watch {
            hook(addr, data);
        }
    }
}

impl<R: RngCore> RegisterSpace for SparseRegisters<R> {
    fn store(&mut self, addr: u32, data: u32) {
        self.cells.insert(addr, data);
        self.notify(addr, data);
    }

    fn load(&mut self, addr: u32) -> u32 {
        if let Some(&data) = self.cells.get(&addr) {
            return data;
        }
        // Models undefined hardware reset state: the first read decides
        // the value, repeat reads must agree.
        let data = self.rng.next_u32();
        self.cells.insert(addr, data);
        self.notify(addr, data);
        data
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn store_then_load() {
        let mut registers = SparseRegisters::seeded(1);
        registers.store(0x1000, 0xdead_beef);
        assert_eq!(registers.load(0x1000), 0xdead_beef);
        assert_eq!(registers.len(), 1);
    }

    #[test]
    fn unwritten_address_is_deterministic_after_first_read() {
        let mut registers = SparseRegisters::seeded(42);
        let first = registers.load(0x0000_2000);
        assert_eq!(registers.load(0x0000_2000), first);
        assert_eq!(registers.load(0x0000_2000), first);
    }

    #[test]
    fn distinct_addresses_are_independent() {
        let mut a = SparseRegisters::seeded(7);
        let mut b = SparseRegisters::seeded(7);
        // Same seed, same read order: same synthesized values.
        assert_eq!(a.load(0x10), b.load(0x10));
        assert_eq!(a.load(0x20), b.load(0x20));
    }

    #[test]
    fn watch_sees_writes_and_synthesized_values() {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut registers = SparseRegisters::seeded(3).on_change(move |addr, data| {
            let _ = tx.send((addr, data));
        });

        registers.store(0x40, 0x1234_5678);
        let synthesized = registers.load(0x80);
        registers.load(0x80); // already populated, no notification

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events, vec![(0x40, 0x1234_5678), (0x80, synthesized)]);
    }
}
