//! Benchmarks TLB hit-path cost: scanning a full cache for a match versus
//! falling through to a fresh walk on a cold cache.

use criterion::{criterion_group, criterion_main, Criterion};
use kernel_mmu::{AccessType, Cr0, Cr4, Efer, LinearAccess, MemoryBus, PagingState, RFlags, Tlb};
use std::cell::Cell;

struct FlatMemory {
    words: Vec<Cell<u64>>,
}

impl FlatMemory {
    fn new(size: usize) -> Self {
        Self { words: (0..size).map(|_| Cell::new(0)).collect() }
    }

    fn set(&self, addr: u64, value: u64) {
        self.words[(addr / 8) as usize].set(value);
    }
}

impl MemoryBus for FlatMemory {
    fn read_u32(&self, addr: u64) -> u32 {
        #[allow(clippy::cast_possible_truncation)]
        let v = self.words[(addr / 8) as usize].get() as u32;
        v
    }

    fn read_u64(&self, addr: u64) -> u64 {
        self.words[(addr / 8) as usize].get()
    }

    fn cmpxchg_u32(&self, addr: u64, expected: u32, new: u32) -> bool {
        let slot = &self.words[(addr / 8) as usize];
        #[allow(clippy::cast_possible_truncation)]
        if slot.get() as u32 == expected {
            slot.set(u64::from(new));
            true
        } else {
            false
        }
    }

    fn cmpxchg_u64(&self, addr: u64, expected: u64, new: u64) -> bool {
        let slot = &self.words[(addr / 8) as usize];
        if slot.get() == expected {
            slot.set(new);
            true
        } else {
            false
        }
    }
}

const PTE_P: u64 = 1 << 0;
const PTE_W: u64 = 1 << 1;
const PTE_U: u64 = 1 << 2;
const PTE_A: u64 = 1 << 5;
const PTE_D: u64 = 1 << 6;

fn bench_tlb_hit(c: &mut Criterion) {
    let mem = FlatMemory::new(0x4000);
    mem.set(0, 0x1000 | PTE_P | PTE_W | PTE_U | PTE_A);
    mem.set(0x1000, 0x2000 | PTE_P | PTE_W | PTE_U | PTE_A | PTE_D);

    let state = PagingState::without_pdpte(RFlags::RESERVED, Cr0::PG, 0, Cr4::empty(), Efer::empty(), 0);
    let op = LinearAccess::explicit(0, AccessType::Write);

    let mut tlb: Tlb<8> = Tlb::new();
    // Warm the cache once outside the measured loop.
    tlb.translate(&op, &state, &mem);

    c.bench_function("tlb/hit", |b| {
        b.iter(|| tlb.translate(&op, &state, &mem));
    });
}

fn bench_tlb_cold_miss(c: &mut Criterion) {
    let mem = FlatMemory::new(0x4000);
    mem.set(0, 0x1000 | PTE_P | PTE_W | PTE_U | PTE_A);
    mem.set(0x1000, 0x2000 | PTE_P | PTE_W | PTE_U | PTE_A | PTE_D);

    let state = PagingState::without_pdpte(RFlags::RESERVED, Cr0::PG, 0, Cr4::empty(), Efer::empty(), 0);
    let op = LinearAccess::explicit(0, AccessType::Write);

    c.bench_function("tlb/cold_miss", |b| {
        b.iter(|| {
            let mut tlb: Tlb<8> = Tlb::new();
            tlb.translate(&op, &state, &mem)
        });
    });
}

criterion_group!(benches, bench_tlb_hit, bench_tlb_cold_miss);
criterion_main!(benches);
