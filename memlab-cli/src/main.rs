//! Memlab: an interactive memory-hierarchy simulator
//!
//! Drives a heap allocator (first/best/worst fit or buddy), a paged
//! virtual-memory translator (FIFO or LRU replacement) and a three-level
//! cache hierarchy from a line-oriented command loop. Allocation and free
//! requests exercise the heap; `read` and `write` translate a virtual
//! address and route the physical address through the caches.

mod command;
mod driver;
mod logger;

use std::io::{self, BufRead, Write};

use anyhow::Context;

use memlab_cache::LevelId;

use crate::command::{Command, ParseError};
use crate::driver::{AccessResult, SimError, Simulator};

fn main() -> anyhow::Result<()> {
    logger::init().context("failed to install logger")?;
    let mut sim = Simulator::new().context("failed to construct simulator")?;

    println!(
        "memlab initialised: {} bytes, {} allocator, {} replacement",
        sim.memory_size(),
        sim.allocator().name(),
        sim.policy()
    );
    print_help();

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("\n> ");
        io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF is a clean exit
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match command::parse(trimmed) {
            Ok(Command::Exit) => break,
            Ok(cmd) => run_command(&mut sim, cmd),
            Err(err) => report_parse_error(&err),
        }
    }

    Ok(())
}

/// Execute one command, rendering its outcome on stdout
///
/// Subsystem errors are reported and recovered here; the loop continues.
fn run_command(sim: &mut Simulator, cmd: Command) {
    let outcome = match cmd {
        Command::Init { size } => sim.init(size).map(|()| {
            println!("memory initialised to {} bytes; all ids invalidated", size);
        }),
        Command::SetAllocator(kind) => {
            sim.set_allocator(kind);
            println!("allocator set to {}", kind.name());
            Ok(())
        }
        Command::SetPolicy(policy) => sim.set_policy(policy).map(|()| {
            println!("replacement policy set to {}", policy);
        }),
        Command::ConfigCache {
            level,
            size,
            block_size,
            associativity,
        } => sim
            .config_cache(level, size, block_size, associativity)
            .map(|()| {
                println!("{} reconfigured", level);
            }),
        Command::Malloc { size } => sim.malloc(size).map(|alloc| {
            println!(
                "allocated block id={} at {:#x} ({} bytes)",
                alloc.id, alloc.addr, alloc.size
            );
        }),
        Command::Free { id } => sim.free(id).map(|()| {
            println!("block {} freed", id);
        }),
        Command::Read { addr } => {
            print_access(addr, sim.read(addr));
            Ok(())
        }
        Command::Write { addr } => {
            print_access(addr, sim.write(addr));
            Ok(())
        }
        Command::Dump => {
            println!("{}", sim.dump());
            Ok(())
        }
        Command::Stats => {
            print_stats(sim);
            Ok(())
        }
        Command::Help => {
            print_help();
            Ok(())
        }
        // Exit is handled by the loop.
        Command::Exit => Ok(()),
    };

    if let Err(err) = outcome {
        report_sim_error(&err);
    }
}

fn print_access(addr: u64, result: AccessResult) {
    let AccessResult {
        translation,
        memory,
    } = result;
    let fault = if translation.fault {
        format!(" (page fault, page {})", translation.page)
    } else {
        String::new()
    };
    println!("virtual {:#x} -> physical {:#x}{}", addr, translation.physical, fault);
    match memory.hit_level {
        Some(level) => println!("{} hit ({} cycles)", level, memory.cycles),
        None => println!("main memory access ({} cycles)", memory.cycles),
    }
}

fn print_stats(sim: &Simulator) {
    let heap = sim.heap_stats();
    println!("--------- heap ({}) ---------", sim.allocator().name());
    println!("total size             : {} bytes", heap.total);
    println!("used memory            : {} bytes", heap.used);
    println!("free memory            : {} bytes", heap.free);
    println!("used blocks            : {}", heap.used_blocks);
    println!("free blocks            : {}", heap.free_blocks);
    println!(
        "internal fragmentation : {} bytes",
        heap.internal_fragmentation
    );
    println!("utilisation            : {:.2}%", heap.utilisation());
    println!(
        "external fragmentation : {:.3}",
        heap.external_fragmentation()
    );
    println!("allocation requests    : {}", heap.counters.requests);
    println!("successful allocs      : {}", heap.counters.successes);
    println!("failed allocs          : {}", heap.counters.failures);
    println!("frees                  : {}", heap.counters.frees);
    println!("success rate           : {:.2}%", heap.success_rate());

    let vm = sim.vm_stats();
    println!("----- virtual memory ({}) -----", sim.policy());
    println!("page hits              : {}", vm.page_hits);
    println!("page faults            : {}", vm.page_faults);
    println!("disk accesses          : {}", vm.disk_accesses);
    println!("fault rate             : {:.2}%", vm.fault_rate());

    let caches = sim.caches();
    println!("----------- cache -----------");
    for id in [LevelId::L1, LevelId::L2, LevelId::L3] {
        let stats = caches.level(id).stats();
        println!(
            "[{}] hits: {:<6} misses: {:<6} hit rate: {:.2}%  write-backs: {}",
            id,
            stats.hits,
            stats.misses,
            stats.hit_rate(),
            stats.write_backs
        );
    }
    println!("total requests         : {}", caches.total_requests());
    println!("total cycles           : {}", caches.total_cycles());
    println!("AMAT                   : {:.2} cycles", caches.amat());
}

fn print_help() {
    println!("\navailable commands:");
    println!("  init <size>                         re-create heap and VM with a new byte size");
    println!("  set allocator <first|best|worst|buddy>");
    println!("  set policy <FIFO|LRU>               replace the VM translator");
    println!("  config cache <L1|L2|L3> <size> <block> <assoc>");
    println!("  malloc <size>                       allocate; prints the assigned id");
    println!("  free <id>                           deallocate");
    println!("  read <addr>                         translate, then read through the caches");
    println!("  write <addr>                        as read, but dirties the cache line");
    println!("  dump                                map of the current heap");
    println!("  stats                               per-subsystem counters");
    println!("  help | exit");
}

fn report_parse_error(err: &ParseError) {
    eprintln!("error: {}", err);
}

fn report_sim_error(err: &SimError) {
    eprintln!("error: {}", err);
}
