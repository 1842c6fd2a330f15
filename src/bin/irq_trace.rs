use std::path::PathBuf;
use std::time::Instant;

use a12_mappers::nes::{Cartridge, CartridgeBus, create_mapper, mapper_name};
use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;

#[derive(Debug, Clone)]
struct Config {
    rom: Option<PathBuf>,
    mapper: u16,
    submapper: u8,
    frames: u32,
    latch: Option<u8>,
    acknowledge: bool,
    sprites_low: bool,
    state: Option<String>,
    dump_state: bool,
    verify_state: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rom: None,
            mapper: 4,
            submapper: 0,
            frames: 1,
            latch: None,
            acknowledge: true,
            sprites_low: false,
            state: None,
            dump_state: false,
            verify_state: false,
        }
    }
}

fn parse_args() -> Result<Config> {
    let mut cfg = Config::default();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--rom" => {
                let value = args
                    .next()
                    .context("--rom requires a path, e.g. --rom roms/dragon_ninja.nes")?;
                cfg.rom = Some(PathBuf::from(value));
            }
            "--mapper" => {
                let value = args
                    .next()
                    .context("--mapper requires an id, e.g. --mapper 222")?;
                cfg.mapper = value
                    .parse::<u16>()
                    .with_context(|| format!("invalid --mapper value: {value}"))?;
            }
            "--submapper" => {
                let value = args
                    .next()
                    .context("--submapper requires an id, e.g. --submapper 4")?;
                cfg.submapper = value
                    .parse::<u8>()
                    .with_context(|| format!("invalid --submapper value: {value}"))?;
            }
            "--frames" => {
                let value = args
                    .next()
                    .context("--frames requires an integer, e.g. --frames 60")?;
                cfg.frames = value
                    .parse::<u32>()
                    .with_context(|| format!("invalid --frames value: {value}"))?;
            }
            "--latch" => {
                let value = args
                    .next()
                    .context("--latch requires a byte, e.g. --latch 20")?;
                cfg.latch = Some(
                    value
                        .parse::<u8>()
                        .with_context(|| format!("invalid --latch value: {value}"))?,
                );
            }
            "--state" => {
                let value = args
                    .next()
                    .context("--state requires a base64 record from --dump-state")?;
                cfg.state = Some(value);
            }
            "--no-ack" => cfg.acknowledge = false,
            "--sprites-low" => cfg.sprites_low = true,
            "--dump-state" => cfg.dump_state = true,
            "--verify-state" => cfg.verify_state = true,
            "--help" | "-h" => {
                println!(
                    "irq_trace\n\n\
Usage:\n\
  cargo run --release --bin irq_trace -- [options]\n\n\
Options:\n\
  --rom <path>          iNES/NES 2.0 image (default: blank cartridge)\n\
  --mapper <id>         Mapper for the blank cartridge, 4 or 222 (default 4)\n\
  --submapper <id>      Submapper for the blank cartridge (default 0)\n\
  --frames <n>          Frames to render (default 1)\n\
  --latch <n>           IRQ latch (MMC3) or start value (Mapper 222)\n\
  --no-ack              Leave the IRQ asserted instead of re-arming it\n\
  --sprites-low         Fetch sprites from $0000 and background from $1000\n\
  --state <base64>      Restore a mapper state before rendering\n\
  --dump-state          Print the final mapper state as base64\n\
  --verify-state        Replay the run from a mid-run snapshot and compare\n\
  -h, --help            Show this help\n\n\
Set RUST_LOG=debug or RUST_LOG=trace for per-edge detail.\n"
                );
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }

    if cfg.frames == 0 {
        anyhow::bail!("--frames must be at least 1");
    }
    Ok(cfg)
}

fn load_cartridge(cfg: &Config) -> Result<Cartridge> {
    match &cfg.rom {
        Some(path) => Ok(Cartridge::from_file(path)?),
        None => Ok(Cartridge::blank(cfg.mapper, cfg.submapper, 16, 128)),
    }
}

// (arming writes, handler writes that re-arm after each IRQ)
fn irq_program(mapper_id: u16, latch: u8) -> (Vec<(u16, u8)>, Vec<(u16, u8)>) {
    match mapper_id {
        222 => (vec![(0xF000, latch)], vec![(0xF000, latch)]),
        _ => (
            vec![(0xC000, latch), (0xC001, 0), (0xE001, 0)],
            vec![(0xE000, 0), (0xE001, 0)],
        ),
    }
}

fn build_bus(cfg: &Config) -> Result<CartridgeBus> {
    let cart = load_cartridge(cfg)?;
    let mapper_id = cart.mapper_id;
    let mapper = create_mapper(cart)
        .with_context(|| format!("cannot run mapper {mapper_id} ({})", mapper_name(mapper_id)))?;

    let mut bus = CartridgeBus::new(mapper);
    if cfg.sprites_low {
        bus.set_pattern_tables(0x1000, 0x0000);
    }

    if let Some(encoded) = &cfg.state {
        let bytes = BASE64_STANDARD
            .decode(encoded.trim())
            .context("--state is not valid base64")?;
        bus.mapper_mut()
            .load_state(&bytes)
            .context("failed to restore mapper state")?;
    }

    if let Some(latch) = cfg.latch {
        let (arm, handler) = irq_program(mapper_id, latch);
        for (addr, value) in arm {
            bus.cpu_write(addr, value);
        }
        if cfg.acknowledge {
            bus.set_irq_handler(handler);
        }
    }
    Ok(bus)
}

fn run(bus: &mut CartridgeBus, frames: u32) -> Vec<Vec<i64>> {
    (0..frames).map(|_| bus.run_frame()).collect()
}

fn verify_state(cfg: &Config) -> Result<()> {
    let mut original = build_bus(cfg)?;
    let half = cfg.frames / 2;
    run(&mut original, half);

    let snapshot = original
        .mapper()
        .save_state()
        .context("failed to snapshot mapper")?;
    let expected = run(&mut original, cfg.frames - half);

    let mut replica = build_bus(cfg)?;
    for _ in 0..half {
        replica.run_frame();
    }
    replica
        .mapper_mut()
        .load_state(&snapshot)
        .context("snapshot taken mid-run was rejected")?;
    let actual = run(&mut replica, cfg.frames - half);

    if actual != expected {
        anyhow::bail!("restored mapper diverged: expected {expected:?}, got {actual:?}");
    }
    println!(
        "State round-trip OK ({} bytes, {} frame(s) replayed)",
        snapshot.len(),
        cfg.frames - half
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cfg = parse_args()?;

    let start = Instant::now();
    let mut bus = build_bus(&cfg)?;
    println!("Mapper: {}", bus.mapper().name());

    let mut total = 0usize;
    for (frame, lines) in run(&mut bus, cfg.frames).iter().enumerate() {
        total += lines.len();
        if lines.is_empty() {
            println!("frame {frame:>4}: no IRQ");
        } else {
            let list: Vec<String> = lines.iter().map(|line| line.to_string()).collect();
            println!("frame {frame:>4}: IRQ on scanline(s) {}", list.join(", "));
        }
    }

    println!("{}", bus.mapper().debug_state());
    println!(
        "{} IRQ(s) over {} frame(s) in {:.2?}",
        total,
        cfg.frames,
        start.elapsed()
    );

    if cfg.dump_state {
        let state = bus
            .mapper()
            .save_state()
            .context("failed to save mapper state")?;
        println!("{}", BASE64_STANDARD.encode(state));
    }
    if cfg.verify_state {
        verify_state(&cfg)?;
    }
    Ok(())
}
